use crate::domain::filter::TransactionFilter;
use crate::domain::ports::{Order, OrderDirectory, TransactionStore, User, UserDirectory};
use crate::domain::transaction::{NewTransaction, OrderId, Transaction, TransactionId, UserId};
use crate::error::{LedgerError, Result};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Default)]
struct LedgerState {
    next_id: TransactionId,
    entries: BTreeMap<TransactionId, Transaction>,
}

/// A thread-safe in-memory ledger.
///
/// Uses `Arc<RwLock<..>>` so clones share the same entries. Ids start at 1.
#[derive(Default, Clone)]
pub struct InMemoryTransactionStore {
    ledger: Arc<RwLock<LedgerState>>,
}

impl InMemoryTransactionStore {
    /// Creates a new, empty in-memory transaction store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TransactionStore for InMemoryTransactionStore {
    async fn insert(&self, draft: NewTransaction) -> Result<Transaction> {
        let mut ledger = self.ledger.write().await;
        ledger.next_id += 1;
        let tx = Transaction::open(ledger.next_id, draft, Utc::now());
        ledger.entries.insert(tx.id, tx.clone());
        Ok(tx)
    }

    async fn update(&self, tx: &Transaction) -> Result<Transaction> {
        let mut ledger = self.ledger.write().await;
        let stored = ledger
            .entries
            .get_mut(&tx.id)
            .ok_or_else(|| LedgerError::NotFound(format!("Transaction {} not found", tx.id)))?;
        if stored.version != tx.version {
            return Err(LedgerError::Conflict(format!(
                "Transaction {} was modified concurrently (expected version {}, found {})",
                tx.id, tx.version, stored.version
            )));
        }
        let mut next = tx.clone();
        next.version += 1;
        *stored = next.clone();
        Ok(next)
    }

    async fn get(&self, id: TransactionId) -> Result<Option<Transaction>> {
        let ledger = self.ledger.read().await;
        Ok(ledger.entries.get(&id).cloned())
    }

    async fn find_by_reference(&self, reference_id: &str) -> Result<Option<Transaction>> {
        let ledger = self.ledger.read().await;
        Ok(ledger
            .entries
            .values()
            .find(|tx| tx.reference_id.as_deref() == Some(reference_id))
            .cloned())
    }

    async fn exists(&self, id: TransactionId) -> Result<bool> {
        let ledger = self.ledger.read().await;
        Ok(ledger.entries.contains_key(&id))
    }

    async fn query(&self, filter: &TransactionFilter) -> Result<Vec<Transaction>> {
        let ledger = self.ledger.read().await;
        Ok(ledger
            .entries
            .values()
            .filter(|tx| filter.matches(tx))
            .cloned()
            .collect())
    }

    async fn delete(&self, id: TransactionId) -> Result<bool> {
        let mut ledger = self.ledger.write().await;
        Ok(ledger.entries.remove(&id).is_some())
    }

    async fn delete_all(&self) -> Result<()> {
        let mut ledger = self.ledger.write().await;
        ledger.entries.clear();
        Ok(())
    }
}

/// In-memory user directory, populated by the caller.
#[derive(Default, Clone)]
pub struct InMemoryUserDirectory {
    users: Arc<RwLock<HashMap<UserId, User>>>,
}

impl InMemoryUserDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn register(&self, user: User) {
        self.users.write().await.insert(user.id, user);
    }

    /// Registered user ids, ascending.
    pub async fn ids(&self) -> Vec<UserId> {
        let mut ids: Vec<UserId> = self.users.read().await.keys().copied().collect();
        ids.sort_unstable();
        ids
    }
}

#[async_trait]
impl UserDirectory for InMemoryUserDirectory {
    async fn find(&self, user_id: UserId) -> Result<Option<User>> {
        Ok(self.users.read().await.get(&user_id).cloned())
    }
}

/// In-memory order directory, populated by the caller.
#[derive(Default, Clone)]
pub struct InMemoryOrderDirectory {
    orders: Arc<RwLock<HashMap<OrderId, Order>>>,
}

impl InMemoryOrderDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn register(&self, order: Order) {
        self.orders.write().await.insert(order.id, order);
    }
}

#[async_trait]
impl OrderDirectory for InMemoryOrderDirectory {
    async fn find(&self, order_id: OrderId) -> Result<Option<Order>> {
        Ok(self.orders.read().await.get(&order_id).cloned())
    }
}
