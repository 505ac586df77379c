use super::ledger::Ledger;
use crate::config::LedgerConfig;
use crate::domain::ports::{Order, TransactionStoreRef, User};
use crate::infrastructure::gateway::FixedGateway;
use crate::infrastructure::in_memory::{
    InMemoryOrderDirectory, InMemoryTransactionStore, InMemoryUserDirectory,
};
use rust_decimal::Decimal;
use std::sync::Arc;

pub(crate) struct Harness {
    pub ledger: Ledger,
    pub store: InMemoryTransactionStore,
    pub users: InMemoryUserDirectory,
    pub orders: InMemoryOrderDirectory,
}

impl Harness {
    pub async fn new() -> Self {
        Self::with_gateways(FixedGateway::approving(), FixedGateway::approving()).await
    }

    pub async fn with_gateways(charge: FixedGateway, payment: FixedGateway) -> Self {
        Self::build(charge, payment, |store| -> TransactionStoreRef { Arc::new(store) }).await
    }

    /// Routes the ledger's writes through `layer`; `store` still reads the
    /// underlying entries directly.
    pub async fn with_store<F>(layer: F) -> Self
    where
        F: FnOnce(InMemoryTransactionStore) -> TransactionStoreRef,
    {
        Self::build(FixedGateway::approving(), FixedGateway::approving(), layer).await
    }

    async fn build<F>(charge: FixedGateway, payment: FixedGateway, layer: F) -> Self
    where
        F: FnOnce(InMemoryTransactionStore) -> TransactionStoreRef,
    {
        let store = InMemoryTransactionStore::new();
        let users = InMemoryUserDirectory::new();
        let orders = InMemoryOrderDirectory::new();
        let ledger = Ledger::with_gateways(
            layer(store.clone()),
            Arc::new(users.clone()),
            Arc::new(orders.clone()),
            LedgerConfig::default(),
            Arc::new(charge),
            Arc::new(payment),
        );
        let harness = Self {
            ledger,
            store,
            users,
            orders,
        };
        harness.user(1).await;
        harness
    }

    pub async fn user(&self, id: u64) {
        self.users
            .register(User {
                id,
                name: format!("user-{id}"),
            })
            .await;
    }

    pub async fn order(&self, id: u64, user_id: u64, total: Decimal, status: &str) {
        self.orders
            .register(Order {
                id,
                user_id,
                total_amount: total,
                status: status.to_string(),
            })
            .await;
    }
}
