use super::filter::TransactionFilter;
use super::transaction::{NewTransaction, OrderId, Transaction, TransactionId, UserId};
use crate::error::Result;
use async_trait::async_trait;
use rust_decimal::Decimal;
use std::sync::Arc;

/// Durable append/query store for ledger entries. No business rules live here.
#[async_trait]
pub trait TransactionStore: Send + Sync {
    /// Assigns an id and persists a new `PENDING` transaction.
    async fn insert(&self, draft: NewTransaction) -> Result<Transaction>;
    /// Compare-and-set on `version`: fails with `Conflict` when the stored
    /// copy has moved on since `tx` was read. Returns the stored copy.
    async fn update(&self, tx: &Transaction) -> Result<Transaction>;
    async fn get(&self, id: TransactionId) -> Result<Option<Transaction>>;
    async fn find_by_reference(&self, reference_id: &str) -> Result<Option<Transaction>>;
    async fn exists(&self, id: TransactionId) -> Result<bool>;
    /// Matching transactions in ascending id order.
    async fn query(&self, filter: &TransactionFilter) -> Result<Vec<Transaction>>;
    async fn delete(&self, id: TransactionId) -> Result<bool>;
    async fn delete_all(&self) -> Result<()>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct User {
    pub id: UserId,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Order {
    pub id: OrderId,
    pub user_id: UserId,
    pub total_amount: Decimal,
    pub status: String,
}

#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn find(&self, user_id: UserId) -> Result<Option<User>>;

    async fn exists(&self, user_id: UserId) -> Result<bool> {
        Ok(self.find(user_id).await?.is_some())
    }
}

#[async_trait]
pub trait OrderDirectory: Send + Sync {
    async fn find(&self, order_id: OrderId) -> Result<Option<Order>>;

    async fn exists(&self, order_id: OrderId) -> Result<bool> {
        Ok(self.find(order_id).await?.is_some())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatewayOutcome {
    Approved,
    Declined,
}

/// External card processor. CPU-only: implementations must not block.
pub trait PaymentGateway: Send + Sync {
    fn outcome(&self) -> GatewayOutcome;
}

pub type TransactionStoreRef = Arc<dyn TransactionStore>;
pub type UserDirectoryRef = Arc<dyn UserDirectory>;
pub type OrderDirectoryRef = Arc<dyn OrderDirectory>;
pub type PaymentGatewayRef = Arc<dyn PaymentGateway>;
