use super::transaction::{OrderId, Transaction, TransactionStatus, TransactionType, UserId};
use chrono::{DateTime, Utc};

/// Conjunctive selection over the ledger.
///
/// Every field left unset matches everything. The creation-time window is
/// half-open: `created_from <= created_at < created_until`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransactionFilter {
    pub user_id: Option<UserId>,
    pub order_id: Option<OrderId>,
    pub status: Option<TransactionStatus>,
    pub kinds: Option<Vec<TransactionType>>,
    pub created_from: Option<DateTime<Utc>>,
    pub created_until: Option<DateTime<Utc>>,
}

impl TransactionFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn user(mut self, user_id: UserId) -> Self {
        self.user_id = Some(user_id);
        self
    }

    pub fn order(mut self, order_id: OrderId) -> Self {
        self.order_id = Some(order_id);
        self
    }

    pub fn status(mut self, status: TransactionStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn kind(self, kind: TransactionType) -> Self {
        self.kinds(&[kind])
    }

    pub fn kinds(mut self, kinds: &[TransactionType]) -> Self {
        self.kinds = Some(kinds.to_vec());
        self
    }

    pub fn created_between(mut self, from: DateTime<Utc>, until: DateTime<Utc>) -> Self {
        self.created_from = Some(from);
        self.created_until = Some(until);
        self
    }

    pub fn matches(&self, tx: &Transaction) -> bool {
        self.user_id.is_none_or(|user| tx.user_id == user)
            && self.order_id.is_none_or(|order| tx.order_id == Some(order))
            && self.status.is_none_or(|status| tx.status == status)
            && self
                .kinds
                .as_ref()
                .is_none_or(|kinds| kinds.contains(&tx.kind))
            && self.created_from.is_none_or(|from| tx.created_at >= from)
            && self.created_until.is_none_or(|until| tx.created_at < until)
    }
}
