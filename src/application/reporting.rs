use super::finalize::ensure_id;
use crate::domain::filter::TransactionFilter;
use crate::domain::money::Balance;
use crate::domain::ports::TransactionStoreRef;
use crate::domain::transaction::{
    OrderId, Transaction, TransactionId, TransactionStatus, TransactionType, UserId,
};
use crate::error::{LedgerError, Result};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

/// Rollup over a set of transactions.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransactionStatistics {
    pub total: usize,
    pub completed: usize,
    pub pending: usize,
    pub failed: usize,
    pub cancelled: usize,
    /// Completed payments.
    pub total_spent: Decimal,
    /// Completed refunds.
    pub total_refunded: Decimal,
    pub net_spent: Decimal,
    /// `completed / total * 100`, rounded to two places; 0 when there is nothing.
    pub success_rate: Decimal,
}

impl TransactionStatistics {
    pub fn from_transactions(transactions: &[Transaction]) -> Self {
        let count = |status: TransactionStatus| {
            transactions
                .iter()
                .filter(|tx| tx.status == status)
                .count()
        };
        let completed_sum = |kind: TransactionType| -> Decimal {
            transactions
                .iter()
                .filter(|tx| tx.kind == kind && tx.is_completed())
                .map(|tx| tx.amount.value())
                .sum()
        };

        let total = transactions.len();
        let completed = count(TransactionStatus::Completed);
        let total_spent = completed_sum(TransactionType::Payment);
        let total_refunded = completed_sum(TransactionType::Refund);
        let success_rate = if total == 0 {
            Decimal::ZERO
        } else {
            (Decimal::from(completed) / Decimal::from(total) * Decimal::ONE_HUNDRED).round_dp(2)
        };

        Self {
            total,
            completed,
            pending: count(TransactionStatus::Pending),
            failed: count(TransactionStatus::Failed),
            cancelled: count(TransactionStatus::Cancelled),
            total_spent,
            total_refunded,
            net_spent: total_spent - total_refunded,
            success_rate,
        }
    }
}

/// Rollup over a user's wallet entries.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WalletStatistics {
    pub balance: Balance,
    pub total_charged: Decimal,
    pub total_withdrawn: Decimal,
    pub charges: usize,
    pub withdrawals: usize,
    pub pending: usize,
}

impl WalletStatistics {
    pub fn from_transactions(transactions: &[Transaction]) -> Self {
        let completed = |kind: TransactionType| {
            transactions
                .iter()
                .filter(move |tx| tx.kind == kind && tx.is_completed())
        };
        let total_charged: Decimal = completed(TransactionType::WalletCharge)
            .map(|tx| tx.amount.value())
            .sum();
        let total_withdrawn: Decimal = completed(TransactionType::WalletWithdrawal)
            .map(|tx| tx.amount.value())
            .sum();

        Self {
            balance: Balance::new(total_charged - total_withdrawn),
            total_charged,
            total_withdrawn,
            charges: completed(TransactionType::WalletCharge).count(),
            withdrawals: completed(TransactionType::WalletWithdrawal).count(),
            pending: transactions
                .iter()
                .filter(|tx| TransactionType::WALLET.contains(&tx.kind) && !tx.is_terminal())
                .count(),
        }
    }
}

/// Read side of the ledger. Never writes.
///
/// Lists come back newest first.
#[derive(Clone)]
pub struct TransactionQueries {
    store: TransactionStoreRef,
}

impl TransactionQueries {
    pub fn new(store: TransactionStoreRef) -> Self {
        Self { store }
    }

    pub async fn get_transaction(&self, id: TransactionId) -> Result<Transaction> {
        ensure_id(id, "Transaction")?;
        self.store
            .get(id)
            .await?
            .ok_or_else(|| LedgerError::NotFound(format!("Transaction {id} not found")))
    }

    pub async fn find_by_reference(&self, reference_id: &str) -> Result<Option<Transaction>> {
        if reference_id.trim().is_empty() {
            return Err(LedgerError::InvalidArgument(
                "Reference id is required".to_string(),
            ));
        }
        self.store.find_by_reference(reference_id.trim()).await
    }

    pub async fn transaction_exists(&self, id: TransactionId) -> Result<bool> {
        self.store.exists(id).await
    }

    pub async fn user_history(&self, user_id: UserId) -> Result<Vec<Transaction>> {
        ensure_id(user_id, "User")?;
        self.fetch(TransactionFilter::new().user(user_id)).await
    }

    pub async fn order_history(&self, order_id: OrderId) -> Result<Vec<Transaction>> {
        ensure_id(order_id, "Order")?;
        self.fetch(TransactionFilter::new().order(order_id)).await
    }

    pub async fn by_status(&self, status: TransactionStatus) -> Result<Vec<Transaction>> {
        self.fetch(TransactionFilter::new().status(status)).await
    }

    pub async fn by_type(&self, kind: TransactionType) -> Result<Vec<Transaction>> {
        self.fetch(TransactionFilter::new().kind(kind)).await
    }

    pub async fn user_transactions_by_status(
        &self,
        user_id: UserId,
        status: TransactionStatus,
    ) -> Result<Vec<Transaction>> {
        ensure_id(user_id, "User")?;
        self.fetch(TransactionFilter::new().user(user_id).status(status))
            .await
    }

    pub async fn user_transactions_by_type(
        &self,
        user_id: UserId,
        kind: TransactionType,
    ) -> Result<Vec<Transaction>> {
        ensure_id(user_id, "User")?;
        self.fetch(TransactionFilter::new().user(user_id).kind(kind))
            .await
    }

    /// Transactions created in `[from, until)`.
    pub async fn by_date_range(
        &self,
        from: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<Vec<Transaction>> {
        ensure_range(from, until)?;
        self.fetch(TransactionFilter::new().created_between(from, until))
            .await
    }

    pub async fn user_transactions_by_date_range(
        &self,
        user_id: UserId,
        from: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<Vec<Transaction>> {
        ensure_id(user_id, "User")?;
        ensure_range(from, until)?;
        self.fetch(
            TransactionFilter::new()
                .user(user_id)
                .created_between(from, until),
        )
        .await
    }

    pub async fn wallet_transactions(&self, user_id: UserId) -> Result<Vec<Transaction>> {
        ensure_id(user_id, "User")?;
        self.fetch(
            TransactionFilter::new()
                .user(user_id)
                .kinds(&TransactionType::WALLET),
        )
        .await
    }

    pub async fn payment_transactions(&self, user_id: UserId) -> Result<Vec<Transaction>> {
        ensure_id(user_id, "User")?;
        self.fetch(
            TransactionFilter::new()
                .user(user_id)
                .kinds(&TransactionType::ORDER),
        )
        .await
    }

    pub async fn statistics(&self, user_id: UserId) -> Result<TransactionStatistics> {
        let history = self.user_history(user_id).await?;
        Ok(TransactionStatistics::from_transactions(&history))
    }

    pub async fn wallet_statistics(&self, user_id: UserId) -> Result<WalletStatistics> {
        let history = self.wallet_transactions(user_id).await?;
        Ok(WalletStatistics::from_transactions(&history))
    }

    async fn fetch(&self, filter: TransactionFilter) -> Result<Vec<Transaction>> {
        let mut transactions = self.store.query(&filter).await?;
        transactions.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(transactions)
    }
}

fn ensure_range(from: DateTime<Utc>, until: DateTime<Utc>) -> Result<()> {
    if from > until {
        return Err(LedgerError::InvalidArgument(format!(
            "Date range start {from} is after end {until}"
        )));
    }
    Ok(())
}
