use super::money::Amount;
use crate::error::{LedgerError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub type TransactionId = u64;
pub type UserId = u64;
pub type OrderId = u64;

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Hash, Clone, Copy, PartialOrd, Ord)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionType {
    Payment,
    Refund,
    WalletCharge,
    WalletWithdrawal,
}

impl TransactionType {
    pub const WALLET: [TransactionType; 2] =
        [TransactionType::WalletCharge, TransactionType::WalletWithdrawal];
    pub const ORDER: [TransactionType; 2] = [TransactionType::Payment, TransactionType::Refund];

    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Payment => "PAYMENT",
            TransactionType::Refund => "REFUND",
            TransactionType::WalletCharge => "WALLET_CHARGE",
            TransactionType::WalletWithdrawal => "WALLET_WITHDRAWAL",
        }
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Hash, Clone, Copy, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionStatus {
    #[default]
    Pending,
    Completed,
    Failed,
    Cancelled,
}

impl TransactionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Pending => "PENDING",
            TransactionStatus::Completed => "COMPLETED",
            TransactionStatus::Failed => "FAILED",
            TransactionStatus::Cancelled => "CANCELLED",
        }
    }

    /// Completed, failed and cancelled transactions never change again.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, TransactionStatus::Pending)
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Hash, Clone, Copy)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentMethod {
    Wallet,
    Card,
    CashOnDelivery,
    BankTransfer,
    AdminCredit,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Wallet => "WALLET",
            PaymentMethod::Card => "CARD",
            PaymentMethod::CashOnDelivery => "CASH_ON_DELIVERY",
            PaymentMethod::BankTransfer => "BANK_TRANSFER",
            PaymentMethod::AdminCredit => "ADMIN_CREDIT",
        }
    }
}

macro_rules! impl_str_conversions {
    ($ty:ty, $what:literal, [$($variant:path),+ $(,)?]) => {
        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $ty {
            type Err = LedgerError;

            fn from_str(s: &str) -> Result<Self> {
                let wanted = s.trim();
                if wanted.is_empty() {
                    return Err(LedgerError::InvalidArgument(format!("{} is required", $what)));
                }
                [$($variant),+]
                    .into_iter()
                    .find(|candidate| candidate.as_str().eq_ignore_ascii_case(wanted))
                    .ok_or_else(|| LedgerError::InvalidArgument(format!("Unknown {}: {}", $what, wanted)))
            }
        }
    };
}

impl_str_conversions!(
    TransactionType,
    "transaction type",
    [
        TransactionType::Payment,
        TransactionType::Refund,
        TransactionType::WalletCharge,
        TransactionType::WalletWithdrawal,
    ]
);

impl_str_conversions!(
    TransactionStatus,
    "transaction status",
    [
        TransactionStatus::Pending,
        TransactionStatus::Completed,
        TransactionStatus::Failed,
        TransactionStatus::Cancelled,
    ]
);

impl_str_conversions!(
    PaymentMethod,
    "payment method",
    [
        PaymentMethod::Wallet,
        PaymentMethod::Card,
        PaymentMethod::CashOnDelivery,
        PaymentMethod::BankTransfer,
        PaymentMethod::AdminCredit,
    ]
);

/// Everything the caller decides about a transaction before the store assigns
/// it an id. New transactions always start out `PENDING`.
#[derive(Debug, Clone, PartialEq)]
pub struct NewTransaction {
    pub user_id: UserId,
    pub order_id: Option<OrderId>,
    pub amount: Amount,
    pub kind: TransactionType,
    pub payment_method: PaymentMethod,
    pub description: String,
}

/// A single ledger entry.
///
/// `status`, `reference_id` and `description` are only ever changed through
/// the `mark_*` transitions and [`Transaction::append_note`], all of which
/// refuse to touch a terminal transaction.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct Transaction {
    pub id: TransactionId,
    pub user_id: UserId,
    pub order_id: Option<OrderId>,
    pub amount: Amount,
    #[serde(rename = "type")]
    pub kind: TransactionType,
    pub status: TransactionStatus,
    pub payment_method: PaymentMethod,
    pub reference_id: Option<String>,
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
    /// Optimistic concurrency token, bumped by the store on every update.
    pub version: u64,
}

impl Transaction {
    pub fn open(id: TransactionId, draft: NewTransaction, now: DateTime<Utc>) -> Self {
        Self {
            id,
            user_id: draft.user_id,
            order_id: draft.order_id,
            amount: draft.amount,
            kind: draft.kind,
            status: TransactionStatus::Pending,
            payment_method: draft.payment_method,
            reference_id: None,
            description: draft.description,
            created_at: now,
            updated_at: now,
            processed_at: None,
            version: 0,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    pub fn is_completed(&self) -> bool {
        self.status == TransactionStatus::Completed
    }

    pub fn mark_completed(&mut self, reference_id: impl Into<String>) -> Result<()> {
        self.finish(TransactionStatus::Completed)?;
        self.reference_id = Some(reference_id.into());
        Ok(())
    }

    pub fn mark_failed(&mut self, reason: &str) -> Result<()> {
        self.finish(TransactionStatus::Failed)?;
        self.push_description(&format!("Failed: {reason}"));
        Ok(())
    }

    pub fn mark_cancelled(&mut self, reason: &str) -> Result<()> {
        self.finish(TransactionStatus::Cancelled)?;
        self.push_description(&format!("Cancelled: {reason}"));
        Ok(())
    }

    /// Appends a processing note to a still-pending transaction.
    pub fn append_note(&mut self, note: &str) -> Result<()> {
        self.ensure_pending()?;
        self.push_description(note);
        self.updated_at = Utc::now();
        Ok(())
    }

    fn finish(&mut self, status: TransactionStatus) -> Result<()> {
        self.ensure_pending()?;
        let now = Utc::now();
        self.status = status;
        self.updated_at = now;
        self.processed_at = Some(now);
        Ok(())
    }

    fn ensure_pending(&self) -> Result<()> {
        if self.is_terminal() {
            return Err(LedgerError::PreconditionFailed(format!(
                "Transaction {} is already {}",
                self.id, self.status
            )));
        }
        Ok(())
    }

    fn push_description(&mut self, note: &str) {
        if self.description.is_empty() {
            self.description = note.to_string();
        } else {
            self.description = format!("{} | {}", self.description, note);
        }
    }
}
