use crate::domain::transaction::{
    OrderId, PaymentMethod, TransactionId, TransactionStatus, UserId,
};
use crate::error::{LedgerError, Result};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::io::Read;

#[derive(Debug, Deserialize, PartialEq, Clone, Copy)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    User,
    Order,
    Charge,
    Withdraw,
    AdminCredit,
    AdminDebit,
    Pay,
    Refund,
    Settle,
}

/// One raw CSV row: `op, user, order, tx, amount, method, reference, status, note`.
///
/// Which columns matter depends on `op`; trailing columns may be omitted.
#[derive(Debug, Deserialize, PartialEq, Clone)]
pub struct OperationRecord {
    pub op: OperationKind,
    #[serde(default)]
    pub user: Option<UserId>,
    #[serde(default)]
    pub order: Option<OrderId>,
    #[serde(default)]
    pub tx: Option<TransactionId>,
    #[serde(default)]
    pub amount: Option<Decimal>,
    #[serde(default)]
    pub method: Option<String>,
    #[serde(default)]
    pub reference: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub note: Option<String>,
}

/// A validated session step.
#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    RegisterUser {
        user_id: UserId,
        name: String,
    },
    RegisterOrder {
        order_id: OrderId,
        user_id: UserId,
        total: Decimal,
        status: String,
    },
    Charge {
        user_id: UserId,
        amount: Decimal,
        method: PaymentMethod,
        description: String,
    },
    Withdraw {
        user_id: UserId,
        amount: Decimal,
        bank_account: String,
        reason: String,
    },
    AdminCredit {
        user_id: UserId,
        amount: Decimal,
        reason: String,
    },
    AdminDebit {
        user_id: UserId,
        amount: Decimal,
        reason: String,
    },
    Pay {
        user_id: UserId,
        order_id: OrderId,
        method: PaymentMethod,
    },
    Refund {
        payment_id: TransactionId,
        reason: String,
    },
    Settle {
        transaction_id: TransactionId,
        status: TransactionStatus,
        reference_id: Option<String>,
        notes: Option<String>,
    },
}

fn required<T>(value: Option<T>, op: OperationKind, column: &str) -> Result<T> {
    value.ok_or_else(|| {
        LedgerError::InvalidArgument(format!("{op:?} operation requires the `{column}` column"))
    })
}

impl TryFrom<OperationRecord> for Operation {
    type Error = LedgerError;

    fn try_from(record: OperationRecord) -> Result<Self> {
        let op = record.op;
        let note = record.note.unwrap_or_default();
        Ok(match op {
            OperationKind::User => {
                let user_id = required(record.user, op, "user")?;
                let name = if note.is_empty() {
                    format!("user-{user_id}")
                } else {
                    note
                };
                Operation::RegisterUser { user_id, name }
            }
            OperationKind::Order => Operation::RegisterOrder {
                order_id: required(record.order, op, "order")?,
                user_id: required(record.user, op, "user")?,
                total: required(record.amount, op, "amount")?,
                status: record.status.unwrap_or_else(|| "PENDING".to_string()),
            },
            OperationKind::Charge => Operation::Charge {
                user_id: required(record.user, op, "user")?,
                amount: required(record.amount, op, "amount")?,
                method: required(record.method, op, "method")?.parse()?,
                description: note,
            },
            OperationKind::Withdraw => Operation::Withdraw {
                user_id: required(record.user, op, "user")?,
                amount: required(record.amount, op, "amount")?,
                bank_account: required(record.reference, op, "reference")?,
                reason: note,
            },
            OperationKind::AdminCredit => Operation::AdminCredit {
                user_id: required(record.user, op, "user")?,
                amount: required(record.amount, op, "amount")?,
                reason: note,
            },
            OperationKind::AdminDebit => Operation::AdminDebit {
                user_id: required(record.user, op, "user")?,
                amount: required(record.amount, op, "amount")?,
                reason: note,
            },
            OperationKind::Pay => Operation::Pay {
                user_id: required(record.user, op, "user")?,
                order_id: required(record.order, op, "order")?,
                method: required(record.method, op, "method")?.parse()?,
            },
            OperationKind::Refund => Operation::Refund {
                payment_id: required(record.tx, op, "tx")?,
                reason: note,
            },
            OperationKind::Settle => Operation::Settle {
                transaction_id: required(record.tx, op, "tx")?,
                status: required(record.status, op, "status")?.parse()?,
                reference_id: record.reference,
                notes: Some(note).filter(|n| !n.is_empty()),
            },
        })
    }
}

/// Reads session operations from a CSV source.
///
/// Wraps `csv::Reader` with whitespace trimming and flexible record lengths,
/// and yields one `Result<Operation>` per row so a bad row never stops the run.
pub struct OperationReader<R: Read> {
    reader: csv::Reader<R>,
}

impl<R: Read> OperationReader<R> {
    pub fn new(source: R) -> Self {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(source);
        Self { reader }
    }

    /// Lazily reads, deserializes and validates rows.
    pub fn operations(self) -> impl Iterator<Item = Result<Operation>> {
        self.reader
            .into_deserialize::<OperationRecord>()
            .map(|result| Operation::try_from(result.map_err(LedgerError::from)?))
    }
}
