use crate::application::ledger::Ledger;
use crate::config::LedgerConfig;
use crate::domain::ports::{Order, TransactionStoreRef, User};
use crate::domain::transaction::{Transaction, UserId};
use crate::error::Result;
use crate::infrastructure::in_memory::{InMemoryOrderDirectory, InMemoryUserDirectory};
use crate::interfaces::csv::operation_reader::Operation;
use crate::interfaces::csv::report_writer::UserReport;
use std::sync::Arc;

/// Replays CSV operations against a ledger.
///
/// Users and orders live in in-memory directories filled by `user` and
/// `order` rows; transactions go to whatever store the session was given.
pub struct Session {
    ledger: Ledger,
    users: InMemoryUserDirectory,
    orders: InMemoryOrderDirectory,
    admin_id: UserId,
}

impl Session {
    pub fn new(store: TransactionStoreRef, config: LedgerConfig, admin_id: UserId) -> Result<Self> {
        let users = InMemoryUserDirectory::new();
        let orders = InMemoryOrderDirectory::new();
        let ledger = Ledger::new(
            store,
            Arc::new(users.clone()),
            Arc::new(orders.clone()),
            config,
        )?;
        Ok(Self {
            ledger,
            users,
            orders,
            admin_id,
        })
    }

    /// Applies one operation. Registrations return `None`.
    pub async fn apply(&self, op: Operation) -> Result<Option<Transaction>> {
        let tx = match op {
            Operation::RegisterUser { user_id, name } => {
                self.users.register(User { id: user_id, name }).await;
                return Ok(None);
            }
            Operation::RegisterOrder {
                order_id,
                user_id,
                total,
                status,
            } => {
                self.orders
                    .register(Order {
                        id: order_id,
                        user_id,
                        total_amount: total,
                        status,
                    })
                    .await;
                return Ok(None);
            }
            Operation::Charge {
                user_id,
                amount,
                method,
                description,
            } => {
                self.ledger
                    .wallet
                    .charge(user_id, amount, method, &description)
                    .await?
            }
            Operation::Withdraw {
                user_id,
                amount,
                bank_account,
                reason,
            } => {
                self.ledger
                    .wallet
                    .withdraw(user_id, amount, &bank_account, &reason)
                    .await?
            }
            Operation::AdminCredit {
                user_id,
                amount,
                reason,
            } => {
                self.ledger
                    .wallet
                    .admin_credit(user_id, amount, &reason, self.admin_id)
                    .await?
            }
            Operation::AdminDebit {
                user_id,
                amount,
                reason,
            } => {
                self.ledger
                    .wallet
                    .admin_debit(user_id, amount, &reason, self.admin_id)
                    .await?
            }
            Operation::Pay {
                user_id,
                order_id,
                method,
            } => {
                self.ledger
                    .payments
                    .process_payment(user_id, order_id, method)
                    .await?
            }
            Operation::Refund { payment_id, reason } => {
                self.ledger
                    .payments
                    .process_refund(payment_id, &reason)
                    .await?
            }
            Operation::Settle {
                transaction_id,
                status,
                reference_id,
                notes,
            } => {
                self.ledger
                    .payments
                    .update_transaction_status(
                        transaction_id,
                        status,
                        reference_id.as_deref(),
                        notes.as_deref(),
                    )
                    .await?
            }
        };
        Ok(Some(tx))
    }

    /// One report line per registered user, ascending by id.
    pub async fn report(&self) -> Result<Vec<UserReport>> {
        let mut reports = Vec::new();
        for user_id in self.users.ids().await {
            let balance = self.ledger.wallet.balance(user_id).await?;
            let stats = self.ledger.queries.statistics(user_id).await?;
            reports.push(UserReport::new(user_id, balance, &stats));
        }
        Ok(reports)
    }
}
