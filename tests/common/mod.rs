#![allow(dead_code)]

use order_ledger::application::ledger::Ledger;
use order_ledger::config::LedgerConfig;
use order_ledger::domain::ports::{Order, User};
use order_ledger::infrastructure::gateway::FixedGateway;
use order_ledger::infrastructure::in_memory::{
    InMemoryOrderDirectory, InMemoryTransactionStore, InMemoryUserDirectory,
};
use rust_decimal::Decimal;
use std::fs::File;
use std::io::Error;
use std::path::Path;
use std::sync::Arc;

pub const HEADER: [&str; 9] = [
    "op", "user", "order", "tx", "amount", "method", "reference", "status", "note",
];

/// Writes a session where each of `users` users is registered and credited
/// `amount` once through an admin credit.
pub fn generate_session_csv(path: &Path, users: u64, amount: &str) -> Result<(), Error> {
    let file = File::create(path)?;
    let mut wtr = csv::WriterBuilder::new().flexible(true).from_writer(file);

    wtr.write_record(HEADER)?;

    for user in 1..=users {
        let id = user.to_string();
        wtr.write_record(["user", id.as_str()])?;
        wtr.write_record([
            "admin_credit",
            id.as_str(),
            "",
            "",
            amount,
            "",
            "",
            "",
            "seed",
        ])?;
    }

    wtr.flush()?;
    Ok(())
}

pub struct TestLedger {
    pub ledger: Ledger,
    pub users: InMemoryUserDirectory,
    pub orders: InMemoryOrderDirectory,
}

/// A ledger over in-memory stores whose card gateways always approve.
pub fn approving_ledger() -> TestLedger {
    let users = InMemoryUserDirectory::new();
    let orders = InMemoryOrderDirectory::new();
    let ledger = Ledger::with_gateways(
        Arc::new(InMemoryTransactionStore::new()),
        Arc::new(users.clone()),
        Arc::new(orders.clone()),
        LedgerConfig::default(),
        Arc::new(FixedGateway::approving()),
        Arc::new(FixedGateway::approving()),
    );
    TestLedger {
        ledger,
        users,
        orders,
    }
}

impl TestLedger {
    pub async fn user(&self, id: u64) {
        self.users
            .register(User {
                id,
                name: format!("user-{id}"),
            })
            .await;
    }

    pub async fn order(&self, id: u64, user_id: u64, total: Decimal) {
        self.orders
            .register(Order {
                id,
                user_id,
                total_amount: total,
                status: "PENDING".to_string(),
            })
            .await;
    }
}
