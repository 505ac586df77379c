use super::locks::KeyedLocks;
use super::payments::PaymentService;
use super::reporting::TransactionQueries;
use super::wallet::WalletLedger;
use crate::config::LedgerConfig;
use crate::domain::ports::{OrderDirectoryRef, PaymentGatewayRef, TransactionStoreRef, UserDirectoryRef};
use crate::error::Result;
use crate::infrastructure::gateway::SimulatedGateway;
use std::sync::Arc;

/// The three services of the ledger wired over one store and one lock table.
///
/// All clones of the services share the same locks, which is what makes the
/// per-user and per-order serialization hold across them.
#[derive(Clone)]
pub struct Ledger {
    pub wallet: WalletLedger,
    pub payments: PaymentService,
    pub queries: TransactionQueries,
}

impl Ledger {
    /// Builds the ledger with simulated card gateways configured from `config`.
    pub fn new(
        store: TransactionStoreRef,
        users: UserDirectoryRef,
        orders: OrderDirectoryRef,
        config: LedgerConfig,
    ) -> Result<Self> {
        config.validate()?;
        let seed = config.gateway.seed;
        let charge_gateway = Arc::new(SimulatedGateway::new(
            config.gateway.card_charge_success_rate,
            seed,
        ));
        let payment_gateway = Arc::new(SimulatedGateway::new(
            config.gateway.card_payment_success_rate,
            seed.map(|s| s.wrapping_add(1)),
        ));
        Ok(Self::with_gateways(
            store,
            users,
            orders,
            config,
            charge_gateway,
            payment_gateway,
        ))
    }

    pub fn with_gateways(
        store: TransactionStoreRef,
        users: UserDirectoryRef,
        orders: OrderDirectoryRef,
        config: LedgerConfig,
        charge_gateway: PaymentGatewayRef,
        payment_gateway: PaymentGatewayRef,
    ) -> Self {
        let locks = Arc::new(KeyedLocks::new());
        let wallet = WalletLedger::new(
            store.clone(),
            users.clone(),
            charge_gateway,
            config.wallet.clone(),
            locks.clone(),
        );
        let payments = PaymentService::new(
            store.clone(),
            wallet.clone(),
            users,
            orders,
            payment_gateway,
            locks,
            config,
        );
        let queries = TransactionQueries::new(store);
        Self {
            wallet,
            payments,
            queries,
        }
    }
}
