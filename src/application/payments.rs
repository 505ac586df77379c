use super::finalize::{self, ensure_id, synthetic_reference};
use super::locks::{KeyedLocks, LockKey};
use super::wallet::WalletLedger;
use crate::config::LedgerConfig;
use crate::domain::filter::TransactionFilter;
use crate::domain::money::Amount;
use crate::domain::ports::{
    GatewayOutcome, OrderDirectoryRef, PaymentGatewayRef, TransactionStoreRef, UserDirectoryRef,
};
use crate::domain::transaction::{
    NewTransaction, OrderId, PaymentMethod, Transaction, TransactionId, TransactionStatus,
    TransactionType, UserId,
};
use crate::error::{LedgerError, Result};
use std::sync::Arc;

/// Coordinates order payments and refunds across the ledger, the wallet and
/// the user/order directories.
///
/// Every call runs validate → create `PENDING` → dispatch → finalize while
/// holding the locks of the order and of its owner. A dispatch error always
/// leaves the transaction `FAILED` before it is returned.
#[derive(Clone)]
pub struct PaymentService {
    store: TransactionStoreRef,
    wallet: WalletLedger,
    users: UserDirectoryRef,
    orders: OrderDirectoryRef,
    gateway: PaymentGatewayRef,
    locks: Arc<KeyedLocks>,
    config: LedgerConfig,
}

impl PaymentService {
    pub fn new(
        store: TransactionStoreRef,
        wallet: WalletLedger,
        users: UserDirectoryRef,
        orders: OrderDirectoryRef,
        gateway: PaymentGatewayRef,
        locks: Arc<KeyedLocks>,
        config: LedgerConfig,
    ) -> Self {
        Self {
            store,
            wallet,
            users,
            orders,
            gateway,
            locks,
            config,
        }
    }

    pub async fn process_payment(
        &self,
        user_id: UserId,
        order_id: OrderId,
        method: PaymentMethod,
    ) -> Result<Transaction> {
        ensure_id(user_id, "User")?;
        ensure_id(order_id, "Order")?;
        match method {
            PaymentMethod::Wallet | PaymentMethod::Card | PaymentMethod::CashOnDelivery => {}
            PaymentMethod::BankTransfer | PaymentMethod::AdminCredit => {
                return Err(LedgerError::InvalidArgument(format!(
                    "{method} is not accepted for order payments"
                )));
            }
        }
        if !self.users.exists(user_id).await? {
            return Err(LedgerError::NotFound(format!("User {user_id} not found")));
        }
        let order = self
            .orders
            .find(order_id)
            .await?
            .ok_or_else(|| LedgerError::NotFound(format!("Order {order_id} not found")))?;
        if order.user_id != user_id {
            return Err(LedgerError::PreconditionFailed(format!(
                "Order {order_id} does not belong to user {user_id}"
            )));
        }
        if !self.config.is_payable(&order.status) {
            return Err(LedgerError::PreconditionFailed(format!(
                "Order {order_id} is not payable in status {}",
                order.status
            )));
        }
        let amount = Amount::new(order.total_amount).map_err(|_| {
            LedgerError::PreconditionFailed(format!(
                "Order {order_id} has a non-positive total of {}",
                order.total_amount
            ))
        })?;

        let _held = self
            .locks
            .acquire(&[LockKey::Order(order_id), LockKey::User(user_id)])
            .await;
        self.ensure_not_paid(order_id).await?;
        if method == PaymentMethod::Wallet {
            self.wallet.ensure_covered(user_id, amount).await?;
        }

        let payment = self
            .store
            .insert(NewTransaction {
                user_id,
                order_id: Some(order_id),
                amount,
                kind: TransactionType::Payment,
                payment_method: method,
                description: format!("Payment for order #{order_id}"),
            })
            .await?;
        tracing::info!(
            transaction_id = payment.id,
            user_id,
            order_id,
            %amount,
            %method,
            "payment created"
        );

        let id = payment.id;
        match self.dispatch_payment(payment, method).await {
            Ok(tx) => Ok(tx),
            Err(err) => Err(finalize::fail(&*self.store, id, err).await),
        }
    }

    async fn dispatch_payment(
        &self,
        mut payment: Transaction,
        method: PaymentMethod,
    ) -> Result<Transaction> {
        match method {
            PaymentMethod::Wallet => {
                let order_reference = format!("order #{}", payment.order_id.unwrap_or_default());
                let debit = self
                    .wallet
                    .debit_for_payment(payment.user_id, payment.amount, &order_reference)
                    .await?;
                let reference = format!("WALLET-{}", debit.id);
                match finalize::complete(&*self.store, payment, reference).await {
                    Ok(tx) => Ok(tx),
                    Err(err) => Err(self.wallet.reverse(&debit, err).await),
                }
            }
            PaymentMethod::Card => match self.gateway.outcome() {
                GatewayOutcome::Approved => {
                    finalize::complete(&*self.store, payment, synthetic_reference("CARD")).await
                }
                GatewayOutcome::Declined => Err(LedgerError::ProcessingFailure(
                    "Card payment declined by gateway".to_string(),
                )),
            },
            PaymentMethod::CashOnDelivery => {
                payment.append_note("Cash on delivery: payment pending until delivery")?;
                let payment = self.store.update(&payment).await?;
                tracing::info!(transaction_id = payment.id, "payment awaiting cash on delivery");
                Ok(payment)
            }
            PaymentMethod::BankTransfer | PaymentMethod::AdminCredit => Err(
                LedgerError::ProcessingFailure(format!("Unsupported payment method {method}")),
            ),
        }
    }

    /// Refunds a completed payment in full, back through the method it was
    /// paid with.
    pub async fn process_refund(&self, payment_id: TransactionId, reason: &str) -> Result<Transaction> {
        ensure_id(payment_id, "Payment")?;
        let payment = self.load(payment_id).await?;
        if payment.kind != TransactionType::Payment {
            return Err(LedgerError::PreconditionFailed(format!(
                "Transaction {payment_id} is a {}, not a payment",
                payment.kind
            )));
        }
        let order_id = payment.order_id.ok_or_else(|| {
            LedgerError::PreconditionFailed(format!("Payment {payment_id} has no order"))
        })?;

        let _held = self
            .locks
            .acquire(&[LockKey::Order(order_id), LockKey::User(payment.user_id)])
            .await;
        let payment = self.load(payment_id).await?;
        if payment.status != TransactionStatus::Completed {
            return Err(LedgerError::PreconditionFailed(format!(
                "Only completed payments can be refunded; payment {payment_id} is {}",
                payment.status
            )));
        }
        self.ensure_not_refunded(order_id).await?;

        let reason = match reason.trim() {
            "" => "no reason given",
            trimmed => trimmed,
        };
        let refund = self
            .store
            .insert(NewTransaction {
                user_id: payment.user_id,
                order_id: Some(order_id),
                amount: payment.amount,
                kind: TransactionType::Refund,
                payment_method: payment.payment_method,
                description: format!("Refund for payment #{payment_id}: {reason}"),
            })
            .await?;
        tracing::info!(
            transaction_id = refund.id,
            payment_id,
            order_id,
            amount = %refund.amount,
            "refund created"
        );

        let id = refund.id;
        match self.dispatch_refund(refund, &payment).await {
            Ok(tx) => Ok(tx),
            Err(err) => Err(finalize::fail(&*self.store, id, err).await),
        }
    }

    async fn dispatch_refund(
        &self,
        mut refund: Transaction,
        payment: &Transaction,
    ) -> Result<Transaction> {
        match payment.payment_method {
            PaymentMethod::Wallet => {
                let note = format!(
                    "order #{} (refund #{})",
                    refund.order_id.unwrap_or_default(),
                    refund.id
                );
                let credit = self
                    .wallet
                    .credit_refund(refund.user_id, refund.amount, &note)
                    .await?;
                let reference = format!("WALLET-{}", credit.id);
                match finalize::complete(&*self.store, refund, reference).await {
                    Ok(tx) => Ok(tx),
                    Err(err) => Err(self.wallet.reverse(&credit, err).await),
                }
            }
            PaymentMethod::Card => {
                finalize::complete(&*self.store, refund, synthetic_reference("CARD-REFUND")).await
            }
            PaymentMethod::CashOnDelivery => {
                refund.append_note("Manual cash refund required")?;
                finalize::complete(&*self.store, refund, synthetic_reference("COD-REFUND")).await
            }
            PaymentMethod::BankTransfer | PaymentMethod::AdminCredit => {
                Err(LedgerError::ProcessingFailure(format!(
                    "Cannot refund a payment made with {}",
                    payment.payment_method
                )))
            }
        }
    }

    /// Settlement callback for external notifications, e.g. a confirmed bank
    /// transfer or a delivered cash order.
    ///
    /// Goes through the same terminal-guarded transitions as every other
    /// path. Completing re-checks the invariant the transaction would affect.
    pub async fn update_transaction_status(
        &self,
        transaction_id: TransactionId,
        status: TransactionStatus,
        reference_id: Option<&str>,
        notes: Option<&str>,
    ) -> Result<Transaction> {
        ensure_id(transaction_id, "Transaction")?;
        if status == TransactionStatus::Pending {
            return Err(LedgerError::InvalidArgument(
                "A transaction cannot be moved back to PENDING".to_string(),
            ));
        }
        let current = self.load(transaction_id).await?;
        let mut keys = vec![LockKey::User(current.user_id)];
        if let Some(order_id) = current.order_id {
            keys.push(LockKey::Order(order_id));
        }

        let _held = self.locks.acquire(&keys).await;
        let mut tx = self.load(transaction_id).await?;
        if tx.is_terminal() {
            return Err(LedgerError::PreconditionFailed(format!(
                "Transaction {transaction_id} is already {}",
                tx.status
            )));
        }
        let notes = notes.map(str::trim).filter(|n| !n.is_empty());

        match status {
            TransactionStatus::Completed => {
                self.ensure_completable(&tx).await?;
                if let Some(notes) = notes {
                    tx.append_note(notes)?;
                }
                let reference = reference_id
                    .map(str::trim)
                    .filter(|r| !r.is_empty())
                    .map(str::to_string)
                    .unwrap_or_else(|| synthetic_reference("MANUAL"));
                finalize::complete(&*self.store, tx, reference).await
            }
            TransactionStatus::Failed => {
                tx.mark_failed(notes.unwrap_or("Reported failed by settlement callback"))?;
                let tx = self.store.update(&tx).await?;
                tracing::warn!(transaction_id, "transaction failed by settlement callback");
                Ok(tx)
            }
            TransactionStatus::Cancelled => {
                tx.mark_cancelled(notes.unwrap_or("Cancelled by settlement callback"))?;
                let tx = self.store.update(&tx).await?;
                tracing::info!(transaction_id, "transaction cancelled by settlement callback");
                Ok(tx)
            }
            TransactionStatus::Pending => Err(LedgerError::InvalidArgument(
                "A transaction cannot be moved back to PENDING".to_string(),
            )),
        }
    }

    async fn ensure_completable(&self, tx: &Transaction) -> Result<()> {
        match (tx.kind, tx.order_id) {
            (TransactionType::WalletWithdrawal, _) => {
                self.wallet.ensure_covered(tx.user_id, tx.amount).await?;
                self.wallet
                    .ensure_within_daily_limit(tx.user_id, tx.kind, tx.amount)
                    .await
            }
            (TransactionType::Payment, Some(order_id)) => self.ensure_not_paid(order_id).await,
            (TransactionType::Refund, Some(order_id)) => {
                if !self.has_completed(order_id, TransactionType::Payment).await? {
                    return Err(LedgerError::PreconditionFailed(format!(
                        "Order {order_id} has no completed payment to refund"
                    )));
                }
                self.ensure_not_refunded(order_id).await
            }
            (TransactionType::Payment | TransactionType::Refund, None) => Err(
                LedgerError::PreconditionFailed(format!("Transaction {} has no order", tx.id)),
            ),
            (TransactionType::WalletCharge, _) => {
                self.wallet
                    .ensure_within_daily_limit(tx.user_id, tx.kind, tx.amount)
                    .await
            }
        }
    }

    async fn load(&self, id: TransactionId) -> Result<Transaction> {
        self.store
            .get(id)
            .await?
            .ok_or_else(|| LedgerError::NotFound(format!("Transaction {id} not found")))
    }

    async fn has_completed(&self, order_id: OrderId, kind: TransactionType) -> Result<bool> {
        let filter = TransactionFilter::new()
            .order(order_id)
            .kind(kind)
            .status(TransactionStatus::Completed);
        Ok(!self.store.query(&filter).await?.is_empty())
    }

    async fn ensure_not_paid(&self, order_id: OrderId) -> Result<()> {
        if self.has_completed(order_id, TransactionType::Payment).await? {
            return Err(LedgerError::PreconditionFailed(format!(
                "Order {order_id} has already been paid"
            )));
        }
        Ok(())
    }

    async fn ensure_not_refunded(&self, order_id: OrderId) -> Result<()> {
        if self.has_completed(order_id, TransactionType::Refund).await? {
            return Err(LedgerError::PreconditionFailed(format!(
                "Order {order_id} has already been refunded"
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::test_support::Harness;
    use crate::domain::money::Balance;
    use crate::domain::ports::TransactionStore;
    use crate::infrastructure::gateway::FixedGateway;
    use crate::infrastructure::in_memory::InMemoryTransactionStore;
    use async_trait::async_trait;
    use rust_decimal_macros::dec;
    use std::sync::atomic::{AtomicBool, Ordering};

    async fn funded(amount: rust_decimal::Decimal) -> Harness {
        let h = Harness::new().await;
        h.ledger
            .wallet
            .charge(1, amount, PaymentMethod::AdminCredit, "")
            .await
            .unwrap();
        h.order(5, 1, dec!(600), "PENDING").await;
        h
    }

    #[tokio::test]
    async fn test_wallet_payment_and_refund_scenario() {
        let h = Harness::new().await;
        let wallet = &h.ledger.wallet;
        let payments = &h.ledger.payments;
        assert_eq!(wallet.balance(1).await.unwrap(), Balance::ZERO);

        wallet
            .charge(1, dec!(1000), PaymentMethod::AdminCredit, "")
            .await
            .unwrap();
        assert_eq!(wallet.balance(1).await.unwrap(), Balance::new(dec!(1000)));

        h.order(5, 1, dec!(600), "PENDING").await;
        let payment = payments
            .process_payment(1, 5, PaymentMethod::Wallet)
            .await
            .unwrap();
        assert_eq!(payment.status, TransactionStatus::Completed);
        assert_eq!(payment.amount.value(), dec!(600));
        assert!(payment.reference_id.as_deref().unwrap().starts_with("WALLET-"));
        assert_eq!(wallet.balance(1).await.unwrap(), Balance::new(dec!(400)));

        let refund = payments
            .process_refund(payment.id, "customer request")
            .await
            .unwrap();
        assert_eq!(refund.status, TransactionStatus::Completed);
        assert_eq!(refund.kind, TransactionType::Refund);
        assert_eq!(refund.amount, payment.amount);
        assert_eq!(refund.order_id, Some(5));
        assert_eq!(wallet.balance(1).await.unwrap(), Balance::new(dec!(1000)));

        let again = payments.process_refund(payment.id, "customer request").await;
        match again {
            Err(LedgerError::PreconditionFailed(msg)) => assert!(msg.contains("already been refunded")),
            other => panic!("expected PreconditionFailed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_cash_on_delivery_stays_pending() {
        let h = funded(dec!(1000)).await;
        let payment = h
            .ledger
            .payments
            .process_payment(1, 5, PaymentMethod::CashOnDelivery)
            .await
            .unwrap();
        assert_eq!(payment.status, TransactionStatus::Pending);
        assert!(payment.description.contains("pending until delivery"));
        assert_eq!(payment.reference_id, None);
        assert_eq!(h.ledger.wallet.balance(1).await.unwrap(), Balance::new(dec!(1000)));
    }

    #[tokio::test]
    async fn test_second_payment_for_order_is_rejected() {
        let h = funded(dec!(2000)).await;
        let payments = &h.ledger.payments;
        payments.process_payment(1, 5, PaymentMethod::Card).await.unwrap();
        let second = payments.process_payment(1, 5, PaymentMethod::Wallet).await;
        assert!(matches!(second, Err(LedgerError::PreconditionFailed(_))));
        assert_eq!(h.ledger.wallet.balance(1).await.unwrap(), Balance::new(dec!(2000)));
    }

    #[tokio::test]
    async fn test_payment_validation_happens_before_any_write() {
        let h = funded(dec!(100)).await;
        h.user(2).await;
        h.order(6, 1, dec!(50), "DELIVERED").await;
        let payments = &h.ledger.payments;
        let before = h.store.query(&TransactionFilter::new()).await.unwrap().len();

        assert!(matches!(
            payments.process_payment(0, 5, PaymentMethod::Card).await,
            Err(LedgerError::InvalidArgument(_))
        ));
        assert!(matches!(
            payments.process_payment(1, 5, PaymentMethod::BankTransfer).await,
            Err(LedgerError::InvalidArgument(_))
        ));
        assert!(matches!(
            payments.process_payment(9, 5, PaymentMethod::Card).await,
            Err(LedgerError::NotFound(_))
        ));
        assert!(matches!(
            payments.process_payment(1, 99, PaymentMethod::Card).await,
            Err(LedgerError::NotFound(_))
        ));
        assert!(matches!(
            payments.process_payment(2, 5, PaymentMethod::Card).await,
            Err(LedgerError::PreconditionFailed(_))
        ));
        assert!(matches!(
            payments.process_payment(1, 6, PaymentMethod::Card).await,
            Err(LedgerError::PreconditionFailed(_))
        ));
        // Order total 600 against a balance of 100.
        assert!(matches!(
            payments.process_payment(1, 5, PaymentMethod::Wallet).await,
            Err(LedgerError::PreconditionFailed(_))
        ));

        let after = h.store.query(&TransactionFilter::new()).await.unwrap().len();
        assert_eq!(before, after);
    }

    #[tokio::test]
    async fn test_declined_card_payment_is_failed_and_order_stays_payable() {
        let h = Harness::with_gateways(FixedGateway::approving(), FixedGateway::declining()).await;
        h.order(5, 1, dec!(600), "PENDING").await;
        let result = h.ledger.payments.process_payment(1, 5, PaymentMethod::Card).await;
        assert!(matches!(result, Err(LedgerError::ProcessingFailure(_))));

        let history = h
            .store
            .query(&TransactionFilter::new().order(5))
            .await
            .unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].status, TransactionStatus::Failed);
        assert!(history[0].description.contains("declined"));

        // A failed attempt does not count as paid.
        let cod = h
            .ledger
            .payments
            .process_payment(1, 5, PaymentMethod::CashOnDelivery)
            .await;
        assert!(cod.is_ok());
    }

    #[tokio::test]
    async fn test_refund_requires_completed_payment() {
        let h = funded(dec!(1000)).await;
        let payments = &h.ledger.payments;
        let cod = payments
            .process_payment(1, 5, PaymentMethod::CashOnDelivery)
            .await
            .unwrap();
        assert!(matches!(
            payments.process_refund(cod.id, "").await,
            Err(LedgerError::PreconditionFailed(_))
        ));
        assert!(matches!(
            payments.process_refund(1, "").await,
            Err(LedgerError::PreconditionFailed(_))
        ));
        assert!(matches!(
            payments.process_refund(404, "").await,
            Err(LedgerError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_card_and_cash_refunds() {
        let h = funded(dec!(0.01)).await;
        h.order(6, 1, dec!(80), "PENDING").await;
        let payments = &h.ledger.payments;

        let card = payments.process_payment(1, 5, PaymentMethod::Card).await.unwrap();
        let card_refund = payments.process_refund(card.id, "cold food").await.unwrap();
        assert!(card_refund.reference_id.unwrap().starts_with("CARD-REFUND-"));

        let cod = payments
            .process_payment(1, 6, PaymentMethod::CashOnDelivery)
            .await
            .unwrap();
        payments
            .update_transaction_status(cod.id, TransactionStatus::Completed, Some("DRIVER-7"), None)
            .await
            .unwrap();
        let cod_refund = payments.process_refund(cod.id, "").await.unwrap();
        assert_eq!(cod_refund.status, TransactionStatus::Completed);
        assert!(cod_refund.description.contains("Manual cash refund required"));

        // Neither touches the wallet.
        assert_eq!(h.ledger.wallet.balance(1).await.unwrap(), Balance::new(dec!(0.01)));
    }

    #[tokio::test]
    async fn test_status_update_is_terminal_guarded() {
        let h = funded(dec!(100)).await;
        let payments = &h.ledger.payments;
        let charge = h
            .ledger
            .wallet
            .charge_with_bank_transfer(1, dec!(250), "")
            .await
            .unwrap();

        assert!(matches!(
            payments
                .update_transaction_status(charge.id, TransactionStatus::Pending, None, None)
                .await,
            Err(LedgerError::InvalidArgument(_))
        ));

        let confirmed = payments
            .update_transaction_status(charge.id, TransactionStatus::Completed, Some("BANK-991"), Some("confirmed"))
            .await
            .unwrap();
        assert_eq!(confirmed.reference_id.as_deref(), Some("BANK-991"));
        assert_eq!(h.ledger.wallet.balance(1).await.unwrap(), Balance::new(dec!(350)));

        for status in [TransactionStatus::Failed, TransactionStatus::Cancelled, TransactionStatus::Completed] {
            let result = payments
                .update_transaction_status(charge.id, status, Some("BANK-992"), None)
                .await;
            assert!(matches!(result, Err(LedgerError::PreconditionFailed(_))));
        }
        let stored = h.store.get(charge.id).await.unwrap().unwrap();
        assert_eq!(stored.status, TransactionStatus::Completed);
        assert_eq!(stored.reference_id.as_deref(), Some("BANK-991"));
    }

    #[tokio::test]
    async fn test_settling_withdrawal_rechecks_balance() {
        let h = funded(dec!(100)).await;
        let wallet = &h.ledger.wallet;
        let first = wallet.withdraw(1, dec!(80), "NL91ABNA0417164300", "").await.unwrap();
        let second = wallet.withdraw(1, dec!(80), "NL91ABNA0417164300", "").await.unwrap();

        let payments = &h.ledger.payments;
        payments
            .update_transaction_status(first.id, TransactionStatus::Completed, None, None)
            .await
            .unwrap();
        assert!(matches!(
            payments
                .update_transaction_status(second.id, TransactionStatus::Completed, None, None)
                .await,
            Err(LedgerError::PreconditionFailed(_))
        ));
        let cancelled = payments
            .update_transaction_status(second.id, TransactionStatus::Cancelled, None, Some("insufficient funds"))
            .await
            .unwrap();
        assert_eq!(cancelled.status, TransactionStatus::Cancelled);
        assert_eq!(wallet.balance(1).await.unwrap(), Balance::new(dec!(20)));
    }

    #[tokio::test]
    async fn test_settling_second_cod_payment_is_rejected() {
        let h = funded(dec!(1000)).await;
        let payments = &h.ledger.payments;
        let first = payments
            .process_payment(1, 5, PaymentMethod::CashOnDelivery)
            .await
            .unwrap();
        let second = payments
            .process_payment(1, 5, PaymentMethod::CashOnDelivery)
            .await
            .unwrap();

        payments
            .update_transaction_status(first.id, TransactionStatus::Completed, None, None)
            .await
            .unwrap();
        assert!(matches!(
            payments
                .update_transaction_status(second.id, TransactionStatus::Completed, None, None)
                .await,
            Err(LedgerError::PreconditionFailed(_))
        ));
    }

    /// Fails the first attempt to complete a transaction of `kind`.
    struct FailingCompletion {
        inner: InMemoryTransactionStore,
        kind: TransactionType,
        tripped: AtomicBool,
    }

    impl FailingCompletion {
        fn layer(kind: TransactionType) -> impl FnOnce(InMemoryTransactionStore) -> TransactionStoreRef {
            move |inner| -> TransactionStoreRef {
                Arc::new(Self {
                    inner,
                    kind,
                    tripped: AtomicBool::new(false),
                })
            }
        }
    }

    #[async_trait]
    impl TransactionStore for FailingCompletion {
        async fn insert(&self, draft: NewTransaction) -> Result<Transaction> {
            self.inner.insert(draft).await
        }

        async fn update(&self, tx: &Transaction) -> Result<Transaction> {
            if tx.kind == self.kind
                && tx.status == TransactionStatus::Completed
                && !self.tripped.swap(true, Ordering::SeqCst)
            {
                return Err(LedgerError::Storage("disk hiccup".to_string()));
            }
            self.inner.update(tx).await
        }

        async fn get(&self, id: TransactionId) -> Result<Option<Transaction>> {
            self.inner.get(id).await
        }

        async fn find_by_reference(&self, reference_id: &str) -> Result<Option<Transaction>> {
            self.inner.find_by_reference(reference_id).await
        }

        async fn exists(&self, id: TransactionId) -> Result<bool> {
            self.inner.exists(id).await
        }

        async fn query(&self, filter: &TransactionFilter) -> Result<Vec<Transaction>> {
            self.inner.query(filter).await
        }

        async fn delete(&self, id: TransactionId) -> Result<bool> {
            self.inner.delete(id).await
        }

        async fn delete_all(&self) -> Result<()> {
            self.inner.delete_all().await
        }
    }

    async fn with_store_failing(kind: TransactionType) -> Harness {
        let h = Harness::with_store(FailingCompletion::layer(kind)).await;
        h.ledger
            .wallet
            .charge(1, dec!(1000), PaymentMethod::AdminCredit, "")
            .await
            .unwrap();
        h.order(5, 1, dec!(600), "PENDING").await;
        h
    }

    async fn order_entries(h: &Harness, kind: TransactionType) -> Vec<Transaction> {
        h.ledger
            .queries
            .order_history(5)
            .await
            .unwrap()
            .into_iter()
            .filter(|tx| tx.kind == kind)
            .collect()
    }

    #[tokio::test]
    async fn test_failed_refund_completion_reverses_wallet_credit() {
        let h = with_store_failing(TransactionType::Refund).await;
        let wallet = &h.ledger.wallet;
        let payments = &h.ledger.payments;
        let payment = payments
            .process_payment(1, 5, PaymentMethod::Wallet)
            .await
            .unwrap();
        assert_eq!(wallet.balance(1).await.unwrap(), Balance::new(dec!(400)));

        let err = payments.process_refund(payment.id, "customer request").await;
        assert!(matches!(err, Err(LedgerError::Storage(_))));
        assert_eq!(wallet.balance(1).await.unwrap(), Balance::new(dec!(400)));
        let refunds = order_entries(&h, TransactionType::Refund).await;
        assert_eq!(refunds.len(), 1);
        assert_eq!(refunds[0].status, TransactionStatus::Failed);

        let retry = payments
            .process_refund(payment.id, "customer request")
            .await
            .unwrap();
        assert_eq!(retry.status, TransactionStatus::Completed);
        assert_eq!(wallet.balance(1).await.unwrap(), Balance::new(dec!(1000)));
        assert!(matches!(
            payments.process_refund(payment.id, "customer request").await,
            Err(LedgerError::PreconditionFailed(_))
        ));
        assert_eq!(wallet.balance(1).await.unwrap(), Balance::new(dec!(1000)));
    }

    #[tokio::test]
    async fn test_failed_payment_completion_reverses_wallet_debit() {
        let h = with_store_failing(TransactionType::Payment).await;
        let wallet = &h.ledger.wallet;
        let payments = &h.ledger.payments;

        let err = payments.process_payment(1, 5, PaymentMethod::Wallet).await;
        assert!(matches!(err, Err(LedgerError::Storage(_))));
        assert_eq!(wallet.balance(1).await.unwrap(), Balance::new(dec!(1000)));
        let attempts = order_entries(&h, TransactionType::Payment).await;
        assert_eq!(attempts.len(), 1);
        assert_eq!(attempts[0].status, TransactionStatus::Failed);

        let retry = payments
            .process_payment(1, 5, PaymentMethod::Wallet)
            .await
            .unwrap();
        assert_eq!(retry.status, TransactionStatus::Completed);
        assert_eq!(wallet.balance(1).await.unwrap(), Balance::new(dec!(400)));
    }

    #[tokio::test]
    async fn test_settling_withdrawals_respects_daily_limit() {
        let h = Harness::new().await;
        let wallet = &h.ledger.wallet;
        let payments = &h.ledger.payments;
        for _ in 0..3 {
            wallet
                .charge(1, dec!(10000), PaymentMethod::AdminCredit, "")
                .await
                .unwrap();
        }

        let mut pending = Vec::new();
        for _ in 0..5 {
            pending.push(
                wallet
                    .withdraw(1, dec!(5000), "NL91ABNA0417164300", "payout")
                    .await
                    .unwrap(),
            );
        }

        let (last, settled) = pending.split_last().unwrap();
        for tx in settled {
            payments
                .update_transaction_status(tx.id, TransactionStatus::Completed, None, None)
                .await
                .unwrap();
        }
        assert!(matches!(
            payments
                .update_transaction_status(last.id, TransactionStatus::Completed, None, None)
                .await,
            Err(LedgerError::PreconditionFailed(_))
        ));
        assert_eq!(wallet.balance(1).await.unwrap(), Balance::new(dec!(10000)));
    }

    #[tokio::test]
    async fn test_settling_bank_transfers_respects_daily_limit() {
        let h = Harness::new().await;
        let wallet = &h.ledger.wallet;
        let payments = &h.ledger.payments;

        let mut pending = Vec::new();
        for _ in 0..6 {
            pending.push(
                wallet
                    .charge_with_bank_transfer(1, dec!(10000), "")
                    .await
                    .unwrap(),
            );
        }

        let (last, settled) = pending.split_last().unwrap();
        for tx in settled {
            payments
                .update_transaction_status(tx.id, TransactionStatus::Completed, None, None)
                .await
                .unwrap();
        }
        assert!(matches!(
            payments
                .update_transaction_status(last.id, TransactionStatus::Completed, None, None)
                .await,
            Err(LedgerError::PreconditionFailed(_))
        ));
        assert_eq!(wallet.balance(1).await.unwrap(), Balance::new(dec!(50000)));
    }
}
