use super::finalize::{self, ensure_id, synthetic_reference};
use super::locks::{KeyedLocks, LockKey};
use crate::config::WalletLimits;
use crate::domain::filter::TransactionFilter;
use crate::domain::money::{Amount, Balance};
use crate::domain::ports::{GatewayOutcome, PaymentGatewayRef, TransactionStoreRef, UserDirectoryRef};
use crate::domain::transaction::{
    NewTransaction, PaymentMethod, Transaction, TransactionStatus, TransactionType, UserId,
};
use crate::error::{LedgerError, Result};
use chrono::{DateTime, Local, NaiveDate, NaiveTime, TimeZone, Utc};
use rust_decimal::Decimal;
use std::sync::Arc;

/// Derives wallet balances from the ledger and gates every wallet mutation.
///
/// Nothing here caches: each check re-reads completed entries from the store
/// while holding the user's lock, so the read and the write that depends on
/// it cannot interleave with another writer for the same user.
#[derive(Clone)]
pub struct WalletLedger {
    store: TransactionStoreRef,
    users: UserDirectoryRef,
    gateway: PaymentGatewayRef,
    limits: WalletLimits,
    locks: Arc<KeyedLocks>,
}

impl WalletLedger {
    pub fn new(
        store: TransactionStoreRef,
        users: UserDirectoryRef,
        gateway: PaymentGatewayRef,
        limits: WalletLimits,
        locks: Arc<KeyedLocks>,
    ) -> Self {
        Self {
            store,
            users,
            gateway,
            limits,
            locks,
        }
    }

    /// `Σ completed charges − Σ completed withdrawals` for the user.
    pub async fn balance(&self, user_id: UserId) -> Result<Balance> {
        ensure_id(user_id, "User")?;
        self.derived_balance(user_id).await
    }

    pub async fn has_sufficient_balance(&self, user_id: UserId, amount: Decimal) -> Result<bool> {
        let amount = Amount::new(amount)?;
        Ok(self.balance(user_id).await?.covers(amount))
    }

    /// Tops up a wallet.
    ///
    /// `CARD` goes through the card gateway, `BANK_TRANSFER` stays pending
    /// until the transfer is confirmed, `ADMIN_CREDIT` completes at once.
    pub async fn charge(
        &self,
        user_id: UserId,
        amount: Decimal,
        method: PaymentMethod,
        description: &str,
    ) -> Result<Transaction> {
        ensure_id(user_id, "User")?;
        let amount = Amount::new(amount)?;
        if amount.value() > self.limits.max_charge {
            return Err(LedgerError::InvalidArgument(format!(
                "Charge amount {amount} exceeds the per-transaction maximum of {}",
                self.limits.max_charge
            )));
        }
        match method {
            PaymentMethod::Card | PaymentMethod::BankTransfer | PaymentMethod::AdminCredit => {}
            PaymentMethod::Wallet | PaymentMethod::CashOnDelivery => {
                return Err(LedgerError::InvalidArgument(format!(
                    "{method} cannot be used to charge a wallet"
                )));
            }
        }
        self.ensure_user(user_id).await?;

        let _held = self.locks.acquire(&[LockKey::User(user_id)]).await;
        self.ensure_within_daily_limit(user_id, TransactionType::WalletCharge, amount)
            .await?;

        let description = if description.trim().is_empty() {
            format!("Wallet charge via {method}")
        } else {
            description.trim().to_string()
        };
        let tx = self
            .store
            .insert(NewTransaction {
                user_id,
                order_id: None,
                amount,
                kind: TransactionType::WalletCharge,
                payment_method: method,
                description,
            })
            .await?;
        tracing::info!(transaction_id = tx.id, user_id, %amount, %method, "wallet charge created");

        let id = tx.id;
        match self.resolve_charge(tx, method).await {
            Ok(tx) => Ok(tx),
            Err(err) => Err(finalize::fail(&*self.store, id, err).await),
        }
    }

    pub async fn charge_with_card(
        &self,
        user_id: UserId,
        amount: Decimal,
        description: &str,
    ) -> Result<Transaction> {
        self.charge(user_id, amount, PaymentMethod::Card, description)
            .await
    }

    pub async fn charge_with_bank_transfer(
        &self,
        user_id: UserId,
        amount: Decimal,
        description: &str,
    ) -> Result<Transaction> {
        self.charge(user_id, amount, PaymentMethod::BankTransfer, description)
            .await
    }

    async fn resolve_charge(&self, mut tx: Transaction, method: PaymentMethod) -> Result<Transaction> {
        match method {
            PaymentMethod::Card => match self.gateway.outcome() {
                GatewayOutcome::Approved => {
                    finalize::complete(&*self.store, tx, synthetic_reference("CARD")).await
                }
                GatewayOutcome::Declined => Err(LedgerError::ProcessingFailure(
                    "Card charge declined by gateway".to_string(),
                )),
            },
            PaymentMethod::BankTransfer => {
                tx.append_note("Awaiting bank transfer verification")?;
                let tx = self.store.update(&tx).await?;
                tracing::info!(transaction_id = tx.id, "wallet charge awaiting bank transfer");
                Ok(tx)
            }
            PaymentMethod::AdminCredit => {
                finalize::complete(&*self.store, tx, synthetic_reference("ADMIN")).await
            }
            PaymentMethod::Wallet | PaymentMethod::CashOnDelivery => Err(
                LedgerError::ProcessingFailure(format!("{method} cannot fund a wallet")),
            ),
        }
    }

    /// Requests a payout to a bank account. The withdrawal stays pending
    /// until the bank transfer is confirmed out of band.
    pub async fn withdraw(
        &self,
        user_id: UserId,
        amount: Decimal,
        bank_account: &str,
        reason: &str,
    ) -> Result<Transaction> {
        ensure_id(user_id, "User")?;
        let amount = Amount::new(amount)?;
        if amount.value() < self.limits.min_withdrawal || amount.value() > self.limits.max_withdrawal
        {
            return Err(LedgerError::InvalidArgument(format!(
                "Withdrawal amount must be between {} and {}",
                self.limits.min_withdrawal, self.limits.max_withdrawal
            )));
        }
        if bank_account.trim().is_empty() {
            return Err(LedgerError::InvalidArgument(
                "Bank account is required".to_string(),
            ));
        }
        self.ensure_user(user_id).await?;

        let _held = self.locks.acquire(&[LockKey::User(user_id)]).await;
        self.ensure_covered(user_id, amount).await?;
        self.ensure_within_daily_limit(user_id, TransactionType::WalletWithdrawal, amount)
            .await?;

        let mut description = format!("Withdrawal to bank account {}", mask_account(bank_account));
        if !reason.trim().is_empty() {
            description = format!("{description}: {}", reason.trim());
        }
        let tx = self
            .store
            .insert(NewTransaction {
                user_id,
                order_id: None,
                amount,
                kind: TransactionType::WalletWithdrawal,
                payment_method: PaymentMethod::BankTransfer,
                description,
            })
            .await?;
        tracing::info!(transaction_id = tx.id, user_id, %amount, "withdrawal pending bank transfer");
        Ok(tx)
    }

    /// Takes `amount` out of the wallet to pay for an order, completing at once.
    pub async fn withdraw_for_payment(
        &self,
        user_id: UserId,
        amount: Decimal,
        order_reference: &str,
    ) -> Result<Transaction> {
        ensure_id(user_id, "User")?;
        let amount = Amount::new(amount)?;
        let _held = self.locks.acquire(&[LockKey::User(user_id)]).await;
        self.debit_for_payment(user_id, amount, order_reference).await
    }

    pub async fn admin_credit(
        &self,
        user_id: UserId,
        amount: Decimal,
        reason: &str,
        admin_id: UserId,
    ) -> Result<Transaction> {
        let amount = self.validate_admin_request(user_id, amount, reason, admin_id)?;
        self.ensure_user(user_id).await?;

        let _held = self.locks.acquire(&[LockKey::User(user_id)]).await;
        let description = format!("Admin credit by admin #{admin_id}: {}", reason.trim());
        self.instant(
            user_id,
            amount,
            TransactionType::WalletCharge,
            PaymentMethod::AdminCredit,
            description,
            "ADMIN",
        )
        .await
    }

    pub async fn admin_debit(
        &self,
        user_id: UserId,
        amount: Decimal,
        reason: &str,
        admin_id: UserId,
    ) -> Result<Transaction> {
        let amount = self.validate_admin_request(user_id, amount, reason, admin_id)?;
        self.ensure_user(user_id).await?;

        let _held = self.locks.acquire(&[LockKey::User(user_id)]).await;
        self.ensure_covered(user_id, amount).await?;
        // ADMIN_CREDIT marks an admin adjustment in either direction; the
        // entry type and the "Admin debit" tag carry the direction.
        let description = format!("Admin debit by admin #{admin_id}: {}", reason.trim());
        self.instant(
            user_id,
            amount,
            TransactionType::WalletWithdrawal,
            PaymentMethod::AdminCredit,
            description,
            "ADMIN",
        )
        .await
    }

    fn validate_admin_request(
        &self,
        user_id: UserId,
        amount: Decimal,
        reason: &str,
        admin_id: UserId,
    ) -> Result<Amount> {
        ensure_id(user_id, "User")?;
        ensure_id(admin_id, "Admin")?;
        if reason.trim().is_empty() {
            return Err(LedgerError::InvalidArgument(
                "A reason is required for admin adjustments".to_string(),
            ));
        }
        Amount::new(amount)
    }

    /// Caller must hold the user's lock.
    pub(crate) async fn debit_for_payment(
        &self,
        user_id: UserId,
        amount: Amount,
        order_reference: &str,
    ) -> Result<Transaction> {
        self.ensure_covered(user_id, amount).await?;
        let description = format!("Payment for {order_reference}");
        self.instant(
            user_id,
            amount,
            TransactionType::WalletWithdrawal,
            PaymentMethod::Wallet,
            description,
            "WALLET-DEBIT",
        )
        .await
    }

    /// Credits a refunded wallet payment back. Caller must hold the user's lock.
    pub(crate) async fn credit_refund(
        &self,
        user_id: UserId,
        amount: Amount,
        note: &str,
    ) -> Result<Transaction> {
        let description = format!("REFUND: {note}");
        self.instant(
            user_id,
            amount,
            TransactionType::WalletCharge,
            PaymentMethod::Wallet,
            description,
            "REFUND",
        )
        .await
    }

    /// Books the opposite of a completed wallet entry whose owning payment or
    /// refund could not be completed, then hands `err` back.
    ///
    /// Caller must hold the user's lock. Balance and limits are not checked:
    /// the reversal only undoes `entry`.
    pub(crate) async fn reverse(&self, entry: &Transaction, err: LedgerError) -> LedgerError {
        let kind = match entry.kind {
            TransactionType::WalletCharge => TransactionType::WalletWithdrawal,
            TransactionType::WalletWithdrawal => TransactionType::WalletCharge,
            TransactionType::Payment | TransactionType::Refund => return err,
        };
        let description = format!("REVERSAL of #{}: {}", entry.id, err.detail());
        match self
            .instant(
                entry.user_id,
                entry.amount,
                kind,
                PaymentMethod::Wallet,
                description,
                "REVERSAL",
            )
            .await
        {
            Ok(reversal) => tracing::warn!(
                transaction_id = reversal.id,
                reversed_id = entry.id,
                user_id = entry.user_id,
                amount = %entry.amount,
                "wallet entry reversed"
            ),
            Err(e) => tracing::error!(
                reversed_id = entry.id,
                user_id = entry.user_id,
                error = %e,
                "could not reverse wallet entry"
            ),
        }
        err
    }

    /// Creates and completes a wallet entry in one step.
    async fn instant(
        &self,
        user_id: UserId,
        amount: Amount,
        kind: TransactionType,
        payment_method: PaymentMethod,
        description: String,
        reference_prefix: &str,
    ) -> Result<Transaction> {
        let tx = self
            .store
            .insert(NewTransaction {
                user_id,
                order_id: None,
                amount,
                kind,
                payment_method,
                description,
            })
            .await?;
        let id = tx.id;
        match finalize::complete(&*self.store, tx, synthetic_reference(reference_prefix)).await {
            Ok(tx) => Ok(tx),
            Err(err) => Err(finalize::fail(&*self.store, id, err).await),
        }
    }

    pub(crate) async fn derived_balance(&self, user_id: UserId) -> Result<Balance> {
        let filter = TransactionFilter::new()
            .user(user_id)
            .status(TransactionStatus::Completed)
            .kinds(&TransactionType::WALLET);
        let entries = self.store.query(&filter).await?;
        Ok(entries.iter().fold(Balance::ZERO, |mut balance, tx| {
            match tx.kind {
                TransactionType::WalletCharge => balance += Balance::from(tx.amount),
                TransactionType::WalletWithdrawal => balance -= Balance::from(tx.amount),
                TransactionType::Payment | TransactionType::Refund => {}
            }
            balance
        }))
    }

    pub(crate) async fn ensure_covered(&self, user_id: UserId, amount: Amount) -> Result<()> {
        let balance = self.derived_balance(user_id).await?;
        if !balance.covers(amount) {
            return Err(LedgerError::PreconditionFailed(format!(
                "Insufficient balance: required {amount}, available {balance}"
            )));
        }
        Ok(())
    }

    /// Today's completed entries of `kind` plus `amount` must stay within the
    /// daily limit for that kind. Payments and refunds have no daily limit.
    pub(crate) async fn ensure_within_daily_limit(
        &self,
        user_id: UserId,
        kind: TransactionType,
        amount: Amount,
    ) -> Result<()> {
        let limit = match kind {
            TransactionType::WalletCharge => self.limits.daily_charge_limit,
            TransactionType::WalletWithdrawal => self.limits.daily_withdrawal_limit,
            TransactionType::Payment | TransactionType::Refund => return Ok(()),
        };
        let (from, until) = local_day_bounds(Local::now());
        let filter = TransactionFilter::new()
            .user(user_id)
            .kind(kind)
            .status(TransactionStatus::Completed)
            .created_between(from, until);
        let used: Decimal = self
            .store
            .query(&filter)
            .await?
            .iter()
            .map(|tx| tx.amount.value())
            .sum();
        if used + amount.value() > limit {
            return Err(LedgerError::PreconditionFailed(format!(
                "Daily {kind} limit of {limit} exceeded: {used} already processed today"
            )));
        }
        Ok(())
    }

    async fn ensure_user(&self, user_id: UserId) -> Result<()> {
        if !self.users.exists(user_id).await? {
            return Err(LedgerError::NotFound(format!("User {user_id} not found")));
        }
        Ok(())
    }
}

/// `[start of local day, start of next local day)` containing `now`, in UTC.
pub fn local_day_bounds(now: DateTime<Local>) -> (DateTime<Utc>, DateTime<Utc>) {
    let today = now.date_naive();
    let start = local_midnight(today);
    let end = today
        .succ_opt()
        .map(local_midnight)
        .unwrap_or(DateTime::<Utc>::MAX_UTC);
    (start, end)
}

fn local_midnight(day: NaiveDate) -> DateTime<Utc> {
    let naive = day.and_time(NaiveTime::MIN);
    // Midnight can fall in a DST gap; fall back to reading it as UTC.
    match Local.from_local_datetime(&naive).earliest() {
        Some(local) => local.with_timezone(&Utc),
        None => naive.and_utc(),
    }
}

fn mask_account(account: &str) -> String {
    let account = account.trim();
    let visible: String = account
        .chars()
        .skip(account.chars().count().saturating_sub(4))
        .collect();
    format!("****{visible}")
}
