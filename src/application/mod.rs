//! Application layer containing the ledger's business rules.
//!
//! `WalletLedger` and `PaymentService` are the only writers. Both serialize
//! their read-validate-write windows through a shared `KeyedLocks` table, so
//! concurrent calls for the same user or order are applied one at a time.
//! `TransactionQueries` is the read side.

mod finalize;
pub mod ledger;
pub mod locks;
pub mod payments;
pub mod reporting;
pub mod wallet;

#[cfg(test)]
mod test_support;
