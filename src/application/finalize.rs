//! Terminal transitions shared by the wallet ledger and the orchestrator.

use crate::domain::ports::TransactionStore;
use crate::domain::transaction::{Transaction, TransactionId};
use crate::error::{LedgerError, Result};
use uuid::Uuid;

pub(crate) fn synthetic_reference(prefix: &str) -> String {
    format!("{prefix}-{}", Uuid::new_v4().simple())
}

pub(crate) fn ensure_id(id: u64, what: &str) -> Result<()> {
    if id == 0 {
        return Err(LedgerError::InvalidArgument(format!(
            "{what} id must be positive"
        )));
    }
    Ok(())
}

pub(crate) async fn complete(
    store: &dyn TransactionStore,
    mut tx: Transaction,
    reference_id: String,
) -> Result<Transaction> {
    tx.mark_completed(reference_id)?;
    let tx = store.update(&tx).await?;
    tracing::info!(
        transaction_id = tx.id,
        user_id = tx.user_id,
        kind = %tx.kind,
        amount = %tx.amount,
        reference_id = tx.reference_id.as_deref().unwrap_or_default(),
        "transaction completed"
    );
    Ok(tx)
}

/// Records `err` as the failure reason of a transaction that is still
/// pending, then hands the error back for the caller to return.
///
/// Bookkeeping failures here are logged; `err` is always returned unchanged.
pub(crate) async fn fail(
    store: &dyn TransactionStore,
    id: TransactionId,
    err: LedgerError,
) -> LedgerError {
    let reason = err.detail();
    match store.get(id).await {
        Ok(Some(mut tx)) if !tx.is_terminal() => {
            if let Err(e) = tx.mark_failed(&reason) {
                tracing::error!(transaction_id = id, error = %e, "could not mark transaction failed");
                return err;
            }
            match store.update(&tx).await {
                Ok(_) => tracing::warn!(transaction_id = id, reason = %reason, "transaction failed"),
                Err(e) => tracing::error!(
                    transaction_id = id,
                    error = %e,
                    "could not persist failed transaction"
                ),
            }
        }
        Ok(Some(tx)) => tracing::warn!(
            transaction_id = id,
            status = %tx.status,
            reason = %reason,
            "dispatch error after transaction reached a terminal state"
        ),
        Ok(None) => tracing::error!(transaction_id = id, "failed transaction vanished from store"),
        Err(e) => tracing::error!(transaction_id = id, error = %e, "could not reload failed transaction"),
    }
    err
}
