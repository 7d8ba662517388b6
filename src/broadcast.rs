use crate::error::WalletResult;
use crate::ledger::LedgerService;
use crate::types::{Transaction, TransactionId};

/// Submits a signed transaction as a one-element set and returns its id.
/// Ledger rejections come back unchanged.
pub async fn broadcast<L: LedgerService>(ledger: &L, txn: &Transaction) -> WalletResult<TransactionId> {
    let id = txn.id();
    tracing::info!("broadcasting transaction {}", id);
    ledger.broadcast(std::slice::from_ref(txn)).await?;
    Ok(id)
}
