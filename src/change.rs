use std::str::FromStr;

use crate::error::WalletResult;
use crate::ledger::{next_unused_index, LedgerService};
use crate::prompt::Prompt;
use crate::signer::{SignerKind, TransactionSigner};
use crate::types::{AddressInfo, UnlockConditions, UnlockHash};

/// Parses a change address given on the command line. Such addresses are
/// used as-is and never registered with the ledger service.
pub fn parse_change_address(s: &str) -> WalletResult<UnlockHash> {
    UnlockHash::from_str(s.trim())
}

/// Derives the address for `key_index`, has the user confirm it and starts
/// tracking it. Nothing is registered if the user declines.
pub async fn register_address<L, S, P>(
    ledger: &L,
    signer: &mut S,
    prompt: &mut P,
    key_index: u64,
) -> WalletResult<UnlockHash>
where
    L: LedgerService,
    S: TransactionSigner + ?Sized,
    P: Prompt + ?Sized,
{
    let key = signer.public_key(key_index)?;
    let unlock_conditions = UnlockConditions::standard(key);
    let addr = unlock_conditions.unlock_hash();

    match signer.kind() {
        SignerKind::Device => {
            prompt.show("Compare the address displayed on your device to the address below:")
        }
        SignerKind::Seed => prompt.show(&format!("Derived address {} from seed:", key_index)),
    }
    prompt.show(&format!("    {}", addr));
    prompt.confirm("Press ENTER to add this address to your wallet, or Ctrl-C to cancel.")?;

    ledger
        .watch_address(&AddressInfo {
            unlock_conditions,
            key_index,
        })
        .await?;
    tracing::info!("now tracking address {} (key {})", addr, key_index);
    Ok(addr)
}

/// Generates a fresh address at the lowest unused key index.
pub async fn allocate_change<L, S, P>(ledger: &L, signer: &mut S, prompt: &mut P) -> WalletResult<UnlockHash>
where
    L: LedgerService,
    S: TransactionSigner + ?Sized,
    P: Prompt + ?Sized,
{
    let key_index = next_unused_index(ledger).await?;
    prompt.show("This transaction requires a change output.");
    register_address(ledger, signer, prompt, key_index).await
}

/// Tracked addresses already registered under `key_index`.
pub async fn addresses_with_index<L: LedgerService>(
    ledger: &L,
    key_index: u64,
) -> WalletResult<Vec<UnlockHash>> {
    let mut found = Vec::new();
    for addr in ledger.addresses().await? {
        if ledger.address_info(&addr).await?.key_index == key_index {
            found.push(addr);
        }
    }
    Ok(found)
}
