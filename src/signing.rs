//! Collects one signature per owned input, either from the seed in a single
//! approval or from the device one input at a time.

use std::collections::BTreeMap;

use crate::error::WalletResult;
use crate::prompt::Prompt;
use crate::signer::{SignerKind, TransactionSigner};
use crate::types::{Transaction, TransactionSignature, UnlockHash};

/// Which signature covers which input, and with which key.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SignatureSlot {
    pub signature_index: usize,
    pub input_index: usize,
    pub key_index: u64,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SignOutcome {
    Signed(Transaction),
    /// None of the inputs belong to the wallet; the draft is left as it was.
    NothingToSign,
}

/// Appends an unsigned whole-transaction signature for every input whose
/// address is in `owned`, in input order.
pub fn plan_signatures(
    txn: &Transaction,
    owned: &BTreeMap<UnlockHash, u64>,
) -> (Transaction, Vec<SignatureSlot>) {
    let mut draft = txn.clone();
    let mut slots = Vec::new();
    for (input_index, input) in txn.siacoin_inputs.iter().enumerate() {
        let key_index = match owned.get(&input.unlock_conditions.unlock_hash()) {
            Some(key_index) => *key_index,
            None => continue,
        };
        slots.push(SignatureSlot {
            signature_index: draft.transaction_signatures.len(),
            input_index,
            key_index,
        });
        draft
            .transaction_signatures
            .push(TransactionSignature::standard(input.parent_id));
    }
    (draft, slots)
}

/// Outputs and fees the user is asked to verify before signing.
pub fn summary_lines(txn: &Transaction) -> Vec<String> {
    let outputs = txn.siacoin_outputs.iter().map(|output| {
        format!(
            "    {} receiving {} SC",
            output.unlock_hash,
            output.value.to_coin_string(5)
        )
    });
    let fees = txn
        .miner_fees
        .iter()
        .map(|fee| format!("    A miner fee of {} SC", fee.to_coin_string(5)));
    outputs.chain(fees).collect()
}

/// Signs every owned input of `txn` and returns the signed copy.
///
/// The caller's transaction is never touched: a cancellation or device
/// failure part way through discards every signature collected so far.
pub fn sign_transaction<S, P>(
    txn: &Transaction,
    owned: &BTreeMap<UnlockHash, u64>,
    signer: &mut S,
    prompt: &mut P,
    height: u64,
) -> WalletResult<SignOutcome>
where
    S: TransactionSigner + ?Sized,
    P: Prompt + ?Sized,
{
    let (mut draft, slots) = plan_signatures(txn, owned);
    if slots.is_empty() {
        prompt.show("Nothing to sign: transaction does not spend any outputs recognized by this wallet");
        return Ok(SignOutcome::NothingToSign);
    }

    match signer.kind() {
        SignerKind::Seed => {
            prompt.show("Please verify the transaction details:");
            for line in summary_lines(txn) {
                prompt.show(&line);
            }
            prompt.confirm("Press ENTER to sign this transaction, or Ctrl-C to cancel.")?;
        }
        SignerKind::Device => {
            prompt.show("Please verify the transaction details on your device. You should see:");
            for line in summary_lines(txn) {
                prompt.show(&line);
            }
            if slots.len() > 1 {
                prompt.show(&format!(
                    "Each signature must be completed separately, so you will be prompted {} times.",
                    slots.len()
                ));
            }
        }
    }

    for (n, slot) in slots.iter().enumerate() {
        if signer.kind() == SignerKind::Device {
            prompt.show(&format!(
                "Waiting for signature {} of {} (input {}, key {})...",
                n + 1,
                slots.len(),
                slot.input_index,
                slot.key_index
            ));
        }
        let signature = signer.sign_input(&draft, slot.signature_index, slot.key_index, height)?;
        draft.transaction_signatures[slot.signature_index].signature = signature;
        tracing::debug!(
            "signed input {} with key {}",
            slot.input_index,
            slot.key_index
        );
    }

    tracing::info!("collected {} signatures for {}", slots.len(), draft.id());
    Ok(SignOutcome::Signed(draft))
}
