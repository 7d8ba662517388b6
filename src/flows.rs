//! One function per command. Each fetches what it needs from the ledger,
//! drives selection, change, signing and broadcast, and reports progress
//! through the [`Prompt`].

use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::Context;

use crate::broadcast::broadcast;
use crate::change::{addresses_with_index, allocate_change, parse_change_address, register_address};
use crate::currency::Currency;
use crate::donation::{fund_with_donation, Donation};
use crate::error::{WalletError, WalletResult};
use crate::ledger::{next_unused_index, owned_key_indices, LedgerService};
use crate::prompt::Prompt;
use crate::selection::{CoinSelector, Selection, StandardSizeEstimator};
use crate::signer::{SignerKind, SignerSession, TransactionSigner};
use crate::signing::{sign_transaction, SignOutcome};
use crate::split::OutputSplitter;
use crate::txn_file::{read_txn, signed_path, write_txn};
use crate::types::{SiacoinOutput, Transaction, UnlockHash, ValuedInput};

#[derive(Debug, Clone, Default)]
pub struct TxnArgs {
    /// comma-separated `addr:amount` pairs, amounts in SC
    pub outputs: String,
    pub file: Option<PathBuf>,
    pub sign: bool,
    pub broadcast: bool,
    pub change: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct SplitArgs {
    pub count: usize,
    /// value of each output, in SC
    pub value: String,
    pub file: Option<PathBuf>,
    pub sign: bool,
    pub broadcast: bool,
    pub change: Option<String>,
}

/// True if `err` was caused by the user declining a confirmation.
pub fn is_cancellation(err: &anyhow::Error) -> bool {
    err.chain()
        .any(|cause| matches!(cause.downcast_ref::<WalletError>(), Some(WalletError::UserCancelled)))
}

/// Parses `addr:amount[,addr:amount...]`.
pub fn parse_outputs(s: &str) -> WalletResult<Vec<SiacoinOutput>> {
    s.split(',')
        .map(|pair| -> WalletResult<SiacoinOutput> {
            let (addr, amount) = pair
                .split_once(':')
                .filter(|(_, amount)| !amount.contains(':'))
                .ok_or_else(|| WalletError::invalid("outputs must be specified in addr:amount pairs"))?;
            Ok(SiacoinOutput {
                unlock_hash: UnlockHash::from_str(addr.trim())?,
                value: Currency::parse_coins(amount.trim())?,
            })
        })
        .collect()
}

fn plural(n: usize) -> &'static str {
    if n == 1 {
        ""
    } else {
        "s"
    }
}

fn check_destination(file: &Option<PathBuf>, broadcast: bool) -> WalletResult<()> {
    if file.is_none() && !broadcast {
        return Err(WalletError::invalid(
            "a transaction file is required unless --broadcast is given",
        ));
    }
    Ok(())
}

async fn spendable_inputs<L: LedgerService>(ledger: &L) -> anyhow::Result<(Vec<ValuedInput>, Currency)> {
    let utxos = ledger
        .unspent_outputs(false)
        .await
        .context("Could not get utxos")?;
    let fee_per_byte = ledger
        .recommended_fee()
        .await
        .context("Could not get recommended transaction fee")?;
    tracing::debug!("{} spendable outputs, fee {}/byte", utxos.len(), fee_per_byte);
    Ok((utxos.iter().map(ValuedInput::from).collect(), fee_per_byte))
}

async fn resolve_change<L, F, P>(
    ledger: &L,
    signers: &mut SignerSession<F>,
    prompt: &mut P,
    preset: Option<UnlockHash>,
) -> anyhow::Result<UnlockHash>
where
    L: LedgerService,
    F: FnMut() -> WalletResult<Box<dyn TransactionSigner>>,
    P: Prompt + ?Sized,
{
    if let Some(addr) = preset {
        return Ok(addr);
    }
    let signer = signers.get().context("Could not open signer")?;
    if signer.kind() == SignerKind::Device {
        prompt.show("(You may use the --change flag to specify a change address in advance.)");
    }
    let addr = allocate_change(ledger, signer, prompt)
        .await
        .context("Could not add change address to wallet")?;
    prompt.show("Change address added successfully.");
    prompt.show("");
    Ok(addr)
}

fn show_funding_summary<P: Prompt + ?Sized>(
    prompt: &mut P,
    selection: &Selection,
    recipients: usize,
    payment_total: &Currency,
    donation: Option<&Donation>,
    fee_per_byte: &Currency,
) {
    let used = selection.used.len();
    prompt.show("Transaction summary:");
    prompt.show(&format!(
        "- {} input{}, totalling {}",
        used,
        plural(used),
        selection.input_sum().to_units_string()
    ));
    prompt.show(&format!(
        "- {} output{}, totalling {}",
        recipients,
        plural(recipients),
        payment_total.to_units_string()
    ));
    if let Some(donation) = donation {
        prompt.show(&format!(
            " (plus a donation of {} to the narwal server)",
            donation.value.to_units_string()
        ));
    }
    if !selection.change.is_zero() {
        prompt.show(&format!(
            " (plus a change output, sending {} back to your wallet)",
            selection.change.to_units_string()
        ));
    }
    prompt.show(&format!(
        "- A miner fee of {}, which is {}/byte",
        selection.fee.to_units_string(),
        fee_per_byte.to_units_string()
    ));
    prompt.show("");
}

/// Signs `txn` with the session's signer. `None` means no input was ours.
async fn sign_with<L, F, P>(
    ledger: &L,
    signers: &mut SignerSession<F>,
    prompt: &mut P,
    txn: &Transaction,
) -> anyhow::Result<Option<Transaction>>
where
    L: LedgerService,
    F: FnMut() -> WalletResult<Box<dyn TransactionSigner>>,
    P: Prompt + ?Sized,
{
    let owned = owned_key_indices(ledger)
        .await
        .context("Could not get address list")?;
    let height = ledger
        .consensus()
        .await
        .context("Could not get consensus height")?
        .height;
    let signer = signers.get().context("Could not open signer")?;
    match sign_transaction(txn, &owned, signer, prompt, height).context("Could not sign transaction")? {
        SignOutcome::Signed(signed) => Ok(Some(signed)),
        SignOutcome::NothingToSign => Ok(None),
    }
}

async fn broadcast_and_report<L, P>(ledger: &L, prompt: &mut P, txn: &Transaction) -> anyhow::Result<()>
where
    L: LedgerService,
    P: Prompt + ?Sized,
{
    let id = broadcast(ledger, txn)
        .await
        .context("Could not broadcast transaction")?;
    prompt.show("Transaction broadcast successfully.");
    prompt.show(&format!("Transaction ID: {}", id));
    Ok(())
}

/// Shared tail of `txn` and `split`: optionally sign, then broadcast or persist.
async fn finish_draft<L, F, P>(
    ledger: &L,
    signers: &mut SignerSession<F>,
    prompt: &mut P,
    draft: Transaction,
    sign: bool,
    send: bool,
    file: Option<&Path>,
) -> anyhow::Result<Transaction>
where
    L: LedgerService,
    F: FnMut() -> WalletResult<Box<dyn TransactionSigner>>,
    P: Prompt + ?Sized,
{
    let mut txn = draft;
    let mut signed = false;
    if sign {
        if let Some(signed_txn) = sign_with(ledger, signers, prompt, &txn).await? {
            txn = signed_txn;
            signed = true;
        }
    } else {
        prompt.show("Transaction has not been signed. You can sign it with the 'sign' command.");
    }

    if send {
        broadcast_and_report(ledger, prompt, &txn).await?;
        return Ok(txn);
    }

    let path = file.ok_or_else(|| WalletError::invalid("no transaction file given"))?;
    write_txn(path, &txn).context("Could not write transaction to disk")?;
    let kind = if signed { "signed" } else { "unsigned" };
    prompt.show(&format!("Wrote {} transaction to {}", kind, path.display()));
    Ok(txn)
}

/// `txn`: pays the given outputs, adding a donation and change as needed.
pub async fn txn_flow<L, F, P>(
    ledger: &L,
    signers: &mut SignerSession<F>,
    prompt: &mut P,
    args: TxnArgs,
) -> anyhow::Result<Transaction>
where
    L: LedgerService,
    F: FnMut() -> WalletResult<Box<dyn TransactionSigner>>,
    P: Prompt + ?Sized,
{
    check_destination(&args.file, args.broadcast)?;
    let mut outputs = parse_outputs(&args.outputs).context("Could not parse outputs")?;
    let preset_change = args
        .change
        .as_deref()
        .map(parse_change_address)
        .transpose()
        .context("Could not parse change address")?;
    let recipients = outputs.len();
    let payment_total: Currency = outputs.iter().map(|o| &o.value).sum();

    let donation_address = ledger.donation_address().await;
    let (available, fee_per_byte) = spendable_inputs(ledger).await?;
    let estimator = StandardSizeEstimator::default();
    let selector = CoinSelector::new(fee_per_byte.clone(), &estimator);
    let plan = fund_with_donation(&selector, &payment_total, recipients, donation_address, &available)
        .context("Could not create transaction")?;
    if plan.donation_from_change {
        tracing::info!("donating leftover change instead of the full donation");
    }

    if let Some(donation) = &plan.donation {
        outputs.push(donation.output());
    }
    if !plan.selection.change.is_zero() {
        let change_address = resolve_change(ledger, signers, prompt, preset_change).await?;
        outputs.push(SiacoinOutput {
            value: plan.selection.change.clone(),
            unlock_hash: change_address,
        });
    }

    let draft = Transaction {
        siacoin_inputs: plan.selection.inputs(),
        siacoin_outputs: outputs,
        miner_fees: vec![plan.selection.fee.clone()],
        transaction_signatures: vec![],
    };
    show_funding_summary(
        prompt,
        &plan.selection,
        recipients,
        &payment_total,
        plan.donation.as_ref(),
        &fee_per_byte,
    );

    finish_draft(
        ledger,
        signers,
        prompt,
        draft,
        args.sign,
        args.broadcast,
        args.file.as_deref(),
    )
    .await
}

/// `split`: `count` outputs of `value` each, sent back to the wallet.
pub async fn split_flow<L, F, P>(
    ledger: &L,
    signers: &mut SignerSession<F>,
    prompt: &mut P,
    args: SplitArgs,
) -> anyhow::Result<Transaction>
where
    L: LedgerService,
    F: FnMut() -> WalletResult<Box<dyn TransactionSigner>>,
    P: Prompt + ?Sized,
{
    check_destination(&args.file, args.broadcast)?;
    if args.count == 0 {
        return Err(WalletError::invalid("split needs at least one output").into());
    }
    let per_output = Currency::parse_coins(&args.value).context("Invalid output value")?;
    if per_output.is_zero() {
        return Err(WalletError::invalid("split outputs must have non-zero value").into());
    }
    let preset = args
        .change
        .as_deref()
        .map(parse_change_address)
        .transpose()
        .context("Could not parse change address")?;

    let (available, fee_per_byte) = spendable_inputs(ledger).await?;
    let estimator = StandardSizeEstimator::default();
    let plan = OutputSplitter::new(fee_per_byte.clone(), &estimator)
        .split(args.count, &per_output, &available)
        .context("Could not create transaction")?;

    let destination = resolve_change(ledger, signers, prompt, preset).await?;
    let draft = Transaction {
        siacoin_inputs: plan.selection.inputs(),
        siacoin_outputs: plan.outputs(destination, destination),
        miner_fees: vec![plan.selection.fee.clone()],
        transaction_signatures: vec![],
    };
    show_funding_summary(
        prompt,
        &plan.selection,
        plan.count,
        &per_output.mul_u64(plan.count as u64),
        None,
        &fee_per_byte,
    );

    finish_draft(
        ledger,
        signers,
        prompt,
        draft,
        args.sign,
        args.broadcast,
        args.file.as_deref(),
    )
    .await
}

/// `sign`: signs a stored transaction and writes `<name>-signed<ext>`
/// or broadcasts it.
pub async fn sign_flow<L, F, P>(
    ledger: &L,
    signers: &mut SignerSession<F>,
    prompt: &mut P,
    path: &Path,
    send: bool,
) -> anyhow::Result<Transaction>
where
    L: LedgerService,
    F: FnMut() -> WalletResult<Box<dyn TransactionSigner>>,
    P: Prompt + ?Sized,
{
    let draft = read_txn(path)
        .with_context(|| format!("Could not read transaction {path}", path = path.display()))?;
    let txn = sign_with(ledger, signers, prompt, &draft)
        .await?
        .unwrap_or(draft);

    if send {
        broadcast_and_report(ledger, prompt, &txn).await?;
    } else {
        let out = signed_path(path);
        write_txn(&out, &txn).context("Could not write transaction to disk")?;
        prompt.show(&format!("Wrote signed transaction to {}.", out.display()));
        prompt.show("You can now use the 'broadcast' command to broadcast this transaction.");
    }
    Ok(txn)
}

pub async fn broadcast_flow<L, P>(ledger: &L, prompt: &mut P, path: &Path) -> anyhow::Result<()>
where
    L: LedgerService,
    P: Prompt + ?Sized,
{
    let txn = read_txn(path)
        .with_context(|| format!("Could not read transaction {path}", path = path.display()))?;
    broadcast_and_report(ledger, prompt, &txn).await
}

/// `addr`: derives, confirms and tracks a new address.
pub async fn addr_flow<L, F, P>(
    ledger: &L,
    signers: &mut SignerSession<F>,
    prompt: &mut P,
    index: Option<u64>,
) -> anyhow::Result<UnlockHash>
where
    L: LedgerService,
    F: FnMut() -> WalletResult<Box<dyn TransactionSigner>>,
    P: Prompt + ?Sized,
{
    let index = match index {
        Some(index) => {
            let existing = addresses_with_index(ledger, index)
                .await
                .context("Could not get address list")?;
            if !existing.is_empty() {
                prompt.show(&format!(
                    "WARNING: You have already generated an address with index {}.",
                    index
                ));
                tracing::warn!("key index {} already tracked as {:?}", index, existing);
            }
            index
        }
        None => {
            let index = next_unused_index(ledger)
                .await
                .context("Could not get address list")?;
            prompt.show(&format!(
                "No index specified; using lowest available index ({})",
                index
            ));
            index
        }
    };

    let signer = signers.get().context("Could not open signer")?;
    if signer.kind() == SignerKind::Device {
        prompt.show(&format!(
            "Please verify and accept the prompt on your device to generate address #{}.",
            index
        ));
    }
    let addr = register_address(ledger, signer, prompt, index)
        .await
        .context("Could not add address to wallet")?;
    prompt.show("Address added successfully.");
    Ok(addr)
}

pub async fn balance_flow<L, P>(ledger: &L, prompt: &mut P, confirmed_only: bool) -> anyhow::Result<Currency>
where
    L: LedgerService,
    P: Prompt + ?Sized,
{
    let balance = ledger
        .balance(confirmed_only)
        .await
        .context("Could not get balance")?;
    prompt.show(&balance.to_units_string());
    Ok(balance)
}

/// `addresses`: lists tracked addresses, each followed by up to `history`
/// of its recent transaction ids.
pub async fn addresses_flow<L, P>(ledger: &L, prompt: &mut P, history: usize) -> anyhow::Result<Vec<UnlockHash>>
where
    L: LedgerService,
    P: Prompt + ?Sized,
{
    let addrs = ledger
        .addresses()
        .await
        .context("Could not get address list")?;
    for addr in addrs.iter() {
        prompt.show(&addr.to_string());
        if history > 0 {
            let ids = ledger
                .transactions(addr, history)
                .await
                .with_context(|| format!("Could not get transactions of {}", addr))?;
            for id in ids {
                prompt.show(&format!("    {}", id));
            }
        }
    }
    Ok(addrs)
}
