pub mod device;
pub mod seed;

use crate::error::WalletResult;
use crate::types::{PublicKey, Transaction};

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum SignerKind {
    /// Detached hardware signer; the user approves every key and signature on it.
    Device,
    /// In-process seed; the user approves once in the terminal.
    Seed,
}

/// Source of public keys and per-input signatures.
pub trait TransactionSigner {
    fn kind(&self) -> SignerKind;

    fn public_key(&mut self, index: u64) -> WalletResult<PublicKey>;

    /// Signs the whole-transaction signature at `sig_index` with the key at
    /// `key_index`, committing to the protocol rules active at `height`.
    fn sign_input(
        &mut self,
        txn: &Transaction,
        sig_index: usize,
        key_index: u64,
        height: u64,
    ) -> WalletResult<Vec<u8>>;
}

/// Opens the command's signer on first use and keeps it until the session
/// is dropped, so a device is connected at most once per command.
pub struct SignerSession<F>
where
    F: FnMut() -> WalletResult<Box<dyn TransactionSigner>>,
{
    open: F,
    signer: Option<Box<dyn TransactionSigner>>,
}

impl<F> SignerSession<F>
where
    F: FnMut() -> WalletResult<Box<dyn TransactionSigner>>,
{
    pub fn new(open: F) -> Self {
        Self { open, signer: None }
    }

    pub fn is_open(&self) -> bool {
        self.signer.is_some()
    }

    pub fn get(&mut self) -> WalletResult<&mut (dyn TransactionSigner + 'static)> {
        let signer = match self.signer.take() {
            Some(signer) => signer,
            None => (self.open)()?,
        };
        Ok(&mut **self.signer.insert(signer))
    }
}
