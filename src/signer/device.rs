use crate::error::{WalletError, WalletResult};
use crate::signer::{SignerKind, TransactionSigner};
use crate::types::{PublicKey, Transaction};

/// Request/response link to a hardware signer. Each call blocks until the
/// user has approved or declined on the device.
///
/// Implementations map a declined prompt to [`WalletError::UserCancelled`]
/// and a missing or locked device to [`WalletError::SignerUnavailable`].
pub trait DeviceTransport {
    /// Derives the public key for `index`, showing the address on the device.
    fn public_key(&mut self, index: u32) -> WalletResult<PublicKey>;

    /// Signs the signature at `sig_index` of `txn` with key `key_index`.
    fn sign_input(&mut self, txn: &Transaction, sig_index: u16, key_index: u32) -> WalletResult<[u8; 64]>;
}

/// A hardware signer held exclusively for one command.
pub struct DeviceSigner<T: DeviceTransport> {
    transport: T,
}

impl<T: DeviceTransport> DeviceSigner<T> {
    pub fn open(transport: T) -> Self {
        tracing::debug!("device signer opened");
        Self { transport }
    }
}

impl<T: DeviceTransport> Drop for DeviceSigner<T> {
    fn drop(&mut self) {
        tracing::debug!("device signer released");
    }
}

impl<T: DeviceTransport> TransactionSigner for DeviceSigner<T> {
    fn kind(&self) -> SignerKind {
        SignerKind::Device
    }

    fn public_key(&mut self, index: u64) -> WalletResult<PublicKey> {
        let index = u32::try_from(index)
            .map_err(|_| WalletError::invalid(format!("key index {} too large for device", index)))?;
        self.transport.public_key(index)
    }

    fn sign_input(
        &mut self,
        txn: &Transaction,
        sig_index: usize,
        key_index: u64,
        _height: u64,
    ) -> WalletResult<Vec<u8>> {
        let sig_index = u16::try_from(sig_index).map_err(|_| {
            WalletError::invalid(format!("signature index {} too large for device", sig_index))
        })?;
        let key_index = u32::try_from(key_index).map_err(|_| {
            WalletError::invalid(format!("key index {} too large for device", key_index))
        })?;
        Ok(self.transport.sign_input(txn, sig_index, key_index)?.to_vec())
    }
}

/// Opens the attached hardware signer. No USB transport ships with this
/// build, so this always reports the device as unavailable.
pub fn open_attached_device() -> WalletResult<Box<dyn TransactionSigner>> {
    Err(WalletError::SignerUnavailable(
        "no hardware wallet transport is available; use --hot to sign with a seed".to_string(),
    ))
}
