use std::fmt;

use ed25519_dalek::{Signer, SigningKey};
use rand::RngCore;
use zeroize::Zeroize;

use crate::encoding::blake2b;
use crate::error::{WalletError, WalletResult};
use crate::signer::{SignerKind, TransactionSigner};
use crate::types::{PublicKey, Transaction};

/// Root secret from which every wallet key is derived.
///
/// Lives in memory only for the duration of one command and is wiped on drop.
pub struct Seed([u8; 32]);

impl Seed {
    pub fn generate() -> Self {
        let mut bytes = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut bytes);
        Seed(bytes)
    }

    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Seed(bytes)
    }

    pub fn from_hex(phrase: &str) -> WalletResult<Self> {
        let mut bytes = [0u8; 32];
        hex::decode_to_slice(phrase.trim(), &mut bytes)
            .map_err(|_| WalletError::invalid("seed must be 64 hex characters"))?;
        Ok(Seed(bytes))
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// ed25519 key for `index`: the key seed is `blake2b(seed || index_le)`.
    pub fn secret_key(&self, index: u64) -> SigningKey {
        let mut preimage = [0u8; 40];
        preimage[..32].copy_from_slice(&self.0);
        preimage[32..].copy_from_slice(&index.to_le_bytes());
        let mut entropy = blake2b(&preimage);
        preimage.zeroize();
        let key = SigningKey::from_bytes(&entropy);
        entropy.zeroize();
        key
    }

    pub fn public_key(&self, index: u64) -> PublicKey {
        PublicKey(self.secret_key(index).verifying_key().to_bytes())
    }
}

impl Drop for Seed {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

impl fmt::Debug for Seed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Seed(..)")
    }
}

/// Signs in-process with keys derived from a [`Seed`].
#[derive(Debug)]
pub struct SeedSigner {
    seed: Seed,
}

impl SeedSigner {
    pub fn new(seed: Seed) -> Self {
        Self { seed }
    }
}

impl TransactionSigner for SeedSigner {
    fn kind(&self) -> SignerKind {
        SignerKind::Seed
    }

    fn public_key(&mut self, index: u64) -> WalletResult<PublicKey> {
        Ok(self.seed.public_key(index))
    }

    fn sign_input(
        &mut self,
        txn: &Transaction,
        sig_index: usize,
        key_index: u64,
        height: u64,
    ) -> WalletResult<Vec<u8>> {
        let digest = txn.sig_hash(sig_index, height)?;
        let key = self.seed.secret_key(key_index);
        Ok(key.sign(digest.as_bytes()).to_bytes().to_vec())
    }
}
