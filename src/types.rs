use std::fmt;
use std::str::FromStr;

use ed25519_dalek::{Signature as Ed25519Signature, Verifier, VerifyingKey};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::currency::Currency;
use crate::encoding::{blake2b, merkle_root, Encode, Encoder};
use crate::error::{WalletError, WalletResult};

pub const ED25519_SPECIFIER: [u8; 16] = *b"ed25519\0\0\0\0\0\0\0\0\0";
const CHECKSUM_LEN: usize = 6;
const ADDRESS_LEN: usize = 64 + CHECKSUM_LEN * 2;

/// Height at which signatures start committing to the first replay prefix.
pub const ASIC_HARDFORK_HEIGHT: u64 = 179_000;
/// Height at which signatures switch to the second replay prefix.
pub const FOUNDATION_HARDFORK_HEIGHT: u64 = 298_000;

/// Replay protection prefix mixed into every signature hash.
pub fn replay_prefix(height: u64) -> &'static [u8] {
    if height >= FOUNDATION_HARDFORK_HEIGHT {
        &[2]
    } else if height >= ASIC_HARDFORK_HEIGHT {
        &[1]
    } else {
        &[]
    }
}

#[derive(Copy, Clone, Default, Hash, Eq, PartialEq, Ord, PartialOrd)]
pub struct Hash256(pub [u8; 32]);

impl Hash256 {
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Display for Hash256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Hash256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self)
    }
}

impl FromStr for Hash256 {
    type Err = WalletError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut out = [0u8; 32];
        hex::decode_to_slice(s, &mut out)
            .map_err(|err| WalletError::invalid(format!("invalid hash {:?}: {}", s, err)))?;
        Ok(Hash256(out))
    }
}

impl Serialize for Hash256 {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Hash256 {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Hash256::from_str(&s).map_err(serde::de::Error::custom)
    }
}

impl Encode for Hash256 {
    fn encode(&self, e: &mut Encoder) {
        e.write_fixed(&self.0);
    }
}

/// Identifier of a spendable output.
pub type OutputId = Hash256;
/// Identifier of a transaction, computed over everything but its signatures.
pub type TransactionId = Hash256;

/// The address an output is locked to: the hash of its [`UnlockConditions`].
#[derive(Copy, Clone, Default, Hash, Eq, PartialEq, Ord, PartialOrd)]
pub struct UnlockHash(pub Hash256);

impl UnlockHash {
    fn checksum(&self) -> [u8; CHECKSUM_LEN] {
        let mut out = [0u8; CHECKSUM_LEN];
        out.copy_from_slice(&blake2b(&self.0 .0)[..CHECKSUM_LEN]);
        out
    }
}

impl fmt::Display for UnlockHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.0, hex::encode(self.checksum()))
    }
}

impl fmt::Debug for UnlockHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self)
    }
}

impl FromStr for UnlockHash {
    type Err = WalletError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (hash, checksum_hex) = match (s.len(), s.get(..64), s.get(64..)) {
            (ADDRESS_LEN, Some(hash), Some(checksum)) => (hash, checksum),
            _ => {
                return Err(WalletError::invalid(format!(
                    "address {:?} is not {} hex characters",
                    s, ADDRESS_LEN
                )))
            }
        };
        let addr = UnlockHash(Hash256::from_str(hash)?);
        let mut checksum = [0u8; CHECKSUM_LEN];
        hex::decode_to_slice(checksum_hex, &mut checksum)
            .map_err(|err| WalletError::invalid(format!("invalid address {:?}: {}", s, err)))?;
        if checksum != addr.checksum() {
            return Err(WalletError::invalid(format!(
                "address {:?} has invalid checksum",
                s
            )));
        }
        Ok(addr)
    }
}

impl Serialize for UnlockHash {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for UnlockHash {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        UnlockHash::from_str(&s).map_err(serde::de::Error::custom)
    }
}

impl Encode for UnlockHash {
    fn encode(&self, e: &mut Encoder) {
        self.0.encode(e);
    }
}

/// An ed25519 public key, rendered as `ed25519:<hex>`.
#[derive(Copy, Clone, Hash, Eq, PartialEq, Ord, PartialOrd)]
pub struct PublicKey(pub [u8; 32]);

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ed25519:{}", hex::encode(self.0))
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self)
    }
}

impl FromStr for PublicKey {
    type Err = WalletError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = s
            .strip_prefix("ed25519:")
            .ok_or_else(|| WalletError::invalid(format!("unsupported public key {:?}", s)))?;
        let mut out = [0u8; 32];
        hex::decode_to_slice(key, &mut out)
            .map_err(|err| WalletError::invalid(format!("invalid public key {:?}: {}", s, err)))?;
        Ok(PublicKey(out))
    }
}

impl Serialize for PublicKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for PublicKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        PublicKey::from_str(&s).map_err(serde::de::Error::custom)
    }
}

impl Encode for PublicKey {
    fn encode(&self, e: &mut Encoder) {
        e.write_fixed(&ED25519_SPECIFIER);
        e.write_prefixed(&self.0);
    }
}

/// The spending policy behind an address.
#[derive(Clone, Debug, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub struct UnlockConditions {
    #[serde(rename = "timelock", default)]
    pub timelock: u64,
    #[serde(rename = "publickeys")]
    pub public_keys: Vec<PublicKey>,
    #[serde(rename = "signaturesrequired")]
    pub signatures_required: u64,
}

impl UnlockConditions {
    /// Single-key policy used for every seed or device derived address.
    pub fn standard(key: PublicKey) -> Self {
        Self {
            timelock: 0,
            public_keys: vec![key],
            signatures_required: 1,
        }
    }

    /// Merkle root over the timelock, each public key and the signature count.
    pub fn unlock_hash(&self) -> UnlockHash {
        let mut leaves = Vec::with_capacity(self.public_keys.len() + 2);
        let mut e = Encoder::default();
        e.write_u64(self.timelock);
        leaves.push(e.into_bytes());
        for key in &self.public_keys {
            let mut e = Encoder::default();
            key.encode(&mut e);
            leaves.push(e.into_bytes());
        }
        let mut e = Encoder::default();
        e.write_u64(self.signatures_required);
        leaves.push(e.into_bytes());
        UnlockHash(Hash256(merkle_root(&leaves)))
    }
}

impl Encode for UnlockConditions {
    fn encode(&self, e: &mut Encoder) {
        e.write_u64(self.timelock);
        e.write_slice(&self.public_keys);
        e.write_u64(self.signatures_required);
    }
}

#[derive(Clone, Debug, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub struct SiacoinInput {
    #[serde(rename = "parentid")]
    pub parent_id: OutputId,
    #[serde(rename = "unlockconditions")]
    pub unlock_conditions: UnlockConditions,
}

impl Encode for SiacoinInput {
    fn encode(&self, e: &mut Encoder) {
        self.parent_id.encode(e);
        self.unlock_conditions.encode(e);
    }
}

#[derive(Clone, Debug, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub struct SiacoinOutput {
    pub value: Currency,
    #[serde(rename = "unlockhash")]
    pub unlock_hash: UnlockHash,
}

impl Encode for SiacoinOutput {
    fn encode(&self, e: &mut Encoder) {
        e.write_currency(&self.value);
        self.unlock_hash.encode(e);
    }
}

#[derive(Clone, Debug, Default, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub struct CoveredFields {
    #[serde(rename = "wholetransaction")]
    pub whole_transaction: bool,
}

/// Partial-coverage index lists that follow the flag on the wire.
const COVERED_FIELD_LISTS: usize = 10;

impl Encode for CoveredFields {
    fn encode(&self, e: &mut Encoder) {
        e.write_bool(self.whole_transaction);
        for _ in 0..COVERED_FIELD_LISTS {
            e.write_empty();
        }
    }
}

#[derive(Clone, Debug, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub struct TransactionSignature {
    #[serde(rename = "parentid")]
    pub parent_id: Hash256,
    #[serde(rename = "publickeyindex")]
    pub public_key_index: u64,
    #[serde(rename = "timelock", default)]
    pub timelock: u64,
    #[serde(rename = "coveredfields")]
    pub covered_fields: CoveredFields,
    #[serde(with = "base64_bytes", default)]
    pub signature: Vec<u8>,
}

impl TransactionSignature {
    /// An unsigned whole-transaction signature for the input spending `parent_id`.
    pub fn standard(parent_id: Hash256) -> Self {
        Self {
            parent_id,
            public_key_index: 0,
            timelock: 0,
            covered_fields: CoveredFields {
                whole_transaction: true,
            },
            signature: vec![],
        }
    }
}

impl Encode for TransactionSignature {
    fn encode(&self, e: &mut Encoder) {
        self.parent_id.encode(e);
        e.write_u64(self.public_key_index);
        e.write_u64(self.timelock);
        self.covered_fields.encode(e);
        e.write_prefixed(&self.signature);
    }
}

/// A transaction draft as it moves through funding, signing and broadcast.
#[derive(Clone, Debug, Default, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    #[serde(rename = "siacoininputs", default)]
    pub siacoin_inputs: Vec<SiacoinInput>,
    #[serde(rename = "siacoinoutputs", default)]
    pub siacoin_outputs: Vec<SiacoinOutput>,
    #[serde(rename = "minerfees", default)]
    pub miner_fees: Vec<Currency>,
    #[serde(rename = "transactionsignatures", default)]
    pub transaction_signatures: Vec<TransactionSignature>,
}

impl Transaction {
    /// Everything but the signatures. Contracts, storage proofs, siafund
    /// fields and arbitrary data are always empty here; each input is
    /// preceded by `replay_prefix`.
    fn encode_body(&self, e: &mut Encoder, replay_prefix: &[u8]) {
        e.write_u64(self.siacoin_inputs.len() as u64);
        for input in &self.siacoin_inputs {
            e.write_fixed(replay_prefix);
            input.encode(e);
        }
        e.write_slice(&self.siacoin_outputs);
        e.write_empty(); // file contracts
        e.write_empty(); // file contract revisions
        e.write_empty(); // storage proofs
        e.write_empty(); // siafund inputs
        e.write_empty(); // siafund outputs
        e.write_slice(&self.miner_fees);
        e.write_empty(); // arbitrary data
    }

    pub fn id(&self) -> TransactionId {
        let mut e = Encoder::default();
        self.encode_body(&mut e, &[]);
        Hash256(e.hash())
    }

    /// Digest signed by the signature at `sig_index`. Whole-transaction
    /// signatures commit to every input, output and fee plus the replay
    /// prefix active at `height`.
    pub fn sig_hash(&self, sig_index: usize, height: u64) -> WalletResult<Hash256> {
        let sig = self.transaction_signatures.get(sig_index).ok_or_else(|| {
            WalletError::invalid(format!("no signature at index {}", sig_index))
        })?;
        if !sig.covered_fields.whole_transaction {
            return Err(WalletError::invalid(
                "only whole-transaction signatures are supported",
            ));
        }
        let mut e = Encoder::default();
        self.encode_body(&mut e, replay_prefix(height));
        sig.parent_id.encode(&mut e);
        e.write_u64(sig.public_key_index);
        e.write_u64(sig.timelock);
        Ok(Hash256(e.hash()))
    }

    /// Checks the signature at `sig_index` against the unlock conditions of the
    /// input it covers.
    pub fn verify_signature(&self, sig_index: usize, height: u64) -> WalletResult<()> {
        let digest = self.sig_hash(sig_index, height)?;
        let sig = &self.transaction_signatures[sig_index];
        let input = self
            .siacoin_inputs
            .iter()
            .find(|input| input.parent_id == sig.parent_id)
            .ok_or_else(|| WalletError::invalid("signature does not cover any input"))?;
        let key = input
            .unlock_conditions
            .public_keys
            .get(sig.public_key_index as usize)
            .ok_or_else(|| WalletError::invalid("public key index out of range"))?;
        let key = VerifyingKey::from_bytes(&key.0)
            .map_err(|err| WalletError::invalid(format!("bad public key: {}", err)))?;
        let signature = Ed25519Signature::from_slice(&sig.signature)
            .map_err(|err| WalletError::invalid(format!("bad signature: {}", err)))?;
        key.verify(digest.as_bytes(), &signature)
            .map_err(|err| WalletError::invalid(format!("signature mismatch: {}", err)))
    }

    pub fn encoded_size(&self) -> usize {
        self.encoded_len()
    }

    pub fn output_sum(&self) -> Currency {
        self.siacoin_outputs.iter().map(|o| &o.value).sum()
    }
}

impl Encode for Transaction {
    fn encode(&self, e: &mut Encoder) {
        self.encode_body(e, &[]);
        e.write_slice(&self.transaction_signatures);
    }
}

/// An unspent output owned by one of the wallet's tracked addresses.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Utxo {
    #[serde(rename = "ID")]
    pub id: OutputId,
    pub value: Currency,
    #[serde(rename = "unlockConditions")]
    pub unlock_conditions: UnlockConditions,
    #[serde(rename = "unlockHash")]
    pub unlock_hash: UnlockHash,
    #[serde(rename = "keyIndex")]
    pub key_index: u64,
}

/// What the ledger service records about a tracked address.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct AddressInfo {
    #[serde(rename = "unlockConditions", alias = "UnlockConditions")]
    pub unlock_conditions: UnlockConditions,
    #[serde(rename = "keyIndex", alias = "KeyIndex")]
    pub key_index: u64,
}

/// A UTXO staged as a candidate spend for one funding attempt.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ValuedInput {
    pub input: SiacoinInput,
    pub value: Currency,
}

impl From<&Utxo> for ValuedInput {
    fn from(utxo: &Utxo) -> Self {
        ValuedInput {
            input: SiacoinInput {
                parent_id: utxo.id,
                unlock_conditions: utxo.unlock_conditions.clone(),
            },
            value: utxo.value.clone(),
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct ConsensusTip {
    pub height: u64,
    #[serde(rename = "ccid", default)]
    pub change_id: Hash256,
}

/// Byte strings travel as standard base64, the ledger service's JSON form.
mod base64_bytes {
    use base64::{engine::general_purpose::STANDARD as B64, Engine};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&B64.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = Option::<String>::deserialize(deserializer)?.unwrap_or_default();
        B64.decode(s).map_err(serde::de::Error::custom)
    }
}
