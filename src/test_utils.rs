//! Fixtures shared by the unit tests: deterministic inputs and addresses plus
//! in-memory stand-ins for the ledger service, a hardware device and the
//! terminal.

use std::collections::{BTreeMap, VecDeque};
use std::net::SocketAddr;
use std::sync::Mutex;

use ed25519_dalek::Signer;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use crate::currency::Currency;
use crate::error::{WalletError, WalletResult};
use crate::ledger::LedgerService;
use crate::prompt::Prompt;
use crate::signer::device::DeviceTransport;
use crate::signer::seed::Seed;
use crate::types::{
    AddressInfo, ConsensusTip, Hash256, PublicKey, SiacoinInput, Transaction, TransactionId,
    UnlockConditions, UnlockHash, Utxo, ValuedInput,
};

pub fn test_seed() -> Seed {
    Seed::from_bytes([7; 32])
}

/// Standard unlock conditions for key `index` of [`test_seed`].
pub fn conditions(index: u64) -> UnlockConditions {
    UnlockConditions::standard(test_seed().public_key(index))
}

pub fn address(n: u8) -> UnlockHash {
    UnlockConditions::standard(PublicKey([n; 32])).unlock_hash()
}

pub fn valued_input(id_byte: u8, value: u64) -> ValuedInput {
    ValuedInput {
        input: SiacoinInput {
            parent_id: Hash256([id_byte; 32]),
            unlock_conditions: UnlockConditions::standard(PublicKey([id_byte; 32])),
        },
        value: Currency::from(value),
    }
}

/// One input per value, with parent ids 1, 2, 3...
pub fn valued_inputs(values: &[u64]) -> Vec<ValuedInput> {
    values
        .iter()
        .enumerate()
        .map(|(i, value)| valued_input(i as u8 + 1, *value))
        .collect()
}

#[derive(Default)]
struct LedgerState {
    addresses: BTreeMap<UnlockHash, AddressInfo>,
    utxos: Vec<Utxo>,
    fee: Currency,
    height: u64,
    donation: Option<UnlockHash>,
    failure: Option<String>,
    watched: Vec<AddressInfo>,
    broadcasts: Vec<Vec<Transaction>>,
}

/// Local HTTP endpoint answering every request with the same canned reply.
pub async fn serve_canned(status: &str, body: &str) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let reply = format!(
        "HTTP/1.1 {}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
        status,
        body.len(),
        body
    );
    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            read_request(&mut socket).await;
            let _ = socket.write_all(reply.as_bytes()).await;
            let _ = socket.shutdown().await;
        }
    });
    addr
}

/// Drains one request, headers and body, so closing never resets the client.
async fn read_request(socket: &mut tokio::net::TcpStream) {
    let mut request = Vec::new();
    let mut chunk = [0u8; 1024];
    loop {
        let n = match socket.read(&mut chunk).await {
            Ok(0) | Err(_) => return,
            Ok(n) => n,
        };
        request.extend_from_slice(&chunk[..n]);
        let end = match request.windows(4).position(|w| w == b"\r\n\r\n") {
            Some(end) => end,
            None => continue,
        };
        let head = String::from_utf8_lossy(&request[..end]).to_ascii_lowercase();
        let body_len = head
            .lines()
            .find_map(|line| line.strip_prefix("content-length:"))
            .and_then(|len| len.trim().parse::<usize>().ok())
            .unwrap_or(0);
        if request.len() >= end + 4 + body_len {
            return;
        }
    }
}

/// An address nothing is listening on.
pub async fn closed_port() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap()
}

/// In-memory ledger service tracking keys of [`test_seed`].
#[derive(Default)]
pub struct MockLedger {
    state: Mutex<LedgerState>,
}

impl MockLedger {
    fn state(&self) -> std::sync::MutexGuard<'_, LedgerState> {
        self.state.lock().unwrap()
    }

    fn check(&self) -> WalletResult<()> {
        match &self.state().failure {
            Some(msg) => Err(WalletError::Remote(msg.clone())),
            None => Ok(()),
        }
    }

    /// Tracks the address of key `key_index` without recording a watch call.
    pub fn track(&self, key_index: u64) -> UnlockHash {
        let info = AddressInfo {
            unlock_conditions: conditions(key_index),
            key_index,
        };
        let addr = info.unlock_conditions.unlock_hash();
        self.state().addresses.insert(addr, info);
        addr
    }

    /// Adds a spendable output locked to key `key_index`, tracking its address.
    pub fn fund(&self, key_index: u64, value: Currency) -> Utxo {
        let unlock_hash = self.track(key_index);
        let mut state = self.state();
        let id = Hash256([state.utxos.len() as u8 + 1; 32]);
        let utxo = Utxo {
            id,
            value,
            unlock_conditions: conditions(key_index),
            unlock_hash,
            key_index,
        };
        state.utxos.push(utxo.clone());
        utxo
    }

    pub fn set_fee(&self, fee_per_byte: Currency) {
        self.state().fee = fee_per_byte;
    }

    pub fn set_height(&self, height: u64) {
        self.state().height = height;
    }

    pub fn set_donation_address(&self, addr: UnlockHash) {
        self.state().donation = Some(addr);
    }

    /// Makes every subsequent call fail with `msg`.
    pub fn fail_with(&self, msg: &str) {
        self.state().failure = Some(msg.to_string());
    }

    pub fn watched(&self) -> Vec<AddressInfo> {
        self.state().watched.clone()
    }

    pub fn broadcasts(&self) -> Vec<Vec<Transaction>> {
        self.state().broadcasts.clone()
    }
}

impl LedgerService for MockLedger {
    async fn balance(&self, _confirmed_only: bool) -> WalletResult<Currency> {
        self.check()?;
        Ok(self.state().utxos.iter().map(|u| &u.value).sum())
    }

    async fn addresses(&self) -> WalletResult<Vec<UnlockHash>> {
        self.check()?;
        Ok(self.state().addresses.keys().copied().collect())
    }

    async fn address_info(&self, addr: &UnlockHash) -> WalletResult<AddressInfo> {
        self.check()?;
        self.state()
            .addresses
            .get(addr)
            .cloned()
            .ok_or_else(|| WalletError::Remote("no such entry".to_string()))
    }

    async fn watch_address(&self, info: &AddressInfo) -> WalletResult<()> {
        self.check()?;
        let mut state = self.state();
        state
            .addresses
            .insert(info.unlock_conditions.unlock_hash(), info.clone());
        state.watched.push(info.clone());
        Ok(())
    }

    async fn unspent_outputs(&self, _confirmed_only: bool) -> WalletResult<Vec<Utxo>> {
        self.check()?;
        Ok(self.state().utxos.clone())
    }

    async fn recommended_fee(&self) -> WalletResult<Currency> {
        self.check()?;
        Ok(self.state().fee.clone())
    }

    async fn consensus(&self) -> WalletResult<ConsensusTip> {
        self.check()?;
        Ok(ConsensusTip {
            height: self.state().height,
            change_id: Hash256::default(),
        })
    }

    async fn transactions(&self, _addr: &UnlockHash, _max: usize) -> WalletResult<Vec<TransactionId>> {
        self.check()?;
        Ok(vec![])
    }

    async fn broadcast(&self, txn_set: &[Transaction]) -> WalletResult<()> {
        self.check()?;
        self.state().broadcasts.push(txn_set.to_vec());
        Ok(())
    }

    async fn donation_address(&self) -> Option<UnlockHash> {
        self.state().donation
    }
}

/// Device stand-in that signs with a seed and can be told to have the user
/// decline a particular request.
pub struct MockDevice {
    seed: Seed,
    height: u64,
    requests: usize,
    decline_request: Option<usize>,
}

impl MockDevice {
    pub fn new(seed: Seed) -> Self {
        Self {
            seed,
            height: 0,
            requests: 0,
            decline_request: None,
        }
    }

    /// The user declines the `n`-th signing request (counting from 1).
    pub fn declining(mut self, n: usize) -> Self {
        self.decline_request = Some(n);
        self
    }

    pub fn at_height(mut self, height: u64) -> Self {
        self.height = height;
        self
    }
}

impl DeviceTransport for MockDevice {
    fn public_key(&mut self, index: u32) -> WalletResult<PublicKey> {
        Ok(self.seed.public_key(u64::from(index)))
    }

    fn sign_input(&mut self, txn: &Transaction, sig_index: u16, key_index: u32) -> WalletResult<[u8; 64]> {
        self.requests += 1;
        if self.decline_request == Some(self.requests) {
            return Err(WalletError::UserCancelled);
        }
        let digest = txn.sig_hash(usize::from(sig_index), self.height)?;
        let key = self.seed.secret_key(u64::from(key_index));
        Ok(key.sign(digest.as_bytes()).to_bytes())
    }
}

/// Answers confirmations from a script and records everything shown.
#[derive(Default)]
pub struct ScriptedPrompt {
    answers: VecDeque<bool>,
    pub shown: Vec<String>,
    pub confirmations: Vec<String>,
}

impl ScriptedPrompt {
    /// Accepts every confirmation.
    pub fn accepting() -> Self {
        Self::default()
    }

    /// Answers the first confirmations in order; later ones are accepted.
    pub fn answering(answers: &[bool]) -> Self {
        Self {
            answers: answers.iter().copied().collect(),
            ..Default::default()
        }
    }

    pub fn output(&self) -> String {
        self.shown.join("\n")
    }
}

impl Prompt for ScriptedPrompt {
    fn show(&mut self, line: &str) {
        self.shown.push(line.to_string());
    }

    fn confirm(&mut self, message: &str) -> WalletResult<()> {
        self.confirmations.push(message.to_string());
        if self.answers.pop_front().unwrap_or(true) {
            Ok(())
        } else {
            Err(WalletError::UserCancelled)
        }
    }
}
