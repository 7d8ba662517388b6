//! Client side of the ledger-watching service that tracks the wallet's
//! addresses and outputs.

use std::collections::BTreeMap;
use std::time::Duration;

use reqwest::{Client, Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::currency::Currency;
use crate::donation::discover_donation_address;
use crate::error::{WalletError, WalletResult};
use crate::types::{AddressInfo, ConsensusTip, Transaction, TransactionId, UnlockHash, Utxo};

pub const DEFAULT_API_ADDR: &str = "localhost:9380";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Operations the wallet needs from the ledger service. Every call is a
/// single request; failures are returned verbatim and never retried here.
#[allow(async_fn_in_trait)]
pub trait LedgerService {
    async fn balance(&self, confirmed_only: bool) -> WalletResult<Currency>;

    async fn addresses(&self) -> WalletResult<Vec<UnlockHash>>;

    async fn address_info(&self, addr: &UnlockHash) -> WalletResult<AddressInfo>;

    /// Starts tracking the address derived from `info`.
    async fn watch_address(&self, info: &AddressInfo) -> WalletResult<()>;

    async fn unspent_outputs(&self, confirmed_only: bool) -> WalletResult<Vec<Utxo>>;

    async fn recommended_fee(&self) -> WalletResult<Currency>;

    async fn consensus(&self) -> WalletResult<ConsensusTip>;

    async fn transactions(&self, addr: &UnlockHash, max: usize) -> WalletResult<Vec<TransactionId>>;

    async fn broadcast(&self, txn_set: &[Transaction]) -> WalletResult<()>;

    /// The service's donation address, if it takes donations. Never fails.
    async fn donation_address(&self) -> Option<UnlockHash>;
}

/// HTTP client for a walrus server.
#[derive(Clone)]
pub struct WalrusClient {
    api_addr: String,
    base: String,
    client: Client,
}

impl WalrusClient {
    pub fn new(api_addr: &str) -> WalletResult<Self> {
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        let base = if api_addr.contains("://") {
            api_addr.trim_end_matches('/').to_string()
        } else {
            format!("http://{}", api_addr.trim_end_matches('/'))
        };
        Ok(Self {
            api_addr: api_addr.to_string(),
            base,
            client,
        })
    }

    fn url(&self, route: &str) -> String {
        format!("{}{}", self.base, route)
    }

    async fn send<B: Serialize + ?Sized>(
        &self,
        method: Method,
        route: &str,
        body: Option<&B>,
    ) -> WalletResult<reqwest::Response> {
        let mut req = self.client.request(method.clone(), self.url(route));
        if let Some(body) = body {
            req = req.json(body);
        }
        tracing::debug!("{} {}", method, route);
        let resp = req.send().await?;
        match resp.status() {
            StatusCode::OK => Ok(resp),
            code => {
                let text = resp.text().await.unwrap_or_default();
                tracing::debug!("{} {} returned {}: {}", method, route, code, text.trim());
                Err(WalletError::Remote(text.trim().to_string()))
            }
        }
    }

    async fn get<T: DeserializeOwned>(&self, route: &str) -> WalletResult<T> {
        let resp = self.send::<()>(Method::GET, route, None).await?;
        Ok(resp.json().await?)
    }

    async fn post<B: Serialize + ?Sized>(&self, route: &str, body: &B) -> WalletResult<()> {
        self.send(Method::POST, route, Some(body)).await?;
        Ok(())
    }
}

impl LedgerService for WalrusClient {
    async fn balance(&self, confirmed_only: bool) -> WalletResult<Currency> {
        self.get(&format!("/balance?limbo={}", !confirmed_only)).await
    }

    async fn addresses(&self) -> WalletResult<Vec<UnlockHash>> {
        self.get("/addresses").await
    }

    async fn address_info(&self, addr: &UnlockHash) -> WalletResult<AddressInfo> {
        self.get(&format!("/addresses/{}", addr)).await
    }

    async fn watch_address(&self, info: &AddressInfo) -> WalletResult<()> {
        self.post("/addresses", info).await
    }

    async fn unspent_outputs(&self, confirmed_only: bool) -> WalletResult<Vec<Utxo>> {
        self.get(&format!("/utxos?limbo={}", !confirmed_only)).await
    }

    async fn recommended_fee(&self) -> WalletResult<Currency> {
        self.get("/fee").await
    }

    async fn consensus(&self) -> WalletResult<ConsensusTip> {
        self.get("/consensus").await
    }

    async fn transactions(&self, addr: &UnlockHash, max: usize) -> WalletResult<Vec<TransactionId>> {
        self.get(&format!("/transactions?addr={}&max={}", addr, max))
            .await
    }

    async fn broadcast(&self, txn_set: &[Transaction]) -> WalletResult<()> {
        self.post("/broadcast", txn_set).await
    }

    async fn donation_address(&self) -> Option<UnlockHash> {
        discover_donation_address(&self.client, &self.api_addr).await
    }
}

/// Lowest key index not yet used by any tracked address.
pub async fn next_unused_index<L: LedgerService>(ledger: &L) -> WalletResult<u64> {
    let addrs = ledger.addresses().await?;
    let mut index = 0;
    for addr in addrs.iter() {
        let info = ledger.address_info(addr).await?;
        index = index.max(info.key_index);
    }
    if !addrs.is_empty() {
        index += 1;
    }
    Ok(index)
}

/// Every tracked address with the key index it was registered under.
pub async fn owned_key_indices<L: LedgerService>(ledger: &L) -> WalletResult<BTreeMap<UnlockHash, u64>> {
    let mut owned = BTreeMap::new();
    for addr in ledger.addresses().await? {
        let info = ledger.address_info(&addr).await?;
        owned.insert(addr, info.key_index);
    }
    Ok(owned)
}
