use reqwest::Url;

use crate::currency::Currency;
use crate::error::{WalletError, WalletResult};
use crate::selection::{CoinSelector, Selection, SizeEstimator};
use crate::types::{SiacoinOutput, UnlockHash, ValuedInput};

/// Smallest donation, in whole coins.
pub const DONATION_FLOOR_COINS: u64 = 10;
/// Donation share of the payment, in percent.
pub const DONATION_PERCENT: u64 = 1;

/// `max(1% of the payment, 10 SC)`, or zero when the server takes no donations.
pub fn compute_donation(payment_total: &Currency, donation_address: Option<&UnlockHash>) -> Currency {
    if donation_address.is_none() {
        return Currency::zero();
    }
    let share = payment_total.mul_rat(DONATION_PERCENT, 100);
    let floor = Currency::coins(DONATION_FLOOR_COINS);
    std::cmp::max(share, floor)
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Donation {
    pub address: UnlockHash,
    pub value: Currency,
}

impl Donation {
    pub fn output(&self) -> SiacoinOutput {
        SiacoinOutput {
            value: self.value.clone(),
            unlock_hash: self.address,
        }
    }
}

/// The committed result of funding a payment.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FundingPlan {
    pub selection: Selection,
    pub donation: Option<Donation>,
    /// True when the full donation could not be afforded and the leftover
    /// change was donated instead.
    pub donation_from_change: bool,
}

/// Funds `payment_total` across `recipients` outputs, adding the donation
/// when one is configured.
///
/// If the payment plus donation cannot be covered, the payment alone is
/// funded and whatever change it leaves becomes the donation. Only when
/// that also fails is [`WalletError::InsufficientFunds`] returned.
pub fn fund_with_donation<E: SizeEstimator + ?Sized>(
    selector: &CoinSelector<'_, E>,
    payment_total: &Currency,
    recipients: usize,
    donation_address: Option<UnlockHash>,
    available: &[ValuedInput],
) -> WalletResult<FundingPlan> {
    let address = match donation_address {
        Some(address) => address,
        None => {
            let selection = selector.select(payment_total, recipients, available)?;
            return Ok(FundingPlan {
                selection,
                donation: None,
                donation_from_change: false,
            });
        }
    };

    let donation = compute_donation(payment_total, Some(&address));
    match selector.select(&(payment_total + &donation), recipients + 1, available) {
        Ok(selection) => {
            return Ok(FundingPlan {
                selection,
                donation: Some(Donation {
                    address,
                    value: donation,
                }),
                donation_from_change: false,
            })
        }
        Err(WalletError::InsufficientFunds) => {
            tracing::info!(
                "cannot afford donation of {}, retrying without it",
                donation.to_units_string()
            );
        }
        Err(err) => return Err(err),
    }

    // the change output priced by the selector becomes the donation output
    let mut selection = selector.select(payment_total, recipients, available)?;
    let leftover = std::mem::replace(&mut selection.change, Currency::zero());
    let donation = if leftover.is_zero() {
        None
    } else {
        Some(Donation {
            address,
            value: leftover,
        })
    };
    Ok(FundingPlan {
        selection,
        donation,
        donation_from_change: true,
    })
}

/// Derives the donations endpoint from the service address: the last two
/// path segments, which must be `wallet/<id>`, are replaced by `donations`.
pub fn donation_url(api_addr: &str) -> Option<Url> {
    let with_scheme = if api_addr.contains("://") {
        api_addr.to_string()
    } else {
        format!("http://{}", api_addr)
    };
    let mut url = Url::parse(&with_scheme).ok()?;
    let segments: Vec<String> = url.path_segments()?.map(str::to_string).collect();
    if segments.len() < 2 || segments[segments.len() - 2] != "wallet" {
        return None;
    }
    let mut path: Vec<&str> = segments[..segments.len() - 2]
        .iter()
        .map(String::as_str)
        .collect();
    path.push("donations");
    url.set_path(&format!("/{}", path.join("/")));
    Some(url)
}

/// Asks the service for its donation address. Every failure means "no donation".
pub async fn discover_donation_address(
    client: &reqwest::Client,
    api_addr: &str,
) -> Option<UnlockHash> {
    let url = donation_url(api_addr)?;
    let resp = match client.get(url.clone()).send().await {
        Ok(resp) => resp,
        Err(err) => {
            tracing::debug!("donation lookup at {} failed: {}", url, err);
            return None;
        }
    };
    if !resp.status().is_success() {
        tracing::debug!("donation lookup at {} returned {}", url, resp.status());
        return None;
    }
    resp.json::<UnlockHash>().await.ok()
}
