use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign};
use std::str::FromStr;

use num_bigint::BigUint;
use num_rational::Ratio;
use num_traits::{ToPrimitive, Zero};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{WalletError, WalletResult};

/// Number of hastings in one coin.
pub const COIN_EXPONENT: u32 = 24;

const UNIT_NAMES: [&str; 11] = [
    "aS", "fS", "pS", "nS", "uS", "mS", "SC", "KS", "MS", "GS", "TS",
];

/// A non-negative amount of hastings, the indivisible unit of the chain.
#[derive(Clone, Default, Hash, Eq, PartialEq, Ord, PartialOrd)]
pub struct Currency(BigUint);

impl Currency {
    pub fn zero() -> Self {
        Currency(BigUint::zero())
    }

    /// One whole coin.
    pub fn coin() -> Self {
        Currency(BigUint::from(10u32).pow(COIN_EXPONENT))
    }

    pub fn coins(n: u64) -> Self {
        Self::coin().mul_u64(n)
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    pub fn mul_u64(&self, n: u64) -> Self {
        Currency(&self.0 * BigUint::from(n))
    }

    /// Multiplies by `num / den`, truncating towards zero.
    pub fn mul_rat(&self, num: u64, den: u64) -> Self {
        debug_assert!(den != 0);
        Currency(&self.0 * BigUint::from(num) / BigUint::from(den))
    }

    pub fn checked_sub(&self, other: &Currency) -> Option<Currency> {
        if self.0 < other.0 {
            None
        } else {
            Some(Currency(&self.0 - &other.0))
        }
    }

    /// Subtraction that refuses to go negative.
    pub fn sub(&self, other: &Currency) -> WalletResult<Currency> {
        self.checked_sub(other).ok_or_else(|| {
            WalletError::invalid(format!("currency underflow: {} - {}", self, other))
        })
    }

    /// Big-endian bytes with leading zeros stripped; empty for zero.
    pub fn to_bytes_be(&self) -> Vec<u8> {
        if self.is_zero() {
            vec![]
        } else {
            self.0.to_bytes_be()
        }
    }

    /// Parses a coin amount such as `"1.5"`, `"10"` or `"3/2"` into hastings.
    /// Fractions of a hasting are truncated.
    pub fn parse_coins(s: &str) -> WalletResult<Currency> {
        let ratio = parse_ratio(s.trim())
            .ok_or_else(|| WalletError::invalid(format!("invalid amount {:?}", s)))?;
        let hastings = ratio * Ratio::from_integer(Self::coin().0);
        Ok(Currency(hastings.to_integer()))
    }

    /// Renders the amount in coins with exactly `decimals` fractional digits,
    /// rounding half up.
    pub fn to_coin_string(&self, decimals: u32) -> String {
        let scale = BigUint::from(10u32).pow(decimals);
        let precision = Self::coin().0;
        let half = &precision / BigUint::from(2u32);
        let scaled = (&self.0 * &scale + half) / precision;
        if decimals == 0 {
            return scaled.to_string();
        }
        let whole = &scaled / &scale;
        let frac = (&scaled % &scale).to_string();
        format!(
            "{}.{}{}",
            whole,
            "0".repeat(decimals as usize - frac.len()),
            frac
        )
    }

    /// Human readable amount using the largest fitting unit, e.g. `1.5 SC`.
    pub fn to_units_string(&self) -> String {
        let mut mag = BigUint::from(1_000_000u32);
        if self.0 < mag {
            return format!("{} H", self.0);
        }
        let thousand = BigUint::from(1000u32);
        let mut unit = UNIT_NAMES[0];
        for name in UNIT_NAMES {
            unit = name;
            if self.0 < &mag * &thousand {
                break;
            } else if name != "TS" {
                mag *= &thousand;
            }
        }
        let value = self.0.to_f64().unwrap_or(f64::MAX) / mag.to_f64().unwrap_or(f64::MAX);
        format!("{} {}", format_significant(value, 4), unit)
    }
}

fn parse_ratio(s: &str) -> Option<Ratio<BigUint>> {
    if let Some((num, den)) = s.split_once('/') {
        let num = parse_digits(num)?;
        let den = parse_digits(den)?;
        if den.is_zero() {
            return None;
        }
        return Some(Ratio::new(num, den));
    }
    let (whole, frac) = s.split_once('.').unwrap_or((s, ""));
    if whole.is_empty() && frac.is_empty() {
        return None;
    }
    let whole = if whole.is_empty() {
        BigUint::zero()
    } else {
        parse_digits(whole)?
    };
    if frac.is_empty() {
        return Some(Ratio::from_integer(whole));
    }
    let den = BigUint::from(10u32).pow(frac.len() as u32);
    let frac = parse_digits(frac)?;
    Some(Ratio::new(whole * &den + frac, den))
}

fn parse_digits(s: &str) -> Option<BigUint> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    BigUint::parse_bytes(s.as_bytes(), 10)
}

/// `%.Ng`-style formatting: `digits` significant digits, trailing zeros removed.
fn format_significant(x: f64, digits: usize) -> String {
    if x == 0.0 || !x.is_finite() {
        return format!("{}", x);
    }
    let exp = x.abs().log10().floor() as i32;
    if exp < -4 || exp >= digits as i32 {
        let s = format!("{:.*e}", digits - 1, x);
        return match s.split_once('e') {
            Some((mantissa, exponent)) => {
                let exponent: i32 = exponent.parse().unwrap_or(0);
                let sign = if exponent < 0 { '-' } else { '+' };
                format!(
                    "{}e{}{:02}",
                    trim_fraction(mantissa),
                    sign,
                    exponent.abs()
                )
            }
            None => s,
        };
    }
    let decimals = (digits as i32 - 1 - exp).max(0) as usize;
    trim_fraction(&format!("{:.*}", decimals, x)).to_string()
}

fn trim_fraction(s: &str) -> &str {
    if s.contains('.') {
        s.trim_end_matches('0').trim_end_matches('.')
    } else {
        s
    }
}

impl From<u64> for Currency {
    fn from(value: u64) -> Self {
        Currency(BigUint::from(value))
    }
}

impl From<BigUint> for Currency {
    fn from(value: BigUint) -> Self {
        Currency(value)
    }
}

impl FromStr for Currency {
    type Err = WalletError;

    /// Parses an integer amount of hastings.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_digits(s)
            .map(Currency)
            .ok_or_else(|| WalletError::invalid(format!("invalid currency {:?}", s)))
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}H", self.0)
    }
}

impl Add for Currency {
    type Output = Currency;

    fn add(self, rhs: Currency) -> Currency {
        Currency(self.0 + rhs.0)
    }
}

impl<'a> Add<&'a Currency> for &'a Currency {
    type Output = Currency;

    fn add(self, rhs: &'a Currency) -> Currency {
        Currency(&self.0 + &rhs.0)
    }
}

impl AddAssign<&Currency> for Currency {
    fn add_assign(&mut self, rhs: &Currency) {
        self.0 += &rhs.0;
    }
}

impl<'a> Sum<&'a Currency> for Currency {
    fn sum<I: Iterator<Item = &'a Currency>>(iter: I) -> Self {
        iter.fold(Currency::zero(), |mut acc, c| {
            acc += c;
            acc
        })
    }
}

impl Sum for Currency {
    fn sum<I: Iterator<Item = Currency>>(iter: I) -> Self {
        iter.fold(Currency::zero(), |acc, c| acc + c)
    }
}

impl Serialize for Currency {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0.to_string())
    }
}

impl<'de> Deserialize<'de> for Currency {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Currency::from_str(&s).map_err(serde::de::Error::custom)
    }
}
