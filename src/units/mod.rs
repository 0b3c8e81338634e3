use std::fmt;
use std::str::FromStr;

use serde::{de::Error, Deserialize, Deserializer, Serialize, Serializer};

pub const WEI_PER_ETHER: u128 = 1_000_000_000_000_000_000; // 1 ether = 1e18 wei
const ETHER_DECIMALS: usize = 18;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum UnitsError {
    #[error("empty amount")]
    Empty,
    #[error("invalid amount {0:?}")]
    Invalid(String),
    #[error("amount {0:?} has more than 18 decimal places")]
    TooPrecise(String),
    #[error("amount {0:?} does not fit in 128 bits")]
    Overflow(String),
}

/// Quantity of the pooled asset in its smallest unit.
///
/// Serialized as a decimal string so that full 128-bit values survive JSON
/// readers that only handle 64-bit numbers.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Wei(u128);

impl Wei {
    pub const ZERO: Wei = Wei(0);
    pub const ONE_ETHER: Wei = Wei(WEI_PER_ETHER);

    pub const fn from_wei(wei: u128) -> Self {
        Wei(wei)
    }

    pub const fn as_wei(&self) -> u128 {
        self.0
    }

    pub fn checked_add(self, other: Wei) -> Option<Wei> {
        self.0.checked_add(other.0).map(Wei)
    }

    pub fn checked_sub(self, other: Wei) -> Option<Wei> {
        self.0.checked_sub(other.0).map(Wei)
    }

    /// Parses a decimal ether amount such as `"0.1"` or `"12"`.
    pub fn parse_ether(input: &str) -> Result<Wei, UnitsError> {
        let s = input.trim();
        if s.is_empty() {
            return Err(UnitsError::Empty);
        }
        let (whole, frac) = match s.split_once('.') {
            Some((w, f)) => (w, f),
            None => (s, ""),
        };
        if whole.is_empty() && frac.is_empty() {
            return Err(UnitsError::Invalid(input.to_string()));
        }
        let all_digits = |part: &str| part.bytes().all(|b| b.is_ascii_digit());
        if !all_digits(whole) || !all_digits(frac) {
            return Err(UnitsError::Invalid(input.to_string()));
        }
        if frac.len() > ETHER_DECIMALS {
            return Err(UnitsError::TooPrecise(input.to_string()));
        }

        let overflow = || UnitsError::Overflow(input.to_string());
        let whole_wei = if whole.is_empty() {
            0
        } else {
            whole
                .parse::<u128>()
                .map_err(|_| overflow())?
                .checked_mul(WEI_PER_ETHER)
                .ok_or_else(overflow)?
        };
        let frac_wei = if frac.is_empty() {
            0
        } else {
            let padded = format!("{frac:0<width$}", width = ETHER_DECIMALS);
            padded.parse::<u128>().map_err(|_| overflow())?
        };
        whole_wei
            .checked_add(frac_wei)
            .map(Wei)
            .ok_or_else(overflow)
    }

    /// Formats as decimal ether, always with at least one fractional digit.
    pub fn format_ether(&self) -> String {
        let whole = self.0 / WEI_PER_ETHER;
        let frac = self.0 % WEI_PER_ETHER;
        if frac == 0 {
            return format!("{whole}.0");
        }
        let digits = format!("{frac:0>width$}", width = ETHER_DECIMALS);
        format!("{whole}.{}", digits.trim_end_matches('0'))
    }
}

impl fmt::Display for Wei {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Wei {
    type Err = UnitsError;

    /// Parses a plain integer wei amount.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(UnitsError::Empty);
        }
        if !s.bytes().all(|b| b.is_ascii_digit()) {
            return Err(UnitsError::Invalid(s.to_string()));
        }
        s.parse::<u128>()
            .map(Wei)
            .map_err(|_| UnitsError::Overflow(s.to_string()))
    }
}

impl Serialize for Wei {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.0.to_string())
    }
}

impl<'de> Deserialize<'de> for Wei {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let encoded = String::deserialize(deserializer)?;
        encoded.parse().map_err(D::Error::custom)
    }
}
