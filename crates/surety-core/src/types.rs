//! Identifiers, currency, and ledger context shared by every component.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Opaque account reference on the ledger (airline, passenger, reporter, contract).
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountId(pub String);

impl AccountId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Minor units per currency unit.
pub const MINOR_PER_UNIT: u128 = 1_000_000_000_000_000_000;
const UNIT_DECIMALS: usize = 18;

/// Currency amount in minor units (1 unit = 10^18 minor units).
///
/// Serialized as a decimal unit string ("0.15") so values survive JSON and TOML
/// without precision loss.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Amount(pub u128);

impl Amount {
    pub const ZERO: Amount = Amount(0);

    pub const fn from_minor(minor: u128) -> Self {
        Self(minor)
    }

    pub const fn from_units(units: u128) -> Self {
        Self(units * MINOR_PER_UNIT)
    }

    pub fn minor(self) -> u128 {
        self.0
    }

    pub fn is_zero(self) -> bool {
        self.0 == 0
    }

    pub fn checked_add(self, other: Amount) -> Option<Amount> {
        self.0.checked_add(other.0).map(Amount)
    }

    pub fn checked_sub(self, other: Amount) -> Option<Amount> {
        self.0.checked_sub(other.0).map(Amount)
    }

    /// `self * numerator / denominator`, rounded down.
    pub fn mul_ratio(self, numerator: u32, denominator: u32) -> Option<Amount> {
        if denominator == 0 {
            return None;
        }
        self.0
            .checked_mul(u128::from(numerator))
            .map(|scaled| Amount(scaled / u128::from(denominator)))
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let whole = self.0 / MINOR_PER_UNIT;
        let frac = self.0 % MINOR_PER_UNIT;
        if frac == 0 {
            return write!(f, "{}", whole);
        }
        let digits = format!("{:0width$}", frac, width = UNIT_DECIMALS);
        write!(f, "{}.{}", whole, digits.trim_end_matches('0'))
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AmountParseError {
    #[error("empty amount")]
    Empty,
    #[error("invalid amount '{0}'")]
    Invalid(String),
    #[error("amount '{0}' has more than 18 decimal places")]
    TooPrecise(String),
    #[error("amount '{0}' is out of range")]
    OutOfRange(String),
}

impl FromStr for Amount {
    type Err = AmountParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(AmountParseError::Empty);
        }

        let (whole, frac) = match s.split_once('.') {
            Some((whole, frac)) => (whole, frac),
            None => (s, ""),
        };
        let all_digits = |part: &str| part.bytes().all(|b| b.is_ascii_digit());
        if (whole.is_empty() && frac.is_empty()) || !all_digits(whole) || !all_digits(frac) {
            return Err(AmountParseError::Invalid(s.to_string()));
        }
        if frac.len() > UNIT_DECIMALS {
            return Err(AmountParseError::TooPrecise(s.to_string()));
        }

        let out_of_range = || AmountParseError::OutOfRange(s.to_string());
        let whole_minor = if whole.is_empty() {
            0
        } else {
            whole
                .parse::<u128>()
                .map_err(|_| out_of_range())?
                .checked_mul(MINOR_PER_UNIT)
                .ok_or_else(out_of_range)?
        };
        let frac_minor = if frac.is_empty() {
            0
        } else {
            let padded = format!("{:0<width$}", frac, width = UNIT_DECIMALS);
            padded.parse::<u128>().map_err(|_| out_of_range())?
        };

        whole_minor
            .checked_add(frac_minor)
            .map(Amount)
            .ok_or_else(out_of_range)
    }
}

impl Serialize for Amount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Amount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// A scheduled departure of one airline's flight.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FlightKey {
    pub airline: AccountId,
    pub flight: String,
    /// Departure time, unix seconds.
    pub departure: u64,
}

impl FlightKey {
    pub fn new(airline: AccountId, flight: impl Into<String>, departure: u64) -> Self {
        Self {
            airline,
            flight: flight.into(),
            departure,
        }
    }
}

impl fmt::Display for FlightKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}@{}", self.airline, self.flight, self.departure)
    }
}

/// Policy identity: exactly one policy per passenger per flight departure.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PolicyKey {
    pub passenger: AccountId,
    pub flight: FlightKey,
}

impl PolicyKey {
    pub fn new(passenger: AccountId, flight: FlightKey) -> Self {
        Self { passenger, flight }
    }
}

/// Status-request identity: the index reporters filter on plus the flight.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RequestKey {
    pub index: u8,
    pub flight: FlightKey,
}

/// Observed flight status reported by oracles.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusCode {
    Unknown,
    OnTime,
    LateAirline,
    LateWeather,
    LateTechnical,
    LateOther,
}

impl StatusCode {
    pub const ALL: [StatusCode; 6] = [
        StatusCode::Unknown,
        StatusCode::OnTime,
        StatusCode::LateAirline,
        StatusCode::LateWeather,
        StatusCode::LateTechnical,
        StatusCode::LateOther,
    ];

    /// Numeric wire code.
    pub fn code(self) -> u8 {
        match self {
            Self::Unknown => 0,
            Self::OnTime => 10,
            Self::LateAirline => 20,
            Self::LateWeather => 30,
            Self::LateTechnical => 40,
            Self::LateOther => 50,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|status| status.code() == code)
    }

    /// Only a delay attributed to the airline triggers payouts.
    pub fn is_airline_fault(self) -> bool {
        matches!(self, Self::LateAirline)
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Unknown => "unknown",
            Self::OnTime => "on_time",
            Self::LateAirline => "late_airline",
            Self::LateWeather => "late_weather",
            Self::LateTechnical => "late_technical",
            Self::LateOther => "late_other",
        };
        write!(f, "{} ({})", name, self.code())
    }
}

/// Ledger-supplied environment of the block a call executes in.
///
/// This is the only source of time and entropy the state machine consults.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockContext {
    pub number: u64,
    pub timestamp: DateTime<Utc>,
    pub entropy: [u8; 32],
}

impl BlockContext {
    pub fn new(number: u64, timestamp: DateTime<Utc>, entropy: [u8; 32]) -> Self {
        Self {
            number,
            timestamp,
            entropy,
        }
    }

    pub fn genesis() -> Self {
        Self::new(0, DateTime::<Utc>::default(), [0u8; 32])
    }

    /// Block whose entropy is derived from a seed; convenient for replays.
    pub fn seeded(number: u64, unix_secs: i64, seed: u64) -> Self {
        let timestamp = DateTime::from_timestamp(unix_secs, 0).unwrap_or_default();
        let entropy = *blake3::hash(&seed.to_le_bytes()).as_bytes();
        Self::new(number, timestamp, entropy)
    }
}

/// One external call: who sent it, the value attached, and the block it runs in.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CallContext {
    pub caller: AccountId,
    pub value: Amount,
    pub block: BlockContext,
}

impl CallContext {
    pub fn new(caller: AccountId, block: BlockContext) -> Self {
        Self {
            caller,
            value: Amount::ZERO,
            block,
        }
    }

    pub fn with_value(mut self, value: Amount) -> Self {
        self.value = value;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_and_prints_fractional_units() {
        let premium: Amount = "0.1".parse().unwrap();
        assert_eq!(premium.minor(), MINOR_PER_UNIT / 10);
        assert_eq!(premium.to_string(), "0.1");
        assert_eq!(premium.mul_ratio(3, 2).unwrap().to_string(), "0.15");
        assert_eq!(Amount::from_units(10).to_string(), "10");
        assert_eq!(".5".parse::<Amount>().unwrap().to_string(), "0.5");
    }

    #[test]
    fn rejects_malformed_amounts() {
        assert_eq!("".parse::<Amount>(), Err(AmountParseError::Empty));
        assert!(matches!(
            "1.2.3".parse::<Amount>(),
            Err(AmountParseError::Invalid(_))
        ));
        assert!(matches!(
            "-1".parse::<Amount>(),
            Err(AmountParseError::Invalid(_))
        ));
        assert!(matches!(
            "0.0000000000000000001".parse::<Amount>(),
            Err(AmountParseError::TooPrecise(_))
        ));
    }

    #[test]
    fn amount_serializes_as_unit_string() {
        let json = serde_json::to_string(&Amount::from_units(1)).unwrap();
        assert_eq!(json, "\"1\"");
        let back: Amount = serde_json::from_str("\"0.25\"").unwrap();
        assert_eq!(back, Amount::from_minor(MINOR_PER_UNIT / 4));
    }

    #[test]
    fn status_codes_map_to_wire_values() {
        assert_eq!(StatusCode::LateAirline.code(), 20);
        assert_eq!(StatusCode::from_code(40), Some(StatusCode::LateTechnical));
        assert_eq!(StatusCode::from_code(25), None);
        assert!(StatusCode::LateAirline.is_airline_fault());
        assert!(!StatusCode::LateWeather.is_airline_fault());
    }

    #[test]
    fn seeded_blocks_are_reproducible() {
        let a = BlockContext::seeded(7, 1_700_000_000, 42);
        let b = BlockContext::seeded(7, 1_700_000_000, 42);
        let c = BlockContext::seeded(7, 1_700_000_000, 43);
        assert_eq!(a, b);
        assert_ne!(a.entropy, c.entropy);
    }
}
