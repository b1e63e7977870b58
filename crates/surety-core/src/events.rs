use crate::types::{AccountId, Amount, FlightKey, StatusCode};
use serde::{Deserialize, Serialize};

/// How an airline came to be registered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegistrationPath {
    Genesis,
    Bootstrap,
    Consensus,
}

/// Observable side effects, surfaced to subscribers instead of re-derived state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SuretyEvent {
    OperatingStatusChanged {
        operational: bool,
    },
    CallerAuthorized {
        account: AccountId,
    },
    CallerDeauthorized {
        account: AccountId,
    },
    AirlineFunded {
        airline: AccountId,
        amount: Amount,
        total_contributed: Amount,
    },
    AirlineVoted {
        candidate: AccountId,
        voter: AccountId,
        votes: usize,
        required: usize,
    },
    AirlineRegistered {
        airline: AccountId,
        sponsor: Option<AccountId>,
        path: RegistrationPath,
    },
    InsurancePurchased {
        passenger: AccountId,
        flight: FlightKey,
        premium: Amount,
    },
    PolicyCredited {
        passenger: AccountId,
        flight: FlightKey,
        payout: Amount,
    },
    OracleRegistered {
        oracle: AccountId,
        indexes: [u8; 3],
    },
    OracleRequest {
        index: u8,
        flight: FlightKey,
    },
    OracleReport {
        index: u8,
        flight: FlightKey,
        reporter: AccountId,
        status: StatusCode,
    },
    FlightStatusInfo {
        index: u8,
        flight: FlightKey,
        status: StatusCode,
    },
    Withdrawn {
        account: AccountId,
        amount: Amount,
        policies_settled: usize,
    },
}

impl SuretyEvent {
    /// Stable event name used as the journal entry kind.
    pub fn name(&self) -> &'static str {
        match self {
            Self::OperatingStatusChanged { .. } => "operating_status_changed",
            Self::CallerAuthorized { .. } => "caller_authorized",
            Self::CallerDeauthorized { .. } => "caller_deauthorized",
            Self::AirlineFunded { .. } => "airline_funded",
            Self::AirlineVoted { .. } => "airline_voted",
            Self::AirlineRegistered { .. } => "airline_registered",
            Self::InsurancePurchased { .. } => "insurance_purchased",
            Self::PolicyCredited { .. } => "policy_credited",
            Self::OracleRegistered { .. } => "oracle_registered",
            Self::OracleRequest { .. } => "oracle_request",
            Self::OracleReport { .. } => "oracle_report",
            Self::FlightStatusInfo { .. } => "flight_status_info",
            Self::Withdrawn { .. } => "withdrawn",
        }
    }
}
