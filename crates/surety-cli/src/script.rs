//! Transaction scripts replayed against a fresh ledger.
//!
//! A script is JSON: a genesis block followed by an ordered list of calls.
//!
//! ```json
//! {
//!   "genesis": { "owner": "owner", "seed_airline": "a1" },
//!   "transactions": [
//!     { "caller": "a1", "value": "10", "call": "fund_airline", "airline": "a1" },
//!     { "caller": "p1", "value": "0.1", "call": "buy_insurance",
//!       "airline": "a1", "flight": "AB123", "departure": 1700003600 }
//!   ]
//! }
//! ```

use crate::error::{CliError, CliResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;
use surety_core::{AccountId, Amount, StatusCode};

fn default_start_time() -> i64 {
    1_700_000_000
}

fn default_block_interval() -> i64 {
    12
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Genesis {
    pub owner: AccountId,
    pub seed_airline: AccountId,
    /// Unix time of block 1.
    #[serde(default = "default_start_time")]
    pub start_time: i64,
    #[serde(default = "default_block_interval")]
    pub block_interval: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Script {
    pub genesis: Genesis,
    /// Recipients whose payout transfers revert.
    #[serde(default)]
    pub reverting_recipients: BTreeSet<AccountId>,
    #[serde(default)]
    pub transactions: Vec<Transaction>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub caller: AccountId,
    #[serde(default)]
    pub value: Amount,
    /// Block entropy seed; defaults to the block number.
    #[serde(default)]
    pub seed: Option<u64>,
    #[serde(flatten)]
    pub call: Call,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "call", rename_all = "snake_case")]
pub enum Call {
    SetOperatingStatus {
        operational: bool,
    },
    AuthorizeCaller {
        account: AccountId,
    },
    DeauthorizeCaller {
        account: AccountId,
    },
    RegisterAirline {
        candidate: AccountId,
    },
    VoteForAirline {
        candidate: AccountId,
    },
    FundAirline {
        airline: AccountId,
    },
    BuyInsurance {
        airline: AccountId,
        flight: String,
        departure: u64,
    },
    RegisterOracle,
    FetchFlightStatus {
        airline: AccountId,
        flight: String,
        departure: u64,
    },
    /// `index` defaults to the last request opened for the flight.
    SubmitOracleResponse {
        #[serde(default)]
        index: Option<u8>,
        airline: AccountId,
        flight: String,
        departure: u64,
        status: StatusCode,
    },
    Withdraw,
}

impl Call {
    pub fn name(&self) -> &'static str {
        match self {
            Self::SetOperatingStatus { .. } => "set_operating_status",
            Self::AuthorizeCaller { .. } => "authorize_caller",
            Self::DeauthorizeCaller { .. } => "deauthorize_caller",
            Self::RegisterAirline { .. } => "register_airline",
            Self::VoteForAirline { .. } => "vote_for_airline",
            Self::FundAirline { .. } => "fund_airline",
            Self::BuyInsurance { .. } => "buy_insurance",
            Self::RegisterOracle => "register_oracle",
            Self::FetchFlightStatus { .. } => "fetch_flight_status",
            Self::SubmitOracleResponse { .. } => "submit_oracle_response",
            Self::Withdraw => "withdraw",
        }
    }
}

impl Script {
    pub fn load(path: &Path) -> CliResult<Self> {
        let bytes = std::fs::read(path)?;
        let script: Script = serde_json::from_slice(&bytes)?;
        script.check()?;
        Ok(script)
    }

    pub fn check(&self) -> CliResult<()> {
        if self.genesis.block_interval <= 0 {
            return Err(CliError::Script(format!(
                "block_interval must be positive, got {}",
                self.genesis.block_interval
            )));
        }
        Ok(())
    }
}
