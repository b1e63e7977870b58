//! Deterministic state machine of a flight-delay insurance marketplace.
//!
//! Airlines join through a growing quorum and stake funds, passengers buy
//! capped policies on flights, and a pool of index-filtered reporters agrees
//! on flight status. An airline-fault delay credits every purchased policy on
//! the flight, and passengers withdraw their credit through an external rail.
//!
//! Time and entropy come only from the [`BlockContext`] each call carries, so
//! replaying the same calls always reproduces the same state and journal.

#![deny(unsafe_code)]

pub mod app;
pub mod config;
pub mod data;
pub mod error;
pub mod events;
pub mod funding;
pub mod guard;
pub mod insurance;
pub mod journal;
pub mod oracle;
pub mod payout;
pub mod registry;
pub mod types;

pub use app::{Receipt, SuretyApp, APP_CONTRACT_ID};
pub use config::{PayoutMultiplier, SuretyConfig};
pub use data::{AirlineStatus, SuretyData};
pub use error::{SuretyError, SuretyResult};
pub use events::{RegistrationPath, SuretyEvent};
pub use funding::FundingLedger;
pub use guard::AccessGuard;
pub use insurance::{InsurancePolicy, InsurancePolicyStore, PolicyState};
pub use journal::{EventJournal, JournalEntry};
pub use oracle::{OracleConsensusEngine, ReporterIdentity, ResponseOutcome, StatusRequest};
pub use payout::{Payout, PayoutLedger, PayoutRail, RailError};
pub use registry::{Airline, AirlineRegistry, QuorumPhase, RegistrationOutcome};
pub use types::{
    AccountId, Amount, AmountParseError, BlockContext, CallContext, FlightKey, PolicyKey,
    RequestKey, StatusCode, MINOR_PER_UNIT,
};
