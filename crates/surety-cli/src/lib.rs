//! Offline driver for the surety ledger.
//!
//! Replays JSON transaction scripts against a fresh state machine, persists
//! and verifies hash-chained journals, and runs seeded reporter simulations.

#![deny(unsafe_code)]

pub mod config;
pub mod error;
pub mod replay;
pub mod script;
pub mod simulate;
pub mod store;

pub use error::{CliError, CliResult};
