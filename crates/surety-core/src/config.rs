//! Protocol constants.
//!
//! Defaults are the fixed values the marketplace is deployed with; a TOML file
//! may override them for simulations, subject to [`SuretyConfig::validate`].

use crate::error::{SuretyError, SuretyResult};
use crate::types::Amount;
use serde::{Deserialize, Serialize};

/// Fraction applied to a premium to compute the payout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayoutMultiplier {
    pub numerator: u32,
    pub denominator: u32,
}

impl PayoutMultiplier {
    pub fn apply(&self, premium: Amount) -> Option<Amount> {
        premium.mul_ratio(self.numerator, self.denominator)
    }
}

impl Default for PayoutMultiplier {
    fn default() -> Self {
        Self {
            numerator: 3,
            denominator: 2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SuretyConfig {
    /// Registered airlines below this count admit new members without voting.
    pub bootstrap_threshold: usize,
    /// Share of registered airlines (percent, rounded up) whose votes admit a member.
    pub consensus_percent: u8,
    /// Stake an airline must contribute to become funded.
    pub minimum_stake: Amount,
    /// Largest premium a passenger may pay for one policy.
    pub premium_cap: Amount,
    pub payout_multiplier: PayoutMultiplier,
    /// Fee a reporter pays to register.
    pub oracle_registration_fee: Amount,
    /// Matching responses needed to finalize a status request.
    pub oracle_quorum: usize,
    /// Indices are drawn from `0..oracle_index_range`.
    pub oracle_index_range: u8,
}

impl Default for SuretyConfig {
    fn default() -> Self {
        Self {
            bootstrap_threshold: 4,
            consensus_percent: 50,
            minimum_stake: Amount::from_units(10),
            premium_cap: Amount::from_units(1),
            payout_multiplier: PayoutMultiplier::default(),
            oracle_registration_fee: Amount::from_units(1),
            oracle_quorum: 3,
            oracle_index_range: 10,
        }
    }
}

impl SuretyConfig {
    pub fn validate(&self) -> SuretyResult<()> {
        if self.bootstrap_threshold == 0 {
            return Err(SuretyError::Config(
                "bootstrap_threshold must be at least 1".into(),
            ));
        }
        if self.consensus_percent == 0 || self.consensus_percent > 100 {
            return Err(SuretyError::Config(format!(
                "consensus_percent must be within 1..=100, got {}",
                self.consensus_percent
            )));
        }
        if self.oracle_quorum == 0 {
            return Err(SuretyError::Config("oracle_quorum must be at least 1".into()));
        }
        // Each reporter holds three distinct indices.
        if self.oracle_index_range < 3 {
            return Err(SuretyError::Config(format!(
                "oracle_index_range must be at least 3, got {}",
                self.oracle_index_range
            )));
        }
        let multiplier = self.payout_multiplier;
        if multiplier.denominator == 0 || multiplier.numerator < multiplier.denominator {
            return Err(SuretyError::Config(format!(
                "payout_multiplier {}/{} must be at least 1",
                multiplier.numerator, multiplier.denominator
            )));
        }
        if self.minimum_stake.is_zero() {
            return Err(SuretyError::Config("minimum_stake must be positive".into()));
        }
        Ok(())
    }
}
