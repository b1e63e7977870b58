//! Airline stake contributions and the funded predicate.

use crate::error::{SuretyError, SuretyResult};
use crate::types::{AccountId, Amount};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Default)]
pub struct FundingLedger {
    contributions: BTreeMap<AccountId, Amount>,
    funded: BTreeSet<AccountId>,
    total_staked: Amount,
}

impl FundingLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a stake contribution. Only the airline itself may fund itself.
    ///
    /// Returns the airline's cumulative contribution. Funding an already funded
    /// airline records the extra stake and leaves the funded flag as is.
    pub fn fund(
        &mut self,
        airline: &AccountId,
        caller: &AccountId,
        amount: Amount,
        minimum_stake: Amount,
    ) -> SuretyResult<Amount> {
        if caller != airline {
            warn!(airline = %airline, caller = %caller, "Funding by third party rejected");
            return Err(SuretyError::unauthorized(
                caller,
                format!("only {} may fund itself", airline),
            ));
        }
        if amount < minimum_stake {
            return Err(SuretyError::InsufficientFunds {
                required: minimum_stake,
                provided: amount,
            });
        }

        let previous = self.contribution_of(airline);
        let total = previous
            .checked_add(amount)
            .ok_or(SuretyError::Overflow("airline contribution"))?;
        self.total_staked = self
            .total_staked
            .checked_add(amount)
            .ok_or(SuretyError::Overflow("total stake"))?;
        self.contributions.insert(airline.clone(), total);

        if self.funded.insert(airline.clone()) {
            info!(airline = %airline, stake = %amount, "Airline funded");
        } else {
            debug!(airline = %airline, stake = %amount, total = %total, "Additional stake recorded");
        }
        Ok(total)
    }

    pub fn is_funded(&self, airline: &AccountId) -> bool {
        self.funded.contains(airline)
    }

    pub fn contribution_of(&self, airline: &AccountId) -> Amount {
        self.contributions
            .get(airline)
            .copied()
            .unwrap_or(Amount::ZERO)
    }

    pub fn funded_count(&self) -> usize {
        self.funded.len()
    }

    pub fn total_staked(&self) -> Amount {
        self.total_staked
    }
}
