//! Operational switch and authorized-caller allowlist.
//!
//! Mutations of ledger-owned entities are only accepted from contract identities
//! on the allowlist, and only while the guard is operational. The owner is the
//! sole account allowed to flip either.

use crate::error::{SuretyError, SuretyResult};
use crate::types::AccountId;
use std::collections::BTreeSet;
use tracing::{info, warn};

#[derive(Debug, Clone)]
pub struct AccessGuard {
    owner: AccountId,
    operational: bool,
    authorized: BTreeSet<AccountId>,
}

impl AccessGuard {
    pub fn new(owner: AccountId) -> Self {
        Self {
            owner,
            operational: true,
            authorized: BTreeSet::new(),
        }
    }

    pub fn owner(&self) -> &AccountId {
        &self.owner
    }

    pub fn is_operational(&self) -> bool {
        self.operational
    }

    pub fn is_authorized(&self, account: &AccountId) -> bool {
        self.authorized.contains(account)
    }

    pub fn require_operational(&self) -> SuretyResult<()> {
        if self.operational {
            Ok(())
        } else {
            Err(SuretyError::NotOperational)
        }
    }

    pub fn require_owner(&self, caller: &AccountId) -> SuretyResult<()> {
        if caller == &self.owner {
            Ok(())
        } else {
            warn!(caller = %caller, "Owner-only operation rejected");
            Err(SuretyError::unauthorized(caller, "caller is not the contract owner"))
        }
    }

    /// Check applied at every mutation boundary of the data layer.
    pub fn require_authorized(&self, origin: &AccountId) -> SuretyResult<()> {
        self.require_operational()?;
        if self.authorized.contains(origin) {
            Ok(())
        } else {
            warn!(origin = %origin, "Mutation from unauthorized contract rejected");
            Err(SuretyError::unauthorized(origin, "caller is not on the allowlist"))
        }
    }

    /// Returns whether the status actually changed.
    pub fn set_operating_status(
        &mut self,
        caller: &AccountId,
        operational: bool,
    ) -> SuretyResult<bool> {
        self.require_owner(caller)?;
        if self.operational == operational {
            return Ok(false);
        }
        self.operational = operational;
        info!(operational, "Operating status changed");
        Ok(true)
    }

    pub fn authorize_caller(&mut self, caller: &AccountId, account: AccountId) -> SuretyResult<bool> {
        self.require_owner(caller)?;
        let added = self.authorized.insert(account.clone());
        if added {
            info!(account = %account, "Caller authorized");
        }
        Ok(added)
    }

    pub fn deauthorize_caller(
        &mut self,
        caller: &AccountId,
        account: &AccountId,
    ) -> SuretyResult<bool> {
        self.require_owner(caller)?;
        let removed = self.authorized.remove(account);
        if removed {
            info!(account = %account, "Caller deauthorized");
        }
        Ok(removed)
    }
}
