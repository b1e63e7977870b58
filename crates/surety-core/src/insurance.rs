//! Passenger policies and their forward-only lifecycle.

use crate::config::PayoutMultiplier;
use crate::error::{SuretyError, SuretyResult};
use crate::types::{AccountId, Amount, FlightKey, PolicyKey};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info};

/// Policy lifecycle: `None -> Purchased -> Credited -> Paid`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyState {
    #[default]
    None,
    Purchased,
    Credited,
    Paid,
}

impl PolicyState {
    pub fn name(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Purchased => "purchased",
            Self::Credited => "credited",
            Self::Paid => "paid",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InsurancePolicy {
    pub key: PolicyKey,
    pub premium: Amount,
    state: PolicyState,
}

impl InsurancePolicy {
    pub fn state(&self) -> PolicyState {
        self.state
    }

    /// Steps to `next` only from `expected`; anything else leaves the policy untouched.
    fn advance(&mut self, expected: PolicyState, next: PolicyState) -> bool {
        if self.state != expected {
            return false;
        }
        self.state = next;
        true
    }
}

#[derive(Debug, Clone)]
pub struct InsurancePolicyStore {
    policies: BTreeMap<PolicyKey, InsurancePolicy>,
    by_flight: BTreeMap<FlightKey, BTreeSet<AccountId>>,
    by_passenger: BTreeMap<AccountId, BTreeSet<FlightKey>>,
    premium_cap: Amount,
    multiplier: PayoutMultiplier,
    total_premiums: Amount,
    total_credited: Amount,
}

impl InsurancePolicyStore {
    pub fn new(premium_cap: Amount, multiplier: PayoutMultiplier) -> Self {
        Self {
            policies: BTreeMap::new(),
            by_flight: BTreeMap::new(),
            by_passenger: BTreeMap::new(),
            premium_cap,
            multiplier,
            total_premiums: Amount::ZERO,
            total_credited: Amount::ZERO,
        }
    }

    /// Create a policy in state `Purchased`. The airline gate is checked by the caller.
    pub fn purchase(
        &mut self,
        passenger: &AccountId,
        flight: &FlightKey,
        premium: Amount,
    ) -> SuretyResult<&InsurancePolicy> {
        if premium > self.premium_cap {
            return Err(SuretyError::ExcessivePremium {
                premium,
                cap: self.premium_cap,
            });
        }
        if premium.is_zero() {
            return Err(SuretyError::InsufficientFunds {
                required: Amount::from_minor(1),
                provided: premium,
            });
        }

        let key = PolicyKey::new(passenger.clone(), flight.clone());
        if self.policies.contains_key(&key) {
            return Err(SuretyError::DuplicatePolicy {
                passenger: passenger.clone(),
                flight: flight.to_string(),
            });
        }

        self.total_premiums = self
            .total_premiums
            .checked_add(premium)
            .ok_or(SuretyError::Overflow("total premiums"))?;
        self.by_flight
            .entry(flight.clone())
            .or_default()
            .insert(passenger.clone());
        self.by_passenger
            .entry(passenger.clone())
            .or_default()
            .insert(flight.clone());

        info!(passenger = %passenger, flight = %flight, premium = %premium, "Insurance purchased");
        let policy = self.policies.entry(key.clone()).or_insert(InsurancePolicy {
            key,
            premium,
            state: PolicyState::Purchased,
        });
        Ok(policy)
    }

    /// Move a `Purchased` policy to `Credited` and return the payout owed.
    ///
    /// Missing policies and policies past `Purchased` are left alone (`Ok(None)`).
    pub fn credit(&mut self, key: &PolicyKey) -> SuretyResult<Option<Amount>> {
        let Some(policy) = self.policies.get_mut(key) else {
            debug!(passenger = %key.passenger, flight = %key.flight, "No policy to credit");
            return Ok(None);
        };
        if policy.state != PolicyState::Purchased {
            debug!(
                passenger = %key.passenger,
                flight = %key.flight,
                state = policy.state.name(),
                "Policy not eligible for credit"
            );
            return Ok(None);
        }

        let payout = self
            .multiplier
            .apply(policy.premium)
            .ok_or(SuretyError::Overflow("payout"))?;
        let total_credited = self
            .total_credited
            .checked_add(payout)
            .ok_or(SuretyError::Overflow("total credited"))?;

        policy.advance(PolicyState::Purchased, PolicyState::Credited);
        self.total_credited = total_credited;
        info!(passenger = %key.passenger, flight = %key.flight, payout = %payout, "Policy credited");
        Ok(Some(payout))
    }

    /// Mark every `Credited` policy of `passenger` as `Paid`.
    pub fn settle(&mut self, passenger: &AccountId) -> Vec<PolicyKey> {
        let Some(flights) = self.by_passenger.get(passenger) else {
            return Vec::new();
        };

        let mut settled = Vec::new();
        for flight in flights {
            let key = PolicyKey::new(passenger.clone(), flight.clone());
            if let Some(policy) = self.policies.get_mut(&key) {
                if policy.advance(PolicyState::Credited, PolicyState::Paid) {
                    settled.push(key);
                }
            }
        }
        settled
    }

    /// Undo [`settle`](Self::settle) for keys whose payout never left the ledger.
    pub(crate) fn reopen(&mut self, keys: &[PolicyKey]) {
        for key in keys {
            if let Some(policy) = self.policies.get_mut(key) {
                policy.advance(PolicyState::Paid, PolicyState::Credited);
            }
        }
    }

    pub fn get(&self, key: &PolicyKey) -> Option<&InsurancePolicy> {
        self.policies.get(key)
    }

    /// `(premium, state)` for a key; absent policies read as `(0, None)`.
    pub fn lookup(&self, key: &PolicyKey) -> (Amount, PolicyState) {
        self.policies
            .get(key)
            .map(|policy| (policy.premium, policy.state))
            .unwrap_or((Amount::ZERO, PolicyState::None))
    }

    pub fn passengers_on(&self, flight: &FlightKey) -> Vec<AccountId> {
        self.by_flight
            .get(flight)
            .map(|passengers| passengers.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn policies_of(&self, passenger: &AccountId) -> Vec<&InsurancePolicy> {
        self.by_passenger
            .get(passenger)
            .into_iter()
            .flatten()
            .filter_map(|flight| {
                self.policies
                    .get(&PolicyKey::new(passenger.clone(), flight.clone()))
            })
            .collect()
    }

    pub fn total_premiums(&self) -> Amount {
        self.total_premiums
    }

    pub fn total_credited(&self) -> Amount {
        self.total_credited
    }

    pub fn multiplier(&self) -> PayoutMultiplier {
        self.multiplier
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> InsurancePolicyStore {
        InsurancePolicyStore::new(Amount::from_units(1), PayoutMultiplier::default())
    }

    fn flight() -> FlightKey {
        FlightKey::new(AccountId::new("a1"), "AB123", 12_341_234)
    }

    fn tenth() -> Amount {
        "0.1".parse().unwrap()
    }

    #[test]
    fn purchase_creates_purchased_policy_once() {
        let mut store = store();
        let passenger = AccountId::new("p1");

        let policy = store.purchase(&passenger, &flight(), tenth()).unwrap();
        assert_eq!(policy.state(), PolicyState::Purchased);

        let err = store.purchase(&passenger, &flight(), tenth()).unwrap_err();
        assert!(matches!(err, SuretyError::DuplicatePolicy { .. }));
        assert_eq!(store.total_premiums(), tenth());
    }

    #[test]
    fn premium_cap_is_inclusive() {
        let mut store = store();
        assert!(store
            .purchase(&AccountId::new("p1"), &flight(), Amount::from_units(1))
            .is_ok());

        let over = Amount::from_minor(Amount::from_units(1).minor() + 1);
        let err = store
            .purchase(&AccountId::new("p2"), &flight(), over)
            .unwrap_err();
        assert!(matches!(err, SuretyError::ExcessivePremium { .. }));
        assert_eq!(store.lookup(&PolicyKey::new(AccountId::new("p2"), flight())).1, PolicyState::None);
    }

    #[test]
    fn zero_premium_is_rejected() {
        let mut store = store();
        let err = store
            .purchase(&AccountId::new("p1"), &flight(), Amount::ZERO)
            .unwrap_err();
        assert!(matches!(err, SuretyError::InsufficientFunds { .. }));
    }

    #[test]
    fn credit_applies_multiplier_exactly_once() {
        let mut store = store();
        let passenger = AccountId::new("p1");
        store.purchase(&passenger, &flight(), tenth()).unwrap();
        let key = PolicyKey::new(passenger.clone(), flight());

        assert_eq!(store.credit(&key).unwrap(), Some("0.15".parse().unwrap()));
        assert_eq!(store.credit(&key).unwrap(), None);
        assert_eq!(store.lookup(&key), (tenth(), PolicyState::Credited));
        assert_eq!(store.total_credited(), "0.15".parse().unwrap());
    }

    #[test]
    fn credit_of_missing_policy_is_noop() {
        let mut store = store();
        let key = PolicyKey::new(AccountId::new("ghost"), flight());
        assert_eq!(store.credit(&key).unwrap(), None);
    }

    #[test]
    fn settle_only_touches_credited_policies() {
        let mut store = store();
        let passenger = AccountId::new("p1");
        let other = FlightKey::new(AccountId::new("a1"), "CD1234", 99);
        store.purchase(&passenger, &flight(), tenth()).unwrap();
        store.purchase(&passenger, &other, tenth()).unwrap();
        store
            .credit(&PolicyKey::new(passenger.clone(), flight()))
            .unwrap();

        let settled = store.settle(&passenger);
        assert_eq!(settled, vec![PolicyKey::new(passenger.clone(), flight())]);
        assert_eq!(store.lookup(&settled[0]).1, PolicyState::Paid);
        assert_eq!(
            store.lookup(&PolicyKey::new(passenger.clone(), other)).1,
            PolicyState::Purchased
        );
        assert!(store.settle(&passenger).is_empty());
    }

    #[test]
    fn paid_policy_never_recredits() {
        let mut store = store();
        let passenger = AccountId::new("p1");
        let key = PolicyKey::new(passenger.clone(), flight());
        store.purchase(&passenger, &flight(), tenth()).unwrap();
        store.credit(&key).unwrap();
        store.settle(&passenger);

        assert_eq!(store.credit(&key).unwrap(), None);
        assert_eq!(store.lookup(&key).1, PolicyState::Paid);
    }
}
