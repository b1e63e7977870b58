//! Ledger-owned data behind the access guard.
//!
//! `SuretyData` owns airlines, stake, policies and balances. Every mutation
//! names the contract identity it originates from (`origin`) and is refused
//! unless that identity is on the guard's allowlist and the guard is
//! operational. Emitted events are pushed onto the caller-supplied buffer.

use crate::config::SuretyConfig;
use crate::error::{SuretyError, SuretyResult};
use crate::events::{RegistrationPath, SuretyEvent};
use crate::funding::FundingLedger;
use crate::guard::AccessGuard;
use crate::insurance::{InsurancePolicyStore, PolicyState};
use crate::payout::{PayoutLedger, PayoutRail};
use crate::registry::{Airline, AirlineRegistry, QuorumPhase, RegistrationOutcome};
use crate::types::{AccountId, Amount, FlightKey, PolicyKey};
use serde::Serialize;
use tracing::{debug, info, warn};

/// Point-in-time view of one airline, as exposed to consumers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AirlineStatus {
    pub airline: AccountId,
    pub exists: bool,
    pub funded: bool,
    pub registered: bool,
    pub votes: usize,
    pub contributed: Amount,
}

#[derive(Debug, Clone)]
pub struct SuretyData {
    guard: AccessGuard,
    registry: AirlineRegistry,
    funding: FundingLedger,
    policies: InsurancePolicyStore,
    payouts: PayoutLedger,
    config: SuretyConfig,
    fees_collected: Amount,
}

impl SuretyData {
    /// Fresh data layer owned by `owner`, with `seed_airline` registered unfunded.
    pub fn genesis(owner: AccountId, seed_airline: &AccountId, config: SuretyConfig) -> Self {
        let mut registry = AirlineRegistry::new(config.bootstrap_threshold, config.consensus_percent);
        registry.seed(seed_airline);

        Self {
            guard: AccessGuard::new(owner),
            registry,
            funding: FundingLedger::new(),
            policies: InsurancePolicyStore::new(config.premium_cap, config.payout_multiplier),
            payouts: PayoutLedger::new(),
            config,
            fees_collected: Amount::ZERO,
        }
    }

    // Guard administration. Allowed while paused so the owner can resume.

    pub fn set_operating_status(
        &mut self,
        caller: &AccountId,
        operational: bool,
        events: &mut Vec<SuretyEvent>,
    ) -> SuretyResult<bool> {
        let changed = self.guard.set_operating_status(caller, operational)?;
        if changed {
            events.push(SuretyEvent::OperatingStatusChanged { operational });
        }
        Ok(changed)
    }

    pub fn authorize_caller(
        &mut self,
        caller: &AccountId,
        account: AccountId,
        events: &mut Vec<SuretyEvent>,
    ) -> SuretyResult<bool> {
        let added = self.guard.authorize_caller(caller, account.clone())?;
        if added {
            events.push(SuretyEvent::CallerAuthorized { account });
        }
        Ok(added)
    }

    pub fn deauthorize_caller(
        &mut self,
        caller: &AccountId,
        account: &AccountId,
        events: &mut Vec<SuretyEvent>,
    ) -> SuretyResult<bool> {
        let removed = self.guard.deauthorize_caller(caller, account)?;
        if removed {
            events.push(SuretyEvent::CallerDeauthorized {
                account: account.clone(),
            });
        }
        Ok(removed)
    }

    // Airlines.

    pub fn fund_airline(
        &mut self,
        origin: &AccountId,
        airline: &AccountId,
        caller: &AccountId,
        amount: Amount,
        events: &mut Vec<SuretyEvent>,
    ) -> SuretyResult<Amount> {
        self.guard.require_authorized(origin)?;
        let total = self
            .funding
            .fund(airline, caller, amount, self.config.minimum_stake)?;
        self.registry.note_exists(airline);
        events.push(SuretyEvent::AirlineFunded {
            airline: airline.clone(),
            amount,
            total_contributed: total,
        });
        if let Some(RegistrationOutcome::Registered { path, .. }) =
            self.registry.admit_funded(airline, &self.funding)
        {
            events.push(SuretyEvent::AirlineRegistered {
                airline: airline.clone(),
                sponsor: None,
                path,
            });
        }
        Ok(total)
    }

    pub fn register_airline(
        &mut self,
        origin: &AccountId,
        candidate: &AccountId,
        caller: &AccountId,
        events: &mut Vec<SuretyEvent>,
    ) -> SuretyResult<RegistrationOutcome> {
        self.guard.require_authorized(origin)?;
        let required = self.registry.phase().required_votes();
        let outcome = self.registry.register(candidate, caller, &self.funding)?;
        push_registration_events(candidate, caller, required, &outcome, events);
        Ok(outcome)
    }

    pub fn vote_for_airline(
        &mut self,
        origin: &AccountId,
        candidate: &AccountId,
        voter: &AccountId,
        events: &mut Vec<SuretyEvent>,
    ) -> SuretyResult<RegistrationOutcome> {
        self.guard.require_authorized(origin)?;
        let required = self.registry.phase().required_votes();
        let outcome = self.registry.vote(candidate, voter, &self.funding)?;
        push_registration_events(candidate, voter, required, &outcome, events);
        Ok(outcome)
    }

    // Policies and balances.

    pub fn buy_insurance(
        &mut self,
        origin: &AccountId,
        passenger: &AccountId,
        flight: &FlightKey,
        premium: Amount,
        events: &mut Vec<SuretyEvent>,
    ) -> SuretyResult<()> {
        self.guard.require_authorized(origin)?;
        if !self.registry.is_registered(&flight.airline) {
            warn!(airline = %flight.airline, passenger = %passenger, "Policy for unregistered airline rejected");
            return Err(SuretyError::UnregisteredAirline(flight.airline.clone()));
        }
        if !self.funding.is_funded(&flight.airline) {
            warn!(airline = %flight.airline, passenger = %passenger, "Policy for unfunded airline rejected");
            return Err(SuretyError::UnfundedAirline(flight.airline.clone()));
        }

        self.policies.purchase(passenger, flight, premium)?;
        events.push(SuretyEvent::InsurancePurchased {
            passenger: passenger.clone(),
            flight: flight.clone(),
            premium,
        });
        Ok(())
    }

    /// Credit every `Purchased` policy on `flight`. Returns how many were credited.
    pub fn credit_flight(
        &mut self,
        origin: &AccountId,
        flight: &FlightKey,
        events: &mut Vec<SuretyEvent>,
    ) -> SuretyResult<usize> {
        self.guard.require_authorized(origin)?;

        let mut credited = 0;
        for passenger in self.policies.passengers_on(flight) {
            let key = PolicyKey::new(passenger.clone(), flight.clone());
            let Some(payout) = self.policies.credit(&key)? else {
                continue;
            };
            self.payouts.credit(&passenger, payout)?;
            events.push(SuretyEvent::PolicyCredited {
                passenger,
                flight: flight.clone(),
                payout,
            });
            credited += 1;
        }

        info!(flight = %flight, credited, "Flight policies credited");
        Ok(credited)
    }

    /// Settle the caller's credited policies and pay out the whole balance.
    pub fn withdraw(
        &mut self,
        origin: &AccountId,
        caller: &AccountId,
        rail: &mut dyn PayoutRail,
        events: &mut Vec<SuretyEvent>,
    ) -> SuretyResult<Amount> {
        self.guard.require_authorized(origin)?;
        if self.payouts.balance_of(caller).is_zero() {
            return Err(SuretyError::NoFunds(caller.clone()));
        }

        let settled = self.policies.settle(caller);
        let amount = match self.payouts.withdraw(caller, rail) {
            Ok(amount) => amount,
            Err(err) => {
                self.policies.reopen(&settled);
                return Err(err);
            }
        };

        events.push(SuretyEvent::Withdrawn {
            account: caller.clone(),
            amount,
            policies_settled: settled.len(),
        });
        Ok(amount)
    }

    /// Book a registration fee paid to the ledger.
    pub fn collect_fee(&mut self, origin: &AccountId, amount: Amount) -> SuretyResult<Amount> {
        self.guard.require_authorized(origin)?;
        self.fees_collected = self
            .fees_collected
            .checked_add(amount)
            .ok_or(SuretyError::Overflow("fees collected"))?;
        debug!(amount = %amount, total = %self.fees_collected, "Fee collected");
        Ok(self.fees_collected)
    }

    // Reads.

    pub fn guard(&self) -> &AccessGuard {
        &self.guard
    }

    pub fn is_operational(&self) -> bool {
        self.guard.is_operational()
    }

    pub fn config(&self) -> &SuretyConfig {
        &self.config
    }

    pub fn policies(&self) -> &InsurancePolicyStore {
        &self.policies
    }

    pub fn payouts(&self) -> &PayoutLedger {
        &self.payouts
    }

    pub fn funding(&self) -> &FundingLedger {
        &self.funding
    }

    pub fn airline(&self, id: &AccountId) -> Option<&Airline> {
        self.registry.airline(id)
    }

    pub fn airline_status(&self, id: &AccountId) -> AirlineStatus {
        AirlineStatus {
            airline: id.clone(),
            exists: self.registry.exists(id),
            funded: self.funding.is_funded(id),
            registered: self.registry.is_registered(id),
            votes: self.registry.votes_for(id),
            contributed: self.funding.contribution_of(id),
        }
    }

    pub fn is_registered(&self, id: &AccountId) -> bool {
        self.registry.is_registered(id)
    }

    pub fn is_funded(&self, id: &AccountId) -> bool {
        self.funding.is_funded(id)
    }

    pub fn exists(&self, id: &AccountId) -> bool {
        self.registry.exists(id)
    }

    pub fn votes_for(&self, candidate: &AccountId) -> usize {
        self.registry.votes_for(candidate)
    }

    pub fn phase(&self) -> QuorumPhase {
        self.registry.phase()
    }

    pub fn existing_count(&self) -> usize {
        self.registry.existing_count()
    }

    pub fn funded_count(&self) -> usize {
        self.funding.funded_count()
    }

    pub fn registered_count(&self) -> usize {
        self.registry.registered_count()
    }

    pub fn get_insurance(&self, key: &PolicyKey) -> (Amount, PolicyState) {
        self.policies.lookup(key)
    }

    pub fn balance_of(&self, account: &AccountId) -> Amount {
        self.payouts.balance_of(account)
    }

    pub fn fees_collected(&self) -> Amount {
        self.fees_collected
    }
}

fn push_registration_events(
    candidate: &AccountId,
    caller: &AccountId,
    required: usize,
    outcome: &RegistrationOutcome,
    events: &mut Vec<SuretyEvent>,
) {
    match outcome {
        RegistrationOutcome::AlreadyRegistered => {}
        RegistrationOutcome::VoteRecorded { votes, required }
        | RegistrationOutcome::AwaitingFunding { votes, required } => {
            events.push(SuretyEvent::AirlineVoted {
                candidate: candidate.clone(),
                voter: caller.clone(),
                votes: *votes,
                required: *required,
            });
        }
        RegistrationOutcome::Registered { path, votes } => {
            if *path == RegistrationPath::Consensus {
                events.push(SuretyEvent::AirlineVoted {
                    candidate: candidate.clone(),
                    voter: caller.clone(),
                    votes: *votes,
                    required,
                });
            }
            events.push(SuretyEvent::AirlineRegistered {
                airline: candidate.clone(),
                sponsor: Some(caller.clone()),
                path: *path,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payout::{Payout, RailError};

    struct AcceptingRail;

    impl PayoutRail for AcceptingRail {
        fn transfer(&mut self, _payout: &Payout, _ledger: &PayoutLedger) -> Result<(), RailError> {
            Ok(())
        }
    }

    struct RejectingRail;

    impl PayoutRail for RejectingRail {
        fn transfer(&mut self, _payout: &Payout, _ledger: &PayoutLedger) -> Result<(), RailError> {
            Err(RailError::Unavailable("offline".into()))
        }
    }

    struct Fixture {
        data: SuretyData,
        owner: AccountId,
        app: AccountId,
        seed: AccountId,
        events: Vec<SuretyEvent>,
    }

    fn fixture() -> Fixture {
        let owner = AccountId::new("owner");
        let app = AccountId::new("app");
        let seed = AccountId::new("a1");
        let mut data = SuretyData::genesis(owner.clone(), &seed, SuretyConfig::default());
        let mut events = Vec::new();
        data.authorize_caller(&owner, app.clone(), &mut events).unwrap();
        data.fund_airline(&app, &seed, &seed, Amount::from_units(10), &mut events)
            .unwrap();
        Fixture {
            data,
            owner,
            app,
            seed,
            events,
        }
    }

    fn flight(seed: &AccountId) -> FlightKey {
        FlightKey::new(seed.clone(), "AB123", 1_700_000_000)
    }

    #[test]
    fn sponsored_airline_registers_when_it_funds() {
        let mut fx = fixture();
        let candidate = AccountId::new("a2");
        fx.events.clear();

        let outcome = fx
            .data
            .register_airline(&fx.app, &candidate, &fx.seed, &mut fx.events)
            .unwrap();
        assert_eq!(outcome, RegistrationOutcome::AwaitingFunding { votes: 1, required: 1 });
        assert!(matches!(fx.events.as_slice(), [SuretyEvent::AirlineVoted { votes: 1, .. }]));
        assert!(fx.data.exists(&candidate));
        assert!(!fx.data.is_registered(&candidate));
        assert_eq!(fx.data.existing_count(), 2);
        assert_eq!(fx.data.funded_count(), 1);

        fx.events.clear();
        fx.data
            .fund_airline(&fx.app, &candidate, &candidate, Amount::from_units(10), &mut fx.events)
            .unwrap();
        let names: Vec<&str> = fx.events.iter().map(SuretyEvent::name).collect();
        assert_eq!(names, vec!["airline_funded", "airline_registered"]);
        assert!(matches!(
            &fx.events[1],
            SuretyEvent::AirlineRegistered { sponsor: None, path: RegistrationPath::Bootstrap, .. }
        ));
        assert!(fx.data.is_registered(&candidate));
    }

    #[test]
    fn genesis_seed_is_registered_but_unfunded() {
        let seed = AccountId::new("a1");
        let data = SuretyData::genesis(AccountId::new("owner"), &seed, SuretyConfig::default());
        let status = data.airline_status(&seed);
        assert!(status.exists && status.registered);
        assert!(!status.funded);
        assert_eq!(data.registered_count(), 1);
    }

    #[test]
    fn mutations_require_allowlisted_origin() {
        let mut fx = fixture();
        let outsider = AccountId::new("rogue-contract");
        let err = fx
            .data
            .fund_airline(&outsider, &fx.seed, &fx.seed, Amount::from_units(10), &mut fx.events)
            .unwrap_err();
        assert!(matches!(err, SuretyError::Unauthorized { .. }));

        fx.data
            .deauthorize_caller(&fx.owner, &fx.app, &mut fx.events)
            .unwrap();
        let err = fx
            .data
            .register_airline(&fx.app, &AccountId::new("a2"), &fx.seed, &mut fx.events)
            .unwrap_err();
        assert!(matches!(err, SuretyError::Unauthorized { .. }));
    }

    #[test]
    fn paused_data_layer_rejects_purchases() {
        let mut fx = fixture();
        fx.data
            .set_operating_status(&fx.owner, false, &mut fx.events)
            .unwrap();
        let err = fx
            .data
            .buy_insurance(&fx.app, &AccountId::new("p1"), &flight(&fx.seed), Amount::from_units(1), &mut fx.events)
            .unwrap_err();
        assert_eq!(err, SuretyError::NotOperational);
    }

    #[test]
    fn purchase_requires_registered_and_funded_airline() {
        let mut fx = fixture();
        let unknown = FlightKey::new(AccountId::new("a9"), "ZZ1", 1);
        let err = fx
            .data
            .buy_insurance(&fx.app, &AccountId::new("p1"), &unknown, Amount::from_units(1), &mut fx.events)
            .unwrap_err();
        assert!(matches!(err, SuretyError::UnregisteredAirline(_)));

        let mut unfunded = SuretyData::genesis(fx.owner.clone(), &fx.seed, SuretyConfig::default());
        unfunded
            .authorize_caller(&fx.owner, fx.app.clone(), &mut fx.events)
            .unwrap();
        let err = unfunded
            .buy_insurance(&fx.app, &AccountId::new("p1"), &flight(&fx.seed), Amount::from_units(1), &mut fx.events)
            .unwrap_err();
        assert_eq!(err, SuretyError::UnfundedAirline(fx.seed.clone()));
    }

    #[test]
    fn credit_then_withdraw_settles_policy() {
        let mut fx = fixture();
        let passenger = AccountId::new("p1");
        let flight = flight(&fx.seed);
        fx.data
            .buy_insurance(&fx.app, &passenger, &flight, "0.1".parse().unwrap(), &mut fx.events)
            .unwrap();

        assert_eq!(fx.data.credit_flight(&fx.app, &flight, &mut fx.events).unwrap(), 1);
        assert_eq!(fx.data.credit_flight(&fx.app, &flight, &mut fx.events).unwrap(), 0);
        assert_eq!(fx.data.balance_of(&passenger), "0.15".parse().unwrap());

        let paid = fx
            .data
            .withdraw(&fx.app, &passenger, &mut AcceptingRail, &mut fx.events)
            .unwrap();
        assert_eq!(paid, "0.15".parse().unwrap());
        let key = PolicyKey::new(passenger.clone(), flight);
        assert_eq!(fx.data.get_insurance(&key).1, PolicyState::Paid);
        assert!(matches!(
            fx.events.last(),
            Some(SuretyEvent::Withdrawn { policies_settled: 1, .. })
        ));
    }

    #[test]
    fn failed_withdrawal_keeps_policies_credited() {
        let mut fx = fixture();
        let passenger = AccountId::new("p1");
        let flight = flight(&fx.seed);
        fx.data
            .buy_insurance(&fx.app, &passenger, &flight, "0.1".parse().unwrap(), &mut fx.events)
            .unwrap();
        fx.data.credit_flight(&fx.app, &flight, &mut fx.events).unwrap();

        let err = fx
            .data
            .withdraw(&fx.app, &passenger, &mut RejectingRail, &mut fx.events)
            .unwrap_err();
        assert!(matches!(err, SuretyError::TransferFailed { .. }));
        let key = PolicyKey::new(passenger.clone(), flight);
        assert_eq!(fx.data.get_insurance(&key).1, PolicyState::Credited);
        assert_eq!(fx.data.balance_of(&passenger), "0.15".parse().unwrap());
    }

    #[test]
    fn consensus_registration_emits_vote_then_registration() {
        let mut fx = fixture();
        for id in ["a2", "a3", "a4", "a5"] {
            let airline = AccountId::new(id);
            fx.data
                .fund_airline(&fx.app, &airline, &airline, Amount::from_units(10), &mut fx.events)
                .unwrap();
        }
        for id in ["a2", "a3", "a4"] {
            fx.data
                .register_airline(&fx.app, &AccountId::new(id), &fx.seed, &mut fx.events)
                .unwrap();
        }

        let candidate = AccountId::new("a5");
        fx.events.clear();
        fx.data
            .register_airline(&fx.app, &candidate, &fx.seed, &mut fx.events)
            .unwrap();
        fx.data
            .vote_for_airline(&fx.app, &candidate, &AccountId::new("a2"), &mut fx.events)
            .unwrap();

        let names: Vec<&str> = fx.events.iter().map(SuretyEvent::name).collect();
        assert_eq!(names, vec!["airline_voted", "airline_voted", "airline_registered"]);
        assert!(fx.data.is_registered(&candidate));
        assert_eq!(fx.data.registered_count(), 5);
    }
}
