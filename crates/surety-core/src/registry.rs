//! Airline membership with a growing quorum.
//!
//! While fewer than `bootstrap_threshold` airlines are registered, any
//! registered and funded airline admits a funded candidate directly. From then
//! on admission needs votes from distinct registered and funded airlines
//! amounting to `consensus_percent` of the current registered count, rounded up.
//!
//! A candidate becomes known on first mention. An unfunded candidate keeps its
//! votes and is admitted by [`AirlineRegistry::admit_funded`] once it funds.

use crate::error::{SuretyError, SuretyResult};
use crate::events::RegistrationPath;
use crate::funding::FundingLedger;
use crate::types::AccountId;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info};

/// Registration regime, selected purely from the registered-airline count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuorumPhase {
    Bootstrap,
    Consensus { required: usize },
}

impl QuorumPhase {
    pub fn for_registered(registered: usize, bootstrap_threshold: usize, consensus_percent: u8) -> Self {
        if registered < bootstrap_threshold {
            return Self::Bootstrap;
        }
        let percent = usize::from(consensus_percent);
        let required = (registered * percent).div_ceil(100).max(1);
        Self::Consensus { required }
    }

    pub fn required_votes(&self) -> usize {
        match self {
            Self::Bootstrap => 1,
            Self::Consensus { required } => *required,
        }
    }
}

/// Result of a registration attempt or vote that was not rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistrationOutcome {
    Registered { path: RegistrationPath, votes: usize },
    AlreadyRegistered,
    VoteRecorded { votes: usize, required: usize },
    /// Sponsorship is complete but the candidate has not staked yet.
    AwaitingFunding { votes: usize, required: usize },
}

/// An airline known to the ledger. Funding status lives in [`FundingLedger`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Airline {
    pub id: AccountId,
    pub registered: bool,
    /// Distinct airlines that voted while registration is pending.
    pub voters: BTreeSet<AccountId>,
}

impl Airline {
    fn new(id: AccountId) -> Self {
        Self {
            id,
            registered: false,
            voters: BTreeSet::new(),
        }
    }

    pub fn vote_count(&self) -> usize {
        self.voters.len()
    }
}

#[derive(Debug, Clone)]
pub struct AirlineRegistry {
    airlines: BTreeMap<AccountId, Airline>,
    registered_count: usize,
    bootstrap_threshold: usize,
    consensus_percent: u8,
}

impl AirlineRegistry {
    pub fn new(bootstrap_threshold: usize, consensus_percent: u8) -> Self {
        Self {
            airlines: BTreeMap::new(),
            registered_count: 0,
            bootstrap_threshold,
            consensus_percent,
        }
    }

    /// Genesis membership: registered without funding or votes.
    pub fn seed(&mut self, airline: &AccountId) {
        let record = self
            .airlines
            .entry(airline.clone())
            .or_insert_with(|| Airline::new(airline.clone()));
        if !record.registered {
            record.registered = true;
            self.registered_count += 1;
            info!(airline = %airline, "Seed airline registered");
        }
    }

    /// Make the airline known; returns true when the record was created.
    pub fn note_exists(&mut self, airline: &AccountId) -> bool {
        if self.airlines.contains_key(airline) {
            return false;
        }
        self.airlines
            .insert(airline.clone(), Airline::new(airline.clone()));
        debug!(airline = %airline, "Airline record created");
        true
    }

    pub fn phase(&self) -> QuorumPhase {
        QuorumPhase::for_registered(
            self.registered_count,
            self.bootstrap_threshold,
            self.consensus_percent,
        )
    }

    /// Admit `candidate` on behalf of `caller`, or count `caller`'s vote.
    pub fn register(
        &mut self,
        candidate: &AccountId,
        caller: &AccountId,
        funding: &FundingLedger,
    ) -> SuretyResult<RegistrationOutcome> {
        if !self.is_registered(caller) || !funding.is_funded(caller) {
            return Err(SuretyError::unauthorized(
                caller,
                "only registered and funded airlines may register airlines",
            ));
        }
        if self.is_registered(candidate) {
            debug!(candidate = %candidate, caller = %caller, "Airline already registered");
            return Ok(RegistrationOutcome::AlreadyRegistered);
        }

        let phase = self.phase();
        let funded = funding.is_funded(candidate);
        let record = self
            .airlines
            .entry(candidate.clone())
            .or_insert_with(|| Airline::new(candidate.clone()));

        if phase == QuorumPhase::Bootstrap && funded {
            record.registered = true;
            record.voters.clear();
            self.registered_count += 1;
            info!(
                airline = %candidate,
                sponsor = %caller,
                registered = self.registered_count,
                "Airline registered during bootstrap"
            );
            return Ok(RegistrationOutcome::Registered {
                path: RegistrationPath::Bootstrap,
                votes: 1,
            });
        }

        if !record.voters.insert(caller.clone()) {
            return Err(SuretyError::DuplicateVote {
                candidate: candidate.clone(),
                voter: caller.clone(),
            });
        }
        let votes = record.vote_count();
        let required = phase.required_votes();
        if votes < required {
            debug!(candidate = %candidate, voter = %caller, votes, required, "Vote recorded");
            return Ok(RegistrationOutcome::VoteRecorded { votes, required });
        }
        if !funded {
            debug!(candidate = %candidate, votes, required, "Candidate sponsored, awaiting stake");
            return Ok(RegistrationOutcome::AwaitingFunding { votes, required });
        }

        record.registered = true;
        record.voters.clear();
        self.registered_count += 1;
        info!(
            airline = %candidate,
            votes,
            required,
            registered = self.registered_count,
            "Airline registered by consensus"
        );
        Ok(RegistrationOutcome::Registered {
            path: RegistrationPath::Consensus,
            votes,
        })
    }

    /// Complete a pending registration for an airline that has just funded.
    ///
    /// The votes collected so far are weighed against the current phase; in
    /// bootstrap a single sponsor suffices.
    pub fn admit_funded(
        &mut self,
        airline: &AccountId,
        funding: &FundingLedger,
    ) -> Option<RegistrationOutcome> {
        if !funding.is_funded(airline) {
            return None;
        }
        let phase = self.phase();
        let record = self.airlines.get_mut(airline)?;
        let votes = record.vote_count();
        if record.registered || votes == 0 || votes < phase.required_votes() {
            return None;
        }

        record.registered = true;
        record.voters.clear();
        self.registered_count += 1;
        let path = match phase {
            QuorumPhase::Bootstrap => RegistrationPath::Bootstrap,
            QuorumPhase::Consensus { .. } => RegistrationPath::Consensus,
        };
        info!(
            airline = %airline,
            votes,
            registered = self.registered_count,
            "Sponsored airline registered on funding"
        );
        Some(RegistrationOutcome::Registered { path, votes })
    }

    /// Voting is the consensus path of [`register`](Self::register).
    pub fn vote(
        &mut self,
        candidate: &AccountId,
        voter: &AccountId,
        funding: &FundingLedger,
    ) -> SuretyResult<RegistrationOutcome> {
        self.register(candidate, voter, funding)
    }

    pub fn airline(&self, id: &AccountId) -> Option<&Airline> {
        self.airlines.get(id)
    }

    pub fn exists(&self, id: &AccountId) -> bool {
        self.airlines.contains_key(id)
    }

    pub fn is_registered(&self, id: &AccountId) -> bool {
        self.airlines.get(id).is_some_and(|airline| airline.registered)
    }

    pub fn votes_for(&self, candidate: &AccountId) -> usize {
        self.airlines
            .get(candidate)
            .map(Airline::vote_count)
            .unwrap_or(0)
    }

    pub fn existing_count(&self) -> usize {
        self.airlines.len()
    }

    pub fn registered_count(&self) -> usize {
        self.registered_count
    }

    pub fn airlines(&self) -> impl Iterator<Item = &Airline> {
        self.airlines.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Amount;

    fn stake() -> Amount {
        Amount::from_units(10)
    }

    fn fund(funding: &mut FundingLedger, registry: &mut AirlineRegistry, id: &AccountId) {
        funding.fund(id, id, stake(), stake()).unwrap();
        registry.note_exists(id);
    }

    fn setup() -> (AirlineRegistry, FundingLedger, AccountId) {
        let mut registry = AirlineRegistry::new(4, 50);
        let mut funding = FundingLedger::new();
        let seed = AccountId::new("a1");
        registry.seed(&seed);
        fund(&mut funding, &mut registry, &seed);
        (registry, funding, seed)
    }

    #[test]
    fn phase_is_pure_function_of_count() {
        assert_eq!(QuorumPhase::for_registered(0, 4, 50), QuorumPhase::Bootstrap);
        assert_eq!(QuorumPhase::for_registered(3, 4, 50), QuorumPhase::Bootstrap);
        assert_eq!(
            QuorumPhase::for_registered(4, 4, 50),
            QuorumPhase::Consensus { required: 2 }
        );
        assert_eq!(
            QuorumPhase::for_registered(5, 4, 50),
            QuorumPhase::Consensus { required: 3 }
        );
        assert_eq!(
            QuorumPhase::for_registered(7, 4, 50),
            QuorumPhase::Consensus { required: 4 }
        );
    }

    #[test]
    fn unfunded_caller_cannot_register() {
        let mut registry = AirlineRegistry::new(4, 50);
        let funding = FundingLedger::new();
        let seed = AccountId::new("a1");
        registry.seed(&seed);

        let err = registry
            .register(&AccountId::new("a2"), &seed, &funding)
            .unwrap_err();
        assert!(matches!(err, SuretyError::Unauthorized { .. }));
    }

    #[test]
    fn unfunded_candidate_waits_for_stake() {
        let (mut registry, mut funding, seed) = setup();
        let candidate = AccountId::new("a2");
        assert_eq!(
            registry.register(&candidate, &seed, &funding).unwrap(),
            RegistrationOutcome::AwaitingFunding { votes: 1, required: 1 }
        );
        assert!(registry.exists(&candidate));
        assert!(!registry.is_registered(&candidate));
        assert!(registry.admit_funded(&candidate, &funding).is_none());

        funding.fund(&candidate, &candidate, stake(), stake()).unwrap();
        let outcome = registry.admit_funded(&candidate, &funding).unwrap();
        assert_eq!(
            outcome,
            RegistrationOutcome::Registered { path: RegistrationPath::Bootstrap, votes: 1 }
        );
        assert!(registry.is_registered(&candidate));
        assert_eq!(registry.votes_for(&candidate), 0);
        assert!(registry.admit_funded(&candidate, &funding).is_none());
    }

    #[test]
    fn funding_alone_does_not_admit_unsponsored_airline() {
        let (mut registry, mut funding, _) = setup();
        let stranger = AccountId::new("a8");
        fund(&mut funding, &mut registry, &stranger);
        assert!(registry.admit_funded(&stranger, &funding).is_none());
        assert!(!registry.is_registered(&stranger));
    }

    #[test]
    fn unfunded_consensus_candidate_keeps_votes_until_funded() {
        let (mut registry, mut funding, seed) = setup();
        let members: Vec<AccountId> = ["a2", "a3", "a4"].iter().map(|id| AccountId::new(*id)).collect();
        for member in &members {
            fund(&mut funding, &mut registry, member);
            registry.register(member, &seed, &funding).unwrap();
        }

        let candidate = AccountId::new("a5");
        assert_eq!(
            registry.register(&candidate, &seed, &funding).unwrap(),
            RegistrationOutcome::VoteRecorded { votes: 1, required: 2 }
        );
        assert_eq!(
            registry.vote(&candidate, &members[0], &funding).unwrap(),
            RegistrationOutcome::AwaitingFunding { votes: 2, required: 2 }
        );
        assert!(!registry.is_registered(&candidate));
        assert_eq!(registry.existing_count(), 5);
        assert_eq!(registry.registered_count(), 4);

        funding.fund(&candidate, &candidate, stake(), stake()).unwrap();
        let outcome = registry.admit_funded(&candidate, &funding).unwrap();
        assert!(matches!(outcome, RegistrationOutcome::Registered { path: RegistrationPath::Consensus, votes: 2 }));
        assert_eq!(registry.registered_count(), 5);
    }

    #[test]
    fn bootstrap_registers_directly_and_idempotently() {
        let (mut registry, mut funding, seed) = setup();
        let candidate = AccountId::new("a2");
        fund(&mut funding, &mut registry, &candidate);

        let outcome = registry.register(&candidate, &seed, &funding).unwrap();
        assert!(matches!(outcome, RegistrationOutcome::Registered { path: RegistrationPath::Bootstrap, .. }));
        assert_eq!(registry.registered_count(), 2);

        let again = registry.register(&candidate, &seed, &funding).unwrap();
        assert_eq!(again, RegistrationOutcome::AlreadyRegistered);
        assert_eq!(registry.registered_count(), 2);
    }

    #[test]
    fn consensus_requires_half_of_registered() {
        let (mut registry, mut funding, seed) = setup();
        let members: Vec<AccountId> = ["a2", "a3", "a4"].iter().map(|id| AccountId::new(*id)).collect();
        for member in &members {
            fund(&mut funding, &mut registry, member);
            registry.register(member, &seed, &funding).unwrap();
        }
        assert_eq!(registry.registered_count(), 4);

        let candidate = AccountId::new("a5");
        fund(&mut funding, &mut registry, &candidate);

        let first = registry.register(&candidate, &seed, &funding).unwrap();
        assert_eq!(first, RegistrationOutcome::VoteRecorded { votes: 1, required: 2 });
        assert!(!registry.is_registered(&candidate));

        let dup = registry.vote(&candidate, &seed, &funding).unwrap_err();
        assert!(matches!(dup, SuretyError::DuplicateVote { .. }));
        assert_eq!(registry.votes_for(&candidate), 1);

        let second = registry.vote(&candidate, &members[0], &funding).unwrap();
        assert!(matches!(second, RegistrationOutcome::Registered { path: RegistrationPath::Consensus, votes: 2 }));
        assert!(registry.is_registered(&candidate));
        assert_eq!(registry.votes_for(&candidate), 0);
    }

    #[test]
    fn exists_and_registered_are_distinct() {
        let (mut registry, mut funding, _) = setup();
        let known = AccountId::new("a9");
        fund(&mut funding, &mut registry, &known);

        assert!(registry.exists(&known));
        assert!(!registry.is_registered(&known));
        assert_eq!(registry.existing_count(), 2);
        assert_eq!(registry.registered_count(), 1);
    }
}
