//! External entry points of the marketplace.
//!
//! `SuretyApp` is the contract identity passengers, airlines and reporters call.
//! It owns the oracle engine and forwards ledger mutations to [`SuretyData`]
//! under its own identity. Each mutating call runs as a transaction: state is
//! snapshotted first and restored if the call fails, so a rejection leaves no
//! partial effects. Committed events are appended to the hash-chained journal.
//!
//! The snapshot is a full clone of the ledger state, so every call costs time
//! linear in the number of airlines, policies, requests and reporters.

use crate::config::SuretyConfig;
use crate::data::SuretyData;
use crate::error::SuretyResult;
use crate::events::{RegistrationPath, SuretyEvent};
use crate::insurance::PolicyState;
use crate::journal::EventJournal;
use crate::oracle::{OracleConsensusEngine, ResponseOutcome};
use crate::payout::PayoutRail;
use crate::types::{
    AccountId, Amount, BlockContext, CallContext, FlightKey, PolicyKey, RequestKey, StatusCode,
};
use serde::Serialize;
use tracing::{debug, info, warn};

/// Contract identity the app mutates ledger data under.
pub const APP_CONTRACT_ID: &str = "surety-app";

/// Events committed by one successful call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Receipt {
    pub block_number: u64,
    pub events: Vec<SuretyEvent>,
}

#[derive(Debug, Clone)]
struct LedgerState {
    data: SuretyData,
    oracles: OracleConsensusEngine,
}

pub struct SuretyApp {
    contract: AccountId,
    state: LedgerState,
    journal: EventJournal,
}

impl SuretyApp {
    /// Genesis: `owner` controls the guard, the app is allowlisted, and
    /// `seed_airline` is registered without stake.
    pub fn new(owner: AccountId, seed_airline: AccountId, config: SuretyConfig) -> SuretyResult<Self> {
        config.validate()?;
        let contract = AccountId::new(APP_CONTRACT_ID);
        let oracles = OracleConsensusEngine::new(
            config.oracle_registration_fee,
            config.oracle_quorum,
            config.oracle_index_range,
        );
        let mut data = SuretyData::genesis(owner.clone(), &seed_airline, config);

        let mut events = Vec::new();
        data.authorize_caller(&owner, contract.clone(), &mut events)?;
        events.push(SuretyEvent::AirlineRegistered {
            airline: seed_airline.clone(),
            sponsor: None,
            path: RegistrationPath::Genesis,
        });

        let mut journal = EventJournal::new();
        let staged = journal.stage(&BlockContext::genesis(), &events)?;
        journal.commit(staged)?;

        info!(owner = %owner, seed_airline = %seed_airline, contract = %contract, "Surety ledger initialized");
        Ok(Self {
            contract,
            state: LedgerState { data, oracles },
            journal,
        })
    }

    fn transact<F>(&mut self, operation: &'static str, block: &BlockContext, f: F) -> SuretyResult<Receipt>
    where
        F: FnOnce(&AccountId, &mut LedgerState, &mut Vec<SuretyEvent>) -> SuretyResult<()>,
    {
        let snapshot = self.state.clone();
        let mut events = Vec::new();

        let committed = f(&self.contract, &mut self.state, &mut events)
            .and_then(|()| self.journal.stage(block, &events))
            .and_then(|staged| self.journal.commit(staged));

        if let Err(err) = committed {
            self.state = snapshot;
            warn!(operation, block = block.number, error = %err, "Transaction rejected");
            return Err(err);
        }

        debug!(operation, block = block.number, events = events.len(), "Transaction committed");
        Ok(Receipt {
            block_number: block.number,
            events,
        })
    }

    // Administration.

    pub fn set_operating_status(&mut self, ctx: &CallContext, operational: bool) -> SuretyResult<Receipt> {
        self.transact("set_operating_status", &ctx.block, |_, state, events| {
            state
                .data
                .set_operating_status(&ctx.caller, operational, events)
                .map(|_| ())
        })
    }

    pub fn authorize_caller(&mut self, ctx: &CallContext, account: AccountId) -> SuretyResult<Receipt> {
        self.transact("authorize_caller", &ctx.block, |_, state, events| {
            state
                .data
                .authorize_caller(&ctx.caller, account, events)
                .map(|_| ())
        })
    }

    pub fn deauthorize_caller(&mut self, ctx: &CallContext, account: &AccountId) -> SuretyResult<Receipt> {
        self.transact("deauthorize_caller", &ctx.block, |_, state, events| {
            state
                .data
                .deauthorize_caller(&ctx.caller, account, events)
                .map(|_| ())
        })
    }

    // Airlines.

    pub fn register_airline(&mut self, ctx: &CallContext, candidate: &AccountId) -> SuretyResult<Receipt> {
        self.transact("register_airline", &ctx.block, |contract, state, events| {
            state
                .data
                .register_airline(contract, candidate, &ctx.caller, events)
                .map(|_| ())
        })
    }

    pub fn vote_for_airline(&mut self, ctx: &CallContext, candidate: &AccountId) -> SuretyResult<Receipt> {
        self.transact("vote_for_airline", &ctx.block, |contract, state, events| {
            state
                .data
                .vote_for_airline(contract, candidate, &ctx.caller, events)
                .map(|_| ())
        })
    }

    /// Stake `ctx.value` on behalf of `airline`; the caller must be the airline.
    pub fn fund_airline(&mut self, ctx: &CallContext, airline: &AccountId) -> SuretyResult<Receipt> {
        self.transact("fund_airline", &ctx.block, |contract, state, events| {
            state
                .data
                .fund_airline(contract, airline, &ctx.caller, ctx.value, events)
                .map(|_| ())
        })
    }

    // Passengers.

    /// Buy a policy for the caller, paying `ctx.value` as premium.
    pub fn buy_insurance(
        &mut self,
        ctx: &CallContext,
        airline: &AccountId,
        flight: &str,
        departure: u64,
    ) -> SuretyResult<Receipt> {
        let key = FlightKey::new(airline.clone(), flight, departure);
        self.transact("buy_insurance", &ctx.block, |contract, state, events| {
            state
                .data
                .buy_insurance(contract, &ctx.caller, &key, ctx.value, events)
        })
    }

    pub fn get_insurance(
        &self,
        passenger: &AccountId,
        airline: &AccountId,
        flight: &str,
        departure: u64,
    ) -> (Amount, PolicyState) {
        let key = PolicyKey::new(
            passenger.clone(),
            FlightKey::new(airline.clone(), flight, departure),
        );
        self.state.data.get_insurance(&key)
    }

    pub fn withdraw(&mut self, ctx: &CallContext, rail: &mut dyn PayoutRail) -> SuretyResult<Receipt> {
        self.transact("withdraw", &ctx.block, |contract, state, events| {
            state
                .data
                .withdraw(contract, &ctx.caller, rail, events)
                .map(|_| ())
        })
    }

    // Oracles.

    /// Register the caller as a reporter, paying `ctx.value` as fee.
    pub fn register_oracle(&mut self, ctx: &CallContext) -> SuretyResult<Receipt> {
        self.transact("register_oracle", &ctx.block, |contract, state, events| {
            state.data.guard().require_operational()?;
            let indexes = state
                .oracles
                .register(&ctx.caller, ctx.value, &ctx.block)?
                .indexes;
            state.data.collect_fee(contract, ctx.value)?;
            events.push(SuretyEvent::OracleRegistered {
                oracle: ctx.caller.clone(),
                indexes,
            });
            Ok(())
        })
    }

    pub fn oracle_indexes(&self, caller: &AccountId) -> SuretyResult<[u8; 3]> {
        self.state.oracles.indexes_of(caller)
    }

    /// Ask reporters for the status of a flight under a freshly drawn index.
    pub fn fetch_flight_status(
        &mut self,
        ctx: &CallContext,
        airline: &AccountId,
        flight: &str,
        departure: u64,
    ) -> SuretyResult<Receipt> {
        let flight = FlightKey::new(airline.clone(), flight, departure);
        self.transact("fetch_flight_status", &ctx.block, |_, state, events| {
            state.data.guard().require_operational()?;
            let (key, _) = state.oracles.open_request(&ctx.caller, flight, &ctx.block);
            events.push(SuretyEvent::OracleRequest {
                index: key.index,
                flight: key.flight,
            });
            Ok(())
        })
    }

    /// Record the caller's report; finalizing with an airline-fault status
    /// credits every purchased policy on the flight.
    pub fn submit_oracle_response(
        &mut self,
        ctx: &CallContext,
        index: u8,
        airline: &AccountId,
        flight: &str,
        departure: u64,
        status: StatusCode,
    ) -> SuretyResult<Receipt> {
        let key = RequestKey {
            index,
            flight: FlightKey::new(airline.clone(), flight, departure),
        };
        self.transact("submit_oracle_response", &ctx.block, |contract, state, events| {
            state.data.guard().require_operational()?;
            let outcome = state.oracles.submit(&key, status, &ctx.caller)?;
            if outcome == ResponseOutcome::Ignored {
                return Ok(());
            }

            events.push(SuretyEvent::OracleReport {
                index,
                flight: key.flight.clone(),
                reporter: ctx.caller.clone(),
                status,
            });
            if let ResponseOutcome::Finalized { status } = outcome {
                events.push(SuretyEvent::FlightStatusInfo {
                    index,
                    flight: key.flight.clone(),
                    status,
                });
                if status.is_airline_fault() {
                    state.data.credit_flight(contract, &key.flight, events)?;
                }
            }
            Ok(())
        })
    }

    // Reads.

    pub fn contract_id(&self) -> &AccountId {
        &self.contract
    }

    pub fn owner(&self) -> &AccountId {
        self.state.data.guard().owner()
    }

    pub fn is_operational(&self) -> bool {
        self.state.data.is_operational()
    }

    pub fn config(&self) -> &SuretyConfig {
        self.state.data.config()
    }

    pub fn data(&self) -> &SuretyData {
        &self.state.data
    }

    pub fn oracles(&self) -> &OracleConsensusEngine {
        &self.state.oracles
    }

    pub fn journal(&self) -> &EventJournal {
        &self.journal
    }

    pub fn balance_of(&self, account: &AccountId) -> Amount {
        self.state.data.balance_of(account)
    }

    pub fn flight_status(&self, airline: &AccountId, flight: &str, departure: u64) -> Option<StatusCode> {
        self.state
            .oracles
            .flight_status(&FlightKey::new(airline.clone(), flight, departure))
    }

    pub fn is_registered(&self, airline: &AccountId) -> bool {
        self.state.data.is_registered(airline)
    }

    pub fn is_funded(&self, airline: &AccountId) -> bool {
        self.state.data.is_funded(airline)
    }

    pub fn existing_count(&self) -> usize {
        self.state.data.existing_count()
    }

    pub fn funded_count(&self) -> usize {
        self.state.data.funded_count()
    }

    pub fn registered_count(&self) -> usize {
        self.state.data.registered_count()
    }
}
