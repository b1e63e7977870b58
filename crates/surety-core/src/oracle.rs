//! Reporter registration and flight-status consensus.
//!
//! Each reporter holds three distinct indices. A status request is opened under
//! one index and only reporters holding that index may answer it. The first
//! status code to collect `quorum` distinct reporters finalizes the request;
//! finalization happens once and later responses are ignored.
//!
//! Index draws hash the block entropy, the account, and a monotonic nonce. That
//! is weak randomness: good enough to spread requests across reporters, not to
//! resist a block producer choosing entropy.

use crate::error::{SuretyError, SuretyResult};
use crate::types::{AccountId, Amount, BlockContext, FlightKey, RequestKey, StatusCode};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReporterIdentity {
    pub account: AccountId,
    pub indexes: [u8; 3],
}

impl ReporterIdentity {
    pub fn holds(&self, index: u8) -> bool {
        self.indexes.contains(&index)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusRequest {
    pub requester: AccountId,
    pub opened_at_block: u64,
    responses: BTreeMap<StatusCode, BTreeSet<AccountId>>,
    responders: BTreeSet<AccountId>,
    resolved: Option<StatusCode>,
}

impl StatusRequest {
    fn new(requester: AccountId, opened_at_block: u64) -> Self {
        Self {
            requester,
            opened_at_block,
            responses: BTreeMap::new(),
            responders: BTreeSet::new(),
            resolved: None,
        }
    }

    pub fn is_finalized(&self) -> bool {
        self.resolved.is_some()
    }

    pub fn resolved_status(&self) -> Option<StatusCode> {
        self.resolved
    }

    pub fn response_count(&self, status: StatusCode) -> usize {
        self.responses.get(&status).map(BTreeSet::len).unwrap_or(0)
    }
}

/// What a response did to its request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseOutcome {
    Recorded { status: StatusCode, count: usize },
    Finalized { status: StatusCode },
    /// Request already finalized, or the reporter already answered it.
    Ignored,
}

#[derive(Debug, Clone)]
pub struct OracleConsensusEngine {
    reporters: BTreeMap<AccountId, ReporterIdentity>,
    requests: BTreeMap<RequestKey, StatusRequest>,
    nonce: u64,
    registration_fee: Amount,
    quorum: usize,
    index_range: u8,
}

impl OracleConsensusEngine {
    pub fn new(registration_fee: Amount, quorum: usize, index_range: u8) -> Self {
        Self {
            reporters: BTreeMap::new(),
            requests: BTreeMap::new(),
            nonce: 0,
            registration_fee,
            quorum,
            index_range,
        }
    }

    pub fn register(
        &mut self,
        caller: &AccountId,
        fee: Amount,
        block: &BlockContext,
    ) -> SuretyResult<&ReporterIdentity> {
        if fee < self.registration_fee {
            return Err(SuretyError::InsufficientFunds {
                required: self.registration_fee,
                provided: fee,
            });
        }
        if self.reporters.contains_key(caller) {
            return Err(SuretyError::DuplicateOracle(caller.clone()));
        }

        let indexes = self.draw_indexes(caller, block);
        info!(oracle = %caller, ?indexes, "Oracle registered");
        let identity = self
            .reporters
            .entry(caller.clone())
            .or_insert(ReporterIdentity {
                account: caller.clone(),
                indexes,
            });
        Ok(identity)
    }

    pub fn indexes_of(&self, reporter: &AccountId) -> SuretyResult<[u8; 3]> {
        self.reporters
            .get(reporter)
            .map(|identity| identity.indexes)
            .ok_or_else(|| SuretyError::unauthorized(reporter, "not a registered oracle"))
    }

    /// Open a request for `flight` under a freshly drawn index.
    ///
    /// Returns the key and whether a new request was created; drawing an index
    /// that already has a request for this flight leaves that request as is.
    pub fn open_request(
        &mut self,
        requester: &AccountId,
        flight: FlightKey,
        block: &BlockContext,
    ) -> (RequestKey, bool) {
        let index = self.random_index(requester, block);
        let key = RequestKey { index, flight };
        if self.requests.contains_key(&key) {
            debug!(index, flight = %key.flight, "Status request already open");
            return (key, false);
        }

        self.requests
            .insert(key.clone(), StatusRequest::new(requester.clone(), block.number));
        info!(index, flight = %key.flight, requester = %requester, "Status request opened");
        (key, true)
    }

    pub fn submit(
        &mut self,
        key: &RequestKey,
        status: StatusCode,
        reporter: &AccountId,
    ) -> SuretyResult<ResponseOutcome> {
        let eligible = self
            .reporters
            .get(reporter)
            .is_some_and(|identity| identity.holds(key.index));
        if !eligible {
            warn!(reporter = %reporter, index = key.index, "Ineligible oracle response");
            return Err(SuretyError::Ineligible {
                reporter: reporter.clone(),
                index: key.index,
            });
        }

        let request = self
            .requests
            .get_mut(key)
            .ok_or_else(|| SuretyError::UnknownRequest {
                index: key.index,
                flight: key.flight.to_string(),
            })?;

        if request.is_finalized() {
            debug!(reporter = %reporter, flight = %key.flight, "Response after finalization ignored");
            return Ok(ResponseOutcome::Ignored);
        }
        if !request.responders.insert(reporter.clone()) {
            debug!(reporter = %reporter, flight = %key.flight, "Repeated response ignored");
            return Ok(ResponseOutcome::Ignored);
        }

        let voters = request.responses.entry(status).or_default();
        voters.insert(reporter.clone());
        let count = voters.len();

        if count >= self.quorum {
            request.resolved = Some(status);
            info!(
                index = key.index,
                flight = %key.flight,
                status = %status,
                responses = count,
                "Status request finalized"
            );
            return Ok(ResponseOutcome::Finalized { status });
        }

        debug!(reporter = %reporter, status = %status, count, "Oracle response recorded");
        Ok(ResponseOutcome::Recorded { status, count })
    }

    pub fn request(&self, key: &RequestKey) -> Option<&StatusRequest> {
        self.requests.get(key)
    }

    /// Resolved status of any finalized request for `flight`.
    pub fn flight_status(&self, flight: &FlightKey) -> Option<StatusCode> {
        self.requests
            .iter()
            .filter(|(key, _)| &key.flight == flight)
            .find_map(|(_, request)| request.resolved)
    }

    pub fn reporter(&self, account: &AccountId) -> Option<&ReporterIdentity> {
        self.reporters.get(account)
    }

    pub fn reporters(&self) -> impl Iterator<Item = &ReporterIdentity> {
        self.reporters.values()
    }

    pub fn reporter_count(&self) -> usize {
        self.reporters.len()
    }

    pub fn registration_fee(&self) -> Amount {
        self.registration_fee
    }

    fn draw_indexes(&mut self, account: &AccountId, block: &BlockContext) -> [u8; 3] {
        let first = self.random_index(account, block);

        let mut second = self.random_index(account, block);
        while second == first {
            second = self.random_index(account, block);
        }

        let mut third = self.random_index(account, block);
        while third == first || third == second {
            third = self.random_index(account, block);
        }

        [first, second, third]
    }

    fn random_index(&mut self, account: &AccountId, block: &BlockContext) -> u8 {
        let mut hasher = blake3::Hasher::new();
        hasher.update(&block.entropy);
        hasher.update(account.as_str().as_bytes());
        hasher.update(&self.nonce.to_le_bytes());
        self.nonce = self.nonce.wrapping_add(1);

        let digest = hasher.finalize();
        let mut word = [0u8; 8];
        word.copy_from_slice(&digest.as_bytes()[..8]);
        (u64::from_le_bytes(word) % u64::from(self.index_range)) as u8
    }
}
