//! Seeded simulation of the delayed-flight purchase flow.
//!
//! One airline, one passenger, `reporters` synthetic oracles. Eligible
//! reporters answer in random order: with probability `status_bias` they
//! report the airline-fault code, otherwise a random other code.

use crate::error::{CliError, CliResult};
use crate::replay::SimulatedRail;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use surety_core::{
    AccountId, Amount, BlockContext, CallContext, PolicyState, StatusCode, SuretyApp,
    SuretyConfig, SuretyEvent,
};
use tracing::{debug, info};

const FLIGHT: &str = "AB123";
const DEPARTURE: u64 = 1_700_003_600;
const START_TIME: i64 = 1_700_000_000;

const NON_FAULT_CODES: [StatusCode; 5] = [
    StatusCode::Unknown,
    StatusCode::OnTime,
    StatusCode::LateWeather,
    StatusCode::LateTechnical,
    StatusCode::LateOther,
];

#[derive(Debug, Clone)]
pub struct SimulationParams {
    pub reporters: usize,
    pub seed: u64,
    pub status_bias: f64,
    pub premium: Amount,
}

impl Default for SimulationParams {
    fn default() -> Self {
        Self {
            reporters: 20,
            seed: 7,
            status_bias: 0.8,
            premium: Amount::from_minor(Amount::from_units(1).minor() / 10),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SimulationReport {
    pub seed: u64,
    pub request_index: u8,
    pub reporters: usize,
    pub eligible: usize,
    pub responses: Vec<(AccountId, StatusCode)>,
    pub resolved: Option<StatusCode>,
    pub policy_state: PolicyState,
    pub credited: Amount,
    pub withdrawn: Amount,
    pub journal_entries: usize,
    pub journal_verified: bool,
}

struct Chain {
    app: SuretyApp,
    rng: StdRng,
    number: u64,
}

impl Chain {
    fn call(&mut self, caller: &AccountId) -> CallContext {
        self.number += 1;
        let block = BlockContext::seeded(self.number, START_TIME + 12 * self.number as i64, self.rng.gen());
        CallContext::new(caller.clone(), block)
    }
}

pub fn run(params: &SimulationParams, config: SuretyConfig) -> CliResult<SimulationReport> {
    if !(0.0..=1.0).contains(&params.status_bias) {
        return Err(CliError::Config(format!(
            "status bias must be within 0..=1, got {}",
            params.status_bias
        )));
    }

    let owner = AccountId::new("owner");
    let airline = AccountId::new("a1");
    let passenger = AccountId::new("p1");
    let stake = config.minimum_stake;
    let fee = config.oracle_registration_fee;

    let mut chain = Chain {
        app: SuretyApp::new(owner, airline.clone(), config)?,
        rng: StdRng::seed_from_u64(params.seed),
        number: 0,
    };

    let ctx = chain.call(&airline).with_value(stake);
    chain.app.fund_airline(&ctx, &airline)?;
    let ctx = chain.call(&passenger).with_value(params.premium);
    chain.app.buy_insurance(&ctx, &airline, FLIGHT, DEPARTURE)?;

    let reporters: Vec<AccountId> = (0..params.reporters)
        .map(|i| AccountId::new(format!("oracle-{}", i)))
        .collect();
    for reporter in &reporters {
        let ctx = chain.call(reporter).with_value(fee);
        chain.app.register_oracle(&ctx)?;
    }

    let ctx = chain.call(&passenger);
    let receipt = chain
        .app
        .fetch_flight_status(&ctx, &airline, FLIGHT, DEPARTURE)?;
    let request_index = receipt
        .events
        .iter()
        .find_map(|event| match event {
            SuretyEvent::OracleRequest { index, .. } => Some(*index),
            _ => None,
        })
        .ok_or_else(|| CliError::Script("status request was not opened".to_string()))?;

    let mut eligible: Vec<AccountId> = reporters
        .iter()
        .filter(|reporter| {
            chain
                .app
                .oracle_indexes(reporter)
                .is_ok_and(|indexes| indexes.contains(&request_index))
        })
        .cloned()
        .collect();
    eligible.shuffle(&mut chain.rng);
    debug!(index = request_index, eligible = eligible.len(), "Eligible reporters drawn");

    let mut responses = Vec::new();
    for reporter in &eligible {
        if chain
            .app
            .flight_status(&airline, FLIGHT, DEPARTURE)
            .is_some()
        {
            break;
        }
        let status = if chain.rng.gen_bool(params.status_bias) {
            StatusCode::LateAirline
        } else {
            NON_FAULT_CODES
                .choose(&mut chain.rng)
                .copied()
                .unwrap_or(StatusCode::Unknown)
        };
        let ctx = chain.call(reporter);
        chain
            .app
            .submit_oracle_response(&ctx, request_index, &airline, FLIGHT, DEPARTURE, status)?;
        responses.push((reporter.clone(), status));
    }

    let credited = chain.app.balance_of(&passenger);
    let mut withdrawn = Amount::ZERO;
    if !credited.is_zero() {
        let mut rail = SimulatedRail::default();
        let ctx = chain.call(&passenger);
        let receipt = chain.app.withdraw(&ctx, &mut rail)?;
        withdrawn = receipt
            .events
            .iter()
            .find_map(|event| match event {
                SuretyEvent::Withdrawn { amount, .. } => Some(*amount),
                _ => None,
            })
            .unwrap_or(Amount::ZERO);
    }

    let report = SimulationReport {
        seed: params.seed,
        request_index,
        reporters: reporters.len(),
        eligible: eligible.len(),
        resolved: chain.app.flight_status(&airline, FLIGHT, DEPARTURE),
        policy_state: chain
            .app
            .get_insurance(&passenger, &airline, FLIGHT, DEPARTURE)
            .1,
        responses,
        credited,
        withdrawn,
        journal_entries: chain.app.journal().len(),
        journal_verified: chain.app.journal().verify_chain(),
    };
    info!(
        seed = report.seed,
        eligible = report.eligible,
        resolved = ?report.resolved,
        withdrawn = %report.withdrawn,
        "Simulation finished"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_seed_same_outcome() {
        let params = SimulationParams::default();
        let first = run(&params, SuretyConfig::default()).unwrap();
        let second = run(&params, SuretyConfig::default()).unwrap();
        assert_eq!(first.request_index, second.request_index);
        assert_eq!(first.responses, second.responses);
        assert_eq!(first.resolved, second.resolved);
        assert!(first.journal_verified);
    }

    #[test]
    fn test_full_bias_pays_out() {
        // Each reporter holds 3 of 10 indices, so 100 reporters leave the
        // request with at least three eligible answers.
        let params = SimulationParams {
            reporters: 100,
            status_bias: 1.0,
            ..SimulationParams::default()
        };
        let report = run(&params, SuretyConfig::default()).unwrap();

        assert!(report.eligible >= 3);
        assert_eq!(report.responses.len(), 3);
        assert!(report.responses.iter().all(|(_, s)| *s == StatusCode::LateAirline));
        assert_eq!(report.resolved, Some(StatusCode::LateAirline));
        assert_eq!(report.policy_state, PolicyState::Paid);
        assert_eq!(report.credited, "0.15".parse().unwrap());
        assert_eq!(report.withdrawn, report.credited);
        assert!(report.journal_verified);
    }

    #[test]
    fn test_zero_bias_never_credits() {
        let params = SimulationParams {
            reporters: 40,
            status_bias: 0.0,
            ..SimulationParams::default()
        };
        let report = run(&params, SuretyConfig::default()).unwrap();
        assert_eq!(report.credited, Amount::ZERO);
        assert_eq!(report.policy_state, PolicyState::Purchased);
    }

    #[test]
    fn test_bias_out_of_range_rejected() {
        let params = SimulationParams {
            status_bias: 1.5,
            ..SimulationParams::default()
        };
        assert!(matches!(
            run(&params, SuretyConfig::default()),
            Err(CliError::Config(_))
        ));
    }
}
