//! Script replay against a fresh ledger.

use crate::error::CliResult;
use crate::script::{Call, Script, Transaction};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use surety_core::{
    AccountId, BlockContext, CallContext, FlightKey, Payout, PayoutLedger, PayoutRail, RailError,
    Receipt, SuretyApp, SuretyConfig, SuretyError, SuretyEvent, SuretyResult,
};
use tracing::{debug, info};

/// In-process payout rail: records transfers, reverts for listed recipients.
#[derive(Debug, Default)]
pub struct SimulatedRail {
    reverting: BTreeSet<AccountId>,
    transfers: Vec<Payout>,
}

impl SimulatedRail {
    pub fn new(reverting: BTreeSet<AccountId>) -> Self {
        Self {
            reverting,
            transfers: Vec::new(),
        }
    }

    pub fn transfers(&self) -> &[Payout] {
        &self.transfers
    }
}

impl PayoutRail for SimulatedRail {
    fn transfer(&mut self, payout: &Payout, ledger: &PayoutLedger) -> Result<(), RailError> {
        if self.reverting.contains(&payout.recipient) {
            return Err(RailError::Rejected(format!(
                "{} reverted the transfer",
                payout.recipient
            )));
        }
        debug!(
            recipient = %payout.recipient,
            amount = %payout.amount,
            balance_after = %ledger.balance_of(&payout.recipient),
            "Simulated transfer"
        );
        self.transfers.push(payout.clone());
        Ok(())
    }
}

/// What happened to one scripted transaction.
#[derive(Debug, Clone, Serialize)]
pub struct TxOutcome {
    pub position: usize,
    pub block: u64,
    pub caller: AccountId,
    pub call: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub receipt: Option<Receipt>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rejection: Option<String>,
}

impl TxOutcome {
    pub fn is_committed(&self) -> bool {
        self.receipt.is_some()
    }
}

pub struct ReplayRun {
    pub app: SuretyApp,
    pub outcomes: Vec<TxOutcome>,
    pub rail: SimulatedRail,
}

impl ReplayRun {
    pub fn committed(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_committed()).count()
    }

    pub fn rejected(&self) -> usize {
        self.outcomes.len() - self.committed()
    }
}

/// Replay every transaction in order. Rejections are recorded, not fatal.
pub fn replay(script: &Script, config: SuretyConfig) -> CliResult<ReplayRun> {
    script.check()?;
    let mut app = SuretyApp::new(
        script.genesis.owner.clone(),
        script.genesis.seed_airline.clone(),
        config,
    )?;
    let mut rail = SimulatedRail::new(script.reverting_recipients.clone());
    let mut last_request: BTreeMap<FlightKey, u8> = BTreeMap::new();
    let mut outcomes = Vec::with_capacity(script.transactions.len());

    for (position, tx) in script.transactions.iter().enumerate() {
        let number = position as u64 + 1;
        let timestamp = script.genesis.start_time + script.genesis.block_interval * number as i64;
        let block = BlockContext::seeded(number, timestamp, tx.seed.unwrap_or(number));
        let ctx = CallContext::new(tx.caller.clone(), block).with_value(tx.value);

        let result = execute(&mut app, &ctx, tx, &last_request, &mut rail);
        let outcome = match result {
            Ok(receipt) => {
                for event in &receipt.events {
                    if let SuretyEvent::OracleRequest { index, flight } = event {
                        last_request.insert(flight.clone(), *index);
                    }
                }
                TxOutcome {
                    position,
                    block: number,
                    caller: tx.caller.clone(),
                    call: tx.call.name(),
                    receipt: Some(receipt),
                    rejection: None,
                }
            }
            Err(err) => TxOutcome {
                position,
                block: number,
                caller: tx.caller.clone(),
                call: tx.call.name(),
                receipt: None,
                rejection: Some(err.to_string()),
            },
        };
        outcomes.push(outcome);
    }

    let run = ReplayRun {
        app,
        outcomes,
        rail,
    };
    info!(
        transactions = run.outcomes.len(),
        committed = run.committed(),
        rejected = run.rejected(),
        journal_entries = run.app.journal().len(),
        "Replay finished"
    );
    Ok(run)
}

fn execute(
    app: &mut SuretyApp,
    ctx: &CallContext,
    tx: &Transaction,
    last_request: &BTreeMap<FlightKey, u8>,
    rail: &mut SimulatedRail,
) -> SuretyResult<Receipt> {
    match &tx.call {
        Call::SetOperatingStatus { operational } => app.set_operating_status(ctx, *operational),
        Call::AuthorizeCaller { account } => app.authorize_caller(ctx, account.clone()),
        Call::DeauthorizeCaller { account } => app.deauthorize_caller(ctx, account),
        Call::RegisterAirline { candidate } => app.register_airline(ctx, candidate),
        Call::VoteForAirline { candidate } => app.vote_for_airline(ctx, candidate),
        Call::FundAirline { airline } => app.fund_airline(ctx, airline),
        Call::BuyInsurance {
            airline,
            flight,
            departure,
        } => app.buy_insurance(ctx, airline, flight, *departure),
        Call::RegisterOracle => app.register_oracle(ctx),
        Call::FetchFlightStatus {
            airline,
            flight,
            departure,
        } => app.fetch_flight_status(ctx, airline, flight, *departure),
        Call::SubmitOracleResponse {
            index,
            airline,
            flight,
            departure,
            status,
        } => {
            let key = FlightKey::new(airline.clone(), flight.as_str(), *departure);
            let index = match index.or_else(|| last_request.get(&key).copied()) {
                Some(index) => index,
                None => {
                    return Err(SuretyError::UnknownRequest {
                        index: 0,
                        flight: key.to_string(),
                    })
                }
            };
            app.submit_oracle_response(ctx, index, airline, flight, *departure, *status)
        }
        Call::Withdraw => app.withdraw(ctx, rail),
    }
}
