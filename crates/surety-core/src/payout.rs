//! Withdrawable credit and caller-initiated withdrawal.
//!
//! The balance is debited before the rail is invoked, so a recipient that
//! re-enters the ledger during the transfer sees nothing left to withdraw.

use crate::error::{SuretyError, SuretyResult};
use crate::types::{AccountId, Amount};
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::{info, warn};

/// A value transfer handed to the rail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Payout {
    pub recipient: AccountId,
    pub amount: Amount,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RailError {
    #[error("recipient rejected transfer: {0}")]
    Rejected(String),
    #[error("rail unavailable: {0}")]
    Unavailable(String),
}

/// External value-transfer collaborator.
///
/// `ledger` is the payout ledger as the recipient would observe it mid-transfer.
pub trait PayoutRail {
    fn transfer(&mut self, payout: &Payout, ledger: &PayoutLedger) -> Result<(), RailError>;
}

#[derive(Debug, Clone, Default)]
pub struct PayoutLedger {
    balances: BTreeMap<AccountId, Amount>,
    total_paid: Amount,
}

impl PayoutLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn balance_of(&self, account: &AccountId) -> Amount {
        self.balances.get(account).copied().unwrap_or(Amount::ZERO)
    }

    pub fn total_paid(&self) -> Amount {
        self.total_paid
    }

    pub fn total_outstanding(&self) -> SuretyResult<Amount> {
        self.balances.values().try_fold(Amount::ZERO, |acc, amount| {
            acc.checked_add(*amount)
                .ok_or(SuretyError::Overflow("outstanding balances"))
        })
    }

    pub(crate) fn credit(&mut self, account: &AccountId, amount: Amount) -> SuretyResult<Amount> {
        let balance = self
            .balance_of(account)
            .checked_add(amount)
            .ok_or(SuretyError::Overflow("account balance"))?;
        self.balances.insert(account.clone(), balance);
        Ok(balance)
    }

    /// Pay out the caller's whole balance through `rail`.
    pub fn withdraw(&mut self, caller: &AccountId, rail: &mut dyn PayoutRail) -> SuretyResult<Amount> {
        let amount = self.balance_of(caller);
        if amount.is_zero() {
            return Err(SuretyError::NoFunds(caller.clone()));
        }

        self.balances.insert(caller.clone(), Amount::ZERO);
        let payout = Payout {
            recipient: caller.clone(),
            amount,
        };

        if let Err(err) = rail.transfer(&payout, self) {
            self.balances.insert(caller.clone(), amount);
            warn!(account = %caller, amount = %amount, error = %err, "Withdrawal transfer failed");
            return Err(SuretyError::TransferFailed {
                recipient: caller.clone(),
                reason: err.to_string(),
            });
        }

        self.total_paid = self
            .total_paid
            .checked_add(amount)
            .ok_or(SuretyError::Overflow("total paid"))?;
        info!(account = %caller, amount = %amount, "Withdrawal completed");
        Ok(amount)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct RecordingRail {
        sent: Vec<Payout>,
        observed_balance: Option<Amount>,
    }

    impl PayoutRail for RecordingRail {
        fn transfer(&mut self, payout: &Payout, ledger: &PayoutLedger) -> Result<(), RailError> {
            self.observed_balance = Some(ledger.balance_of(&payout.recipient));
            self.sent.push(payout.clone());
            Ok(())
        }
    }

    struct FailingRail;

    impl PayoutRail for FailingRail {
        fn transfer(&mut self, _payout: &Payout, _ledger: &PayoutLedger) -> Result<(), RailError> {
            Err(RailError::Rejected("recipient reverted".into()))
        }
    }

    fn funded_ledger(account: &AccountId) -> PayoutLedger {
        let mut ledger = PayoutLedger::new();
        ledger.credit(account, "0.15".parse().unwrap()).unwrap();
        ledger
    }

    #[test]
    fn withdraw_zeroes_balance_before_transfer() {
        let passenger = AccountId::new("p1");
        let mut ledger = funded_ledger(&passenger);
        let mut rail = RecordingRail::default();

        let paid = ledger.withdraw(&passenger, &mut rail).unwrap();

        assert_eq!(paid, "0.15".parse().unwrap());
        assert_eq!(rail.observed_balance, Some(Amount::ZERO));
        assert_eq!(rail.sent.len(), 1);
        assert_eq!(ledger.balance_of(&passenger), Amount::ZERO);
        assert_eq!(ledger.total_paid(), paid);
    }

    #[test]
    fn empty_balance_is_rejected() {
        let mut ledger = PayoutLedger::new();
        let mut rail = RecordingRail::default();
        let err = ledger
            .withdraw(&AccountId::new("p1"), &mut rail)
            .unwrap_err();
        assert!(matches!(err, SuretyError::NoFunds(_)));
        assert!(rail.sent.is_empty());
    }

    #[test]
    fn failed_transfer_restores_exact_balance() {
        let passenger = AccountId::new("p1");
        let mut ledger = funded_ledger(&passenger);

        let err = ledger.withdraw(&passenger, &mut FailingRail).unwrap_err();

        assert!(matches!(err, SuretyError::TransferFailed { .. }));
        assert_eq!(ledger.balance_of(&passenger), "0.15".parse().unwrap());
        assert_eq!(ledger.total_paid(), Amount::ZERO);
    }

    #[test]
    fn second_withdrawal_has_nothing_left() {
        let passenger = AccountId::new("p1");
        let mut ledger = funded_ledger(&passenger);
        let mut rail = RecordingRail::default();
        ledger.withdraw(&passenger, &mut rail).unwrap();

        let err = ledger.withdraw(&passenger, &mut rail).unwrap_err();
        assert!(matches!(err, SuretyError::NoFunds(_)));
        assert_eq!(rail.sent.len(), 1);
    }
}
