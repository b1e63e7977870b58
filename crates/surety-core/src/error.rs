use crate::types::{AccountId, Amount};
use thiserror::Error;

/// Rejections of an attempted state transition.
///
/// Every variant discards the partial effects of the operation that raised it;
/// the transactional facade restores the pre-call state before returning.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SuretyError {
    #[error("contract is not operational")]
    NotOperational,

    #[error("caller {caller} is not authorized: {reason}")]
    Unauthorized { caller: AccountId, reason: String },

    #[error("insufficient funds: required {required}, provided {provided}")]
    InsufficientFunds { required: Amount, provided: Amount },

    #[error("airline {0} is not registered and funded")]
    UnregisteredAirline(AccountId),

    #[error("airline {0} has not provided its stake")]
    UnfundedAirline(AccountId),

    #[error("airline {voter} already voted for {candidate}")]
    DuplicateVote {
        candidate: AccountId,
        voter: AccountId,
    },

    #[error("policy already exists for passenger {passenger} on flight {flight}")]
    DuplicatePolicy { passenger: AccountId, flight: String },

    #[error("reporter {0} is already registered")]
    DuplicateOracle(AccountId),

    #[error("reporter {reporter} is not eligible for index {index}")]
    Ineligible { reporter: AccountId, index: u8 },

    #[error("no status request is open for index {index} on flight {flight}")]
    UnknownRequest { index: u8, flight: String },

    #[error("premium {premium} exceeds cap {cap}")]
    ExcessivePremium { premium: Amount, cap: Amount },

    #[error("no withdrawable funds for {0}")]
    NoFunds(AccountId),

    #[error("transfer to {recipient} failed: {reason}")]
    TransferFailed { recipient: AccountId, reason: String },

    #[error("arithmetic overflow in {0}")]
    Overflow(&'static str),

    #[error("journal error: {0}")]
    Journal(String),

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl SuretyError {
    pub fn unauthorized(caller: &AccountId, reason: impl Into<String>) -> Self {
        Self::Unauthorized {
            caller: caller.clone(),
            reason: reason.into(),
        }
    }
}

/// Result type alias for surety operations.
pub type SuretyResult<T> = Result<T, SuretyError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unauthorized_display_names_caller() {
        let err = SuretyError::unauthorized(&AccountId::new("airline-9"), "not registered");
        assert_eq!(
            err.to_string(),
            "caller airline-9 is not authorized: not registered"
        );
    }

    #[test]
    fn insufficient_funds_prints_units() {
        let err = SuretyError::InsufficientFunds {
            required: Amount::from_units(10),
            provided: Amount::from_units(9),
        };
        assert!(err.to_string().contains("required 10, provided 9"));
    }
}
