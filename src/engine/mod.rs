//! Pure simulation components: ledger, oracle, pricing, lending, reputation.
//!
//! Nothing here knows about time or scheduling; the lifecycle layer decides
//! when each component runs.

use crate::domain::{Decimal, Token};
use thiserror::Error;

pub mod amm;
pub mod ledger;
pub mod lending;
pub mod oracle;
pub mod random;
pub mod reputation;

pub use amm::{AmmEngine, AmmParams, SwapQuote};
pub use ledger::{Ledger, PoolReserves};
pub use lending::{DepositReceipt, LendingEstimate, LendingEstimator, LendingParams};
pub use oracle::{Oracle, OracleParams};
pub use random::{RandomSource, ScriptedRandom, SeededRandom};
pub use reputation::{ActionKind, ReputationParams, ReputationTracker};

/// Recoverable simulation failures. None of these is fatal.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SimError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("insufficient {token} balance: requested {requested}, available {available}")]
    InsufficientBalance {
        token: Token,
        requested: Decimal,
        available: Decimal,
    },
    #[error("pool cannot pay out {token} for this trade")]
    PoolExhausted { token: Token },
    #[error("persistence unavailable: {0}")]
    PersistenceUnavailable(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sim_error_display() {
        let err = SimError::InsufficientBalance {
            token: Token::Ifx,
            requested: Decimal::from_i64(20),
            available: Decimal::from_i64(10),
        };
        assert_eq!(
            err.to_string(),
            "insufficient IFX balance: requested 20, available 10"
        );

        let err = SimError::PoolExhausted { token: Token::World };
        assert_eq!(err.to_string(), "pool cannot pay out WORLD for this trade");
    }
}
