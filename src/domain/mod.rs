//! Domain types for the swap simulator.
//!
//! This module provides:
//! - Lossless numeric handling via Decimal wrapper
//! - Domain primitives: TimeMs, Address, Token, TxId
//! - Immutable transaction log records

pub mod decimal;
pub mod primitives;
pub mod transaction;

pub use decimal::Decimal;
pub use primitives::{Address, TimeMs, Token, TokenParseError, TxId};
pub use transaction::{TransactionRecord, TxKind, TxPhase};
