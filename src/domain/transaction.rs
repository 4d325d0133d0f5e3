//! Transaction log records.

use crate::domain::{TimeMs, TxId};
use serde::{Deserialize, Serialize};

/// What kind of activity a record describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TxKind {
    Info,
    Swap,
    Lend,
    Reputation,
}

/// Lifecycle stage a record was written at.
///
/// Records are immutable; a settled transaction shows up as a `Pending`
/// record followed later by a `Confirmed` or `Failed` record with the same id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TxPhase {
    Pending,
    Confirmed,
    Failed,
    /// Standalone notice with no settlement attached (resets, reputation credits).
    Notice,
}

/// One append-only log entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionRecord {
    /// Position in the log; unique per session, strictly increasing.
    pub seq: u64,
    pub id: TxId,
    pub timestamp: TimeMs,
    pub kind: TxKind,
    pub phase: TxPhase,
    pub message: String,
}

impl TransactionRecord {
    pub fn is_settlement_of(&self, id: TxId) -> bool {
        self.id == id && matches!(self.phase, TxPhase::Confirmed | TxPhase::Failed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_serializes_camel_case() {
        let record = TransactionRecord {
            seq: 3,
            id: TxId::from_random_bytes([1u8; 16]),
            timestamp: TimeMs::new(1200),
            kind: TxKind::Swap,
            phase: TxPhase::Pending,
            message: "swap requested".to_string(),
        };
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["kind"], "swap");
        assert_eq!(json["phase"], "pending");
        assert_eq!(json["timestamp"], 1200);
        assert_eq!(json["seq"], 3);
    }

    #[test]
    fn test_is_settlement_of() {
        let id = TxId::from_random_bytes([2u8; 16]);
        let mut record = TransactionRecord {
            seq: 1,
            id,
            timestamp: TimeMs::new(0),
            kind: TxKind::Lend,
            phase: TxPhase::Pending,
            message: String::new(),
        };
        assert!(!record.is_settlement_of(id));
        record.phase = TxPhase::Failed;
        assert!(record.is_settlement_of(id));
        assert!(!record.is_settlement_of(TxId::from_random_bytes([3u8; 16])));
    }
}
