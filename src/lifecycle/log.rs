use crate::domain::{TimeMs, TransactionRecord, TxId, TxKind, TxPhase};
use std::collections::VecDeque;

/// Append-only transaction log with a retention cap.
#[derive(Debug, Clone)]
pub struct TransactionLog {
    records: VecDeque<TransactionRecord>,
    retention: usize,
    next_seq: u64,
}

impl TransactionLog {
    pub fn new(retention: usize) -> Self {
        Self {
            records: VecDeque::new(),
            retention: retention.max(1),
            next_seq: 1,
        }
    }

    pub fn append(
        &mut self,
        id: TxId,
        timestamp: TimeMs,
        kind: TxKind,
        phase: TxPhase,
        message: String,
    ) -> &TransactionRecord {
        let record = TransactionRecord {
            seq: self.next_seq,
            id,
            timestamp,
            kind,
            phase,
            message,
        };
        self.next_seq += 1;
        while self.records.len() >= self.retention {
            self.records.pop_front();
        }
        self.records.push_back(record);
        &self.records[self.records.len() - 1]
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Oldest first.
    pub fn records(&self) -> impl DoubleEndedIterator<Item = &TransactionRecord> + '_ {
        self.records.iter()
    }

    /// Every retained record for one transaction, in append order.
    pub fn for_id(&self, id: TxId) -> Vec<&TransactionRecord> {
        self.records.iter().filter(|r| r.id == id).collect()
    }

    pub fn latest(&self) -> Option<&TransactionRecord> {
        self.records.back()
    }
}
