//! State-change notifications for presentation layers.

use crate::domain::{Decimal, Token, TransactionRecord};
use crate::engine::{PoolReserves, SwapQuote};
use serde::Serialize;
use std::collections::BTreeMap;
use tokio::sync::broadcast;

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum SessionEvent {
    #[serde(rename_all = "camelCase")]
    BalancesUpdated {
        balances: BTreeMap<Token, Decimal>,
        pool: PoolReserves,
    },
    QuoteUpdated {
        quote: Option<SwapQuote>,
    },
    ReputationUpdated {
        score: Decimal,
    },
    PriceUpdated {
        price: Decimal,
        delta: Decimal,
    },
    TransactionRecorded {
        record: TransactionRecord,
    },
    /// A request failed validation and was never queued.
    Rejected {
        reason: String,
    },
}

/// Fan-out of session events. Lagging or absent subscribers never block
/// the session.
#[derive(Debug, Clone)]
pub struct Notifier {
    tx: broadcast::Sender<SessionEvent>,
}

impl Notifier {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.tx.subscribe()
    }

    pub fn emit(&self, event: SessionEvent) {
        // Err only means nobody is listening.
        let _ = self.tx.send(event);
    }
}

impl Default for Notifier {
    fn default() -> Self {
        Self::new(256)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_emit_without_subscribers_is_fine() {
        let notifier = Notifier::default();
        notifier.emit(SessionEvent::Rejected {
            reason: "nobody listening".to_string(),
        });
    }

    #[tokio::test]
    async fn test_subscriber_receives_events() {
        let notifier = Notifier::default();
        let mut rx = notifier.subscribe();
        notifier.emit(SessionEvent::ReputationUpdated {
            score: Decimal::from_i64(121),
        });
        match rx.recv().await.unwrap() {
            SessionEvent::ReputationUpdated { score } => assert_eq!(score, Decimal::from_i64(121)),
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[test]
    fn test_event_json_is_tagged() {
        let json = serde_json::to_value(SessionEvent::PriceUpdated {
            price: Decimal::from_parts(45, 2),
            delta: Decimal::zero(),
        })
        .unwrap();
        assert_eq!(json["type"], "priceUpdated");
        assert_eq!(json["price"], 0.45);
    }
}
