use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::stream::{self, Stream};
use std::convert::Infallible;
use tokio::sync::broadcast::error::RecvError;
use tracing::warn;

use crate::api::AppState;
use crate::lifecycle::SessionEvent;

fn event_name(event: &SessionEvent) -> &'static str {
    match event {
        SessionEvent::BalancesUpdated { .. } => "balances",
        SessionEvent::QuoteUpdated { .. } => "quote",
        SessionEvent::ReputationUpdated { .. } => "reputation",
        SessionEvent::PriceUpdated { .. } => "price",
        SessionEvent::TransactionRecorded { .. } => "transaction",
        SessionEvent::Rejected { .. } => "rejected",
    }
}

/// Server-sent stream of session events. Slow clients skip what they missed.
pub async fn stream_events(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = state.session.lock().await.subscribe();

    let events = stream::unfold(rx, |mut rx| async move {
        loop {
            match rx.recv().await {
                Ok(event) => match Event::default().event(event_name(&event)).json_data(&event) {
                    Ok(sse) => return Some((Ok(sse), rx)),
                    Err(e) => warn!("Dropping unserializable event: {}", e),
                },
                Err(RecvError::Lagged(skipped)) => {
                    warn!("Event subscriber lagged, skipped {} events", skipped);
                }
                Err(RecvError::Closed) => return None,
            }
        }
    });

    Sse::new(events).keep_alive(KeepAlive::default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Decimal;

    #[test]
    fn test_event_names() {
        let event = SessionEvent::ReputationUpdated {
            score: Decimal::from_i64(121),
        };
        assert_eq!(event_name(&event), "reputation");
        let event = SessionEvent::Rejected {
            reason: "nope".to_string(),
        };
        assert_eq!(event_name(&event), "rejected");
    }
}
