//! Drives the session's virtual clock from wall time.

use crate::api::AppState;
use crate::domain::TimeMs;
use chrono::Utc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;

/// Fire everything due by `now` and persist if the session changed.
pub async fn drive_once(state: &AppState, now: TimeMs) {
    let save = {
        let mut session = state.session.lock().await;
        session.advance_to(now);
        state.dirty_snapshot(&mut session)
    };
    state.persist(save).await;
}

/// Milliseconds of wall time since the session's clock origin.
pub fn elapsed_since_start(state: &AppState) -> TimeMs {
    let elapsed = Utc::now() - state.started_at;
    TimeMs::new(elapsed.num_milliseconds().max(0))
}

/// Run forever, advancing the session once per `period`.
pub async fn run_clock(state: AppState, period: Duration) {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    loop {
        interval.tick().await;
        drive_once(&state, elapsed_since_start(&state)).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{MemorySnapshotStore, SnapshotStore};
    use crate::domain::Decimal;
    use crate::domain::Token;
    use crate::engine::SeededRandom;
    use crate::lifecycle::{Session, SimParams};
    use std::sync::Arc;

    fn state_with(store: Arc<MemorySnapshotStore>) -> AppState {
        let session = Session::new(SimParams::default(), Box::new(SeededRandom::from_seed(11)));
        AppState::new(session, store)
    }

    #[tokio::test]
    async fn test_drive_once_confirms_and_persists() {
        let store = Arc::new(MemorySnapshotStore::new());
        let state = state_with(store.clone());
        {
            let mut session = state.session.lock().await;
            session
                .request_swap(Token::Ifx, Token::World, Decimal::from_i64(100))
                .unwrap();
        }

        drive_once(&state, TimeMs::new(2_300)).await;

        let session = state.session.lock().await;
        assert_eq!(session.pending_count(), 0);
        assert_eq!(session.now(), TimeMs::new(2_300));
        let saved = store.load_snapshot().await.unwrap().unwrap();
        assert_eq!(saved, session.snapshot());
    }

    #[tokio::test]
    async fn test_idle_drive_does_not_save() {
        let store = Arc::new(MemorySnapshotStore::new());
        let state = state_with(store.clone());
        drive_once(&state, TimeMs::new(100)).await;
        assert!(store.current().is_none());
    }
}
