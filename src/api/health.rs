use axum::extract::State;
use axum::Json;

use crate::api::AppState;

pub async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({"status": "ok"}))
}

pub async fn ready(State(state): State<AppState>) -> Json<serde_json::Value> {
    let session = state.session.lock().await;
    Json(serde_json::json!({
        "status": "ready",
        "nowMs": session.now().as_ms(),
        "oracleRunning": session.oracle().is_running(),
        "pendingCount": session.pending_count(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemorySnapshotStore;
    use crate::engine::SeededRandom;
    use crate::lifecycle::{Session, SimParams};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_health_returns_ok() {
        let Json(body) = health().await;
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn test_ready_reports_session() {
        let session = Session::new(SimParams::default(), Box::new(SeededRandom::from_seed(3)));
        let state = AppState::new(session, Arc::new(MemorySnapshotStore::new()));
        let Json(body) = ready(State(state)).await;
        assert_eq!(body["status"], "ready");
        assert_eq!(body["oracleRunning"], true);
        assert_eq!(body["pendingCount"], 0);
    }
}
