pub mod events;
pub mod health;
pub mod lending;
pub mod oracle;
pub mod reputation;
pub mod swap;
pub mod transactions;
pub mod wallet;

use crate::db::{save_best_effort, SnapshotStore};
use crate::domain::{Decimal, TimeMs, Token};
use crate::error::AppError;
use crate::lifecycle::{Session, SessionSnapshot};
use axum::{
    routing::{get, post},
    Router,
};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tower_http::cors::{Any, CorsLayer};
use tracing::debug;

#[derive(Clone)]
pub struct AppState {
    pub session: Arc<Mutex<Session>>,
    pub store: Arc<dyn SnapshotStore>,
    /// Wall-clock instant matching virtual time zero.
    pub started_at: DateTime<Utc>,
    generation: Arc<AtomicU64>,
    /// Generation of the newest snapshot written to the store.
    saved_generation: Arc<Mutex<u64>>,
}

/// A snapshot taken under the session lock, tagged with its position in
/// mutation order.
#[derive(Debug)]
pub struct PendingSave {
    pub generation: u64,
    pub snapshot: SessionSnapshot,
}

impl AppState {
    pub fn new(session: Session, store: Arc<dyn SnapshotStore>) -> Self {
        Self {
            session: Arc::new(Mutex::new(session)),
            store,
            started_at: Utc::now(),
            generation: Arc::new(AtomicU64::new(0)),
            saved_generation: Arc::new(Mutex::new(0)),
        }
    }

    /// Snapshot to persist, if anything changed since the last one.
    /// Must be called while holding the session lock.
    pub fn dirty_snapshot(&self, session: &mut Session) -> Option<PendingSave> {
        if !session.take_dirty() {
            return None;
        }
        Some(PendingSave {
            generation: self.generation.fetch_add(1, Ordering::SeqCst) + 1,
            snapshot: session.snapshot(),
        })
    }

    /// Persist a pending save after releasing the session lock. Saves are
    /// serialized, and one older than what the store already holds is dropped.
    pub async fn persist(&self, save: Option<PendingSave>) {
        let Some(save) = save else {
            return;
        };
        let mut saved = self.saved_generation.lock().await;
        if save.generation <= *saved {
            debug!(generation = save.generation, newest = *saved, "Skipping stale snapshot");
            return;
        }
        if save_best_effort(self.store.as_ref(), &save.snapshot).await {
            *saved = save.generation;
        }
    }

    pub fn wall_clock(&self, t: TimeMs) -> DateTime<Utc> {
        self.started_at + chrono::Duration::milliseconds(t.as_ms())
    }
}

pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health::health))
        .route("/ready", get(health::ready))
        .route("/v1/wallet", get(wallet::get_wallet))
        .route("/v1/wallet/reset", post(wallet::reset_wallet))
        .route("/v1/wallet/connect", post(wallet::connect))
        .route("/v1/wallet/disconnect", post(wallet::disconnect))
        .route("/v1/swap/quote", post(swap::post_quote))
        .route("/v1/swap", post(swap::post_swap))
        .route("/v1/lending/estimate", post(lending::post_estimate))
        .route("/v1/lending", post(lending::post_lend))
        .route("/v1/reputation", get(reputation::get_reputation))
        .route(
            "/v1/reputation/governance",
            post(reputation::post_governance),
        )
        .route("/v1/oracle", get(oracle::get_oracle))
        .route("/v1/oracle/pause", post(oracle::pause))
        .route("/v1/oracle/resume", post(oracle::resume))
        .route("/v1/oracle/reset", post(oracle::reset))
        .route("/v1/oracle/volatility", post(oracle::set_volatility))
        .route("/v1/transactions", get(transactions::get_transactions))
        .route("/v1/events", get(events::stream_events))
        .layer(cors)
        .with_state(state)
}

pub(crate) fn parse_token(field: &str, raw: &str) -> Result<Token, AppError> {
    Token::from_str(raw).map_err(|_| AppError::BadRequest(format!("{}: unknown token {}", field, raw)))
}

pub(crate) fn parse_amount(field: &str, raw: &str) -> Result<Decimal, AppError> {
    Decimal::from_str(raw.trim())
        .map_err(|_| AppError::BadRequest(format!("{}: invalid decimal {}", field, raw)))
}

pub(crate) fn decimal_map(map: &BTreeMap<Token, Decimal>) -> BTreeMap<String, String> {
    map.iter()
        .map(|(token, amount)| (token.to_string(), amount.to_canonical_string()))
        .collect()
}
