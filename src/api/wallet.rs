use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::api::{decimal_map, AppState};
use crate::domain::{Address, Token};
use crate::error::AppError;
use crate::lifecycle::Session;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    pub balances: BTreeMap<String, String>,
    pub pool: BTreeMap<String, String>,
    pub pending_count: usize,
    pub now_ms: i64,
}

impl WalletResponse {
    pub fn from_session(session: &Session) -> Self {
        let ledger = session.ledger();
        let pool = ledger.pool();
        let reserves = BTreeMap::from([(Token::Ifx, pool.ifx), (Token::World, pool.world)]);
        Self {
            address: session.identity().map(|a| a.to_string()),
            balances: decimal_map(ledger.balances()),
            pool: decimal_map(&reserves),
            pending_count: session.pending_count(),
            now_ms: session.now().as_ms(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ConnectRequest {
    pub address: String,
}

pub async fn connect(
    State(state): State<AppState>,
    payload: Result<Json<ConnectRequest>, JsonRejection>,
) -> Result<Json<WalletResponse>, AppError> {
    let Json(req) = payload?;
    let address = req.address.trim();
    if address.is_empty() {
        return Err(AppError::BadRequest("address: must not be empty".to_string()));
    }
    let mut session = state.session.lock().await;
    session.connect(Address::new(address.to_string()));
    Ok(Json(WalletResponse::from_session(&session)))
}

pub async fn disconnect(State(state): State<AppState>) -> Json<WalletResponse> {
    let mut session = state.session.lock().await;
    session.disconnect();
    Json(WalletResponse::from_session(&session))
}

pub async fn get_wallet(State(state): State<AppState>) -> Json<WalletResponse> {
    let session = state.session.lock().await;
    Json(WalletResponse::from_session(&session))
}

pub async fn reset_wallet(State(state): State<AppState>) -> Json<WalletResponse> {
    let (response, save) = {
        let mut session = state.session.lock().await;
        session.reset_wallet();
        (WalletResponse::from_session(&session), state.dirty_snapshot(&mut session))
    };
    state.persist(save).await;
    Json(response)
}
