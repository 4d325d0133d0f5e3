use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::api::{parse_amount, AppState};
use crate::domain::Token;
use crate::error::AppError;
use crate::lifecycle::Session;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OracleResponse {
    pub ifx_usd: String,
    pub world_usd: String,
    pub delta: String,
    pub volatility: String,
    pub running: bool,
    /// Oldest first.
    pub history: Vec<String>,
}

impl OracleResponse {
    pub fn from_session(session: &Session) -> Self {
        let oracle = session.oracle();
        Self {
            ifx_usd: oracle.price_of(Token::Ifx).to_canonical_string(),
            world_usd: oracle.price_of(Token::World).to_canonical_string(),
            delta: oracle.last_delta().to_canonical_string(),
            volatility: oracle.volatility().to_canonical_string(),
            running: oracle.is_running(),
            history: oracle.history().map(|p| p.to_canonical_string()).collect(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct VolatilityRequest {
    pub volatility: String,
}

pub async fn get_oracle(State(state): State<AppState>) -> Json<OracleResponse> {
    let session = state.session.lock().await;
    Json(OracleResponse::from_session(&session))
}

pub async fn pause(State(state): State<AppState>) -> Json<OracleResponse> {
    update(&state, |s| s.set_oracle_running(false)).await
}

pub async fn resume(State(state): State<AppState>) -> Json<OracleResponse> {
    update(&state, |s| s.set_oracle_running(true)).await
}

pub async fn reset(State(state): State<AppState>) -> Json<OracleResponse> {
    update(&state, Session::reset_oracle).await
}

pub async fn set_volatility(
    State(state): State<AppState>,
    payload: Result<Json<VolatilityRequest>, JsonRejection>,
) -> Result<Json<OracleResponse>, AppError> {
    let Json(req) = payload?;
    let volatility = parse_amount("volatility", &req.volatility)?;
    let (response, save) = {
        let mut session = state.session.lock().await;
        session.set_volatility(volatility)?;
        (
            OracleResponse::from_session(&session),
            state.dirty_snapshot(&mut session),
        )
    };
    state.persist(save).await;
    Ok(Json(response))
}

async fn update<F>(state: &AppState, op: F) -> Json<OracleResponse>
where
    F: FnOnce(&mut Session),
{
    let (response, save) = {
        let mut session = state.session.lock().await;
        op(&mut session);
        (
            OracleResponse::from_session(&session),
            state.dirty_snapshot(&mut session),
        )
    };
    state.persist(save).await;
    Json(response)
}
