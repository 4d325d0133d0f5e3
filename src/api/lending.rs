use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::api::swap::ReceiptDto;
use crate::api::{parse_amount, AppState};
use crate::engine::LendingEstimate;
use crate::error::AppError;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EstimateRequest {
    pub collateral: String,
    pub ltv_percent: String,
}

#[derive(Debug, Deserialize)]
pub struct LendRequest {
    pub collateral: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EstimateDto {
    pub collateral: String,
    pub ltv_percent: String,
    pub collateral_value_usd: String,
    pub max_borrow_usd: String,
    pub borrow_apy: String,
}

impl From<&LendingEstimate> for EstimateDto {
    fn from(e: &LendingEstimate) -> Self {
        Self {
            collateral: e.collateral_amount.to_canonical_string(),
            ltv_percent: e.ltv_percent.to_canonical_string(),
            collateral_value_usd: e.collateral_value_quote.to_canonical_string(),
            max_borrow_usd: e.max_borrow_quote.to_canonical_string(),
            borrow_apy: e.borrow_apy.to_canonical_string(),
        }
    }
}

pub async fn post_estimate(
    State(state): State<AppState>,
    payload: Result<Json<EstimateRequest>, JsonRejection>,
) -> Result<Json<EstimateDto>, AppError> {
    let Json(req) = payload?;
    let collateral = parse_amount("collateral", &req.collateral)?;
    let ltv_percent = parse_amount("ltvPercent", &req.ltv_percent)?;

    let session = state.session.lock().await;
    let estimate = session.estimate_lending(collateral, ltv_percent)?;
    Ok(Json(EstimateDto::from(&estimate)))
}

pub async fn post_lend(
    State(state): State<AppState>,
    payload: Result<Json<LendRequest>, JsonRejection>,
) -> Result<Json<ReceiptDto>, AppError> {
    let Json(req) = payload?;
    let collateral = parse_amount("collateral", &req.collateral)?;

    let (receipt, save) = {
        let mut session = state.session.lock().await;
        let receipt = session.request_lend(collateral)?;
        (receipt, state.dirty_snapshot(&mut session))
    };
    state.persist(save).await;
    Ok(Json(ReceiptDto::from_receipt(&state, &receipt)))
}
