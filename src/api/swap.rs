use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::api::{parse_amount, parse_token, AppState};
use crate::engine::SwapQuote;
use crate::error::AppError;
use crate::lifecycle::{PendingAction, PendingReceipt};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SwapRequest {
    pub from: String,
    pub to: String,
    pub amount: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteDto {
    pub from: String,
    pub to: String,
    pub amount_in: String,
    pub amount_in_effective: String,
    pub fee_amount: String,
    pub amount_out: String,
    pub executed_price: String,
    pub mid_price: String,
    pub price_impact_percent: String,
}

impl From<&SwapQuote> for QuoteDto {
    fn from(q: &SwapQuote) -> Self {
        Self {
            from: q.from.to_string(),
            to: q.to.to_string(),
            amount_in: q.amount_in.to_canonical_string(),
            amount_in_effective: q.amount_in_effective.to_canonical_string(),
            fee_amount: q.fee_amount.to_canonical_string(),
            amount_out: q.amount_out.to_canonical_string(),
            executed_price: q.executed_price.to_canonical_string(),
            mid_price: q.mid_price.to_canonical_string(),
            price_impact_percent: q.price_impact_percent.to_canonical_string(),
        }
    }
}

/// `quote` is null when no meaningful quote exists for the input.
#[derive(Debug, Serialize)]
pub struct QuoteResponse {
    pub quote: Option<QuoteDto>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReceiptDto {
    pub id: String,
    pub kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount: Option<String>,
    pub requested_at_ms: i64,
    pub confirms_at_ms: i64,
    pub confirms_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub estimate: Option<QuoteDto>,
}

impl ReceiptDto {
    pub fn from_receipt(state: &AppState, receipt: &PendingReceipt) -> Self {
        let (kind, amount) = match receipt.action {
            PendingAction::Swap { amount_in, .. } => ("swap", Some(amount_in)),
            PendingAction::Lend { collateral } => ("lend", Some(collateral)),
            PendingAction::Governance => ("governance", None),
        };
        Self {
            id: receipt.id.to_string(),
            kind: kind.to_string(),
            amount: amount.map(|a| a.to_canonical_string()),
            requested_at_ms: receipt.requested_at.as_ms(),
            confirms_at_ms: receipt.confirms_at.as_ms(),
            confirms_at: state.wall_clock(receipt.confirms_at).to_rfc3339(),
            estimate: receipt.estimate.as_ref().map(QuoteDto::from),
        }
    }
}

pub async fn post_quote(
    State(state): State<AppState>,
    payload: Result<Json<SwapRequest>, JsonRejection>,
) -> Result<Json<QuoteResponse>, AppError> {
    let Json(req) = payload?;
    let from = parse_token("from", &req.from)?;
    let to = parse_token("to", &req.to)?;
    let amount_in = parse_amount("amount", &req.amount)?;

    let session = state.session.lock().await;
    let quote = session.quote_swap(from, to, amount_in);
    Ok(Json(QuoteResponse {
        quote: quote.as_ref().map(QuoteDto::from),
    }))
}

pub async fn post_swap(
    State(state): State<AppState>,
    payload: Result<Json<SwapRequest>, JsonRejection>,
) -> Result<Json<ReceiptDto>, AppError> {
    let Json(req) = payload?;
    let from = parse_token("from", &req.from)?;
    let to = parse_token("to", &req.to)?;
    let amount_in = parse_amount("amount", &req.amount)?;

    let (receipt, save) = {
        let mut session = state.session.lock().await;
        let receipt = session.request_swap(from, to, amount_in)?;
        (receipt, state.dirty_snapshot(&mut session))
    };
    state.persist(save).await;
    Ok(Json(ReceiptDto::from_receipt(&state, &receipt)))
}
