use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::api::AppState;
use crate::domain::TransactionRecord;
use crate::error::AppError;

#[derive(Debug, Deserialize)]
pub struct TransactionsQuery {
    /// Most recent N records; everything retained when absent.
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionDto {
    pub seq: u64,
    pub id: String,
    pub kind: String,
    pub phase: String,
    pub timestamp_ms: i64,
    pub time: String,
    pub message: String,
}

impl TransactionDto {
    fn from_record(state: &AppState, record: &TransactionRecord) -> Self {
        Self {
            seq: record.seq,
            id: record.id.to_string(),
            kind: enum_label(&record.kind),
            phase: enum_label(&record.phase),
            timestamp_ms: record.timestamp.as_ms(),
            time: state.wall_clock(record.timestamp).to_rfc3339(),
            message: record.message.clone(),
        }
    }
}

fn enum_label<T: Serialize>(value: &T) -> String {
    serde_json::to_value(value)
        .ok()
        .and_then(|v| v.as_str().map(str::to_string))
        .unwrap_or_default()
}

/// Newest first.
pub async fn get_transactions(
    State(state): State<AppState>,
    query: Result<Query<TransactionsQuery>, QueryRejection>,
) -> Result<Json<Vec<TransactionDto>>, AppError> {
    let Query(query) = query?;
    let session = state.session.lock().await;
    let limit = query.limit.unwrap_or(usize::MAX);
    let records = session
        .transactions()
        .records()
        .rev()
        .take(limit)
        .map(|r| TransactionDto::from_record(&state, r))
        .collect();
    Ok(Json(records))
}
