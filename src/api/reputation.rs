use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::api::swap::ReceiptDto;
use crate::api::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReputationResponse {
    pub score: String,
    pub min: String,
    pub max: String,
}

pub async fn get_reputation(State(state): State<AppState>) -> Json<ReputationResponse> {
    let session = state.session.lock().await;
    let tracker = session.reputation();
    Json(ReputationResponse {
        score: tracker.score().to_canonical_string(),
        min: tracker.params().min_score.to_canonical_string(),
        max: tracker.params().max_score.to_canonical_string(),
    })
}

pub async fn post_governance(State(state): State<AppState>) -> Json<ReceiptDto> {
    let (receipt, save) = {
        let mut session = state.session.lock().await;
        let receipt = session.request_governance();
        (receipt, state.dirty_snapshot(&mut session))
    };
    state.persist(save).await;
    Json(ReceiptDto::from_receipt(&state, &receipt))
}
