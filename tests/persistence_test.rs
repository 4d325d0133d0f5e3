use axum::http::StatusCode;
use std::str::FromStr;
use std::sync::Arc;
use swapsim::api::{self, AppState};
use swapsim::db::{init_db, load_or_default, save_best_effort, MemorySnapshotStore, Repository};
use swapsim::domain::{Decimal, Token, TxPhase};
use swapsim::engine::SeededRandom;
use swapsim::lifecycle::{Session, SimParams};
use tempfile::TempDir;
use tower::util::ServiceExt;

fn db_path(temp: &TempDir) -> String {
    temp.path()
        .join("swapsim.db")
        .to_string_lossy()
        .to_string()
}

#[tokio::test]
async fn session_survives_restart() {
    let temp = TempDir::new().unwrap();
    let path = db_path(&temp);

    let saved = {
        let repo = Repository::new(init_db(&path).await.expect("init_db failed"));
        let mut session = Session::new(SimParams::default(), Box::new(SeededRandom::from_seed(8)));
        session
            .request_swap(Token::Ifx, Token::World, Decimal::from_str("1000").unwrap())
            .unwrap();
        session.settle_pending();
        session.advance_by(10_000);
        let snapshot = session.snapshot();
        assert!(save_best_effort(&repo, &snapshot).await);
        snapshot
    };

    let repo = Repository::new(init_db(&path).await.expect("reopen failed"));
    let loaded = load_or_default(&repo).await;
    assert_eq!(loaded.as_ref(), Some(&saved));

    let session = Session::from_snapshot(
        SimParams::default(),
        Box::new(SeededRandom::from_seed(9)),
        loaded,
    );
    assert_eq!(session.snapshot(), saved);
    assert_eq!(
        session.ledger().balance(Token::World),
        Decimal::from_str("5447.757172198635919975").unwrap()
    );
    assert_eq!(session.reputation().score(), Decimal::from_str("121.2").unwrap());
}

#[tokio::test]
async fn pending_confirmations_survive_restart() {
    let temp = TempDir::new().unwrap();
    let path = db_path(&temp);

    let (receipt, saved) = {
        let repo = Repository::new(init_db(&path).await.unwrap());
        let mut session = Session::new(SimParams::default(), Box::new(SeededRandom::from_seed(21)));
        let receipt = session
            .request_lend(Decimal::from_str("250").unwrap())
            .unwrap();
        let snapshot = session.snapshot();
        assert!(save_best_effort(&repo, &snapshot).await);
        (receipt, snapshot)
    };
    assert_eq!(saved.pending.len(), 1);

    let repo = Repository::new(init_db(&path).await.unwrap());
    let mut session = Session::from_snapshot(
        SimParams::default(),
        Box::new(SeededRandom::from_seed(22)),
        load_or_default(&repo).await,
    );
    assert_eq!(session.pending_count(), 1);
    session.settle_pending();

    assert_eq!(session.pending_count(), 0);
    assert_eq!(session.ledger().balance(Token::Ifx), Decimal::from_i64(9750));
    let phases: Vec<_> = session
        .transactions()
        .for_id(receipt.id)
        .iter()
        .map(|r| r.phase)
        .collect();
    assert_eq!(
        phases,
        vec![TxPhase::Pending, TxPhase::Confirmed, TxPhase::Notice]
    );
}

#[tokio::test]
async fn governance_request_is_persisted() {
    let session = Session::new(SimParams::default(), Box::new(SeededRandom::from_seed(23)));
    let store = Arc::new(MemorySnapshotStore::new());
    let state = AppState::new(session, store.clone());
    let app = api::create_router(state.clone());

    let req = axum::http::Request::builder()
        .method("POST")
        .uri("/v1/reputation/governance")
        .body(axum::body::Body::empty())
        .unwrap();
    let resp = app.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let saved = store.current().expect("governance request should be persisted");
    assert_eq!(saved.pending.len(), 1);
}

#[tokio::test]
async fn fresh_database_starts_from_defaults() {
    let temp = TempDir::new().unwrap();
    let repo = Repository::new(init_db(&db_path(&temp)).await.unwrap());
    let loaded = load_or_default(&repo).await;
    assert!(loaded.is_none());

    let session = Session::from_snapshot(
        SimParams::default(),
        Box::new(SeededRandom::from_seed(1)),
        loaded,
    );
    assert_eq!(session.ledger().balance(Token::Usd), Decimal::from_i64(20000));
}

#[tokio::test]
async fn failing_store_does_not_break_requests() {
    let session = Session::new(SimParams::default(), Box::new(SeededRandom::from_seed(2)));
    let state = AppState::new(session, Arc::new(MemorySnapshotStore::failing()));
    let app = api::create_router(state.clone());

    let req = axum::http::Request::builder()
        .method("POST")
        .uri("/v1/wallet/reset")
        .body(axum::body::Body::empty())
        .unwrap();
    let resp = app.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let session = state.session.lock().await;
    assert_eq!(session.ledger().balance(Token::Ifx), Decimal::from_i64(10000));
}
