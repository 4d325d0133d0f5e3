use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use swapsim::db::load_or_default;
use swapsim::engine::{RandomSource, SeededRandom};
use swapsim::orchestration::run_clock;
use swapsim::{api, config::Config, init_db, MemorySnapshotStore, Repository, Session, SnapshotStore};

/// How often the wall clock is folded into the session's virtual clock.
const CLOCK_PERIOD_MS: u64 = 100;

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing_subscriber::filter::LevelFilter::INFO.into()),
        )
        .init();

    // Load configuration
    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };

    let port = config.port;

    // Snapshot store; an unusable database degrades to memory-only
    let store: Arc<dyn SnapshotStore> = match &config.database_path {
        Some(path) => match init_db(path).await {
            Ok(pool) => Arc::new(Repository::new(pool)),
            Err(e) => {
                tracing::warn!("Failed to open snapshot database {}, running in memory: {}", path, e);
                Arc::new(MemorySnapshotStore::new())
            }
        },
        None => Arc::new(MemorySnapshotStore::new()),
    };

    let rng: Box<dyn RandomSource> = match config.rng_seed {
        Some(seed) => Box::new(SeededRandom::from_seed(seed)),
        None => Box::new(SeededRandom::from_entropy()),
    };
    let snapshot = load_or_default(store.as_ref()).await;
    let session = Session::from_snapshot(config.sim_params(), rng, snapshot);

    let state = api::AppState::new(session, store);
    tokio::spawn(run_clock(
        state.clone(),
        Duration::from_millis(CLOCK_PERIOD_MS),
    ));

    // Create router
    let app = api::create_router(state);

    // Bind to address
    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(l) => l,
        Err(e) => {
            eprintln!("Failed to bind to {}: {}", addr, e);
            std::process::exit(1);
        }
    };

    tracing::info!("Server listening on {}", addr);

    // Run server
    if let Err(e) = axum::serve(listener, app).await {
        eprintln!("Server error: {}", e);
        std::process::exit(1);
    }
}
