pub mod api;
pub mod config;
pub mod db;
pub mod domain;
pub mod engine;
pub mod error;
pub mod lifecycle;
pub mod orchestration;

pub use config::Config;
pub use db::{init_db, MemorySnapshotStore, Repository, SnapshotStore};
pub use domain::{Address, Decimal, TimeMs, Token, TransactionRecord, TxId, TxKind, TxPhase};
pub use engine::{SeededRandom, SimError, SwapQuote};
pub use error::AppError;
pub use lifecycle::{Session, SessionEvent, SessionSnapshot, SimParams};
