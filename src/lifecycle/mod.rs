//! Transaction lifecycle: pending requests, deferred confirmation and the
//! audit log.
//!
//! This module provides:
//! - A virtual-clock task queue so confirmation order is reproducible
//! - The append-only transaction log
//! - Session event fan-out for presentation layers
//! - The `Session` controller tying the engine components together

pub mod events;
pub mod log;
pub mod scheduler;
pub mod session;

pub use events::{Notifier, SessionEvent};
pub use log::TransactionLog;
pub use scheduler::Scheduler;
pub use session::{
    PendingAction, PendingReceipt, PendingSnapshot, Session, SessionSnapshot, SessionState,
    SimParams,
};
