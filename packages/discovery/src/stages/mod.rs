//! The three pipeline stages: collect, filter, enrich.
//!
//! Stage loops lock the session only for short critical sections at
//! per-item checkpoints; network calls run with the lock released.
//! Control commands flip the session status, and the loops honor the
//! flag at the next checkpoint.

pub mod collect;
pub mod enrich;
pub mod filter;

pub use collect::run_collection;
pub use enrich::run_enrichment;
pub use filter::{
    apply_filters, run_filtering, SKIP_COMPANY_BLACKLISTED, SKIP_COUNTRY_NOT_WHITELISTED,
    SKIP_DESCRIPTION_BLACKLISTED, SKIP_TITLE_BLACKLISTED,
};

use tokio::sync::Mutex;

use crate::types::session::{Session, SessionStatus};

/// Why a stage loop returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageExit {
    /// All items processed; the pipeline advances.
    Completed,
    /// A pause or stop command was honored at a checkpoint.
    Interrupted,
    /// Stage-fatal condition; the session moves to `error`.
    Failed,
}

/// Cooperative cancellation checkpoint.
pub(crate) async fn is_running(session: &Mutex<Session>) -> bool {
    session.lock().await.status == SessionStatus::Running
}
