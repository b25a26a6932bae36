//! HTTP control surface for the job discovery pipeline.
//!
//! Thin axum layer over [`discovery::Orchestrator`]: start a search,
//! poll progress, pause/stop/resume. See [`app::build_app`] for the
//! route table.

pub mod app;
pub mod config;
pub mod routes;

pub use app::{build_app, AppState};
pub use config::Config;
