//! HTTP API server for DSS, a key-addressed file store.
//!
//! This crate provides:
//! - Multipart upload, retrieval by key, and tag/sort listing
//! - The bearer token gate and the heartbeat probe
//! - Prometheus metrics
//! - Startup token bootstrap and the offline reconciliation job

pub mod auth;
pub mod bootstrap;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod reconcile;
pub mod routes;
pub mod state;

pub use error::{ApiError, ApiResult};
pub use reconcile::{ReconcileOptions, ReconcileReport, run_reconcile};
pub use routes::create_router;
pub use state::AppState;
