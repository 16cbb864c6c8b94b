//! HTTP front door for the image analysis workflow.
//!
//! Exposes uploads as workflow triggers and serves instance status and
//! stored reports over a small axum API.

pub mod app;
pub mod config;
pub mod error;

pub use app::{router, AppState};
pub use config::ServerConfig;
pub use error::{ApiError, ErrorResponse};
