//! HTTP middleware toolkit for axum services.
//!
//! Most of the crate is thin wiring around axum, tower-http and reqwest.
//! The access logger in [`middleware::access_log`] is the piece with real
//! policy in it.

pub mod app;
pub mod config;
pub mod error;
pub mod metrics;
pub mod middleware;
pub mod proxy;
pub mod static_files;
pub mod validation;

pub use app::AppBuilder;
pub use error::{ApiError, ErrCode, ErrorNote};
