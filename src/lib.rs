//! Library circulation server
//!
//! Loans, reservations and fines for a library catalog, exposed as a REST
//! JSON API. All circulation rules live in [`services`]; [`api`] is a thin
//! HTTP layer over them.

use std::sync::Arc;

pub mod api;
pub mod clock;
pub mod config;
pub mod error;
pub mod models;
pub mod repository;
pub mod services;

pub use config::AppConfig;
pub use error::{AppError, AppResult};

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub services: Arc<services::Services>,
}
