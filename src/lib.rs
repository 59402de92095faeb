//! Libris library management server
//!
//! A REST JSON API for a small library: the book catalog, member records,
//! borrowing and returns with late fines, and a couple of reports.

use std::sync::Arc;

pub mod api;
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
    pub repository: repository::Repository,
}

impl AppState {
    /// Wire services over `repository` using `clock` as the time source
    pub fn new(
        config: AppConfig,
        repository: repository::Repository,
        clock: Arc<dyn services::clock::Clock>,
    ) -> Self {
        let services = services::Services::new(repository.clone(), &config, clock);
        Self {
            config: Arc::new(config),
            services: Arc::new(services),
            repository,
        }
    }
}
