//! Business logic services

pub mod auth;
pub mod catalog;
pub mod circulation;
pub mod clock;
pub mod members;
pub mod reports;
pub mod uploads;

use std::sync::Arc;

use crate::{
    config::AppConfig,
    error::{AppError, AppResult},
    repository::Repository,
};

use self::clock::Clock;

/// Container for all services
#[derive(Clone)]
pub struct Services {
    pub auth: auth::AuthService,
    pub catalog: catalog::CatalogService,
    pub members: members::MembersService,
    pub circulation: circulation::CirculationService,
    pub reports: reports::ReportsService,
    pub uploads: uploads::UploadsService,
}

impl Services {
    /// Create all services over the given repository and time source
    pub fn new(repository: Repository, config: &AppConfig, clock: Arc<dyn Clock>) -> Self {
        let uploads = uploads::UploadsService::new(&config.storage);

        Self {
            auth: auth::AuthService::new(repository.clone(), config.auth.clone(), clock.clone()),
            catalog: catalog::CatalogService::new(repository.clone(), uploads.clone(), clock.clone()),
            members: members::MembersService::new(repository.clone(), clock.clone()),
            circulation: circulation::CirculationService::new(
                repository.clone(),
                &config.circulation,
                clock.clone(),
            ),
            reports: reports::ReportsService::new(repository, &config.circulation, clock),
            uploads,
        }
    }
}

/// Trimmed value of a mandatory text field
pub(crate) fn required<'a>(value: Option<&'a str>, field: &'static str) -> AppResult<&'a str> {
    non_blank(value).ok_or(AppError::MissingField(field))
}

/// Trimmed value of an optional text field, `None` when blank
pub(crate) fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}
