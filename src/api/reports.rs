//! Reporting endpoints

use axum::{
    extract::{Query, State},
    Json,
};
use serde::Deserialize;
use utoipa::IntoParams;

use crate::{
    error::AppResult,
    models::{
        book::Book,
        report::{ActiveMember, OverdueLoan},
    },
    services::reports::DEFAULT_REPORT_LIMIT,
    AppState,
};

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ReportQuery {
    /// Maximum number of entries (default 10)
    pub limit: Option<i64>,
}

impl ReportQuery {
    fn limit(&self) -> i64 {
        self.limit.unwrap_or(DEFAULT_REPORT_LIMIT)
    }
}

/// Books with the highest lifetime borrow count
#[utoipa::path(
    get,
    path = "/reports/most-borrowed",
    tag = "reports",
    params(ReportQuery),
    responses(
        (status = 200, description = "Top books by borrow count", body = Vec<Book>)
    )
)]
pub async fn most_borrowed(
    State(state): State<AppState>,
    Query(query): Query<ReportQuery>,
) -> AppResult<Json<Vec<Book>>> {
    let books = state.services.reports.most_borrowed(query.limit()).await?;
    Ok(Json(books))
}

/// Members with the most recorded loans
#[utoipa::path(
    get,
    path = "/reports/active-members",
    tag = "reports",
    params(ReportQuery),
    responses(
        (status = 200, description = "Top members by loan count", body = Vec<ActiveMember>)
    )
)]
pub async fn active_members(
    State(state): State<AppState>,
    Query(query): Query<ReportQuery>,
) -> AppResult<Json<Vec<ActiveMember>>> {
    let members = state.services.reports.active_members(query.limit()).await?;
    Ok(Json(members))
}

/// Open loans past their due date
#[utoipa::path(
    get,
    path = "/reports/overdue",
    tag = "reports",
    responses(
        (status = 200, description = "Overdue loans with the fine due now", body = Vec<OverdueLoan>)
    )
)]
pub async fn overdue(State(state): State<AppState>) -> AppResult<Json<Vec<OverdueLoan>>> {
    let loans = state.services.reports.overdue().await?;
    Ok(Json(loans))
}
