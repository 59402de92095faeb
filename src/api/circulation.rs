//! Borrow / return endpoints and the loan ledger

use axum::{
    extract::{Query, State},
    Json,
};
use axum_extra::extract::WithRejection;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::{
    error::AppResult,
    models::{
        ids::{BookId, MemberId},
        loan::LoanRecord,
    },
    AppState,
};

use super::{AuthenticatedUser, JsonBody};

/// Borrow request
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BorrowRequest {
    pub book_id: Option<String>,
    pub member_id: Option<String>,
    /// Loan length in days; defaults when absent or not a positive integer
    #[schema(value_type = Option<i64>)]
    pub days: Option<serde_json::Value>,
}

/// Return request
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReturnRequest {
    pub book_id: Option<String>,
    pub member_id: Option<String>,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BorrowResponse {
    pub ok: bool,
    pub due_date: DateTime<Utc>,
}

#[derive(Serialize, ToSchema)]
pub struct ReturnResponse {
    pub ok: bool,
    #[serde(with = "rust_decimal::serde::float")]
    #[schema(value_type = f64)]
    pub fine: Decimal,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct LoansQuery {
    /// `true` for open loans only, `false` for closed ones only
    pub open: Option<bool>,
}

/// Lend a book to a member
#[utoipa::path(
    post,
    path = "/borrow",
    tag = "circulation",
    security(("bearer_auth" = [])),
    request_body = BorrowRequest,
    responses(
        (status = 200, description = "Book lent", body = BorrowResponse),
        (status = 400, description = "Missing field or book already borrowed", body = crate::error::ErrorResponse),
        (status = 404, description = "Book or member not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn borrow(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    WithRejection(Json(request), _): JsonBody<BorrowRequest>,
) -> AppResult<Json<BorrowResponse>> {
    let book_id = BookId::parse_field(request.book_id.as_deref(), "bookId")?;
    let member_id = MemberId::parse_field(request.member_id.as_deref(), "memberId")?;
    let days = state.services.circulation.loan_days(request.days.as_ref());

    let due_date = state
        .services
        .circulation
        .borrow(book_id, member_id, days)
        .await?;

    tracing::debug!("Borrow recorded by user {}", user.id);

    Ok(Json(BorrowResponse { ok: true, due_date }))
}

/// Take a book back and report the late fine
#[utoipa::path(
    post,
    path = "/return",
    tag = "circulation",
    security(("bearer_auth" = [])),
    request_body = ReturnRequest,
    responses(
        (status = 200, description = "Book returned", body = ReturnResponse),
        (status = 400, description = "Book is not currently borrowed", body = crate::error::ErrorResponse),
        (status = 404, description = "Book not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn return_book(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    WithRejection(Json(request), _): JsonBody<ReturnRequest>,
) -> AppResult<Json<ReturnResponse>> {
    let book_id = BookId::parse_field(request.book_id.as_deref(), "bookId")?;
    let member_id = MemberId::parse_field(request.member_id.as_deref(), "memberId")?;

    let fine = state
        .services
        .circulation
        .return_book(book_id, member_id)
        .await?;

    tracing::debug!("Return recorded by user {}", user.id);

    Ok(Json(ReturnResponse { ok: true, fine }))
}

/// Loan ledger, newest first
#[utoipa::path(
    get,
    path = "/loans",
    tag = "circulation",
    params(LoansQuery),
    responses(
        (status = 200, description = "Ledger rows", body = Vec<LoanRecord>)
    )
)]
pub async fn list_loans(
    State(state): State<AppState>,
    Query(query): Query<LoansQuery>,
) -> AppResult<Json<Vec<LoanRecord>>> {
    let loans = state.services.circulation.list_loans(query.open).await?;
    Ok(Json(loans))
}
