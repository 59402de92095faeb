//! Catalog endpoints

use axum::{extract::State, http::StatusCode, Json};
use axum_extra::extract::WithRejection;
use serde::Serialize;
use utoipa::ToSchema;

use crate::{
    error::AppResult,
    models::book::{Book, CreateBook, UpdateBook},
    AppState,
};

use super::{ok, AuthenticatedUser, CreatedResponse, JsonBody, OkResponse};

/// Updated book wrapped in an acknowledgement
#[derive(Serialize, ToSchema)]
pub struct BookResponse {
    pub ok: bool,
    pub book: Book,
}

/// List all books, newest first
#[utoipa::path(
    get,
    path = "/books",
    tag = "books",
    responses(
        (status = 200, description = "All books", body = Vec<Book>)
    )
)]
pub async fn list_books(State(state): State<AppState>) -> AppResult<Json<Vec<Book>>> {
    let books = state.services.catalog.list_books().await?;
    Ok(Json(books))
}

/// Add a book to the catalog
#[utoipa::path(
    post,
    path = "/books",
    tag = "books",
    security(("bearer_auth" = [])),
    request_body = CreateBook,
    responses(
        (status = 201, description = "Book created", body = CreatedResponse),
        (status = 400, description = "Missing title or author", body = crate::error::ErrorResponse),
        (status = 401, description = "Not authenticated")
    )
)]
pub async fn create_book(
    State(state): State<AppState>,
    AuthenticatedUser(_user): AuthenticatedUser,
    WithRejection(Json(request), _): JsonBody<CreateBook>,
) -> AppResult<(StatusCode, Json<CreatedResponse>)> {
    let book = state.services.catalog.create_book(request).await?;
    Ok((
        StatusCode::CREATED,
        Json(CreatedResponse {
            ok: true,
            id: book.id.to_string(),
        }),
    ))
}

/// Merge the supplied fields into a book
#[utoipa::path(
    put,
    path = "/books",
    tag = "books",
    security(("bearer_auth" = [])),
    request_body = UpdateBook,
    responses(
        (status = 200, description = "Book updated", body = BookResponse),
        (status = 400, description = "Missing id or invalid field", body = crate::error::ErrorResponse),
        (status = 404, description = "Book not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn update_book(
    State(state): State<AppState>,
    AuthenticatedUser(_user): AuthenticatedUser,
    WithRejection(Json(request), _): JsonBody<UpdateBook>,
) -> AppResult<Json<BookResponse>> {
    let book = state.services.catalog.update_book(request).await?;
    Ok(Json(BookResponse { ok: true, book }))
}

/// Delete a book; the raw request body is its id
#[utoipa::path(
    delete,
    path = "/books",
    tag = "books",
    security(("bearer_auth" = [])),
    request_body(content = String, content_type = "text/plain", description = "Book id"),
    responses(
        (status = 200, description = "Book deleted", body = OkResponse),
        (status = 400, description = "Book is on loan", body = crate::error::ErrorResponse),
        (status = 403, description = "Admin role required"),
        (status = 404, description = "Book not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn delete_book(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    id: String,
) -> AppResult<Json<OkResponse>> {
    user.require_admin()?;

    state.services.catalog.delete_book(&id).await?;
    Ok(ok())
}
