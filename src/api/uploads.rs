//! Cover upload endpoint

use axum::{extract::State, Json};
use axum_extra::extract::WithRejection;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::{error::AppResult, AppState};

use super::{AuthenticatedUser, JsonBody};

/// Base64 encoded cover image
#[derive(Debug, Deserialize, ToSchema)]
pub struct UploadCoverRequest {
    /// Original file name; only its extension is kept
    pub filename: Option<String>,
    /// Image bytes, optionally prefixed with `data:image/...;base64,`
    pub base64: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub struct UploadCoverResponse {
    pub ok: bool,
    /// Public path of the stored file
    pub path: String,
}

/// Store a cover image and return its public path
#[utoipa::path(
    post,
    path = "/uploadCover",
    tag = "books",
    security(("bearer_auth" = [])),
    request_body = UploadCoverRequest,
    responses(
        (status = 200, description = "Cover stored", body = UploadCoverResponse),
        (status = 400, description = "Missing or undecodable payload", body = crate::error::ErrorResponse),
        (status = 500, description = "Write failure", body = crate::error::ErrorResponse)
    )
)]
pub async fn upload_cover(
    State(state): State<AppState>,
    AuthenticatedUser(_user): AuthenticatedUser,
    WithRejection(Json(request), _): JsonBody<UploadCoverRequest>,
) -> AppResult<Json<UploadCoverResponse>> {
    let path = state
        .services
        .uploads
        .save_cover(request.filename.as_deref(), request.base64.as_deref())
        .await?;

    Ok(Json(UploadCoverResponse { ok: true, path }))
}
