//! Authentication endpoints

use axum::{extract::State, http::StatusCode, Json};
use axum_extra::extract::WithRejection;
use serde::Serialize;
use utoipa::ToSchema;

use crate::{
    error::AppResult,
    models::user::{Login, PublicUser, Signup},
    AppState,
};

use super::{ok, AuthenticatedUser, JsonBody, OkResponse};

/// Login response
#[derive(Serialize, ToSchema)]
pub struct LoginResponse {
    pub ok: bool,
    /// Bearer token for subsequent requests
    pub token: String,
    pub user: PublicUser,
}

/// Register a new user; `role: admin` needs an admin bearer token once an admin exists
#[utoipa::path(
    post,
    path = "/signup",
    tag = "auth",
    request_body = Signup,
    responses(
        (status = 201, description = "User created", body = OkResponse),
        (status = 400, description = "Missing field or email already registered", body = crate::error::ErrorResponse)
    )
)]
pub async fn signup(
    State(state): State<AppState>,
    caller: Option<AuthenticatedUser>,
    WithRejection(Json(request), _): JsonBody<Signup>,
) -> AppResult<(StatusCode, Json<OkResponse>)> {
    let caller = caller.map(|AuthenticatedUser(user)| user);
    state.services.auth.signup(request, caller.as_ref()).await?;
    Ok((StatusCode::CREATED, ok()))
}

/// Authenticate with email and password
#[utoipa::path(
    post,
    path = "/login",
    tag = "auth",
    request_body = Login,
    responses(
        (status = 200, description = "Login successful", body = LoginResponse),
        (status = 401, description = "Invalid credentials", body = crate::error::ErrorResponse)
    )
)]
pub async fn login(
    State(state): State<AppState>,
    WithRejection(Json(request), _): JsonBody<Login>,
) -> AppResult<Json<LoginResponse>> {
    let (token, user) = state.services.auth.login(request).await?;
    Ok(Json(LoginResponse {
        ok: true,
        token,
        user,
    }))
}

/// Invalidate the caller's token
#[utoipa::path(
    post,
    path = "/logout",
    tag = "auth",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Logged out", body = OkResponse),
        (status = 401, description = "Not authenticated")
    )
)]
pub async fn logout(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
) -> AppResult<Json<OkResponse>> {
    state.services.auth.logout(&user).await?;
    Ok(ok())
}

/// Current user's public profile
#[utoipa::path(
    get,
    path = "/me",
    tag = "auth",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Current user", body = PublicUser),
        (status = 401, description = "Not authenticated")
    )
)]
pub async fn me(AuthenticatedUser(user): AuthenticatedUser) -> Json<PublicUser> {
    Json(PublicUser::from(&user))
}
