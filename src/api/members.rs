//! Membership endpoints

use axum::{extract::State, http::StatusCode, Json};
use axum_extra::extract::WithRejection;
use serde::Serialize;
use utoipa::ToSchema;

use crate::{
    error::AppResult,
    models::member::{CreateMember, Member, UpdateMember},
    AppState,
};

use super::{ok, AuthenticatedUser, CreatedResponse, JsonBody, OkResponse};

#[derive(Serialize, ToSchema)]
pub struct MemberResponse {
    pub ok: bool,
    pub member: Member,
}

/// List all members
#[utoipa::path(
    get,
    path = "/members",
    tag = "members",
    responses(
        (status = 200, description = "All members", body = Vec<Member>)
    )
)]
pub async fn list_members(State(state): State<AppState>) -> AppResult<Json<Vec<Member>>> {
    let members = state.services.members.list_members().await?;
    Ok(Json(members))
}

/// Register a member
#[utoipa::path(
    post,
    path = "/members",
    tag = "members",
    security(("bearer_auth" = [])),
    request_body = CreateMember,
    responses(
        (status = 201, description = "Member created", body = CreatedResponse),
        (status = 400, description = "Missing field or email already registered", body = crate::error::ErrorResponse)
    )
)]
pub async fn create_member(
    State(state): State<AppState>,
    AuthenticatedUser(_user): AuthenticatedUser,
    WithRejection(Json(request), _): JsonBody<CreateMember>,
) -> AppResult<(StatusCode, Json<CreatedResponse>)> {
    let member = state.services.members.create_member(request).await?;
    Ok((
        StatusCode::CREATED,
        Json(CreatedResponse {
            ok: true,
            id: member.id.to_string(),
        }),
    ))
}

/// Merge the supplied fields into a member
#[utoipa::path(
    put,
    path = "/members",
    tag = "members",
    security(("bearer_auth" = [])),
    request_body = UpdateMember,
    responses(
        (status = 200, description = "Member updated", body = MemberResponse),
        (status = 404, description = "Member not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn update_member(
    State(state): State<AppState>,
    AuthenticatedUser(_user): AuthenticatedUser,
    WithRejection(Json(request), _): JsonBody<UpdateMember>,
) -> AppResult<Json<MemberResponse>> {
    let member = state.services.members.update_member(request).await?;
    Ok(Json(MemberResponse { ok: true, member }))
}

/// Delete a member; the raw request body is its id
#[utoipa::path(
    delete,
    path = "/members",
    tag = "members",
    security(("bearer_auth" = [])),
    request_body(content = String, content_type = "text/plain", description = "Member id"),
    responses(
        (status = 200, description = "Member deleted", body = OkResponse),
        (status = 403, description = "Admin role required"),
        (status = 404, description = "Member not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn delete_member(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    id: String,
) -> AppResult<Json<OkResponse>> {
    user.require_admin()?;

    state.services.members.delete_member(&id).await?;
    Ok(ok())
}
