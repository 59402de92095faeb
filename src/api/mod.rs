//! HTTP surface: JSON API, static assets and shared middleware

pub mod auth;
pub mod books;
pub mod circulation;
pub mod health;
pub mod members;
pub mod openapi;
pub mod reports;
pub mod uploads;

use axum::{
    async_trait,
    extract::{DefaultBodyLimit, FromRequestParts, Request},
    http::{header, request::Parts, HeaderValue, Method, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, RequestPartsExt, Router,
};
use axum_extra::{
    extract::WithRejection,
    headers::{authorization::Bearer, Authorization},
    TypedHeader,
};
use serde::Serialize;
use tower::ServiceBuilder;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    services::{fs::ServeFileSystemResponseBody, ServeDir, ServeFile},
    trace::TraceLayer,
};
use utoipa::ToSchema;

use crate::{
    error::AppError,
    models::user::User,
    AppState,
};

/// Content type for uploads whose extension maps to nothing known
const FALLBACK_IMAGE_TYPE: &str = "image/jpeg";

/// JSON request body whose rejections render as `AppError`
pub type JsonBody<T> = WithRejection<Json<T>, AppError>;

/// Caller resolved from an `Authorization: Bearer` token
pub struct AuthenticatedUser(pub User);

impl AuthenticatedUser {
    pub fn require_admin(&self) -> Result<(), AppError> {
        if self.0.is_admin() {
            Ok(())
        } else {
            Err(AppError::Authorization("Admin role required".to_string()))
        }
    }
}

#[async_trait]
impl FromRequestParts<AppState> for AuthenticatedUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let TypedHeader(Authorization(bearer)) = parts
            .extract::<TypedHeader<Authorization<Bearer>>>()
            .await
            .map_err(|_| AppError::Authentication("Missing or malformed bearer token".to_string()))?;

        let user = state
            .services
            .auth
            .lookup_token(bearer.token())
            .await?
            .ok_or_else(|| AppError::Authentication("Invalid or expired token".to_string()))?;

        Ok(AuthenticatedUser(user))
    }
}

/// `{ok: true}` acknowledgement
#[derive(Serialize, ToSchema)]
pub struct OkResponse {
    pub ok: bool,
}

pub fn ok() -> Json<OkResponse> {
    Json(OkResponse { ok: true })
}

/// `{ok: true, id}` returned by create endpoints
#[derive(Serialize, ToSchema)]
pub struct CreatedResponse {
    pub ok: bool,
    pub id: String,
}

/// Build the full application router
pub fn router(state: AppState) -> Router {
    let config = state.config.clone();
    let public_dir = &config.storage.public_dir;

    let api = Router::new()
        .route("/health", get(health::health_check))
        .route("/ready", get(health::readiness_check))
        // Authentication
        .route("/signup", post(auth::signup))
        .route("/login", post(auth::login))
        .route("/logout", post(auth::logout))
        .route("/me", get(auth::me))
        // Catalog
        .route(
            "/books",
            get(books::list_books)
                .post(books::create_book)
                .put(books::update_book)
                .delete(books::delete_book),
        )
        .route("/uploadCover", post(uploads::upload_cover))
        // Members
        .route(
            "/members",
            get(members::list_members)
                .post(members::create_member)
                .put(members::update_member)
                .delete(members::delete_member),
        )
        // Circulation
        .route("/borrow", post(circulation::borrow))
        .route("/return", post(circulation::return_book))
        .route("/loans", get(circulation::list_loans))
        // Reports
        .route("/reports/most-borrowed", get(reports::most_borrowed))
        .route("/reports/active-members", get(reports::active_members))
        .route("/reports/overdue", get(reports::overdue))
        .with_state(state);

    let uploads = ServiceBuilder::new()
        .map_response(default_image_type::<ServeFileSystemResponseBody>)
        .service(ServeDir::new(&config.storage.uploads_dir));

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .nest("/api", api)
        .merge(openapi::create_openapi_router())
        .route_service("/", ServeFile::new(public_dir.join("index.html")))
        .nest_service("/pages", ServeDir::new(public_dir.join("pages")))
        .nest_service("/css", ServeDir::new(public_dir.join("css")))
        .nest_service("/js", ServeDir::new(public_dir.join("js")))
        .nest_service("/images", ServeDir::new(public_dir.join("images")))
        .nest_service("/uploads", uploads)
        .fallback(not_found)
        .layer(DefaultBodyLimit::max(config.server.max_body_bytes))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(middleware::from_fn(preflight))
}

/// Answer every `OPTIONS` request with an empty 204 carrying the CORS headers
async fn preflight(request: Request, next: Next) -> Response {
    if request.method() != Method::OPTIONS {
        return next.run(request).await;
    }

    let mut response = StatusCode::NO_CONTENT.into_response();
    let headers = response.headers_mut();
    let any = HeaderValue::from_static("*");
    headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, any.clone());
    headers.insert(header::ACCESS_CONTROL_ALLOW_METHODS, any.clone());
    headers.insert(header::ACCESS_CONTROL_ALLOW_HEADERS, any);
    response
}

/// Serve unknown upload extensions as an image instead of an octet stream
fn default_image_type<B>(mut response: Response<B>) -> Response<B> {
    let untyped = response
        .headers()
        .get(header::CONTENT_TYPE)
        .map_or(true, |value| value == "application/octet-stream");
    if response.status().is_success() && untyped {
        response
            .headers_mut()
            .insert(header::CONTENT_TYPE, HeaderValue::from_static(FALLBACK_IMAGE_TYPE));
    }
    response
}

#[derive(Serialize)]
struct NotFoundBody {
    ok: bool,
    msg: &'static str,
}

async fn not_found() -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(NotFoundBody {
            ok: false,
            msg: "Not found",
        }),
    )
        .into_response()
}
