//! OpenAPI documentation

use axum::Router;
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

use crate::api::{auth, books, circulation, health, members, reports, uploads};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Libris API",
        version = "0.1.0",
        description = "Library catalog, membership and circulation REST API"
    ),
    servers(
        (url = "/api", description = "JSON API")
    ),
    paths(
        // Health
        health::health_check,
        health::readiness_check,
        // Auth
        auth::signup,
        auth::login,
        auth::logout,
        auth::me,
        // Books
        books::list_books,
        books::create_book,
        books::update_book,
        books::delete_book,
        uploads::upload_cover,
        // Members
        members::list_members,
        members::create_member,
        members::update_member,
        members::delete_member,
        // Circulation
        circulation::borrow,
        circulation::return_book,
        circulation::list_loans,
        // Reports
        reports::most_borrowed,
        reports::active_members,
        reports::overdue,
    ),
    components(
        schemas(
            // Auth
            crate::models::user::Role,
            crate::models::user::PublicUser,
            crate::models::user::Signup,
            crate::models::user::Login,
            auth::LoginResponse,
            // Books
            crate::models::book::Book,
            crate::models::book::BookStatus,
            crate::models::book::CreateBook,
            crate::models::book::UpdateBook,
            books::BookResponse,
            uploads::UploadCoverRequest,
            uploads::UploadCoverResponse,
            // Members
            crate::models::member::Member,
            crate::models::member::BorrowedBook,
            crate::models::member::CreateMember,
            crate::models::member::UpdateMember,
            members::MemberResponse,
            // Circulation
            crate::models::loan::LoanRecord,
            circulation::BorrowRequest,
            circulation::BorrowResponse,
            circulation::ReturnRequest,
            circulation::ReturnResponse,
            // Reports
            crate::models::report::ActiveMember,
            crate::models::report::OverdueLoan,
            // Common
            super::OkResponse,
            super::CreatedResponse,
            health::HealthResponse,
            crate::error::ErrorResponse,
            crate::error::ErrorCode,
        )
    ),
    modifiers(&BearerAuth),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "auth", description = "Signup, login and sessions"),
        (name = "books", description = "Catalog management"),
        (name = "members", description = "Membership management"),
        (name = "circulation", description = "Borrowing, returns and the loan ledger"),
        (name = "reports", description = "Reporting aggregates")
    )
)]
pub struct ApiDoc;

struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(HttpBuilder::new().scheme(HttpAuthScheme::Bearer).build()),
            );
        }
    }
}

/// Create the OpenAPI documentation router
pub fn create_openapi_router() -> Router {
    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
}
