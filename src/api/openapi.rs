//! OpenAPI documentation

use axum::Router;
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

use crate::api::{catalog, fines, health, loans, reservations, users};

/// Registers the bearer JWT scheme referenced by `security(("bearer_auth" = []))`
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi
            .components
            .get_or_insert_with(utoipa::openapi::Components::default);

        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Library Circulation API",
        version = "0.3.0",
        description = "Loans, reservations and fines REST API",
        license(name = "AGPL-3.0", url = "https://www.gnu.org/licenses/agpl-3.0.html")
    ),
    servers(
        (url = "/api/v1", description = "API v1")
    ),
    modifiers(&SecurityAddon),
    paths(
        // Health
        health::health_check,
        health::readiness_check,
        // Users
        users::list_users,
        users::get_user,
        users::create_user,
        users::update_user,
        users::delete_user,
        // Catalog
        catalog::list_materials,
        catalog::get_material,
        catalog::create_material,
        catalog::update_material,
        catalog::delete_material,
        catalog::get_availability,
        catalog::list_copies,
        catalog::create_copy,
        catalog::find_copy_by_code,
        catalog::get_copy,
        catalog::update_copy,
        catalog::update_copy_status,
        catalog::delete_copy,
        // Loans
        loans::create_loan_request,
        loans::list_loan_requests,
        loans::get_loan_request,
        loans::approve_loan_request,
        loans::reject_loan_request,
        loans::list_loans,
        loans::get_loan,
        loans::return_loan,
        // Reservations
        reservations::create_reservation,
        reservations::list_reservations,
        reservations::get_reservation,
        reservations::cancel_reservation,
        reservations::complete_reservation,
        reservations::claim_reservation,
        reservations::get_copy_queue,
        // Fines
        fines::list_fines,
        fines::get_fine,
        fines::pay_fine,
    ),
    components(
        schemas(
            // Enums
            crate::models::enums::CopyStatus,
            crate::models::enums::LoanRequestStatus,
            crate::models::enums::LoanStatus,
            crate::models::enums::ReservationStatus,
            crate::models::enums::PaymentStatus,
            // Users
            crate::models::user::Role,
            crate::models::user::User,
            crate::models::user::UpdateUser,
            users::CreateUserRequest,
            // Catalog
            crate::models::material::Material,
            crate::models::material::CreateMaterial,
            crate::models::material::UpdateMaterial,
            crate::models::material::MaterialAvailability,
            crate::models::material::MaterialSummary,
            crate::models::copy::CopyRecord,
            crate::models::copy::CreateCopy,
            crate::models::copy::UpdateCopy,
            crate::models::copy::UpdateCopyStatus,
            // Loans
            crate::models::loan::LoanRequest,
            crate::models::loan::Loan,
            crate::services::circulation::ReturnOutcome,
            loans::CreateLoanRequestBody,
            // Reservations
            crate::models::reservation::Reservation,
            reservations::CreateReservationBody,
            reservations::ClaimReservationBody,
            // Fines
            crate::models::fine::Fine,
            // Health
            health::HealthResponse,
            // Errors
            crate::error::ErrorResponse,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "users", description = "User directory"),
        (name = "catalog", description = "Materials and copies"),
        (name = "loans", description = "Loan requests, approvals and returns"),
        (name = "reservations", description = "Waitlists on loaned copies"),
        (name = "fines", description = "Late-return fines")
    )
)]
pub struct ApiDoc;

/// Create the OpenAPI documentation router
pub fn create_openapi_router() -> Router {
    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
}
