//! API handlers for the library REST endpoints

pub mod catalog;
pub mod fines;
pub mod health;
pub mod loans;
pub mod openapi;
pub mod reservations;
pub mod users;

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
    routing::{get, post, put},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::{error::AppError, models::user::UserClaims, AppState};

/// Extractor for authenticated user from JWT token
pub struct AuthenticatedUser(pub UserClaims);

#[async_trait]
impl FromRequestParts<AppState> for AuthenticatedUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| AppError::Authentication("Missing authorization header".to_string()))?;

        let token = auth_header
            .strip_prefix("Bearer ")
            .ok_or_else(|| AppError::Authentication("Invalid authorization header format".to_string()))?;

        let claims = UserClaims::from_token(token, &state.config.auth.jwt_secret)
            .map_err(|e| AppError::Authentication(e.to_string()))?;

        Ok(AuthenticatedUser(claims))
    }
}

/// Create the application router with all routes
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api_v1 = Router::new()
        // Health check
        .route("/health", get(health::health_check))
        .route("/ready", get(health::readiness_check))
        // Users
        .route("/users", get(users::list_users).post(users::create_user))
        .route(
            "/users/:id",
            get(users::get_user)
                .put(users::update_user)
                .delete(users::delete_user),
        )
        // Catalog
        .route("/materials", get(catalog::list_materials).post(catalog::create_material))
        .route(
            "/materials/:id",
            get(catalog::get_material)
                .put(catalog::update_material)
                .delete(catalog::delete_material),
        )
        .route("/materials/:id/availability", get(catalog::get_availability))
        .route(
            "/materials/:id/copies",
            get(catalog::list_copies).post(catalog::create_copy),
        )
        .route("/copies", get(catalog::find_copy_by_code))
        .route(
            "/copies/:id",
            get(catalog::get_copy)
                .put(catalog::update_copy)
                .delete(catalog::delete_copy),
        )
        .route("/copies/:id/status", put(catalog::update_copy_status))
        .route("/copies/:id/queue", get(reservations::get_copy_queue))
        // Loan requests
        .route(
            "/loan-requests",
            get(loans::list_loan_requests).post(loans::create_loan_request),
        )
        .route("/loan-requests/:id", get(loans::get_loan_request))
        .route("/loan-requests/:id/approve", post(loans::approve_loan_request))
        .route("/loan-requests/:id/reject", post(loans::reject_loan_request))
        // Loans
        .route("/loans", get(loans::list_loans))
        .route("/loans/:id", get(loans::get_loan))
        .route("/loans/:id/return", post(loans::return_loan))
        // Reservations
        .route(
            "/reservations",
            get(reservations::list_reservations).post(reservations::create_reservation),
        )
        .route("/reservations/:id", get(reservations::get_reservation))
        .route("/reservations/:id/cancel", post(reservations::cancel_reservation))
        .route("/reservations/:id/complete", post(reservations::complete_reservation))
        .route("/reservations/:id/claim", post(reservations::claim_reservation))
        // Fines
        .route("/fines", get(fines::list_fines))
        .route("/fines/:id", get(fines::get_fine))
        .route("/fines/:id/pay", post(fines::pay_fine))
        .with_state(state);

    Router::new()
        .nest("/api/v1", api_v1)
        .merge(openapi::create_openapi_router())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}
