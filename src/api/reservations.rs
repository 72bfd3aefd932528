//! Reservation (waitlist) endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use utoipa::ToSchema;

use crate::{
    error::AppResult,
    models::{
        loan::LoanRequest,
        reservation::{Reservation, ReservationQuery},
    },
};

use super::AuthenticatedUser;

/// Join the waitlist of a material
#[derive(Deserialize, ToSchema)]
pub struct CreateReservationBody {
    pub material_id: i32,
    /// Defaults to the caller
    pub user_id: Option<i32>,
}

/// Pick up a held copy
#[derive(Deserialize, ToSchema)]
pub struct ClaimReservationBody {
    /// Requested loan period in days
    pub days: i64,
    /// Holder of the reservation; defaults to the caller
    pub user_id: Option<i32>,
}

/// Reserve a copy that is out on loan
#[utoipa::path(
    post,
    path = "/reservations",
    tag = "reservations",
    security(("bearer_auth" = [])),
    request_body = CreateReservationBody,
    responses(
        (status = 201, description = "Reservation created", body = Reservation),
        (status = 404, description = "User or material not found"),
        (status = 409, description = "Already reserved by this user"),
        (status = 422, description = "Pending fine or no loaned copy")
    )
)]
pub async fn create_reservation(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Json(body): Json<CreateReservationBody>,
) -> AppResult<(StatusCode, Json<Reservation>)> {
    let user_id = claims.acting_for(body.user_id)?;

    let reservation = state
        .services
        .reservations
        .create_reservation(body.material_id, user_id)
        .await?;
    Ok((StatusCode::CREATED, Json(reservation)))
}

/// List reservations, newest first
#[utoipa::path(
    get,
    path = "/reservations",
    tag = "reservations",
    security(("bearer_auth" = [])),
    params(ReservationQuery),
    responses(
        (status = 200, description = "Reservations", body = Vec<Reservation>)
    )
)]
pub async fn list_reservations(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Query(mut query): Query<ReservationQuery>,
) -> AppResult<Json<Vec<Reservation>>> {
    query.user_id = claims.list_scope(query.user_id)?;

    let reservations = state.services.reservations.list_reservations(&query).await?;
    Ok(Json(reservations))
}

/// Get a reservation
#[utoipa::path(
    get,
    path = "/reservations/{id}",
    tag = "reservations",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Reservation ID")
    ),
    responses(
        (status = 200, description = "Reservation", body = Reservation),
        (status = 404, description = "Reservation not found")
    )
)]
pub async fn get_reservation(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<Reservation>> {
    let reservation = state.services.reservations.get_reservation(id).await?;
    claims.require_self_or_librarian(reservation.user_id)?;
    Ok(Json(reservation))
}

/// Cancel a reservation
#[utoipa::path(
    post,
    path = "/reservations/{id}/cancel",
    tag = "reservations",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Reservation ID")
    ),
    responses(
        (status = 200, description = "Reservation cancelled", body = Reservation),
        (status = 404, description = "Reservation not found"),
        (status = 409, description = "Reservation not active")
    )
)]
pub async fn cancel_reservation(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<Reservation>> {
    let reservation = state.services.reservations.get_reservation(id).await?;
    claims.require_self_or_librarian(reservation.user_id)?;

    let cancelled = state.services.reservations.cancel_reservation(id).await?;
    Ok(Json(cancelled))
}

/// Mark a reservation fulfilled
#[utoipa::path(
    post,
    path = "/reservations/{id}/complete",
    tag = "reservations",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Reservation ID")
    ),
    responses(
        (status = 200, description = "Reservation completed", body = Reservation),
        (status = 403, description = "Librarian role required"),
        (status = 404, description = "Reservation not found"),
        (status = 409, description = "Reservation not active")
    )
)]
pub async fn complete_reservation(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<Reservation>> {
    claims.require_librarian()?;

    let completed = state.services.reservations.complete_reservation(id).await?;
    Ok(Json(completed))
}

/// Turn a held reservation into a loan request
#[utoipa::path(
    post,
    path = "/reservations/{id}/claim",
    tag = "reservations",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Reservation ID")
    ),
    request_body = ClaimReservationBody,
    responses(
        (status = 201, description = "Loan request filed for the held copy", body = LoanRequest),
        (status = 403, description = "Not allowed to claim for another user"),
        (status = 404, description = "Reservation not found"),
        (status = 409, description = "Reservation not held for this user"),
        (status = 422, description = "Pending fine")
    )
)]
pub async fn claim_reservation(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
    Json(body): Json<ClaimReservationBody>,
) -> AppResult<(StatusCode, Json<LoanRequest>)> {
    let user_id = claims.acting_for(body.user_id)?;

    let request = state
        .services
        .reservations
        .claim_hold(id, user_id, body.days)
        .await?;
    Ok((StatusCode::CREATED, Json(request)))
}

/// Waitlist of a copy in service order
#[utoipa::path(
    get,
    path = "/copies/{id}/queue",
    tag = "reservations",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Copy ID")
    ),
    responses(
        (status = 200, description = "Active reservations, oldest first", body = Vec<Reservation>),
        (status = 403, description = "Librarian role required"),
        (status = 404, description = "Copy not found")
    )
)]
pub async fn get_copy_queue(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(copy_id): Path<i32>,
) -> AppResult<Json<Vec<Reservation>>> {
    claims.require_librarian()?;

    let queue = state.services.reservations.queue_for_copy(copy_id).await?;
    Ok(Json(queue))
}
