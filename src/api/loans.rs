//! Loan request and loan endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use utoipa::ToSchema;

use crate::{
    error::AppResult,
    models::loan::{Loan, LoanQuery, LoanRequest, LoanRequestQuery},
    services::circulation::ReturnOutcome,
};

use super::AuthenticatedUser;

/// Borrow request
#[derive(Deserialize, ToSchema)]
pub struct CreateLoanRequestBody {
    /// Material to borrow; any available copy is set aside
    pub material_id: i32,
    /// Borrower, defaults to the caller (librarians may file for anyone)
    pub user_id: Option<i32>,
    /// Requested loan period in days
    pub days: i64,
}

/// Request a loan
#[utoipa::path(
    post,
    path = "/loan-requests",
    tag = "loans",
    security(("bearer_auth" = [])),
    request_body = CreateLoanRequestBody,
    responses(
        (status = 201, description = "Request filed, copy set aside", body = LoanRequest),
        (status = 400, description = "Invalid loan period"),
        (status = 404, description = "User or material not found"),
        (status = 422, description = "Pending fine or no available copy")
    )
)]
pub async fn create_loan_request(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Json(body): Json<CreateLoanRequestBody>,
) -> AppResult<(StatusCode, Json<LoanRequest>)> {
    let user_id = claims.acting_for(body.user_id)?;

    let request = state
        .services
        .circulation
        .request_loan(body.material_id, user_id, body.days)
        .await?;
    Ok((StatusCode::CREATED, Json(request)))
}

/// List loan requests, newest first
#[utoipa::path(
    get,
    path = "/loan-requests",
    tag = "loans",
    security(("bearer_auth" = [])),
    params(LoanRequestQuery),
    responses(
        (status = 200, description = "Loan requests", body = Vec<LoanRequest>),
        (status = 403, description = "Not allowed to see another user's requests")
    )
)]
pub async fn list_loan_requests(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Query(mut query): Query<LoanRequestQuery>,
) -> AppResult<Json<Vec<LoanRequest>>> {
    query.user_id = claims.list_scope(query.user_id)?;

    let requests = state.services.circulation.list_requests(&query).await?;
    Ok(Json(requests))
}

/// Get a loan request
#[utoipa::path(
    get,
    path = "/loan-requests/{id}",
    tag = "loans",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Loan request ID")
    ),
    responses(
        (status = 200, description = "Loan request", body = LoanRequest),
        (status = 404, description = "Loan request not found")
    )
)]
pub async fn get_loan_request(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<LoanRequest>> {
    let request = state.services.circulation.get_request(id).await?;
    match request.user_id {
        Some(user_id) => claims.require_self_or_librarian(user_id)?,
        None => claims.require_librarian()?,
    }
    Ok(Json(request))
}

/// Approve a pending loan request
#[utoipa::path(
    post,
    path = "/loan-requests/{id}/approve",
    tag = "loans",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Loan request ID")
    ),
    responses(
        (status = 201, description = "Loan created", body = Loan),
        (status = 403, description = "Librarian role required"),
        (status = 404, description = "Loan request not found"),
        (status = 409, description = "Request not pending or copy not reserved")
    )
)]
pub async fn approve_loan_request(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<(StatusCode, Json<Loan>)> {
    claims.require_librarian()?;

    let loan = state.services.circulation.approve_loan(id).await?;
    Ok((StatusCode::CREATED, Json(loan)))
}

/// Reject a pending loan request
#[utoipa::path(
    post,
    path = "/loan-requests/{id}/reject",
    tag = "loans",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Loan request ID")
    ),
    responses(
        (status = 200, description = "Request rejected, copy released", body = LoanRequest),
        (status = 403, description = "Librarian role required"),
        (status = 404, description = "Loan request not found"),
        (status = 409, description = "Request not pending")
    )
)]
pub async fn reject_loan_request(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<LoanRequest>> {
    claims.require_librarian()?;

    let request = state.services.circulation.reject_loan(id).await?;
    Ok(Json(request))
}

/// List loans, newest first
#[utoipa::path(
    get,
    path = "/loans",
    tag = "loans",
    security(("bearer_auth" = [])),
    params(LoanQuery),
    responses(
        (status = 200, description = "Loans", body = Vec<Loan>),
        (status = 403, description = "Not allowed to see another user's loans")
    )
)]
pub async fn list_loans(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Query(mut query): Query<LoanQuery>,
) -> AppResult<Json<Vec<Loan>>> {
    query.user_id = claims.list_scope(query.user_id)?;

    let loans = state.services.circulation.list_loans(&query).await?;
    Ok(Json(loans))
}

/// Get a loan
#[utoipa::path(
    get,
    path = "/loans/{id}",
    tag = "loans",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Loan ID")
    ),
    responses(
        (status = 200, description = "Loan", body = Loan),
        (status = 404, description = "Loan not found")
    )
)]
pub async fn get_loan(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<Loan>> {
    let loan = state.services.circulation.get_loan(id).await?;
    claims.require_self_or_librarian(loan.user_id)?;
    Ok(Json(loan))
}

/// Return a borrowed copy
#[utoipa::path(
    post,
    path = "/loans/{id}/return",
    tag = "loans",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Loan ID")
    ),
    responses(
        (status = 200, description = "Copy returned", body = ReturnOutcome),
        (status = 404, description = "Loan not found"),
        (status = 409, description = "Already returned")
    )
)]
pub async fn return_loan(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<ReturnOutcome>> {
    let loan = state.services.circulation.get_loan(id).await?;
    claims.require_self_or_librarian(loan.user_id)?;

    let outcome = state.services.circulation.return_loan(id).await?;
    Ok(Json(outcome))
}
