//! Fine endpoints

use axum::{
    extract::{Path, Query, State},
    Json,
};

use crate::{
    error::AppResult,
    models::fine::{Fine, FineQuery},
};

use super::AuthenticatedUser;

/// List fines, newest first
#[utoipa::path(
    get,
    path = "/fines",
    tag = "fines",
    security(("bearer_auth" = [])),
    params(FineQuery),
    responses(
        (status = 200, description = "Fines", body = Vec<Fine>),
        (status = 403, description = "Not allowed to see another user's fines")
    )
)]
pub async fn list_fines(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Query(mut query): Query<FineQuery>,
) -> AppResult<Json<Vec<Fine>>> {
    query.user_id = claims.list_scope(query.user_id)?;

    let fines = state.services.fines.list_fines(&query).await?;
    Ok(Json(fines))
}

/// Get a fine
#[utoipa::path(
    get,
    path = "/fines/{id}",
    tag = "fines",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Fine ID")
    ),
    responses(
        (status = 200, description = "Fine", body = Fine),
        (status = 404, description = "Fine not found")
    )
)]
pub async fn get_fine(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<Fine>> {
    let fine = state.services.fines.get_fine(id).await?;
    claims.require_self_or_librarian(fine.user_id)?;
    Ok(Json(fine))
}

/// Record payment of a fine
#[utoipa::path(
    post,
    path = "/fines/{id}/pay",
    tag = "fines",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Fine ID")
    ),
    responses(
        (status = 200, description = "Fine paid", body = Fine),
        (status = 403, description = "Librarian role required"),
        (status = 404, description = "Fine not found"),
        (status = 409, description = "Fine already paid")
    )
)]
pub async fn pay_fine(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<Fine>> {
    claims.require_librarian()?;

    let fine = state.services.fines.mark_paid(id).await?;
    Ok(Json(fine))
}
