//! Catalog endpoints: materials and copies

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use utoipa::IntoParams;

use crate::{
    error::AppResult,
    models::{
        copy::{CopyRecord, CreateCopy, UpdateCopy, UpdateCopyStatus},
        material::{CreateMaterial, Material, MaterialAvailability, MaterialQuery, MaterialSummary, UpdateMaterial},
    },
};

use super::AuthenticatedUser;

/// Copy lookup parameters
#[derive(Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct CopyCodeQuery {
    /// Shelf code / barcode
    pub code: String,
}

/// Search materials
#[utoipa::path(
    get,
    path = "/materials",
    tag = "catalog",
    security(("bearer_auth" = [])),
    params(MaterialQuery),
    responses(
        (status = 200, description = "Materials ordered by title, with copy counts", body = Vec<MaterialSummary>),
        (status = 401, description = "Not authenticated")
    )
)]
pub async fn list_materials(
    State(state): State<crate::AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
    Query(query): Query<MaterialQuery>,
) -> AppResult<Json<Vec<MaterialSummary>>> {
    let materials = state.services.catalog.list_materials(&query).await?;
    Ok(Json(materials))
}

/// Get material details by ID
#[utoipa::path(
    get,
    path = "/materials/{id}",
    tag = "catalog",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Material ID")
    ),
    responses(
        (status = 200, description = "Material details", body = Material),
        (status = 404, description = "Material not found")
    )
)]
pub async fn get_material(
    State(state): State<crate::AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<Material>> {
    let material = state.services.catalog.get_material(id).await?;
    Ok(Json(material))
}

/// Create a new material
#[utoipa::path(
    post,
    path = "/materials",
    tag = "catalog",
    security(("bearer_auth" = [])),
    request_body = CreateMaterial,
    responses(
        (status = 201, description = "Material created", body = Material),
        (status = 400, description = "Invalid input"),
        (status = 403, description = "Librarian role required")
    )
)]
pub async fn create_material(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Json(material): Json<CreateMaterial>,
) -> AppResult<(StatusCode, Json<Material>)> {
    claims.require_librarian()?;

    let created = state.services.catalog.create_material(material).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// Update material metadata
#[utoipa::path(
    put,
    path = "/materials/{id}",
    tag = "catalog",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Material ID")
    ),
    request_body = UpdateMaterial,
    responses(
        (status = 200, description = "Material updated", body = Material),
        (status = 404, description = "Material not found")
    )
)]
pub async fn update_material(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
    Json(update): Json<UpdateMaterial>,
) -> AppResult<Json<Material>> {
    claims.require_librarian()?;

    let updated = state.services.catalog.update_material(id, update).await?;
    Ok(Json(updated))
}

/// Delete a material and its copies
#[utoipa::path(
    delete,
    path = "/materials/{id}",
    tag = "catalog",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Material ID")
    ),
    responses(
        (status = 204, description = "Material deleted"),
        (status = 404, description = "Material not found"),
        (status = 409, description = "A copy is reserved or on loan")
    )
)]
pub async fn delete_material(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<StatusCode> {
    claims.require_librarian()?;

    state.services.catalog.delete_material(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Copy counts per status for a material
#[utoipa::path(
    get,
    path = "/materials/{id}/availability",
    tag = "catalog",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Material ID")
    ),
    responses(
        (status = 200, description = "Availability", body = MaterialAvailability),
        (status = 404, description = "Material not found")
    )
)]
pub async fn get_availability(
    State(state): State<crate::AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<MaterialAvailability>> {
    let availability = state.services.catalog.availability(id).await?;
    Ok(Json(availability))
}

/// List copies of a material
#[utoipa::path(
    get,
    path = "/materials/{id}/copies",
    tag = "catalog",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Material ID")
    ),
    responses(
        (status = 200, description = "List of copies", body = Vec<CopyRecord>),
        (status = 404, description = "Material not found")
    )
)]
pub async fn list_copies(
    State(state): State<crate::AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
    Path(material_id): Path<i32>,
) -> AppResult<Json<Vec<CopyRecord>>> {
    let copies = state.services.catalog.list_copies(material_id).await?;
    Ok(Json(copies))
}

/// Create a new copy of a material
#[utoipa::path(
    post,
    path = "/materials/{id}/copies",
    tag = "catalog",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Material ID")
    ),
    request_body = CreateCopy,
    responses(
        (status = 201, description = "Copy created", body = CopyRecord),
        (status = 404, description = "Material not found"),
        (status = 409, description = "Code already in use")
    )
)]
pub async fn create_copy(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(material_id): Path<i32>,
    Json(copy): Json<CreateCopy>,
) -> AppResult<(StatusCode, Json<CopyRecord>)> {
    claims.require_librarian()?;

    let created = state.services.catalog.create_copy(material_id, copy).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// Find a copy by its shelf code
#[utoipa::path(
    get,
    path = "/copies",
    tag = "catalog",
    security(("bearer_auth" = [])),
    params(CopyCodeQuery),
    responses(
        (status = 200, description = "Copy details", body = CopyRecord),
        (status = 404, description = "No copy with this code")
    )
)]
pub async fn find_copy_by_code(
    State(state): State<crate::AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
    Query(query): Query<CopyCodeQuery>,
) -> AppResult<Json<CopyRecord>> {
    let copy = state.services.catalog.get_copy_by_code(&query.code).await?;
    Ok(Json(copy))
}

/// Get copy details by ID
#[utoipa::path(
    get,
    path = "/copies/{id}",
    tag = "catalog",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Copy ID")
    ),
    responses(
        (status = 200, description = "Copy details", body = CopyRecord),
        (status = 404, description = "Copy not found")
    )
)]
pub async fn get_copy(
    State(state): State<crate::AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<CopyRecord>> {
    let copy = state.services.catalog.get_copy(id).await?;
    Ok(Json(copy))
}

/// Update copy metadata
#[utoipa::path(
    put,
    path = "/copies/{id}",
    tag = "catalog",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Copy ID")
    ),
    request_body = UpdateCopy,
    responses(
        (status = 200, description = "Copy updated", body = CopyRecord),
        (status = 404, description = "Copy not found"),
        (status = 409, description = "Code already in use")
    )
)]
pub async fn update_copy(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
    Json(update): Json<UpdateCopy>,
) -> AppResult<Json<CopyRecord>> {
    claims.require_librarian()?;

    let updated = state.services.catalog.update_copy(id, update).await?;
    Ok(Json(updated))
}

/// Mark a copy damaged or put it back in service
#[utoipa::path(
    put,
    path = "/copies/{id}/status",
    tag = "catalog",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Copy ID")
    ),
    request_body = UpdateCopyStatus,
    responses(
        (status = 200, description = "Status changed", body = CopyRecord),
        (status = 404, description = "Copy not found"),
        (status = 409, description = "Copy is in circulation or target status not allowed")
    )
)]
pub async fn update_copy_status(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
    Json(update): Json<UpdateCopyStatus>,
) -> AppResult<Json<CopyRecord>> {
    claims.require_librarian()?;

    let updated = state.services.catalog.set_copy_status(id, update.status).await?;
    Ok(Json(updated))
}

/// Delete a copy
#[utoipa::path(
    delete,
    path = "/copies/{id}",
    tag = "catalog",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Copy ID")
    ),
    responses(
        (status = 204, description = "Copy deleted"),
        (status = 404, description = "Copy not found"),
        (status = 409, description = "Copy is reserved, on loan or has history")
    )
)]
pub async fn delete_copy(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<StatusCode> {
    claims.require_librarian()?;

    state.services.catalog.delete_copy(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
