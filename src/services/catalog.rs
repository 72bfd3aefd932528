//! Catalog management service: materials and their copies

use std::sync::Arc;

use validator::Validate;

use crate::{
    clock::{Clock, ClockExt},
    error::{AppError, AppResult},
    models::{
        copy::{CopyRecord, CreateCopy, NewCopy, UpdateCopy, DEFAULT_FORMAT},
        enums::{CopyStatus, LoanRequestStatus},
        loan::LoanRequestQuery,
        material::{CreateMaterial, Material, MaterialAvailability, MaterialQuery, MaterialSummary, UpdateMaterial},
    },
    repository::{Store, StoreTx},
};

async fn require_material(tx: &mut dyn StoreTx, material_id: i32) -> AppResult<Material> {
    tx.get_material(material_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Material with id {} not found", material_id)))
}

async fn require_copy_for_update(tx: &mut dyn StoreTx, copy_id: i32) -> AppResult<CopyRecord> {
    tx.get_copy_for_update(copy_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Copy with id {} not found", copy_id)))
}

/// A `reserved` copy is still set aside while a hold or a pending loan
/// request points at it
async fn ensure_not_set_aside(tx: &mut dyn StoreTx, copy: &CopyRecord) -> AppResult<()> {
    let queue = tx.reservation_queue(copy.id).await?;
    if let Some(hold) = queue.iter().find(|r| r.is_holding()) {
        return Err(AppError::InvalidState(format!(
            "Copy {} is held for reservation {}",
            copy.code, hold.id
        )));
    }

    let pending = tx
        .list_loan_requests(&LoanRequestQuery {
            copy_id: Some(copy.id),
            status: Some(LoanRequestStatus::Pending),
            ..Default::default()
        })
        .await?;
    if let Some(request) = pending.first() {
        return Err(AppError::InvalidState(format!(
            "Copy {} is set aside for loan request {}",
            copy.code, request.id
        )));
    }
    Ok(())
}

fn availability_of(material_id: i32, copies: &[CopyRecord]) -> MaterialAvailability {
    let mut availability = MaterialAvailability {
        material_id,
        ..Default::default()
    };
    for copy in copies {
        match copy.status {
            CopyStatus::Available => availability.available += 1,
            CopyStatus::Reserved => availability.reserved += 1,
            CopyStatus::Loaned => availability.loaned += 1,
            CopyStatus::Damaged => availability.damaged += 1,
        }
    }
    availability
}

#[derive(Clone)]
pub struct CatalogService {
    store: Arc<dyn Store>,
    clock: Arc<dyn Clock>,
}

impl CatalogService {
    pub fn new(store: Arc<dyn Store>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Search materials by title, with copy counts
    pub async fn list_materials(&self, query: &MaterialQuery) -> AppResult<Vec<MaterialSummary>> {
        let mut tx = self.store.begin().await?;
        let title = query.title.as_deref().map(str::trim).filter(|t| !t.is_empty());
        let available_only = query.available_only.unwrap_or(false);

        let mut summaries = Vec::new();
        for material in tx.list_materials(title).await? {
            let copies = tx.list_copies(material.id).await?;
            let availability = availability_of(material.id, &copies);
            if available_only && !availability.circulates() {
                continue;
            }
            summaries.push(MaterialSummary { material, availability });
        }
        Ok(summaries)
    }

    pub async fn get_material(&self, material_id: i32) -> AppResult<Material> {
        let mut tx = self.store.begin().await?;
        require_material(tx.as_mut(), material_id).await
    }

    pub async fn create_material(&self, material: CreateMaterial) -> AppResult<Material> {
        material.validate()?;
        let mut tx = self.store.begin().await?;
        let created = tx.insert_material(&material, self.clock.now()).await?;
        tx.commit().await?;
        tracing::info!(material_id = created.id, title = %created.title, "Material created");
        Ok(created)
    }

    pub async fn update_material(&self, material_id: i32, update: UpdateMaterial) -> AppResult<Material> {
        update.validate()?;
        let mut tx = self.store.begin().await?;
        let mut material = require_material(tx.as_mut(), material_id).await?;
        material.apply(update);
        tx.update_material(&material).await?;
        tx.commit().await?;
        Ok(material)
    }

    /// Delete a material and its copies; refused while any copy circulates
    pub async fn delete_material(&self, material_id: i32) -> AppResult<()> {
        let mut tx = self.store.begin().await?;
        require_material(tx.as_mut(), material_id).await?;

        let copies = tx.list_copies(material_id).await?;
        if let Some(busy) = copies.iter().find(|c| c.status.in_circulation()) {
            return Err(AppError::InvalidState(format!(
                "Copy {} of material {} is {}",
                busy.code, material_id, busy.status
            )));
        }
        if tx.count_active_loans_for_material(material_id).await? > 0 {
            return Err(AppError::InvalidState(format!(
                "Material {} has active loans",
                material_id
            )));
        }

        tx.delete_material(material_id).await?;
        tx.commit().await?;
        tracing::info!(material_id, copies = copies.len(), "Material deleted");
        Ok(())
    }

    /// Copy counts per status
    pub async fn availability(&self, material_id: i32) -> AppResult<MaterialAvailability> {
        let mut tx = self.store.begin().await?;
        require_material(tx.as_mut(), material_id).await?;
        let copies = tx.list_copies(material_id).await?;
        Ok(availability_of(material_id, &copies))
    }

    pub async fn list_copies(&self, material_id: i32) -> AppResult<Vec<CopyRecord>> {
        let mut tx = self.store.begin().await?;
        require_material(tx.as_mut(), material_id).await?;
        tx.list_copies(material_id).await
    }

    pub async fn get_copy(&self, copy_id: i32) -> AppResult<CopyRecord> {
        let mut tx = self.store.begin().await?;
        tx.get_copy(copy_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Copy with id {} not found", copy_id)))
    }

    /// Look a copy up by its shelf code
    pub async fn get_copy_by_code(&self, code: &str) -> AppResult<CopyRecord> {
        let mut tx = self.store.begin().await?;
        tx.get_copy_by_code(code)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Copy with code {} not found", code)))
    }

    pub async fn create_copy(&self, material_id: i32, copy: CreateCopy) -> AppResult<CopyRecord> {
        copy.validate()?;
        let status = match copy.status.unwrap_or(CopyStatus::Available) {
            status @ (CopyStatus::Available | CopyStatus::Damaged) => status,
            status @ (CopyStatus::Reserved | CopyStatus::Loaned) => {
                return Err(AppError::Validation(format!(
                    "New copies cannot start as {}",
                    status
                )))
            }
        };

        let mut tx = self.store.begin().await?;
        require_material(tx.as_mut(), material_id).await?;

        let created = tx
            .insert_copy(&NewCopy {
                material_id,
                code: copy.code,
                location: copy.location,
                collection: copy.collection,
                format: copy.format.unwrap_or_else(|| DEFAULT_FORMAT.to_string()),
                status,
                acquired_on: self.clock.today(),
            })
            .await?;
        tx.commit().await?;

        tracing::info!(copy_id = created.id, material_id, code = %created.code, "Copy created");
        Ok(created)
    }

    /// Edit copy metadata; status is never changed here
    pub async fn update_copy(&self, copy_id: i32, update: UpdateCopy) -> AppResult<CopyRecord> {
        update.validate()?;
        let mut tx = self.store.begin().await?;
        let mut copy = require_copy_for_update(tx.as_mut(), copy_id).await?;
        copy.apply(update);
        tx.update_copy(&copy).await?;
        tx.commit().await?;
        Ok(copy)
    }

    /// Administrative status edit.
    ///
    /// Moves copies between `available` and `damaged`. A `reserved` copy that
    /// no hold or pending loan request points at any more (its reservation was
    /// completed at the desk) can be put back in service the same way.
    pub async fn set_copy_status(&self, copy_id: i32, status: CopyStatus) -> AppResult<CopyRecord> {
        let mut tx = self.store.begin().await?;
        let mut copy = require_copy_for_update(tx.as_mut(), copy_id).await?;

        if copy.status == CopyStatus::Loaned || status.in_circulation() {
            return Err(AppError::InvalidState(format!(
                "Copy {} cannot go from {} to {} outside circulation",
                copy.code, copy.status, status
            )));
        }
        if copy.status == CopyStatus::Reserved {
            ensure_not_set_aside(tx.as_mut(), &copy).await?;
        }

        if copy.status != status {
            if !tx.transition_copy(copy_id, copy.status, status).await? {
                return Err(AppError::InvalidState(format!("Copy {} changed status concurrently", copy.code)));
            }
            tx.commit().await?;
            tracing::info!(copy_id, from = %copy.status, to = %status, "Copy status edited");
            copy.status = status;
        }
        Ok(copy)
    }

    pub async fn delete_copy(&self, copy_id: i32) -> AppResult<()> {
        let mut tx = self.store.begin().await?;
        let copy = require_copy_for_update(tx.as_mut(), copy_id).await?;
        if copy.status.in_circulation() {
            return Err(AppError::InvalidState(format!("Copy {} is {}", copy.code, copy.status)));
        }
        tx.delete_copy(copy_id).await?;
        tx.commit().await?;
        tracing::info!(copy_id, "Copy deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn copy(id: i32, status: CopyStatus) -> CopyRecord {
        CopyRecord {
            id,
            material_id: 1,
            code: format!("C-{}", id),
            location: None,
            collection: None,
            format: DEFAULT_FORMAT.to_string(),
            status,
            acquired_on: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
        }
    }

    #[test]
    fn test_availability_counts_each_status() {
        let copies = vec![
            copy(1, CopyStatus::Available),
            copy(2, CopyStatus::Available),
            copy(3, CopyStatus::Loaned),
            copy(4, CopyStatus::Damaged),
        ];
        let availability = availability_of(1, &copies);
        assert_eq!(
            availability,
            MaterialAvailability {
                material_id: 1,
                available: 2,
                reserved: 0,
                loaned: 1,
                damaged: 1,
            }
        );
    }
}
