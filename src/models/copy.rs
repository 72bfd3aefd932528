//! Copy (physical or digital instance of a material) model

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use validator::Validate;

use super::enums::CopyStatus;

pub const DEFAULT_FORMAT: &str = "physical";

/// One trackable copy of a material
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct CopyRecord {
    pub id: i32,
    pub material_id: i32,
    /// Unique shelf code / barcode
    pub code: String,
    pub location: Option<String>,
    pub collection: Option<String>,
    pub format: String,
    pub status: CopyStatus,
    pub acquired_on: NaiveDate,
}

/// Create copy request
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CreateCopy {
    #[validate(length(min = 1, max = 50))]
    pub code: String,
    #[validate(length(max = 200))]
    pub location: Option<String>,
    #[validate(length(max = 100))]
    pub collection: Option<String>,
    #[validate(length(min = 1, max = 30))]
    pub format: Option<String>,
    /// Only `available` (default) or `damaged` are accepted
    pub status: Option<CopyStatus>,
}

/// Row to insert, resolved by the catalog service
#[derive(Debug, Clone)]
pub struct NewCopy {
    pub material_id: i32,
    pub code: String,
    pub location: Option<String>,
    pub collection: Option<String>,
    pub format: String,
    pub status: CopyStatus,
    pub acquired_on: NaiveDate,
}

/// Update copy metadata request
#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateCopy {
    #[validate(length(min = 1, max = 50))]
    pub code: Option<String>,
    #[validate(length(max = 200))]
    pub location: Option<String>,
    #[validate(length(max = 100))]
    pub collection: Option<String>,
    #[validate(length(min = 1, max = 30))]
    pub format: Option<String>,
}

impl CopyRecord {
    pub fn apply(&mut self, update: UpdateCopy) {
        if let Some(code) = update.code {
            self.code = code;
        }
        if update.location.is_some() {
            self.location = update.location;
        }
        if update.collection.is_some() {
            self.collection = update.collection;
        }
        if let Some(format) = update.format {
            self.format = format;
        }
    }
}

/// Administrative status change request
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct UpdateCopyStatus {
    pub status: CopyStatus,
}
