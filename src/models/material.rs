//! Material (bibliographic record) model and related types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

/// Catalog-level bibliographic entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Material {
    pub id: i32,
    pub title: String,
    pub description: Option<String>,
    pub language: Option<String>,
    pub publication_year: Option<i32>,
    /// Book, magazine, thesis, dvd...
    pub material_type: String,
    pub isbn: Option<String>,
    /// Author names in credit order
    pub authors: Vec<String>,
    pub created_at: DateTime<Utc>,
}

/// Create material request
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CreateMaterial {
    #[validate(length(min = 1, max = 300))]
    pub title: String,
    pub description: Option<String>,
    #[validate(length(max = 50))]
    pub language: Option<String>,
    #[validate(range(min = 0, max = 9999))]
    pub publication_year: Option<i32>,
    #[validate(length(min = 1, max = 50))]
    pub material_type: String,
    #[validate(length(max = 30))]
    pub isbn: Option<String>,
    #[serde(default)]
    pub authors: Vec<String>,
}

/// Update material request (metadata only)
#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateMaterial {
    #[validate(length(min = 1, max = 300))]
    pub title: Option<String>,
    pub description: Option<String>,
    #[validate(length(max = 50))]
    pub language: Option<String>,
    #[validate(range(min = 0, max = 9999))]
    pub publication_year: Option<i32>,
    #[validate(length(min = 1, max = 50))]
    pub material_type: Option<String>,
    #[validate(length(max = 30))]
    pub isbn: Option<String>,
    pub authors: Option<Vec<String>>,
}

impl Material {
    /// Apply the fields present in `update`
    pub fn apply(&mut self, update: UpdateMaterial) {
        if let Some(title) = update.title {
            self.title = title;
        }
        if update.description.is_some() {
            self.description = update.description;
        }
        if update.language.is_some() {
            self.language = update.language;
        }
        if update.publication_year.is_some() {
            self.publication_year = update.publication_year;
        }
        if let Some(material_type) = update.material_type {
            self.material_type = material_type;
        }
        if update.isbn.is_some() {
            self.isbn = update.isbn;
        }
        if let Some(authors) = update.authors {
            self.authors = authors;
        }
    }
}

/// Material search parameters
#[derive(Debug, Default, Deserialize, IntoParams, ToSchema)]
#[into_params(parameter_in = Query)]
pub struct MaterialQuery {
    /// Case-insensitive substring of the title
    pub title: Option<String>,
    /// Only materials with a copy on the shelf or out on loan
    pub available_only: Option<bool>,
}

/// Copy counts per status for one material
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct MaterialAvailability {
    pub material_id: i32,
    pub available: i64,
    pub reserved: i64,
    pub loaned: i64,
    pub damaged: i64,
}

impl MaterialAvailability {
    /// Some copy can be requested now or reserved
    pub fn circulates(&self) -> bool {
        self.available > 0 || self.loaned > 0
    }
}

/// Catalog search hit: the material and its copy counts
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct MaterialSummary {
    #[serde(flatten)]
    pub material: Material,
    pub availability: MaterialAvailability,
}
