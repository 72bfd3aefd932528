//! Shared fixtures: services over the in-memory store and a fixed clock

#![allow(dead_code)]

use std::sync::Arc;

use chrono::NaiveDate;

use library_server::{
    clock::FixedClock,
    config::CirculationConfig,
    models::{
        copy::{CopyRecord, CreateCopy},
        material::{CreateMaterial, Material},
        user::{NewUser, Role, User},
    },
    repository::{MemoryStore, Store},
    services::Services,
};

pub struct Library {
    pub store: Arc<MemoryStore>,
    pub clock: Arc<FixedClock>,
    pub services: Services,
}

pub fn start_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()
}

impl Library {
    pub fn new() -> Self {
        let store = Arc::new(MemoryStore::new());
        let clock = Arc::new(FixedClock::at_date(start_date()));
        let services = Services::new(
            store.clone() as Arc<dyn Store>,
            clock.clone(),
            CirculationConfig::default(),
        );
        Self { store, clock, services }
    }

    pub async fn user(&self, name: &str, role: Role) -> User {
        self.services
            .users
            .create_user(NewUser {
                name: name.to_string(),
                email: None,
                roles: vec![role],
            })
            .await
            .unwrap()
    }

    pub async fn material(&self, title: &str) -> Material {
        self.services
            .catalog
            .create_material(CreateMaterial {
                title: title.to_string(),
                description: None,
                language: Some("es".to_string()),
                publication_year: Some(2008),
                material_type: "book".to_string(),
                isbn: None,
                authors: vec!["Robert C. Martin".to_string()],
            })
            .await
            .unwrap()
    }

    pub async fn copy(&self, material_id: i32, code: &str) -> CopyRecord {
        self.services
            .catalog
            .create_copy(
                material_id,
                CreateCopy {
                    code: code.to_string(),
                    location: Some("Shelf A".to_string()),
                    collection: None,
                    format: None,
                    status: None,
                },
            )
            .await
            .unwrap()
    }

    pub async fn copy_status(&self, copy_id: i32) -> library_server::models::CopyStatus {
        self.services.catalog.get_copy(copy_id).await.unwrap().status
    }
}
