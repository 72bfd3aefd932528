//! Concurrency checks against a live PostgreSQL database
//!
//! Run with: DATABASE_URL=postgres://... cargo test --test postgres -- --ignored

use std::sync::Arc;

use sqlx::postgres::PgPoolOptions;

use library_server::{
    clock::SystemClock,
    config::CirculationConfig,
    error::AppError,
    models::{
        copy::CreateCopy,
        enums::CopyStatus,
        material::CreateMaterial,
        user::{NewUser, Role, User},
    },
    repository::{PgStore, Store},
    services::Services,
};

/// Services over a migrated database, or `None` when `DATABASE_URL` is unset
async fn connect() -> Option<Services> {
    let url = match std::env::var("DATABASE_URL") {
        Ok(url) => url,
        Err(_) => {
            eprintln!("DATABASE_URL not set, skipping");
            return None;
        }
    };
    let pool = PgPoolOptions::new()
        .max_connections(8)
        .connect(&url)
        .await
        .expect("Failed to connect to database");
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to run migrations");

    Some(Services::new(
        Arc::new(PgStore::new(pool)) as Arc<dyn Store>,
        Arc::new(SystemClock),
        CirculationConfig::default(),
    ))
}

/// Codes and emails are unique per run so the database can be reused
fn run_tag() -> String {
    chrono::Utc::now().format("%Y%m%d%H%M%S%f").to_string()
}

async fn patron(services: &Services, name: &str) -> User {
    services
        .users
        .create_user(NewUser {
            name: name.to_string(),
            email: None,
            roles: vec![Role::Student],
        })
        .await
        .expect("Failed to create user")
}

/// Material with a single copy
async fn single_copy_material(services: &Services, tag: &str, n: usize) -> (i32, i32) {
    let material = services
        .catalog
        .create_material(CreateMaterial {
            title: format!("Race {} #{}", tag, n),
            description: None,
            language: None,
            publication_year: None,
            material_type: "book".to_string(),
            isbn: None,
            authors: Vec::new(),
        })
        .await
        .expect("Failed to create material");
    let copy = services
        .catalog
        .create_copy(
            material.id,
            CreateCopy {
                code: format!("R{}-{}", tag, n),
                location: None,
                collection: None,
                format: None,
                status: None,
            },
        )
        .await
        .expect("Failed to create copy");
    (material.id, copy.id)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[ignore] // Run with: cargo test -- --ignored
async fn test_last_copy_goes_to_exactly_one_request() {
    let Some(services) = connect().await else { return };
    let tag = run_tag();
    let ana = patron(&services, "Ana").await;
    let luis = patron(&services, "Luis").await;

    for n in 0..10 {
        let (material_id, copy_id) = single_copy_material(&services, &tag, n).await;

        let (a, b) = tokio::join!(
            services.circulation.request_loan(material_id, ana.id, 7),
            services.circulation.request_loan(material_id, luis.id, 7),
        );

        let outcomes = [a, b];
        let granted: Vec<_> = outcomes.iter().filter_map(|r| r.as_ref().ok()).collect();
        let refused = outcomes
            .iter()
            .filter(|r| matches!(r, Err(AppError::NoAvailableCopy(_))))
            .count();
        assert_eq!(granted.len(), 1, "round {}", n);
        assert_eq!(refused, 1, "round {}", n);
        assert_eq!(granted[0].copy_id, Some(copy_id));

        let copy = services.catalog.get_copy(copy_id).await.unwrap();
        assert_eq!(copy.status, CopyStatus::Reserved);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[ignore]
async fn test_concurrent_reservations_by_one_user_keep_one() {
    let Some(services) = connect().await else { return };
    let tag = run_tag();
    let ana = patron(&services, "Ana").await;
    let luis = patron(&services, "Luis").await;

    let (material_id, copy_id) = single_copy_material(&services, &tag, 0).await;
    let request = services.circulation.request_loan(material_id, ana.id, 7).await.unwrap();
    services.circulation.approve_loan(request.id).await.unwrap();

    let (a, b) = tokio::join!(
        services.reservations.create_reservation(material_id, luis.id),
        services.reservations.create_reservation(material_id, luis.id),
    );

    let outcomes = [a, b];
    assert_eq!(outcomes.iter().filter(|r| r.is_ok()).count(), 1);
    assert_eq!(
        outcomes
            .iter()
            .filter(|r| matches!(r, Err(AppError::DuplicateReservation(_))))
            .count(),
        1
    );
    assert_eq!(services.reservations.queue_for_copy(copy_id).await.unwrap().len(), 1);
}
