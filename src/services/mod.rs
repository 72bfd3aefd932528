//! Business logic services

pub mod catalog;
pub mod circulation;
pub mod fines;
pub mod reservations;
pub mod users;

use std::sync::Arc;

use crate::{clock::Clock, config::CirculationConfig, repository::Store};

/// Container for all services
#[derive(Clone)]
pub struct Services {
    pub catalog: catalog::CatalogService,
    pub circulation: circulation::CirculationService,
    pub reservations: reservations::ReservationsService,
    pub fines: fines::FinesService,
    pub users: users::UsersService,
    store: Arc<dyn Store>,
}

impl Services {
    /// Create all services over one store and clock
    pub fn new(store: Arc<dyn Store>, clock: Arc<dyn Clock>, circulation: CirculationConfig) -> Self {
        Self {
            catalog: catalog::CatalogService::new(store.clone(), clock.clone()),
            circulation: circulation::CirculationService::new(store.clone(), clock.clone(), circulation.clone()),
            reservations: reservations::ReservationsService::new(store.clone(), clock.clone(), circulation),
            fines: fines::FinesService::new(store.clone(), clock),
            users: users::UsersService::new(store.clone()),
            store,
        }
    }

    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }
}
