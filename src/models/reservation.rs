//! Reservation (waitlist claim) model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};

use super::enums::ReservationStatus;

/// Claim on a copy that is currently out on loan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Reservation {
    pub id: i32,
    pub copy_id: i32,
    pub user_id: i32,
    pub created_at: DateTime<Utc>,
    pub status: ReservationStatus,
    /// Set once the returned copy has been parked for this reservation
    pub held_since: Option<DateTime<Utc>>,
}

impl Reservation {
    pub fn is_holding(&self) -> bool {
        self.status == ReservationStatus::Active && self.held_since.is_some()
    }
}

#[derive(Debug, Clone)]
pub struct NewReservation {
    pub copy_id: i32,
    pub user_id: i32,
    pub created_at: DateTime<Utc>,
}

/// Reservation listing parameters
#[derive(Debug, Clone, Default, Deserialize, IntoParams, ToSchema)]
#[into_params(parameter_in = Query)]
pub struct ReservationQuery {
    pub user_id: Option<i32>,
    pub copy_id: Option<i32>,
    pub status: Option<ReservationStatus>,
}
