//! Reservation engine: waitlists on copies that are out on loan

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};

use super::{circulation::validate_loan_days, fines, users};
use crate::{
    clock::{Clock, ClockExt},
    config::CirculationConfig,
    error::{AppError, AppResult},
    models::{
        enums::{CopyStatus, ReservationStatus},
        loan::{LoanRequest, NewLoanRequest},
        reservation::{NewReservation, Reservation, ReservationQuery},
    },
    repository::{Store, StoreTx},
};

/// Hand a just-returned copy to its waitlist.
///
/// Runs inside the caller's transaction. The oldest active reservation gets
/// the copy parked for it (`reserved`) and is returned so the caller can
/// notify its user; with nobody waiting the copy becomes `available`.
pub async fn release_for_reservation(
    tx: &mut dyn StoreTx,
    copy_id: i32,
    now: DateTime<Utc>,
) -> AppResult<Option<Reservation>> {
    let copy = tx
        .get_copy_for_update(copy_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Copy with id {} not found", copy_id)))?;

    if copy.status != CopyStatus::Loaned {
        return Err(AppError::InvalidState(format!(
            "Copy {} is {}, only loaned copies can be released",
            copy.code, copy.status
        )));
    }

    let next = tx.reservation_queue(copy_id).await?.into_iter().next();

    match next {
        Some(mut reservation) => {
            if !tx.transition_copy(copy_id, CopyStatus::Loaned, CopyStatus::Reserved).await? {
                return Err(AppError::InvalidState(format!("Copy {} changed status concurrently", copy.code)));
            }
            tx.update_reservation(reservation.id, ReservationStatus::Active, Some(now))
                .await?;
            reservation.held_since = Some(now);
            tracing::info!(
                copy_id,
                reservation_id = reservation.id,
                user_id = reservation.user_id,
                "Copy held for reservation"
            );
            Ok(Some(reservation))
        }
        None => {
            if !tx.transition_copy(copy_id, CopyStatus::Loaned, CopyStatus::Available).await? {
                return Err(AppError::InvalidState(format!("Copy {} changed status concurrently", copy.code)));
            }
            Ok(None)
        }
    }
}

#[derive(Clone)]
pub struct ReservationsService {
    store: Arc<dyn Store>,
    clock: Arc<dyn Clock>,
    config: CirculationConfig,
}

impl ReservationsService {
    pub fn new(store: Arc<dyn Store>, clock: Arc<dyn Clock>, config: CirculationConfig) -> Self {
        Self { store, clock, config }
    }

    /// Join the waitlist of a loaned copy of the material
    pub async fn create_reservation(&self, material_id: i32, user_id: i32) -> AppResult<Reservation> {
        let mut tx = self.store.begin().await?;

        users::require_user(tx.as_mut(), user_id).await?;
        fines::ensure_no_pending_fine(tx.as_mut(), user_id).await?;

        tx.get_material(material_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Material with id {} not found", material_id)))?;

        let copy = tx
            .find_copy_for_update(material_id, CopyStatus::Loaned)
            .await?
            .ok_or_else(|| AppError::NoLoanedCopy(format!("No loaned copy of material {} to reserve", material_id)))?;

        if let Some(existing) = tx.find_active_reservation(copy.id, user_id).await? {
            return Err(AppError::DuplicateReservation(format!(
                "User {} already has active reservation {} on copy {}",
                user_id, existing.id, copy.code
            )));
        }

        let reservation = tx
            .insert_reservation(&NewReservation {
                copy_id: copy.id,
                user_id,
                created_at: self.clock.now(),
            })
            .await?;

        tx.commit().await?;

        tracing::info!(reservation_id = reservation.id, copy_id = copy.id, user_id, "Reservation created");
        Ok(reservation)
    }

    /// Withdraw from the waitlist; a held copy goes back on the shelf
    pub async fn cancel_reservation(&self, reservation_id: i32) -> AppResult<Reservation> {
        let mut tx = self.store.begin().await?;
        let mut reservation = self.load_active(tx.as_mut(), reservation_id).await?;

        if reservation.is_holding()
            && !tx
                .transition_copy(reservation.copy_id, CopyStatus::Reserved, CopyStatus::Available)
                .await?
        {
            return Err(AppError::InvalidState(format!(
                "Copy {} held for reservation {} is no longer reserved",
                reservation.copy_id, reservation_id
            )));
        }

        tx.update_reservation(reservation_id, ReservationStatus::Cancelled, reservation.held_since)
            .await?;
        tx.commit().await?;

        reservation.status = ReservationStatus::Cancelled;
        tracing::info!(reservation_id, copy_id = reservation.copy_id, "Reservation cancelled");
        Ok(reservation)
    }

    /// Mark a reservation fulfilled; copy status is left untouched.
    ///
    /// A copy that stays `reserved` after its hold is completed this way is
    /// put back in service with [`CatalogService::set_copy_status`].
    ///
    /// [`CatalogService::set_copy_status`]: super::catalog::CatalogService::set_copy_status
    pub async fn complete_reservation(&self, reservation_id: i32) -> AppResult<Reservation> {
        let mut tx = self.store.begin().await?;
        let mut reservation = self.load_active(tx.as_mut(), reservation_id).await?;

        tx.update_reservation(reservation_id, ReservationStatus::Completed, reservation.held_since)
            .await?;
        tx.commit().await?;

        reservation.status = ReservationStatus::Completed;
        tracing::info!(reservation_id, "Reservation completed");
        Ok(reservation)
    }

    /// Pick up a held copy: files a loan request for it and completes the
    /// reservation. The copy stays `reserved` until the request is approved.
    pub async fn claim_hold(&self, reservation_id: i32, user_id: i32, days: i64) -> AppResult<LoanRequest> {
        validate_loan_days(days, &self.config)?;

        let mut tx = self.store.begin().await?;
        let reservation = self.load_active(tx.as_mut(), reservation_id).await?;

        if reservation.user_id != user_id {
            return Err(AppError::InvalidState(format!(
                "Reservation {} belongs to another user",
                reservation_id
            )));
        }
        if !reservation.is_holding() {
            return Err(AppError::InvalidState(format!(
                "Reservation {} is still waiting for its copy",
                reservation_id
            )));
        }

        fines::ensure_no_pending_fine(tx.as_mut(), user_id).await?;

        let copy = tx
            .get_copy_for_update(reservation.copy_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Copy with id {} not found", reservation.copy_id)))?;
        if copy.status != CopyStatus::Reserved {
            return Err(AppError::InvalidState(format!(
                "Copy {} is {}, expected reserved",
                copy.code, copy.status
            )));
        }

        let request = tx
            .insert_loan_request(&NewLoanRequest {
                copy_id: copy.id,
                user_id,
                requested_at: self.clock.now(),
                due_date: self.clock.today() + Duration::days(days),
                detail: Some(format!("Pickup of reservation {} for {} days", reservation_id, days)),
            })
            .await?;

        tx.update_reservation(reservation_id, ReservationStatus::Completed, reservation.held_since)
            .await?;
        tx.commit().await?;

        tracing::info!(reservation_id, request_id = request.id, copy_id = copy.id, "Hold claimed");
        Ok(request)
    }

    pub async fn get_reservation(&self, reservation_id: i32) -> AppResult<Reservation> {
        let mut tx = self.store.begin().await?;
        tx.get_reservation(reservation_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Reservation with id {} not found", reservation_id)))
    }

    pub async fn list_reservations(&self, query: &ReservationQuery) -> AppResult<Vec<Reservation>> {
        let mut tx = self.store.begin().await?;
        tx.list_reservations(query).await
    }

    /// Active reservations on a copy in service order
    pub async fn queue_for_copy(&self, copy_id: i32) -> AppResult<Vec<Reservation>> {
        let mut tx = self.store.begin().await?;
        tx.get_copy(copy_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Copy with id {} not found", copy_id)))?;
        tx.reservation_queue(copy_id).await
    }

    async fn load_active(&self, tx: &mut dyn StoreTx, reservation_id: i32) -> AppResult<Reservation> {
        let reservation = tx
            .get_reservation_for_update(reservation_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Reservation with id {} not found", reservation_id)))?;

        match reservation.status {
            ReservationStatus::Active => Ok(reservation),
            ReservationStatus::Completed | ReservationStatus::Cancelled => Err(AppError::InvalidState(format!(
                "Reservation {} is {}",
                reservation_id, reservation.status
            ))),
        }
    }
}
