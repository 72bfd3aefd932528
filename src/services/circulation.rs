//! Circulation engine: loan requests, approvals, rejections and returns
//!
//! Copy status moves only through this module and the reservation engine:
//!
//! ```text
//! available --request--> reserved --approve--> loaned --return--> available
//!     ^                     |                                 \-> reserved (waitlist hold)
//!     \------reject---------/
//! ```

use std::sync::Arc;

use chrono::Duration;
use serde::Serialize;
use utoipa::ToSchema;

use super::{fines, reservations, users};
use crate::{
    clock::{Clock, ClockExt},
    config::CirculationConfig,
    error::{AppError, AppResult},
    models::{
        enums::{CopyStatus, LoanRequestStatus, LoanStatus},
        fine::{Fine, NewFine},
        loan::{Loan, LoanQuery, LoanRequest, LoanRequestQuery, NewLoan, NewLoanRequest},
        reservation::Reservation,
    },
    repository::Store,
};

/// Result of returning a loan
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ReturnOutcome {
    pub loan: Loan,
    /// Fine generated by a late return
    pub fine: Option<Fine>,
    /// Reservation the copy is now held for, if anyone was waiting
    pub hold: Option<Reservation>,
}

/// Reject loan periods outside `1..=max_loan_days`
pub(crate) fn validate_loan_days(days: i64, config: &CirculationConfig) -> AppResult<()> {
    if days <= 0 {
        return Err(AppError::Validation(format!(
            "Loan period must be at least one day, got {}",
            days
        )));
    }
    if days > config.max_loan_days {
        return Err(AppError::Validation(format!(
            "Loan period cannot exceed {} days, got {}",
            config.max_loan_days, days
        )));
    }
    Ok(())
}

#[derive(Clone)]
pub struct CirculationService {
    store: Arc<dyn Store>,
    clock: Arc<dyn Clock>,
    config: CirculationConfig,
}

impl CirculationService {
    pub fn new(store: Arc<dyn Store>, clock: Arc<dyn Clock>, config: CirculationConfig) -> Self {
        Self { store, clock, config }
    }

    /// Ask to borrow any available copy of a material for `days` days.
    ///
    /// The chosen copy is set aside (`reserved`) until a librarian approves or
    /// rejects the request.
    pub async fn request_loan(&self, material_id: i32, user_id: i32, days: i64) -> AppResult<LoanRequest> {
        validate_loan_days(days, &self.config)?;

        let mut tx = self.store.begin().await?;

        users::require_user(tx.as_mut(), user_id).await?;
        fines::ensure_no_pending_fine(tx.as_mut(), user_id).await?;

        tx.get_material(material_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Material with id {} not found", material_id)))?;

        let copy = tx
            .claim_copy(material_id, CopyStatus::Available, CopyStatus::Reserved)
            .await?
            .ok_or_else(|| {
                AppError::NoAvailableCopy(format!("No available copy of material {}", material_id))
            })?;

        let request = tx
            .insert_loan_request(&NewLoanRequest {
                copy_id: copy.id,
                user_id,
                requested_at: self.clock.now(),
                due_date: self.clock.today() + Duration::days(days),
                detail: Some(format!("Loan request from user {} for {} days", user_id, days)),
            })
            .await?;

        tx.commit().await?;

        tracing::info!(
            request_id = request.id,
            copy_id = copy.id,
            user_id,
            due_date = %request.due_date,
            "Loan requested"
        );
        Ok(request)
    }

    /// Turn a pending request into an active loan
    pub async fn approve_loan(&self, request_id: i32) -> AppResult<Loan> {
        let mut tx = self.store.begin().await?;

        let request = tx
            .get_loan_request_for_update(request_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Loan request with id {} not found", request_id)))?;

        if request.status != LoanRequestStatus::Pending {
            return Err(AppError::InvalidState(format!(
                "Loan request {} is {}, not pending",
                request_id, request.status
            )));
        }
        let copy_id = request
            .copy_id
            .ok_or_else(|| AppError::InvalidState(format!("Loan request {} has no copy", request_id)))?;
        let user_id = request
            .user_id
            .ok_or_else(|| AppError::InvalidState(format!("Loan request {} has no user", request_id)))?;

        let copy = tx
            .get_copy_for_update(copy_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Copy with id {} not found", copy_id)))?;

        match copy.status {
            CopyStatus::Reserved => {}
            CopyStatus::Available | CopyStatus::Loaned | CopyStatus::Damaged => {
                return Err(AppError::InvalidState(format!(
                    "Copy {} is {}, expected reserved",
                    copy.code, copy.status
                )))
            }
        }

        if !tx.transition_copy(copy_id, CopyStatus::Reserved, CopyStatus::Loaned).await? {
            return Err(AppError::InvalidState(format!("Copy {} changed status concurrently", copy.code)));
        }

        let loan = tx
            .insert_loan(&NewLoan {
                copy_id,
                user_id,
                request_id: Some(request_id),
                loan_date: self.clock.today(),
                due_date: request.due_date,
            })
            .await?;

        tx.resolve_loan_request(request_id, LoanRequestStatus::Approved, self.clock.now())
            .await?;

        tx.commit().await?;

        tracing::info!(
            loan_id = loan.id,
            request_id,
            copy_id,
            user_id,
            due_date = %loan.due_date,
            "Loan approved"
        );
        Ok(loan)
    }

    /// Refuse a pending request and release its copy.
    ///
    /// The request row is kept with status `rejected`.
    pub async fn reject_loan(&self, request_id: i32) -> AppResult<LoanRequest> {
        let mut tx = self.store.begin().await?;

        let mut request = tx
            .get_loan_request_for_update(request_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Loan request with id {} not found", request_id)))?;

        if request.status != LoanRequestStatus::Pending {
            return Err(AppError::InvalidState(format!(
                "Loan request {} is {}, not pending",
                request_id, request.status
            )));
        }

        if let Some(copy_id) = request.copy_id {
            // Only a copy still set aside goes back on the shelf
            let released = tx
                .transition_copy(copy_id, CopyStatus::Reserved, CopyStatus::Available)
                .await?;
            if !released {
                tracing::warn!(request_id, copy_id, "Rejected request whose copy was not reserved");
            }
        }

        let now = self.clock.now();
        tx.resolve_loan_request(request_id, LoanRequestStatus::Rejected, now)
            .await?;
        tx.commit().await?;

        request.status = LoanRequestStatus::Rejected;
        request.resolved_at = Some(now);
        tracing::info!(request_id, "Loan request rejected");
        Ok(request)
    }

    /// Check a loan back in.
    ///
    /// Late returns are fined. The copy then goes to the oldest waiting
    /// reservation, or back to `available` when nobody is waiting.
    pub async fn return_loan(&self, loan_id: i32) -> AppResult<ReturnOutcome> {
        let mut tx = self.store.begin().await?;

        let mut loan = tx
            .get_loan_for_update(loan_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Loan with id {} not found", loan_id)))?;

        if loan.status != LoanStatus::Active {
            return Err(AppError::InvalidState(format!("Loan {} is already returned", loan_id)));
        }

        let today = self.clock.today();
        let now = self.clock.now();

        loan.return_date = Some(today);
        loan.status = LoanStatus::Returned;

        let days_late = loan.days_late(today);
        let fine = if days_late > 0 {
            let amount = fines::compute_fine(days_late)?;
            loan.fine_amount = amount;
            let days_late = i32::try_from(days_late)
                .map_err(|_| AppError::Validation(format!("Loan {} is {} days late", loan_id, days_late)))?;
            let fine = tx
                .insert_fine(&NewFine {
                    loan_id,
                    copy_id: loan.copy_id,
                    user_id: loan.user_id,
                    days_late,
                    amount,
                    generated_at: now,
                })
                .await?;
            Some(fine)
        } else {
            None
        };

        tx.update_loan(&loan).await?;

        let hold = reservations::release_for_reservation(tx.as_mut(), loan.copy_id, now).await?;

        tx.commit().await?;

        tracing::info!(
            loan_id,
            copy_id = loan.copy_id,
            user_id = loan.user_id,
            days_late,
            held_for = hold.as_ref().map(|r| r.user_id),
            "Loan returned"
        );

        Ok(ReturnOutcome { loan, fine, hold })
    }

    pub async fn get_request(&self, request_id: i32) -> AppResult<LoanRequest> {
        let mut tx = self.store.begin().await?;
        tx.get_loan_request(request_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Loan request with id {} not found", request_id)))
    }

    pub async fn list_requests(&self, query: &LoanRequestQuery) -> AppResult<Vec<LoanRequest>> {
        let mut tx = self.store.begin().await?;
        tx.list_loan_requests(query).await
    }

    pub async fn get_loan(&self, loan_id: i32) -> AppResult<Loan> {
        let mut tx = self.store.begin().await?;
        tx.get_loan(loan_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Loan with id {} not found", loan_id)))
    }

    pub async fn list_loans(&self, query: &LoanQuery) -> AppResult<Vec<Loan>> {
        let mut tx = self.store.begin().await?;
        let mut loans = tx.list_loans(query).await?;
        if let Some(overdue) = query.overdue {
            let today = self.clock.today();
            loans.retain(|loan| loan.status == LoanStatus::Active && loan.is_overdue(today) == overdue);
        }
        Ok(loans)
    }
}
