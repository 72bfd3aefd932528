//! In-memory store
//!
//! A transaction takes the store-wide lock for its whole lifetime and works on
//! a private copy of the tables, which replaces the shared tables on commit.
//! Transactions are therefore fully serialized; this adapter backs tests and
//! the `memory` storage backend used for demos.

use std::{cmp::Reverse, collections::BTreeMap, sync::Arc};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tokio::sync::{Mutex, OwnedMutexGuard};

use super::{Store, StoreTx};
use crate::{
    error::{AppError, AppResult},
    models::{
        copy::{CopyRecord, NewCopy},
        enums::{CopyStatus, LoanRequestStatus, LoanStatus, PaymentStatus, ReservationStatus},
        fine::{Fine, FineQuery, NewFine},
        loan::{Loan, LoanQuery, LoanRequest, LoanRequestQuery, NewLoan, NewLoanRequest},
        material::{CreateMaterial, Material},
        reservation::{NewReservation, Reservation, ReservationQuery},
        user::{NewUser, User},
    },
};

#[derive(Debug, Default, Clone)]
struct Tables {
    sequences: BTreeMap<&'static str, i32>,
    users: BTreeMap<i32, User>,
    materials: BTreeMap<i32, Material>,
    copies: BTreeMap<i32, CopyRecord>,
    loan_requests: BTreeMap<i32, LoanRequest>,
    loans: BTreeMap<i32, Loan>,
    reservations: BTreeMap<i32, Reservation>,
    fines: BTreeMap<i32, Fine>,
}

impl Tables {
    fn next_id(&mut self, table: &'static str) -> i32 {
        let id = self.sequences.entry(table).or_insert(0);
        *id += 1;
        *id
    }

    fn code_taken(&self, code: &str, except: Option<i32>) -> bool {
        self.copies
            .values()
            .any(|c| c.code == code && Some(c.id) != except)
    }

    /// Mirrors the RESTRICT foreign keys of the SQL schema
    fn copy_has_history(&self, copy_id: i32) -> bool {
        self.loans.values().any(|l| l.copy_id == copy_id)
            || self.reservations.values().any(|r| r.copy_id == copy_id)
            || self.fines.values().any(|f| f.copy_id == copy_id)
    }

    fn user_has_history(&self, user_id: i32) -> bool {
        self.loans.values().any(|l| l.user_id == user_id)
            || self.reservations.values().any(|r| r.user_id == user_id)
            || self.fines.values().any(|f| f.user_id == user_id)
    }

    fn remove_copy(&mut self, copy_id: i32) -> AppResult<()> {
        if self.copy_has_history(copy_id) {
            return Err(AppError::Conflict(format!(
                "Copy {} is referenced by circulation history",
                copy_id
            )));
        }
        self.copies.remove(&copy_id);
        for request in self.loan_requests.values_mut() {
            if request.copy_id == Some(copy_id) {
                request.copy_id = None;
            }
        }
        Ok(())
    }
}

/// Store keeping every table in process memory
#[derive(Clone, Default)]
pub struct MemoryStore {
    tables: Arc<Mutex<Tables>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn begin(&self) -> AppResult<Box<dyn StoreTx>> {
        let guard = self.tables.clone().lock_owned().await;
        let work = guard.clone();
        Ok(Box::new(MemoryTx { guard, work }))
    }

    async fn ping(&self) -> AppResult<()> {
        Ok(())
    }
}

pub struct MemoryTx {
    guard: OwnedMutexGuard<Tables>,
    work: Tables,
}

#[async_trait]
impl StoreTx for MemoryTx {
    // =========================================================================
    // USERS
    // =========================================================================

    async fn insert_user(&mut self, user: &NewUser) -> AppResult<User> {
        if let Some(email) = &user.email {
            if self.work.users.values().any(|u| u.email.as_ref() == Some(email)) {
                return Err(AppError::Conflict("Email already registered".to_string()));
            }
        }
        let id = self.work.next_id("users");
        let row = User {
            id,
            name: user.name.clone(),
            email: user.email.clone(),
            roles: user.roles.clone(),
        };
        self.work.users.insert(id, row.clone());
        Ok(row)
    }

    async fn get_user(&mut self, id: i32) -> AppResult<Option<User>> {
        Ok(self.work.users.get(&id).cloned())
    }

    async fn list_users(&mut self, search: Option<&str>) -> AppResult<Vec<User>> {
        let needle = search.map(str::to_lowercase);
        let mut rows: Vec<User> = self
            .work
            .users
            .values()
            .filter(|u| match &needle {
                Some(n) => {
                    u.name.to_lowercase().contains(n.as_str())
                        || u.email.as_ref().map_or(false, |e| e.to_lowercase().contains(n.as_str()))
                }
                None => true,
            })
            .cloned()
            .collect();
        rows.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        Ok(rows)
    }

    async fn update_user(&mut self, user: &User) -> AppResult<()> {
        if let Some(email) = &user.email {
            if self
                .work
                .users
                .values()
                .any(|u| u.id != user.id && u.email.as_ref() == Some(email))
            {
                return Err(AppError::Conflict("Email already registered".to_string()));
            }
        }
        match self.work.users.get_mut(&user.id) {
            Some(row) => {
                *row = user.clone();
                Ok(())
            }
            None => Err(AppError::NotFound(format!("User with id {} not found", user.id))),
        }
    }

    async fn delete_user(&mut self, id: i32) -> AppResult<()> {
        if self.work.user_has_history(id) {
            return Err(AppError::Conflict(format!(
                "User {} is referenced by circulation history",
                id
            )));
        }
        self.work.users.remove(&id);
        for request in self.work.loan_requests.values_mut() {
            if request.user_id == Some(id) {
                request.user_id = None;
            }
        }
        Ok(())
    }

    // =========================================================================
    // MATERIALS
    // =========================================================================

    async fn insert_material(&mut self, material: &CreateMaterial, created_at: DateTime<Utc>) -> AppResult<Material> {
        let id = self.work.next_id("materials");
        let row = Material {
            id,
            title: material.title.clone(),
            description: material.description.clone(),
            language: material.language.clone(),
            publication_year: material.publication_year,
            material_type: material.material_type.clone(),
            isbn: material.isbn.clone(),
            authors: material.authors.clone(),
            created_at,
        };
        self.work.materials.insert(id, row.clone());
        Ok(row)
    }

    async fn get_material(&mut self, id: i32) -> AppResult<Option<Material>> {
        Ok(self.work.materials.get(&id).cloned())
    }

    async fn list_materials(&mut self, title: Option<&str>) -> AppResult<Vec<Material>> {
        let needle = title.map(str::to_lowercase);
        let mut rows: Vec<Material> = self
            .work
            .materials
            .values()
            .filter(|m| match &needle {
                Some(n) => m.title.to_lowercase().contains(n.as_str()),
                None => true,
            })
            .cloned()
            .collect();
        rows.sort_by(|a, b| a.title.cmp(&b.title).then(a.id.cmp(&b.id)));
        Ok(rows)
    }

    async fn update_material(&mut self, material: &Material) -> AppResult<()> {
        match self.work.materials.get_mut(&material.id) {
            Some(row) => {
                *row = material.clone();
                Ok(())
            }
            None => Err(AppError::NotFound(format!("Material with id {} not found", material.id))),
        }
    }

    async fn delete_material(&mut self, id: i32) -> AppResult<()> {
        let copy_ids: Vec<i32> = self
            .work
            .copies
            .values()
            .filter(|c| c.material_id == id)
            .map(|c| c.id)
            .collect();
        for copy_id in copy_ids {
            self.work.remove_copy(copy_id)?;
        }
        self.work.materials.remove(&id);
        Ok(())
    }

    // =========================================================================
    // COPIES
    // =========================================================================

    async fn insert_copy(&mut self, copy: &NewCopy) -> AppResult<CopyRecord> {
        if self.work.code_taken(&copy.code, None) {
            return Err(AppError::Conflict(format!("Copy code {} already exists", copy.code)));
        }
        let id = self.work.next_id("copies");
        let row = CopyRecord {
            id,
            material_id: copy.material_id,
            code: copy.code.clone(),
            location: copy.location.clone(),
            collection: copy.collection.clone(),
            format: copy.format.clone(),
            status: copy.status,
            acquired_on: copy.acquired_on,
        };
        self.work.copies.insert(id, row.clone());
        Ok(row)
    }

    async fn get_copy(&mut self, id: i32) -> AppResult<Option<CopyRecord>> {
        Ok(self.work.copies.get(&id).cloned())
    }

    async fn get_copy_for_update(&mut self, id: i32) -> AppResult<Option<CopyRecord>> {
        self.get_copy(id).await
    }

    async fn get_copy_by_code(&mut self, code: &str) -> AppResult<Option<CopyRecord>> {
        Ok(self.work.copies.values().find(|c| c.code == code).cloned())
    }

    async fn list_copies(&mut self, material_id: i32) -> AppResult<Vec<CopyRecord>> {
        Ok(self
            .work
            .copies
            .values()
            .filter(|c| c.material_id == material_id)
            .cloned()
            .collect())
    }

    async fn update_copy(&mut self, copy: &CopyRecord) -> AppResult<()> {
        if self.work.code_taken(&copy.code, Some(copy.id)) {
            return Err(AppError::Conflict(format!("Copy code {} already exists", copy.code)));
        }
        match self.work.copies.get_mut(&copy.id) {
            Some(row) => {
                *row = copy.clone();
                Ok(())
            }
            None => Err(AppError::NotFound(format!("Copy with id {} not found", copy.id))),
        }
    }

    async fn delete_copy(&mut self, id: i32) -> AppResult<()> {
        self.work.remove_copy(id)
    }

    async fn claim_copy(&mut self, material_id: i32, from: CopyStatus, to: CopyStatus) -> AppResult<Option<CopyRecord>> {
        let claimed = self
            .work
            .copies
            .values_mut()
            .find(|c| c.material_id == material_id && c.status == from)
            .map(|c| {
                c.status = to;
                c.clone()
            });
        Ok(claimed)
    }

    async fn find_copy_for_update(&mut self, material_id: i32, status: CopyStatus) -> AppResult<Option<CopyRecord>> {
        Ok(self
            .work
            .copies
            .values()
            .find(|c| c.material_id == material_id && c.status == status)
            .cloned())
    }

    async fn transition_copy(&mut self, id: i32, from: CopyStatus, to: CopyStatus) -> AppResult<bool> {
        match self.work.copies.get_mut(&id) {
            Some(copy) if copy.status == from => {
                copy.status = to;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    // =========================================================================
    // LOAN REQUESTS
    // =========================================================================

    async fn insert_loan_request(&mut self, request: &NewLoanRequest) -> AppResult<LoanRequest> {
        let id = self.work.next_id("loan_requests");
        let row = LoanRequest {
            id,
            copy_id: Some(request.copy_id),
            user_id: Some(request.user_id),
            status: LoanRequestStatus::Pending,
            requested_at: request.requested_at,
            due_date: request.due_date,
            detail: request.detail.clone(),
            resolved_at: None,
        };
        self.work.loan_requests.insert(id, row.clone());
        Ok(row)
    }

    async fn get_loan_request(&mut self, id: i32) -> AppResult<Option<LoanRequest>> {
        Ok(self.work.loan_requests.get(&id).cloned())
    }

    async fn get_loan_request_for_update(&mut self, id: i32) -> AppResult<Option<LoanRequest>> {
        self.get_loan_request(id).await
    }

    async fn list_loan_requests(&mut self, query: &LoanRequestQuery) -> AppResult<Vec<LoanRequest>> {
        let mut rows: Vec<LoanRequest> = self
            .work
            .loan_requests
            .values()
            .filter(|r| query.user_id.map_or(true, |u| r.user_id == Some(u)))
            .filter(|r| query.copy_id.map_or(true, |c| r.copy_id == Some(c)))
            .filter(|r| query.status.map_or(true, |s| r.status == s))
            .cloned()
            .collect();
        rows.sort_by_key(|r| Reverse((r.requested_at, r.id)));
        Ok(rows)
    }

    async fn resolve_loan_request(&mut self, id: i32, status: LoanRequestStatus, resolved_at: DateTime<Utc>) -> AppResult<()> {
        match self.work.loan_requests.get_mut(&id) {
            Some(request) => {
                request.status = status;
                request.resolved_at = Some(resolved_at);
                Ok(())
            }
            None => Err(AppError::NotFound(format!("Loan request with id {} not found", id))),
        }
    }

    // =========================================================================
    // LOANS
    // =========================================================================

    async fn insert_loan(&mut self, loan: &NewLoan) -> AppResult<Loan> {
        let id = self.work.next_id("loans");
        let row = Loan {
            id,
            copy_id: loan.copy_id,
            user_id: loan.user_id,
            request_id: loan.request_id,
            loan_date: loan.loan_date,
            due_date: loan.due_date,
            return_date: None,
            status: LoanStatus::Active,
            fine_amount: Decimal::ZERO,
        };
        self.work.loans.insert(id, row.clone());
        Ok(row)
    }

    async fn get_loan(&mut self, id: i32) -> AppResult<Option<Loan>> {
        Ok(self.work.loans.get(&id).cloned())
    }

    async fn get_loan_for_update(&mut self, id: i32) -> AppResult<Option<Loan>> {
        self.get_loan(id).await
    }

    async fn list_loans(&mut self, query: &LoanQuery) -> AppResult<Vec<Loan>> {
        let mut rows: Vec<Loan> = self
            .work
            .loans
            .values()
            .filter(|l| query.user_id.map_or(true, |u| l.user_id == u))
            .filter(|l| query.status.map_or(true, |s| l.status == s))
            .cloned()
            .collect();
        rows.sort_by_key(|l| Reverse((l.loan_date, l.id)));
        Ok(rows)
    }

    async fn update_loan(&mut self, loan: &Loan) -> AppResult<()> {
        match self.work.loans.get_mut(&loan.id) {
            Some(row) => {
                row.return_date = loan.return_date;
                row.status = loan.status;
                row.fine_amount = loan.fine_amount;
                Ok(())
            }
            None => Err(AppError::NotFound(format!("Loan with id {} not found", loan.id))),
        }
    }

    async fn count_active_loans_for_material(&mut self, material_id: i32) -> AppResult<i64> {
        let copies = &self.work.copies;
        let count = self
            .work
            .loans
            .values()
            .filter(|l| l.status == LoanStatus::Active)
            .filter(|l| copies.get(&l.copy_id).map_or(false, |c| c.material_id == material_id))
            .count();
        Ok(count as i64)
    }

    // =========================================================================
    // RESERVATIONS
    // =========================================================================

    async fn insert_reservation(&mut self, reservation: &NewReservation) -> AppResult<Reservation> {
        let duplicate = self.work.reservations.values().any(|r| {
            r.copy_id == reservation.copy_id
                && r.user_id == reservation.user_id
                && r.status == ReservationStatus::Active
        });
        if duplicate {
            return Err(AppError::DuplicateReservation(format!(
                "User {} already has an active reservation on copy {}",
                reservation.user_id, reservation.copy_id
            )));
        }
        let id = self.work.next_id("reservations");
        let row = Reservation {
            id,
            copy_id: reservation.copy_id,
            user_id: reservation.user_id,
            created_at: reservation.created_at,
            status: ReservationStatus::Active,
            held_since: None,
        };
        self.work.reservations.insert(id, row.clone());
        Ok(row)
    }

    async fn get_reservation(&mut self, id: i32) -> AppResult<Option<Reservation>> {
        Ok(self.work.reservations.get(&id).cloned())
    }

    async fn get_reservation_for_update(&mut self, id: i32) -> AppResult<Option<Reservation>> {
        self.get_reservation(id).await
    }

    async fn find_active_reservation(&mut self, copy_id: i32, user_id: i32) -> AppResult<Option<Reservation>> {
        Ok(self
            .work
            .reservations
            .values()
            .find(|r| r.copy_id == copy_id && r.user_id == user_id && r.status == ReservationStatus::Active)
            .cloned())
    }

    async fn reservation_queue(&mut self, copy_id: i32) -> AppResult<Vec<Reservation>> {
        let mut rows: Vec<Reservation> = self
            .work
            .reservations
            .values()
            .filter(|r| r.copy_id == copy_id && r.status == ReservationStatus::Active)
            .cloned()
            .collect();
        rows.sort_by_key(|r| (r.created_at, r.id));
        Ok(rows)
    }

    async fn list_reservations(&mut self, query: &ReservationQuery) -> AppResult<Vec<Reservation>> {
        let mut rows: Vec<Reservation> = self
            .work
            .reservations
            .values()
            .filter(|r| query.user_id.map_or(true, |u| r.user_id == u))
            .filter(|r| query.copy_id.map_or(true, |c| r.copy_id == c))
            .filter(|r| query.status.map_or(true, |s| r.status == s))
            .cloned()
            .collect();
        rows.sort_by_key(|r| Reverse((r.created_at, r.id)));
        Ok(rows)
    }

    async fn update_reservation(
        &mut self,
        id: i32,
        status: ReservationStatus,
        held_since: Option<DateTime<Utc>>,
    ) -> AppResult<()> {
        match self.work.reservations.get_mut(&id) {
            Some(reservation) => {
                reservation.status = status;
                reservation.held_since = held_since;
                Ok(())
            }
            None => Err(AppError::NotFound(format!("Reservation with id {} not found", id))),
        }
    }

    // =========================================================================
    // FINES
    // =========================================================================

    async fn insert_fine(&mut self, fine: &NewFine) -> AppResult<Fine> {
        let id = self.work.next_id("fines");
        let row = Fine {
            id,
            loan_id: fine.loan_id,
            copy_id: fine.copy_id,
            user_id: fine.user_id,
            days_late: fine.days_late,
            amount: fine.amount,
            status: PaymentStatus::Pending,
            generated_at: fine.generated_at,
            paid_at: None,
        };
        self.work.fines.insert(id, row.clone());
        Ok(row)
    }

    async fn get_fine(&mut self, id: i32) -> AppResult<Option<Fine>> {
        Ok(self.work.fines.get(&id).cloned())
    }

    async fn get_fine_for_update(&mut self, id: i32) -> AppResult<Option<Fine>> {
        self.get_fine(id).await
    }

    async fn list_fines(&mut self, query: &FineQuery) -> AppResult<Vec<Fine>> {
        let mut rows: Vec<Fine> = self
            .work
            .fines
            .values()
            .filter(|f| query.user_id.map_or(true, |u| f.user_id == u))
            .filter(|f| query.status.map_or(true, |s| f.status == s))
            .cloned()
            .collect();
        rows.sort_by_key(|f| Reverse((f.generated_at, f.id)));
        Ok(rows)
    }

    async fn count_pending_fines(&mut self, user_id: i32) -> AppResult<i64> {
        let count = self
            .work
            .fines
            .values()
            .filter(|f| f.user_id == user_id && f.status == PaymentStatus::Pending)
            .count();
        Ok(count as i64)
    }

    async fn mark_fine_paid(&mut self, id: i32, paid_at: DateTime<Utc>) -> AppResult<()> {
        match self.work.fines.get_mut(&id) {
            Some(fine) => {
                fine.status = PaymentStatus::Paid;
                fine.paid_at = Some(paid_at);
                Ok(())
            }
            None => Err(AppError::NotFound(format!("Fine with id {} not found", id))),
        }
    }

    async fn commit(&mut self) -> AppResult<()> {
        *self.guard = self.work.clone();
        Ok(())
    }
}
