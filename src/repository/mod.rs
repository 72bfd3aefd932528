//! Repository layer: the transactional persistence port used by the services
//!
//! Every service operation opens one [`StoreTx`], performs its reads and writes
//! through it and calls [`StoreTx::commit`]. Dropping a transaction without
//! committing discards all of its writes.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;

use crate::{
    error::AppResult,
    models::{
        copy::{CopyRecord, NewCopy},
        enums::{CopyStatus, LoanRequestStatus, ReservationStatus},
        fine::{Fine, FineQuery, NewFine},
        loan::{Loan, LoanQuery, LoanRequest, LoanRequestQuery, NewLoan, NewLoanRequest},
        material::{CreateMaterial, Material},
        reservation::{NewReservation, Reservation, ReservationQuery},
        user::{NewUser, User},
    },
};

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Entry point of a persistence adapter
#[async_trait]
pub trait Store: Send + Sync {
    /// Open a unit of work
    async fn begin(&self) -> AppResult<Box<dyn StoreTx>>;

    /// Cheap connectivity check used by the readiness endpoint
    async fn ping(&self) -> AppResult<()>;
}

/// One atomic unit of work against the circulation tables.
///
/// Methods suffixed `_for_update` lock the returned row until the transaction
/// ends. Listing methods return rows newest first unless stated otherwise.
#[async_trait]
pub trait StoreTx: Send {
    // Users
    async fn insert_user(&mut self, user: &NewUser) -> AppResult<User>;
    async fn get_user(&mut self, id: i32) -> AppResult<Option<User>>;
    /// Ordered by name; `search` matches a substring of the name or email
    async fn list_users(&mut self, search: Option<&str>) -> AppResult<Vec<User>>;
    async fn update_user(&mut self, user: &User) -> AppResult<()>;
    /// Refused while loans, reservations or fines reference the user
    async fn delete_user(&mut self, id: i32) -> AppResult<()>;

    // Materials
    async fn insert_material(&mut self, material: &CreateMaterial, created_at: chrono::DateTime<chrono::Utc>) -> AppResult<Material>;
    async fn get_material(&mut self, id: i32) -> AppResult<Option<Material>>;
    /// Ordered by title
    async fn list_materials(&mut self, title: Option<&str>) -> AppResult<Vec<Material>>;
    async fn update_material(&mut self, material: &Material) -> AppResult<()>;
    /// Deletes the material and its copies
    async fn delete_material(&mut self, id: i32) -> AppResult<()>;

    // Copies
    async fn insert_copy(&mut self, copy: &NewCopy) -> AppResult<CopyRecord>;
    async fn get_copy(&mut self, id: i32) -> AppResult<Option<CopyRecord>>;
    async fn get_copy_for_update(&mut self, id: i32) -> AppResult<Option<CopyRecord>>;
    async fn get_copy_by_code(&mut self, code: &str) -> AppResult<Option<CopyRecord>>;
    /// Ordered by id
    async fn list_copies(&mut self, material_id: i32) -> AppResult<Vec<CopyRecord>>;
    async fn update_copy(&mut self, copy: &CopyRecord) -> AppResult<()>;
    async fn delete_copy(&mut self, id: i32) -> AppResult<()>;
    /// Atomically move the lowest-id copy of `material_id` in status `from` to
    /// `to`. Copies locked by concurrent transactions are skipped.
    async fn claim_copy(&mut self, material_id: i32, from: CopyStatus, to: CopyStatus) -> AppResult<Option<CopyRecord>>;
    /// Lock the lowest-id copy of `material_id` currently in `status`
    async fn find_copy_for_update(&mut self, material_id: i32, status: CopyStatus) -> AppResult<Option<CopyRecord>>;
    /// Compare-and-set on copy status; false when the copy was not in `from`
    async fn transition_copy(&mut self, id: i32, from: CopyStatus, to: CopyStatus) -> AppResult<bool>;

    // Loan requests
    async fn insert_loan_request(&mut self, request: &NewLoanRequest) -> AppResult<LoanRequest>;
    async fn get_loan_request(&mut self, id: i32) -> AppResult<Option<LoanRequest>>;
    async fn get_loan_request_for_update(&mut self, id: i32) -> AppResult<Option<LoanRequest>>;
    async fn list_loan_requests(&mut self, query: &LoanRequestQuery) -> AppResult<Vec<LoanRequest>>;
    async fn resolve_loan_request(
        &mut self,
        id: i32,
        status: LoanRequestStatus,
        resolved_at: chrono::DateTime<chrono::Utc>,
    ) -> AppResult<()>;

    // Loans
    async fn insert_loan(&mut self, loan: &NewLoan) -> AppResult<Loan>;
    async fn get_loan(&mut self, id: i32) -> AppResult<Option<Loan>>;
    async fn get_loan_for_update(&mut self, id: i32) -> AppResult<Option<Loan>>;
    async fn list_loans(&mut self, query: &LoanQuery) -> AppResult<Vec<Loan>>;
    /// Persist return date, status and fine amount
    async fn update_loan(&mut self, loan: &Loan) -> AppResult<()>;
    async fn count_active_loans_for_material(&mut self, material_id: i32) -> AppResult<i64>;

    // Reservations
    async fn insert_reservation(&mut self, reservation: &NewReservation) -> AppResult<Reservation>;
    async fn get_reservation(&mut self, id: i32) -> AppResult<Option<Reservation>>;
    async fn get_reservation_for_update(&mut self, id: i32) -> AppResult<Option<Reservation>>;
    async fn find_active_reservation(&mut self, copy_id: i32, user_id: i32) -> AppResult<Option<Reservation>>;
    /// Active reservations for a copy, oldest first (creation time, then id)
    async fn reservation_queue(&mut self, copy_id: i32) -> AppResult<Vec<Reservation>>;
    async fn list_reservations(&mut self, query: &ReservationQuery) -> AppResult<Vec<Reservation>>;
    async fn update_reservation(
        &mut self,
        id: i32,
        status: ReservationStatus,
        held_since: Option<chrono::DateTime<chrono::Utc>>,
    ) -> AppResult<()>;

    // Fines
    async fn insert_fine(&mut self, fine: &NewFine) -> AppResult<Fine>;
    async fn get_fine(&mut self, id: i32) -> AppResult<Option<Fine>>;
    async fn get_fine_for_update(&mut self, id: i32) -> AppResult<Option<Fine>>;
    async fn list_fines(&mut self, query: &FineQuery) -> AppResult<Vec<Fine>>;
    async fn count_pending_fines(&mut self, user_id: i32) -> AppResult<i64>;
    async fn mark_fine_paid(&mut self, id: i32, paid_at: chrono::DateTime<chrono::Utc>) -> AppResult<()>;

    /// Make every write of this transaction visible
    async fn commit(&mut self) -> AppResult<()>;
}
