//! PostgreSQL store
//!
//! Each [`PgTx`] wraps one database transaction. Copy claims use
//! `FOR UPDATE SKIP LOCKED` so concurrent requests never pick the same copy.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgConnection, Pool, Postgres, Transaction};

use super::{Store, StoreTx};
use crate::{
    error::{AppError, AppResult},
    models::{
        copy::{CopyRecord, NewCopy},
        enums::{CopyStatus, LoanRequestStatus, ReservationStatus},
        fine::{Fine, FineQuery, NewFine},
        loan::{Loan, LoanQuery, LoanRequest, LoanRequestQuery, NewLoan, NewLoanRequest},
        material::{CreateMaterial, Material},
        reservation::{NewReservation, Reservation, ReservationQuery},
        user::{NewUser, User, UserRow},
    },
};

const UNIQUE_VIOLATION: &str = "23505";
const FOREIGN_KEY_VIOLATION: &str = "23503";

/// Map constraint violations to domain errors, anything else to `Storage`
fn map_constraint(err: sqlx::Error, on_unique: impl FnOnce() -> AppError) -> AppError {
    if let sqlx::Error::Database(db) = &err {
        match db.code().as_deref() {
            Some(UNIQUE_VIOLATION) => return on_unique(),
            Some(FOREIGN_KEY_VIOLATION) => {
                return AppError::Conflict(format!(
                    "Row is still referenced: {}",
                    db.constraint().unwrap_or("foreign key")
                ))
            }
            _ => {}
        }
    }
    AppError::Storage(err)
}

#[derive(Clone)]
pub struct PgStore {
    pool: Pool<Postgres>,
}

impl PgStore {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Store for PgStore {
    async fn begin(&self) -> AppResult<Box<dyn StoreTx>> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgTx { tx: Some(tx) }))
    }

    async fn ping(&self) -> AppResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

pub struct PgTx {
    tx: Option<Transaction<'static, Postgres>>,
}

impl PgTx {
    fn conn(&mut self) -> AppResult<&mut PgConnection> {
        self.tx
            .as_deref_mut()
            .ok_or_else(|| AppError::Internal("Transaction already committed".to_string()))
    }
}

#[async_trait]
impl StoreTx for PgTx {
    // =========================================================================
    // USERS
    // =========================================================================

    async fn insert_user(&mut self, user: &NewUser) -> AppResult<User> {
        let roles: Vec<String> = user.roles.iter().map(|r| r.as_str().to_string()).collect();
        let row = sqlx::query_as::<_, UserRow>(
            "INSERT INTO users (name, email, roles) VALUES ($1, $2, $3) RETURNING id, name, email, roles",
        )
        .bind(&user.name)
        .bind(&user.email)
        .bind(&roles)
        .fetch_one(self.conn()?)
        .await
        .map_err(|e| map_constraint(e, || AppError::Conflict("Email already registered".to_string())))?;
        Ok(row.into())
    }

    async fn get_user(&mut self, id: i32) -> AppResult<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>("SELECT id, name, email, roles FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(self.conn()?)
            .await?;
        Ok(row.map(User::from))
    }

    async fn list_users(&mut self, search: Option<&str>) -> AppResult<Vec<User>> {
        let rows = sqlx::query_as::<_, UserRow>(
            r#"
            SELECT id, name, email, roles FROM users
            WHERE ($1::text IS NULL OR name ILIKE '%' || $1 || '%' OR email ILIKE '%' || $1 || '%')
            ORDER BY name, id
            "#,
        )
        .bind(search)
        .fetch_all(self.conn()?)
        .await?;
        Ok(rows.into_iter().map(User::from).collect())
    }

    async fn update_user(&mut self, user: &User) -> AppResult<()> {
        let roles: Vec<String> = user.roles.iter().map(|r| r.as_str().to_string()).collect();
        sqlx::query("UPDATE users SET name = $2, email = $3, roles = $4 WHERE id = $1")
            .bind(user.id)
            .bind(&user.name)
            .bind(&user.email)
            .bind(&roles)
            .execute(self.conn()?)
            .await
            .map_err(|e| map_constraint(e, || AppError::Conflict("Email already registered".to_string())))?;
        Ok(())
    }

    async fn delete_user(&mut self, id: i32) -> AppResult<()> {
        sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(self.conn()?)
            .await
            .map_err(|e| map_constraint(e, || AppError::Conflict(format!("User {} is in use", id))))?;
        Ok(())
    }

    // =========================================================================
    // MATERIALS
    // =========================================================================

    async fn insert_material(&mut self, material: &CreateMaterial, created_at: DateTime<Utc>) -> AppResult<Material> {
        let row = sqlx::query_as::<_, Material>(
            r#"
            INSERT INTO materials
                (title, description, language, publication_year, material_type, isbn, authors, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING *
            "#,
        )
        .bind(&material.title)
        .bind(&material.description)
        .bind(&material.language)
        .bind(material.publication_year)
        .bind(&material.material_type)
        .bind(&material.isbn)
        .bind(&material.authors)
        .bind(created_at)
        .fetch_one(self.conn()?)
        .await?;
        Ok(row)
    }

    async fn get_material(&mut self, id: i32) -> AppResult<Option<Material>> {
        let row = sqlx::query_as::<_, Material>("SELECT * FROM materials WHERE id = $1")
            .bind(id)
            .fetch_optional(self.conn()?)
            .await?;
        Ok(row)
    }

    async fn list_materials(&mut self, title: Option<&str>) -> AppResult<Vec<Material>> {
        let rows = sqlx::query_as::<_, Material>(
            r#"
            SELECT * FROM materials
            WHERE ($1::text IS NULL OR title ILIKE '%' || $1 || '%')
            ORDER BY title, id
            "#,
        )
        .bind(title)
        .fetch_all(self.conn()?)
        .await?;
        Ok(rows)
    }

    async fn update_material(&mut self, material: &Material) -> AppResult<()> {
        sqlx::query(
            r#"
            UPDATE materials
            SET title = $2, description = $3, language = $4, publication_year = $5,
                material_type = $6, isbn = $7, authors = $8
            WHERE id = $1
            "#,
        )
        .bind(material.id)
        .bind(&material.title)
        .bind(&material.description)
        .bind(&material.language)
        .bind(material.publication_year)
        .bind(&material.material_type)
        .bind(&material.isbn)
        .bind(&material.authors)
        .execute(self.conn()?)
        .await?;
        Ok(())
    }

    async fn delete_material(&mut self, id: i32) -> AppResult<()> {
        sqlx::query("DELETE FROM materials WHERE id = $1")
            .bind(id)
            .execute(self.conn()?)
            .await
            .map_err(|e| map_constraint(e, || AppError::Conflict(format!("Material {} is in use", id))))?;
        Ok(())
    }

    // =========================================================================
    // COPIES
    // =========================================================================

    async fn insert_copy(&mut self, copy: &NewCopy) -> AppResult<CopyRecord> {
        let row = sqlx::query_as::<_, CopyRecord>(
            r#"
            INSERT INTO copies (material_id, code, location, collection, format, status, acquired_on)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *
            "#,
        )
        .bind(copy.material_id)
        .bind(&copy.code)
        .bind(&copy.location)
        .bind(&copy.collection)
        .bind(&copy.format)
        .bind(copy.status)
        .bind(copy.acquired_on)
        .fetch_one(self.conn()?)
        .await
        .map_err(|e| map_constraint(e, || AppError::Conflict(format!("Copy code {} already exists", copy.code))))?;
        Ok(row)
    }

    async fn get_copy(&mut self, id: i32) -> AppResult<Option<CopyRecord>> {
        let row = sqlx::query_as::<_, CopyRecord>("SELECT * FROM copies WHERE id = $1")
            .bind(id)
            .fetch_optional(self.conn()?)
            .await?;
        Ok(row)
    }

    async fn get_copy_for_update(&mut self, id: i32) -> AppResult<Option<CopyRecord>> {
        let row = sqlx::query_as::<_, CopyRecord>("SELECT * FROM copies WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(self.conn()?)
            .await?;
        Ok(row)
    }

    async fn get_copy_by_code(&mut self, code: &str) -> AppResult<Option<CopyRecord>> {
        let row = sqlx::query_as::<_, CopyRecord>("SELECT * FROM copies WHERE code = $1")
            .bind(code)
            .fetch_optional(self.conn()?)
            .await?;
        Ok(row)
    }

    async fn list_copies(&mut self, material_id: i32) -> AppResult<Vec<CopyRecord>> {
        let rows = sqlx::query_as::<_, CopyRecord>("SELECT * FROM copies WHERE material_id = $1 ORDER BY id")
            .bind(material_id)
            .fetch_all(self.conn()?)
            .await?;
        Ok(rows)
    }

    async fn update_copy(&mut self, copy: &CopyRecord) -> AppResult<()> {
        sqlx::query(
            r#"
            UPDATE copies
            SET code = $2, location = $3, collection = $4, format = $5, status = $6
            WHERE id = $1
            "#,
        )
        .bind(copy.id)
        .bind(&copy.code)
        .bind(&copy.location)
        .bind(&copy.collection)
        .bind(&copy.format)
        .bind(copy.status)
        .execute(self.conn()?)
        .await
        .map_err(|e| map_constraint(e, || AppError::Conflict(format!("Copy code {} already exists", copy.code))))?;
        Ok(())
    }

    async fn delete_copy(&mut self, id: i32) -> AppResult<()> {
        sqlx::query("DELETE FROM copies WHERE id = $1")
            .bind(id)
            .execute(self.conn()?)
            .await
            .map_err(|e| map_constraint(e, || AppError::Conflict(format!("Copy {} is in use", id))))?;
        Ok(())
    }

    async fn claim_copy(&mut self, material_id: i32, from: CopyStatus, to: CopyStatus) -> AppResult<Option<CopyRecord>> {
        let row = sqlx::query_as::<_, CopyRecord>(
            r#"
            UPDATE copies SET status = $3
            WHERE status = $2 AND id = (
                SELECT id FROM copies
                WHERE material_id = $1 AND status = $2
                ORDER BY id
                LIMIT 1
                FOR UPDATE SKIP LOCKED
            )
            RETURNING *
            "#,
        )
        .bind(material_id)
        .bind(from)
        .bind(to)
        .fetch_optional(self.conn()?)
        .await?;
        Ok(row)
    }

    async fn find_copy_for_update(&mut self, material_id: i32, status: CopyStatus) -> AppResult<Option<CopyRecord>> {
        let row = sqlx::query_as::<_, CopyRecord>(
            r#"
            SELECT * FROM copies
            WHERE material_id = $1 AND status = $2
            ORDER BY id
            LIMIT 1
            FOR UPDATE
            "#,
        )
        .bind(material_id)
        .bind(status)
        .fetch_optional(self.conn()?)
        .await?;
        Ok(row)
    }

    async fn transition_copy(&mut self, id: i32, from: CopyStatus, to: CopyStatus) -> AppResult<bool> {
        let result = sqlx::query("UPDATE copies SET status = $3 WHERE id = $1 AND status = $2")
            .bind(id)
            .bind(from)
            .bind(to)
            .execute(self.conn()?)
            .await?;
        Ok(result.rows_affected() == 1)
    }

    // =========================================================================
    // LOAN REQUESTS
    // =========================================================================

    async fn insert_loan_request(&mut self, request: &NewLoanRequest) -> AppResult<LoanRequest> {
        let row = sqlx::query_as::<_, LoanRequest>(
            r#"
            INSERT INTO loan_requests (copy_id, user_id, status, requested_at, due_date, detail)
            VALUES ($1, $2, 'pending', $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(request.copy_id)
        .bind(request.user_id)
        .bind(request.requested_at)
        .bind(request.due_date)
        .bind(&request.detail)
        .fetch_one(self.conn()?)
        .await?;
        Ok(row)
    }

    async fn get_loan_request(&mut self, id: i32) -> AppResult<Option<LoanRequest>> {
        let row = sqlx::query_as::<_, LoanRequest>("SELECT * FROM loan_requests WHERE id = $1")
            .bind(id)
            .fetch_optional(self.conn()?)
            .await?;
        Ok(row)
    }

    async fn get_loan_request_for_update(&mut self, id: i32) -> AppResult<Option<LoanRequest>> {
        let row = sqlx::query_as::<_, LoanRequest>("SELECT * FROM loan_requests WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(self.conn()?)
            .await?;
        Ok(row)
    }

    async fn list_loan_requests(&mut self, query: &LoanRequestQuery) -> AppResult<Vec<LoanRequest>> {
        let rows = sqlx::query_as::<_, LoanRequest>(
            r#"
            SELECT * FROM loan_requests
            WHERE ($1::int IS NULL OR user_id = $1)
              AND ($2::int IS NULL OR copy_id = $2)
              AND ($3::loan_request_status IS NULL OR status = $3)
            ORDER BY requested_at DESC, id DESC
            "#,
        )
        .bind(query.user_id)
        .bind(query.copy_id)
        .bind(query.status)
        .fetch_all(self.conn()?)
        .await?;
        Ok(rows)
    }

    async fn resolve_loan_request(&mut self, id: i32, status: LoanRequestStatus, resolved_at: DateTime<Utc>) -> AppResult<()> {
        sqlx::query("UPDATE loan_requests SET status = $2, resolved_at = $3 WHERE id = $1")
            .bind(id)
            .bind(status)
            .bind(resolved_at)
            .execute(self.conn()?)
            .await?;
        Ok(())
    }

    // =========================================================================
    // LOANS
    // =========================================================================

    async fn insert_loan(&mut self, loan: &NewLoan) -> AppResult<Loan> {
        let row = sqlx::query_as::<_, Loan>(
            r#"
            INSERT INTO loans (copy_id, user_id, request_id, loan_date, due_date, status, fine_amount)
            VALUES ($1, $2, $3, $4, $5, 'active', 0)
            RETURNING *
            "#,
        )
        .bind(loan.copy_id)
        .bind(loan.user_id)
        .bind(loan.request_id)
        .bind(loan.loan_date)
        .bind(loan.due_date)
        .fetch_one(self.conn()?)
        .await
        .map_err(|e| {
            map_constraint(e, || {
                AppError::InvalidState(format!("Copy {} already has an active loan", loan.copy_id))
            })
        })?;
        Ok(row)
    }

    async fn get_loan(&mut self, id: i32) -> AppResult<Option<Loan>> {
        let row = sqlx::query_as::<_, Loan>("SELECT * FROM loans WHERE id = $1")
            .bind(id)
            .fetch_optional(self.conn()?)
            .await?;
        Ok(row)
    }

    async fn get_loan_for_update(&mut self, id: i32) -> AppResult<Option<Loan>> {
        let row = sqlx::query_as::<_, Loan>("SELECT * FROM loans WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(self.conn()?)
            .await?;
        Ok(row)
    }

    async fn list_loans(&mut self, query: &LoanQuery) -> AppResult<Vec<Loan>> {
        let rows = sqlx::query_as::<_, Loan>(
            r#"
            SELECT * FROM loans
            WHERE ($1::int IS NULL OR user_id = $1)
              AND ($2::loan_status IS NULL OR status = $2)
            ORDER BY loan_date DESC, id DESC
            "#,
        )
        .bind(query.user_id)
        .bind(query.status)
        .fetch_all(self.conn()?)
        .await?;
        Ok(rows)
    }

    async fn update_loan(&mut self, loan: &Loan) -> AppResult<()> {
        sqlx::query("UPDATE loans SET return_date = $2, status = $3, fine_amount = $4 WHERE id = $1")
            .bind(loan.id)
            .bind(loan.return_date)
            .bind(loan.status)
            .bind(loan.fine_amount)
            .execute(self.conn()?)
            .await?;
        Ok(())
    }

    async fn count_active_loans_for_material(&mut self, material_id: i32) -> AppResult<i64> {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM loans l
            JOIN copies c ON c.id = l.copy_id
            WHERE c.material_id = $1 AND l.status = 'active'
            "#,
        )
        .bind(material_id)
        .fetch_one(self.conn()?)
        .await?;
        Ok(count)
    }

    // =========================================================================
    // RESERVATIONS
    // =========================================================================

    async fn insert_reservation(&mut self, reservation: &NewReservation) -> AppResult<Reservation> {
        let row = sqlx::query_as::<_, Reservation>(
            r#"
            INSERT INTO reservations (copy_id, user_id, created_at, status)
            VALUES ($1, $2, $3, 'active')
            RETURNING *
            "#,
        )
        .bind(reservation.copy_id)
        .bind(reservation.user_id)
        .bind(reservation.created_at)
        .fetch_one(self.conn()?)
        .await
        .map_err(|e| {
            map_constraint(e, || {
                AppError::DuplicateReservation(format!(
                    "User {} already has an active reservation on copy {}",
                    reservation.user_id, reservation.copy_id
                ))
            })
        })?;
        Ok(row)
    }

    async fn get_reservation(&mut self, id: i32) -> AppResult<Option<Reservation>> {
        let row = sqlx::query_as::<_, Reservation>("SELECT * FROM reservations WHERE id = $1")
            .bind(id)
            .fetch_optional(self.conn()?)
            .await?;
        Ok(row)
    }

    async fn get_reservation_for_update(&mut self, id: i32) -> AppResult<Option<Reservation>> {
        let row = sqlx::query_as::<_, Reservation>("SELECT * FROM reservations WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(self.conn()?)
            .await?;
        Ok(row)
    }

    async fn find_active_reservation(&mut self, copy_id: i32, user_id: i32) -> AppResult<Option<Reservation>> {
        let row = sqlx::query_as::<_, Reservation>(
            "SELECT * FROM reservations WHERE copy_id = $1 AND user_id = $2 AND status = 'active'",
        )
        .bind(copy_id)
        .bind(user_id)
        .fetch_optional(self.conn()?)
        .await?;
        Ok(row)
    }

    async fn reservation_queue(&mut self, copy_id: i32) -> AppResult<Vec<Reservation>> {
        let rows = sqlx::query_as::<_, Reservation>(
            r#"
            SELECT * FROM reservations
            WHERE copy_id = $1 AND status = 'active'
            ORDER BY created_at ASC, id ASC
            FOR UPDATE
            "#,
        )
        .bind(copy_id)
        .fetch_all(self.conn()?)
        .await?;
        Ok(rows)
    }

    async fn list_reservations(&mut self, query: &ReservationQuery) -> AppResult<Vec<Reservation>> {
        let rows = sqlx::query_as::<_, Reservation>(
            r#"
            SELECT * FROM reservations
            WHERE ($1::int IS NULL OR user_id = $1)
              AND ($2::int IS NULL OR copy_id = $2)
              AND ($3::reservation_status IS NULL OR status = $3)
            ORDER BY created_at DESC, id DESC
            "#,
        )
        .bind(query.user_id)
        .bind(query.copy_id)
        .bind(query.status)
        .fetch_all(self.conn()?)
        .await?;
        Ok(rows)
    }

    async fn update_reservation(
        &mut self,
        id: i32,
        status: ReservationStatus,
        held_since: Option<DateTime<Utc>>,
    ) -> AppResult<()> {
        sqlx::query("UPDATE reservations SET status = $2, held_since = $3 WHERE id = $1")
            .bind(id)
            .bind(status)
            .bind(held_since)
            .execute(self.conn()?)
            .await?;
        Ok(())
    }

    // =========================================================================
    // FINES
    // =========================================================================

    async fn insert_fine(&mut self, fine: &NewFine) -> AppResult<Fine> {
        let row = sqlx::query_as::<_, Fine>(
            r#"
            INSERT INTO fines (loan_id, copy_id, user_id, days_late, amount, status, generated_at)
            VALUES ($1, $2, $3, $4, $5, 'pending', $6)
            RETURNING *
            "#,
        )
        .bind(fine.loan_id)
        .bind(fine.copy_id)
        .bind(fine.user_id)
        .bind(fine.days_late)
        .bind(fine.amount)
        .bind(fine.generated_at)
        .fetch_one(self.conn()?)
        .await?;
        Ok(row)
    }

    async fn get_fine(&mut self, id: i32) -> AppResult<Option<Fine>> {
        let row = sqlx::query_as::<_, Fine>("SELECT * FROM fines WHERE id = $1")
            .bind(id)
            .fetch_optional(self.conn()?)
            .await?;
        Ok(row)
    }

    async fn get_fine_for_update(&mut self, id: i32) -> AppResult<Option<Fine>> {
        let row = sqlx::query_as::<_, Fine>("SELECT * FROM fines WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(self.conn()?)
            .await?;
        Ok(row)
    }

    async fn list_fines(&mut self, query: &FineQuery) -> AppResult<Vec<Fine>> {
        let rows = sqlx::query_as::<_, Fine>(
            r#"
            SELECT * FROM fines
            WHERE ($1::int IS NULL OR user_id = $1)
              AND ($2::payment_status IS NULL OR status = $2)
            ORDER BY generated_at DESC, id DESC
            "#,
        )
        .bind(query.user_id)
        .bind(query.status)
        .fetch_all(self.conn()?)
        .await?;
        Ok(rows)
    }

    async fn count_pending_fines(&mut self, user_id: i32) -> AppResult<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM fines WHERE user_id = $1 AND status = 'pending'",
        )
        .bind(user_id)
        .fetch_one(self.conn()?)
        .await?;
        Ok(count)
    }

    async fn mark_fine_paid(&mut self, id: i32, paid_at: DateTime<Utc>) -> AppResult<()> {
        sqlx::query("UPDATE fines SET status = 'paid', paid_at = $2 WHERE id = $1")
            .bind(id)
            .bind(paid_at)
            .execute(self.conn()?)
            .await?;
        Ok(())
    }

    async fn commit(&mut self) -> AppResult<()> {
        let tx = self
            .tx
            .take()
            .ok_or_else(|| AppError::Internal("Transaction already committed".to_string()))?;
        tx.commit().await?;
        Ok(())
    }
}
