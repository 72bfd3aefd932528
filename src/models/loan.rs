//! Loan requests and loans

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};

use super::enums::{LoanRequestStatus, LoanStatus};

/// Pending ask to borrow a copy, awaiting librarian approval
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct LoanRequest {
    pub id: i32,
    /// Cleared if the copy is deleted
    pub copy_id: Option<i32>,
    /// Cleared if the user is deleted
    pub user_id: Option<i32>,
    pub status: LoanRequestStatus,
    pub requested_at: DateTime<Utc>,
    /// Target return date
    pub due_date: NaiveDate,
    pub detail: Option<String>,
    pub resolved_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct NewLoanRequest {
    pub copy_id: i32,
    pub user_id: i32,
    pub requested_at: DateTime<Utc>,
    pub due_date: NaiveDate,
    pub detail: Option<String>,
}

/// Loan request listing parameters
#[derive(Debug, Clone, Default, Deserialize, IntoParams, ToSchema)]
#[into_params(parameter_in = Query)]
pub struct LoanRequestQuery {
    pub user_id: Option<i32>,
    pub copy_id: Option<i32>,
    pub status: Option<LoanRequestStatus>,
}

/// Approved borrowing of a copy; kept as history after return
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Loan {
    pub id: i32,
    pub copy_id: i32,
    pub user_id: i32,
    pub request_id: Option<i32>,
    pub loan_date: NaiveDate,
    pub due_date: NaiveDate,
    pub return_date: Option<NaiveDate>,
    pub status: LoanStatus,
    #[schema(value_type = String)]
    pub fine_amount: Decimal,
}

impl Loan {
    /// Whole days between the due date and `on`, zero when not late
    pub fn days_late(&self, on: NaiveDate) -> i64 {
        (on - self.due_date).num_days().max(0)
    }

    pub fn is_overdue(&self, today: NaiveDate) -> bool {
        self.status == LoanStatus::Active && today > self.due_date
    }
}

#[derive(Debug, Clone)]
pub struct NewLoan {
    pub copy_id: i32,
    pub user_id: i32,
    pub request_id: Option<i32>,
    pub loan_date: NaiveDate,
    pub due_date: NaiveDate,
}

/// Loan listing parameters
#[derive(Debug, Clone, Default, Deserialize, IntoParams, ToSchema)]
#[into_params(parameter_in = Query)]
pub struct LoanQuery {
    pub user_id: Option<i32>,
    pub status: Option<LoanStatus>,
    /// Only active loans past (`true`) or within (`false`) their due date
    pub overdue: Option<bool>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loan(due: NaiveDate) -> Loan {
        Loan {
            id: 1,
            copy_id: 1,
            user_id: 1,
            request_id: None,
            loan_date: due - chrono::Duration::days(14),
            due_date: due,
            return_date: None,
            status: LoanStatus::Active,
            fine_amount: Decimal::ZERO,
        }
    }

    #[test]
    fn test_days_late() {
        let due = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let loan = loan(due);
        assert_eq!(loan.days_late(due), 0);
        assert_eq!(loan.days_late(NaiveDate::from_ymd_opt(2024, 2, 20).unwrap()), 0);
        assert_eq!(loan.days_late(NaiveDate::from_ymd_opt(2024, 3, 10).unwrap()), 9);
    }

    #[test]
    fn test_overdue_only_while_active() {
        let due = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let mut loan = loan(due);
        let later = NaiveDate::from_ymd_opt(2024, 3, 2).unwrap();
        assert!(loan.is_overdue(later));
        loan.status = LoanStatus::Returned;
        assert!(!loan.is_overdue(later));
    }
}
