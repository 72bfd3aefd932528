//! Closed status sets shared by the circulation models
//!
//! Each enum maps onto a PostgreSQL enum type of the same name (see migrations).

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

// ---------------------------------------------------------------------------
// CopyStatus
// ---------------------------------------------------------------------------

/// Lifecycle status of a physical or digital copy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema, sqlx::Type)]
#[sqlx(type_name = "copy_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum CopyStatus {
    Available,
    Reserved,
    Loaned,
    Damaged,
}

impl CopyStatus {
    pub const ALL: [CopyStatus; 4] = [
        CopyStatus::Available,
        CopyStatus::Reserved,
        CopyStatus::Loaned,
        CopyStatus::Damaged,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CopyStatus::Available => "available",
            CopyStatus::Reserved => "reserved",
            CopyStatus::Loaned => "loaned",
            CopyStatus::Damaged => "damaged",
        }
    }

    /// Copy is engaged in a loan request, a hold or a loan
    pub fn in_circulation(&self) -> bool {
        match self {
            CopyStatus::Reserved | CopyStatus::Loaned => true,
            CopyStatus::Available | CopyStatus::Damaged => false,
        }
    }
}

impl std::fmt::Display for CopyStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for CopyStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "available" => Ok(CopyStatus::Available),
            "reserved" => Ok(CopyStatus::Reserved),
            "loaned" => Ok(CopyStatus::Loaned),
            "damaged" => Ok(CopyStatus::Damaged),
            _ => Err(format!("Invalid copy status: {}", s)),
        }
    }
}

// ---------------------------------------------------------------------------
// LoanRequestStatus
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, sqlx::Type)]
#[sqlx(type_name = "loan_request_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum LoanRequestStatus {
    Pending,
    Approved,
    Rejected,
}

impl LoanRequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LoanRequestStatus::Pending => "pending",
            LoanRequestStatus::Approved => "approved",
            LoanRequestStatus::Rejected => "rejected",
        }
    }
}

impl std::fmt::Display for LoanRequestStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ---------------------------------------------------------------------------
// LoanStatus
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, sqlx::Type)]
#[sqlx(type_name = "loan_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum LoanStatus {
    Active,
    Returned,
}

impl LoanStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LoanStatus::Active => "active",
            LoanStatus::Returned => "returned",
        }
    }
}

impl std::fmt::Display for LoanStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ---------------------------------------------------------------------------
// ReservationStatus
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, sqlx::Type)]
#[sqlx(type_name = "reservation_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ReservationStatus {
    Active,
    Completed,
    Cancelled,
}

impl ReservationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReservationStatus::Active => "active",
            ReservationStatus::Completed => "completed",
            ReservationStatus::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for ReservationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ---------------------------------------------------------------------------
// PaymentStatus
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, sqlx::Type)]
#[sqlx(type_name = "payment_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Paid,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Paid => "paid",
        }
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_copy_status_round_trips_through_text() {
        for status in CopyStatus::ALL {
            assert_eq!(status.as_str().parse::<CopyStatus>(), Ok(status));
        }
        assert!("lost".parse::<CopyStatus>().is_err());
        assert_eq!("LOANED".parse::<CopyStatus>(), Ok(CopyStatus::Loaned));
    }

    #[test]
    fn test_in_circulation() {
        assert!(CopyStatus::Reserved.in_circulation());
        assert!(CopyStatus::Loaned.in_circulation());
        assert!(!CopyStatus::Available.in_circulation());
        assert!(!CopyStatus::Damaged.in_circulation());
    }

    #[test]
    fn test_serde_uses_lowercase_names() {
        assert_eq!(serde_json::to_string(&PaymentStatus::Pending).unwrap(), "\"pending\"");
        let status: ReservationStatus = serde_json::from_str("\"cancelled\"").unwrap();
        assert_eq!(status, ReservationStatus::Cancelled);
    }
}
