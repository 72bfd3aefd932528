//! Data models for the circulation domain

pub mod copy;
pub mod enums;
pub mod fine;
pub mod loan;
pub mod material;
pub mod reservation;
pub mod user;

// Re-export commonly used types
pub use copy::CopyRecord;
pub use enums::{CopyStatus, LoanRequestStatus, LoanStatus, PaymentStatus, ReservationStatus};
pub use fine::Fine;
pub use loan::{Loan, LoanRequest};
pub use material::Material;
pub use reservation::Reservation;
pub use user::{Role, User, UserClaims};
