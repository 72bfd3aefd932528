//! Fine (late-return penalty) model

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};

use super::enums::PaymentStatus;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Fine {
    pub id: i32,
    pub loan_id: i32,
    pub copy_id: i32,
    pub user_id: i32,
    pub days_late: i32,
    #[schema(value_type = String)]
    pub amount: Decimal,
    pub status: PaymentStatus,
    pub generated_at: DateTime<Utc>,
    pub paid_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct NewFine {
    pub loan_id: i32,
    pub copy_id: i32,
    pub user_id: i32,
    pub days_late: i32,
    pub amount: Decimal,
    pub generated_at: DateTime<Utc>,
}

/// Fine listing parameters
#[derive(Debug, Clone, Default, Deserialize, IntoParams, ToSchema)]
#[into_params(parameter_in = Query)]
pub struct FineQuery {
    pub user_id: Option<i32>,
    pub status: Option<PaymentStatus>,
}
