//! Fine ledger: the late-return rule, payments and the request gate

use std::sync::Arc;

use rust_decimal::Decimal;

use crate::{
    clock::Clock,
    error::{AppError, AppResult},
    models::{
        enums::PaymentStatus,
        fine::{Fine, FineQuery},
    },
    repository::{Store, StoreTx},
};

const FIRST_DAY_AMOUNT: i64 = 1000;
const FIRST_WEEK_AMOUNT: i64 = 2500;
const PER_EXTRA_DAY_AMOUNT: i64 = 100;
const FLAT_RATE_DAYS: i64 = 7;

/// Fine owed for a return `days_late` days after the due date.
///
/// | days late | amount                      |
/// |-----------|-----------------------------|
/// | 1         | 1000                        |
/// | 2..=7     | 2500                        |
/// | >= 8      | 2500 + 100 * (days - 7)     |
pub fn compute_fine(days_late: i64) -> AppResult<Decimal> {
    let amount = match days_late {
        d if d <= 0 => {
            return Err(AppError::Validation(format!(
                "Days late must be positive, got {}",
                days_late
            )))
        }
        1 => FIRST_DAY_AMOUNT,
        2..=FLAT_RATE_DAYS => FIRST_WEEK_AMOUNT,
        d => FIRST_WEEK_AMOUNT + PER_EXTRA_DAY_AMOUNT * (d - FLAT_RATE_DAYS),
    };
    Ok(Decimal::from(amount))
}

/// Fail with `FineBlocked` when the user owes anything
pub(crate) async fn ensure_no_pending_fine(tx: &mut dyn StoreTx, user_id: i32) -> AppResult<()> {
    let pending = tx.count_pending_fines(user_id).await?;
    if pending > 0 {
        tracing::debug!(user_id, pending, "Request refused: pending fines");
        return Err(AppError::FineBlocked(format!(
            "User {} has {} unpaid fine(s)",
            user_id, pending
        )));
    }
    Ok(())
}

#[derive(Clone)]
pub struct FinesService {
    store: Arc<dyn Store>,
    clock: Arc<dyn Clock>,
}

impl FinesService {
    pub fn new(store: Arc<dyn Store>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// True iff the user has at least one pending fine
    pub async fn has_pending_fine(&self, user_id: i32) -> AppResult<bool> {
        let mut tx = self.store.begin().await?;
        Ok(tx.count_pending_fines(user_id).await? > 0)
    }

    pub async fn get_fine(&self, fine_id: i32) -> AppResult<Fine> {
        let mut tx = self.store.begin().await?;
        tx.get_fine(fine_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Fine with id {} not found", fine_id)))
    }

    pub async fn list_fines(&self, query: &FineQuery) -> AppResult<Vec<Fine>> {
        let mut tx = self.store.begin().await?;
        tx.list_fines(query).await
    }

    /// Record payment of a fine
    pub async fn mark_paid(&self, fine_id: i32) -> AppResult<Fine> {
        let mut tx = self.store.begin().await?;

        let mut fine = tx
            .get_fine_for_update(fine_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Fine with id {} not found", fine_id)))?;

        if fine.status == PaymentStatus::Paid {
            return Err(AppError::InvalidState(format!("Fine {} is already paid", fine_id)));
        }

        let now = self.clock.now();
        tx.mark_fine_paid(fine_id, now).await?;
        tx.commit().await?;

        fine.status = PaymentStatus::Paid;
        fine.paid_at = Some(now);
        tracing::info!(fine_id, user_id = fine.user_id, amount = %fine.amount, "Fine paid");
        Ok(fine)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compute_fine_table() {
        assert_eq!(compute_fine(1).unwrap(), Decimal::from(1000));
        assert_eq!(compute_fine(2).unwrap(), Decimal::from(2500));
        assert_eq!(compute_fine(7).unwrap(), Decimal::from(2500));
        assert_eq!(compute_fine(8).unwrap(), Decimal::from(2600));
        assert_eq!(compute_fine(9).unwrap(), Decimal::from(2700));
        assert_eq!(compute_fine(10).unwrap(), Decimal::from(2800));
        assert_eq!(compute_fine(37).unwrap(), Decimal::from(5500));
    }

    #[test]
    fn test_compute_fine_rejects_non_positive_days() {
        assert!(matches!(compute_fine(0), Err(AppError::Validation(_))));
        assert!(matches!(compute_fine(-3), Err(AppError::Validation(_))));
    }
}
