//! Payment scheduler (spec §4.5): divides a lease's principal into equal
//! monthly installments, absorbing rounding residue into the final one.

use crate::{
    error::{Error, Result},
    types::{PaymentSchedule, PaymentStatus},
};
use chrono::{DateTime, Months, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use uuid::Uuid;

/// Generate a lease's payment schedule.
///
/// Each installment is `principal / term_months`, rounded to 2 decimal
/// places with banker's rounding (half-even), except the last
/// installment, which absorbs whatever residue is left so the schedule
/// sums exactly to `principal`.
pub fn generate(
    lease_id: Uuid,
    principal: Decimal,
    term_months: u32,
    start_date: Option<DateTime<Utc>>,
) -> Result<Vec<PaymentSchedule>> {
    if principal <= Decimal::ZERO {
        return Err(Error::Validation("principal must be positive".into()));
    }
    if term_months == 0 {
        return Err(Error::Validation("term_months must be positive".into()));
    }

    let start = start_date.unwrap_or_else(Utc::now);
    let per_installment = (principal / Decimal::from(term_months))
        .round_dp_with_strategy(2, RoundingStrategy::MidpointNearestEven);

    let mut schedule = Vec::with_capacity(term_months as usize);
    let mut running_total = Decimal::ZERO;
    let now = Utc::now();

    for n in 1..=term_months {
        let due_date = start
            .checked_add_months(Months::new(n - 1))
            .ok_or_else(|| Error::Validation("due date overflow".into()))?;

        let amount = if n == term_months {
            principal - running_total
        } else {
            per_installment
        };
        running_total += amount;

        schedule.push(PaymentSchedule {
            id: Uuid::now_v7(),
            lease_id,
            installment_number: n,
            due_date,
            amount,
            status: PaymentStatus::Pending,
            retry_count: 0,
            last_attempt_at: None,
            created_at: now,
            updated_at: now,
        });
    }

    Ok(schedule)
}
