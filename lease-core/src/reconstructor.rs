//! State reconstructor (spec §4.3): deterministic fold from ledger history
//! to a `LeaseProjection`.

use crate::{
    error::{Error, Result},
    types::{EventType, LeaseProjection, LeaseStatus, LedgerEntry},
};
use rust_decimal::Decimal;
use uuid::Uuid;

/// Fold a lease's ledger history into a projection. `until`, if given,
/// truncates the fold to entries with `sequence_number <= until` — used
/// to answer "what did this lease look like at time T" without a
/// separate snapshot mechanism.
///
/// The first event in a lease's history must be `LEASE_CREATED`; this is
/// an invariant of the persister (spec §4.10), not re-validated here.
pub fn fold(events: &[LedgerEntry], until: Option<u64>) -> Result<LeaseProjection> {
    let relevant = events
        .iter()
        .filter(|e| until.map_or(true, |u| e.sequence_number <= u));

    let mut projection: Option<LeaseProjection> = None;

    for entry in relevant {
        match entry.event_type {
            EventType::LeaseCreated => {
                let customer_id = entry
                    .payload
                    .get("customerId")
                    .and_then(|v| v.as_str())
                    .and_then(|s| Uuid::parse_str(s).ok())
                    .ok_or_else(|| Error::Validation("LEASE_CREATED missing customerId".into()))?;
                let principal_amount = entry
                    .payload
                    .get("principalAmount")
                    .and_then(|v| v.as_str())
                    .and_then(|s| s.parse::<Decimal>().ok())
                    .ok_or_else(|| {
                        Error::Validation("LEASE_CREATED missing principalAmount".into())
                    })?;
                let term_months = entry
                    .payload
                    .get("termMonths")
                    .and_then(|v| v.as_u64())
                    .ok_or_else(|| Error::Validation("LEASE_CREATED missing termMonths".into()))?
                    as u32;

                projection = Some(LeaseProjection {
                    lease_id: entry.lease_id,
                    customer_id,
                    status: LeaseStatus::Pending,
                    principal_amount,
                    term_months,
                    total_paid: Decimal::ZERO,
                    paid_installments: 0,
                    failed_attempts: 0,
                    event_count: 0,
                });
            }
            EventType::PaymentSucceeded => {
                let p = require_mut(&mut projection, entry)?;
                p.paid_installments += 1;
                // Quirk: overwrite rather than accumulate (see
                // LeaseProjection::total_paid doc comment).
                if let Some(amount) = entry.amount {
                    p.total_paid = amount;
                }
            }
            EventType::PaymentFailed => {
                let p = require_mut(&mut projection, entry)?;
                p.failed_attempts += 1;
            }
            EventType::LeaseCompleted => {
                let p = require_mut(&mut projection, entry)?;
                p.status = LeaseStatus::Completed;
            }
            EventType::LeaseDefaulted => {
                let p = require_mut(&mut projection, entry)?;
                p.status = LeaseStatus::Defaulted;
            }
            EventType::PaymentScheduled | EventType::PaymentAttempted => {
                // No projection field changes; still counted below.
                require_mut(&mut projection, entry)?;
            }
        }

        if let Some(p) = projection.as_mut() {
            p.event_count += 1;
        }
    }

    projection.ok_or_else(|| Error::NotFound("no LEASE_CREATED event in history".into()))
}

fn require_mut<'a>(
    projection: &'a mut Option<LeaseProjection>,
    entry: &LedgerEntry,
) -> Result<&'a mut LeaseProjection> {
    projection.as_mut().ok_or_else(|| {
        Error::Validation(format!(
            "event {:?} seen before LEASE_CREATED for lease {}",
            entry.event_type, entry.lease_id
        ))
    })
}
