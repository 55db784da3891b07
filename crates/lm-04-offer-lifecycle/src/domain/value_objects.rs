//! Reports returned by the scheduler and the offer desk.

use serde::{Deserialize, Serialize};
use shared_types::entities::{Match, Money};
use shared_types::errors::{ErrorCounts, ErrorKind};

/// Result of one scheduler operation.
///
/// `affected` counts rows the operation changed. Rows it had to skip are
/// counted in `errors` by kind.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepReport {
    pub affected: u64,
    /// Leads the expiry policy sent back for routing.
    pub requeued: u64,
    pub errors: ErrorCounts,
}

impl StepReport {
    pub fn affected(affected: u64) -> Self {
        Self {
            affected,
            ..Self::default()
        }
    }
}

/// Counts from one full sweep.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepReport {
    pub reminders_sent: u64,
    pub offers_expired: u64,
    pub leads_requeued: u64,
    pub queue_rows_purged: u64,
    pub dedupe_rows_purged: u64,
    pub errors: ErrorCounts,
}

impl SweepReport {
    /// Nothing changed and nothing failed.
    pub fn is_idle(&self) -> bool {
        self.reminders_sent == 0
            && self.offers_expired == 0
            && self.leads_requeued == 0
            && self.queue_rows_purged == 0
            && self.dedupe_rows_purged == 0
            && self.errors.is_empty()
    }

    pub(crate) fn absorb(&mut self, step: Result<StepReport, ErrorKind>) -> u64 {
        match step {
            Ok(report) => {
                self.errors.merge(&report.errors);
                self.leads_requeued += report.requeued;
                report.affected
            }
            Err(kind) => {
                self.errors.record(kind);
                0
            }
        }
    }
}

/// Outcome of a successful acceptance.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AcceptReceipt {
    pub offer: Match,
    pub charged: Money,
    /// Ledger sequence of the charge.
    pub ledger_sequence: u64,
    /// The lead reached `max_sold_count` with this sale.
    pub sold_out: bool,
    /// Other offers closed because the lead sold out.
    pub closed_offers: u32,
}
