//! Tuition payments and the cash ledger (caja).
//!
//! Every change to a stored tuition amount is mirrored in the ledger:
//! registrations post the full amount as income, and amendments post the
//! difference as income (increase) or expense (reduction). For any student
//! and payment, the signed sum of its movements equals the stored amount.

pub mod clock;
pub mod error;
pub mod memory;
pub mod reconciliation;
pub mod repository;
pub mod schedule;
pub mod service;
pub mod summary;
pub mod types;

#[cfg(test)]
mod service_props;
#[cfg(test)]
mod tests;

pub use clock::{Clock, FixedClock, SystemClock};
pub use error::{ErrorClass, TuitionError};
pub use memory::{CashLedger, InMemoryTuitionRepository};
pub use reconciliation::{Amendment, ReconciliationEngine};
pub use repository::{Committed, RecordAccess, TuitionRepository, WorkOutcome};
pub use schedule::{ScheduleGate, ScheduleState};
pub use service::TuitionService;
pub use summary::{CashSummary, MovementFilter, SummaryAggregator};
pub use types::*;
