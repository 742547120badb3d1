//! Persistence seam for payment records and the cash ledger.

use campus_shared::types::{ClassroomId, PageRequest, PageResponse, StudentId};

use super::error::TuitionError;
use super::summary::{CashSummary, MovementFilter};
use super::types::{CashMovement, MovementType, NewCashMovement, PaymentRecord};

/// How `transact` obtains the record it locks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordAccess {
    /// The record must exist; a missing one is `StudentNotFound`.
    Existing,
    /// Create an empty record in the given classroom when missing.
    GetOrCreate(ClassroomId),
}

/// What a unit of work hands back to the repository.
#[derive(Debug)]
pub struct WorkOutcome<T> {
    /// Value returned to the caller.
    pub value: T,
    /// Movement to append atomically with the record write.
    pub movement: Option<NewCashMovement>,
}

impl<T> WorkOutcome<T> {
    /// Outcome that writes the record only.
    pub fn record_only(value: T) -> Self {
        Self {
            value,
            movement: None,
        }
    }

    /// Outcome that also appends a movement.
    pub fn with_movement(value: T, movement: Option<NewCashMovement>) -> Self {
        Self { value, movement }
    }
}

/// Result of a committed unit of work.
#[derive(Debug)]
pub struct Committed<T> {
    /// Record as persisted (version already bumped).
    pub record: PaymentRecord,
    /// Value produced by the work.
    pub value: T,
    /// Movement as appended, if one was requested.
    pub movement: Option<CashMovement>,
}

/// Repository trait for tuition persistence.
///
/// Implemented by the db crate (`PostgreSQL`) and by
/// [`super::memory::InMemoryTuitionRepository`].
pub trait TuitionRepository: Send + Sync {
    /// Reads a student's record without locking it.
    fn find_record(
        &self,
        student_id: StudentId,
    ) -> impl std::future::Future<Output = Result<Option<PaymentRecord>, TuitionError>> + Send;

    /// Runs `work` against the student's record while holding an exclusive
    /// lock on it.
    ///
    /// Implementations must:
    /// - re-read the record after taking the lock and call `work` exactly once;
    /// - leave record and ledger untouched when `work` fails;
    /// - otherwise bump `version` by one, set `updated_at`, and persist the
    ///   record together with the requested movement, so that either both
    ///   are visible or neither is;
    /// - return `LedgerInconsistency` if the record was written, the
    ///   movement was not, and the record write could not be undone.
    fn transact<T, F>(
        &self,
        student_id: StudentId,
        access: RecordAccess,
        work: F,
    ) -> impl std::future::Future<Output = Result<Committed<T>, TuitionError>> + Send
    where
        T: Send,
        F: FnOnce(&mut PaymentRecord) -> Result<WorkOutcome<T>, TuitionError> + Send;

    /// Totals the ledger for a filter.
    fn summarize(
        &self,
        filter: MovementFilter,
    ) -> impl std::future::Future<Output = Result<CashSummary, TuitionError>> + Send;

    /// Lists one page of movements of a type, most recent first.
    fn list_movements(
        &self,
        movement_type: MovementType,
        filter: MovementFilter,
        page: PageRequest,
    ) -> impl std::future::Future<Output = Result<PageResponse<CashMovement>, TuitionError>> + Send;
}
