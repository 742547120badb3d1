//! Storage backend selected at startup.

use campus_core::tuition::{
    CashMovement, CashSummary, Committed, InMemoryTuitionRepository, MovementFilter, MovementType,
    PaymentRecord, RecordAccess, TuitionError, TuitionRepository, WorkOutcome,
};
use campus_db::PgTuitionRepository;
use campus_shared::types::{PageRequest, PageResponse, StudentId};

/// Either the `PostgreSQL` repository or the process-local one.
#[derive(Debug)]
pub enum TuitionBackend {
    /// Records and ledger in `PostgreSQL`.
    Postgres(PgTuitionRepository),
    /// Records and ledger in memory; lost on restart.
    Memory(InMemoryTuitionRepository),
}

impl TuitionRepository for TuitionBackend {
    async fn find_record(&self, student_id: StudentId) -> Result<Option<PaymentRecord>, TuitionError> {
        match self {
            Self::Postgres(repo) => repo.find_record(student_id).await,
            Self::Memory(repo) => repo.find_record(student_id).await,
        }
    }

    async fn transact<T, F>(
        &self,
        student_id: StudentId,
        access: RecordAccess,
        work: F,
    ) -> Result<Committed<T>, TuitionError>
    where
        T: Send,
        F: FnOnce(&mut PaymentRecord) -> Result<WorkOutcome<T>, TuitionError> + Send,
    {
        match self {
            Self::Postgres(repo) => repo.transact(student_id, access, work).await,
            Self::Memory(repo) => repo.transact(student_id, access, work).await,
        }
    }

    async fn summarize(&self, filter: MovementFilter) -> Result<CashSummary, TuitionError> {
        match self {
            Self::Postgres(repo) => repo.summarize(filter).await,
            Self::Memory(repo) => repo.summarize(filter).await,
        }
    }

    async fn list_movements(
        &self,
        movement_type: MovementType,
        filter: MovementFilter,
        page: PageRequest,
    ) -> Result<PageResponse<CashMovement>, TuitionError> {
        match self {
            Self::Postgres(repo) => repo.list_movements(movement_type, filter, page).await,
            Self::Memory(repo) => repo.list_movements(movement_type, filter, page).await,
        }
    }
}
