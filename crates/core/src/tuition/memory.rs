//! In-memory tuition repository.
//!
//! Backs the `memory` storage backend and the service tests. A single
//! async mutex guards records and ledger together, so every `transact` is
//! serialized and a record write is never visible without its movement.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tokio::sync::Mutex;

use campus_shared::types::{CashMovementId, PageRequest, PageResponse, StudentId};

use super::clock::{Clock, system_clock};
use super::error::TuitionError;
use super::repository::{Committed, RecordAccess, TuitionRepository, WorkOutcome};
use super::summary::{CashSummary, MovementFilter, SummaryAggregator};
use super::types::{CashMovement, MovementType, NewCashMovement, PaymentRecord};

/// Append-only list of cash movements.
#[derive(Debug, Default)]
pub struct CashLedger {
    movements: Vec<CashMovement>,
}

impl CashLedger {
    /// Appends a movement, assigning its ID and timestamp.
    ///
    /// # Errors
    ///
    /// Returns `NonPositiveAmount` if the amount is not strictly positive.
    pub fn append(
        &mut self,
        movement: NewCashMovement,
        recorded_at: DateTime<Utc>,
    ) -> Result<CashMovement, TuitionError> {
        if movement.amount <= Decimal::ZERO {
            return Err(TuitionError::NonPositiveAmount(movement.amount));
        }
        let movement = CashMovement::from_new(CashMovementId::new(), movement, recorded_at);
        self.movements.push(movement.clone());
        Ok(movement)
    }

    /// All movements in append order.
    #[must_use]
    pub fn movements(&self) -> &[CashMovement] {
        &self.movements
    }

    /// Number of movements.
    #[must_use]
    pub fn len(&self) -> usize {
        self.movements.len()
    }

    /// Returns true if nothing was recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.movements.is_empty()
    }
}

#[derive(Debug, Default)]
struct MemoryState {
    records: HashMap<StudentId, PaymentRecord>,
    ledger: CashLedger,
}

/// Process-local implementation of [`TuitionRepository`].
#[derive(Debug)]
pub struct InMemoryTuitionRepository {
    state: Mutex<MemoryState>,
    clock: Arc<dyn Clock>,
}

impl Default for InMemoryTuitionRepository {
    fn default() -> Self {
        Self::with_clock(system_clock())
    }
}

impl InMemoryTuitionRepository {
    /// Creates an empty repository on the wall clock.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty repository that stamps writes with `clock`.
    #[must_use]
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            state: Mutex::new(MemoryState::default()),
            clock,
        }
    }

    /// Copies every movement in append order.
    pub async fn ledger_snapshot(&self) -> Vec<CashMovement> {
        self.state.lock().await.ledger.movements().to_vec()
    }
}

impl TuitionRepository for InMemoryTuitionRepository {
    async fn find_record(&self, student_id: StudentId) -> Result<Option<PaymentRecord>, TuitionError> {
        Ok(self.state.lock().await.records.get(&student_id).cloned())
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
        let mut state = self.state.lock().await;
        let now = self.clock.now();

        let existing = state.records.get(&student_id).cloned();
        let mut record = match (&existing, access) {
            (Some(record), _) => record.clone(),
            (None, RecordAccess::GetOrCreate(classroom_id)) => {
                PaymentRecord::new(student_id, classroom_id, now)
            }
            (None, RecordAccess::Existing) => return Err(TuitionError::StudentNotFound(student_id)),
        };

        let WorkOutcome { value, movement } = work(&mut record)?;
        record.version += 1;
        record.updated_at = now;
        state.records.insert(student_id, record.clone());

        let movement = match movement {
            Some(new) => match state.ledger.append(new, now) {
                Ok(appended) => Some(appended),
                Err(err) => {
                    // Undo the record write so the failed append leaves no trace.
                    match existing {
                        Some(previous) => state.records.insert(student_id, previous),
                        None => state.records.remove(&student_id),
                    };
                    return Err(err);
                }
            },
            None => None,
        };

        Ok(Committed {
            record,
            value,
            movement,
        })
    }

    async fn summarize(&self, filter: MovementFilter) -> Result<CashSummary, TuitionError> {
        let state = self.state.lock().await;
        SummaryAggregator::summarize(state.ledger.movements(), &filter)
    }

    async fn list_movements(
        &self,
        movement_type: MovementType,
        filter: MovementFilter,
        page: PageRequest,
    ) -> Result<PageResponse<CashMovement>, TuitionError> {
        let state = self.state.lock().await;
        Ok(SummaryAggregator::page(
            state.ledger.movements(),
            movement_type,
            &filter,
            page,
        ))
    }
}
