//! Tuition service.
//!
//! Orchestrates schedule gating, payment registration, amount changes and
//! caja queries on top of a [`TuitionRepository`]. All record mutations go
//! through `transact`, so checks made here are repeated under the lock.

use std::sync::Arc;

use rust_decimal::Decimal;
use tracing::{debug, error, info, warn};

use campus_shared::types::{ClassroomId, PageRequest, PageResponse, StudentId, UserId};

use super::error::{ErrorClass, TuitionError};
use super::reconciliation::{Amendment, ReconciliationEngine};
use super::repository::{RecordAccess, TuitionRepository, WorkOutcome};
use super::schedule::ScheduleGate;
use super::summary::{CashSummary, MovementFilter};
use super::types::{
    AmountChangeCommand, AmountChangePreview, CashMovement, CommittedChange, MovementType,
    PaymentKind, PaymentRecord, RegisterInitialPayment, RegisterMonthlyPayment, Registration,
    Schedule, Weekday,
};

/// Tuition service for payments and the caja.
pub struct TuitionService<R: TuitionRepository> {
    repo: Arc<R>,
}

impl<R: TuitionRepository> TuitionService<R> {
    /// Create a new tuition service.
    #[must_use]
    pub fn new(repo: Arc<R>) -> Self {
        Self { repo }
    }

    /// Returns the underlying repository.
    #[must_use]
    pub fn repository(&self) -> &Arc<R> {
        &self.repo
    }

    /// Assigns attendance days, creating the record if needed.
    ///
    /// # Errors
    ///
    /// Returns `EmptySchedule` if `days` is empty.
    pub async fn assign_schedule(
        &self,
        student_id: StudentId,
        classroom_id: ClassroomId,
        days: Vec<Weekday>,
    ) -> Result<PaymentRecord, TuitionError> {
        let schedule = ScheduleGate::validate(days)?;

        let committed = self
            .repo
            .transact(
                student_id,
                RecordAccess::GetOrCreate(classroom_id),
                move |record| {
                    let changed = ScheduleGate::assign(record, classroom_id, schedule);
                    Ok(WorkOutcome::record_only(changed))
                },
            )
            .await
            .inspect_err(|e| log_failure("assign_schedule", student_id, e))?;

        info!(
            student_id = %student_id,
            schedule = %committed.record.schedule,
            changed = committed.value,
            "Schedule assigned"
        );
        Ok(committed.record)
    }

    /// Returns a student's record.
    ///
    /// # Errors
    ///
    /// Returns `StudentNotFound` if the student has no record.
    pub async fn student_record(&self, student_id: StudentId) -> Result<PaymentRecord, TuitionError> {
        self.repo
            .find_record(student_id)
            .await?
            .ok_or(TuitionError::StudentNotFound(student_id))
    }

    /// Returns the schedule, failing when the student is not scheduled.
    ///
    /// # Errors
    ///
    /// Returns `NeedsSchedule` for missing records or empty schedules.
    pub async fn require_schedule(&self, student_id: StudentId) -> Result<Schedule, TuitionError> {
        let record = self.repo.find_record(student_id).await?;
        ScheduleGate::require(student_id, record.as_ref()).cloned()
    }

    /// Registers the initial payment and posts it as income.
    ///
    /// # Errors
    ///
    /// Returns `PaymentAlreadyRegistered` if one exists, a validation error
    /// for a non-positive amount, and `LedgerInconsistency` if the income
    /// movement went missing.
    pub async fn register_initial_payment(
        &self,
        input: RegisterInitialPayment,
    ) -> Result<Registration, TuitionError> {
        let RegisterInitialPayment {
            student_id,
            classroom_id,
            details,
            recorded_by,
        } = input;
        let kind = PaymentKind::Initial;

        let committed = self
            .repo
            .transact(
                student_id,
                RecordAccess::GetOrCreate(classroom_id),
                move |record| {
                    let movement =
                        ReconciliationEngine::register(record, kind, details, false, recorded_by)?;
                    Ok(WorkOutcome::with_movement((), Some(movement)))
                },
            )
            .await
            .inspect_err(|e| log_failure("register_initial_payment", student_id, e))?;

        let movement = require_movement(student_id, kind, committed.movement)?;
        info!(
            student_id = %student_id,
            amount = %movement.amount,
            movement_id = %movement.id,
            recorded_by = %recorded_by,
            "Initial payment registered"
        );

        Ok(Registration {
            record: committed.record,
            movement,
        })
    }

    /// Registers the first payment of a period and posts it as income.
    ///
    /// # Errors
    ///
    /// Returns `NeedsSchedule` if the student is not scheduled,
    /// `PaymentAlreadyRegistered` if the period was paid, a validation error
    /// for a non-positive amount, and `LedgerInconsistency` if the income
    /// movement went missing.
    pub async fn register_monthly_payment(
        &self,
        input: RegisterMonthlyPayment,
    ) -> Result<Registration, TuitionError> {
        let RegisterMonthlyPayment {
            student_id,
            period,
            details,
            partial,
            recorded_by,
        } = input;
        let kind = PaymentKind::Monthly(period);

        self.require_schedule(student_id)
            .await
            .inspect_err(|e| log_failure("register_monthly_payment", student_id, e))?;

        let committed = self
            .repo
            .transact(student_id, RecordAccess::Existing, move |record| {
                let movement =
                    ReconciliationEngine::register(record, kind, details, partial, recorded_by)?;
                Ok(WorkOutcome::with_movement((), Some(movement)))
            })
            .await
            .inspect_err(|e| log_failure("register_monthly_payment", student_id, e))?;

        let movement = require_movement(student_id, kind, committed.movement)?;
        info!(
            student_id = %student_id,
            period = %period,
            amount = %movement.amount,
            partial,
            movement_id = %movement.id,
            recorded_by = %recorded_by,
            "Monthly payment registered"
        );

        Ok(Registration {
            record: committed.record,
            movement,
        })
    }

    /// Computes the effect of changing a stored amount. Read-only.
    ///
    /// # Errors
    ///
    /// Returns a validation error for a non-positive amount and
    /// `NeedsSchedule` for monthly payments of unscheduled students.
    pub async fn preview_amount_change(
        &self,
        student_id: StudentId,
        kind: PaymentKind,
        new_amount: Decimal,
    ) -> Result<AmountChangePreview, TuitionError> {
        let record = self.repo.find_record(student_id).await?;
        let preview = ReconciliationEngine::preview(student_id, record.as_ref(), kind, new_amount)?;

        debug!(
            student_id = %student_id,
            kind = %kind,
            delta = %preview.delta,
            requires_confirmation = preview.requires_confirmation,
            "Amount change previewed"
        );
        Ok(preview)
    }

    /// Overwrites a stored amount and posts the compensating movement.
    ///
    /// # Errors
    ///
    /// Returns `PaymentNotFound` if nothing was registered,
    /// `ConcurrentModification` if `expected_version` is stale,
    /// `NeedsSchedule` for unscheduled monthly changes, a validation error
    /// for a non-positive amount, and `LedgerInconsistency` if the record
    /// changed but its movement went missing.
    pub async fn commit_amount_change(
        &self,
        command: AmountChangeCommand,
    ) -> Result<CommittedChange, TuitionError> {
        let student_id = command.student_id;
        let kind = command.kind;
        let recorded_by = command.recorded_by;

        let committed = self
            .repo
            .transact(student_id, RecordAccess::Existing, move |record| {
                let Amendment {
                    previous_amount,
                    delta,
                    movement,
                } = ReconciliationEngine::amend(record, &command)?;
                Ok(WorkOutcome::with_movement((previous_amount, delta), movement))
            })
            .await
            .map_err(|e| match e {
                TuitionError::StudentNotFound(_) => TuitionError::PaymentNotFound { student_id, kind },
                other => other,
            })
            .inspect_err(|e| log_failure("commit_amount_change", student_id, e))?;

        let (previous_amount, delta) = committed.value;
        let movement = if delta.is_zero() {
            committed.movement
        } else {
            Some(require_movement(student_id, kind, committed.movement)?)
        };

        info!(
            student_id = %student_id,
            kind = %kind,
            previous_amount = %previous_amount,
            delta = %delta,
            movement_id = ?movement.as_ref().map(|m| m.id),
            recorded_by = %recorded_by,
            version = committed.record.version,
            "Amount change committed"
        );

        Ok(CommittedChange {
            record: committed.record,
            previous_amount,
            delta,
            movement,
        })
    }

    /// Totals the caja for one month, optionally for one actor.
    ///
    /// # Errors
    ///
    /// Returns `InvalidPeriod` for an out-of-range month or year.
    pub async fn get_summary(
        &self,
        month: u32,
        year: i32,
        recorded_by: Option<UserId>,
    ) -> Result<CashSummary, TuitionError> {
        let filter = MovementFilter::for_month(month, year, recorded_by)?;
        self.repo.summarize(filter).await
    }

    /// Lists income movements, most recent first.
    ///
    /// # Errors
    ///
    /// Returns an error if the repository fails.
    pub async fn list_income(
        &self,
        filter: MovementFilter,
        page: PageRequest,
    ) -> Result<PageResponse<CashMovement>, TuitionError> {
        self.repo
            .list_movements(MovementType::Income, filter, page.normalized())
            .await
    }

    /// Lists expense movements, most recent first.
    ///
    /// # Errors
    ///
    /// Returns an error if the repository fails.
    pub async fn list_expense(
        &self,
        filter: MovementFilter,
        page: PageRequest,
    ) -> Result<PageResponse<CashMovement>, TuitionError> {
        self.repo
            .list_movements(MovementType::Expense, filter, page.normalized())
            .await
    }
}

fn require_movement(
    student_id: StudentId,
    kind: PaymentKind,
    movement: Option<CashMovement>,
) -> Result<CashMovement, TuitionError> {
    movement.ok_or_else(|| {
        let err = TuitionError::LedgerInconsistency {
            student_id,
            kind,
            detail: "record committed without its cash movement".to_string(),
        };
        log_failure("reconcile", student_id, &err);
        err
    })
}

fn log_failure(operation: &str, student_id: StudentId, err: &TuitionError) {
    match err.class() {
        ErrorClass::Conflict => {
            warn!(operation, student_id = %student_id, error = %err, "Tuition conflict");
        }
        ErrorClass::LedgerInconsistency => {
            error!(
                operation,
                student_id = %student_id,
                error = %err,
                "Ledger inconsistency, manual reconciliation required"
            );
        }
        ErrorClass::Internal => {
            error!(operation, student_id = %student_id, error = %err, "Tuition operation failed");
        }
        ErrorClass::Validation | ErrorClass::NotFound => {
            debug!(operation, student_id = %student_id, error = %err, "Tuition request rejected");
        }
    }
}
