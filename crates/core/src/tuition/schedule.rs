//! Schedule gating.
//!
//! A student must have at least one attendance day before monthly payments
//! can be registered or amended.

use campus_shared::types::{ClassroomId, StudentId};

use super::error::TuitionError;
use super::types::{PaymentRecord, Schedule, Weekday};

/// Whether a student can take monthly payments yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduleState {
    /// No record, or a record with no days.
    Unscheduled,
    /// At least one day assigned.
    Scheduled,
}

impl ScheduleState {
    /// Derives the state of a (possibly missing) record.
    #[must_use]
    pub fn of(record: Option<&PaymentRecord>) -> Self {
        match record {
            Some(record) if !record.schedule.is_empty() => Self::Scheduled,
            _ => Self::Unscheduled,
        }
    }

    /// Returns true if monthly payments are allowed.
    #[must_use]
    pub const fn allows_monthly_payments(self) -> bool {
        matches!(self, Self::Scheduled)
    }
}

/// Stateless schedule rules.
pub struct ScheduleGate;

impl ScheduleGate {
    /// Validates submitted days into a schedule.
    ///
    /// # Errors
    ///
    /// Returns `TuitionError::EmptySchedule` if no day was given.
    pub fn validate(days: impl IntoIterator<Item = Weekday>) -> Result<Schedule, TuitionError> {
        let schedule = Schedule::from_days(days);
        if schedule.is_empty() {
            return Err(TuitionError::EmptySchedule);
        }
        Ok(schedule)
    }

    /// Replaces the schedule and classroom of a record.
    ///
    /// Returns true if anything changed; assigning the same schedule twice
    /// is a no-op.
    pub fn assign(record: &mut PaymentRecord, classroom_id: ClassroomId, schedule: Schedule) -> bool {
        let changed = record.schedule != schedule || record.classroom_id != classroom_id;
        record.schedule = schedule;
        record.classroom_id = classroom_id;
        changed
    }

    /// Returns the schedule, or `NeedsSchedule` if the student has none.
    ///
    /// # Errors
    ///
    /// Returns `TuitionError::NeedsSchedule` for a missing record or an
    /// empty schedule.
    pub fn require(
        student_id: StudentId,
        record: Option<&PaymentRecord>,
    ) -> Result<&Schedule, TuitionError> {
        match record {
            Some(record) if ScheduleState::of(Some(record)).allows_monthly_payments() => {
                Ok(&record.schedule)
            }
            _ => Err(TuitionError::NeedsSchedule(student_id)),
        }
    }
}
