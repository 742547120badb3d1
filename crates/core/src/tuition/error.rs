//! Tuition error types.
//!
//! Every failure of a tuition or caja operation maps to one of five classes
//! (see [`ErrorClass`]); the class decides the HTTP status and whether the
//! caller may retry after re-previewing.

use rust_decimal::Decimal;
use thiserror::Error;

use campus_shared::types::StudentId;

use super::types::PaymentKind;

/// Errors that can occur during tuition and caja operations.
#[derive(Debug, Error)]
pub enum TuitionError {
    // ========== Validation Errors ==========
    /// A schedule needs at least one day.
    #[error("Schedule must include at least one weekday")]
    EmptySchedule,

    /// Amounts must be strictly positive.
    #[error("Amount must be greater than zero, got {0}")]
    NonPositiveAmount(Decimal),

    /// Amounts must fit the ledger's `NUMERIC(12, 2)` columns.
    #[error("Amount must not exceed {max}, got {amount}")]
    AmountTooLarge {
        /// Amount submitted.
        amount: Decimal,
        /// Largest accepted amount.
        max: Decimal,
    },

    /// Month or year out of range.
    #[error("Invalid period: month {month}, year {year}")]
    InvalidPeriod {
        /// Month submitted.
        month: u32,
        /// Year submitted.
        year: i32,
    },

    /// Summary or listing filter is malformed.
    #[error("Invalid filter: {0}")]
    InvalidFilter(String),

    // ========== Not Found Errors ==========
    /// Monthly payments require an assigned schedule.
    #[error("Student {0} has no assigned schedule; assign one before registering monthly payments")]
    NeedsSchedule(StudentId),

    /// No payment record exists for the student.
    #[error("Student not found: {0}")]
    StudentNotFound(StudentId),

    /// The amount being amended was never registered.
    #[error("No {kind} registered for student {student_id}")]
    PaymentNotFound {
        /// Student ID.
        student_id: StudentId,
        /// Amount that was targeted.
        kind: PaymentKind,
    },

    // ========== Conflict Errors ==========
    /// The record changed between preview and commit.
    #[error("Payment record of student {student_id} changed (expected version {expected}, found {actual}); preview again")]
    ConcurrentModification {
        /// Student ID.
        student_id: StudentId,
        /// Version the caller previewed.
        expected: i64,
        /// Version found under the lock.
        actual: i64,
    },

    /// A first-time registration targeted an amount that already exists.
    #[error("{kind} is already registered for student {student_id}; use an amount change instead")]
    PaymentAlreadyRegistered {
        /// Student ID.
        student_id: StudentId,
        /// Amount that already exists.
        kind: PaymentKind,
    },

    // ========== Critical Errors ==========
    /// Record and ledger diverged and could not be restored.
    #[error("Ledger inconsistency for student {student_id} ({kind}): {detail}")]
    LedgerInconsistency {
        /// Student ID.
        student_id: StudentId,
        /// Amount whose movement is missing.
        kind: PaymentKind,
        /// What went wrong.
        detail: String,
    },

    // ========== Infrastructure Errors ==========
    /// Storage failure (nothing was committed).
    #[error("Repository error: {0}")]
    Repository(String),

    /// Internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Coarse classification of a [`TuitionError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Bad input.
    Validation,
    /// Missing precondition.
    NotFound,
    /// Lost a race or duplicated a registration.
    Conflict,
    /// Critical, requires manual reconciliation.
    LedgerInconsistency,
    /// Infrastructure failure.
    Internal,
}

impl TuitionError {
    /// Returns the error class.
    #[must_use]
    pub const fn class(&self) -> ErrorClass {
        match self {
            Self::EmptySchedule
            | Self::NonPositiveAmount(_)
            | Self::AmountTooLarge { .. }
            | Self::InvalidPeriod { .. }
            | Self::InvalidFilter(_) => ErrorClass::Validation,
            Self::NeedsSchedule(_) | Self::StudentNotFound(_) | Self::PaymentNotFound { .. } => {
                ErrorClass::NotFound
            }
            Self::ConcurrentModification { .. } | Self::PaymentAlreadyRegistered { .. } => {
                ErrorClass::Conflict
            }
            Self::LedgerInconsistency { .. } => ErrorClass::LedgerInconsistency,
            Self::Repository(_) | Self::Internal(_) => ErrorClass::Internal,
        }
    }

    /// Returns the error code for API responses.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::EmptySchedule => "EMPTY_SCHEDULE",
            Self::NonPositiveAmount(_) => "NON_POSITIVE_AMOUNT",
            Self::AmountTooLarge { .. } => "AMOUNT_TOO_LARGE",
            Self::InvalidPeriod { .. } => "INVALID_PERIOD",
            Self::InvalidFilter(_) => "INVALID_FILTER",
            Self::NeedsSchedule(_) => "NEEDS_SCHEDULE",
            Self::StudentNotFound(_) => "STUDENT_NOT_FOUND",
            Self::PaymentNotFound { .. } => "PAYMENT_NOT_FOUND",
            Self::ConcurrentModification { .. } => "CONCURRENT_MODIFICATION",
            Self::PaymentAlreadyRegistered { .. } => "PAYMENT_ALREADY_REGISTERED",
            Self::LedgerInconsistency { .. } => "LEDGER_INCONSISTENCY",
            Self::Repository(_) => "REPOSITORY_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Returns the HTTP status code for this error.
    #[must_use]
    pub const fn http_status_code(&self) -> u16 {
        match self.class() {
            ErrorClass::Validation => 400,
            ErrorClass::NotFound => 404,
            ErrorClass::Conflict => 409,
            ErrorClass::LedgerInconsistency | ErrorClass::Internal => 500,
        }
    }

    /// Returns true if re-previewing and retrying may succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::ConcurrentModification { .. })
    }
}
