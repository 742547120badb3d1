//! Tuition domain types.
//!
//! This module defines the payment record a student owns (schedule, initial
//! payment, monthly payments) and the cash movements the ledger holds.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use campus_shared::types::{CashMovementId, ClassroomId, StudentId, UserId};

use super::error::TuitionError;

/// Earliest year accepted for a monthly payment period.
pub const MIN_PERIOD_YEAR: i32 = 2000;
/// Latest year accepted for a monthly payment period.
pub const MAX_PERIOD_YEAR: i32 = 2100;

/// Largest amount a payment or movement may carry (`NUMERIC(12, 2)`).
pub const MAX_AMOUNT: Decimal = Decimal::from_parts(0xD4A5_0FFF, 0xE8, 0, false, 2);

// ============================================================================
// Schedule (horario)
// ============================================================================

/// Day of the week a student attends.
///
/// Ordered Monday-first so schedules always render in calendar order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Weekday {
    /// Monday.
    Lunes,
    /// Tuesday.
    Martes,
    /// Wednesday.
    #[serde(alias = "Miércoles")]
    Miercoles,
    /// Thursday.
    Jueves,
    /// Friday.
    Viernes,
    /// Saturday.
    #[serde(alias = "Sábado")]
    Sabado,
    /// Sunday.
    Domingo,
}

impl Weekday {
    /// All weekdays in calendar order.
    pub const ALL: [Self; 7] = [
        Self::Lunes,
        Self::Martes,
        Self::Miercoles,
        Self::Jueves,
        Self::Viernes,
        Self::Sabado,
        Self::Domingo,
    ];

    /// Returns the stored (ASCII) name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Lunes => "Lunes",
            Self::Martes => "Martes",
            Self::Miercoles => "Miercoles",
            Self::Jueves => "Jueves",
            Self::Viernes => "Viernes",
            Self::Sabado => "Sabado",
            Self::Domingo => "Domingo",
        }
    }

    /// Returns the display label.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Miercoles => "Miércoles",
            Self::Sabado => "Sábado",
            other => other.as_str(),
        }
    }
}

impl fmt::Display for Weekday {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Weekday {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim().to_lowercase();
        Self::ALL
            .into_iter()
            .find(|day| day.as_str().to_lowercase() == needle || day.label().to_lowercase() == needle)
            .ok_or_else(|| format!("Unknown weekday: {s}"))
    }
}

/// Ordered set of attendance days.
///
/// An empty schedule means the student has not been scheduled yet.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Schedule(BTreeSet<Weekday>);

impl Schedule {
    /// Builds a schedule, collapsing duplicate days.
    #[must_use]
    pub fn from_days(days: impl IntoIterator<Item = Weekday>) -> Self {
        Self(days.into_iter().collect())
    }

    /// Returns true if no day is assigned.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of assigned days.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if the student attends on `day`.
    #[must_use]
    pub fn contains(&self, day: Weekday) -> bool {
        self.0.contains(&day)
    }

    /// Iterates the days in calendar order.
    pub fn days(&self) -> impl Iterator<Item = Weekday> + '_ {
        self.0.iter().copied()
    }
}

impl fmt::Display for Schedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let labels: Vec<&str> = self.days().map(Weekday::label).collect();
        f.write_str(&labels.join(" - "))
    }
}

// ============================================================================
// Payments
// ============================================================================

/// How a payment was made.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentMethod {
    /// Cash.
    #[serde(alias = "Efectivo")]
    Efectivo,
    /// Yape mobile wallet.
    #[serde(alias = "Yape")]
    Yape,
    /// Plin mobile wallet.
    #[serde(alias = "Plin")]
    Plin,
    /// Bank transfer.
    #[serde(alias = "Transferencia")]
    Transferencia,
    /// Bank deposit.
    #[serde(alias = "Depósito", alias = "Deposito")]
    Deposito,
    /// Card.
    #[serde(alias = "Tarjeta")]
    Tarjeta,
}

impl PaymentMethod {
    /// All methods, in the order the front office lists them.
    pub const ALL: [Self; 6] = [
        Self::Efectivo,
        Self::Yape,
        Self::Plin,
        Self::Transferencia,
        Self::Deposito,
        Self::Tarjeta,
    ];

    /// Returns the wire/storage code.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Efectivo => "EFECTIVO",
            Self::Yape => "YAPE",
            Self::Plin => "PLIN",
            Self::Transferencia => "TRANSFERENCIA",
            Self::Deposito => "DEPOSITO",
            Self::Tarjeta => "TARJETA",
        }
    }

    /// Returns the display label.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Efectivo => "Efectivo",
            Self::Yape => "Yape",
            Self::Plin => "Plin",
            Self::Transferencia => "Transferencia",
            Self::Deposito => "Depósito",
            Self::Tarjeta => "Tarjeta",
        }
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for PaymentMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim().to_lowercase();
        Self::ALL
            .into_iter()
            .find(|m| m.as_str().to_lowercase() == needle || m.label().to_lowercase() == needle)
            .ok_or_else(|| format!("Unknown payment method: {s}"))
    }
}

/// A calendar month a tuition payment covers.
///
/// Ordered chronologically (year first).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawPeriod")]
pub struct Period {
    year: i32,
    month: u32,
}

#[derive(Deserialize)]
struct RawPeriod {
    month: u32,
    year: i32,
}

impl TryFrom<RawPeriod> for Period {
    type Error = TuitionError;

    fn try_from(raw: RawPeriod) -> Result<Self, Self::Error> {
        Self::new(raw.month, raw.year)
    }
}

impl Period {
    /// Creates a period.
    ///
    /// # Errors
    ///
    /// Returns `TuitionError::InvalidPeriod` if the month is outside 1..=12
    /// or the year is outside the supported range.
    pub fn new(month: u32, year: i32) -> Result<Self, TuitionError> {
        if !(1..=12).contains(&month) || !(MIN_PERIOD_YEAR..=MAX_PERIOD_YEAR).contains(&year) {
            return Err(TuitionError::InvalidPeriod { month, year });
        }
        Ok(Self { year, month })
    }

    /// Month number (1-12).
    #[must_use]
    pub const fn month(&self) -> u32 {
        self.month
    }

    /// Calendar year.
    #[must_use]
    pub const fn year(&self) -> i32 {
        self.year
    }

    /// First day of the month.
    #[must_use]
    pub fn first_day(&self) -> NaiveDate {
        NaiveDate::from_ymd_opt(self.year, self.month, 1).unwrap_or(NaiveDate::MIN)
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}/{}", self.month, self.year)
    }
}

/// Which stored amount an operation targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentKind {
    /// The initial enrollment payment.
    Initial,
    /// The monthly tuition (pensión) for a period.
    Monthly(Period),
}

impl PaymentKind {
    /// Returns the period for monthly payments.
    #[must_use]
    pub const fn period(&self) -> Option<Period> {
        match self {
            Self::Initial => None,
            Self::Monthly(period) => Some(*period),
        }
    }

    /// Capitalized label used as the subject of ledger concepts.
    #[must_use]
    pub fn title(&self) -> String {
        match self {
            Self::Initial => "Pago inicial".to_string(),
            Self::Monthly(period) => format!("Pensión {period}"),
        }
    }
}

impl fmt::Display for PaymentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Initial => f.write_str("pago inicial"),
            Self::Monthly(period) => write!(f, "pensión {period}"),
        }
    }
}

/// Amount, date and method submitted for a payment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentDetails {
    /// Amount paid.
    pub amount: Decimal,
    /// Date the money was received.
    pub payment_date: NaiveDate,
    /// How it was paid.
    pub method: PaymentMethod,
}

/// The initial enrollment payment of a student.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitialPayment {
    /// Amount paid.
    pub amount: Decimal,
    /// Date the money was received.
    pub payment_date: NaiveDate,
    /// How it was paid.
    pub method: PaymentMethod,
}

/// A monthly tuition payment. At most one exists per student and period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthlyPayment {
    /// Month covered.
    pub period: Period,
    /// Amount paid.
    pub amount: Decimal,
    /// Date the money was received.
    pub payment_date: NaiveDate,
    /// How it was paid.
    pub method: PaymentMethod,
    /// Whether this only partially covers the month.
    pub partial: bool,
}

/// Everything the system stores about a student's tuition.
///
/// The read/write methods are the record-level store operations; writes
/// return the amount they superseded so callers can compute deltas.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentRecord {
    /// Owning student.
    pub student_id: StudentId,
    /// Classroom the student is enrolled in.
    pub classroom_id: ClassroomId,
    /// Assigned attendance days (empty until scheduled).
    pub schedule: Schedule,
    /// Initial enrollment payment, once registered.
    pub initial_payment: Option<InitialPayment>,
    /// Monthly payments keyed by period.
    pub monthly_payments: BTreeMap<Period, MonthlyPayment>,
    /// Incremented on every committed write.
    pub version: i64,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last write timestamp.
    pub updated_at: DateTime<Utc>,
}

impl PaymentRecord {
    /// Creates an empty, unscheduled record.
    #[must_use]
    pub fn new(student_id: StudentId, classroom_id: ClassroomId, now: DateTime<Utc>) -> Self {
        Self {
            student_id,
            classroom_id,
            schedule: Schedule::default(),
            initial_payment: None,
            monthly_payments: BTreeMap::new(),
            version: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Returns the stored initial payment amount.
    #[must_use]
    pub fn read_initial_payment(&self) -> Option<Decimal> {
        self.initial_payment.map(|p| p.amount)
    }

    /// Overwrites the initial payment, returning the previous amount.
    pub fn write_initial_payment(&mut self, details: PaymentDetails) -> Option<Decimal> {
        let previous = self.read_initial_payment();
        self.initial_payment = Some(InitialPayment {
            amount: details.amount,
            payment_date: details.payment_date,
            method: details.method,
        });
        previous
    }

    /// Returns the stored amount for a period.
    #[must_use]
    pub fn read_monthly_payment(&self, period: Period) -> Option<Decimal> {
        self.monthly_payments.get(&period).map(|p| p.amount)
    }

    /// Overwrites the payment for a period, returning the previous amount.
    ///
    /// `partial = None` keeps the stored flag (false for a new payment).
    pub fn write_monthly_payment(
        &mut self,
        period: Period,
        details: PaymentDetails,
        partial: Option<bool>,
    ) -> Option<Decimal> {
        let existing = self.monthly_payments.get(&period).copied();
        let partial = partial.unwrap_or_else(|| existing.is_some_and(|p| p.partial));
        self.monthly_payments.insert(
            period,
            MonthlyPayment {
                period,
                amount: details.amount,
                payment_date: details.payment_date,
                method: details.method,
                partial,
            },
        );
        existing.map(|p| p.amount)
    }

    /// Returns the stored amount for any kind.
    #[must_use]
    pub fn read_amount(&self, kind: PaymentKind) -> Option<Decimal> {
        match kind {
            PaymentKind::Initial => self.read_initial_payment(),
            PaymentKind::Monthly(period) => self.read_monthly_payment(period),
        }
    }

    /// Overwrites the amount for any kind, returning the previous amount.
    pub fn write_amount(&mut self, kind: PaymentKind, details: PaymentDetails) -> Option<Decimal> {
        match kind {
            PaymentKind::Initial => self.write_initial_payment(details),
            PaymentKind::Monthly(period) => self.write_monthly_payment(period, details, None),
        }
    }
}

// ============================================================================
// Cash ledger (caja)
// ============================================================================

/// Direction of a cash movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MovementType {
    /// Money in.
    #[serde(rename = "INGRESO")]
    Income,
    /// Money out.
    #[serde(rename = "EGRESO")]
    Expense,
}

impl MovementType {
    /// Returns the wire/storage code.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Income => "INGRESO",
            Self::Expense => "EGRESO",
        }
    }

    /// Applies the direction to a positive amount.
    #[must_use]
    pub fn signed(self, amount: Decimal) -> Decimal {
        match self {
            Self::Income => amount,
            Self::Expense => -amount,
        }
    }
}

/// Ledger category of a movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MovementCategory {
    /// Tuition income.
    PensionMensual,
    /// Administrative adjustment (refunds and reductions).
    GastosAdministrativos,
}

impl MovementCategory {
    /// Returns the wire/storage code.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::PensionMensual => "PENSION_MENSUAL",
            Self::GastosAdministrativos => "GASTOS_ADMINISTRATIVOS",
        }
    }
}

/// Student and payment a reconciliation movement came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MovementSource {
    /// Student whose record changed.
    pub student_id: StudentId,
    /// Which amount changed.
    #[serde(flatten)]
    pub kind: PaymentKind,
}

/// A movement about to be appended to the ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewCashMovement {
    /// Income or expense.
    pub movement_type: MovementType,
    /// Positive amount.
    pub amount: Decimal,
    /// Short concept line.
    pub concept: String,
    /// Longer description with before/after amounts.
    pub description: String,
    /// Ledger category.
    pub category: MovementCategory,
    /// Payment method.
    pub method: PaymentMethod,
    /// Actor who recorded it.
    pub recorded_by: UserId,
    /// Originating student and payment, if any.
    pub source: Option<MovementSource>,
}

/// An immutable ledger entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CashMovement {
    /// Movement ID.
    pub id: CashMovementId,
    /// Income or expense.
    #[serde(rename = "type")]
    pub movement_type: MovementType,
    /// Positive amount.
    pub amount: Decimal,
    /// Short concept line.
    pub concept: String,
    /// Longer description.
    pub description: String,
    /// Ledger category.
    pub category: MovementCategory,
    /// Payment method.
    pub method: PaymentMethod,
    /// Actor who recorded it.
    pub recorded_by: UserId,
    /// Originating student and payment, if any.
    pub source: Option<MovementSource>,
    /// When it was recorded.
    pub recorded_at: DateTime<Utc>,
}

impl CashMovement {
    /// Materializes a new movement.
    #[must_use]
    pub fn from_new(id: CashMovementId, new: NewCashMovement, recorded_at: DateTime<Utc>) -> Self {
        Self {
            id,
            movement_type: new.movement_type,
            amount: new.amount,
            concept: new.concept,
            description: new.description,
            category: new.category,
            method: new.method,
            recorded_by: new.recorded_by,
            source: new.source,
            recorded_at,
        }
    }

    /// Amount with the direction applied.
    #[must_use]
    pub fn signed_amount(&self) -> Decimal {
        self.movement_type.signed(self.amount)
    }
}

// ============================================================================
// Operation inputs and results
// ============================================================================

/// Input for registering a student's first initial payment.
#[derive(Debug, Clone)]
pub struct RegisterInitialPayment {
    /// Student paying.
    pub student_id: StudentId,
    /// Classroom, used if the record does not exist yet.
    pub classroom_id: ClassroomId,
    /// What was paid.
    pub details: PaymentDetails,
    /// Actor recording the payment.
    pub recorded_by: UserId,
}

/// Input for registering the first payment of a period.
#[derive(Debug, Clone)]
pub struct RegisterMonthlyPayment {
    /// Student paying.
    pub student_id: StudentId,
    /// Month covered.
    pub period: Period,
    /// What was paid.
    pub details: PaymentDetails,
    /// Whether it only partially covers the month.
    pub partial: bool,
    /// Actor recording the payment.
    pub recorded_by: UserId,
}

/// Input for amending a stored amount.
#[derive(Debug, Clone)]
pub struct AmountChangeCommand {
    /// Student whose record changes.
    pub student_id: StudentId,
    /// Which amount changes.
    pub kind: PaymentKind,
    /// New amount, date and method.
    pub details: PaymentDetails,
    /// Actor recording the change.
    pub recorded_by: UserId,
    /// Record version the caller previewed against, if it wants the check.
    pub expected_version: Option<i64>,
}

/// Result of previewing an amount change. Never has side effects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AmountChangePreview {
    /// Currently stored amount.
    pub previous_amount: Option<Decimal>,
    /// Submitted amount.
    pub new_amount: Decimal,
    /// `new_amount - previous_amount` (previous counts as zero when absent).
    pub delta: Decimal,
    /// Movement a commit would post; absent when the delta is zero.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub movement_type: Option<MovementType>,
    /// Version of the record the preview was computed against.
    pub record_version: Option<i64>,
    /// True when a stored value exists and would change.
    pub requires_confirmation: bool,
}

/// Result of a first-time registration.
#[derive(Debug, Clone)]
pub struct Registration {
    /// Record after the write.
    pub record: PaymentRecord,
    /// The income movement posted.
    pub movement: CashMovement,
}

/// Result of committing an amount change.
#[derive(Debug, Clone)]
pub struct CommittedChange {
    /// Record after the write.
    pub record: PaymentRecord,
    /// Amount that was superseded.
    pub previous_amount: Decimal,
    /// `new - previous`.
    pub delta: Decimal,
    /// Compensating movement; `None` when the delta was zero.
    pub movement: Option<CashMovement>,
}
