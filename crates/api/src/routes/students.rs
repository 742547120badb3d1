//! Payment record routes: schedules, registrations and amount changes.

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post, put},
};
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{AppState, error::ApiError, middleware::AuthUser};
use campus_core::tuition::{
    AmountChangeCommand, AmountChangePreview, CashMovement, CommittedChange, InitialPayment,
    MonthlyPayment, PaymentDetails, PaymentKind, PaymentMethod, PaymentRecord, Period,
    RegisterInitialPayment, RegisterMonthlyPayment, Registration, TuitionError, Weekday,
};
use campus_shared::types::{ClassroomId, StudentId};

/// Creates the student payment routes (requires auth middleware to be applied externally).
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/students/{id}/payment-record", get(get_payment_record))
        .route("/students/{id}/schedule", put(assign_schedule))
        .route("/students/{id}/initial-payment", post(register_initial_payment))
        .route("/students/{id}/monthly-payments", post(register_monthly_payment))
        .route(
            "/students/{id}/amount-changes/preview",
            post(preview_amount_change),
        )
        .route("/students/{id}/amount-changes", post(commit_amount_change))
}

// ============================================================================
// Request/Response Types
// ============================================================================

/// Request body for assigning a schedule.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignScheduleRequest {
    /// Classroom the student attends.
    pub classroom_id: Uuid,
    /// Attendance days; at least one.
    pub days: Vec<Weekday>,
}

/// Request body for the initial payment.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitialPaymentRequest {
    /// Classroom the student is enrolled in.
    pub classroom_id: Uuid,
    /// Amount paid.
    pub amount: Decimal,
    /// Date of payment.
    pub payment_date: NaiveDate,
    /// Payment method.
    pub method: PaymentMethod,
}

/// Request body for a monthly payment.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthlyPaymentRequest {
    /// Month covered (1-12).
    pub month: u32,
    /// Year covered.
    pub year: i32,
    /// Amount paid.
    pub amount: Decimal,
    /// Date of payment.
    pub payment_date: NaiveDate,
    /// Payment method.
    pub method: PaymentMethod,
    /// Whether it only partially covers the month.
    #[serde(default)]
    pub partial: bool,
}

/// Which stored amount a change targets.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AmountKind {
    /// The initial payment.
    Initial,
    /// A monthly payment; needs `month` and `year`.
    Monthly,
}

/// Request body for previewing an amount change.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviewRequest {
    /// Target amount.
    pub kind: AmountKind,
    /// Month, for monthly payments.
    pub month: Option<u32>,
    /// Year, for monthly payments.
    pub year: Option<i32>,
    /// Proposed amount.
    pub new_amount: Decimal,
}

/// Request body for committing an amount change.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommitRequest {
    /// Target amount.
    pub kind: AmountKind,
    /// Month, for monthly payments.
    pub month: Option<u32>,
    /// Year, for monthly payments.
    pub year: Option<i32>,
    /// New amount.
    pub new_amount: Decimal,
    /// Date of payment.
    pub payment_date: NaiveDate,
    /// Payment method.
    pub method: PaymentMethod,
    /// `recordVersion` from the preview the user confirmed.
    pub expected_version: Option<i64>,
}

/// A student's payment record.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRecordResponse {
    /// Student ID.
    pub student_id: StudentId,
    /// Classroom ID.
    pub classroom_id: ClassroomId,
    /// Attendance days in calendar order.
    pub schedule: Vec<Weekday>,
    /// Schedule for display, e.g. `Lunes - Miércoles`.
    pub schedule_label: String,
    /// Initial payment, once registered.
    pub initial_payment: Option<InitialPayment>,
    /// Monthly payments, oldest period first.
    pub monthly_payments: Vec<MonthlyPayment>,
    /// Version to send back as `expectedVersion`.
    pub version: i64,
    /// Created at timestamp.
    pub created_at: DateTime<Utc>,
    /// Updated at timestamp.
    pub updated_at: DateTime<Utc>,
}

impl From<PaymentRecord> for PaymentRecordResponse {
    fn from(record: PaymentRecord) -> Self {
        Self {
            student_id: record.student_id,
            classroom_id: record.classroom_id,
            schedule: record.schedule.days().collect(),
            schedule_label: record.schedule.to_string(),
            initial_payment: record.initial_payment,
            monthly_payments: record.monthly_payments.into_values().collect(),
            version: record.version,
            created_at: record.created_at,
            updated_at: record.updated_at,
        }
    }
}

/// A registration and the income it posted.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationResponse {
    /// Record after the write.
    pub record: PaymentRecordResponse,
    /// Income movement.
    pub movement: CashMovement,
}

impl From<Registration> for RegistrationResponse {
    fn from(registration: Registration) -> Self {
        Self {
            record: registration.record.into(),
            movement: registration.movement,
        }
    }
}

/// A committed amount change.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommittedChangeResponse {
    /// Record after the write.
    pub record: PaymentRecordResponse,
    /// Superseded amount.
    pub previous_amount: Decimal,
    /// Applied difference.
    pub delta: Decimal,
    /// Compensating movement, absent when nothing changed.
    pub movement: Option<CashMovement>,
}

impl From<CommittedChange> for CommittedChangeResponse {
    fn from(change: CommittedChange) -> Self {
        Self {
            record: change.record.into(),
            previous_amount: change.previous_amount,
            delta: change.delta,
            movement: change.movement,
        }
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Resolves the request's kind fields into a payment kind.
fn payment_kind(
    kind: AmountKind,
    month: Option<u32>,
    year: Option<i32>,
) -> Result<PaymentKind, TuitionError> {
    match kind {
        AmountKind::Initial => Ok(PaymentKind::Initial),
        AmountKind::Monthly => {
            let period = Period::new(month.unwrap_or(0), year.unwrap_or(0))?;
            Ok(PaymentKind::Monthly(period))
        }
    }
}

// ============================================================================
// Route Handlers
// ============================================================================

/// GET `/students/{id}/payment-record`
async fn get_payment_record(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<PaymentRecordResponse>, ApiError> {
    let record = state
        .tuition
        .student_record(StudentId::from_uuid(id))
        .await?;
    Ok(Json(record.into()))
}

/// PUT `/students/{id}/schedule`
async fn assign_schedule(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<AssignScheduleRequest>,
) -> Result<Json<PaymentRecordResponse>, ApiError> {
    let record = state
        .tuition
        .assign_schedule(
            StudentId::from_uuid(id),
            ClassroomId::from_uuid(payload.classroom_id),
            payload.days,
        )
        .await?;
    Ok(Json(record.into()))
}

/// POST `/students/{id}/initial-payment`
async fn register_initial_payment(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<InitialPaymentRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let registration = state
        .tuition
        .register_initial_payment(RegisterInitialPayment {
            student_id: StudentId::from_uuid(id),
            classroom_id: ClassroomId::from_uuid(payload.classroom_id),
            details: PaymentDetails {
                amount: payload.amount,
                payment_date: payload.payment_date,
                method: payload.method,
            },
            recorded_by: auth.user_id(),
        })
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(RegistrationResponse::from(registration)),
    ))
}

/// POST `/students/{id}/monthly-payments`
async fn register_monthly_payment(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<MonthlyPaymentRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let period = Period::new(payload.month, payload.year)?;
    let registration = state
        .tuition
        .register_monthly_payment(RegisterMonthlyPayment {
            student_id: StudentId::from_uuid(id),
            period,
            details: PaymentDetails {
                amount: payload.amount,
                payment_date: payload.payment_date,
                method: payload.method,
            },
            partial: payload.partial,
            recorded_by: auth.user_id(),
        })
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(RegistrationResponse::from(registration)),
    ))
}

/// POST `/students/{id}/amount-changes/preview`
///
/// Read-only; the UI shows the result and asks for confirmation.
async fn preview_amount_change(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<PreviewRequest>,
) -> Result<Json<AmountChangePreview>, ApiError> {
    let kind = payment_kind(payload.kind, payload.month, payload.year)?;
    let preview = state
        .tuition
        .preview_amount_change(StudentId::from_uuid(id), kind, payload.new_amount)
        .await?;
    Ok(Json(preview))
}

/// POST `/students/{id}/amount-changes`
async fn commit_amount_change(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<CommitRequest>,
) -> Result<Json<CommittedChangeResponse>, ApiError> {
    let kind = payment_kind(payload.kind, payload.month, payload.year)?;
    let change = state
        .tuition
        .commit_amount_change(AmountChangeCommand {
            student_id: StudentId::from_uuid(id),
            kind,
            details: PaymentDetails {
                amount: payload.new_amount,
                payment_date: payload.payment_date,
                method: payload.method,
            },
            recorded_by: auth.user_id(),
            expected_version: payload.expected_version,
        })
        .await?;
    Ok(Json(change.into()))
}
