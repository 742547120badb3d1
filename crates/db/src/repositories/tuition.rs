//! `PostgreSQL` tuition repository.
//!
//! Each `transact` runs in one database transaction: the payment record row
//! is locked with `SELECT ... FOR UPDATE`, the unit of work runs, and the
//! record write and its cash movement are committed together. Any early
//! return drops the transaction, which rolls it back.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{SubsecRound, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DatabaseTransaction, DbErr,
    EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Select, Set,
    TransactionTrait, sea_query::OnConflict,
};
use tracing::debug;
use uuid::Uuid;

use campus_core::tuition::{
    CashMovement, CashSummary, Clock, Committed, InitialPayment, MonthlyPayment, MovementFilter,
    MovementSource, MovementType, NewCashMovement, PaymentKind, PaymentRecord, Period,
    RecordAccess, Schedule, SystemClock, TuitionError, TuitionRepository, WorkOutcome,
};
use campus_shared::types::{CashMovementId, ClassroomId, PageRequest, PageResponse, StudentId, UserId};

use crate::entities::{
    cash_movements, monthly_payments, payment_records, sea_orm_active_enums as db_enums,
};

/// Tuition repository backed by `PostgreSQL`.
#[derive(Debug, Clone)]
pub struct PgTuitionRepository {
    db: DatabaseConnection,
    clock: Arc<dyn Clock>,
}

impl PgTuitionRepository {
    /// Creates a new tuition repository on the wall clock.
    #[must_use]
    pub fn new(db: DatabaseConnection) -> Self {
        Self::with_clock(db, Arc::new(SystemClock))
    }

    /// Creates a repository that stamps writes with `clock`.
    #[must_use]
    pub fn with_clock(db: DatabaseConnection, clock: Arc<dyn Clock>) -> Self {
        Self { db, clock }
    }

    /// Returns every movement recorded for a student, oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn movements_for_student(
        &self,
        student_id: StudentId,
    ) -> Result<Vec<CashMovement>, TuitionError> {
        cash_movements::Entity::find()
            .filter(cash_movements::Column::StudentId.eq(student_id.into_inner()))
            .order_by_asc(cash_movements::Column::RecordedAt)
            .order_by_asc(cash_movements::Column::Id)
            .all(&self.db)
            .await
            .map_err(db_err)?
            .into_iter()
            .map(movement_from_row)
            .collect()
    }

    async fn totals(
        &self,
        movement_type: MovementType,
        filter: &MovementFilter,
    ) -> Result<(Decimal, u64), TuitionError> {
        let (total, count): (Option<Decimal>, i64) = apply_filter(
            cash_movements::Entity::find()
                .filter(cash_movements::Column::MovementType.eq(db_enums::MovementType::from(movement_type))),
            filter,
        )
        .select_only()
        .column_as(cash_movements::Column::Amount.sum(), "total")
        .column_as(cash_movements::Column::Id.count(), "count")
        .into_tuple()
        .one(&self.db)
        .await
        .map_err(db_err)?
        .unwrap_or((None, 0));

        Ok((
            total.unwrap_or(Decimal::ZERO),
            u64::try_from(count).unwrap_or_default(),
        ))
    }
}

impl TuitionRepository for PgTuitionRepository {
    async fn find_record(&self, student_id: StudentId) -> Result<Option<PaymentRecord>, TuitionError> {
        let Some(row) = payment_records::Entity::find_by_id(student_id.into_inner())
            .one(&self.db)
            .await
            .map_err(db_err)?
        else {
            return Ok(None);
        };
        load_record(&self.db, row).await.map(Some)
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
        let txn = self.db.begin().await.map_err(db_err)?;
        let now = self.clock.now().trunc_subsecs(6);
        let id = student_id.into_inner();

        if let RecordAccess::GetOrCreate(classroom_id) = access {
            let empty = payment_records::ActiveModel {
                student_id: Set(id),
                classroom_id: Set(classroom_id.into_inner()),
                schedule: Set(serde_json::json!([])),
                initial_amount: Set(None),
                initial_payment_date: Set(None),
                initial_method: Set(None),
                version: Set(0),
                created_at: Set(now.into()),
                updated_at: Set(now.into()),
            };
            payment_records::Entity::insert(empty)
                .on_conflict(
                    OnConflict::column(payment_records::Column::StudentId)
                        .do_nothing()
                        .to_owned(),
                )
                .exec_without_returning(&txn)
                .await
                .map_err(db_err)?;
        }

        let row = payment_records::Entity::find_by_id(id)
            .lock_exclusive()
            .one(&txn)
            .await
            .map_err(db_err)?
            .ok_or(TuitionError::StudentNotFound(student_id))?;
        let before = load_record(&txn, row).await?;

        let mut record = before.clone();
        let WorkOutcome { value, movement } = work(&mut record)?;
        record.version = before.version + 1;
        record.updated_at = now;
        write_record(&txn, &before, &record).await?;

        let movement = match movement {
            Some(new) => Some(insert_movement(&txn, new, now).await?),
            None => None,
        };

        txn.commit().await.map_err(db_err)?;
        debug!(
            student_id = %student_id,
            version = record.version,
            movement_id = ?movement.as_ref().map(|m| m.id),
            "Payment record committed"
        );

        Ok(Committed {
            record,
            value,
            movement,
        })
    }

    async fn summarize(&self, filter: MovementFilter) -> Result<CashSummary, TuitionError> {
        let (income, income_count) = self.totals(MovementType::Income, &filter).await?;
        let (expense, expense_count) = self.totals(MovementType::Expense, &filter).await?;
        Ok(CashSummary::from_totals(
            income,
            income_count,
            expense,
            expense_count,
        ))
    }

    async fn list_movements(
        &self,
        movement_type: MovementType,
        filter: MovementFilter,
        page: PageRequest,
    ) -> Result<PageResponse<CashMovement>, TuitionError> {
        let page = page.normalized();
        let query = apply_filter(
            cash_movements::Entity::find()
                .filter(cash_movements::Column::MovementType.eq(db_enums::MovementType::from(movement_type))),
            &filter,
        );

        let total = query.clone().count(&self.db).await.map_err(db_err)?;
        let rows = query
            .order_by_desc(cash_movements::Column::RecordedAt)
            .order_by_desc(cash_movements::Column::Id)
            .offset(page.offset())
            .limit(page.limit())
            .all(&self.db)
            .await
            .map_err(db_err)?;

        let data = rows
            .into_iter()
            .map(movement_from_row)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(PageResponse::new(data, page, total))
    }
}

#[allow(clippy::needless_pass_by_value)]
fn db_err(e: DbErr) -> TuitionError {
    TuitionError::Repository(e.to_string())
}

fn apply_filter(
    query: Select<cash_movements::Entity>,
    filter: &MovementFilter,
) -> Select<cash_movements::Entity> {
    let mut query = query;
    if let Some((start, end)) = filter.time_range() {
        query = query
            .filter(cash_movements::Column::RecordedAt.gte(start))
            .filter(cash_movements::Column::RecordedAt.lt(end));
    }
    let (from, to) = filter.date_bounds();
    if let Some(from) = from {
        query = query.filter(cash_movements::Column::RecordedAt.gte(from));
    }
    if let Some(to) = to {
        query = query.filter(cash_movements::Column::RecordedAt.lt(to));
    }
    if let Some(actor) = filter.recorded_by() {
        query = query.filter(cash_movements::Column::RecordedBy.eq(actor.into_inner()));
    }
    query
}

fn month_column(period: Period) -> i32 {
    i32::try_from(period.month()).unwrap_or_default()
}

fn period_from_columns(month: i32, year: i32) -> Result<Period, TuitionError> {
    Period::new(u32::try_from(month).unwrap_or_default(), year)
}

async fn load_record<C: ConnectionTrait>(
    conn: &C,
    row: payment_records::Model,
) -> Result<PaymentRecord, TuitionError> {
    let student_id = row.student_id;
    let payments = monthly_payments::Entity::find()
        .filter(monthly_payments::Column::StudentId.eq(student_id))
        .all(conn)
        .await
        .map_err(db_err)?;

    let schedule: Schedule = serde_json::from_value(row.schedule).map_err(|e| {
        TuitionError::Internal(format!("Corrupt schedule for student {student_id}: {e}"))
    })?;

    let initial_payment = match (row.initial_amount, row.initial_payment_date, row.initial_method) {
        (Some(amount), Some(payment_date), Some(method)) => Some(InitialPayment {
            amount,
            payment_date,
            method: method.into(),
        }),
        _ => None,
    };

    let mut monthly = BTreeMap::new();
    for payment in payments {
        let period = period_from_columns(payment.month, payment.year)?;
        monthly.insert(
            period,
            MonthlyPayment {
                period,
                amount: payment.amount,
                payment_date: payment.payment_date,
                method: payment.method.into(),
                partial: payment.partial,
            },
        );
    }

    Ok(PaymentRecord {
        student_id: StudentId::from_uuid(student_id),
        classroom_id: ClassroomId::from_uuid(row.classroom_id),
        schedule,
        initial_payment,
        monthly_payments: monthly,
        version: row.version,
        created_at: row.created_at.with_timezone(&Utc),
        updated_at: row.updated_at.with_timezone(&Utc),
    })
}

async fn write_record(
    txn: &DatabaseTransaction,
    before: &PaymentRecord,
    after: &PaymentRecord,
) -> Result<(), TuitionError> {
    let schedule = serde_json::to_value(&after.schedule)
        .map_err(|e| TuitionError::Internal(format!("Failed to encode schedule: {e}")))?;
    let initial = after.initial_payment;
    let student_id = after.student_id.into_inner();

    payment_records::ActiveModel {
        student_id: Set(student_id),
        classroom_id: Set(after.classroom_id.into_inner()),
        schedule: Set(schedule),
        initial_amount: Set(initial.map(|p| p.amount)),
        initial_payment_date: Set(initial.map(|p| p.payment_date)),
        initial_method: Set(initial.map(|p| p.method.into())),
        version: Set(after.version),
        updated_at: Set(after.updated_at.into()),
        ..Default::default()
    }
    .update(txn)
    .await
    .map_err(db_err)?;

    for (period, payment) in &after.monthly_payments {
        if before.monthly_payments.get(period) == Some(payment) {
            continue;
        }

        let row = monthly_payments::ActiveModel {
            id: Set(Uuid::new_v4()),
            student_id: Set(student_id),
            month: Set(month_column(*period)),
            year: Set(period.year()),
            amount: Set(payment.amount),
            payment_date: Set(payment.payment_date),
            method: Set(payment.method.into()),
            partial: Set(payment.partial),
            created_at: Set(after.updated_at.into()),
            updated_at: Set(after.updated_at.into()),
        };
        monthly_payments::Entity::insert(row)
            .on_conflict(
                OnConflict::columns([
                    monthly_payments::Column::StudentId,
                    monthly_payments::Column::Month,
                    monthly_payments::Column::Year,
                ])
                .update_columns([
                    monthly_payments::Column::Amount,
                    monthly_payments::Column::PaymentDate,
                    monthly_payments::Column::Method,
                    monthly_payments::Column::Partial,
                    monthly_payments::Column::UpdatedAt,
                ])
                .to_owned(),
            )
            .exec_without_returning(txn)
            .await
            .map_err(db_err)?;
    }

    Ok(())
}

async fn insert_movement(
    txn: &DatabaseTransaction,
    new: NewCashMovement,
    now: chrono::DateTime<Utc>,
) -> Result<CashMovement, TuitionError> {
    let movement = CashMovement::from_new(CashMovementId::new(), new, now);
    let (source_kind, source_month, source_year) = match movement.source.map(|s| s.kind) {
        Some(PaymentKind::Initial) => (Some(db_enums::PaymentKind::Initial), None, None),
        Some(PaymentKind::Monthly(period)) => (
            Some(db_enums::PaymentKind::Monthly),
            Some(month_column(period)),
            Some(period.year()),
        ),
        None => (None, None, None),
    };

    cash_movements::ActiveModel {
        id: Set(movement.id.into_inner()),
        movement_type: Set(movement.movement_type.into()),
        amount: Set(movement.amount),
        concept: Set(movement.concept.clone()),
        description: Set(movement.description.clone()),
        category: Set(movement.category.into()),
        method: Set(movement.method.into()),
        recorded_by: Set(movement.recorded_by.into_inner()),
        student_id: Set(movement.source.map(|s| s.student_id.into_inner())),
        source_kind: Set(source_kind),
        source_month: Set(source_month),
        source_year: Set(source_year),
        recorded_at: Set(now.into()),
    }
    .insert(txn)
    .await
    .map_err(db_err)?;

    Ok(movement)
}

fn movement_from_row(row: cash_movements::Model) -> Result<CashMovement, TuitionError> {
    let kind = match (row.source_kind, row.source_month, row.source_year) {
        (Some(db_enums::PaymentKind::Initial), _, _) => Some(PaymentKind::Initial),
        (Some(db_enums::PaymentKind::Monthly), Some(month), Some(year)) => {
            Some(PaymentKind::Monthly(period_from_columns(month, year)?))
        }
        _ => None,
    };
    let source = match (row.student_id, kind) {
        (Some(student_id), Some(kind)) => Some(MovementSource {
            student_id: StudentId::from_uuid(student_id),
            kind,
        }),
        _ => None,
    };

    Ok(CashMovement {
        id: CashMovementId::from_uuid(row.id),
        movement_type: row.movement_type.into(),
        amount: row.amount,
        concept: row.concept,
        description: row.description,
        category: row.category.into(),
        method: row.method.into(),
        recorded_by: UserId::from_uuid(row.recorded_by),
        source,
        recorded_at: row.recorded_at.with_timezone(&Utc),
    })
}
