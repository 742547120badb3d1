//! Service-level tests over the in-memory repository.

use std::sync::Arc;

use chrono::{Datelike, NaiveDate, TimeZone, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use campus_shared::types::{ClassroomId, PageRequest, PageResponse, StudentId, UserId};

use super::clock::FixedClock;
use super::error::TuitionError;
use super::memory::InMemoryTuitionRepository;
use super::repository::{Committed, RecordAccess, TuitionRepository, WorkOutcome};
use super::service::TuitionService;
use super::summary::{CashSummary, MovementFilter};
use super::types::{
    AmountChangeCommand, CashMovement, MovementCategory, MovementType, PaymentDetails, PaymentKind,
    MAX_AMOUNT, PaymentMethod, PaymentRecord, Period, RegisterInitialPayment, RegisterMonthlyPayment,
    Weekday,
};

type MemoryService = TuitionService<InMemoryTuitionRepository>;

fn service() -> MemoryService {
    TuitionService::new(Arc::new(InMemoryTuitionRepository::new()))
}

fn details(amount: Decimal) -> PaymentDetails {
    PaymentDetails {
        amount,
        payment_date: NaiveDate::from_ymd_opt(2024, 3, 4).unwrap(),
        method: PaymentMethod::Efectivo,
    }
}

fn march() -> Period {
    Period::new(3, 2024).unwrap()
}

async fn register_initial<R: TuitionRepository>(
    service: &TuitionService<R>,
    student_id: StudentId,
    amount: Decimal,
    actor: UserId,
) {
    service
        .register_initial_payment(RegisterInitialPayment {
            student_id,
            classroom_id: ClassroomId::new(),
            details: details(amount),
            recorded_by: actor,
        })
        .await
        .unwrap();
}

async fn schedule(service: &MemoryService, student_id: StudentId) {
    service
        .assign_schedule(student_id, ClassroomId::new(), vec![Weekday::Lunes, Weekday::Jueves])
        .await
        .unwrap();
}

fn change(student_id: StudentId, kind: PaymentKind, amount: Decimal, actor: UserId) -> AmountChangeCommand {
    AmountChangeCommand {
        student_id,
        kind,
        details: details(amount),
        recorded_by: actor,
        expected_version: None,
    }
}

fn movements_for(ledger: &[CashMovement], student_id: StudentId, kind: PaymentKind) -> Vec<&CashMovement> {
    ledger
        .iter()
        .filter(|m| m.source.is_some_and(|s| s.student_id == student_id && s.kind == kind))
        .collect()
}

fn signed_sum(movements: &[&CashMovement]) -> Decimal {
    movements.iter().map(|m| m.signed_amount()).sum()
}

// ============================================================================
// Amount changes
// ============================================================================

#[tokio::test]
async fn test_increase_posts_delta_as_income() {
    let service = service();
    let student_id = StudentId::new();
    let actor = UserId::new();
    register_initial(&service, student_id, dec!(100), actor).await;

    let preview = service
        .preview_amount_change(student_id, PaymentKind::Initial, dec!(120))
        .await
        .unwrap();
    assert_eq!(preview.previous_amount, Some(dec!(100)));
    assert_eq!(preview.delta, dec!(20));
    assert_eq!(preview.movement_type, Some(MovementType::Income));
    assert!(preview.requires_confirmation);

    let committed = service
        .commit_amount_change(change(student_id, PaymentKind::Initial, dec!(120), actor))
        .await
        .unwrap();
    assert_eq!(committed.previous_amount, dec!(100));
    assert_eq!(committed.delta, dec!(20));
    assert_eq!(committed.record.read_initial_payment(), Some(dec!(120)));

    let ledger = service.repository().ledger_snapshot().await;
    let movements = movements_for(&ledger, student_id, PaymentKind::Initial);
    assert_eq!(movements.len(), 2);
    assert_eq!(movements[0].amount, dec!(100));
    assert_eq!(movements[1].movement_type, MovementType::Income);
    assert_eq!(movements[1].amount, dec!(20));
    assert_eq!(movements[1].concept, "Aumento de pago inicial");
    assert_eq!(signed_sum(&movements), dec!(120));
}

#[tokio::test]
async fn test_reduction_posts_delta_as_expense() {
    let service = service();
    let student_id = StudentId::new();
    let actor = UserId::new();
    register_initial(&service, student_id, dec!(100), actor).await;

    let committed = service
        .commit_amount_change(change(student_id, PaymentKind::Initial, dec!(80), actor))
        .await
        .unwrap();

    let movement = committed.movement.unwrap();
    assert_eq!(movement.movement_type, MovementType::Expense);
    assert_eq!(movement.amount, dec!(20));
    assert_eq!(movement.category, MovementCategory::GastosAdministrativos);
    assert_eq!(movement.description, "Reducción de pago inicial de S/.100.00 a S/.80.00");

    let ledger = service.repository().ledger_snapshot().await;
    assert_eq!(signed_sum(&movements_for(&ledger, student_id, PaymentKind::Initial)), dec!(80));
}

#[tokio::test]
async fn test_zero_delta_updates_metadata_without_movement() {
    let service = service();
    let student_id = StudentId::new();
    let actor = UserId::new();
    register_initial(&service, student_id, dec!(100), actor).await;

    let mut command = change(student_id, PaymentKind::Initial, dec!(100), actor);
    command.details.method = PaymentMethod::Transferencia;
    let committed = service.commit_amount_change(command).await.unwrap();

    assert_eq!(committed.delta, Decimal::ZERO);
    assert!(committed.movement.is_none());
    assert_eq!(
        committed.record.initial_payment.unwrap().method,
        PaymentMethod::Transferencia
    );
    assert_eq!(service.repository().ledger_snapshot().await.len(), 1);
}

#[tokio::test]
async fn test_monthly_change_keeps_partial_flag() {
    let service = service();
    let student_id = StudentId::new();
    let actor = UserId::new();
    schedule(&service, student_id).await;
    service
        .register_monthly_payment(RegisterMonthlyPayment {
            student_id,
            period: march(),
            details: details(dec!(60)),
            partial: true,
            recorded_by: actor,
        })
        .await
        .unwrap();

    let kind = PaymentKind::Monthly(march());
    let committed = service
        .commit_amount_change(change(student_id, kind, dec!(150), actor))
        .await
        .unwrap();

    let payment = committed.record.monthly_payments[&march()];
    assert_eq!(payment.amount, dec!(150));
    assert!(payment.partial);
    assert_eq!(committed.movement.unwrap().concept, "Aumento de pensión 03/2024");
}

#[tokio::test]
async fn test_commit_without_previous_is_not_found() {
    let service = service();
    let student_id = StudentId::new();
    let actor = UserId::new();

    let err = service
        .commit_amount_change(change(student_id, PaymentKind::Initial, dec!(50), actor))
        .await
        .unwrap_err();
    assert!(matches!(err, TuitionError::PaymentNotFound { .. }));

    schedule(&service, student_id).await;
    let err = service
        .commit_amount_change(change(student_id, PaymentKind::Initial, dec!(50), actor))
        .await
        .unwrap_err();
    assert!(matches!(err, TuitionError::PaymentNotFound { .. }));
    assert!(service.repository().ledger_snapshot().await.is_empty());
}

#[tokio::test]
async fn test_stale_preview_is_rejected() {
    let service = service();
    let student_id = StudentId::new();
    let actor = UserId::new();
    register_initial(&service, student_id, dec!(100), actor).await;

    let preview = service
        .preview_amount_change(student_id, PaymentKind::Initial, dec!(120))
        .await
        .unwrap();

    // Another operator commits first.
    service
        .commit_amount_change(change(student_id, PaymentKind::Initial, dec!(110), actor))
        .await
        .unwrap();

    let mut command = change(student_id, PaymentKind::Initial, dec!(120), actor);
    command.expected_version = preview.record_version;
    let err = service.commit_amount_change(command).await.unwrap_err();
    assert!(matches!(err, TuitionError::ConcurrentModification { .. }));
    assert!(err.is_retryable());

    let record = service.student_record(student_id).await.unwrap();
    assert_eq!(record.read_initial_payment(), Some(dec!(110)));
    assert_eq!(service.repository().ledger_snapshot().await.len(), 2);
}

#[tokio::test]
async fn test_preview_has_no_side_effects() {
    let service = service();
    let student_id = StudentId::new();
    let actor = UserId::new();
    register_initial(&service, student_id, dec!(100), actor).await;
    let before = service.student_record(student_id).await.unwrap();

    let first = service
        .preview_amount_change(student_id, PaymentKind::Initial, dec!(75))
        .await
        .unwrap();
    let second = service
        .preview_amount_change(student_id, PaymentKind::Initial, dec!(75))
        .await
        .unwrap();

    assert_eq!(first, second);
    assert_eq!(service.student_record(student_id).await.unwrap(), before);
    assert_eq!(service.repository().ledger_snapshot().await.len(), 1);
}

#[tokio::test]
async fn test_preview_without_previous_amount() {
    let service = service();
    let preview = service
        .preview_amount_change(StudentId::new(), PaymentKind::Initial, dec!(90))
        .await
        .unwrap();
    assert_eq!(preview.previous_amount, None);
    assert_eq!(preview.delta, dec!(90));
    assert_eq!(preview.movement_type, Some(MovementType::Income));
    assert!(!preview.requires_confirmation);
}

#[tokio::test]
async fn test_non_positive_amount_rejected() {
    let service = service();
    let student_id = StudentId::new();
    let actor = UserId::new();
    register_initial(&service, student_id, dec!(100), actor).await;

    let err = service
        .commit_amount_change(change(student_id, PaymentKind::Initial, dec!(0), actor))
        .await
        .unwrap_err();
    assert!(matches!(err, TuitionError::NonPositiveAmount(_)));
    assert_eq!(
        service.student_record(student_id).await.unwrap().read_initial_payment(),
        Some(dec!(100))
    );
}

#[tokio::test]
async fn test_amount_above_ledger_bound_rejected() {
    let service = service();
    let student_id = StudentId::new();
    let actor = UserId::new();

    let err = service
        .register_initial_payment(RegisterInitialPayment {
            student_id,
            classroom_id: ClassroomId::new(),
            details: details(dec!(10000000000)),
            recorded_by: actor,
        })
        .await
        .unwrap_err();
    assert!(matches!(err, TuitionError::AmountTooLarge { .. }));
    assert_eq!(err.http_status_code(), 400);
    assert!(service.repository().ledger_snapshot().await.is_empty());

    register_initial(&service, student_id, MAX_AMOUNT, actor).await;
    let err = service
        .commit_amount_change(change(student_id, PaymentKind::Initial, MAX_AMOUNT + dec!(0.01), actor))
        .await
        .unwrap_err();
    assert!(matches!(err, TuitionError::AmountTooLarge { .. }));
    assert_eq!(
        service.student_record(student_id).await.unwrap().read_initial_payment(),
        Some(MAX_AMOUNT)
    );
}

// ============================================================================
// Registration and gating
// ============================================================================

#[tokio::test]
async fn test_monthly_payment_requires_schedule() {
    let service = service();
    let student_id = StudentId::new();
    let actor = UserId::new();
    let input = RegisterMonthlyPayment {
        student_id,
        period: march(),
        details: details(dec!(150)),
        partial: false,
        recorded_by: actor,
    };

    let err = service.register_monthly_payment(input.clone()).await.unwrap_err();
    assert!(matches!(err, TuitionError::NeedsSchedule(id) if id == student_id));
    assert_eq!(err.http_status_code(), 404);

    let err = service
        .preview_amount_change(student_id, PaymentKind::Monthly(march()), dec!(150))
        .await
        .unwrap_err();
    assert!(matches!(err, TuitionError::NeedsSchedule(_)));

    schedule(&service, student_id).await;
    let registration = service.register_monthly_payment(input).await.unwrap();
    assert_eq!(registration.movement.amount, dec!(150));
    assert_eq!(registration.movement.concept, "Pensión 03/2024");
    assert!(service.repository().ledger_snapshot().await.len() == 1);
}

#[tokio::test]
async fn test_empty_schedule_rejected() {
    let service = service();
    let student_id = StudentId::new();
    let err = service
        .assign_schedule(student_id, ClassroomId::new(), Vec::new())
        .await
        .unwrap_err();
    assert!(matches!(err, TuitionError::EmptySchedule));
    assert!(matches!(
        service.student_record(student_id).await,
        Err(TuitionError::StudentNotFound(_))
    ));
}

#[tokio::test]
async fn test_schedule_assignment_is_idempotent() {
    let service = service();
    let student_id = StudentId::new();
    let classroom_id = ClassroomId::new();
    let days = vec![Weekday::Viernes, Weekday::Lunes];

    let first = service
        .assign_schedule(student_id, classroom_id, days.clone())
        .await
        .unwrap();
    let second = service
        .assign_schedule(student_id, classroom_id, days)
        .await
        .unwrap();

    assert_eq!(first.schedule, second.schedule);
    assert_eq!(second.schedule.to_string(), "Lunes - Viernes");
    assert_eq!(
        service.require_schedule(student_id).await.unwrap(),
        second.schedule
    );
}

#[tokio::test]
async fn test_duplicate_registration_conflicts() {
    let service = service();
    let student_id = StudentId::new();
    let actor = UserId::new();
    schedule(&service, student_id).await;
    let input = RegisterMonthlyPayment {
        student_id,
        period: march(),
        details: details(dec!(150)),
        partial: false,
        recorded_by: actor,
    };
    service.register_monthly_payment(input.clone()).await.unwrap();

    let err = service.register_monthly_payment(input).await.unwrap_err();
    assert!(matches!(err, TuitionError::PaymentAlreadyRegistered { .. }));

    let record = service.student_record(student_id).await.unwrap();
    assert_eq!(record.monthly_payments.len(), 1);
    assert_eq!(service.repository().ledger_snapshot().await.len(), 1);

    register_initial(&service, student_id, dec!(100), actor).await;
    let err = service
        .register_initial_payment(RegisterInitialPayment {
            student_id,
            classroom_id: ClassroomId::new(),
            details: details(dec!(200)),
            recorded_by: actor,
        })
        .await
        .unwrap_err();
    assert!(matches!(err, TuitionError::PaymentAlreadyRegistered { .. }));
}

// ============================================================================
// Caja queries
// ============================================================================

#[tokio::test]
async fn test_summary_per_actor() {
    let service = service();
    let secretary = UserId::new();
    let director = UserId::new();
    let first = StudentId::new();
    let second = StudentId::new();

    register_initial(&service, first, dec!(100), secretary).await;
    service
        .commit_amount_change(change(first, PaymentKind::Initial, dec!(70), secretary))
        .await
        .unwrap();
    register_initial(&service, second, dec!(200), director).await;

    let now = Utc::now();
    let summary = service
        .get_summary(now.month(), now.year(), Some(secretary))
        .await
        .unwrap();
    assert_eq!(
        summary,
        CashSummary {
            income: dec!(100),
            expense: dec!(30),
            net_balance: dec!(70),
            income_count: 1,
            expense_count: 1,
        }
    );

    let everyone = service.get_summary(now.month(), now.year(), None).await.unwrap();
    assert_eq!(everyone.income, dec!(300));
    assert_eq!(everyone.net_balance, dec!(270));

    let err = service.get_summary(13, now.year(), None).await.unwrap_err();
    assert!(matches!(err, TuitionError::InvalidPeriod { .. }));
}

#[tokio::test]
async fn test_scenario_summary_at_fixed_march_instant() {
    let instant = Utc.with_ymd_and_hms(2024, 3, 15, 10, 30, 0).unwrap();
    let repo = InMemoryTuitionRepository::with_clock(Arc::new(FixedClock(instant)));
    let service = TuitionService::new(Arc::new(repo));
    let student_id = StudentId::new();
    let actor = UserId::new();

    // A: first registration posts the full amount.
    register_initial(&service, student_id, dec!(100), actor).await;

    // B: a reduction posts the difference as an expense.
    let preview = service
        .preview_amount_change(student_id, PaymentKind::Initial, dec!(80))
        .await
        .unwrap();
    assert_eq!(preview.delta, dec!(-20));
    assert_eq!(preview.movement_type, Some(MovementType::Expense));
    service
        .commit_amount_change(change(student_id, PaymentKind::Initial, dec!(80), actor))
        .await
        .unwrap();

    // C: committing the same amount again posts nothing.
    let unchanged = service
        .commit_amount_change(change(student_id, PaymentKind::Initial, dec!(80), actor))
        .await
        .unwrap();
    assert!(unchanged.movement.is_none());

    let ledger = service.repository().ledger_snapshot().await;
    assert_eq!(ledger.len(), 2);
    assert!(ledger.iter().all(|m| m.recorded_at == instant));

    let summary = service.get_summary(3, 2024, Some(actor)).await.unwrap();
    assert_eq!(
        summary,
        CashSummary {
            income: dec!(100),
            expense: dec!(20),
            net_balance: dec!(80),
            income_count: 1,
            expense_count: 1,
        }
    );

    let april = service.get_summary(4, 2024, Some(actor)).await.unwrap();
    assert_eq!(april, CashSummary::default());
}

#[tokio::test]
async fn test_list_income_by_date_range() {
    let march_day = Utc.with_ymd_and_hms(2024, 3, 15, 9, 0, 0).unwrap();
    let service = TuitionService::new(Arc::new(InMemoryTuitionRepository::with_clock(Arc::new(
        FixedClock(march_day),
    ))));
    let actor = UserId::new();
    register_initial(&service, StudentId::new(), dec!(100), actor).await;

    let inside = MovementFilter::default()
        .with_date_range(NaiveDate::from_ymd_opt(2024, 3, 15), NaiveDate::from_ymd_opt(2024, 3, 15))
        .unwrap();
    let page = service.list_income(inside, PageRequest::default()).await.unwrap();
    assert_eq!(page.meta.total, 1);

    let after = MovementFilter::default()
        .with_date_range(NaiveDate::from_ymd_opt(2024, 3, 16), None)
        .unwrap();
    let page = service.list_income(after, PageRequest::default()).await.unwrap();
    assert_eq!(page.meta.total, 0);
}

#[tokio::test]
async fn test_list_income_paginates_most_recent_first() {
    let service = service();
    let actor = UserId::new();
    let students: Vec<StudentId> = (0..4).map(|_| StudentId::new()).collect();
    for (i, student_id) in students.iter().enumerate() {
        register_initial(&service, *student_id, Decimal::from(100 + i), actor).await;
    }
    service
        .commit_amount_change(change(students[0], PaymentKind::Initial, dec!(50), actor))
        .await
        .unwrap();

    let page: PageResponse<CashMovement> = service
        .list_income(MovementFilter::default(), PageRequest::new(1, 3))
        .await
        .unwrap();
    assert_eq!(page.meta.total, 4);
    assert_eq!(page.meta.total_pages, 2);
    assert_eq!(page.data.len(), 3);
    assert!(
        page.data
            .windows(2)
            .all(|w| (w[0].recorded_at, w[0].id) >= (w[1].recorded_at, w[1].id))
    );

    let expenses = service
        .list_expense(MovementFilter::default(), PageRequest::default())
        .await
        .unwrap();
    assert_eq!(expenses.meta.total, 1);
    assert_eq!(expenses.data[0].amount, dec!(50));
}

// ============================================================================
// Concurrency and ledger consistency
// ============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_commits_keep_ledger_consistent() {
    let service = Arc::new(service());
    let student_id = StudentId::new();
    let actor = UserId::new();
    register_initial(&*service, student_id, dec!(100), actor).await;

    let handles: Vec<_> = [dec!(150), dec!(90), dec!(120), dec!(100), dec!(75)]
        .into_iter()
        .map(|amount| {
            let service = Arc::clone(&service);
            tokio::spawn(async move {
                service
                    .commit_amount_change(change(student_id, PaymentKind::Initial, amount, actor))
                    .await
            })
        })
        .collect();
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let record = service.student_record(student_id).await.unwrap();
    assert_eq!(record.version, 6);
    let stored = record.read_initial_payment().unwrap();
    let ledger = service.repository().ledger_snapshot().await;
    assert_eq!(signed_sum(&movements_for(&ledger, student_id, PaymentKind::Initial)), stored);
}

/// Repository that commits record writes but loses every movement.
struct LosingLedgerRepository {
    inner: InMemoryTuitionRepository,
}

impl TuitionRepository for LosingLedgerRepository {
    async fn find_record(&self, student_id: StudentId) -> Result<Option<PaymentRecord>, TuitionError> {
        self.inner.find_record(student_id).await
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
        let mut committed = self
            .inner
            .transact(student_id, access, move |record| {
                let mut outcome = work(record)?;
                outcome.movement = None;
                Ok(outcome)
            })
            .await?;
        committed.movement = None;
        Ok(committed)
    }

    async fn summarize(&self, filter: MovementFilter) -> Result<CashSummary, TuitionError> {
        self.inner.summarize(filter).await
    }

    async fn list_movements(
        &self,
        movement_type: MovementType,
        filter: MovementFilter,
        page: PageRequest,
    ) -> Result<PageResponse<CashMovement>, TuitionError> {
        self.inner.list_movements(movement_type, filter, page).await
    }
}

#[tokio::test]
async fn test_missing_movement_is_ledger_inconsistency() {
    let service = TuitionService::new(Arc::new(LosingLedgerRepository {
        inner: InMemoryTuitionRepository::new(),
    }));
    let student_id = StudentId::new();
    let actor = UserId::new();

    let err = service
        .register_initial_payment(RegisterInitialPayment {
            student_id,
            classroom_id: ClassroomId::new(),
            details: details(dec!(100)),
            recorded_by: actor,
        })
        .await
        .unwrap_err();
    assert!(matches!(err, TuitionError::LedgerInconsistency { .. }));
    assert!(!err.is_retryable());
    assert_eq!(err.http_status_code(), 500);

    let err = service
        .commit_amount_change(change(student_id, PaymentKind::Initial, dec!(130), actor))
        .await
        .unwrap_err();
    assert!(matches!(err, TuitionError::LedgerInconsistency { .. }));

    // A zero delta never needs a movement, so it still succeeds.
    let committed = service
        .commit_amount_change(change(student_id, PaymentKind::Initial, dec!(130), actor))
        .await
        .unwrap();
    assert!(committed.movement.is_none());
}
