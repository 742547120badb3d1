//! Property-based tests for tuition reconciliation.
//!
//! - Telescoping: the signed sum of a payment's movements equals its stored amount
//! - Preview is read-only and agrees with the following commit
//! - Compensating movements carry `|delta|` in the direction of the delta

use std::sync::Arc;

use chrono::NaiveDate;
use proptest::prelude::*;
use rust_decimal::Decimal;

use campus_shared::types::{ClassroomId, StudentId, UserId};

use super::memory::InMemoryTuitionRepository;
use super::reconciliation::ReconciliationEngine;
use super::service::TuitionService;
use super::types::{
    AmountChangeCommand, MovementType, PaymentDetails, PaymentKind, PaymentMethod, Period,
    RegisterInitialPayment, RegisterMonthlyPayment, Weekday,
};

/// Strategy to generate positive amounts (0.01 to 5,000.00).
fn positive_amount() -> impl Strategy<Value = Decimal> {
    (1i64..500_000i64).prop_map(|cents| Decimal::new(cents, 2))
}

/// Strategy to generate which amount is being changed.
fn payment_kind() -> impl Strategy<Value = PaymentKind> {
    prop_oneof![
        Just(PaymentKind::Initial),
        (1u32..=12, 2020i32..=2030).prop_map(|(month, year)| {
            PaymentKind::Monthly(Period::new(month, year).unwrap())
        }),
    ]
}

fn details(amount: Decimal) -> PaymentDetails {
    PaymentDetails {
        amount,
        payment_date: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
        method: PaymentMethod::Yape,
    }
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
}

async fn seeded_service(
    kind: PaymentKind,
    initial: Decimal,
) -> (TuitionService<InMemoryTuitionRepository>, StudentId, UserId) {
    let service = TuitionService::new(Arc::new(InMemoryTuitionRepository::new()));
    let student_id = StudentId::new();
    let actor = UserId::new();

    match kind {
        PaymentKind::Initial => {
            service
                .register_initial_payment(RegisterInitialPayment {
                    student_id,
                    classroom_id: ClassroomId::new(),
                    details: details(initial),
                    recorded_by: actor,
                })
                .await
                .unwrap();
        }
        PaymentKind::Monthly(period) => {
            service
                .assign_schedule(student_id, ClassroomId::new(), vec![Weekday::Martes])
                .await
                .unwrap();
            service
                .register_monthly_payment(RegisterMonthlyPayment {
                    student_id,
                    period,
                    details: details(initial),
                    partial: false,
                    recorded_by: actor,
                })
                .await
                .unwrap();
        }
    }

    (service, student_id, actor)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Any sequence of amendments leaves the signed ledger sum equal to the
    /// stored amount, with one movement per non-zero delta.
    #[test]
    fn prop_ledger_telescopes_to_stored_amount(
        kind in payment_kind(),
        initial in positive_amount(),
        changes in prop::collection::vec(positive_amount(), 0..12),
    ) {
        let (stored, signed_sum, movements) = runtime().block_on(async {
            let (service, student_id, actor) = seeded_service(kind, initial).await;
            for amount in &changes {
                service
                    .commit_amount_change(AmountChangeCommand {
                        student_id,
                        kind,
                        details: details(*amount),
                        recorded_by: actor,
                        expected_version: None,
                    })
                    .await
                    .unwrap();
            }

            let record = service.student_record(student_id).await.unwrap();
            let ledger = service.repository().ledger_snapshot().await;
            let signed_sum: Decimal = ledger.iter().map(|m| m.signed_amount()).sum();
            (record.read_amount(kind), signed_sum, ledger.len())
        });

        let expected_final = changes.last().copied().unwrap_or(initial);
        let mut previous = initial;
        let mut nonzero = 0usize;
        for amount in &changes {
            if *amount != previous {
                nonzero += 1;
            }
            previous = *amount;
        }

        prop_assert_eq!(stored, Some(expected_final));
        prop_assert_eq!(signed_sum, expected_final);
        prop_assert_eq!(movements, 1 + nonzero);
    }

    /// Previewing twice returns the same result, changes nothing, and
    /// predicts the delta the commit then applies.
    #[test]
    fn prop_preview_is_read_only(
        kind in payment_kind(),
        initial in positive_amount(),
        new_amount in positive_amount(),
    ) {
        let (first, second, ledger_before, ledger_after, committed_delta) = runtime().block_on(async {
            let (service, student_id, actor) = seeded_service(kind, initial).await;
            let ledger_before = service.repository().ledger_snapshot().await.len();

            let first = service.preview_amount_change(student_id, kind, new_amount).await.unwrap();
            let second = service.preview_amount_change(student_id, kind, new_amount).await.unwrap();
            let ledger_after = service.repository().ledger_snapshot().await.len();

            let committed = service
                .commit_amount_change(AmountChangeCommand {
                    student_id,
                    kind,
                    details: details(new_amount),
                    recorded_by: actor,
                    expected_version: first.record_version,
                })
                .await
                .unwrap();
            (first, second, ledger_before, ledger_after, committed.delta)
        });

        prop_assert_eq!(&first, &second);
        prop_assert_eq!(ledger_before, ledger_after);
        prop_assert_eq!(first.previous_amount, Some(initial));
        prop_assert_eq!(first.delta, new_amount - initial);
        prop_assert_eq!(committed_delta, first.delta);
        prop_assert_eq!(first.requires_confirmation, new_amount != initial);
    }

    /// The compensating movement is `|delta|`, in the direction of the delta.
    #[test]
    fn prop_adjustment_direction_matches_delta(
        kind in payment_kind(),
        previous in positive_amount(),
        new in positive_amount(),
    ) {
        let movement = ReconciliationEngine::adjustment_movement(
            StudentId::new(),
            kind,
            previous,
            new,
            PaymentMethod::Efectivo,
            UserId::new(),
        );
        let delta = new - previous;

        match movement {
            None => prop_assert!(delta.is_zero()),
            Some(movement) => {
                prop_assert!(movement.amount > Decimal::ZERO);
                prop_assert_eq!(movement.amount, delta.abs());
                prop_assert_eq!(movement.movement_type.signed(movement.amount), delta);
                let expected = if delta > Decimal::ZERO { MovementType::Income } else { MovementType::Expense };
                prop_assert_eq!(movement.movement_type, expected);
            }
        }
    }
}
