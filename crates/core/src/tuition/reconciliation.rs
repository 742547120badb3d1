//! Payment reconciliation.
//!
//! Turns a write to a stored amount into the cash movement that keeps the
//! caja consistent with it. Registrations post the full amount as income;
//! amendments post only the difference: an increase is income, a reduction
//! is an expense, and an unchanged amount posts nothing.

use rust_decimal::Decimal;

use campus_shared::types::{StudentId, UserId, format_soles, normalize_amount};

use super::error::TuitionError;
use super::schedule::ScheduleGate;
use super::types::{
    AmountChangeCommand, AmountChangePreview, MAX_AMOUNT, MovementCategory, MovementSource,
    MovementType, NewCashMovement, PaymentDetails, PaymentKind, PaymentMethod, PaymentRecord,
};

/// Outcome of amending a stored amount inside a record lock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Amendment {
    /// Amount that was superseded.
    pub previous_amount: Decimal,
    /// `new - previous`.
    pub delta: Decimal,
    /// Compensating movement to append, if the delta is non-zero.
    pub movement: Option<NewCashMovement>,
}

/// Stateless reconciliation rules.
pub struct ReconciliationEngine;

impl ReconciliationEngine {
    /// Normalizes an amount to two decimals and checks it is in range.
    ///
    /// # Errors
    ///
    /// Returns `TuitionError::NonPositiveAmount` if the normalized amount is
    /// zero or negative, and `TuitionError::AmountTooLarge` if it exceeds
    /// [`MAX_AMOUNT`].
    pub fn validate_amount(amount: Decimal) -> Result<Decimal, TuitionError> {
        let normalized = normalize_amount(amount);
        if normalized <= Decimal::ZERO {
            return Err(TuitionError::NonPositiveAmount(amount));
        }
        if normalized > MAX_AMOUNT {
            return Err(TuitionError::AmountTooLarge {
                amount,
                max: MAX_AMOUNT,
            });
        }
        Ok(normalized)
    }

    /// Maps a delta to the movement direction it needs.
    #[must_use]
    pub fn classify(delta: Decimal) -> Option<MovementType> {
        if delta > Decimal::ZERO {
            Some(MovementType::Income)
        } else if delta < Decimal::ZERO {
            Some(MovementType::Expense)
        } else {
            None
        }
    }

    /// Computes what committing `new_amount` would do, without side effects.
    ///
    /// A missing stored amount counts as zero, so the whole new amount shows
    /// as income and no confirmation is needed.
    ///
    /// # Errors
    ///
    /// Returns a validation error for a non-positive amount and
    /// `NeedsSchedule` for monthly payments of unscheduled students.
    pub fn preview(
        student_id: StudentId,
        record: Option<&PaymentRecord>,
        kind: PaymentKind,
        new_amount: Decimal,
    ) -> Result<AmountChangePreview, TuitionError> {
        let new_amount = Self::validate_amount(new_amount)?;
        if matches!(kind, PaymentKind::Monthly(_)) {
            ScheduleGate::require(student_id, record)?;
        }

        let previous_amount = record.and_then(|r| r.read_amount(kind));
        let delta = new_amount - previous_amount.unwrap_or(Decimal::ZERO);

        Ok(AmountChangePreview {
            previous_amount,
            new_amount,
            delta,
            movement_type: Self::classify(delta),
            record_version: record.map(|r| r.version),
            requires_confirmation: previous_amount.is_some() && !delta.is_zero(),
        })
    }

    /// Writes a first-time payment and builds its income movement.
    ///
    /// # Errors
    ///
    /// Returns `PaymentAlreadyRegistered` if the amount already exists,
    /// `NeedsSchedule` for monthly payments of unscheduled students, and a
    /// validation error for a non-positive amount. The record is untouched
    /// on error.
    pub fn register(
        record: &mut PaymentRecord,
        kind: PaymentKind,
        details: PaymentDetails,
        partial: bool,
        recorded_by: UserId,
    ) -> Result<NewCashMovement, TuitionError> {
        let amount = Self::validate_amount(details.amount)?;
        if let PaymentKind::Monthly(_) = kind {
            ScheduleGate::require(record.student_id, Some(&*record))?;
        }
        if record.read_amount(kind).is_some() {
            return Err(TuitionError::PaymentAlreadyRegistered {
                student_id: record.student_id,
                kind,
            });
        }

        let details = PaymentDetails { amount, ..details };
        match kind {
            PaymentKind::Initial => record.write_initial_payment(details),
            PaymentKind::Monthly(period) => {
                record.write_monthly_payment(period, details, Some(partial))
            }
        };

        Ok(Self::registration_movement(
            record.student_id,
            kind,
            amount,
            partial,
            details.method,
            recorded_by,
        ))
    }

    /// Overwrites a stored amount and builds the compensating movement.
    ///
    /// # Errors
    ///
    /// Returns `ConcurrentModification` if the record moved past the
    /// expected version, `PaymentNotFound` if nothing was registered yet,
    /// `NeedsSchedule` for monthly payments of unscheduled students, and a
    /// validation error for a non-positive amount. The record is untouched
    /// on error.
    pub fn amend(
        record: &mut PaymentRecord,
        command: &AmountChangeCommand,
    ) -> Result<Amendment, TuitionError> {
        let new_amount = Self::validate_amount(command.details.amount)?;
        if let Some(expected) = command.expected_version
            && expected != record.version
        {
            return Err(TuitionError::ConcurrentModification {
                student_id: record.student_id,
                expected,
                actual: record.version,
            });
        }
        if let PaymentKind::Monthly(_) = command.kind {
            ScheduleGate::require(record.student_id, Some(&*record))?;
        }

        let previous_amount =
            record
                .read_amount(command.kind)
                .ok_or(TuitionError::PaymentNotFound {
                    student_id: record.student_id,
                    kind: command.kind,
                })?;

        record.write_amount(
            command.kind,
            PaymentDetails {
                amount: new_amount,
                ..command.details
            },
        );

        let delta = new_amount - previous_amount;
        let movement = Self::adjustment_movement(
            record.student_id,
            command.kind,
            previous_amount,
            new_amount,
            command.details.method,
            command.recorded_by,
        );

        Ok(Amendment {
            previous_amount,
            delta,
            movement,
        })
    }

    /// Builds the income movement for a first-time payment.
    #[must_use]
    pub fn registration_movement(
        student_id: StudentId,
        kind: PaymentKind,
        amount: Decimal,
        partial: bool,
        method: PaymentMethod,
        recorded_by: UserId,
    ) -> NewCashMovement {
        let mut description = format!("Registro de {kind} por {}", format_soles(amount));
        if partial {
            description.push_str(" (pago parcial)");
        }

        NewCashMovement {
            movement_type: MovementType::Income,
            amount,
            concept: kind.title(),
            description,
            category: MovementCategory::PensionMensual,
            method,
            recorded_by,
            source: Some(MovementSource { student_id, kind }),
        }
    }

    /// Builds the movement that offsets changing `previous` to `new`.
    ///
    /// Returns `None` when the amounts are equal.
    #[must_use]
    pub fn adjustment_movement(
        student_id: StudentId,
        kind: PaymentKind,
        previous: Decimal,
        new: Decimal,
        method: PaymentMethod,
        recorded_by: UserId,
    ) -> Option<NewCashMovement> {
        let delta = new - previous;
        let movement_type = Self::classify(delta)?;
        let (concept, verb, category) = match movement_type {
            MovementType::Income => ("Aumento", "Incremento", MovementCategory::PensionMensual),
            MovementType::Expense => ("Ajuste", "Reducción", MovementCategory::GastosAdministrativos),
        };

        Some(NewCashMovement {
            movement_type,
            amount: delta.abs(),
            concept: format!("{concept} de {kind}"),
            description: format!(
                "{verb} de {kind} de {} a {}",
                format_soles(previous),
                format_soles(new)
            ),
            category,
            method,
            recorded_by,
            source: Some(MovementSource { student_id, kind }),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tuition::types::{Period, Schedule, Weekday};
    use campus_shared::types::ClassroomId;
    use chrono::{NaiveDate, Utc};
    use rust_decimal_macros::dec;

    fn details(amount: Decimal) -> PaymentDetails {
        PaymentDetails {
            amount,
            payment_date: NaiveDate::from_ymd_opt(2024, 3, 5).unwrap(),
            method: PaymentMethod::Yape,
        }
    }

    fn scheduled_record() -> PaymentRecord {
        let mut record = PaymentRecord::new(StudentId::new(), ClassroomId::new(), Utc::now());
        record.schedule = Schedule::from_days([Weekday::Lunes, Weekday::Miercoles]);
        record
    }

    fn march() -> PaymentKind {
        PaymentKind::Monthly(Period::new(3, 2024).unwrap())
    }

    fn command(record: &PaymentRecord, kind: PaymentKind, amount: Decimal) -> AmountChangeCommand {
        AmountChangeCommand {
            student_id: record.student_id,
            kind,
            details: details(amount),
            recorded_by: UserId::new(),
            expected_version: None,
        }
    }

    #[test]
    fn test_classify() {
        assert_eq!(ReconciliationEngine::classify(dec!(0.01)), Some(MovementType::Income));
        assert_eq!(ReconciliationEngine::classify(dec!(-5)), Some(MovementType::Expense));
        assert_eq!(ReconciliationEngine::classify(Decimal::ZERO), None);
    }

    #[test]
    fn test_validate_amount() {
        assert_eq!(ReconciliationEngine::validate_amount(dec!(10.005)).unwrap(), dec!(10.00));
        assert!(ReconciliationEngine::validate_amount(dec!(0)).is_err());
        assert!(ReconciliationEngine::validate_amount(dec!(-1)).is_err());
        assert!(ReconciliationEngine::validate_amount(dec!(0.004)).is_err());
    }

    #[test]
    fn test_validate_amount_upper_bound() {
        assert_eq!(MAX_AMOUNT, dec!(9999999999.99));
        assert_eq!(
            ReconciliationEngine::validate_amount(dec!(9999999999.99)).unwrap(),
            MAX_AMOUNT
        );
        let err = ReconciliationEngine::validate_amount(dec!(10000000000)).unwrap_err();
        assert!(matches!(err, TuitionError::AmountTooLarge { max, .. } if max == MAX_AMOUNT));
        assert!(ReconciliationEngine::validate_amount(Decimal::MAX).is_err());
    }

    #[test]
    fn test_preview_without_previous_is_full_income() {
        let record = scheduled_record();
        let preview =
            ReconciliationEngine::preview(record.student_id, Some(&record), PaymentKind::Initial, dec!(100))
                .unwrap();
        assert_eq!(preview.previous_amount, None);
        assert_eq!(preview.delta, dec!(100));
        assert_eq!(preview.movement_type, Some(MovementType::Income));
        assert!(!preview.requires_confirmation);
        assert_eq!(preview.record_version, Some(0));
    }

    #[test]
    fn test_preview_without_record() {
        let student_id = StudentId::new();
        let preview =
            ReconciliationEngine::preview(student_id, None, PaymentKind::Initial, dec!(50)).unwrap();
        assert_eq!(preview.record_version, None);
        assert_eq!(preview.delta, dec!(50));

        assert!(matches!(
            ReconciliationEngine::preview(student_id, None, march(), dec!(50)),
            Err(TuitionError::NeedsSchedule(_))
        ));
    }

    #[test]
    fn test_preview_reduction_requires_confirmation() {
        let mut record = scheduled_record();
        record.write_initial_payment(details(dec!(100)));
        let preview =
            ReconciliationEngine::preview(record.student_id, Some(&record), PaymentKind::Initial, dec!(80))
                .unwrap();
        assert_eq!(preview.previous_amount, Some(dec!(100)));
        assert_eq!(preview.delta, dec!(-20));
        assert_eq!(preview.movement_type, Some(MovementType::Expense));
        assert!(preview.requires_confirmation);

        let unchanged =
            ReconciliationEngine::preview(record.student_id, Some(&record), PaymentKind::Initial, dec!(100))
                .unwrap();
        assert_eq!(unchanged.movement_type, None);
        assert!(!unchanged.requires_confirmation);
    }

    #[test]
    fn test_register_posts_full_amount() {
        let mut record = scheduled_record();
        let actor = UserId::new();
        let movement = ReconciliationEngine::register(
            &mut record,
            march(),
            details(dec!(150)),
            true,
            actor,
        )
        .unwrap();

        assert_eq!(movement.movement_type, MovementType::Income);
        assert_eq!(movement.amount, dec!(150));
        assert_eq!(movement.category, MovementCategory::PensionMensual);
        assert_eq!(movement.concept, "Pensión 03/2024");
        assert_eq!(movement.description, "Registro de pensión 03/2024 por S/.150.00 (pago parcial)");
        assert_eq!(movement.recorded_by, actor);
        assert!(record.monthly_payments.values().all(|p| p.partial));
    }

    #[test]
    fn test_register_twice_conflicts() {
        let mut record = scheduled_record();
        ReconciliationEngine::register(&mut record, PaymentKind::Initial, details(dec!(100)), false, UserId::new())
            .unwrap();
        let err = ReconciliationEngine::register(
            &mut record,
            PaymentKind::Initial,
            details(dec!(120)),
            false,
            UserId::new(),
        )
        .unwrap_err();
        assert!(matches!(err, TuitionError::PaymentAlreadyRegistered { .. }));
        assert_eq!(record.read_initial_payment(), Some(dec!(100)));
    }

    #[test]
    fn test_register_monthly_needs_schedule() {
        let mut record = PaymentRecord::new(StudentId::new(), ClassroomId::new(), Utc::now());
        let err = ReconciliationEngine::register(&mut record, march(), details(dec!(100)), false, UserId::new())
            .unwrap_err();
        assert!(matches!(err, TuitionError::NeedsSchedule(_)));
        assert!(record.monthly_payments.is_empty());
    }

    #[test]
    fn test_amend_increase() {
        let mut record = scheduled_record();
        record.write_initial_payment(details(dec!(100)));
        let cmd = command(&record, PaymentKind::Initial, dec!(120));
        let amendment = ReconciliationEngine::amend(&mut record, &cmd).unwrap();

        assert_eq!(amendment.previous_amount, dec!(100));
        assert_eq!(amendment.delta, dec!(20));
        let movement = amendment.movement.unwrap();
        assert_eq!(movement.movement_type, MovementType::Income);
        assert_eq!(movement.amount, dec!(20));
        assert_eq!(movement.concept, "Aumento de pago inicial");
        assert_eq!(movement.description, "Incremento de pago inicial de S/.100.00 a S/.120.00");
        assert_eq!(record.read_initial_payment(), Some(dec!(120)));
    }

    #[test]
    fn test_amend_reduction() {
        let mut record = scheduled_record();
        let kind = march();
        record.write_amount(kind, details(dec!(100)));
        let cmd = command(&record, kind, dec!(80));
        let amendment = ReconciliationEngine::amend(&mut record, &cmd).unwrap();

        let movement = amendment.movement.unwrap();
        assert_eq!(movement.movement_type, MovementType::Expense);
        assert_eq!(movement.amount, dec!(20));
        assert_eq!(movement.category, MovementCategory::GastosAdministrativos);
        assert_eq!(movement.concept, "Ajuste de pensión 03/2024");
        assert_eq!(movement.description, "Reducción de pensión 03/2024 de S/.100.00 a S/.80.00");
    }

    #[test]
    fn test_amend_zero_delta_updates_metadata_only() {
        let mut record = scheduled_record();
        record.write_initial_payment(details(dec!(100)));
        let mut cmd = command(&record, PaymentKind::Initial, dec!(100));
        cmd.details.method = PaymentMethod::Plin;

        let amendment = ReconciliationEngine::amend(&mut record, &cmd).unwrap();
        assert_eq!(amendment.delta, Decimal::ZERO);
        assert!(amendment.movement.is_none());
        assert_eq!(record.initial_payment.unwrap().method, PaymentMethod::Plin);
    }

    #[test]
    fn test_amend_without_previous_is_not_found() {
        let mut record = scheduled_record();
        let cmd = command(&record, PaymentKind::Initial, dec!(90));
        let err = ReconciliationEngine::amend(&mut record, &cmd).unwrap_err();
        assert!(matches!(err, TuitionError::PaymentNotFound { .. }));
        assert!(record.initial_payment.is_none());
    }

    #[test]
    fn test_amend_rejects_stale_version() {
        let mut record = scheduled_record();
        record.write_initial_payment(details(dec!(100)));
        record.version = 3;
        let mut cmd = command(&record, PaymentKind::Initial, dec!(90));
        cmd.expected_version = Some(2);

        let err = ReconciliationEngine::amend(&mut record, &cmd).unwrap_err();
        assert!(matches!(
            err,
            TuitionError::ConcurrentModification { expected: 2, actual: 3, .. }
        ));
        assert_eq!(record.read_initial_payment(), Some(dec!(100)));
    }
}
