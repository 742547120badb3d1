//! Tuition and caja migration.
//!
//! Creates the payment record tables, the append-only cash ledger and the
//! enums they share.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();

        // ============================================================
        // PART 1: ENUMS
        // ============================================================
        db.execute_unprepared(ENUMS_SQL).await?;

        // ============================================================
        // PART 2: PAYMENT RECORDS
        // ============================================================
        db.execute_unprepared(PAYMENT_RECORDS_SQL).await?;
        db.execute_unprepared(MONTHLY_PAYMENTS_SQL).await?;

        // ============================================================
        // PART 3: CASH LEDGER
        // ============================================================
        db.execute_unprepared(CASH_MOVEMENTS_SQL).await?;
        db.execute_unprepared(TRIGGERS_SQL).await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();
        db.execute_unprepared(DROP_ALL_SQL).await?;
        Ok(())
    }
}

// ============================================================
// SQL CONSTANTS
// ============================================================

const ENUMS_SQL: &str = r"
CREATE TYPE payment_method AS ENUM (
    'EFECTIVO', 'YAPE', 'PLIN', 'TRANSFERENCIA', 'DEPOSITO', 'TARJETA'
);

CREATE TYPE movement_type AS ENUM ('INGRESO', 'EGRESO');

CREATE TYPE movement_category AS ENUM ('PENSION_MENSUAL', 'GASTOS_ADMINISTRATIVOS');

CREATE TYPE payment_kind AS ENUM ('INITIAL', 'MONTHLY');
";

const PAYMENT_RECORDS_SQL: &str = r"
-- One row per student; version increments on every committed write
CREATE TABLE payment_records (
    student_id UUID PRIMARY KEY,
    classroom_id UUID NOT NULL,
    schedule JSONB NOT NULL DEFAULT '[]'::jsonb,
    initial_amount NUMERIC(12, 2),
    initial_payment_date DATE,
    initial_method payment_method,
    version BIGINT NOT NULL DEFAULT 0,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    CONSTRAINT chk_schedule_array CHECK (jsonb_typeof(schedule) = 'array'),
    CONSTRAINT chk_initial_positive CHECK (initial_amount IS NULL OR initial_amount > 0),
    CONSTRAINT chk_initial_complete CHECK (
        (initial_amount IS NULL AND initial_payment_date IS NULL AND initial_method IS NULL)
        OR (initial_amount IS NOT NULL AND initial_payment_date IS NOT NULL AND initial_method IS NOT NULL)
    )
);

CREATE INDEX idx_payment_records_classroom ON payment_records(classroom_id);
";

const MONTHLY_PAYMENTS_SQL: &str = r"
-- At most one payment per student and period
CREATE TABLE monthly_payments (
    id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
    student_id UUID NOT NULL REFERENCES payment_records(student_id) ON DELETE CASCADE,
    month INTEGER NOT NULL,
    year INTEGER NOT NULL,
    amount NUMERIC(12, 2) NOT NULL,
    payment_date DATE NOT NULL,
    method payment_method NOT NULL,
    partial BOOLEAN NOT NULL DEFAULT false,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    CONSTRAINT uq_monthly_payment_period UNIQUE (student_id, month, year),
    CONSTRAINT chk_month_range CHECK (month BETWEEN 1 AND 12),
    CONSTRAINT chk_year_range CHECK (year BETWEEN 2000 AND 2100),
    CONSTRAINT chk_monthly_positive CHECK (amount > 0)
);
";

const CASH_MOVEMENTS_SQL: &str = r"
-- Append-only cash ledger (caja)
CREATE TABLE cash_movements (
    id UUID PRIMARY KEY,
    movement_type movement_type NOT NULL,
    amount NUMERIC(12, 2) NOT NULL,
    concept VARCHAR(255) NOT NULL,
    description TEXT NOT NULL,
    category movement_category NOT NULL,
    method payment_method NOT NULL,
    recorded_by UUID NOT NULL,
    student_id UUID REFERENCES payment_records(student_id),
    source_kind payment_kind,
    source_month INTEGER,
    source_year INTEGER,
    recorded_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    CONSTRAINT chk_movement_positive CHECK (amount > 0),
    CONSTRAINT chk_source_period CHECK (
        (source_kind = 'MONTHLY' AND source_month IS NOT NULL AND source_year IS NOT NULL)
        OR (source_kind IS DISTINCT FROM 'MONTHLY' AND source_month IS NULL AND source_year IS NULL)
    )
);

-- Summary and listing filters
CREATE INDEX idx_cash_movements_type_time ON cash_movements(movement_type, recorded_at DESC, id DESC);
CREATE INDEX idx_cash_movements_actor_time ON cash_movements(recorded_by, recorded_at DESC);
CREATE INDEX idx_cash_movements_student ON cash_movements(student_id, source_kind);
";

const TRIGGERS_SQL: &str = r"
-- ============================================================
-- FUNCTION: prevent_cash_movement_modification
-- Ledger rows are immutable once written
-- ============================================================
CREATE OR REPLACE FUNCTION prevent_cash_movement_modification()
RETURNS TRIGGER AS $$
BEGIN
    RAISE EXCEPTION 'Cash movements are append-only. Post a compensating movement instead.';
END;
$$ LANGUAGE plpgsql;

CREATE TRIGGER trg_cash_movements_immutable
BEFORE UPDATE OR DELETE ON cash_movements
FOR EACH ROW
EXECUTE FUNCTION prevent_cash_movement_modification();
";

const DROP_ALL_SQL: &str = r"
DROP TRIGGER IF EXISTS trg_cash_movements_immutable ON cash_movements;
DROP FUNCTION IF EXISTS prevent_cash_movement_modification();

DROP TABLE IF EXISTS cash_movements CASCADE;
DROP TABLE IF EXISTS monthly_payments CASCADE;
DROP TABLE IF EXISTS payment_records CASCADE;

DROP TYPE IF EXISTS payment_kind;
DROP TYPE IF EXISTS movement_category;
DROP TYPE IF EXISTS movement_type;
DROP TYPE IF EXISTS payment_method;
";
