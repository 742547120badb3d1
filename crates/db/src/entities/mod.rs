//! `SeaORM` entities.

pub mod prelude;

pub mod cash_movements;
pub mod monthly_payments;
pub mod payment_records;
pub mod sea_orm_active_enums;
