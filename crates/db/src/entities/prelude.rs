//! Entity re-exports.

pub use super::cash_movements::Entity as CashMovements;
pub use super::monthly_payments::Entity as MonthlyPayments;
pub use super::payment_records::Entity as PaymentRecords;
