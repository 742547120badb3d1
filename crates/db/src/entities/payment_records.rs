//! `SeaORM` Entity for payment_records table.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use super::sea_orm_active_enums::PaymentMethod;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "payment_records")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub student_id: Uuid,
    pub classroom_id: Uuid,
    #[sea_orm(column_type = "JsonBinary")]
    pub schedule: Json,
    #[sea_orm(column_type = "Decimal(Some((12, 2)))", nullable)]
    pub initial_amount: Option<Decimal>,
    pub initial_payment_date: Option<Date>,
    pub initial_method: Option<PaymentMethod>,
    pub version: i64,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::monthly_payments::Entity")]
    MonthlyPayments,
}

impl Related<super::monthly_payments::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::MonthlyPayments.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
