//! `SeaORM` Entity for cash_movements table.
//!
//! Rows are append-only; the amount is always positive and the direction
//! lives in `movement_type`.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use super::sea_orm_active_enums::{MovementCategory, MovementType, PaymentKind, PaymentMethod};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "cash_movements")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub movement_type: MovementType,
    #[sea_orm(column_type = "Decimal(Some((12, 2)))")]
    pub amount: Decimal,
    pub concept: String,
    pub description: String,
    pub category: MovementCategory,
    pub method: PaymentMethod,
    pub recorded_by: Uuid,
    pub student_id: Option<Uuid>,
    pub source_kind: Option<PaymentKind>,
    pub source_month: Option<i32>,
    pub source_year: Option<i32>,
    pub recorded_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::payment_records::Entity",
        from = "Column::StudentId",
        to = "super::payment_records::Column::StudentId"
    )]
    PaymentRecords,
}

impl Related<super::payment_records::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::PaymentRecords.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
