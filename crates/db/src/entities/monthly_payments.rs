//! `SeaORM` Entity for monthly_payments table.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use super::sea_orm_active_enums::PaymentMethod;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "monthly_payments")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub student_id: Uuid,
    pub month: i32,
    pub year: i32,
    #[sea_orm(column_type = "Decimal(Some((12, 2)))")]
    pub amount: Decimal,
    pub payment_date: Date,
    pub method: PaymentMethod,
    pub partial: bool,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
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
