//! `PostgreSQL` enum types.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use campus_core::tuition;

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "payment_method")]
pub enum PaymentMethod {
    #[sea_orm(string_value = "EFECTIVO")]
    Efectivo,
    #[sea_orm(string_value = "YAPE")]
    Yape,
    #[sea_orm(string_value = "PLIN")]
    Plin,
    #[sea_orm(string_value = "TRANSFERENCIA")]
    Transferencia,
    #[sea_orm(string_value = "DEPOSITO")]
    Deposito,
    #[sea_orm(string_value = "TARJETA")]
    Tarjeta,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "movement_type")]
pub enum MovementType {
    #[sea_orm(string_value = "INGRESO")]
    Ingreso,
    #[sea_orm(string_value = "EGRESO")]
    Egreso,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "movement_category")]
pub enum MovementCategory {
    #[sea_orm(string_value = "PENSION_MENSUAL")]
    PensionMensual,
    #[sea_orm(string_value = "GASTOS_ADMINISTRATIVOS")]
    GastosAdministrativos,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "payment_kind")]
pub enum PaymentKind {
    #[sea_orm(string_value = "INITIAL")]
    Initial,
    #[sea_orm(string_value = "MONTHLY")]
    Monthly,
}

impl From<tuition::PaymentMethod> for PaymentMethod {
    fn from(method: tuition::PaymentMethod) -> Self {
        match method {
            tuition::PaymentMethod::Efectivo => Self::Efectivo,
            tuition::PaymentMethod::Yape => Self::Yape,
            tuition::PaymentMethod::Plin => Self::Plin,
            tuition::PaymentMethod::Transferencia => Self::Transferencia,
            tuition::PaymentMethod::Deposito => Self::Deposito,
            tuition::PaymentMethod::Tarjeta => Self::Tarjeta,
        }
    }
}

impl From<PaymentMethod> for tuition::PaymentMethod {
    fn from(method: PaymentMethod) -> Self {
        match method {
            PaymentMethod::Efectivo => Self::Efectivo,
            PaymentMethod::Yape => Self::Yape,
            PaymentMethod::Plin => Self::Plin,
            PaymentMethod::Transferencia => Self::Transferencia,
            PaymentMethod::Deposito => Self::Deposito,
            PaymentMethod::Tarjeta => Self::Tarjeta,
        }
    }
}

impl From<tuition::MovementType> for MovementType {
    fn from(movement_type: tuition::MovementType) -> Self {
        match movement_type {
            tuition::MovementType::Income => Self::Ingreso,
            tuition::MovementType::Expense => Self::Egreso,
        }
    }
}

impl From<MovementType> for tuition::MovementType {
    fn from(movement_type: MovementType) -> Self {
        match movement_type {
            MovementType::Ingreso => Self::Income,
            MovementType::Egreso => Self::Expense,
        }
    }
}

impl From<tuition::MovementCategory> for MovementCategory {
    fn from(category: tuition::MovementCategory) -> Self {
        match category {
            tuition::MovementCategory::PensionMensual => Self::PensionMensual,
            tuition::MovementCategory::GastosAdministrativos => Self::GastosAdministrativos,
        }
    }
}

impl From<MovementCategory> for tuition::MovementCategory {
    fn from(category: MovementCategory) -> Self {
        match category {
            MovementCategory::PensionMensual => Self::PensionMensual,
            MovementCategory::GastosAdministrativos => Self::GastosAdministrativos,
        }
    }
}
