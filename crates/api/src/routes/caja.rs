//! Cash ledger (caja) routes: monthly summary and movement listings.

use axum::{
    Json, Router,
    extract::{Query, State},
    routing::get,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{AppState, error::ApiError};
use campus_core::tuition::{CashMovement, CashSummary, MovementFilter, Period};
use campus_shared::types::{PageRequest, PageResponse, UserId, format_soles};

/// Creates the caja routes (requires auth middleware to be applied externally).
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/caja/summary", get(get_summary))
        .route("/caja/income", get(list_income))
        .route("/caja/expense", get(list_expense))
}

/// Query for the monthly summary.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryQuery {
    /// Month (1-12).
    pub month: u32,
    /// Year.
    pub year: i32,
    /// Only movements recorded by this user.
    pub actor_id: Option<Uuid>,
}

/// Query for a movement listing.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListQuery {
    /// Page number (1-indexed).
    pub page: Option<u32>,
    /// Page size.
    pub limit: Option<u32>,
    /// Month; requires `year`.
    pub month: Option<u32>,
    /// Year.
    pub year: Option<i32>,
    /// Only movements recorded by this user.
    pub actor_id: Option<Uuid>,
    /// First day included, `YYYY-MM-DD`.
    pub start_date: Option<NaiveDate>,
    /// Last day included, `YYYY-MM-DD`.
    pub end_date: Option<NaiveDate>,
}

impl ListQuery {
    fn filter(&self) -> Result<MovementFilter, ApiError> {
        Ok(MovementFilter::new(
            self.month,
            self.year,
            self.actor_id.map(UserId::from_uuid),
        )?
        .with_date_range(self.start_date, self.end_date)?)
    }

    fn page_request(&self) -> PageRequest {
        let defaults = PageRequest::default();
        PageRequest::new(
            self.page.unwrap_or(defaults.page),
            self.limit.unwrap_or(defaults.limit),
        )
    }
}

/// Summary for one month.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryResponse {
    /// Period summarized, `MM/YYYY`.
    pub period: String,
    /// Totals and counts.
    #[serde(flatten)]
    pub summary: CashSummary,
    /// Net balance for display, e.g. `S/.80.00`.
    pub net_balance_label: String,
}

/// GET `/caja/summary?month&year&actorId`
async fn get_summary(
    State(state): State<AppState>,
    Query(query): Query<SummaryQuery>,
) -> Result<Json<SummaryResponse>, ApiError> {
    let period = Period::new(query.month, query.year)?;
    let summary = state
        .tuition
        .get_summary(
            period.month(),
            period.year(),
            query.actor_id.map(UserId::from_uuid),
        )
        .await?;
    Ok(Json(SummaryResponse {
        period: period.to_string(),
        net_balance_label: format_soles(summary.net_balance),
        summary,
    }))
}

/// GET `/caja/income?page&limit&month&year&actorId&startDate&endDate`
async fn list_income(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<PageResponse<CashMovement>>, ApiError> {
    let page = state
        .tuition
        .list_income(query.filter()?, query.page_request())
        .await?;
    Ok(Json(page))
}

/// GET `/caja/expense?page&limit&month&year&actorId&startDate&endDate`
async fn list_expense(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<PageResponse<CashMovement>>, ApiError> {
    let page = state
        .tuition
        .list_expense(query.filter()?, query.page_request())
        .await?;
    Ok(Json(page))
}
