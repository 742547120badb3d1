//! Caja summaries and movement listings.

use std::cmp::Ordering;

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use campus_shared::types::{PageRequest, PageResponse, UserId};

use super::error::TuitionError;
use super::types::{CashMovement, MAX_PERIOD_YEAR, MIN_PERIOD_YEAR, MovementType, Period};

/// Selects movements by the calendar month/year of their timestamp (UTC),
/// an inclusive date range, and optionally the actor who recorded them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MovementFilter {
    month: Option<u32>,
    year: Option<i32>,
    recorded_by: Option<UserId>,
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
}

impl MovementFilter {
    /// Builds a filter.
    ///
    /// # Errors
    ///
    /// Returns `InvalidFilter` if a month is given without a year, and
    /// `InvalidPeriod` if either is out of range.
    pub fn new(
        month: Option<u32>,
        year: Option<i32>,
        recorded_by: Option<UserId>,
    ) -> Result<Self, TuitionError> {
        match (month, year) {
            (Some(_), None) => {
                return Err(TuitionError::InvalidFilter(
                    "month requires a year".to_string(),
                ));
            }
            (Some(month), Some(year)) => {
                Period::new(month, year)?;
            }
            (None, Some(year)) if !(MIN_PERIOD_YEAR..=MAX_PERIOD_YEAR).contains(&year) => {
                return Err(TuitionError::InvalidPeriod { month: 0, year });
            }
            _ => {}
        }

        Ok(Self {
            month,
            year,
            recorded_by,
            from: None,
            to: None,
        })
    }

    /// Restricts the filter to movements recorded between `from` and `to`
    /// (both inclusive, UTC dates). Either bound may be open.
    ///
    /// # Errors
    ///
    /// Returns `InvalidFilter` if `from` is after `to`.
    pub fn with_date_range(
        self,
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
    ) -> Result<Self, TuitionError> {
        if let (Some(from), Some(to)) = (from, to)
            && from > to
        {
            return Err(TuitionError::InvalidFilter(format!(
                "start date {from} is after end date {to}"
            )));
        }
        Ok(Self { from, to, ..self })
    }

    /// Filter for one month, optionally restricted to one actor.
    ///
    /// # Errors
    ///
    /// Returns `InvalidPeriod` for an out-of-range month or year.
    pub fn for_month(month: u32, year: i32, recorded_by: Option<UserId>) -> Result<Self, TuitionError> {
        Self::new(Some(month), Some(year), recorded_by)
    }

    /// Month filter, if any.
    #[must_use]
    pub const fn month(&self) -> Option<u32> {
        self.month
    }

    /// Year filter, if any.
    #[must_use]
    pub const fn year(&self) -> Option<i32> {
        self.year
    }

    /// Actor filter, if any.
    #[must_use]
    pub const fn recorded_by(&self) -> Option<UserId> {
        self.recorded_by
    }

    /// Start date bound, if any.
    #[must_use]
    pub const fn start_date(&self) -> Option<NaiveDate> {
        self.from
    }

    /// End date bound, if any.
    #[must_use]
    pub const fn end_date(&self) -> Option<NaiveDate> {
        self.to
    }

    /// Timestamp bounds of the date range: inclusive start, exclusive end.
    #[must_use]
    pub fn date_bounds(&self) -> (Option<DateTime<Utc>>, Option<DateTime<Utc>>) {
        let start = self.from.and_then(|date| date.and_hms_opt(0, 0, 0));
        let end = self
            .to
            .and_then(|date| date.succ_opt())
            .and_then(|date| date.and_hms_opt(0, 0, 0));
        (
            start.map(|at| Utc.from_utc_datetime(&at)),
            end.map(|at| Utc.from_utc_datetime(&at)),
        )
    }

    /// Half-open `[start, end)` timestamp range the filter selects.
    #[must_use]
    pub fn time_range(&self) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
        let year = self.year?;
        let (start, end) = match self.month {
            Some(12) => (
                NaiveDate::from_ymd_opt(year, 12, 1)?,
                NaiveDate::from_ymd_opt(year + 1, 1, 1)?,
            ),
            Some(month) => (
                NaiveDate::from_ymd_opt(year, month, 1)?,
                NaiveDate::from_ymd_opt(year, month + 1, 1)?,
            ),
            None => (
                NaiveDate::from_ymd_opt(year, 1, 1)?,
                NaiveDate::from_ymd_opt(year + 1, 1, 1)?,
            ),
        };
        Some((
            Utc.from_utc_datetime(&start.and_hms_opt(0, 0, 0)?),
            Utc.from_utc_datetime(&end.and_hms_opt(0, 0, 0)?),
        ))
    }

    /// Returns true if the movement is selected.
    #[must_use]
    pub fn matches(&self, movement: &CashMovement) -> bool {
        if self.recorded_by.is_some_and(|actor| actor != movement.recorded_by) {
            return false;
        }
        let (from, to) = self.date_bounds();
        if from.is_some_and(|from| movement.recorded_at < from)
            || to.is_some_and(|to| movement.recorded_at >= to)
        {
            return false;
        }
        self.time_range()
            .is_none_or(|(start, end)| movement.recorded_at >= start && movement.recorded_at < end)
    }
}

/// Income and expense totals for a filter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CashSummary {
    /// Sum of income amounts.
    pub income: Decimal,
    /// Sum of expense amounts.
    pub expense: Decimal,
    /// `income - expense`.
    pub net_balance: Decimal,
    /// Number of income movements.
    pub income_count: u64,
    /// Number of expense movements.
    pub expense_count: u64,
}

impl CashSummary {
    /// Builds a summary from precomputed totals.
    #[must_use]
    pub fn from_totals(income: Decimal, income_count: u64, expense: Decimal, expense_count: u64) -> Self {
        Self {
            income,
            expense,
            net_balance: income - expense,
            income_count,
            expense_count,
        }
    }
}

/// Stateless aggregation over ledger movements.
pub struct SummaryAggregator;

impl SummaryAggregator {
    /// Totals the movements selected by `filter`.
    ///
    /// # Errors
    ///
    /// Returns `TuitionError::Internal` if a total overflows.
    pub fn summarize<'a>(
        movements: impl IntoIterator<Item = &'a CashMovement>,
        filter: &MovementFilter,
    ) -> Result<CashSummary, TuitionError> {
        let (mut income, mut income_count) = (Decimal::ZERO, 0_u64);
        let (mut expense, mut expense_count) = (Decimal::ZERO, 0_u64);

        for movement in movements.into_iter().filter(|m| filter.matches(m)) {
            match movement.movement_type {
                MovementType::Income => {
                    income = checked_total(income, movement.amount)?;
                    income_count += 1;
                }
                MovementType::Expense => {
                    expense = checked_total(expense, movement.amount)?;
                    expense_count += 1;
                }
            }
        }

        Ok(CashSummary::from_totals(
            income,
            income_count,
            expense,
            expense_count,
        ))
    }

    /// Orders movements most recent first, breaking ties by ID descending.
    #[must_use]
    pub fn most_recent_first(a: &CashMovement, b: &CashMovement) -> Ordering {
        b.recorded_at
            .cmp(&a.recorded_at)
            .then_with(|| b.id.cmp(&a.id))
    }

    /// Returns one page of the movements of a type selected by `filter`.
    pub fn page<'a>(
        movements: impl IntoIterator<Item = &'a CashMovement>,
        movement_type: MovementType,
        filter: &MovementFilter,
        request: PageRequest,
    ) -> PageResponse<CashMovement> {
        let request = request.normalized();
        let mut selected: Vec<&CashMovement> = movements
            .into_iter()
            .filter(|m| m.movement_type == movement_type && filter.matches(m))
            .collect();
        selected.sort_by(|a, b| Self::most_recent_first(a, b));

        let total = selected.len() as u64;
        let offset = usize::try_from(request.offset()).unwrap_or(usize::MAX);
        let data = selected
            .into_iter()
            .skip(offset)
            .take(request.limit as usize)
            .cloned()
            .collect();

        PageResponse::new(data, request, total)
    }
}

fn checked_total(total: Decimal, amount: Decimal) -> Result<Decimal, TuitionError> {
    total
        .checked_add(amount)
        .ok_or_else(|| TuitionError::Internal("cash total overflow".to_string()))
}
