//! Derived statistics: per-day and per-budget totals over a week window.
//!
//! Nothing in this module is persisted; it is recomputed on every request
//! from the Plan Store, Calendar Store, and Current-Event Store.

use chrono::NaiveDate;
use serde::Serialize;

use crate::model::BudgetItemId;

/// A budget's contribution to a single day.
#[derive(Debug, Clone, Serialize)]
pub struct DayBudgetStat {
    pub budget_id: BudgetItemId,
    pub duration_s: i64,
}

/// One calendar day of the week window.
#[derive(Debug, Clone, Serialize)]
pub struct DayStats {
    pub date: NaiveDate,
    pub budgets: Vec<DayBudgetStat>,
    pub total_s: i64,
}

/// A budget's totals across the whole week window.
#[derive(Debug, Clone, Serialize)]
pub struct BudgetStat {
    pub budget_id: BudgetItemId,
    pub name: String,
    pub planned_s: i64,
    pub duration_s: i64,
    pub remaining_s: i64,
}

/// The full result of §4.5's aggregation algorithm.
#[derive(Debug, Clone, Serialize)]
pub struct StatsSummary {
    pub week_start: NaiveDate,
    pub week_end: NaiveDate,
    pub daily: Vec<DayStats>,
    pub budgets: Vec<BudgetStat>,
    pub total_planned_s: i64,
    pub total_time_s: i64,
    pub total_remaining_s: i64,
}

impl StatsSummary {
    /// An empty summary for a week with no active plan items. Not an error
    /// (spec §7): a stats request for an empty plan returns an empty summary.
    pub fn empty(week_start: NaiveDate, week_end: NaiveDate) -> Self {
        Self {
            week_start,
            week_end,
            daily: Vec::new(),
            budgets: Vec::new(),
            total_planned_s: 0,
            total_time_s: 0,
            total_remaining_s: 0,
        }
    }
}
