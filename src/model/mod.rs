//! Core data model: budgets, overrides, calendar events, the current event,
//! and the identifiers that tie them to a user.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

mod ids;
pub mod stats;

pub use ids::{BudgetItemId, EventUid, OverrideId, UserId};

/// A named bucket of weekly time the user plans to spend on a category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct BudgetItem {
    pub id: BudgetItemId,
    pub user_id: UserId,
    pub name: String,
    pub icon: Option<String>,
    pub color: Option<String>,
    /// Weekly allowance, in seconds.
    pub weekly_duration_s: i64,
    pub weekly_occurrences: Option<i32>,
    pub position: i32,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

impl BudgetItem {
    /// Active on a single date iff `start_date <= date <= end_date`, treating
    /// an absent bound as +/-infinity.
    pub fn active_on(&self, date: NaiveDate) -> bool {
        self.start_date.is_none_or(|start| start <= date) && self.end_date.is_none_or(|end| date <= end)
    }

    /// Active in `[from, to]` iff the item's own `[start, end]` intersects it
    /// under the same open-bound convention.
    pub fn active_in_range(&self, from: NaiveDate, to: NaiveDate) -> bool {
        let starts_before_range_ends = self.start_date.is_none_or(|start| start <= to);
        let ends_after_range_starts = self.end_date.is_none_or(|end| end >= from);
        starts_before_range_ends && ends_after_range_starts
    }
}

/// A fresh budget item before a position/id has been assigned by the store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewBudgetItem {
    pub name: String,
    pub icon: Option<String>,
    pub color: Option<String>,
    pub weekly_duration_s: i64,
    pub weekly_occurrences: Option<i32>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

/// A per-week adjustment to a budget's weekly allowance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct BudgetOverride {
    pub id: OverrideId,
    pub user_id: UserId,
    pub budget_id: BudgetItemId,
    /// The Monday-or-equivalent that anchors the week this override applies to.
    pub start_date: NaiveDate,
    pub weekly_duration_s: i64,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewBudgetOverride {
    pub budget_id: BudgetItemId,
    pub start_date: NaiveDate,
    pub weekly_duration_s: i64,
    pub notes: Option<String>,
}

/// A closed, non-overlapping past interval attributed to a budget.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct CalendarEvent {
    pub uid: EventUid,
    pub user_id: UserId,
    pub summary: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub budget_item_id: BudgetItemId,
}

impl CalendarEvent {
    pub fn duration(&self) -> chrono::Duration {
        self.end_time - self.start_time
    }
}

/// A calendar event prior to uid assignment.
#[derive(Debug, Clone)]
pub struct NewCalendarEvent {
    pub summary: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub budget_item_id: BudgetItemId,
}

impl NewCalendarEvent {
    pub fn with_uid(self, uid: EventUid, user_id: UserId) -> CalendarEvent {
        CalendarEvent {
            uid,
            user_id,
            summary: self.summary,
            start_time: self.start_time,
            end_time: self.end_time,
            budget_item_id: self.budget_item_id,
        }
    }
}

/// The single open-ended interval representing "what the user is doing right now".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct CurrentEvent {
    pub user_id: UserId,
    pub budget_item_id: BudgetItemId,
    pub name: String,
    /// Cached from the budget item at start time; seconds.
    pub weekly_duration_s: i64,
    pub start_time: DateTime<Utc>,
}

/// Request payload to start a new current event.
#[derive(Debug, Clone)]
pub struct NewCurrentEvent {
    pub budget_item_id: BudgetItemId,
    pub name: String,
    pub weekly_duration_s: i64,
    pub start_time: Option<DateTime<Utc>>,
}

/// Generate a fresh opaque uid for a calendar event.
pub fn new_event_uid() -> EventUid {
    EventUid(Uuid::new_v4())
}
