//! Capability traits the engine depends on, not database vendors (spec §9).
//!
//! Two backends implement these traits: [`postgres`] for production and
//! [`memory`] for the engine's own test suite. Engine code (`engine::*`) is
//! generic over `S: Stores` and never knows which one it's talking to.

use chrono::{DateTime, NaiveDate, Utc};

use crate::error::Result;
use crate::model::{
    BudgetItem, BudgetItemId, BudgetOverride, CalendarEvent, CurrentEvent, EventUid,
    NewBudgetItem, NewBudgetOverride, NewCalendarEvent, OverrideId, UserId,
};

pub mod memory;
pub mod postgres;

/// Read-only access to budget-plan items and per-week overrides (spec §4.1),
/// plus the write operations the HTTP surface (spec §6) implies but §4.1
/// only names obliquely.
#[async_trait::async_trait]
pub trait PlanStore: Send + Sync {
    /// Ordered by `position` ascending. When `include_inactive` is false,
    /// filtered to items active on `today`.
    async fn list_budget_items(
        &self,
        user: UserId,
        include_inactive: bool,
        today: NaiveDate,
    ) -> Result<Vec<BudgetItem>>;

    async fn find_budget_item(&self, user: UserId, id: BudgetItemId) -> Result<Option<BudgetItem>>;

    /// Overrides whose `start_date` equals `week_start` exactly.
    async fn list_overrides_for_week(
        &self,
        user: UserId,
        week_start: NaiveDate,
    ) -> Result<Vec<BudgetOverride>>;

    /// Assigns `position = max(existing positions) + 100` (spec §4.1).
    async fn create_budget_item(&self, user: UserId, new: NewBudgetItem) -> Result<BudgetItem>;

    /// Fails with `NotFound` if no item with `item.id` exists for `user`
    /// (spec §9 Open Questions: pinned to `NotFound`, not `Internal`).
    async fn update_budget_item(&self, user: UserId, item: BudgetItem) -> Result<BudgetItem>;

    /// "Move `id` after `preceding_id`" (or to the front, if `None`), per the
    /// three-case sparse reposition scheme of spec §4.1.
    async fn reorder_budget_item(
        &self,
        user: UserId,
        id: BudgetItemId,
        preceding_id: Option<BudgetItemId>,
    ) -> Result<()>;

    async fn create_override(&self, user: UserId, new: NewBudgetOverride) -> Result<BudgetOverride>;

    async fn update_override(
        &self,
        user: UserId,
        id: OverrideId,
        new: NewBudgetOverride,
    ) -> Result<BudgetOverride>;

    async fn delete_override(&self, user: UserId, id: OverrideId) -> Result<()>;
}

/// Persists closed intervals keyed by user (spec §4.2).
#[async_trait::async_trait]
pub trait CalendarStore: Send + Sync {
    /// Assigns a fresh uid.
    async fn store_event(&self, user: UserId, event: NewCalendarEvent) -> Result<CalendarEvent>;

    /// Closed-closed containment: every event with `start <= to && end >= from`,
    /// ordered by `start_time` ascending.
    async fn get_events(
        &self,
        user: UserId,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<CalendarEvent>>;

    /// The `limit` most recent events with `end_time <= now`, ordered by
    /// `end_time` descending.
    async fn get_last_events(
        &self,
        user: UserId,
        limit: i64,
        now: DateTime<Utc>,
    ) -> Result<Vec<CalendarEvent>>;

    /// By uid; fails with `NotFound` if no row matches `(user, uid)`.
    async fn update_event(&self, user: UserId, event: CalendarEvent) -> Result<()>;

    async fn delete_event(&self, user: UserId, uid: EventUid) -> Result<()>;
}

/// Per-user single-row upsert of the open entry (spec §4 Current-Event Store).
#[async_trait::async_trait]
pub trait CurrentEventStore: Send + Sync {
    async fn find_current(&self, user: UserId) -> Result<Option<CurrentEvent>>;

    async fn upsert_current(&self, user: UserId, event: CurrentEvent) -> Result<()>;

    /// Returns the prior entry, if any.
    async fn delete_current(&self, user: UserId) -> Result<Option<CurrentEvent>>;
}

/// The combined capability set the engine depends on, plus the transactional
/// envelope every multi-step engine operation runs inside (spec §4.2, §5).
///
/// Implementations must be cheap to clone: the handle passed into a
/// transaction closure is a clone of `self` bound to that transaction's
/// connection, not a borrow, so engine code can pass it around freely.
#[async_trait::async_trait]
pub trait Stores: PlanStore + CalendarStore + CurrentEventStore + Clone + Send + Sync + 'static {
    /// Executes `f` against a handle whose writes either all commit or all
    /// roll back. Calling `with_transaction` again from inside `f` (flat
    /// nesting) must reuse the same underlying transaction rather than
    /// starting a new one.
    async fn with_transaction<F, Fut, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(Self) -> Fut + Send + 'static,
        Fut: std::future::Future<Output = Result<T>> + Send,
        T: Send + 'static;
}
