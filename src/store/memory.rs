//! In-memory backend used by the engine's own test suite (spec §9: "supply
//! both a real backend and an in-memory test backend; the test suite
//! exercises the engine directly against the in-memory backend").
//!
//! Transaction semantics are implemented by snapshotting the shared state
//! before running the closure and restoring it on error — there is no real
//! connection to hand out, so atomicity is modeled directly.

use chrono::{DateTime, NaiveDate, Utc};
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::error::{Error, Result};
use crate::model::{
    BudgetItem, BudgetItemId, BudgetOverride, CalendarEvent, CurrentEvent, EventUid,
    NewBudgetItem, NewBudgetOverride, NewCalendarEvent, OverrideId, UserId, new_event_uid,
};
use crate::store::reposition::compute_positions;
use crate::store::{CalendarStore, CurrentEventStore, PlanStore, Stores};

#[derive(Debug, Clone, Default)]
struct MemoryData {
    budget_items: Vec<BudgetItem>,
    overrides: Vec<BudgetOverride>,
    events: Vec<CalendarEvent>,
    current: std::collections::HashMap<UserId, CurrentEvent>,
    next_budget_id: i32,
    next_override_id: i32,
}

/// A cheaply-cloneable handle onto a shared in-memory dataset.
#[derive(Debug, Clone, Default)]
pub struct MemoryStores {
    data: Arc<Mutex<MemoryData>>,
}

impl MemoryStores {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl PlanStore for MemoryStores {
    async fn list_budget_items(
        &self,
        user: UserId,
        include_inactive: bool,
        today: NaiveDate,
    ) -> Result<Vec<BudgetItem>> {
        let data = self.data.lock().await;
        let mut items: Vec<BudgetItem> = data
            .budget_items
            .iter()
            .filter(|i| i.user_id == user && (include_inactive || i.active_on(today)))
            .cloned()
            .collect();
        items.sort_by_key(|i| i.position);
        Ok(items)
    }

    async fn find_budget_item(&self, user: UserId, id: BudgetItemId) -> Result<Option<BudgetItem>> {
        let data = self.data.lock().await;
        Ok(data
            .budget_items
            .iter()
            .find(|i| i.user_id == user && i.id == id)
            .cloned())
    }

    async fn list_overrides_for_week(
        &self,
        user: UserId,
        week_start: NaiveDate,
    ) -> Result<Vec<BudgetOverride>> {
        let data = self.data.lock().await;
        Ok(data
            .overrides
            .iter()
            .filter(|o| o.user_id == user && o.start_date == week_start)
            .cloned()
            .collect())
    }

    async fn create_budget_item(&self, user: UserId, new: NewBudgetItem) -> Result<BudgetItem> {
        let mut data = self.data.lock().await;
        let position = data
            .budget_items
            .iter()
            .filter(|i| i.user_id == user)
            .map(|i| i.position)
            .max()
            .map(|max| max + 100)
            .unwrap_or(100);
        data.next_budget_id += 1;
        let item = BudgetItem {
            id: BudgetItemId(data.next_budget_id),
            user_id: user,
            name: new.name,
            icon: new.icon,
            color: new.color,
            weekly_duration_s: new.weekly_duration_s,
            weekly_occurrences: new.weekly_occurrences,
            position,
            start_date: new.start_date,
            end_date: new.end_date,
        };
        data.budget_items.push(item.clone());
        Ok(item)
    }

    async fn update_budget_item(&self, user: UserId, item: BudgetItem) -> Result<BudgetItem> {
        let mut data = self.data.lock().await;
        let existing = data
            .budget_items
            .iter_mut()
            .find(|i| i.user_id == user && i.id == item.id)
            .ok_or_else(|| Error::not_found(format!("budget item {} not found", item.id)))?;
        *existing = item.clone();
        Ok(item)
    }

    async fn reorder_budget_item(
        &self,
        user: UserId,
        id: BudgetItemId,
        preceding_id: Option<BudgetItemId>,
    ) -> Result<()> {
        let mut data = self.data.lock().await;
        let mut ordered: Vec<(BudgetItemId, i32)> = data
            .budget_items
            .iter()
            .filter(|i| i.user_id == user)
            .map(|i| (i.id, i.position))
            .collect();
        ordered.sort_by_key(|(_, pos)| *pos);

        let updates = compute_positions(&ordered, id, preceding_id)?;
        for (updated_id, new_position) in updates {
            if let Some(i) = data
                .budget_items
                .iter_mut()
                .find(|i| i.user_id == user && i.id == updated_id)
            {
                i.position = new_position;
            }
        }
        Ok(())
    }

    async fn create_override(&self, user: UserId, new: NewBudgetOverride) -> Result<BudgetOverride> {
        let mut data = self.data.lock().await;
        data.next_override_id += 1;
        let override_ = BudgetOverride {
            id: OverrideId(data.next_override_id),
            user_id: user,
            budget_id: new.budget_id,
            start_date: new.start_date,
            weekly_duration_s: new.weekly_duration_s,
            notes: new.notes,
        };
        data.overrides.push(override_.clone());
        Ok(override_)
    }

    async fn update_override(
        &self,
        user: UserId,
        id: OverrideId,
        new: NewBudgetOverride,
    ) -> Result<BudgetOverride> {
        let mut data = self.data.lock().await;
        let existing = data
            .overrides
            .iter_mut()
            .find(|o| o.user_id == user && o.id == id)
            .ok_or_else(|| Error::not_found(format!("override {id} not found")))?;
        existing.budget_id = new.budget_id;
        existing.start_date = new.start_date;
        existing.weekly_duration_s = new.weekly_duration_s;
        existing.notes = new.notes;
        Ok(existing.clone())
    }

    async fn delete_override(&self, user: UserId, id: OverrideId) -> Result<()> {
        let mut data = self.data.lock().await;
        let before = data.overrides.len();
        data.overrides.retain(|o| !(o.user_id == user && o.id == id));
        if data.overrides.len() == before {
            return Err(Error::not_found(format!("override {id} not found")));
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl CalendarStore for MemoryStores {
    async fn store_event(&self, user: UserId, event: NewCalendarEvent) -> Result<CalendarEvent> {
        let mut data = self.data.lock().await;
        let stored = event.with_uid(new_event_uid(), user);
        data.events.push(stored.clone());
        Ok(stored)
    }

    async fn get_events(
        &self,
        user: UserId,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<CalendarEvent>> {
        let data = self.data.lock().await;
        let mut events: Vec<CalendarEvent> = data
            .events
            .iter()
            .filter(|e| e.user_id == user && e.start_time <= to && e.end_time >= from)
            .cloned()
            .collect();
        events.sort_by_key(|e| e.start_time);
        Ok(events)
    }

    async fn get_last_events(
        &self,
        user: UserId,
        limit: i64,
        now: DateTime<Utc>,
    ) -> Result<Vec<CalendarEvent>> {
        let data = self.data.lock().await;
        let mut events: Vec<CalendarEvent> = data
            .events
            .iter()
            .filter(|e| e.user_id == user && e.end_time <= now)
            .cloned()
            .collect();
        events.sort_by(|a, b| b.end_time.cmp(&a.end_time));
        events.truncate(limit.max(0) as usize);
        Ok(events)
    }

    async fn update_event(&self, user: UserId, event: CalendarEvent) -> Result<()> {
        let mut data = self.data.lock().await;
        let existing = data
            .events
            .iter_mut()
            .find(|e| e.user_id == user && e.uid == event.uid)
            .ok_or_else(|| Error::not_found(format!("event {} not found", event.uid)))?;
        *existing = event;
        Ok(())
    }

    async fn delete_event(&self, user: UserId, uid: EventUid) -> Result<()> {
        let mut data = self.data.lock().await;
        let before = data.events.len();
        data.events.retain(|e| !(e.user_id == user && e.uid == uid));
        if data.events.len() == before {
            return Err(Error::not_found(format!("event {uid} not found")));
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl CurrentEventStore for MemoryStores {
    async fn find_current(&self, user: UserId) -> Result<Option<CurrentEvent>> {
        let data = self.data.lock().await;
        Ok(data.current.get(&user).cloned())
    }

    async fn upsert_current(&self, user: UserId, event: CurrentEvent) -> Result<()> {
        let mut data = self.data.lock().await;
        data.current.insert(user, event);
        Ok(())
    }

    async fn delete_current(&self, user: UserId) -> Result<Option<CurrentEvent>> {
        let mut data = self.data.lock().await;
        Ok(data.current.remove(&user))
    }
}

#[async_trait::async_trait]
impl Stores for MemoryStores {
    async fn with_transaction<F, Fut, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(Self) -> Fut + Send + 'static,
        Fut: std::future::Future<Output = Result<T>> + Send,
        T: Send + 'static,
    {
        let before = self.data.lock().await.clone();
        match f(self.clone()).await {
            Ok(value) => Ok(value),
            Err(err) => {
                *self.data.lock().await = before;
                Err(err)
            }
        }
    }
}
