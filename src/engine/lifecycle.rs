//! Current-Event Lifecycle: the two-state machine (Absent / Running) and
//! its four transitions (spec §4.4). All multi-store mutations run inside a
//! single transaction to preserve "at most one running entry, and any
//! closed prior entry ends exactly at the running entry's start".

use chrono::{DateTime, Duration, Utc};

use crate::context::UserContext;
use crate::engine::sticky::{StickyTarget, sticky_insert};
use crate::error::{Error, Result};
use crate::model::{CalendarEvent, CurrentEvent, NewCurrentEvent, UserId};
use crate::store::{CalendarStore, CurrentEventStore, Stores};

const SHORT_EVENT_THRESHOLD: Duration = Duration::seconds(60);
const SHIFT_LOOKBACK: Duration = Duration::hours(24);

/// `StartNew` (spec §4.4): commits the prior Running entry (if any) as a
/// closed calendar event through the Sticky Engine, then upserts `new` as
/// the fresh Current Event. Short fragments are absorbed rather than
/// committed when `ctx.ignore_short_events` is set.
pub async fn start_new<S: Stores>(
    stores: &S,
    ctx: &UserContext,
    user: UserId,
    new: NewCurrentEvent,
    now: DateTime<Utc>,
) -> Result<CurrentEvent> {
    let ignore_short_events = ctx.ignore_short_events;
    stores
        .with_transaction(move |tx| async move {
            let prior = tx.find_current(user).await?;
            let mut start_time = new.start_time.unwrap_or(now);

            if let Some(p) = &prior {
                let elapsed = now - p.start_time;
                if ignore_short_events && elapsed < SHORT_EVENT_THRESHOLD {
                    // Absorb: the short fragment's start carries forward into `new`.
                    start_time = p.start_time;
                } else {
                    sticky_insert(
                        &tx,
                        ctx,
                        user,
                        StickyTarget {
                            uid: None,
                            summary: p.name.clone(),
                            start_time: p.start_time,
                            end_time: now,
                            budget_item_id: p.budget_item_id,
                        },
                    )
                    .await?;
                }
            }

            let current = CurrentEvent {
                user_id: user,
                budget_item_id: new.budget_item_id,
                name: new.name,
                weekly_duration_s: new.weekly_duration_s,
                start_time,
            };
            tx.upsert_current(user, current.clone()).await?;
            Ok(current)
        })
        .await
}

/// `ShiftCurrentStart` (spec §4.4). Rejects a future `new_start`. The
/// nearest prior event in the 24h lookback before the *old* `C.start` is
/// extended to meet `new_start`; every other event in that lookback, and
/// any event that ends up strictly between the old and new start, is
/// deleted (swallowed).
pub async fn shift_current_start<S: Stores>(
    stores: &S,
    user: UserId,
    new_start: DateTime<Utc>,
    now: DateTime<Utc>,
) -> Result<CurrentEvent> {
    if new_start > now {
        return Err(Error::invalid_argument("shift start time cannot be in the future"));
    }

    stores
        .with_transaction(move |tx| async move {
            let mut current = tx
                .find_current(user)
                .await?
                .ok_or_else(|| Error::not_found("no current event"))?;

            let old_start = current.start_time;
            let lookback_start = old_start - SHIFT_LOOKBACK;

            let mut prev: Vec<_> = tx
                .get_events(user, lookback_start + Duration::nanoseconds(1), old_start)
                .await?
                .into_iter()
                .filter(|e| e.end_time > lookback_start && e.end_time <= old_start)
                .collect();
            prev.sort_by_key(|e| e.start_time);

            let earliest = if prev.is_empty() { None } else { Some(prev.remove(0)) };
            for stale in prev {
                tx.delete_event(user, stale.uid).await?;
            }

            if new_start > old_start {
                let between = tx.get_events(user, old_start, new_start).await?;
                for e in between {
                    if e.start_time >= old_start && e.end_time <= new_start {
                        tx.delete_event(user, e.uid).await?;
                    }
                }
            }

            if let Some(mut extended) = earliest {
                extended.end_time = new_start;
                tx.update_event(user, extended).await?;
            }

            current.start_time = new_start;
            tx.upsert_current(user, current.clone()).await?;
            Ok(current)
        })
        .await
}

/// `Finish` (spec §4.4, §6 `PATCH /api/event/current/status`): commits the
/// Running entry as a closed calendar event ending at `now` and clears the
/// Current-Event slot. Returns the committed events (the target piece plus
/// any midnight-straddle remnants).
pub async fn finish_current<S: Stores>(
    stores: &S,
    ctx: &UserContext,
    user: UserId,
    now: DateTime<Utc>,
) -> Result<Vec<CalendarEvent>> {
    stores
        .with_transaction(move |tx| async move {
            let current = tx.find_current(user).await?.ok_or_else(|| Error::not_found("no current event"))?;
            if now <= current.start_time {
                return Err(Error::invalid_argument("finish time must be after the current event's start"));
            }
            let committed = sticky_insert(
                &tx,
                ctx,
                user,
                StickyTarget {
                    uid: None,
                    summary: current.name.clone(),
                    start_time: current.start_time,
                    end_time: now,
                    budget_item_id: current.budget_item_id,
                },
            )
            .await?;
            tx.delete_current(user).await?;
            Ok(committed)
        })
        .await
}

/// `DeleteCurrent` (spec §4.4): drops the row, returning the prior entry.
pub async fn delete_current<S: CurrentEventStore>(stores: &S, user: UserId) -> Result<Option<CurrentEvent>> {
    stores.delete_current(user).await
}

/// `FindCurrent` (spec §4.4).
pub async fn find_current<S: CurrentEventStore>(stores: &S, user: UserId) -> Result<Option<CurrentEvent>> {
    stores.find_current(user).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{BudgetItemId, NewCalendarEvent, UserId};
    use crate::store::memory::MemoryStores;
    use chrono::TimeZone;

    fn ctx(ignore_short_events: bool) -> UserContext {
        UserContext::new(UserId(1), chrono_tz::Europe::Warsaw, None, ignore_short_events)
    }

    fn dt(y: i32, m: u32, d: u32, h: u32, mi: u32, s: u32) -> DateTime<Utc> {
        chrono_tz::Europe::Warsaw
            .with_ymd_and_hms(y, m, d, h, mi, s)
            .unwrap()
            .with_timezone(&Utc)
    }

    #[tokio::test]
    async fn start_new_commits_prior_event() {
        let stores = MemoryStores::new();
        let user = UserId(1);
        let c = ctx(false);

        stores
            .upsert_current(
                user,
                CurrentEvent {
                    user_id: user,
                    budget_item_id: BudgetItemId(123),
                    name: "P's name".to_string(),
                    weekly_duration_s: 0,
                    start_time: dt(2026, 7, 20, 11, 6, 0),
                },
            )
            .await
            .unwrap();

        let now = dt(2026, 7, 20, 14, 0, 0);
        let current = start_new(
            &stores,
            &c,
            user,
            NewCurrentEvent {
                budget_item_id: BudgetItemId(345),
                name: "N".to_string(),
                weekly_duration_s: 0,
                start_time: None,
            },
            now,
        )
        .await
        .unwrap();

        assert_eq!(current.start_time, now);
        let events = stores
            .get_events(user, dt(2026, 7, 20, 0, 0, 0), dt(2026, 7, 20, 23, 59, 59))
            .await
            .unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].summary, "P's name");
        assert_eq!(events[0].budget_item_id, BudgetItemId(123));
        assert_eq!(events[0].start_time, dt(2026, 7, 20, 11, 6, 0));
        assert_eq!(events[0].end_time, now);
    }

    #[tokio::test]
    async fn short_event_skip_absorbs_fragment() {
        let stores = MemoryStores::new();
        let user = UserId(1);
        let c = ctx(true);

        let p_start = dt(2026, 7, 20, 13, 59, 15);
        stores
            .upsert_current(
                user,
                CurrentEvent {
                    user_id: user,
                    budget_item_id: BudgetItemId(1),
                    name: "P".to_string(),
                    weekly_duration_s: 0,
                    start_time: p_start,
                },
            )
            .await
            .unwrap();

        let now = dt(2026, 7, 20, 14, 0, 0); // 45s later
        let current = start_new(
            &stores,
            &c,
            user,
            NewCurrentEvent {
                budget_item_id: BudgetItemId(2),
                name: "N".to_string(),
                weekly_duration_s: 0,
                start_time: None,
            },
            now,
        )
        .await
        .unwrap();

        assert_eq!(current.start_time, p_start);
        assert_eq!(current.name, "N");
        let events = stores
            .get_events(user, dt(2026, 7, 20, 0, 0, 0), dt(2026, 7, 20, 23, 59, 59))
            .await
            .unwrap();
        assert!(events.is_empty());
    }

    #[tokio::test]
    async fn shift_start_backward_swallows_prior_event() {
        let stores = MemoryStores::new();
        let user = UserId(1);

        let e1 = stores
            .store_event(
                user,
                NewCalendarEvent {
                    summary: "E1".to_string(),
                    start_time: dt(2026, 7, 20, 10, 0, 0),
                    end_time: dt(2026, 7, 20, 10, 50, 0),
                    budget_item_id: BudgetItemId(1),
                },
            )
            .await
            .unwrap();
        stores
            .store_event(
                user,
                NewCalendarEvent {
                    summary: "E2".to_string(),
                    start_time: dt(2026, 7, 20, 10, 50, 0),
                    end_time: dt(2026, 7, 20, 12, 0, 0),
                    budget_item_id: BudgetItemId(2),
                },
            )
            .await
            .unwrap();
        stores
            .upsert_current(
                user,
                CurrentEvent {
                    user_id: user,
                    budget_item_id: BudgetItemId(3),
                    name: "C".to_string(),
                    weekly_duration_s: 0,
                    start_time: dt(2026, 7, 20, 12, 0, 0),
                },
            )
            .await
            .unwrap();

        let now = dt(2026, 7, 20, 13, 0, 0);

        // No-op shift to the unchanged boundary.
        shift_current_start(&stores, user, dt(2026, 7, 20, 10, 50, 0), now)
            .await
            .unwrap();
        let events = stores
            .get_events(user, dt(2026, 7, 20, 0, 0, 0), dt(2026, 7, 20, 23, 59, 59))
            .await
            .unwrap();
        assert_eq!(events.len(), 2);

        // Shift backward past E2: E2 deleted, E1 extended to 10:30.
        let current = shift_current_start(&stores, user, dt(2026, 7, 20, 10, 30, 0), now)
            .await
            .unwrap();
        assert_eq!(current.start_time, dt(2026, 7, 20, 10, 30, 0));

        let mut events = stores
            .get_events(user, dt(2026, 7, 20, 0, 0, 0), dt(2026, 7, 20, 23, 59, 59))
            .await
            .unwrap();
        events.sort_by_key(|e| e.start_time);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].uid, e1.uid);
        assert_eq!(events[0].end_time, dt(2026, 7, 20, 10, 30, 0));
    }
}
