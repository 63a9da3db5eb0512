//! The Sticky Calendar Engine: day-boundary splitting plus the overlap
//! case-analysis planner that keeps a user's calendar non-overlapping
//! (spec §4.3). The planner itself is a pure function over
//! `(target, existing)`; `sticky_insert` is the transactional shell that
//! fetches overlappers, applies the plan, and writes the target.

use chrono::{DateTime, Utc};

use crate::context::UserContext;
use crate::error::Result;
use crate::model::{BudgetItemId, CalendarEvent, EventUid, NewCalendarEvent, UserId};
use crate::store::Stores;

/// An interval to reconcile into the calendar. `uid` is `Some` when this is
/// an update of an existing event (e.g. committing the current event); it
/// stays `None` for a plain insert, in which case the store assigns one.
#[derive(Debug, Clone)]
pub struct StickyTarget {
    pub uid: Option<EventUid>,
    pub summary: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub budget_item_id: BudgetItemId,
}

#[derive(Debug, Clone)]
enum PlannedAction {
    Delete(EventUid),
    Modify(CalendarEvent),
    Create(NewCalendarEvent),
}

/// Splits `target` on local-day boundaries (spec §4.3 "Day-boundary
/// splitter"). Only the first piece carries the original `uid`; later
/// pieces are always fresh inserts.
pub fn split_day_boundaries(ctx: &UserContext, target: &StickyTarget) -> Vec<StickyTarget> {
    let last_instant = target.end_time - chrono::Duration::nanoseconds(1);
    if ctx.local_date(target.start_time) == ctx.local_date(last_instant) {
        return vec![target.clone()];
    }

    let mut pieces = Vec::new();
    let mut cursor = target.start_time;
    let mut first = true;
    loop {
        let (day_start, day_end) = ctx.day_bounds(ctx.local_date(cursor));
        let piece_end = if day_end < target.end_time { day_end + chrono::Duration::nanoseconds(1) } else { target.end_time };
        pieces.push(StickyTarget {
            uid: if first { target.uid } else { None },
            summary: target.summary.clone(),
            start_time: cursor,
            end_time: piece_end,
            budget_item_id: target.budget_item_id,
        });
        first = false;
        if piece_end >= target.end_time {
            break;
        }
        cursor = day_start + chrono::Duration::days(1);
    }
    pieces
}

/// Case-analysis planner (spec §4.3 table). Pure: takes the events already
/// known to overlap `target` and returns the writes needed to restore the
/// non-overlap invariant, in commit order (deletes, then shrinking
/// modifications, then creations).
fn plan_overlaps(target: &StickyTarget, existing: &[CalendarEvent]) -> Vec<PlannedAction> {
    let mut deletes = Vec::new();
    let mut modifies = Vec::new();
    let mut creates = Vec::new();

    for e in existing {
        // Touching-only or disjoint: the half-open non-overlap invariant
        // already holds, no action needed.
        if e.end_time <= target.start_time || e.start_time >= target.end_time {
            continue;
        }

        let starts_before = e.start_time < target.start_time;
        let ends_after = e.end_time > target.end_time;

        match (starts_before, ends_after) {
            (true, true) => {
                // Straddling: shrink E to end at T.start, spawn a fresh
                // piece [T.end, E.end) that copies E's own summary/budget.
                let mut shrunk = e.clone();
                shrunk.end_time = target.start_time;
                if shrunk.start_time < shrunk.end_time {
                    modifies.push(PlannedAction::Modify(shrunk));
                } else {
                    deletes.push(PlannedAction::Delete(e.uid));
                }
                creates.push(PlannedAction::Create(NewCalendarEvent {
                    summary: e.summary.clone(),
                    start_time: target.end_time,
                    end_time: e.end_time,
                    budget_item_id: e.budget_item_id,
                }));
            }
            (true, false) => {
                // Left-overlap: E starts before T and ends within it.
                let mut shrunk = e.clone();
                shrunk.end_time = target.start_time;
                if shrunk.start_time < shrunk.end_time {
                    modifies.push(PlannedAction::Modify(shrunk));
                } else {
                    deletes.push(PlannedAction::Delete(e.uid));
                }
            }
            (false, true) => {
                // Right-overlap: E starts at or after T and ends after it.
                let mut shrunk = e.clone();
                shrunk.start_time = target.end_time;
                if shrunk.start_time < shrunk.end_time {
                    modifies.push(PlannedAction::Modify(shrunk));
                } else {
                    deletes.push(PlannedAction::Delete(e.uid));
                }
            }
            (false, false) => {
                // Contained (including an exact bound match): replaced by T.
                deletes.push(PlannedAction::Delete(e.uid));
            }
        }
    }

    let mut plan = deletes;
    plan.extend(modifies);
    plan.extend(creates);
    plan
}

/// Reconciles `target` into `user`'s calendar, atomically, following the
/// sticky semantics of spec §4.3. Returns every event the call wrote
/// (the target pieces plus any straddle-created remnants), in write order.
pub async fn sticky_insert<S: Stores>(
    stores: &S,
    ctx: &UserContext,
    user: UserId,
    target: StickyTarget,
) -> Result<Vec<CalendarEvent>> {
    let pieces = split_day_boundaries(ctx, &target);
    stores
        .with_transaction(move |tx| {
            async move {
                let mut written = Vec::new();
                for piece in pieces {
                    let existing: Vec<_> = tx
                        .get_events(user, piece.start_time, piece.end_time)
                        .await?
                        .into_iter()
                        .filter(|e| Some(e.uid) != piece.uid)
                        .collect();
                    let plan = plan_overlaps(&piece, &existing);
                    for action in plan {
                        match action {
                            PlannedAction::Delete(uid) => {
                                tx.delete_event(user, uid).await?;
                            }
                            PlannedAction::Modify(event) => {
                                tx.update_event(user, event).await?;
                            }
                            PlannedAction::Create(new_event) => {
                                let created = tx.store_event(user, new_event).await?;
                                written.push(created);
                            }
                        }
                    }

                    let stored = match piece.uid {
                        Some(uid) => {
                            let event = CalendarEvent {
                                uid,
                                user_id: user,
                                summary: piece.summary,
                                start_time: piece.start_time,
                                end_time: piece.end_time,
                                budget_item_id: piece.budget_item_id,
                            };
                            tx.update_event(user, event.clone()).await?;
                            event
                        }
                        None => {
                            tx.store_event(
                                user,
                                NewCalendarEvent {
                                    summary: piece.summary,
                                    start_time: piece.start_time,
                                    end_time: piece.end_time,
                                    budget_item_id: piece.budget_item_id,
                                },
                            )
                            .await?
                        }
                    };
                    written.push(stored);
                }
                Ok(written)
            }
        })
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{BudgetItemId, UserId};
    use crate::store::memory::MemoryStores;
    use chrono::TimeZone;

    fn ctx() -> UserContext {
        UserContext::new(UserId(1), chrono_tz::Europe::Warsaw, None, false)
    }

    fn dt(y: i32, m: u32, d: u32, h: u32, mi: u32, s: u32) -> DateTime<Utc> {
        chrono_tz::Europe::Warsaw
            .with_ymd_and_hms(y, m, d, h, mi, s)
            .unwrap()
            .with_timezone(&Utc)
    }

    #[tokio::test]
    async fn insert_over_two_neighbours() {
        let stores = MemoryStores::new();
        let user = UserId(1);
        let c = ctx();

        for (summary, budget, start, end) in [
            ("E1", 101, (8, 0, 0), (10, 0, 0)),
            ("E2", 102, (10, 0, 0), (12, 0, 0)),
            ("E3", 103, (12, 0, 0), (14, 0, 0)),
        ] {
            sticky_insert(
                &stores,
                &c,
                user,
                StickyTarget {
                    uid: None,
                    summary: summary.to_string(),
                    start_time: dt(2026, 7, 20, start.0, start.1, start.2),
                    end_time: dt(2026, 7, 20, end.0, end.1, end.2),
                    budget_item_id: BudgetItemId(budget),
                },
            )
            .await
            .unwrap();
        }

        sticky_insert(
            &stores,
            &c,
            user,
            StickyTarget {
                uid: None,
                summary: "T".to_string(),
                start_time: dt(2026, 7, 20, 9, 0, 0),
                end_time: dt(2026, 7, 20, 13, 0, 0),
                budget_item_id: BudgetItemId(101),
            },
        )
        .await
        .unwrap();

        use crate::store::CalendarStore;
        let mut events = stores
            .get_events(user, dt(2026, 7, 20, 0, 0, 0), dt(2026, 7, 20, 23, 59, 59))
            .await
            .unwrap();
        events.sort_by_key(|e| e.start_time);

        assert_eq!(events.len(), 3);
        assert_eq!(events[0].summary, "E1");
        assert_eq!(events[0].end_time, dt(2026, 7, 20, 9, 0, 0));
        assert_eq!(events[1].summary, "T");
        assert_eq!(events[1].start_time, dt(2026, 7, 20, 9, 0, 0));
        assert_eq!(events[1].end_time, dt(2026, 7, 20, 13, 0, 0));
        assert_eq!(events[2].summary, "E3");
        assert_eq!(events[2].start_time, dt(2026, 7, 20, 13, 0, 0));
    }

    #[tokio::test]
    async fn straddle_splits_at_midnight() {
        let stores = MemoryStores::new();
        let user = UserId(1);
        let c = ctx();

        sticky_insert(
            &stores,
            &c,
            user,
            StickyTarget {
                uid: None,
                summary: "T".to_string(),
                start_time: dt(2026, 7, 20, 10, 0, 0),
                end_time: dt(2026, 7, 21, 10, 0, 0),
                budget_item_id: BudgetItemId(103),
            },
        )
        .await
        .unwrap();

        use crate::store::CalendarStore;
        let mut events = stores
            .get_events(user, dt(2026, 7, 20, 0, 0, 0), dt(2026, 7, 21, 23, 59, 59))
            .await
            .unwrap();
        events.sort_by_key(|e| e.start_time);

        assert_eq!(events.len(), 2);
        assert_eq!(events[0].start_time, dt(2026, 7, 20, 10, 0, 0));
        assert_eq!(events[1].start_time, dt(2026, 7, 21, 0, 0, 0));
        assert_eq!(events[1].end_time, dt(2026, 7, 21, 10, 0, 0));
    }
}
