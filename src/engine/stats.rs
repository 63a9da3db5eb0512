//! Statistics Aggregator (spec §4.5): combines the Plan Store, closed
//! Calendar events, and an optional open Current Event into one weekly
//! summary. Nothing here is cached; it's recomputed per request.

use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, Utc};

use crate::context::UserContext;
use crate::error::Result;
use crate::model::stats::{BudgetStat, DayBudgetStat, DayStats, StatsSummary};
use crate::model::{BudgetItemId, UserId};
use crate::store::{CalendarStore, CurrentEventStore, PlanStore, Stores};

/// Computes the Stats Summary for the week containing `week_time`.
pub async fn weekly_stats<S: Stores>(
    stores: &S,
    ctx: &UserContext,
    user: UserId,
    week_time: DateTime<Utc>,
    now: DateTime<Utc>,
) -> Result<StatsSummary> {
    let (week_start, week_end) = ctx.week_range(week_time);
    let week_start_date = ctx.local_date(week_start);
    let week_end_date = ctx.local_date(week_end);

    let all_items = stores.list_budget_items(user, true, week_start_date).await?;
    let active: Vec<_> = all_items
        .into_iter()
        .filter(|item| item.active_in_range(week_start_date, week_end_date))
        .collect();

    if active.is_empty() {
        return Ok(StatsSummary::empty(week_start_date, week_end_date));
    }

    let overrides = stores.list_overrides_for_week(user, week_start_date).await?;
    let override_by_budget: HashMap<BudgetItemId, i64> =
        overrides.into_iter().map(|o| (o.budget_id, o.weekly_duration_s)).collect();

    let planned_by_budget: HashMap<BudgetItemId, i64> = active
        .iter()
        .map(|item| {
            let planned = override_by_budget.get(&item.id).copied().unwrap_or(item.weekly_duration_s);
            (item.id, planned)
        })
        .collect();
    let total_planned_s: i64 = planned_by_budget.values().sum();

    let mut running: Option<(BudgetItemId, i64)> = None;
    if week_start < now && now < week_end {
        if let Some(current) = stores.find_current(user).await? {
            running = Some((current.budget_item_id, (now - current.start_time).num_seconds()));
        }
    }

    let events = stores.get_events(user, week_start, week_end).await?;
    let mut closed_by_day_budget: HashMap<(NaiveDate, BudgetItemId), i64> = HashMap::new();
    let mut closed_sum_by_budget: HashMap<BudgetItemId, i64> = HashMap::new();
    for event in &events {
        let date = ctx.local_date(event.start_time);
        let duration = event.duration().num_seconds();
        *closed_by_day_budget.entry((date, event.budget_item_id)).or_insert(0) += duration;
        *closed_sum_by_budget.entry(event.budget_item_id).or_insert(0) += duration;
    }

    let now_local_date = ctx.local_date(now);

    let mut daily = Vec::new();
    let mut date = week_start_date;
    while date <= week_end_date {
        let mut budgets = Vec::new();
        let mut total_s: i64 = 0;
        for item in &active {
            let mut duration = closed_by_day_budget.get(&(date, item.id)).copied().unwrap_or(0);
            if date == now_local_date {
                if let Some((budget_id, elapsed)) = running {
                    if budget_id == item.id {
                        duration += elapsed;
                    }
                }
            }
            total_s += duration;
            budgets.push(DayBudgetStat { budget_id: item.id, duration_s: duration });
        }
        daily.push(DayStats { date, budgets, total_s });
        date = date.succ_opt().expect("week window never reaches NaiveDate::MAX");
    }

    let mut budgets_out = Vec::with_capacity(active.len());
    for item in &active {
        let mut duration = closed_sum_by_budget.get(&item.id).copied().unwrap_or(0);
        if let Some((budget_id, elapsed)) = running {
            if budget_id == item.id {
                duration += elapsed;
            }
        }
        let planned = planned_by_budget.get(&item.id).copied().unwrap_or(0);
        budgets_out.push(BudgetStat {
            budget_id: item.id,
            name: item.name.clone(),
            planned_s: planned,
            duration_s: duration,
            remaining_s: planned - duration,
        });
    }

    let total_time_s: i64 =
        closed_sum_by_budget.values().sum::<i64>() + running.map(|(_, elapsed)| elapsed).unwrap_or(0);
    let total_remaining_s = total_planned_s - total_time_s;

    Ok(StatsSummary {
        week_start: week_start_date,
        week_end: week_end_date,
        daily,
        budgets: budgets_out,
        total_planned_s,
        total_time_s,
        total_remaining_s,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{NewBudgetItem, NewBudgetOverride, NewCalendarEvent, UserId};
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
    async fn weekly_stats_with_override() {
        let stores = MemoryStores::new();
        let user = UserId(1);
        let c = ctx();

        let b1 = stores
            .create_budget_item(
                user,
                NewBudgetItem {
                    name: "B1".to_string(),
                    icon: None,
                    color: None,
                    weekly_duration_s: 300 * 60,
                    weekly_occurrences: None,
                    start_date: None,
                    end_date: None,
                },
            )
            .await
            .unwrap();
        let b2 = stores
            .create_budget_item(
                user,
                NewBudgetItem {
                    name: "B2".to_string(),
                    icon: None,
                    color: None,
                    weekly_duration_s: 240 * 60,
                    weekly_occurrences: None,
                    start_date: None,
                    end_date: None,
                },
            )
            .await
            .unwrap();

        // Monday 2026-07-20 is the week start in this fixture.
        let week_start_date = NaiveDate::from_ymd_opt(2026, 7, 20).unwrap();
        stores
            .create_override(
                user,
                NewBudgetOverride { budget_id: b1.id, start_date: week_start_date, weekly_duration_s: 150 * 60, notes: None },
            )
            .await
            .unwrap();
        stores
            .create_override(
                user,
                NewBudgetOverride { budget_id: b2.id, start_date: week_start_date, weekly_duration_s: 360 * 60, notes: None },
            )
            .await
            .unwrap();

        for (budget, day, minutes) in [(b1.id, 20, 30), (b2.id, 20, 60), (b1.id, 21, 90), (b2.id, 21, 120)] {
            stores
                .store_event(
                    user,
                    NewCalendarEvent {
                        summary: "x".to_string(),
                        start_time: dt(2026, 7, day, 9, 0, 0),
                        end_time: dt(2026, 7, day, 9, minutes, 0),
                        budget_item_id: budget,
                    },
                )
                .await
                .unwrap();
        }

        let week_time = dt(2026, 7, 20, 12, 0, 0);
        let now = dt(2026, 7, 25, 0, 0, 0); // after the week window, no running event counted
        let summary = weekly_stats(&stores, &c, user, week_time, now).await.unwrap();

        assert_eq!(summary.total_planned_s, (150 + 360) * 60);
        assert_eq!(summary.total_time_s, (30 + 60 + 90 + 120) * 60);
        assert_eq!(summary.total_remaining_s, summary.total_planned_s - summary.total_time_s);

        let b1_stat = summary.budgets.iter().find(|b| b.budget_id == b1.id).unwrap();
        assert_eq!(b1_stat.duration_s, 120 * 60);
        assert_eq!(b1_stat.remaining_s, 30 * 60);

        let b2_stat = summary.budgets.iter().find(|b| b.budget_id == b2.id).unwrap();
        assert_eq!(b2_stat.duration_s, 180 * 60);
        assert_eq!(b2_stat.remaining_s, 180 * 60);
    }

    #[tokio::test]
    async fn empty_plan_returns_empty_summary_not_error() {
        let stores = MemoryStores::new();
        let user = UserId(1);
        let c = ctx();
        let summary = weekly_stats(&stores, &c, user, dt(2026, 7, 20, 12, 0, 0), dt(2026, 7, 20, 12, 0, 0))
            .await
            .unwrap();
        assert!(summary.daily.is_empty());
        assert!(summary.budgets.is_empty());
        assert_eq!(summary.total_planned_s, 0);
    }
}
