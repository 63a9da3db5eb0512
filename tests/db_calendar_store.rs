use chrono::{TimeZone, Utc};
use sqlx::PgPool;

use klokku_core::model::{BudgetItemId, NewCalendarEvent, UserId};
use klokku_core::store::CalendarStore;
use klokku_core::store::postgres::PgStores;

fn user() -> UserId {
    UserId(1)
}

fn dt(h: u32) -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 7, 20, h, 0, 0).unwrap()
}

#[sqlx::test]
async fn store_and_fetch_roundtrip(pool: PgPool) {
    let stores = PgStores::new(pool);
    let created = stores
        .store_event(
            user(),
            NewCalendarEvent { summary: "Reading".into(), start_time: dt(9), end_time: dt(10), budget_item_id: BudgetItemId(1) },
        )
        .await
        .unwrap();

    let events = stores.get_events(user(), dt(0), dt(23)).await.unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].uid, created.uid);
}

#[sqlx::test]
async fn get_events_only_returns_overlapping_window(pool: PgPool) {
    let stores = PgStores::new(pool);
    stores
        .store_event(user(), NewCalendarEvent { summary: "Morning".into(), start_time: dt(8), end_time: dt(9), budget_item_id: BudgetItemId(1) })
        .await
        .unwrap();
    stores
        .store_event(user(), NewCalendarEvent { summary: "Evening".into(), start_time: dt(20), end_time: dt(21), budget_item_id: BudgetItemId(1) })
        .await
        .unwrap();

    let midday = stores.get_events(user(), dt(10), dt(18)).await.unwrap();
    assert!(midday.is_empty());
}

#[sqlx::test]
async fn update_rejects_unknown_uid(pool: PgPool) {
    let stores = PgStores::new(pool);
    let created = stores
        .store_event(user(), NewCalendarEvent { summary: "X".into(), start_time: dt(8), end_time: dt(9), budget_item_id: BudgetItemId(1) })
        .await
        .unwrap();

    let mut bogus = created.clone();
    bogus.uid = klokku_core::model::EventUid(uuid::Uuid::new_v4());
    let result = stores.update_event(user(), bogus).await;
    assert!(result.is_err());
}

#[sqlx::test]
async fn get_last_events_orders_by_end_time_descending(pool: PgPool) {
    let stores = PgStores::new(pool);
    for (summary, start, end) in [("A", 8, 9), ("B", 9, 10), ("C", 10, 11)] {
        stores
            .store_event(user(), NewCalendarEvent { summary: summary.into(), start_time: dt(start), end_time: dt(end), budget_item_id: BudgetItemId(1) })
            .await
            .unwrap();
    }

    let last_two = stores.get_last_events(user(), 2, dt(23)).await.unwrap();
    assert_eq!(last_two.len(), 2);
    assert_eq!(last_two[0].summary, "C");
    assert_eq!(last_two[1].summary, "B");
}
