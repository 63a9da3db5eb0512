use chrono::NaiveDate;
use sqlx::PgPool;

use klokku_core::model::{NewBudgetItem, NewBudgetOverride, UserId};
use klokku_core::store::PlanStore;
use klokku_core::store::postgres::PgStores;

fn user() -> UserId {
    UserId(1)
}

fn new_item(name: &str) -> NewBudgetItem {
    NewBudgetItem {
        name: name.to_string(),
        icon: None,
        color: None,
        weekly_duration_s: 3600,
        weekly_occurrences: None,
        start_date: None,
        end_date: None,
    }
}

#[sqlx::test]
async fn create_assigns_incrementing_position(pool: PgPool) {
    let stores = PgStores::new(pool);

    let a = stores.create_budget_item(user(), new_item("Reading")).await.unwrap();
    let b = stores.create_budget_item(user(), new_item("Gym")).await.unwrap();

    assert_eq!(a.position, 100);
    assert_eq!(b.position, 200);
}

#[sqlx::test]
async fn list_excludes_inactive_items_by_default(pool: PgPool) {
    let stores = PgStores::new(pool);
    let today = NaiveDate::from_ymd_opt(2026, 7, 20).unwrap();

    let mut ended = new_item("Past project");
    ended.end_date = Some(NaiveDate::from_ymd_opt(2026, 1, 1).unwrap());
    stores.create_budget_item(user(), ended).await.unwrap();
    stores.create_budget_item(user(), new_item("Current")).await.unwrap();

    let active = stores.list_budget_items(user(), false, today).await.unwrap();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].name, "Current");

    let all = stores.list_budget_items(user(), true, today).await.unwrap();
    assert_eq!(all.len(), 2);
}

#[sqlx::test]
async fn update_unknown_item_is_not_found(pool: PgPool) {
    let stores = PgStores::new(pool);
    let created = stores.create_budget_item(user(), new_item("Reading")).await.unwrap();
    let mut other = created.clone();
    other.id = klokku_core::model::BudgetItemId(created.id.0 + 1000);

    let result = stores.update_budget_item(user(), other).await;
    assert!(result.is_err());
}

#[sqlx::test]
async fn reorder_moves_item_after_target(pool: PgPool) {
    let stores = PgStores::new(pool);
    let a = stores.create_budget_item(user(), new_item("A")).await.unwrap();
    let b = stores.create_budget_item(user(), new_item("B")).await.unwrap();
    let c = stores.create_budget_item(user(), new_item("C")).await.unwrap();

    stores.reorder_budget_item(user(), a.id, Some(c.id)).await.unwrap();

    let ordered = stores.list_budget_items(user(), true, NaiveDate::from_ymd_opt(2026, 7, 20).unwrap()).await.unwrap();
    let names: Vec<_> = ordered.iter().map(|i| i.name.as_str()).collect();
    assert_eq!(names, vec!["B", "C", "A"]);
}

#[sqlx::test]
async fn override_round_trip(pool: PgPool) {
    let stores = PgStores::new(pool);
    let item = stores.create_budget_item(user(), new_item("Reading")).await.unwrap();
    let week_start = NaiveDate::from_ymd_opt(2026, 7, 20).unwrap();

    let created = stores
        .create_override(
            user(),
            NewBudgetOverride { budget_id: item.id, start_date: week_start, weekly_duration_s: 1800, notes: Some("half week".into()) },
        )
        .await
        .unwrap();

    let listed = stores.list_overrides_for_week(user(), week_start).await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].id, created.id);

    stores.delete_override(user(), created.id).await.unwrap();
    let listed = stores.list_overrides_for_week(user(), week_start).await.unwrap();
    assert!(listed.is_empty());
}
