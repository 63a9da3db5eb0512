//! Raw SQL, generic over the executor so both a bare pool and an open
//! transaction can run the same statements (grounded on the teacher's
//! `impl sqlx::PgExecutor` query helpers).

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::PgExecutor;

use crate::error::Result;
use crate::model::{
    BudgetItem, BudgetItemId, BudgetOverride, CalendarEvent, CurrentEvent, EventUid,
    NewBudgetItem, NewBudgetOverride, NewCalendarEvent, OverrideId, UserId, new_event_uid,
};

pub async fn list_budget_items(
    exec: impl PgExecutor<'_>,
    user: UserId,
    include_inactive: bool,
    today: NaiveDate,
) -> Result<Vec<BudgetItem>> {
    let items = sqlx::query_as::<_, BudgetItem>(
        r#"
        SELECT id, user_id, name, icon, color, weekly_duration_s, weekly_occurrences,
               position, start_date, end_date
        FROM budget_item
        WHERE user_id = $1
          AND ($2 OR (start_date IS NULL OR start_date <= $3))
          AND ($2 OR (end_date IS NULL OR end_date >= $3))
        ORDER BY position ASC
        "#,
    )
    .bind(user)
    .bind(include_inactive)
    .bind(today)
    .fetch_all(exec)
    .await?;
    Ok(items)
}

pub async fn find_budget_item(
    exec: impl PgExecutor<'_>,
    user: UserId,
    id: BudgetItemId,
) -> Result<Option<BudgetItem>> {
    let item = sqlx::query_as::<_, BudgetItem>(
        r#"
        SELECT id, user_id, name, icon, color, weekly_duration_s, weekly_occurrences,
               position, start_date, end_date
        FROM budget_item
        WHERE user_id = $1 AND id = $2
        "#,
    )
    .bind(user)
    .bind(id)
    .fetch_optional(exec)
    .await?;
    Ok(item)
}

pub async fn list_overrides_for_week(
    exec: impl PgExecutor<'_>,
    user: UserId,
    week_start: NaiveDate,
) -> Result<Vec<BudgetOverride>> {
    let overrides = sqlx::query_as::<_, BudgetOverride>(
        r#"
        SELECT id, user_id, budget_id, start_date, weekly_duration_s, notes
        FROM budget_override
        WHERE user_id = $1 AND start_date = $2
        "#,
    )
    .bind(user)
    .bind(week_start)
    .fetch_all(exec)
    .await?;
    Ok(overrides)
}

pub async fn create_budget_item(
    exec: impl PgExecutor<'_>,
    user: UserId,
    new: NewBudgetItem,
) -> Result<BudgetItem> {
    let item = sqlx::query_as::<_, BudgetItem>(
        r#"
        INSERT INTO budget_item
            (user_id, name, icon, color, weekly_duration_s, weekly_occurrences,
             position, start_date, end_date)
        VALUES ($1, $2, $3, $4, $5, $6,
                COALESCE((SELECT MAX(position) + 100 FROM budget_item WHERE user_id = $1), 100),
                $7, $8)
        RETURNING id, user_id, name, icon, color, weekly_duration_s, weekly_occurrences,
                  position, start_date, end_date
        "#,
    )
    .bind(user)
    .bind(new.name)
    .bind(new.icon)
    .bind(new.color)
    .bind(new.weekly_duration_s)
    .bind(new.weekly_occurrences)
    .bind(new.start_date)
    .bind(new.end_date)
    .fetch_one(exec)
    .await?;
    Ok(item)
}

pub async fn update_budget_item(
    exec: impl PgExecutor<'_>,
    user: UserId,
    item: BudgetItem,
) -> Result<BudgetItem> {
    let updated = sqlx::query_as::<_, BudgetItem>(
        r#"
        UPDATE budget_item
        SET name = $3, icon = $4, color = $5, weekly_duration_s = $6,
            weekly_occurrences = $7, start_date = $8, end_date = $9
        WHERE user_id = $1 AND id = $2
        RETURNING id, user_id, name, icon, color, weekly_duration_s, weekly_occurrences,
                  position, start_date, end_date
        "#,
    )
    .bind(user)
    .bind(item.id)
    .bind(item.name)
    .bind(item.icon)
    .bind(item.color)
    .bind(item.weekly_duration_s)
    .bind(item.weekly_occurrences)
    .bind(item.start_date)
    .bind(item.end_date)
    .fetch_optional(exec)
    .await?
    .ok_or_else(|| crate::error::Error::not_found(format!("budget item {} not found", item.id)))?;
    Ok(updated)
}

pub async fn set_budget_item_position(
    exec: impl PgExecutor<'_>,
    user: UserId,
    id: BudgetItemId,
    position: i32,
) -> Result<()> {
    sqlx::query("UPDATE budget_item SET position = $3 WHERE user_id = $1 AND id = $2")
        .bind(user)
        .bind(id)
        .bind(position)
        .execute(exec)
        .await?;
    Ok(())
}

pub async fn list_budget_item_positions(
    exec: impl PgExecutor<'_>,
    user: UserId,
) -> Result<Vec<(BudgetItemId, i32)>> {
    let rows: Vec<(BudgetItemId, i32)> = sqlx::query_as(
        "SELECT id, position FROM budget_item WHERE user_id = $1 ORDER BY position ASC",
    )
    .bind(user)
    .fetch_all(exec)
    .await?;
    Ok(rows)
}

pub async fn create_override(
    exec: impl PgExecutor<'_>,
    user: UserId,
    new: NewBudgetOverride,
) -> Result<BudgetOverride> {
    let override_ = sqlx::query_as::<_, BudgetOverride>(
        r#"
        INSERT INTO budget_override (user_id, budget_id, start_date, weekly_duration_s, notes)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING id, user_id, budget_id, start_date, weekly_duration_s, notes
        "#,
    )
    .bind(user)
    .bind(new.budget_id)
    .bind(new.start_date)
    .bind(new.weekly_duration_s)
    .bind(new.notes)
    .fetch_one(exec)
    .await?;
    Ok(override_)
}

pub async fn update_override(
    exec: impl PgExecutor<'_>,
    user: UserId,
    id: OverrideId,
    new: NewBudgetOverride,
) -> Result<BudgetOverride> {
    let updated = sqlx::query_as::<_, BudgetOverride>(
        r#"
        UPDATE budget_override
        SET budget_id = $3, start_date = $4, weekly_duration_s = $5, notes = $6
        WHERE user_id = $1 AND id = $2
        RETURNING id, user_id, budget_id, start_date, weekly_duration_s, notes
        "#,
    )
    .bind(user)
    .bind(id)
    .bind(new.budget_id)
    .bind(new.start_date)
    .bind(new.weekly_duration_s)
    .bind(new.notes)
    .fetch_optional(exec)
    .await?
    .ok_or_else(|| crate::error::Error::not_found(format!("override {id} not found")))?;
    Ok(updated)
}

pub async fn delete_override(exec: impl PgExecutor<'_>, user: UserId, id: OverrideId) -> Result<()> {
    let result = sqlx::query("DELETE FROM budget_override WHERE user_id = $1 AND id = $2")
        .bind(user)
        .bind(id)
        .execute(exec)
        .await?;
    if result.rows_affected() == 0 {
        return Err(crate::error::Error::not_found(format!("override {id} not found")));
    }
    Ok(())
}

pub async fn store_event(
    exec: impl PgExecutor<'_>,
    user: UserId,
    event: NewCalendarEvent,
) -> Result<CalendarEvent> {
    let stored = event.with_uid(new_event_uid(), user);
    sqlx::query(
        r#"
        INSERT INTO calendar_event (uid, user_id, summary, start_time, end_time, budget_item_id)
        VALUES ($1, $2, $3, $4, $5, $6)
        "#,
    )
    .bind(stored.uid)
    .bind(stored.user_id)
    .bind(&stored.summary)
    .bind(stored.start_time)
    .bind(stored.end_time)
    .bind(stored.budget_item_id)
    .execute(exec)
    .await?;
    Ok(stored)
}

pub async fn get_events(
    exec: impl PgExecutor<'_>,
    user: UserId,
    from: DateTime<Utc>,
    to: DateTime<Utc>,
) -> Result<Vec<CalendarEvent>> {
    let events = sqlx::query_as::<_, CalendarEvent>(
        r#"
        SELECT uid, user_id, summary, start_time, end_time, budget_item_id
        FROM calendar_event
        WHERE user_id = $1 AND start_time <= $3 AND end_time >= $2
        ORDER BY start_time ASC
        "#,
    )
    .bind(user)
    .bind(from)
    .bind(to)
    .fetch_all(exec)
    .await?;
    Ok(events)
}

pub async fn get_last_events(
    exec: impl PgExecutor<'_>,
    user: UserId,
    limit: i64,
    now: DateTime<Utc>,
) -> Result<Vec<CalendarEvent>> {
    let events = sqlx::query_as::<_, CalendarEvent>(
        r#"
        SELECT uid, user_id, summary, start_time, end_time, budget_item_id
        FROM calendar_event
        WHERE user_id = $1 AND end_time <= $2
        ORDER BY end_time DESC
        LIMIT $3
        "#,
    )
    .bind(user)
    .bind(now)
    .bind(limit.max(0))
    .fetch_all(exec)
    .await?;
    Ok(events)
}

pub async fn update_event(exec: impl PgExecutor<'_>, user: UserId, event: CalendarEvent) -> Result<()> {
    let result = sqlx::query(
        r#"
        UPDATE calendar_event
        SET summary = $3, start_time = $4, end_time = $5, budget_item_id = $6
        WHERE user_id = $1 AND uid = $2
        "#,
    )
    .bind(user)
    .bind(event.uid)
    .bind(&event.summary)
    .bind(event.start_time)
    .bind(event.end_time)
    .bind(event.budget_item_id)
    .execute(exec)
    .await?;
    if result.rows_affected() == 0 {
        return Err(crate::error::Error::not_found(format!("event {} not found", event.uid)));
    }
    Ok(())
}

pub async fn delete_event(exec: impl PgExecutor<'_>, user: UserId, uid: EventUid) -> Result<()> {
    let result = sqlx::query("DELETE FROM calendar_event WHERE user_id = $1 AND uid = $2")
        .bind(user)
        .bind(uid)
        .execute(exec)
        .await?;
    if result.rows_affected() == 0 {
        return Err(crate::error::Error::not_found(format!("event {uid} not found")));
    }
    Ok(())
}

pub async fn find_current(exec: impl PgExecutor<'_>, user: UserId) -> Result<Option<CurrentEvent>> {
    let current = sqlx::query_as::<_, CurrentEvent>(
        r#"
        SELECT user_id, budget_item_id, name, weekly_duration_s, start_time
        FROM current_event
        WHERE user_id = $1
        "#,
    )
    .bind(user)
    .fetch_optional(exec)
    .await?;
    Ok(current)
}

pub async fn upsert_current(exec: impl PgExecutor<'_>, user: UserId, event: CurrentEvent) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO current_event (user_id, budget_item_id, name, weekly_duration_s, start_time)
        VALUES ($1, $2, $3, $4, $5)
        ON CONFLICT (user_id) DO UPDATE
        SET budget_item_id = EXCLUDED.budget_item_id,
            name = EXCLUDED.name,
            weekly_duration_s = EXCLUDED.weekly_duration_s,
            start_time = EXCLUDED.start_time
        "#,
    )
    .bind(user)
    .bind(event.budget_item_id)
    .bind(&event.name)
    .bind(event.weekly_duration_s)
    .bind(event.start_time)
    .execute(exec)
    .await?;
    Ok(())
}

pub async fn delete_current(exec: impl PgExecutor<'_>, user: UserId) -> Result<Option<CurrentEvent>> {
    let deleted = sqlx::query_as::<_, CurrentEvent>(
        "DELETE FROM current_event WHERE user_id = $1 RETURNING user_id, budget_item_id, name, weekly_duration_s, start_time",
    )
    .bind(user)
    .fetch_optional(exec)
    .await?;
    Ok(deleted)
}

/// The subset of `app_user` the `X-User-Id` extractor needs to resolve a
/// request into a [`crate::context::UserContext`].
#[derive(Debug, sqlx::FromRow)]
pub struct AppUserRow {
    pub id: UserId,
    pub timezone: String,
    pub first_day_of_week: Option<i16>,
    pub ignore_short_events: bool,
}

pub async fn find_app_user(exec: impl PgExecutor<'_>, user: UserId) -> Result<Option<AppUserRow>> {
    let row = sqlx::query_as::<_, AppUserRow>(
        "SELECT id, timezone, first_day_of_week, ignore_short_events FROM app_user WHERE id = $1",
    )
    .bind(user)
    .fetch_optional(exec)
    .await?;
    Ok(row)
}
