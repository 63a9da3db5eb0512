//! HTTP routes implementing the core's external interface (spec §6).
//!
//! Handlers convert wire DTOs to/from domain model types and delegate to
//! `engine::*`/`store::Stores` methods; nothing here re-implements domain
//! logic. Grounded on the teacher's `CourseResponse`/`build_course_response`
//! split between internal models and wire-format responses.

use std::time::Duration;

use axum::extract::{Path, Query, State};
use axum::http::{Request, StatusCode};
use axum::response::Response;
use axum::routing::{delete, get, patch, post, put};
use axum::{Json, Router};
use axum::body::Body;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tower_http::classify::ServerErrorsFailureClass;
use tower_http::compression::CompressionLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::{Span, warn};

use crate::context::UserContext;
use crate::engine::lifecycle;
use crate::engine::stats::weekly_stats;
use crate::error::Error;
use crate::model::{
    BudgetItem, BudgetItemId, BudgetOverride, CalendarEvent, CurrentEvent, NewBudgetItem,
    NewBudgetOverride, NewCurrentEvent, OverrideId,
};
use crate::model::stats::StatsSummary;
use crate::state::AppState;
use crate::store::{CalendarStore, PlanStore};
use crate::web::error::ApiError;
use crate::web::extractors::CurrentUser;

pub fn create_router(state: AppState) -> Router {
    let api = Router::new()
        .route("/budget", post(create_budget).get(list_budget))
        .route("/budget/{id}", put(update_budget))
        .route("/budget/{id}/position", put(reorder_budget))
        .route("/budget/override", post(create_override).get(list_overrides))
        .route("/budget/override/{id}", put(update_override).delete(delete_override))
        .route("/event", post(start_event).get(list_last_events))
        .route("/event/current", get(get_current).delete(delete_current))
        .route("/event/current/start", patch(shift_current))
        .route("/event/current/status", patch(finish_current))
        .route("/stats", get(get_stats))
        .with_state(state);

    Router::new()
        .route("/health", get(health))
        .nest("/api", api)
        .layer((
            CompressionLayer::new().zstd(true).br(true).gzip(true).quality(tower_http::CompressionLevel::Fastest),
            TraceLayer::new_for_http()
                .make_span_with(|request: &Request<Body>| {
                    tracing::debug_span!("request", path = request.uri().path())
                })
                .on_request(())
                .on_body_chunk(())
                .on_eos(())
                .on_response(|response: &Response, latency: Duration, _span: &Span| {
                    if latency > Duration::from_secs(1) {
                        warn!(status = %response.status(), ?latency, "slow request");
                    } else {
                        tracing::debug!(status = %response.status(), ?latency, "request completed");
                    }
                })
                .on_failure(|error: ServerErrorsFailureClass, latency: Duration, _span: &Span| {
                    warn!(?error, ?latency, "request failed");
                }),
            TimeoutLayer::new(Duration::from_secs(10)),
        ))
}

async fn health() -> &'static str {
    "ok"
}

// ---- wire DTOs -------------------------------------------------------

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct BudgetItemDto {
    id: BudgetItemId,
    name: String,
    icon: Option<String>,
    color: Option<String>,
    weekly_time: i64,
    weekly_occurrences: Option<i32>,
    position: i32,
    start_date: Option<NaiveDate>,
    end_date: Option<NaiveDate>,
}

impl From<BudgetItem> for BudgetItemDto {
    fn from(b: BudgetItem) -> Self {
        Self {
            id: b.id,
            name: b.name,
            icon: b.icon,
            color: b.color,
            weekly_time: b.weekly_duration_s,
            weekly_occurrences: b.weekly_occurrences,
            position: b.position,
            start_date: b.start_date,
            end_date: b.end_date,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateBudgetRequest {
    name: String,
    weekly_time: i64,
    #[serde(default)]
    weekly_occurrences: Option<i32>,
    #[serde(default)]
    icon: Option<String>,
    #[serde(default)]
    color: Option<String>,
    #[serde(default)]
    start_date: Option<NaiveDate>,
    #[serde(default)]
    end_date: Option<NaiveDate>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateBudgetRequest {
    id: BudgetItemId,
    name: String,
    #[serde(default)]
    icon: Option<String>,
    #[serde(default)]
    color: Option<String>,
    weekly_time: i64,
    #[serde(default)]
    weekly_occurrences: Option<i32>,
    position: i32,
    #[serde(default)]
    start_date: Option<NaiveDate>,
    #[serde(default)]
    end_date: Option<NaiveDate>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PositionRequest {
    id: BudgetItemId,
    #[serde(default)]
    preceding_id: Option<BudgetItemId>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListBudgetParams {
    #[serde(default)]
    include_inactive: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct BudgetOverrideDto {
    id: OverrideId,
    budget_id: BudgetItemId,
    start_date: DateTime<Utc>,
    weekly_time: i64,
    notes: Option<String>,
}

fn to_override_dto(o: BudgetOverride, ctx: &UserContext) -> BudgetOverrideDto {
    BudgetOverrideDto {
        id: o.id,
        budget_id: o.budget_id,
        start_date: ctx.start_of_day(o.start_date),
        weekly_time: o.weekly_duration_s,
        notes: o.notes,
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OverrideRequest {
    budget_id: BudgetItemId,
    start_date: DateTime<Utc>,
    weekly_time: i64,
    #[serde(default)]
    notes: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListOverrideParams {
    start_date: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CalendarEventDto {
    uid: crate::model::EventUid,
    summary: String,
    start_time: DateTime<Utc>,
    end_time: DateTime<Utc>,
    budget_item_id: BudgetItemId,
}

impl From<CalendarEvent> for CalendarEventDto {
    fn from(e: CalendarEvent) -> Self {
        Self {
            uid: e.uid,
            summary: e.summary,
            start_time: e.start_time,
            end_time: e.end_time,
            budget_item_id: e.budget_item_id,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CurrentEventDto {
    budget_item_id: BudgetItemId,
    name: String,
    weekly_duration: i64,
    start_time: DateTime<Utc>,
}

impl From<CurrentEvent> for CurrentEventDto {
    fn from(c: CurrentEvent) -> Self {
        Self {
            budget_item_id: c.budget_item_id,
            name: c.name,
            weekly_duration: c.weekly_duration_s,
            start_time: c.start_time,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StartEventRequest {
    #[serde(alias = "budgetId")]
    budget_item_id: BudgetItemId,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    weekly_duration: Option<i64>,
    #[serde(default)]
    start_time: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ShiftStartRequest {
    start_time: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FinishRequest {
    status: String,
}

fn default_last() -> i64 {
    20
}

#[derive(Debug, Deserialize)]
struct LastEventsParams {
    #[serde(default = "default_last")]
    last: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StatsParams {
    from_date: DateTime<Utc>,
    /// Accepted for wire-contract completeness; the weekly-window algorithm
    /// (spec §4.5) derives the window end from `from_date` alone.
    #[serde(default)]
    #[allow(dead_code)]
    to_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct DayBudgetStatDto {
    budget_id: BudgetItemId,
    duration_s: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct DayStatsDto {
    date: NaiveDate,
    budgets: Vec<DayBudgetStatDto>,
    total_s: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct BudgetStatDto {
    budget_id: BudgetItemId,
    name: String,
    planned_s: i64,
    duration_s: i64,
    remaining_s: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct StatsSummaryDto {
    week_start: NaiveDate,
    week_end: NaiveDate,
    daily: Vec<DayStatsDto>,
    budgets: Vec<BudgetStatDto>,
    total_planned_s: i64,
    total_time_s: i64,
    total_remaining_s: i64,
}

impl From<StatsSummary> for StatsSummaryDto {
    fn from(s: StatsSummary) -> Self {
        Self {
            week_start: s.week_start,
            week_end: s.week_end,
            daily: s
                .daily
                .into_iter()
                .map(|d| DayStatsDto {
                    date: d.date,
                    budgets: d
                        .budgets
                        .into_iter()
                        .map(|b| DayBudgetStatDto { budget_id: b.budget_id, duration_s: b.duration_s })
                        .collect(),
                    total_s: d.total_s,
                })
                .collect(),
            budgets: s
                .budgets
                .into_iter()
                .map(|b| BudgetStatDto {
                    budget_id: b.budget_id,
                    name: b.name,
                    planned_s: b.planned_s,
                    duration_s: b.duration_s,
                    remaining_s: b.remaining_s,
                })
                .collect(),
            total_planned_s: s.total_planned_s,
            total_time_s: s.total_time_s,
            total_remaining_s: s.total_remaining_s,
        }
    }
}

// ---- handlers ----------------------------------------------------------

async fn create_budget(
    State(state): State<AppState>,
    CurrentUser(ctx): CurrentUser,
    Json(body): Json<CreateBudgetRequest>,
) -> Result<(StatusCode, Json<BudgetItemDto>), ApiError> {
    if body.name.trim().is_empty() {
        return Err(Error::invalid_argument("name must not be empty").into());
    }
    if body.weekly_time < 0 {
        return Err(Error::invalid_argument("weeklyTime must not be negative").into());
    }
    let _guard = state.locks.acquire(ctx.user_id).await;
    let created = state
        .stores
        .create_budget_item(
            ctx.user_id,
            NewBudgetItem {
                name: body.name,
                icon: body.icon,
                color: body.color,
                weekly_duration_s: body.weekly_time,
                weekly_occurrences: body.weekly_occurrences,
                start_date: body.start_date,
                end_date: body.end_date,
            },
        )
        .await?;
    Ok((StatusCode::CREATED, Json(created.into())))
}

async fn list_budget(
    State(state): State<AppState>,
    CurrentUser(ctx): CurrentUser,
    Query(params): Query<ListBudgetParams>,
) -> Result<Json<Vec<BudgetItemDto>>, ApiError> {
    let today = ctx.local_date(Utc::now());
    let items = state.stores.list_budget_items(ctx.user_id, params.include_inactive, today).await?;
    Ok(Json(items.into_iter().map(Into::into).collect()))
}

async fn update_budget(
    State(state): State<AppState>,
    CurrentUser(ctx): CurrentUser,
    Path(id): Path<BudgetItemId>,
    Json(body): Json<UpdateBudgetRequest>,
) -> Result<Json<BudgetItemDto>, ApiError> {
    if body.id != id {
        return Err(Error::invalid_argument("body id does not match path id").into());
    }
    if body.weekly_time < 0 {
        return Err(Error::invalid_argument("weeklyTime must not be negative").into());
    }
    let _guard = state.locks.acquire(ctx.user_id).await;
    let updated = state
        .stores
        .update_budget_item(
            ctx.user_id,
            BudgetItem {
                id,
                user_id: ctx.user_id,
                name: body.name,
                icon: body.icon,
                color: body.color,
                weekly_duration_s: body.weekly_time,
                weekly_occurrences: body.weekly_occurrences,
                position: body.position,
                start_date: body.start_date,
                end_date: body.end_date,
            },
        )
        .await?;
    Ok(Json(updated.into()))
}

async fn reorder_budget(
    State(state): State<AppState>,
    CurrentUser(ctx): CurrentUser,
    Path(id): Path<BudgetItemId>,
    Json(body): Json<PositionRequest>,
) -> Result<StatusCode, ApiError> {
    if body.id != id {
        return Err(Error::invalid_argument("body id does not match path id").into());
    }
    let _guard = state.locks.acquire(ctx.user_id).await;
    state.stores.reorder_budget_item(ctx.user_id, id, body.preceding_id).await?;
    Ok(StatusCode::OK)
}

async fn create_override(
    State(state): State<AppState>,
    CurrentUser(ctx): CurrentUser,
    Json(body): Json<OverrideRequest>,
) -> Result<(StatusCode, Json<BudgetOverrideDto>), ApiError> {
    if body.weekly_time < 0 {
        return Err(Error::invalid_argument("weeklyTime must not be negative").into());
    }
    let _guard = state.locks.acquire(ctx.user_id).await;
    let created = state
        .stores
        .create_override(
            ctx.user_id,
            NewBudgetOverride {
                budget_id: body.budget_id,
                start_date: ctx.local_date(body.start_date),
                weekly_duration_s: body.weekly_time,
                notes: body.notes,
            },
        )
        .await?;
    Ok((StatusCode::CREATED, Json(to_override_dto(created, &ctx))))
}

async fn list_overrides(
    State(state): State<AppState>,
    CurrentUser(ctx): CurrentUser,
    Query(params): Query<ListOverrideParams>,
) -> Result<Json<Vec<BudgetOverrideDto>>, ApiError> {
    let week_start = ctx.local_date(params.start_date);
    let overrides = state.stores.list_overrides_for_week(ctx.user_id, week_start).await?;
    Ok(Json(overrides.into_iter().map(|o| to_override_dto(o, &ctx)).collect()))
}

async fn update_override(
    State(state): State<AppState>,
    CurrentUser(ctx): CurrentUser,
    Path(id): Path<OverrideId>,
    Json(body): Json<OverrideRequest>,
) -> Result<Json<BudgetOverrideDto>, ApiError> {
    if body.weekly_time < 0 {
        return Err(Error::invalid_argument("weeklyTime must not be negative").into());
    }
    let _guard = state.locks.acquire(ctx.user_id).await;
    let updated = state
        .stores
        .update_override(
            ctx.user_id,
            id,
            NewBudgetOverride {
                budget_id: body.budget_id,
                start_date: ctx.local_date(body.start_date),
                weekly_duration_s: body.weekly_time,
                notes: body.notes,
            },
        )
        .await?;
    Ok(Json(to_override_dto(updated, &ctx)))
}

async fn delete_override(
    State(state): State<AppState>,
    CurrentUser(ctx): CurrentUser,
    Path(id): Path<OverrideId>,
) -> Result<StatusCode, ApiError> {
    let _guard = state.locks.acquire(ctx.user_id).await;
    state.stores.delete_override(ctx.user_id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn start_event(
    State(state): State<AppState>,
    CurrentUser(ctx): CurrentUser,
    Json(body): Json<StartEventRequest>,
) -> Result<(StatusCode, Json<CurrentEventDto>), ApiError> {
    let now = Utc::now();
    let budget = state
        .stores
        .find_budget_item(ctx.user_id, body.budget_item_id)
        .await?
        .ok_or_else(|| Error::not_found("no budget item with that id"))?;

    let _guard = state.locks.acquire(ctx.user_id).await;
    let new = NewCurrentEvent {
        budget_item_id: body.budget_item_id,
        name: body.name.unwrap_or_else(|| budget.name.clone()),
        weekly_duration_s: body.weekly_duration.unwrap_or(budget.weekly_duration_s),
        start_time: body.start_time,
    };
    let current = lifecycle::start_new(&state.stores, &ctx, ctx.user_id, new, now).await?;
    Ok((StatusCode::CREATED, Json(current.into())))
}

async fn get_current(
    State(state): State<AppState>,
    CurrentUser(ctx): CurrentUser,
) -> Result<Json<CurrentEventDto>, ApiError> {
    let current = lifecycle::find_current(&state.stores, ctx.user_id)
        .await?
        .ok_or_else(|| Error::not_found("no current event"))?;
    Ok(Json(current.into()))
}

async fn shift_current(
    State(state): State<AppState>,
    CurrentUser(ctx): CurrentUser,
    Json(body): Json<ShiftStartRequest>,
) -> Result<Json<CurrentEventDto>, ApiError> {
    let now = Utc::now();
    let _guard = state.locks.acquire(ctx.user_id).await;
    let current = lifecycle::shift_current_start(&state.stores, ctx.user_id, body.start_time, now).await?;
    Ok(Json(current.into()))
}

async fn finish_current(
    State(state): State<AppState>,
    CurrentUser(ctx): CurrentUser,
    Json(body): Json<FinishRequest>,
) -> Result<(StatusCode, Json<Vec<CalendarEventDto>>), ApiError> {
    if body.status != "finished" {
        return Err(Error::invalid_argument("status must be \"finished\"").into());
    }
    let now = Utc::now();
    let _guard = state.locks.acquire(ctx.user_id).await;
    let committed = lifecycle::finish_current(&state.stores, &ctx, ctx.user_id, now).await?;
    Ok((StatusCode::CREATED, Json(committed.into_iter().map(Into::into).collect())))
}

async fn delete_current(
    State(state): State<AppState>,
    CurrentUser(ctx): CurrentUser,
) -> Result<Json<CurrentEventDto>, ApiError> {
    let _guard = state.locks.acquire(ctx.user_id).await;
    let prior = lifecycle::delete_current(&state.stores, ctx.user_id)
        .await?
        .ok_or_else(|| Error::not_found("no current event"))?;
    Ok(Json(prior.into()))
}

async fn list_last_events(
    State(state): State<AppState>,
    CurrentUser(ctx): CurrentUser,
    Query(params): Query<LastEventsParams>,
) -> Result<Json<Vec<CalendarEventDto>>, ApiError> {
    let now = Utc::now();
    let events = state.stores.get_last_events(ctx.user_id, params.last, now).await?;
    Ok(Json(events.into_iter().map(Into::into).collect()))
}

async fn get_stats(
    State(state): State<AppState>,
    CurrentUser(ctx): CurrentUser,
    Query(params): Query<StatsParams>,
) -> Result<Json<StatsSummaryDto>, ApiError> {
    let now = Utc::now();
    let summary = weekly_stats(&state.stores, &ctx, ctx.user_id, params.from_date, now).await?;
    Ok(Json(summary.into()))
}
