//! Production backend. A single handle wraps either a bare pool or an open
//! transaction; every trait method dispatches to the same [`queries`]
//! functions against whichever executor it holds (grounded on the teacher's
//! pool/executor-generic query helpers).

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{PgPool, Postgres, Transaction};
use tokio::sync::Mutex;

use crate::error::Result;
use crate::model::{
    BudgetItem, BudgetItemId, BudgetOverride, CalendarEvent, CurrentEvent, EventUid,
    NewBudgetItem, NewBudgetOverride, NewCalendarEvent, OverrideId, UserId,
};
use crate::store::reposition::compute_positions;
use crate::store::{CalendarStore, CurrentEventStore, PlanStore, Stores};

mod queries;

#[derive(Clone)]
enum Conn {
    Pool(PgPool),
    Tx(Arc<Mutex<Transaction<'static, Postgres>>>),
}

/// The production `Stores` implementation.
///
/// Cloning a pool-backed handle yields another pool-backed handle (each call
/// borrows its own connection); cloning a transaction-backed handle shares
/// the same open transaction, which is what lets `with_transaction` honor
/// flat nesting.
#[derive(Clone)]
pub struct PgStores {
    conn: Conn,
}

impl PgStores {
    pub fn new(pool: PgPool) -> Self {
        Self { conn: Conn::Pool(pool) }
    }

    pub async fn migrate(&self) -> Result<()> {
        let Conn::Pool(pool) = &self.conn else {
            return Err(crate::error::Error::Internal(anyhow::anyhow!(
                "migrate called on a transaction-bound handle"
            )));
        };
        sqlx::migrate!("./migrations")
            .run(pool)
            .await
            .map_err(|e| crate::error::Error::Internal(e.into()))?;
        Ok(())
    }

    /// Not part of [`Stores`]: only the web layer's `X-User-Id` extractor
    /// needs this, never the engine.
    pub async fn find_app_user(&self, user: UserId) -> Result<Option<queries::AppUserRow>> {
        dispatch!(self, find_app_user, user)
    }
}

/// Runs `$query_fn($($arg),*)` against whichever executor `$self` holds.
macro_rules! dispatch {
    ($self:expr, $query_fn:ident $(, $arg:expr)*) => {
        match &$self.conn {
            Conn::Pool(pool) => queries::$query_fn(pool $(, $arg)*).await,
            Conn::Tx(tx) => {
                let mut guard = tx.lock().await;
                queries::$query_fn(&mut **guard $(, $arg)*).await
            }
        }
    };
}

#[async_trait::async_trait]
impl PlanStore for PgStores {
    async fn list_budget_items(
        &self,
        user: UserId,
        include_inactive: bool,
        today: NaiveDate,
    ) -> Result<Vec<BudgetItem>> {
        dispatch!(self, list_budget_items, user, include_inactive, today)
    }

    async fn find_budget_item(&self, user: UserId, id: BudgetItemId) -> Result<Option<BudgetItem>> {
        dispatch!(self, find_budget_item, user, id)
    }

    async fn list_overrides_for_week(
        &self,
        user: UserId,
        week_start: NaiveDate,
    ) -> Result<Vec<BudgetOverride>> {
        dispatch!(self, list_overrides_for_week, user, week_start)
    }

    async fn create_budget_item(&self, user: UserId, new: NewBudgetItem) -> Result<BudgetItem> {
        dispatch!(self, create_budget_item, user, new)
    }

    async fn update_budget_item(&self, user: UserId, item: BudgetItem) -> Result<BudgetItem> {
        dispatch!(self, update_budget_item, user, item)
    }

    async fn reorder_budget_item(
        &self,
        user: UserId,
        id: BudgetItemId,
        preceding_id: Option<BudgetItemId>,
    ) -> Result<()> {
        // Needs read-then-write consistency, so it always runs inside its
        // own transaction regardless of which executor `self` already holds.
        self.clone()
            .with_transaction(move |tx| async move {
                let ordered: Vec<(BudgetItemId, i32)> = dispatch!(tx, list_budget_item_positions, user)?;
                let updates = compute_positions(&ordered, id, preceding_id)?;
                for (updated_id, position) in updates {
                    dispatch!(tx, set_budget_item_position, user, updated_id, position)?;
                }
                Ok(())
            })
            .await
    }

    async fn create_override(&self, user: UserId, new: NewBudgetOverride) -> Result<BudgetOverride> {
        dispatch!(self, create_override, user, new)
    }

    async fn update_override(
        &self,
        user: UserId,
        id: OverrideId,
        new: NewBudgetOverride,
    ) -> Result<BudgetOverride> {
        dispatch!(self, update_override, user, id, new)
    }

    async fn delete_override(&self, user: UserId, id: OverrideId) -> Result<()> {
        dispatch!(self, delete_override, user, id)
    }
}

#[async_trait::async_trait]
impl CalendarStore for PgStores {
    async fn store_event(&self, user: UserId, event: NewCalendarEvent) -> Result<CalendarEvent> {
        dispatch!(self, store_event, user, event)
    }

    async fn get_events(
        &self,
        user: UserId,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<CalendarEvent>> {
        dispatch!(self, get_events, user, from, to)
    }

    async fn get_last_events(
        &self,
        user: UserId,
        limit: i64,
        now: DateTime<Utc>,
    ) -> Result<Vec<CalendarEvent>> {
        dispatch!(self, get_last_events, user, limit, now)
    }

    async fn update_event(&self, user: UserId, event: CalendarEvent) -> Result<()> {
        dispatch!(self, update_event, user, event)
    }

    async fn delete_event(&self, user: UserId, uid: EventUid) -> Result<()> {
        dispatch!(self, delete_event, user, uid)
    }
}

#[async_trait::async_trait]
impl CurrentEventStore for PgStores {
    async fn find_current(&self, user: UserId) -> Result<Option<CurrentEvent>> {
        dispatch!(self, find_current, user)
    }

    async fn upsert_current(&self, user: UserId, event: CurrentEvent) -> Result<()> {
        dispatch!(self, upsert_current, user, event)
    }

    async fn delete_current(&self, user: UserId) -> Result<Option<CurrentEvent>> {
        dispatch!(self, delete_current, user)
    }
}

#[async_trait::async_trait]
impl Stores for PgStores {
    async fn with_transaction<F, Fut, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(Self) -> Fut + Send + 'static,
        Fut: std::future::Future<Output = Result<T>> + Send,
        T: Send + 'static,
    {
        // Already inside a transaction: reuse it (spec §5 flat nesting).
        if let Conn::Tx(_) = &self.conn {
            return f(self.clone()).await;
        }

        let Conn::Pool(pool) = &self.conn else { unreachable!() };
        let tx = pool.begin().await.map_err(crate::error::Error::from)?;
        let tx = Arc::new(Mutex::new(tx));
        let handle = PgStores { conn: Conn::Tx(tx.clone()) };

        match f(handle).await {
            Ok(value) => {
                let tx = Arc::try_unwrap(tx)
                    .map_err(|_| crate::error::Error::Internal(anyhow::anyhow!("transaction handle leaked")))?
                    .into_inner();
                tx.commit().await.map_err(crate::error::Error::from)?;
                Ok(value)
            }
            Err(err) => {
                if let Ok(mutex) = Arc::try_unwrap(tx) {
                    let _ = mutex.into_inner().rollback().await;
                }
                Err(err)
            }
        }
    }
}
