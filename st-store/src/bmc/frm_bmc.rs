use std::collections::HashMap;
use std::sync::RwLock;

use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use mockall::automock;
use sqlx::{Pool, Postgres};
use st_domain::{ControllerId, ShipLock, ShipRequest, ShipSymbol};

/// Backs `CONTROL.SHIP_LOCKS` and `CONTROL.SHIP_REQUESTS`, the two tables the
/// fleet resource manager reads and writes on every `request`/`release`.
#[automock]
#[async_trait]
pub trait FrmBmcTrait: Send + Sync + std::fmt::Debug {
    async fn get_lock(&self, ship_symbol: &ShipSymbol) -> Result<ShipLock>;
    async fn upsert_lock(&self, lock: ShipLock) -> Result<()>;
    async fn get_locks(&self) -> Result<Vec<ShipLock>>;

    async fn enqueue_request(&self, request: ShipRequest) -> Result<()>;
    async fn pop_request(&self, ship_symbol: &ShipSymbol, controller: &ControllerId) -> Result<()>;
    /// The highest-priority live (non-expired) request for a ship, per the
    /// source's `peek_request_queue`: ties broken by insertion order.
    async fn peek_request_queue(&self, ship_symbol: &ShipSymbol) -> Result<Option<ShipRequest>>;
}

#[derive(Debug)]
pub struct DbFrmBmc {
    pub pool: Pool<Postgres>,
}

#[derive(sqlx::FromRow)]
struct LockRow {
    ship_symbol: String,
    controller: Option<String>,
    priority: i32,
    blocked: bool,
}

impl From<LockRow> for ShipLock {
    fn from(row: LockRow) -> Self {
        ShipLock {
            ship_symbol: ShipSymbol(row.ship_symbol),
            controller: row.controller.map(ControllerId),
            priority: row.priority,
            blocked: row.blocked,
        }
    }
}

#[derive(sqlx::FromRow)]
struct RequestRow {
    ship_symbol: String,
    controller: String,
    priority: i32,
    created_at: chrono::DateTime<Utc>,
}

impl From<RequestRow> for ShipRequest {
    fn from(row: RequestRow) -> Self {
        ShipRequest {
            ship_symbol: ShipSymbol(row.ship_symbol),
            controller: ControllerId(row.controller),
            priority: row.priority,
            created_at: row.created_at,
        }
    }
}

#[async_trait]
impl FrmBmcTrait for DbFrmBmc {
    async fn get_lock(&self, ship_symbol: &ShipSymbol) -> Result<ShipLock> {
        let row: Option<LockRow> = sqlx::query_as(
            "select ship_symbol, controller, priority, blocked from frm_ship_locks where ship_symbol = $1",
        )
        .bind(&ship_symbol.0)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(ShipLock::from).unwrap_or_else(|| ShipLock::unowned(ship_symbol.clone())))
    }

    async fn upsert_lock(&self, lock: ShipLock) -> Result<()> {
        sqlx::query(
            r#"insert into frm_ship_locks (ship_symbol, controller, priority, blocked)
               values ($1, $2, $3, $4)
               on conflict (ship_symbol) do update
                 set controller = excluded.controller, priority = excluded.priority, blocked = excluded.blocked"#,
        )
        .bind(&lock.ship_symbol.0)
        .bind(lock.controller.as_ref().map(|c| c.0.clone()))
        .bind(lock.priority)
        .bind(lock.blocked)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_locks(&self) -> Result<Vec<ShipLock>> {
        let rows: Vec<LockRow> = sqlx::query_as("select ship_symbol, controller, priority, blocked from frm_ship_locks")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(ShipLock::from).collect())
    }

    async fn enqueue_request(&self, request: ShipRequest) -> Result<()> {
        sqlx::query(
            r#"insert into frm_ship_requests (ship_symbol, controller, priority, created_at)
               values ($1, $2, $3, now())
               on conflict (ship_symbol, controller) do update set created_at = now(), priority = excluded.priority"#,
        )
        .bind(&request.ship_symbol.0)
        .bind(&request.controller.0)
        .bind(request.priority)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn pop_request(&self, ship_symbol: &ShipSymbol, controller: &ControllerId) -> Result<()> {
        sqlx::query("delete from frm_ship_requests where ship_symbol = $1 and controller = $2")
            .bind(&ship_symbol.0)
            .bind(&controller.0)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn peek_request_queue(&self, ship_symbol: &ShipSymbol) -> Result<Option<ShipRequest>> {
        let rows: Vec<RequestRow> = sqlx::query_as(
            r#"select ship_symbol, controller, priority, created_at from frm_ship_requests
               where ship_symbol = $1 and extract(epoch from (now() - created_at)) <= $2
               order by priority desc, created_at asc"#,
        )
        .bind(&ship_symbol.0)
        .bind(st_domain::REQUEST_TTL_SECONDS as f64)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().next().map(ShipRequest::from))
    }
}

#[derive(Debug, Default)]
pub struct InMemoryFrmBmc {
    locks: RwLock<HashMap<ShipSymbol, ShipLock>>,
    requests: RwLock<Vec<ShipRequest>>,
}

#[async_trait]
impl FrmBmcTrait for InMemoryFrmBmc {
    async fn get_lock(&self, ship_symbol: &ShipSymbol) -> Result<ShipLock> {
        Ok(self
            .locks
            .read()
            .unwrap()
            .get(ship_symbol)
            .cloned()
            .unwrap_or_else(|| ShipLock::unowned(ship_symbol.clone())))
    }

    async fn upsert_lock(&self, lock: ShipLock) -> Result<()> {
        self.locks.write().unwrap().insert(lock.ship_symbol.clone(), lock);
        Ok(())
    }

    async fn get_locks(&self) -> Result<Vec<ShipLock>> {
        Ok(self.locks.read().unwrap().values().cloned().collect())
    }

    async fn enqueue_request(&self, request: ShipRequest) -> Result<()> {
        let mut requests = self.requests.write().unwrap();
        requests.retain(|r| !(r.ship_symbol == request.ship_symbol && r.controller == request.controller));
        requests.push(request);
        Ok(())
    }

    async fn pop_request(&self, ship_symbol: &ShipSymbol, controller: &ControllerId) -> Result<()> {
        self.requests
            .write()
            .unwrap()
            .retain(|r| !(&r.ship_symbol == ship_symbol && &r.controller == controller));
        Ok(())
    }

    async fn peek_request_queue(&self, ship_symbol: &ShipSymbol) -> Result<Option<ShipRequest>> {
        let now = Utc::now();
        let mut live: Vec<ShipRequest> = self
            .requests
            .read()
            .unwrap()
            .iter()
            .filter(|r| &r.ship_symbol == ship_symbol && r.is_live(now))
            .cloned()
            .collect();
        live.sort_by(|a, b| b.priority.cmp(&a.priority).then(a.created_at.cmp(&b.created_at)));
        Ok(live.into_iter().next())
    }
}
