use std::collections::HashMap;
use std::sync::RwLock;

use anyhow::Result;
use async_trait::async_trait;
use mockall::automock;
use sqlx::types::Json;
use sqlx::{Pool, Postgres};
use st_domain::{MarketSnapshot, WaypointSymbol};

/// Backs `TRADEGOODS` (append-only history) and `TRADEGOODS_CURRENT` (the
/// latest snapshot per waypoint), matching the source's distinction between
/// a full price-history log and a "what does the market look like right
/// now" view.
#[automock]
#[async_trait]
pub trait MarketBmcTrait: Send + Sync + std::fmt::Debug {
    async fn insert_snapshot(&self, snapshot: MarketSnapshot) -> Result<()>;
    async fn get_current(&self, waypoint_symbol: &WaypointSymbol) -> Result<Option<MarketSnapshot>>;
    async fn get_history(&self, waypoint_symbol: &WaypointSymbol) -> Result<Vec<MarketSnapshot>>;
}

#[derive(Debug)]
pub struct DbMarketBmc {
    pub pool: Pool<Postgres>,
}

#[derive(sqlx::FromRow)]
struct SnapshotRow {
    snapshot: Json<MarketSnapshot>,
}

#[async_trait]
impl MarketBmcTrait for DbMarketBmc {
    async fn insert_snapshot(&self, snapshot: MarketSnapshot) -> Result<()> {
        sqlx::query("insert into market_snapshots (waypoint_symbol, observed_at, snapshot) values ($1, $2, $3)")
            .bind(&snapshot.waypoint_symbol.0)
            .bind(snapshot.observed_at)
            .bind(Json(&snapshot))
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn get_current(&self, waypoint_symbol: &WaypointSymbol) -> Result<Option<MarketSnapshot>> {
        let row: Option<SnapshotRow> = sqlx::query_as(
            "select snapshot as snapshot from market_snapshots where waypoint_symbol = $1 order by observed_at desc limit 1",
        )
        .bind(&waypoint_symbol.0)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|r| r.snapshot.0))
    }

    async fn get_history(&self, waypoint_symbol: &WaypointSymbol) -> Result<Vec<MarketSnapshot>> {
        let rows: Vec<SnapshotRow> = sqlx::query_as(
            "select snapshot as snapshot from market_snapshots where waypoint_symbol = $1 order by observed_at asc",
        )
        .bind(&waypoint_symbol.0)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(|r| r.snapshot.0).collect())
    }
}

#[derive(Debug, Default)]
pub struct InMemoryMarketBmc {
    history: RwLock<HashMap<WaypointSymbol, Vec<MarketSnapshot>>>,
}

#[async_trait]
impl MarketBmcTrait for InMemoryMarketBmc {
    async fn insert_snapshot(&self, snapshot: MarketSnapshot) -> Result<()> {
        self.history
            .write()
            .unwrap()
            .entry(snapshot.waypoint_symbol.clone())
            .or_default()
            .push(snapshot);
        Ok(())
    }

    async fn get_current(&self, waypoint_symbol: &WaypointSymbol) -> Result<Option<MarketSnapshot>> {
        Ok(self
            .history
            .read()
            .unwrap()
            .get(waypoint_symbol)
            .and_then(|snapshots| snapshots.last().cloned()))
    }

    async fn get_history(&self, waypoint_symbol: &WaypointSymbol) -> Result<Vec<MarketSnapshot>> {
        Ok(self.history.read().unwrap().get(waypoint_symbol).cloned().unwrap_or_default())
    }
}
