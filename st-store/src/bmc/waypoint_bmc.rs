use std::collections::HashMap;
use std::sync::RwLock;

use anyhow::Result;
use async_trait::async_trait;
use mockall::automock;
use sqlx::types::Json;
use sqlx::{Pool, Postgres};
use st_domain::{SystemSymbol, Waypoint, WaypointSymbol};

/// Backs `NAV.WAYPOINTS` and `WP_DISTANCES` — waypoint metadata plus the
/// symmetric pairwise distance cache the planner consults before falling
/// back to computing `distance()` itself.
#[automock]
#[async_trait]
pub trait WaypointBmcTrait: Send + Sync + std::fmt::Debug {
    async fn upsert_waypoint(&self, waypoint: Waypoint) -> Result<()>;
    async fn get_waypoint(&self, waypoint_symbol: &WaypointSymbol) -> Result<Option<Waypoint>>;
    async fn get_waypoints_in_system(&self, system_symbol: &SystemSymbol) -> Result<Vec<Waypoint>>;

    async fn get_cached_distance(&self, a: &WaypointSymbol, b: &WaypointSymbol) -> Result<Option<f64>>;
    async fn cache_distance(&self, a: &WaypointSymbol, b: &WaypointSymbol, value: f64) -> Result<()>;
}

fn distance_key(a: &WaypointSymbol, b: &WaypointSymbol) -> (String, String) {
    if a.0 <= b.0 {
        (a.0.clone(), b.0.clone())
    } else {
        (b.0.clone(), a.0.clone())
    }
}

#[derive(Debug)]
pub struct DbWaypointBmc {
    pub pool: Pool<Postgres>,
}

#[derive(sqlx::FromRow)]
struct WaypointRow {
    waypoint: Json<Waypoint>,
}

#[async_trait]
impl WaypointBmcTrait for DbWaypointBmc {
    async fn upsert_waypoint(&self, waypoint: Waypoint) -> Result<()> {
        sqlx::query(
            r#"insert into waypoints (waypoint_symbol, waypoint) values ($1, $2)
               on conflict (waypoint_symbol) do update set waypoint = excluded.waypoint"#,
        )
        .bind(&waypoint.symbol.0)
        .bind(Json(&waypoint))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_waypoint(&self, waypoint_symbol: &WaypointSymbol) -> Result<Option<Waypoint>> {
        let row: Option<WaypointRow> = sqlx::query_as("select waypoint as waypoint from waypoints where waypoint_symbol = $1")
            .bind(&waypoint_symbol.0)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|r| r.waypoint.0))
    }

    async fn get_waypoints_in_system(&self, system_symbol: &SystemSymbol) -> Result<Vec<Waypoint>> {
        let rows: Vec<WaypointRow> = sqlx::query_as("select waypoint as waypoint from waypoints where waypoint_symbol like $1")
            .bind(format!("{}-%", system_symbol.0))
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(|r| r.waypoint.0).collect())
    }

    async fn get_cached_distance(&self, a: &WaypointSymbol, b: &WaypointSymbol) -> Result<Option<f64>> {
        let (lo, hi) = distance_key(a, b);
        let row: Option<(f64,)> = sqlx::query_as("select value from waypoint_distances where a = $1 and b = $2")
            .bind(lo)
            .bind(hi)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|(v,)| v))
    }

    async fn cache_distance(&self, a: &WaypointSymbol, b: &WaypointSymbol, value: f64) -> Result<()> {
        let (lo, hi) = distance_key(a, b);
        sqlx::query(
            r#"insert into waypoint_distances (a, b, value) values ($1, $2, $3)
               on conflict (a, b) do update set value = excluded.value"#,
        )
        .bind(lo)
        .bind(hi)
        .bind(value)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct InMemoryWaypointBmc {
    waypoints: RwLock<HashMap<WaypointSymbol, Waypoint>>,
    distances: RwLock<HashMap<(String, String), f64>>,
}

#[async_trait]
impl WaypointBmcTrait for InMemoryWaypointBmc {
    async fn upsert_waypoint(&self, waypoint: Waypoint) -> Result<()> {
        self.waypoints.write().unwrap().insert(waypoint.symbol.clone(), waypoint);
        Ok(())
    }

    async fn get_waypoint(&self, waypoint_symbol: &WaypointSymbol) -> Result<Option<Waypoint>> {
        Ok(self.waypoints.read().unwrap().get(waypoint_symbol).cloned())
    }

    async fn get_waypoints_in_system(&self, system_symbol: &SystemSymbol) -> Result<Vec<Waypoint>> {
        Ok(self
            .waypoints
            .read()
            .unwrap()
            .values()
            .filter(|w| &w.system_symbol == system_symbol)
            .cloned()
            .collect())
    }

    async fn get_cached_distance(&self, a: &WaypointSymbol, b: &WaypointSymbol) -> Result<Option<f64>> {
        Ok(self.distances.read().unwrap().get(&distance_key(a, b)).copied())
    }

    async fn cache_distance(&self, a: &WaypointSymbol, b: &WaypointSymbol, value: f64) -> Result<()> {
        self.distances.write().unwrap().insert(distance_key(a, b), value);
        Ok(())
    }
}
