use std::collections::HashMap;
use std::sync::RwLock;

use anyhow::Result;
use async_trait::async_trait;
use mockall::automock;
use sqlx::types::Json;
use sqlx::{Pool, Postgres};
use st_domain::{Ship, ShipSymbol};

/// Backs the ship cache's `SHIP.NAV`/`SHIP.FUEL`/`SHIP.CARGO`/`SHIP.COOLDOWN`
/// tables — collapsed to one `ship_cache` table keyed on ship symbol, since
/// every sub-resource always changes together from the cache's perspective.
#[automock]
#[async_trait]
pub trait ShipCacheBmcTrait: Send + Sync + std::fmt::Debug {
    async fn get_ship(&self, ship_symbol: &ShipSymbol) -> Result<Option<Ship>>;
    async fn get_ships(&self) -> Result<Vec<Ship>>;
    async fn upsert_ship(&self, ship: Ship) -> Result<()>;
}

#[derive(Debug)]
pub struct DbShipCacheBmc {
    pub pool: Pool<Postgres>,
}

#[derive(sqlx::FromRow)]
struct ShipRow {
    ship: Json<Ship>,
}

#[async_trait]
impl ShipCacheBmcTrait for DbShipCacheBmc {
    async fn get_ship(&self, ship_symbol: &ShipSymbol) -> Result<Option<Ship>> {
        let row: Option<ShipRow> = sqlx::query_as("select ship as ship from ship_cache where ship_symbol = $1")
            .bind(&ship_symbol.0)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|r| r.ship.0))
    }

    async fn get_ships(&self) -> Result<Vec<Ship>> {
        let rows: Vec<ShipRow> = sqlx::query_as("select ship as ship from ship_cache")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(|r| r.ship.0).collect())
    }

    async fn upsert_ship(&self, ship: Ship) -> Result<()> {
        sqlx::query(
            r#"insert into ship_cache (ship_symbol, ship, updated_at)
               values ($1, $2, now())
               on conflict (ship_symbol) do update set ship = excluded.ship, updated_at = now()"#,
        )
        .bind(&ship.symbol.0)
        .bind(Json(&ship))
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct InMemoryShipCacheBmc {
    ships: RwLock<HashMap<ShipSymbol, Ship>>,
}

#[async_trait]
impl ShipCacheBmcTrait for InMemoryShipCacheBmc {
    async fn get_ship(&self, ship_symbol: &ShipSymbol) -> Result<Option<Ship>> {
        Ok(self.ships.read().unwrap().get(ship_symbol).cloned())
    }

    async fn get_ships(&self) -> Result<Vec<Ship>> {
        Ok(self.ships.read().unwrap().values().cloned().collect())
    }

    async fn upsert_ship(&self, ship: Ship) -> Result<()> {
        self.ships.write().unwrap().insert(ship.symbol.clone(), ship);
        Ok(())
    }
}
