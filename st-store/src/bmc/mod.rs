pub mod frm_bmc;
pub mod market_bmc;
pub mod ship_cache_bmc;
pub mod trade_bmc;
pub mod waypoint_bmc;

use std::fmt::Debug;
use std::sync::Arc;

use mockall::automock;
use sqlx::{Pool, Postgres};

pub use frm_bmc::{DbFrmBmc, FrmBmcTrait, InMemoryFrmBmc};
pub use market_bmc::{DbMarketBmc, InMemoryMarketBmc, MarketBmcTrait};
pub use ship_cache_bmc::{DbShipCacheBmc, InMemoryShipCacheBmc, ShipCacheBmcTrait};
pub use trade_bmc::{DbTradeBmc, InMemoryTradeBmc, TradeBmcTrait};
pub use waypoint_bmc::{DbWaypointBmc, InMemoryWaypointBmc, WaypointBmcTrait};

/// Aggregate capability interface, one accessor per sub-BMC.
#[automock]
pub trait Bmc: Send + Sync + Debug {
    fn ship_cache_bmc(&self) -> Arc<dyn ShipCacheBmcTrait>;
    fn frm_bmc(&self) -> Arc<dyn FrmBmcTrait>;
    fn market_bmc(&self) -> Arc<dyn MarketBmcTrait>;
    fn trade_bmc(&self) -> Arc<dyn TradeBmcTrait>;
    fn waypoint_bmc(&self) -> Arc<dyn WaypointBmcTrait>;
}

#[derive(Debug, Clone)]
pub struct DbBmc {
    pub pool: Pool<Postgres>,
    ship_cache_bmc: Arc<DbShipCacheBmc>,
    frm_bmc: Arc<DbFrmBmc>,
    market_bmc: Arc<DbMarketBmc>,
    trade_bmc: Arc<DbTradeBmc>,
    waypoint_bmc: Arc<DbWaypointBmc>,
}

impl DbBmc {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self {
            ship_cache_bmc: Arc::new(DbShipCacheBmc { pool: pool.clone() }),
            frm_bmc: Arc::new(DbFrmBmc { pool: pool.clone() }),
            market_bmc: Arc::new(DbMarketBmc { pool: pool.clone() }),
            trade_bmc: Arc::new(DbTradeBmc { pool: pool.clone() }),
            waypoint_bmc: Arc::new(DbWaypointBmc { pool: pool.clone() }),
            pool,
        }
    }
}

impl Bmc for DbBmc {
    fn ship_cache_bmc(&self) -> Arc<dyn ShipCacheBmcTrait> {
        self.ship_cache_bmc.clone() as Arc<dyn ShipCacheBmcTrait>
    }

    fn frm_bmc(&self) -> Arc<dyn FrmBmcTrait> {
        self.frm_bmc.clone() as Arc<dyn FrmBmcTrait>
    }

    fn market_bmc(&self) -> Arc<dyn MarketBmcTrait> {
        self.market_bmc.clone() as Arc<dyn MarketBmcTrait>
    }

    fn trade_bmc(&self) -> Arc<dyn TradeBmcTrait> {
        self.trade_bmc.clone() as Arc<dyn TradeBmcTrait>
    }

    fn waypoint_bmc(&self) -> Arc<dyn WaypointBmcTrait> {
        self.waypoint_bmc.clone() as Arc<dyn WaypointBmcTrait>
    }
}

#[derive(Debug, Default)]
pub struct InMemoryBmc {
    pub in_mem_ship_cache_bmc: Arc<InMemoryShipCacheBmc>,
    pub in_mem_frm_bmc: Arc<InMemoryFrmBmc>,
    pub in_mem_market_bmc: Arc<InMemoryMarketBmc>,
    pub in_mem_trade_bmc: Arc<InMemoryTradeBmc>,
    pub in_mem_waypoint_bmc: Arc<InMemoryWaypointBmc>,
}

impl InMemoryBmc {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Bmc for InMemoryBmc {
    fn ship_cache_bmc(&self) -> Arc<dyn ShipCacheBmcTrait> {
        Arc::clone(&self.in_mem_ship_cache_bmc) as Arc<dyn ShipCacheBmcTrait>
    }

    fn frm_bmc(&self) -> Arc<dyn FrmBmcTrait> {
        Arc::clone(&self.in_mem_frm_bmc) as Arc<dyn FrmBmcTrait>
    }

    fn market_bmc(&self) -> Arc<dyn MarketBmcTrait> {
        Arc::clone(&self.in_mem_market_bmc) as Arc<dyn MarketBmcTrait>
    }

    fn trade_bmc(&self) -> Arc<dyn TradeBmcTrait> {
        Arc::clone(&self.in_mem_trade_bmc) as Arc<dyn TradeBmcTrait>
    }

    fn waypoint_bmc(&self) -> Arc<dyn WaypointBmcTrait> {
        Arc::clone(&self.in_mem_waypoint_bmc) as Arc<dyn WaypointBmcTrait>
    }
}
