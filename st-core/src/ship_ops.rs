use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mockall::automock;
use st_domain::{Cargo, Cooldown, DomainFailureKind, FlightMode, Nav, Outcome, Ship, ShipSymbol, TradeGoodSymbol, WaypointSymbol};
use st_store::ShipCacheBmcTrait;

use crate::clock::Clock;
use crate::st_client::StClientTrait;

/// Classifies an `anyhow::Error` surfaced from `StClient` (which embeds the
/// HTTP status and body text in its message — see `make_api_call`) into the
/// `Outcome` kind a controller can act on, instead of making every call site
/// pattern-match on error text itself.
fn classify(err: anyhow::Error) -> Outcome<std::convert::Infallible> {
    let msg = err.to_string();
    if msg.contains("Status: 429") || msg.contains("Status: 599") || msg.contains("Status: 5") {
        return Outcome::Transient;
    }
    if msg.contains("already") && msg.contains("orbit") || msg.contains("already") && msg.contains("docked") {
        return Outcome::DomainFailure(DomainFailureKind::AlreadyAtDestination);
    }
    if msg.to_lowercase().contains("cooldown") {
        return Outcome::DomainFailure(DomainFailureKind::CooldownActive);
    }
    if msg.to_lowercase().contains("does not trade") || msg.to_lowercase().contains("market") {
        return Outcome::DomainFailure(DomainFailureKind::MarketDoesNotTrade);
    }
    if msg.to_lowercase().contains("cargo") && msg.to_lowercase().contains("empty") {
        return Outcome::DomainFailure(DomainFailureKind::CargoEmpty);
    }
    Outcome::Fatal(err)
}

macro_rules! call {
    ($expr:expr) => {
        match $expr {
            Ok(v) => v,
            Err(e) => {
                return Ok(match classify(e) {
                    Outcome::Transient => Outcome::Transient,
                    Outcome::DomainFailure(k) => Outcome::DomainFailure(k),
                    Outcome::Fatal(e) => Outcome::Fatal(e),
                    Outcome::Success(_) => unreachable!(),
                })
            }
        }
    };
}

/// The capability surface controllers program against: navigate, dock, orbit,
/// extract, siphon, buy, sell, transfer, jettison, refuel, plus read-throughs
/// of nav/cargo/cooldown. Concrete implementations talk to the remote API and
/// write through to the ship cache; tests inject a fake with deterministic
/// behavior.
#[automock]
#[async_trait]
pub trait ShipOps: Send + Sync + std::fmt::Debug {
    async fn nav_of(&self, ship_symbol: &ShipSymbol) -> Result<Nav>;
    async fn cargo_of(&self, ship_symbol: &ShipSymbol) -> Result<Cargo>;
    async fn cooldown_of(&self, ship_symbol: &ShipSymbol) -> Result<Cooldown>;

    async fn dock(&self, ship_symbol: &ShipSymbol) -> Result<Outcome<Nav>>;
    async fn orbit(&self, ship_symbol: &ShipSymbol) -> Result<Outcome<Nav>>;
    async fn navigate(&self, ship_symbol: &ShipSymbol, to: &WaypointSymbol, mode: FlightMode) -> Result<Outcome<Nav>>;
    async fn refuel(&self, ship_symbol: &ShipSymbol, units: Option<u32>, from_cargo: bool) -> Result<Outcome<Cargo>>;

    async fn extract(&self, ship_symbol: &ShipSymbol) -> Result<Outcome<(TradeGoodSymbol, u32)>>;
    async fn siphon(&self, ship_symbol: &ShipSymbol) -> Result<Outcome<(TradeGoodSymbol, u32)>>;
    async fn jettison(&self, ship_symbol: &ShipSymbol, symbol: TradeGoodSymbol, units: u32) -> Result<Outcome<Cargo>>;
    async fn buy(&self, ship_symbol: &ShipSymbol, symbol: TradeGoodSymbol, units: u32) -> Result<Outcome<(Cargo, i64)>>;
    async fn sell(&self, ship_symbol: &ShipSymbol, symbol: TradeGoodSymbol, units: u32) -> Result<Outcome<(Cargo, i64)>>;
    async fn transfer(&self, ship_symbol: &ShipSymbol, trade_symbol: TradeGoodSymbol, units: u32, target: ShipSymbol) -> Result<Outcome<Cargo>>;

    /// Forces a remote read-through, used by the FRM's `IN_TRANSIT`
    /// self-heal and by the ship cache on staleness.
    async fn refresh_ship(&self, ship_symbol: &ShipSymbol) -> Result<Ship>;
}

#[derive(Debug, Clone)]
pub struct RemoteShipOps {
    pub client: Arc<dyn StClientTrait>,
    pub ship_cache: Arc<dyn ShipCacheBmcTrait>,
    pub clock: Arc<dyn Clock>,
}

impl RemoteShipOps {
    pub fn new(client: Arc<dyn StClientTrait>, ship_cache: Arc<dyn ShipCacheBmcTrait>, clock: Arc<dyn Clock>) -> Self {
        Self { client, ship_cache, clock }
    }

    async fn update_nav(&self, ship_symbol: &ShipSymbol, nav: Nav) -> Result<()> {
        let mut ship = self.current_ship(ship_symbol).await?;
        ship.nav = nav;
        self.ship_cache.upsert_ship(ship).await
    }

    async fn update_cargo(&self, ship_symbol: &ShipSymbol, cargo: Cargo) -> Result<()> {
        let mut ship = self.current_ship(ship_symbol).await?;
        ship.cargo = cargo;
        self.ship_cache.upsert_ship(ship).await
    }

    /// Applies a units-added delta to a ship's cached cargo without a remote
    /// round trip, used by `transfer` to keep the receiving ship's cache
    /// in sync with the sending ship's.
    async fn add_cargo_units(&self, ship_symbol: &ShipSymbol, symbol: TradeGoodSymbol, units: i64) -> Result<()> {
        let mut ship = self.current_ship(ship_symbol).await?;
        ship.cargo = ship.cargo.with_item_added(&symbol.to_string(), units).map_err(|e| anyhow::anyhow!(e))?;
        self.ship_cache.upsert_ship(ship).await
    }

    /// A cached `IN_TRANSIT` row whose arrival has already passed is stale —
    /// the ship has really arrived, docked or orbited, and only a remote
    /// read-through can tell which.
    fn is_stale(ship: &Ship, now: DateTime<Utc>) -> bool {
        ship.nav.is_in_transit() && ship.nav.route.arrival <= now
    }

    async fn current_ship(&self, ship_symbol: &ShipSymbol) -> Result<Ship> {
        match self.ship_cache.get_ship(ship_symbol).await? {
            Some(ship) if !Self::is_stale(&ship, self.clock.now()) => Ok(ship),
            _ => self.refresh_ship(ship_symbol).await,
        }
    }
}

#[async_trait]
impl ShipOps for RemoteShipOps {
    async fn nav_of(&self, ship_symbol: &ShipSymbol) -> Result<Nav> {
        Ok(self.current_ship(ship_symbol).await?.nav)
    }

    async fn cargo_of(&self, ship_symbol: &ShipSymbol) -> Result<Cargo> {
        Ok(self.current_ship(ship_symbol).await?.cargo)
    }

    async fn cooldown_of(&self, ship_symbol: &ShipSymbol) -> Result<Cooldown> {
        Ok(self.current_ship(ship_symbol).await?.cooldown)
    }

    async fn dock(&self, ship_symbol: &ShipSymbol) -> Result<Outcome<Nav>> {
        let nav = self.nav_of(ship_symbol).await?;
        if nav.is_docked() {
            return Ok(Outcome::Success(nav));
        }
        let resp = call!(self.client.dock_ship(ship_symbol).await);
        self.update_nav(ship_symbol, resp.data.nav.clone()).await?;
        Ok(Outcome::Success(resp.data.nav))
    }

    async fn orbit(&self, ship_symbol: &ShipSymbol) -> Result<Outcome<Nav>> {
        let nav = self.nav_of(ship_symbol).await?;
        if nav.is_in_orbit() {
            return Ok(Outcome::Success(nav));
        }
        let resp = call!(self.client.orbit_ship(ship_symbol).await);
        self.update_nav(ship_symbol, resp.data.nav.clone()).await?;
        Ok(Outcome::Success(resp.data.nav))
    }

    async fn navigate(&self, ship_symbol: &ShipSymbol, to: &WaypointSymbol, mode: FlightMode) -> Result<Outcome<Nav>> {
        let nav = self.nav_of(ship_symbol).await?;
        if &nav.waypoint_symbol == to {
            return Ok(Outcome::Success(nav));
        }
        call!(self.client.set_flight_mode(ship_symbol, mode).await);
        let resp = call!(self.client.navigate(ship_symbol, to).await);
        self.update_nav(ship_symbol, resp.data.nav.clone()).await?;
        Ok(Outcome::Success(resp.data.nav))
    }

    async fn refuel(&self, ship_symbol: &ShipSymbol, units: Option<u32>, from_cargo: bool) -> Result<Outcome<Cargo>> {
        call!(self.client.refuel(ship_symbol, units, from_cargo).await);
        let cargo = self.cargo_of(ship_symbol).await?;
        Ok(Outcome::Success(cargo))
    }

    async fn extract(&self, ship_symbol: &ShipSymbol) -> Result<Outcome<(TradeGoodSymbol, u32)>> {
        let resp = call!(self.client.extract(ship_symbol).await);
        self.update_cargo(ship_symbol, resp.data.cargo).await?;
        let y = resp.data.extraction.extraction_yield;
        Ok(Outcome::Success((y.symbol, y.units)))
    }

    async fn siphon(&self, ship_symbol: &ShipSymbol) -> Result<Outcome<(TradeGoodSymbol, u32)>> {
        let resp = call!(self.client.siphon(ship_symbol).await);
        self.update_cargo(ship_symbol, resp.data.cargo).await?;
        let y = resp.data.siphon.siphon_yield;
        Ok(Outcome::Success((y.symbol, y.units)))
    }

    async fn jettison(&self, ship_symbol: &ShipSymbol, symbol: TradeGoodSymbol, units: u32) -> Result<Outcome<Cargo>> {
        let resp = call!(self.client.jettison(ship_symbol, symbol, units).await);
        self.update_cargo(ship_symbol, resp.data.cargo.clone()).await?;
        Ok(Outcome::Success(resp.data.cargo))
    }

    async fn buy(&self, ship_symbol: &ShipSymbol, symbol: TradeGoodSymbol, units: u32) -> Result<Outcome<(Cargo, i64)>> {
        let resp = call!(self.client.purchase_trade_good(ship_symbol, symbol, units).await);
        self.update_cargo(ship_symbol, resp.data.cargo.clone()).await?;
        Ok(Outcome::Success((resp.data.cargo, resp.data.transaction.total_price)))
    }

    async fn sell(&self, ship_symbol: &ShipSymbol, symbol: TradeGoodSymbol, units: u32) -> Result<Outcome<(Cargo, i64)>> {
        let resp = call!(self.client.sell_trade_good(ship_symbol, symbol, units).await);
        self.update_cargo(ship_symbol, resp.data.cargo.clone()).await?;
        Ok(Outcome::Success((resp.data.cargo, resp.data.transaction.total_price)))
    }

    async fn transfer(&self, ship_symbol: &ShipSymbol, trade_symbol: TradeGoodSymbol, units: u32, target: ShipSymbol) -> Result<Outcome<Cargo>> {
        let resp = call!(self.client.transfer_cargo(ship_symbol, trade_symbol, units, target.clone()).await);
        self.update_cargo(ship_symbol, resp.data.cargo.clone()).await?;
        self.add_cargo_units(&target, trade_symbol, units as i64).await?;
        Ok(Outcome::Success(resp.data.cargo))
    }

    async fn refresh_ship(&self, ship_symbol: &ShipSymbol) -> Result<Ship> {
        let resp = self.client.get_ship(ship_symbol).await?;
        self.ship_cache.upsert_ship(resp.data.clone()).await?;
        Ok(resp.data)
    }
}
