use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use chrono::Utc;
use st_domain::{
    distance, ControllerId, FlightMode, MarketSnapshot, ShipRole, ShipSymbol, SystemSymbol, WaypointSymbol, BASE_PRIO_SATELLITES,
    MARKET_INTEL_CONTROLLER,
};
use st_store::{FrmBmcTrait, MarketBmcTrait, ShipCacheBmcTrait, WaypointBmcTrait};
use tracing::{info, warn};

use crate::fleet::FleetResourceManager;
use crate::runtime::{Task, TaskRuntime};
use crate::ship_ops::ShipOps;
use crate::st_client::StClientTrait;

/// How markets are selected for refresh, per the controller's `mode` parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarketIntelMode {
    All,
    NoFuel,
    NoExchanges,
}

const SERVER_SETTLE_DELAY: Duration = Duration::from_secs(4);
const EMPTY_QUEUE_RETRY_DELAY: Duration = Duration::from_secs(2);

/// Keeps market snapshots fresh across a system by dispatching SATELLITE
/// ships. One outstanding `updateMarket` task per ship it currently holds.
pub struct MarketIntelController<B: FrmBmcTrait> {
    pub frm: Arc<FleetResourceManager<B>>,
    pub ship_ops: Arc<dyn ShipOps>,
    pub ship_cache: Arc<dyn ShipCacheBmcTrait>,
    pub client: Arc<dyn StClientTrait>,
    pub market_bmc: Arc<dyn MarketBmcTrait>,
    pub waypoint_bmc: Arc<dyn WaypointBmcTrait>,
    pub runtime: TaskRuntime,
}

struct FleetEntry {
    ship_symbol: ShipSymbol,
    market: WaypointSymbol,
    task: Task<Result<bool>>,
}

impl<B: FrmBmcTrait + 'static> MarketIntelController<B> {
    fn controller_id(&self) -> ControllerId {
        ControllerId(MARKET_INTEL_CONTROLLER.to_string())
    }

    /// `score = dist + dist * (maxAge - age) - (1 if already the ship's
    /// waypoint else 0)`. Lower is better, ties broken by insertion order.
    pub fn score(dist: f64, max_age_secs: f64, age_secs: f64, is_current_ship_waypoint: bool) -> f64 {
        dist + dist * (max_age_secs - age_secs) - if is_current_ship_waypoint { 1.0 } else { 0.0 }
    }

    async fn build_queue(&self, system: &SystemSymbol, mode: MarketIntelMode, refresh_freq: i64) -> Result<Vec<WaypointSymbol>> {
        let waypoints = self.waypoint_bmc.get_waypoints_in_system(system).await?;
        let mut candidates = Vec::new();
        let now = Utc::now();

        for wp in waypoints.iter().filter(|w| w.has_marketplace()) {
            let current = self.market_bmc.get_current(&wp.symbol).await?;
            let include = match (&current, mode) {
                (None, _) => true,
                // every marketplace in the system, regardless of age — ordering
                // below (oldest/NULL first) is what keeps this mode well-behaved.
                (Some(_), MarketIntelMode::All) => true,
                (Some(snapshot), MarketIntelMode::NoFuel) => snapshot
                    .trade_goods
                    .iter()
                    .filter(|g| g.symbol != st_domain::TradeGoodSymbol::Fuel)
                    .all(|_| (now - snapshot.observed_at).num_seconds() >= refresh_freq),
                (Some(snapshot), MarketIntelMode::NoExchanges) => {
                    let imports = snapshot.trade_goods.iter().any(|g| g.trade_good_type == st_domain::TradeGoodType::Import);
                    let exports = snapshot.trade_goods.iter().any(|g| g.trade_good_type == st_domain::TradeGoodType::Export);
                    imports && exports && (now - snapshot.observed_at).num_seconds() >= refresh_freq
                }
            };
            if include {
                candidates.push((wp.symbol.clone(), current.as_ref().map(|s| s.observed_at)));
            }
        }

        candidates.sort_by_key(|(_, ts)| *ts);
        Ok(candidates.into_iter().map(|(wp, _)| wp).collect())
    }

    /// Runs the market-intel loop until cancelled or a fatal error.
    /// Releases every ship this controller owns before returning, win or lose.
    pub async fn run(&self, system: SystemSymbol, refresh_freq: i64, mode: MarketIntelMode) -> Result<()> {
        let result = self.run_inner(system, refresh_freq, mode).await;
        let _ = self.frm.release_fleet(&self.controller_id(), false).await;
        result
    }

    async fn run_inner(&self, system: SystemSymbol, refresh_freq: i64, mode: MarketIntelMode) -> Result<()> {
        let mut fleet: Vec<FleetEntry> = Vec::new();

        loop {
            let queue = self.build_queue(&system, mode, refresh_freq).await?;
            let in_flight: HashSet<WaypointSymbol> = fleet.iter().map(|e| e.market.clone()).collect();
            let pending: Vec<WaypointSymbol> = queue.into_iter().filter(|m| !in_flight.contains(m)).collect();

            let mut blocked_pass = false;
            for market in pending {
                if blocked_pass {
                    break;
                }
                let available = self.frm.available_ships(BASE_PRIO_SATELLITES, Some(&self.controller_id())).await?;
                let nearest = self.nearest_satellite(&system, &available, &market).await?;
                match nearest {
                    Some(ship_symbol) => {
                        if !self.frm.request(&ship_symbol, &self.controller_id(), BASE_PRIO_SATELLITES).await? {
                            blocked_pass = true;
                            continue;
                        }
                        let controller = self.clone();
                        let ship_for_task = ship_symbol.clone();
                        let market_for_task = market.clone();
                        let task = self.runtime.spawn(async move { controller.update_market(ship_for_task, market_for_task).await });
                        fleet.push(FleetEntry { ship_symbol, market, task });
                    }
                    None => blocked_pass = true,
                }
            }

            let mut still_pending = Vec::new();
            let mut any_running = false;
            for entry in fleet {
                if entry.task.done() {
                    match entry.task.join().await {
                        Ok(Ok(_)) | Ok(Err(_)) => {}
                        Err(e) => warn!("updateMarket task for {} panicked: {e}", entry.ship_symbol),
                    }
                    if !blocked_pass {
                        let _ = self.frm.release(&entry.ship_symbol, false).await;
                    }
                } else {
                    any_running = true;
                    still_pending.push(entry);
                }
            }
            fleet = still_pending;

            let queue_cleared = fleet.is_empty() && self.build_queue(&system, mode, refresh_freq).await?.is_empty();
            if queue_cleared {
                if refresh_freq > 0 {
                    self.runtime.sleep(Duration::from_secs(refresh_freq as u64)).await;
                }
            } else if any_running {
                fleet = self.await_first_completion(fleet, blocked_pass).await;
            } else {
                self.runtime.sleep(EMPTY_QUEUE_RETRY_DELAY).await;
            }
        }
    }

    /// Waits for whichever in-flight `updateMarket` task finishes first,
    /// releases its ship (unless this pass was blocked, in which case the
    /// ship/market pairing is retained so next tick can reuse it), and
    /// returns the fleet with that entry removed.
    async fn await_first_completion(&self, fleet: Vec<FleetEntry>, blocked_pass: bool) -> Vec<FleetEntry> {
        let mut metas: Vec<(ShipSymbol, WaypointSymbol)> = fleet.iter().map(|e| (e.ship_symbol.clone(), e.market.clone())).collect();
        let tasks: Vec<Task<Result<bool>>> = fleet.into_iter().map(|e| e.task).collect();

        let (index, result, remaining_tasks) = self.runtime.await_any(tasks).await;
        let (ship_symbol, _market) = metas.remove(index);
        match result {
            Ok(Ok(_)) | Ok(Err(_)) => {}
            Err(e) => warn!("updateMarket task for {ship_symbol} panicked: {e}"),
        }
        if !blocked_pass {
            let _ = self.frm.release(&ship_symbol, false).await;
        }

        metas
            .into_iter()
            .zip(remaining_tasks)
            .map(|((ship_symbol, market), task)| FleetEntry { ship_symbol, market, task })
            .collect()
    }

    async fn nearest_satellite(&self, system: &SystemSymbol, available: &[ShipSymbol], market: &WaypointSymbol) -> Result<Option<ShipSymbol>> {
        let market_wp = self.waypoint_bmc.get_waypoint(market).await?;
        let Some(market_wp) = market_wp else { return Ok(None) };

        let mut best: Option<(ShipSymbol, f64)> = None;
        for ship_symbol in available {
            let ship = match self.ship_cache.get_ship(ship_symbol).await? {
                Some(s) => s,
                None => match self.ship_ops.refresh_ship(ship_symbol).await {
                    Ok(s) => s,
                    Err(_) => continue,
                },
            };
            if ship.role() != ShipRole::Satellite || &ship.nav.system_symbol != system {
                continue;
            }
            let nav = ship.nav;
            let Some(ship_wp) = self.waypoint_bmc.get_waypoint(&nav.waypoint_symbol).await? else { continue };
            let d = distance((ship_wp.x, ship_wp.y), (market_wp.x, market_wp.y));
            if best.as_ref().map(|(_, bd)| d < *bd).unwrap_or(true) {
                best = Some((ship_symbol.clone(), d));
            }
        }
        Ok(best.map(|(s, _)| s))
    }

    /// `updateMarket(ship, market)`: navigate there if not already present,
    /// wait out the server-settle delay, dock, fetch and persist market and
    /// shipyard snapshots.
    async fn update_market(&self, ship_symbol: ShipSymbol, market: WaypointSymbol) -> Result<bool> {
        self.frm.set_blocked(&ship_symbol, true).await?;
        let result = self.update_market_inner(&ship_symbol, &market).await;
        self.frm.set_blocked(&ship_symbol, false).await?;
        result
    }

    async fn update_market_inner(&self, ship_symbol: &ShipSymbol, market: &WaypointSymbol) -> Result<bool> {
        let nav = self.ship_ops.nav_of(ship_symbol).await?;
        if &nav.waypoint_symbol != market {
            self.ship_ops.navigate(ship_symbol, market, FlightMode::Cruise).await?.into_result()?;
            self.runtime.sleep(SERVER_SETTLE_DELAY).await;
        }
        self.ship_ops.dock(ship_symbol).await?.into_result()?;

        let market_resp = self.client.get_marketplace(market).await?;
        let snapshot = MarketSnapshot {
            waypoint_symbol: market_resp.data.symbol,
            observed_at: Utc::now(),
            trade_goods: market_resp.data.trade_goods,
        };
        self.market_bmc.insert_snapshot(snapshot).await?;

        if let Ok(shipyard_resp) = self.client.get_shipyard(market).await {
            info!("refreshed shipyard at {market}: {} ship types on offer", shipyard_resp.data.ship_types.len());
        }

        Ok(true)
    }
}

/// Manual impl: every field is `Arc`-wrapped, so cloning never needs `B: Clone`
/// (a bound `#[derive(Clone)]` would otherwise impose on this generic struct).
impl<B: FrmBmcTrait> Clone for MarketIntelController<B> {
    fn clone(&self) -> Self {
        Self {
            frm: self.frm.clone(),
            ship_ops: self.ship_ops.clone(),
            ship_cache: self.ship_cache.clone(),
            client: self.client.clone(),
            market_bmc: self.market_bmc.clone(),
            waypoint_bmc: self.waypoint_bmc.clone(),
            runtime: self.runtime,
        }
    }
}

impl<B: FrmBmcTrait> std::fmt::Debug for MarketIntelController<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MarketIntelController").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn a_closer_market_scores_lower_than_a_farther_one() {
        let close = MarketIntelController::<st_store::InMemoryFrmBmc>::score(5.0, 600.0, 0.0, false);
        let far = MarketIntelController::<st_store::InMemoryFrmBmc>::score(50.0, 600.0, 0.0, false);
        assert!(close < far);
    }

    #[test]
    fn being_at_the_market_already_improves_the_score() {
        let elsewhere = MarketIntelController::<st_store::InMemoryFrmBmc>::score(10.0, 600.0, 300.0, false);
        let here = MarketIntelController::<st_store::InMemoryFrmBmc>::score(10.0, 600.0, 300.0, true);
        assert!(here < elsewhere);
    }

    #[test]
    fn a_stale_market_scores_lower_than_a_freshly_seen_one() {
        let stale = MarketIntelController::<st_store::InMemoryFrmBmc>::score(10.0, 600.0, 0.0, false);
        let fresh = MarketIntelController::<st_store::InMemoryFrmBmc>::score(10.0, 600.0, 590.0, false);
        assert!(stale < fresh);
    }
}
