use std::collections::HashSet;
use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;

use anyhow::Result;
use chrono::Utc;
use st_domain::{
    default_excavator_goods_whitelist, distance, ControllerId, ShipSymbol, SystemSymbol, TradeGoodSymbol, TradeRecord, TransactionType, Waypoint,
    WaypointSymbol, YieldRecord, BASE_PRIO_EXTRACTORS, BASE_PRIO_HAULERS, EXTRACTION_CONTROLLER,
};
use st_store::{FrmBmcTrait, ShipCacheBmcTrait, TradeBmcTrait, WaypointBmcTrait};
use tracing::{info, warn};

use crate::fleet::FleetResourceManager;
use crate::runtime::{Task, TaskRuntime};
use crate::ship_ops::ShipOps;

pub const MAX_MINERS: usize = 8;
pub const MAX_SIPHONERS: usize = 10;
pub const MIN_HAUL_RATIO: f64 = 0.75;
pub const STATUS_REPORT_PERIOD: Duration = Duration::from_secs(600);

const CARGO_FULL_RECHECK_DELAY: Duration = Duration::from_secs(10);
const COOLDOWN_SLACK: Duration = Duration::from_millis(150);
const CARGO_NEARLY_FULL_THRESHOLD: f64 = 0.85;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ExtractionKind {
    Mining,
    Siphoning,
}

/// Fixed per-site caps for how many excavators it can keep saturated.
fn cap_for(kind: ExtractionKind) -> usize {
    match kind {
        ExtractionKind::Mining => MAX_MINERS,
        ExtractionKind::Siphoning => MAX_SIPHONERS,
    }
}

/// Runs both the extractor and hauler sub-controllers over one system. They
/// share the fleet resource manager but use disjoint priorities
/// (`EXTRACTOR` < `HAULER`), so a hauler can always preempt an excavator it
/// needs to use as a temporary waypoint reference, never the reverse.
pub struct ExtractHaulController<B: FrmBmcTrait> {
    pub frm: Arc<FleetResourceManager<B>>,
    pub ship_ops: Arc<dyn ShipOps>,
    pub ship_cache: Arc<dyn ShipCacheBmcTrait>,
    pub trade_bmc: Arc<dyn TradeBmcTrait>,
    pub waypoint_bmc: Arc<dyn WaypointBmcTrait>,
    pub runtime: TaskRuntime,
    job_started_at: std::time::Instant,
    total_yield_units: Arc<Mutex<i64>>,
    being_serviced: Arc<Mutex<HashSet<ShipSymbol>>>,
}

impl<B: FrmBmcTrait> Clone for ExtractHaulController<B> {
    fn clone(&self) -> Self {
        Self {
            frm: self.frm.clone(),
            ship_ops: self.ship_ops.clone(),
            ship_cache: self.ship_cache.clone(),
            trade_bmc: self.trade_bmc.clone(),
            waypoint_bmc: self.waypoint_bmc.clone(),
            runtime: self.runtime,
            job_started_at: self.job_started_at,
            total_yield_units: self.total_yield_units.clone(),
            being_serviced: self.being_serviced.clone(),
        }
    }
}

impl<B: FrmBmcTrait> std::fmt::Debug for ExtractHaulController<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExtractHaulController").finish_non_exhaustive()
    }
}

impl<B: FrmBmcTrait + 'static> ExtractHaulController<B> {
    pub fn new(
        frm: Arc<FleetResourceManager<B>>,
        ship_ops: Arc<dyn ShipOps>,
        ship_cache: Arc<dyn ShipCacheBmcTrait>,
        trade_bmc: Arc<dyn TradeBmcTrait>,
        waypoint_bmc: Arc<dyn WaypointBmcTrait>,
        runtime: TaskRuntime,
    ) -> Self {
        Self {
            frm,
            ship_ops,
            ship_cache,
            trade_bmc,
            waypoint_bmc,
            runtime,
            job_started_at: std::time::Instant::now(),
            total_yield_units: Arc::new(Mutex::new(0)),
            being_serviced: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    fn controller_id(&self) -> ControllerId {
        ControllerId(EXTRACTION_CONTROLLER.to_string())
    }

    /// Greedily fits as many drones as possible into `free_capacity`, largest
    /// holds first (maximizes how much a single trip picks up). Returns the
    /// chosen drones and their combined yield.
    pub fn round_up_drones(free_capacity: i64, mut drones: Vec<(ShipSymbol, i64)>) -> (Vec<ShipSymbol>, i64) {
        drones.sort_by(|a, b| b.1.cmp(&a.1));
        let mut chosen = Vec::new();
        let mut total = 0;
        for (ship, units) in drones {
            if total + units <= free_capacity {
                total += units;
                chosen.push(ship);
            }
        }
        (chosen, total)
    }

    /// `total >= MIN_HAUL_RATIO * capacity`, the dispatch-worthiness check.
    pub fn meets_haul_threshold(total: i64, capacity: i64) -> bool {
        (total as f64) >= MIN_HAUL_RATIO * (capacity as f64)
    }

    /// Runs the extractor sub-controller against `target` (an asteroid or
    /// gas giant waypoint) until cancelled or fatal error, releasing its
    /// fleet unconditionally on exit.
    pub async fn run_extractor(&self, system: SystemSymbol, target: Waypoint) -> Result<()> {
        let kind = if target.is_siphonable() { ExtractionKind::Siphoning } else { ExtractionKind::Mining };
        let result = self.run_extractor_inner(system, target, kind).await;
        let _ = self.frm.release_fleet(&self.controller_id(), false).await;
        result
    }

    async fn run_extractor_inner(&self, system: SystemSymbol, target: Waypoint, kind: ExtractionKind) -> Result<()> {
        let mut dispatched: HashSet<ShipSymbol> = HashSet::new();
        loop {
            let whitelist = default_excavator_goods_whitelist();
            let ships = self.ship_cache.get_ships().await?;
            let candidates: Vec<ShipSymbol> = ships
                .into_iter()
                .filter(|s| s.nav.system_symbol == system)
                .filter(|s| match kind {
                    ExtractionKind::Mining => s.is_mining_drone(),
                    ExtractionKind::Siphoning => s.is_siphon_drone(),
                })
                .map(|s| s.symbol)
                .filter(|s| !dispatched.contains(s))
                .collect();

            let remaining_slots = cap_for(kind).saturating_sub(dispatched.len());
            for ship_symbol in candidates.into_iter().take(remaining_slots) {
                if !self.frm.request(&ship_symbol, &self.controller_id(), BASE_PRIO_EXTRACTORS).await? {
                    continue;
                }
                dispatched.insert(ship_symbol.clone());
                let controller = self.clone();
                let target = target.clone();
                let whitelist = whitelist.clone();
                let _ = self.runtime.spawn(async move { controller.extract_loop(ship_symbol, target, kind, whitelist).await });
            }

            self.runtime.sleep(Duration::from_secs(30)).await;
        }
    }

    /// `extract_goods`/`siphon_goods`: navigate to the site, orbit, loop
    /// extracting until cargo is full (jettisoning anything off the
    /// whitelist), then wait for a hauler to drain it before resuming.
    async fn extract_loop(&self, ship_symbol: ShipSymbol, target: Waypoint, kind: ExtractionKind, whitelist: Vec<TradeGoodSymbol>) -> Result<()> {
        self.ship_ops.navigate(&ship_symbol, &target.symbol, st_domain::FlightMode::Cruise).await?.into_result()?;
        self.ship_ops.orbit(&ship_symbol).await?.into_result()?;

        loop {
            let cargo = self.ship_ops.cargo_of(&ship_symbol).await?;
            if cargo.units >= cargo.capacity {
                self.runtime.sleep(CARGO_FULL_RECHECK_DELAY).await;
                continue;
            }

            let outcome = match kind {
                ExtractionKind::Mining => self.ship_ops.extract(&ship_symbol).await?,
                ExtractionKind::Siphoning => self.ship_ops.siphon(&ship_symbol).await?,
            };
            let (good, units) = match outcome {
                st_domain::Outcome::Success(v) => v,
                st_domain::Outcome::Transient => continue,
                st_domain::Outcome::DomainFailure(k) => {
                    warn!("{ship_symbol} extraction refused: {k}");
                    continue;
                }
                st_domain::Outcome::Fatal(e) => return Err(e),
            };

            *self.total_yield_units.lock().unwrap() += units as i64;
            self.trade_bmc
                .insert_yield(YieldRecord {
                    ship_symbol: ship_symbol.clone(),
                    waypoint_symbol: target.symbol.clone(),
                    trade_symbol: good,
                    units: units as i64,
                    observed_at: Utc::now(),
                })
                .await?;

            if !whitelist.contains(&good) {
                let _ = self.ship_ops.jettison(&ship_symbol, good, units).await?;
            }

            let cooldown = self.ship_ops.cooldown_of(&ship_symbol).await?;
            self.runtime.sleep(Duration::from_secs(cooldown.remaining_seconds.max(0) as u64) + COOLDOWN_SLACK).await;
        }
    }

    /// Runs the hauler sub-controller, scanning `sites` for excavators ready
    /// to be drained and dispatching HAULER ships to collect them.
    pub async fn run_hauler(&self, system: SystemSymbol, sites: Vec<Waypoint>) -> Result<()> {
        let result = self.run_hauler_inner(system, sites).await;
        let _ = self.frm.release_fleet(&self.controller_id(), false).await;
        result
    }

    async fn run_hauler_inner(&self, system: SystemSymbol, sites: Vec<Waypoint>) -> Result<()> {
        let mut last_report = std::time::Instant::now();

        loop {
            for site in &sites {
                let being_serviced = self.being_serviced.lock().unwrap().clone();
                let ready_drones = self.ready_drones_at(site, &being_serviced).await?;
                if ready_drones.is_empty() {
                    continue;
                }
                if let Some((hauler, targets)) = self.dispatch_haulers(&system, site, &ready_drones).await? {
                    {
                        let mut guard = self.being_serviced.lock().unwrap();
                        for (ship, _) in &targets {
                            guard.insert(ship.clone());
                        }
                    }
                    let controller = self.clone();
                    let targets_for_task = targets.clone();
                    let site_symbol = site.symbol.clone();
                    let _ = self.runtime.spawn(async move { controller.haul_yields(hauler, site_symbol, targets_for_task).await });
                }
            }

            if last_report.elapsed() >= STATUS_REPORT_PERIOD {
                let total = *self.total_yield_units.lock().unwrap();
                let hours = self.job_started_at.elapsed().as_secs_f64() / 3600.0;
                let per_hour = if hours > 0.0 { total as f64 / hours } else { 0.0 };
                info!("extract+haul: {total} units extracted so far, projected {per_hour:.0}/hour");
                last_report = std::time::Instant::now();
            }

            self.runtime.sleep(Duration::from_secs(15)).await;
        }
    }

    /// Excavators at `site`, not already being serviced, whose cargo is at
    /// or above the 85% dispatch threshold.
    async fn ready_drones_at(&self, site: &Waypoint, being_serviced: &HashSet<ShipSymbol>) -> Result<Vec<(ShipSymbol, i64)>> {
        let ships = self.ship_cache.get_ships().await?;
        let mut ready = Vec::new();
        for ship in ships {
            if being_serviced.contains(&ship.symbol) {
                continue;
            }
            if ship.nav.waypoint_symbol != site.symbol {
                continue;
            }
            if !ship.is_mining_drone() && !ship.is_siphon_drone() {
                continue;
            }
            if ship.cargo.fill_ratio() >= CARGO_NEARLY_FULL_THRESHOLD {
                ready.push((ship.symbol, ship.cargo.units));
            }
        }
        Ok(ready)
    }

    /// `dispatchHaulers`: tries candidate haulers nearest `site` first,
    /// committing the first one whose free capacity can pick up at least
    /// `MIN_HAUL_RATIO` of its hold from the ready drones.
    async fn dispatch_haulers(&self, system: &SystemSymbol, site: &Waypoint, ready: &[(ShipSymbol, i64)]) -> Result<Option<(ShipSymbol, Vec<(ShipSymbol, i64)>)>> {
        let haulers = self.candidate_haulers(system, site).await?;
        for hauler in haulers {
            if !self.frm.request(&hauler, &self.controller_id(), BASE_PRIO_HAULERS).await? {
                continue;
            }
            let cargo = self.ship_ops.cargo_of(&hauler).await?;
            let free_capacity = cargo.available_cargo_space();
            let drones: Vec<(ShipSymbol, i64)> = ready.to_vec();
            let (chosen_symbols, total) = Self::round_up_drones(free_capacity, drones);
            if Self::meets_haul_threshold(total, cargo.capacity) {
                let chosen: Vec<(ShipSymbol, i64)> = ready.iter().filter(|(s, _)| chosen_symbols.contains(s)).cloned().collect();
                return Ok(Some((hauler, chosen)));
            }
            let _ = self.frm.release(&hauler, false).await;
        }
        Ok(None)
    }

    async fn candidate_haulers(&self, system: &SystemSymbol, site: &Waypoint) -> Result<Vec<ShipSymbol>> {
        let ships = self.ship_cache.get_ships().await?;
        let mut with_distance = Vec::new();
        for ship in ships {
            if !ship.is_hauler() || &ship.nav.system_symbol != system {
                continue;
            }
            let Some(wp) = self.waypoint_bmc.get_waypoint(&ship.nav.waypoint_symbol).await? else { continue };
            let d = distance((wp.x, wp.y), (site.x, site.y));
            with_distance.push((ship.symbol, d));
        }
        with_distance.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap());
        Ok(with_distance.into_iter().map(|(s, _)| s).collect())
    }

    /// `haul_yields`: visits each target drone, transfers its whitelisted
    /// cargo aboard, then sells the collected hold.
    async fn haul_yields(&self, hauler: ShipSymbol, site: WaypointSymbol, targets: Vec<(ShipSymbol, i64)>) -> Result<()> {
        self.frm.set_blocked(&hauler, true).await?;
        let result = self.haul_yields_inner(&hauler, &site, &targets).await;
        self.frm.set_blocked(&hauler, false).await?;
        let _ = self.frm.release(&hauler, false).await;
        {
            let mut guard = self.being_serviced.lock().unwrap();
            for (drone, _) in &targets {
                guard.remove(drone);
            }
        }
        for (drone, _) in &targets {
            let _ = self.frm.release(drone, false).await;
        }
        result
    }

    async fn haul_yields_inner(&self, hauler: &ShipSymbol, site: &WaypointSymbol, targets: &[(ShipSymbol, i64)]) -> Result<()> {
        let mut collected_units = 0i64;
        for (drone, _) in targets {
            let nav = self.ship_ops.nav_of(drone).await?;
            self.ship_ops.navigate(hauler, &nav.waypoint_symbol, st_domain::FlightMode::Cruise).await?.into_result()?;
            let drone_cargo = self.ship_ops.cargo_of(drone).await?;
            for item in &drone_cargo.inventory {
                let Ok(symbol) = item.symbol.parse::<TradeGoodSymbol>() else { continue };
                self.ship_ops.transfer(drone, symbol, item.units as u32, hauler.clone()).await?.into_result()?;
                collected_units += item.units;
            }
        }

        let cargo = self.ship_ops.cargo_of(hauler).await?;
        let mut total_profit = 0i64;
        for item in cargo.inventory.clone() {
            let Ok(symbol) = item.symbol.parse::<TradeGoodSymbol>() else { continue };
            match self.ship_ops.sell(hauler, symbol, item.units as u32).await? {
                st_domain::Outcome::Success((_, price)) => {
                    total_profit += price;
                    let sink = self.ship_ops.nav_of(hauler).await?.waypoint_symbol;
                    self.trade_bmc
                        .insert_transaction(st_domain::Transaction {
                            ship_symbol: hauler.clone(),
                            waypoint_symbol: sink.clone(),
                            trade_symbol: symbol,
                            transaction_type: TransactionType::Sell,
                            units: item.units,
                            price_per_unit: if item.units > 0 { price / item.units } else { 0 },
                            total_price: price,
                            timestamp: Utc::now(),
                        })
                        .await?;
                    self.trade_bmc
                        .insert_trade(TradeRecord {
                            ship_symbol: hauler.clone(),
                            trade_symbol: symbol,
                            source: site.clone(),
                            sink,
                            units: item.units,
                            net_profit: price,
                            completed_at: Utc::now(),
                        })
                        .await?;
                }
                _ => warn!("{hauler} could not sell {symbol} at current waypoint"),
            }
        }

        info!("{hauler} delivered {collected_units} units, profit {total_profit}");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ship(name: &str) -> ShipSymbol {
        ShipSymbol(name.to_string())
    }

    #[test]
    fn round_up_drones_fills_largest_holds_first() {
        let drones = vec![(ship("D1"), 18), (ship("D2"), 10), (ship("D3"), 25)];
        let (chosen, total) = ExtractHaulController::<st_store::InMemoryFrmBmc>::round_up_drones(40, drones);
        assert_eq!(total, 28);
        assert_eq!(chosen, vec![ship("D3"), ship("D1")]);
    }

    #[test]
    fn round_up_drones_skips_any_single_drone_too_big_to_fit() {
        let drones = vec![(ship("D1"), 50)];
        let (chosen, total) = ExtractHaulController::<st_store::InMemoryFrmBmc>::round_up_drones(40, drones);
        assert!(chosen.is_empty());
        assert_eq!(total, 0);
    }

    #[test]
    fn hauler_dispatch_threshold_scenario() {
        // free capacity 40; drones hold 18 and 10 -> total 28 < 0.75 * 40 = 30
        let drones = vec![(ship("D1"), 18), (ship("D2"), 10)];
        let (_, total) = ExtractHaulController::<st_store::InMemoryFrmBmc>::round_up_drones(40, drones);
        assert!(!ExtractHaulController::<st_store::InMemoryFrmBmc>::meets_haul_threshold(total, 40));
    }

    #[test]
    fn hauler_dispatch_threshold_is_met_when_total_clears_the_ratio() {
        assert!(ExtractHaulController::<st_store::InMemoryFrmBmc>::meets_haul_threshold(30, 40));
        assert!(!ExtractHaulController::<st_store::InMemoryFrmBmc>::meets_haul_threshold(29, 40));
    }
}
