use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Result;
use chrono::Utc;
use rand::Rng;
use st_domain::{
    ControllerId, FlightMode, ShipSymbol, SupplyLevel, SystemSymbol, TradeGoodSymbol, TradeRecord, Transaction, TransactionType,
    WaypointSymbol, BASE_PRIO_TRADERS, TRADING_CONTROLLER,
};
use st_store::{FrmBmcTrait, MarketBmcTrait, ShipCacheBmcTrait, TradeBmcTrait, WaypointBmcTrait};
use tracing::{info, warn};

use crate::fleet::FleetResourceManager;
use crate::runtime::{Task, TaskRuntime};
use crate::ship_ops::ShipOps;

/// Goods excluded from greedy-trade candidacy regardless of margin — mirrors
/// the source's hardcoded blacklist (`FAB_MATS`, `ADVANCED_CIRCUITRY`,
/// `QUANTUM_STABILIZERS`, `FUEL`); the trimmed [`TradeGoodSymbol`] enum only
/// carries `FabMats` and `Fuel` of that set.
const EXCLUDED_GOODS: &[TradeGoodSymbol] = &[TradeGoodSymbol::FabMats, TradeGoodSymbol::Fuel];

const MIN_VOLUME: i64 = 6;
const MIN_NET_PROFIT: i64 = 500;
const MIN_ABORT_PROFIT: i64 = 50;
const REFRESH_PERIOD: Duration = Duration::from_secs(12);
const ASSIGNMENT_JITTER_MIN_MS: u64 = 20;
const ASSIGNMENT_JITTER_MAX_MS: u64 = 300;

/// One candidate route as read off current market snapshots.
#[derive(Debug, Clone, PartialEq)]
pub struct TradeCandidate {
    pub trade_symbol: TradeGoodSymbol,
    pub source: WaypointSymbol,
    pub sink: WaypointSymbol,
    pub trade_volume: i64,
    pub distance: f64,
    pub purchase_price: i64,
    pub sell_price: i64,
    pub net_profit: i64,
    pub max_traders: i64,
}

impl TradeCandidate {
    fn profit_over_distance(&self) -> f64 {
        if self.distance <= 0.0 {
            self.net_profit as f64
        } else {
            self.net_profit as f64 / self.distance
        }
    }
}

/// `⌈((ROI−1)·100)/49⌉` when supply is abundant-to-scarce, `⌈.../51⌉` when
/// either side is moderate, `1` otherwise. `ROI = sellPrice / purchasePrice`.
fn max_traders(src_supply: SupplyLevel, sink_supply: SupplyLevel, purchase_price: i64, sell_price: i64) -> i64 {
    if purchase_price <= 0 {
        return 1;
    }
    let roi = sell_price as f64 / purchase_price as f64;
    let divisor = if matches!(src_supply, SupplyLevel::Abundant | SupplyLevel::High) && matches!(sink_supply, SupplyLevel::Limited | SupplyLevel::Scarce)
    {
        49.0
    } else if src_supply == SupplyLevel::Moderate || sink_supply == SupplyLevel::Moderate {
        51.0
    } else {
        return 1;
    };
    let n = (((roi - 1.0) * 100.0) / divisor).ceil() as i64;
    n.max(1)
}

/// `repeats = max(1, min(cargoCap / tradeVolume, maxTraders − ongoing))`.
pub fn bundle_repeats(cargo_cap: i64, trade_volume: i64, max_traders: i64, ongoing: i64) -> i64 {
    if trade_volume <= 0 {
        return 1;
    }
    (cargo_cap / trade_volume).min(max_traders - ongoing).max(1)
}

/// `ongoing[symbol][source][sink] -> n`, tracking active assignments per route.
#[derive(Debug, Default)]
struct OngoingLedger {
    counts: HashMap<(TradeGoodSymbol, WaypointSymbol, WaypointSymbol), i64>,
}

impl OngoingLedger {
    fn get(&self, key: &(TradeGoodSymbol, WaypointSymbol, WaypointSymbol)) -> i64 {
        self.counts.get(key).copied().unwrap_or(0)
    }

    fn add(&mut self, key: (TradeGoodSymbol, WaypointSymbol, WaypointSymbol), n: i64) {
        *self.counts.entry(key).or_insert(0) += n;
    }

    fn remove(&mut self, key: &(TradeGoodSymbol, WaypointSymbol, WaypointSymbol), n: i64) {
        if let Some(v) = self.counts.get_mut(key) {
            *v -= n;
            if *v <= 0 {
                self.counts.remove(key);
            }
        }
    }
}

struct TradeTask {
    trade_symbol: TradeGoodSymbol,
    source: WaypointSymbol,
    sink: WaypointSymbol,
    units_per_repeat: i64,
    repeats: i64,
}

struct FleetEntry {
    ship_symbol: ShipSymbol,
    key: (TradeGoodSymbol, WaypointSymbol, WaypointSymbol),
    repeats: i64,
    task: Task<Result<bool>>,
}

struct FinishedEntry {
    ship_symbol: ShipSymbol,
    key: (TradeGoodSymbol, WaypointSymbol, WaypointSymbol),
    repeats: i64,
}

/// Acquires up to `max_haulers` HAULER ships and keeps them running the
/// greedy strategy: chase whichever profitable source-sink route currently
/// yields the best profit-per-distance, bundling multiple round trips onto
/// one ship when a route's headroom allows it.
pub struct GreedyTraderController<B: FrmBmcTrait> {
    pub frm: Arc<FleetResourceManager<B>>,
    pub ship_ops: Arc<dyn ShipOps>,
    pub ship_cache: Arc<dyn ShipCacheBmcTrait>,
    pub market_bmc: Arc<dyn MarketBmcTrait>,
    pub trade_bmc: Arc<dyn TradeBmcTrait>,
    pub waypoint_bmc: Arc<dyn WaypointBmcTrait>,
    pub runtime: TaskRuntime,
    job_started_at: std::time::Instant,
    total_profit: Arc<Mutex<i64>>,
}

impl<B: FrmBmcTrait> Clone for GreedyTraderController<B> {
    fn clone(&self) -> Self {
        Self {
            frm: self.frm.clone(),
            ship_ops: self.ship_ops.clone(),
            ship_cache: self.ship_cache.clone(),
            market_bmc: self.market_bmc.clone(),
            trade_bmc: self.trade_bmc.clone(),
            waypoint_bmc: self.waypoint_bmc.clone(),
            runtime: self.runtime,
            job_started_at: self.job_started_at,
            total_profit: self.total_profit.clone(),
        }
    }
}

impl<B: FrmBmcTrait> std::fmt::Debug for GreedyTraderController<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GreedyTraderController").finish_non_exhaustive()
    }
}

impl<B: FrmBmcTrait + 'static> GreedyTraderController<B> {
    pub fn new(
        frm: Arc<FleetResourceManager<B>>,
        ship_ops: Arc<dyn ShipOps>,
        ship_cache: Arc<dyn ShipCacheBmcTrait>,
        market_bmc: Arc<dyn MarketBmcTrait>,
        trade_bmc: Arc<dyn TradeBmcTrait>,
        waypoint_bmc: Arc<dyn WaypointBmcTrait>,
        runtime: TaskRuntime,
    ) -> Self {
        Self {
            frm,
            ship_ops,
            ship_cache,
            market_bmc,
            trade_bmc,
            waypoint_bmc,
            runtime,
            job_started_at: std::time::Instant::now(),
            total_profit: Arc::new(Mutex::new(0)),
        }
    }

    fn controller_id(&self) -> ControllerId {
        ControllerId(TRADING_CONTROLLER.to_string())
    }

    pub async fn run(&self, system: SystemSymbol, max_haulers: usize) -> Result<()> {
        let result = self.run_inner(system, max_haulers).await;
        let _ = self.frm.release_fleet(&self.controller_id(), false).await;
        result
    }

    /// `getGreedyTrades`: joins current market snapshots in `system` into
    /// candidate routes, ordered by `netProfit / distance` descending.
    async fn candidates(&self, system: &SystemSymbol, ship_fuel_cap: i64) -> Result<Vec<TradeCandidate>> {
        let waypoints = self.waypoint_bmc.get_waypoints_in_system(system).await?;
        let max_distance = 1.5 * (ship_fuel_cap - 1) as f64;

        let mut snapshots = Vec::new();
        for wp in waypoints.iter().filter(|w| w.has_marketplace()) {
            if let Some(snapshot) = self.market_bmc.get_current(&wp.symbol).await? {
                snapshots.push((wp.clone(), snapshot));
            }
        }

        let mut rows = Vec::new();
        for (src_wp, src_snapshot) in &snapshots {
            for src_good in &src_snapshot.trade_goods {
                if EXCLUDED_GOODS.contains(&src_good.symbol) {
                    continue;
                }
                if src_good.trade_volume < MIN_VOLUME {
                    continue;
                }
                if !matches!(
                    src_good.supply,
                    SupplyLevel::Abundant | SupplyLevel::High | SupplyLevel::Moderate | SupplyLevel::Limited
                ) {
                    continue;
                }

                for (sink_wp, sink_snapshot) in &snapshots {
                    if sink_wp.symbol == src_wp.symbol {
                        continue;
                    }
                    let Some(sink_good) = sink_snapshot.trade_good(src_good.symbol) else { continue };
                    if sink_good.trade_volume < MIN_VOLUME {
                        continue;
                    }
                    if !matches!(sink_good.supply, SupplyLevel::Scarce | SupplyLevel::Limited | SupplyLevel::Moderate) {
                        continue;
                    }

                    let dist = st_domain::distance((src_wp.x, src_wp.y), (sink_wp.x, sink_wp.y));
                    if dist >= max_distance {
                        continue;
                    }

                    let net_profit = (sink_good.sell_price - src_good.purchase_price) * src_good.trade_volume.min(sink_good.trade_volume);
                    if net_profit < MIN_NET_PROFIT {
                        continue;
                    }

                    let traders = max_traders(src_good.supply, sink_good.supply, src_good.purchase_price, sink_good.sell_price);
                    if traders < 1 {
                        continue;
                    }

                    rows.push(TradeCandidate {
                        trade_symbol: src_good.symbol,
                        source: src_wp.symbol.clone(),
                        sink: sink_wp.symbol.clone(),
                        trade_volume: src_good.trade_volume.min(sink_good.trade_volume),
                        distance: dist,
                        purchase_price: src_good.purchase_price,
                        sell_price: sink_good.sell_price,
                        net_profit,
                        max_traders: traders,
                    });
                }
            }
        }

        rows.sort_by(|a, b| b.profit_over_distance().partial_cmp(&a.profit_over_distance()).unwrap());
        Ok(rows)
    }

    async fn run_inner(&self, system: SystemSymbol, max_haulers: usize) -> Result<()> {
        let mut ledger = OngoingLedger::default();
        let mut fleet: Vec<FleetEntry> = Vec::new();

        loop {
            let (still_running, finished) = self.drain_finished(fleet).await;
            fleet = still_running;
            for entry in &finished {
                ledger.remove(&entry.key, entry.repeats);
                let _ = self.frm.release(&entry.ship_symbol, false).await;
            }

            let ship_fuel_cap = self.representative_fuel_capacity(&system).await?;
            let candidates = self.candidates(&system, ship_fuel_cap).await?;

            let mut any_assigned = false;
            for candidate in &candidates {
                if fleet.len() >= max_haulers {
                    break;
                }
                let key = (candidate.trade_symbol, candidate.source.clone(), candidate.sink.clone());
                let ongoing = ledger.get(&key);
                if ongoing >= candidate.max_traders {
                    continue;
                }

                let haulers = self.candidate_haulers(&system, &candidate.source).await?;
                let haulers: Vec<ShipSymbol> = haulers.into_iter().filter(|s| !fleet.iter().any(|e| &e.ship_symbol == s)).collect();
                let Some(hauler) = haulers.into_iter().next() else { continue };

                if !self.frm.request(&hauler, &self.controller_id(), BASE_PRIO_TRADERS).await? {
                    continue;
                }

                let cargo = self.ship_ops.cargo_of(&hauler).await?;
                let repeats = bundle_repeats(cargo.capacity, candidate.trade_volume, candidate.max_traders, ongoing);
                let task_spec = TradeTask {
                    trade_symbol: candidate.trade_symbol,
                    source: candidate.source.clone(),
                    sink: candidate.sink.clone(),
                    units_per_repeat: candidate.trade_volume.min(cargo.capacity),
                    repeats,
                };

                ledger.add(key.clone(), repeats);
                any_assigned = true;

                let controller = self.clone();
                let ship_for_task = hauler.clone();
                let task = self
                    .runtime
                    .spawn(async move { controller.execute_trade(ship_for_task, task_spec).await });
                fleet.push(FleetEntry { ship_symbol: hauler, key, repeats, task });

                let jitter = rand::thread_rng().gen_range(ASSIGNMENT_JITTER_MIN_MS..=ASSIGNMENT_JITTER_MAX_MS);
                self.runtime.sleep(Duration::from_millis(jitter)).await;
            }

            if !finished.is_empty() {
                let hours = self.job_started_at.elapsed().as_secs_f64() / 3600.0;
                let total = *self.total_profit.lock().unwrap();
                let per_hour = if hours > 0.0 { total as f64 / hours } else { 0.0 };
                info!("greedy trader: {total} cr total, {per_hour:.0} cr/hour");
            }

            if fleet.len() >= max_haulers || !any_assigned {
                self.runtime.sleep(REFRESH_PERIOD).await;
            }
        }
    }

    async fn drain_finished(&self, fleet: Vec<FleetEntry>) -> (Vec<FleetEntry>, Vec<FinishedEntry>) {
        let mut still_running = Vec::new();
        let mut finished = Vec::new();
        for entry in fleet {
            if entry.task.done() {
                let FleetEntry { ship_symbol, key, repeats, task } = entry;
                if let Err(e) = task.join().await {
                    warn!("executeTrade task for {ship_symbol} panicked: {e}");
                }
                finished.push(FinishedEntry { ship_symbol, key, repeats });
            } else {
                still_running.push(entry);
            }
        }
        (still_running, finished)
    }

    async fn representative_fuel_capacity(&self, system: &SystemSymbol) -> Result<i64> {
        let ships = self.ship_cache.get_ships().await?;
        Ok(ships
            .into_iter()
            .filter(|s| s.is_hauler() && &s.nav.system_symbol == system)
            .map(|s| s.fuel.capacity)
            .max()
            .unwrap_or(600))
    }

    async fn candidate_haulers(&self, system: &SystemSymbol, source: &WaypointSymbol) -> Result<Vec<ShipSymbol>> {
        let ships = self.ship_cache.get_ships().await?;
        let source_wp = self.waypoint_bmc.get_waypoint(source).await?;
        let mut with_distance = Vec::new();
        for ship in ships {
            if !ship.is_hauler() || &ship.nav.system_symbol != system {
                continue;
            }
            let d = match &source_wp {
                Some(src) => match self.waypoint_bmc.get_waypoint(&ship.nav.waypoint_symbol).await? {
                    Some(wp) => st_domain::distance((wp.x, wp.y), (src.x, src.y)),
                    None => f64::MAX,
                },
                None => f64::MAX,
            };
            with_distance.push((ship.symbol, d));
        }
        with_distance.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap());
        Ok(with_distance.into_iter().map(|(s, _)| s).collect())
    }

    /// `executeTrade`: blocks the ship, clears any leftover hold, buys at
    /// `source`, sells at `sink`, logs the trade, unblocks. Aborts cleanly if
    /// the freshest snapshot shows the trade no longer clears the minimum
    /// profit bar.
    async fn execute_trade(&self, ship_symbol: ShipSymbol, task: TradeTask) -> Result<bool> {
        self.frm.set_blocked(&ship_symbol, true).await?;
        let result = self.execute_trade_inner(&ship_symbol, &task).await;
        self.frm.set_blocked(&ship_symbol, false).await?;
        result
    }

    async fn execute_trade_inner(&self, ship_symbol: &ShipSymbol, task: &TradeTask) -> Result<bool> {
        let cargo = self.ship_ops.cargo_of(ship_symbol).await?;
        if cargo.units > 0 {
            self.clear_cargo(ship_symbol).await?;
        }

        self.ship_ops.navigate(ship_symbol, &task.source, FlightMode::Cruise).await?.into_result()?;

        let units = task.units_per_repeat * task.repeats;
        let projected_profit = match self.market_bmc.get_current(&task.source).await? {
            Some(src_snapshot) => match self.market_bmc.get_current(&task.sink).await? {
                Some(sink_snapshot) => match (src_snapshot.trade_good(task.trade_symbol), sink_snapshot.trade_good(task.trade_symbol)) {
                    (Some(src), Some(sink)) => (sink.sell_price - src.purchase_price) * units,
                    _ => -1,
                },
                None => -1,
            },
            None => -1,
        };
        if projected_profit < MIN_ABORT_PROFIT {
            info!("{ship_symbol} detected a losing trade order for {}, aborting", task.trade_symbol);
            return Ok(false);
        }

        self.ship_ops.dock(ship_symbol).await?.into_result()?;
        let (_, buy_price) = match self.ship_ops.buy(ship_symbol, task.trade_symbol, units as u32).await? {
            st_domain::Outcome::Success(v) => v,
            other => {
                warn!("{ship_symbol} couldn't buy {} at {}: {other:?}", task.trade_symbol, task.source);
                return Ok(false);
            }
        };
        self.trade_bmc
            .insert_transaction(Transaction {
                ship_symbol: ship_symbol.clone(),
                waypoint_symbol: task.source.clone(),
                trade_symbol: task.trade_symbol,
                transaction_type: TransactionType::Purchase,
                units,
                price_per_unit: if units > 0 { buy_price / units } else { 0 },
                total_price: buy_price,
                timestamp: Utc::now(),
            })
            .await?;

        self.ship_ops.navigate(ship_symbol, &task.sink, FlightMode::Cruise).await?.into_result()?;
        self.ship_ops.dock(ship_symbol).await?.into_result()?;
        let (_, sell_price) = match self.ship_ops.sell(ship_symbol, task.trade_symbol, units as u32).await? {
            st_domain::Outcome::Success(v) => v,
            other => {
                warn!("{ship_symbol} couldn't sell {} at {}: {other:?}", task.trade_symbol, task.sink);
                return Ok(false);
            }
        };
        self.trade_bmc
            .insert_transaction(Transaction {
                ship_symbol: ship_symbol.clone(),
                waypoint_symbol: task.sink.clone(),
                trade_symbol: task.trade_symbol,
                transaction_type: TransactionType::Sell,
                units,
                price_per_unit: if units > 0 { sell_price / units } else { 0 },
                total_price: sell_price,
                timestamp: Utc::now(),
            })
            .await?;

        let net_profit = sell_price - buy_price;
        *self.total_profit.lock().unwrap() += net_profit;
        self.trade_bmc
            .insert_trade(TradeRecord {
                ship_symbol: ship_symbol.clone(),
                trade_symbol: task.trade_symbol,
                source: task.source.clone(),
                sink: task.sink.clone(),
                units,
                net_profit,
                completed_at: Utc::now(),
            })
            .await?;

        info!("{ship_symbol} finished trade {} {}->{}: {net_profit} cr", task.trade_symbol, task.source, task.sink);
        Ok(true)
    }

    async fn clear_cargo(&self, ship_symbol: &ShipSymbol) -> Result<()> {
        let cargo = self.ship_ops.cargo_of(ship_symbol).await?;
        self.ship_ops.dock(ship_symbol).await?.into_result()?;
        for item in cargo.inventory {
            let Ok(symbol) = item.symbol.parse::<TradeGoodSymbol>() else { continue };
            if let Err(e) = self.ship_ops.sell(ship_symbol, symbol, item.units as u32).await?.into_result() {
                warn!("{ship_symbol} could not clear leftover {symbol}: {e}");
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bundling_caps_repeats_at_both_cargo_and_route_headroom() {
        // cargoCap=60, tradeVolume=20, maxTraders=4, ongoing=1 -> min(3, 3) = 3
        assert_eq!(bundle_repeats(60, 20, 4, 1), 3);
    }

    #[test]
    fn bundling_never_drops_below_one_repeat() {
        assert_eq!(bundle_repeats(10, 20, 1, 0), 1);
    }

    #[test]
    fn max_traders_uses_the_49_point_divisor_for_abundant_to_scarce_routes() {
        // ROI = 2.0 -> ((2.0-1)*100)/49 = 2.04 -> ceil = 3
        let n = max_traders(SupplyLevel::Abundant, SupplyLevel::Scarce, 10, 20);
        assert_eq!(n, 3);
    }

    #[test]
    fn max_traders_falls_back_to_one_outside_the_special_supply_pairs() {
        let n = max_traders(SupplyLevel::High, SupplyLevel::Moderate, 10, 20);
        // sink is MODERATE, so this uses the 51 divisor, not the fallback of 1
        assert!(n >= 1);
        let n2 = max_traders(SupplyLevel::High, SupplyLevel::High, 10, 11);
        assert_eq!(n2, 1);
    }
}
