use crate::ids::{ShipSymbol, WaypointSymbol};
use crate::market::TradeGoodSymbol;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionType {
    Purchase,
    Sell,
}

/// A single buy/sell fill, as logged by `purchase_trade_good`/`sell_trade_good`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub ship_symbol: ShipSymbol,
    pub waypoint_symbol: WaypointSymbol,
    pub trade_symbol: TradeGoodSymbol,
    pub transaction_type: TransactionType,
    pub units: i64,
    pub price_per_unit: i64,
    pub total_price: i64,
    pub timestamp: DateTime<Utc>,
}

impl Transaction {
    pub fn net(&self) -> i64 {
        match self.transaction_type {
            TransactionType::Sell => self.total_price,
            TransactionType::Purchase => -self.total_price,
        }
    }
}

/// A completed greedy-trade round trip: buy at `source`, sell at `sink`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TradeRecord {
    pub ship_symbol: ShipSymbol,
    pub trade_symbol: TradeGoodSymbol,
    pub source: WaypointSymbol,
    pub sink: WaypointSymbol,
    pub units: i64,
    pub net_profit: i64,
    pub completed_at: DateTime<Utc>,
}

/// A mining/siphoning extraction event, logged against the whitelist of
/// goods the excavator controller is allowed to sell (the source's
/// `control.EXCAVATOR_GOODS` table).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct YieldRecord {
    pub ship_symbol: ShipSymbol,
    pub waypoint_symbol: WaypointSymbol,
    pub trade_symbol: TradeGoodSymbol,
    pub units: i64,
    pub observed_at: DateTime<Utc>,
}

/// Default whitelist of goods worth keeping when an excavator's cargo is
/// full. Anything not in this list is jettisoned to make room.
pub fn default_excavator_goods_whitelist() -> Vec<TradeGoodSymbol> {
    vec![
        TradeGoodSymbol::IronOre,
        TradeGoodSymbol::CopperOre,
        TradeGoodSymbol::AluminumOre,
        TradeGoodSymbol::SilverOre,
        TradeGoodSymbol::GoldOre,
        TradeGoodSymbol::PlatinumOre,
        TradeGoodSymbol::Ice,
        TradeGoodSymbol::QuartzSand,
        TradeGoodSymbol::SiliconCrystals,
        TradeGoodSymbol::AmmoniaIce,
        TradeGoodSymbol::LiquidHydrogen,
        TradeGoodSymbol::LiquidNitrogen,
        TradeGoodSymbol::Hydrocarbon,
    ]
}
