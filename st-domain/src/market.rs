use crate::ids::WaypointSymbol;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Display, EnumString)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SupplyLevel {
    Scarce = 0,
    Limited = 1,
    Moderate = 2,
    High = 3,
    Abundant = 4,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Display, EnumString)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActivityLevel {
    Restricted = 1,
    Weak = 2,
    Growing = 3,
    Strong = 4,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TradeGoodType {
    Export,
    Import,
    Exchange,
}

/// Trimmed from the source's ~140-variant enum down to the commodities and
/// ship-part symbols the controllers and tests actually reference. `Fuel`
/// must always be present: it drives refuel-stop detection in the planner.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Display, EnumString, EnumIter,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TradeGoodSymbol {
    Fuel,
    IronOre,
    Iron,
    CopperOre,
    Copper,
    AluminumOre,
    Aluminum,
    SilverOre,
    Silver,
    GoldOre,
    Gold,
    PlatinumOre,
    Platinum,
    Ice,
    Water,
    QuartzSand,
    SiliconCrystals,
    AmmoniaIce,
    LiquidHydrogen,
    LiquidNitrogen,
    Hydrocarbon,
    Explosives,
    FabMats,
    Electronics,
    Machinery,
    Polynucleotides,
    Biocomposites,
    Clothing,
    Food,
    Medicine,
    Equipment,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketTradeGood {
    pub symbol: TradeGoodSymbol,
    pub trade_good_type: TradeGoodType,
    pub trade_volume: i64,
    pub supply: SupplyLevel,
    pub activity: Option<ActivityLevel>,
    pub purchase_price: i64,
    pub sell_price: i64,
}

/// A point-in-time snapshot as read from the remote market endpoint.
/// `st-store`'s `MarketBmc` keeps every snapshot it ever sees (append-only
/// history) plus a derived "current" view which is just the latest snapshot
/// per waypoint/good.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketSnapshot {
    pub waypoint_symbol: WaypointSymbol,
    pub observed_at: DateTime<Utc>,
    pub trade_goods: Vec<MarketTradeGood>,
}

impl MarketSnapshot {
    pub fn trade_good(&self, symbol: TradeGoodSymbol) -> Option<&MarketTradeGood> {
        self.trade_goods.iter().find(|g| g.symbol == symbol)
    }

    pub fn trades(&self, symbol: TradeGoodSymbol) -> bool {
        self.trade_good(symbol).is_some()
    }

    pub fn has_only_exchange_and_no_imports_or_exports(&self) -> bool {
        self.trade_goods
            .iter()
            .all(|g| g.trade_good_type == TradeGoodType::Exchange)
    }
}
