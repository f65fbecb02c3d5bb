use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{AgentSymbol, Cargo, Cooldown, Fuel, FlightMode, Nav, Ship, ShipSymbol, TradeGoodSymbol, WaypointSymbol};

/// Generic `{"data": ...}` envelope the remote API wraps every response in.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Data<T> {
    pub data: T,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Agent {
    pub account_id: Option<String>,
    pub symbol: AgentSymbol,
    pub headquarters: WaypointSymbol,
    pub credits: i64,
    pub starting_faction: String,
    pub ship_count: u32,
}

pub type AgentResponse = Data<Agent>;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationRequest {
    pub faction: String,
    pub symbol: String,
    pub email: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationResponse {
    pub token: String,
    pub agent: Agent,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StStatusResponse {
    pub status: String,
    pub reset_date: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NavResponse {
    pub nav: Nav,
}

pub type DockShipResponse = NavResponse;
pub type OrbitShipResponse = NavResponse;
pub type SetFlightModeResponse = NavResponse;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PatchShipNavRequest {
    pub flight_mode: FlightMode,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NavigateShipRequest {
    pub waypoint_symbol: WaypointSymbol,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NavigateShipResponse {
    pub nav: Nav,
    pub fuel: Fuel,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefuelShipRequest {
    pub units: Option<u32>,
    pub from_cargo: Option<bool>,
}

/// Raw shape of a transaction as the remote API returns it, distinct from
/// [`crate::trade::Transaction`] which carries the fuller domain record we
/// persist (waypoint, transaction type, timestamp).
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteTransaction {
    pub ship_symbol: ShipSymbol,
    pub trade_symbol: Option<TradeGoodSymbol>,
    pub total_price: i64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefuelShipResponse {
    pub fuel: Fuel,
    pub transaction: RemoteTransaction,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Extraction {
    #[serde(rename = "yield")]
    pub extraction_yield: ExtractionYield,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractionYield {
    pub symbol: TradeGoodSymbol,
    pub units: u32,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractResponse {
    pub extraction: Extraction,
    pub cargo: Cargo,
    pub cooldown: Cooldown,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Siphon {
    #[serde(rename = "yield")]
    pub siphon_yield: ExtractionYield,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SiphonResponse {
    pub siphon: Siphon,
    pub cargo: Cargo,
    pub cooldown: Cooldown,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JettisonRequest {
    pub symbol: TradeGoodSymbol,
    pub units: u32,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JettisonResponse {
    pub cargo: Cargo,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TradeGoodRequest {
    pub symbol: TradeGoodSymbol,
    pub units: u32,
}

pub type PurchaseTradeGoodRequest = TradeGoodRequest;
pub type SellTradeGoodRequest = TradeGoodRequest;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseTradeGoodResponse {
    pub cargo: Cargo,
    pub transaction: RemoteTransaction,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SellTradeGoodResponse {
    pub cargo: Cargo,
    pub transaction: RemoteTransaction,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferCargoRequest {
    pub trade_symbol: TradeGoodSymbol,
    pub units: u32,
    pub ship_symbol: ShipSymbol,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferCargoResponse {
    pub cargo: Cargo,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseShipRequest {
    pub ship_type: String,
    pub waypoint_symbol: WaypointSymbol,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseShipResponse {
    pub ship: Ship,
    pub transaction: RemoteTransaction,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Meta {
    pub total: u32,
    pub page: u32,
    pub limit: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PaginatedResponse<T> {
    pub data: Vec<T>,
    pub meta: Meta,
}

#[derive(Debug, Clone, Copy)]
pub struct PaginationInput {
    pub page: u32,
    pub limit: u32,
}

impl Default for PaginationInput {
    fn default() -> Self {
        Self { page: 1, limit: 20 }
    }
}

/// The remote market endpoint returns `imports`/`exports`/`exchange` lists of
/// bare trade-good descriptions plus, only when a ship is present at the
/// waypoint, a combined `tradeGoods` list with supply/activity/price data.
/// The controllers here only ever consult the latter, so that's all this
/// wire type keeps; `ship_ops` stamps `observed_at` when converting this into
/// a `MarketSnapshot` for the store.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketData {
    pub symbol: WaypointSymbol,
    #[serde(default)]
    pub trade_goods: Vec<crate::MarketTradeGood>,
}

pub type GetMarketResponse = Data<MarketData>;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShipyardShip {
    pub ship_type: String,
    pub purchase_price: i64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Shipyard {
    pub symbol: WaypointSymbol,
    pub ship_types: Vec<ShipyardShipType>,
    #[serde(default)]
    pub ships: Vec<ShipyardShip>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShipyardShipType {
    #[serde(rename = "type")]
    pub ship_type: String,
}

pub type GetShipyardResponse = Data<Shipyard>;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateChartResponse {
    pub waypoint: crate::Waypoint,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JumpGate {
    pub symbol: WaypointSymbol,
    pub connections: Vec<WaypointSymbol>,
}

pub type GetJumpGateResponse = Data<JumpGate>;

pub type GetSystemResponse = Data<serde_json::Value>;
