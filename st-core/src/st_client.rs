use std::any::type_name;
use std::fmt::Debug;

use anyhow::{Context, Result};
use async_trait::async_trait;
use mockall::automock;
use reqwest::Url;
use reqwest_middleware::{ClientWithMiddleware, RequestBuilder};
use serde::de::DeserializeOwned;
use st_domain::{
    AgentResponse, CreateChartResponse, Data, DockShipResponse, ExtractResponse, FlightMode, GetJumpGateResponse, GetMarketResponse, GetShipyardResponse,
    GetSystemResponse, JettisonRequest, JettisonResponse, NavigateShipRequest, NavigateShipResponse, OrbitShipResponse, PaginatedResponse, PaginationInput,
    PatchShipNavRequest, PurchaseShipRequest, PurchaseShipResponse, PurchaseTradeGoodRequest, PurchaseTradeGoodResponse, RefuelShipRequest,
    RefuelShipResponse, RegistrationRequest, RegistrationResponse, SellTradeGoodRequest, SellTradeGoodResponse, SetFlightModeResponse, Ship, ShipSymbol,
    SiphonResponse, StStatusResponse, SystemSymbol, TradeGoodSymbol, TransferCargoRequest, TransferCargoResponse, Waypoint, WaypointSymbol,
};

/// Thin REST binding over the remote game API. Every method here is a 1:1
/// mapping onto the endpoint table; retry, rate limiting and auth headers
/// all live in the `ClientWithMiddleware` stack built by `reqwest_helpers`,
/// not here.
#[derive(Debug, Clone)]
pub struct StClient {
    pub client: ClientWithMiddleware,
    pub base_url: Url,
}

impl StClient {
    pub fn try_with_base_url(client: ClientWithMiddleware, base_url: &str) -> Result<Self> {
        let with_trailing_slash = if base_url.ends_with('/') {
            base_url.to_string()
        } else {
            format!("{}/", base_url)
        };
        Ok(StClient {
            client,
            base_url: Url::parse(&with_trailing_slash)?,
        })
    }

    async fn make_api_call<T: DeserializeOwned>(request: RequestBuilder) -> Result<T> {
        let resp = request.send().await.context("failed to send request")?;
        let status = resp.status();
        let body = resp.text().await.context("failed to read response body")?;

        if !status.is_success() {
            anyhow::bail!("API request failed. Status: {status}, Body: {body}");
        }

        serde_json::from_str(&body)
            .map_err(|e| anyhow::anyhow!("error decoding response for type {}: {e:?}. body was: {body}", type_name::<T>()))
    }
}

#[async_trait]
impl StClientTrait for StClient {
    async fn register(&self, registration_request: RegistrationRequest) -> Result<Data<RegistrationResponse>> {
        Self::make_api_call(self.client.post(self.base_url.join("register")?).json(&registration_request)).await
    }

    async fn get_agent(&self) -> Result<AgentResponse> {
        Self::make_api_call(self.client.get(self.base_url.join("my/agent")?)).await
    }

    async fn get_status(&self) -> Result<StStatusResponse> {
        Self::make_api_call(self.client.get(self.base_url.clone())).await
    }

    async fn dock_ship(&self, ship_symbol: &ShipSymbol) -> Result<Data<DockShipResponse>> {
        Self::make_api_call(self.client.post(self.base_url.join(&format!("my/ships/{}/dock", ship_symbol.0))?)).await
    }

    async fn orbit_ship(&self, ship_symbol: &ShipSymbol) -> Result<Data<OrbitShipResponse>> {
        Self::make_api_call(self.client.post(self.base_url.join(&format!("my/ships/{}/orbit", ship_symbol.0))?)).await
    }

    async fn set_flight_mode(&self, ship_symbol: &ShipSymbol, mode: FlightMode) -> Result<Data<SetFlightModeResponse>> {
        Self::make_api_call(
            self.client
                .patch(self.base_url.join(&format!("my/ships/{}/nav", ship_symbol.0))?)
                .json(&PatchShipNavRequest { flight_mode: mode }),
        )
        .await
    }

    async fn navigate(&self, ship_symbol: &ShipSymbol, to: &WaypointSymbol) -> Result<Data<NavigateShipResponse>> {
        Self::make_api_call(
            self.client
                .post(self.base_url.join(&format!("my/ships/{}/navigate", ship_symbol.0))?)
                .json(&NavigateShipRequest { waypoint_symbol: to.clone() }),
        )
        .await
    }

    async fn refuel(&self, ship_symbol: &ShipSymbol, units: Option<u32>, from_cargo: bool) -> Result<Data<RefuelShipResponse>> {
        Self::make_api_call(
            self.client
                .post(self.base_url.join(&format!("my/ships/{}/refuel", ship_symbol.0))?)
                .json(&RefuelShipRequest {
                    units,
                    from_cargo: Some(from_cargo),
                }),
        )
        .await
    }

    async fn extract(&self, ship_symbol: &ShipSymbol) -> Result<Data<ExtractResponse>> {
        Self::make_api_call(self.client.post(self.base_url.join(&format!("my/ships/{}/extract", ship_symbol.0))?)).await
    }

    async fn siphon(&self, ship_symbol: &ShipSymbol) -> Result<Data<SiphonResponse>> {
        Self::make_api_call(self.client.post(self.base_url.join(&format!("my/ships/{}/siphon", ship_symbol.0))?)).await
    }

    async fn jettison(&self, ship_symbol: &ShipSymbol, symbol: TradeGoodSymbol, units: u32) -> Result<Data<JettisonResponse>> {
        Self::make_api_call(
            self.client
                .post(self.base_url.join(&format!("my/ships/{}/jettison", ship_symbol.0))?)
                .json(&JettisonRequest { symbol, units }),
        )
        .await
    }

    async fn purchase_trade_good(&self, ship_symbol: &ShipSymbol, symbol: TradeGoodSymbol, units: u32) -> Result<Data<PurchaseTradeGoodResponse>> {
        Self::make_api_call(
            self.client
                .post(self.base_url.join(&format!("my/ships/{}/purchase", ship_symbol.0))?)
                .json(&PurchaseTradeGoodRequest { symbol, units }),
        )
        .await
    }

    async fn sell_trade_good(&self, ship_symbol: &ShipSymbol, symbol: TradeGoodSymbol, units: u32) -> Result<Data<SellTradeGoodResponse>> {
        Self::make_api_call(
            self.client
                .post(self.base_url.join(&format!("my/ships/{}/sell", ship_symbol.0))?)
                .json(&SellTradeGoodRequest { symbol, units }),
        )
        .await
    }

    async fn transfer_cargo(&self, ship_symbol: &ShipSymbol, trade_symbol: TradeGoodSymbol, units: u32, target_ship: ShipSymbol) -> Result<Data<TransferCargoResponse>> {
        Self::make_api_call(
            self.client
                .post(self.base_url.join(&format!("my/ships/{}/transfer", ship_symbol.0))?)
                .json(&TransferCargoRequest {
                    trade_symbol,
                    units,
                    ship_symbol: target_ship,
                }),
        )
        .await
    }

    async fn purchase_ship(&self, ship_type: String, waypoint_symbol: WaypointSymbol) -> Result<Data<PurchaseShipResponse>> {
        Self::make_api_call(
            self.client
                .post(self.base_url.join("my/ships")?)
                .json(&PurchaseShipRequest { ship_type, waypoint_symbol }),
        )
        .await
    }

    async fn list_ships(&self, pagination: PaginationInput) -> Result<PaginatedResponse<Ship>> {
        Self::make_api_call(
            self.client
                .get(self.base_url.join("my/ships")?)
                .query(&[("page", pagination.page.to_string()), ("limit", pagination.limit.to_string())]),
        )
        .await
    }

    async fn get_ship(&self, ship_symbol: &ShipSymbol) -> Result<Data<Ship>> {
        Self::make_api_call(self.client.get(self.base_url.join(&format!("my/ships/{}", ship_symbol.0))?)).await
    }

    async fn list_waypoints_of_system_page(&self, system_symbol: &SystemSymbol, pagination: PaginationInput) -> Result<PaginatedResponse<Waypoint>> {
        Self::make_api_call(
            self.client
                .get(self.base_url.join(&format!("systems/{}/waypoints", system_symbol.0))?)
                .query(&[("page", pagination.page.to_string()), ("limit", pagination.limit.to_string())]),
        )
        .await
    }

    async fn get_system(&self, system_symbol: &SystemSymbol) -> Result<GetSystemResponse> {
        Self::make_api_call(self.client.get(self.base_url.join(&format!("systems/{}", system_symbol.0))?)).await
    }

    async fn get_marketplace(&self, waypoint_symbol: &WaypointSymbol) -> Result<GetMarketResponse> {
        Self::make_api_call(self.client.get(self.base_url.join(&format!(
            "systems/{}/waypoints/{}/market",
            waypoint_symbol.system_symbol().0,
            waypoint_symbol.0
        ))?))
        .await
    }

    async fn get_jump_gate(&self, waypoint_symbol: &WaypointSymbol) -> Result<GetJumpGateResponse> {
        Self::make_api_call(self.client.get(self.base_url.join(&format!(
            "systems/{}/waypoints/{}/jump-gate",
            waypoint_symbol.system_symbol().0,
            waypoint_symbol.0
        ))?))
        .await
    }

    async fn get_shipyard(&self, waypoint_symbol: &WaypointSymbol) -> Result<GetShipyardResponse> {
        Self::make_api_call(self.client.get(self.base_url.join(&format!(
            "systems/{}/waypoints/{}/shipyard",
            waypoint_symbol.system_symbol().0,
            waypoint_symbol.0
        ))?))
        .await
    }

    async fn create_chart(&self, ship_symbol: &ShipSymbol) -> Result<CreateChartResponse> {
        Self::make_api_call(self.client.post(self.base_url.join(&format!("my/ships/{}/chart", ship_symbol.0))?)).await
    }
}

#[automock]
#[async_trait]
pub trait StClientTrait: Send + Sync + Debug {
    async fn register(&self, registration_request: RegistrationRequest) -> Result<Data<RegistrationResponse>>;
    async fn get_agent(&self) -> Result<AgentResponse>;
    async fn get_status(&self) -> Result<StStatusResponse>;

    async fn dock_ship(&self, ship_symbol: &ShipSymbol) -> Result<Data<DockShipResponse>>;
    async fn orbit_ship(&self, ship_symbol: &ShipSymbol) -> Result<Data<OrbitShipResponse>>;
    async fn set_flight_mode(&self, ship_symbol: &ShipSymbol, mode: FlightMode) -> Result<Data<SetFlightModeResponse>>;
    async fn navigate(&self, ship_symbol: &ShipSymbol, to: &WaypointSymbol) -> Result<Data<NavigateShipResponse>>;
    async fn refuel(&self, ship_symbol: &ShipSymbol, units: Option<u32>, from_cargo: bool) -> Result<Data<RefuelShipResponse>>;
    async fn extract(&self, ship_symbol: &ShipSymbol) -> Result<Data<ExtractResponse>>;
    async fn siphon(&self, ship_symbol: &ShipSymbol) -> Result<Data<SiphonResponse>>;
    async fn jettison(&self, ship_symbol: &ShipSymbol, symbol: TradeGoodSymbol, units: u32) -> Result<Data<JettisonResponse>>;
    async fn purchase_trade_good(&self, ship_symbol: &ShipSymbol, symbol: TradeGoodSymbol, units: u32) -> Result<Data<PurchaseTradeGoodResponse>>;
    async fn sell_trade_good(&self, ship_symbol: &ShipSymbol, symbol: TradeGoodSymbol, units: u32) -> Result<Data<SellTradeGoodResponse>>;
    async fn transfer_cargo(&self, ship_symbol: &ShipSymbol, trade_symbol: TradeGoodSymbol, units: u32, target_ship: ShipSymbol) -> Result<Data<TransferCargoResponse>>;
    async fn purchase_ship(&self, ship_type: String, waypoint_symbol: WaypointSymbol) -> Result<Data<PurchaseShipResponse>>;

    async fn list_ships(&self, pagination: PaginationInput) -> Result<PaginatedResponse<Ship>>;
    async fn get_ship(&self, ship_symbol: &ShipSymbol) -> Result<Data<Ship>>;
    async fn list_waypoints_of_system_page(&self, system_symbol: &SystemSymbol, pagination: PaginationInput) -> Result<PaginatedResponse<Waypoint>>;
    async fn get_system(&self, system_symbol: &SystemSymbol) -> Result<GetSystemResponse>;
    async fn get_marketplace(&self, waypoint_symbol: &WaypointSymbol) -> Result<GetMarketResponse>;
    async fn get_jump_gate(&self, waypoint_symbol: &WaypointSymbol) -> Result<GetJumpGateResponse>;
    async fn get_shipyard(&self, waypoint_symbol: &WaypointSymbol) -> Result<GetShipyardResponse>;
    async fn create_chart(&self, ship_symbol: &ShipSymbol) -> Result<CreateChartResponse>;
}

#[cfg(test)]
mod test {
    use st_domain::{Data, RegistrationResponse};

    #[test]
    fn decodes_a_registration_response() {
        let json = r#"{"data":{"token":"abc.def.ghi","agent":{"accountId":"acc1","symbol":"FLWI","headquarters":"X1-GY87-A1","credits":175000,"startingFaction":"ASTRO","shipCount":1}}}"#;
        let Data { data: registration } = serde_json::from_str::<Data<RegistrationResponse>>(json).unwrap();
        assert!(registration.token.starts_with("abc"));
        assert_eq!(registration.agent.symbol.0, "FLWI");
    }
}
