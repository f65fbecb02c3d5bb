use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use st_core::clock::SystemClock;
use st_core::configuration::AgentConfiguration;
use st_core::controllers::{ExtractHaulController, GreedyTraderController, MarketIntelController, MarketIntelMode};
use st_core::fleet::FleetResourceManager;
use st_core::pagination::fetch_all_pages;
use st_core::reqwest_helpers::create_client;
use st_core::ship_ops::RemoteShipOps;
use st_core::st_client::{StClient, StClientTrait};
use st_domain::{
    ControllerId, PaginationInput, RegistrationRequest, Ship, SystemSymbol, Waypoint, EXTRACTION_CONTROLLER, MARKET_INTEL_CONTROLLER, TRADING_CONTROLLER,
};
use st_store::db::{get_pg_connection_pool, prepare_schema};
use st_store::{Bmc, DbBmc, DbFrmBmc, ShipCacheBmcTrait, WaypointBmcTrait};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer().with_span_events(fmt::format::FmtSpan::CLOSE))
        .with(EnvFilter::from_default_env())
        .init();

    let cfg = AgentConfiguration::parse();

    let unauthenticated = StClient::try_with_base_url(create_client(None), &cfg.base_url)?;
    let status = unauthenticated.get_status().await.context("probing server status")?;
    info!("server status: {}, reset {}", status.status, status.reset_date);

    let pool = get_pg_connection_pool(cfg.pg_connection_string()).await?;
    prepare_schema(&pool, &status.reset_date, &cfg.pg_connection_string()).await?;
    let bmc = Arc::new(DbBmc::new(pool));

    let client = Arc::new(authenticate(&cfg, unauthenticated).await?);
    let agent = client.get_agent().await?.data;
    info!("agent {} ({} credits)", agent.symbol, agent.credits);

    let system = agent.headquarters.system_symbol();
    let clock = Arc::new(SystemClock);
    let ship_ops = Arc::new(RemoteShipOps::new(client.clone(), bmc.ship_cache_bmc(), clock.clone()));
    let frm_bmc = Arc::new(DbFrmBmc { pool: bmc.pool.clone() });
    let frm = Arc::new(FleetResourceManager::new(frm_bmc, ship_ops.clone(), clock));

    seed_waypoints(&client, &bmc.waypoint_bmc(), &system).await?;
    seed_ships(&client, &bmc.ship_cache_bmc()).await?;

    let waypoints = bmc.waypoint_bmc().get_waypoints_in_system(&system).await?;
    let extraction_sites: Vec<Waypoint> = waypoints.iter().filter(|w| w.is_extractable() || w.is_siphonable()).cloned().collect();

    let mut tasks = tokio::task::JoinSet::new();

    if cfg.controller_market_intel_enabled {
        let controller = MarketIntelController {
            frm: frm.clone(),
            ship_ops: ship_ops.clone(),
            ship_cache: bmc.ship_cache_bmc(),
            client: client.clone(),
            market_bmc: bmc.market_bmc(),
            waypoint_bmc: bmc.waypoint_bmc(),
            runtime: st_core::runtime::TaskRuntime,
        };
        let system = system.clone();
        let refresh_freq = cfg.market_refresh_freq_seconds;
        tasks.spawn(async move { controller.run(system, refresh_freq, MarketIntelMode::NoExchanges).await });
    }

    if cfg.controller_extract_enabled {
        let controller = Arc::new(ExtractHaulController::new(
            frm.clone(),
            ship_ops.clone(),
            bmc.ship_cache_bmc(),
            bmc.trade_bmc(),
            bmc.waypoint_bmc(),
            st_core::runtime::TaskRuntime,
        ));
        for site in &extraction_sites {
            let controller = controller.clone();
            let system = system.clone();
            let site = site.clone();
            tasks.spawn(async move { controller.run_extractor(system, site).await });
        }
        if !extraction_sites.is_empty() {
            let controller = controller.clone();
            let system = system.clone();
            let sites = extraction_sites.clone();
            tasks.spawn(async move { controller.run_hauler(system, sites).await });
        }
    }

    if cfg.controller_trade_enabled {
        let controller = GreedyTraderController::new(
            frm.clone(),
            ship_ops.clone(),
            bmc.ship_cache_bmc(),
            bmc.market_bmc(),
            bmc.trade_bmc(),
            bmc.waypoint_bmc(),
            st_core::runtime::TaskRuntime,
        );
        let system = system.clone();
        let max_traders = cfg.max_traders;
        tasks.spawn(async move { controller.run(system, max_traders).await });
    }

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("ctrl-c received, shutting fleet down");
        }
        result = join_all(&mut tasks) => {
            warn!("a controller exited on its own: {result:?}");
        }
    }

    tasks.shutdown().await;
    for controller in [EXTRACTION_CONTROLLER, MARKET_INTEL_CONTROLLER, TRADING_CONTROLLER] {
        let _ = frm.release_fleet(&ControllerId(controller.to_string()), false).await;
    }

    Ok(())
}

async fn join_all(tasks: &mut tokio::task::JoinSet<Result<()>>) -> Result<()> {
    while let Some(result) = tasks.join_next().await {
        match result {
            Ok(Ok(())) => continue,
            Ok(Err(e)) => return Err(e),
            Err(e) => return Err(anyhow::anyhow!("controller task panicked: {e}")),
        }
    }
    Ok(())
}

/// Loads an existing agent token, or registers a fresh agent against
/// `account_token` and persists the result, matching the source's
/// register-or-reuse dance around `db::load_registration`.
async fn authenticate(cfg: &AgentConfiguration, unauthenticated: StClient) -> Result<StClient> {
    if let Some(token) = cfg.load_agent_token()? {
        info!("reusing saved agent token");
        return StClient::try_with_base_url(create_client(Some(token)), &cfg.base_url);
    }

    info!("no saved agent token, registering a new agent");
    let symbol = cfg
        .spacetraders_agent_symbol
        .clone()
        .context("SPACETRADERS_AGENT_SYMBOL is required to register a new agent")?;

    let registration = unauthenticated
        .register(RegistrationRequest {
            faction: cfg.spacetraders_agent_faction.clone(),
            symbol,
            email: cfg.spacetraders_registration_email.clone(),
        })
        .await
        .context("registering agent")?
        .data;

    cfg.save_agent_token(&registration.token)?;
    StClient::try_with_base_url(create_client(Some(registration.token)), &cfg.base_url)
}

async fn seed_waypoints(client: &StClient, waypoint_bmc: &Arc<dyn WaypointBmcTrait>, system: &SystemSymbol) -> Result<()> {
    let waypoints = fetch_all_pages(|page: PaginationInput| async move { client.list_waypoints_of_system_page(system, page).await }).await?;
    info!("seeding {} waypoints for {system}", waypoints.len());
    for wp in waypoints {
        waypoint_bmc.upsert_waypoint(wp).await?;
    }
    Ok(())
}

async fn seed_ships(client: &StClient, ship_cache: &Arc<dyn ShipCacheBmcTrait>) -> Result<()> {
    let ships: Vec<Ship> = fetch_all_pages(|page: PaginationInput| async move { client.list_ships(page).await }).await?;
    info!("seeding {} ships", ships.len());
    for ship in ships {
        ship_cache.upsert_ship(ship).await?;
    }
    Ok(())
}
