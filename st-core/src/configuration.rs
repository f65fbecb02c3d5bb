use std::path::PathBuf;

use clap::Parser;
use st_store::PgConnectionString;

/// Read-only configuration threaded through the agent, replacing the source
/// project's module-level globals (API tokens, base URL) with a value every
/// component receives explicitly.
#[derive(Parser, Clone, Debug)]
#[command(name = "agent", about = "runs the fleet orchestration core")]
pub struct AgentConfiguration {
    #[arg(long, env("SPACETRADERS_BASE_URL"), default_value = "https://api.spacetraders.io/v2")]
    pub base_url: String,

    #[arg(long, env("SPACETRADERS_ACCOUNT_TOKEN"))]
    pub account_token: Option<String>,

    #[arg(long, env("SPACETRADERS_AGENT_TOKEN_FILE"))]
    pub agent_token_file: Option<PathBuf>,

    #[arg(long, env("SPACETRADERS_AGENT_FACTION"), default_value = "COSMIC")]
    pub spacetraders_agent_faction: String,

    #[arg(long, env("SPACETRADERS_AGENT_SYMBOL"))]
    pub spacetraders_agent_symbol: Option<String>,

    #[arg(long, env("SPACETRADERS_REGISTRATION_EMAIL"))]
    pub spacetraders_registration_email: Option<String>,

    #[arg(long, env("DATABASE_URL"))]
    pub database_url: String,

    #[arg(long, env("FRM_REQUEST_TTL_SECONDS"), default_value_t = st_domain::REQUEST_TTL_SECONDS)]
    pub frm_request_ttl_seconds: i64,

    #[arg(long, env("RETRY_MAX_ATTEMPTS"), default_value_t = 4)]
    pub retry_max_attempts: u32,

    #[arg(long, env("RETRY_BASE_BACKOFF_MS"), default_value_t = 350)]
    pub retry_base_backoff_ms: u64,

    #[arg(long, env("CONTROLLER_MARKET_INTEL_ENABLED"), default_value_t = true)]
    pub controller_market_intel_enabled: bool,

    #[arg(long, env("CONTROLLER_EXTRACT_ENABLED"), default_value_t = true)]
    pub controller_extract_enabled: bool,

    #[arg(long, env("CONTROLLER_TRADE_ENABLED"), default_value_t = true)]
    pub controller_trade_enabled: bool,

    #[arg(long, env("MARKET_REFRESH_FREQ_SECONDS"), default_value_t = 900)]
    pub market_refresh_freq_seconds: i64,

    #[arg(long, env("MAX_TRADERS"), default_value_t = 6)]
    pub max_traders: usize,
}

impl AgentConfiguration {
    pub fn pg_connection_string(&self) -> PgConnectionString {
        PgConnectionString(self.database_url.clone())
    }

    /// Reads the bearer token used once a ship already holds an agent
    /// registration; `account_token` is only needed for the one-off `register`
    /// call, `agent_token_file` is the day-to-day credential.
    pub fn load_agent_token(&self) -> anyhow::Result<Option<String>> {
        match &self.agent_token_file {
            Some(path) => {
                let token = std::fs::read_to_string(path)
                    .map_err(|e| anyhow::anyhow!("failed to read agent token file {path:?}: {e}"))?;
                Ok(Some(token.trim().to_string()))
            }
            None => Ok(None),
        }
    }

    /// Persists a freshly registered agent token so the next run's
    /// [`Self::load_agent_token`] picks it up instead of registering again.
    pub fn save_agent_token(&self, token: &str) -> anyhow::Result<()> {
        match &self.agent_token_file {
            Some(path) => std::fs::write(path, token).map_err(|e| anyhow::anyhow!("failed to write agent token file {path:?}: {e}")),
            None => Ok(()),
        }
    }
}
