use std::time::Duration;

use chrono::TimeDelta;
use clap::Parser;
use deconz_ingest::connection::ConnectionConfig;
use deconz_ingest::fill::FillConfig;
use reqwest::Url;

#[derive(Debug, Parser)]
pub struct Args {
    /// REST base address of the gateway, e.g. http://127.0.0.1:8080/api
    #[arg(long, env = "DECONZ_ADDR")]
    pub deconz_addr: Url,

    #[arg(long, env = "DECONZ_API_KEY", hide_env_values = true)]
    pub api_key: String,

    /// Skips websocket discovery through the gateway's /config resource.
    #[arg(long, env = "DECONZ_WEBSOCKET_ADDR")]
    pub websocket_addr: Option<Url>,

    #[arg(long, env = "DATABASE_URL", hide_env_values = true)]
    pub database_url: String,

    #[arg(long, env = "LOG_LEVEL", default_value = "warn")]
    pub log_level: String,

    /// Write the current REST state of every sensor once and exit.
    #[arg(long)]
    pub once: bool,

    #[arg(long, default_value_t = 60)]
    pub directory_refresh_secs: u64,

    #[arg(long, default_value_t = 10)]
    pub reconnect_delay_secs: u64,

    /// Repeat the last known state of sensors that stopped reporting.
    #[arg(long, env = "DEFLUX_FILL")]
    pub fill: bool,

    #[arg(long)]
    pub no_initial_fill: bool,

    #[arg(long, default_value_t = 1800)]
    pub fill_interval_secs: u32,

    #[arg(long, default_value_t = 7200)]
    pub last_seen_timeout_secs: u32,

    #[arg(long, default_value_t = 1000)]
    pub shutdown_timeout_ms: u64,
}

impl Args {
    pub fn directory_refresh_interval(&self) -> Duration {
        Duration::from_secs(self.directory_refresh_secs)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }

    pub fn connection_config(&self) -> ConnectionConfig {
        ConnectionConfig {
            reconnect_delay: Duration::from_secs(self.reconnect_delay_secs),
            ..ConnectionConfig::default()
        }
    }

    pub fn fill_config(&self) -> FillConfig {
        FillConfig {
            enabled: self.fill,
            initial_fill: !self.no_initial_fill,
            fill_interval: TimeDelta::seconds(self.fill_interval_secs.into()),
            last_seen_timeout: TimeDelta::seconds(self.last_seen_timeout_secs.into()),
            ..FillConfig::default()
        }
    }
}
