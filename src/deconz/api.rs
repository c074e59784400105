use std::time::Duration;

use anyhow::{Context as _, Result, anyhow};
use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::Deserialize;
use tracing::{debug, info};

use crate::deconz::{Sensors, parse_sensors};
use crate::directory::SensorSource;

pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Client for the deCONZ REST API.
#[derive(Debug, Clone)]
pub struct RestApi {
    client: Client,
    addr: Url,
    api_key: String,
}

#[derive(Debug, Deserialize)]
struct GatewayConfig {
    websocketport: u16,
}

impl RestApi {
    /// `addr` is the REST base address, e.g. `http://127.0.0.1:8080/api`.
    pub fn new(addr: Url, api_key: impl Into<String>) -> Result<Self> {
        Self::with_timeout(addr, api_key, DEFAULT_REQUEST_TIMEOUT)
    }

    /// Like [`RestApi::new`], failing each request that takes longer than
    /// `timeout`.
    pub fn with_timeout(addr: Url, api_key: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build HTTP client")?;

        Ok(Self {
            client,
            addr,
            api_key: api_key.into(),
        })
    }

    pub fn addr(&self) -> &Url {
        &self.addr
    }

    /// Fetches all sensors from `{addr}/{key}/sensors`.
    pub async fn sensors(&self) -> Result<Sensors> {
        let body = self.get("sensors").await?;
        let sensors = parse_sensors(&body)?;

        debug!(count = sensors.len(), "fetched sensors");

        Ok(sensors)
    }

    /// Derives the websocket address from the `websocketport` reported by
    /// `{addr}/{key}/config`.
    pub async fn websocket_url(&self) -> Result<Url> {
        let body = self
            .get("config")
            .await
            .context("failed to discover websocket")?;
        let config: GatewayConfig =
            serde_json::from_str(&body).context("failed to decode /config response")?;

        let url = websocket_url_from(&self.addr, config.websocketport)?;
        info!(%url, "discovered websocket address");

        Ok(url)
    }

    async fn get(&self, resource: &str) -> Result<String> {
        let url = self.endpoint(resource)?;

        self.client
            .get(url.clone())
            .send()
            .await
            .and_then(|resp| resp.error_for_status())
            .map_err(reqwest::Error::without_url)
            .with_context(|| format!("failed to get {}", redact(&url, &self.api_key)))?
            .text()
            .await
            .map_err(reqwest::Error::without_url)
            .with_context(|| format!("failed to read /{resource} response"))
    }

    fn endpoint(&self, resource: &str) -> Result<Url> {
        let mut url = self.addr.clone();
        url.path_segments_mut()
            .map_err(|_| anyhow!("REST address cannot be a base: {}", self.addr))?
            .pop_if_empty()
            .push(&self.api_key)
            .push(resource);

        Ok(url)
    }
}

#[async_trait]
impl SensorSource for RestApi {
    async fn fetch_sensors(&self) -> Result<Sensors> {
        self.sensors().await
    }
}

/// Rewrites a REST base address into the gateway's websocket address.
pub fn websocket_url_from(addr: &Url, port: u16) -> Result<Url> {
    let mut url = addr.clone();
    url.set_scheme("ws")
        .map_err(|_| anyhow!("failed to derive websocket scheme from {addr}"))?;
    url.set_port(Some(port))
        .map_err(|_| anyhow!("failed to set websocket port on {addr}"))?;
    url.set_path("/");
    url.set_query(None);
    url.set_fragment(None);

    Ok(url)
}

fn redact(url: &Url, api_key: &str) -> String {
    url.as_str().replace(api_key, "<api-key>")
}
