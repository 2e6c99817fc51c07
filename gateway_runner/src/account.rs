use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use serde::Deserialize;

use crate::{GatewayError, GatewayResult};

pub const DEFAULT_ACCOUNT_SERVER: &str = "https://account.thethingsnetwork.org";

/// Both remote documents share this timeout; a fetch that runs past it
/// is a fatal resolution error, never retried.
pub const FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// Gateway document returned by the account server. Every field is
/// optional; whatever is missing falls back to a default during
/// resolution instead of failing.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AccountRecord {
    #[serde(default)]
    pub frequency_plan: Option<String>,
    #[serde(default)]
    pub frequency_plan_url: Option<String>,
    #[serde(default)]
    pub router: Option<RouterSection>,
    #[serde(default)]
    pub attributes: Option<AttributesSection>,
    #[serde(default)]
    pub antenna_location: Option<AntennaLocation>,
    #[serde(default)]
    pub fallback_routers: Vec<RouterSection>,
}

impl AccountRecord {
    pub fn parse(body: &[u8]) -> GatewayResult<Self> {
        serde_json::from_slice(body).map_err(GatewayError::MalformedRemoteConfig)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RouterSection {
    #[serde(default)]
    pub mqtt_address: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AttributesSection {
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub placement: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct AntennaLocation {
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
    #[serde(default)]
    pub altitude: Option<f64>,
}

/// The two remote documents resolution needs. Injected so the resolver
/// can be exercised without a network.
#[async_trait]
pub trait AccountApi {
    async fn gateway_record(&self, gw_id: &str, gw_key: &str) -> GatewayResult<Bytes>;
    async fn frequency_plan(&self, url: &str) -> GatewayResult<Bytes>;
}

pub struct AccountClient {
    http: reqwest::Client,
    server: String,
}

impl AccountClient {
    pub fn new(server: String) -> GatewayResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(FETCH_TIMEOUT)
            .build()
            .map_err(GatewayError::RemoteUnavailable)?;
        Ok(Self { http, server })
    }
}

#[async_trait]
impl AccountApi for AccountClient {
    async fn gateway_record(&self, gw_id: &str, gw_key: &str) -> GatewayResult<Bytes> {
        let url = format!("{}/gateways/{}", self.server.trim_end_matches('/'), gw_id);
        let response = self
            .http
            .get(&url)
            .header("Authorization", format!("Key {gw_key}"))
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(GatewayError::RemoteUnavailable)?;
        response.bytes().await.map_err(GatewayError::RemoteUnavailable)
    }

    async fn frequency_plan(&self, url: &str) -> GatewayResult<Bytes> {
        let response = self
            .http
            .get(url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(GatewayError::RemoteUnavailable)?;
        response.bytes().await.map_err(GatewayError::RemoteUnavailable)
    }
}
