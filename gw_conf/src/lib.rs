//! Wire types for the configuration files the packet forwarder reads.
//!
//! The forwarder expects `global_conf.json` (the frequency plan, written
//! verbatim) and `local_conf.json` next to its executable. Field names here
//! are the forwarder's own and must not change.

use serde::{Deserialize, Serialize};

/// Frequency-plan file name, read by the forwarder before `local_conf.json`.
pub const GLOBAL_CONF_NAME: &str = "global_conf.json";
/// Per-gateway overrides file name.
pub const LOCAL_CONF_NAME: &str = "local_conf.json";

#[derive(Default, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocalConf {
    #[serde(rename = "gateway_conf")]
    pub gateway_conf: GatewayConf,
}

#[derive(Default, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GatewayConf {
    #[serde(rename = "gateway_ID")]
    pub gateway_id: String,
    #[serde(rename = "contact_email")]
    pub contact_email: String,
    #[serde(rename = "description")]
    pub description: String,
    #[serde(rename = "gps")]
    pub gps: bool,
    #[serde(rename = "fake_gps")]
    pub fake_gps: bool,
    #[serde(rename = "gps_tty_path", default, skip_serializing_if = "Option::is_none")]
    pub gps_tty_path: Option<String>,
    #[serde(rename = "ref_latitude", default, skip_serializing_if = "Option::is_none")]
    pub ref_latitude: Option<f64>,
    #[serde(rename = "ref_longitude", default, skip_serializing_if = "Option::is_none")]
    pub ref_longitude: Option<f64>,
    #[serde(rename = "ref_altitude", default, skip_serializing_if = "Option::is_none")]
    pub ref_altitude: Option<f64>,
    #[serde(rename = "servers")]
    pub servers: Vec<ServerConf>,
}

/// Upstream protocol spoken by one server entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServerType {
    Ttn,
    Semtech,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConf {
    #[serde(rename = "serv_type")]
    pub serv_type: ServerType,
    #[serde(rename = "server_address")]
    pub server_address: String,
    #[serde(rename = "server_fallbacks", default, skip_serializing_if = "Option::is_none")]
    pub server_fallbacks: Option<Vec<String>>,
    #[serde(rename = "serv_port_up", default, skip_serializing_if = "Option::is_none")]
    pub serv_port_up: Option<u16>,
    #[serde(rename = "serv_port_down", default, skip_serializing_if = "Option::is_none")]
    pub serv_port_down: Option<u16>,
    #[serde(rename = "serv_gw_id", default, skip_serializing_if = "Option::is_none")]
    pub serv_gw_id: Option<String>,
    #[serde(rename = "serv_gw_key", default, skip_serializing_if = "Option::is_none")]
    pub serv_gw_key: Option<String>,
    #[serde(rename = "serv_enabled")]
    pub serv_enabled: bool,
    #[serde(rename = "serv_down_enabled", default, skip_serializing_if = "Option::is_none")]
    pub serv_down_enabled: Option<bool>,
}
