use gw_conf::{GatewayConf, LocalConf, ServerConf, ServerType};
use tracing::{info, warn};

use crate::account::{AccountApi, AccountRecord};
use crate::env::EnvSource;
use crate::{GatewayError, GatewayResult};

pub const DEFAULT_FREQUENCY_PLAN: &str = "EU_863_870";
pub const DEFAULT_FREQUENCY_PLAN_URL: &str =
    "https://account.thethingsnetwork.org/api/v2/frequency-plans/EU_863_870";
pub const DEFAULT_ROUTER: &str = "router.dev.thethings.network";
const DEFAULT_ROUTER_ADDRESS: &str = "mqtt://router.dev.thethings.network:1883";
pub const DEFAULT_GPS_TTY: &str = "/dev/ttyAMA0";

/// GPS posture of this gateway: a real receiver on a serial port, fixed
/// coordinates reported as if from a receiver, or nothing.
#[derive(Debug, Clone, PartialEq)]
pub enum GpsMode {
    Hardware { tty_path: String },
    Fixed { latitude: f64, longitude: f64, altitude: f64 },
    Disabled,
}

/// Fully resolved gateway configuration. Built once per run and handed
/// to the writer as-is.
#[derive(Debug, Clone, PartialEq)]
pub struct GatewayConfig {
    pub eui: String,
    pub contact_email: String,
    pub description: String,
    pub gps: GpsMode,
    pub servers: Vec<ServerConf>,
}

impl GatewayConfig {
    /// Flattens the config into the forwarder's `local_conf.json` shape.
    pub fn to_local_conf(&self) -> LocalConf {
        let mut conf = GatewayConf {
            gateway_id: self.eui.clone(),
            contact_email: self.contact_email.clone(),
            description: self.description.clone(),
            servers: self.servers.clone(),
            ..Default::default()
        };
        match &self.gps {
            GpsMode::Hardware { tty_path } => {
                conf.gps = true;
                conf.gps_tty_path = Some(tty_path.clone());
            }
            GpsMode::Fixed { latitude, longitude, altitude } => {
                conf.gps = true;
                conf.fake_gps = true;
                conf.ref_latitude = Some(*latitude);
                conf.ref_longitude = Some(*longitude);
                conf.ref_altitude = Some(*altitude);
            }
            GpsMode::Disabled => {}
        }
        LocalConf { gateway_conf: conf }
    }
}

/// Resolution output: the configuration plus where the frequency-plan
/// document has to be fetched from.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolved {
    pub config: GatewayConfig,
    pub frequency_plan: String,
    pub frequency_plan_url: String,
}

/// Merges the environment with the account-server record into one
/// configuration. The credential check comes first, before any network
/// I/O; once the account fetch is enabled, its failure is fatal because
/// router and frequency-plan identity depend on it.
pub async fn resolve(env: &EnvSource, eui: String, api: &impl AccountApi) -> GatewayResult<Resolved> {
    let gw_id = required(env, "GW_ID")?;
    let gw_key = required(env, "GW_KEY")?;
    let ttn_enabled = env.flag("SERVER_TTN", true);

    let mut frequency_plan = DEFAULT_FREQUENCY_PLAN.to_string();
    let mut frequency_plan_url = DEFAULT_FREQUENCY_PLAN_URL.to_string();
    let mut router = DEFAULT_ROUTER.to_string();
    let mut fallback_routers = Vec::new();
    let mut description = String::new();
    let mut placement = "unknown".to_string();
    let mut latitude = env.float("GW_REF_LATITUDE", 0.0);
    let mut longitude = env.float("GW_REF_LONGITUDE", 0.0);
    let mut altitude = env.float("GW_REF_ALTITUDE", 0.0);

    if ttn_enabled {
        let body = api.gateway_record(&gw_id, &gw_key).await?;
        let record = AccountRecord::parse(&body)?;
        if let Some(plan) = record.frequency_plan {
            frequency_plan = plan;
        }
        if let Some(url) = record.frequency_plan_url {
            frequency_plan_url = url;
        }
        if let Some(section) = record.router {
            let address = section.mqtt_address.as_deref().unwrap_or(DEFAULT_ROUTER_ADDRESS);
            router = mqtt_hostname(address);
        }
        if let Some(attributes) = record.attributes {
            if let Some(d) = attributes.description {
                description = d;
            }
            if let Some(p) = attributes.placement {
                placement = p;
            }
        }
        // A present antenna location replaces the env-seeded triple wholesale.
        if let Some(location) = record.antenna_location {
            latitude = location.latitude.unwrap_or(0.0);
            longitude = location.longitude.unwrap_or(0.0);
            altitude = location.altitude.unwrap_or(0.0);
        }
        fallback_routers =
            record.fallback_routers.into_iter().filter_map(|r| r.mqtt_address).collect();

        info!("router: {}", router);
        info!("frequency plan: {} ({})", frequency_plan, frequency_plan_url);
        info!("gateway description: {:?}, placement: {:?}", description, placement);
        for fallback in &fallback_routers {
            info!("fallback router: {}", fallback);
        }
    }

    let gps = if env.flag("GW_GPS", false) {
        // A real receiver wins over coordinates, wherever they came from.
        GpsMode::Hardware { tty_path: env.get_or("GW_GPS_PORT", DEFAULT_GPS_TTY) }
    } else if latitude != 0.0 && longitude != 0.0 {
        GpsMode::Fixed { latitude, longitude, altitude }
    } else {
        GpsMode::Disabled
    };

    let mut servers = Vec::with_capacity(4);
    if ttn_enabled {
        servers.push(ServerConf {
            serv_type: ServerType::Ttn,
            server_address: router,
            server_fallbacks: Some(fallback_routers),
            serv_port_up: None,
            serv_port_down: None,
            serv_gw_id: Some(gw_id),
            serv_gw_key: Some(gw_key),
            serv_enabled: true,
            serv_down_enabled: None,
        });
    }
    for slot in 1..=3 {
        if let Some(server) = slot_server(env, slot) {
            servers.push(server);
        }
    }

    let config = GatewayConfig {
        eui,
        contact_email: env.get_or("GW_CONTACT_EMAIL", ""),
        description,
        gps,
        servers,
    };
    Ok(Resolved { config, frequency_plan, frequency_plan_url })
}

fn required(env: &EnvSource, key: &'static str) -> GatewayResult<String> {
    env.get(key).map(str::to_string).ok_or(GatewayError::MissingCredential(key))
}

/// The forwarder wants a bare hostname; the account server hands out
/// full `mqtt://host:port` addresses. Values that are not URLs pass
/// through untouched.
fn mqtt_hostname(address: &str) -> String {
    match url::Url::parse(address) {
        Ok(parsed) => match parsed.host_str() {
            Some(host) => host.to_string(),
            None => address.to_string(),
        },
        Err(_) => address.to_string(),
    }
}

/// Builds the entry for one of the three extra upstream slots. `None`
/// when the slot is disabled or unusable; included entries are always
/// enabled for uplink.
fn slot_server(env: &EnvSource, slot: u8) -> Option<ServerConf> {
    if !env.flag(&format!("SERVER_{slot}_ENABLED"), false) {
        return None;
    }
    let address = match env.get(&format!("SERVER_{slot}_ADDRESS")) {
        Some(address) => address.to_string(),
        None => {
            warn!("SERVER_{slot}_ENABLED is set without SERVER_{slot}_ADDRESS, skipping slot");
            return None;
        }
    };
    let serv_type = if env.get(&format!("SERVER_{slot}_TYPE")) == Some("ttn") {
        ServerType::Ttn
    } else {
        ServerType::Semtech
    };
    Some(ServerConf {
        serv_type,
        server_address: address,
        server_fallbacks: None,
        serv_port_up: slot_port(env, slot, "PORTUP"),
        serv_port_down: slot_port(env, slot, "PORTDOWN"),
        serv_gw_id: env.get(&format!("SERVER_{slot}_GWID")).map(str::to_string),
        serv_gw_key: env.get(&format!("SERVER_{slot}_GWKEY")).map(str::to_string),
        serv_enabled: true,
        serv_down_enabled: Some(env.flag(&format!("SERVER_{slot}_DOWNLINK"), false)),
    })
}

fn slot_port(env: &EnvSource, slot: u8, side: &str) -> Option<u16> {
    let key = format!("SERVER_{slot}_{side}");
    let raw = env.get(&key)?;
    match raw.trim().parse() {
        Ok(port) => Some(port),
        Err(_) => {
            warn!("{} = {:?} is not a port number, ignoring", key, raw);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bytes::Bytes;

    const EUI: &str = "B827EBFFFE4F612C";

    /// Serves a canned record body.
    struct StaticApi(&'static str);

    #[async_trait]
    impl AccountApi for StaticApi {
        async fn gateway_record(&self, _gw_id: &str, _gw_key: &str) -> GatewayResult<Bytes> {
            Ok(Bytes::from_static(self.0.as_bytes()))
        }
        async fn frequency_plan(&self, _url: &str) -> GatewayResult<Bytes> {
            Ok(Bytes::new())
        }
    }

    /// Fails the test if resolution reaches the network at all.
    struct PanicApi;

    #[async_trait]
    impl AccountApi for PanicApi {
        async fn gateway_record(&self, _gw_id: &str, _gw_key: &str) -> GatewayResult<Bytes> {
            panic!("unexpected account fetch");
        }
        async fn frequency_plan(&self, _url: &str) -> GatewayResult<Bytes> {
            panic!("unexpected plan fetch");
        }
    }

    fn base_env() -> Vec<(&'static str, &'static str)> {
        vec![("GW_ID", "abc"), ("GW_KEY", "xyz")]
    }

    #[tokio::test]
    async fn missing_credentials_fail_before_any_fetch() {
        let env: EnvSource = [("GW_KEY", "xyz")].into_iter().collect();
        let err = resolve(&env, EUI.to_string(), &PanicApi).await.unwrap_err();
        assert!(matches!(err, GatewayError::MissingCredential("GW_ID")));

        let env: EnvSource = [("GW_ID", "abc")].into_iter().collect();
        let err = resolve(&env, EUI.to_string(), &PanicApi).await.unwrap_err();
        assert!(matches!(err, GatewayError::MissingCredential("GW_KEY")));
    }

    #[tokio::test]
    async fn empty_record_resolves_to_documented_defaults() {
        let env: EnvSource = base_env().into_iter().collect();
        let resolved = resolve(&env, EUI.to_string(), &StaticApi("{}")).await.unwrap();
        assert_eq!(resolved.frequency_plan, DEFAULT_FREQUENCY_PLAN);
        assert_eq!(resolved.frequency_plan_url, DEFAULT_FREQUENCY_PLAN_URL);
        assert_eq!(resolved.config.gps, GpsMode::Disabled);
        assert_eq!(resolved.config.servers.len(), 1);
        let ttn = &resolved.config.servers[0];
        assert_eq!(ttn.serv_type, ServerType::Ttn);
        assert_eq!(ttn.server_address, DEFAULT_ROUTER);
        assert_eq!(ttn.serv_gw_id.as_deref(), Some("abc"));
        assert_eq!(ttn.serv_gw_key.as_deref(), Some("xyz"));
        assert!(ttn.serv_enabled);
    }

    #[tokio::test]
    async fn router_address_is_stripped_to_its_host() {
        let env: EnvSource = base_env().into_iter().collect();
        let record = r#"{"router": {"mqtt_address": "mqtt://r.example:1883"}}"#;
        let resolved = resolve(&env, EUI.to_string(), &StaticApi(record)).await.unwrap();
        assert_eq!(resolved.config.servers[0].server_address, "r.example");
    }

    #[tokio::test]
    async fn fallback_routers_keep_order_and_skip_empty_entries() {
        let env: EnvSource = base_env().into_iter().collect();
        let record = r#"{"fallback_routers": [
            {"mqtt_address": "mqtt://a.example:1883"},
            {"note": "no address here"},
            {"mqtt_address": "mqtt://b.example:1883"}
        ]}"#;
        let resolved = resolve(&env, EUI.to_string(), &StaticApi(record)).await.unwrap();
        assert_eq!(
            resolved.config.servers[0].server_fallbacks,
            Some(vec!["mqtt://a.example:1883".to_string(), "mqtt://b.example:1883".to_string()])
        );
    }

    #[tokio::test]
    async fn real_gps_wins_over_coordinates() {
        let mut vars = base_env();
        vars.extend([("GW_GPS", "true"), ("GW_REF_LATITUDE", "52.0"), ("GW_REF_LONGITUDE", "5.0")]);
        let env: EnvSource = vars.into_iter().collect();
        let resolved = resolve(&env, EUI.to_string(), &StaticApi("{}")).await.unwrap();
        assert_eq!(
            resolved.config.gps,
            GpsMode::Hardware { tty_path: DEFAULT_GPS_TTY.to_string() }
        );
    }

    #[tokio::test]
    async fn nonzero_coordinates_become_fixed_gps() {
        let mut vars = base_env();
        vars.extend([
            ("GW_REF_LATITUDE", "52.0"),
            ("GW_REF_LONGITUDE", "5.0"),
            ("GW_REF_ALTITUDE", "12.0"),
        ]);
        let env: EnvSource = vars.into_iter().collect();
        let resolved = resolve(&env, EUI.to_string(), &StaticApi("{}")).await.unwrap();
        assert_eq!(
            resolved.config.gps,
            GpsMode::Fixed { latitude: 52.0, longitude: 5.0, altitude: 12.0 }
        );
    }

    #[tokio::test]
    async fn account_record_end_to_end() {
        let env: EnvSource = base_env().into_iter().collect();
        let record = r#"{
            "router": {"mqtt_address": "mqtt://r.example:1883"},
            "antenna_location": {"latitude": 1, "longitude": 2, "altitude": 3}
        }"#;
        let resolved = resolve(&env, EUI.to_string(), &StaticApi(record)).await.unwrap();
        assert_eq!(resolved.config.servers.len(), 1);
        assert_eq!(resolved.config.servers[0].server_address, "r.example");
        assert_eq!(
            resolved.config.gps,
            GpsMode::Fixed { latitude: 1.0, longitude: 2.0, altitude: 3.0 }
        );
    }

    #[tokio::test]
    async fn slot_order_is_preserved_even_with_gaps() {
        let mut vars = base_env();
        vars.extend([
            ("SERVER_2_ENABLED", "true"),
            ("SERVER_2_ADDRESS", "two.example"),
            ("SERVER_3_ENABLED", "true"),
            ("SERVER_3_ADDRESS", "three.example"),
            ("SERVER_3_TYPE", "ttn"),
        ]);
        let env: EnvSource = vars.into_iter().collect();
        let resolved = resolve(&env, EUI.to_string(), &StaticApi("{}")).await.unwrap();
        let addresses: Vec<_> =
            resolved.config.servers.iter().map(|s| s.server_address.as_str()).collect();
        assert_eq!(addresses, [DEFAULT_ROUTER, "two.example", "three.example"]);
        assert_eq!(resolved.config.servers[1].serv_type, ServerType::Semtech);
        assert_eq!(resolved.config.servers[2].serv_type, ServerType::Ttn);
    }

    #[tokio::test]
    async fn slot_entries_carry_ports_and_credentials() {
        let mut vars = base_env();
        vars.extend([
            ("SERVER_1_ENABLED", "true"),
            ("SERVER_1_ADDRESS", "bridge.example"),
            ("SERVER_1_PORTUP", "1700"),
            ("SERVER_1_PORTDOWN", "1701"),
            ("SERVER_1_GWID", "slot-id"),
            ("SERVER_1_GWKEY", "slot-key"),
            ("SERVER_1_DOWNLINK", "true"),
        ]);
        let env: EnvSource = vars.into_iter().collect();
        let resolved = resolve(&env, EUI.to_string(), &StaticApi("{}")).await.unwrap();
        let slot = &resolved.config.servers[1];
        assert_eq!(slot.serv_port_up, Some(1700));
        assert_eq!(slot.serv_port_down, Some(1701));
        assert_eq!(slot.serv_gw_id.as_deref(), Some("slot-id"));
        assert_eq!(slot.serv_gw_key.as_deref(), Some("slot-key"));
        assert_eq!(slot.serv_down_enabled, Some(true));
    }

    #[tokio::test]
    async fn enabled_slot_without_address_is_skipped() {
        let mut vars = base_env();
        vars.push(("SERVER_1_ENABLED", "true"));
        let env: EnvSource = vars.into_iter().collect();
        let resolved = resolve(&env, EUI.to_string(), &StaticApi("{}")).await.unwrap();
        assert_eq!(resolved.config.servers.len(), 1);
    }

    #[tokio::test]
    async fn disabling_ttn_skips_the_fetch_and_the_entry() {
        let mut vars = base_env();
        vars.push(("SERVER_TTN", "off"));
        let env: EnvSource = vars.into_iter().collect();
        let resolved = resolve(&env, EUI.to_string(), &PanicApi).await.unwrap();
        assert!(resolved.config.servers.is_empty());
        assert_eq!(resolved.frequency_plan_url, DEFAULT_FREQUENCY_PLAN_URL);
    }

    #[tokio::test]
    async fn unparseable_record_is_malformed() {
        let env: EnvSource = base_env().into_iter().collect();
        let err = resolve(&env, EUI.to_string(), &StaticApi("not json")).await.unwrap_err();
        assert!(matches!(err, GatewayError::MalformedRemoteConfig(_)));
    }

    #[test]
    fn hostname_stripping_edge_cases() {
        assert_eq!(mqtt_hostname("mqtt://host:1883"), "host");
        assert_eq!(mqtt_hostname("mqtt://host"), "host");
        // Not a URL at all: passed through untouched.
        assert_eq!(mqtt_hostname("plain-hostname"), "plain-hostname");
    }

    #[test]
    fn fixed_gps_flattens_into_forwarder_fields() {
        let config = GatewayConfig {
            eui: EUI.to_string(),
            contact_email: String::new(),
            description: String::new(),
            gps: GpsMode::Fixed { latitude: 1.0, longitude: 2.0, altitude: 3.0 },
            servers: Vec::new(),
        };
        let conf = config.to_local_conf().gateway_conf;
        assert!(conf.gps);
        assert!(conf.fake_gps);
        assert_eq!(conf.ref_latitude, Some(1.0));
        assert!(conf.gps_tty_path.is_none());

        let config = GatewayConfig { gps: GpsMode::Hardware { tty_path: "/dev/ttyS0".into() }, ..config };
        let conf = config.to_local_conf().gateway_conf;
        assert!(conf.gps);
        assert!(!conf.fake_gps);
        assert_eq!(conf.gps_tty_path.as_deref(), Some("/dev/ttyS0"));
    }
}
