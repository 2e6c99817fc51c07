use std::path::PathBuf;

use tracing::info;

pub mod account;
pub mod env;
pub mod eui;
pub mod gpio;
pub mod persist;
pub mod resolve;
pub mod supervisor;

use crate::account::{AccountApi, AccountClient, DEFAULT_ACCOUNT_SERVER};
use crate::env::EnvSource;
use crate::gpio::SysfsGpio;
use crate::persist::ConfigWriter;
use crate::supervisor::{ForwarderProcess, Supervisor};

#[derive(thiserror::Error, Debug)]
pub enum GatewayError {
    #[error("{0} is required but not set, see the gateway registration docs")]
    MissingCredential(&'static str),
    #[error("account server unreachable: {0}")]
    RemoteUnavailable(reqwest::Error),
    #[error("can't parse account server response: {0}")]
    MalformedRemoteConfig(serde_json::Error),
    #[error("can't write {path}: {source}")]
    Persistence { path: String, source: std::io::Error },
    #[error("no hardware address to derive the gateway EUI from")]
    NoHardwareAddress,
    #[error("forwarder executable {0} not found, is it built yet?")]
    ForwarderMissing(String),
}

pub type GatewayResult<T = ()> = Result<T, GatewayError>;

/// Resolves the gateway configuration, writes the forwarder's config
/// files, then supervises the forwarder process forever. Only returns
/// early on a fatal configuration error or an asserted `HALT`.
pub async fn run(executable: PathBuf, workdir: PathBuf) -> GatewayResult {
    let env = EnvSource::from_process();

    if env.get("HALT").is_some() {
        info!("HALT asserted, exiting");
        return Ok(());
    }
    if !executable.exists() {
        return Err(GatewayError::ForwarderMissing(executable.display().to_string()));
    }

    let mac = mac_address::get_mac_address().ok().flatten().ok_or(GatewayError::NoHardwareAddress)?;
    let eui = eui::eui48(mac.bytes());
    info!("gateway EUI: {}", eui);
    info!("hardware GPS: {}", env.flag("GW_GPS", false));

    let client = AccountClient::new(env.get_or("GW_ACCOUNT_SERVER", DEFAULT_ACCOUNT_SERVER))?;
    let resolved = resolve::resolve(&env, eui, &client).await?;

    info!("fetching frequency plan from {}", resolved.frequency_plan_url);
    let plan = client.frequency_plan(&resolved.frequency_plan_url).await?;
    ConfigWriter::new(&workdir).persist(&plan, &resolved.config).await?;

    let forwarder = ForwarderProcess::new(executable, workdir);
    Supervisor::new(SysfsGpio::new(), forwarder, env).run().await
}
