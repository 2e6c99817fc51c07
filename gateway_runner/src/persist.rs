use std::path::{Path, PathBuf};

use gw_conf::{GLOBAL_CONF_NAME, LOCAL_CONF_NAME};
use tracing::info;

use crate::resolve::GatewayConfig;
use crate::{GatewayError, GatewayResult};

/// Writes the two files the forwarder reads on startup into its working
/// directory. Nothing is written until resolution has fully succeeded.
pub struct ConfigWriter {
    dir: PathBuf,
}

impl ConfigWriter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub async fn persist(&self, frequency_plan: &[u8], config: &GatewayConfig) -> GatewayResult {
        let global = self.dir.join(GLOBAL_CONF_NAME);
        write(&global, frequency_plan).await?;

        let local = self.dir.join(LOCAL_CONF_NAME);
        let body = serde_json::to_string_pretty(&config.to_local_conf())
            .map_err(|e| GatewayError::Persistence { path: local.display().to_string(), source: e.into() })?;
        write(&local, body.as_bytes()).await?;

        info!("wrote {} and {}", global.display(), local.display());
        Ok(())
    }
}

async fn write(path: &Path, bytes: &[u8]) -> GatewayResult {
    tokio::fs::write(path, bytes)
        .await
        .map_err(|source| GatewayError::Persistence { path: path.display().to_string(), source })
}
