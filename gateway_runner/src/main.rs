use std::path::PathBuf;

use clap::Parser;
use tracing::error;
use tracing_subscriber::EnvFilter;

/// Configures a LoRa gateway from its environment and the account
/// server, then runs the packet forwarder under a reset-and-restart
/// supervisor.
#[derive(Parser, Debug)]
#[command(name = "gateway_runner")]
struct Args {
    /// Path to the packet forwarder executable.
    #[arg(long, env = "GW_FORWARDER", default_value = "./mp_pkt_fwd")]
    forwarder: PathBuf,
    /// Directory the config files are written to and the forwarder runs in.
    #[arg(long, env = "GW_WORKDIR", default_value = ".")]
    workdir: PathBuf,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    if let Err(e) = gateway_runner::run(args.forwarder, args.workdir).await {
        error!("{}", e);
        std::process::exit(1);
    }
}
