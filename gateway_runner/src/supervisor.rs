use std::io;
use std::path::PathBuf;
use std::process::ExitStatus;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::sleep;
use tracing::{info, warn};

use crate::env::EnvSource;
use crate::gpio::{Direction, Level, PinDriver, PinError};

pub const DEFAULT_RESET_PIN: u32 = 22;
pub const RESTART_COOLDOWN: Duration = Duration::from_secs(15);
const PULSE_STEP: Duration = Duration::from_millis(100);

/// Drives the concentrator reset pin once through low, high, low with
/// 100 ms in between, reads the level back and releases the pin. The
/// release happens even when a step fails halfway through.
pub async fn pulse(driver: &mut impl PinDriver, pin: u32) -> Result<(), PinError> {
    let sequence = run_sequence(driver, pin).await;
    let released = driver.release(pin);
    sequence?;
    released
}

async fn run_sequence(driver: &mut impl PinDriver, pin: u32) -> Result<(), PinError> {
    driver.configure(pin, Direction::Out, Level::Low)?;
    driver.write(pin, Level::Low)?;
    sleep(PULSE_STEP).await;
    driver.write(pin, Level::High)?;
    sleep(PULSE_STEP).await;
    driver.write(pin, Level::Low)?;
    sleep(PULSE_STEP).await;
    // Diagnostic readback only; the level is discarded.
    driver.read(pin)?;
    Ok(())
}

/// Which pin to pulse this cycle. An explicit `GW_RESET_PIN` wins over
/// the default; a value that is not a pin number skips the pulse for
/// the cycle instead of taking the supervisor down.
pub fn reset_pin(env: &EnvSource) -> Option<u32> {
    match env.get("GW_RESET_PIN") {
        None => Some(DEFAULT_RESET_PIN),
        Some(raw) => match raw.trim().parse() {
            Ok(pin) => Some(pin),
            Err(_) => {
                warn!("can't interpret GW_RESET_PIN = {:?} as a pin number, skipping reset", raw);
                None
            }
        },
    }
}

/// Starts the forwarder and waits for it to exit, whichever way.
#[async_trait]
pub trait Launcher {
    async fn launch(&mut self) -> io::Result<ExitStatus>;
}

/// Launches the real forwarder executable with inherited stdio; the
/// supervisor only observes its exit.
pub struct ForwarderProcess {
    executable: PathBuf,
    workdir: PathBuf,
}

impl ForwarderProcess {
    pub fn new(executable: impl Into<PathBuf>, workdir: impl Into<PathBuf>) -> Self {
        Self { executable: executable.into(), workdir: workdir.into() }
    }
}

#[async_trait]
impl Launcher for ForwarderProcess {
    async fn launch(&mut self) -> io::Result<ExitStatus> {
        tokio::process::Command::new(&self.executable).current_dir(&self.workdir).status().await
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Resetting,
    Running,
}

/// Endless reset / run cycle around the forwarder. Every start,
/// including the first, is preceded by a reset pulse; every exit by the
/// cooldown. There is no terminal state.
pub struct Supervisor<D, L> {
    driver: D,
    launcher: L,
    env: EnvSource,
    cooldown: Duration,
}

impl<D: PinDriver, L: Launcher> Supervisor<D, L> {
    pub fn new(driver: D, launcher: L, env: EnvSource) -> Self {
        Self { driver, launcher, env, cooldown: RESTART_COOLDOWN }
    }

    pub async fn run(mut self) -> ! {
        let mut phase = Phase::Resetting;
        loop {
            phase = match phase {
                Phase::Resetting => {
                    self.reset().await;
                    Phase::Running
                }
                Phase::Running => {
                    self.wait_for_exit().await;
                    sleep(self.cooldown).await;
                    Phase::Resetting
                }
            };
        }
    }

    async fn reset(&mut self) {
        let Some(pin) = reset_pin(&self.env) else { return };
        info!("resetting concentrator on pin {}", pin);
        if let Err(e) = pulse(&mut self.driver, pin).await {
            warn!("reset pulse on pin {} failed: {}", pin, e);
        }
    }

    async fn wait_for_exit(&mut self) {
        match self.launcher.launch().await {
            Ok(status) => info!("forwarder exited: {}", status),
            // A failed spawn is handled like an exit; the restart policy
            // absorbs it instead of killing the loop it exists for.
            Err(e) => warn!("forwarder failed to start: {}", e),
        }
    }
}
