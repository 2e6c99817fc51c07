use std::fs;
use std::io;
use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum PinError {
    #[error("I/O = {0}")]
    Io(#[from] io::Error),
    #[error("unexpected pin value {0:?}")]
    Value(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Low,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    In,
    Out,
}

/// Capability over a digital I/O pin. Everything above this trait is
/// hardware free, so the reset sequence and the supervisor can run in
/// tests without a board.
pub trait PinDriver {
    fn configure(&mut self, pin: u32, direction: Direction, initial: Level) -> Result<(), PinError>;
    fn write(&mut self, pin: u32, level: Level) -> Result<(), PinError>;
    fn read(&mut self, pin: u32) -> Result<Level, PinError>;
    fn release(&mut self, pin: u32) -> Result<(), PinError>;
}

/// Pin driver over the kernel's `/sys/class/gpio` interface.
pub struct SysfsGpio {
    root: PathBuf,
}

impl SysfsGpio {
    pub fn new() -> Self {
        Self::with_root("/sys/class/gpio")
    }

    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn pin_dir(&self, pin: u32) -> PathBuf {
        self.root.join(format!("gpio{pin}"))
    }
}

impl Default for SysfsGpio {
    fn default() -> Self {
        Self::new()
    }
}

impl PinDriver for SysfsGpio {
    fn configure(&mut self, pin: u32, direction: Direction, initial: Level) -> Result<(), PinError> {
        // Exporting an already-exported pin fails with EBUSY; only treat
        // the error as real when the pin directory never appeared.
        if let Err(e) = fs::write(self.root.join("export"), pin.to_string()) {
            if !self.pin_dir(pin).exists() {
                return Err(e.into());
            }
        }
        // Writing "low"/"high" sets the direction and the initial level in
        // one step, so the pin never glitches through the wrong state.
        let value = match (direction, initial) {
            (Direction::In, _) => "in",
            (Direction::Out, Level::Low) => "low",
            (Direction::Out, Level::High) => "high",
        };
        fs::write(self.pin_dir(pin).join("direction"), value)?;
        Ok(())
    }

    fn write(&mut self, pin: u32, level: Level) -> Result<(), PinError> {
        let value = match level {
            Level::Low => "0",
            Level::High => "1",
        };
        fs::write(self.pin_dir(pin).join("value"), value)?;
        Ok(())
    }

    fn read(&mut self, pin: u32) -> Result<Level, PinError> {
        let raw = fs::read_to_string(self.pin_dir(pin).join("value"))?;
        match raw.trim() {
            "0" => Ok(Level::Low),
            "1" => Ok(Level::High),
            other => Err(PinError::Value(other.to_string())),
        }
    }

    fn release(&mut self, pin: u32) -> Result<(), PinError> {
        fs::write(self.root.join("unexport"), pin.to_string())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // The kernel creates gpio<n>/ on export; tests pre-create it under a
    // temporary root and check the files the driver touches.
    fn fake_chip(pin: u32) -> (tempfile::TempDir, SysfsGpio) {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join(format!("gpio{pin}"))).unwrap();
        let driver = SysfsGpio::with_root(dir.path());
        (dir, driver)
    }

    #[test]
    fn configure_exports_and_sets_direction() {
        let (dir, mut driver) = fake_chip(22);
        driver.configure(22, Direction::Out, Level::Low).unwrap();
        assert_eq!(fs::read_to_string(dir.path().join("export")).unwrap(), "22");
        assert_eq!(fs::read_to_string(dir.path().join("gpio22/direction")).unwrap(), "low");
    }

    #[test]
    fn write_read_release() {
        let (dir, mut driver) = fake_chip(17);
        driver.write(17, Level::High).unwrap();
        assert_eq!(driver.read(17).unwrap(), Level::High);
        driver.write(17, Level::Low).unwrap();
        assert_eq!(driver.read(17).unwrap(), Level::Low);
        driver.release(17).unwrap();
        assert_eq!(fs::read_to_string(dir.path().join("unexport")).unwrap(), "17");
    }

    #[test]
    fn read_rejects_junk() {
        let (dir, mut driver) = fake_chip(4);
        fs::write(dir.path().join("gpio4/value"), "z").unwrap();
        assert!(matches!(driver.read(4), Err(PinError::Value(_))));
    }
}
