use std::collections::HashMap;
use tracing::warn;

/// Immutable snapshot of the process environment, so resolution is
/// deterministic and tests can inject arbitrary variable sets.
#[derive(Debug, Clone, Default)]
pub struct EnvSource {
    vars: HashMap<String, String>,
}

impl EnvSource {
    pub fn from_process() -> Self {
        Self { vars: std::env::vars().collect() }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str)
    }

    pub fn get_or(&self, key: &str, default: &str) -> String {
        self.get(key).unwrap_or(default).to_string()
    }

    /// One parsing convention for every boolean variable: `1`, `true`,
    /// `yes` and `on` enable, `0`, `false`, `no` and `off` disable.
    /// Unset or unparseable values fall back to the variable's default.
    pub fn flag(&self, key: &str, default: bool) -> bool {
        match self.get(key) {
            None => default,
            Some(raw) => match raw.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => true,
                "0" | "false" | "no" | "off" => false,
                other => {
                    warn!("{} = {:?} is not a boolean, assuming {}", key, other, default);
                    default
                }
            },
        }
    }

    pub fn float(&self, key: &str, default: f64) -> f64 {
        match self.get(key) {
            None => default,
            Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
                warn!("{} = {:?} is not a number, assuming {}", key, raw, default);
                default
            }),
        }
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for EnvSource {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self { vars: iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect() }
    }
}
