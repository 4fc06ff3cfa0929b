use std::fs;
use std::path::Path;

/// High-level configuration for the console demo
#[derive(Clone, Debug)]
pub struct ConsoleConfig {
    pub carrier: CarrierConfig,
}

/// Carrier client configuration. With no API key the demo falls back to the
/// deterministic sandbox.
#[derive(Clone, Debug)]
pub struct CarrierConfig {
    pub mode: CarrierMode,
    pub api_key: Option<String>,
    pub base_url: Option<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CarrierMode {
    Test,
    Production,
}

impl Default for CarrierConfig {
    fn default() -> Self {
        let mode = match std::env::var("CARRIER_MODE").ok().as_deref() {
            Some("production") | Some("prod") => CarrierMode::Production,
            _ => CarrierMode::Test,
        };
        let key_var = match mode {
            CarrierMode::Test => "CARRIER_TEST_API_KEY",
            CarrierMode::Production => "CARRIER_PROD_API_KEY",
        };
        Self {
            mode,
            api_key: std::env::var(key_var).ok().filter(|s| !s.is_empty()),
            base_url: std::env::var("CARRIER_BASE_URL")
                .ok()
                .filter(|s| !s.is_empty()),
        }
    }
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            carrier: CarrierConfig::default(),
        }
    }
}

impl ConsoleConfig {
    /// Load configuration from a TOML file (path via COURIER_CONFIG or
    /// ./courier.toml), overlaying values onto env-driven defaults.
    pub fn load() -> Self {
        let default = Self::default();
        let path = std::env::var("COURIER_CONFIG").unwrap_or_else(|_| "courier.toml".into());
        let p = Path::new(&path);
        if !p.exists() {
            tracing::info!(target = "courier", path = %path, "No TOML config found; using defaults/env");
            return default;
        }
        match fs::read_to_string(p) {
            Ok(s) => match toml::from_str::<ConsoleToml>(&s) {
                Ok(t) => t.overlay(default),
                Err(e) => {
                    tracing::warn!(target = "courier", error = %e, "Failed to parse TOML; using defaults");
                    default
                }
            },
            Err(e) => {
                tracing::warn!(target = "courier", error = %e, "Failed to read TOML; using defaults");
                default
            }
        }
    }
}

// =========================
// TOML overlay definitions
// =========================

#[derive(Debug, Clone, Default, serde::Deserialize)]
struct ConsoleToml {
    pub carrier: Option<CarrierToml>,
}

impl ConsoleToml {
    fn overlay(self, mut base: ConsoleConfig) -> ConsoleConfig {
        if let Some(c) = self.carrier {
            c.apply(&mut base.carrier);
        }
        base
    }
}

#[derive(Debug, Clone, Default, serde::Deserialize)]
struct CarrierToml {
    pub mode: Option<String>,
    pub api_key: Option<String>,
    pub base_url: Option<String>,
}
impl CarrierToml {
    fn apply(self, c: &mut CarrierConfig) {
        if let Some(x) = self.mode {
            c.mode = match x.as_str() {
                "production" | "prod" => CarrierMode::Production,
                _ => CarrierMode::Test,
            };
        }
        if let Some(x) = self.api_key {
            c.api_key = Some(x);
        }
        if let Some(x) = self.base_url {
            c.base_url = Some(x);
        }
    }
}
