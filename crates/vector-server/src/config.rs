//! Application configuration: a YAML file, overridden by `VECTOR__*`
//! environment variables (double underscore for nesting, e.g.
//! `VECTOR__SERVER__PORT=8080`).

use std::time::Duration;

use serde::Deserialize;
use vector_core::{DeviceIdentity, SessionSettings};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Error in {path} file: {source}")]
    Load {
        path: String,
        #[source]
        source: config::ConfigError,
    },
    #[error("Error in configuration: attribute '{0}' not found")]
    Missing(&'static str),
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub main: MainSection,
    #[serde(default)]
    pub server: ServerSection,
    #[serde(default)]
    pub vector: VectorSection,
    #[serde(default)]
    pub simulator: SimulatorSection,
}

/// `main` section.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct MainSection {
    /// Log at debug level unless `RUST_LOG` says otherwise.
    #[serde(default)]
    pub debug: bool,
}

/// `server` section: where the HTTP listener binds.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerSection {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

const fn default_port() -> u16 {
    5000
}

/// `vector` section: robot identity and connect timeouts (seconds).
#[derive(Debug, Clone, Deserialize)]
pub struct VectorSection {
    #[serde(default)]
    pub ip: String,
    #[serde(default)]
    pub serial: String,
    /// Start-up registration timeout.
    #[serde(default = "default_timeout")]
    pub timeout: u64,
    /// Per-attempt timeout on the leave-charger path.
    #[serde(default = "default_recovery_timeout")]
    pub recovery_timeout: u64,
}

impl Default for VectorSection {
    fn default() -> Self {
        Self {
            ip: String::new(),
            serial: String::new(),
            timeout: default_timeout(),
            recovery_timeout: default_recovery_timeout(),
        }
    }
}

const fn default_timeout() -> u64 {
    10
}

const fn default_recovery_timeout() -> u64 {
    3
}

/// `simulator` section: behaviour of the built-in simulated robot.
#[derive(Debug, Clone, Deserialize)]
pub struct SimulatorSection {
    /// How long each simulated capability call takes.
    #[serde(default = "default_latency_ms")]
    pub latency_ms: u64,
}

impl Default for SimulatorSection {
    fn default() -> Self {
        Self {
            latency_ms: default_latency_ms(),
        }
    }
}

const fn default_latency_ms() -> u64 {
    250
}

impl AppConfig {
    /// Load from a YAML file at `path`, then apply environment overrides.
    ///
    /// # Errors
    /// Returns error if the file is missing or malformed, or a required
    /// attribute is absent.
    pub fn load(path: &str) -> Result<Self, ConfigError> {
        Self::layered(config::File::new(path, config::FileFormat::Yaml), None, path)
    }

    /// Load from YAML text, without environment overrides.
    ///
    /// # Errors
    /// Returns error if the text is malformed or a required attribute is absent.
    pub fn from_yaml(text: &str) -> Result<Self, ConfigError> {
        Self::layered(
            config::File::from_str(text, config::FileFormat::Yaml),
            Some(config::Map::new()),
            "<inline>",
        )
    }

    /// `file` overridden by `VECTOR__*` variables, read from `vars` when
    /// given and from the process environment otherwise.
    ///
    /// Values stay strings until deserialized, so serials keep their
    /// leading zeros.
    fn layered<S>(
        file: S,
        vars: Option<config::Map<String, String>>,
        origin: &str,
    ) -> Result<Self, ConfigError>
    where
        S: config::Source + Send + Sync + 'static,
    {
        config::Config::builder()
            .add_source(file)
            .add_source(
                config::Environment::with_prefix("VECTOR")
                    .separator("__")
                    .source(vars),
            )
            .build()
            .and_then(|c| c.try_deserialize::<Self>())
            .map_err(|source| ConfigError::Load {
                path: origin.to_string(),
                source,
            })?
            .normalize()
            .validate()
    }

    fn normalize(mut self) -> Self {
        self.vector.ip = self.vector.ip.trim().to_string();
        self.vector.serial = self.vector.serial.trim().to_string();
        self.server.host = self.server.host.trim().to_string();
        if self.server.host.is_empty() {
            self.server.host = default_host();
        }
        self
    }

    fn validate(self) -> Result<Self, ConfigError> {
        if self.vector.ip.is_empty() {
            return Err(ConfigError::Missing("vector.ip"));
        }
        if self.vector.serial.is_empty() {
            return Err(ConfigError::Missing("vector.serial"));
        }
        Ok(self)
    }

    /// Session settings derived from the `vector` section.
    #[must_use]
    pub fn session_settings(&self) -> SessionSettings {
        SessionSettings::new(DeviceIdentity::new(&self.vector.ip, &self.vector.serial))
            .with_connect_timeout(Duration::from_secs(self.vector.timeout))
            .with_recovery_timeout(Duration::from_secs(self.vector.recovery_timeout))
    }

    #[must_use]
    pub const fn simulator_latency(&self) -> Duration {
        Duration::from_millis(self.simulator.latency_ms)
    }
}
