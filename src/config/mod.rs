//! Layered configuration.
//!
//! Values are read from an optional TOML file and then from `CONDUCTOR_*`
//! environment variables, with `__` separating nested keys:
//!
//! ```text
//! CONDUCTOR_STORE__URL=postgres://conductor@db.internal/conductor
//! CONDUCTOR_COORDINATOR__MAX_ACTIVE_JOBS=20
//! CONDUCTOR_ENGINE__PROGRAM=/opt/replicator/bin/replicator
//! ```

mod redacted;

pub use redacted::Redacted;

use crate::job::{
    adapters::process::CommandSpec, domain::ComputeClass, services::CoordinatorSettings,
    validation::ValidationLimits,
};
use figment::{
    Figment,
    providers::{Env, Format, Toml},
};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Prefix of environment variables read by [`ConductorConfig::load`].
pub const ENV_PREFIX: &str = "CONDUCTOR_";

/// Errors raised while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The sources could not be read or did not match the expected shape.
    #[error("failed to load configuration")]
    Load(#[source] Box<figment::Error>),

    /// A setting required by the requested component is empty.
    #[error("missing required setting `{0}`")]
    MissingSetting(&'static str),

    /// A setting has an unusable value.
    #[error("invalid setting `{key}`: {reason}")]
    InvalidSetting {
        /// Dotted key of the setting.
        key: &'static str,
        /// Why the value was rejected.
        reason: String,
    },
}

/// Root configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ConductorConfig {
    /// Job store connection.
    pub store: StoreConfig,
    /// Credential cipher key.
    pub cipher: CipherConfig,
    /// Coordinator tunables.
    pub coordinator: CoordinatorConfig,
    /// Submission limits.
    pub validation: ValidationLimits,
    /// Replication engine executable.
    pub engine: CommandSpec,
    /// Worker launcher executable.
    pub provisioner: CommandSpec,
    /// Compute release settings.
    pub compute: ComputeConfig,
}

/// `[store]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// `PostgreSQL` connection URL.
    pub url: Redacted<String>,
    /// Maximum pooled connections.
    pub pool_size: u32,
    /// Apply the bundled schema on startup.
    pub auto_migrate: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            url: Redacted::default(),
            pool_size: 4,
            auto_migrate: false,
        }
    }
}

/// `[cipher]` section.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CipherConfig {
    /// Base64-encoded 256-bit key.
    pub key: Redacted<String>,
}

/// `[coordinator]` section.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CoordinatorConfig {
    /// Active job limit.
    pub max_active_jobs: u64,
    /// Record retention in days.
    pub retention_days: u32,
    /// Compute class used without a size estimate.
    pub default_compute_class: ComputeClass,
    /// Provisioning attempts for transient failures.
    pub provision_attempts: u32,
    /// Initial provisioning retry delay in milliseconds.
    pub provision_backoff_ms: u64,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            max_active_jobs: 10,
            retention_days: 30,
            default_compute_class: ComputeClass::default(),
            provision_attempts: 3,
            provision_backoff_ms: 1000,
        }
    }
}

impl CoordinatorConfig {
    /// Converts the section into coordinator settings.
    #[must_use]
    pub fn settings(&self) -> CoordinatorSettings {
        CoordinatorSettings {
            max_active_jobs: self.max_active_jobs,
            retention: chrono::Duration::days(i64::from(self.retention_days)),
            default_compute_class: self.default_compute_class,
            provision_attempts: self.provision_attempts,
            provision_backoff: Duration::from_millis(self.provision_backoff_ms),
        }
    }
}

/// `[compute]` section.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ComputeConfig {
    /// Hook that releases the worker's compute unit.
    pub terminate: CommandSpec,
}

impl ConductorConfig {
    /// Loads configuration from `path`, if given, and the environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Load`] when a source is malformed.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut figment = Figment::new();
        if let Some(file) = path {
            figment = figment.merge(Toml::file(file));
        }
        Self::from_figment(&figment.merge(Env::prefixed(ENV_PREFIX).split("__")))
    }

    /// Extracts configuration from an assembled figment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Load`] when the figment does not match the
    /// expected shape.
    pub fn from_figment(figment: &Figment) -> Result<Self, ConfigError> {
        figment
            .extract()
            .map_err(|err| ConfigError::Load(Box::new(err)))
    }

    /// Returns the store URL, failing when it is unset.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingSetting`] when `store.url` is empty.
    pub fn store_url(&self) -> Result<&str, ConfigError> {
        non_empty(&self.store.url, "store.url")
    }

    /// Returns the cipher key, failing when it is unset.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingSetting`] when `cipher.key` is empty.
    pub fn cipher_key(&self) -> Result<&str, ConfigError> {
        non_empty(&self.cipher.key, "cipher.key")
    }

    /// Returns the engine command, failing when no program is set.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingSetting`] when `engine.program` is
    /// empty.
    pub fn engine_command(&self) -> Result<&CommandSpec, ConfigError> {
        command(&self.engine, "engine.program")
    }

    /// Returns the provisioning launcher, failing when no program is set.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingSetting`] when `provisioner.program` is
    /// empty.
    pub fn provisioner_command(&self) -> Result<&CommandSpec, ConfigError> {
        command(&self.provisioner, "provisioner.program")
    }

    /// Returns the compute release hook, failing when no program is set.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingSetting`] when
    /// `compute.terminate.program` is empty.
    pub fn terminate_command(&self) -> Result<&CommandSpec, ConfigError> {
        command(&self.compute.terminate, "compute.terminate.program")
    }
}

fn non_empty<'a>(value: &'a str, key: &'static str) -> Result<&'a str, ConfigError> {
    if value.trim().is_empty() {
        return Err(ConfigError::MissingSetting(key));
    }
    Ok(value)
}

fn command<'a>(spec: &'a CommandSpec, key: &'static str) -> Result<&'a CommandSpec, ConfigError> {
    non_empty(&spec.program, key)?;
    Ok(spec)
}
