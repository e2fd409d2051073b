//! Service configuration

use anyhow::{Context, Result};
use config::{Config, Environment, File};
use rightsizer_lib::ResourceKind;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Environment variable naming an optional config file
pub const CONFIG_FILE_ENV: &str = "RIGHTSIZER_CONFIG";

/// Which halves of the pipeline this process runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Harvest timer plus an apply worker fed by in-process notifications
    All,
    Harvester,
    /// Apply worker fed by a filesystem watcher on the state directory
    Applier,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::All => "all",
            Role::Harvester => "harvester",
            Role::Applier => "applier",
        }
    }

    pub fn runs_harvester(&self) -> bool {
        matches!(self, Role::All | Role::Harvester)
    }

    pub fn runs_applier(&self) -> bool {
        matches!(self, Role::All | Role::Applier)
    }

    /// Whether the apply worker first applies records written while it was down
    ///
    /// Only a standalone applier can miss writes; in `all` the worker
    /// subscribes before the first harvest.
    pub fn sweeps_on_start(&self) -> bool {
        matches!(self, Role::Applier)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    /// Instance name attached to log events
    pub instance: String,

    /// Port for the HTTP API, health and metrics
    pub api_port: u16,

    /// Provider gateway base URL
    pub provider_endpoint: String,

    pub provider_timeout_secs: u64,

    /// Root directory of the file state store
    pub state_dir: PathBuf,

    pub harvest_interval_secs: u64,

    pub harvest_jitter_secs: u64,

    /// Kinds harvested on every timer tick
    pub kinds: Vec<ResourceKind>,

    pub role: Role,
}

fn default_instance() -> String {
    std::env::var("HOSTNAME").unwrap_or_else(|_| "rightsizer".to_string())
}

impl ServiceConfig {
    /// Load defaults, then the optional config file, then `RIGHTSIZER_*` variables
    pub fn load() -> Result<Self> {
        let file = std::env::var(CONFIG_FILE_ENV).ok().map(PathBuf::from);
        Self::from_sources(file, Self::environment())
    }

    fn environment() -> Environment {
        Environment::with_prefix("RIGHTSIZER")
            .prefix_separator("_")
            .separator("__")
            .list_separator(",")
            .with_list_parse_key("kinds")
            .try_parsing(true)
    }

    fn from_sources(file: Option<PathBuf>, environment: Environment) -> Result<Self> {
        let default_kinds: Vec<String> = ResourceKind::ALL
            .iter()
            .map(|k| k.as_str().to_string())
            .collect();

        let mut builder = Config::builder()
            .set_default("instance", default_instance())?
            .set_default("api_port", 8080)?
            .set_default("provider_endpoint", "http://provider-gateway:9000")?
            .set_default("provider_timeout_secs", 30)?
            .set_default("state_dir", "/var/lib/rightsizer/state")?
            .set_default("harvest_interval_secs", 86_400)?
            .set_default("harvest_jitter_secs", 60)?
            .set_default("kinds", default_kinds)?
            .set_default("role", "all")?;

        if let Some(path) = file {
            builder = builder.add_source(File::from(path));
        }

        let config = builder
            .add_source(environment)
            .build()
            .context("Failed to load configuration")?;

        config
            .try_deserialize()
            .context("Invalid configuration")
    }

    pub fn provider_timeout(&self) -> Duration {
        Duration::from_secs(self.provider_timeout_secs)
    }

    pub fn harvest_interval(&self) -> Duration {
        Duration::from_secs(self.harvest_interval_secs)
    }

    pub fn harvest_jitter(&self) -> Duration {
        Duration::from_secs(self.harvest_jitter_secs)
    }
}
