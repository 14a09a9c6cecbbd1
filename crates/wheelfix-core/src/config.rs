//! Run configuration.
//!
//! Loaded from a TOML file in which every field is optional, then patched
//! from the environment (secrets never need to live in the file), then
//! validated. Defaults describe the ppc64le repair setup.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use wheelfix_schema::DEFAULT_REPAIR_PLATFORM;

/// Upper bound on the worker pool. Every completed artifact rewrites the
/// checkpoint, so the pool is sized for tens of workers, not thousands.
pub const MAX_WORKERS: usize = 64;

/// Upper bound for any tool timeout (one day).
pub const MAX_TIMEOUT_SECS: u64 = 86_400;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub store: StoreConfig,
    pub dirs: DirConfig,
    pub repair: RepairConfig,
    pub install: InstallConfig,
    pub run: RunConfig,
}

/// Source/target repository settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StoreConfig {
    /// Repository manager base URL, e.g. `https://host/artifactory`.
    pub base_url: String,
    /// Metadata query endpoint. Defaults to `<base_url>/api/search/aql`.
    pub query_url: Option<String>,
    /// API key sent as `X-JFrog-Art-Api`. Usually supplied via `WHEELFIX_API_KEY`.
    #[serde(skip_serializing)]
    pub api_key: String,
    pub source_repo: String,
    pub target_repo: String,
    /// Folder under the target repository that receives repaired wheels.
    pub upload_root: String,
    /// Filename glob the query matches.
    pub name_glob: String,
    /// Path pattern the query excludes (index/cache folders).
    pub path_exclude: String,
    /// Cap on queried artifacts; 0 means no limit.
    pub max_total: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            query_url: None,
            api_key: String::new(),
            source_repo: String::new(),
            target_repo: String::new(),
            upload_root: "auditwheel-repair".to_string(),
            name_glob: "*.whl".to_string(),
            path_exclude: ".pypi*".to_string(),
            max_total: 0,
        }
    }
}

impl StoreConfig {
    pub fn query_url(&self) -> String {
        self.query_url.clone().unwrap_or_else(|| {
            format!("{}/api/search/aql", self.base_url.trim_end_matches('/'))
        })
    }
}

/// Local working directories.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DirConfig {
    pub downloads: PathBuf,
    pub repaired: PathBuf,
    /// Holds the checkpoint tables.
    pub output: PathBuf,
}

impl Default for DirConfig {
    fn default() -> Self {
        Self {
            downloads: PathBuf::from("wheels"),
            repaired: PathBuf::from("repaired_wheels"),
            output: PathBuf::from("output"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RepairConfig {
    pub program: String,
    pub platform: String,
    /// Exported to the repair tool so it resolves libraries installed
    /// outside the default search path.
    pub ld_library_path: Option<String>,
    pub timeout_secs: u64,
}

impl Default for RepairConfig {
    fn default() -> Self {
        Self {
            program: "auditwheel".to_string(),
            platform: DEFAULT_REPAIR_PLATFORM.to_string(),
            ld_library_path: Some("/usr/local/lib64:/usr/local/lib".to_string()),
            timeout_secs: 1800,
        }
    }
}

impl RepairConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct InstallConfig {
    /// Interpreter tag to interpreter binary.
    pub interpreters: BTreeMap<String, PathBuf>,
    /// Tags tried, in order, when a filename names no interpreter.
    pub preference: Vec<String>,
    /// Tag used for stable-ABI wheels whose own tag has no interpreter.
    pub stable_abi_fallback: String,
    /// Parent directory for ephemeral environments (system temp if unset).
    pub venv_root: Option<PathBuf>,
    pub timeout_secs: u64,
}

impl Default for InstallConfig {
    fn default() -> Self {
        let tags = ["cp313", "cp312", "cp311", "cp310", "cp39"];
        let interpreters = tags
            .iter()
            .map(|tag| {
                (
                    (*tag).to_string(),
                    PathBuf::from(format!("/opt/python/{tag}-{tag}/bin/python")),
                )
            })
            .collect();

        Self {
            interpreters,
            preference: tags.iter().map(ToString::to_string).collect(),
            stable_abi_fallback: "cp311".to_string(),
            venv_root: None,
            timeout_secs: 900,
        }
    }
}

impl InstallConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RunConfig {
    pub workers: usize,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self { workers: 4 }
    }
}

impl Config {
    /// Load the config file, or defaults when `path` is `None`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not valid TOML for
    /// this schema. Unknown keys are rejected so typos surface early.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let Some(path) = path else {
            return Ok(Self::default());
        };

        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        Ok(toml::from_str(&content)?)
    }

    /// Apply overrides from the process environment.
    ///
    /// # Errors
    ///
    /// Returns an error if a numeric override does not parse.
    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        self.apply_env_with(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary lookup.
    ///
    /// Recognised keys: `WHEELFIX_API_KEY`, `WHEELFIX_BASE_URL`,
    /// `WHEELFIX_WORKERS`.
    ///
    /// # Errors
    ///
    /// Returns an error if `WHEELFIX_WORKERS` is not a number.
    pub fn apply_env_with<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(key) = lookup("WHEELFIX_API_KEY") {
            self.store.api_key = key;
        }
        if let Some(url) = lookup("WHEELFIX_BASE_URL") {
            self.store.base_url = url;
        }
        if let Some(workers) = lookup("WHEELFIX_WORKERS") {
            self.run.workers = workers.trim().parse().map_err(|_| {
                ConfigError::Invalid(format!("WHEELFIX_WORKERS is not a number: {workers}"))
            })?;
        }
        Ok(())
    }

    /// Check bounds that the rest of the pipeline relies on.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.run.workers == 0 || self.run.workers > MAX_WORKERS {
            return Err(ConfigError::Invalid(format!(
                "run.workers must be in 1..={MAX_WORKERS}, got {}",
                self.run.workers
            )));
        }

        for (field, secs) in [
            ("repair.timeout_secs", self.repair.timeout_secs),
            ("install.timeout_secs", self.install.timeout_secs),
        ] {
            if secs == 0 || secs > MAX_TIMEOUT_SECS {
                return Err(ConfigError::Invalid(format!(
                    "{field} must be in 1..={MAX_TIMEOUT_SECS}, got {secs}"
                )));
            }
        }

        if self.repair.program.trim().is_empty() {
            return Err(ConfigError::Invalid("repair.program is empty".to_string()));
        }

        Ok(())
    }

    /// Like [`validate`](Self::validate), plus the settings only needed when
    /// talking to the repository.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if a repository setting is missing.
    pub fn validate_for_run(&self) -> Result<(), ConfigError> {
        self.validate()?;

        for (field, value) in [
            ("store.base_url", &self.store.base_url),
            ("store.source_repo", &self.store.source_repo),
            ("store.target_repo", &self.store.target_repo),
        ] {
            if value.trim().is_empty() {
                return Err(ConfigError::Invalid(format!("{field} is required")));
            }
        }

        Ok(())
    }
}
