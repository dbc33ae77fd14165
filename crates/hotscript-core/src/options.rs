//! Configuration of the script host.

use std::fmt;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::solution::{Project, Solution};

/// Shortest allowed debounce and polling period
pub const MIN_DETECTING_PERIOD: Duration = Duration::from_secs(3);

/// Hook run with the solution being built.
pub type SolutionCallback = Arc<dyn Fn(&Solution) -> anyhow::Result<()> + Send + Sync>;

#[derive(Error, Debug)]
pub enum OptionsError {
    #[error("{name} must be at least {}s, got {}s", MIN_DETECTING_PERIOD.as_secs(), value.as_secs_f64())]
    PeriodTooShort { name: &'static str, value: Duration },

    #[error("reading {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("parsing {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScriptOptions {
    /// Logical root every project is mounted below
    pub pkg_root: String,
    pub projects: Vec<Project>,
    /// Watch local directories and poll remote archives
    pub auto_hotfix: bool,
    /// Quiet period after the last local change before reloading
    #[serde(with = "seconds")]
    pub local_detecting_delay: Duration,
    #[serde(with = "seconds")]
    pub remote_checking_interval: Duration,
    /// Runs before any project is loaded
    #[serde(skip)]
    pub loading_cb: Option<SolutionCallback>,
    /// Runs after every project loaded
    #[serde(skip)]
    pub loaded_cb: Option<SolutionCallback>,
}

impl Default for ScriptOptions {
    fn default() -> Self {
        Self {
            pkg_root: "scripts".to_string(),
            projects: Vec::new(),
            auto_hotfix: true,
            local_detecting_delay: MIN_DETECTING_PERIOD,
            remote_checking_interval: Duration::from_secs(60),
            loading_cb: None,
            loaded_cb: None,
        }
    }
}

impl fmt::Debug for ScriptOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScriptOptions")
            .field("pkg_root", &self.pkg_root)
            .field("projects", &self.projects)
            .field("auto_hotfix", &self.auto_hotfix)
            .field("local_detecting_delay", &self.local_detecting_delay)
            .field("remote_checking_interval", &self.remote_checking_interval)
            .field("loading_cb", &self.loading_cb.is_some())
            .field("loaded_cb", &self.loaded_cb.is_some())
            .finish()
    }
}

impl ScriptOptions {
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, OptionsError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| OptionsError::Read {
            path: path.display().to_string(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| OptionsError::Parse {
            path: path.display().to_string(),
            source,
        })
    }

    pub fn with_project(mut self, project: Project) -> Self {
        self.projects.push(project);
        self
    }

    pub fn with_loading_cb<F>(mut self, callback: F) -> Self
    where
        F: Fn(&Solution) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.loading_cb = Some(Arc::new(callback));
        self
    }

    pub fn with_loaded_cb<F>(mut self, callback: F) -> Self
    where
        F: Fn(&Solution) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.loaded_cb = Some(Arc::new(callback));
        self
    }

    pub fn validate(&self) -> Result<(), OptionsError> {
        if self.local_detecting_delay < MIN_DETECTING_PERIOD {
            return Err(OptionsError::PeriodTooShort {
                name: "local_detecting_delay",
                value: self.local_detecting_delay,
            });
        }
        if self.remote_checking_interval < MIN_DETECTING_PERIOD {
            return Err(OptionsError::PeriodTooShort {
                name: "remote_checking_interval",
                value: self.remote_checking_interval,
            });
        }
        Ok(())
    }
}

/// Durations as fractional seconds
mod seconds {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(value.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(serde::de::Error::custom)
    }
}
