//! Registry configuration

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::resources::ResourceError;

/// Resource registry configuration
///
/// Loaded from RON or JSON, or built in code with the `with_*` methods.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Fixed capacity of the resource table (`None` for growable)
    pub max_resources: Option<usize>,
    /// Fixed capacity of the in-flight request table (`None` for growable)
    pub max_in_flight_requests: Option<usize>,
    /// Fixed capacity of each audio resource's instance table
    pub max_audio_instances: usize,
    /// Root directory of the filesystem asset pipeline
    pub asset_root: PathBuf,
    /// Package used when a descriptor does not name one
    pub default_package: String,
    /// Worker threads used by the filesystem asset pipeline
    pub worker_threads: usize,
    /// Default log filter (overridden by `RUST_LOG`)
    pub log_level: String,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            max_resources: Some(1024),
            max_in_flight_requests: None,
            max_audio_instances: 16,
            asset_root: PathBuf::from("assets"),
            default_package: String::from("runtime"),
            worker_threads: 2,
            log_level: String::from("info"),
        }
    }
}

impl RegistryConfig {
    /// Set the resource table capacity
    pub fn with_max_resources(mut self, max: Option<usize>) -> Self {
        self.max_resources = max;
        self
    }

    /// Set the in-flight request table capacity
    pub fn with_max_in_flight_requests(mut self, max: Option<usize>) -> Self {
        self.max_in_flight_requests = max;
        self
    }

    /// Set the per-resource audio instance capacity
    pub fn with_max_audio_instances(mut self, max: usize) -> Self {
        self.max_audio_instances = max;
        self
    }

    /// Set the asset root directory
    pub fn with_asset_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.asset_root = root.into();
        self
    }

    /// Set the default package name
    pub fn with_default_package(mut self, package: impl Into<String>) -> Self {
        self.default_package = package.into();
        self
    }

    /// Set the filesystem pipeline worker count
    pub fn with_worker_threads(mut self, threads: usize) -> Self {
        self.worker_threads = threads;
        self
    }

    /// Set the default log filter
    pub fn with_log_level(mut self, level: impl Into<String>) -> Self {
        self.log_level = level.into();
        self
    }

    /// Parse a config from a RON string
    ///
    /// # Errors
    ///
    /// Returns an error if the string is not a valid config
    pub fn from_ron_str(source: &str) -> Result<Self, ResourceError> {
        ron::from_str(source).map_err(|e| ResourceError::Config(e.to_string()))
    }

    /// Load a config from a RON file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed
    pub fn load_ron(path: impl AsRef<Path>) -> Result<Self, ResourceError> {
        let content = fs::read_to_string(path).map_err(|e| ResourceError::Io(e.to_string()))?;
        Self::from_ron_str(&content)
    }

    /// Load a config from a JSON file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed
    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, ResourceError> {
        let content = fs::read_to_string(path).map_err(|e| ResourceError::Io(e.to_string()))?;
        serde_json::from_str(&content).map_err(|e| ResourceError::Config(e.to_string()))
    }

    /// Save the config to a RON file
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails or the file cannot be written
    pub fn save_ron(&self, path: impl AsRef<Path>) -> Result<(), ResourceError> {
        let ron_string = ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())
            .map_err(|e| ResourceError::Config(e.to_string()))?;
        fs::write(path, ron_string).map_err(|e| ResourceError::Io(e.to_string()))
    }
}
