//! Configuration for nixtalk
//!
//! Loaded once at start-up from an optional YAML file and handed to each
//! component's constructor. Every field has a default, so an empty file (or
//! no file) is a valid configuration.
//!
//! ```yaml
//! executor:
//!   mode: mock
//!   timeout_secs: 10
//! response:
//!   max_suggestions: 2
//! templates_file: ./templates.yaml
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{PipelineError, Result};

/// PATH given to every child process
pub const DEFAULT_SANDBOX_PATH: &str =
    "/run/current-system/sw/bin:/nix/var/nix/profiles/default/bin:/usr/local/bin:/usr/bin:/bin";

/// Proxy variables forwarded only when `allow_proxy` is set
pub const PROXY_VARS: &[&str] = &[
    "http_proxy",
    "https_proxy",
    "no_proxy",
    "HTTP_PROXY",
    "HTTPS_PROXY",
    "NO_PROXY",
    "all_proxy",
    "ALL_PROXY",
];

/// Top-level configuration
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NixTalkConfig {
    pub executor: ExecutorConfig,
    pub response: ResponseConfig,
    /// YAML file replacing the built-in command templates
    pub templates_file: Option<PathBuf>,
}

/// Whether commands really run
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutorMode {
    #[default]
    Real,
    Mock,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutorConfig {
    pub mode: ExecutorMode,
    /// Wall-clock budget for one command
    pub timeout_secs: u64,
    /// Time between SIGTERM and SIGKILL
    pub grace_period_secs: u64,
    /// Cap on captured stdout and stderr, each
    pub max_output_bytes: usize,
    /// Forward proxy variables from the parent environment
    pub allow_proxy: bool,
    pub sandbox_path: String,
    /// Parent variables copied into the sandbox when set (e.g. NIX_PATH)
    pub passthrough_env: Vec<String>,
    /// Fixed variables added to the sandbox
    pub extra_env: HashMap<String, String>,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            mode: ExecutorMode::Real,
            timeout_secs: 30,
            grace_period_secs: 5,
            max_output_bytes: 10 * 1024 * 1024,
            allow_proxy: false,
            sandbox_path: DEFAULT_SANDBOX_PATH.to_string(),
            passthrough_env: vec!["NIX_PATH".to_string()],
            extra_env: HashMap::new(),
        }
    }
}

impl ExecutorConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn grace_period(&self) -> Duration {
        Duration::from_secs(self.grace_period_secs)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResponseConfig {
    pub max_suggestions: usize,
    /// Intents below this go to clarification instead of execution
    pub min_confidence: f64,
    /// Pick clarification phrasings at random rather than always the first
    pub randomize_clarifications: bool,
}

impl Default for ResponseConfig {
    fn default() -> Self {
        Self {
            max_suggestions: 4,
            min_confidence: 0.5,
            randomize_clarifications: true,
        }
    }
}

impl NixTalkConfig {
    /// Load from a YAML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .map_err(|e| PipelineError::Config(format!("{}: {}", path.display(), e)))?;
        let mut config = Self::from_yaml(&content)?;

        // Relative template paths are resolved against the config file
        if let Some(file) = config.templates_file.take() {
            config.templates_file = Some(match path.parent() {
                Some(dir) if file.is_relative() => dir.join(file),
                _ => file,
            });
        }
        Ok(config)
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        let config: Self = if content.trim().is_empty() {
            Self::default()
        } else {
            serde_yaml::from_str(content).map_err(|e| PipelineError::Config(e.to_string()))?
        };
        config.check()?;
        Ok(config)
    }

    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).map_err(|e| PipelineError::Config(e.to_string()))
    }

    fn check(&self) -> Result<()> {
        if self.executor.timeout_secs == 0 {
            return Err(PipelineError::Config("executor.timeout_secs must be positive".into()));
        }
        if self.executor.max_output_bytes == 0 {
            return Err(PipelineError::Config(
                "executor.max_output_bytes must be positive".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.response.min_confidence) {
            return Err(PipelineError::Config(
                "response.min_confidence must be between 0 and 1".into(),
            ));
        }
        Ok(())
    }
}
