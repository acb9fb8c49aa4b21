use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use url::Url;
use zeroize::Zeroizing;

use crate::detect::BoundsPolicy;

const DEFAULT_MODEL: &str = "gemini-3-flash-preview";
const DEFAULT_ENDPOINT: &str = "https://generativelanguage.googleapis.com";
const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Environment variables consulted for the API key, in order.
pub const API_KEY_VARS: [&str; 2] = ["GEMINI_API_KEY", "API_KEY"];

#[derive(Debug, Deserialize, Default)]
struct WorkbenchConfigFile {
    model: Option<String>,
    endpoint: Option<String>,
    timeout_secs: Option<u64>,
    bounds_policy: Option<BoundsPolicy>,
}

#[derive(Clone)]
pub struct WorkbenchConfig {
    /// Credential for the inference service. Absent is allowed; every
    /// detection call then fails with an authentication error.
    pub api_key: Option<Zeroizing<String>>,
    pub model: String,
    pub endpoint: String,
    pub timeout: Duration,
    pub bounds_policy: BoundsPolicy,
}

impl Default for WorkbenchConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: DEFAULT_MODEL.to_string(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            bounds_policy: BoundsPolicy::default(),
        }
    }
}

impl std::fmt::Debug for WorkbenchConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkbenchConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("model", &self.model)
            .field("endpoint", &self.endpoint)
            .field("timeout", &self.timeout)
            .field("bounds_policy", &self.bounds_policy)
            .finish()
    }
}

impl WorkbenchConfig {
    /// File named by `WORKBENCH_CONFIG` (optional), then environment, then validation.
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("WORKBENCH_CONFIG").ok();
        let file_cfg = match config_path.as_deref() {
            Some(path) if !path.trim().is_empty() => Some(read_config_file(Path::new(path))?),
            _ => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default());
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: WorkbenchConfigFile) -> Self {
        let defaults = Self::default();
        Self {
            api_key: None,
            model: file.model.unwrap_or(defaults.model),
            endpoint: file.endpoint.unwrap_or(defaults.endpoint),
            timeout: file
                .timeout_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.timeout),
            bounds_policy: file.bounds_policy.unwrap_or(defaults.bounds_policy),
        }
    }

    fn apply_env(&mut self) -> Result<()> {
        self.api_key = API_KEY_VARS.iter().find_map(|var| {
            std::env::var(var)
                .ok()
                .filter(|value| !value.trim().is_empty())
                .map(|value| Zeroizing::new(value.trim().to_string()))
        });
        if let Ok(model) = std::env::var("WORKBENCH_MODEL") {
            if !model.trim().is_empty() {
                self.model = model.trim().to_string();
            }
        }
        if let Ok(endpoint) = std::env::var("WORKBENCH_ENDPOINT") {
            if !endpoint.trim().is_empty() {
                self.endpoint = endpoint.trim().to_string();
            }
        }
        if let Ok(timeout) = std::env::var("WORKBENCH_TIMEOUT_SECS") {
            let seconds: u64 = timeout.trim().parse().map_err(|_| {
                anyhow!("WORKBENCH_TIMEOUT_SECS must be an integer number of seconds")
            })?;
            self.timeout = Duration::from_secs(seconds);
        }
        if let Ok(policy) = std::env::var("WORKBENCH_BOUNDS_POLICY") {
            if !policy.trim().is_empty() {
                self.bounds_policy = policy.parse()?;
            }
        }
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        validate_model(&self.model)?;
        let endpoint = Url::parse(&self.endpoint)
            .map_err(|e| anyhow!("invalid endpoint '{}': {}", self.endpoint, e))?;
        if !matches!(endpoint.scheme(), "http" | "https") {
            return Err(anyhow!(
                "endpoint must use http or https, got '{}'",
                endpoint.scheme()
            ));
        }
        if self.timeout.as_secs() == 0 {
            return Err(anyhow!("timeout must be greater than zero"));
        }
        Ok(())
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }
}

/// Model ids become a URL path segment.
pub fn validate_model(model: &str) -> Result<()> {
    if model.is_empty() {
        return Err(anyhow!("model id must not be empty"));
    }
    if !model
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
    {
        return Err(anyhow!(
            "model id '{}' may only contain ASCII letters, digits, '-', '_' and '.'",
            model
        ));
    }
    Ok(())
}

fn read_config_file(path: &Path) -> Result<WorkbenchConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let cfg = serde_json::from_str(&raw)
        .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?;
    Ok(cfg)
}
