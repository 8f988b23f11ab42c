use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use std::time::Duration;

// ============================================================================
// Top-level config
// ============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SwitchboardConfig {
    pub registry: RegistryConfig,
    pub logging: LoggingConfig,
    pub tools: Vec<ToolEntry>,
}

impl SwitchboardConfig {
    /// Load config from a TOML file, falling back to defaults for missing fields.
    /// After loading, env var overrides are applied.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;
        let mut config = Self::from_toml(&content)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Parse TOML without touching the environment.
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).with_context(|| "Failed to parse TOML config")
    }

    /// Try to load from path; if the file is missing or invalid, return
    /// defaults with env overrides.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Self {
        match Self::load(path) {
            Ok(cfg) => cfg,
            Err(e) => {
                tracing::info!("Config file not found or invalid ({:#}), using defaults", e);
                let mut cfg = Self::default();
                cfg.apply_env_overrides();
                cfg
            }
        }
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("SWITCHBOARD_TOOL_TIMEOUT_SECS") {
            if let Ok(n) = v.parse() {
                self.registry.timeout_secs = n;
            }
        }
        if let Ok(v) = std::env::var("SWITCHBOARD_ORPHAN_GRACE_MS") {
            if let Ok(n) = v.parse() {
                self.registry.orphan_grace_ms = n;
            }
        }
        if let Ok(v) = std::env::var("SWITCHBOARD_LOG") {
            self.logging.filter = v;
        }
        if let Ok(v) = std::env::var("SWITCHBOARD_LOG_DIR") {
            self.logging.dir = Some(PathBuf::from(v));
        }
    }
}

// ============================================================================
// Sub-configs
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Per-execution timeout for tool bodies.
    pub timeout_secs: u64,
    /// How long an abandoned execution may keep running after its caller
    /// gave up before it is aborted.
    pub orphan_grace_ms: u64,
}

impl RegistryConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn orphan_grace(&self) -> Duration {
        Duration::from_millis(self.orphan_grace_ms)
    }
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            orphan_grace_ms: 5_000,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is unset.
    pub filter: String,
    pub json: bool,
    /// Directory for a daily-rolling log file. Stderr only when unset.
    pub dir: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
            json: false,
            dir: None,
        }
    }
}

/// One `[[tools]]` entry: which factory to use and what to hand it.
#[derive(Debug, Clone, Deserialize)]
pub struct ToolEntry {
    pub name: String,
    /// Factory type tag.
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub options: Map<String, Value>,
}

impl ToolEntry {
    pub fn new(name: &str, kind: &str) -> Self {
        Self {
            name: name.to_string(),
            kind: kind.to_string(),
            enabled: true,
            options: Map::new(),
        }
    }

    pub fn with_option(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.options.insert(key.to_string(), value.into());
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    pub fn option_str(&self, key: &str) -> Option<&str> {
        self.options.get(key).and_then(Value::as_str)
    }

    pub fn option_strings(&self, key: &str) -> Vec<String> {
        self.options
            .get(key)
            .and_then(Value::as_array)
            .map(|a| a.iter().filter_map(|v| v.as_str().map(String::from)).collect())
            .unwrap_or_default()
    }
}

fn default_enabled() -> bool {
    true
}

// ============================================================================
// Tests
// ============================================================================
