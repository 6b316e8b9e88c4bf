//! gapgen run configuration
//!
//! Loaded from `--config <file>`, else `gapgen.yaml` in the working
//! directory, else built-in defaults. CLI flags override budget, threshold
//! and target after loading.

use crate::coverage::MatcherConfig;
use crate::enhance::{DEFAULT_ENDPOINT, DEFAULT_MODEL};
use crate::error::{Error, Result};
use crate::lang::Language;
use crate::priority::{default_critical_tags, PriorityWeights};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Config file picked up from the working directory
pub const DEFAULT_CONFIG_FILE: &str = "gapgen.yaml";

/// Top-level configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct GenConfig {
    /// Schema version for migrations
    #[serde(default = "default_version")]
    pub version: u32,

    /// Endpoint tags that raise a gap's priority
    #[serde(default = "default_critical_tags")]
    pub critical_tags: Vec<String>,

    #[serde(default)]
    pub priority: PriorityWeights,

    /// Gaps scoring below this are not generated
    #[serde(default)]
    pub threshold: i64,

    #[serde(default)]
    pub enhancement: EnhancementConfig,

    #[serde(default)]
    pub strategies: StrategyConfig,

    #[serde(default)]
    pub matchers: MatcherConfig,

    #[serde(default)]
    pub emit: EmitConfig,
}

fn default_version() -> u32 {
    1
}

fn default_true() -> bool {
    true
}

impl Default for GenConfig {
    fn default() -> Self {
        Self {
            version: default_version(),
            critical_tags: default_critical_tags(),
            priority: PriorityWeights::default(),
            threshold: 0,
            enhancement: EnhancementConfig::default(),
            strategies: StrategyConfig::default(),
            matchers: MatcherConfig::default(),
            emit: EmitConfig::default(),
        }
    }
}

/// External suggestion service settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct EnhancementConfig {
    #[serde(default)]
    pub enabled: bool,

    /// Maximum external calls per run
    #[serde(default = "default_budget")]
    pub budget: usize,

    /// Per-call timeout in milliseconds
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Chat-completions URL
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    #[serde(default = "default_model")]
    pub model: String,

    /// Environment variable holding the bearer token
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    #[serde(default = "default_temperature")]
    pub temperature: f64,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Accepted candidates per endpoint
    #[serde(default = "default_max_suggestions")]
    pub max_suggestions: usize,
}

fn default_budget() -> usize {
    5
}
fn default_timeout_ms() -> u64 {
    30_000
}
fn default_endpoint() -> String {
    DEFAULT_ENDPOINT.to_string()
}
fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}
fn default_api_key_env() -> String {
    "LLM7_API_KEY".to_string()
}
fn default_temperature() -> f64 {
    0.3
}
fn default_max_tokens() -> u32 {
    1000
}
fn default_max_suggestions() -> usize {
    5
}

impl Default for EnhancementConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            budget: default_budget(),
            timeout_ms: default_timeout_ms(),
            endpoint: default_endpoint(),
            model: default_model(),
            api_key_env: default_api_key_env(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            max_suggestions: default_max_suggestions(),
        }
    }
}

/// Which case strategies run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct StrategyConfig {
    #[serde(default = "default_true")]
    pub template: bool,

    /// Also requires `enhancement.enabled`
    #[serde(default = "default_true")]
    pub enhanced: bool,
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self {
            template: true,
            enhanced: true,
        }
    }
}

/// Emitted code settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct EmitConfig {
    #[serde(default = "default_target")]
    pub target: Language,

    /// Package / namespace / module for emitted tests
    #[serde(default = "default_package")]
    pub package: String,

    /// Environment variable the emitted tests read the base URL from
    #[serde(default = "default_base_url_env")]
    pub base_url_env: String,

    /// Format Rust output with prettyplease
    #[serde(default = "default_true")]
    pub auto_format: bool,
}

fn default_target() -> Language {
    Language::Java
}
fn default_package() -> String {
    "generated".to_string()
}
fn default_base_url_env() -> String {
    "API_BASE_URL".to_string()
}

impl Default for EmitConfig {
    fn default() -> Self {
        Self {
            target: default_target(),
            package: default_package(),
            base_url_env: default_base_url_env(),
            auto_format: true,
        }
    }
}

/// CLI values that take precedence over the file
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub budget: Option<usize>,
    pub threshold: Option<i64>,
    pub target: Option<Language>,
    pub enhance: bool,
}

impl GenConfig {
    /// Parse a YAML config document
    pub fn from_yaml(content: &str) -> Result<Self> {
        let config: GenConfig = serde_norway::from_str(content)
            .map_err(|e| Error::Config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load a config file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(Error::Io)?;
        Self::from_yaml(&content)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))
    }

    /// Explicit file if given, else `gapgen.yaml` in `dir`, else defaults
    pub fn discover(explicit: Option<&Path>, dir: &Path) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load(path);
        }
        let implicit = dir.join(DEFAULT_CONFIG_FILE);
        if implicit.exists() {
            tracing::debug!(path = %implicit.display(), "using config from working directory");
            return Self::load(&implicit);
        }
        Ok(Self::default())
    }

    fn validate(&self) -> Result<()> {
        if self.version != 1 {
            return Err(Error::Config(format!(
                "Unsupported config version: {}",
                self.version
            )));
        }
        if self.enhancement.max_suggestions == 0 {
            return Err(Error::Config(
                "enhancement.max_suggestions must be at least 1".to_string(),
            ));
        }
        if self.enhancement.timeout_ms == 0 {
            return Err(Error::Config(
                "enhancement.timeout_ms must be positive".to_string(),
            ));
        }
        Ok(())
    }

    pub fn apply(&mut self, overrides: &Overrides) {
        if let Some(budget) = overrides.budget {
            self.enhancement.budget = budget;
        }
        if let Some(threshold) = overrides.threshold {
            self.threshold = threshold;
        }
        if let Some(target) = overrides.target {
            self.emit.target = target;
        }
        if overrides.enhance {
            self.enhancement.enabled = true;
        }
    }

    /// Whether the enhanced strategy takes part in this run
    pub fn enhancement_active(&self) -> bool {
        self.strategies.enhanced && self.enhancement.enabled && self.enhancement.budget > 0
    }

    /// JSON schema of the config file
    pub fn schema() -> schemars::Schema {
        schemars::schema_for!(GenConfig)
    }
}
