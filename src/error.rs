//! Error types for gapgen
//!
//! `Error` covers the fatal conditions that abort a run before any output is
//! written. Recoverable conditions are reported as [`Warning`] values and
//! accumulated into the run report instead.

use crate::contract::EndpointId;
use crate::scenario::ScenarioCategory;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Fatal errors
#[derive(Error, Debug)]
pub enum Error {
    #[error("Contract parse error: {0}")]
    ContractParse(String),

    #[error("No template rule for scenario category '{category}' ({endpoint})")]
    UnsupportedScenario {
        endpoint: EndpointId,
        category: ScenarioCategory,
    },

    #[error("Emit error: {0}")]
    Emit(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Template error: {0}")]
    Template(String),

    #[error("CEL parse error: {0}")]
    CelParse(String),

    #[error("CEL evaluation error: {0}")]
    CelEval(String),

    #[error("Fetch error: {0}")]
    Fetch(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_norway::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Whether the error came from the contract document itself
    pub fn is_contract_error(&self) -> bool {
        matches!(self, Error::ContractParse(_) | Error::Fetch(_))
    }
}

impl From<&str> for Error {
    fn from(s: &str) -> Self {
        Error::Other(s.to_string())
    }
}

impl From<String> for Error {
    fn from(s: String) -> Self {
        Error::Other(s)
    }
}

impl From<minijinja::Error> for Error {
    fn from(e: minijinja::Error) -> Self {
        Error::Template(e.to_string())
    }
}

/// Recoverable conditions surfaced in the run report
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Warning {
    /// A corpus unit could not be interpreted and contributed no coverage
    CorpusUnitSkipped { unit: String, reason: String },

    /// The suggestion service failed, timed out or answered garbage
    EnhancementUnavailable {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        endpoint: Option<String>,
        reason: String,
    },
}

impl std::fmt::Display for Warning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Warning::CorpusUnitSkipped { unit, reason } => {
                write!(f, "corpus unit skipped: {} ({})", unit, reason)
            }
            Warning::EnhancementUnavailable {
                endpoint: Some(endpoint),
                reason,
            } => write!(f, "enhancement unavailable for {}: {}", endpoint, reason),
            Warning::EnhancementUnavailable {
                endpoint: None,
                reason,
            } => write!(f, "enhancement unavailable: {}", reason),
        }
    }
}
