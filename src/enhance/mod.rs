//! Enhancer: budgeted, optional suggestions from an external service
//!
//! The service proposes extra scenarios for an endpoint; every candidate is
//! validated against the contract before it becomes a `TestCase`. Nothing in
//! here is fatal: an unreachable, slow or confused service costs the endpoint
//! its enhanced cases and leaves a warning in the report.

mod client;
mod validate;

pub use client::{ChatCompletionsSource, DEFAULT_ENDPOINT, DEFAULT_MODEL};
pub use validate::{validate_suggestion, Rejection};

use crate::contract::{Bounds, EndpointSpec, ParamLocation, ParamType};
use crate::error::Warning;
use crate::scenario::ScenarioCategory;
use crate::testgen::TestCase;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Existing case names sent along with a request
const EXISTING_CASES_IN_REQUEST: usize = 3;

/// Run-wide cap on external calls
#[derive(Debug)]
pub struct CallBudget {
    limit: usize,
    used: AtomicUsize,
}

impl CallBudget {
    pub fn new(limit: usize) -> Self {
        Self {
            limit,
            used: AtomicUsize::new(0),
        }
    }

    /// Claim one call slot; false once the budget is spent
    pub fn try_reserve(&self) -> bool {
        self.used
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |used| {
                (used < self.limit).then_some(used + 1)
            })
            .is_ok()
    }

    pub fn used(&self) -> usize {
        self.used.load(Ordering::SeqCst)
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn remaining(&self) -> usize {
        self.limit.saturating_sub(self.used())
    }
}

/// One candidate scenario as the service describes it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Suggestion {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Scenario label; anything outside the category set maps to creative_security
    #[serde(default, alias = "test_type", alias = "category")]
    pub scenario: String,
    #[serde(default, alias = "input_data")]
    pub inputs: Map<String, Value>,
    pub expected_status: u16,
    #[serde(default)]
    pub reasoning: String,
}

/// Parameter as presented to the service
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParameterSummary {
    pub name: String,
    pub location: ParamLocation,
    #[serde(rename = "type")]
    pub param_type: ParamType,
    pub required: bool,
    #[serde(skip_serializing_if = "Bounds::is_empty")]
    pub bounds: Bounds,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub enum_values: Vec<Value>,
}

/// Everything the service is told about one endpoint
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SuggestionRequest {
    pub method: String,
    pub path: String,
    pub summary: String,
    pub parameters: Vec<ParameterSummary>,
    pub auth_required: bool,
    pub admin_only: bool,
    pub covered: Vec<ScenarioCategory>,
    /// "category: rationale" for the first few existing cases
    pub existing_cases: Vec<String>,
}

impl SuggestionRequest {
    pub fn new(
        endpoint: &EndpointSpec,
        covered: &BTreeSet<ScenarioCategory>,
        existing: &[TestCase],
    ) -> Self {
        Self {
            method: endpoint.method().to_string(),
            path: endpoint.path().to_string(),
            summary: endpoint
                .summary
                .clone()
                .or_else(|| endpoint.operation_id.clone())
                .unwrap_or_default(),
            parameters: endpoint
                .parameters
                .iter()
                .map(|p| ParameterSummary {
                    name: p.name.clone(),
                    location: p.location,
                    param_type: p.param_type,
                    required: p.required,
                    bounds: p.bounds.clone(),
                    enum_values: p.enum_values.clone(),
                })
                .collect(),
            auth_required: endpoint.auth_required,
            admin_only: endpoint.admin_only,
            covered: covered.iter().copied().collect(),
            existing_cases: existing
                .iter()
                .take(EXISTING_CASES_IN_REQUEST)
                .map(|c| format!("{}: {}", c.category, c.rationale))
                .collect(),
        }
    }
}

/// Why a suggestion call produced nothing
#[derive(Debug, thiserror::Error)]
pub enum SuggestionError {
    #[error("enhancement service is not configured: {0}")]
    Unconfigured(String),

    #[error("request failed: {0}")]
    Transport(String),

    #[error("service returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("malformed response: {0}")]
    Malformed(String),

    #[error("timed out after {0:?}")]
    Timeout(Duration),
}

/// Candidates from one call, plus the items that could not be read
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SuggestionBatch {
    pub suggestions: Vec<Suggestion>,
    /// Items dropped because they did not deserialize as a `Suggestion`
    pub unreadable: usize,
}

impl From<Vec<Suggestion>> for SuggestionBatch {
    fn from(suggestions: Vec<Suggestion>) -> Self {
        Self {
            suggestions,
            unreadable: 0,
        }
    }
}

/// External source of candidate scenarios
#[async_trait]
pub trait SuggestionSource: Send + Sync {
    async fn suggest(&self, request: &SuggestionRequest) -> Result<SuggestionBatch, SuggestionError>;
}

/// Result of enhancing one endpoint
#[derive(Debug, Clone, Default)]
pub struct Enhancement {
    pub cases: Vec<TestCase>,
    pub rejected: usize,
    pub warning: Option<Warning>,
    /// Whether an external call was made
    pub called: bool,
}

/// Budgeted wrapper around a suggestion source
pub struct Enhancer {
    source: Arc<dyn SuggestionSource>,
    budget: Arc<CallBudget>,
    timeout: Duration,
    max_suggestions: usize,
}

impl std::fmt::Debug for Enhancer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Enhancer")
            .field("budget", &self.budget)
            .field("timeout", &self.timeout)
            .field("max_suggestions", &self.max_suggestions)
            .finish_non_exhaustive()
    }
}

impl Enhancer {
    pub fn new(
        source: Arc<dyn SuggestionSource>,
        budget: Arc<CallBudget>,
        timeout: Duration,
        max_suggestions: usize,
    ) -> Self {
        Self {
            source,
            budget,
            timeout,
            max_suggestions,
        }
    }

    pub fn budget(&self) -> &CallBudget {
        &self.budget
    }

    /// Claim a call slot ahead of time
    pub fn reserve(&self) -> bool {
        self.budget.try_reserve()
    }

    /// Reserve a slot and enhance; a spent budget yields nothing
    pub async fn enhance(
        &self,
        endpoint: &EndpointSpec,
        covered: &BTreeSet<ScenarioCategory>,
        existing: &[TestCase],
    ) -> Enhancement {
        if !self.reserve() {
            tracing::debug!(endpoint = %endpoint.id, "call budget spent, template cases only");
            return Enhancement::default();
        }
        self.enhance_reserved(endpoint, covered, existing).await
    }

    /// Enhance using a slot the caller already reserved
    pub async fn enhance_reserved(
        &self,
        endpoint: &EndpointSpec,
        covered: &BTreeSet<ScenarioCategory>,
        existing: &[TestCase],
    ) -> Enhancement {
        let request = SuggestionRequest::new(endpoint, covered, existing);
        let outcome = tokio::time::timeout(self.timeout, self.source.suggest(&request))
            .await
            .unwrap_or(Err(SuggestionError::Timeout(self.timeout)));

        let batch = match outcome {
            Ok(batch) => batch,
            Err(e) => {
                tracing::warn!(endpoint = %endpoint.id, error = %e, "enhancement unavailable");
                return Enhancement {
                    warning: Some(Warning::EnhancementUnavailable {
                        endpoint: Some(endpoint.id.to_string()),
                        reason: e.to_string(),
                    }),
                    called: true,
                    ..Enhancement::default()
                };
            }
        };

        let mut accepted: Vec<TestCase> = Vec::new();
        let mut rejected = batch.unreadable;
        for suggestion in &batch.suggestions {
            if accepted.len() >= self.max_suggestions {
                tracing::debug!(endpoint = %endpoint.id, name = %suggestion.name, "over the per-endpoint limit");
                rejected += 1;
                continue;
            }
            let known: Vec<&TestCase> = existing.iter().chain(accepted.iter()).collect();
            match validate_suggestion(endpoint, suggestion, &known) {
                Ok(case) => accepted.push(case),
                Err(reason) => {
                    tracing::warn!(
                        endpoint = %endpoint.id,
                        name = %suggestion.name,
                        reason = %reason,
                        "dropped enhancement candidate"
                    );
                    rejected += 1;
                }
            }
        }

        tracing::debug!(
            endpoint = %endpoint.id,
            accepted = accepted.len(),
            rejected,
            "enhancement complete"
        );
        Enhancement {
            cases: accepted,
            rejected,
            warning: None,
            called: true,
        }
    }
}
