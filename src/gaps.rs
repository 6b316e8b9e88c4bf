//! GapIdentifier: required scenario categories minus covered ones
//!
//! Required categories per endpoint:
//! - `happy_path` always
//! - per parameter: `missing_required_param` (required), `below_minimum`
//!   (lower bound), `above_maximum` (upper bound), `wrong_type` (non-string)
//! - `unauthorized` when auth is required, `forbidden_role` when admin-only
//! - `not_found` when the template has a path parameter
//! - `duplicate_conflict` when 409 is declared
//!
//! `creative_security` is never required.

use crate::contract::{ContractModel, EndpointId, EndpointSpec};
use crate::coverage::CoverageModel;
use crate::scenario::ScenarioCategory;
use crate::testgen::{can_exceed, can_undercut};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// A required scenario with no covering test
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema)]
pub struct Gap {
    pub endpoint: EndpointId,
    pub category: ScenarioCategory,
    /// Target parameter for per-parameter categories
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameter: Option<String>,
}

impl Gap {
    pub fn new(endpoint: EndpointId, category: ScenarioCategory, parameter: Option<&str>) -> Self {
        Self {
            endpoint,
            category,
            parameter: parameter.map(str::to_string),
        }
    }
}

impl std::fmt::Display for Gap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.parameter {
            Some(param) => write!(f, "{} {} [{}]", self.endpoint, self.category, param),
            None => write!(f, "{} {}", self.endpoint, self.category),
        }
    }
}

/// Every (category, parameter) the endpoint's contract implies
pub fn required_scenarios(endpoint: &EndpointSpec) -> Vec<(ScenarioCategory, Option<&str>)> {
    let mut required = vec![(ScenarioCategory::HappyPath, None)];

    for param in &endpoint.parameters {
        let name = Some(param.name.as_str());
        if param.required {
            required.push((ScenarioCategory::MissingRequiredParam, name));
        }
        if param.has_lower_bound() {
            if can_undercut(param) {
                required.push((ScenarioCategory::BelowMinimum, name));
            } else {
                tracing::debug!(
                    endpoint = %endpoint.id,
                    param = %param.name,
                    "lower bound has no representable violation"
                );
            }
        }
        if param.has_upper_bound() {
            if can_exceed(param) {
                required.push((ScenarioCategory::AboveMaximum, name));
            } else {
                tracing::debug!(
                    endpoint = %endpoint.id,
                    param = %param.name,
                    "upper bound has no representable violation"
                );
            }
        }
        if param.is_type_checked() {
            required.push((ScenarioCategory::WrongType, name));
        }
    }

    if endpoint.auth_required {
        required.push((ScenarioCategory::Unauthorized, None));
    }
    if endpoint.admin_only {
        required.push((ScenarioCategory::ForbiddenRole, None));
    }
    if endpoint.has_path_identifier() {
        required.push((ScenarioCategory::NotFound, None));
    }
    if endpoint.declares(409) {
        required.push((ScenarioCategory::DuplicateConflict, None));
    }

    required
}

/// Gaps for one endpoint
pub fn endpoint_gaps(endpoint: &EndpointSpec, coverage: &CoverageModel) -> Vec<Gap> {
    required_scenarios(endpoint)
        .into_iter()
        .filter(|(category, _)| !coverage.is_covered(&endpoint.id, *category))
        .map(|(category, param)| Gap::new(endpoint.id.clone(), category, param))
        .collect()
}

/// Gaps across the whole contract
pub fn identify_gaps(model: &ContractModel, coverage: &CoverageModel) -> Vec<Gap> {
    let gaps: Vec<Gap> = model
        .endpoints()
        .flat_map(|endpoint| endpoint_gaps(endpoint, coverage))
        .collect();
    tracing::info!(
        endpoints = model.len(),
        gaps = gaps.len(),
        "gap identification complete"
    );
    gaps
}
