//! Test case synthesis: one deterministic `TestCase` per gap
//!
//! The template generator enumerates parameter constraints:
//! - happy path with canonical values and body-shape assertions
//! - one violation per constrained parameter (missing, below, above, wrong type)
//! - credential scenarios (unauthorized, forbidden role)
//! - resource scenarios (not found, duplicate conflict)
//! - a creative security check
//!
//! No external calls; the only failure is an unsupported scenario category.

mod values;

pub use values::{
    above_maximum, below_minimum, can_exceed, can_undercut, canonical, conforms, missing_id,
    wrong_type, MAX_SYNTHESIZED_LEN, MISSING_INT_ID, MISSING_STR_ID, SQL_INJECTION,
};

use crate::contract::{BodyShape, EndpointId, EndpointSpec, ParamLocation, ParamType, Parameter};
use crate::error::{Error, Result};
use crate::gaps::Gap;
use crate::scenario::{HarnessTag, ScenarioCategory};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};

/// Maximum property assertions derived from a response shape
const MAX_SHAPE_ASSERTIONS: usize = 5;

/// How the request authenticates
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum Credential {
    None,
    User,
    Admin,
    /// A syntactically broken bearer token
    Malformed,
}

impl Credential {
    /// Credential a legitimate caller of this endpoint would use
    pub fn for_endpoint(endpoint: &EndpointSpec) -> Self {
        if endpoint.admin_only {
            Credential::Admin
        } else if endpoint.auth_required {
            Credential::User
        } else {
            Credential::None
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Credential::None => "none",
            Credential::User => "user",
            Credential::Admin => "admin",
            Credential::Malformed => "malformed",
        }
    }
}

/// Check applied to the response body
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Predicate {
    Exists,
    IsArray,
}

/// JSON-path / predicate pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct BodyAssertion {
    /// `$` for the root, `$.field` for a top-level property
    pub path: String,
    pub predicate: Predicate,
}

impl BodyAssertion {
    pub fn new(path: &str, predicate: Predicate) -> Self {
        Self {
            path: path.to_string(),
            predicate,
        }
    }

    /// Property name for `$.field` paths
    pub fn field(&self) -> Option<&str> {
        self.path.strip_prefix("$.")
    }
}

/// Where a test case came from
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum Provenance {
    Template,
    Enhanced,
}

impl Provenance {
    pub fn label(self) -> &'static str {
        match self {
            Provenance::Template => "template",
            Provenance::Enhanced => "enhanced",
        }
    }
}

/// A concrete, renderable test
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct TestCase {
    pub endpoint: EndpointId,
    pub category: ScenarioCategory,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameter: Option<String>,
    /// Parameter values by name; absent means omitted
    pub inputs: BTreeMap<String, Value>,
    pub credential: Credential,
    pub expected_status: u16,
    #[serde(default)]
    pub assertions: Vec<BodyAssertion>,
    /// Send the request once as setup before the asserted attempt
    #[serde(default)]
    pub replay: bool,
    pub provenance: Provenance,
    pub rationale: String,
}

impl TestCase {
    pub fn harness_tag(&self) -> HarnessTag {
        self.category.harness_tag()
    }

    /// Two cases exercising the same request and expectation
    pub fn same_request(&self, other: &TestCase) -> bool {
        self.endpoint == other.endpoint
            && self.inputs == other.inputs
            && self.credential == other.credential
            && self.expected_status == other.expected_status
            && self.replay == other.replay
    }
}

/// Deterministic gap → test case synthesis
#[derive(Debug, Clone, Default)]
pub struct TemplateGenerator {
    unsupported: BTreeSet<ScenarioCategory>,
}

impl TemplateGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Withdraw template rules for the given categories
    pub fn without_rules(categories: impl IntoIterator<Item = ScenarioCategory>) -> Self {
        Self {
            unsupported: categories.into_iter().collect(),
        }
    }

    /// Synthesize the test case closing `gap`
    pub fn generate(&self, gap: &Gap, endpoint: &EndpointSpec) -> Result<TestCase> {
        let unsupported = || Error::UnsupportedScenario {
            endpoint: gap.endpoint.clone(),
            category: gap.category,
        };
        if self.unsupported.contains(&gap.category) {
            return Err(unsupported());
        }

        let target = match gap.parameter.as_deref() {
            Some(name) => Some(endpoint.parameter(name).ok_or_else(unsupported)?),
            None => None,
        };

        let mut case = TestCase {
            endpoint: endpoint.id.clone(),
            category: gap.category,
            parameter: gap.parameter.clone(),
            inputs: canonical_inputs(endpoint),
            credential: Credential::for_endpoint(endpoint),
            expected_status: endpoint.success_status(),
            assertions: Vec::new(),
            replay: false,
            provenance: Provenance::Template,
            rationale: String::new(),
        };
        let validation = validation_status(endpoint);

        match (gap.category, target) {
            (ScenarioCategory::HappyPath, _) => {
                case.assertions = shape_assertions(endpoint, case.expected_status);
                case.rationale = format!(
                    "{} with valid inputs succeeds with {}",
                    endpoint.id, case.expected_status
                );
            }
            (ScenarioCategory::MissingRequiredParam, Some(param)) => {
                case.inputs.remove(&param.name);
                case.expected_status = if param.location == ParamLocation::Path {
                    404
                } else {
                    validation
                };
                case.rationale = format!("omitting required {} '{}' is rejected", location(param), param.name);
            }
            (ScenarioCategory::BelowMinimum, Some(param)) => {
                let value = below_minimum(param).ok_or_else(unsupported)?;
                case.rationale = format!("'{}' = {} is below its lower bound", param.name, value);
                case.inputs.insert(param.name.clone(), value);
                case.expected_status = validation;
            }
            (ScenarioCategory::AboveMaximum, Some(param)) => {
                let value = above_maximum(param).ok_or_else(unsupported)?;
                case.rationale = format!("'{}' = {} exceeds its upper bound", param.name, abbreviate(&value));
                case.inputs.insert(param.name.clone(), value);
                case.expected_status = validation;
            }
            (ScenarioCategory::WrongType, Some(param)) => {
                let value = wrong_type(param);
                case.rationale = format!(
                    "'{}' expects {} but receives {}",
                    param.name,
                    type_name(param.param_type),
                    value
                );
                case.inputs.insert(param.name.clone(), value);
                case.expected_status = validation;
            }
            (ScenarioCategory::Unauthorized, _) => {
                case.credential = Credential::None;
                case.expected_status = 401;
                case.rationale = "request without credentials is refused".to_string();
            }
            (ScenarioCategory::ForbiddenRole, _) => {
                case.credential = Credential::User;
                case.expected_status = 403;
                case.rationale = "non-admin credential is forbidden".to_string();
            }
            (ScenarioCategory::NotFound, _) => {
                let param = endpoint
                    .path_parameters()
                    .into_iter()
                    .next()
                    .ok_or_else(unsupported)?;
                case.inputs.insert(param.name.clone(), missing_id(param));
                case.expected_status = 404;
                case.rationale = format!("unknown '{}' yields 404", param.name);
            }
            (ScenarioCategory::DuplicateConflict, _) => {
                case.replay = true;
                case.expected_status = 409;
                case.rationale = "submitting an already-existing resource conflicts".to_string();
            }
            (ScenarioCategory::CreativeSecurity, _) => creative_security(endpoint, &mut case, validation),
            (
                ScenarioCategory::MissingRequiredParam
                | ScenarioCategory::BelowMinimum
                | ScenarioCategory::AboveMaximum
                | ScenarioCategory::WrongType,
                None,
            ) => return Err(unsupported()),
        }

        Ok(case)
    }
}

/// Canonical values for every declared parameter
pub fn canonical_inputs(endpoint: &EndpointSpec) -> BTreeMap<String, Value> {
    endpoint
        .parameters
        .iter()
        .map(|p| (p.name.clone(), canonical(p)))
        .collect()
}

/// Declared 422, else declared 400, else conventional 422
pub fn validation_status(endpoint: &EndpointSpec) -> u16 {
    endpoint.declared_or(&[422, 400], 422)
}

fn creative_security(endpoint: &EndpointSpec, case: &mut TestCase, validation: u16) {
    let string_param = endpoint
        .parameters
        .iter()
        .find(|p| p.param_type == ParamType::String && p.location != ParamLocation::Path);

    if let Some(param) = string_param {
        case.parameter = Some(param.name.clone());
        case.inputs
            .insert(param.name.clone(), Value::String(SQL_INJECTION.to_string()));
        if param.restricts_content() {
            case.expected_status = validation;
            case.rationale = format!("SQL injection in constrained '{}' is rejected", param.name);
        } else {
            case.rationale = format!("SQL injection in '{}' is treated as data", param.name);
        }
    } else if endpoint.auth_required {
        case.credential = Credential::Malformed;
        case.expected_status = 401;
        case.rationale = "malformed bearer token is refused".to_string();
    } else {
        case.rationale = "baseline request with canonical inputs".to_string();
    }
}

fn shape_assertions(endpoint: &EndpointSpec, status: u16) -> Vec<BodyAssertion> {
    match endpoint.response(status).and_then(|r| r.shape.as_ref()) {
        Some(BodyShape::Array) => vec![BodyAssertion::new("$", Predicate::IsArray)],
        Some(BodyShape::Object {
            properties,
            required,
        }) => {
            let mut fields: Vec<&String> = required.iter().collect();
            for p in properties {
                if !fields.contains(&p) {
                    fields.push(p);
                }
            }
            fields
                .into_iter()
                .take(MAX_SHAPE_ASSERTIONS)
                .map(|f| BodyAssertion::new(&format!("$.{}", f), Predicate::Exists))
                .collect()
        }
        _ => Vec::new(),
    }
}

fn location(param: &Parameter) -> &'static str {
    match param.location {
        ParamLocation::Path => "path parameter",
        ParamLocation::Query => "query parameter",
        ParamLocation::Header => "header",
        ParamLocation::Body => "body field",
    }
}

fn type_name(t: ParamType) -> &'static str {
    match t {
        ParamType::Integer => "an integer",
        ParamType::Number => "a number",
        ParamType::String => "a string",
        ParamType::Boolean => "a boolean",
        ParamType::Array => "an array",
        ParamType::Object => "an object",
    }
}

fn abbreviate(value: &Value) -> String {
    match value {
        Value::String(s) if s.len() > 16 => format!("<{} chars>", s.chars().count()),
        Value::Array(items) => format!("<{} items>", items.len()),
        other => other.to_string(),
    }
}
