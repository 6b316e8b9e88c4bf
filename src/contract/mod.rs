//! Contract model: the canonical representation of an API contract
//!
//! An [`EndpointSpec`] is identified by its canonical path template and HTTP
//! method. The model is immutable once built; every later stage takes it by
//! shared reference.
//!
//! ## Example contract (OpenAPI, YAML)
//!
//! ```yaml
//! openapi: 3.0.3
//! paths:
//!   /products:
//!     get:
//!       tags: [Products]
//!       parameters:
//!         - name: page
//!           in: query
//!           required: true
//!           schema: { type: integer, minimum: 1, maximum: 100 }
//!       responses:
//!         "200": { description: OK }
//! ```

mod extract;
mod path;

pub use extract::SpecExtractor;
pub use path::{fill_template, matches_template, normalize_path, path_params, segments, Segment};

use crate::error::Result;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::str::FromStr;

/// Error statuses a test may expect when the contract is silent
pub const CONVENTIONAL_ERROR_STATUSES: [u16; 7] = [400, 401, 403, 404, 409, 422, 500];

/// HTTP method
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
    Head,
    Options,
    Trace,
}

impl HttpMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Delete => "DELETE",
            HttpMethod::Head => "HEAD",
            HttpMethod::Options => "OPTIONS",
            HttpMethod::Trace => "TRACE",
        }
    }

    /// Whether requests with this method conventionally carry a body
    pub fn has_body(self) -> bool {
        matches!(self, HttpMethod::Post | HttpMethod::Put | HttpMethod::Patch)
    }
}

impl std::fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HttpMethod {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "get" => Ok(HttpMethod::Get),
            "post" => Ok(HttpMethod::Post),
            "put" => Ok(HttpMethod::Put),
            "patch" => Ok(HttpMethod::Patch),
            "delete" => Ok(HttpMethod::Delete),
            "head" => Ok(HttpMethod::Head),
            "options" => Ok(HttpMethod::Options),
            "trace" => Ok(HttpMethod::Trace),
            other => Err(format!("unknown HTTP method: {}", other)),
        }
    }
}

/// Endpoint identity: canonical path template + method
///
/// Serialized as `"METHOD /path"` so it can key JSON maps.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct EndpointId {
    pub path: String,
    pub method: HttpMethod,
}

impl EndpointId {
    /// Create an identity, normalizing the path template
    pub fn new(path: &str, method: HttpMethod) -> Self {
        Self {
            path: normalize_path(path),
            method,
        }
    }
}

impl std::fmt::Display for EndpointId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.method, self.path)
    }
}

impl From<EndpointId> for String {
    fn from(id: EndpointId) -> Self {
        id.to_string()
    }
}

impl TryFrom<String> for EndpointId {
    type Error = String;

    fn try_from(s: String) -> std::result::Result<Self, Self::Error> {
        let (method, path) = s
            .trim()
            .split_once(' ')
            .ok_or_else(|| format!("invalid endpoint identity: {}", s))?;
        Ok(EndpointId::new(path, method.parse()?))
    }
}

impl JsonSchema for EndpointId {
    fn schema_name() -> std::borrow::Cow<'static, str> {
        "EndpointId".into()
    }

    fn json_schema(generator: &mut schemars::SchemaGenerator) -> schemars::Schema {
        String::json_schema(generator)
    }
}

/// Where a parameter travels in the request
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "lowercase")]
pub enum ParamLocation {
    Path,
    Query,
    Header,
    Body,
}

/// JSON type of a parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum ParamType {
    Integer,
    Number,
    String,
    Boolean,
    Array,
    Object,
}

impl ParamType {
    pub fn from_schema_type(s: &str) -> Option<ParamType> {
        match s {
            "integer" => Some(ParamType::Integer),
            "number" => Some(ParamType::Number),
            "string" => Some(ParamType::String),
            "boolean" => Some(ParamType::Boolean),
            "array" => Some(ParamType::Array),
            "object" => Some(ParamType::Object),
            _ => None,
        }
    }

    pub fn is_numeric(self) -> bool {
        matches!(self, ParamType::Integer | ParamType::Number)
    }

    /// Whether a JSON value has this type
    pub fn accepts(self, value: &serde_json::Value) -> bool {
        use serde_json::Value;
        match (self, value) {
            (ParamType::Integer, Value::Number(n)) => n.is_i64() || n.is_u64(),
            (ParamType::Number, Value::Number(_)) => true,
            (ParamType::String, Value::String(_)) => true,
            (ParamType::Boolean, Value::Bool(_)) => true,
            (ParamType::Array, Value::Array(_)) => true,
            (ParamType::Object, Value::Object(_)) => true,
            _ => false,
        }
    }
}

/// Declared numeric, length and item bounds (inclusive unless flagged)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Bounds {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minimum: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maximum: Option<f64>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub exclusive_minimum: bool,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub exclusive_maximum: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_length: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_length: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_items: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_items: Option<u64>,
}

impl Bounds {
    pub fn is_empty(&self) -> bool {
        self.minimum.is_none()
            && self.maximum.is_none()
            && self.min_length.is_none()
            && self.max_length.is_none()
            && self.min_items.is_none()
            && self.max_items.is_none()
    }
}

/// A declared request parameter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Parameter {
    pub name: String,
    pub location: ParamLocation,
    #[serde(rename = "type")]
    pub param_type: ParamType,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Bounds::is_empty")]
    pub bounds: Bounds,
    #[serde(default, rename = "enum", skip_serializing_if = "Vec::is_empty")]
    pub enum_values: Vec<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<serde_json::Value>,
    /// Item type for arrays
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub item_type: Option<ParamType>,
}

impl Parameter {
    /// A required string parameter with no constraints
    pub fn simple(name: &str, location: ParamLocation, param_type: ParamType) -> Self {
        Self {
            name: name.to_string(),
            location,
            param_type,
            required: true,
            bounds: Bounds::default(),
            enum_values: Vec::new(),
            format: None,
            default: None,
            item_type: None,
        }
    }

    pub fn has_lower_bound(&self) -> bool {
        match self.param_type {
            ParamType::Integer | ParamType::Number => self.bounds.minimum.is_some(),
            // A zero length/item minimum cannot be undercut
            ParamType::String => self.bounds.min_length.is_some_and(|n| n > 0),
            ParamType::Array => self.bounds.min_items.is_some_and(|n| n > 0),
            _ => false,
        }
    }

    pub fn has_upper_bound(&self) -> bool {
        match self.param_type {
            ParamType::Integer | ParamType::Number => self.bounds.maximum.is_some(),
            ParamType::String => self.bounds.max_length.is_some(),
            ParamType::Array => self.bounds.max_items.is_some(),
            _ => false,
        }
    }

    /// Whether a value of the wrong JSON type is distinguishable
    pub fn is_type_checked(&self) -> bool {
        self.param_type != ParamType::String
    }

    /// Carries at least one constraint that implies a scenario category
    pub fn is_constrained(&self) -> bool {
        self.required || self.has_lower_bound() || self.has_upper_bound() || self.is_type_checked()
    }

    /// Whether a string parameter restricts its content
    pub fn restricts_content(&self) -> bool {
        !self.enum_values.is_empty()
            || self.format.is_some()
            || self.bounds.min_length.is_some()
            || self.bounds.max_length.is_some()
    }
}

/// Simplified shape of a declared response body
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum BodyShape {
    Object {
        #[serde(default)]
        properties: Vec<String>,
        #[serde(default)]
        required: Vec<String>,
    },
    Array,
    Scalar,
}

/// A declared response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ResponseSpec {
    pub status: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shape: Option<BodyShape>,
}

/// A single contract endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct EndpointSpec {
    pub id: EndpointId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operation_id: Option<String>,
    #[serde(default)]
    pub parameters: Vec<Parameter>,
    /// Sorted by status
    #[serde(default)]
    pub responses: Vec<ResponseSpec>,
    #[serde(default)]
    pub auth_required: bool,
    #[serde(default)]
    pub admin_only: bool,
    #[serde(default)]
    pub tags: BTreeSet<String>,
}

impl EndpointSpec {
    pub fn path(&self) -> &str {
        &self.id.path
    }

    pub fn method(&self) -> HttpMethod {
        self.id.method
    }

    pub fn parameter(&self, name: &str) -> Option<&Parameter> {
        self.parameters.iter().find(|p| p.name == name)
    }

    pub fn declared_statuses(&self) -> BTreeSet<u16> {
        self.responses.iter().map(|r| r.status).collect()
    }

    pub fn declares(&self, status: u16) -> bool {
        self.responses.iter().any(|r| r.status == status)
    }

    pub fn response(&self, status: u16) -> Option<&ResponseSpec> {
        self.responses.iter().find(|r| r.status == status)
    }

    /// Path parameters in template order
    pub fn path_parameters(&self) -> Vec<&Parameter> {
        path_params(&self.id.path)
            .into_iter()
            .filter_map(|name| self.parameter(name))
            .collect()
    }

    pub fn has_path_identifier(&self) -> bool {
        !path_params(&self.id.path).is_empty()
    }

    /// Smallest declared 2xx status, falling back to the method convention
    pub fn success_status(&self) -> u16 {
        self.responses
            .iter()
            .map(|r| r.status)
            .find(|s| (200..300).contains(s))
            .unwrap_or(match self.id.method {
                HttpMethod::Post => 201,
                HttpMethod::Delete => 204,
                _ => 200,
            })
    }

    /// The declared status if present, else the conventional one
    pub fn declared_or(&self, preferred: &[u16], conventional: u16) -> u16 {
        preferred
            .iter()
            .copied()
            .find(|s| self.declares(*s))
            .unwrap_or(conventional)
    }

    /// Whether a test may expect this status from the endpoint
    pub fn allows_status(&self, status: u16) -> bool {
        self.declares(status)
            || CONVENTIONAL_ERROR_STATUSES.contains(&status)
            || status == self.success_status()
    }
}

/// The canonical in-memory contract
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct ContractModel {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    /// Hash of the source document
    pub fingerprint: String,
    pub endpoints: BTreeMap<EndpointId, EndpointSpec>,
}

impl ContractModel {
    /// Parse a contract document (OpenAPI JSON or YAML)
    pub fn from_document(text: &str) -> Result<Self> {
        SpecExtractor::new().extract(text)
    }

    pub fn get(&self, id: &EndpointId) -> Option<&EndpointSpec> {
        self.endpoints.get(id)
    }

    pub fn endpoints(&self) -> impl Iterator<Item = &EndpointSpec> {
        self.endpoints.values()
    }

    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }

    /// Resolve a request observed in test code to an endpoint identity
    ///
    /// When several templates match, the one with the most literal segments
    /// wins (`/orders/mine` beats `/orders/{orderId}`).
    pub fn resolve(&self, method: HttpMethod, request_path: &str) -> Option<&EndpointId> {
        self.endpoints
            .keys()
            .filter(|id| id.method == method && matches_template(&id.path, request_path))
            .max_by_key(|id| {
                let literal = segments(&id.path)
                    .iter()
                    .filter(|s| matches!(s, Segment::Literal(_)))
                    .count();
                // Reverse lexical order on ties so the smallest path wins max_by_key
                (literal, std::cmp::Reverse(id.path.clone()))
            })
    }

    /// Consistency warnings (never fatal)
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        for endpoint in self.endpoints() {
            let template_params = path_params(&endpoint.id.path);
            for param in &endpoint.parameters {
                if param.location == ParamLocation::Path
                    && !template_params.contains(&param.name.as_str())
                {
                    warnings.push(format!(
                        "{}: path parameter '{}' does not appear in the template",
                        endpoint.id, param.name
                    ));
                }
                if let (Some(min), Some(max)) = (param.bounds.minimum, param.bounds.maximum) {
                    if min > max {
                        warnings.push(format!(
                            "{}: parameter '{}' has minimum {} above maximum {}",
                            endpoint.id, param.name, min, max
                        ));
                    }
                }
                if let (Some(min), Some(max)) = (param.bounds.min_length, param.bounds.max_length) {
                    if min > max {
                        warnings.push(format!(
                            "{}: parameter '{}' has minLength {} above maxLength {}",
                            endpoint.id, param.name, min, max
                        ));
                    }
                }
            }
            if !endpoint.responses.iter().any(|r| (200..300).contains(&r.status)) {
                warnings.push(format!("{}: no 2xx response declared", endpoint.id));
            }
        }

        warnings
    }
}
