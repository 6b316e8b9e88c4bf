//! Template contexts: everything a test template needs, precomputed
//!
//! Templates only lay text out. Request URLs, headers and bodies are resolved
//! here so all six targets send byte-identical requests.

use crate::contract::{fill_template, EndpointSpec, ParamLocation};
use crate::error::{Error, Result};
use crate::testgen::{Predicate, TestCase};
use reqwest::Url;
use serde::Serialize;
use serde_json::{Map, Value};

/// Environment variables the emitted tests read credentials from
pub const USER_TOKEN_ENV: &str = "API_USER_TOKEN";
pub const ADMIN_TOKEN_ENV: &str = "API_ADMIN_TOKEN";

/// Authorization header value for the malformed credential
pub const MALFORMED_AUTHORIZATION: &str = "Bearer not-a-valid-token";

/// Placeholder origin for building relative URLs
const URL_BASE: &str = "http://gapgen.invalid";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HeaderContext {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct CaseContext {
    pub name: String,
    pub category: &'static str,
    pub harness_tag: &'static str,
    pub provenance: &'static str,
    pub description: String,
    pub method: &'static str,
    /// Path plus encoded query, relative to the base URL
    pub url: String,
    pub headers: Vec<HeaderContext>,
    /// `none`, `user`, `admin` or `malformed`
    pub credential: &'static str,
    /// JSON request body text
    pub body: Option<String>,
    pub expected_status: u16,
    pub replay: bool,
    /// Body must be a JSON array
    pub has_array_assertion: bool,
    /// Top-level properties the body must carry
    pub field_assertions: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct GroupContext {
    pub category: &'static str,
    pub harness_tag: &'static str,
    pub cases: Vec<CaseContext>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FileContext {
    pub tool: &'static str,
    pub version: &'static str,
    pub fingerprint: String,
    pub endpoint: String,
    pub summary: Option<String>,
    pub class_name: String,
    pub package: String,
    pub base_url_env: String,
    pub user_token_env: &'static str,
    pub admin_token_env: &'static str,
    pub malformed_authorization: &'static str,
    pub groups: Vec<GroupContext>,
    pub uses_json: bool,
}

impl FileContext {
    /// Regroup named cases (already in category order) into sections
    pub fn group(cases: Vec<CaseContext>) -> Vec<GroupContext> {
        let mut groups: Vec<GroupContext> = Vec::new();
        for case in cases {
            match groups.last_mut() {
                Some(group) if group.category == case.category => group.cases.push(case),
                _ => groups.push(GroupContext {
                    category: case.category,
                    harness_tag: case.harness_tag,
                    cases: vec![case],
                }),
            }
        }
        groups
    }
}

impl CaseContext {
    pub fn has_assertions(&self) -> bool {
        self.has_array_assertion || !self.field_assertions.is_empty()
    }

    pub fn new(case: &TestCase, endpoint: &EndpointSpec, name: String) -> Result<Self> {
        let request = RenderedRequest::build(case, endpoint)?;

        Ok(Self {
            name,
            category: case.category.label(),
            harness_tag: case.harness_tag().label(),
            provenance: case.provenance.label(),
            description: describe(case),
            method: case.endpoint.method.as_str(),
            url: request.url,
            headers: request.headers,
            credential: case.credential.label(),
            body: request.body,
            expected_status: case.expected_status,
            replay: case.replay,
            has_array_assertion: case
                .assertions
                .iter()
                .any(|a| a.predicate == Predicate::IsArray),
            field_assertions: case
                .assertions
                .iter()
                .filter(|a| a.predicate == Predicate::Exists)
                .filter_map(|a| a.field().map(str::to_string))
                .collect(),
        })
    }
}

fn describe(case: &TestCase) -> String {
    if case.rationale.is_empty() {
        format!("{} for {}", case.category, case.endpoint)
    } else {
        case.rationale.clone()
    }
}

/// The concrete request a case sends
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedRequest {
    pub url: String,
    pub headers: Vec<HeaderContext>,
    pub body: Option<String>,
}

impl RenderedRequest {
    pub fn build(case: &TestCase, endpoint: &EndpointSpec) -> Result<Self> {
        let path = fill_template(endpoint.path(), |name| case.inputs.get(name).map(scalar_text));

        let mut url = Url::parse(URL_BASE).map_err(|e| Error::Emit(e.to_string()))?;
        url.set_path(&path);

        let mut query: Vec<(String, String)> = Vec::new();
        let mut headers = Vec::new();
        let mut body_fields = Map::new();
        let mut raw_body = None;
        let body_params = endpoint
            .parameters
            .iter()
            .filter(|p| p.location == ParamLocation::Body)
            .count();

        for param in &endpoint.parameters {
            let Some(value) = case.inputs.get(&param.name) else {
                continue;
            };
            match param.location {
                ParamLocation::Path => {}
                ParamLocation::Query => match value {
                    Value::Array(items) => {
                        query.extend(items.iter().map(|v| (param.name.clone(), scalar_text(v))))
                    }
                    other => query.push((param.name.clone(), scalar_text(other))),
                },
                ParamLocation::Header => headers.push(HeaderContext {
                    name: param.name.clone(),
                    value: scalar_text(value),
                }),
                // A non-object body is modelled as one parameter named `body`
                ParamLocation::Body if param.name == "body" && body_params == 1 => {
                    raw_body = Some(value.clone());
                }
                ParamLocation::Body => {
                    body_fields.insert(param.name.clone(), value.clone());
                }
            }
        }

        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query.iter());
        }

        let body = match raw_body {
            Some(value) => Some(value),
            None if body_params > 0 || endpoint.method().has_body() => Some(Value::Object(body_fields)),
            None => None,
        };
        let body = body
            .map(|value| serde_json::to_string(&value))
            .transpose()?;

        let url = match url.query() {
            Some(q) => format!("{}?{}", url.path(), q),
            None => url.path().to_string(),
        };

        Ok(Self { url, headers, body })
    }
}

/// Text form of a value in a URL or header
fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract::{ContractModel, EndpointId, HttpMethod};
    use crate::gaps::Gap;
    use crate::scenario::ScenarioCategory;
    use crate::testgen::TemplateGenerator;
    use pretty_assertions::assert_eq;

    const CONTRACT: &str = r##"
paths:
  /orders/{orderId}:
    put:
      security: [ { bearerAuth: [] } ]
      parameters:
        - { name: orderId, in: path, required: true, schema: { type: integer } }
        - { name: dryRun, in: query, schema: { type: boolean } }
        - { name: X-Request-Id, in: header, schema: { type: string } }
      requestBody:
        content:
          application/json:
            schema:
              type: object
              required: [note]
              properties:
                note: { type: string, maxLength: 20 }
      responses:
        "200": { description: ok }
"##;

    fn endpoint() -> EndpointSpec {
        ContractModel::from_document(CONTRACT)
            .unwrap()
            .get(&EndpointId::new("/orders/{orderId}", HttpMethod::Put))
            .unwrap()
            .clone()
    }

    fn case(category: ScenarioCategory, parameter: Option<&str>) -> TestCase {
        let endpoint = endpoint();
        TemplateGenerator::new()
            .generate(&Gap::new(endpoint.id.clone(), category, parameter), &endpoint)
            .unwrap()
    }

    #[test]
    fn test_happy_request() {
        let request = RenderedRequest::build(&case(ScenarioCategory::HappyPath, None), &endpoint()).unwrap();
        assert_eq!(request.url, "/orders/1?dryRun=true");
        assert_eq!(
            request.headers,
            vec![HeaderContext {
                name: "X-Request-Id".into(),
                value: "sample".into()
            }]
        );
        assert_eq!(request.body.as_deref(), Some(r#"{"note":"sample"}"#));
    }

    #[test]
    fn test_missing_body_field_keeps_object() {
        let request = RenderedRequest::build(
            &case(ScenarioCategory::MissingRequiredParam, Some("note")),
            &endpoint(),
        )
        .unwrap();
        assert_eq!(request.body.as_deref(), Some("{}"));
    }

    #[test]
    fn test_query_values_are_encoded() {
        let mut c = case(ScenarioCategory::HappyPath, None);
        c.inputs
            .insert("dryRun".into(), Value::String("' OR '1'='1' --".into()));
        let request = RenderedRequest::build(&c, &endpoint()).unwrap();
        assert_eq!(request.url, "/orders/1?dryRun=%27+OR+%271%27%3D%271%27+--");
    }

    #[test]
    fn test_not_found_uses_missing_id() {
        let c = case(ScenarioCategory::NotFound, None);
        let ctx = CaseContext::new(&c, &endpoint(), "x".into()).unwrap();
        assert!(ctx.url.starts_with("/orders/999999"));
        assert_eq!(ctx.credential, "user");
        assert_eq!(ctx.expected_status, 404);
        assert_eq!(ctx.harness_tag, "negative");
    }

    #[test]
    fn test_grouping_is_contiguous() {
        let e = endpoint();
        let cases: Vec<CaseContext> = [
            case(ScenarioCategory::HappyPath, None),
            case(ScenarioCategory::AboveMaximum, Some("note")),
            case(ScenarioCategory::Unauthorized, None),
        ]
        .iter()
        .enumerate()
        .map(|(i, c)| CaseContext::new(c, &e, format!("t{}", i)).unwrap())
        .collect();
        let groups = FileContext::group(cases);
        let labels: Vec<_> = groups.iter().map(|g| g.category).collect();
        assert_eq!(labels, vec!["happy_path", "above_maximum", "unauthorized"]);
    }
}
