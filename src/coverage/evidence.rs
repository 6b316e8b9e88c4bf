//! Evidence extraction from a single test function
//!
//! Best-effort regex matching over source text: call sites, asserted
//! statuses, body assertions, credentials, malformed literals. Nothing is
//! compiled or executed.

use super::rules::{compile_patterns, MatcherConfig};
use crate::contract::{normalize_path, ContractModel, EndpointId, HttpMethod};
use crate::error::Result;
use crate::util;
use regex::{Captures, Regex};
use std::sync::OnceLock;

/// An HTTP request observed in test code
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallSite {
    pub method: HttpMethod,
    /// Canonicalized request path (unresolved segments become `{p}`)
    pub path: String,
}

/// Everything the classifier knows about one test function
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Evidence {
    /// snake_case test name
    pub name: String,
    /// Calls in source order
    pub calls: Vec<CallSite>,
    /// Asserted statuses in source order, deduplicated
    pub statuses: Vec<u16>,
    pub has_body_assertion: bool,
    pub has_auth: bool,
    pub invalid_literal: bool,
    /// Explicit skip/TODO marker
    pub marked_placeholder: bool,
    /// Primary endpoint once resolved against the contract
    pub endpoint: Option<EndpointId>,
}

impl Evidence {
    /// Stub tests earn no credit
    pub fn is_placeholder(&self) -> bool {
        self.marked_placeholder || (self.statuses.is_empty() && !self.has_body_assertion)
    }

    /// Resolve call sites; the last resolved call is the action under test
    pub fn resolve(&mut self, model: &ContractModel) {
        self.endpoint = self
            .calls
            .iter()
            .rev()
            .find_map(|call| model.resolve(call.method, &call.path))
            .cloned();
    }
}

/// Compiled pattern tables
#[derive(Debug, Clone)]
pub struct EvidenceExtractor {
    calls: Vec<Regex>,
    statuses: Vec<Regex>,
    body_assertions: Vec<Regex>,
    auth: Vec<Regex>,
    invalid_literals: Vec<Regex>,
    placeholders: Vec<Regex>,
}

impl EvidenceExtractor {
    pub fn new(config: &MatcherConfig) -> Result<Self> {
        Ok(Self {
            calls: compile_patterns("call", &config.call_patterns)?,
            statuses: compile_patterns("status", &config.status_patterns)?,
            body_assertions: compile_patterns("body assertion", &config.body_assertion_patterns)?,
            auth: compile_patterns("auth", &config.auth_patterns)?,
            invalid_literals: compile_patterns("invalid literal", &config.invalid_literal_patterns)?,
            placeholders: compile_patterns("placeholder", &config.placeholder_patterns)?,
        })
    }

    /// Extract evidence from a test function's source text
    pub fn extract(&self, name: &str, text: &str) -> Evidence {
        // The test name itself must not count as evidence
        let body = if name.is_empty() {
            text.to_string()
        } else {
            text.replace(name, "")
        };

        Evidence {
            name: util::to_snake_case(name),
            calls: self.call_sites(&body),
            statuses: self.asserted_statuses(&body),
            has_body_assertion: any_match(&self.body_assertions, &body),
            has_auth: any_match(&self.auth, &body),
            invalid_literal: any_match(&self.invalid_literals, &body),
            marked_placeholder: any_match(&self.placeholders, &body),
            endpoint: None,
        }
    }

    fn call_sites(&self, text: &str) -> Vec<CallSite> {
        let mut found: Vec<(usize, CallSite)> = Vec::new();
        for re in &self.calls {
            for caps in re.captures_iter(text) {
                let Some(path) = caps.name("path") else {
                    continue;
                };
                let method = caps
                    .name("method")
                    .and_then(|m| m.as_str().parse::<HttpMethod>().ok())
                    .unwrap_or(HttpMethod::Get);
                let offset = caps.get(0).map(|m| m.start()).unwrap_or(0);
                if found.iter().any(|(o, _)| *o == offset) {
                    continue;
                }
                found.push((
                    offset,
                    CallSite {
                        method,
                        path: clean_request_path(path.as_str(), caps.name("concat").is_some()),
                    },
                ));
            }
        }
        found.sort_by_key(|(offset, _)| *offset);
        found.into_iter().map(|(_, call)| call).collect()
    }

    fn asserted_statuses(&self, text: &str) -> Vec<u16> {
        let mut found: Vec<(usize, u16)> = Vec::new();
        for re in &self.statuses {
            for caps in re.captures_iter(text) {
                if let Some(status) = status_of(&caps) {
                    let offset = caps.get(0).map(|m| m.start()).unwrap_or(0);
                    found.push((offset, status));
                }
            }
        }
        found.sort_by_key(|(offset, _)| *offset);

        let mut statuses = Vec::new();
        for (_, status) in found {
            if !statuses.contains(&status) {
                statuses.push(status);
            }
        }
        statuses
    }
}

fn any_match(patterns: &[Regex], text: &str) -> bool {
    patterns.iter().any(|re| re.is_match(text))
}

fn status_of(caps: &Captures<'_>) -> Option<u16> {
    if let Some(numeric) = caps.name("status") {
        return numeric.as_str().parse().ok();
    }
    let name = util::to_upper_snake_case(caps.name("status_name")?.as_str());
    let status = match name.as_str() {
        "OK" => 200,
        "CREATED" => 201,
        "ACCEPTED" => 202,
        "NO_CONTENT" => 204,
        "BAD_REQUEST" => 400,
        "UNAUTHORIZED" => 401,
        "FORBIDDEN" => 403,
        "NOT_FOUND" => 404,
        "METHOD_NOT_ALLOWED" => 405,
        "CONFLICT" => 409,
        "UNPROCESSABLE_ENTITY" => 422,
        "TOO_MANY_REQUESTS" => 429,
        "INTERNAL_SERVER_ERROR" => 500,
        _ => return None,
    };
    Some(status)
}

fn interpolation() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\$\{[^}]*\}|\{\}|%[sdv]").expect("valid regex"))
}

fn scheme_and_host() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Za-z][A-Za-z0-9+.\-]*://[^/]*").expect("valid regex"))
}

/// Reduce a path literal from test code to something template-matchable
///
/// Base-URL prefixes and query strings are dropped; interpolations become
/// `{p}`; a literal ending in `/` followed by concatenation gets a trailing
/// wildcard segment.
pub fn clean_request_path(raw: &str, concatenated: bool) -> String {
    let mut path = interpolation().replace_all(raw.trim(), "{p}").into_owned();
    path = scheme_and_host().replace(&path, "").into_owned();

    if !path.starts_with('/') {
        if let Some(slash) = path.find('/') {
            path = path[slash..].to_string();
        }
    }
    if let Some(cut) = path.find(['?', '#']) {
        path.truncate(cut);
    }
    if concatenated && path.ends_with('/') {
        path.push_str("{p}");
    }
    normalize_path(&path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn extractor() -> EvidenceExtractor {
        EvidenceExtractor::new(MatcherConfig::builtin()).unwrap()
    }

    #[rstest]
    #[case("/orders/", true, "/orders/{p}")]
    #[case("/orders", true, "/orders")]
    #[case("http://localhost:8000/products?page=1", false, "/products")]
    #[case("{BASE_URL}/orders/{order_id}", false, "/orders/{order_id}")]
    #[case("${baseUrl}/cart/items/${id}", false, "/cart/items/{p}")]
    #[case("{}/orders/{}", false, "/orders/{p}")]
    #[case("products", false, "/products")]
    fn test_clean_request_path(#[case] raw: &str, #[case] concat: bool, #[case] expected: &str) {
        assert_eq!(clean_request_path(raw, concat), expected);
    }

    #[test]
    fn test_rest_assured_evidence() {
        let text = r#"
    @Test
    public void testDeleteOrder_NotFound_404() {
        given().header("Authorization", "Bearer " + token)
            .when().delete("/orders/" + 999999)
            .then().statusCode(404);
    }"#;
        let ev = extractor().extract("testDeleteOrder_NotFound_404", text);
        assert_eq!(ev.name, "test_delete_order_not_found_404");
        assert_eq!(
            ev.calls,
            vec![CallSite {
                method: HttpMethod::Delete,
                path: "/orders/{p}".into()
            }]
        );
        assert_eq!(ev.statuses, vec![404]);
        assert!(ev.has_auth);
        assert!(!ev.is_placeholder());
    }

    #[test]
    fn test_pytest_evidence() {
        let text = r#"
def test_list_products_page_zero(client):
    resp = client.get(f"{BASE_URL}/products?page=0")
    assert resp.status_code == 422
    assert "detail" in resp.json()
"#;
        let ev = extractor().extract("test_list_products_page_zero", text);
        assert_eq!(ev.calls[0].path, "/products");
        assert_eq!(ev.statuses, vec![422]);
        assert!(ev.has_body_assertion);
        assert!(!ev.has_auth);
    }

    #[test]
    fn test_symbolic_statuses() {
        let text = "assert_eq!(resp.status(), StatusCode::NOT_FOUND);\nif r.StatusCode != http.StatusCreated {}";
        let ev = extractor().extract("", text);
        assert_eq!(ev.statuses, vec![404, 201]);
    }

    #[test]
    fn test_fetch_with_method_option() {
        let text = "const res = await fetch(`${base}/orders/${id}`, { method: 'DELETE' });\nexpect(res.status).toBe(204);";
        let ev = extractor().extract("deletes an order", text);
        assert_eq!(ev.calls[0].method, HttpMethod::Delete);
        assert_eq!(ev.calls[0].path, "/orders/{p}");
        assert_eq!(ev.statuses, vec![204]);
    }

    #[test]
    fn test_no_assertions_is_placeholder() {
        let text = "void testGetCart() { given().get(\"/cart\"); }";
        let ev = extractor().extract("testGetCart", text);
        assert!(ev.is_placeholder());
    }

    #[test]
    fn test_skip_marker_is_placeholder() {
        let text = "def test_cart():\n    pytest.skip('later')\n    assert client.get('/cart').status_code == 200\n";
        let ev = extractor().extract("test_cart", text);
        assert!(ev.is_placeholder());
    }
}
