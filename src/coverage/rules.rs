//! Matcher configuration and the CEL rule table
//!
//! The defaults ship embedded (`rules/default_matchers.yaml`); a config file
//! may replace any list. Rules are validated and ordered once at load time.

use crate::cel::{CelCompiler, CelValue};
use crate::error::{Error, Result};
use crate::scenario::ScenarioCategory;
use regex::Regex;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

use super::evidence::Evidence;

const DEFAULT_MATCHERS: &str = include_str!("../../rules/default_matchers.yaml");

/// Variables bound when a rule condition is evaluated
pub const EVIDENCE_VARIABLES: [&str; 8] = [
    "name",
    "status",
    "statuses",
    "method",
    "path",
    "has_auth",
    "has_body_assertion",
    "invalid_literal",
];

/// One classification rule: CEL condition → scenario category
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct MatcherRule {
    pub name: String,
    /// CEL condition over the evidence variables
    pub when: String,
    /// Target scenario category label
    pub category: String,
    #[serde(default = "default_priority")]
    pub priority: i32,
}

fn default_priority() -> i32 {
    50
}

/// Pattern tables driving evidence extraction and classification
///
/// Any list left out of a config file keeps its embedded default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct MatcherConfig {
    #[serde(default = "defaults::rules")]
    pub rules: Vec<MatcherRule>,
    #[serde(default = "defaults::call_patterns")]
    pub call_patterns: Vec<String>,
    #[serde(default = "defaults::status_patterns")]
    pub status_patterns: Vec<String>,
    #[serde(default = "defaults::body_assertion_patterns")]
    pub body_assertion_patterns: Vec<String>,
    #[serde(default = "defaults::auth_patterns")]
    pub auth_patterns: Vec<String>,
    #[serde(default = "defaults::invalid_literal_patterns")]
    pub invalid_literal_patterns: Vec<String>,
    #[serde(default = "defaults::placeholder_patterns")]
    pub placeholder_patterns: Vec<String>,
}

/// The embedded file, every table required
#[derive(Debug, Deserialize)]
struct EmbeddedMatchers {
    rules: Vec<MatcherRule>,
    call_patterns: Vec<String>,
    status_patterns: Vec<String>,
    body_assertion_patterns: Vec<String>,
    auth_patterns: Vec<String>,
    invalid_literal_patterns: Vec<String>,
    placeholder_patterns: Vec<String>,
}

fn embedded() -> &'static EmbeddedMatchers {
    static EMBEDDED: OnceLock<EmbeddedMatchers> = OnceLock::new();
    EMBEDDED.get_or_init(|| {
        serde_norway::from_str(DEFAULT_MATCHERS).expect("embedded default_matchers.yaml is valid")
    })
}

mod defaults {
    use super::{embedded, MatcherRule};

    pub fn rules() -> Vec<MatcherRule> {
        embedded().rules.clone()
    }
    pub fn call_patterns() -> Vec<String> {
        embedded().call_patterns.clone()
    }
    pub fn status_patterns() -> Vec<String> {
        embedded().status_patterns.clone()
    }
    pub fn body_assertion_patterns() -> Vec<String> {
        embedded().body_assertion_patterns.clone()
    }
    pub fn auth_patterns() -> Vec<String> {
        embedded().auth_patterns.clone()
    }
    pub fn invalid_literal_patterns() -> Vec<String> {
        embedded().invalid_literal_patterns.clone()
    }
    pub fn placeholder_patterns() -> Vec<String> {
        embedded().placeholder_patterns.clone()
    }
}

impl MatcherConfig {
    /// The embedded default tables
    pub fn builtin() -> &'static MatcherConfig {
        static BUILTIN: OnceLock<MatcherConfig> = OnceLock::new();
        BUILTIN.get_or_init(|| MatcherConfig {
            rules: defaults::rules(),
            call_patterns: defaults::call_patterns(),
            status_patterns: defaults::status_patterns(),
            body_assertion_patterns: defaults::body_assertion_patterns(),
            auth_patterns: defaults::auth_patterns(),
            invalid_literal_patterns: defaults::invalid_literal_patterns(),
            placeholder_patterns: defaults::placeholder_patterns(),
        })
    }
}

impl Default for MatcherConfig {
    fn default() -> Self {
        Self::builtin().clone()
    }
}

/// A rule after validation, ready to evaluate
#[derive(Debug, Clone)]
pub struct CompiledRule {
    pub name: String,
    pub when: String,
    pub category: ScenarioCategory,
    pub priority: i32,
    /// Distinct evidence variables the condition references
    pub specificity: usize,
}

/// Ordered, validated rule table
#[derive(Debug, Clone)]
pub struct RuleTable {
    rules: Vec<CompiledRule>,
}

impl RuleTable {
    /// Validate and order rules: priority ascending, specificity descending,
    /// then declaration order
    pub fn compile(rules: &[MatcherRule]) -> Result<Self> {
        let mut compiled = Vec::with_capacity(rules.len());
        for rule in rules {
            if !CelCompiler::is_valid(&rule.when) {
                return Err(Error::Config(format!(
                    "matcher rule '{}': invalid CEL condition: {}",
                    rule.name, rule.when
                )));
            }
            let category: ScenarioCategory = rule.category.parse().map_err(|e| {
                Error::Config(format!("matcher rule '{}': {}", rule.name, e))
            })?;
            let specificity = CelCompiler::extract_variables(&rule.when)?
                .iter()
                .filter(|v| EVIDENCE_VARIABLES.contains(&v.as_str()))
                .count();

            compiled.push(CompiledRule {
                name: rule.name.clone(),
                when: rule.when.clone(),
                category,
                priority: rule.priority,
                specificity,
            });
        }

        // Stable sort keeps declaration order for full ties
        compiled.sort_by(|a, b| {
            a.priority
                .cmp(&b.priority)
                .then(b.specificity.cmp(&a.specificity))
        });

        Ok(Self { rules: compiled })
    }

    pub fn rules(&self) -> &[CompiledRule] {
        &self.rules
    }

    /// First matching rule wins; `None` means no confident classification
    pub fn classify(&self, evidence: &Evidence) -> Option<&CompiledRule> {
        let vars = bindings(evidence);
        self.rules.iter().find(|rule| {
            match CelCompiler::eval_bool(&rule.when, &vars) {
                Ok(matched) => matched,
                Err(e) => {
                    tracing::debug!(rule = %rule.name, error = %e, "matcher rule did not evaluate");
                    false
                }
            }
        })
    }
}

fn bindings(evidence: &Evidence) -> HashMap<String, CelValue> {
    let statuses: Vec<CelValue> = evidence
        .statuses
        .iter()
        .map(|s| CelValue::Int(i64::from(*s)))
        .collect();

    let mut vars = HashMap::new();
    vars.insert("name".to_string(), CelValue::String(Arc::new(evidence.name.clone())));
    vars.insert(
        "status".to_string(),
        CelValue::Int(evidence.statuses.first().copied().map(i64::from).unwrap_or(0)),
    );
    vars.insert("statuses".to_string(), CelValue::List(Arc::new(statuses)));
    vars.insert(
        "method".to_string(),
        CelValue::String(Arc::new(
            evidence
                .endpoint
                .as_ref()
                .map(|e| e.method.to_string())
                .unwrap_or_default(),
        )),
    );
    vars.insert(
        "path".to_string(),
        CelValue::String(Arc::new(
            evidence
                .endpoint
                .as_ref()
                .map(|e| e.path.clone())
                .unwrap_or_default(),
        )),
    );
    vars.insert("has_auth".to_string(), CelValue::Bool(evidence.has_auth));
    vars.insert(
        "has_body_assertion".to_string(),
        CelValue::Bool(evidence.has_body_assertion),
    );
    vars.insert(
        "invalid_literal".to_string(),
        CelValue::Bool(evidence.invalid_literal),
    );
    vars
}

/// Compile a named pattern list, reporting the offending entry
pub(crate) fn compile_patterns(kind: &str, patterns: &[String]) -> Result<Vec<Regex>> {
    patterns
        .iter()
        .map(|p| {
            Regex::new(p).map_err(|e| Error::Config(format!("invalid {} pattern '{}': {}", kind, p, e)))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract::{EndpointId, HttpMethod};
    use rstest::rstest;

    fn evidence(name: &str, statuses: &[u16]) -> Evidence {
        Evidence {
            name: name.to_string(),
            statuses: statuses.to_vec(),
            endpoint: Some(EndpointId::new("/orders/{orderId}", HttpMethod::Get)),
            ..Evidence::default()
        }
    }

    fn table() -> RuleTable {
        RuleTable::compile(&MatcherConfig::builtin().rules).unwrap()
    }

    #[test]
    fn test_builtin_config_loads() {
        let config = MatcherConfig::builtin();
        assert!(!config.rules.is_empty());
        assert!(!config.call_patterns.is_empty());
        for (kind, list) in [
            ("call", &config.call_patterns),
            ("status", &config.status_patterns),
            ("body", &config.body_assertion_patterns),
            ("auth", &config.auth_patterns),
            ("invalid", &config.invalid_literal_patterns),
            ("placeholder", &config.placeholder_patterns),
        ] {
            compile_patterns(kind, list).unwrap();
        }
    }

    #[test]
    fn test_partial_override_keeps_other_defaults() {
        let yaml = "rules:\n  - { name: only, when: 'status == 200', category: happy_path }\n";
        let config: MatcherConfig = serde_norway::from_str(yaml).unwrap();
        assert_eq!(config.rules.len(), 1);
        assert_eq!(config.rules[0].priority, 50);
        assert_eq!(config.call_patterns, MatcherConfig::builtin().call_patterns);
    }

    #[rstest]
    #[case("test_get_order_returns_order", &[200], Some(ScenarioCategory::HappyPath))]
    #[case("test_get_order_unknown", &[404], Some(ScenarioCategory::NotFound))]
    #[case("test_get_order_without_token", &[401], Some(ScenarioCategory::Unauthorized))]
    #[case("test_get_order_as_user", &[403], Some(ScenarioCategory::ForbiddenRole))]
    #[case("test_page_below_minimum", &[422], Some(ScenarioCategory::BelowMinimum))]
    #[case("test_page_exceeds_limit", &[400], Some(ScenarioCategory::AboveMaximum))]
    #[case("test_missing_page", &[422], Some(ScenarioCategory::MissingRequiredParam))]
    #[case("test_sql_injection_in_name", &[200], Some(ScenarioCategory::CreativeSecurity))]
    #[case("test_bad_request", &[400], None)]
    #[case("test_teapot", &[418], None)]
    fn test_default_classification(
        #[case] name: &str,
        #[case] statuses: &[u16],
        #[case] expected: Option<ScenarioCategory>,
    ) {
        let table = table();
        let got = table.classify(&evidence(name, statuses)).map(|r| r.category);
        assert_eq!(got, expected, "{}", name);
    }

    #[test]
    fn test_invalid_literal_maps_to_wrong_type() {
        let mut ev = evidence("test_get_order_bad_id", &[422]);
        ev.invalid_literal = true;
        assert_eq!(
            table().classify(&ev).map(|r| r.category),
            Some(ScenarioCategory::WrongType)
        );
    }

    #[test]
    fn test_ordering_priority_then_specificity_then_declaration() {
        let rules = vec![
            MatcherRule {
                name: "broad".into(),
                when: "status == 404".into(),
                category: "not_found".into(),
                priority: 10,
            },
            MatcherRule {
                name: "narrow".into(),
                when: "status == 404 && has_auth".into(),
                category: "forbidden_role".into(),
                priority: 10,
            },
            MatcherRule {
                name: "first".into(),
                when: "status == 200".into(),
                category: "happy_path".into(),
                priority: 1,
            },
            MatcherRule {
                name: "broad-twin".into(),
                when: "status == 405".into(),
                category: "not_found".into(),
                priority: 10,
            },
        ];
        let table = RuleTable::compile(&rules).unwrap();
        let order: Vec<_> = table.rules().iter().map(|r| r.name.as_str()).collect();
        assert_eq!(order, vec!["first", "narrow", "broad", "broad-twin"]);
    }

    #[test]
    fn test_invalid_cel_is_config_error() {
        let rules = vec![MatcherRule {
            name: "broken".into(),
            when: "status ===".into(),
            category: "not_found".into(),
            priority: 1,
        }];
        let err = RuleTable::compile(&rules).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_unknown_category_is_config_error() {
        let rules = vec![MatcherRule {
            name: "mystery".into(),
            when: "status == 418".into(),
            category: "teapot".into(),
            priority: 1,
        }];
        let err = RuleTable::compile(&rules).unwrap_err();
        assert!(err.to_string().contains("teapot"));
    }
}
