//! Deterministic, collision-free identifiers for emitted tests and files
//!
//! Names are derived from the naming tuple alone. The registry sees the whole
//! sorted tuple set up front, so when two distinct tuples render the same
//! identifier each gets a stable ordinal suffix, independent of emit order.

use crate::contract::{EndpointId, HttpMethod};
use crate::lang::Language;
use crate::scenario::ScenarioCategory;
use crate::util::{self, words};
use std::collections::{BTreeMap, BTreeSet};

/// The tuple a test identifier is derived from
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NameKey {
    pub path: String,
    pub method: HttpMethod,
    pub category: ScenarioCategory,
    pub status: u16,
    pub parameter: Option<String>,
    /// Index among identical tuples (repeated enhanced suggestions)
    pub occurrence: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Casing {
    Snake,
    Camel,
    Pascal,
}

fn apply(casing: Casing, parts: &[String]) -> String {
    let joined = parts.join("_");
    match casing {
        Casing::Snake => util::to_snake_case(&joined),
        Casing::Camel => util::to_camel_case(&joined),
        Casing::Pascal => util::to_pascal_case(&joined),
    }
}

/// `/orders/{orderId}/items` → `orders by order id items`
fn path_words(path: &str) -> Vec<String> {
    let mut out = Vec::new();
    for segment in path.split('/').filter(|s| !s.is_empty()) {
        if segment.starts_with('{') {
            out.push("by".to_string());
        }
        out.extend(words(segment));
    }
    out
}

fn endpoint_words(method: HttpMethod, path: &str) -> Vec<String> {
    let mut parts = vec![method.as_str().to_ascii_lowercase()];
    let path = path_words(path);
    if path.is_empty() {
        parts.push("root".to_string());
    } else {
        parts.extend(path);
    }
    parts
}

fn test_base(target: Language, key: &NameKey) -> String {
    let mut parts = endpoint_words(key.method, &key.path);
    parts.extend(words(key.category.label()));
    if let Some(param) = &key.parameter {
        parts.extend(words(param));
    }
    parts.push(key.status.to_string());

    match target {
        Language::Python => format!("test_{}", apply(Casing::Snake, &parts)),
        Language::Rust => apply(Casing::Snake, &parts),
        Language::Go => format!("Test{}", apply(Casing::Pascal, &parts)),
        Language::CSharp => apply(Casing::Pascal, &parts),
        Language::Java | Language::TypeScript => apply(Casing::Camel, &parts),
    }
}

/// Class name for an endpoint's test file
fn class_base(target: Language, endpoint: &EndpointId) -> String {
    let pascal = apply(Casing::Pascal, &endpoint_words(endpoint.method, &endpoint.path));
    match target {
        Language::Java => format!("{}Test", pascal),
        Language::CSharp => format!("{}Tests", pascal),
        _ => pascal,
    }
}

fn file_stem(target: Language, class_name: &str) -> String {
    let snake = util::to_snake_case(class_name);
    match target {
        Language::Java | Language::CSharp => class_name.to_string(),
        Language::Python => format!("test_{}", snake),
        Language::Go => format!("{}_test", snake),
        Language::TypeScript => format!("{}.test", snake),
        Language::Rust => snake,
    }
}

/// Assign `base(key)` to every key, suffixing `_N` inside colliding groups
fn assign<K: Ord + Clone>(keys: BTreeSet<K>, base: impl Fn(&K) -> String) -> BTreeMap<K, String> {
    let mut groups: BTreeMap<String, Vec<K>> = BTreeMap::new();
    for key in keys {
        groups.entry(base(&key)).or_default().push(key);
    }

    let mut taken: BTreeSet<String> = groups
        .iter()
        .filter(|(_, members)| members.len() == 1)
        .map(|(name, _)| name.clone())
        .collect();

    let mut names = BTreeMap::new();
    for (name, members) in groups {
        if members.len() == 1 {
            for key in members {
                names.insert(key, name.clone());
            }
            continue;
        }
        let mut ordinal = 1;
        for key in members {
            let unique = loop {
                let candidate = format!("{}_{}", name, ordinal);
                ordinal += 1;
                if !taken.contains(&candidate) {
                    break candidate;
                }
            };
            taken.insert(unique.clone());
            names.insert(key, unique);
        }
    }
    names
}

/// Injective test and class names for one run
#[derive(Debug, Clone)]
pub struct NamingRegistry {
    target: Language,
    tests: BTreeMap<NameKey, String>,
    classes: BTreeMap<EndpointId, String>,
    stems: BTreeMap<EndpointId, String>,
}

impl NamingRegistry {
    pub fn build(target: Language, keys: impl IntoIterator<Item = NameKey>) -> Self {
        let keys: BTreeSet<NameKey> = keys.into_iter().collect();
        let endpoints: BTreeSet<EndpointId> = keys
            .iter()
            .map(|k| EndpointId {
                path: k.path.clone(),
                method: k.method,
            })
            .collect();

        Self {
            target,
            tests: assign(keys, |k| test_base(target, k)),
            classes: assign(endpoints.clone(), |e| class_base(target, e)),
            stems: assign(endpoints, |e| file_stem(target, &class_base(target, e))),
        }
    }

    pub fn test_name(&self, key: &NameKey) -> Option<&str> {
        self.tests.get(key).map(String::as_str)
    }

    pub fn class_name(&self, endpoint: &EndpointId) -> Option<&str> {
        self.classes.get(endpoint).map(String::as_str)
    }

    /// Relative output path for an endpoint's file
    pub fn file_name(&self, endpoint: &EndpointId) -> Option<String> {
        self.stems
            .get(endpoint)
            .map(|stem| format!("{}.{}", stem, self.target.extension()))
    }
}
