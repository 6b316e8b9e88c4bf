//! CoverageAnalyzer: test corpus → CoverageModel
//!
//! Per source unit: split into test functions (tree-sitter), extract
//! evidence (regex tables), resolve the primary endpoint against the
//! contract, then classify with the CEL rule table. Units are independent,
//! so analysis fans out over a blocking pool and merges order-independently.

mod evidence;
mod rules;
mod units;

pub use evidence::{clean_request_path, CallSite, Evidence, EvidenceExtractor};
pub use rules::{CompiledRule, MatcherConfig, MatcherRule, RuleTable, EVIDENCE_VARIABLES};
pub use units::{split_tests, SplitError, TestFunction};

use crate::contract::{ContractModel, EndpointId};
use crate::error::{Result, Warning};
use crate::lang::Language;
use crate::scenario::ScenarioCategory;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

/// A test source file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceUnit {
    /// Path relative to the corpus root
    pub path: String,
    /// `None` when the extension is not a known test language
    pub language: Option<Language>,
    pub content: Vec<u8>,
    /// Set when the file or directory could not be read
    pub unreadable: Option<String>,
}

impl SourceUnit {
    /// Build a unit, detecting the language from the path
    pub fn new(path: impl Into<String>, content: impl Into<Vec<u8>>) -> Self {
        let path = path.into();
        Self {
            language: Language::from_path(&path),
            path,
            content: content.into(),
            unreadable: None,
        }
    }

    /// A unit that exists but could not be read; analysis skips it
    pub fn unreadable(path: impl Into<String>, reason: impl Into<String>) -> Self {
        let path = path.into();
        Self {
            language: Language::from_path(&path),
            path,
            content: Vec::new(),
            unreadable: Some(reason.into()),
        }
    }
}

/// Coverage for one endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct CoverageEntry {
    pub endpoint: EndpointId,
    /// Categories credited by non-placeholder tests
    pub covered: BTreeSet<ScenarioCategory>,
    /// Tests that earned credit
    pub test_ids: BTreeSet<String>,
    /// Stub tests referencing the endpoint
    pub placeholder_tests: BTreeSet<String>,
    pub placeholder: bool,
}

impl CoverageEntry {
    pub fn new(endpoint: EndpointId) -> Self {
        Self {
            endpoint,
            covered: BTreeSet::new(),
            test_ids: BTreeSet::new(),
            placeholder_tests: BTreeSet::new(),
            placeholder: false,
        }
    }
}

/// What a single test contributed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Observation {
    pub endpoint: EndpointId,
    pub test_id: String,
    pub outcome: Outcome,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Credited(ScenarioCategory),
    Placeholder,
    Unclassified,
}

/// Endpoint → coverage, ordered by endpoint identity
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct CoverageModel {
    pub entries: BTreeMap<EndpointId, CoverageEntry>,
}

impl CoverageModel {
    pub fn entry(&self, endpoint: &EndpointId) -> Option<&CoverageEntry> {
        self.entries.get(endpoint)
    }

    /// Whether a non-placeholder test covers `category` for `endpoint`
    pub fn is_covered(&self, endpoint: &EndpointId, category: ScenarioCategory) -> bool {
        self.entries
            .get(endpoint)
            .is_some_and(|e| e.covered.contains(&category))
    }

    pub fn has_placeholder(&self, endpoint: &EndpointId) -> bool {
        self.entries.get(endpoint).is_some_and(|e| e.placeholder)
    }

    /// Credit a category directly
    pub fn credit(&mut self, endpoint: &EndpointId, category: ScenarioCategory, test_id: &str) {
        let entry = self.entry_mut(endpoint);
        entry.covered.insert(category);
        entry.test_ids.insert(test_id.to_string());
    }

    /// Record an observation; merging is commutative
    pub fn record(&mut self, observation: &Observation) {
        match observation.outcome {
            Outcome::Credited(category) => {
                self.credit(&observation.endpoint, category, &observation.test_id)
            }
            Outcome::Placeholder => {
                let entry = self.entry_mut(&observation.endpoint);
                entry.placeholder = true;
                entry.placeholder_tests.insert(observation.test_id.clone());
            }
            Outcome::Unclassified => {
                self.entry_mut(&observation.endpoint);
            }
        }
    }

    fn entry_mut(&mut self, endpoint: &EndpointId) -> &mut CoverageEntry {
        self.entries
            .entry(endpoint.clone())
            .or_insert_with(|| CoverageEntry::new(endpoint.clone()))
    }

    /// Total credited (endpoint, category) pairs
    pub fn credited_pairs(&self) -> usize {
        self.entries.values().map(|e| e.covered.len()).sum()
    }

    /// Plain-text report
    pub fn to_report(&self) -> String {
        let mut lines = vec![
            "═══════════════════════════════════════════════════════════════".to_string(),
            "COVERAGE".to_string(),
            "═══════════════════════════════════════════════════════════════".to_string(),
            String::new(),
        ];
        for entry in self.entries.values() {
            let covered: Vec<_> = entry.covered.iter().map(|c| c.label()).collect();
            let marker = if entry.placeholder { " [placeholder]" } else { "" };
            lines.push(format!("{}{}", entry.endpoint, marker));
            lines.push(format!(
                "  covered: {}",
                if covered.is_empty() {
                    "(none)".to_string()
                } else {
                    covered.join(", ")
                }
            ));
            for id in &entry.test_ids {
                lines.push(format!("    ✓ {}", id));
            }
            for id in &entry.placeholder_tests {
                lines.push(format!("    ○ {}", id));
            }
        }
        if self.entries.is_empty() {
            lines.push("No tests reference contract endpoints.".to_string());
        }
        lines.join("\n")
    }
}

/// Result of analyzing one unit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitCoverage {
    pub observations: Vec<Observation>,
    pub warning: Option<Warning>,
}

/// Scans test units and credits scenario categories
#[derive(Debug, Clone)]
pub struct CoverageAnalyzer {
    extractor: EvidenceExtractor,
    rules: RuleTable,
}

impl CoverageAnalyzer {
    /// Build from matcher configuration (validates every pattern and rule)
    pub fn new(config: &MatcherConfig) -> Result<Self> {
        Ok(Self {
            extractor: EvidenceExtractor::new(config)?,
            rules: RuleTable::compile(&config.rules)?,
        })
    }

    /// Analyze one unit; never fails, problems become a skip warning
    pub fn analyze_unit(&self, unit: &SourceUnit, model: &ContractModel) -> UnitCoverage {
        let skip = |reason: String| {
            warn!(unit = %unit.path, %reason, "skipping corpus unit");
            UnitCoverage {
                observations: Vec::new(),
                warning: Some(Warning::CorpusUnitSkipped {
                    unit: unit.path.clone(),
                    reason,
                }),
            }
        };

        if let Some(reason) = &unit.unreadable {
            return skip(format!("unreadable: {}", reason));
        }
        let Some(language) = unit.language else {
            return skip("unknown language".into());
        };
        let Ok(source) = std::str::from_utf8(&unit.content) else {
            return skip("content is not valid UTF-8".into());
        };
        let tests = match split_tests(language, source) {
            Ok(tests) => tests,
            Err(e) => return skip(e.to_string()),
        };

        let mut observations = Vec::new();
        for test in &tests {
            let mut evidence = self.extractor.extract(&test.name, &test.text);
            evidence.resolve(model);
            let Some(endpoint) = evidence.endpoint.clone() else {
                debug!(unit = %unit.path, test = %test.name, "no call site resolved to a contract endpoint");
                continue;
            };

            let outcome = if evidence.is_placeholder() {
                Outcome::Placeholder
            } else {
                match self.rules.classify(&evidence) {
                    Some(rule) => {
                        debug!(test = %test.name, rule = %rule.name, category = %rule.category, "classified");
                        Outcome::Credited(rule.category)
                    }
                    None => Outcome::Unclassified,
                }
            };

            observations.push(Observation {
                endpoint,
                test_id: format!("{}::{}", unit.path, test.name),
                outcome,
            });
        }

        UnitCoverage {
            observations,
            warning: None,
        }
    }

    /// Analyze units sequentially
    pub fn analyze(&self, units: &[SourceUnit], model: &ContractModel) -> (CoverageModel, Vec<Warning>) {
        let mut coverage = CoverageModel::default();
        let mut warnings = Vec::new();
        for unit in units {
            let result = self.analyze_unit(unit, model);
            for observation in &result.observations {
                coverage.record(observation);
            }
            warnings.extend(result.warning);
        }
        info!(
            units = units.len(),
            endpoints = coverage.entries.len(),
            credited = coverage.credited_pairs(),
            "coverage analysis complete"
        );
        (coverage, warnings)
    }

    /// Analyze units on the blocking pool, one task per unit
    ///
    /// A panicking task only loses its own unit, reported as a skip.
    pub async fn analyze_parallel(
        self: Arc<Self>,
        units: Vec<SourceUnit>,
        model: Arc<ContractModel>,
    ) -> (CoverageModel, Vec<Warning>) {
        let total = units.len();
        let mut set = JoinSet::new();
        for unit in units {
            let analyzer = Arc::clone(&self);
            let model = Arc::clone(&model);
            set.spawn_blocking(move || {
                let result = analyzer.analyze_unit(&unit, &model);
                (unit.path, result)
            });
        }

        let mut coverage = CoverageModel::default();
        let mut warnings = Vec::new();
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok((_, result)) => {
                    for observation in &result.observations {
                        coverage.record(observation);
                    }
                    warnings.extend(result.warning);
                }
                Err(e) => {
                    warn!(error = %e, "corpus analysis task failed");
                    warnings.push(Warning::CorpusUnitSkipped {
                        unit: "<unknown>".into(),
                        reason: format!("analysis task failed: {}", e),
                    });
                }
            }
        }

        // Completion order is arbitrary
        warnings.sort_by_key(|w| w.to_string());

        info!(
            units = total,
            endpoints = coverage.entries.len(),
            credited = coverage.credited_pairs(),
            "coverage analysis complete"
        );
        (coverage, warnings)
    }
}

/// Directories never descended into
const SKIPPED_DIRS: [&str; 7] = [
    ".git",
    "target",
    "node_modules",
    "__pycache__",
    ".venv",
    "build",
    "bin",
];

/// Load every file under `root` with a known test-language extension
///
/// Files are returned sorted by relative path. Only an unreadable `root` is
/// an error: entries below it that cannot be listed or read come back as
/// [`SourceUnit::unreadable`] and are skipped with a warning during analysis.
pub fn load_corpus(root: &Path) -> Result<Vec<SourceUnit>> {
    let entries = std::fs::read_dir(root)?;
    let mut units = Vec::new();
    walk(root, entries, &mut units);
    units.sort_by(|a, b| a.path.cmp(&b.path));
    debug!(root = %root.display(), units = units.len(), "loaded corpus");
    Ok(units)
}

fn relative(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .to_string_lossy()
        .replace('\\', "/")
}

fn walk(root: &Path, entries: std::fs::ReadDir, units: &mut Vec<SourceUnit>) {
    for entry in entries {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!(error = %e, "unlistable corpus entry");
                units.push(SourceUnit::unreadable("<unlistable entry>", e.to_string()));
                continue;
            }
        };
        let path = entry.path();
        let name = entry.file_name().to_string_lossy().to_string();
        let relative = relative(root, &path);
        let file_type = match entry.file_type() {
            // Links are followed to files only, so a cycle cannot recurse
            Ok(file_type) if file_type.is_symlink() => match std::fs::metadata(&path) {
                Ok(meta) if meta.is_file() => meta.file_type(),
                Ok(_) => continue,
                Err(e) => {
                    if Language::from_path(&relative).is_some() {
                        units.push(SourceUnit::unreadable(relative, e.to_string()));
                    }
                    continue;
                }
            },
            Ok(file_type) => file_type,
            Err(e) => {
                units.push(SourceUnit::unreadable(relative, e.to_string()));
                continue;
            }
        };

        if file_type.is_dir() {
            if SKIPPED_DIRS.contains(&name.as_str()) {
                continue;
            }
            match std::fs::read_dir(&path) {
                Ok(children) => walk(root, children, units),
                Err(e) => units.push(SourceUnit::unreadable(format!("{}/", relative), e.to_string())),
            }
        } else if file_type.is_file() && Language::from_path(&relative).is_some() {
            match std::fs::read(&path) {
                Ok(content) => units.push(SourceUnit::new(relative, content)),
                Err(e) => units.push(SourceUnit::unreadable(relative, e.to_string())),
            }
        }
    }
}
