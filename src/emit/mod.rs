//! Code emission: test cases → one source file per endpoint
//!
//! Templates are embedded MiniJinja sources under `templates/tests/`. Every
//! name, URL and body is resolved before rendering so the templates stay pure
//! layout. Output carries no timestamps; two emits of the same cases are
//! byte-identical.

mod context;
mod filters;
mod naming;

pub use context::{CaseContext, FileContext, GroupContext, HeaderContext, RenderedRequest};
pub use naming::{NameKey, NamingRegistry};

use crate::config::EmitConfig;
use crate::contract::{ContractModel, EndpointId};
use crate::error::{Error, Result};
use crate::lang::Language;
use crate::scenario::{HarnessTag, ScenarioCategory};
use crate::testgen::{Provenance, TestCase};
use minijinja::Environment;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tracing::{debug, info};

/// Index of everything written, next to the emitted files
pub const MANIFEST_FILE: &str = "gapgen-manifest.json";

const TOOL: &str = "gapgen";

mod embedded {
    pub const JAVA: &str = include_str!("../../templates/tests/java.jinja");
    pub const PYTHON: &str = include_str!("../../templates/tests/python.jinja");
    pub const TYPESCRIPT: &str = include_str!("../../templates/tests/typescript.jinja");
    pub const RUST: &str = include_str!("../../templates/tests/rust.jinja");
    pub const GO: &str = include_str!("../../templates/tests/go.jinja");
    pub const CSHARP: &str = include_str!("../../templates/tests/csharp.jinja");
}

static ENGINE: OnceLock<Environment<'static>> = OnceLock::new();

fn init_engine() -> Environment<'static> {
    let mut env = Environment::new();
    env.set_trim_blocks(true);
    env.set_lstrip_blocks(true);
    filters::register_filters(&mut env);

    for (target, source) in [
        (Language::Java, embedded::JAVA),
        (Language::Python, embedded::PYTHON),
        (Language::TypeScript, embedded::TYPESCRIPT),
        (Language::Rust, embedded::RUST),
        (Language::Go, embedded::GO),
        (Language::CSharp, embedded::CSHARP),
    ] {
        env.add_template(template_name(target), source)
            .expect("embedded test template must parse");
    }
    env
}

/// The shared template engine
pub fn engine() -> &'static Environment<'static> {
    ENGINE.get_or_init(init_engine)
}

pub fn template_name(target: Language) -> &'static str {
    match target {
        Language::Java => "tests/java.jinja",
        Language::Python => "tests/python.jinja",
        Language::TypeScript => "tests/typescript.jinja",
        Language::Rust => "tests/rust.jinja",
        Language::Go => "tests/go.jinja",
        Language::CSharp => "tests/csharp.jinja",
    }
}

/// Format emitted code; only Rust has an in-process formatter
pub fn format_code(code: &str, target: Language) -> Result<String> {
    match target {
        Language::Rust => format_rust(code),
        _ => Ok(code.to_string()),
    }
}

/// Format Rust code using prettyplease
pub fn format_rust(code: &str) -> Result<String> {
    let syntax_tree = syn::parse_file(code)
        .map_err(|e| Error::Emit(format!("generated Rust does not parse: {}", e)))?;
    Ok(prettyplease::unparse(&syntax_tree))
}

/// Test cases for one endpoint, with the best score among its gaps
#[derive(Debug, Clone)]
pub struct EndpointGroup {
    pub endpoint: EndpointId,
    pub best_score: i64,
    pub cases: Vec<TestCase>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmittedFile {
    /// Relative to the output directory
    pub path: String,
    pub endpoint: EndpointId,
    pub contents: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ManifestTest {
    pub name: String,
    pub category: ScenarioCategory,
    pub harness_tag: HarnessTag,
    pub provenance: Provenance,
    pub expected_status: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameter: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ManifestFile {
    pub path: String,
    pub endpoint: EndpointId,
    pub class_name: String,
    pub tests: Vec<ManifestTest>,
}

/// `gapgen-manifest.json`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Manifest {
    pub tool: String,
    pub version: String,
    pub fingerprint: String,
    pub target: Language,
    pub files: Vec<ManifestFile>,
}

impl Manifest {
    pub fn test_count(&self) -> usize {
        self.files.iter().map(|f| f.tests.len()).sum()
    }
}

/// Everything one emit produced, not yet on disk
#[derive(Debug, Clone)]
pub struct Emission {
    pub files: Vec<EmittedFile>,
    pub manifest: Manifest,
}

impl Emission {
    pub fn manifest_json(&self) -> Result<String> {
        let mut json = serde_json::to_string_pretty(&self.manifest)?;
        json.push('\n');
        Ok(json)
    }

    /// Write every file plus the manifest under `dir`
    pub fn write_to(&self, dir: &Path) -> Result<Vec<PathBuf>> {
        std::fs::create_dir_all(dir)?;
        let mut written = Vec::with_capacity(self.files.len() + 1);
        for file in &self.files {
            let path = dir.join(&file.path);
            std::fs::write(&path, &file.contents)?;
            debug!(path = %path.display(), endpoint = %file.endpoint, "wrote test file");
            written.push(path);
        }
        let manifest = dir.join(MANIFEST_FILE);
        std::fs::write(&manifest, self.manifest_json()?)?;
        written.push(manifest);
        Ok(written)
    }
}

/// Renders endpoint groups for one target
#[derive(Debug, Clone)]
pub struct CodeEmitter {
    config: EmitConfig,
    fingerprint: String,
}

impl CodeEmitter {
    pub fn new(config: EmitConfig, fingerprint: impl Into<String>) -> Self {
        Self {
            config,
            fingerprint: fingerprint.into(),
        }
    }

    pub fn target(&self) -> Language {
        self.config.target
    }

    pub fn emit(&self, model: &ContractModel, mut groups: Vec<EndpointGroup>) -> Result<Emission> {
        groups.retain(|g| !g.cases.is_empty());
        for group in &groups {
            if model.get(&group.endpoint).is_none() {
                return Err(Error::Emit(format!(
                    "endpoint {} is not in the contract",
                    group.endpoint
                )));
            }
            if let Some(stray) = group.cases.iter().find(|c| c.endpoint != group.endpoint) {
                return Err(Error::Emit(format!(
                    "case for {} grouped under {}",
                    stray.endpoint, group.endpoint
                )));
            }
        }

        groups.sort_by(|a, b| {
            b.best_score
                .cmp(&a.best_score)
                .then_with(|| a.endpoint.cmp(&b.endpoint))
        });
        for group in &mut groups {
            group.cases.sort_by_key(|c| c.category);
        }

        let keys: Vec<Vec<NameKey>> = groups.iter().map(|g| name_keys(&g.cases)).collect();
        let registry = NamingRegistry::build(self.target(), keys.iter().flatten().cloned());

        let mut files = Vec::with_capacity(groups.len());
        let mut manifest_files = Vec::with_capacity(groups.len());
        for (group, keys) in groups.iter().zip(&keys) {
            let (file, entry) = self.emit_group(model, group, keys, &registry)?;
            files.push(file);
            manifest_files.push(entry);
        }

        let manifest = Manifest {
            tool: TOOL.to_string(),
            version: crate::VERSION.to_string(),
            fingerprint: self.fingerprint.clone(),
            target: self.target(),
            files: manifest_files,
        };
        info!(
            target = %self.target(),
            files = files.len(),
            tests = manifest.test_count(),
            "emitted test files"
        );
        Ok(Emission { files, manifest })
    }

    fn emit_group(
        &self,
        model: &ContractModel,
        group: &EndpointGroup,
        keys: &[NameKey],
        registry: &NamingRegistry,
    ) -> Result<(EmittedFile, ManifestFile)> {
        let missing = || Error::Emit(format!("no name registered for {}", group.endpoint));
        let endpoint = model.get(&group.endpoint).ok_or_else(missing)?;
        let class_name = registry.class_name(&group.endpoint).ok_or_else(missing)?;
        let path = registry.file_name(&group.endpoint).ok_or_else(missing)?;

        let mut cases = Vec::with_capacity(group.cases.len());
        let mut tests = Vec::with_capacity(group.cases.len());
        for (case, key) in group.cases.iter().zip(keys) {
            let name = registry.test_name(key).ok_or_else(missing)?;
            cases.push(CaseContext::new(case, endpoint, name.to_string())?);
            tests.push(ManifestTest {
                name: name.to_string(),
                category: case.category,
                harness_tag: case.harness_tag(),
                provenance: case.provenance,
                expected_status: case.expected_status,
                parameter: case.parameter.clone(),
            });
        }

        let uses_json = cases.iter().any(CaseContext::has_assertions);
        let context = FileContext {
            tool: TOOL,
            version: crate::VERSION,
            fingerprint: self.fingerprint.clone(),
            endpoint: group.endpoint.to_string(),
            summary: endpoint.summary.clone(),
            class_name: class_name.to_string(),
            package: self.config.package.clone(),
            base_url_env: self.config.base_url_env.clone(),
            user_token_env: context::USER_TOKEN_ENV,
            admin_token_env: context::ADMIN_TOKEN_ENV,
            malformed_authorization: context::MALFORMED_AUTHORIZATION,
            groups: FileContext::group(cases),
            uses_json,
        };

        let rendered = engine()
            .get_template(template_name(self.target()))
            .and_then(|t| t.render(&context))
            .map_err(|e| Error::Emit(format!("rendering {}: {}", path, e)))?;
        let mut contents = if self.config.auto_format {
            format_code(&rendered, self.target())?
        } else {
            rendered
        };
        if !contents.ends_with('\n') {
            contents.push('\n');
        }

        Ok((
            EmittedFile {
                path: path.clone(),
                endpoint: group.endpoint.clone(),
                contents,
            },
            ManifestFile {
                path,
                endpoint: group.endpoint.clone(),
                class_name: class_name.to_string(),
                tests,
            },
        ))
    }
}

/// Naming tuples for a file's cases, numbering exact repeats
fn name_keys(cases: &[TestCase]) -> Vec<NameKey> {
    let mut seen: HashMap<NameKey, usize> = HashMap::new();
    cases
        .iter()
        .map(|case| {
            let mut key = NameKey {
                path: case.endpoint.path.clone(),
                method: case.endpoint.method,
                category: case.category,
                status: case.expected_status,
                parameter: case.parameter.clone(),
                occurrence: 0,
            };
            let count = seen.entry(key.clone()).or_insert(0);
            key.occurrence = *count;
            *count += 1;
            key
        })
        .collect()
}
