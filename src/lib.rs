// Production-quality lints
#![warn(
    clippy::todo,
    clippy::unimplemented,
    clippy::dbg_macro,
    clippy::print_stdout,
    clippy::print_stderr
)]
// Deny truly dangerous patterns
#![deny(clippy::mem_forget)]
// Allow common patterns in library code
#![allow(clippy::missing_errors_doc, clippy::missing_panics_doc)]

//! # gapgen: contract coverage gaps → prioritized API tests
//!
//! gapgen reads an API contract (OpenAPI 3 / Swagger 2, YAML or JSON) and an
//! existing test corpus, works out which behavioral scenarios each endpoint
//! is still missing, ranks those gaps, and writes executable tests for them.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use gapgen::{GenConfig, Pipeline, RunOptions};
//!
//! let pipeline = Pipeline::new(GenConfig::default());
//! let report = pipeline
//!     .run(&RunOptions {
//!         contract: "openapi.yaml".into(),
//!         corpus: Some("tests/".into()),
//!         output: "generated/".into(),
//!         dry_run: false,
//!     })
//!     .await?;
//! println!("{}", report.to_report());
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                                                             │
//! │  CONTRACT ──► SpecExtractor ──► ContractModel               │
//! │                                      │                      │
//! │  CORPUS ────► CoverageAnalyzer ──► CoverageModel            │
//! │                                      │                      │
//! │               identify_gaps ──► Gap set                     │
//! │                                      │                      │
//! │               PriorityScorer ──► ranked ScoredGaps          │
//! │                                      │                      │
//! │   per endpoint: TemplateStrategy + EnhancedStrategy         │
//! │                                      │                      │
//! │               CodeEmitter ──► files + gapgen-manifest.json  │
//! │                                                             │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Scenario categories
//!
//! | Category | Harness tag |
//! |----------|-------------|
//! | `happy_path` | smoke |
//! | `missing_required_param`, `wrong_type` | validation |
//! | `below_minimum`, `above_maximum` | boundary |
//! | `unauthorized`, `forbidden_role`, `creative_security` | security |
//! | `not_found`, `duplicate_conflict` | negative |

// Model
pub mod contract;
pub mod error;
pub mod lang;
pub mod scenario;

// Stages
pub mod cel;
pub mod coverage;
pub mod emit;
pub mod enhance;
pub mod gaps;
pub mod priority;
pub mod strategy;
pub mod testgen;

// Orchestration
pub mod config;
pub mod pipeline;
pub mod report;

pub mod util;

// Re-exports
pub use config::{EmitConfig, EnhancementConfig, GenConfig, Overrides, StrategyConfig};
pub use contract::{
    ContractModel, EndpointId, EndpointSpec, HttpMethod, ParamLocation, ParamType, Parameter,
    SpecExtractor,
};
pub use coverage::{load_corpus, CoverageAnalyzer, CoverageEntry, CoverageModel, MatcherConfig, SourceUnit};
pub use emit::{CodeEmitter, Emission, EmittedFile, EndpointGroup, Manifest, MANIFEST_FILE};
pub use enhance::{
    CallBudget, ChatCompletionsSource, Enhancer, Suggestion, SuggestionBatch, SuggestionError,
    SuggestionRequest, SuggestionSource,
};
pub use error::{Error, Result, Warning};
pub use gaps::{identify_gaps, Gap};
pub use lang::Language;
pub use pipeline::{load_contract, Analysis, Generation, Pipeline, RunOptions};
pub use priority::{apply_threshold, PriorityScorer, PriorityWeights, ScoredGap};
pub use report::{RunReport, RunStatus};
pub use scenario::{HarnessTag, ScenarioCategory};
pub use strategy::{CaseStrategy, EnhancedStrategy, TemplateStrategy};
pub use testgen::{Credential, Provenance, TemplateGenerator, TestCase};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
