//! The budget-aware pipeline: contract → coverage → gaps → cases → files
//!
//! Stages run in order. Corpus analysis fans out per unit and generation fans
//! out per endpoint; both fan-ins are re-ordered deterministically before
//! anything depends on completion order. Nothing touches the output directory
//! until every stage has succeeded.

use crate::config::GenConfig;
use crate::contract::{ContractModel, EndpointId, SpecExtractor};
use crate::coverage::{load_corpus, CoverageAnalyzer, CoverageModel, SourceUnit};
use crate::emit::{CodeEmitter, Emission, EndpointGroup};
use crate::enhance::{CallBudget, ChatCompletionsSource, Enhancer, SuggestionSource};
use crate::error::{Error, Result, Warning};
use crate::gaps::identify_gaps;
use crate::priority::{apply_threshold, PriorityScorer, ScoredGap};
use crate::report::{EnhancementUsage, RunReport, TestCounts};
use crate::strategy::{run_strategies, CaseStrategy, EndpointWork, EnhancedStrategy, StrategyOutput, TemplateStrategy};
use crate::testgen::{Provenance, TemplateGenerator};
use chrono::Utc;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

/// Where one run reads from and writes to
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// File path or `http(s)://` URL
    pub contract: String,
    pub corpus: Option<PathBuf>,
    pub output: PathBuf,
    pub dry_run: bool,
}

/// Coverage and ranked gaps, before any generation
#[derive(Debug, Clone)]
pub struct Analysis {
    pub coverage: CoverageModel,
    /// Gaps at or above the threshold, in rank order
    pub ranked: Vec<ScoredGap>,
    pub gaps_found: usize,
    pub below_threshold: usize,
    pub warnings: Vec<Warning>,
}

impl Analysis {
    /// Plain-text ranked gap listing
    pub fn to_report(&self) -> String {
        let mut lines = vec![
            "═══════════════════════════════════════════════════════════════".to_string(),
            "GAPS".to_string(),
            "═══════════════════════════════════════════════════════════════".to_string(),
            String::new(),
            format!(
                "{} found, {} below threshold",
                self.gaps_found, self.below_threshold
            ),
            String::new(),
        ];
        for (rank, scored) in self.ranked.iter().enumerate() {
            lines.push(format!("{:>3}. [{:>3}] {}", rank + 1, scored.score(), scored.gap()));
            lines.push(format!("          {}", scored.explain()));
        }
        for warning in &self.warnings {
            lines.push(format!("  ⚠ {}", warning));
        }
        lines.join("\n")
    }
}

/// Generated cases, emitted but not yet written
#[derive(Debug, Clone)]
pub struct Generation {
    pub emission: Emission,
    pub tests: TestCounts,
    pub calls: usize,
    pub rejected: usize,
    pub warnings: Vec<Warning>,
}

/// Read and extract a contract from a path or URL
pub async fn load_contract(location: &str) -> Result<ContractModel> {
    let text = if location.starts_with("http://") || location.starts_with("https://") {
        fetch_contract(location).await?
    } else {
        tokio::fs::read_to_string(location)
            .await
            .map_err(|e| Error::ContractParse(format!("cannot read {}: {}", location, e)))?
    };
    let model = SpecExtractor::new().extract(&text)?;
    for problem in model.validate() {
        warn!(%problem, "contract inconsistency");
    }
    info!(
        endpoints = model.len(),
        fingerprint = %model.fingerprint,
        "loaded contract"
    );
    Ok(model)
}

async fn fetch_contract(url: &str) -> Result<String> {
    debug!(%url, "fetching contract");
    let response = reqwest::get(url)
        .await
        .map_err(|e| Error::Fetch(format!("{}: {}", url, e)))?;
    let status = response.status();
    if !status.is_success() {
        return Err(Error::Fetch(format!("{} returned HTTP {}", url, status)));
    }
    response
        .text()
        .await
        .map_err(|e| Error::Fetch(format!("{}: {}", url, e)))
}

/// One configured run
pub struct Pipeline {
    config: GenConfig,
    source: Option<Arc<dyn SuggestionSource>>,
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("config", &self.config)
            .field("source", &self.source.is_some())
            .finish()
    }
}

impl Pipeline {
    pub fn new(config: GenConfig) -> Self {
        Self {
            config,
            source: None,
        }
    }

    /// Use this suggestion source instead of the configured service
    pub fn with_source(mut self, source: Arc<dyn SuggestionSource>) -> Self {
        self.source = Some(source);
        self
    }

    pub fn config(&self) -> &GenConfig {
        &self.config
    }

    /// Coverage, gap identification, scoring and threshold
    pub async fn analyze(&self, model: Arc<ContractModel>, units: Vec<SourceUnit>) -> Result<Analysis> {
        let analyzer = Arc::new(CoverageAnalyzer::new(&self.config.matchers)?);
        let (coverage, warnings) = analyzer.analyze_parallel(units, Arc::clone(&model)).await;

        let gaps = identify_gaps(&model, &coverage);
        let gaps_found = gaps.len();
        let scorer = PriorityScorer::new(
            self.config.critical_tags.clone(),
            self.config.priority.clone(),
        );
        let ranked = scorer.rank(gaps, &model, &coverage);
        let (ranked, below_threshold) = apply_threshold(ranked, self.config.threshold);
        info!(
            gaps = gaps_found,
            kept = ranked.len(),
            below_threshold,
            threshold = self.config.threshold,
            "ranked gaps"
        );

        Ok(Analysis {
            coverage,
            ranked,
            gaps_found,
            below_threshold,
            warnings,
        })
    }

    fn strategies(&self) -> Result<(Vec<Arc<dyn CaseStrategy>>, Option<Arc<CallBudget>>)> {
        let mut strategies: Vec<Arc<dyn CaseStrategy>> = Vec::new();
        if self.config.strategies.template {
            strategies.push(Arc::new(TemplateStrategy::new(TemplateGenerator::new())));
        }
        if !self.config.enhancement_active() {
            return Ok((strategies, None));
        }

        let source: Arc<dyn SuggestionSource> = match &self.source {
            Some(source) => Arc::clone(source),
            None => Arc::new(
                ChatCompletionsSource::from_config(&self.config.enhancement)
                    .map_err(|e| Error::Config(e.to_string()))?,
            ),
        };
        let budget = Arc::new(CallBudget::new(self.config.enhancement.budget));
        strategies.push(Arc::new(EnhancedStrategy::new(Enhancer::new(
            source,
            Arc::clone(&budget),
            Duration::from_millis(self.config.enhancement.timeout_ms),
            self.config.enhancement.max_suggestions,
        ))));
        Ok((strategies, Some(budget)))
    }

    /// Fan generation out per endpoint and emit the result in memory
    pub async fn generate(&self, model: Arc<ContractModel>, analysis: &Analysis) -> Result<Generation> {
        let (strategies, budget) = self.strategies()?;
        let strategies: Arc<[Arc<dyn CaseStrategy>]> = strategies.into();

        // Endpoints in order of their best gap
        let mut order: Vec<EndpointId> = Vec::new();
        let mut by_endpoint: BTreeMap<EndpointId, Vec<ScoredGap>> = BTreeMap::new();
        for scored in &analysis.ranked {
            let id = &scored.gap().endpoint;
            if !by_endpoint.contains_key(id) {
                order.push(id.clone());
            }
            by_endpoint.entry(id.clone()).or_default().push(scored.clone());
        }

        let mut set = JoinSet::new();
        let mut best_scores = BTreeMap::new();
        for id in order {
            let gaps = by_endpoint.remove(&id).unwrap_or_default();
            let endpoint = model
                .get(&id)
                .cloned()
                .ok_or_else(|| Error::Emit(format!("endpoint {} is not in the contract", id)))?;
            best_scores.insert(id.clone(), gaps.first().map(ScoredGap::score).unwrap_or_default());

            // Slots go out in rank order before anything runs
            let enhancement_slot = match &budget {
                Some(budget) if budget.try_reserve() => true,
                Some(_) => {
                    debug!(endpoint = %id, "call budget spent, template cases only");
                    false
                }
                None => false,
            };

            let work = EndpointWork {
                covered: analysis
                    .coverage
                    .entry(&id)
                    .map(|e| e.covered.clone())
                    .unwrap_or_default(),
                endpoint,
                gaps,
                enhancement_slot,
            };
            let strategies = Arc::clone(&strategies);
            set.spawn(async move {
                let output = run_strategies(&strategies, &work).await;
                (work.endpoint.id, output)
            });
        }

        let mut outputs: BTreeMap<EndpointId, StrategyOutput> = BTreeMap::new();
        while let Some(joined) = set.join_next().await {
            let (id, output) = joined.map_err(|e| Error::Other(format!("generation task failed: {}", e)))?;
            outputs.insert(id, output?);
        }

        let mut tests = TestCounts::default();
        let mut calls = 0;
        let mut rejected = 0;
        let mut warnings = Vec::new();
        let mut groups = Vec::with_capacity(outputs.len());
        for (id, output) in outputs {
            for case in &output.cases {
                match case.provenance {
                    Provenance::Template => tests.template += 1,
                    Provenance::Enhanced => tests.enhanced += 1,
                }
            }
            calls += output.calls;
            rejected += output.rejected;
            warnings.extend(output.warnings);
            groups.push(EndpointGroup {
                best_score: best_scores.get(&id).copied().unwrap_or_default(),
                endpoint: id,
                cases: output.cases,
            });
        }
        info!(
            template = tests.template,
            enhanced = tests.enhanced,
            calls,
            rejected,
            "generated test cases"
        );

        let emitter = CodeEmitter::new(self.config.emit.clone(), model.fingerprint.clone());
        let emission = emitter.emit(&model, groups)?;

        Ok(Generation {
            emission,
            tests,
            calls,
            rejected,
            warnings,
        })
    }

    /// Full run; files are written only after every stage succeeded
    pub async fn run(&self, options: &RunOptions) -> Result<RunReport> {
        let started_at = Utc::now();

        let model = Arc::new(load_contract(&options.contract).await?);
        let units = match &options.corpus {
            Some(corpus) => load_corpus(corpus)?,
            None => Vec::new(),
        };
        let analysis = self.analyze(Arc::clone(&model), units).await?;
        let generation = self.generate(Arc::clone(&model), &analysis).await?;

        let files_written = if options.dry_run {
            info!(files = generation.emission.files.len(), "dry run, nothing written");
            generation.emission.files.iter().map(|f| f.path.clone()).collect()
        } else {
            write_output(&generation.emission, &options.output)?
        };

        let mut warnings = analysis.warnings;
        warnings.extend(generation.warnings);

        Ok(RunReport {
            started_at,
            finished_at: Utc::now(),
            contract_fingerprint: model.fingerprint.clone(),
            endpoints: model.len(),
            gaps_found: analysis.gaps_found,
            gaps_below_threshold: analysis.below_threshold,
            tests: generation.tests,
            enhancement: EnhancementUsage::new(
                generation.calls,
                if self.config.enhancement_active() {
                    self.config.enhancement.budget
                } else {
                    0
                },
                generation.rejected,
            ),
            files_written,
            dry_run: options.dry_run,
            warnings,
        })
    }
}

fn write_output(emission: &Emission, dir: &Path) -> Result<Vec<String>> {
    let written = emission.write_to(dir)?;
    info!(dir = %dir.display(), files = written.len(), "wrote output");
    Ok(emission.files.iter().map(|f| f.path.clone()).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enhance::tests::{suggestion, Canned};
    use crate::scenario::ScenarioCategory;
    use serde_json::json;
    use std::sync::atomic::Ordering;

    const CONTRACT: &str = r##"
openapi: 3.0.0
paths:
  /products:
    get:
      parameters:
        - { name: page, in: query, required: true, schema: { type: integer, minimum: 1, maximum: 100 } }
      responses:
        "200": { description: ok }
        "422": { description: invalid }
  /carts:
    post:
      security: [ { bearerAuth: [] } ]
      responses:
        "201": { description: created }
        "401": { description: unauthorized }
  /orders/{orderId}:
    get:
      tags: [Orders]
      security: [ { bearerAuth: [] } ]
      parameters:
        - { name: orderId, in: path, required: true, schema: { type: integer } }
      responses:
        "200": { description: ok }
        "404": { description: missing }
  /health:
    get:
      responses:
        "200": { description: ok }
"##;

    const PRODUCTS_HAPPY_TEST: &str = r#"
def test_list_products(client):
    response = client.get("/products?page=1")
    assert response.status_code == 200
"#;

    fn model() -> Arc<ContractModel> {
        Arc::new(ContractModel::from_document(CONTRACT).unwrap())
    }

    fn enhanced_config(budget: usize) -> GenConfig {
        let mut config = GenConfig::default();
        config.enhancement.enabled = true;
        config.enhancement.budget = budget;
        config
    }

    #[tokio::test]
    async fn test_analysis_credits_corpus() {
        let pipeline = Pipeline::new(GenConfig::default());
        let empty = pipeline.analyze(model(), Vec::new()).await.unwrap();
        let credited = pipeline
            .analyze(model(), vec![SourceUnit::new("tests/test_products.py", PRODUCTS_HAPPY_TEST)])
            .await
            .unwrap();

        assert_eq!(credited.gaps_found + 1, empty.gaps_found);
        assert!(credited
            .ranked
            .iter()
            .all(|g| !(g.gap().endpoint.path == "/products" && g.gap().category == ScenarioCategory::HappyPath)));
    }

    #[tokio::test]
    async fn test_threshold_excludes_low_scores() {
        let mut config = GenConfig::default();
        config.threshold = 1;
        let analysis = Pipeline::new(config).analyze(model(), Vec::new()).await.unwrap();
        assert!(analysis.below_threshold > 0);
        assert!(analysis.ranked.iter().all(|g| g.score() >= 1));
    }

    #[tokio::test]
    async fn test_budget_goes_to_top_ranked_endpoint() {
        let source = Arc::new(Canned::new(vec![suggestion(
            "creative_security",
            json!({ "orderId": 7 }),
            404,
        )]));
        let pipeline = Pipeline::new(enhanced_config(1)).with_source(source.clone());
        let model = model();
        let analysis = pipeline.analyze(Arc::clone(&model), Vec::new()).await.unwrap();
        let generation = pipeline.generate(model, &analysis).await.unwrap();

        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
        assert_eq!(generation.calls, 1);
        // Only the orders endpoint (critical tag) got the call
        assert_eq!(generation.tests.enhanced, 1);
        let orders = generation
            .emission
            .manifest
            .files
            .iter()
            .find(|f| f.endpoint.path == "/orders/{orderId}")
            .unwrap();
        assert!(orders.tests.iter().any(|t| t.provenance == Provenance::Enhanced));
    }

    #[tokio::test]
    async fn test_disabled_enhancement_never_calls() {
        let source = Arc::new(Canned::new(Vec::new()));
        let pipeline = Pipeline::new(GenConfig::default()).with_source(source.clone());
        let model = model();
        let analysis = pipeline.analyze(Arc::clone(&model), Vec::new()).await.unwrap();
        let generation = pipeline.generate(model, &analysis).await.unwrap();
        assert_eq!(source.calls.load(Ordering::SeqCst), 0);
        assert_eq!(generation.tests.enhanced, 0);
        assert_eq!(generation.tests.template, analysis.ranked.len());
    }

    #[tokio::test]
    async fn test_generate_is_deterministic() {
        let pipeline = Pipeline::new(GenConfig::default());
        let model = model();
        let analysis = pipeline.analyze(Arc::clone(&model), Vec::new()).await.unwrap();
        let a = pipeline.generate(Arc::clone(&model), &analysis).await.unwrap();
        let b = pipeline.generate(model, &analysis).await.unwrap();
        assert_eq!(a.emission.files, b.emission.files);
    }

    #[tokio::test]
    async fn test_missing_contract_file_is_parse_error() {
        let err = load_contract("/definitely/not/here.yaml").await.unwrap_err();
        assert!(matches!(err, Error::ContractParse(_)));
    }
}
