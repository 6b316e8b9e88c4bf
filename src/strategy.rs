//! Case strategies: template synthesis and budgeted enhancement behind one trait
//!
//! Strategies run in order for each endpoint; later strategies see the cases
//! earlier ones produced. A required strategy's failure aborts the run, an
//! optional one only loses its own cases.

use crate::contract::EndpointSpec;
use crate::enhance::Enhancer;
use crate::error::{Error, Result, Warning};
use crate::priority::ScoredGap;
use crate::scenario::ScenarioCategory;
use crate::testgen::{TemplateGenerator, TestCase};
use async_trait::async_trait;
use futures::FutureExt;
use std::collections::BTreeSet;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

/// One endpoint's generation input, owned by its task
#[derive(Debug, Clone)]
pub struct EndpointWork {
    pub endpoint: EndpointSpec,
    /// Kept gaps, in rank order
    pub gaps: Vec<ScoredGap>,
    /// Categories existing tests already cover
    pub covered: BTreeSet<ScenarioCategory>,
    /// Whether a call slot was reserved for this endpoint
    pub enhancement_slot: bool,
}

/// What a strategy contributed for one endpoint
#[derive(Debug, Clone, Default)]
pub struct StrategyOutput {
    pub cases: Vec<TestCase>,
    pub rejected: usize,
    pub calls: usize,
    pub warnings: Vec<Warning>,
}

impl StrategyOutput {
    fn absorb(&mut self, other: StrategyOutput) {
        self.cases.extend(other.cases);
        self.rejected += other.rejected;
        self.calls += other.calls;
        self.warnings.extend(other.warnings);
    }
}

#[async_trait]
pub trait CaseStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    /// Optional strategies degrade to warnings instead of failing the run
    fn is_optional(&self) -> bool {
        false
    }

    async fn cases(&self, work: &EndpointWork, existing: &[TestCase]) -> Result<StrategyOutput>;
}

/// One template case per gap
#[derive(Debug, Clone, Default)]
pub struct TemplateStrategy {
    generator: TemplateGenerator,
}

impl TemplateStrategy {
    pub fn new(generator: TemplateGenerator) -> Self {
        Self { generator }
    }
}

#[async_trait]
impl CaseStrategy for TemplateStrategy {
    fn name(&self) -> &'static str {
        "template"
    }

    async fn cases(&self, work: &EndpointWork, _existing: &[TestCase]) -> Result<StrategyOutput> {
        let cases = work
            .gaps
            .iter()
            .map(|scored| self.generator.generate(scored.gap(), &work.endpoint))
            .collect::<Result<Vec<_>>>()?;
        Ok(StrategyOutput {
            cases,
            ..StrategyOutput::default()
        })
    }
}

/// Service suggestions for endpoints holding a reserved call slot
#[derive(Debug)]
pub struct EnhancedStrategy {
    enhancer: Enhancer,
}

impl EnhancedStrategy {
    pub fn new(enhancer: Enhancer) -> Self {
        Self { enhancer }
    }

    pub fn enhancer(&self) -> &Enhancer {
        &self.enhancer
    }
}

#[async_trait]
impl CaseStrategy for EnhancedStrategy {
    fn name(&self) -> &'static str {
        "enhanced"
    }

    fn is_optional(&self) -> bool {
        true
    }

    async fn cases(&self, work: &EndpointWork, existing: &[TestCase]) -> Result<StrategyOutput> {
        if !work.enhancement_slot {
            return Ok(StrategyOutput::default());
        }
        let enhancement = self
            .enhancer
            .enhance_reserved(&work.endpoint, &work.covered, existing)
            .await;
        Ok(StrategyOutput {
            cases: enhancement.cases,
            rejected: enhancement.rejected,
            calls: usize::from(enhancement.called),
            warnings: enhancement.warning.into_iter().collect(),
        })
    }
}

/// Run every strategy for one endpoint, isolating optional ones
pub async fn run_strategies(
    strategies: &[Arc<dyn CaseStrategy>],
    work: &EndpointWork,
) -> Result<StrategyOutput> {
    let mut output = StrategyOutput::default();

    for strategy in strategies {
        let attempt = AssertUnwindSafe(strategy.cases(work, &output.cases))
            .catch_unwind()
            .await;

        let failure = match attempt {
            Ok(Ok(contributed)) => {
                output.absorb(contributed);
                continue;
            }
            Ok(Err(e)) if !strategy.is_optional() => return Err(e),
            Ok(Err(e)) => e.to_string(),
            Err(_) if !strategy.is_optional() => {
                return Err(Error::Other(format!(
                    "{} strategy panicked for {}",
                    strategy.name(),
                    work.endpoint.id
                )))
            }
            Err(_) => "task panicked".to_string(),
        };

        tracing::warn!(
            endpoint = %work.endpoint.id,
            strategy = strategy.name(),
            reason = %failure,
            "optional strategy failed"
        );
        output.warnings.push(Warning::EnhancementUnavailable {
            endpoint: Some(work.endpoint.id.to_string()),
            reason: failure,
        });
    }

    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coverage::CoverageModel;
    use crate::enhance::tests::{products, suggestion, Canned};
    use crate::enhance::CallBudget;
    use crate::gaps::endpoint_gaps;
    use crate::priority::PriorityScorer;
    use crate::testgen::Provenance;
    use serde_json::json;
    use std::time::Duration;

    fn work(slot: bool) -> EndpointWork {
        let endpoint = products();
        let coverage = CoverageModel::default();
        let scorer = PriorityScorer::default();
        let gaps = endpoint_gaps(&endpoint, &coverage)
            .into_iter()
            .map(|g| scorer.score(g, &endpoint, &coverage))
            .collect();
        EndpointWork {
            endpoint,
            gaps,
            covered: BTreeSet::new(),
            enhancement_slot: slot,
        }
    }

    fn enhanced() -> Arc<dyn CaseStrategy> {
        let source = Canned::new(vec![suggestion(
            "creative_security",
            json!({ "page": 7, "q": "%00" }),
            200,
        )]);
        Arc::new(EnhancedStrategy::new(Enhancer::new(
            Arc::new(source),
            Arc::new(CallBudget::new(1)),
            Duration::from_secs(5),
            5,
        )))
    }

    struct Panicking;

    #[async_trait]
    impl CaseStrategy for Panicking {
        fn name(&self) -> &'static str {
            "panicking"
        }

        fn is_optional(&self) -> bool {
            true
        }

        async fn cases(&self, _work: &EndpointWork, _existing: &[TestCase]) -> Result<StrategyOutput> {
            panic!("boom")
        }
    }

    #[tokio::test]
    async fn test_template_then_enhanced() {
        let strategies: Vec<Arc<dyn CaseStrategy>> =
            vec![Arc::new(TemplateStrategy::default()), enhanced()];
        let out = run_strategies(&strategies, &work(true)).await.unwrap();

        assert_eq!(out.calls, 1);
        let enhanced = out
            .cases
            .iter()
            .filter(|c| c.provenance == Provenance::Enhanced)
            .count();
        assert_eq!(enhanced, 1);
        assert_eq!(out.cases.len(), 5 + 1);
    }

    #[tokio::test]
    async fn test_no_slot_means_no_call() {
        let strategies: Vec<Arc<dyn CaseStrategy>> =
            vec![Arc::new(TemplateStrategy::default()), enhanced()];
        let out = run_strategies(&strategies, &work(false)).await.unwrap();
        assert_eq!(out.calls, 0);
        assert_eq!(out.cases.len(), 5);
    }

    #[tokio::test]
    async fn test_optional_panic_keeps_template_cases() {
        let strategies: Vec<Arc<dyn CaseStrategy>> =
            vec![Arc::new(TemplateStrategy::default()), Arc::new(Panicking)];
        let out = run_strategies(&strategies, &work(true)).await.unwrap();
        assert_eq!(out.cases.len(), 5);
        assert_eq!(out.warnings.len(), 1);
    }

    #[tokio::test]
    async fn test_unsupported_template_is_fatal() {
        let generator = TemplateGenerator::without_rules([ScenarioCategory::BelowMinimum]);
        let strategies: Vec<Arc<dyn CaseStrategy>> = vec![Arc::new(TemplateStrategy::new(generator))];
        let err = run_strategies(&strategies, &work(false)).await.unwrap_err();
        assert!(matches!(err, Error::UnsupportedScenario { .. }));
    }
}
