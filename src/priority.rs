//! PriorityScorer: deterministic, explainable gap scores
//!
//! Score = critical tag bonus + placeholder bonus + auth bonus
//!       + per-parameter weight × parameter count.
//! No cross-gap normalization, so a gap's score never depends on the others.

use crate::contract::{ContractModel, EndpointSpec};
use crate::coverage::CoverageModel;
use crate::gaps::Gap;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Weights for each scoring term
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct PriorityWeights {
    #[serde(default = "default_critical_tag")]
    pub critical_tag: i64,
    #[serde(default = "default_placeholder")]
    pub placeholder: i64,
    #[serde(default = "default_auth")]
    pub auth: i64,
    #[serde(default = "default_per_parameter")]
    pub per_parameter: i64,
}

fn default_critical_tag() -> i64 {
    50
}
fn default_placeholder() -> i64 {
    100
}
fn default_auth() -> i64 {
    15
}
fn default_per_parameter() -> i64 {
    5
}

impl Default for PriorityWeights {
    fn default() -> Self {
        Self {
            critical_tag: default_critical_tag(),
            placeholder: default_placeholder(),
            auth: default_auth(),
            per_parameter: default_per_parameter(),
        }
    }
}

/// Business tags that mark an endpoint as critical by default
pub fn default_critical_tags() -> Vec<String> {
    ["Orders", "Cart", "Authentication", "Payments"]
        .into_iter()
        .map(str::to_string)
        .collect()
}

/// One contributing term of a score
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ScoreTerm {
    pub reason: String,
    pub points: i64,
}

/// A gap with its severity, fixed at construction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, JsonSchema)]
pub struct ScoredGap {
    gap: Gap,
    score: i64,
    explanation: Vec<ScoreTerm>,
}

impl ScoredGap {
    pub fn gap(&self) -> &Gap {
        &self.gap
    }

    pub fn score(&self) -> i64 {
        self.score
    }

    pub fn explanation(&self) -> &[ScoreTerm] {
        &self.explanation
    }

    pub fn into_gap(self) -> Gap {
        self.gap
    }

    /// "critical tag (+50), 2 parameters (+10)"
    pub fn explain(&self) -> String {
        if self.explanation.is_empty() {
            return "no weighted factors".to_string();
        }
        self.explanation
            .iter()
            .map(|t| format!("{} (+{})", t.reason, t.points))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Rank order: score descending, then path, method, category, parameter
pub fn rank_order(a: &ScoredGap, b: &ScoredGap) -> Ordering {
    b.score
        .cmp(&a.score)
        .then_with(|| a.gap.endpoint.path.cmp(&b.gap.endpoint.path))
        .then_with(|| a.gap.endpoint.method.cmp(&b.gap.endpoint.method))
        .then_with(|| a.gap.category.cmp(&b.gap.category))
        .then_with(|| a.gap.parameter.cmp(&b.gap.parameter))
}

/// Scores gaps; holds only configuration
#[derive(Debug, Clone)]
pub struct PriorityScorer {
    critical_tags: Vec<String>,
    weights: PriorityWeights,
}

impl Default for PriorityScorer {
    fn default() -> Self {
        Self::new(default_critical_tags(), PriorityWeights::default())
    }
}

impl PriorityScorer {
    pub fn new(critical_tags: Vec<String>, weights: PriorityWeights) -> Self {
        Self {
            critical_tags,
            weights,
        }
    }

    fn is_critical<'a>(&self, endpoint: &'a EndpointSpec) -> Option<&'a str> {
        endpoint.tags.iter().find_map(|tag| {
            self.critical_tags
                .iter()
                .find(|c| c.eq_ignore_ascii_case(tag))
                .map(|_| tag.as_str())
        })
    }

    /// Score one gap against its endpoint
    pub fn score(&self, gap: Gap, endpoint: &EndpointSpec, coverage: &CoverageModel) -> ScoredGap {
        let mut terms = Vec::new();

        if let Some(tag) = self.is_critical(endpoint) {
            terms.push(ScoreTerm {
                reason: format!("critical tag '{}'", tag),
                points: self.weights.critical_tag,
            });
        }
        if coverage.has_placeholder(&endpoint.id) {
            terms.push(ScoreTerm {
                reason: "placeholder test exists".to_string(),
                points: self.weights.placeholder,
            });
        }
        if endpoint.auth_required {
            terms.push(ScoreTerm {
                reason: "auth required".to_string(),
                points: self.weights.auth,
            });
        }
        let count = endpoint.parameters.len() as i64;
        if count > 0 {
            terms.push(ScoreTerm {
                reason: format!(
                    "{} parameter{}",
                    count,
                    if count == 1 { "" } else { "s" }
                ),
                points: self.weights.per_parameter * count,
            });
        }

        ScoredGap {
            gap,
            score: terms.iter().map(|t| t.points).sum(),
            explanation: terms,
        }
    }

    /// Score and rank; gaps whose endpoint is missing from the model are dropped
    pub fn rank(&self, gaps: Vec<Gap>, model: &ContractModel, coverage: &CoverageModel) -> Vec<ScoredGap> {
        let mut scored: Vec<ScoredGap> = gaps
            .into_iter()
            .filter_map(|gap| {
                let endpoint = model.get(&gap.endpoint)?;
                Some(self.score(gap, endpoint, coverage))
            })
            .collect();
        scored.sort_by(rank_order);
        scored
    }
}

/// Split ranked gaps at the threshold; returns (kept, excluded count)
pub fn apply_threshold(ranked: Vec<ScoredGap>, threshold: i64) -> (Vec<ScoredGap>, usize) {
    let total = ranked.len();
    let kept: Vec<ScoredGap> = ranked.into_iter().filter(|g| g.score >= threshold).collect();
    let excluded = total - kept.len();
    (kept, excluded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract::{EndpointId, HttpMethod};
    use crate::coverage::{Observation, Outcome};
    use crate::gaps::identify_gaps;
    use crate::scenario::ScenarioCategory;
    use proptest::prelude::*;

    const CONTRACT: &str = r#"
paths:
  /orders:
    post:
      tags: [Orders]
      security: [ { bearerAuth: [] } ]
      parameters:
        - { name: quantity, in: query, required: true, schema: { type: integer, minimum: 1 } }
      responses: { "201": { description: created } }
  /b/items:
    get:
      responses: { "200": { description: ok } }
  /a/items:
    get:
      responses: { "200": { description: ok } }
"#;

    fn model() -> ContractModel {
        ContractModel::from_document(CONTRACT).unwrap()
    }

    #[test]
    fn test_score_terms() {
        let model = model();
        let id = EndpointId::new("/orders", HttpMethod::Post);
        let mut coverage = CoverageModel::default();
        coverage.record(&Observation {
            endpoint: id.clone(),
            test_id: "stub".into(),
            outcome: Outcome::Placeholder,
        });
        let scored = PriorityScorer::default().score(
            Gap::new(id.clone(), ScenarioCategory::HappyPath, None),
            model.get(&id).unwrap(),
            &coverage,
        );
        assert_eq!(scored.score(), 50 + 100 + 15 + 5);
        assert_eq!(scored.explanation().len(), 4);
        assert!(scored.explain().contains("critical tag 'Orders' (+50)"));
    }

    #[test]
    fn test_equal_scores_order_by_path() {
        let model = model();
        let coverage = CoverageModel::default();
        let ranked = PriorityScorer::default().rank(identify_gaps(&model, &coverage), &model, &coverage);
        let tail: Vec<_> = ranked
            .iter()
            .filter(|g| g.score() == 0)
            .map(|g| g.gap().endpoint.path.as_str())
            .collect();
        assert_eq!(tail, vec!["/a/items", "/b/items"]);
        assert_eq!(ranked[0].gap().endpoint.path, "/orders");
    }

    #[test]
    fn test_threshold_excludes_low_scores() {
        let model = model();
        let coverage = CoverageModel::default();
        let ranked = PriorityScorer::default().rank(identify_gaps(&model, &coverage), &model, &coverage);
        let total = ranked.len();
        let (kept, excluded) = apply_threshold(ranked, 1);
        assert_eq!(excluded, 2);
        assert_eq!(kept.len(), total - 2);
        assert!(kept.iter().all(|g| g.score() >= 1));
    }

    fn arb_gap() -> impl Strategy<Value = Gap> {
        (
            prop::sample::select(vec!["/a", "/b", "/c/{id}"]),
            prop::sample::select(vec![HttpMethod::Get, HttpMethod::Post]),
            prop::sample::select(ScenarioCategory::ALL.to_vec()),
            prop::option::of(prop::sample::select(vec!["x", "y"])),
        )
            .prop_map(|(path, method, category, param)| {
                Gap::new(EndpointId::new(path, method), category, param)
            })
    }

    proptest! {
        #[test]
        fn prop_rank_is_independent_of_input_order(mut gaps in prop::collection::vec(arb_gap(), 0..20)) {
            let scorer = PriorityScorer::default();
            let coverage = CoverageModel::default();
            let endpoint = model().get(&EndpointId::new("/orders", HttpMethod::Post)).unwrap().clone();
            let score_all = |gaps: &[Gap]| {
                let mut scored: Vec<_> = gaps
                    .iter()
                    .map(|g| scorer.score(g.clone(), &endpoint, &coverage))
                    .collect();
                scored.sort_by(rank_order);
                scored.into_iter().map(|s| s.into_gap()).collect::<Vec<_>>()
            };
            let forward = score_all(&gaps);
            gaps.reverse();
            let backward = score_all(&gaps);
            prop_assert_eq!(forward, backward);
        }
    }
}
