//! Invariants over generated contracts

use gapgen::{identify_gaps, CallBudget, ContractModel, CoverageModel, EndpointId, HttpMethod, ScenarioCategory};
use proptest::prelude::*;
use std::collections::BTreeSet;
use std::sync::Arc;

/// One endpoint with `n` required, bounded integer query parameters
fn constrained_contract(n: usize, admin: bool) -> String {
    let mut doc = String::from("paths:\n  /items:\n    get:\n");
    if admin {
        doc.push_str("      x-admin-only: true\n");
    }
    doc.push_str("      security: [ { bearerAuth: [] } ]\n      parameters:\n");
    for i in 0..n {
        doc.push_str(&format!(
            "        - {{ name: p{}, in: query, required: true, schema: {{ type: integer, minimum: 1, maximum: 9 }} }}\n",
            i
        ));
    }
    doc.push_str("      responses:\n        \"200\": { description: ok }\n");
    doc
}

const SHOP: &str = r##"
paths:
  /products:
    get:
      parameters:
        - { name: page, in: query, required: true, schema: { type: integer, minimum: 1, maximum: 100 } }
      responses:
        "200": { description: ok }
  /carts/{cartId}:
    put:
      security: [ { bearerAuth: [] } ]
      parameters:
        - { name: cartId, in: path, required: true, schema: { type: integer } }
      responses:
        "200": { description: ok }
        "409": { description: conflict }
"##;

proptest! {
    #[test]
    fn fully_constrained_parameters_yield_every_gap(n in 1usize..6, admin in any::<bool>()) {
        let model = ContractModel::from_document(&constrained_contract(n, admin)).unwrap();
        let gaps = identify_gaps(&model, &CoverageModel::default());
        let floor = n * 4 + 2 + usize::from(admin);
        prop_assert!(gaps.len() >= floor, "{} gaps for n={} admin={}", gaps.len(), n, admin);
    }

    #[test]
    fn crediting_removes_exactly_that_pair(
        endpoint in prop::sample::select(vec![
            ("/products", HttpMethod::Get),
            ("/carts/{cartId}", HttpMethod::Put),
        ]),
        category in prop::sample::select(ScenarioCategory::ALL.to_vec()),
    ) {
        let model = ContractModel::from_document(SHOP).unwrap();
        let id = EndpointId::new(endpoint.0, endpoint.1);
        let before = identify_gaps(&model, &CoverageModel::default());

        let mut coverage = CoverageModel::default();
        coverage.credit(&id, category, "tests/test_shop.py::test_credit");
        let after = identify_gaps(&model, &coverage);

        let expected: Vec<_> = before
            .iter()
            .filter(|g| !(g.endpoint == id && g.category == category))
            .cloned()
            .collect();
        prop_assert_eq!(after, expected);
    }

    #[test]
    fn budget_never_exceeds_limit(limit in 0usize..6, callers in 1usize..24) {
        let budget = Arc::new(CallBudget::new(limit));
        let handles: Vec<_> = (0..callers)
            .map(|_| {
                let budget = Arc::clone(&budget);
                std::thread::spawn(move || budget.try_reserve())
            })
            .collect();
        let granted = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|granted| *granted)
            .count();
        prop_assert_eq!(granted, limit.min(callers));
        prop_assert_eq!(budget.used(), granted);
    }
}

#[test]
fn equal_scores_order_by_path() {
    let model = ContractModel::from_document(
        "paths:\n  /zeta:\n    get:\n      responses: { \"200\": { description: ok } }\n  /alpha:\n    get:\n      responses: { \"200\": { description: ok } }\n",
    )
    .unwrap();
    let coverage = CoverageModel::default();
    let ranked = gapgen::PriorityScorer::default().rank(identify_gaps(&model, &coverage), &model, &coverage);
    let paths: BTreeSet<_> = ranked.iter().map(|g| g.gap().endpoint.path.clone()).collect();
    assert_eq!(paths.len(), 2);
    assert_eq!(ranked[0].gap().endpoint.path, "/alpha");
    assert_eq!(ranked[1].gap().endpoint.path, "/zeta");
}
