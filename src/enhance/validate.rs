//! Candidate validation: a suggestion becomes a `TestCase` only if the
//! contract can vouch for it

use super::Suggestion;
use crate::contract::{EndpointSpec, ParamLocation};
use crate::scenario::ScenarioCategory;
use crate::testgen::{canonical, conforms, missing_id, Credential, Provenance, TestCase};
use std::collections::BTreeMap;
use std::fmt;

/// Why a candidate was dropped
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    UnknownParameter(String),
    NonConforming(String),
    UndeclaredStatus(u16),
    Duplicate,
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rejection::UnknownParameter(name) => write!(f, "'{}' is not a declared parameter", name),
            Rejection::NonConforming(name) => {
                write!(f, "value for '{}' violates its declared type or bounds", name)
            }
            Rejection::UndeclaredStatus(status) => {
                write!(f, "status {} is neither declared nor conventional", status)
            }
            Rejection::Duplicate => f.write_str("duplicates an existing case"),
        }
    }
}

/// Check a suggestion against the endpoint and turn it into a test case
///
/// Required parameters the suggestion leaves out are filled with canonical
/// values, except for `missing_required_param` where the omission is the point.
/// Credential, replay and the missing id follow the mapped category the same
/// way template cases do.
pub fn validate_suggestion(
    endpoint: &EndpointSpec,
    suggestion: &Suggestion,
    known: &[&TestCase],
) -> Result<TestCase, Rejection> {
    let category = suggestion
        .scenario
        .parse::<ScenarioCategory>()
        .unwrap_or(ScenarioCategory::CreativeSecurity);

    let mut inputs = BTreeMap::new();
    let mut target = None;
    for (name, value) in &suggestion.inputs {
        let param = endpoint
            .parameter(name)
            .ok_or_else(|| Rejection::UnknownParameter(name.clone()))?;
        if !conforms(param, value) {
            if !category.violates_schema() {
                return Err(Rejection::NonConforming(name.clone()));
            }
            target.get_or_insert_with(|| name.clone());
        }
        inputs.insert(name.clone(), value.clone());
    }

    // A not_found suggestion that names no path id gets a missing one
    let path_params = endpoint.path_parameters();
    let missing_target = if category == ScenarioCategory::NotFound
        && !path_params.iter().any(|p| inputs.contains_key(&p.name))
    {
        path_params.first().map(|p| p.name.as_str())
    } else {
        None
    };
    let mut omitted = None;
    for param in &endpoint.parameters {
        if inputs.contains_key(&param.name) {
            continue;
        }
        if missing_target == Some(param.name.as_str()) {
            inputs.insert(param.name.clone(), missing_id(param));
            continue;
        }
        let needed = param.required || param.location == ParamLocation::Path;
        if !needed {
            continue;
        }
        if category == ScenarioCategory::MissingRequiredParam && omitted.is_none() {
            omitted = Some(param.name.clone());
            continue;
        }
        inputs.insert(param.name.clone(), canonical(param));
    }

    if !endpoint.allows_status(suggestion.expected_status) {
        return Err(Rejection::UndeclaredStatus(suggestion.expected_status));
    }

    let parameter = if category.is_per_parameter() {
        target.or(omitted)
    } else {
        None
    };
    let rationale = if suggestion.description.is_empty() {
        suggestion.name.clone()
    } else {
        suggestion.description.clone()
    };

    let credential = match category {
        ScenarioCategory::Unauthorized => Credential::None,
        ScenarioCategory::ForbiddenRole => Credential::User,
        _ => Credential::for_endpoint(endpoint),
    };

    let case = TestCase {
        endpoint: endpoint.id.clone(),
        category,
        parameter,
        inputs,
        credential,
        expected_status: suggestion.expected_status,
        assertions: Vec::new(),
        replay: category == ScenarioCategory::DuplicateConflict,
        provenance: Provenance::Enhanced,
        rationale,
    };

    if known.iter().any(|existing| existing.same_request(&case)) {
        return Err(Rejection::Duplicate);
    }
    Ok(case)
}
