//! Scenario categories: the closed set of behavioral test intents
//!
//! The category labels are the contract with downstream harnesses: emitted
//! tests are tagged with both the label and its harness tag so subsets
//! (smoke, validation, boundary, security, negative) can be selected.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Behavioral test intent
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum ScenarioCategory {
    HappyPath,
    MissingRequiredParam,
    BelowMinimum,
    AboveMaximum,
    WrongType,
    Unauthorized,
    ForbiddenRole,
    NotFound,
    DuplicateConflict,
    CreativeSecurity,
}

/// Harness-facing grouping of categories
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum HarnessTag {
    Smoke,
    Validation,
    Boundary,
    Security,
    Negative,
}

impl ScenarioCategory {
    /// Every category, in canonical order
    pub const ALL: [ScenarioCategory; 10] = [
        ScenarioCategory::HappyPath,
        ScenarioCategory::MissingRequiredParam,
        ScenarioCategory::BelowMinimum,
        ScenarioCategory::AboveMaximum,
        ScenarioCategory::WrongType,
        ScenarioCategory::Unauthorized,
        ScenarioCategory::ForbiddenRole,
        ScenarioCategory::NotFound,
        ScenarioCategory::DuplicateConflict,
        ScenarioCategory::CreativeSecurity,
    ];

    /// Stable snake_case label
    pub fn label(self) -> &'static str {
        match self {
            ScenarioCategory::HappyPath => "happy_path",
            ScenarioCategory::MissingRequiredParam => "missing_required_param",
            ScenarioCategory::BelowMinimum => "below_minimum",
            ScenarioCategory::AboveMaximum => "above_maximum",
            ScenarioCategory::WrongType => "wrong_type",
            ScenarioCategory::Unauthorized => "unauthorized",
            ScenarioCategory::ForbiddenRole => "forbidden_role",
            ScenarioCategory::NotFound => "not_found",
            ScenarioCategory::DuplicateConflict => "duplicate_conflict",
            ScenarioCategory::CreativeSecurity => "creative_security",
        }
    }

    pub fn harness_tag(self) -> HarnessTag {
        match self {
            ScenarioCategory::HappyPath => HarnessTag::Smoke,
            ScenarioCategory::MissingRequiredParam | ScenarioCategory::WrongType => {
                HarnessTag::Validation
            }
            ScenarioCategory::BelowMinimum | ScenarioCategory::AboveMaximum => HarnessTag::Boundary,
            ScenarioCategory::Unauthorized
            | ScenarioCategory::ForbiddenRole
            | ScenarioCategory::CreativeSecurity => HarnessTag::Security,
            ScenarioCategory::NotFound | ScenarioCategory::DuplicateConflict => {
                HarnessTag::Negative
            }
        }
    }

    /// Categories that target a single parameter
    pub fn is_per_parameter(self) -> bool {
        matches!(
            self,
            ScenarioCategory::MissingRequiredParam
                | ScenarioCategory::BelowMinimum
                | ScenarioCategory::AboveMaximum
                | ScenarioCategory::WrongType
        )
    }

    /// Categories whose test deliberately sends a request the contract rejects
    pub fn violates_schema(self) -> bool {
        self.is_per_parameter()
    }
}

impl HarnessTag {
    pub fn label(self) -> &'static str {
        match self {
            HarnessTag::Smoke => "smoke",
            HarnessTag::Validation => "validation",
            HarnessTag::Boundary => "boundary",
            HarnessTag::Security => "security",
            HarnessTag::Negative => "negative",
        }
    }
}

impl std::fmt::Display for ScenarioCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

impl std::fmt::Display for HarnessTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for ScenarioCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace(['-', ' '], "_");
        ScenarioCategory::ALL
            .iter()
            .copied()
            .find(|c| c.label() == normalized)
            .ok_or_else(|| format!("unknown scenario category: {}", s))
    }
}
