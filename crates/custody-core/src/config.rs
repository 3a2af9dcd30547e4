//! Protocol limits and configuration validation
//!
//! `ChainConfig` carries the bounds the engine enforces against adversarial
//! input. Validation accumulates every violated rule before failing so an
//! operator sees all problems in one pass.

use crate::{CustodyError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Default upper bound on nodes in a parsed chain
pub const DEFAULT_MAX_NODES: usize = 64;

/// Default upper bound on claims (leaves) per node
pub const DEFAULT_MAX_CLAIMS_PER_NODE: usize = 256;

/// Hard ceiling accepted for either limit
pub const LIMIT_CEILING: usize = 1 << 16;

/// Trait for configuration validation
pub trait ConfigValidation {
    /// Validate this configuration
    fn validate(&self) -> Result<()>;
}

/// Bounds applied by the chain engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChainConfig {
    /// Maximum number of nodes (root included) a chain may declare
    pub max_nodes: usize,
    /// Maximum number of claims a single node may commit to
    pub max_claims_per_node: usize,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            max_nodes: DEFAULT_MAX_NODES,
            max_claims_per_node: DEFAULT_MAX_CLAIMS_PER_NODE,
        }
    }
}

impl ConfigValidation for ChainConfig {
    fn validate(&self) -> Result<()> {
        let mut validator = ConfigValidator::for_section("chain");
        validator
            .range("max_nodes", self.max_nodes, 1, LIMIT_CEILING)
            .range("max_claims_per_node", self.max_claims_per_node, 1, LIMIT_CEILING);
        validator.finish()
    }
}

/// A single violated configuration rule
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Value is outside its accepted range
    OutOfRange {
        /// Dotted field name
        field: String,
        /// Inclusive lower bound
        min: usize,
        /// Inclusive upper bound
        max: usize,
        /// Supplied value
        actual: usize,
    },
    /// Value is not one of the accepted spellings
    InvalidFormat {
        /// Dotted field name
        field: String,
        /// Description of accepted values
        expected: String,
        /// Supplied value
        actual: String,
    },
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::OutOfRange {
                field,
                min,
                max,
                actual,
            } => write!(f, "field '{field}' must be between {min} and {max} (got {actual})"),
            ValidationError::InvalidFormat {
                field,
                expected,
                actual,
            } => write!(f, "field '{field}' has invalid format, expected {expected}, got '{actual}'"),
        }
    }
}

impl std::error::Error for ValidationError {}

/// Configuration validator that accumulates validation failures
#[derive(Debug, Default)]
pub struct ConfigValidator {
    errors: Vec<ValidationError>,
    section: String,
}

impl ConfigValidator {
    /// Create a validator whose field names are prefixed with `section`
    pub fn for_section(section: &str) -> Self {
        Self {
            errors: Vec::new(),
            section: section.to_string(),
        }
    }

    /// Require `min <= value <= max`
    pub fn range(&mut self, field: &str, value: usize, min: usize, max: usize) -> &mut Self {
        if value < min || value > max {
            self.errors.push(ValidationError::OutOfRange {
                field: self.full_field_name(field),
                min,
                max,
                actual: value,
            });
        }
        self
    }

    /// Require `value` to be one of `allowed` (case-insensitive)
    pub fn one_of(&mut self, field: &str, value: &str, allowed: &[&str]) -> &mut Self {
        if !allowed.iter().any(|a| a.eq_ignore_ascii_case(value)) {
            self.errors.push(ValidationError::InvalidFormat {
                field: self.full_field_name(field),
                expected: format!("one of {}", allowed.join(", ")),
                actual: value.to_string(),
            });
        }
        self
    }

    /// Accumulated failures so far
    pub fn errors(&self) -> &[ValidationError] {
        &self.errors
    }

    /// Collapse accumulated failures into a single configuration error
    pub fn finish(&self) -> Result<()> {
        if self.errors.is_empty() {
            return Ok(());
        }
        let joined = self
            .errors
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("; ");
        Err(CustodyError::config(joined))
    }

    fn full_field_name(&self, field: &str) -> String {
        if self.section.is_empty() {
            field.to_string()
        } else {
            format!("{}.{}", self.section, field)
        }
    }
}
