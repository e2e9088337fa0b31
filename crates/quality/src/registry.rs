//! Check registry - the fixed set of checks a run fans out to.

use std::collections::HashMap;
use std::sync::Arc;

use qcflow_core::{CheckSpec, RESERVED_ATTRIBUTES};

use crate::error::{QcError, Result};
use crate::evaluator::CheckEvaluator;

/// A check identity paired with its decision function.
#[derive(Clone)]
pub struct RegisteredCheck {
    /// Check identity
    pub spec: CheckSpec,

    /// Decision function
    pub evaluator: Arc<dyn CheckEvaluator>,
}

impl std::fmt::Debug for RegisteredCheck {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegisteredCheck")
            .field("spec", &self.spec)
            .finish_non_exhaustive()
    }
}

/// Registry for QC checks, in registration order.
#[derive(Debug, Default)]
pub struct CheckRegistry {
    checks: Vec<RegisteredCheck>,
    by_name: HashMap<String, usize>,
    by_attribute: HashMap<String, usize>,
}

impl CheckRegistry {
    /// Create a new registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a check. Names and attributes must be unique and attributes
    /// must not shadow record fields.
    pub fn register(
        &mut self,
        spec: CheckSpec,
        evaluator: Arc<dyn CheckEvaluator>,
    ) -> Result<()> {
        if spec.name.trim().is_empty() {
            return Err(QcError::Config("Check name cannot be empty".to_string()));
        }
        if spec.attribute.trim().is_empty() {
            return Err(QcError::Config(format!(
                "Check {} has an empty attribute",
                spec.name
            )));
        }
        if RESERVED_ATTRIBUTES.contains(&spec.attribute.as_str()) {
            return Err(QcError::Config(format!(
                "Check {} uses reserved attribute {}",
                spec.name, spec.attribute
            )));
        }
        if self.by_name.contains_key(&spec.name) {
            return Err(QcError::Config(format!("Duplicate check name {}", spec.name)));
        }
        if self.by_attribute.contains_key(&spec.attribute) {
            return Err(QcError::Config(format!(
                "Duplicate check attribute {}",
                spec.attribute
            )));
        }

        let idx = self.checks.len();
        self.by_name.insert(spec.name.clone(), idx);
        self.by_attribute.insert(spec.attribute.clone(), idx);
        self.checks.push(RegisteredCheck { spec, evaluator });
        Ok(())
    }

    /// Get a check by name.
    pub fn get(&self, name: &str) -> Option<&RegisteredCheck> {
        self.by_name.get(name).map(|&idx| &self.checks[idx])
    }

    /// List all checks.
    pub fn list(&self) -> &[RegisteredCheck] {
        &self.checks
    }

    /// Attributes every run is expected to carry.
    pub fn attributes(&self) -> impl Iterator<Item = &str> {
        self.checks.iter().map(|c| c.spec.attribute.as_str())
    }

    /// Number of checks.
    pub fn len(&self) -> usize {
        self.checks.len()
    }

    /// Whether no checks are registered.
    pub fn is_empty(&self) -> bool {
        self.checks.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluator::StaticEvaluator;

    fn pass() -> Arc<dyn CheckEvaluator> {
        Arc::new(StaticEvaluator::passing())
    }

    #[test]
    fn test_register_and_lookup() {
        let mut registry = CheckRegistry::new();
        registry.register(CheckSpec::new("QCProcess1", "Process1Pass"), pass()).unwrap();
        registry.register(CheckSpec::new("QCProcess2", "Process2Pass"), pass()).unwrap();

        assert_eq!(registry.len(), 2);
        assert_eq!(registry.get("QCProcess2").unwrap().spec.attribute, "Process2Pass");
        assert!(registry.get("QCProcess9").is_none());
        let attrs: Vec<_> = registry.attributes().collect();
        assert_eq!(attrs, vec!["Process1Pass", "Process2Pass"]);
    }

    #[test]
    fn test_register_rejects_duplicates() {
        let mut registry = CheckRegistry::new();
        registry.register(CheckSpec::new("QCProcess1", "Process1Pass"), pass()).unwrap();

        assert!(registry.register(CheckSpec::new("QCProcess1", "Other"), pass()).is_err());
        assert!(registry.register(CheckSpec::new("Other", "Process1Pass"), pass()).is_err());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_register_rejects_reserved_and_empty() {
        let mut registry = CheckRegistry::new();
        assert!(registry.register(CheckSpec::new("Bad", "TotalPass"), pass()).is_err());
        assert!(registry.register(CheckSpec::new("Bad", "GroupID"), pass()).is_err());
        assert!(registry.register(CheckSpec::new("", "Process1Pass"), pass()).is_err());
        assert!(registry.register(CheckSpec::new("Bad", " "), pass()).is_err());
        assert!(registry.is_empty());
    }
}
