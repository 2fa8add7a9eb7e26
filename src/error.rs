//! Error taxonomy for the composition runtime.
//!
//! One enum, one variant per failure domain named in the external
//! contract (hook shape, contract violation, dependency cycle, ...), each
//! carrying enough structured context to print a precise diagnostic.

use std::fmt;

#[derive(Clone)]
pub enum FacetError {
    InvalidArgument(String),
    StateError(String),
    HookShapeError { source: String, message: String },
    HookExecutionError { kind: String, source: String, cause: String },
    FacetShapeError { source: String, message: String },
    DuplicateKind { kind: String, first_source: String, second_source: String },
    ContractViolation(String),
    ContractValidationError { kind: String, source: String, contract: String, cause: String },
    UnknownContract { kind: String, source: String, contract: String },
    MissingDependency { kind: String, dependency: String },
    DependencyCycle(Vec<String>),
    InvalidPlan(String),
    ChildBuildError { child: String, cause: Box<FacetError> },
}

impl fmt::Display for FacetError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FacetError::InvalidArgument(msg) => write!(f, "invalid argument: {msg}"),
            FacetError::StateError(msg) => write!(f, "invalid state: {msg}"),
            FacetError::HookShapeError { source, message } => {
                write!(f, "hook from '{source}' has invalid shape: {message}")
            }
            FacetError::HookExecutionError { kind, source, cause } => {
                write!(f, "hook '{kind}' (source {source}) failed: {cause}")
            }
            FacetError::FacetShapeError { source, message } => {
                write!(f, "facet returned by hook from '{source}' has invalid shape: {message}")
            }
            FacetError::DuplicateKind { kind, first_source, second_source } => write!(
                f,
                "duplicate facet kind '{kind}': already provided by '{first_source}', \
                 also provided by '{second_source}' without mutual overwrite consent"
            ),
            FacetError::ContractViolation(msg) => write!(f, "contract violation: {msg}"),
            FacetError::ContractValidationError { kind, source, contract, cause } => write!(
                f,
                "facet '{kind}' (source {source}) failed contract validation for '{contract}': {cause}"
            ),
            FacetError::UnknownContract { kind, source, contract } => write!(
                f,
                "facet '{kind}' (source {source}) references unknown contract '{contract}'"
            ),
            FacetError::MissingDependency { kind, dependency } => write!(
                f,
                "facet '{kind}' depends on '{dependency}', which no hook provides"
            ),
            FacetError::DependencyCycle(cycle) => {
                write!(f, "dependency cycle detected: {}", cycle.join(" -> "))
            }
            FacetError::InvalidPlan(msg) => write!(f, "invalid build plan: {msg}"),
            FacetError::ChildBuildError { child, cause } => {
                write!(f, "failed to build child subsystem '{child}': {cause}")
            }
        }
    }
}

impl fmt::Debug for FacetError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        <Self as fmt::Display>::fmt(self, f)
    }
}

impl std::error::Error for FacetError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_contract_and_kind() {
        let err = FacetError::ContractValidationError {
            kind: "db".into(),
            source: "plugin-a".into(),
            contract: "processor".into(),
            cause: "missing method 'accept'".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("'db'"));
        assert!(msg.contains("'processor'"));
        assert!(msg.contains("missing method 'accept'"));
    }

    #[test]
    fn cycle_message_joins_path() {
        let err = FacetError::DependencyCycle(vec!["a".into(), "b".into(), "a".into()]);
        assert_eq!(err.to_string(), "dependency cycle detected: a -> b -> a");
    }

    #[test]
    fn debug_delegates_to_display() {
        let err = FacetError::StateError("already built".into());
        assert_eq!(format!("{err:?}"), format!("{err}"));
    }
}
