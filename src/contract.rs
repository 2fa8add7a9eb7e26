//! Structural contracts: named specifications a facet's shape must satisfy.

use crate::ctx::Ctx;
use crate::error::FacetError;
use crate::facet::{Api, Facet};
use crate::subsystem::SubsystemHandle;
use std::collections::HashMap;
use std::sync::Arc;

pub type Validator = Arc<
    dyn Fn(&Ctx, &Api, &SubsystemHandle, &Facet) -> Result<(), FacetError> + Send + Sync,
>;

#[derive(Clone)]
pub struct Contract {
    pub name: String,
    pub required_methods: Vec<String>,
    pub required_properties: Vec<String>,
    pub validate: Option<Validator>,
}

impl Contract {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            required_methods: Vec::new(),
            required_properties: Vec::new(),
            validate: None,
        }
    }

    pub fn methods(mut self, methods: &[&str]) -> Self {
        self.required_methods = methods.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn properties(mut self, properties: &[&str]) -> Self {
        self.required_properties = properties.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn validator(mut self, f: Validator) -> Self {
        self.validate = Some(f);
        self
    }

    /// Enforcement order is fixed: methods, then properties, then the
    /// custom validator.
    pub fn enforce(
        &self,
        ctx: &Ctx,
        api: &Api,
        subsystem: &SubsystemHandle,
        facet: &Facet,
    ) -> Result<(), FacetError> {
        let missing_methods: Vec<&str> = self
            .required_methods
            .iter()
            .filter(|m| !matches!(facet.members().get(*m), Some(member) if member.is_method()))
            .map(|s| s.as_str())
            .collect();
        if !missing_methods.is_empty() {
            return Err(FacetError::ContractValidationError {
                kind: facet.kind().to_string(),
                source: facet.source().to_string(),
                contract: self.name.clone(),
                cause: format!("missing required methods: {}", missing_methods.join(", ")),
            });
        }

        let missing_props: Vec<&str> = self
            .required_properties
            .iter()
            .filter(|p| facet.members().get(*p).is_none())
            .map(|s| s.as_str())
            .collect();
        if !missing_props.is_empty() {
            return Err(FacetError::ContractValidationError {
                kind: facet.kind().to_string(),
                source: facet.source().to_string(),
                contract: self.name.clone(),
                cause: format!("missing required properties: {}", missing_props.join(", ")),
            });
        }

        if let Some(validate) = &self.validate {
            validate(ctx, api, subsystem, facet).map_err(|cause| FacetError::ContractValidationError {
                kind: facet.kind().to_string(),
                source: facet.source().to_string(),
                contract: self.name.clone(),
                cause: format!("validation failed: {cause}"),
            })?;
        }

        Ok(())
    }
}

/// Insertion-ordered registry of named contracts.
#[derive(Clone, Default)]
pub struct ContractRegistry {
    order: Vec<String>,
    contracts: HashMap<String, Contract>,
}

impl ContractRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, contract: Contract) -> Result<(), FacetError> {
        if self.contracts.contains_key(&contract.name) {
            return Err(FacetError::InvalidArgument(format!(
                "contract '{}' is already registered",
                contract.name
            )));
        }
        self.order.push(contract.name.clone());
        self.contracts.insert(contract.name.clone(), contract);
        Ok(())
    }

    pub fn has(&self, name: &str) -> bool {
        self.contracts.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<&Contract> {
        self.contracts.get(name)
    }

    pub fn enforce(
        &self,
        name: &str,
        ctx: &Ctx,
        api: &Api,
        subsystem: &SubsystemHandle,
        facet: &Facet,
    ) -> Result<(), FacetError> {
        match self.get(name) {
            Some(contract) => contract.enforce(ctx, api, subsystem, facet),
            None => Err(FacetError::UnknownContract {
                kind: facet.kind().to_string(),
                source: facet.source().to_string(),
                contract: name.to_string(),
            }),
        }
    }

    pub fn remove(&mut self, name: &str) {
        if self.contracts.remove(name).is_some() {
            self.order.retain(|n| n != name);
        }
    }

    pub fn list(&self) -> &[String] {
        &self.order
    }

    pub fn size(&self) -> usize {
        self.order.len()
    }

    pub fn clear(&mut self) {
        self.order.clear();
        self.contracts.clear();
    }
}

/// The six standard contracts named by the external interface. Only their
/// shape is specified here; no router/queue/scheduler behavior is implemented.
pub fn default_contract_registry() -> ContractRegistry {
    let mut registry = ContractRegistry::new();

    registry
        .register(
            Contract::new("router")
                .methods(&["registerRoute", "match", "route", "unregisterRoute", "hasRoute", "getRoutes"])
                .properties(&["_routeRegistry"]),
        )
        .expect("standard contracts register exactly once");

    registry
        .register(
            Contract::new("queue")
                .methods(&["selectNextMessage", "hasMessagesToProcess", "getQueueStatus"])
                .properties(&["_queueManager", "queue"])
                .validator(Arc::new(|_ctx, _api, _subsystem, facet| {
                    match facet.members().get("_queueManager") {
                        Some(member) if member.is_method() => Err(FacetError::ContractViolation(
                            "'_queueManager' must be an object, not a method".into(),
                        )),
                        _ => Ok(()),
                    }
                })),
        )
        .expect("standard contracts register exactly once");

    registry
        .register(
            Contract::new("processor")
                .methods(&["accept", "processMessage", "processTick", "processImmediately"]),
        )
        .expect("standard contracts register exactly once");

    registry
        .register(
            Contract::new("listeners")
                .methods(&["on", "off", "hasListeners", "enableListeners", "disableListeners"])
                .properties(&["listeners"]),
        )
        .expect("standard contracts register exactly once");

    registry
        .register(
            Contract::new("hierarchy")
                .methods(&[
                    "addChild", "removeChild", "getChild", "listChildren", "setParent",
                    "getParent", "isRoot", "getRoot", "getLineage",
                ])
                .properties(&["children"]),
        )
        .expect("standard contracts register exactly once");

    registry
        .register(
            Contract::new("scheduler")
                .methods(&[
                    "process", "pauseProcessing", "resumeProcessing", "isPaused",
                    "isProcessing", "getPriority", "setPriority", "configureScheduler",
                    "getScheduler",
                ])
                .properties(&["_scheduler"]),
        )
        .expect("standard contracts register exactly once");

    registry
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::facet::FacetOptions;

    fn method() -> crate::facet::Member {
        crate::facet::Member::Method(Arc::new(|_args| Ok(serde_json::Value::Null)))
    }

    #[test]
    fn empty_contract_passes_anything() {
        let registry = {
            let mut r = ContractRegistry::new();
            r.register(Contract::new("anything")).unwrap();
            r
        };
        let facet = Facet::new(
            "k",
            FacetOptions { source: "t".into(), attach: false, overwrite: false, contract: None },
        )
        .unwrap();
        let subsystem = crate::subsystem::Subsystem::new("root", serde_json::json!({}));
        let api = crate::facet::Api::new();
        assert!(registry
            .enforce("anything", &serde_json::json!({}), &api, &subsystem.handle(), &facet)
            .is_ok());
    }

    #[test]
    fn unknown_contract_errors() {
        let registry = ContractRegistry::new();
        let facet = Facet::new(
            "k",
            FacetOptions { source: "t".into(), attach: false, overwrite: false, contract: None },
        )
        .unwrap();
        let subsystem = crate::subsystem::Subsystem::new("root", serde_json::json!({}));
        let api = crate::facet::Api::new();
        let err = registry
            .enforce("nope", &serde_json::json!({}), &api, &subsystem.handle(), &facet)
            .unwrap_err();
        assert!(matches!(err, FacetError::UnknownContract { .. }));
    }

    #[test]
    fn missing_required_method_is_reported() {
        let mut registry = ContractRegistry::new();
        registry.register(Contract::new("needs-foo").methods(&["foo"])).unwrap();
        let facet = Facet::new(
            "k",
            FacetOptions { source: "t".into(), attach: false, overwrite: false, contract: None },
        )
        .unwrap();
        let subsystem = crate::subsystem::Subsystem::new("root", serde_json::json!({}));
        let api = crate::facet::Api::new();
        let err = registry
            .enforce("needs-foo", &serde_json::json!({}), &api, &subsystem.handle(), &facet)
            .unwrap_err();
        match err {
            FacetError::ContractValidationError { cause, .. } => assert!(cause.contains("foo")),
            other => panic!("expected ContractValidationError, got {other}"),
        }
    }

    #[test]
    fn methods_checked_before_properties() {
        let mut registry = ContractRegistry::new();
        registry
            .register(Contract::new("both").methods(&["foo"]).properties(&["bar"]))
            .unwrap();
        let facet = Facet::new(
            "k",
            FacetOptions { source: "t".into(), attach: false, overwrite: false, contract: None },
        )
        .unwrap();
        let subsystem = crate::subsystem::Subsystem::new("root", serde_json::json!({}));
        let api = crate::facet::Api::new();
        let err = registry
            .enforce("both", &serde_json::json!({}), &api, &subsystem.handle(), &facet)
            .unwrap_err();
        match err {
            FacetError::ContractValidationError { cause, .. } => assert!(cause.contains("methods")),
            other => panic!("expected ContractValidationError, got {other}"),
        }
        let _ = method();
    }

    #[test]
    fn default_registry_has_six_standard_contracts() {
        let registry = default_contract_registry();
        assert_eq!(registry.size(), 6);
        for name in ["router", "queue", "processor", "listeners", "hierarchy", "scheduler"] {
            assert!(registry.has(name));
        }
    }
}
