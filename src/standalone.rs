//! A minimal pre-configured subsystem: enough default hooks to satisfy the
//! `listeners` contract out of the box, so a caller can build something
//! without first hand-assembling default hooks.

use crate::contract::default_contract_registry;
use crate::ctx::Ctx;
use crate::error::FacetError;
use crate::facet::{Facet, FacetOptions, Member};
use crate::hook::{create_hook, HookFn};
use crate::subsystem::Subsystem;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

pub struct StandalonePluginSystem(Subsystem);

impl StandalonePluginSystem {
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_ctx(name, serde_json::json!({}))
    }

    pub fn with_ctx(name: impl Into<String>, ctx: Ctx) -> Self {
        let subsystem = Subsystem::with_contracts(name, ctx, default_contract_registry());
        subsystem.add_default_hook(listeners_hook());
        Self(subsystem)
    }

    pub fn subsystem(&self) -> Subsystem {
        self.0.clone()
    }

    pub fn use_hook(&self, hook: crate::hook::Hook) -> Result<&Self, FacetError> {
        self.0.use_hook(hook)?;
        Ok(self)
    }

    pub async fn build(&self) -> Result<(), FacetError> {
        self.0.build().await
    }

    pub async fn dispose(&self) -> Result<(), FacetError> {
        self.0.dispose().await
    }
}

fn listeners_hook() -> crate::hook::Hook {
    let factory: HookFn = Arc::new(|_ctx, _api, _subsystem| {
        Box::pin(async {
            let listeners: Arc<Mutex<HashMap<String, Vec<Arc<dyn Fn() + Send + Sync>>>>> =
                Arc::new(Mutex::new(HashMap::new()));

            let mut facet = Facet::new(
                "listeners",
                FacetOptions {
                    source: "standalone".into(),
                    attach: true,
                    overwrite: false,
                    contract: Some("listeners".into()),
                },
            )?;

            let reg = listeners.clone();
            let on: Arc<dyn Fn(&[serde_json::Value]) -> Result<serde_json::Value, FacetError> + Send + Sync> =
                Arc::new(move |args| {
                    let event = args
                        .first()
                        .and_then(|v| v.as_str())
                        .ok_or_else(|| FacetError::InvalidArgument("on(event, ...) requires an event name".into()))?;
                    reg.lock().unwrap().entry(event.to_string()).or_default();
                    Ok(serde_json::Value::Null)
                });

            let reg = listeners.clone();
            let off: Arc<dyn Fn(&[serde_json::Value]) -> Result<serde_json::Value, FacetError> + Send + Sync> =
                Arc::new(move |args| {
                    if let Some(event) = args.first().and_then(|v| v.as_str()) {
                        reg.lock().unwrap().remove(event);
                    }
                    Ok(serde_json::Value::Null)
                });

            let reg = listeners.clone();
            let has_listeners: Arc<dyn Fn(&[serde_json::Value]) -> Result<serde_json::Value, FacetError> + Send + Sync> =
                Arc::new(move |_args| Ok(serde_json::Value::Bool(!reg.lock().unwrap().is_empty())));

            let enabled = Arc::new(Mutex::new(true));
            let e = enabled.clone();
            let enable: Arc<dyn Fn(&[serde_json::Value]) -> Result<serde_json::Value, FacetError> + Send + Sync> =
                Arc::new(move |_args| {
                    *e.lock().unwrap() = true;
                    Ok(serde_json::Value::Null)
                });
            let e = enabled.clone();
            let disable: Arc<dyn Fn(&[serde_json::Value]) -> Result<serde_json::Value, FacetError> + Send + Sync> =
                Arc::new(move |_args| {
                    *e.lock().unwrap() = false;
                    Ok(serde_json::Value::Null)
                });

            let mut members = HashMap::new();
            members.insert("on".to_string(), Member::Method(on));
            members.insert("off".to_string(), Member::Method(off));
            members.insert("hasListeners".to_string(), Member::Method(has_listeners));
            members.insert("enableListeners".to_string(), Member::Method(enable));
            members.insert("disableListeners".to_string(), Member::Method(disable));
            members.insert("listeners".to_string(), Member::Value(listeners));
            facet.add(members)?;

            Ok(Some(facet))
        })
    });
    create_hook("listeners", "standalone-plugin-system", vec![], false, true, factory).unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn builds_with_listeners_satisfied() {
        let system = StandalonePluginSystem::new("standalone");
        system.build().await.unwrap();
        assert!(system.subsystem().find("listeners").is_some());
    }

    #[tokio::test]
    async fn user_hooks_compose_with_default_listeners() {
        let system = StandalonePluginSystem::new("standalone");
        let factory: HookFn = Arc::new(|_ctx, _api, _subsystem| {
            Box::pin(async {
                Ok(Some(Facet::new(
                    "extra",
                    FacetOptions { source: "user".into(), attach: false, overwrite: false, contract: None },
                )?))
            })
        });
        system
            .use_hook(create_hook("extra", "user", vec![], false, false, factory).unwrap())
            .unwrap();
        system.build().await.unwrap();
        assert!(system.subsystem().find("listeners").is_some());
        assert!(system.subsystem().find("extra").is_some());
    }
}
