//! The subsystem: a container composed from hooks, with hierarchical
//! parent/child relationships and a public api surface.

use crate::builder::Builder;
use crate::config::RuntimeConfig;
use crate::contract::ContractRegistry;
use crate::ctx::Ctx;
use crate::error::FacetError;
use crate::facet::Api;
use crate::facet_manager::FacetManager;
use crate::hook::Hook;
use std::sync::{Arc, Mutex, Weak};

type LifecycleCallback = crate::facet::LifecycleCallback;

/// The ambient "message system" a subsystem may be embedded in, modeled
/// only down to the one boundary the verifier's kernel-services-stripping
/// step needs. Everything else about it is out of scope and unmodeled.
pub trait MessageSystem: Send + Sync {
    fn is_kernel_init(&self) -> bool;
}

struct Inner {
    name: String,
    ctx: Ctx,
    default_hooks: Vec<Hook>,
    hooks: Vec<Hook>,
    api: Api,
    facets: FacetManager,
    contracts: ContractRegistry,
    config: RuntimeConfig,
    ms: Option<Arc<dyn MessageSystem>>,
    built_once: bool,
    built_now: bool,
    parent: Option<Weak<Mutex<Inner>>>,
    children: Vec<Subsystem>,
    init_callbacks: Vec<LifecycleCallback>,
    dispose_callbacks: Vec<LifecycleCallback>,
}

/// A subsystem assembled from hooks. Cheaply cloneable - clones share the
/// same underlying state, the way a handle passed into hook factories and
/// contract validators needs to.
#[derive(Clone)]
pub struct Subsystem(Arc<Mutex<Inner>>);

/// Alias used at the seams (hook factories, contract validators, lifecycle
/// callbacks) where only a reference into the running subsystem is needed.
pub type SubsystemHandle = Subsystem;

impl Subsystem {
    pub fn new(name: impl Into<String>, ctx: Ctx) -> Self {
        Self::with_config(
            name,
            ctx,
            crate::contract::default_contract_registry(),
            RuntimeConfig::default(),
        )
    }

    pub fn with_contracts(name: impl Into<String>, ctx: Ctx, contracts: ContractRegistry) -> Self {
        Self::with_config(name, ctx, contracts, RuntimeConfig::default())
    }

    pub fn with_config(
        name: impl Into<String>,
        ctx: Ctx,
        contracts: ContractRegistry,
        config: RuntimeConfig,
    ) -> Self {
        Self(Arc::new(Mutex::new(Inner {
            name: name.into(),
            ctx,
            default_hooks: Vec::new(),
            hooks: Vec::new(),
            api: Api::new(),
            facets: FacetManager::new(),
            contracts,
            config,
            ms: None,
            built_once: false,
            built_now: false,
            parent: None,
            children: Vec::new(),
            init_callbacks: Vec::new(),
            dispose_callbacks: Vec::new(),
        })))
    }

    pub fn handle(&self) -> SubsystemHandle {
        self.clone()
    }

    pub fn name(&self) -> String {
        self.0.lock().unwrap().name.clone()
    }

    pub fn ctx(&self) -> Ctx {
        self.0.lock().unwrap().ctx.clone()
    }

    pub fn set_ctx(&self, ctx: Ctx) {
        self.0.lock().unwrap().ctx = ctx;
    }

    pub fn api(&self) -> Api {
        self.0.lock().unwrap().api.clone()
    }

    pub fn contracts(&self) -> ContractRegistry {
        self.0.lock().unwrap().contracts.clone()
    }

    pub fn config(&self) -> RuntimeConfig {
        self.0.lock().unwrap().config.clone()
    }

    pub fn set_ms(&self, ms: Option<Arc<dyn MessageSystem>>) {
        self.0.lock().unwrap().ms = ms;
    }

    /// `false` when no message system is attached - the verifier's kernel-
    /// services stripping step (SPEC_FULL §4.6 step 4) is then a no-op.
    pub fn is_kernel_init(&self) -> bool {
        self.0
            .lock()
            .unwrap()
            .ms
            .as_ref()
            .is_some_and(|m| m.is_kernel_init())
    }

    pub fn add_default_hook(&self, hook: Hook) {
        self.0.lock().unwrap().default_hooks.push(hook);
    }

    pub fn default_hooks(&self) -> Vec<Hook> {
        self.0.lock().unwrap().default_hooks.clone()
    }

    pub fn user_hooks(&self) -> Vec<Hook> {
        self.0.lock().unwrap().hooks.clone()
    }

    pub fn built_once(&self) -> bool {
        self.0.lock().unwrap().built_once
    }

    pub fn built_now(&self) -> bool {
        self.0.lock().unwrap().built_now
    }

    pub fn find(&self, kind: &str) -> Option<crate::facet::Facet> {
        self.0.lock().unwrap().facets.find(kind).cloned()
    }

    /// Swap the installed [`FacetManager`] out so it can be driven across
    /// an `await` point without holding the subsystem's lock.
    pub(crate) fn take_facet_manager(&self) -> FacetManager {
        std::mem::take(&mut self.0.lock().unwrap().facets)
    }

    pub(crate) fn restore_facet_manager(&self, manager: FacetManager) {
        self.0.lock().unwrap().facets = manager;
    }

    pub fn children(&self) -> Vec<Subsystem> {
        self.0.lock().unwrap().children.clone()
    }

    pub fn add_child(&self, child: Subsystem) {
        {
            let mut child_inner = child.0.lock().unwrap();
            child_inner.parent = Some(Arc::downgrade(&self.0));
        }
        self.0.lock().unwrap().children.push(child);
    }

    pub fn parent(&self) -> Option<Subsystem> {
        self.0
            .lock()
            .unwrap()
            .parent
            .as_ref()
            .and_then(|w| w.upgrade())
            .map(Subsystem)
    }

    /// Append a hook. Rejected once this build cycle has already run.
    pub fn use_hook(&self, hook: Hook) -> Result<Self, FacetError> {
        let mut inner = self.0.lock().unwrap();
        if inner.built_once {
            return Err(FacetError::StateError(
                "cannot add hooks after build".into(),
            ));
        }
        inner.hooks.push(hook);
        drop(inner);
        Ok(self.clone())
    }

    pub fn on_init(&self, cb: LifecycleCallback) -> Result<Self, FacetError> {
        let mut inner = self.0.lock().unwrap();
        if inner.built_once {
            return Err(FacetError::StateError(
                "cannot add init callbacks after build".into(),
            ));
        }
        inner.init_callbacks.push(cb);
        drop(inner);
        Ok(self.clone())
    }

    pub fn on_dispose(&self, cb: LifecycleCallback) -> Result<Self, FacetError> {
        let mut inner = self.0.lock().unwrap();
        if inner.built_once {
            return Err(FacetError::StateError(
                "cannot add dispose callbacks after build".into(),
            ));
        }
        inner.dispose_callbacks.push(cb);
        drop(inner);
        Ok(self.clone())
    }

    fn init_callbacks(&self) -> Vec<LifecycleCallback> {
        self.0.lock().unwrap().init_callbacks.clone()
    }

    fn dispose_callbacks(&self) -> Vec<LifecycleCallback> {
        self.0.lock().unwrap().dispose_callbacks.clone()
    }

    /// Build this subsystem via a fresh [`Builder`]. Idempotent while
    /// already built; a prior `dispose()` permits a clean rebuild.
    pub async fn build(&self) -> Result<(), FacetError> {
        if self.built_now() {
            return Ok(());
        }
        let mut builder = Builder::new(self.handle());
        let plan = builder.plan().await?;
        builder.build_plan(plan).await?;

        for cb in self.init_callbacks() {
            cb(self.ctx(), self.handle()).await?;
        }

        let mut inner = self.0.lock().unwrap();
        inner.built_once = true;
        inner.built_now = true;
        Ok(())
    }

    /// Dispose subsystem callbacks, then children (reverse order), then
    /// installed facets, in that order - the exact reverse of `build()`.
    pub async fn dispose(&self) -> Result<(), FacetError> {
        let mut errors = Vec::new();

        for cb in self.dispose_callbacks().into_iter().rev() {
            if let Err(e) = cb(self.ctx(), self.handle()).await {
                errors.push(e.to_string());
            }
        }

        let children = self.children();
        for child in children.into_iter().rev() {
            if let Err(e) = Box::pin(child.dispose()).await {
                errors.push(e.to_string());
            }
        }

        let ctx = self.ctx();
        let handle = self.handle();
        let mut manager = self.take_facet_manager();
        let facet_result = manager.dispose_all(ctx, handle).await;
        self.restore_facet_manager(manager);
        if let Err(e) = facet_result {
            errors.push(e.to_string());
        }

        self.0.lock().unwrap().built_now = false;

        if errors.is_empty() {
            Ok(())
        } else {
            Err(FacetError::StateError(format!(
                "subsystem '{}' disposal errors: {}",
                self.name(),
                errors.join("; ")
            )))
        }
    }
}
