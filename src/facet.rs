//! Facets: named bundles of methods and properties installed into a subsystem.

use crate::ctx::Ctx;
use crate::error::FacetError;
use crate::subsystem::SubsystemHandle;
use std::any::Any;
use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

/// A single member exposed by a facet: either a callable method or a
/// plain value, mirroring the two shapes a structurally-typed member can
/// take once the source's dynamic property/method distinction is made
/// explicit.
#[derive(Clone)]
pub enum Member {
    Method(Arc<dyn Fn(&[serde_json::Value]) -> Result<serde_json::Value, FacetError> + Send + Sync>),
    Value(Arc<dyn Any + Send + Sync>),
}

impl Member {
    pub fn is_method(&self) -> bool {
        matches!(self, Member::Method(_))
    }

    pub fn value_ref<T: 'static>(&self) -> Option<&T> {
        match self {
            Member::Value(v) => v.downcast_ref::<T>(),
            Member::Method(_) => None,
        }
    }

    pub fn call(&self, args: &[serde_json::Value]) -> Result<serde_json::Value, FacetError> {
        match self {
            Member::Method(f) => f(args),
            Member::Value(_) => Err(FacetError::InvalidArgument(
                "member is a value, not callable".into(),
            )),
        }
    }
}

pub type LifecycleFuture = Pin<Box<dyn Future<Output = Result<(), FacetError>> + Send>>;
pub type LifecycleCallback =
    Arc<dyn Fn(Ctx, SubsystemHandle) -> LifecycleFuture + Send + Sync>;

#[derive(Clone)]
pub struct FacetOptions {
    pub source: String,
    pub attach: bool,
    pub overwrite: bool,
    pub contract: Option<String>,
}

/// Immutable-after-init value object: the unit of functionality a hook
/// contributes to a subsystem.
#[derive(Clone)]
pub struct Facet {
    kind: String,
    source: String,
    dependencies: HashSet<String>,
    contract: Option<String>,
    members: HashMap<String, Member>,
    attach: bool,
    overwrite: bool,
    initialized: bool,
    disposed: bool,
    on_init: Vec<LifecycleCallback>,
    on_dispose: Vec<LifecycleCallback>,
}

impl Facet {
    pub fn new(kind: impl Into<String>, options: FacetOptions) -> Result<Self, FacetError> {
        let kind = kind.into();
        if kind.trim().is_empty() {
            return Err(FacetError::InvalidArgument(
                "facet kind must be a non-empty string".into(),
            ));
        }
        if let Some(name) = &options.contract {
            if name.trim().is_empty() {
                return Err(FacetError::InvalidArgument(
                    "contract name must be a non-empty string".into(),
                ));
            }
        }
        Ok(Self {
            kind,
            source: options.source,
            dependencies: HashSet::new(),
            contract: options.contract,
            members: HashMap::new(),
            attach: options.attach,
            overwrite: options.overwrite,
            initialized: false,
            disposed: false,
            on_init: Vec::new(),
            on_dispose: Vec::new(),
        })
    }

    fn guard_mutable(&self) -> Result<(), FacetError> {
        if self.initialized {
            Err(FacetError::StateError(format!(
                "facet '{}' is already initialized and cannot be mutated",
                self.kind
            )))
        } else {
            Ok(())
        }
    }

    pub fn add(&mut self, members: HashMap<String, Member>) -> Result<&mut Self, FacetError> {
        self.guard_mutable()?;
        self.members.extend(members);
        Ok(self)
    }

    pub fn add_dependency(&mut self, kind: impl Into<String>) -> Result<&mut Self, FacetError> {
        self.guard_mutable()?;
        self.dependencies.insert(kind.into());
        Ok(self)
    }

    /// Internal book-keeping hook for the verifier's kernel-services
    /// stripping step, not a public facet-authoring API.
    pub(crate) fn remove_dependency(&mut self, kind: &str) {
        self.dependencies.remove(kind);
    }

    pub fn on_init(&mut self, cb: LifecycleCallback) -> Result<&mut Self, FacetError> {
        self.guard_mutable()?;
        self.on_init.push(cb);
        Ok(self)
    }

    pub fn on_dispose(&mut self, cb: LifecycleCallback) -> Result<&mut Self, FacetError> {
        self.guard_mutable()?;
        self.on_dispose.push(cb);
        Ok(self)
    }

    pub fn set_contract(&mut self, name: Option<String>) -> Result<&mut Self, FacetError> {
        self.guard_mutable()?;
        if let Some(n) = &name {
            if n.trim().is_empty() {
                return Err(FacetError::InvalidArgument(
                    "contract name must be a non-empty string".into(),
                ));
            }
        }
        self.contract = name;
        Ok(self)
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn contract(&self) -> Option<&str> {
        self.contract.as_deref()
    }

    pub fn dependencies(&self) -> &HashSet<String> {
        &self.dependencies
    }

    pub fn has_dependency(&self, kind: &str) -> bool {
        self.dependencies.contains(kind)
    }

    pub fn should_attach(&self) -> bool {
        self.attach
    }

    pub fn should_overwrite(&self) -> bool {
        self.overwrite
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    pub fn members(&self) -> &HashMap<String, Member> {
        &self.members
    }

    pub async fn init(&mut self, ctx: Ctx, subsystem: SubsystemHandle) -> Result<(), FacetError> {
        for cb in self.on_init.clone() {
            cb(ctx.clone(), subsystem.clone()).await?;
        }
        self.initialized = true;
        Ok(())
    }

    /// Disposal never short-circuits: every callback runs, and failures are
    /// aggregated into a single error after all of them have had a chance to run.
    pub async fn dispose(&mut self, ctx: Ctx, subsystem: SubsystemHandle) -> Result<(), FacetError> {
        let mut errors = Vec::new();
        for cb in self.on_dispose.clone() {
            if let Err(e) = cb(ctx.clone(), subsystem.clone()).await {
                errors.push(e.to_string());
            }
        }
        self.disposed = true;
        if errors.is_empty() {
            Ok(())
        } else {
            Err(FacetError::StateError(format!(
                "facet '{}' disposal errors: {}",
                self.kind,
                errors.join("; ")
            )))
        }
    }
}

/// The subsystem's public surface: an indexed attachment table that
/// attached facets expose their members onto. Deliberately untyped (`get`
/// returns a [`Member`]) since the set of attached members is only known
/// at build time; typed access is layered on top via [`Api::as_value`].
#[derive(Clone, Default)]
pub struct Api {
    members: Arc<Mutex<HashMap<String, Member>>>,
}

impl Api {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attach(&self, name: impl Into<String>, member: Member) {
        self.members.lock().unwrap().insert(name.into(), member);
    }

    pub fn get(&self, name: &str) -> Option<Member> {
        self.members.lock().unwrap().get(name).cloned()
    }

    pub fn has(&self, name: &str) -> bool {
        self.members.lock().unwrap().contains_key(name)
    }

    /// Typed access to an attached value member, the equivalent of the
    /// source's `as<T>(kind)` helper.
    pub fn as_value<T: 'static + Clone>(&self, name: &str) -> Option<T> {
        match self.get(name)? {
            Member::Value(v) => v.downcast_ref::<T>().cloned(),
            Member::Method(_) => None,
        }
    }

    pub fn call(&self, name: &str, args: &[serde_json::Value]) -> Result<serde_json::Value, FacetError> {
        self.get(name)
            .ok_or_else(|| FacetError::InvalidArgument(format!("no member named '{name}'")))?
            .call(args)
    }
}
