//! Two-phase driver: `plan()` (pure, cacheable) and `build()` (transactional).

use crate::ctx::{deep_merge, Ctx};
use crate::error::FacetError;
use crate::facet_manager::InstallOptions;
use crate::graph_cache::DependencyGraphCache;
use crate::subsystem::{Subsystem, SubsystemHandle};
use crate::verifier::{verify_subsystem_build, BuildPlan};
use std::sync::{Arc, Mutex};
use tracing::{info, warn};

/// Builds a single subsystem: resolves its plan, then executes it
/// transactionally, recursing into children.
pub struct Builder {
    subsystem: SubsystemHandle,
    extra_ctx: Ctx,
    cached_plan: Option<Arc<BuildPlan>>,
    graph_cache: Option<Arc<Mutex<DependencyGraphCache>>>,
}

impl Builder {
    pub fn new(subsystem: SubsystemHandle) -> Self {
        Self {
            subsystem,
            extra_ctx: serde_json::json!({}),
            cached_plan: None,
            graph_cache: None,
        }
    }

    pub fn with_graph_cache(mut self, cache: Arc<Mutex<DependencyGraphCache>>) -> Self {
        self.graph_cache = Some(cache);
        self
    }

    /// Accumulate extra context. Implicitly invalidates the memoized plan
    /// (the graph cache, keyed on hook shape rather than ctx, is untouched).
    pub fn with_ctx(&mut self, ctx: Ctx) -> &mut Self {
        self.extra_ctx = deep_merge(&self.extra_ctx, &ctx);
        self.cached_plan = None;
        self
    }

    pub fn clear_ctx(&mut self) -> &mut Self {
        self.extra_ctx = serde_json::json!({});
        self.cached_plan = None;
        self
    }

    /// Preference order for which graph cache to use: a cache the embedder
    /// attached to the subsystem's `Api` under "graphCache" (the live-object
    /// counterpart of the source's `subsystem.ctx.graphCache`, since our
    /// `Ctx` is a plain JSON tree and cannot hold a live Rust cache), then
    /// the cache this builder was constructed with, then a cache this
    /// builder lazily creates sized by the subsystem's `RuntimeConfig`.
    fn resolve_graph_cache(&mut self) -> Option<Arc<Mutex<DependencyGraphCache>>> {
        if let Some(attached) = self.subsystem.api().as_value::<Arc<Mutex<DependencyGraphCache>>>("graphCache") {
            return Some(attached);
        }
        if self.graph_cache.is_none() {
            let capacity = self.subsystem.config().graph_cache_capacity;
            self.graph_cache = Some(Arc::new(Mutex::new(DependencyGraphCache::new(capacity))));
        }
        self.graph_cache.clone()
    }

    pub async fn plan(&mut self) -> Result<Arc<BuildPlan>, FacetError> {
        if let Some(plan) = &self.cached_plan {
            return Ok(plan.clone());
        }
        let cache = self.resolve_graph_cache();
        let extra = self.extra_ctx.clone();
        let plan = verify_subsystem_build(&self.subsystem, Some(extra), cache).await?;
        let plan = Arc::new(plan);
        self.cached_plan = Some(plan.clone());
        Ok(plan)
    }

    pub async fn dry_run(&mut self) -> Result<Arc<BuildPlan>, FacetError> {
        self.plan().await
    }

    pub fn get_plan(&self) -> Option<Arc<BuildPlan>> {
        self.cached_plan.clone()
    }

    pub fn invalidate(&mut self) {
        self.cached_plan = None;
    }

    pub async fn build(&mut self) -> Result<(), FacetError> {
        let plan = self.plan().await?;
        self.build_plan(plan).await
    }

    /// Execute a plan transactionally: assign the resolved ctx, install
    /// facets in order, then recurse into children.
    pub async fn build_plan(&mut self, plan: Arc<BuildPlan>) -> Result<(), FacetError> {
        if plan.ordered_kinds.is_empty() != plan.facets_by_kind.is_empty() {
            return Err(FacetError::InvalidPlan(
                "ordered_kinds and facets_by_kind disagree on emptiness".into(),
            ));
        }
        for kind in &plan.ordered_kinds {
            if !plan.facets_by_kind.contains_key(kind) {
                return Err(FacetError::InvalidPlan(format!(
                    "ordered_kinds names '{kind}' which is absent from facets_by_kind"
                )));
            }
        }

        let prior_ctx = self.subsystem.ctx();
        self.subsystem.set_ctx(plan.resolved_ctx.clone());

        info!(subsystem = %self.subsystem.name(), facet_count = plan.ordered_kinds.len(), "installing facets");

        let install_result = {
            let ctx = plan.resolved_ctx.clone();
            let api = self.subsystem.api();
            let handle = self.subsystem.handle();
            let mut manager = self.subsystem.take_facet_manager();
            let result = manager
                .add_many(
                    &plan.ordered_kinds,
                    plan.facets_by_kind.clone(),
                    InstallOptions { ctx, api, init: true, attach: true },
                    handle,
                )
                .await;
            self.subsystem.restore_facet_manager(manager);
            result
        };

        if let Err(e) = install_result {
            warn!(subsystem = %self.subsystem.name(), error = %e, "facet install failed, rolling back");
            self.subsystem.set_ctx(prior_ctx);
            return Err(e);
        }

        self.build_children().await
    }

    /// Children to build, in precedence order: a hierarchy facet's own
    /// `children` member is authoritative whenever one is installed; the
    /// subsystem's own child collection is consulted only when no hierarchy
    /// facet exists. A method returning JSON can't carry live `Subsystem`
    /// handles, so the typed `children` property (not `listChildren()`) is
    /// what the builder actually walks.
    fn resolve_children(&self) -> Vec<Subsystem> {
        if let Some(facet) = self.subsystem.find("hierarchy") {
            if let Some(children) = facet
                .members()
                .get("children")
                .and_then(|m| m.value_ref::<Arc<Mutex<Vec<Subsystem>>>>())
            {
                return children.lock().unwrap().clone();
            }
        }
        self.subsystem.children()
    }

    async fn build_children(&mut self) -> Result<(), FacetError> {
        let parent_ctx = self.subsystem.ctx();
        let children = self.resolve_children();
        let mut built: Vec<Subsystem> = Vec::new();

        for child in children {
            if child.built_now() {
                continue;
            }
            let mut child_ctx = child.ctx();
            if let serde_json::Value::Object(ref mut map) = child_ctx {
                map.insert("parent".to_string(), parent_ctx.clone());
                if let Some(cache) = parent_ctx.get("graphCache") {
                    map.insert("graphCache".to_string(), cache.clone());
                }
            }
            child.set_ctx(child_ctx);

            if let Err(e) = child.build().await {
                for already in built.into_iter().rev() {
                    let _ = already.dispose().await;
                }
                let _ = self.dispose_self_facets().await;
                self.subsystem.set_ctx(parent_ctx);
                return Err(FacetError::ChildBuildError {
                    child: child.name(),
                    cause: Box::new(e),
                });
            }
            built.push(child);
        }

        Ok(())
    }

    async fn dispose_self_facets(&mut self) -> Result<(), FacetError> {
        let ctx = self.subsystem.ctx();
        let handle = self.subsystem.handle();
        let mut manager = self.subsystem.take_facet_manager();
        let result = manager.dispose_all(ctx, handle).await;
        self.subsystem.restore_facet_manager(manager);
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::facet::FacetOptions;
    use crate::hook::{create_hook, HookFn};

    fn passthrough_hook(kind: &str) -> crate::hook::Hook {
        let k = kind.to_string();
        let factory: HookFn = Arc::new(move |_ctx, _api, _subsystem| {
            let k = k.clone();
            Box::pin(async move {
                Ok(Some(
                    crate::facet::Facet::new(
                        k,
                        FacetOptions { source: "test".into(), attach: false, overwrite: false, contract: None },
                    )
                    .unwrap(),
                ))
            })
        });
        create_hook(kind, "test", vec![], false, false, factory).unwrap()
    }

    #[tokio::test]
    async fn plan_is_memoized() {
        let sys = Subsystem::new("root", serde_json::json!({}));
        sys.use_hook(passthrough_hook("a")).unwrap();
        let mut builder = Builder::new(sys.handle());
        let p1 = builder.plan().await.unwrap();
        let p2 = builder.plan().await.unwrap();
        assert!(Arc::ptr_eq(&p1, &p2));
    }

    #[tokio::test]
    async fn with_ctx_invalidates_memoized_plan() {
        let sys = Subsystem::new("root", serde_json::json!({}));
        sys.use_hook(passthrough_hook("a")).unwrap();
        let mut builder = Builder::new(sys.handle());
        let p1 = builder.plan().await.unwrap();
        builder.with_ctx(serde_json::json!({"x": 1}));
        assert!(builder.get_plan().is_none());
        let p2 = builder.plan().await.unwrap();
        assert!(!Arc::ptr_eq(&p1, &p2));
        assert_eq!(p2.resolved_ctx, serde_json::json!({"x": 1}));
    }

    #[tokio::test]
    async fn build_installs_facets_on_subsystem() {
        let sys = Subsystem::new("root", serde_json::json!({}));
        sys.use_hook(passthrough_hook("a")).unwrap();
        let mut builder = Builder::new(sys.handle());
        builder.build().await.unwrap();
        assert!(sys.find("a").is_some());
    }

    fn hierarchy_hook(children: Arc<Mutex<Vec<Subsystem>>>) -> crate::hook::Hook {
        let factory: HookFn = Arc::new(move |_ctx, _api, _subsystem| {
            let children = children.clone();
            Box::pin(async move {
                let mut facet = crate::facet::Facet::new(
                    "hierarchy",
                    FacetOptions { source: "test".into(), attach: false, overwrite: false, contract: None },
                )
                .unwrap();
                let mut members = std::collections::HashMap::new();
                members.insert("children".to_string(), crate::facet::Member::Value(children));
                facet.add(members).unwrap();
                Ok(Some(facet))
            })
        });
        create_hook("hierarchy", "test", vec![], false, false, factory).unwrap()
    }

    #[tokio::test]
    async fn hierarchy_facet_children_take_precedence_over_subsystem_children() {
        let parent = Subsystem::new("parent", serde_json::json!({}));
        parent.use_hook(passthrough_hook("root-facet")).unwrap();

        let via_hierarchy = Subsystem::new("via-hierarchy", serde_json::json!({}));
        via_hierarchy.use_hook(passthrough_hook("h-facet")).unwrap();
        let via_collection = Subsystem::new("via-collection", serde_json::json!({}));
        via_collection.use_hook(passthrough_hook("c-facet")).unwrap();

        // Only reachable via `subsystem.children()`, so it must be ignored
        // once a hierarchy facet is installed.
        parent.add_child(via_collection.clone());

        let hierarchy_children = Arc::new(Mutex::new(vec![via_hierarchy.clone()]));
        parent
            .use_hook(hierarchy_hook(hierarchy_children))
            .unwrap();

        parent.build().await.unwrap();

        assert!(via_hierarchy.built_now());
        assert!(!via_collection.built_now());
    }
}
