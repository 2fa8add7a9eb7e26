//! The verification algorithm: merge hooks, execute factories, validate
//! dependencies and contracts, and freeze a [`BuildPlan`].
//!
//! Pure with respect to the subsystem: reads `ctx`/`hooks`/`contracts` but
//! never mutates the subsystem.

use crate::contract::ContractRegistry;
use crate::ctx::{deep_merge, Ctx};
use crate::error::FacetError;
use crate::facet::Facet;
use crate::graph_cache::{fingerprint, DependencyGraphCache, HookShape};
use crate::hook::Hook;
use crate::subsystem::SubsystemHandle;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

#[derive(Clone)]
pub struct BuildPlan {
    pub resolved_ctx: Ctx,
    pub ordered_kinds: Vec<String>,
    pub facets_by_kind: HashMap<String, Facet>,
    pub fingerprint: u64,
}

/// Dependency name the kernel-services stripping step removes when the
/// subsystem's message system reports `isKernelInit()`.
const KERNEL_SERVICES_DEPENDENCY: &str = "kernelServices";

struct ExecutedFacet {
    facet: Facet,
    hook_source: String,
    hook_required: Vec<String>,
    hook_overwrite: bool,
}

pub async fn verify_subsystem_build(
    subsystem: &SubsystemHandle,
    extra_ctx: Option<Ctx>,
    graph_cache: Option<Arc<Mutex<DependencyGraphCache>>>,
) -> Result<BuildPlan, FacetError> {
    // Step 1: resolve ctx.
    let base_ctx = subsystem.ctx();
    let resolved_ctx = match extra_ctx {
        Some(extra) => deep_merge(&base_ctx, &extra),
        None => base_ctx,
    };

    // Step 2: merge hooks in encounter order (defaults first).
    let mut hooks: Vec<Hook> = subsystem.default_hooks();
    hooks.extend(subsystem.user_hooks());

    let shapes: Vec<HookShape<'_>> = hooks
        .iter()
        .map(|h| {
            let mut required: Vec<&str> = h.required().iter().map(|s| s.as_str()).collect();
            required.sort_unstable();
            HookShape {
                kind: h.kind(),
                required,
                overwrite: h.overwrite(),
                source: h.source(),
            }
        })
        .collect();
    let kernel_init = subsystem.is_kernel_init();
    let fp = fingerprint(&shapes, kernel_init);

    let cached_order = match &graph_cache {
        Some(cache) => cache.lock().unwrap().get(fp),
        None => None,
    };

    // Step 3: execute factories in encounter order.
    let api = subsystem.api();
    let mut raw: Vec<(String, ExecutedFacet)> = Vec::new();
    for hook in &hooks {
        let result = hook
            .call(resolved_ctx.clone(), api.clone(), subsystem.clone())
            .await
            .map_err(|e| FacetError::HookExecutionError {
                kind: hook.kind().to_string(),
                source: hook.source().to_string(),
                cause: e.to_string(),
            })?;
        let Some(facet) = result else { continue };
        if facet.kind() != hook.kind() {
            return Err(FacetError::FacetShapeError {
                source: hook.source().to_string(),
                message: format!(
                    "factory for hook '{}' returned a facet of kind '{}'",
                    hook.kind(),
                    facet.kind()
                ),
            });
        }
        let kind = facet.kind().to_string();
        let entry = ExecutedFacet {
            facet,
            hook_source: hook.source().to_string(),
            hook_required: hook.required().to_vec(),
            hook_overwrite: hook.overwrite(),
        };
        raw.push((kind, entry));
    }

    // Step 4: kernel-services stripping. When the ambient message system
    // reports it is kernel-initialized, the 'kernelServices' dependency is
    // no longer meaningful and is removed from every hook's required list
    // and every facet's own declared dependencies.
    if kernel_init {
        for (_, entry) in raw.iter_mut() {
            entry.hook_required.retain(|d| d != KERNEL_SERVICES_DEPENDENCY);
            entry.facet.remove_dependency(KERNEL_SERVICES_DEPENDENCY);
        }
    }

    // Step 5: overwrite resolution.
    let mut executed: Vec<(String, ExecutedFacet)> = Vec::new();
    for (kind, entry) in raw {
        if let Some((_, existing)) = executed.iter().find(|(k, _)| *k == kind) {
            let allowed = entry.hook_overwrite && entry.facet.should_overwrite();
            if !allowed {
                return Err(FacetError::DuplicateKind {
                    kind,
                    first_source: existing.hook_source.clone(),
                    second_source: entry.hook_source.clone(),
                });
            }
            executed.retain(|(k, _)| *k != kind);
        }
        executed.push((kind, entry));
    }

    // Step 6: contract enforcement, before dependency validation. Skipped
    // entirely when the subsystem's runtime config opts to bypass it.
    if !subsystem.config().bypass_contract_enforcement {
        let contracts: ContractRegistry = subsystem.contracts();
        for (_, entry) in &executed {
            if let Some(name) = entry.facet.contract() {
                contracts.enforce(name, &resolved_ctx, &api, subsystem, &entry.facet)?;
            }
        }
    }

    // Step 7: dependency validation.
    let present: HashSet<&str> = executed.iter().map(|(k, _)| k.as_str()).collect();
    for (kind, entry) in &executed {
        for dep in entry.hook_required.iter().chain(entry.facet.dependencies().iter()) {
            if !present.contains(dep.as_str()) {
                return Err(FacetError::MissingDependency {
                    kind: kind.clone(),
                    dependency: dep.clone(),
                });
            }
        }
    }

    // Step 8: topological sort (Kahn's algorithm, stable encounter-order tie-break).
    let ordered_kinds = match cached_order {
        Some(order) if order.len() == executed.len() && order.iter().all(|k| present.contains(k.as_str())) => {
            order
        }
        _ => {
            let order = topological_sort(&executed)?;
            if let Some(cache) = &graph_cache {
                cache.lock().unwrap().put(fp, order.clone());
            }
            order
        }
    };

    let facets_by_kind: HashMap<String, Facet> =
        executed.into_iter().map(|(k, e)| (k, e.facet)).collect();

    Ok(BuildPlan {
        resolved_ctx,
        ordered_kinds,
        facets_by_kind,
        fingerprint: fp,
    })
}

fn topological_sort(executed: &[(String, ExecutedFacet)]) -> Result<Vec<String>, FacetError> {
    let index: HashMap<&str, usize> = executed
        .iter()
        .enumerate()
        .map(|(i, (k, _))| (k.as_str(), i))
        .collect();

    let deps: Vec<Vec<usize>> = executed
        .iter()
        .map(|(_, e)| {
            e.hook_required
                .iter()
                .chain(e.facet.dependencies().iter())
                .filter_map(|d| index.get(d.as_str()).copied())
                .collect::<HashSet<usize>>()
                .into_iter()
                .collect()
        })
        .collect();

    let mut in_degree: Vec<usize> = deps.iter().map(|d| d.len()).collect();
    let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); executed.len()];
    for (i, dep_list) in deps.iter().enumerate() {
        for &d in dep_list {
            dependents[d].push(i);
        }
    }

    // Seed the queue in encounter order so ties break deterministically.
    let mut queue: std::collections::VecDeque<usize> =
        (0..executed.len()).filter(|&i| in_degree[i] == 0).collect();

    let mut order = Vec::with_capacity(executed.len());
    while let Some(i) = queue.pop_front() {
        order.push(i);
        for &dep in &dependents[i] {
            in_degree[dep] -= 1;
            if in_degree[dep] == 0 {
                queue.push_back(dep);
            }
        }
    }

    if order.len() != executed.len() {
        let remaining: Vec<String> = (0..executed.len())
            .filter(|i| in_degree[*i] > 0)
            .map(|i| executed[i].0.clone())
            .collect();
        return Err(FacetError::DependencyCycle(remaining));
    }

    Ok(order.into_iter().map(|i| executed[i].0.clone()).collect())
}
