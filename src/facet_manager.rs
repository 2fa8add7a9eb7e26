//! Per-subsystem collection of installed facets with transactional install
//! and reverse-order disposal.

use crate::ctx::Ctx;
use crate::error::FacetError;
use crate::facet::{Api, Facet};
use crate::subsystem::SubsystemHandle;
use std::collections::HashMap;

pub struct InstallOptions {
    pub ctx: Ctx,
    pub api: Api,
    pub init: bool,
    pub attach: bool,
}

#[derive(Default)]
pub struct FacetManager {
    order: Vec<String>,
    facets: HashMap<String, Facet>,
}

impl FacetManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn find(&self, kind: &str) -> Option<&Facet> {
        self.facets.get(kind)
    }

    /// Install `ordered_kinds` from `facets_by_kind` in order. On any
    /// failure, every facet added *by this call* is disposed (best-effort,
    /// in reverse order) and removed; facets installed before this call
    /// are untouched.
    pub async fn add_many(
        &mut self,
        ordered_kinds: &[String],
        mut facets_by_kind: HashMap<String, Facet>,
        options: InstallOptions,
        subsystem: SubsystemHandle,
    ) -> Result<(), FacetError> {
        let mut added_this_call: Vec<String> = Vec::new();

        for kind in ordered_kinds {
            let mut facet = facets_by_kind
                .remove(kind)
                .ok_or_else(|| FacetError::InvalidPlan(format!("no facet for kind '{kind}'")))?;

            if options.init {
                if let Err(e) = facet.init(options.ctx.clone(), subsystem.clone()).await {
                    // `facet` itself never finished init, so it is not
                    // disposed; only the facets already added in this call are.
                    self.rollback(&added_this_call, &options.ctx, &subsystem).await;
                    return Err(e);
                }
            }

            if options.attach && facet.should_attach() {
                for (name, member) in facet.members() {
                    if !name.starts_with('_') {
                        options.api.attach(name.clone(), member.clone());
                    }
                }
            }

            self.order.push(kind.clone());
            self.facets.insert(kind.clone(), facet);
            added_this_call.push(kind.clone());
        }

        Ok(())
    }

    async fn rollback(&mut self, added_this_call: &[String], ctx: &Ctx, subsystem: &SubsystemHandle) {
        for kind in added_this_call.iter().rev() {
            if let Some(mut facet) = self.facets.remove(kind) {
                let _ = facet.dispose(ctx.clone(), subsystem.clone()).await;
            }
            self.order.retain(|k| k != kind);
        }
    }

    /// Dispose all installed facets in reverse insertion order, aggregating
    /// (not short-circuiting on) per-facet failures.
    pub async fn dispose_all(&mut self, ctx: Ctx, subsystem: SubsystemHandle) -> Result<(), FacetError> {
        let mut errors = Vec::new();
        for kind in self.order.clone().into_iter().rev() {
            if let Some(mut facet) = self.facets.remove(&kind) {
                if let Err(e) = facet.dispose(ctx.clone(), subsystem.clone()).await {
                    errors.push(e.to_string());
                }
            }
        }
        self.order.clear();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(FacetError::StateError(format!(
                "facet manager disposal errors: {}",
                errors.join("; ")
            )))
        }
    }

    pub fn order(&self) -> &[String] {
        &self.order
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}
