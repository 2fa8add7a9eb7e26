//! Hooks: metadata-bearing factories that each produce one facet.

use crate::ctx::Ctx;
use crate::error::FacetError;
use crate::facet::{Api, Facet};
use crate::subsystem::SubsystemHandle;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

pub type HookFuture = Pin<Box<dyn Future<Output = Result<Option<Facet>, FacetError>> + Send>>;
pub type HookFn = Arc<dyn Fn(Ctx, Api, SubsystemHandle) -> HookFuture + Send + Sync>;

/// A metadata-carrying factory: given context, produces at most one facet
/// of a specific kind. Modeled as a record holding its factory, not as a
/// function with properties attached.
#[derive(Clone)]
pub struct Hook {
    kind: String,
    required: Vec<String>,
    overwrite: bool,
    attach: bool,
    source: String,
    factory: HookFn,
}

pub struct HookOptions {
    pub kind: String,
    pub required: Vec<String>,
    pub overwrite: bool,
    pub attach: bool,
    pub source: String,
}

impl Hook {
    pub fn new(options: HookOptions, factory: HookFn) -> Result<Self, FacetError> {
        if options.kind.trim().is_empty() {
            return Err(FacetError::HookShapeError {
                source: options.source.clone(),
                message: "hook kind must be a non-empty string".into(),
            });
        }
        if options.source.trim().is_empty() {
            return Err(FacetError::InvalidArgument(
                "hook source must be a non-empty string".into(),
            ));
        }
        Ok(Self {
            kind: options.kind,
            required: options.required,
            overwrite: options.overwrite,
            attach: options.attach,
            source: options.source,
            factory,
        })
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn required(&self) -> &[String] {
        &self.required
    }

    pub fn overwrite(&self) -> bool {
        self.overwrite
    }

    pub fn attach(&self) -> bool {
        self.attach
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn call(&self, ctx: Ctx, api: Api, subsystem: SubsystemHandle) -> HookFuture {
        (self.factory)(ctx, api, subsystem)
    }
}

/// Convenience constructor mirroring the source's `createHook({...})`.
pub fn create_hook(
    kind: impl Into<String>,
    source: impl Into<String>,
    required: Vec<String>,
    overwrite: bool,
    attach: bool,
    factory: HookFn,
) -> Result<Hook, FacetError> {
    Hook::new(
        HookOptions {
            kind: kind.into(),
            required,
            overwrite,
            attach,
            source: source.into(),
        },
        factory,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::facet::FacetOptions;

    fn noop_factory() -> HookFn {
        Arc::new(|_ctx, _api, _subsystem| Box::pin(async { Ok(None) }))
    }

    #[test]
    fn rejects_empty_kind() {
        let err = create_hook("", "src", vec![], false, false, noop_factory()).unwrap_err();
        assert!(matches!(err, FacetError::HookShapeError { .. }));
    }

    #[test]
    fn rejects_empty_source() {
        let err = create_hook("k", "", vec![], false, false, noop_factory()).unwrap_err();
        assert!(matches!(err, FacetError::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn factory_producing_facet_with_mismatched_kind_is_shape_error() {
        let factory: HookFn = Arc::new(|_ctx, _api, _subsystem| {
            Box::pin(async {
                Ok(Some(
                    Facet::new(
                        "other",
                        FacetOptions { source: "src".into(), attach: false, overwrite: false, contract: None },
                    )
                    .unwrap(),
                ))
            })
        });
        let hook = create_hook("expected", "src", vec![], false, false, factory).unwrap();
        let subsystem = crate::subsystem::Subsystem::new("root", serde_json::json!({}));
        let facet = hook
            .call(serde_json::json!({}), crate::facet::Api::new(), subsystem.handle())
            .await
            .unwrap();
        // The hook itself is free to return any kind; verification (not the
        // hook) is responsible for rejecting a mismatch - see verifier.rs.
        assert_eq!(facet.unwrap().kind(), "other");
    }
}
