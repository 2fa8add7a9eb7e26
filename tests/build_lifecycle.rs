use facet_core::facet::{Facet, FacetOptions};
use facet_core::hook::{create_hook, HookFn};
use facet_core::{FacetError, Subsystem};
use std::sync::Arc;

fn passthrough_hook(kind: &str) -> facet_core::Hook {
    let k = kind.to_string();
    let factory: HookFn = Arc::new(move |_ctx, _api, _subsystem| {
        let k = k.clone();
        Box::pin(async move {
            Ok(Some(
                Facet::new(
                    k,
                    FacetOptions { source: "test".into(), attach: false, overwrite: false, contract: None },
                )
                .unwrap(),
            ))
        })
    });
    create_hook(kind, "test", vec![], false, false, factory).unwrap()
}

/// S6: a failing init rolls back everything installed before it and
/// leaves the subsystem's ctx exactly as it was pre-build.
#[tokio::test]
async fn init_failure_rolls_back_and_restores_ctx() {
    let sys = Subsystem::new("root", serde_json::json!({"version": 1}));
    sys.use_hook(passthrough_hook("A")).unwrap();

    let k = "B".to_string();
    let factory: HookFn = Arc::new(move |_ctx, _api, _subsystem| {
        let k = k.clone();
        Box::pin(async move {
            let mut facet = Facet::new(
                k,
                FacetOptions { source: "test".into(), attach: false, overwrite: false, contract: None },
            )
            .unwrap();
            facet
                .on_init(Arc::new(|_ctx, _subsystem| {
                    Box::pin(async { Err(FacetError::StateError("B refuses to init".into())) })
                }))
                .unwrap();
            Ok(Some(facet))
        })
    });
    sys.use_hook(create_hook("B", "test", vec![], false, false, factory).unwrap())
        .unwrap();

    let before = sys.ctx();
    let err = sys.build().await.unwrap_err();
    assert!(matches!(err, FacetError::StateError(_)));
    assert!(sys.find("A").is_none());
    assert!(sys.find("B").is_none());
    assert_eq!(sys.ctx(), before);
}

/// S7: a parent propagates its ctx and graph cache into each child before
/// building it, and children build in order.
#[tokio::test]
async fn hierarchical_build_propagates_ctx_to_children() {
    let parent = Subsystem::new("parent", serde_json::json!({"graphCache": "shared"}));
    parent.use_hook(passthrough_hook("root-facet")).unwrap();

    let child1 = Subsystem::new("child1", serde_json::json!({}));
    child1.use_hook(passthrough_hook("c1-facet")).unwrap();
    let child2 = Subsystem::new("child2", serde_json::json!({}));
    child2.use_hook(passthrough_hook("c2-facet")).unwrap();

    parent.add_child(child1.clone());
    parent.add_child(child2.clone());

    parent.build().await.unwrap();

    assert!(child1.built_now());
    assert!(child2.built_now());
    assert_eq!(child1.ctx()["parent"], parent.ctx());
    assert_eq!(child1.ctx()["graphCache"], serde_json::json!("shared"));
    assert_eq!(child2.ctx()["graphCache"], serde_json::json!("shared"));
}

/// Invariant 8: build, dispose, build again yields the same facet kinds.
#[tokio::test]
async fn round_trip_build_dispose_build() {
    let sys = Subsystem::new("root", serde_json::json!({}));
    sys.use_hook(passthrough_hook("A")).unwrap();
    sys.use_hook(passthrough_hook("B")).unwrap();

    sys.build().await.unwrap();
    let first: std::collections::HashSet<String> = ["A", "B"].iter().map(|s| s.to_string()).collect();
    assert!(first.iter().all(|k| sys.find(k).is_some()));

    sys.dispose().await.unwrap();
    sys.build().await.unwrap();
    assert!(first.iter().all(|k| sys.find(k).is_some()));
}

/// Invariant 7: build() called twice is idempotent - no duplicate facets.
#[tokio::test]
async fn build_called_twice_is_idempotent() {
    let sys = Subsystem::new("root", serde_json::json!({}));
    sys.use_hook(passthrough_hook("A")).unwrap();
    sys.build().await.unwrap();
    sys.build().await.unwrap();
    assert!(sys.find("A").is_some());
}
