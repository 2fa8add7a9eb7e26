//! A subsystem composition runtime: hooks produce facets, facets are
//! checked against named structural contracts, and a verified build plan
//! is installed transactionally, recursing into child subsystems.

pub mod builder;
pub mod config;
pub mod contract;
pub mod ctx;
pub mod error;
pub mod facet;
pub mod facet_manager;
pub mod graph_cache;
pub mod hook;
pub mod standalone;
pub mod subsystem;
pub mod verifier;

pub use builder::Builder;
pub use config::RuntimeConfig;
pub use contract::{default_contract_registry, Contract, ContractRegistry, Validator};
pub use ctx::{deep_merge, Ctx};
pub use error::FacetError;
pub use facet::{Api, Facet, FacetOptions, Member};
pub use facet_manager::{FacetManager, InstallOptions};
pub use graph_cache::{DependencyGraphCache, DEFAULT_CAPACITY};
pub use hook::{create_hook, Hook, HookFn, HookOptions};
pub use standalone::StandalonePluginSystem;
pub use subsystem::{MessageSystem, Subsystem, SubsystemHandle};
pub use verifier::{verify_subsystem_build, BuildPlan};

/// Install a `tracing_subscriber` formatter driven by `RUST_LOG`, falling
/// back to `info` for this crate's own spans and events. Convenience for
/// embedders and examples; the library itself never calls this on its own.
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;

    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".parse().unwrap()),
        )
        .try_init();
}
