//! Runtime configuration supplied programmatically at construction time.
//!
//! No file, env, or CLI surface - an embedder builds this value in process
//! and hands it to a [`crate::subsystem::Subsystem`] or
//! [`crate::builder::Builder`] directly.

use crate::graph_cache::DEFAULT_CAPACITY;

#[derive(Clone, Debug)]
pub struct RuntimeConfig {
    /// Capacity of the dependency-graph cache a [`crate::builder::Builder`]
    /// creates for this subsystem when no cache is attached or supplied.
    pub graph_cache_capacity: usize,
    /// Off by default. When set, the verifier skips contract enforcement
    /// (step 6) entirely - an escape hatch for embedders bootstrapping a
    /// subsystem whose facets don't yet satisfy their declared contracts.
    pub bypass_contract_enforcement: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            graph_cache_capacity: DEFAULT_CAPACITY,
            bypass_contract_enforcement: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_does_not_bypass_enforcement() {
        let config = RuntimeConfig::default();
        assert!(!config.bypass_contract_enforcement);
        assert_eq!(config.graph_cache_capacity, DEFAULT_CAPACITY);
    }
}
