//! # Chain Registry
//!
//! Adapters keyed by chain name, so sessions can name their chains instead of
//! carrying adapter instances. Lookups are case-insensitive.

use crate::domain::OrchestratorError;
use crate::ports::{DestinationChain, SourceChain};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

#[derive(Default)]
pub struct ChainRegistry {
    sources: RwLock<HashMap<String, Arc<dyn SourceChain>>>,
    destinations: RwLock<HashMap<String, Arc<dyn DestinationChain>>>,
}

impl ChainRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a source chain under its own name. Replaces any previous one.
    pub fn register_source(&self, chain: Arc<dyn SourceChain>) {
        let key = chain.name().to_lowercase();
        info!("[registry] Registering source chain: {}", key);
        self.sources.write().insert(key, chain);
    }

    /// Register a destination chain under its own name. Replaces any previous one.
    pub fn register_destination(&self, chain: Arc<dyn DestinationChain>) {
        let key = chain.name().to_lowercase();
        info!("[registry] Registering destination chain: {}", key);
        self.destinations.write().insert(key, chain);
    }

    pub fn source(&self, name: &str) -> Result<Arc<dyn SourceChain>, OrchestratorError> {
        self.sources
            .read()
            .get(&name.to_lowercase())
            .cloned()
            .ok_or_else(|| OrchestratorError::UnsupportedChain(name.to_string()))
    }

    pub fn destination(&self, name: &str) -> Result<Arc<dyn DestinationChain>, OrchestratorError> {
        self.destinations
            .read()
            .get(&name.to_lowercase())
            .cloned()
            .ok_or_else(|| OrchestratorError::UnsupportedChain(name.to_string()))
    }

    /// Registered source chain names, sorted.
    pub fn source_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.sources.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Registered destination chain names, sorted.
    pub fn destination_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.destinations.read().keys().cloned().collect();
        names.sort();
        names
    }
}
