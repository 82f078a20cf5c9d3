//! Registry for provider engines.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use super::{EbscoEngine, Engine, EngineError, PrimoEngine, SummonEngine};
use crate::config::Config;
use crate::models::Provider;
use crate::utils::HttpClient;

/// Registry of configured provider engines.
///
/// One engine per configured provider; callers pick the active one once
/// and use it through the [`Engine`] trait. Providers without credentials
/// in the config are simply absent.
#[derive(Debug, Clone)]
pub struct EngineRegistry {
    engines: HashMap<Provider, Arc<dyn Engine>>,
    active: Option<Provider>,
}

impl EngineRegistry {
    /// Create an empty registry
    pub fn empty() -> Self {
        Self {
            engines: HashMap::new(),
            active: None,
        }
    }

    /// Build a registry from configuration, instantiating an engine for
    /// every provider with credentials present
    pub fn from_config(config: &Config) -> Result<Self, EngineError> {
        let client = HttpClient::with_timeouts(
            Duration::from_secs(config.http.read_timeout_secs),
            Duration::from_secs(config.http.connect_timeout_secs),
        )?;

        let mut registry = Self::empty();
        registry.active = config.provider;

        if let Some(ebsco) = &config.ebsco {
            registry.register(Arc::new(EbscoEngine::new(ebsco.clone(), client.clone())));
        }
        if let Some(primo) = &config.primo {
            registry.register(Arc::new(PrimoEngine::new(primo.clone(), client.clone())));
        }
        if let Some(summon) = &config.summon {
            registry.register(Arc::new(SummonEngine::new(summon.clone(), client.clone())));
        }

        Ok(registry)
    }

    /// Register an engine under its own provider identity
    pub fn register(&mut self, engine: Arc<dyn Engine>) {
        self.engines.insert(engine.provider(), engine);
    }

    /// Get an engine by provider
    pub fn get(&self, provider: Provider) -> Option<&Arc<dyn Engine>> {
        self.engines.get(&provider)
    }

    /// Get an engine by provider, erroring when absent
    pub fn get_required(&self, provider: Provider) -> Result<&Arc<dyn Engine>, EngineError> {
        self.get(provider).ok_or_else(|| {
            EngineError::Config(format!("Provider '{}' is not configured", provider.id()))
        })
    }

    /// The engine selected by the configuration's `provider` key
    pub fn active(&self) -> Result<&Arc<dyn Engine>, EngineError> {
        let provider = self
            .active
            .ok_or_else(|| EngineError::Config("No active provider configured".into()))?;
        self.get_required(provider)
    }

    /// All registered engines
    pub fn all(&self) -> impl Iterator<Item = &Arc<dyn Engine>> {
        self.engines.values()
    }

    /// All registered provider identities
    pub fn providers(&self) -> impl Iterator<Item = Provider> + '_ {
        self.engines.keys().copied()
    }

    /// Check whether a provider is configured
    pub fn has(&self, provider: Provider) -> bool {
        self.engines.contains_key(&provider)
    }

    /// Number of configured providers
    pub fn len(&self) -> usize {
        self.engines.len()
    }

    /// Check whether no provider is configured
    pub fn is_empty(&self) -> bool {
        self.engines.is_empty()
    }
}
