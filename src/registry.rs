//! Name-indexed collection of providers

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::error::{Error, Result};
use crate::provider::Provider;

/// Providers registered for this process
///
/// Reads and writes go through an `RwLock`; a poisoned lock is reported as
/// [`Error::LockPoisoned`].
#[derive(Default)]
pub struct Registry {
    providers: RwLock<HashMap<String, Arc<dyn Provider>>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a provider. Empty and duplicate names are rejected and leave the
    /// registry unchanged.
    pub fn register(&self, provider: Arc<dyn Provider>) -> Result<()> {
        let name = provider.name().to_string();
        if name.is_empty() {
            return Err(Error::EmptyProviderName);
        }

        let mut providers = self.providers.write().map_err(|_| Error::LockPoisoned {
            context: "provider registry".to_string(),
        })?;
        if providers.contains_key(&name) {
            return Err(Error::DuplicateProvider { name });
        }
        providers.insert(name, provider);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Result<Arc<dyn Provider>> {
        let providers = self.providers.read().map_err(|_| Error::LockPoisoned {
            context: "provider registry".to_string(),
        })?;
        providers
            .get(name)
            .cloned()
            .ok_or_else(|| Error::ProviderNotFound {
                name: name.to_string(),
            })
    }

    /// Registered names, sorted.
    pub fn list(&self) -> Result<Vec<String>> {
        let providers = self.providers.read().map_err(|_| Error::LockPoisoned {
            context: "provider registry".to_string(),
        })?;
        let mut names: Vec<String> = providers.keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    /// Every provider, in no particular order.
    pub fn get_all(&self) -> Result<Vec<Arc<dyn Provider>>> {
        let providers = self.providers.read().map_err(|_| Error::LockPoisoned {
            context: "provider registry".to_string(),
        })?;
        Ok(providers.values().cloned().collect())
    }

    pub fn clear(&self) -> Result<()> {
        let mut providers = self.providers.write().map_err(|_| Error::LockPoisoned {
            context: "provider registry".to_string(),
        })?;
        providers.clear();
        Ok(())
    }

    pub fn len(&self) -> Result<usize> {
        let providers = self.providers.read().map_err(|_| Error::LockPoisoned {
            context: "provider registry".to_string(),
        })?;
        Ok(providers.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }
}
