use std::collections::HashMap;

use anyhow::{anyhow, Result};

use super::backend::{DetectorBackend, Model};

/// Registry of detector backends, keyed by name.
///
/// Loading consumes a backend, so each registered backend can be loaded once.
pub struct BackendRegistry {
    backends: HashMap<String, Box<dyn DetectorBackend>>,
    default_name: Option<String>,
}

impl BackendRegistry {
    pub fn new() -> Self {
        Self {
            backends: HashMap::new(),
            default_name: None,
        }
    }

    /// Register a backend. The first registered backend becomes the default.
    pub fn register<B: DetectorBackend + 'static>(&mut self, backend: B) {
        let name = backend.name().to_string();
        if self.default_name.is_none() {
            self.default_name = Some(name.clone());
        }
        self.backends.insert(name, Box::new(backend));
    }

    /// Set default backend by name.
    pub fn set_default(&mut self, name: &str) -> Result<()> {
        if !self.backends.contains_key(name) {
            return Err(anyhow!(
                "backend '{}' not registered (available: {})",
                name,
                self.list().join(", ")
            ));
        }
        self.default_name = Some(name.to_string());
        Ok(())
    }

    /// List registered backends, sorted.
    pub fn list(&self) -> Vec<String> {
        let mut names: Vec<String> = self.backends.keys().cloned().collect();
        names.sort();
        names
    }

    /// Load the named backend.
    pub fn load(&mut self, name: &str) -> Result<Box<dyn Model>> {
        let backend = self
            .backends
            .remove(name)
            .ok_or_else(|| anyhow!("backend '{}' not registered or already loaded", name))?;
        log::info!("loading detection backend '{}'", name);
        backend.load()
    }

    /// Load the default backend.
    pub fn load_default(&mut self) -> Result<Box<dyn Model>> {
        let name = self
            .default_name
            .clone()
            .ok_or_else(|| anyhow!("no detection backend registered"))?;
        self.load(&name)
    }
}

impl Default for BackendRegistry {
    fn default() -> Self {
        Self::new()
    }
}
