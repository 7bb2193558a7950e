//! The instance seam the startup code delegates to, and a registry of
//! named instances

use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use thiserror::Error;

use crate::config::Options;
use crate::startup::StartupError;

/// Read access to an instance's current options
pub trait InstanceState: Send + Sync {
    fn options(&self) -> Options;
}

/// Completion callback for an initialization attempt
pub type StartCallback<I> = Box<dyn FnOnce(Result<Arc<I>, StartupError>) + Send>;

/// A running (or runnable) dev-server instance
pub trait Instance: InstanceState + 'static {
    fn name(&self) -> &str;

    /// True while the instance is initializing or running
    fn is_active(&self) -> bool;

    /// Start with fully merged options, reporting through `cb`
    fn init(self: Arc<Self>, options: Options, cb: StartCallback<Self>)
    where
        Self: Sized;
}

#[derive(Debug, Error, PartialEq)]
pub enum RegistryError {
    #[error("An instance with the name `{0}` already exists")]
    Duplicate(String),

    #[error("An instance with the name `{0}` was not found")]
    NotFound(String),
}

/// Named instances, independent of each other
pub struct Registry<I> {
    instances: DashMap<String, Arc<I>>,
}

impl<I> Default for Registry<I> {
    fn default() -> Self {
        Self {
            instances: DashMap::new(),
        }
    }
}

impl<I: Instance> Registry<I> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create and register an instance under `name`
    pub fn create_with<F>(&self, name: &str, factory: F) -> Result<Arc<I>, RegistryError>
    where
        F: FnOnce(&str) -> Arc<I>,
    {
        match self.instances.entry(name.to_string()) {
            Entry::Occupied(_) => Err(RegistryError::Duplicate(name.to_string())),
            Entry::Vacant(slot) => {
                let instance = factory(name);
                slot.insert(Arc::clone(&instance));
                Ok(instance)
            }
        }
    }

    pub fn get(&self, name: &str) -> Result<Arc<I>, RegistryError> {
        self.instances
            .get(name)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| RegistryError::NotFound(name.to_string()))
    }

    pub fn has(&self, name: &str) -> bool {
        self.instances.contains_key(name)
    }

    pub fn remove(&self, name: &str) -> Option<Arc<I>> {
        self.instances.remove(name).map(|(_, instance)| instance)
    }

    /// Forget every instance
    pub fn reset(&self) {
        self.instances.clear();
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }
}
