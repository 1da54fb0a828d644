//! Resource Manager - registry of load-once resources
//!
//! Resources are keyed by `(type, group, name)`. Looking a resource up
//! creates its [`ResourceHandle`] on first use; loading goes through the
//! handle so that concurrent callers share one load. The registry lock is
//! only held while a handle is looked up, never during a load, so loaders
//! may load their own dependencies.

use crate::core::{EngineError, EngineResult};
use crate::render::factory::RenderFactory;
use crate::resources::file_system::FileSystem;
use crate::resources::resource::{Resource, ResourceHandle, ResourceState};
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

type RegistryKey = (TypeId, String, String);

/// Registry of named resources
pub struct ResourceManager {
    file_system: Arc<FileSystem>,
    factory: Arc<RenderFactory>,
    registry: Mutex<HashMap<RegistryKey, Arc<dyn Any + Send + Sync>>>,
}

impl ResourceManager {
    /// Create a manager reading from `file_system`
    pub fn new(file_system: Arc<FileSystem>, factory: Arc<RenderFactory>) -> Self {
        Self {
            file_system,
            factory,
            registry: Mutex::new(HashMap::new()),
        }
    }

    /// Search paths
    pub fn file_system(&self) -> &Arc<FileSystem> {
        &self.file_system
    }

    /// Factory for GPU objects created while loading
    pub fn factory(&self) -> &Arc<RenderFactory> {
        &self.factory
    }

    fn registry(&self) -> MutexGuard<'_, HashMap<RegistryKey, Arc<dyn Any + Send + Sync>>> {
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn key<T: Resource>(name: &str, group: &str) -> RegistryKey {
        (TypeId::of::<T>(), group.to_string(), name.to_string())
    }

    fn downcast<T: Resource>(entry: Arc<dyn Any + Send + Sync>, name: &str) -> EngineResult<Arc<ResourceHandle<T>>> {
        entry.downcast::<ResourceHandle<T>>().map_err(|_| {
            EngineError::assertion_failed(format!("registry entry '{name}' has the wrong type"))
        })
    }

    /// Handle of `name` in `group`, created unloaded on first lookup
    pub fn get_resource_by_name<T: Resource>(&self, name: &str, group: &str) -> EngineResult<Arc<ResourceHandle<T>>> {
        let entry = self
            .registry()
            .entry(Self::key::<T>(name, group))
            .or_insert_with(|| Arc::new(ResourceHandle::<T>::new(name, group)) as Arc<dyn Any + Send + Sync>)
            .clone();
        Self::downcast(entry, name)
    }

    /// Load `name` from `group`, or return the already loaded value
    pub fn load<T: Resource>(&self, name: &str, group: &str) -> EngineResult<Arc<T>> {
        self.get_resource_by_name::<T>(name, group)?.load(self)
    }

    /// Register a value built in code under `name`
    ///
    /// Fails with `ERR_INVALID_STATE` if a loaded resource already has that
    /// name.
    pub fn add_resource<T: Resource>(&self, name: &str, group: &str, value: T) -> EngineResult<Arc<T>> {
        let key = Self::key::<T>(name, group);
        let mut registry = self.registry();
        if let Some(existing) = registry.get(&key) {
            let existing = Self::downcast::<T>(existing.clone(), name)?;
            if existing.state() != ResourceState::Unloaded {
                return Err(EngineError::invalid_state(format!(
                    "{} '{name}' already exists in group '{group}'",
                    T::KIND
                )));
            }
        }

        let value = Arc::new(value);
        registry.insert(key, Arc::new(ResourceHandle::loaded(name, group, value.clone())));
        log::debug!("Added {} '{}' to group '{}'", T::KIND, name, group);
        Ok(value)
    }

    /// State of `name`; unknown resources are `Unloaded`
    pub fn resource_state<T: Resource>(&self, name: &str, group: &str) -> ResourceState {
        let entry = self.registry().get(&Self::key::<T>(name, group)).cloned();
        entry
            .and_then(|entry| Self::downcast::<T>(entry, name).ok())
            .map_or(ResourceState::Unloaded, |handle| handle.state())
    }

    /// Forget `name`; outstanding `Arc`s stay valid
    pub fn remove_resource<T: Resource>(&self, name: &str, group: &str) -> bool {
        self.registry().remove(&Self::key::<T>(name, group)).is_some()
    }

    /// Number of registered handles
    pub fn resource_count(&self) -> usize {
        self.registry().len()
    }
}
