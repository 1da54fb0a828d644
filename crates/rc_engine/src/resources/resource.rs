//! Load-once resource handles

use crate::core::EngineResult;
use crate::resources::resource_manager::ResourceManager;
use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

/// Resource category, used for logging
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    /// Mesh
    Mesh,
    /// Skeleton
    Skeleton,
    /// Animation clip
    Animation,
    /// Material
    Material,
    /// Effect
    Effect,
    /// Texture
    Texture,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Load state of a handle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ResourceState {
    /// Not loaded, or the last load failed
    Unloaded = 0,
    /// A load is in progress
    Loading = 1,
    /// Value available
    Loaded = 2,
}

impl ResourceState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => ResourceState::Loading,
            2 => ResourceState::Loaded,
            _ => ResourceState::Unloaded,
        }
    }
}

/// A type the resource manager can load by name
pub trait Resource: Send + Sync + Sized + 'static {
    /// Category
    const KIND: ResourceKind;

    /// Build the resource; dependencies are loaded through `manager`
    fn load_impl(manager: &ResourceManager, name: &str, group: &str) -> EngineResult<Self>;
}

/// Registry entry of one `(type, group, name)`
///
/// Concurrent [`load`](Self::load) calls are serialised on the handle, so
/// `load_impl` runs at most once per successful load.
#[derive(Debug)]
pub struct ResourceHandle<T> {
    name: String,
    group: String,
    state: AtomicU8,
    slot: Mutex<Option<Arc<T>>>,
}

impl<T: Resource> ResourceHandle<T> {
    pub(crate) fn new(name: &str, group: &str) -> Self {
        Self {
            name: name.to_string(),
            group: group.to_string(),
            state: AtomicU8::new(ResourceState::Unloaded as u8),
            slot: Mutex::new(None),
        }
    }

    pub(crate) fn loaded(name: &str, group: &str, value: Arc<T>) -> Self {
        Self {
            name: name.to_string(),
            group: group.to_string(),
            state: AtomicU8::new(ResourceState::Loaded as u8),
            slot: Mutex::new(Some(value)),
        }
    }

    /// Resource name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Resource group
    pub fn group(&self) -> &str {
        &self.group
    }

    /// Current state
    pub fn state(&self) -> ResourceState {
        ResourceState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// The value if loaded, without loading
    pub fn get(&self) -> Option<Arc<T>> {
        if self.state() != ResourceState::Loaded {
            return None;
        }
        self.slot.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Load the value unless already loaded
    pub fn load(&self, manager: &ResourceManager) -> EngineResult<Arc<T>> {
        let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(value) = slot.as_ref() {
            return Ok(value.clone());
        }

        self.state.store(ResourceState::Loading as u8, Ordering::Release);
        log::debug!("Loading {} '{}' (group '{}')", T::KIND, self.name, self.group);
        match T::load_impl(manager, &self.name, &self.group) {
            Ok(value) => {
                let value = Arc::new(value);
                *slot = Some(value.clone());
                self.state.store(ResourceState::Loaded as u8, Ordering::Release);
                Ok(value)
            }
            Err(error) => {
                self.state.store(ResourceState::Unloaded as u8, Ordering::Release);
                log::warn!("Failed to load {} '{}': {}", T::KIND, self.name, error);
                Err(error)
            }
        }
    }
}
