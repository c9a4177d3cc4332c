use crate::error::{FaultlineError, Result};
use dashmap::DashMap;
use std::any::{Any, TypeId};
use std::sync::Arc;

/// Thread-safe registry of the collaborators the pipelines call out to.
///
/// Services are keyed by the type they are requested as, which is usually a
/// trait object such as `dyn ReportSink`. Lookups happen at use time, so a
/// missing service surfaces as an error from [`Services::resolve`] rather
/// than at construction.
pub struct Services {
    entries: DashMap<TypeId, Entry>,
}

struct Entry {
    type_name: &'static str,
    // Holds an `Arc<T>` for the `T` the entry is keyed by.
    instance: Box<dyn Any + Send + Sync>,
}

impl Services {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    /// Registers `service` as the implementation of `T`, replacing any
    /// previous one.
    pub fn provide<T>(&mut self, service: Arc<T>) -> &mut Self
    where
        T: ?Sized + Send + Sync + 'static,
    {
        self.entries.insert(
            TypeId::of::<T>(),
            Entry {
                type_name: std::any::type_name::<T>(),
                instance: Box::new(service),
            },
        );
        self
    }

    pub fn resolve<T>(&self) -> Result<Arc<T>>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        let entry = self.entries.get(&TypeId::of::<T>()).ok_or_else(|| {
            FaultlineError::ServiceNotFound {
                type_name: std::any::type_name::<T>().to_string(),
            }
        })?;

        entry
            .instance
            .downcast_ref::<Arc<T>>()
            .cloned()
            .ok_or_else(|| FaultlineError::DowncastFailed {
                type_name: entry.type_name.to_string(),
            })
    }

    pub fn contains<T: ?Sized + 'static>(&self) -> bool {
        self.entries.contains_key(&TypeId::of::<T>())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for Services {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Services {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&'static str> = self.entries.iter().map(|e| e.type_name).collect();
        f.debug_struct("Services").field("entries", &names).finish()
    }
}
