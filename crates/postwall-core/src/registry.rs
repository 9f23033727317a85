//! Type-keyed handler table shared by the command and query dispatchers.

use std::any::{Any, TypeId, type_name};
use std::collections::HashMap;

use crate::error::DomainError;

struct Registration {
    name: &'static str,
    handler: Box<dyn Any + Send + Sync>,
}

/// Maps a request type to exactly one type-erased handler.
pub(crate) struct HandlerRegistry {
    kind: &'static str,
    handlers: HashMap<TypeId, Registration>,
}

impl HandlerRegistry {
    pub(crate) fn new(kind: &'static str) -> Self {
        Self {
            kind,
            handlers: HashMap::new(),
        }
    }

    /// Registers `handler` for request type `K`.
    pub(crate) fn insert<K, H>(&mut self, handler: H) -> Result<(), DomainError>
    where
        K: 'static,
        H: Any + Send + Sync,
    {
        let key = TypeId::of::<K>();
        if let Some(existing) = self.handlers.get(&key) {
            return Err(DomainError::Routing(format!(
                "a {} handler is already registered for {}",
                self.kind, existing.name
            )));
        }
        self.handlers.insert(
            key,
            Registration {
                name: type_name::<K>(),
                handler: Box::new(handler),
            },
        );
        Ok(())
    }

    /// Looks up the handler registered for request type `K`.
    pub(crate) fn get<K, H>(&self) -> Option<&H>
    where
        K: 'static,
        H: Any,
    {
        self.handlers
            .get(&TypeId::of::<K>())
            .and_then(|registration| registration.handler.downcast_ref::<H>())
    }

    pub(crate) fn names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.handlers.values().map(|r| r.name).collect();
        names.sort_unstable();
        names
    }
}

impl std::fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("kind", &self.kind)
            .field("handlers", &self.names())
            .finish()
    }
}
