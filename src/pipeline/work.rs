//! Units of work and the typed extension store they carry.

use std::any::{Any, TypeId};
use std::collections::HashMap;

use uuid::Uuid;

/// Typed value store shared along a dispatch chain. A handler or step
/// earlier in the chain inserts a value; everything later can read it.
/// One value per type.
#[derive(Default)]
pub struct Extensions {
    values: HashMap<TypeId, Box<dyn Any + Send + Sync>>,
}

impl Extensions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a value, returning the previous value of the same type.
    pub fn insert<T: Send + Sync + 'static>(&mut self, value: T) -> Option<T> {
        self.values
            .insert(TypeId::of::<T>(), Box::new(value))
            .and_then(|old| old.downcast().ok())
            .map(|boxed| *boxed)
    }

    pub fn get<T: Send + Sync + 'static>(&self) -> Option<&T> {
        self.values
            .get(&TypeId::of::<T>())
            .and_then(|value| value.downcast_ref())
    }

    pub fn get_mut<T: Send + Sync + 'static>(&mut self) -> Option<&mut T> {
        self.values
            .get_mut(&TypeId::of::<T>())
            .and_then(|value| value.downcast_mut())
    }

    /// Remove and return the value of this type.
    pub fn remove<T: Send + Sync + 'static>(&mut self) -> Option<T> {
        self.values
            .remove(&TypeId::of::<T>())
            .and_then(|old| old.downcast().ok())
            .map(|boxed| *boxed)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl std::fmt::Debug for Extensions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Extensions")
            .field("values", &self.values.len())
            .finish()
    }
}

/// One unit of work flowing down the execution line. Steps read and rewrite
/// the payload in place and pass structured results to later steps through
/// the extension store.
#[derive(Debug)]
pub struct WorkUnit {
    id: Uuid,
    payload: Vec<u8>,
    extensions: Extensions,
}

impl WorkUnit {
    /// Wrap a payload with a fresh v4 id.
    pub fn new(payload: impl Into<Vec<u8>>) -> Self {
        Self {
            id: Uuid::new_v4(),
            payload: payload.into(),
            extensions: Extensions::new(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    pub fn payload_mut(&mut self) -> &mut Vec<u8> {
        &mut self.payload
    }

    pub fn extensions(&self) -> &Extensions {
        &self.extensions
    }

    pub fn extensions_mut(&mut self) -> &mut Extensions {
        &mut self.extensions
    }
}
