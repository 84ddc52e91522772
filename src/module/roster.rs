//! Priority-ordered attachment bookkeeping shared by both dispatch surfaces.
//!
//! # Design Decisions
//! - One `RwLock<Vec<Entry>>` per surface. Dispatch iterates under the read
//!   lock for the whole chain; attach/detach take the write lock. Detach
//!   returning therefore means no in-flight chain still references the
//!   module, which is what lets the host destroy it afterwards.
//! - The vector is kept sorted by `(priority, seq)` where `seq` is a
//!   monotonic attach counter. Lower priority runs earlier; equal
//!   priorities keep attach order, and re-attaching lands after existing
//!   peers because it takes a fresh `seq`.

use std::sync::{Arc, RwLock};

use super::contract::Module;
use super::core::LifecycleState;
use super::error::{ContractViolation, Surface};

/// One live attachment: the owning module plus the capability the surface
/// dispatches through. Priority is captured at attach time so live order
/// never drifts.
pub(crate) struct Entry<C: ?Sized> {
    pub module: Arc<dyn Module>,
    pub capability: Arc<C>,
    pub priority: i32,
    seq: u64,
}

struct Entries<C: ?Sized> {
    sorted: Vec<Entry<C>>,
    next_seq: u64,
}

/// Ordered set of attached modules for one surface.
pub(crate) struct Roster<C: ?Sized> {
    surface: Surface,
    inner: RwLock<Entries<C>>,
}

impl<C: ?Sized> Roster<C> {
    pub fn new(surface: Surface) -> Self {
        Self {
            surface,
            inner: RwLock::new(Entries {
                sorted: Vec::new(),
                next_seq: 0,
            }),
        }
    }

    /// Insert at the `(priority, attach-order)` position.
    ///
    /// Rejects modules outside the Initialized state and modules already
    /// attached here. Neither rejection changes the roster.
    pub fn attach(
        &self,
        module: Arc<dyn Module>,
        capability: Arc<C>,
    ) -> Result<(), ContractViolation> {
        let state = module.core().state();
        if state != LifecycleState::Initialized {
            return Err(ContractViolation::NotInitialized {
                module: module.name().to_owned(),
                surface: self.surface,
                state,
            });
        }

        let priority = module.priority();
        let mut inner = self.inner.write().expect("roster lock poisoned");

        if inner.sorted.iter().any(|e| e.module.name() == module.name()) {
            return Err(ContractViolation::AlreadyAttached {
                module: module.name().to_owned(),
                surface: self.surface,
            });
        }

        let seq = inner.next_seq;
        inner.next_seq += 1;
        // next_seq is monotonic, so among equal priorities the new entry
        // belongs after every existing one.
        let at = inner.sorted.partition_point(|e| e.priority <= priority);
        inner.sorted.insert(
            at,
            Entry {
                module,
                capability,
                priority,
                seq,
            },
        );
        debug_assert!(inner
            .sorted
            .windows(2)
            .all(|w| (w[0].priority, w[0].seq) < (w[1].priority, w[1].seq)));
        Ok(())
    }

    /// Remove the named module's entry. The relative order of everything
    /// else is untouched; detaching a module that is not here fails and
    /// changes nothing.
    pub fn detach(&self, name: &str) -> Result<(), ContractViolation> {
        let mut inner = self.inner.write().expect("roster lock poisoned");
        match inner.sorted.iter().position(|e| e.module.name() == name) {
            Some(idx) => {
                inner.sorted.remove(idx);
                Ok(())
            }
            None => Err(ContractViolation::NotAttached {
                module: name.to_owned(),
                surface: self.surface,
            }),
        }
    }

    /// Run `op` over every entry in execution order, stopping at the first
    /// error. Holds the read lock for the whole chain. Returns how many
    /// entries completed.
    pub fn dispatch<E>(&self, mut op: impl FnMut(&Entry<C>) -> Result<(), E>) -> Result<usize, E> {
        let inner = self.inner.read().expect("roster lock poisoned");
        let mut completed = 0;
        for entry in &inner.sorted {
            op(entry)?;
            completed += 1;
        }
        Ok(completed)
    }

    /// Module names in execution order.
    pub fn snapshot(&self) -> Vec<String> {
        let inner = self.inner.read().expect("roster lock poisoned");
        inner
            .sorted
            .iter()
            .map(|e| e.module.name().to_owned())
            .collect()
    }

    /// `(name, priority)` of every entry in execution order. The priority
    /// is the attach-time capture, not whatever the module reports now.
    pub fn manifest(&self) -> Vec<(String, i32)> {
        let inner = self.inner.read().expect("roster lock poisoned");
        inner
            .sorted
            .iter()
            .map(|e| (e.module.name().to_owned(), e.priority))
            .collect()
    }

    /// Whether the named module is attached here.
    pub fn contains(&self, name: &str) -> bool {
        let inner = self.inner.read().expect("roster lock poisoned");
        inner.sorted.iter().any(|e| e.module.name() == name)
    }

    /// Number of live attachments.
    pub fn len(&self) -> usize {
        self.inner.read().expect("roster lock poisoned").sorted.len()
    }
}
