#![forbid(unsafe_code)]

//! The binding session returned by [`Binder::bind`](crate::binder::Binder::bind).
//!
//! A [`Bindings`] owns the top-level valves. Dropping it disposes them;
//! [`Bindings::dispose`] does the same eagerly and is idempotent.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tether_core::{NamingConvention, ObjectDisposedError, ObjectRef, Path, WeakObject, WordCase};

use crate::member::Origin;
use crate::observable::lock;
use crate::valve::{BindingGroup, Propagation, Valve};

/// Live bindings between a set of roots.
pub struct Bindings {
    valves: Mutex<Vec<Valve>>,
    roots: Vec<(Origin, WeakObject)>,
    disposed: AtomicBool,
}

impl fmt::Debug for Bindings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bindings")
            .field("valves", &lock(&self.valves).len())
            .field("roots", &self.roots.len())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

impl Bindings {
    pub(crate) fn new(valves: Vec<Valve>, roots: Vec<(Origin, WeakObject)>) -> Self {
        Self {
            valves: Mutex::new(valves),
            roots,
            disposed: AtomicBool::new(false),
        }
    }

    /// Top-level valves. Empty after disposal.
    #[must_use]
    pub fn valves(&self) -> Vec<Valve> {
        lock(&self.valves).clone()
    }

    /// Number of top-level valves.
    #[must_use]
    pub fn len(&self) -> usize {
        lock(&self.valves).len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Every group, nested groups included.
    #[must_use]
    pub fn groups(&self) -> Vec<BindingGroup> {
        self.valves().iter().map(Valve::describe).collect()
    }

    /// The valve bound at `path`, searching nested groups.
    #[must_use]
    pub fn find(&self, path: &Path) -> Option<Valve> {
        self.valves().iter().find_map(|v| v.find(path))
    }

    /// [`find`](Self::find) by dotted member name, e.g. `"control.label"`.
    #[must_use]
    pub fn find_named(&self, dotted: &str) -> Option<Valve> {
        WordCase.parse_path(dotted).and_then(|p| self.find(&p))
    }

    /// Push `root`'s values into every group. Returns how many valves
    /// reported a handled propagation. Unknown roots handle nothing.
    pub fn activate(&self, root: &ObjectRef) -> Result<usize, ObjectDisposedError> {
        let target = Arc::as_ptr(root).cast::<()>();
        let origin = self
            .roots
            .iter()
            .find(|(_, weak)| weak.as_ptr().cast::<()>() == target && weak.strong_count() > 0)
            .map(|(origin, _)| *origin);
        match origin {
            Some(origin) => self.activate_origin(origin),
            None => {
                self.ensure_live()?;
                Ok(0)
            }
        }
    }

    /// Push the values held by `origin` into every group.
    pub fn activate_origin(&self, origin: Origin) -> Result<usize, ObjectDisposedError> {
        self.ensure_live()?;
        let mut handled = 0;
        for valve in self.valves() {
            if valve.activate_origin(origin)? == Propagation::Handled {
                handled += 1;
            }
        }
        tracing::debug!(origin = ?origin, handled, "bindings activated");
        Ok(handled)
    }

    fn ensure_live(&self) -> Result<(), ObjectDisposedError> {
        if self.is_disposed() {
            Err(ObjectDisposedError::new("bindings"))
        } else {
            Ok(())
        }
    }

    /// Dispose every valve. Idempotent.
    pub fn dispose(&self) {
        if self.disposed.swap(true, Ordering::AcqRel) {
            return;
        }
        let valves = std::mem::take(&mut *lock(&self.valves));
        for valve in &valves {
            valve.dispose();
        }
        tracing::debug!(valves = valves.len(), "bindings disposed");
    }

    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }
}

impl Drop for Bindings {
    fn drop(&mut self) {
        self.dispose();
    }
}
