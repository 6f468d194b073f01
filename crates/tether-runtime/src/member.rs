#![forbid(unsafe_code)]

//! Attached bindables.
//!
//! A [`Member`] is a [`Bindable`] template bound to one live object, held
//! weakly. It is what a valve stores and talks to.
//!
//! # Invariants
//!
//! 1. `attach` is idempotent: attaching the object already attached is a
//!    no-op that reports success.
//! 2. `attach` detaches first, so a member is never attached to two
//!    objects.
//! 3. `set_listener` and `attach` commute: the listener is subscribed
//!    whenever both an object and a listener are present.
//! 4. At most one listener is active; setting a new one replaces it.
//! 5. Host code is never invoked while the member's slot lock is held.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use tether_core::{ObjectRef, Path, Payload, Signature, TypeGraph, TypeKey, Value, WeakObject};

use crate::bindable::{Bindable, Capabilities, Capability, Listener};
use crate::observable::{Subscription, lock};

static NEXT_MEMBER_ID: AtomicU64 = AtomicU64::new(1);

/// Where a bindable came from, for origin-distinctness checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Origin {
    /// Index of a root object passed to the binder.
    Root(usize),
    /// Caller-chosen identity for roots bound with explicit tags.
    Activator(u64),
}

#[derive(Default)]
struct Slot {
    object: Option<WeakObject>,
    listener: Option<Listener>,
    subscription: Option<Subscription>,
}

/// A bindable attached (or attachable) to one object.
pub struct Member {
    id: u64,
    origin: Origin,
    template: Bindable,
    /// Object addresses from the bound root down to this member's owner.
    ancestry: Arc<[usize]>,
    slot: Mutex<Slot>,
}

impl fmt::Debug for Member {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Member")
            .field("id", &self.id)
            .field("origin", &self.origin)
            .field("path", self.template.path())
            .field("flags", &self.flags())
            .field("alive", &self.is_alive())
            .finish()
    }
}

impl Member {
    /// Detached member for `template`.
    #[must_use]
    pub fn new(template: Bindable, origin: Origin) -> Self {
        Self::with_ancestry(template, origin, Arc::from([]))
    }

    pub(crate) fn with_ancestry(template: Bindable, origin: Origin, ancestry: Arc<[usize]>) -> Self {
        Self {
            id: NEXT_MEMBER_ID.fetch_add(1, Ordering::Relaxed),
            origin,
            template,
            ancestry,
            slot: Mutex::new(Slot::default()),
        }
    }

    /// Attach to `object`. Returns `false`, leaving the member detached,
    /// when the object's type does not fit the template's source type.
    pub fn attach(&self, object: &ObjectRef, types: &TypeGraph) -> bool {
        if self.object().is_some_and(|current| Arc::ptr_eq(&current, object)) {
            return true;
        }
        self.detach();
        if let Some(source) = self.template.source() {
            if !types.is_subtype(TypeKey::of_object(object), source) {
                tracing::trace!(path = %self.path(), "attach rejected: source type mismatch");
                return false;
            }
        }
        let listener = lock(&self.slot).listener.clone();
        let subscription = listener
            .as_ref()
            .and_then(|l| self.subscribe_on(object, Arc::clone(l)));
        let stale = {
            let mut slot = lock(&self.slot);
            slot.object = Some(Arc::downgrade(object));
            if same_listener(slot.listener.as_ref(), listener.as_ref()) {
                slot.subscription = subscription;
                None
            } else {
                // `set_listener` ran while subscribing and saw no object.
                Some((subscription, slot.listener.clone()))
            }
        };
        if let Some((superseded, current)) = stale {
            drop(superseded);
            self.set_listener(current);
        }
        true
    }

    /// Detach from the current object, dropping any active subscription.
    pub fn detach(&self) {
        let old = {
            let mut slot = lock(&self.slot);
            slot.object = None;
            slot.subscription.take()
        };
        drop(old);
    }

    /// Install or clear the broadcast listener.
    pub fn set_listener(&self, listener: Option<Listener>) {
        let object = self.object();
        let subscription = match (&listener, &object) {
            (Some(l), Some(o)) => self.subscribe_on(o, Arc::clone(l)),
            _ => None,
        };
        let old = {
            let mut slot = lock(&self.slot);
            slot.listener = listener;
            std::mem::replace(&mut slot.subscription, subscription)
        };
        drop(old);
    }

    fn subscribe_on(&self, object: &ObjectRef, listener: Listener) -> Option<Subscription> {
        match self.template.capability() {
            Capability::Property(p) if p.notifies() => p.subscribe(object, listener),
            Capability::Event(e) => e.subscribe(object, listener),
            _ => None,
        }
    }

    /// The attached object, if still alive.
    #[must_use]
    pub fn object(&self) -> Option<ObjectRef> {
        lock(&self.slot).object.as_ref().and_then(|w| w.upgrade())
    }

    /// Whether an attached object is still alive.
    #[must_use]
    pub fn is_alive(&self) -> bool {
        lock(&self.slot)
            .object
            .as_ref()
            .is_some_and(|w| w.strong_count() > 0)
    }

    /// Current value (state members only).
    #[must_use]
    pub fn read(&self) -> Option<Value> {
        let object = self.object()?;
        self.template.read_from(&object)
    }

    /// Offer an incoming payload. `true` when the member accepted it.
    pub fn offer(&self, payload: &Payload) -> bool {
        let Some(object) = self.object() else {
            return false;
        };
        match self.template.capability() {
            Capability::Property(p) => match payload.as_slice() {
                [value] if p.writable() => p.set(&object, value),
                _ => false,
            },
            Capability::Handler(h) => h.try_handle(&object, payload),
            Capability::Event(_) => false,
        }
    }

    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }

    #[must_use]
    pub fn origin(&self) -> Origin {
        self.origin
    }

    #[must_use]
    pub fn template(&self) -> &Bindable {
        &self.template
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        self.template.path()
    }

    #[must_use]
    pub fn signature(&self) -> &Signature {
        self.template.signature()
    }

    #[must_use]
    pub fn flags(&self) -> Capabilities {
        self.template.flags()
    }

    pub(crate) fn ancestry(&self) -> &Arc<[usize]> {
        &self.ancestry
    }
}

fn same_listener(a: Option<&Listener>, b: Option<&Listener>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => Arc::ptr_eq(a, b),
        (None, None) => true,
        _ => false,
    }
}

impl Drop for Member {
    fn drop(&mut self) {
        let slot = self.slot.get_mut().unwrap_or_else(std::sync::PoisonError::into_inner);
        slot.subscription.take();
    }
}
