#![forbid(unsafe_code)]

//! Bindable templates: what a scanner discovers on a type.
//!
//! A [`Bindable`] names one member (its canonical [`Path`]), declares the
//! payload [`Signature`] it exchanges, and carries a [`Capability`] that
//! knows how to read, write, observe, or invoke that member on a live
//! object. Templates never hold an object; attachment happens later, on a
//! [`Member`](crate::member::Member).
//!
//! Capabilities are a tagged union rather than a class hierarchy:
//!
//! | Variant    | Flags                                  |
//! |------------|----------------------------------------|
//! | `Property` | `READ`, `BROADCAST` if it notifies, `HANDLE` if writable |
//! | `Event`    | `BROADCAST`                            |
//! | `Handler`  | `HANDLE`                               |

use std::fmt;
use std::sync::Arc;

use bitflags::bitflags;
use tether_core::{ObjectRef, Path, Payload, Signature, TypeKey, Value};

use crate::observable::Subscription;

bitflags! {
    /// What a bindable can do.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Capabilities: u8 {
        /// Exposes a current value.
        const READ = 1;
        /// Reports changes or occurrences to a listener.
        const BROADCAST = 1 << 1;
        /// Accepts incoming payloads.
        const HANDLE = 1 << 2;
    }
}

/// Callback installed on a broadcaster.
pub type Listener = Arc<dyn Fn(&Payload) + Send + Sync>;

/// Read/write/observe access to a state member.
pub trait PropertyAccess: Send + Sync {
    /// Current value, or `None` when `target` is not the expected type.
    fn get(&self, target: &ObjectRef) -> Option<Value>;

    /// Write a value. `false` when read-only or the value does not fit.
    fn set(&self, target: &ObjectRef, value: &Value) -> bool;

    /// Whether `set` can ever succeed.
    fn writable(&self) -> bool;

    /// Whether `subscribe` can report changes.
    fn notifies(&self) -> bool;

    /// Report changes as single-value payloads. `None` when the member
    /// cannot notify or `target` is not the expected type.
    fn subscribe(&self, target: &ObjectRef, listener: Listener) -> Option<Subscription>;
}

/// An occurrence a member broadcasts.
pub trait EventSource: Send + Sync {
    fn subscribe(&self, target: &ObjectRef, listener: Listener) -> Option<Subscription>;
}

/// A member that reacts to incoming payloads.
pub trait HandlerSink: Send + Sync {
    /// `true` when the payload was accepted.
    fn try_handle(&self, target: &ObjectRef, payload: &Payload) -> bool;
}

/// Discriminant of [`Capability`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CapabilityKind {
    Property,
    Event,
    Handler,
}

/// How a bindable interacts with its object.
#[derive(Clone)]
pub enum Capability {
    Property(Arc<dyn PropertyAccess>),
    Event(Arc<dyn EventSource>),
    Handler(Arc<dyn HandlerSink>),
}

impl Capability {
    #[must_use]
    pub fn kind(&self) -> CapabilityKind {
        match self {
            Self::Property(_) => CapabilityKind::Property,
            Self::Event(_) => CapabilityKind::Event,
            Self::Handler(_) => CapabilityKind::Handler,
        }
    }

    #[must_use]
    pub fn flags(&self) -> Capabilities {
        match self {
            Self::Property(p) => {
                let mut flags = Capabilities::READ;
                flags.set(Capabilities::BROADCAST, p.notifies());
                flags.set(Capabilities::HANDLE, p.writable());
                flags
            }
            Self::Event(_) => Capabilities::BROADCAST,
            Self::Handler(_) => Capabilities::HANDLE,
        }
    }
}

impl fmt::Debug for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}({:?})", self.kind(), self.flags())
    }
}

/// A discovered member, not attached to any object.
///
/// Cheap to clone; cloning is how the binder obtains a fresh descriptor
/// while leaving the scanner's template reusable.
#[derive(Clone)]
pub struct Bindable {
    name: Arc<str>,
    path: Path,
    signature: Signature,
    source: Option<TypeKey>,
    capability: Capability,
}

impl fmt::Debug for Bindable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bindable")
            .field("name", &self.name)
            .field("path", &self.path)
            .field("signature", &self.signature)
            .field("source", &self.source)
            .field("capability", &self.capability)
            .finish()
    }
}

impl Bindable {
    /// New template. `name` is the raw host identifier, kept for
    /// diagnostics.
    #[must_use]
    pub fn new(
        name: impl Into<Arc<str>>,
        path: Path,
        signature: Signature,
        capability: Capability,
    ) -> Self {
        Self {
            name: name.into(),
            path,
            signature,
            source: None,
            capability,
        }
    }

    /// Restrict attachment to objects of type `source` (or its subtypes).
    #[must_use]
    pub fn with_source(mut self, source: TypeKey) -> Self {
        self.source = Some(source);
        self
    }

    /// Copy with `base` prepended to the path.
    #[must_use]
    pub fn rebased(&self, base: &Path) -> Self {
        let mut out = self.clone();
        out.path = base.concat(&self.path);
        out
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    /// Expected object type, if restricted.
    #[must_use]
    pub fn source(&self) -> Option<TypeKey> {
        self.source
    }

    #[must_use]
    pub fn capability(&self) -> &Capability {
        &self.capability
    }

    #[must_use]
    pub fn kind(&self) -> CapabilityKind {
        self.capability.kind()
    }

    #[must_use]
    pub fn flags(&self) -> Capabilities {
        self.capability.flags()
    }

    /// Read the member's value on `target` (state members only).
    #[must_use]
    pub fn read_from(&self, target: &ObjectRef) -> Option<Value> {
        match &self.capability {
            Capability::Property(p) => p.get(target),
            _ => None,
        }
    }
}
