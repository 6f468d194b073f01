#![forbid(unsafe_code)]

//! Core: values, canonical paths, type identity, and adapter registration.
//!
//! # Role in Tether
//! `tether-core` holds the pieces of the binding engine that do not depend
//! on any live object graph: how values are represented and compared, how
//! member names are canonicalised and ordered, how runtime types relate,
//! and how per-type adapters are looked up.
//!
//! # Primary responsibilities
//! - **Value / Payload / Signature**: dynamic values with identity equality
//!   and declared payload types.
//! - **Fragment / Path**: case-insensitive, syllable-ordered canonical names.
//! - **Link / AnyLink**: identity-compared object references for host
//!   fields.
//! - **NamingConvention**: identifier to fragment parsing for scanners.
//! - **TypeGraph**: declared subtype relations.
//! - **AdapterRegistry**: specialisation-ordered adapter lookup.
//!
//! # How it fits in the system
//! `tether-runtime` builds bindables, scanners, the binder, and valves on
//! top of these types. `tether` re-exports both as the public facade.

pub mod error;
pub mod link;
pub mod logging;
pub mod naming;
pub mod path;
pub mod registry;
pub mod types;
pub mod value;

pub use error::{AdapterResolutionError, AdapterResolutionReason, ObjectDisposedError};
pub use link::{AnyLink, Link};
pub use naming::{NamingConvention, WordCase};
pub use path::{Fragment, Path};
pub use registry::{AdapterFactory, AdapterRegistry, AdapterType};
pub use types::{TypeGraph, TypeKey};
pub use value::{
    ObjectRef, Payload, Signature, Snapshot, Value, ValueCodec, ValueType, WeakObject,
    object_addr,
};
