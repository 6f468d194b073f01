#![forbid(unsafe_code)]

//! Runtime: discovering bindables on live objects and keeping them in sync.
//!
//! # Role in Tether
//! `tether-runtime` turns root objects into live two-way bindings. It
//! scans each root for bindable members, groups members that share a
//! canonical path across roots, and installs a valve per group that
//! relays changes between them.
//!
//! # Primary responsibilities
//! - **Observable / EventChannel**: host-side primitives that notify.
//! - **TypeTable / TableScanner**: declarative per-type member tables.
//! - **Scanner / CombiningScanner / RegistryScanner**: member discovery.
//! - **Member**: a bindable attached weakly to one object.
//! - **Binder**: the grouping algorithm.
//! - **Valve**: propagation, echo suppression, and nested rebinding.
//! - **Bindings**: the session handle; dropping it disposes everything.
//!
//! # How it fits in the system
//! Built on `tether-core` values, paths, and the adapter registry. The
//! `tether` facade crate re-exports this crate's public surface.

pub mod bindable;
pub mod binder;
pub mod bindings;
pub mod combine;
pub mod config;
pub mod event;
pub mod member;
pub mod observable;
pub mod scanner;
pub mod table;
pub mod valve;

pub use bindable::{
    Bindable, Capabilities, Capability, CapabilityKind, EventSource, HandlerSink, Listener,
    PropertyAccess,
};
pub use binder::Binder;
pub use bindings::Bindings;
pub use combine::{combine, combine_all};
pub use config::{BinderConfig, BinderConfigParse, ConfigError, DEFAULT_MAX_DEPTH};
pub use event::EventChannel;
pub use member::{Member, Origin};
pub use observable::{Observable, Subscription};
pub use scanner::{CombiningScanner, FnScanner, RegistryScanner, ScanCache, Scanner};
pub use table::{TableScanner, TypeTable, TypeTableBuilder, canonical};
pub use valve::{BindingGroup, MemberInfo, Propagation, Valve, ValveKind};
