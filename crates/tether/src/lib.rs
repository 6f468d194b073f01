#![forbid(unsafe_code)]

//! Tether public facade.
//!
//! # Role in Tether
//! `tether` is the crate applications depend on. It re-exports the value
//! and path model from `tether-core` and the binder, scanners, and valves
//! from `tether-runtime`.
//!
//! # Quick start
//!
//! ```ignore
//! use tether::prelude::*;
//!
//! let scanner = TableScanner::new()
//!     .with(TypeTable::builder::<View>().property("title", |v: &View| &v.title).build())
//!     .with(TypeTable::builder::<Model>().property("title", |m: &Model| &m.title).build());
//! let bindings = Binder::new(Arc::new(scanner)).bind(&[view.clone(), model.clone()]);
//!
//! model.title.set("hello".into());
//! assert_eq!(view.title.get(), "hello");
//! ```
//!
//! Dropping `bindings` (or calling [`Bindings::dispose`]) tears every
//! group down. Roots are held weakly throughout.


pub use tether_core::{
    AdapterFactory, AdapterRegistry, AdapterResolutionError, AdapterResolutionReason,
    AdapterType, AnyLink, Fragment, Link, NamingConvention, ObjectDisposedError, ObjectRef,
    Path, Payload, Signature, TypeGraph, TypeKey, Value, ValueCodec, ValueType, WeakObject,
    WordCase,
};
pub use tether_runtime::{
    Bindable, Binder, BinderConfig, Bindings, BindingGroup, Capabilities, Capability,
    CapabilityKind, CombiningScanner, EventChannel, FnScanner, Member, MemberInfo, Observable,
    Origin, Propagation, RegistryScanner, Scanner, Subscription, TableScanner, TypeTable,
    TypeTableBuilder, Valve, ValveKind,
};

/// Everything a typical binding setup needs.
pub mod prelude {
    pub use std::sync::Arc;

    pub use crate::{
        AnyLink, Binder, BinderConfig, Bindings, CombiningScanner, EventChannel, Link,
        Observable, ObjectRef, Path, Propagation, Scanner, Signature, TableScanner, TypeGraph,
        TypeTable, Value, ValueType, WordCase,
    };
}
