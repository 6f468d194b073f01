#![forbid(unsafe_code)]

//! Declarative member tables for host types.
//!
//! Rust has no runtime reflection, so a host type describes its bindable
//! surface once with a [`TypeTable`]:
//!
//! ```ignore
//! let table = TypeTable::builder::<Person>()
//!     .property("name", |p: &Person| &p.name)
//!     .readonly("id", |p: &Person| &p.id)
//!     .event("saved", Signature::default(), |p: &Person| &p.saved)
//!     .handler("rename", Signature::single(ValueType::Text), |p: &Person, args| {
//!         match args.first().and_then(Value::as_text) {
//!             Some(name) => p.name.set(name.to_string()) || true,
//!             None => false,
//!         }
//!     })
//!     .build();
//! ```
//!
//! Member names are parsed by a [`NamingConvention`] ([`WordCase`] unless
//! overridden), so `on_click`, `onClick`, and `OnClick` all canonicalize to
//! the same path. Names that yield no syllables are skipped with a warning.

use std::any::Any;
use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::Arc;

use tether_core::{
    NamingConvention, ObjectRef, Path, Payload, Signature, TypeKey, Value, ValueCodec, ValueType,
    WordCase,
};

use crate::bindable::{Bindable, Capability, EventSource, HandlerSink, Listener, PropertyAccess};
use crate::event::EventChannel;
use crate::observable::{Observable, Subscription};
use crate::scanner::Scanner;

fn downcast<O: Any>(target: &ObjectRef) -> Option<&O> {
    (**target).downcast_ref::<O>()
}

struct ObservableField<O, T: 'static> {
    field: fn(&O) -> &Observable<T>,
    writable: bool,
}

impl<O, T> PropertyAccess for ObservableField<O, T>
where
    O: Any + Send + Sync,
    T: ValueCodec + Clone + PartialEq + Send + 'static,
{
    fn get(&self, target: &ObjectRef) -> Option<Value> {
        downcast::<O>(target).map(|o| (self.field)(o).get().to_value())
    }

    fn set(&self, target: &ObjectRef, value: &Value) -> bool {
        if !self.writable {
            return false;
        }
        let (Some(o), Some(v)) = (downcast::<O>(target), T::from_value(value)) else {
            return false;
        };
        (self.field)(o).set(v);
        true
    }

    fn writable(&self) -> bool {
        self.writable
    }

    fn notifies(&self) -> bool {
        true
    }

    fn subscribe(&self, target: &ObjectRef, listener: Listener) -> Option<Subscription> {
        let o = downcast::<O>(target)?;
        Some((self.field)(o).subscribe(move |v: &T| listener(&vec![v.to_value()])))
    }
}

struct ComputedField<O, F> {
    getter: F,
    _owner: PhantomData<fn(&O)>,
}

impl<O, F> PropertyAccess for ComputedField<O, F>
where
    O: Any + Send + Sync,
    F: Fn(&O) -> Value + Send + Sync,
{
    fn get(&self, target: &ObjectRef) -> Option<Value> {
        downcast::<O>(target).map(|o| (self.getter)(o))
    }

    fn set(&self, _target: &ObjectRef, _value: &Value) -> bool {
        false
    }

    fn writable(&self) -> bool {
        false
    }

    fn notifies(&self) -> bool {
        false
    }

    fn subscribe(&self, _target: &ObjectRef, _listener: Listener) -> Option<Subscription> {
        None
    }
}

struct EventField<O> {
    field: fn(&O) -> &EventChannel,
}

impl<O: Any + Send + Sync> EventSource for EventField<O> {
    fn subscribe(&self, target: &ObjectRef, listener: Listener) -> Option<Subscription> {
        let o = downcast::<O>(target)?;
        Some((self.field)(o).subscribe(move |p| listener(p)))
    }
}

struct ClosureHandler<O, F> {
    handler: F,
    _owner: PhantomData<fn(&O)>,
}

impl<O, F> HandlerSink for ClosureHandler<O, F>
where
    O: Any + Send + Sync,
    F: Fn(&O, &Payload) -> bool + Send + Sync,
{
    fn try_handle(&self, target: &ObjectRef, payload: &Payload) -> bool {
        downcast::<O>(target).is_some_and(|o| (self.handler)(o, payload))
    }
}

/// Bindable surface of one host type.
#[derive(Debug, Clone)]
pub struct TypeTable {
    key: TypeKey,
    bindables: Arc<[Bindable]>,
}

impl TypeTable {
    /// Start describing `O`.
    #[must_use]
    pub fn builder<O: Any + Send + Sync>() -> TypeTableBuilder<O> {
        TypeTableBuilder {
            naming: Arc::new(WordCase),
            bindables: Vec::new(),
            _owner: PhantomData,
        }
    }

    /// The described type.
    #[must_use]
    pub fn key(&self) -> TypeKey {
        self.key
    }

    /// Discovered templates, in declaration order.
    #[must_use]
    pub fn bindables(&self) -> &[Bindable] {
        &self.bindables
    }
}

impl Scanner for TypeTable {
    fn scan_type(&self, ty: TypeKey) -> Vec<Bindable> {
        if ty == self.key {
            self.bindables.to_vec()
        } else {
            Vec::new()
        }
    }
}

/// Builder returned by [`TypeTable::builder`].
pub struct TypeTableBuilder<O> {
    naming: Arc<dyn NamingConvention>,
    bindables: Vec<Bindable>,
    _owner: PhantomData<fn(&O)>,
}

impl<O: Any + Send + Sync> TypeTableBuilder<O> {
    /// Parse member names with `naming` instead of [`WordCase`].
    #[must_use]
    pub fn with_naming(mut self, naming: impl NamingConvention + 'static) -> Self {
        self.naming = Arc::new(naming);
        self
    }

    fn push(mut self, name: &str, signature: Signature, capability: Capability) -> Self {
        match self.naming.parse_path(name) {
            Some(path) => {
                self.bindables.push(
                    Bindable::new(name, path, signature, capability).with_source(TypeKey::of::<O>()),
                );
            }
            None => {
                tracing::warn!(
                    name,
                    owner = std::any::type_name::<O>(),
                    "member name yields no path; skipped"
                );
            }
        }
        self
    }

    /// A read/write state member backed by an [`Observable`] field.
    #[must_use]
    pub fn property<T>(self, name: &str, field: fn(&O) -> &Observable<T>) -> Self
    where
        T: ValueCodec + Clone + PartialEq + Send + 'static,
    {
        let access = ObservableField {
            field,
            writable: true,
        };
        self.push(
            name,
            Signature::single(T::value_type()),
            Capability::Property(Arc::new(access)),
        )
    }

    /// A state member that notifies but never accepts writes.
    #[must_use]
    pub fn readonly<T>(self, name: &str, field: fn(&O) -> &Observable<T>) -> Self
    where
        T: ValueCodec + Clone + PartialEq + Send + 'static,
    {
        let access = ObservableField {
            field,
            writable: false,
        };
        self.push(
            name,
            Signature::single(T::value_type()),
            Capability::Property(Arc::new(access)),
        )
    }

    /// A read-only, non-notifying state member computed on demand.
    #[must_use]
    pub fn computed(
        self,
        name: &str,
        ty: ValueType,
        getter: impl Fn(&O) -> Value + Send + Sync + 'static,
    ) -> Self {
        let access = ComputedField {
            getter,
            _owner: PhantomData,
        };
        self.push(name, Signature::single(ty), Capability::Property(Arc::new(access)))
    }

    /// An occurrence broadcast through an [`EventChannel`] field.
    #[must_use]
    pub fn event(self, name: &str, signature: Signature, field: fn(&O) -> &EventChannel) -> Self {
        self.push(name, signature, Capability::Event(Arc::new(EventField { field })))
    }

    /// A payload receiver. The closure returns `false` to decline.
    #[must_use]
    pub fn handler(
        self,
        name: &str,
        signature: Signature,
        handler: impl Fn(&O, &Payload) -> bool + Send + Sync + 'static,
    ) -> Self {
        let sink = ClosureHandler {
            handler,
            _owner: PhantomData,
        };
        self.push(name, signature, Capability::Handler(Arc::new(sink)))
    }

    #[must_use]
    pub fn build(self) -> TypeTable {
        TypeTable {
            key: TypeKey::of::<O>(),
            bindables: self.bindables.into(),
        }
    }
}

/// Static scanner over a set of [`TypeTable`]s.
#[derive(Debug, Clone, Default)]
pub struct TableScanner {
    tables: HashMap<TypeKey, TypeTable>,
}

impl TableScanner {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add (or replace) the table for its type.
    #[must_use]
    pub fn with(mut self, table: TypeTable) -> Self {
        self.insert(table);
        self
    }

    pub fn insert(&mut self, table: TypeTable) {
        self.tables.insert(table.key(), table);
    }

    /// Number of described types.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tables.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}

impl Scanner for TableScanner {
    fn scan_type(&self, ty: TypeKey) -> Vec<Bindable> {
        self.tables
            .get(&ty)
            .map(|t| t.bindables().to_vec())
            .unwrap_or_default()
    }
}

/// Path of a dotted member name under [`WordCase`]; `None` for names with
/// no syllables.
#[must_use]
pub fn canonical(name: &str) -> Option<Path> {
    WordCase.parse_path(name)
}
