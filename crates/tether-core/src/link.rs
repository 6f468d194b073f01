#![forbid(unsafe_code)]

//! Identity-compared object references for observable host fields.
//!
//! Host objects rarely implement `PartialEq`, yet observable fields need
//! equality to detect changes. [`Link<T>`] and [`AnyLink`] hold an optional
//! shared reference and compare by pointer identity, matching how
//! [`Value::Object`] compares.
//!
//! | Type        | Declared type            | Accepts                 |
//! |-------------|--------------------------|-------------------------|
//! | `Link<T>`   | `Object(Some(T))`        | `T` objects or unit     |
//! | `AnyLink`   | `Object(None)`           | any object or unit      |

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use crate::types::TypeKey;
use crate::value::{ObjectRef, Value, ValueCodec, ValueType, object_addr};

/// Optional typed reference, compared by identity.
pub struct Link<T>(Option<Arc<T>>);

impl<T> Link<T> {
    #[must_use]
    pub fn new(target: Arc<T>) -> Self {
        Self(Some(target))
    }

    #[must_use]
    pub fn none() -> Self {
        Self(None)
    }

    #[must_use]
    pub fn get(&self) -> Option<&Arc<T>> {
        self.0.as_ref()
    }

    #[must_use]
    pub fn is_none(&self) -> bool {
        self.0.is_none()
    }
}

impl<T> Clone for Link<T> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<T> Default for Link<T> {
    fn default() -> Self {
        Self(None)
    }
}

impl<T> PartialEq for Link<T> {
    fn eq(&self, other: &Self) -> bool {
        match (&self.0, &other.0) {
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            (None, None) => true,
            _ => false,
        }
    }
}

impl<T> Eq for Link<T> {}

impl<T> fmt::Debug for Link<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            Some(a) => write!(f, "Link({:p})", Arc::as_ptr(a)),
            None => f.write_str("Link(None)"),
        }
    }
}

impl<T> From<Arc<T>> for Link<T> {
    fn from(target: Arc<T>) -> Self {
        Self::new(target)
    }
}

impl<T: Any + Send + Sync> ValueCodec for Link<T> {
    fn value_type() -> ValueType {
        ValueType::Object(Some(TypeKey::of::<T>()))
    }

    fn to_value(&self) -> Value {
        self.0
            .as_ref()
            .map_or(Value::Unit, |t| Value::Object(Arc::clone(t) as ObjectRef))
    }

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Unit => Some(Self::none()),
            Value::Object(_) => value.downcast::<T>().map(Self::new),
            _ => None,
        }
    }
}

/// Optional erased reference, compared by identity.
#[derive(Clone, Default)]
pub struct AnyLink(Option<ObjectRef>);

impl AnyLink {
    #[must_use]
    pub fn new<T: Any + Send + Sync>(target: Arc<T>) -> Self {
        Self(Some(target))
    }

    #[must_use]
    pub fn from_object(object: ObjectRef) -> Self {
        Self(Some(object))
    }

    #[must_use]
    pub fn none() -> Self {
        Self(None)
    }

    #[must_use]
    pub fn object(&self) -> Option<&ObjectRef> {
        self.0.as_ref()
    }

    /// The target as `T`, if it is one.
    #[must_use]
    pub fn downcast<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        self.0
            .as_ref()
            .and_then(|o| Arc::clone(o).downcast::<T>().ok())
    }

    #[must_use]
    pub fn is_none(&self) -> bool {
        self.0.is_none()
    }
}

impl PartialEq for AnyLink {
    fn eq(&self, other: &Self) -> bool {
        match (&self.0, &other.0) {
            (Some(a), Some(b)) => object_addr(a) == object_addr(b),
            (None, None) => true,
            _ => false,
        }
    }
}

impl Eq for AnyLink {}

impl fmt::Debug for AnyLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            Some(o) => write!(f, "AnyLink({:#x})", object_addr(o)),
            None => f.write_str("AnyLink(None)"),
        }
    }
}

impl ValueCodec for AnyLink {
    fn value_type() -> ValueType {
        ValueType::Object(None)
    }

    fn to_value(&self) -> Value {
        self.0
            .as_ref()
            .map_or(Value::Unit, |o| Value::Object(Arc::clone(o)))
    }

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Unit => Some(Self::none()),
            Value::Object(o) => Some(Self::from_object(Arc::clone(o))),
            _ => None,
        }
    }
}
