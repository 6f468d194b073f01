#![forbid(unsafe_code)]

//! Dynamic values exchanged between bound members.
//!
//! A [`Value`] is what a property reads and writes; a [`Payload`] is the
//! positional argument list an occurrence broadcasts. Objects travel as
//! type-erased [`ObjectRef`]s so that nested object graphs can be
//! re-scanned after a value change.
//!
//! # Equality
//!
//! Equality is *identity*, not structural: scalars compare by value (floats
//! by bit pattern, so `NaN == NaN`), objects compare by pointer. This is
//! what change suppression needs: replacing an object with a structurally
//! equal but distinct instance is a change.

use std::any::Any;
use std::fmt;
use std::sync::{Arc, Weak};

use crate::types::{TypeGraph, TypeKey};

/// Shared, type-erased host object.
pub type ObjectRef = Arc<dyn Any + Send + Sync>;

/// Weak form of [`ObjectRef`].
pub type WeakObject = Weak<dyn Any + Send + Sync>;

/// Pointer identity of an object, usable as a map key.
#[must_use]
pub fn object_addr(object: &ObjectRef) -> usize {
    Arc::as_ptr(object).cast::<()>() as usize
}

/// A dynamic value.
#[derive(Clone, Default)]
pub enum Value {
    /// No value (also the encoding of an absent object).
    #[default]
    Unit,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(Arc<str>),
    Object(ObjectRef),
}

impl Value {
    /// Wrap a concrete shared object.
    #[must_use]
    pub fn object<T: Any + Send + Sync>(object: Arc<T>) -> Self {
        Self::Object(object)
    }

    /// Text value.
    #[must_use]
    pub fn text(s: impl AsRef<str>) -> Self {
        Self::Text(Arc::from(s.as_ref()))
    }

    /// The text behind this value, if any.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    /// The object behind this value, if any.
    #[must_use]
    pub fn as_object(&self) -> Option<&ObjectRef> {
        match self {
            Self::Object(o) => Some(o),
            _ => None,
        }
    }

    /// Downcast the object behind this value.
    #[must_use]
    pub fn downcast<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        self.as_object()
            .and_then(|o| Arc::clone(o).downcast::<T>().ok())
    }

    /// Runtime type of this value.
    #[must_use]
    pub fn value_type(&self) -> ValueType {
        match self {
            Self::Unit => ValueType::Unit,
            Self::Bool(_) => ValueType::Bool,
            Self::Int(_) => ValueType::Int,
            Self::Float(_) => ValueType::Float,
            Self::Text(_) => ValueType::Text,
            Self::Object(o) => ValueType::Object(Some(TypeKey::of_object(o))),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Unit, Self::Unit) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Int(a), Self::Int(b)) => a == b,
            (Self::Float(a), Self::Float(b)) => a.to_bits() == b.to_bits(),
            (Self::Text(a), Self::Text(b)) => a == b,
            (Self::Object(a), Self::Object(b)) => object_addr(a) == object_addr(b),
            _ => false,
        }
    }
}

impl Eq for Value {}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unit => f.write_str("Unit"),
            Self::Bool(b) => write!(f, "Bool({b})"),
            Self::Int(i) => write!(f, "Int({i})"),
            Self::Float(x) => write!(f, "Float({x})"),
            Self::Text(s) => write!(f, "Text({s:?})"),
            Self::Object(o) => write!(f, "Object({:#x})", object_addr(o)),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::text(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::Text(Arc::from(v))
    }
}

/// Positional broadcast arguments.
pub type Payload = Vec<Value>;

/// A payload snapshot that does not keep objects alive.
///
/// Used for change suppression: it answers "is this payload identical to
/// what was last seen" without extending any object's lifetime.
#[derive(Clone, Default)]
pub struct Snapshot {
    entries: Vec<SnapshotEntry>,
}

#[derive(Clone)]
enum SnapshotEntry {
    Scalar(Value),
    Object { addr: usize, weak: WeakObject },
}

impl Snapshot {
    /// Capture `payload`.
    #[must_use]
    pub fn capture(payload: &[Value]) -> Self {
        let entries = payload
            .iter()
            .map(|v| match v {
                Value::Object(o) => SnapshotEntry::Object {
                    addr: object_addr(o),
                    weak: Arc::downgrade(o),
                },
                other => SnapshotEntry::Scalar(other.clone()),
            })
            .collect();
        Self { entries }
    }

    /// Whether `payload` is identical to the captured one. A collected
    /// object never matches, even if its address was reused.
    #[must_use]
    pub fn matches(&self, payload: &[Value]) -> bool {
        self.entries.len() == payload.len()
            && self.entries.iter().zip(payload).all(|(e, v)| match (e, v) {
                (SnapshotEntry::Scalar(a), b) => a == b,
                (SnapshotEntry::Object { addr, weak }, Value::Object(o)) => {
                    *addr == object_addr(o) && weak.strong_count() > 0
                }
                _ => false,
            })
    }

    /// Number of captured positions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing was captured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Debug for Snapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Snapshot")
            .field("len", &self.entries.len())
            .finish()
    }
}

/// Declared type of one payload position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueType {
    /// Accepts anything.
    Any,
    Unit,
    Bool,
    Int,
    Float,
    Text,
    /// An object; `None` means any object.
    Object(Option<TypeKey>),
}

impl ValueType {
    /// Whether a slot of this type can receive values declared as `sender`.
    #[must_use]
    pub fn accepts(&self, sender: &ValueType, types: &TypeGraph) -> bool {
        match (self, sender) {
            (Self::Any, _) => true,
            (Self::Object(None), Self::Object(_)) => true,
            (Self::Object(Some(want)), Self::Object(Some(have))) => {
                types.is_subtype(*have, *want)
            }
            (Self::Object(Some(want)), Self::Object(None)) => want.is_object_root(),
            (a, b) => a == b,
        }
    }

    /// Whether a concrete value fits this slot.
    #[must_use]
    pub fn admits(&self, value: &Value, types: &TypeGraph) -> bool {
        match (self, value) {
            (Self::Object(_), Value::Unit) => true,
            _ => self.accepts(&value.value_type(), types),
        }
    }
}

/// Declared payload types of a bindable.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Signature {
    types: Vec<ValueType>,
}

impl Signature {
    /// Signature from positional types.
    #[must_use]
    pub fn new(types: impl IntoIterator<Item = ValueType>) -> Self {
        Self {
            types: types.into_iter().collect(),
        }
    }

    /// Single-position signature, the shape of every property.
    #[must_use]
    pub fn single(ty: ValueType) -> Self {
        Self { types: vec![ty] }
    }

    /// Positional types.
    #[must_use]
    pub fn types(&self) -> &[ValueType] {
        &self.types
    }

    /// Number of positions.
    #[must_use]
    pub fn arity(&self) -> usize {
        self.types.len()
    }

    /// Whether a receiver with this signature accepts payloads declared by
    /// `sender`.
    #[must_use]
    pub fn accepts(&self, sender: &Signature, types: &TypeGraph) -> bool {
        self.types.len() == sender.types.len()
            && self
                .types
                .iter()
                .zip(&sender.types)
                .all(|(r, s)| r.accepts(s, types))
    }
}

/// Conversion between host field types and [`Value`].
pub trait ValueCodec: Sized {
    /// Declared type of the field.
    fn value_type() -> ValueType;
    /// Encode.
    fn to_value(&self) -> Value;
    /// Decode; `None` when the value does not fit.
    fn from_value(value: &Value) -> Option<Self>;
}

impl ValueCodec for Value {
    fn value_type() -> ValueType {
        ValueType::Any
    }
    fn to_value(&self) -> Value {
        self.clone()
    }
    fn from_value(value: &Value) -> Option<Self> {
        Some(value.clone())
    }
}

impl ValueCodec for bool {
    fn value_type() -> ValueType {
        ValueType::Bool
    }
    fn to_value(&self) -> Value {
        Value::Bool(*self)
    }
    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

impl ValueCodec for i64 {
    fn value_type() -> ValueType {
        ValueType::Int
    }
    fn to_value(&self) -> Value {
        Value::Int(*self)
    }
    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }
}

impl ValueCodec for i32 {
    fn value_type() -> ValueType {
        ValueType::Int
    }
    fn to_value(&self) -> Value {
        Value::Int(i64::from(*self))
    }
    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Int(i) => i32::try_from(*i).ok(),
            _ => None,
        }
    }
}

impl ValueCodec for f64 {
    fn value_type() -> ValueType {
        ValueType::Float
    }
    fn to_value(&self) -> Value {
        Value::Float(*self)
    }
    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Float(x) => Some(*x),
            _ => None,
        }
    }
}

impl ValueCodec for String {
    fn value_type() -> ValueType {
        ValueType::Text
    }
    fn to_value(&self) -> Value {
        Value::text(self)
    }
    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Text(s) => Some(s.to_string()),
            _ => None,
        }
    }
}

impl ValueCodec for Arc<str> {
    fn value_type() -> ValueType {
        ValueType::Text
    }
    fn to_value(&self) -> Value {
        Value::Text(Arc::clone(self))
    }
    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Text(s) => Some(Arc::clone(s)),
            _ => None,
        }
    }
}

impl ValueCodec for Option<ObjectRef> {
    fn value_type() -> ValueType {
        ValueType::Object(None)
    }
    fn to_value(&self) -> Value {
        self.as_ref().map_or(Value::Unit, |o| Value::Object(Arc::clone(o)))
    }
    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Unit => Some(None),
            Value::Object(o) => Some(Some(Arc::clone(o))),
            _ => None,
        }
    }
}

impl<T: Any + Send + Sync> ValueCodec for Option<Arc<T>> {
    fn value_type() -> ValueType {
        ValueType::Object(Some(TypeKey::of::<T>()))
    }
    fn to_value(&self) -> Value {
        self.as_ref()
            .map_or(Value::Unit, |o| Value::Object(Arc::clone(o) as ObjectRef))
    }
    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Unit => Some(None),
            Value::Object(_) => value.downcast::<T>().map(Some),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Control;
    struct Label;

    #[test]
    fn identity_equality() {
        let a: ObjectRef = Arc::new(Control);
        let b: ObjectRef = Arc::new(Control);
        assert_eq!(Value::Object(Arc::clone(&a)), Value::Object(Arc::clone(&a)));
        assert_ne!(Value::Object(a), Value::Object(b));
        assert_eq!(Value::Float(f64::NAN), Value::Float(f64::NAN));
        assert_ne!(Value::Int(1), Value::Float(1.0));
        assert_eq!(Value::text("x"), Value::from("x"));
    }

    #[test]
    fn snapshot_does_not_retain_objects() {
        let obj = Arc::new(Control);
        let payload = vec![Value::object(Arc::clone(&obj)), Value::Int(3)];
        let snap = Snapshot::capture(&payload);
        assert!(snap.matches(&payload));
        drop(payload);
        assert_eq!(Arc::strong_count(&obj), 1);
        let other = vec![Value::object(Arc::new(Control)), Value::Int(3)];
        assert!(!snap.matches(&other));
    }

    #[test]
    fn object_slot_acceptance() {
        let g = TypeGraph::new();
        g.declare::<Label, Control>();
        let control = ValueType::Object(Some(TypeKey::of::<Control>()));
        let label = ValueType::Object(Some(TypeKey::of::<Label>()));
        assert!(control.accepts(&label, &g));
        assert!(!label.accepts(&control, &g));
        assert!(ValueType::Object(None).accepts(&label, &g));
        assert!(!control.accepts(&ValueType::Object(None), &g));
        assert!(ValueType::Any.accepts(&ValueType::Text, &g));
        assert!(!ValueType::Text.accepts(&ValueType::Int, &g));
    }

    #[test]
    fn signature_arity_must_match() {
        let g = TypeGraph::new();
        let one = Signature::single(ValueType::Int);
        let two = Signature::new([ValueType::Int, ValueType::Text]);
        assert!(!one.accepts(&two, &g));
        assert!(two.accepts(&two, &g));
    }

    #[test]
    fn codec_object_option() {
        let label = Arc::new(Label);
        let v = Some(Arc::clone(&label)).to_value();
        let back = <Option<Arc<Label>>>::from_value(&v).flatten();
        assert!(back.is_some_and(|b| Arc::ptr_eq(&b, &label)));
        assert!(<Option<Arc<Control>>>::from_value(&v).is_none());
        assert_eq!(
            <Option<Arc<Label>>>::from_value(&Value::Unit).map(|o| o.is_none()),
            Some(true)
        );
        assert_eq!(i32::from_value(&Value::Int(i64::MAX)), None);
    }
}
