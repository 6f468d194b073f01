#![forbid(unsafe_code)]

//! Runtime type identity and declared subtype relations.
//!
//! Rust has no inheritance between concrete types, yet binding needs a
//! notion of "more specific" for two purposes: signature compatibility
//! (`Object(Button)` flowing into an `Object(Control)` slot) and adapter
//! specialisation order. Hosts declare those relations explicitly on a
//! [`TypeGraph`]; every type is implicitly a subtype of
//! [`TypeKey::object()`].
//!
//! # Invariants
//!
//! 1. `is_subtype(a, a)` is always true.
//! 2. `is_subtype(a, TypeKey::object())` is always true.
//! 3. Declared relations are transitive; cycles in declarations are
//!    tolerated (the walk tracks visited keys).
//! 4. [`TypeGraph::ancestors`] lists `a` first, then declared supertypes
//!    breadth-first, then the object root last.

use std::any::{Any, TypeId};
use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::{PoisonError, RwLock};

use crate::value::ObjectRef;

/// Identity of a runtime type.
///
/// Equality and hashing use the [`TypeId`] only; the name is carried for
/// diagnostics and is `"<object>"` when the key was recovered from an
/// erased object.
#[derive(Clone, Copy)]
pub struct TypeKey {
    id: TypeId,
    name: &'static str,
}

/// Marker for the implicit root of the type graph.
struct AnyObject;

impl TypeKey {
    /// Key for a concrete `'static` type.
    #[must_use]
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }

    /// Key for the dynamic type behind an erased object.
    #[must_use]
    pub fn of_object(object: &ObjectRef) -> Self {
        let inner: &(dyn Any + Send + Sync) = &**object;
        Self {
            id: inner.type_id(),
            name: "<object>",
        }
    }

    /// The root every type is a subtype of.
    #[must_use]
    pub fn object() -> Self {
        Self {
            id: TypeId::of::<AnyObject>(),
            name: "object",
        }
    }

    /// Whether this is the object root.
    #[must_use]
    pub fn is_object_root(&self) -> bool {
        self.id == TypeId::of::<AnyObject>()
    }

    /// Underlying [`TypeId`].
    #[must_use]
    pub fn id(&self) -> TypeId {
        self.id
    }

    /// Diagnostic type name.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl PartialEq for TypeKey {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TypeKey {}

impl Hash for TypeKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TypeKey({})", self.name)
    }
}

impl fmt::Display for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// Declared subtype relations between [`TypeKey`]s.
///
/// Thread-safe; declarations and queries may interleave. Declarations are
/// expected to happen at configuration time, before adapters depending on
/// them are registered.
#[derive(Default)]
pub struct TypeGraph {
    supertypes: RwLock<HashMap<TypeKey, Vec<TypeKey>>>,
}

impl fmt::Debug for TypeGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let map = self
            .supertypes
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        f.debug_struct("TypeGraph")
            .field("declared", &map.len())
            .finish()
    }
}

impl TypeGraph {
    /// Create an empty graph (only the implicit object root).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare `Sub` as a direct subtype of `Super`.
    pub fn declare<Sub: ?Sized + 'static, Super: ?Sized + 'static>(&self) {
        self.declare_key(TypeKey::of::<Sub>(), TypeKey::of::<Super>());
    }

    /// Declare `sub` as a direct subtype of `sup`. Duplicate declarations
    /// are ignored.
    pub fn declare_key(&self, sub: TypeKey, sup: TypeKey) {
        if sub == sup || sup.is_object_root() {
            return;
        }
        let mut map = self
            .supertypes
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let entry = map.entry(sub).or_default();
        if !entry.contains(&sup) {
            entry.push(sup);
        }
    }

    /// Whether `sub` equals `sup` or reaches it through declared relations.
    #[must_use]
    pub fn is_subtype(&self, sub: TypeKey, sup: TypeKey) -> bool {
        if sub == sup || sup.is_object_root() {
            return true;
        }
        self.walk(sub).any(|k| k == sup)
    }

    /// `ty` itself, its declared supertypes breadth-first, then the root.
    #[must_use]
    pub fn ancestors(&self, ty: TypeKey) -> Vec<TypeKey> {
        let mut out: Vec<TypeKey> = self.walk(ty).collect();
        if !ty.is_object_root() {
            out.push(TypeKey::object());
        }
        out
    }

    fn walk(&self, start: TypeKey) -> std::vec::IntoIter<TypeKey> {
        let map = self
            .supertypes
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        let mut seen = HashSet::new();
        let mut order = Vec::new();
        let mut queue = VecDeque::from([start]);
        while let Some(key) = queue.pop_front() {
            if !seen.insert(key) {
                continue;
            }
            order.push(key);
            if let Some(sups) = map.get(&key) {
                queue.extend(sups.iter().copied());
            }
        }
        order.into_iter()
    }
}
