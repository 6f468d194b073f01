#![forbid(unsafe_code)]

//! Specialisation-ordered adapter registry.
//!
//! Maps a concrete runtime type to the adapters that apply to it. An
//! adapter declares the type it adapts (its *adaptee*) and provides some
//! capability `C` (for the runtime, a scanner). Lookups return every
//! adapter whose adaptee is the queried type or one of its supertypes.
//!
//! # Ordering
//!
//! A new entry is inserted immediately before the first existing entry
//! whose adaptee equals, or is a supertype of, the new adaptee:
//!
//! ```text
//! register(A: Control)    [A]
//! register(B: Button)     [B, A]        Button <: Control, more specific first
//! register(C: Button)     [C, B, A]     same specificity, most recent first
//! register(D: Unrelated)  [C, B, A, D]
//! ```
//!
//! # Concurrency
//!
//! Entries live in an immutable snapshot behind an [`ArcSwap`]. Readers are
//! wait-free; writers publish a new snapshot with a compare-and-swap retry
//! loop, so a lookup racing a registration sees either the old or the new
//! list, never a partial one.
//!
//! # Invariants
//!
//! 1. Registration either fully succeeds or leaves the registry unchanged.
//! 2. Lookups yield each adapter at most once.
//! 3. Relations are read from the shared [`TypeGraph`] at insertion time;
//!    declare subtype relations before registering adapters that rely on
//!    them.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use arc_swap::ArcSwap;

use crate::error::{AdapterResolutionError, AdapterResolutionReason};
use crate::types::{TypeGraph, TypeKey};

/// Factory producing an adapter's capability instance.
pub type AdapterFactory<C> = Arc<dyn Fn() -> Arc<C> + Send + Sync>;

/// Description of an adapter type.
pub struct AdapterType<C: ?Sized> {
    name: &'static str,
    key: TypeKey,
    adaptee: Option<TypeKey>,
    factory: Option<AdapterFactory<C>>,
}

impl<C: ?Sized> Clone for AdapterType<C> {
    fn clone(&self) -> Self {
        Self {
            name: self.name,
            key: self.key,
            adaptee: self.adaptee,
            factory: self.factory.clone(),
        }
    }
}

impl<C: ?Sized> fmt::Debug for AdapterType<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdapterType")
            .field("name", &self.name)
            .field("adaptee", &self.adaptee)
            .field("has_factory", &self.factory.is_some())
            .finish()
    }
}

impl<C: ?Sized + 'static> AdapterType<C> {
    /// Describe the adapter type `A`. No adaptee and no factory yet.
    #[must_use]
    pub fn of<A: 'static>() -> Self {
        Self {
            name: std::any::type_name::<A>(),
            key: TypeKey::of::<A>(),
            adaptee: None,
            factory: None,
        }
    }

    /// Override the diagnostic name.
    #[must_use]
    pub fn named(mut self, name: &'static str) -> Self {
        self.name = name;
        self
    }

    /// Declare the adaptee type.
    #[must_use]
    pub fn adapting<T: ?Sized + 'static>(self) -> Self {
        self.adapting_key(TypeKey::of::<T>())
    }

    /// Declare the adaptee by key.
    #[must_use]
    pub fn adapting_key(mut self, adaptee: TypeKey) -> Self {
        self.adaptee = Some(adaptee);
        self
    }

    /// Provide the capability factory.
    #[must_use]
    pub fn providing(mut self, factory: impl Fn() -> Arc<C> + Send + Sync + 'static) -> Self {
        self.factory = Some(Arc::new(factory));
        self
    }

    /// Diagnostic name.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Key of the adapter type itself.
    #[must_use]
    pub fn key(&self) -> TypeKey {
        self.key
    }

    /// Declared adaptee, if any.
    #[must_use]
    pub fn adaptee(&self) -> Option<TypeKey> {
        self.adaptee
    }

    /// Instantiate the capability. `None` when the adapter has no factory.
    #[must_use]
    pub fn instantiate(&self) -> Option<Arc<C>> {
        self.factory.as_ref().map(|f| f())
    }

    fn validate(&self) -> Result<TypeKey, AdapterResolutionError> {
        let adaptee = self.adaptee.ok_or_else(|| {
            AdapterResolutionError::new(self.name, AdapterResolutionReason::UnresolvedAdaptee)
        })?;
        if self.factory.is_none() {
            return Err(AdapterResolutionError::new(
                self.name,
                AdapterResolutionReason::MissingCapability,
            ));
        }
        Ok(adaptee)
    }
}

struct Entry<C: ?Sized> {
    adaptee: TypeKey,
    adapter: Arc<AdapterType<C>>,
}

impl<C: ?Sized> Clone for Entry<C> {
    fn clone(&self) -> Self {
        Self {
            adaptee: self.adaptee,
            adapter: Arc::clone(&self.adapter),
        }
    }
}

/// Registry of adapters providing capability `C`.
pub struct AdapterRegistry<C: ?Sized> {
    types: Arc<TypeGraph>,
    entries: ArcSwap<Vec<Entry<C>>>,
}

impl<C: ?Sized> fmt::Debug for AdapterRegistry<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let entries = self.entries.load();
        f.debug_struct("AdapterRegistry")
            .field(
                "entries",
                &entries.iter().map(|e| e.adapter.name).collect::<Vec<_>>(),
            )
            .finish()
    }
}

impl<C: ?Sized + 'static> AdapterRegistry<C> {
    /// Empty registry over `types`.
    #[must_use]
    pub fn new(types: Arc<TypeGraph>) -> Self {
        Self {
            types,
            entries: ArcSwap::from_pointee(Vec::new()),
        }
    }

    /// The type graph used for specialisation.
    #[must_use]
    pub fn types(&self) -> &Arc<TypeGraph> {
        &self.types
    }

    /// Number of registered entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.load().len()
    }

    /// Whether nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.load().is_empty()
    }

    /// Register one adapter.
    pub fn register(&self, adapter: AdapterType<C>) -> Result<(), AdapterResolutionError> {
        let adaptee = adapter.validate()?;
        self.publish(vec![Entry {
            adaptee,
            adapter: Arc::new(adapter),
        }]);
        Ok(())
    }

    /// Register a collection of adapters in order. Every adapter is
    /// validated first; on error nothing is registered.
    pub fn register_all(
        &self,
        adapters: impl IntoIterator<Item = AdapterType<C>>,
    ) -> Result<(), AdapterResolutionError> {
        let batch = adapters
            .into_iter()
            .map(|adapter| {
                adapter.validate().map(|adaptee| Entry {
                    adaptee,
                    adapter: Arc::new(adapter),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        self.publish(batch);
        Ok(())
    }

    /// Adapters applicable to `concrete`, most specific first.
    #[must_use]
    pub fn find_adapter_types_for(&self, concrete: TypeKey) -> Vec<Arc<AdapterType<C>>> {
        let entries = self.entries.load();
        let mut seen = HashSet::new();
        entries
            .iter()
            .filter(|e| self.types.is_subtype(concrete, e.adaptee))
            .filter(|e| seen.insert(e.adapter.key))
            .map(|e| Arc::clone(&e.adapter))
            .collect()
    }

    fn publish(&self, batch: Vec<Entry<C>>) {
        if batch.is_empty() {
            return;
        }
        self.entries.rcu(|current| {
            let mut next: Vec<Entry<C>> = Vec::clone(current);
            for entry in &batch {
                let at = next
                    .iter()
                    .position(|existing| self.types.is_subtype(entry.adaptee, existing.adaptee))
                    .unwrap_or(next.len());
                next.insert(at, entry.clone());
            }
            next
        });
        #[cfg(feature = "tracing")]
        {
            for entry in &batch {
                tracing::debug!(
                    adapter = entry.adapter.name,
                    adaptee = entry.adaptee.name(),
                    "adapter registered"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    trait Capability: Send + Sync {
        fn tag(&self) -> &'static str;
    }

    struct Tagged(&'static str);

    impl Capability for Tagged {
        fn tag(&self) -> &'static str {
            self.0
        }
    }

    struct Control;
    struct Button;
    struct Unrelated;
    struct ControlAdapter;
    struct ButtonAdapter;
    struct ButtonAdapterV2;
    struct UnrelatedAdapter;

    fn adapter<A: 'static, T: 'static>(tag: &'static str) -> AdapterType<dyn Capability> {
        AdapterType::<dyn Capability>::of::<A>()
            .adapting::<T>()
            .providing(move || Arc::new(Tagged(tag)) as Arc<dyn Capability>)
    }

    fn registry() -> AdapterRegistry<dyn Capability> {
        let types = Arc::new(TypeGraph::new());
        types.declare::<Button, Control>();
        AdapterRegistry::new(types)
    }

    fn tags(found: &[Arc<AdapterType<dyn Capability>>]) -> Vec<&'static str> {
        found
            .iter()
            .filter_map(|a| a.instantiate())
            .map(|c| c.tag())
            .collect()
    }

    #[test]
    fn subtype_adapter_first() {
        let reg = registry();
        reg.register(adapter::<ControlAdapter, Control>("control")).unwrap();
        reg.register(adapter::<ButtonAdapter, Button>("button")).unwrap();
        let found = reg.find_adapter_types_for(TypeKey::of::<Button>());
        assert_eq!(tags(&found), vec!["button", "control"]);
        let found = reg.find_adapter_types_for(TypeKey::of::<Control>());
        assert_eq!(tags(&found), vec!["control"]);
    }

    #[test]
    fn order_independent_of_registration_sequence() {
        let reg = registry();
        reg.register(adapter::<ButtonAdapter, Button>("button")).unwrap();
        reg.register(adapter::<ControlAdapter, Control>("control")).unwrap();
        let found = reg.find_adapter_types_for(TypeKey::of::<Button>());
        assert_eq!(tags(&found), vec!["button", "control"]);
    }

    #[test]
    fn same_specificity_most_recent_first() {
        let reg = registry();
        reg.register(adapter::<ControlAdapter, Control>("control")).unwrap();
        reg.register(adapter::<ButtonAdapter, Button>("button")).unwrap();
        reg.register(adapter::<ButtonAdapterV2, Button>("button-v2")).unwrap();
        let found = reg.find_adapter_types_for(TypeKey::of::<Button>());
        assert_eq!(tags(&found), vec!["button-v2", "button", "control"]);
    }

    #[test]
    fn unrelated_types_not_returned() {
        let reg = registry();
        reg.register(adapter::<UnrelatedAdapter, Unrelated>("unrelated")).unwrap();
        reg.register(adapter::<ControlAdapter, Control>("control")).unwrap();
        assert!(reg.find_adapter_types_for(TypeKey::of::<Button>()).len() == 1);
        assert_eq!(reg.len(), 2);
    }

    #[test]
    fn duplicate_registration_yields_once() {
        let reg = registry();
        reg.register(adapter::<ControlAdapter, Control>("control")).unwrap();
        reg.register(adapter::<ControlAdapter, Control>("control")).unwrap();
        assert_eq!(reg.len(), 2);
        assert_eq!(reg.find_adapter_types_for(TypeKey::of::<Control>()).len(), 1);
    }

    #[test]
    fn missing_adaptee_rejected() {
        let reg = registry();
        let bad = AdapterType::<dyn Capability>::of::<ControlAdapter>()
            .providing(|| Arc::new(Tagged("x")) as Arc<dyn Capability>);
        let err = reg.register(bad).unwrap_err();
        assert_eq!(err.reason, AdapterResolutionReason::UnresolvedAdaptee);
        assert!(reg.is_empty());
    }

    #[test]
    fn missing_capability_rejected() {
        let reg = registry();
        let bad = AdapterType::<dyn Capability>::of::<ControlAdapter>().adapting::<Control>();
        let err = reg.register(bad).unwrap_err();
        assert_eq!(err.reason, AdapterResolutionReason::MissingCapability);
        assert!(reg.is_empty());
    }

    #[test]
    fn collection_registration_is_atomic() {
        let reg = registry();
        let batch = vec![
            adapter::<ControlAdapter, Control>("control"),
            AdapterType::<dyn Capability>::of::<ButtonAdapter>().adapting::<Button>(),
        ];
        assert!(reg.register_all(batch).is_err());
        assert!(reg.is_empty());

        let batch = vec![
            adapter::<ControlAdapter, Control>("control"),
            adapter::<ButtonAdapter, Button>("button"),
        ];
        reg.register_all(batch).unwrap();
        let found = reg.find_adapter_types_for(TypeKey::of::<Button>());
        assert_eq!(tags(&found), vec!["button", "control"]);
    }

    #[test]
    fn concurrent_lookup_during_registration() {
        let reg = Arc::new(registry());
        reg.register(adapter::<ControlAdapter, Control>("control")).unwrap();
        let reader = {
            let reg = Arc::clone(&reg);
            std::thread::spawn(move || {
                for _ in 0..500 {
                    let n = reg.find_adapter_types_for(TypeKey::of::<Button>()).len();
                    assert!((1..=2).contains(&n));
                }
            })
        };
        reg.register(adapter::<ButtonAdapter, Button>("button")).unwrap();
        reader.join().unwrap();
        assert_eq!(reg.find_adapter_types_for(TypeKey::of::<Button>()).len(), 2);
    }
}
