#![forbid(unsafe_code)]

//! Scanners: discovering bindables on objects.
//!
//! A [`Scanner`] maps a type (or a live object) to bindable templates.
//! Three implementations compose:
//!
//! - [`TableScanner`](crate::table::TableScanner): static, from declared
//!   [`TypeTable`](crate::table::TypeTable)s.
//! - [`RegistryScanner`]: scanners registered as adapters for a type (and
//!   its supertypes) in an [`AdapterRegistry`], most specific first.
//! - [`CombiningScanner`]: runs several scanners and merges what they
//!   report for the same member.
//!
//! Scanning must be deterministic for a given type when
//! [`Scanner::is_static`] holds; only then are results cached.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};

use tether_core::{AdapterRegistry, ObjectRef, TypeKey};

use crate::bindable::Bindable;
use crate::combine::combine_all;
use crate::observable::lock;

/// Discovers bindable templates.
pub trait Scanner: Send + Sync {
    /// Templates for every instance of `ty`.
    fn scan_type(&self, ty: TypeKey) -> Vec<Bindable>;

    /// Templates for one live object. Defaults to its dynamic type.
    fn scan(&self, object: &ObjectRef) -> Vec<Bindable> {
        self.scan_type(TypeKey::of_object(object))
    }

    /// Whether `scan` depends only on the object's type.
    fn is_static(&self) -> bool {
        true
    }
}

/// Per-object scanner built from a closure. Never static.
pub struct FnScanner<F> {
    scan: F,
}

impl<F> FnScanner<F>
where
    F: Fn(&ObjectRef) -> Vec<Bindable> + Send + Sync,
{
    pub fn new(scan: F) -> Self {
        Self { scan }
    }
}

impl<F> Scanner for FnScanner<F>
where
    F: Fn(&ObjectRef) -> Vec<Bindable> + Send + Sync,
{
    fn scan_type(&self, _ty: TypeKey) -> Vec<Bindable> {
        Vec::new()
    }

    fn scan(&self, object: &ObjectRef) -> Vec<Bindable> {
        (self.scan)(object)
    }

    fn is_static(&self) -> bool {
        false
    }
}

/// Per-type memo of scan results.
#[derive(Default)]
pub struct ScanCache {
    entries: Mutex<HashMap<TypeKey, Arc<[Bindable]>>>,
}

impl fmt::Debug for ScanCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScanCache").field("len", &self.len()).finish()
    }
}

impl ScanCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached templates for `ty`, computing them with `scan` on a miss.
    /// `scan` runs without the cache lock held.
    pub fn get_or_insert_with(
        &self,
        ty: TypeKey,
        scan: impl FnOnce() -> Vec<Bindable>,
    ) -> Vec<Bindable> {
        if let Some(hit) = lock(&self.entries).get(&ty) {
            return hit.to_vec();
        }
        let fresh: Arc<[Bindable]> = scan().into();
        lock(&self.entries)
            .entry(ty)
            .or_insert(fresh)
            .to_vec()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        lock(&self.entries).len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        lock(&self.entries).clear();
    }
}

/// Scans with every adapter registered for an object's type.
///
/// Adapter instances are created once per adapter type and reused.
/// Adapters whose factory yields nothing are skipped with a warning.
pub struct RegistryScanner {
    registry: Arc<AdapterRegistry<dyn Scanner>>,
    instances: Mutex<HashMap<TypeKey, Arc<dyn Scanner>>>,
}

impl fmt::Debug for RegistryScanner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistryScanner")
            .field("adapters", &self.registry.len())
            .field("instances", &lock(&self.instances).len())
            .finish()
    }
}

impl RegistryScanner {
    #[must_use]
    pub fn new(registry: Arc<AdapterRegistry<dyn Scanner>>) -> Self {
        Self {
            registry,
            instances: Mutex::new(HashMap::new()),
        }
    }

    #[must_use]
    pub fn registry(&self) -> &Arc<AdapterRegistry<dyn Scanner>> {
        &self.registry
    }

    fn adapters_for(&self, ty: TypeKey) -> Vec<Arc<dyn Scanner>> {
        let mut out = Vec::new();
        for adapter in self.registry.find_adapter_types_for(ty) {
            let cached = lock(&self.instances).get(&adapter.key()).cloned();
            let instance = match cached {
                Some(i) => i,
                None => match adapter.instantiate() {
                    Some(fresh) => Arc::clone(
                        lock(&self.instances)
                            .entry(adapter.key())
                            .or_insert(fresh),
                    ),
                    None => {
                        tracing::warn!(adapter = adapter.name(), "adapter has no factory; skipped");
                        continue;
                    }
                },
            };
            out.push(instance);
        }
        out
    }
}

impl Scanner for RegistryScanner {
    fn scan_type(&self, ty: TypeKey) -> Vec<Bindable> {
        self.adapters_for(ty)
            .iter()
            .flat_map(|a| a.scan_type(ty))
            .collect()
    }

    fn scan(&self, object: &ObjectRef) -> Vec<Bindable> {
        self.adapters_for(TypeKey::of_object(object))
            .iter()
            .flat_map(|a| a.scan(object))
            .collect()
    }

    fn is_static(&self) -> bool {
        false
    }
}

/// Runs several scanners and merges duplicate members.
///
/// When every sub-scanner is static the merged result is cached per type.
pub struct CombiningScanner {
    scanners: Vec<Arc<dyn Scanner>>,
    cache: Option<ScanCache>,
}

impl fmt::Debug for CombiningScanner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CombiningScanner")
            .field("scanners", &self.scanners.len())
            .field("cache", &self.cache)
            .finish()
    }
}

impl CombiningScanner {
    #[must_use]
    pub fn new(scanners: impl IntoIterator<Item = Arc<dyn Scanner>>) -> Self {
        let scanners: Vec<Arc<dyn Scanner>> = scanners.into_iter().collect();
        let cache = scanners
            .iter()
            .all(|s| s.is_static())
            .then(ScanCache::new);
        Self { scanners, cache }
    }

    fn merged_type(&self, ty: TypeKey) -> Vec<Bindable> {
        combine_all(self.scanners.iter().flat_map(|s| s.scan_type(ty)).collect())
    }
}

impl Scanner for CombiningScanner {
    fn scan_type(&self, ty: TypeKey) -> Vec<Bindable> {
        match &self.cache {
            Some(cache) => cache.get_or_insert_with(ty, || self.merged_type(ty)),
            None => self.merged_type(ty),
        }
    }

    fn scan(&self, object: &ObjectRef) -> Vec<Bindable> {
        if self.cache.is_some() {
            return self.scan_type(TypeKey::of_object(object));
        }
        combine_all(self.scanners.iter().flat_map(|s| s.scan(object)).collect())
    }

    fn is_static(&self) -> bool {
        self.cache.is_some()
    }
}
