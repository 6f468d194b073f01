#![forbid(unsafe_code)]

//! Observable value wrapper with change notification and version tracking.
//!
//! Host objects expose bindable state through [`Observable<T>`] fields; the
//! table scanner turns those fields into property bindables.
//!
//! # Design
//!
//! [`Observable<T>`] wraps a value of type `T` in shared, thread-safe
//! storage (`Arc<Mutex<..>>`). When the value changes (determined by
//! `PartialEq`), all live subscribers are notified in registration order,
//! on the thread that performed the change.
//!
//! # Performance
//!
//! | Operation    | Complexity               |
//! |-------------|--------------------------|
//! | `get()`     | O(1) + clone             |
//! | `set()`     | O(S) where S = subscribers |
//! | `subscribe()` | O(1) amortized          |
//!
//! # Failure Modes
//!
//! - **Re-entrant set**: Calling `set()` from within a subscriber callback is
//!   allowed. The lock is released before callbacks run, so the nested
//!   change notifies with its own value after the outer callback returns
//!   control to the notifier loop.
//! - **Subscriber leak**: If `Subscription` guards are stored indefinitely
//!   without being dropped, callbacks accumulate. Dead weak references are
//!   cleaned lazily during notification.

use std::any::Any;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

/// A subscriber callback stored as a strong `Arc` in the [`Subscription`],
/// handed out as `Weak` to the notifier.
type CallbackArc<T> = Arc<dyn Fn(&T) + Send + Sync>;
type CallbackWeak<T> = Weak<dyn Fn(&T) + Send + Sync>;

/// Weakly-held subscriber list shared by [`Observable`] and
/// [`EventChannel`](crate::event::EventChannel).
pub(crate) struct Subscribers<T: ?Sized> {
    list: Vec<CallbackWeak<T>>,
}

impl<T: ?Sized + 'static> Subscribers<T> {
    pub(crate) fn new() -> Self {
        Self { list: Vec::new() }
    }

    pub(crate) fn add(&mut self, callback: impl Fn(&T) + Send + Sync + 'static) -> Subscription {
        let strong: CallbackArc<T> = Arc::new(callback);
        self.list.push(Arc::downgrade(&strong));
        Subscription::new(strong)
    }

    /// Prune dead entries and return the live callbacks.
    pub(crate) fn live(&mut self) -> Vec<CallbackArc<T>> {
        self.list.retain(|w| w.strong_count() > 0);
        self.list.iter().filter_map(Weak::upgrade).collect()
    }

    pub(crate) fn len(&self) -> usize {
        self.list.len()
    }
}

pub(crate) fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Shared interior for [`Observable<T>`].
struct ObservableInner<T: 'static> {
    value: T,
    version: u64,
    /// Subscribers stored as weak references. Dead entries are pruned on notify.
    subscribers: Subscribers<T>,
}

/// A shared, version-tracked value with change notification.
///
/// Cloning an `Observable` creates a new handle to the **same** inner state.
///
/// # Invariants
///
/// 1. `version` increments by exactly 1 on each value-changing mutation.
/// 2. `set(v)` where `v == current` is a no-op.
/// 3. Subscribers are notified in registration order.
/// 4. Dead subscribers (dropped [`Subscription`] guards) are pruned lazily.
pub struct Observable<T: 'static> {
    inner: Arc<Mutex<ObservableInner<T>>>,
}

impl<T> Clone for Observable<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Observable<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = lock(&self.inner);
        f.debug_struct("Observable")
            .field("value", &inner.value)
            .field("version", &inner.version)
            .field("subscriber_count", &inner.subscribers.len())
            .finish()
    }
}

impl<T: Default + Clone + PartialEq + Send + 'static> Default for Observable<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: Clone + PartialEq + Send + 'static> Observable<T> {
    /// Create a new observable with the given initial value.
    #[must_use]
    pub fn new(value: T) -> Self {
        Self {
            inner: Arc::new(Mutex::new(ObservableInner {
                value,
                version: 0,
                subscribers: Subscribers::new(),
            })),
        }
    }

    /// Get a clone of the current value.
    #[must_use]
    pub fn get(&self) -> T {
        lock(&self.inner).value.clone()
    }

    /// Access the current value by reference without cloning.
    ///
    /// The lock is held while `f` runs; do not touch this observable from
    /// inside `f`.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&lock(&self.inner).value)
    }

    /// Set a new value. Returns `true` if the value changed and
    /// subscribers were notified.
    pub fn set(&self, value: T) -> bool {
        let (callbacks, value) = {
            let mut inner = lock(&self.inner);
            if inner.value == value {
                return false;
            }
            inner.value = value.clone();
            inner.version += 1;
            (inner.subscribers.live(), value)
        };
        for cb in &callbacks {
            cb(&value);
        }
        true
    }

    /// Modify the value in place via a closure, notifying on change.
    pub fn update(&self, f: impl FnOnce(&mut T)) -> bool {
        let (callbacks, value) = {
            let mut inner = lock(&self.inner);
            let old = inner.value.clone();
            f(&mut inner.value);
            if inner.value == old {
                return false;
            }
            inner.version += 1;
            (inner.subscribers.live(), inner.value.clone())
        };
        for cb in &callbacks {
            cb(&value);
        }
        true
    }

    /// Subscribe to value changes.
    ///
    /// Returns a [`Subscription`] guard. Dropping the guard unsubscribes.
    pub fn subscribe(&self, callback: impl Fn(&T) + Send + Sync + 'static) -> Subscription {
        lock(&self.inner).subscribers.add(callback)
    }

    /// Current version number.
    #[must_use]
    pub fn version(&self) -> u64 {
        lock(&self.inner).version
    }

    /// Number of registered subscribers, including dead ones not yet pruned.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        lock(&self.inner).subscribers.len()
    }
}

/// RAII guard for a subscriber callback.
///
/// Dropping the `Subscription` makes the associated callback unreachable:
/// the strong `Arc` is dropped, so the notifier's `Weak` fails to upgrade.
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    /// Type-erased strong references keeping callbacks alive.
    _guards: Vec<Box<dyn Any + Send + Sync>>,
}

impl Subscription {
    /// Hold `guard` until this subscription is dropped.
    pub fn new(guard: impl Any + Send + Sync) -> Self {
        Self {
            _guards: vec![Box::new(guard)],
        }
    }

    /// A subscription holding nothing.
    pub fn empty() -> Self {
        Self {
            _guards: Vec::new(),
        }
    }

    /// Combine several subscriptions into one guard.
    pub fn merge(parts: impl IntoIterator<Item = Subscription>) -> Self {
        Self {
            _guards: parts.into_iter().flat_map(|s| s._guards).collect(),
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("guards", &self._guards.len())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
