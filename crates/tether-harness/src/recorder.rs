#![forbid(unsafe_code)]

//! Observation helpers: setter counters and an ordered change log.
//!
//! Both hold their subscriptions internally, so a recorder keeps watching
//! for as long as it lives and stops the moment it is dropped.
//!
//! The change log renders as JSONL for attaching to failing test output:
//!
//! ```text
//! {"seq":0,"member":"view.my_property","value":"\"hello\""}
//! {"seq":1,"member":"vm.my_property","value":"\"hello\""}
//! ```

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tether_runtime::{EventChannel, Observable, Subscription};

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Counts change notifications from one observable or event channel.
pub struct CallCounter {
    count: Arc<AtomicUsize>,
    _subscription: Subscription,
}

impl fmt::Debug for CallCounter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallCounter")
            .field("count", &self.count())
            .finish()
    }
}

impl CallCounter {
    /// Count every effective `set` on `observable`.
    pub fn watch<T>(observable: &Observable<T>) -> Self
    where
        T: Clone + PartialEq + Send + 'static,
    {
        let count = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&count);
        let subscription = observable.subscribe(move |_| {
            c.fetch_add(1, Ordering::SeqCst);
        });
        Self {
            count,
            _subscription: subscription,
        }
    }

    /// Count every emit on `channel`.
    pub fn watch_event(channel: &EventChannel) -> Self {
        let count = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&count);
        let subscription = channel.subscribe(move |_| {
            c.fetch_add(1, Ordering::SeqCst);
        });
        Self {
            count,
            _subscription: subscription,
        }
    }

    #[must_use]
    pub fn count(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }

    /// Current count, then zero.
    pub fn take(&self) -> usize {
        self.count.swap(0, Ordering::SeqCst)
    }
}

/// One observed change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeRecord {
    pub seq: u64,
    pub member: String,
    /// `Debug` rendering of the new value or payload.
    pub value: String,
}

#[derive(Default)]
struct LogInner {
    records: Vec<ChangeRecord>,
    next_seq: u64,
}

/// Ordered log of changes across several watched members.
#[derive(Clone, Default)]
pub struct ChangeLog {
    inner: Arc<Mutex<LogInner>>,
    subscriptions: Arc<Mutex<Vec<Subscription>>>,
}

impl fmt::Debug for ChangeLog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChangeLog")
            .field("records", &lock(&self.inner).records.len())
            .finish()
    }
}

impl ChangeLog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn push(inner: &Mutex<LogInner>, member: &str, value: String) {
        let mut inner = lock(inner);
        let seq = inner.next_seq;
        inner.next_seq += 1;
        inner.records.push(ChangeRecord {
            seq,
            member: member.to_string(),
            value,
        });
    }

    /// Record every change of `observable` under `member`.
    pub fn watch<T>(&self, member: &str, observable: &Observable<T>)
    where
        T: Clone + PartialEq + Send + fmt::Debug + 'static,
    {
        let inner = Arc::clone(&self.inner);
        let member = member.to_string();
        let subscription = observable.subscribe(move |v| {
            Self::push(&inner, &member, format!("{v:?}"));
        });
        lock(&self.subscriptions).push(subscription);
    }

    /// Record every emit on `channel` under `member`.
    pub fn watch_event(&self, member: &str, channel: &EventChannel) {
        let inner = Arc::clone(&self.inner);
        let member = member.to_string();
        let subscription = channel.subscribe(move |payload| {
            Self::push(&inner, &member, format!("{payload:?}"));
        });
        lock(&self.subscriptions).push(subscription);
    }

    #[must_use]
    pub fn records(&self) -> Vec<ChangeRecord> {
        lock(&self.inner).records.clone()
    }

    /// Members in the order they changed.
    #[must_use]
    pub fn members(&self) -> Vec<String> {
        lock(&self.inner)
            .records
            .iter()
            .map(|r| r.member.clone())
            .collect()
    }

    /// How many changes `member` saw.
    #[must_use]
    pub fn count(&self, member: &str) -> usize {
        lock(&self.inner)
            .records
            .iter()
            .filter(|r| r.member == member)
            .count()
    }

    pub fn clear(&self) {
        lock(&self.inner).records.clear();
    }

    /// One JSON object per line.
    #[must_use]
    pub fn to_jsonl(&self) -> String {
        let records = self.records();
        let mut out = String::new();
        for r in &records {
            let line = serde_json::json!({
                "seq": r.seq,
                "member": r.member,
                "value": r.value,
            });
            out.push_str(&line.to_string());
            out.push('\n');
        }
        out
    }
}
