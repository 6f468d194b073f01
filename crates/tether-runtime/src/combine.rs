#![forbid(unsafe_code)]

//! Merging bindables that several scanners report for the same member.
//!
//! Two templates describe the same member when they share a path and a
//! [`CapabilityKind`]. The merged template behaves as one:
//!
//! | Kind     | Read               | Write / handle        | Broadcast                      |
//! |----------|--------------------|-----------------------|--------------------------------|
//! | Property | first part with a value | first part that accepts | once per effective change |
//! | Event    | n/a                | n/a                   | every part                     |
//! | Handler  | n/a                | first part that accepts | n/a                          |

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tether_core::{ObjectRef, Path, Payload, Value};

use crate::bindable::{
    Bindable, Capability, CapabilityKind, EventSource, HandlerSink, Listener, PropertyAccess,
};
use crate::observable::{Subscription, lock};

struct CombinedProperty {
    parts: Arc<[Arc<dyn PropertyAccess>]>,
}

fn effective(parts: &[Arc<dyn PropertyAccess>], target: &ObjectRef) -> Option<Value> {
    parts.iter().find_map(|p| p.get(target))
}

impl PropertyAccess for CombinedProperty {
    fn get(&self, target: &ObjectRef) -> Option<Value> {
        effective(&self.parts, target)
    }

    fn set(&self, target: &ObjectRef, value: &Value) -> bool {
        self.parts.iter().any(|p| p.set(target, value))
    }

    fn writable(&self) -> bool {
        self.parts.iter().any(|p| p.writable())
    }

    fn notifies(&self) -> bool {
        self.parts.iter().any(|p| p.notifies())
    }

    fn subscribe(&self, target: &ObjectRef, listener: Listener) -> Option<Subscription> {
        let last = Arc::new(Mutex::new(effective(&self.parts, target)));
        let weak = Arc::downgrade(target);
        let subs: Vec<Subscription> = self
            .parts
            .iter()
            .filter(|p| p.notifies())
            .filter_map(|p| {
                let parts = Arc::clone(&self.parts);
                let last = Arc::clone(&last);
                let weak = weak.clone();
                let listener = Arc::clone(&listener);
                let relay: Listener = Arc::new(move |_: &Payload| {
                    let Some(target) = weak.upgrade() else {
                        return;
                    };
                    let current = effective(&parts, &target);
                    {
                        let mut seen = lock(&last);
                        if *seen == current {
                            return;
                        }
                        seen.clone_from(&current);
                    }
                    if let Some(value) = current {
                        listener(&vec![value]);
                    }
                });
                p.subscribe(target, relay)
            })
            .collect();
        (!subs.is_empty()).then(|| Subscription::merge(subs))
    }
}

struct CombinedEvent {
    parts: Vec<Arc<dyn EventSource>>,
}

impl EventSource for CombinedEvent {
    fn subscribe(&self, target: &ObjectRef, listener: Listener) -> Option<Subscription> {
        let subs: Vec<Subscription> = self
            .parts
            .iter()
            .filter_map(|p| p.subscribe(target, Arc::clone(&listener)))
            .collect();
        (!subs.is_empty()).then(|| Subscription::merge(subs))
    }
}

struct CombinedHandler {
    parts: Vec<Arc<dyn HandlerSink>>,
}

impl HandlerSink for CombinedHandler {
    fn try_handle(&self, target: &ObjectRef, payload: &Payload) -> bool {
        self.parts.iter().any(|h| h.try_handle(target, payload))
    }
}

/// Merge templates that share a path and kind. The first template supplies
/// name and signature; the source type is kept only when every part agrees.
///
/// Mixed kinds are not merged: the first template's kind wins and parts of
/// other kinds are ignored.
#[must_use]
pub fn combine(group: Vec<Bindable>) -> Option<Bindable> {
    let first = group.first()?.clone();
    if group.len() == 1 {
        return Some(first);
    }
    let capability = match first.kind() {
        CapabilityKind::Property => {
            let parts: Vec<Arc<dyn PropertyAccess>> = group
                .iter()
                .filter_map(|b| match b.capability() {
                    Capability::Property(p) => Some(Arc::clone(p)),
                    _ => None,
                })
                .collect();
            Capability::Property(Arc::new(CombinedProperty {
                parts: parts.into(),
            }))
        }
        CapabilityKind::Event => Capability::Event(Arc::new(CombinedEvent {
            parts: group
                .iter()
                .filter_map(|b| match b.capability() {
                    Capability::Event(e) => Some(Arc::clone(e)),
                    _ => None,
                })
                .collect(),
        })),
        CapabilityKind::Handler => Capability::Handler(Arc::new(CombinedHandler {
            parts: group
                .iter()
                .filter_map(|b| match b.capability() {
                    Capability::Handler(h) => Some(Arc::clone(h)),
                    _ => None,
                })
                .collect(),
        })),
    };
    let mut merged = Bindable::new(
        first.name(),
        first.path().clone(),
        first.signature().clone(),
        capability,
    );
    if let Some(source) = first.source() {
        if group.iter().all(|b| b.source() == Some(source)) {
            merged = merged.with_source(source);
        }
    }
    Some(merged)
}

/// Group `raw` by (path, kind) in first-seen order and merge each group.
#[must_use]
pub fn combine_all(raw: Vec<Bindable>) -> Vec<Bindable> {
    let mut index: HashMap<(Path, CapabilityKind), usize> = HashMap::new();
    let mut groups: Vec<Vec<Bindable>> = Vec::new();
    for b in raw {
        let key = (b.path().clone(), b.kind());
        match index.get(&key) {
            Some(&i) => groups[i].push(b),
            None => {
                index.insert(key, groups.len());
                groups.push(vec![b]);
            }
        }
    }
    groups.into_iter().filter_map(combine).collect()
}
