#![forbid(unsafe_code)]

//! Valves: the hubs that connect members sharing a path.
//!
//! A [`Valve`] holds every attached [`Member`] of one group. When a member
//! broadcasts, the valve offers the payload to every other member that can
//! receive it and whose signature accepts the sender's.
//!
//! Two kinds exist:
//!
//! - **Signal** valves relay events. A broadcast that re-enters the same
//!   valve on the dispatching thread is dropped.
//! - **State** valves relay property values. They remember a weak
//!   snapshot of the last payload and suppress identical ones, which is
//!   what stops two-way echoes. After each propagation they rebuild their
//!   nested groups from the members' current object values.
//!
//! # Invariants
//!
//! 1. A member never receives its own broadcast.
//! 2. Signature compatibility between two members is computed once, when
//!    the later of the two joins.
//! 3. The snapshot is updated before any receiver runs.
//! 4. No valve lock is held while host code runs.
//! 5. A rebuild is installed only if no newer propagation started and the
//!    valve is not disposed; otherwise its groups are disposed.
//! 6. `dispose` is idempotent. Hooks run first, then nested groups are
//!    disposed, then members are detached.
//!
//! # Failure Modes
//!
//! | Condition | Outcome |
//! |-----------|---------|
//! | Operation on a disposed valve | [`ObjectDisposedError`] or [`Propagation::Disposed`] |
//! | Every receiver declines | [`Propagation::NoneHandled`] |
//! | Attached object collected | member pruned on next propagation or count |

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::thread::{self, ThreadId};

use tether_core::{ObjectDisposedError, ObjectRef, Path, Payload, Snapshot, Value, object_addr};

use crate::binder::{self, BindContext, Candidate};
use crate::bindable::{Capabilities, CapabilityKind, Listener};
use crate::member::{Member, Origin};
use crate::observable::lock;

static NEXT_VALVE_ID: AtomicU64 = AtomicU64::new(1);

/// Whether a valve relays events or state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValveKind {
    Signal,
    State,
}

impl ValveKind {
    /// State if any member of the group is a property.
    pub(crate) fn for_group(group: &[Candidate]) -> Self {
        if group
            .iter()
            .any(|c| c.template.kind() == CapabilityKind::Property)
        {
            Self::State
        } else {
            Self::Signal
        }
    }
}

/// Result of one propagation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Propagation {
    /// At least one receiver accepted the payload.
    Handled,
    /// No receiver accepted it (including when there were none).
    NoneHandled,
    /// Dropped as an echo of the current state or a re-entrant signal.
    Suppressed,
    /// The valve was disposed.
    Disposed,
}

/// Read-only view of one member.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberInfo {
    pub origin: Origin,
    pub name: String,
    pub flags: Capabilities,
    pub alive: bool,
}

/// Read-only view of a valve and its nested groups.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindingGroup {
    pub path: Path,
    pub kind: ValveKind,
    pub members: Vec<MemberInfo>,
    pub children: Vec<BindingGroup>,
}

type DisposingHook = Box<dyn FnOnce(&Valve) + Send>;

#[derive(Default)]
struct ValveState {
    members: Vec<Arc<Member>>,
    /// (sender id, receiver id) -> receiver accepts sender's signature.
    compat: HashMap<(u64, u64), bool>,
    snapshot: Option<Snapshot>,
    children: Vec<Valve>,
    deferred: Vec<Candidate>,
    disposing: Vec<DisposingHook>,
}

impl ValveState {
    fn prune(&mut self) {
        let before = self.members.len();
        self.members.retain(|m| m.is_alive());
        if self.members.len() != before {
            let live: Vec<u64> = self.members.iter().map(|m| m.id()).collect();
            self.compat
                .retain(|(s, r), _| live.contains(s) && live.contains(r));
        }
    }
}

struct ValveShared {
    id: u64,
    path: Path,
    kind: ValveKind,
    ctx: Arc<BindContext>,
    disposed: AtomicBool,
    generation: AtomicU64,
    dispatching: Mutex<Vec<ThreadId>>,
    state: Mutex<ValveState>,
}

/// Marks the current thread as dispatching through a signal valve.
struct DispatchGuard<'a> {
    threads: &'a Mutex<Vec<ThreadId>>,
    me: ThreadId,
}

impl<'a> DispatchGuard<'a> {
    fn enter(threads: &'a Mutex<Vec<ThreadId>>) -> Option<Self> {
        let me = thread::current().id();
        let mut active = lock(threads);
        if active.contains(&me) {
            return None;
        }
        active.push(me);
        Some(Self { threads, me })
    }
}

impl Drop for DispatchGuard<'_> {
    fn drop(&mut self) {
        let mut active = lock(self.threads);
        if let Some(i) = active.iter().position(|t| *t == self.me) {
            active.swap_remove(i);
        }
    }
}

/// Handle to a propagation hub. Cloning shares the hub.
#[derive(Clone)]
pub struct Valve {
    shared: Arc<ValveShared>,
}

impl fmt::Debug for Valve {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Valve")
            .field("id", &self.shared.id)
            .field("path", &self.shared.path)
            .field("kind", &self.shared.kind)
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

impl PartialEq for Valve {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.shared, &other.shared)
    }
}

impl Eq for Valve {}

impl Valve {
    pub(crate) fn new(
        ctx: Arc<BindContext>,
        path: Path,
        kind: ValveKind,
        deferred: Vec<Candidate>,
    ) -> Self {
        Self {
            shared: Arc::new(ValveShared {
                id: NEXT_VALVE_ID.fetch_add(1, Ordering::Relaxed),
                path,
                kind,
                ctx,
                disposed: AtomicBool::new(false),
                generation: AtomicU64::new(0),
                dispatching: Mutex::new(Vec::new()),
                state: Mutex::new(ValveState {
                    deferred,
                    ..ValveState::default()
                }),
            }),
        }
    }

    /// Create a valve for a qualifying group and attach its members.
    pub(crate) fn build(
        ctx: &Arc<BindContext>,
        path: Path,
        group: Vec<Candidate>,
        deferred: Vec<Candidate>,
    ) -> Self {
        let kind = ValveKind::for_group(&group);
        let valve = Self::new(Arc::clone(ctx), path, kind, deferred);
        for candidate in group {
            let Some(owner) = candidate.owner.upgrade() else {
                continue;
            };
            let member = Arc::new(Member::with_ancestry(
                candidate.template,
                candidate.origin,
                candidate.ancestry,
            ));
            if member.attach(&owner, &ctx.types) {
                // Freshly created; cannot be disposed yet.
                let _ = valve.add(member);
            }
        }
        tracing::debug!(
            path = %valve.path(),
            kind = ?kind,
            members = lock(&valve.shared.state).members.len(),
            "valve created"
        );
        if kind == ValveKind::State {
            valve.rebuild(0);
        }
        valve
    }

    fn disposed_error(&self) -> ObjectDisposedError {
        ObjectDisposedError::new(format!("valve {}", self.shared.path))
    }

    fn listener_for(&self, sender: u64) -> Listener {
        let weak: Weak<ValveShared> = Arc::downgrade(&self.shared);
        Arc::new(move |payload: &Payload| {
            if let Some(shared) = weak.upgrade() {
                let _ = Valve { shared }.propagate(sender, payload);
            }
        })
    }

    /// Add an attached member. Broadcasting members get a listener that
    /// routes into this valve.
    pub fn add(&self, member: Arc<Member>) -> Result<(), ObjectDisposedError> {
        {
            let mut guard = lock(&self.shared.state);
            if self.is_disposed() {
                return Err(self.disposed_error());
            }
            let types = &self.shared.ctx.types;
            let state = &mut *guard;
            for other in &state.members {
                state.compat.insert(
                    (other.id(), member.id()),
                    member.signature().accepts(other.signature(), types),
                );
                state.compat.insert(
                    (member.id(), other.id()),
                    other.signature().accepts(member.signature(), types),
                );
            }
            state.members.push(Arc::clone(&member));
        }
        if member.flags().contains(Capabilities::BROADCAST) {
            member.set_listener(Some(self.listener_for(member.id())));
        }
        Ok(())
    }

    /// Relay a broadcast from member `sender`.
    pub fn propagate(&self, sender: u64, payload: &Payload) -> Propagation {
        self.dispatch(sender, payload, false)
    }

    fn dispatch(&self, sender: u64, payload: &Payload, force: bool) -> Propagation {
        let shared = &self.shared;
        if self.is_disposed() {
            return Propagation::Disposed;
        }
        let _guard = match shared.kind {
            ValveKind::Signal => match DispatchGuard::enter(&shared.dispatching) {
                Some(g) => Some(g),
                None => {
                    tracing::trace!(path = %shared.path, "re-entrant signal dropped");
                    return Propagation::Suppressed;
                }
            },
            ValveKind::State => None,
        };
        let (receivers, generation) = {
            let mut state = lock(&shared.state);
            if self.is_disposed() {
                return Propagation::Disposed;
            }
            state.prune();
            if shared.kind == ValveKind::State {
                if !force && state.snapshot.as_ref().is_some_and(|s| s.matches(payload)) {
                    tracing::trace!(path = %shared.path, "unchanged state suppressed");
                    return Propagation::Suppressed;
                }
                state.snapshot = Some(Snapshot::capture(payload));
            }
            let generation = shared.generation.fetch_add(1, Ordering::AcqRel) + 1;
            let receivers: Vec<Arc<Member>> = state
                .members
                .iter()
                .filter(|m| m.id() != sender && m.flags().contains(Capabilities::HANDLE))
                .filter(|m| state.compat.get(&(sender, m.id())).copied().unwrap_or(false))
                .cloned()
                .collect();
            (receivers, generation)
        };
        tracing::trace!(
            path = %shared.path,
            receivers = receivers.len(),
            forced = force,
            "propagating"
        );
        let mut handled = false;
        for receiver in &receivers {
            handled |= receiver.offer(payload);
        }
        if shared.kind == ValveKind::State && shared.ctx.config.rebind {
            self.rebuild(generation);
        }
        if handled {
            Propagation::Handled
        } else {
            Propagation::NoneHandled
        }
    }

    /// Replace nested groups with ones built from the members' current
    /// values.
    fn rebuild(&self, generation: u64) {
        let shared = &self.shared;
        let (old, members, deferred) = {
            let mut state = lock(&shared.state);
            if self.is_disposed() || shared.generation.load(Ordering::Acquire) != generation {
                return;
            }
            (
                std::mem::take(&mut state.children),
                state.members.clone(),
                state.deferred.clone(),
            )
        };
        for child in &old {
            child.dispose();
        }

        let mut keepalive: Vec<ObjectRef> = Vec::new();
        let mut pending: Vec<Candidate> = deferred
            .into_iter()
            .filter(|c| c.owner.strong_count() > 0)
            .collect();
        for member in &members {
            if let Some(Value::Object(value)) = member.read() {
                pending.extend(binder::scan_nested(
                    &shared.ctx,
                    member.origin(),
                    &value,
                    &shared.path,
                    member.ancestry(),
                ));
                keepalive.push(value);
            }
        }
        let children = binder::build_level(&shared.ctx, pending);
        drop(keepalive);

        let mut state = lock(&shared.state);
        if self.is_disposed() || shared.generation.load(Ordering::Acquire) != generation {
            drop(state);
            tracing::debug!(
                path = %shared.path,
                discarded = children.len(),
                "stale rebuild discarded"
            );
            for child in &children {
                child.dispose();
            }
            return;
        }
        tracing::debug!(
            path = %shared.path,
            children = children.len(),
            "nested groups rebuilt"
        );
        state.children = children;
    }

    /// Push `object`'s current value to the rest of the group, then into
    /// nested groups. Members attached elsewhere are left alone.
    pub fn activate(&self, object: &ObjectRef) -> Result<Propagation, ObjectDisposedError> {
        if self.is_disposed() {
            return Err(self.disposed_error());
        }
        let addr = object_addr(object);
        let origin = lock(&self.shared.state)
            .members
            .iter()
            .find(|m| m.object().is_some_and(|o| object_addr(&o) == addr))
            .map(|m| m.origin());
        match origin {
            Some(origin) => self.activate_origin(origin),
            None => Ok(Propagation::NoneHandled),
        }
    }

    /// Push the value held by `origin`'s member to the rest of the group,
    /// ignoring the snapshot, then recurse into nested groups.
    pub fn activate_origin(&self, origin: Origin) -> Result<Propagation, ObjectDisposedError> {
        if self.is_disposed() {
            return Err(self.disposed_error());
        }
        let source = lock(&self.shared.state)
            .members
            .iter()
            .find(|m| m.origin() == origin && m.flags().contains(Capabilities::READ))
            .cloned();
        let outcome = match source.and_then(|m| m.read().map(|v| (m, v))) {
            Some((member, value)) => self.dispatch(member.id(), &vec![value], true),
            None => Propagation::NoneHandled,
        };
        if outcome == Propagation::Disposed {
            return Err(self.disposed_error());
        }
        for child in self.children() {
            let _ = child.activate_origin(origin);
        }
        Ok(outcome)
    }

    /// Run `hook` when this valve starts disposing.
    pub fn on_disposing(
        &self,
        hook: impl FnOnce(&Valve) + Send + 'static,
    ) -> Result<(), ObjectDisposedError> {
        let mut state = lock(&self.shared.state);
        if self.is_disposed() {
            return Err(self.disposed_error());
        }
        state.disposing.push(Box::new(hook));
        Ok(())
    }

    /// Tear down: notify hooks, dispose nested groups, detach members.
    pub fn dispose(&self) {
        if self.shared.disposed.swap(true, Ordering::AcqRel) {
            return;
        }
        let hooks = std::mem::take(&mut lock(&self.shared.state).disposing);
        for hook in hooks {
            hook(self);
        }
        let (members, children) = {
            let mut state = lock(&self.shared.state);
            state.snapshot = None;
            state.compat.clear();
            state.deferred.clear();
            (
                std::mem::take(&mut state.members),
                std::mem::take(&mut state.children),
            )
        };
        for child in &children {
            child.dispose();
        }
        for member in &members {
            member.set_listener(None);
            member.detach();
        }
        tracing::debug!(path = %self.shared.path, "valve disposed");
    }

    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.shared.disposed.load(Ordering::Acquire)
    }

    #[must_use]
    pub fn id(&self) -> u64 {
        self.shared.id
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.shared.path
    }

    #[must_use]
    pub fn kind(&self) -> ValveKind {
        self.shared.kind
    }

    /// Current members. Empty after disposal.
    #[must_use]
    pub fn members(&self) -> Vec<Arc<Member>> {
        lock(&self.shared.state).members.clone()
    }

    /// Members whose objects are still alive. Prunes the rest.
    #[must_use]
    pub fn live_member_count(&self) -> usize {
        let mut state = lock(&self.shared.state);
        state.prune();
        state.members.len()
    }

    /// Nested groups. Empty after disposal.
    #[must_use]
    pub fn children(&self) -> Vec<Valve> {
        lock(&self.shared.state).children.clone()
    }

    /// This valve or the nested group at `path`.
    #[must_use]
    pub fn find(&self, path: &Path) -> Option<Valve> {
        if self.path() == path {
            return Some(self.clone());
        }
        if !path.extends(self.path()) {
            return None;
        }
        self.children().iter().find_map(|c| c.find(path))
    }

    /// Snapshot of this valve and its nested groups.
    #[must_use]
    pub fn describe(&self) -> BindingGroup {
        let (members, children) = {
            let state = lock(&self.shared.state);
            (state.members.clone(), state.children.clone())
        };
        BindingGroup {
            path: self.path().clone(),
            kind: self.kind(),
            members: members
                .iter()
                .map(|m| MemberInfo {
                    origin: m.origin(),
                    name: m.template().name().to_string(),
                    flags: m.flags(),
                    alive: m.is_alive(),
                })
                .collect(),
            children: children.iter().map(Valve::describe).collect(),
        }
    }
}
