#![forbid(unsafe_code)]

//! Grouping bindables across roots into valves.
//!
//! # Algorithm
//!
//! ```text
//! pending <- scan every root, tag with its origin, stable-sort by path
//! while pending is not empty:
//!     group <- pop every entry sharing the smallest path P
//!     if group has >= 2 origins and a member that can receive:
//!         if the group holds a property (state valve):
//!             deferred <- pop every entry whose path extends P
//!             build nested groups from the members' current values
//!             plus `deferred`
//!         build a valve for P; extensions of a signal path stay queued
//!     else if the next entry extends P:
//!         scan the group's current object values, rebase under P,
//!         merge into pending (path order)
//!     else:
//!         discard the group
//! ```
//!
//! Because paths sort prefix-first, every extension of `P` sits right
//! after the group, so "deferred" is a contiguous run.
//!
//! Traversal into object values stops on a cycle (an object already on
//! the chain from the root) and at [`BinderConfig::max_depth`].

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;

use tether_core::{ObjectRef, Path, TypeGraph, Value, WeakObject, object_addr};

use crate::bindable::{Bindable, Capabilities};
use crate::bindings::Bindings;
use crate::config::BinderConfig;
use crate::member::Origin;
use crate::scanner::Scanner;
use crate::valve::{Valve, ValveKind};

/// Everything a bind session and its valves share.
pub(crate) struct BindContext {
    pub(crate) scanner: Arc<dyn Scanner>,
    pub(crate) types: Arc<TypeGraph>,
    pub(crate) config: BinderConfig,
}

/// A discovered, not yet attached bindable with its provenance.
#[derive(Clone)]
pub(crate) struct Candidate {
    pub(crate) origin: Origin,
    /// Template with its path already rebased to the absolute path.
    pub(crate) template: Bindable,
    pub(crate) owner: WeakObject,
    /// Object addresses from the root down to `owner`, inclusive.
    pub(crate) ancestry: Arc<[usize]>,
}

impl Candidate {
    fn path(&self) -> &Path {
        self.template.path()
    }
}

fn sort_by_path(candidates: &mut [Candidate]) {
    candidates.sort_by(|a, b| a.path().cmp(b.path()));
}

fn qualifies(group: &[Candidate]) -> bool {
    let Some(first) = group.first() else {
        return false;
    };
    group.iter().any(|c| c.origin != first.origin)
        && group
            .iter()
            .any(|c| c.template.flags().contains(Capabilities::HANDLE))
}

/// Scan `value` (held by a member with `ancestry`) and rebase what it
/// exposes under `base`. Empty on a cycle or past the depth limit.
pub(crate) fn scan_nested(
    ctx: &BindContext,
    origin: Origin,
    value: &ObjectRef,
    base: &Path,
    ancestry: &Arc<[usize]>,
) -> Vec<Candidate> {
    let addr = object_addr(value);
    if ancestry.contains(&addr) {
        tracing::trace!(path = %base, "cycle detected; traversal stopped");
        return Vec::new();
    }
    if ancestry.len() >= ctx.config.max_depth {
        tracing::debug!(
            path = %base,
            max_depth = ctx.config.max_depth,
            "depth limit reached; traversal stopped"
        );
        return Vec::new();
    }
    let mut chain = ancestry.to_vec();
    chain.push(addr);
    let chain: Arc<[usize]> = chain.into();
    ctx.scanner
        .scan(value)
        .into_iter()
        .map(|template| Candidate {
            origin,
            template: template.rebased(base),
            owner: Arc::downgrade(value),
            ancestry: Arc::clone(&chain),
        })
        .collect()
}

fn expand(
    ctx: &BindContext,
    group: &[Candidate],
    base: &Path,
    keepalive: &mut Vec<ObjectRef>,
) -> Vec<Candidate> {
    let mut out = Vec::new();
    for candidate in group {
        let Some(owner) = candidate.owner.upgrade() else {
            continue;
        };
        if let Some(Value::Object(value)) = candidate.template.read_from(&owner) {
            out.extend(scan_nested(
                ctx,
                candidate.origin,
                &value,
                base,
                &candidate.ancestry,
            ));
            keepalive.push(value);
        }
    }
    out
}

/// Group `pending` into valves at one level.
pub(crate) fn build_level(ctx: &Arc<BindContext>, mut pending: Vec<Candidate>) -> Vec<Valve> {
    // Scanned values stay alive until their members are attached.
    let mut keepalive: Vec<ObjectRef> = Vec::new();
    let mut valves = Vec::new();
    sort_by_path(&mut pending);
    let mut queue: VecDeque<Candidate> = pending.into();

    while let Some(first) = queue.pop_front() {
        let path = first.path().clone();
        let mut group = vec![first];
        while queue.front().is_some_and(|c| c.path() == &path) {
            group.extend(queue.pop_front());
        }
        let deeper = queue.front().is_some_and(|c| c.path().extends(&path));

        if qualifies(&group) {
            let mut deferred = Vec::new();
            // Signal valves never rebuild, so extensions group on their own.
            if ValveKind::for_group(&group) == ValveKind::State {
                while queue.front().is_some_and(|c| c.path().extends(&path)) {
                    deferred.extend(queue.pop_front());
                }
            }
            valves.push(Valve::build(ctx, path, group, deferred));
        } else if deeper {
            let nested = expand(ctx, &group, &path, &mut keepalive);
            if !nested.is_empty() {
                let mut merged = Vec::from(queue);
                merged.extend(nested);
                sort_by_path(&mut merged);
                queue = merged.into();
            }
        } else {
            tracing::trace!(path = %path, members = group.len(), "group discarded");
        }
    }
    drop(keepalive);
    valves
}

/// Entry point: binds root objects into a [`Bindings`] session.
///
/// ```ignore
/// let binder = Binder::new(Arc::new(scanner)).with_config(BinderConfig::from_env());
/// let bindings = binder.bind(&[view, view_model]);
/// ```
#[derive(Clone)]
pub struct Binder {
    scanner: Arc<dyn Scanner>,
    types: Arc<TypeGraph>,
    config: BinderConfig,
}

impl fmt::Debug for Binder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Binder")
            .field("types", &self.types)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Binder {
    #[must_use]
    pub fn new(scanner: Arc<dyn Scanner>) -> Self {
        Self {
            scanner,
            types: Arc::new(TypeGraph::new()),
            config: BinderConfig::default(),
        }
    }

    /// Type graph used for source-type checks and signature matching.
    #[must_use]
    pub fn with_types(mut self, types: Arc<TypeGraph>) -> Self {
        self.types = types;
        self
    }

    #[must_use]
    pub fn with_config(mut self, config: BinderConfig) -> Self {
        self.config = config;
        self
    }

    #[must_use]
    pub fn config(&self) -> &BinderConfig {
        &self.config
    }

    #[must_use]
    pub fn types(&self) -> &Arc<TypeGraph> {
        &self.types
    }

    /// Bind `roots`; each root's origin is its index.
    pub fn bind(&self, roots: &[ObjectRef]) -> Bindings {
        self.bind_tagged(
            roots
                .iter()
                .enumerate()
                .map(|(i, root)| (Origin::Root(i), Arc::clone(root))),
        )
    }

    /// Bind roots with caller-chosen origins. Roots sharing an origin never
    /// pair with each other.
    pub fn bind_tagged(&self, roots: impl IntoIterator<Item = (Origin, ObjectRef)>) -> Bindings {
        let roots: Vec<(Origin, ObjectRef)> = roots.into_iter().collect();
        let _span = tracing::debug_span!("bind", roots = roots.len()).entered();
        let ctx = Arc::new(BindContext {
            scanner: Arc::clone(&self.scanner),
            types: Arc::clone(&self.types),
            config: self.config.clone(),
        });

        let mut pending = Vec::new();
        for (origin, root) in &roots {
            let ancestry: Arc<[usize]> = Arc::from([object_addr(root)]);
            pending.extend(ctx.scanner.scan(root).into_iter().map(|template| Candidate {
                origin: *origin,
                template,
                owner: Arc::downgrade(root),
                ancestry: Arc::clone(&ancestry),
            }));
        }
        let valves = build_level(&ctx, pending);
        tracing::debug!(valves = valves.len(), "bind complete");

        let bindings = Bindings::new(
            valves,
            roots
                .iter()
                .map(|(origin, root)| (*origin, Arc::downgrade(root)))
                .collect(),
        );
        if let Some(index) = ctx.config.activate_root {
            match roots.get(index) {
                Some((origin, _)) => {
                    let _ = bindings.activate_origin(*origin);
                }
                None => tracing::warn!(index, "activate_root out of range; skipped"),
            }
        }
        bindings
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observable::Observable;
    use crate::scanner::FnScanner;
    use crate::event::EventChannel;
    use crate::table::{TableScanner, TypeTable};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tether_core::{AnyLink, Signature};

    struct Node {
        name: Observable<String>,
        next: Observable<AnyLink>,
    }

    fn node(name: &str) -> Arc<Node> {
        Arc::new(Node {
            name: Observable::new(name.into()),
            next: Observable::new(AnyLink::none()),
        })
    }

    fn link(n: &Arc<Node>) -> AnyLink {
        AnyLink::new(Arc::clone(n))
    }

    fn node_table() -> TypeTable {
        TypeTable::builder::<Node>()
            .property("name", |n: &Node| &n.name)
            .property("next", |n: &Node| &n.next)
            .build()
    }

    fn scanner() -> Arc<dyn Scanner> {
        Arc::new(TableScanner::new().with(node_table()))
    }

    #[test]
    fn single_root_forms_no_groups() {
        let a = node("a");
        let bindings = Binder::new(scanner()).bind(&[a]);
        assert!(bindings.is_empty());
    }

    #[test]
    fn duplicate_reports_from_one_root_do_not_qualify() {
        let dup: Arc<dyn Scanner> = Arc::new(FnScanner::new(|_: &ObjectRef| {
            let t = node_table();
            vec![t.bindables()[0].clone(), t.bindables()[0].clone()]
        }));
        let a = node("a");
        let bindings = Binder::new(dup).bind(&[a]);
        assert!(bindings.is_empty());
    }

    #[test]
    fn shared_origin_tags_never_pair() {
        let (a, b) = (node("a"), node("b"));
        let bindings = Binder::new(scanner()).bind_tagged([
            (Origin::Activator(7), a.clone() as ObjectRef),
            (Origin::Activator(7), b.clone() as ObjectRef),
        ]);
        assert!(bindings.is_empty());
        a.name.set("z".into());
        assert_eq!(b.name.get(), "b");
    }

    #[test]
    fn read_only_pairs_without_receiver_are_discarded() {
        let (a, b) = (node("a"), node("b"));
        let readonly: Arc<dyn Scanner> = Arc::new(
            TableScanner::new().with(
                TypeTable::builder::<Node>()
                    .readonly("name", |n: &Node| &n.name)
                    .build(),
            ),
        );
        let bindings = Binder::new(readonly).bind(&[a, b]);
        assert!(bindings.is_empty());
    }

    #[test]
    fn cyclic_graphs_terminate() {
        let (a, b) = (node("a"), node("b"));
        a.next.set(link(&b));
        b.next.set(link(&a));
        let (c, d) = (node("c"), node("d"));
        c.next.set(link(&d));
        d.next.set(link(&c));

        let bindings = Binder::new(scanner()).bind(&[a.clone(), c.clone()]);
        let groups = bindings.groups();
        let top: Vec<String> = groups.iter().map(|g| g.path.to_string()).collect();
        assert_eq!(top, vec!["Name", "Next"]);
        let nested: Vec<String> = groups[1]
            .children
            .iter()
            .map(|g| g.path.to_string())
            .collect();
        // `Next.Next` points back at the roots, so traversal stops there.
        assert_eq!(nested, vec!["Next.Name", "Next.Next"]);
        assert!(groups[1].children[1].children.is_empty());

        a.name.set("a2".into());
        assert_eq!(c.name.get(), "a2");
        b.name.set("b2".into());
        assert_eq!(d.name.get(), "b2");
    }

    struct Holder {
        child: Observable<AnyLink>,
    }

    struct Leaf {
        text: Observable<String>,
    }

    struct Flat {
        child_text: Observable<String>,
    }

    #[test]
    fn unpaired_parent_is_traversed_for_deeper_pairs() {
        let scanner: Arc<dyn Scanner> = Arc::new(
            TableScanner::new()
                .with(
                    TypeTable::builder::<Holder>()
                        .readonly("child", |h: &Holder| &h.child)
                        .build(),
                )
                .with(
                    TypeTable::builder::<Leaf>()
                        .property("text", |l: &Leaf| &l.text)
                        .build(),
                )
                .with(
                    TypeTable::builder::<Flat>()
                        .property("child.text", |f: &Flat| &f.child_text)
                        .build(),
                ),
        );
        let leaf = Arc::new(Leaf {
            text: Observable::new("leaf".into()),
        });
        let holder = Arc::new(Holder {
            child: Observable::new(AnyLink::new(Arc::clone(&leaf))),
        });
        let flat = Arc::new(Flat {
            child_text: Observable::new("flat".into()),
        });

        let bindings = Binder::new(scanner).bind(&[holder, flat.clone()]);
        let top: Vec<String> = bindings.groups().iter().map(|g| g.path.to_string()).collect();
        assert_eq!(top, vec!["Child.Text"]);
        leaf.text.set("changed".into());
        assert_eq!(flat.child_text.get(), "changed");
    }

    #[test]
    fn depth_limit_stops_traversal() {
        let (a, b) = (node("a"), node("b"));
        let (an, bn) = (node("an"), node("bn"));
        a.next.set(link(&an));
        b.next.set(link(&bn));
        let config = BinderConfig::default().with_max_depth(1);
        let bindings = Binder::new(scanner()).with_config(config).bind(&[a, b]);
        assert_eq!(bindings.len(), 2);
        assert!(bindings.valves().iter().all(|v| v.kind() == ValveKind::State));
        assert!(bindings.valves().iter().all(|v| v.children().is_empty()));
    }

    #[test]
    fn activate_root_seeds_after_bind() {
        let (a, b) = (node("seed"), node("other"));
        let config = BinderConfig::default().with_activate_root(Some(0));
        let _bindings = Binder::new(scanner())
            .with_config(config)
            .bind(&[a.clone(), b.clone()]);
        assert_eq!(b.name.get(), "seed");
    }

    struct Button {
        click: EventChannel,
        click_count: Observable<i64>,
    }

    struct Tally {
        click_count: Observable<i64>,
        clicks: AtomicUsize,
    }

    #[test]
    fn signal_group_leaves_longer_paths_to_group_on_their_own() {
        let scanner: Arc<dyn Scanner> = Arc::new(
            TableScanner::new()
                .with(
                    TypeTable::builder::<Button>()
                        .event("click", Signature::default(), |b: &Button| &b.click)
                        .property("click_count", |b: &Button| &b.click_count)
                        .build(),
                )
                .with(
                    TypeTable::builder::<Tally>()
                        .handler("click", Signature::default(), |t: &Tally, _| {
                            t.clicks.fetch_add(1, Ordering::SeqCst);
                            true
                        })
                        .property("click_count", |t: &Tally| &t.click_count)
                        .build(),
                ),
        );
        let button = Arc::new(Button {
            click: EventChannel::new(Signature::default()),
            click_count: Observable::new(0),
        });
        let tally = Arc::new(Tally {
            click_count: Observable::new(0),
            clicks: AtomicUsize::new(0),
        });

        let bindings =
            Binder::new(scanner).bind(&[button.clone() as ObjectRef, tally.clone() as ObjectRef]);
        let top: Vec<(String, ValveKind)> = bindings
            .valves()
            .iter()
            .map(|v| (v.path().to_string(), v.kind()))
            .collect();
        assert_eq!(
            top,
            vec![
                ("Click".to_string(), ValveKind::Signal),
                ("ClickCount".to_string(), ValveKind::State),
            ]
        );

        button.click_count.set(5);
        assert_eq!(tally.click_count.get(), 5);
        button.click.emit(Vec::new());
        assert_eq!(tally.clicks.load(Ordering::SeqCst), 1);
    }
}
