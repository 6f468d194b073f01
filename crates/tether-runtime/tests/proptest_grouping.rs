#![forbid(unsafe_code)]

//! Property tests for grouping over dynamically shaped objects.
//!
//! Each root is a bag of named integer slots exposed through a closure
//! scanner. For any two name sets:
//! 1. exactly the shared names become groups, in path order;
//! 2. a write to a shared slot on either side reaches the other side;
//! 3. slots present on only one side are left alone.

use std::collections::BTreeMap;
use std::sync::Arc;

use proptest::prelude::*;
use tether_core::{ObjectRef, Path, Signature, Value, ValueType};
use tether_runtime::{
    Bindable, Binder, Capability, FnScanner, Listener, Observable, PropertyAccess, Subscription,
    canonical,
};

const NAMES: [&str; 5] = ["alpha", "beta_gamma", "deltaEpsilon", "Zeta", "omega-mu"];

struct Bag {
    slots: BTreeMap<String, Observable<i64>>,
}

impl Bag {
    fn new(names: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            slots: names
                .iter()
                .map(|n| ((*n).to_string(), Observable::new(0)))
                .collect(),
        })
    }

    fn slot(&self, name: &str) -> &Observable<i64> {
        &self.slots[name]
    }
}

struct SlotAccess {
    key: String,
}

impl SlotAccess {
    fn observable<'a>(&self, target: &'a ObjectRef) -> Option<&'a Observable<i64>> {
        (**target).downcast_ref::<Bag>()?.slots.get(&self.key)
    }
}

impl PropertyAccess for SlotAccess {
    fn get(&self, target: &ObjectRef) -> Option<Value> {
        self.observable(target).map(|o| Value::Int(o.get()))
    }

    fn set(&self, target: &ObjectRef, value: &Value) -> bool {
        match (self.observable(target), value) {
            (Some(o), Value::Int(i)) => {
                o.set(*i);
                true
            }
            _ => false,
        }
    }

    fn writable(&self) -> bool {
        true
    }

    fn notifies(&self) -> bool {
        true
    }

    fn subscribe(&self, target: &ObjectRef, listener: Listener) -> Option<Subscription> {
        let o = self.observable(target)?;
        Some(o.subscribe(move |v| listener(&vec![Value::Int(*v)])))
    }
}

fn bag_binder() -> Binder {
    let scanner = FnScanner::new(|object: &ObjectRef| {
        let Some(bag) = (**object).downcast_ref::<Bag>() else {
            return Vec::new();
        };
        bag.slots
            .keys()
            .filter_map(|key| {
                let path = canonical(key)?;
                Some(Bindable::new(
                    key.as_str(),
                    path,
                    Signature::single(ValueType::Int),
                    Capability::Property(Arc::new(SlotAccess { key: key.clone() })),
                ))
            })
            .collect()
    });
    Binder::new(Arc::new(scanner))
}

proptest! {
    #[test]
    fn shared_names_group_in_path_order(
        left in prop::sample::subsequence(NAMES.to_vec(), 0..=NAMES.len()),
        right in prop::sample::subsequence(NAMES.to_vec(), 0..=NAMES.len()),
    ) {
        let a = Bag::new(&left);
        let b = Bag::new(&right);
        let bindings = bag_binder().bind(&[a.clone() as ObjectRef, b.clone() as ObjectRef]);

        let shared: Vec<&str> = left.iter().copied().filter(|n| right.contains(n)).collect();
        let mut expected: Vec<Path> = shared.iter().filter_map(|n| canonical(n)).collect();
        expected.sort();
        let actual: Vec<Path> = bindings.valves().iter().map(|v| v.path().clone()).collect();
        prop_assert_eq!(actual, expected);

        for (i, name) in shared.iter().enumerate() {
            let value = i64::try_from(i).unwrap_or(0) + 10;
            if i % 2 == 0 {
                a.slot(name).set(value);
                prop_assert_eq!(b.slot(name).get(), value);
            } else {
                b.slot(name).set(value);
                prop_assert_eq!(a.slot(name).get(), value);
            }
        }

        for name in left.iter().filter(|n| !right.contains(n)) {
            a.slot(name).set(99);
        }
        for name in right.iter().filter(|n| !left.contains(n)) {
            prop_assert_eq!(b.slot(name).get(), 0);
        }
    }
}
