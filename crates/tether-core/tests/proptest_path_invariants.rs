//! Property-based invariant tests for canonical paths.
//!
//! 1. Ordering is total and consistent with equality.
//! 2. A proper prefix always sorts before its extensions.
//! 3. `concat` is associative.
//! 4. `a.concat(b).relative_to(a) == Some(b)`.
//! 5. Equality ignores fragment boundaries.
//! 6. Sorting groups every extension of a path immediately after it.

use proptest::prelude::*;
use tether_core::{Fragment, Path};

// ── Strategies ────────────────────────────────────────────────────────────

fn syllable() -> impl Strategy<Value = String> {
    prop::sample::select(vec!["a", "b", "c", "label", "text", "control"])
        .prop_map(str::to_string)
}

fn fragment() -> impl Strategy<Value = Fragment> {
    proptest::collection::vec(syllable(), 1..=3)
        .prop_map(|s| Fragment::new(s).expect("non-empty syllables"))
}

fn path() -> impl Strategy<Value = Path> {
    proptest::collection::vec(fragment(), 0..=3).prop_map(Path::from_fragments)
}

proptest! {
    #[test]
    fn ordering_consistent_with_eq(a in path(), b in path()) {
        prop_assert_eq!(a.cmp(&b) == std::cmp::Ordering::Equal, a == b);
        prop_assert_eq!(a.cmp(&b), b.cmp(&a).reverse());
    }

    #[test]
    fn prefix_sorts_first(a in path(), f in fragment()) {
        let longer = a.child(f);
        prop_assert!(a < longer);
        prop_assert!(longer.extends(&a));
    }

    #[test]
    fn concat_associative(a in path(), b in path(), c in path()) {
        prop_assert_eq!(a.concat(&b).concat(&c), a.concat(&b.concat(&c)));
    }

    #[test]
    fn relative_inverts_concat(a in path(), b in path()) {
        prop_assert_eq!(a.concat(&b).relative_to(&a), Some(b));
    }

    #[test]
    fn flattening_preserves_equality(fragments in proptest::collection::vec(fragment(), 1..=3)) {
        let nested = Path::from_fragments(fragments.clone());
        let flat_syllables: Vec<String> = fragments
            .iter()
            .flat_map(|f| f.syllables().iter().map(|s| s.to_string()))
            .collect();
        let flat = Path::from(Fragment::new(flat_syllables).expect("non-empty"));
        prop_assert_eq!(nested, flat);
    }

    #[test]
    fn extensions_are_contiguous_after_sort(mut paths in proptest::collection::vec(path(), 1..=12)) {
        paths.sort();
        for (i, p) in paths.iter().enumerate() {
            let mut leaving = false;
            for q in &paths[i + 1..] {
                if q.starts_with(p) {
                    prop_assert!(!leaving, "extension of {} found after a non-extension", p);
                } else {
                    leaving = true;
                }
            }
        }
    }
}
