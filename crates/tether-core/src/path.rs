#![forbid(unsafe_code)]

//! Canonical member names: syllables, fragments, and paths.
//!
//! A [`Fragment`] is one member name broken into lower-cased word pieces
//! ("syllables"); a [`Path`] is a sequence of fragments naming a member
//! nested inside other members.
//!
//! # Invariants
//!
//! 1. A fragment is never empty and every syllable is non-empty and
//!    lower-case.
//! 2. Equality, hashing, and ordering of paths look only at the flattened
//!    syllable sequence: `ControlLabel` (one fragment) equals
//!    `Control.Label` (two fragments). Fragment boundaries are kept for
//!    display only.
//! 3. Ordering is lexicographic over syllables; a proper prefix sorts
//!    before its extensions. The empty path sorts first and is a prefix of
//!    every path.
//! 4. `concat` is associative and `a.concat(b).relative_to(a) == Some(b)`.
//!
//! ```text
//!   [a b] < [a b c] < [a b d] < [a c]
//! ```

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// One member name as an ordered, non-empty list of lower-cased syllables.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Fragment {
    syllables: Arc<[Arc<str>]>,
}

impl Fragment {
    /// Build a fragment from word pieces. Pieces are lower-cased; empty
    /// pieces are skipped. Returns `None` when nothing remains.
    #[must_use]
    pub fn new<I, S>(syllables: I) -> Option<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let syllables: Vec<Arc<str>> = syllables
            .into_iter()
            .map(|s| s.as_ref().trim().to_lowercase())
            .filter(|s| !s.is_empty())
            .map(Arc::from)
            .collect();
        if syllables.is_empty() {
            None
        } else {
            Some(Self {
                syllables: syllables.into(),
            })
        }
    }

    /// Syllables of this fragment.
    #[must_use]
    pub fn syllables(&self) -> &[Arc<str>] {
        &self.syllables
    }
}

impl fmt::Debug for Fragment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.syllables.iter()).finish()
    }
}

impl fmt::Display for Fragment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for s in self.syllables.iter() {
            let mut chars = s.chars();
            if let Some(first) = chars.next() {
                write!(f, "{}{}", first.to_uppercase(), chars.as_str())?;
            }
        }
        Ok(())
    }
}

/// A hierarchical canonical name.
///
/// Cheap to clone; immutable.
#[derive(Clone, Default)]
pub struct Path {
    syllables: Arc<[Arc<str>]>,
    /// End offsets (exclusive) of each fragment within `syllables`.
    bounds: Arc<[usize]>,
}

impl Path {
    /// The empty path.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Path from fragments in order.
    #[must_use]
    pub fn from_fragments(fragments: impl IntoIterator<Item = Fragment>) -> Self {
        let mut syllables = Vec::new();
        let mut bounds = Vec::new();
        for fragment in fragments {
            syllables.extend(fragment.syllables.iter().cloned());
            bounds.push(syllables.len());
        }
        Self {
            syllables: syllables.into(),
            bounds: bounds.into(),
        }
    }

    /// Whether this path has no syllables.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.syllables.is_empty()
    }

    /// Flattened syllables.
    #[must_use]
    pub fn syllables(&self) -> &[Arc<str>] {
        &self.syllables
    }

    /// Number of fragments.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.bounds.len()
    }

    /// Fragments in order.
    #[must_use]
    pub fn fragments(&self) -> Vec<Fragment> {
        let mut start = 0;
        self.bounds
            .iter()
            .map(|&end| {
                let fragment = Fragment {
                    syllables: self.syllables[start..end].into(),
                };
                start = end;
                fragment
            })
            .collect()
    }

    /// `self` followed by `suffix`.
    #[must_use]
    pub fn concat(&self, suffix: &Path) -> Path {
        if suffix.is_empty() {
            return self.clone();
        }
        if self.is_empty() {
            return suffix.clone();
        }
        let offset = self.syllables.len();
        let syllables: Vec<Arc<str>> = self
            .syllables
            .iter()
            .chain(suffix.syllables.iter())
            .cloned()
            .collect();
        let bounds: Vec<usize> = self
            .bounds
            .iter()
            .copied()
            .chain(suffix.bounds.iter().map(|b| b + offset))
            .collect();
        Self {
            syllables: syllables.into(),
            bounds: bounds.into(),
        }
    }

    /// `self` followed by one more fragment.
    #[must_use]
    pub fn child(&self, fragment: Fragment) -> Path {
        self.concat(&Path::from(fragment))
    }

    /// Whether `prefix` is a (not necessarily proper) syllable prefix.
    #[must_use]
    pub fn starts_with(&self, prefix: &Path) -> bool {
        self.syllables.len() >= prefix.syllables.len()
            && self.syllables[..prefix.syllables.len()] == prefix.syllables[..]
    }

    /// Whether `prefix` is a prefix and strictly shorter.
    #[must_use]
    pub fn extends(&self, prefix: &Path) -> bool {
        self.syllables.len() > prefix.syllables.len() && self.starts_with(prefix)
    }

    /// The remainder after `base`, or `None` when `base` is not a prefix.
    ///
    /// Equal paths yield the empty path. When `base` ends in the middle of a
    /// fragment, the remaining syllables of that fragment form the first
    /// fragment of the result.
    #[must_use]
    pub fn relative_to(&self, base: &Path) -> Option<Path> {
        if !self.starts_with(base) {
            return None;
        }
        let cut = base.syllables.len();
        let syllables: Arc<[Arc<str>]> = self.syllables[cut..].into();
        let bounds: Vec<usize> = self
            .bounds
            .iter()
            .filter(|&&b| b > cut)
            .map(|b| b - cut)
            .collect();
        Some(Self {
            syllables,
            bounds: bounds.into(),
        })
    }
}

impl From<Fragment> for Path {
    fn from(fragment: Fragment) -> Self {
        let len = fragment.syllables.len();
        Self {
            syllables: fragment.syllables,
            bounds: Arc::from([len]),
        }
    }
}

impl PartialEq for Path {
    fn eq(&self, other: &Self) -> bool {
        self.syllables == other.syllables
    }
}

impl Eq for Path {}

impl Hash for Path {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.syllables.hash(state);
    }
}

impl PartialOrd for Path {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Path {
    fn cmp(&self, other: &Self) -> Ordering {
        // Slice ordering is lexicographic with shorter prefixes first.
        self.syllables.cmp(&other.syllables)
    }
}

impl fmt::Debug for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Path({self})")
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return f.write_str("<root>");
        }
        for (i, fragment) in self.fragments().iter().enumerate() {
            if i > 0 {
                f.write_str(".")?;
            }
            write!(f, "{fragment}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frag(parts: &[&str]) -> Fragment {
        Fragment::new(parts.iter().copied()).expect("non-empty fragment")
    }

    fn path(parts: &[&str]) -> Path {
        Path::from(frag(parts))
    }

    #[test]
    fn fragment_lowercases_and_rejects_empty() {
        let f = frag(&["My", "Property"]);
        assert_eq!(&*f.syllables()[0], "my");
        assert!(Fragment::new(["", "  "]).is_none());
        assert!(Fragment::new(Vec::<String>::new()).is_none());
    }

    #[test]
    fn ordering_prefix_first() {
        let mut paths = vec![path(&["a", "b", "c"]), path(&["a", "b"]), path(&["a", "b", "d"])];
        paths.sort();
        assert_eq!(
            paths,
            vec![path(&["a", "b"]), path(&["a", "b", "c"]), path(&["a", "b", "d"])]
        );
    }

    #[test]
    fn empty_sorts_first_and_prefixes_everything() {
        let e = Path::empty();
        let p = path(&["x"]);
        assert!(e < p);
        assert!(p.starts_with(&e));
        assert_eq!(p.relative_to(&e), Some(p.clone()));
    }

    #[test]
    fn equality_ignores_fragment_boundaries() {
        let flat = path(&["control", "label"]);
        let nested = path(&["control"]).child(frag(&["label"]));
        assert_eq!(flat, nested);
        assert_eq!(nested.depth(), 2);
        assert_eq!(flat.depth(), 1);
        assert_eq!(nested.to_string(), "Control.Label");
        assert_eq!(flat.to_string(), "ControlLabel");
    }

    #[test]
    fn relative_to_rebases() {
        let base = path(&["control"]);
        let full = base.child(frag(&["label", "text"]));
        let rel = full.relative_to(&base).expect("prefix");
        assert_eq!(rel, path(&["label", "text"]));
        assert_eq!(rel.depth(), 1);
        assert!(full.relative_to(&path(&["other"])).is_none());
        assert_eq!(full.relative_to(&full), Some(Path::empty()));
    }

    #[test]
    fn relative_to_mid_fragment() {
        let full = path(&["control", "label"]);
        let rel = full.relative_to(&path(&["control"])).expect("prefix");
        assert_eq!(rel, path(&["label"]));
        assert_eq!(rel.depth(), 1);
    }

    #[test]
    fn extends_is_proper() {
        let a = path(&["a"]);
        assert!(!a.extends(&a));
        assert!(a.child(frag(&["b"])).extends(&a));
    }
}
