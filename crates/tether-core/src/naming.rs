#![forbid(unsafe_code)]

//! Naming conventions: how a host identifier becomes a canonical name.
//!
//! The binder never parses names; concrete scanners do, through a
//! [`NamingConvention`]. [`WordCase`] covers the common Rust and C-family
//! styles.
//!
//! | Identifier        | Syllables                 |
//! |-------------------|---------------------------|
//! | `my_property`     | `my`, `property`          |
//! | `MyProperty`      | `my`, `property`          |
//! | `HTTPServer`      | `http`, `server`          |
//! | `label2Text`      | `label2`, `text`          |
//! | `on-click`        | `on`, `click`             |

use crate::path::{Fragment, Path};

/// Maps a raw member identifier to a canonical [`Fragment`].
pub trait NamingConvention: Send + Sync {
    /// Parse one identifier. `None` when it yields no syllables.
    fn parse(&self, identifier: &str) -> Option<Fragment>;

    /// Parse a dotted identifier (`control.label`) into a multi-fragment
    /// path. Empty segments are skipped.
    fn parse_path(&self, dotted: &str) -> Option<Path> {
        let fragments: Vec<Fragment> = dotted
            .split('.')
            .filter_map(|segment| self.parse(segment))
            .collect();
        if fragments.is_empty() {
            None
        } else {
            Some(Path::from_fragments(fragments))
        }
    }
}

/// Case- and separator-based word splitting.
#[derive(Debug, Clone, Copy, Default)]
pub struct WordCase;

impl NamingConvention for WordCase {
    fn parse(&self, identifier: &str) -> Option<Fragment> {
        Fragment::new(split_words(identifier))
    }
}

fn split_words(identifier: &str) -> Vec<String> {
    let chars: Vec<char> = identifier.chars().collect();
    let mut words = Vec::new();
    let mut current = String::new();
    for (i, &c) in chars.iter().enumerate() {
        if !c.is_alphanumeric() {
            if !current.is_empty() {
                words.push(std::mem::take(&mut current));
            }
            continue;
        }
        if c.is_uppercase() && !current.is_empty() {
            let prev = chars[i - 1];
            let next_lower = chars.get(i + 1).is_some_and(|n| n.is_lowercase());
            // fooBar | HTTPServer (split before the S) | Label2Text
            if prev.is_lowercase() || prev.is_numeric() || (prev.is_uppercase() && next_lower) {
                words.push(std::mem::take(&mut current));
            }
        }
        current.push(c);
    }
    if !current.is_empty() {
        words.push(current);
    }
    words
}

#[cfg(test)]
mod tests {
    use super::*;

    fn syllables(id: &str) -> Vec<String> {
        WordCase
            .parse(id)
            .map(|f| f.syllables().iter().map(|s| s.to_string()).collect())
            .unwrap_or_default()
    }

    #[test]
    fn snake_and_pascal_agree() {
        assert_eq!(syllables("my_property"), vec!["my", "property"]);
        assert_eq!(syllables("MyProperty"), vec!["my", "property"]);
        assert_eq!(syllables("myProperty"), vec!["my", "property"]);
    }

    #[test]
    fn acronyms_and_digits() {
        assert_eq!(syllables("HTTPServer"), vec!["http", "server"]);
        assert_eq!(syllables("label2Text"), vec!["label2", "text"]);
        assert_eq!(syllables("on-click"), vec!["on", "click"]);
    }

    #[test]
    fn empty_identifiers() {
        assert!(WordCase.parse("").is_none());
        assert!(WordCase.parse("__").is_none());
    }

    #[test]
    fn dotted_paths() {
        let p = WordCase.parse_path("Control.Label").expect("path");
        assert_eq!(p.depth(), 2);
        assert_eq!(p, WordCase.parse_path("control_label").expect("path"));
        assert!(WordCase.parse_path("..").is_none());
    }
}
