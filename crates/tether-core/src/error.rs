#![forbid(unsafe_code)]

//! Error types shared across the workspace.
//!
//! # Failure Modes
//!
//! | Failure | Cause | Behavior |
//! |---------|-------|----------|
//! | Unresolved adaptee | Adapter declares no adaptee type | `register` fails, nothing inserted |
//! | Missing capability | Adapter cannot produce the required capability | `register` fails, nothing inserted |
//! | Disposed object | Mutating a disposed valve or session | `ObjectDisposedError` |
//! | Attachment mismatch | Object type does not fit a member | `false`, not an error |
//! | Collected object | Weak reference no longer upgrades | Pruned silently |

use std::fmt;

/// Why an adapter could not be registered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdapterResolutionReason {
    /// The adapter does not declare the type it adapts.
    UnresolvedAdaptee,
    /// The adapter does not provide the capability the registry requires.
    MissingCapability,
}

/// Registration of an adapter failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdapterResolutionError {
    /// Name of the offending adapter.
    pub adapter: &'static str,
    pub reason: AdapterResolutionReason,
}

impl AdapterResolutionError {
    #[must_use]
    pub fn new(adapter: &'static str, reason: AdapterResolutionReason) -> Self {
        Self { adapter, reason }
    }
}

impl fmt::Display for AdapterResolutionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.reason {
            AdapterResolutionReason::UnresolvedAdaptee => {
                write!(f, "adapter '{}' does not declare an adaptee type", self.adapter)
            }
            AdapterResolutionReason::MissingCapability => write!(
                f,
                "adapter '{}' does not provide the required adapter capability",
                self.adapter
            ),
        }
    }
}

impl std::error::Error for AdapterResolutionError {}

/// A mutating operation was attempted on a disposed object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectDisposedError {
    /// What was disposed (for example `"valve Control.Label"`).
    pub object: String,
}

impl ObjectDisposedError {
    #[must_use]
    pub fn new(object: impl Into<String>) -> Self {
        Self {
            object: object.into(),
        }
    }
}

impl fmt::Display for ObjectDisposedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cannot use disposed {}", self.object)
    }
}

impl std::error::Error for ObjectDisposedError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_messages() {
        let e = AdapterResolutionError::new("Foo", AdapterResolutionReason::UnresolvedAdaptee);
        assert_eq!(e.to_string(), "adapter 'Foo' does not declare an adaptee type");
        let e = AdapterResolutionError::new("Foo", AdapterResolutionReason::MissingCapability);
        assert!(e.to_string().contains("capability"));
        let e = ObjectDisposedError::new("valve MyProperty");
        assert_eq!(e.to_string(), "cannot use disposed valve MyProperty");
    }
}
