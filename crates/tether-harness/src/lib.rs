#![forbid(unsafe_code)]

//! Test harness for Tether.
//!
//! - [`fixtures`]: a small view / view-model object model with a ready
//!   scanner, used by the integration suites.
//! - [`recorder`]: call counters and a JSONL change log for asserting on
//!   what propagation actually did.

pub mod fixtures;
pub mod recorder;

pub use fixtures::{Label, TextBox, View, ViewModel, VmControl, fixture_scanner, shared_scanner};
pub use recorder::{CallCounter, ChangeLog, ChangeRecord};
