#![forbid(unsafe_code)]

//! A miniature view / view-model object model.
//!
//! ```text
//! View                         ViewModel
//! ├── my_property: String      ├── my_property: String
//! ├── control: any object ───► ├── control: VmControl
//! │     Label   { label }      │     VmControl { label, text }
//! │     TextBox { text }       │
//! ├── clicked (event)          ├── clicked (handler, counts calls)
//! └── title (read-only)        └── title (read-only)
//! ```
//!
//! The view's `control` accepts any object, so swapping a [`Label`] for a
//! [`TextBox`] changes which nested groups can form against the
//! view-model's [`VmControl`].

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tether_core::{AnyLink, Link, Signature};
use tether_runtime::{EventChannel, Observable, Scanner, TableScanner, TypeTable};

#[derive(Debug)]
pub struct Label {
    pub label: Observable<String>,
}

impl Label {
    #[must_use]
    pub fn new(label: &str) -> Arc<Self> {
        Arc::new(Self {
            label: Observable::new(label.to_string()),
        })
    }
}

#[derive(Debug)]
pub struct TextBox {
    pub text: Observable<String>,
}

impl TextBox {
    #[must_use]
    pub fn new(text: &str) -> Arc<Self> {
        Arc::new(Self {
            text: Observable::new(text.to_string()),
        })
    }
}

/// View-model side of a control: exposes both a label and a text.
#[derive(Debug)]
pub struct VmControl {
    pub label: Observable<String>,
    pub text: Observable<String>,
}

impl VmControl {
    #[must_use]
    pub fn new(label: &str, text: &str) -> Arc<Self> {
        Arc::new(Self {
            label: Observable::new(label.to_string()),
            text: Observable::new(text.to_string()),
        })
    }
}

#[derive(Debug)]
pub struct View {
    pub my_property: Observable<String>,
    pub control: Observable<AnyLink>,
    pub clicked: EventChannel,
    pub title: Observable<String>,
}

impl View {
    #[must_use]
    pub fn new(my_property: &str) -> Arc<Self> {
        Arc::new(Self {
            my_property: Observable::new(my_property.to_string()),
            control: Observable::new(AnyLink::none()),
            clicked: EventChannel::new(Signature::default()),
            title: Observable::new(String::new()),
        })
    }

    /// A view whose control is a [`Label`].
    #[must_use]
    pub fn with_label(my_property: &str, label: &str) -> Arc<Self> {
        let view = Self::new(my_property);
        view.control.set(AnyLink::new(Label::new(label)));
        view
    }

    /// Current control as `T`, if it is one.
    #[must_use]
    pub fn control_as<T: std::any::Any + Send + Sync>(&self) -> Option<Arc<T>> {
        self.control.get().downcast::<T>()
    }
}

#[derive(Debug)]
pub struct ViewModel {
    pub my_property: Observable<String>,
    pub control: Observable<Link<VmControl>>,
    pub title: Observable<String>,
    clicks: AtomicUsize,
}

impl ViewModel {
    #[must_use]
    pub fn new(my_property: &str) -> Arc<Self> {
        Arc::new(Self {
            my_property: Observable::new(my_property.to_string()),
            control: Observable::new(Link::none()),
            title: Observable::new(String::new()),
            clicks: AtomicUsize::new(0),
        })
    }

    /// A view-model whose control is a fresh [`VmControl`].
    #[must_use]
    pub fn with_control(my_property: &str, label: &str, text: &str) -> Arc<Self> {
        let vm = Self::new(my_property);
        vm.control.set(Link::new(VmControl::new(label, text)));
        vm
    }

    /// Current control, if set.
    #[must_use]
    pub fn control(&self) -> Option<Arc<VmControl>> {
        self.control.get().get().cloned()
    }

    /// How many times the `clicked` handler ran.
    #[must_use]
    pub fn clicks(&self) -> usize {
        self.clicks.load(Ordering::SeqCst)
    }
}

/// Scanner covering every fixture type.
#[must_use]
pub fn fixture_scanner() -> TableScanner {
    TableScanner::new()
        .with(
            TypeTable::builder::<View>()
                .property("myProperty", |v: &View| &v.my_property)
                .property("control", |v: &View| &v.control)
                .event("clicked", Signature::default(), |v: &View| &v.clicked)
                .readonly("title", |v: &View| &v.title)
                .build(),
        )
        .with(
            TypeTable::builder::<ViewModel>()
                .property("my_property", |vm: &ViewModel| &vm.my_property)
                .property("control", |vm: &ViewModel| &vm.control)
                .handler("clicked", Signature::default(), |vm: &ViewModel, _| {
                    vm.clicks.fetch_add(1, Ordering::SeqCst);
                    true
                })
                .readonly("title", |vm: &ViewModel| &vm.title)
                .build(),
        )
        .with(
            TypeTable::builder::<Label>()
                .property("label", |l: &Label| &l.label)
                .build(),
        )
        .with(
            TypeTable::builder::<TextBox>()
                .property("text", |t: &TextBox| &t.text)
                .build(),
        )
        .with(
            TypeTable::builder::<VmControl>()
                .property("label", |c: &VmControl| &c.label)
                .property("text", |c: &VmControl| &c.text)
                .build(),
        )
}

/// [`fixture_scanner`] behind the trait object the binder takes.
#[must_use]
pub fn shared_scanner() -> Arc<dyn Scanner> {
    Arc::new(fixture_scanner())
}
