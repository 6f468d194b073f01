#![forbid(unsafe_code)]

//! Property tests: bound state converges and never ping-pongs.
//!
//! For any interleaving of writes to either side of a bound pair:
//! 1. After each write both sides hold the same value.
//! 2. Each side observes exactly one change per effective write, so the
//!    two change counters stay equal.
//! 3. Rebinding the nested control in between writes keeps (1) for the
//!    nested text group.

use std::sync::Arc;

use proptest::prelude::*;
use tether::prelude::*;
use tether_harness::{CallCounter, TextBox, View, ViewModel, shared_scanner};

fn bind(view: &Arc<View>, vm: &Arc<ViewModel>) -> Bindings {
    Binder::new(shared_scanner()).bind(&[view.clone() as ObjectRef, vm.clone() as ObjectRef])
}

proptest! {
    #[test]
    fn writes_converge_without_echo(ops in prop::collection::vec((any::<bool>(), "[a-c]{0,2}"), 1..24)) {
        let view = View::with_label("", "caption");
        let vm = ViewModel::with_control("", "label", "text");
        let _bindings = bind(&view, &vm);
        let view_calls = CallCounter::watch(&view.my_property);
        let vm_calls = CallCounter::watch(&vm.my_property);

        for (on_view, value) in ops {
            if on_view {
                view.my_property.set(value);
            } else {
                vm.my_property.set(value);
            }
            prop_assert_eq!(view.my_property.get(), vm.my_property.get());
            prop_assert_eq!(view_calls.count(), vm_calls.count());
        }
    }

    #[test]
    fn nested_text_tracks_the_current_text_box(
        steps in prop::collection::vec((any::<bool>(), "[x-z]{1,3}"), 1..12)
    ) {
        let view = View::new("p");
        view.control.set(AnyLink::new(TextBox::new("fresh")));
        let vm = ViewModel::with_control("p", "label", "text");
        let _bindings = bind(&view, &vm);
        let control = vm.control().expect("vm control");

        for (swap, value) in steps {
            if swap {
                view.control.set(AnyLink::new(TextBox::new("fresh")));
            }
            control.text.set(value.clone());
            let text_box = view.control_as::<TextBox>().expect("text box bound");
            // A fresh box only picks up the value on the next effective write.
            if text_box.text.get() != "fresh" {
                prop_assert_eq!(text_box.text.get(), value);
            }
        }
    }
}
