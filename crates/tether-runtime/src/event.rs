#![forbid(unsafe_code)]

//! Payload broadcaster for host occurrences (clicks, submissions, ...).
//!
//! An [`EventChannel`] is the occurrence counterpart of
//! [`Observable`](crate::observable::Observable): it retains no value,
//! every `emit` reaches every live subscriber, and subscribers are held
//! weakly behind [`Subscription`] guards.

use std::fmt;
use std::sync::{Arc, Mutex};

use tether_core::{Payload, Signature};

use crate::observable::{Subscribers, Subscription, lock};

/// A multi-subscriber payload broadcaster.
#[derive(Clone)]
pub struct EventChannel {
    signature: Signature,
    subscribers: Arc<Mutex<Subscribers<Payload>>>,
}

impl fmt::Debug for EventChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventChannel")
            .field("signature", &self.signature)
            .field("subscriber_count", &lock(&self.subscribers).len())
            .finish()
    }
}

impl EventChannel {
    /// Channel whose payloads follow `signature`.
    #[must_use]
    pub fn new(signature: Signature) -> Self {
        Self {
            signature,
            subscribers: Arc::new(Mutex::new(Subscribers::new())),
        }
    }

    /// Declared payload signature.
    #[must_use]
    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    /// Broadcast `payload` to every live subscriber. Returns how many were
    /// invoked.
    pub fn emit(&self, payload: Payload) -> usize {
        let callbacks = lock(&self.subscribers).live();
        for cb in &callbacks {
            cb(&payload);
        }
        callbacks.len()
    }

    /// Subscribe to broadcasts.
    pub fn subscribe(&self, callback: impl Fn(&Payload) + Send + Sync + 'static) -> Subscription {
        lock(&self.subscribers).add(callback)
    }
}
