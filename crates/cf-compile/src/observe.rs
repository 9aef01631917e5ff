//! Host-side listeners for observed expressions.
//!
//! The executor streams [`ValueUpdate`]s for every observed channel of a
//! running network. A [`ListenerHub`] fans each update out to the callbacks
//! registered on its channel. A failing callback never stops delivery: its
//! error (or panic) is wrapped into a [`ListenerException`] and handed to the
//! hub's exception handler.

use std::collections::BTreeMap;
use std::error::Error as StdError;
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::Receiver;

use cf_core::{ExprId, Value};
use thiserror::Error;
use tracing::warn;

use crate::compiled::CompiledNet;
use crate::error::{CompileResult, MappingError};

/// New value of an observed channel.
#[derive(Debug, Clone, PartialEq)]
pub struct ValueUpdate {
    pub channel: String,
    pub value: Value,
}

impl ValueUpdate {
    pub fn new(channel: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            channel: channel.into(),
            value: value.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionHandle(u64);

/// A listener callback failed while handling an update.
#[derive(Debug, Clone, Error, PartialEq)]
#[error("Listener {handle:?} on '{channel}' failed: {message}")]
pub struct ListenerException {
    pub handle: SubscriptionHandle,
    pub channel: String,
    pub message: String,
}

/// Error type listener callbacks may return.
pub type ListenerError = Box<dyn StdError + Send + Sync>;

type Callback = Box<dyn FnMut(&Value) -> Result<(), ListenerError> + Send>;
type ExceptionHandler = Box<dyn FnMut(ListenerException) + Send>;

struct Listener {
    channel: String,
    callback: Callback,
}

/// Registry of listeners on the observed channels of one compiled network.
pub struct ListenerHub {
    channels: BTreeMap<ExprId, String>,
    listeners: BTreeMap<SubscriptionHandle, Listener>,
    next: u64,
    on_exception: ExceptionHandler,
}

impl ListenerHub {
    /// Hub for the observed expressions of `net`. Listener failures are
    /// passed to `on_exception`.
    pub fn new(net: &CompiledNet, on_exception: impl FnMut(ListenerException) + Send + 'static) -> Self {
        Self {
            channels: net
                .observed()
                .map(|(id, ch)| (id, ch.to_string()))
                .collect(),
            listeners: BTreeMap::new(),
            next: 0,
            on_exception: Box::new(on_exception),
        }
    }

    /// Call `callback` with every new value of `node`.
    pub fn observe<F>(&mut self, node: ExprId, callback: F) -> CompileResult<SubscriptionHandle>
    where
        F: FnMut(&Value) -> Result<(), ListenerError> + Send + 'static,
    {
        let channel = self.channels.get(&node).cloned().ok_or_else(|| {
            MappingError::constraint(format!("expression {node} is not observed by this network"))
        })?;
        let handle = SubscriptionHandle(self.next);
        self.next += 1;
        self.listeners.insert(
            handle,
            Listener {
                channel,
                callback: Box::new(callback),
            },
        );
        Ok(handle)
    }

    /// Remove a listener. Returns false if it was already removed.
    pub fn unobserve(&mut self, handle: SubscriptionHandle) -> bool {
        self.listeners.remove(&handle).is_some()
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    /// Invoke every listener on the update's channel once, in subscription
    /// order. Returns the number of listeners invoked.
    pub fn deliver(&mut self, update: &ValueUpdate) -> usize {
        let mut invoked = 0;
        for (handle, listener) in self.listeners.iter_mut() {
            if listener.channel != update.channel {
                continue;
            }
            invoked += 1;
            let callback = &mut listener.callback;
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| callback(&update.value)));
            let message = match outcome {
                Ok(Ok(())) => continue,
                Ok(Err(e)) => e.to_string(),
                Err(payload) => panic_message(payload.as_ref()),
            };
            warn!(channel = %update.channel, %message, "listener failed");
            (self.on_exception)(ListenerException {
                handle: *handle,
                channel: update.channel.clone(),
                message,
            });
        }
        invoked
    }

    /// Deliver every update already queued on `updates`, in arrival order.
    pub fn pump(&mut self, updates: &Receiver<ValueUpdate>) -> usize {
        let mut delivered = 0;
        for update in updates.try_iter() {
            self.deliver(&update);
            delivered += 1;
        }
        delivered
    }
}

impl core::fmt::Debug for ListenerHub {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ListenerHub")
            .field("channels", &self.channels)
            .field("listeners", &self.listeners.len())
            .finish_non_exhaustive()
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("panicked: {s}")
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("panicked: {s}")
    } else {
        "panicked".to_string()
    }
}
