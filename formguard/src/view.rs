//! Derived-view bindings over registry change notifications.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

use log::trace;

use crate::registry::{Subscription, ValidationRegistry};

/// A cached value derived from registry state, recomputed on every change
/// notification.
///
/// Typical use is mapping overall validity into consumer view data, such as
/// a submit button's enabled state:
///
/// ```ignore
/// let submit_enabled = ViewBinding::connect(&registry, |registry| {
///     registry.is_overall_valid() && !registry.is_validating()
/// });
///
/// if submit_enabled.get() {
///     registry.run_all().await?;
/// }
/// ```
///
/// Dropping the binding (or calling [`disconnect`](Self::disconnect))
/// unsubscribes it.
pub struct ViewBinding<T> {
    mapped: Arc<RwLock<T>>,
    dirty: Arc<AtomicBool>,
    subscription: Option<Subscription>,
}

impl<T: Clone + Send + Sync + 'static> ViewBinding<T> {
    /// Subscribe `map` to the registry's change channel.
    ///
    /// The mapped value is computed immediately and then recomputed on every
    /// notification. `map` receives the registry handle itself, so it can
    /// read aggregate validity or hold onto a clone for triggering runs.
    pub fn connect<F>(registry: &ValidationRegistry, map: F) -> Self
    where
        F: Fn(&ValidationRegistry) -> T + Send + Sync + 'static,
    {
        let mapped = Arc::new(RwLock::new(map(registry)));
        let dirty = Arc::new(AtomicBool::new(false));

        let subscription = registry.subscribe({
            let registry = registry.clone();
            let mapped = Arc::clone(&mapped);
            let dirty = Arc::clone(&dirty);
            Arc::new(move || {
                let value = map(&registry);
                if let Ok(mut guard) = mapped.write() {
                    *guard = value;
                }
                dirty.store(true, Ordering::SeqCst);
            })
        });
        trace!("view binding connected as {:?}", subscription.id());

        Self {
            mapped,
            dirty,
            subscription: Some(subscription),
        }
    }

    /// Get a clone of the current mapped value.
    pub fn get(&self) -> T {
        self.mapped
            .read()
            .map(|guard| guard.clone())
            .unwrap_or_else(|poisoned| poisoned.into_inner().clone())
    }

    /// Whether the mapped value changed since the last call; clears the flag.
    pub fn take_dirty(&self) -> bool {
        self.dirty.swap(false, Ordering::SeqCst)
    }

    /// Stop receiving notifications.
    pub fn disconnect(mut self) {
        self.drop_subscription();
    }
}

impl<T> ViewBinding<T> {
    fn drop_subscription(&mut self) {
        if let Some(subscription) = self.subscription.take() {
            subscription.unsubscribe();
        }
    }
}

impl<T> Drop for ViewBinding<T> {
    fn drop(&mut self) {
        self.drop_subscription();
    }
}
