//! Shared validation registry for one form scope.
//!
//! A [`ValidationRegistry`] tracks the last-reported validity of every field
//! registered in a form scope and fans a "run all validations" trigger out to
//! each field's async callback. Create one registry per form scope and pass
//! the handle explicitly to anything that needs it; handles are cheap clones
//! of the same underlying state.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use log::{debug, trace, warn};
use uuid::Uuid;

use crate::error::ValidateError;

/// Type alias for boxed futures used in async validation.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Callback invoked for one field during a full validation run.
///
/// Callbacks cannot fail by construction: a field wrapper catches its own
/// rule failures and converts them into a `report_status(id, false)` call
/// before returning.
pub type ValidateCallback = Arc<dyn Fn() -> BoxFuture<'static, ()> + Send + Sync>;

/// Listener invoked whenever registry state changes.
pub type ChangeListener = Arc<dyn Fn() + Send + Sync>;

/// Unique key for one change-listener subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(Uuid);

impl SubscriptionId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Get the underlying UUID.
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

struct RegistryInner {
    /// Field id -> last-reported validity. Fields start out valid.
    table: HashMap<String, bool>,

    /// Validation fan-out callbacks in registration order, keyed by field id.
    /// `run_all` invokes these sequentially; removal is by id, so entries are
    /// immune to index shift from other additions or removals.
    run_subscribers: Vec<(String, ValidateCallback)>,

    /// State-changed notification channel, independent of validation fan-out.
    change_listeners: Vec<(SubscriptionId, ChangeListener)>,
}

/// Shared aggregator of per-field validity for one form scope.
///
/// The registry tracks:
/// - every registered field's last-reported validity (fields start valid)
/// - each field's validation callback, in registration order
/// - change listeners that fire when the registry's state changes
/// - whether a full validation run is currently in flight
pub struct ValidationRegistry {
    inner: Arc<RwLock<RegistryInner>>,
    validating: Arc<AtomicBool>,
}

impl ValidationRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(RegistryInner {
                table: HashMap::new(),
                run_subscribers: Vec::new(),
                change_listeners: Vec::new(),
            })),
            validating: Arc::new(AtomicBool::new(false)),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, RegistryInner> {
        self.inner.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, RegistryInner> {
        self.inner.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Register a field, optimistically valid until a status is reported.
    ///
    /// If `callback` is given it joins the validation fan-out and will be
    /// invoked on every [`run_all`](Self::run_all). Registering an id that is
    /// already live replaces its existing callback in place (the field keeps
    /// its position in the run order) rather than stacking a second one.
    ///
    /// Returns a [`Registration`] whose [`dispose`](Registration::dispose)
    /// removes both the table entry and the callback.
    pub fn register(&self, id: impl Into<String>, callback: Option<ValidateCallback>) -> Registration {
        let id = id.into();
        {
            let mut inner = self.write();
            if inner.table.insert(id.clone(), true).is_some() {
                warn!("field {:?} registered twice without dispose; replacing its callback", id);
            }
            if let Some(callback) = callback {
                if let Some(slot) = inner.run_subscribers.iter_mut().find(|(sid, _)| *sid == id) {
                    slot.1 = callback;
                } else {
                    inner.run_subscribers.push((id.clone(), callback));
                }
            }
            debug!(
                "registered field {:?} ({} fields, {} run subscribers)",
                id,
                inner.table.len(),
                inner.run_subscribers.len()
            );
        }
        self.notify_change();

        Registration {
            registry: self.clone(),
            id,
            disposed: AtomicBool::new(false),
        }
    }

    /// Remove `id` from the validity table and return the resulting snapshot.
    ///
    /// This is the primitive composed by [`Registration::dispose`], which is
    /// the sanctioned removal path: `deregister` alone leaves the field's
    /// run callback (if any) in place.
    pub fn deregister(&self, id: &str) -> HashMap<String, bool> {
        let (removed, snapshot) = {
            let mut inner = self.write();
            let removed = inner.table.remove(id).is_some();
            (removed, inner.table.clone())
        };
        if removed {
            trace!("deregistered field {:?}", id);
            self.notify_change();
        }
        snapshot
    }

    /// Record the validity of one field.
    ///
    /// Upserts: reporting for an id that was never registered creates a table
    /// entry. Change listeners are notified only when the stored value
    /// actually changes.
    pub fn report_status(&self, id: &str, is_valid: bool) {
        let changed = {
            let mut inner = self.write();
            inner.table.insert(id.to_string(), is_valid) != Some(is_valid)
        };
        if changed {
            trace!("field {:?} reported valid: {}", id, is_valid);
            self.notify_change();
        }
    }

    /// Whether every registered field is currently valid.
    ///
    /// An empty registry is vacuously valid.
    pub fn is_overall_valid(&self) -> bool {
        self.read().table.values().all(|valid| *valid)
    }

    /// Whether a full validation run is currently in flight.
    pub fn is_validating(&self) -> bool {
        self.validating.load(Ordering::SeqCst)
    }

    /// Snapshot of the validity table (field id -> last-reported validity).
    pub fn validations(&self) -> HashMap<String, bool> {
        self.read().table.clone()
    }

    /// Subscribe to state-change notifications.
    ///
    /// Listeners fire after registration, disposal, an effective status
    /// change, and at the end of each full validation run. They are invoked
    /// outside the registry's internal lock, so a listener may call back into
    /// the registry freely.
    pub fn subscribe(&self, listener: ChangeListener) -> Subscription {
        let id = SubscriptionId::new();
        self.write().change_listeners.push((id, listener));
        trace!("change listener {:?} subscribed", id);

        Subscription {
            registry: self.clone(),
            id,
            removed: AtomicBool::new(false),
        }
    }

    /// Run every registered field's validation callback and report overall
    /// validity once all of them have settled.
    ///
    /// Callbacks run strictly sequentially, in registration order, each one
    /// awaited fully before the next starts. The callback list is snapshotted
    /// up front, so registering or disposing fields mid-run never perturbs
    /// the iteration. Returns [`ValidateError::AlreadyRunning`] if a run is
    /// already in flight on this registry; the in-flight run is unaffected.
    pub async fn run_all(&self) -> Result<bool, ValidateError> {
        if self
            .validating
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            warn!("run_all called while a validation run is in flight");
            return Err(ValidateError::AlreadyRunning);
        }
        // Resets the flag on every exit path, including unwind and
        // cancellation of this future.
        let guard = RunGuard {
            flag: Arc::clone(&self.validating),
        };

        let callbacks: Vec<(String, ValidateCallback)> = self
            .read()
            .run_subscribers
            .iter()
            .map(|(id, callback)| (id.clone(), Arc::clone(callback)))
            .collect();
        debug!("validation run started ({} subscribers)", callbacks.len());

        for (id, callback) in &callbacks {
            trace!("validating field {:?}", id);
            callback().await;
        }

        // Listeners notified below must observe is_validating() == false.
        drop(guard);

        let valid = self.is_overall_valid();
        debug!("validation run finished (overall valid: {})", valid);
        self.notify_change();

        Ok(valid)
    }

    /// Invoke every change listener, outside the inner lock.
    fn notify_change(&self) {
        let listeners: Vec<ChangeListener> = self
            .read()
            .change_listeners
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();
        for listener in listeners {
            listener();
        }
    }
}

impl Default for ValidationRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for ValidationRegistry {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            validating: Arc::clone(&self.validating),
        }
    }
}

/// Disposer handle returned by [`ValidationRegistry::register`].
///
/// Holding one keeps nothing alive; disposal is explicit so that the handle
/// can be stored wherever the owning field lives.
pub struct Registration {
    registry: ValidationRegistry,
    id: String,
    disposed: AtomicBool,
}

impl Registration {
    /// The registered field id.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Remove the field's run callback and table entry.
    ///
    /// Idempotent: later calls are no-ops.
    pub fn dispose(&self) {
        if self.disposed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.registry
            .write()
            .run_subscribers
            .retain(|(sid, _)| sid != &self.id);
        self.registry.deregister(&self.id);
        debug!("disposed field {:?}", self.id);
    }
}

/// Handle for one change-listener subscription.
pub struct Subscription {
    registry: ValidationRegistry,
    id: SubscriptionId,
    removed: AtomicBool,
}

impl Subscription {
    /// The subscription's key.
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Remove the listener. Idempotent.
    pub fn unsubscribe(&self) {
        if self.removed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.registry
            .write()
            .change_listeners
            .retain(|(sid, _)| *sid != self.id);
        trace!("change listener {:?} unsubscribed", self.id);
    }
}

struct RunGuard {
    flag: Arc<AtomicBool>,
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}
