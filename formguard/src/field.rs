//! Per-field validation wrapper.
//!
//! A [`FieldValidator`] owns one logical field: its rule set, its
//! valid/message state, and the last value it validated. Attaching it to a
//! [`ValidationRegistry`] yields a [`BoundField`] that reports every
//! validation outcome upward, so the registry's aggregate view stays current.

use std::future::Future;
use std::sync::{Arc, RwLock};

use futures::future::join_all;
use log::{debug, trace};

use crate::registry::{BoxFuture, Registration, ValidateCallback, ValidationRegistry};
use crate::result::FieldSnapshot;

/// Future returned by a single validation rule.
pub type RuleFuture = BoxFuture<'static, Result<(), String>>;

/// One validation rule.
///
/// Receives the value under validation, or `None` when the field has not
/// seen a value yet. Returns `Ok(())` on pass, or `Err(message)` with the
/// user-facing failure message.
pub type AsyncRule<V> = Arc<dyn Fn(Option<V>) -> RuleFuture + Send + Sync>;

struct FieldState<V> {
    is_valid: bool,
    message: Option<String>,
    last_value: Option<V>,
}

/// Validator for one logical field.
///
/// Cheap to clone; clones share the same state. Rules are opaque caller
/// closures, all run against the same value and all allowed to settle. When
/// several fail, the surfaced message is that of the first failing rule in
/// rule-list order, independent of settlement order.
///
/// # Example
///
/// ```ignore
/// let username = FieldValidator::new("username")
///     .rule(|v: Option<&String>| match v {
///         Some(v) if !v.is_empty() => Ok(()),
///         _ => Err("Username is required".into()),
///     })
///     .rule_async(|v: Option<String>| async move {
///         if is_available(v.as_deref().unwrap_or_default()).await {
///             Ok(())
///         } else {
///             Err("Username is taken".into())
///         }
///     });
///
/// let bound = username.attach(&registry);
/// bound.validate(Some("ada".to_string())).await?;
/// ```
pub struct FieldValidator<V> {
    id: String,
    rules: Vec<AsyncRule<V>>,
    validate_on_attach: bool,
    state: Arc<RwLock<FieldState<V>>>,
}

impl<V> Clone for FieldValidator<V> {
    fn clone(&self) -> Self {
        Self {
            id: self.id.clone(),
            rules: self.rules.clone(),
            validate_on_attach: self.validate_on_attach,
            state: Arc::clone(&self.state),
        }
    }
}

impl<V: Clone + Send + Sync + 'static> FieldValidator<V> {
    /// Create a validator for the field with the given id.
    ///
    /// The id must be unique within its form scope for the lifetime of the
    /// field's registration.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            rules: Vec::new(),
            validate_on_attach: false,
            state: Arc::new(RwLock::new(FieldState {
                is_valid: true,
                message: None,
                last_value: None,
            })),
        }
    }

    /// Seed the value that a no-argument [`validate`](Self::validate) call
    /// will run against before any value has been validated.
    pub fn initial_value(self, value: V) -> Self {
        self.with_state_mut(|state| state.last_value = Some(value));
        self
    }

    /// Add a synchronous validation rule.
    pub fn rule<F>(mut self, f: F) -> Self
    where
        F: Fn(Option<&V>) -> Result<(), String> + Send + Sync + 'static,
    {
        self.rules.push(Arc::new(move |value: Option<V>| -> RuleFuture {
            let result = f(value.as_ref());
            Box::pin(async move { result })
        }));
        self
    }

    /// Add an asynchronous validation rule.
    pub fn rule_async<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(Option<V>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), String>> + Send + 'static,
    {
        self.rules
            .push(Arc::new(move |value: Option<V>| -> RuleFuture { Box::pin(f(value)) }));
        self
    }

    /// Run an immediate validation when the field is attached to a registry.
    ///
    /// The initial validation is spawned on the tokio runtime, so
    /// [`attach`](Self::attach) must be called within one.
    pub fn validate_on_attach(mut self) -> Self {
        self.validate_on_attach = true;
        self
    }

    /// The field id.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Run every rule against `value`, or against the last validated value
    /// when called with `None`.
    ///
    /// All rules run concurrently and all settle; on failure the message of
    /// the first failing rule in list order is returned. Field state is
    /// updated either way, and the validated value is remembered for later
    /// no-argument calls.
    pub async fn validate(&self, value: Option<V>) -> Result<(), String> {
        let to_validate = match value {
            Some(value) => Some(value),
            None => self.with_state(|state| state.last_value.clone()),
        };

        let futures: Vec<RuleFuture> = self.rules.iter().map(|rule| rule(to_validate.clone())).collect();
        let results = join_all(futures).await;
        let failure = results.into_iter().find_map(Result::err);

        trace!(
            "field {:?} validated ({} rules, valid: {})",
            self.id,
            self.rules.len(),
            failure.is_none()
        );
        self.with_state_mut(|state| {
            state.is_valid = failure.is_none();
            state.message = failure.clone();
            state.last_value = to_validate;
        });

        match failure {
            Some(message) => Err(message),
            None => Ok(()),
        }
    }

    /// Reset to valid with no message, keeping the last validated value.
    pub fn clear(&self) {
        self.with_state_mut(|state| {
            state.is_valid = true;
            state.message = None;
        });
    }

    /// Whether the field passed its most recent validation.
    pub fn is_valid(&self) -> bool {
        self.with_state(|state| state.is_valid)
    }

    /// Message from the failing rule, if the field is invalid.
    pub fn message(&self) -> Option<String> {
        self.with_state(|state| state.message.clone())
    }

    /// Snapshot of the field's validation state.
    pub fn snapshot(&self) -> FieldSnapshot {
        self.with_state(|state| FieldSnapshot {
            is_valid: state.is_valid,
            message: state.message.clone(),
        })
    }

    /// Register this field with a registry.
    ///
    /// The registry's full-run trigger will re-validate the field's last
    /// value and report the outcome. The returned [`BoundField`] detaches on
    /// drop, so an unmounting field cleans itself up.
    pub fn attach(&self, registry: &ValidationRegistry) -> BoundField<V> {
        let callback: ValidateCallback = {
            let field = self.clone();
            let registry = registry.clone();
            Arc::new(move || -> BoxFuture<'static, ()> {
                let field = field.clone();
                let registry = registry.clone();
                Box::pin(async move {
                    let outcome = field.validate(None).await;
                    registry.report_status(field.id(), outcome.is_ok());
                })
            })
        };

        let registration = registry.register(self.id.clone(), Some(callback));
        debug!("field {:?} attached", self.id);

        if self.validate_on_attach {
            let field = self.clone();
            let registry = registry.clone();
            tokio::spawn(async move {
                let outcome = field.validate(None).await;
                registry.report_status(field.id(), outcome.is_ok());
            });
        }

        BoundField {
            field: self.clone(),
            registry: registry.clone(),
            registration: Some(registration),
        }
    }

    fn with_state<R>(&self, f: impl FnOnce(&FieldState<V>) -> R) -> R {
        let guard = self.state.read().unwrap_or_else(|poisoned| poisoned.into_inner());
        f(&guard)
    }

    fn with_state_mut<R>(&self, f: impl FnOnce(&mut FieldState<V>) -> R) -> R {
        let mut guard = self.state.write().unwrap_or_else(|poisoned| poisoned.into_inner());
        f(&mut guard)
    }
}

/// A field validator registered with a registry.
///
/// Dropping the bound field (or calling [`detach`](Self::detach)) removes
/// its registry entry and run callback.
pub struct BoundField<V> {
    field: FieldValidator<V>,
    registry: ValidationRegistry,
    registration: Option<Registration>,
}

impl<V: Clone + Send + Sync + 'static> BoundField<V> {
    /// Validate and report the outcome to the registry.
    ///
    /// Same semantics as [`FieldValidator::validate`], plus a
    /// `report_status` call with the boolean outcome. Rule failures never
    /// travel further than the returned message; the registry only sees the
    /// boolean.
    pub async fn validate(&self, value: Option<V>) -> Result<(), String> {
        let outcome = self.field.validate(value).await;
        self.registry.report_status(self.field.id(), outcome.is_ok());
        outcome
    }

    /// The wrapped field validator.
    pub fn field(&self) -> &FieldValidator<V> {
        &self.field
    }

    /// Deregister from the registry.
    pub fn detach(mut self) {
        self.dispose_registration();
    }
}

impl<V> BoundField<V> {
    fn dispose_registration(&mut self) {
        if let Some(registration) = self.registration.take() {
            registration.dispose();
        }
    }
}

impl<V> Drop for BoundField<V> {
    fn drop(&mut self) {
        self.dispose_registration();
    }
}
