//! Tests for the shared validation registry.

use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use formguard::prelude::*;
use futures::FutureExt;

/// Callback that appends `name` to a shared log when invoked.
fn recording_callback(log: &Arc<Mutex<Vec<&'static str>>>, name: &'static str) -> ValidateCallback {
    let log = Arc::clone(log);
    Arc::new(move || -> BoxFuture<'static, ()> {
        let log = Arc::clone(&log);
        Box::pin(async move {
            log.lock().unwrap().push(name);
        })
    })
}

/// Callback that reports `is_valid` for `id` when invoked.
fn reporting_callback(registry: &ValidationRegistry, id: &'static str, is_valid: bool) -> ValidateCallback {
    let registry = registry.clone();
    Arc::new(move || -> BoxFuture<'static, ()> {
        let registry = registry.clone();
        Box::pin(async move {
            registry.report_status(id, is_valid);
        })
    })
}

#[test]
fn test_new_registry_is_empty_and_vacuously_valid() {
    let registry = ValidationRegistry::new();
    assert!(registry.validations().is_empty());
    assert!(registry.is_overall_valid());
    assert!(!registry.is_validating());
}

#[test]
fn test_register_inserts_optimistically_valid_entry() {
    let registry = ValidationRegistry::new();
    let _name = registry.register("name", None);

    let validations = registry.validations();
    assert_eq!(validations.len(), 1);
    assert_eq!(validations.get("name"), Some(&true));
    assert!(registry.is_overall_valid());
}

#[test]
fn test_report_status_flips_overall_validity() {
    let registry = ValidationRegistry::new();
    let _name = registry.register("name", None);
    let _email = registry.register("email", None);

    registry.report_status("email", false);
    assert!(!registry.is_overall_valid());
    assert_eq!(registry.validations().get("email"), Some(&false));

    registry.report_status("email", true);
    assert!(registry.is_overall_valid());
}

#[test]
fn test_report_status_upserts_unknown_id() {
    let registry = ValidationRegistry::new();
    registry.report_status("ghost", false);

    assert_eq!(registry.validations().get("ghost"), Some(&false));
    assert!(!registry.is_overall_valid());
}

#[test]
fn test_is_overall_valid_is_idempotent() {
    let registry = ValidationRegistry::new();
    let _name = registry.register("name", None);
    registry.report_status("name", false);

    let first = registry.is_overall_valid();
    assert_eq!(registry.is_overall_valid(), first);
    assert_eq!(registry.is_overall_valid(), first);
}

#[tokio::test]
async fn test_dispose_removes_table_entry_and_callback() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let registry = ValidationRegistry::new();

    let registration = registry.register("f", Some(recording_callback(&log, "f")));
    assert_eq!(registry.validations().len(), 1);

    registration.dispose();
    assert!(registry.validations().is_empty());

    let valid = registry.run_all().await.unwrap();
    assert!(valid);
    assert!(log.lock().unwrap().is_empty());
}

#[test]
fn test_dispose_is_idempotent() {
    let registry = ValidationRegistry::new();
    let a = registry.register("a", None);
    let _b = registry.register("b", None);

    a.dispose();
    a.dispose();

    let validations = registry.validations();
    assert_eq!(validations.len(), 1);
    assert!(validations.contains_key("b"));
}

#[test]
fn test_register_dispose_sequences_track_surviving_ids() {
    let registry = ValidationRegistry::new();
    let a = registry.register("a", None);
    let _b = registry.register("b", None);
    let c = registry.register("c", None);

    a.dispose();
    c.dispose();
    let _d = registry.register("d", None);

    let mut ids: Vec<String> = registry.validations().into_keys().collect();
    ids.sort();
    assert_eq!(ids, vec!["b".to_string(), "d".to_string()]);
}

#[tokio::test]
async fn test_deregister_removes_table_entry_only() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let registry = ValidationRegistry::new();
    let _a = registry.register("a", Some(recording_callback(&log, "a")));
    let _b = registry.register("b", None);

    let snapshot = registry.deregister("a");
    assert_eq!(snapshot.len(), 1);
    assert!(snapshot.contains_key("b"));
    assert!(!registry.validations().contains_key("a"));

    // The run callback stays behind; Registration::dispose is the path
    // that removes both.
    registry.run_all().await.unwrap();
    assert_eq!(*log.lock().unwrap(), vec!["a"]);
}

#[tokio::test]
async fn test_run_all_invokes_callbacks_in_registration_order() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let registry = ValidationRegistry::new();
    let _a = registry.register("a", Some(recording_callback(&log, "a")));
    let _b = registry.register("b", Some(recording_callback(&log, "b")));
    let _c = registry.register("c", Some(recording_callback(&log, "c")));

    registry.run_all().await.unwrap();

    assert_eq!(*log.lock().unwrap(), vec!["a", "b", "c"]);
}

#[tokio::test]
async fn test_run_all_returns_validity_computed_after_callbacks() {
    let registry = ValidationRegistry::new();
    let _x = registry.register("x", Some(reporting_callback(&registry, "x", false)));

    assert!(registry.is_overall_valid());
    let valid = registry.run_all().await.unwrap();
    assert!(!valid);
    assert!(!registry.is_overall_valid());
}

#[tokio::test]
async fn test_validating_flag_spans_exactly_one_run() {
    let registry = ValidationRegistry::new();
    let observed = Arc::new(Mutex::new(None));

    let callback: ValidateCallback = {
        let registry = registry.clone();
        let observed = Arc::clone(&observed);
        Arc::new(move || -> BoxFuture<'static, ()> {
            let registry = registry.clone();
            let observed = Arc::clone(&observed);
            Box::pin(async move {
                *observed.lock().unwrap() = Some(registry.is_validating());
            })
        })
    };
    let _f = registry.register("f", Some(callback));

    assert!(!registry.is_validating());
    registry.run_all().await.unwrap();
    assert_eq!(*observed.lock().unwrap(), Some(true));
    assert!(!registry.is_validating());
}

#[tokio::test]
async fn test_run_all_rejects_reentrant_run() {
    let registry = ValidationRegistry::new();
    let nested = Arc::new(Mutex::new(None));

    let callback: ValidateCallback = {
        let registry = registry.clone();
        let nested = Arc::clone(&nested);
        Arc::new(move || -> BoxFuture<'static, ()> {
            let registry = registry.clone();
            let nested = Arc::clone(&nested);
            Box::pin(async move {
                *nested.lock().unwrap() = Some(registry.run_all().await);
            })
        })
    };
    let _f = registry.register("f", Some(callback));

    let outer = registry.run_all().await;
    assert_eq!(outer, Ok(true));
    assert_eq!(*nested.lock().unwrap(), Some(Err(ValidateError::AlreadyRunning)));
    assert!(!registry.is_validating());
}

#[tokio::test]
async fn test_validating_flag_resets_after_callback_panic() {
    let registry = ValidationRegistry::new();
    let callback: ValidateCallback = Arc::new(move || -> BoxFuture<'static, ()> {
        Box::pin(async move {
            panic!("validator blew up");
        })
    });
    let _f = registry.register("boom", Some(callback));

    let result = AssertUnwindSafe(registry.run_all()).catch_unwind().await;
    assert!(result.is_err());
    assert!(!registry.is_validating());

    // The registry is still usable afterwards.
    assert_eq!(registry.validations().len(), 1);
}

#[tokio::test]
async fn test_dispose_mid_run_is_safe() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let registry = ValidationRegistry::new();
    let b_registration: Arc<Mutex<Option<Registration>>> = Arc::new(Mutex::new(None));

    let disposing_callback: ValidateCallback = {
        let log = Arc::clone(&log);
        let b_registration = Arc::clone(&b_registration);
        Arc::new(move || -> BoxFuture<'static, ()> {
            let log = Arc::clone(&log);
            let b_registration = Arc::clone(&b_registration);
            Box::pin(async move {
                log.lock().unwrap().push("a");
                if let Some(registration) = b_registration.lock().unwrap().take() {
                    registration.dispose();
                }
            })
        })
    };

    let _a = registry.register("a", Some(disposing_callback));
    let b = registry.register("b", Some(recording_callback(&log, "b")));
    *b_registration.lock().unwrap() = Some(b);

    registry.run_all().await.unwrap();

    // The run iterates its start-of-run snapshot, so b's callback still
    // fires, but b is gone from the table afterwards.
    assert_eq!(*log.lock().unwrap(), vec!["a", "b"]);
    let validations = registry.validations();
    assert_eq!(validations.len(), 1);
    assert!(validations.contains_key("a"));
}

#[tokio::test]
async fn test_reregistering_live_id_replaces_callback() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let registry = ValidationRegistry::new();
    let _first = registry.register("a", Some(recording_callback(&log, "first")));
    let _second = registry.register("a", Some(recording_callback(&log, "second")));

    registry.run_all().await.unwrap();

    assert_eq!(*log.lock().unwrap(), vec!["second"]);
    assert_eq!(registry.validations().len(), 1);
}

#[test]
fn test_change_listeners_fire_on_table_mutations() {
    let registry = ValidationRegistry::new();
    let notified = Arc::new(AtomicUsize::new(0));

    let _subscription = registry.subscribe({
        let notified = Arc::clone(&notified);
        Arc::new(move || {
            notified.fetch_add(1, Ordering::SeqCst);
        })
    });

    let registration = registry.register("a", None);
    assert_eq!(notified.load(Ordering::SeqCst), 1);

    registry.report_status("a", false);
    assert_eq!(notified.load(Ordering::SeqCst), 2);

    // Re-reporting the same value is a no-op for listeners.
    registry.report_status("a", false);
    assert_eq!(notified.load(Ordering::SeqCst), 2);

    registration.dispose();
    assert_eq!(notified.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_change_listeners_fire_once_after_run() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let registry = ValidationRegistry::new();
    let _a = registry.register("a", Some(recording_callback(&log, "a")));

    let notified = Arc::new(AtomicUsize::new(0));
    let _subscription = registry.subscribe({
        let notified = Arc::clone(&notified);
        Arc::new(move || {
            notified.fetch_add(1, Ordering::SeqCst);
        })
    });

    registry.run_all().await.unwrap();
    assert_eq!(notified.load(Ordering::SeqCst), 1);
}

#[test]
fn test_unsubscribe_stops_notifications() {
    let registry = ValidationRegistry::new();
    let notified = Arc::new(AtomicUsize::new(0));

    let subscription = registry.subscribe({
        let notified = Arc::clone(&notified);
        Arc::new(move || {
            notified.fetch_add(1, Ordering::SeqCst);
        })
    });

    let _a = registry.register("a", None);
    assert_eq!(notified.load(Ordering::SeqCst), 1);

    subscription.unsubscribe();
    subscription.unsubscribe();

    let _b = registry.register("b", None);
    assert_eq!(notified.load(Ordering::SeqCst), 1);
}
