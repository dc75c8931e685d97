//! Signup Form Example
//!
//! Wires three fields to a shared registry:
//! - username: required, plus a simulated async uniqueness check
//! - email: must contain an '@'
//! - terms: must be accepted
//!
//! A view binding derives the submit button's enabled state from overall
//! validity, and `run_all` re-validates everything before "submission".

use std::fs::File;
use std::time::Duration;

use formguard::prelude::*;
use simplelog::{Config, LevelFilter, WriteLogger};

async fn username_is_available(username: &str) -> bool {
    // Stand-in for a backend lookup.
    tokio::time::sleep(Duration::from_millis(50)).await;
    username != "admin"
}

#[tokio::main]
async fn main() -> Result<(), ValidateError> {
    WriteLogger::init(
        LevelFilter::Debug,
        Config::default(),
        File::create("signup_form.log").expect("failed to create log file"),
    )
    .expect("failed to init logger");

    let registry = ValidationRegistry::new();

    let username = FieldValidator::new("username")
        .rule(|v: Option<&String>| match v {
            Some(v) if !v.trim().is_empty() => Ok(()),
            _ => Err("Username is required".to_string()),
        })
        .rule_async(|v: Option<String>| async move {
            let username = v.unwrap_or_default();
            if username_is_available(&username).await {
                Ok(())
            } else {
                Err("Username is taken".to_string())
            }
        })
        .attach(&registry);

    let email = FieldValidator::new("email")
        .rule(|v: Option<&String>| match v {
            Some(v) if v.contains('@') => Ok(()),
            _ => Err("Please enter a valid email".to_string()),
        })
        .attach(&registry);

    let terms = FieldValidator::new("terms")
        .rule(|v: Option<&bool>| {
            if v.copied().unwrap_or(false) {
                Ok(())
            } else {
                Err("You must accept the terms".to_string())
            }
        })
        .attach(&registry);

    let submit_enabled = ViewBinding::connect(&registry, |registry| {
        registry.is_overall_valid() && !registry.is_validating()
    });

    // Simulated user input, one field at a time.
    if let Err(message) = username.validate(Some("admin".to_string())).await {
        println!("username: {message}");
    }
    println!("submit enabled: {}", submit_enabled.get());

    username.validate(Some("ada".to_string())).await.ok();
    email.validate(Some("ada@example.com".to_string())).await.ok();
    terms.validate(Some(true)).await.ok();
    println!("submit enabled: {}", submit_enabled.get());

    // Final re-validation of every field before submitting.
    let all_valid = registry.run_all().await?;
    println!("overall valid after full run: {all_valid}");

    for (field, valid) in registry.validations() {
        println!("  {field}: {}", if valid { "ok" } else { "invalid" });
    }

    Ok(())
}
