//! Form-validation coordination for component-tree UIs.
//!
//! Each field registers an async validator with a shared
//! [`ValidationRegistry`]; the registry aggregates per-field validity into a
//! single overall-valid signal and notifies subscribers when any field's
//! status changes. One registry per logical form scope, passed explicitly to
//! whatever needs it.
//!
//! # Example
//!
//! ```ignore
//! use formguard::prelude::*;
//!
//! let registry = ValidationRegistry::new();
//!
//! let username = FieldValidator::new("username")
//!     .rule(|v: Option<&String>| match v {
//!         Some(v) if !v.is_empty() => Ok(()),
//!         _ => Err("Username is required".into()),
//!     })
//!     .attach(&registry);
//!
//! let submit_enabled = ViewBinding::connect(&registry, |r| r.is_overall_valid());
//!
//! username.validate(Some("ada".to_string())).await?;
//! let all_valid = registry.run_all().await?;
//! ```

pub mod error;
pub mod field;
pub mod registry;
pub mod result;
pub mod view;

pub use registry::ValidationRegistry;

pub mod prelude {
    pub use crate::error::ValidateError;
    pub use crate::field::{AsyncRule, BoundField, FieldValidator, RuleFuture};
    pub use crate::registry::{
        BoxFuture, ChangeListener, Registration, Subscription, SubscriptionId, ValidateCallback,
        ValidationRegistry,
    };
    pub use crate::result::FieldSnapshot;
    pub use crate::view::ViewBinding;
}
