//! Read-only snapshots of per-field validation state.

/// Snapshot of one field's validation state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSnapshot {
    /// Whether the field passed its most recent validation.
    pub is_valid: bool,
    /// Message from the failing rule, if the field is invalid.
    pub message: Option<String>,
}

impl FieldSnapshot {
    /// Get the failure message (if any).
    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }
}

impl Default for FieldSnapshot {
    fn default() -> Self {
        // Fields are optimistically valid until a rule says otherwise.
        Self {
            is_valid: true,
            message: None,
        }
    }
}
