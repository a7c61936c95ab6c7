//! Operational error log entry.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Account-agnostic record of an infrastructure failure, kept for
/// operational review. Never exposed through the status vocabulary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorRecord {
    pub error_id: Uuid,
    /// Operation that hit the failure, e.g. "register/send_confirmation".
    pub source: String,
    pub message: String,
    pub detail: Option<String>,
    pub created_utc: DateTime<Utc>,
}

impl ErrorRecord {
    pub fn new(source: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error_id: Uuid::new_v4(),
            source: source.into(),
            message: message.into(),
            detail: None,
            created_utc: Utc::now(),
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}
