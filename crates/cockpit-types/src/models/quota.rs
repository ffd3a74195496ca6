//! Quota snapshot models.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Live quota for one model of one account, as reported upstream.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ModelQuotaSnapshot {
    /// Display id, e.g. `gemini-3-pro-high`
    pub id: String,
    /// Internal model constant, e.g. `MODEL_PLACEHOLDER_M8`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_constant: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    /// Remaining fraction (0.0-1.0)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remaining_fraction: Option<f64>,
    /// ISO-8601 reset instant
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reset_time: Option<String>,
}

impl ModelQuotaSnapshot {
    /// Models may be addressed by display id or by model constant.
    pub fn matches(&self, identifier: &str) -> bool {
        self.id == identifier || self.model_constant.as_deref() == Some(identifier)
    }

    /// Identifier used for dedup bookkeeping: the model constant when known.
    pub fn tracking_id(&self) -> &str {
        self.model_constant.as_deref().unwrap_or(&self.id)
    }

    /// Remaining quota as a percentage (0-100).
    pub fn remaining_percent(&self) -> Option<f64> {
        self.remaining_fraction.map(|f| f * 100.0)
    }

    /// A model is resettable only when both the fraction and the reset instant are known.
    pub fn has_reset_data(&self) -> bool {
        self.remaining_fraction.is_some()
            && self.reset_time.as_deref().is_some_and(|t| !t.is_empty())
    }

    pub fn label(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.id)
    }
}

/// The (account, model) identity used for dedup and cooldown tracking.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TrackedKey {
    pub email: String,
    pub model: String,
}

impl TrackedKey {
    pub fn new(email: impl Into<String>, model: impl Into<String>) -> Self {
        Self { email: email.into(), model: model.into() }
    }
}

impl fmt::Display for TrackedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.email, self.model)
    }
}
