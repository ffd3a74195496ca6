//! Trigger history records.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Whether a human or the scheduler initiated the trigger.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TriggerType {
    Manual,
    Auto,
}

/// Which path produced the trigger.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TriggerSource {
    Manual,
    Scheduled,
    Crontab,
    QuotaReset,
}

impl TriggerSource {
    pub const fn trigger_type(self) -> TriggerType {
        match self {
            Self::Manual => TriggerType::Manual,
            Self::Scheduled | Self::Crontab | Self::QuotaReset => TriggerType::Auto,
        }
    }
}

impl fmt::Display for TriggerSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::Manual => write!(f, "manual"),
            Self::Scheduled => write!(f, "scheduled"),
            Self::Crontab => write!(f, "crontab"),
            Self::QuotaReset => write!(f, "quota_reset"),
        }
    }
}

/// Token counts reported by the upstream for a reply.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct TokenUsage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
}

impl TokenUsage {
    pub fn accumulate(&mut self, other: &Self) {
        self.prompt_tokens = self.prompt_tokens.saturating_add(other.prompt_tokens);
        self.completion_tokens = self.completion_tokens.saturating_add(other.completion_tokens);
        self.total_tokens = self.total_tokens.saturating_add(other.total_tokens);
    }
}

/// One dispatched batch for one account. Never mutated after creation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TriggerRecord {
    pub id: String,
    /// Epoch milliseconds
    pub timestamp: i64,
    pub success: bool,
    /// Prompt sent plus the models it went to
    pub prompt: String,
    /// One line per model, successes first
    pub message: String,
    /// Wall clock of the whole batch
    pub duration_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_usage: Option<TokenUsage>,
    pub trigger_type: TriggerType,
    pub trigger_source: TriggerSource,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account_email: Option<String>,
}
