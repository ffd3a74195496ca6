//! # Cockpit Types
//!
//! Core types, models, and error definitions for Antigravity Cockpit.
//!
//! This crate provides the foundational type system for the auto-trigger engine:
//!
//! - **`error`** - Typed error hierarchy for accounts, schedules, and dispatch
//! - **`models`** - Domain models (Account, ScheduleConfig, TriggerRecord, quota snapshots)
//!
//! ## Architecture Role
//!
//! `cockpit-types` sits at the bottom of the dependency graph:
//!
//! ```text
//!        cockpit-types (this crate)
//!                │
//!                ▼
//!          cockpit-core
//!                │
//!                ▼
//!         cockpit-server
//! ```
//!
//! All types are designed to be:
//! - **Serializable** via serde for API/persistence
//! - **Clone** for cheap sharing across async boundaries
//! - **PartialEq** for testing and comparison

pub mod error;
pub mod models;

// Re-export error types for convenience
pub use error::{AccountError, DispatchError, Result, ScheduleError, TypedError};

// Re-export core model types
pub use models::{
    Account, AccountIndex, AccountSelection, AccountSummary, ModelQuotaSnapshot, RepeatMode,
    ScheduleConfig, ScheduleMode, TokenData, TokenState, TokenStatus, TokenUsage, TrackedKey,
    TriggerRecord, TriggerSource, TriggerType,
};
