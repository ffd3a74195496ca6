//! # Antigravity Cockpit Core
//!
//! Keeps Antigravity model quotas warm: watches per-model reset timestamps and
//! fires a tiny keep-alive prompt right after each reset, so the next quota
//! window starts counting as early as possible.
//!
//! ## Architecture
//!
//! ```text
//! cockpit-core/src/
//! ├── trigger/              # Auto-trigger engine
//! │   ├── decision.rs       # reset dedup + cooldown watermarks
//! │   ├── dispatcher.rs     # bounded keep-alive worker pool
//! │   ├── orchestrator.rs   # one reset-detection pass over accounts/models
//! │   ├── fallback.rs       # one-shot fallback timer chain
//! │   ├── calendar/         # cron-style calendar scheduler
//! │   ├── mutation_queue.rs # FIFO account mutation lock
//! │   └── controller.rs     # wires everything, owns the schedule
//! ├── modules/              # File-backed stores (accounts, state, catalog cache)
//! └── utils/                # HTTP client construction
//! ```

#![allow(
    clippy::significant_drop_tightening,
    reason = "Mutex guards in async code are scoped explicitly"
)]
#![allow(clippy::map_err_ignore, reason = "Error context is provided in the replacement message")]
#![cfg_attr(
    test,
    allow(clippy::panic, clippy::unwrap_used, clippy::float_cmp, clippy::indexing_slicing)
)]

pub mod error;
pub mod models;
pub mod modules;
pub mod trigger;
pub mod utils;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use error::{AppError, AppResult};
pub use trigger::{AutoTriggerController, ControllerDeps, CockpitSnapshot};
