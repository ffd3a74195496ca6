//! Auto-trigger engine.
//!
//! Two mutually exclusive ways to fire keep-alives:
//! - reset detection: [`QuotaResetOrchestrator`] polls quota and fires once per
//!   reset, with [`FallbackScheduler`] covering hours outside the time window
//! - calendar: [`CronCalendarScheduler`] fires on daily/weekly/interval/cron times
//!
//! [`AutoTriggerController`] owns the schedule and switches between them.

pub mod calendar;
pub mod clock;
pub mod collaborators;
pub mod controller;
pub mod decision;
pub mod dispatcher;
pub mod fallback;
pub mod history;
pub mod mutation_queue;
pub mod orchestrator;
pub mod runner;
pub mod snapshot;
pub mod time_window;

#[cfg(test)]
mod orchestrator_tests;

pub use calendar::CronCalendarScheduler;
pub use clock::{Clock, SystemClock};
pub use collaborators::{
    AccountDirectory, AccountStore, CalendarScheduler, CrontabValidation, FireCallback,
    KeepAliveReply, KeepAliveRequest, KeepAliveTransport, ModelCatalogSource, NoopNotifier,
    StateNotifier, StateStore, TokenProvider,
};
pub use controller::{AutoTriggerController, ControllerDeps, ManualTrigger};
pub use decision::ResetDecisionEngine;
pub use dispatcher::{DispatchRequest, KeepAliveDispatcher};
pub use fallback::{FallbackScheduler, FallbackSink};
pub use history::TriggerHistory;
pub use mutation_queue::AccountMutationQueue;
pub use orchestrator::{PassOutcome, QuotaResetOrchestrator, SkipReason};
pub use snapshot::CockpitSnapshot;
pub use time_window::is_within_window;
