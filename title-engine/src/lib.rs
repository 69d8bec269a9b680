//! Periodic broadcast title updates.
//!
//! A [`Scheduler`] runs an [`UpdateCycle`] on a fixed interval. Each cycle
//! refreshes credentials when needed, fetches metrics, resolves the AI
//! variables the template uses, composes the title and publishes it.

pub mod activity;
pub mod compositor;
pub mod cycle;
pub mod resolver;
pub mod scheduler;
pub mod signals;
pub mod template;

pub use activity::{ActivityEntry, ActivityKind, ActivityLog};
pub use compositor::{compose, ComposedTitle};
pub use cycle::{CycleOutcome, CycleSettings, LlmSource, UpdateCycle};
pub use resolver::{referenced_variables, AiVariableResolver, EMPTY_METRIC_SENTINEL};
pub use scheduler::{validate_interval, LastError, Scheduler, SchedulerOptions};
pub use signals::{SignalReceivers, UpdateSignals};
pub use template::{analyze_template, TemplateAnalysis};
