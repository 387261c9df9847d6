//! Deferred work that runs after the triggering response has been returned.
//!
//! - `queue`: the producer side (`enqueue` / `mark_done`) shared by request handlers
//! - `source`: where "an invocation started" signals come from
//! - `extension`: the Lambda Extensions API client (production signal source)
//! - `runner`: the single worker that drains the queue once per invocation

pub mod extension;
pub mod queue;
pub mod runner;
pub mod source;

pub use extension::ExtensionClient;
pub use queue::{DeferredTask, TaskQueue};
pub use runner::{RunnerConfig, RunnerStats, StatsProbe, TaskRunner, TaskRunnerHandle};
pub use source::{
    channel, ChannelSource, InvocationError, InvocationEvent, InvocationSource,
    InvocationTrigger, LocalSource,
};
