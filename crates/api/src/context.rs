use std::sync::Arc;
use std::time::Duration;

use webshim_tasks::{StatsProbe, TaskQueue};

use crate::app::routes::storage::BucketCatalog;

/// Everything the `background-tasks` handlers need.
///
/// Built once in `main` and handed to the router; there are no globals.
#[derive(Debug, Clone)]
pub struct TaskContext {
    queue: TaskQueue,
    stats: StatsProbe,
    time_unit: Duration,
}

impl TaskContext {
    pub fn new(queue: TaskQueue, stats: StatsProbe, time_unit: Duration) -> Self {
        Self {
            queue,
            stats,
            time_unit,
        }
    }

    pub fn queue(&self) -> &TaskQueue {
        &self.queue
    }

    pub fn stats(&self) -> &StatsProbe {
        &self.stats
    }

    /// Length of one mock-task time unit.
    pub fn time_unit(&self) -> Duration {
        self.time_unit
    }
}

/// Object storage behind the `agent-actions` routes.
#[derive(Clone)]
pub struct CatalogContext {
    catalog: Arc<dyn BucketCatalog>,
}

impl CatalogContext {
    pub fn new(catalog: Arc<dyn BucketCatalog>) -> Self {
        Self { catalog }
    }

    pub fn catalog(&self) -> &dyn BucketCatalog {
        self.catalog.as_ref()
    }
}

/// Pacing of the demo streams.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct StreamContext {
    /// Pause before each line of `GET /`.
    pub line_interval: Duration,
    /// Pause after each character of `GET /lmi`.
    pub char_interval: Duration,
}

impl StreamContext {
    /// Lines are one time unit apart, characters a twentieth of one.
    pub fn from_time_unit(unit: Duration) -> Self {
        Self {
            line_interval: unit,
            char_interval: unit / 20,
        }
    }
}
