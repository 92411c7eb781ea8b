//! Pipeline observer trait for progress reporting.

use std::fmt;
use std::time::{Duration, Instant};

use log::info;

use crate::CoverageReport;

/// One step of a coverage run, in execution order.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Stage {
    Load,
    ClipNetwork,
    PreAggregate,
    Split,
    Aggregate,
    Finalize,
    Write,
}

impl Stage {
    pub fn name(self) -> &'static str {
        match self {
            Stage::Load         => "load",
            Stage::ClipNetwork  => "clip network",
            Stage::PreAggregate => "pre-aggregate",
            Stage::Split        => "split",
            Stage::Aggregate    => "aggregate",
            Stage::Finalize     => "finalize",
            Stage::Write        => "write",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Callbacks invoked by [`Pipeline::run`][crate::Pipeline::run] and
/// [`run`][crate::run] around each stage.
///
/// All methods have default no-op implementations so implementors only need to
/// override what they care about.
///
/// # Example
///
/// ```rust,ignore
/// struct Counter(usize);
///
/// impl PipelineObserver for Counter {
///     fn on_stage_end(&mut self, stage: Stage, items: usize) {
///         if stage == Stage::Split {
///             self.0 = items;
///         }
///     }
/// }
/// ```
pub trait PipelineObserver {
    /// Called before a stage starts.
    fn on_stage_start(&mut self, _stage: Stage) {}

    /// Called after a stage completes.
    ///
    /// `items` is what the stage produced: features loaded, edges kept,
    /// segments split, metric columns added, rows kept or rows written.
    fn on_stage_end(&mut self, _stage: Stage, _items: usize) {}

    /// Called once the final table is built.
    fn on_report(&mut self, _report: &CoverageReport) {}
}

/// A [`PipelineObserver`] that does nothing.
pub struct NoopObserver;

impl PipelineObserver for NoopObserver {}

/// Logs every stage with its wall time at `info` level.
#[derive(Debug, Default)]
pub struct LogObserver {
    started: Option<Instant>,
    timings: Vec<(Stage, Duration)>,
}

impl LogObserver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Completed stages with their durations, in completion order.
    pub fn timings(&self) -> &[(Stage, Duration)] {
        &self.timings
    }
}

impl PipelineObserver for LogObserver {
    fn on_stage_start(&mut self, stage: Stage) {
        self.started = Some(Instant::now());
        info!("{stage}: started");
    }

    fn on_stage_end(&mut self, stage: Stage, items: usize) {
        let elapsed = self.started.take().map(|t| t.elapsed()).unwrap_or_default();
        self.timings.push((stage, elapsed));
        info!("{stage}: {items} items in {:.3}s", elapsed.as_secs_f64());
    }

    fn on_report(&mut self, report: &CoverageReport) {
        let counts = &report.counts;
        info!(
            "{} of {} regions reported ({} without network, {} outside display extent)",
            report.table.len(),
            counts.regions,
            report.table.dropped_empty,
            report.table.dropped_outside,
        );
    }
}
