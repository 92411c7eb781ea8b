//! `nc-pipeline`: wiring the coverage engine into one run.
//!
//! ```text
//! RunConfig ──▶ run() ──▶ GeometryLoader ──▶ PipelineBuilder ──▶ Pipeline::run
//!                                                             ──▶ write_output
//! ```
//!
//! # Crate layout
//!
//! | Module       | Contents                                                 |
//! |--------------|----------------------------------------------------------|
//! | [`config`]   | `RunConfig`, `PreAggregateConfig`                        |
//! | [`builder`]  | `PipelineBuilder`                                        |
//! | [`pipeline`] | `Pipeline`, `CoverageReport`, `StageCounts`              |
//! | [`observer`] | `PipelineObserver`, `NoopObserver`, `LogObserver`        |
//! | [`run`]      | `run` entry point, `RunSummary`, `result_layer`          |
//! | [`error`]    | `PipelineError`, `PipelineResult<T>`                     |
//!
//! # Cargo features
//!
//! | Feature    | Effect                                                   |
//! |------------|----------------------------------------------------------|
//! | `parallel` | Splits edges and sums regions on Rayon's thread pool.    |
//!
//! # Quick-start
//!
//! ```rust,ignore
//! use nc_coverage::{default_metrics, default_ratios};
//! use nc_pipeline::{NoopObserver, PipelineBuilder};
//!
//! let report = PipelineBuilder::new(edges, regions)
//!     .metrics(default_metrics())
//!     .ratios(default_ratios())
//!     .build()?
//!     .run(&mut NoopObserver)?;
//! for record in &report.table.records {
//!     println!("{}: {:?}", record.key, record.values);
//! }
//! ```

pub mod builder;
pub mod config;
pub mod error;
pub mod observer;
pub mod pipeline;
pub mod run;

#[cfg(test)]
mod tests;

pub use builder::PipelineBuilder;
pub use config::{PreAggregateConfig, RunConfig, DEFAULT_REGION_KEY};
pub use error::{PipelineError, PipelineResult};
pub use observer::{LogObserver, NoopObserver, PipelineObserver, Stage};
pub use pipeline::{CoverageReport, Pipeline, StageCounts};
pub use run::{result_layer, run, RunSummary};
