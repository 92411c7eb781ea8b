//! The `Pipeline` struct and its stage sequence.
//!
//! ```text
//! edges ─▶ ① clip network ─▶ ② pre-aggregate ─▶ ③ split against regions
//!       ─▶ ④ totals + one (length, coverage) pair per metric + ratios
//!       ─▶ ⑤ drop empty regions, optional display clip ─▶ FinalTable
//! ```
//!
//! ① and ② only run when configured.

use log::info;

use nc_core::{NetworkEdge, RegionPolygon};
use nc_coverage::{CoverageTable, FinalTable, MetricSpec, RatioSpec, ResultFinalizer};
use nc_overlay::{EdgePreAggregator, ExtentClipper, OverlaySplitter};

use crate::{PipelineObserver, PipelineResult, Stage};

/// Feature counts after each stage.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StageCounts {
    /// Edges handed to the pipeline.
    pub edges:      usize,
    /// Edges left after the network clip.
    pub clipped:    usize,
    /// Edges left after pre-aggregation.
    pub aggregated: usize,
    pub segments:   usize,
    /// Regions handed to the pipeline.
    pub regions:    usize,
}

/// Result of [`Pipeline::run`].
#[derive(Clone, Debug)]
pub struct CoverageReport {
    pub table:  FinalTable,
    pub counts: StageCounts,
}

/// A validated coverage run over in-memory edges and regions.
///
/// Create via [`PipelineBuilder`][crate::PipelineBuilder].
pub struct Pipeline {
    pub(crate) edges:         Vec<NetworkEdge>,
    pub(crate) regions:       Vec<RegionPolygon>,
    pub(crate) network_clip:  Option<ExtentClipper>,
    pub(crate) pre_aggregate: Option<EdgePreAggregator>,
    pub(crate) metrics:       Vec<MetricSpec>,
    pub(crate) ratios:        Vec<RatioSpec>,
    pub(crate) finalizer:     ResultFinalizer,
}

impl Pipeline {
    pub fn metrics(&self) -> &[MetricSpec] {
        &self.metrics
    }

    pub fn ratios(&self) -> &[RatioSpec] {
        &self.ratios
    }

    /// Run every stage and return the final table.
    ///
    /// # Errors
    ///
    /// Overlay errors for non-finite geometry, coverage errors when the region
    /// join is not 1:1 or a computed column clashes with a region attribute.
    pub fn run<O: PipelineObserver>(self, observer: &mut O) -> PipelineResult<CoverageReport> {
        let Pipeline { mut edges, regions, network_clip, pre_aggregate, metrics, ratios, finalizer } = self;
        let mut counts = StageCounts { edges: edges.len(), regions: regions.len(), ..Default::default() };

        // ── ① Network clip ────────────────────────────────────────────────
        if let Some(clipper) = &network_clip {
            observer.on_stage_start(Stage::ClipNetwork);
            edges = clipper.clip_edges(edges);
            info!("network clip kept {} of {} edges", edges.len(), counts.edges);
            observer.on_stage_end(Stage::ClipNetwork, edges.len());
        }
        counts.clipped = edges.len();

        // ── ② Pre-aggregation ─────────────────────────────────────────────
        if let Some(aggregator) = &pre_aggregate {
            observer.on_stage_start(Stage::PreAggregate);
            edges = aggregator.aggregate(edges);
            info!("pre-aggregation merged {} records into {} edges", counts.clipped, edges.len());
            observer.on_stage_end(Stage::PreAggregate, edges.len());
        }
        counts.aggregated = edges.len();

        // ── ③ Split ───────────────────────────────────────────────────────
        observer.on_stage_start(Stage::Split);
        let segments = OverlaySplitter::new(&regions)?.split(&edges)?;
        counts.segments = segments.len();
        observer.on_stage_end(Stage::Split, segments.len());
        drop(edges);

        // ── ④ Aggregate ───────────────────────────────────────────────────
        observer.on_stage_start(Stage::Aggregate);
        let mut table = CoverageTable::new(regions)?;
        for metric in &metrics {
            table.apply_metric(&segments, metric)?;
        }
        for ratio in &ratios {
            table.add_ratio(ratio)?;
        }
        observer.on_stage_end(Stage::Aggregate, table.columns().len());

        // ── ⑤ Finalize ────────────────────────────────────────────────────
        observer.on_stage_start(Stage::Finalize);
        let table = finalizer.finalize(table);
        observer.on_stage_end(Stage::Finalize, table.len());

        let report = CoverageReport { table, counts };
        observer.on_report(&report);
        Ok(report)
    }
}
