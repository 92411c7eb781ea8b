//! Fluent builder for constructing a [`Pipeline`].

use std::collections::BTreeSet;

use geo::MultiPolygon;

use nc_core::{NetworkEdge, RegionPolygon};
use nc_coverage::{CoverageError, MetricSpec, RatioSpec, ResultFinalizer};
use nc_overlay::{EdgePreAggregator, ExtentClipper};

use crate::{Pipeline, PipelineError, PipelineResult};

/// Fluent builder for [`Pipeline`].
///
/// # Required inputs
///
/// - `Vec<NetworkEdge>` and `Vec<RegionPolygon>` in one projected CRS.
/// - At least one [`MetricSpec`].
///
/// # Optional inputs
///
/// | Method                | Default                               |
/// |-----------------------|---------------------------------------|
/// | `.boundary(p)`        | none                                  |
/// | `.clip_network(b)`    | `true` when a boundary is set         |
/// | `.clip_output(b)`     | `false`                               |
/// | `.pre_aggregate(a)`   | records are not merged                |
/// | `.ratio(r)`           | no ratio columns                      |
///
/// # Example
///
/// ```rust,ignore
/// let report = PipelineBuilder::new(edges, regions)
///     .boundary(urban_extent)
///     .metrics(default_metrics())
///     .ratios(default_ratios())
///     .build()?
///     .run(&mut NoopObserver)?;
/// ```
pub struct PipelineBuilder {
    edges:         Vec<NetworkEdge>,
    regions:       Vec<RegionPolygon>,
    boundary:      Option<MultiPolygon<f64>>,
    clip_network:  Option<bool>,
    clip_output:   bool,
    pre_aggregate: Option<EdgePreAggregator>,
    metrics:       Vec<MetricSpec>,
    ratios:        Vec<RatioSpec>,
}

impl PipelineBuilder {
    pub fn new(edges: Vec<NetworkEdge>, regions: Vec<RegionPolygon>) -> Self {
        Self {
            edges,
            regions,
            boundary:      None,
            clip_network:  None,
            clip_output:   false,
            pre_aggregate: None,
            metrics:       Vec::new(),
            ratios:        Vec::new(),
        }
    }

    /// Extent used by the network clip and the display clip.
    pub fn boundary(mut self, boundary: MultiPolygon<f64>) -> Self {
        self.boundary = Some(boundary);
        self
    }

    /// Clip edges to the boundary before splitting.  Edges outside the
    /// boundary then do not count towards any total.
    pub fn clip_network(mut self, yes: bool) -> Self {
        self.clip_network = Some(yes);
        self
    }

    /// Report only regions intersecting the boundary, with clipped geometry.
    pub fn clip_output(mut self, yes: bool) -> Self {
        self.clip_output = yes;
        self
    }

    pub fn pre_aggregate(mut self, aggregator: EdgePreAggregator) -> Self {
        self.pre_aggregate = Some(aggregator);
        self
    }

    pub fn metric(mut self, metric: MetricSpec) -> Self {
        self.metrics.push(metric);
        self
    }

    pub fn metrics(mut self, metrics: impl IntoIterator<Item = MetricSpec>) -> Self {
        self.metrics.extend(metrics);
        self
    }

    /// Add a ratio between two metrics.  Ratios are computed after every
    /// metric, in the order added.
    pub fn ratio(mut self, ratio: RatioSpec) -> Self {
        self.ratios.push(ratio);
        self
    }

    pub fn ratios(mut self, ratios: impl IntoIterator<Item = RatioSpec>) -> Self {
        self.ratios.extend(ratios);
        self
    }

    /// Validate metric and ratio names and the clip settings, and return a
    /// ready-to-run [`Pipeline`].
    pub fn build(self) -> PipelineResult<Pipeline> {
        // ── Metrics and ratios ────────────────────────────────────────────
        if self.metrics.is_empty() {
            return Err(PipelineError::NoMetrics);
        }
        let mut names = BTreeSet::new();
        for metric in &self.metrics {
            if metric.name.trim().is_empty() {
                return Err(CoverageError::EmptyName.into());
            }
            if !names.insert(metric.name.as_str()) {
                return Err(CoverageError::DuplicateMetric(metric.name.clone()).into());
            }
        }
        let mut ratio_names = BTreeSet::new();
        for ratio in &self.ratios {
            if ratio.name.trim().is_empty() {
                return Err(CoverageError::EmptyName.into());
            }
            if !ratio_names.insert(ratio.name.as_str()) {
                return Err(CoverageError::ColumnClash(ratio.name.clone()).into());
            }
            for operand in [&ratio.numerator, &ratio.denominator] {
                if !names.contains(operand.as_str()) {
                    return Err(CoverageError::UnknownMetric {
                        ratio:  ratio.name.clone(),
                        metric: operand.clone(),
                    }
                    .into());
                }
            }
        }

        // ── Clips ─────────────────────────────────────────────────────────
        let clip_network = self.clip_network.unwrap_or(self.boundary.is_some());
        let extent = self.boundary.map(ExtentClipper::new).transpose()?;
        let network_clip = match (clip_network, &extent) {
            (false, _) => None,
            (true, Some(e)) => Some(e.clone()),
            (true, None) => return Err(PipelineError::MissingBoundary("clip_network")),
        };
        let finalizer = match (self.clip_output, extent) {
            (false, _) => ResultFinalizer::new(),
            (true, Some(e)) => ResultFinalizer::new().with_display_extent(e),
            (true, None) => return Err(PipelineError::MissingBoundary("clip_output")),
        };

        Ok(Pipeline {
            edges:         self.edges,
            regions:       self.regions,
            network_clip,
            pre_aggregate: self.pre_aggregate,
            metrics:       self.metrics,
            ratios:        self.ratios,
            finalizer,
        })
    }
}
