//! `RunConfig`: every per-run setting of one coverage run.
//!
//! Typically loaded from a TOML file by the binary:
//!
//! ```toml
//! target_crs = "EPSG:7899"
//! region_key = "SA2_CODE21"
//!
//! [network]
//! path  = "data/network_bendigo.sqlite"
//! layer = "links"
//!
//! [regions]
//! path = "data/sa2_2021.gpkg"
//!
//! [boundary]
//! path = "data/greater_bendigo.sqlite"
//!
//! [output]
//! path  = "outputs/coverage_bendigo.gpkg"
//! layer = "sa_twos"
//! ```
//!
//! Omitted `metrics`/`ratios` fall back to [`default_metrics`] and
//! [`default_ratios`].

use std::path::Path;

use serde::{Deserialize, Serialize};

use nc_coverage::{default_metrics, default_ratios, MetricSpec, RatioSpec};
use nc_io::{Crs, LayerSource, OutputTarget};

use crate::{PipelineError, PipelineResult};

/// Region key attribute of the Australian SA2 2021 boundaries.
pub const DEFAULT_REGION_KEY: &str = "SA2_CODE21";

/// Settings of the optional Edge Pre-Aggregator.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct PreAggregateConfig {
    /// Base id = source id up to the first occurrence of this string.  Unset
    /// merges only records with identical ids.
    #[serde(default)]
    pub separator: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RunConfig {
    /// Linear network layer.
    pub network: LayerSource,

    /// Administrative region layer.
    pub regions: LayerSource,

    /// Optional boundary used by the network and display clips.
    #[serde(default)]
    pub boundary: Option<LayerSource>,

    /// Planar CRS every layer is reprojected to (`"EPSG:7899"` or a PROJ.4
    /// string).  Lengths are measured in its units.
    pub target_crs: String,

    /// Attribute holding the unique region key.
    #[serde(default = "default_region_key")]
    pub region_key: String,

    /// Network attribute holding the edge id.  Unset uses the feature id.
    #[serde(default)]
    pub edge_id: Option<String>,

    /// Clip the network to the boundary before splitting.  This changes the
    /// totals.  Default: `true` when a boundary is given.
    #[serde(default)]
    pub clip_network: Option<bool>,

    /// Report only regions intersecting the boundary, clipped to it.  Totals
    /// are unaffected.  Default: `false`.
    #[serde(default)]
    pub clip_output: bool,

    /// Merge network records sharing a base id before splitting.
    #[serde(default)]
    pub pre_aggregate: Option<PreAggregateConfig>,

    #[serde(default = "default_metrics")]
    pub metrics: Vec<MetricSpec>,

    #[serde(default = "default_ratios")]
    pub ratios: Vec<RatioSpec>,

    pub output: OutputTarget,

    /// Worker thread count passed to Rayon.  `None` uses all logical cores.
    #[serde(default)]
    pub num_threads: Option<usize>,
}

fn default_region_key() -> String {
    DEFAULT_REGION_KEY.to_string()
}

impl RunConfig {
    /// A config with default key, metrics and ratios and no optional stages.
    pub fn new(
        network:    LayerSource,
        regions:    LayerSource,
        target_crs: impl Into<String>,
        output:     OutputTarget,
    ) -> Self {
        Self {
            network,
            regions,
            boundary:      None,
            target_crs:    target_crs.into(),
            region_key:    default_region_key(),
            edge_id:       None,
            clip_network:  None,
            clip_output:   false,
            pre_aggregate: None,
            metrics:       default_metrics(),
            ratios:        default_ratios(),
            output,
            num_threads:   None,
        }
    }

    /// Whether the pre-split network clip runs.
    pub fn clips_network(&self) -> bool {
        self.clip_network.unwrap_or(self.boundary.is_some())
    }

    pub fn target(&self) -> PipelineResult<Crs> {
        Ok(Crs::parse(&self.target_crs)?)
    }

    /// Check everything that can be checked without touching the data.
    pub fn validate(&self) -> PipelineResult<()> {
        self.target()?;
        if self.region_key.trim().is_empty() {
            return Err(PipelineError::Config("region_key must not be empty".into()));
        }
        if self.edge_id.as_deref().is_some_and(|f| f.trim().is_empty()) {
            return Err(PipelineError::Config("edge_id must not be empty when set".into()));
        }
        if self.boundary.is_none() {
            if self.clip_network == Some(true) {
                return Err(PipelineError::MissingBoundary("clip_network"));
            }
            if self.clip_output {
                return Err(PipelineError::MissingBoundary("clip_output"));
            }
        }
        if self.metrics.is_empty() {
            return Err(PipelineError::NoMetrics);
        }
        if self.num_threads == Some(0) {
            return Err(PipelineError::Config("num_threads must be at least 1".into()));
        }
        self.output.format()?;
        Ok(())
    }

    /// Resolve relative input and output paths against `base` (the config
    /// file's directory).
    pub fn resolve_paths(&mut self, base: &Path) {
        let sources = [Some(&mut self.network), Some(&mut self.regions), self.boundary.as_mut()];
        for source in sources.into_iter().flatten() {
            if source.path.is_relative() {
                source.path = base.join(&source.path);
            }
        }
        if self.output.path.is_relative() {
            self.output.path = base.join(&self.output.path);
        }
    }
}
