//! End-to-end run: load → pipeline → write.

use std::path::PathBuf;

use geo::Geometry;
use log::{debug, info, warn};

use nc_core::AttrValue;
use nc_coverage::FinalTable;
use nc_io::{
    boundary_polygon, check_destination, network_edges, region_polygons, write_output, Crs, Feature,
    FeatureLayer, GeometryLoader, WriteMode,
};
use nc_overlay::EdgePreAggregator;

use crate::{PipelineBuilder, PipelineObserver, PipelineResult, RunConfig, Stage, StageCounts};

/// What a completed [`run`] did.
#[derive(Clone, Debug, PartialEq)]
pub struct RunSummary {
    pub output:          PathBuf,
    pub layer:           String,
    pub mode:            WriteMode,
    pub counts:          StageCounts,
    /// Rows written.
    pub rows:            usize,
    pub dropped_empty:   usize,
    pub dropped_outside: usize,
}

/// Load every input named by `config`, run the pipeline and write the result.
///
/// The output destination is checked before anything is loaded and again
/// right before writing, so a run never spends time on a result it may not
/// write.
///
/// # Errors
///
/// - [`nc_io::GeoIoError::OutputExists`] when the destination may not be
///   replaced.
/// - [`nc_io::GeoIoError::NoGeometry`] when an input layer is not spatial.
/// - [`nc_coverage::JoinCardinalityError`] (wrapped) when region keys repeat.
pub fn run<O: PipelineObserver>(config: &RunConfig, observer: &mut O) -> PipelineResult<RunSummary> {
    config.validate()?;
    let planned = check_destination(&config.output)?;
    debug!("output {} will be written as {planned:?}", config.output.path.display());

    // ── Load ──────────────────────────────────────────────────────────────
    observer.on_stage_start(Stage::Load);
    let target = config.target()?;
    let loader = GeometryLoader::new(target.clone());
    let network = loader.load(&config.network)?;
    let region_layer = loader.load(&config.regions)?;
    let boundary = config.boundary.as_ref().map(|b| loader.load(b)).transpose()?;
    let loaded = network.len() + region_layer.len() + boundary.as_ref().map_or(0, FeatureLayer::len);

    for metric in &config.metrics {
        for attr in metric.predicate.attributes() {
            if !network.has_field(attr) {
                warn!("metric {:?} reads {attr:?}, which layer {:?} does not have", metric.name, network.name);
            }
        }
    }

    let edges = network_edges(network, config.edge_id.as_deref())?;
    let schema = region_layer.schema.clone();
    let regions = region_polygons(region_layer, &config.region_key)?;
    let boundary = boundary.map(boundary_polygon).transpose()?;
    observer.on_stage_end(Stage::Load, loaded);

    // ── Pipeline ──────────────────────────────────────────────────────────
    let mut builder = PipelineBuilder::new(edges, regions)
        .metrics(config.metrics.iter().cloned())
        .ratios(config.ratios.iter().cloned())
        .clip_network(config.clips_network())
        .clip_output(config.clip_output);
    if let Some(boundary) = boundary {
        builder = builder.boundary(boundary);
    }
    if let Some(pre) = &config.pre_aggregate {
        let aggregator = match &pre.separator {
            Some(sep) => EdgePreAggregator::with_separator(sep.clone())?,
            None => EdgePreAggregator::new(),
        };
        builder = builder.pre_aggregate(aggregator);
    }
    let report = builder.build()?.run(observer)?;

    // ── Write ─────────────────────────────────────────────────────────────
    observer.on_stage_start(Stage::Write);
    let name = config.output.layer_name();
    let layer = result_layer(&name, &target, &schema, &report.table);
    let mode = write_output(&config.output, &layer)?;
    info!("wrote {} rows to {} (layer {name:?})", layer.len(), config.output.path.display());
    observer.on_stage_end(Stage::Write, layer.len());

    Ok(RunSummary {
        output:          config.output.path.clone(),
        layer:           name,
        mode,
        counts:          report.counts,
        rows:            report.table.len(),
        dropped_empty:   report.table.dropped_empty,
        dropped_outside: report.table.dropped_outside,
    })
}

/// The final table as a writable layer: region attributes in source order,
/// then the computed columns.  Missing values become `Null`.
pub fn result_layer(name: &str, crs: &Crs, region_schema: &[String], table: &FinalTable) -> FeatureLayer {
    let mut schema = region_schema.to_vec();
    schema.extend(table.columns.iter().map(|c| c.name.clone()));

    let mut layer = FeatureLayer::new(name, Some(crs.clone()), schema);
    for record in &table.records {
        let mut attrs = record.attrs.clone();
        for (column, value) in table.columns.iter().zip(&record.values) {
            attrs.insert(column.name.clone(), AttrValue::from(*value));
        }
        layer.push(Feature::new(Some(Geometry::MultiPolygon(record.geometry.clone())), attrs));
    }
    layer
}
