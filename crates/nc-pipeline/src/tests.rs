//! Unit tests for nc-pipeline.

#[cfg(test)]
mod fixtures {
    use geo::{polygon, LineString, MultiLineString, MultiPolygon};

    use nc_core::{AttrValue, Attributes, EdgeId, NetworkEdge, RegionKey, RegionPolygon};

    use crate::{PipelineObserver, Stage};

    pub fn square(x0: f64, y0: f64, size: f64) -> MultiPolygon<f64> {
        MultiPolygon::new(vec![polygon![
            (x: x0, y: y0),
            (x: x0 + size, y: y0),
            (x: x0 + size, y: y0 + size),
            (x: x0, y: y0 + size),
            (x: x0, y: y0),
        ]])
    }

    pub fn attrs(pairs: &[(&str, AttrValue)]) -> Attributes {
        pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }

    /// R1 = [0,10]², R2 = [10,20]×[0,10], R3 = [20,30]×[0,10].
    pub fn strip() -> Vec<RegionPolygon> {
        ["R1", "R2", "R3"]
            .iter()
            .enumerate()
            .map(|(i, key)| {
                RegionPolygon::new(
                    RegionKey::new(*key).unwrap(),
                    square(10.0 * i as f64, 0.0, 10.0),
                    attrs(&[("SA2_CODE21", (*key).into())]),
                )
            })
            .collect()
    }

    pub fn edge(id: u32, source: &str, from: (f64, f64), to: (f64, f64), pairs: &[(&str, AttrValue)]) -> NetworkEdge {
        NetworkEdge::new(
            EdgeId(id),
            source,
            MultiLineString::new(vec![LineString::from(vec![from, to])]),
            attrs(pairs),
        )
    }

    /// ```text
    /// e1  (2,5)→(8,5)    6  cycleway, is_cycle=1   R1
    /// e2  (5,2)→(15,2)  10  is_cycle=1             R1 5 | R2 5
    /// e3  (12,8)→(18,8)  6  is_cycle=0             R2
    /// ```
    pub fn network() -> Vec<NetworkEdge> {
        vec![
            edge(0, "e1", (2.0, 5.0), (8.0, 5.0), &[("cycleway", "track".into()), ("is_cycle", 1i64.into())]),
            edge(1, "e2", (5.0, 2.0), (15.0, 2.0), &[("cycleway", AttrValue::Null), ("is_cycle", 1i64.into())]),
            edge(2, "e3", (12.0, 8.0), (18.0, 8.0), &[("cycleway", AttrValue::Null), ("is_cycle", 0i64.into())]),
        ]
    }

    pub fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    /// Records every callback in order.
    #[derive(Default)]
    pub struct Recorder {
        pub started: Vec<Stage>,
        pub ended:   Vec<(Stage, usize)>,
        pub reports: usize,
    }

    impl PipelineObserver for Recorder {
        fn on_stage_start(&mut self, stage: Stage) {
            self.started.push(stage);
        }

        fn on_stage_end(&mut self, stage: Stage, items: usize) {
            self.ended.push((stage, items));
        }

        fn on_report(&mut self, _report: &crate::CoverageReport) {
            self.reports += 1;
        }
    }
}

// ── PipelineBuilder validation ────────────────────────────────────────────────

#[cfg(test)]
mod builder {
    use super::fixtures::{network, square, strip};
    use crate::{PipelineBuilder, PipelineError};
    use nc_core::Predicate;
    use nc_coverage::{default_metrics, default_ratios, CoverageError, MetricSpec, RatioSpec};
    use nc_overlay::OverlayError;

    #[test]
    fn builds_with_default_metrics() {
        let pipeline = PipelineBuilder::new(network(), strip())
            .metrics(default_metrics())
            .ratios(default_ratios())
            .build()
            .unwrap();
        assert_eq!(pipeline.metrics().len(), 2);
        assert_eq!(pipeline.ratios().len(), 1);
    }

    #[test]
    fn metrics_are_required() {
        let result = PipelineBuilder::new(network(), strip()).build();
        assert!(matches!(result, Err(PipelineError::NoMetrics)));
    }

    #[test]
    fn duplicate_metric_errors() {
        let m = MetricSpec::new("m", Predicate::Always);
        let result = PipelineBuilder::new(network(), strip()).metric(m.clone()).metric(m).build();
        assert!(matches!(result, Err(PipelineError::Coverage(CoverageError::DuplicateMetric(n))) if n == "m"));
    }

    #[test]
    fn ratio_over_unknown_metric_errors() {
        let result = PipelineBuilder::new(network(), strip())
            .metrics(default_metrics())
            .ratio(RatioSpec::new("r", "cycleway", "walkable"))
            .build();
        assert!(matches!(
            result,
            Err(PipelineError::Coverage(CoverageError::UnknownMetric { metric, .. })) if metric == "walkable"
        ));
    }

    #[test]
    fn display_clip_needs_a_boundary() {
        let result = PipelineBuilder::new(network(), strip())
            .metrics(default_metrics())
            .clip_output(true)
            .build();
        assert!(matches!(result, Err(PipelineError::MissingBoundary("clip_output"))));
    }

    #[test]
    fn boundary_without_area_errors() {
        let result = PipelineBuilder::new(network(), strip())
            .metrics(default_metrics())
            .boundary(square(0.0, 0.0, 0.0))
            .build();
        assert!(matches!(result, Err(PipelineError::Overlay(OverlayError::EmptyExtent))));
    }
}

// ── Pipeline::run ─────────────────────────────────────────────────────────────

#[cfg(test)]
mod pipeline {
    use super::fixtures::{close, edge, network, square, strip, Recorder};
    use crate::{NoopObserver, PipelineBuilder, Stage, StageCounts};
    use nc_coverage::{default_metrics, default_ratios, TOTAL_COLUMN};
    use nc_overlay::EdgePreAggregator;

    fn builder() -> PipelineBuilder {
        PipelineBuilder::new(network(), strip()).metrics(default_metrics()).ratios(default_ratios())
    }

    #[test]
    fn default_metrics_over_the_strip() {
        let report = builder().build().unwrap().run(&mut NoopObserver).unwrap();
        let table = &report.table;

        let keys: Vec<_> = table.records.iter().map(|r| r.key.as_str()).collect();
        assert_eq!(keys, ["R1", "R2"]);
        assert_eq!(table.dropped_empty, 1);

        assert!(close(table.value(0, TOTAL_COLUMN).unwrap(), 11.0));
        assert!(close(table.value(0, "cycleway_coverage").unwrap(), 6.0 / 11.0));
        assert!(close(table.value(0, "bikeable_coverage").unwrap(), 1.0));
        assert!(close(table.value(0, "cycleway_to_bikeable").unwrap(), 6.0 / 11.0));

        assert!(close(table.value(1, TOTAL_COLUMN).unwrap(), 11.0));
        assert_eq!(table.value(1, "cycleway_length"), Some(0.0));
        assert_eq!(table.value(1, "cycleway_coverage"), Some(0.0));
        assert!(close(table.value(1, "bikeable_coverage").unwrap(), 5.0 / 11.0));
        assert_eq!(table.value(1, "cycleway_to_bikeable"), Some(0.0));

        assert_eq!(
            report.counts,
            StageCounts { edges: 3, clipped: 3, aggregated: 3, segments: 4, regions: 3 }
        );
    }

    #[test]
    fn network_clip_changes_totals() {
        let report = builder()
            .boundary(square(0.0, 0.0, 12.0))
            .build()
            .unwrap()
            .run(&mut NoopObserver)
            .unwrap();
        let table = &report.table;
        let r2 = table.record("R2").unwrap();
        let total = r2.values[table.column_index(TOTAL_COLUMN).unwrap()].unwrap();
        assert!(close(total, 2.0));
        assert_eq!(report.counts.clipped, 2);
    }

    #[test]
    fn display_clip_only_changes_which_regions_are_reported() {
        let report = builder()
            .boundary(square(0.0, 0.0, 12.0))
            .clip_network(false)
            .clip_output(true)
            .build()
            .unwrap()
            .run(&mut NoopObserver)
            .unwrap();
        let table = &report.table;
        assert_eq!(table.len(), 2);
        assert!(close(table.value(1, TOTAL_COLUMN).unwrap(), 11.0));
        let rect = geo::BoundingRect::bounding_rect(&table.records[1].geometry).unwrap();
        assert!(close(rect.max().x, 12.0));
    }

    #[test]
    fn display_clip_drops_regions_outside_the_boundary() {
        let report = builder()
            .boundary(square(0.0, 0.0, 10.0))
            .clip_network(false)
            .clip_output(true)
            .build()
            .unwrap()
            .run(&mut NoopObserver)
            .unwrap();
        let keys: Vec<_> = report.table.records.iter().map(|r| r.key.as_str()).collect();
        assert_eq!(keys, ["R1"]);
        assert_eq!(report.table.dropped_outside, 1);
        assert_eq!(report.table.dropped_empty, 1);
    }

    #[test]
    fn pre_aggregation_counts_a_duplicated_edge_once() {
        let edges = vec![
            edge(0, "7_fwd", (2.0, 5.0), (8.0, 5.0), &[("cycleway", "lane".into())]),
            edge(1, "7_rev", (8.0, 5.0), (2.0, 5.0), &[("is_cycle", 1i64.into())]),
        ];
        let separate = PipelineBuilder::new(edges.clone(), strip())
            .metrics(default_metrics())
            .build()
            .unwrap()
            .run(&mut NoopObserver)
            .unwrap();
        assert!(close(separate.table.value(0, TOTAL_COLUMN).unwrap(), 12.0));
        assert!(close(separate.table.value(0, "cycleway_coverage").unwrap(), 0.5));

        let merged = PipelineBuilder::new(edges, strip())
            .metrics(default_metrics())
            .pre_aggregate(EdgePreAggregator::with_separator("_").unwrap())
            .build()
            .unwrap()
            .run(&mut NoopObserver)
            .unwrap();
        assert_eq!(merged.counts.aggregated, 1);
        assert!(close(merged.table.value(0, TOTAL_COLUMN).unwrap(), 6.0));
        assert_eq!(merged.table.value(0, "cycleway_coverage"), Some(1.0));
        assert_eq!(merged.table.value(0, "bikeable_coverage"), Some(1.0));
    }

    #[test]
    fn observer_sees_stages_in_order() {
        let mut recorder = Recorder::default();
        builder()
            .boundary(square(0.0, 0.0, 30.0))
            .pre_aggregate(EdgePreAggregator::new())
            .build()
            .unwrap()
            .run(&mut recorder)
            .unwrap();
        assert_eq!(
            recorder.started,
            [Stage::ClipNetwork, Stage::PreAggregate, Stage::Split, Stage::Aggregate, Stage::Finalize]
        );
        assert_eq!(recorder.ended[2], (Stage::Split, 4));
        // links_length + 2 × (length, coverage) + 1 ratio
        assert_eq!(recorder.ended[3], (Stage::Aggregate, 6));
        assert_eq!(recorder.reports, 1);
    }

    #[test]
    fn optional_stages_are_skipped_when_unset() {
        let mut recorder = Recorder::default();
        builder().build().unwrap().run(&mut recorder).unwrap();
        assert_eq!(recorder.started, [Stage::Split, Stage::Aggregate, Stage::Finalize]);
    }
}

// ── LogObserver ───────────────────────────────────────────────────────────────

#[cfg(test)]
mod observer {
    use crate::{LogObserver, PipelineObserver, Stage};

    #[test]
    fn timings_follow_completed_stages() {
        let mut log = LogObserver::new();
        log.on_stage_start(Stage::Split);
        log.on_stage_end(Stage::Split, 3);
        log.on_stage_end(Stage::Aggregate, 1);
        let stages: Vec<_> = log.timings().iter().map(|(s, _)| *s).collect();
        assert_eq!(stages, [Stage::Split, Stage::Aggregate]);
        assert_eq!(Stage::ClipNetwork.to_string(), "clip network");
    }
}

// ── RunConfig ─────────────────────────────────────────────────────────────────

#[cfg(test)]
mod config {
    use std::path::Path;

    use crate::{PipelineError, RunConfig, DEFAULT_REGION_KEY};
    use nc_coverage::default_metrics;
    use nc_io::{Crs, LayerSource, OutputTarget};

    fn minimal() -> RunConfig {
        serde_json::from_str(
            r#"{
                "network":    { "path": "net.gpkg", "layer": "links" },
                "regions":    { "path": "sa2.gpkg" },
                "target_crs": "EPSG:7899",
                "output":     { "path": "out.gpkg", "layer": "sa_twos" }
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn omitted_fields_take_defaults() {
        let config = minimal();
        assert_eq!(config.region_key, DEFAULT_REGION_KEY);
        assert_eq!(config.metrics, default_metrics());
        assert_eq!(config.ratios.len(), 1);
        assert!(!config.clip_output);
        assert!(!config.clips_network());
        assert!(!config.output.overwrite);
        assert_eq!(config.network.layer.as_deref(), Some("links"));
        assert_eq!(config.target().unwrap(), Crs::Epsg(7899));
        config.validate().unwrap();
    }

    #[test]
    fn boundary_turns_on_the_network_clip() {
        let mut config = minimal();
        config.boundary = Some(LayerSource::new("urban.geojson"));
        assert!(config.clips_network());
        config.clip_network = Some(false);
        assert!(!config.clips_network());
    }

    #[test]
    fn custom_metrics_replace_the_defaults() {
        let config: RunConfig = serde_json::from_str(
            r#"{
                "network":    { "path": "net.gpkg" },
                "regions":    { "path": "sa2.gpkg" },
                "target_crs": "EPSG:7899",
                "output":     { "path": "out.csv" },
                "metrics":    [{ "name": "lane", "predicate": { "truthy": "lane" } }],
                "ratios":     []
            }"#,
        )
        .unwrap();
        assert_eq!(config.metrics.len(), 1);
        assert_eq!(config.metrics[0].coverage_column(), "lane_coverage");
        assert!(config.ratios.is_empty());
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let result: Result<RunConfig, _> = serde_json::from_str(
            r#"{
                "network":    { "path": "net.gpkg" },
                "regions":    { "path": "sa2.gpkg" },
                "target_crs": "EPSG:7899",
                "output":     { "path": "out.gpkg" },
                "overwrite":  true
            }"#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn invalid_settings_fail_validation() {
        let mut config = minimal();
        config.clip_output = true;
        assert!(matches!(config.validate(), Err(PipelineError::MissingBoundary("clip_output"))));

        let mut config = minimal();
        config.target_crs = "not a crs".into();
        assert!(matches!(config.validate(), Err(PipelineError::GeoIo(_))));

        let mut config = minimal();
        config.metrics.clear();
        assert!(matches!(config.validate(), Err(PipelineError::NoMetrics)));

        let mut config = minimal();
        config.num_threads = Some(0);
        assert!(matches!(config.validate(), Err(PipelineError::Config(_))));

        let mut config = minimal();
        config.output = OutputTarget::new("out.shp");
        assert!(matches!(config.validate(), Err(PipelineError::GeoIo(_))));
    }

    #[test]
    fn relative_paths_resolve_against_the_config_dir() {
        let mut config = minimal();
        config.boundary = Some(LayerSource::new("/abs/urban.geojson"));
        config.resolve_paths(Path::new("/runs/bendigo"));
        assert_eq!(config.network.path, Path::new("/runs/bendigo/net.gpkg"));
        assert_eq!(config.output.path, Path::new("/runs/bendigo/out.gpkg"));
        assert_eq!(config.boundary.unwrap().path, Path::new("/abs/urban.geojson"));
    }
}

// ── run() end to end ──────────────────────────────────────────────────────────

#[cfg(test)]
mod run {
    use std::path::{Path, PathBuf};

    use geo::{Geometry, LineString};
    use rusqlite::Connection;
    use tempfile::TempDir;

    use super::fixtures::{attrs, close, square, Recorder};
    use crate::{run, NoopObserver, RunConfig, Stage};
    use nc_core::AttrValue;
    use nc_io::geojson::GeoJsonWriter;
    use nc_io::gpkg::{self, GpkgWriter};
    use nc_io::{Crs, Feature, FeatureLayer, GeoIoError, LayerSource, LayerWriter, OutputTarget, WriteMode};

    const CRS: Crs = Crs::Epsg(7899);

    fn line(from: (f64, f64), to: (f64, f64)) -> Option<Geometry<f64>> {
        Some(Geometry::LineString(LineString::from(vec![from, to])))
    }

    /// `inputs.gpkg` with layers `links` and `sa2`, plus `urban.geojson`.
    fn write_inputs(dir: &TempDir) -> PathBuf {
        let mut links = FeatureLayer::new(
            "links",
            Some(CRS),
            vec!["link_id".into(), "cycleway".into(), "is_cycle".into()],
        );
        for (id, from, to, cycleway, is_cycle) in [
            ("e1", (2.0, 5.0), (8.0, 5.0), AttrValue::from("track"), 1i64),
            ("e2", (5.0, 2.0), (15.0, 2.0), AttrValue::Null, 1),
            ("e3", (12.0, 8.0), (18.0, 8.0), AttrValue::Null, 0),
        ] {
            links.push(Feature::new(
                line(from, to),
                attrs(&[("link_id", id.into()), ("cycleway", cycleway), ("is_cycle", is_cycle.into())]),
            ));
        }

        let mut sa2 = FeatureLayer::new("sa2", Some(CRS), vec!["SA2_CODE21".into(), "SA2_NAME21".into()]);
        for (i, (code, name)) in [("201011001", "Alpha"), ("201011002", "Beta"), ("201011003", "Gamma")]
            .into_iter()
            .enumerate()
        {
            sa2.push(Feature::new(
                Some(Geometry::MultiPolygon(square(10.0 * i as f64, 0.0, 10.0))),
                attrs(&[("SA2_CODE21", code.into()), ("SA2_NAME21", name.into())]),
            ));
        }

        let inputs = dir.path().join("inputs.gpkg");
        let mut writer = GpkgWriter::open(&inputs).unwrap();
        writer.write_layer("links", &links).unwrap();
        writer.write_layer("sa2", &sa2).unwrap();
        writer.finish().unwrap();

        let mut urban = FeatureLayer::new("urban", Some(CRS), Vec::new());
        urban.push(Feature::new(Some(Geometry::MultiPolygon(square(0.0, 0.0, 12.0))), attrs(&[])));
        let mut writer = GeoJsonWriter::new(&dir.path().join("urban.geojson"));
        writer.write_layer("urban", &urban).unwrap();
        writer.finish().unwrap();

        inputs
    }

    fn config(inputs: &Path, output: PathBuf) -> RunConfig {
        let mut config = RunConfig::new(
            LayerSource::new(inputs).with_layer("links"),
            LayerSource::new(inputs).with_layer("sa2"),
            "EPSG:7899",
            OutputTarget::new(output).with_layer("sa_twos"),
        );
        config.edge_id = Some("link_id".into());
        config
    }

    fn column_names(path: &Path, table: &str) -> Vec<String> {
        let conn = Connection::open(path).unwrap();
        let mut stmt = conn.prepare(&format!("PRAGMA table_info(\"{table}\")")).unwrap();
        stmt.query_map([], |row| row.get::<_, String>(1))
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap()
    }

    #[test]
    fn writes_the_coverage_layer() {
        let dir = tempfile::tempdir().unwrap();
        let inputs = write_inputs(&dir);
        let output = dir.path().join("coverage.gpkg");

        let mut recorder = Recorder::default();
        let summary = run(&config(&inputs, output.clone()), &mut recorder).unwrap();
        assert_eq!(summary.mode, WriteMode::Create);
        assert_eq!(summary.layer, "sa_twos");
        assert_eq!(summary.rows, 2);
        assert_eq!(summary.dropped_empty, 1);
        assert_eq!(recorder.started.first(), Some(&Stage::Load));
        assert_eq!(recorder.started.last(), Some(&Stage::Write));

        assert_eq!(
            column_names(&output, "sa_twos"),
            [
                "fid",
                "geom",
                "SA2_CODE21",
                "SA2_NAME21",
                "links_length",
                "cycleway_length",
                "cycleway_coverage",
                "bikeable_length",
                "bikeable_coverage",
                "cycleway_to_bikeable",
            ]
        );

        let layer = gpkg::read_layer(&output, Some("sa_twos")).unwrap();
        assert_eq!(layer.len(), 2);
        let alpha = &layer.features[0];
        assert_eq!(alpha.attr("SA2_NAME21"), &AttrValue::from("Alpha"));
        assert!(close(alpha.attr("links_length").as_f64().unwrap(), 11.0));
        assert!(close(alpha.attr("cycleway_coverage").as_f64().unwrap(), 6.0 / 11.0));
        let beta = &layer.features[1];
        assert_eq!(beta.attr("cycleway_coverage").as_f64(), Some(0.0));
    }

    #[test]
    fn existing_output_fails_before_loading() {
        let dir = tempfile::tempdir().unwrap();
        let inputs = write_inputs(&dir);
        let output = dir.path().join("coverage.gpkg");
        run(&config(&inputs, output.clone()), &mut NoopObserver).unwrap();

        let mut again = config(&dir.path().join("missing.gpkg"), output.clone());
        again.regions = LayerSource::new(&inputs).with_layer("sa2");
        let mut recorder = Recorder::default();
        let err = run(&again, &mut recorder).unwrap_err();
        assert!(matches!(
            err,
            crate::PipelineError::GeoIo(GeoIoError::OutputExists { layer: Some(ref l), .. }) if l == "sa_twos"
        ));
        assert!(recorder.started.is_empty());
    }

    #[test]
    fn overwrite_replaces_only_the_target_layer() {
        let dir = tempfile::tempdir().unwrap();
        let inputs = write_inputs(&dir);
        let output = dir.path().join("coverage.gpkg");
        run(&config(&inputs, output.clone()), &mut NoopObserver).unwrap();

        let mut other = config(&inputs, output.clone());
        other.output = OutputTarget::new(&output).with_layer("clipped").append(true);
        other.boundary = Some(LayerSource::new(dir.path().join("urban.geojson")));
        let summary = run(&other, &mut NoopObserver).unwrap();
        assert_eq!(summary.mode, WriteMode::AddLayer);
        assert_eq!(summary.counts.clipped, 2);

        let mut replace = config(&inputs, output.clone());
        replace.output.overwrite = true;
        let summary = run(&replace, &mut NoopObserver).unwrap();
        assert_eq!(summary.mode, WriteMode::ReplaceLayer);

        let mut layers = gpkg::list_layers(&output).unwrap();
        layers.sort();
        assert_eq!(layers, ["clipped", "sa_twos"]);
        let clipped = gpkg::read_layer(&output, Some("clipped")).unwrap();
        let beta = &clipped.features[1];
        assert!(close(beta.attr("links_length").as_f64().unwrap(), 2.0));
    }

    #[test]
    fn geojson_output_keeps_missing_values_null() {
        let dir = tempfile::tempdir().unwrap();
        let inputs = write_inputs(&dir);
        let output = dir.path().join("coverage.geojson");
        run(&config(&inputs, output.clone()), &mut NoopObserver).unwrap();

        let text = std::fs::read_to_string(&output).unwrap();
        let json: serde_json::Value = serde_json::from_str(&text).unwrap();
        let features = json["features"].as_array().unwrap();
        assert_eq!(features.len(), 2);
        assert_eq!(features[1]["properties"]["SA2_CODE21"], "201011002");
        assert_eq!(features[1]["properties"]["cycleway_to_bikeable"], 0.0);
    }

    #[test]
    fn non_spatial_input_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let inputs = write_inputs(&dir);
        let conn = Connection::open(&inputs).unwrap();
        conn.execute_batch("CREATE TABLE notes (id INTEGER PRIMARY KEY, text TEXT);").unwrap();
        drop(conn);

        let mut config = config(&inputs, dir.path().join("coverage.gpkg"));
        config.network = LayerSource::new(&inputs).with_layer("notes");
        let err = run(&config, &mut NoopObserver).unwrap_err();
        assert!(matches!(err, crate::PipelineError::GeoIo(GeoIoError::NoGeometry { .. })));
    }
}
