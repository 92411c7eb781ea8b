//! Unit tests for nc-overlay.

#[cfg(test)]
mod fixtures {
    use geo::{polygon, LineString, MultiLineString, MultiPolygon};

    use nc_core::{AttrValue, Attributes, EdgeId, NetworkEdge, RegionKey, RegionPolygon};

    pub fn square(x0: f64, y0: f64, size: f64) -> MultiPolygon<f64> {
        MultiPolygon::new(vec![polygon![
            (x: x0, y: y0),
            (x: x0 + size, y: y0),
            (x: x0 + size, y: y0 + size),
            (x: x0, y: y0 + size),
            (x: x0, y: y0),
        ]])
    }

    pub fn region(key: &str, geometry: MultiPolygon<f64>) -> RegionPolygon {
        RegionPolygon::new(RegionKey::new(key).unwrap(), geometry, Attributes::new())
    }

    /// R1 = [0,10]², R2 = [10,20]×[0,10], R3 = [20,30]×[0,10].
    pub fn strip() -> Vec<RegionPolygon> {
        vec![
            region("R1", square(0.0, 0.0, 10.0)),
            region("R2", square(10.0, 0.0, 10.0)),
            region("R3", square(20.0, 0.0, 10.0)),
        ]
    }

    pub fn lines(parts: &[&[(f64, f64)]]) -> MultiLineString<f64> {
        MultiLineString::new(parts.iter().map(|p| LineString::from(p.to_vec())).collect())
    }

    pub fn edge(id: u32, source: &str, parts: &[&[(f64, f64)]], attrs: &[(&str, AttrValue)]) -> NetworkEdge {
        NetworkEdge::new(
            EdgeId(id),
            source,
            lines(parts),
            attrs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect(),
        )
    }

    pub fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }
}

// ── RegionIndex ───────────────────────────────────────────────────────────────

#[cfg(test)]
mod index {
    use geo::Rect;

    use super::fixtures::{region, square, strip};
    use crate::{OverlayError, RegionIndex};
    use nc_core::RegionId;

    #[test]
    fn candidates_come_back_in_region_order() {
        let regions = strip();
        let index = RegionIndex::build(&regions).unwrap();
        let window = Rect::new((5.0, 1.0), (25.0, 2.0));
        assert_eq!(index.candidates(&window), [RegionId(0), RegionId(1), RegionId(2)]);
        let window = Rect::new((12.0, 1.0), (13.0, 2.0));
        assert_eq!(index.candidates(&window), [RegionId(1)]);
        assert_eq!(index.region(RegionId(1)).key.as_str(), "R2");
    }

    #[test]
    fn far_away_window_finds_nothing() {
        let regions = strip();
        let index = RegionIndex::build(&regions).unwrap();
        assert!(index.candidates(&Rect::new((100.0, 100.0), (101.0, 101.0))).is_empty());
    }

    #[test]
    fn non_finite_region_is_rejected() {
        let regions = vec![region("bad", square(f64::INFINITY, 0.0, 1.0))];
        assert!(matches!(RegionIndex::build(&regions), Err(OverlayError::Core(_))));
    }
}

// ── OverlaySplitter ───────────────────────────────────────────────────────────

#[cfg(test)]
mod splitter {
    use geo::{Euclidean, Length};

    use super::fixtures::{close, edge, lines, strip};
    use crate::{OverlayError, OverlaySplitter};
    use nc_core::{AttrValue, EdgeId};

    #[test]
    fn edge_inside_one_region_keeps_its_shape() {
        let regions = strip();
        let splitter = OverlaySplitter::new(&regions).unwrap();
        let e = edge(0, "a", &[&[(1.0, 1.0), (4.0, 5.0), (9.0, 5.0)]], &[("cycleway", "lane".into())]);
        let segments = splitter.split_edge(&e);
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].region.as_str(), "R1");
        assert_eq!(segments[0].geometry, e.geometry);
        assert!(close(segments[0].length, 10.0));
        assert_eq!(segments[0].attr("cycleway"), &AttrValue::from("lane"));
        assert_eq!(segments[0].edge, EdgeId(0));
    }

    #[test]
    fn straddling_edge_splits_evenly() {
        let regions = strip();
        let splitter = OverlaySplitter::new(&regions).unwrap();
        let e = edge(3, "s", &[&[(7.5, 5.0), (12.5, 5.0)]], &[]);
        let segments = splitter.split_edge(&e);
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0].region.as_str(), "R1");
        assert_eq!(segments[1].region.as_str(), "R2");
        assert!(close(segments[0].length, 2.5));
        assert!(close(segments[1].length, 2.5));
        assert!(close(Euclidean.length(&segments[0].geometry), 2.5));
    }

    #[test]
    fn edge_outside_every_region_yields_nothing() {
        let regions = strip();
        let splitter = OverlaySplitter::new(&regions).unwrap();
        let e = edge(0, "far", &[&[(0.0, 50.0), (10.0, 50.0)]], &[]);
        assert!(splitter.split_edge(&e).is_empty());
    }

    #[test]
    fn point_contact_is_dropped() {
        let regions = strip();
        let splitter = OverlaySplitter::new(&regions).unwrap();
        // Touches R3 only at its right-hand edge.
        let e = edge(0, "t", &[&[(30.0, 5.0), (35.0, 5.0)]], &[]);
        assert!(splitter.split_edge(&e).is_empty());
    }

    #[test]
    fn length_is_conserved_across_regions() {
        let regions = strip();
        let splitter = OverlaySplitter::new(&regions).unwrap();
        let e = edge(0, "z", &[&[(1.0, 1.0), (15.0, 9.0), (29.0, 1.0)], &[(2.0, 2.0), (2.0, 8.0)]], &[]);
        let segments = splitter.split_edge(&e);
        assert_eq!(segments.len(), 3);
        let total: f64 = segments.iter().map(|s| s.length).sum();
        assert!((total - e.length()).abs() < 1e-9 * e.length());
    }

    #[test]
    fn part_outside_all_regions_is_dropped() {
        let regions = strip();
        let splitter = OverlaySplitter::new(&regions).unwrap();
        let e = edge(0, "o", &[&[(5.0, 5.0), (5.0, 15.0)]], &[]);
        let segments = splitter.split_edge(&e);
        assert_eq!(segments.len(), 1);
        assert!(close(segments[0].length, 5.0));
    }

    #[test]
    fn split_keeps_edge_order() {
        let regions = strip();
        let splitter = OverlaySplitter::new(&regions).unwrap();
        let edges = vec![
            edge(0, "a", &[&[(25.0, 5.0), (26.0, 5.0)]], &[]),
            edge(1, "b", &[&[(5.0, 5.0), (15.0, 5.0)]], &[]),
            edge(2, "c", &[&[(1.0, 1.0), (2.0, 1.0)]], &[]),
        ];
        let segments = splitter.split(&edges).unwrap();
        let order: Vec<(u32, &str)> = segments.iter().map(|s| (s.edge.0, s.region.as_str())).collect();
        assert_eq!(order, [(0, "R3"), (1, "R1"), (1, "R2"), (2, "R1")]);
    }

    #[test]
    fn non_finite_edge_is_rejected() {
        let regions = strip();
        let splitter = OverlaySplitter::new(&regions).unwrap();
        let mut e = edge(0, "nan", &[&[(1.0, 1.0), (2.0, 2.0)]], &[]);
        e.geometry = lines(&[&[(1.0, 1.0), (f64::NAN, 2.0)]]);
        assert!(matches!(splitter.split(&[e]), Err(OverlayError::Core(_))));
    }
}

// ── ExtentClipper ─────────────────────────────────────────────────────────────

#[cfg(test)]
mod clipper {
    use geo::{Area, BoundingRect, Euclidean, Length, MultiPolygon};

    use super::fixtures::{close, edge, lines, square};
    use crate::{ExtentClipper, OverlayError};
    use nc_core::AttrValue;

    #[test]
    fn lines_are_cut_to_the_extent() {
        let clipper = ExtentClipper::new(square(0.0, 0.0, 10.0)).unwrap();
        let clipped = clipper.clip_lines(&lines(&[&[(5.0, 5.0), (15.0, 5.0)]])).unwrap();
        assert!(close(Euclidean.length(&clipped), 5.0));
        let rect = clipped.bounding_rect().unwrap();
        assert!(close(rect.min().x, 5.0) && close(rect.max().x, 10.0));
        assert!(clipper.clip_lines(&lines(&[&[(20.0, 5.0), (25.0, 5.0)]])).is_none());
    }

    #[test]
    fn clipped_edges_keep_ids_and_attributes() {
        let clipper = ExtentClipper::new(square(0.0, 0.0, 10.0)).unwrap();
        let edges = vec![
            edge(4, "in", &[&[(5.0, 5.0), (15.0, 5.0)]], &[("is_cycle", 1i64.into())]),
            edge(5, "out", &[&[(50.0, 5.0), (60.0, 5.0)]], &[]),
        ];
        let kept = clipper.clip_edges(edges);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].id.0, 4);
        assert!(close(kept[0].length(), 5.0));
        assert_eq!(kept[0].attr("is_cycle"), &AttrValue::Int(1));
    }

    #[test]
    fn polygons_are_intersected() {
        let clipper = ExtentClipper::new(square(0.0, 0.0, 10.0)).unwrap();
        let half = clipper.clip_polygon(&square(5.0, 0.0, 10.0)).unwrap();
        assert!(close(half.unsigned_area(), 50.0));
        // Sharing only a border is no overlap.
        assert!(clipper.clip_polygon(&square(10.0, 0.0, 10.0)).is_none());
    }

    #[test]
    fn extent_without_area_is_rejected() {
        assert!(matches!(ExtentClipper::new(MultiPolygon::new(vec![])), Err(OverlayError::EmptyExtent)));
    }
}

// ── EdgePreAggregator ─────────────────────────────────────────────────────────

#[cfg(test)]
mod dissolve {
    use geo::LineString;

    use super::fixtures::{close, edge, region, square};
    use crate::{EdgePreAggregator, OverlayError, OverlaySplitter};
    use nc_core::AttrValue;

    #[test]
    fn base_id_is_cut_at_the_first_separator() {
        let agg = EdgePreAggregator::with_separator("-").unwrap();
        assert_eq!(agg.base_id("w12-0-a"), "w12");
        assert_eq!(agg.base_id("w12"), "w12");
        assert_eq!(EdgePreAggregator::new().base_id("w12-0"), "w12-0");
        assert!(matches!(EdgePreAggregator::with_separator(""), Err(OverlayError::EmptySeparator)));
    }

    #[test]
    fn records_merge_with_or_semantics() {
        let agg = EdgePreAggregator::with_separator("-").unwrap();
        let edges = vec![
            edge(0, "w1-0", &[&[(0.0, 0.0), (10.0, 0.0)]], &[
                ("cycleway", AttrValue::Null),
                ("is_cycle", 0i64.into()),
                ("lit", false.into()),
                ("name", "Main".into()),
            ]),
            edge(1, "w2-0", &[&[(0.0, 5.0), (1.0, 5.0)]], &[("is_cycle", 0i64.into())]),
            edge(2, "w1-1", &[&[(10.0, 0.0), (0.0, 0.0)]], &[
                ("cycleway", "track".into()),
                ("is_cycle", 1i64.into()),
                ("lit", true.into()),
                ("name", "Other".into()),
            ]),
            edge(3, "w1-2", &[&[(0.0, 0.0), (10.0, 0.0)]], &[("surface", "asphalt".into())]),
        ];
        let merged = agg.aggregate(edges);
        assert_eq!(merged.len(), 2);

        let w1 = &merged[0];
        assert_eq!(w1.source_id, "w1");
        assert_eq!(w1.id.0, 0);
        assert_eq!(w1.attr("cycleway"), &AttrValue::from("track"));
        assert_eq!(w1.attr("is_cycle"), &AttrValue::Int(1));
        assert_eq!(w1.attr("lit"), &AttrValue::Bool(true));
        assert_eq!(w1.attr("name"), &AttrValue::from("Main"));
        assert_eq!(w1.attr("surface"), &AttrValue::from("asphalt"));
        // Reversed and exact repeats of the same line add no parts.
        assert_eq!(w1.geometry.0.len(), 1);
        assert!(close(w1.length(), 10.0));

        assert_eq!(merged[1].source_id, "w2");
        assert_eq!(merged[1].attr("is_cycle"), &AttrValue::Int(0));
    }

    #[test]
    fn opposite_direction_records_keep_the_physical_length() {
        let agg = EdgePreAggregator::with_separator("-").unwrap();
        let edges = vec![
            edge(0, "w1-0", &[&[(1.0, 5.0), (9.0, 5.0)]], &[]),
            edge(1, "w1-1", &[&[(9.0, 5.0), (1.0, 5.0)]], &[]),
        ];
        let merged = agg.aggregate(edges);
        assert_eq!(merged.len(), 1);
        assert!(close(merged[0].length(), 8.0));

        let regions = vec![region("R1", square(0.0, 0.0, 10.0))];
        let segments = OverlaySplitter::new(&regions).unwrap().split(&merged).unwrap();
        let total: f64 = segments.iter().map(|s| s.length).sum();
        assert!(close(total, 8.0), "total {total}");
    }

    #[test]
    fn merged_geometry_adds_only_uncovered_stretches() {
        let agg = EdgePreAggregator::with_separator("-").unwrap();
        let edges = vec![
            edge(0, "w1-0", &[&[(0.0, 0.0), (4.0, 0.0)]], &[]),
            // Overlaps (2,0)→(4,0) backwards, then carries on to (4,3).
            edge(1, "w1-1", &[&[(3.0, 0.0), (2.0, 0.0), (4.0, 0.0), (4.0, 3.0)]], &[]),
            // Lies inside the first record's line without sharing its vertices.
            edge(2, "w1-2", &[&[(1.0, 0.0), (3.0, 0.0)]], &[]),
        ];
        let merged = agg.aggregate(edges);
        let w1 = &merged[0];
        assert_eq!(w1.geometry.0.len(), 2);
        assert_eq!(w1.geometry.0[1], LineString::from(vec![(4.0, 0.0), (4.0, 3.0)]));
        assert!(close(w1.length(), 7.0));
    }

    #[test]
    fn without_separator_only_identical_ids_merge() {
        let agg = EdgePreAggregator::new();
        let edges = vec![
            edge(0, "a", &[&[(0.0, 0.0), (1.0, 0.0)]], &[]),
            edge(1, "a-1", &[&[(0.0, 0.0), (1.0, 0.0)]], &[]),
            edge(2, "a", &[&[(0.0, 0.0), (1.0, 0.0)]], &[]),
        ];
        let merged = agg.aggregate(edges);
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].geometry.0.len(), 1);
    }
}
