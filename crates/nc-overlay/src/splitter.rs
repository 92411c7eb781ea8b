//! The overlay splitter: one fragment per (edge, region) overlap.
//!
//! For each edge the R-tree yields the regions whose boxes overlap the
//! edge's box; each candidate polygon then clips the edge.  Fragments are
//! measured after clipping, in CRS units.
//!
//! `geo`'s clip keeps boundary points, so a line running exactly along a
//! shared region border is reported in both regions.  Everything else is a
//! partition of the edge across the regions.

use geo::{BooleanOps, Euclidean, Length};
use log::debug;

use nc_core::geom::{ensure_finite, line_envelope};
use nc_core::{NetworkEdge, RegionPolygon, SplitSegment};

use crate::{OverlayResult, RegionIndex};

/// Relative tolerance for treating a fragment as the whole edge.
const WHOLE_EDGE_TOLERANCE: f64 = 1e-9;

/// Splits network edges at region boundaries.
pub struct OverlaySplitter<'a> {
    index: RegionIndex<'a>,
}

impl<'a> OverlaySplitter<'a> {
    pub fn new(regions: &'a [RegionPolygon]) -> OverlayResult<Self> {
        Ok(Self { index: RegionIndex::build(regions)? })
    }

    pub fn index(&self) -> &RegionIndex<'a> {
        &self.index
    }

    /// Fragments of one edge, in region order.
    ///
    /// An edge wholly inside one region yields a single segment carrying the
    /// unmodified edge geometry; an edge outside every region yields none.
    /// Fragments of zero length (an edge touching a region at a point) are
    /// dropped.
    pub fn split_edge(&self, edge: &NetworkEdge) -> Vec<SplitSegment> {
        let Some(envelope) = line_envelope(&edge.geometry) else {
            return Vec::new();
        };
        let edge_length = edge.length();
        let mut segments = Vec::new();
        for id in self.index.candidates(&envelope) {
            let region = self.index.region(id);
            let fragment = region.geometry.clip(&edge.geometry, false);
            let length = Euclidean.length(&fragment);
            if length <= 0.0 {
                continue;
            }
            let (geometry, length) =
                if (edge_length - length).abs() <= WHOLE_EDGE_TOLERANCE * edge_length {
                    (edge.geometry.clone(), edge_length)
                } else {
                    (fragment, length)
                };
            segments.push(SplitSegment {
                edge:   edge.id,
                region: region.key.clone(),
                geometry,
                length,
                attrs:  edge.attrs.clone(),
            });
        }
        segments
    }

    /// Split every edge.  Segments are grouped by edge, in edge order, with
    /// or without the `parallel` feature.
    ///
    /// # Errors
    ///
    /// An edge with a NaN or infinite coordinate.
    pub fn split(&self, edges: &[NetworkEdge]) -> OverlayResult<Vec<SplitSegment>> {
        for edge in edges {
            ensure_finite(&edge.geometry, || format!("edge {:?}", edge.source_id))?;
        }

        #[cfg(not(feature = "parallel"))]
        let segments: Vec<SplitSegment> = edges.iter().flat_map(|e| self.split_edge(e)).collect();

        #[cfg(feature = "parallel")]
        let segments: Vec<SplitSegment> = {
            use rayon::prelude::*;
            edges.par_iter().flat_map_iter(|e| self.split_edge(e)).collect()
        };

        debug!(
            "split {} edges against {} regions into {} segments",
            edges.len(),
            self.index.len(),
            segments.len()
        );
        Ok(segments)
    }
}
