//! Spatial index over region polygons.
//!
//! The R-tree stores one bounding box per region.  A lookup returns every
//! region whose box overlaps the query box; the exact geometric test happens
//! in the splitter.

use geo::Rect;
use rstar::{RTree, RTreeObject, AABB};

use nc_core::geom::{ensure_finite, polygon_envelope};
use nc_core::{CoreError, RegionId, RegionPolygon};

use crate::OverlayResult;

// ── R-tree entry ──────────────────────────────────────────────────────────────

#[derive(Clone)]
struct RegionEntry {
    envelope: AABB<[f64; 2]>,
    id:       RegionId,
}

impl RTreeObject for RegionEntry {
    type Envelope = AABB<[f64; 2]>;
    fn envelope(&self) -> Self::Envelope {
        self.envelope
    }
}

fn aabb(rect: &Rect<f64>) -> AABB<[f64; 2]> {
    AABB::from_corners([rect.min().x, rect.min().y], [rect.max().x, rect.max().y])
}

// ── RegionIndex ───────────────────────────────────────────────────────────────

/// Borrowed view of the region set plus an R-tree over their envelopes.
///
/// `RegionId`s are positions in the slice the index was built from.
pub struct RegionIndex<'a> {
    regions: &'a [RegionPolygon],
    tree:    RTree<RegionEntry>,
}

impl<'a> RegionIndex<'a> {
    /// Bulk-load the index.  Regions with no coordinates are never returned
    /// as candidates.
    ///
    /// # Errors
    ///
    /// A region with a NaN or infinite coordinate.
    pub fn build(regions: &'a [RegionPolygon]) -> OverlayResult<Self> {
        let mut entries = Vec::with_capacity(regions.len());
        for (i, region) in regions.iter().enumerate() {
            ensure_finite(&region.geometry, || format!("region {}", region.key))?;
            if let Some(rect) = polygon_envelope(&region.geometry) {
                let id = RegionId::try_from(i)
                    .map_err(|_| CoreError::TooManyFeatures { what: "regions" })?;
                entries.push(RegionEntry { envelope: aabb(&rect), id });
            }
        }
        Ok(Self { regions, tree: RTree::bulk_load(entries) })
    }

    pub fn len(&self) -> usize {
        self.regions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    pub fn region(&self, id: RegionId) -> &'a RegionPolygon {
        &self.regions[id.index()]
    }

    /// Regions whose envelope overlaps `rect`, in region order.
    pub fn candidates(&self, rect: &Rect<f64>) -> Vec<RegionId> {
        let mut ids: Vec<RegionId> = self
            .tree
            .locate_in_envelope_intersecting(&aabb(rect))
            .map(|e| e.id)
            .collect();
        ids.sort_unstable();
        ids
    }
}
