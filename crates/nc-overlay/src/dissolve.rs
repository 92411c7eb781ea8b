//! Edge pre-aggregation.
//!
//! Some networks store one logical edge as several records (per direction,
//! per condition) whose ids share a base and differ by a suffix, e.g.
//! `w123-0`, `w123-1`.  Counting each record separately would count the
//! same physical line more than once, so records are merged by base id
//! before the overlay.

use geo::{Coord, Intersects, Line, LineString, MultiLineString};
use log::debug;
use rustc_hash::FxHashMap;

use nc_core::NetworkEdge;

use crate::{OverlayError, OverlayResult};

/// Merges edge records that share a base id.
///
/// Merge rules, applied in record order:
///
/// | Attribute values          | Result                          |
/// |---------------------------|---------------------------------|
/// | `Bool`, `Bool`            | logical OR                      |
/// | numbers                   | maximum                         |
/// | `Null`, anything          | the non-null value              |
/// | anything else             | first record's value            |
///
/// The merged geometry is the line union of the group's parts: the first
/// record's parts, then the runs of each later part that do not already lie
/// on a merged segment.  A sub-record storing the same line in the opposite
/// direction (or a stretch of it) adds nothing.  The merged edge keeps the
/// first record's `EdgeId`; its `source_id` becomes the base id.
#[derive(Clone, Debug, Default)]
pub struct EdgePreAggregator {
    separator: Option<String>,
}

impl EdgePreAggregator {
    /// Group by the whole source id.
    pub fn new() -> Self {
        Self { separator: None }
    }

    /// Group by the part of the source id before the first `separator`.
    pub fn with_separator(separator: impl Into<String>) -> OverlayResult<Self> {
        let separator = separator.into();
        if separator.is_empty() {
            return Err(OverlayError::EmptySeparator);
        }
        Ok(Self { separator: Some(separator) })
    }

    pub fn base_id<'s>(&self, source_id: &'s str) -> &'s str {
        match &self.separator {
            Some(sep) => source_id.split_once(sep.as_str()).map_or(source_id, |(base, _)| base),
            None      => source_id,
        }
    }

    /// Merge `edges`; groups appear in the order of their first record.
    pub fn aggregate(&self, edges: Vec<NetworkEdge>) -> Vec<NetworkEdge> {
        let input = edges.len();
        let mut slot: FxHashMap<String, usize> = FxHashMap::default();
        let mut merged: Vec<NetworkEdge> = Vec::with_capacity(edges.len());

        for mut edge in edges {
            let base = self.base_id(&edge.source_id).to_string();
            match slot.get(&base) {
                Some(&i) => merge_into(&mut merged[i], edge),
                None => {
                    slot.insert(base.clone(), merged.len());
                    edge.source_id = base;
                    merged.push(edge);
                }
            }
        }
        debug!("pre-aggregated {input} edge records into {} edges", merged.len());
        merged
    }
}

fn merge_into(target: &mut NetworkEdge, other: NetworkEdge) {
    for (name, value) in other.attrs {
        let current = target.attrs.remove(&name).unwrap_or_default();
        target.attrs.insert(name, current.merge_any(&value));
    }
    for part in &other.geometry.0 {
        let fresh = uncovered_runs(&target.geometry, part);
        target.geometry.0.extend(fresh);
    }
}

/// The runs of `part` whose segments do not lie on any segment of `merged`.
fn uncovered_runs(merged: &MultiLineString<f64>, part: &LineString<f64>) -> Vec<LineString<f64>> {
    let mut runs = Vec::new();
    let mut run: Vec<Coord<f64>> = Vec::new();
    for seg in part.lines() {
        if is_covered(merged, &seg) {
            if run.len() >= 2 {
                runs.push(LineString::new(std::mem::take(&mut run)));
            }
            run.clear();
            continue;
        }
        if run.is_empty() {
            run.push(seg.start);
        }
        run.push(seg.end);
    }
    if run.len() >= 2 {
        runs.push(LineString::new(run));
    }
    runs
}

fn is_covered(merged: &MultiLineString<f64>, seg: &Line<f64>) -> bool {
    merged
        .0
        .iter()
        .flat_map(|ls| ls.lines())
        .any(|on| on.intersects(&seg.start) && on.intersects(&seg.end))
}
