//! `CoverageTable`: the region set plus the columns computed over it.
//!
//! # Algorithm
//!
//! ```text
//! group segments by region key   (unknown key → JoinCardinalityError)
//! links_length[r]  = Σ length                     (once per table; missing if r has none)
//! <m>_length[r]    = Σ length where predicate(m)  (0 when nothing matches)
//! <m>_coverage[r]  = <m>_length[r] / links_length[r]   (missing if total missing or 0)
//! <ratio>[r]       = <a>_coverage[r] / <b>_coverage[r] (missing if either missing or b == 0)
//! ```
//!
//! Values are stored column-major.  Each region's sum adds its segments in
//! input order, so the sums are bit-identical with and without the
//! `parallel` feature.

use std::collections::BTreeSet;

use log::debug;
use rustc_hash::FxHashMap;

use nc_core::{RegionKey, RegionPolygon, SplitSegment};

use crate::{CoverageError, CoverageResult, JoinCardinalityError, MetricSpec, RatioSpec};

/// Name of the total-length column.
pub const TOTAL_COLUMN: &str = "links_length";

// ── Columns ───────────────────────────────────────────────────────────────────

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ColumnKind {
    /// `links_length`.
    Total,
    /// `<metric>_length`.
    Length,
    /// `<metric>_coverage`.
    Coverage,
    /// A derived ratio of two coverages.
    Ratio,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Column {
    pub name: String,
    pub kind: ColumnKind,
}

// ── CoverageTable ─────────────────────────────────────────────────────────────

pub struct CoverageTable {
    regions: Vec<RegionPolygon>,
    slot:    FxHashMap<RegionKey, usize>,
    /// Names already taken: region attributes plus computed columns.
    taken:   BTreeSet<String>,
    columns: Vec<Column>,
    values:  Vec<Vec<Option<f64>>>,
    /// Metric name → index of its coverage column.
    metrics: Vec<(String, usize)>,
}

impl CoverageTable {
    /// # Errors
    ///
    /// [`JoinCardinalityError::DuplicateKey`] if two regions share a key.
    pub fn new(regions: Vec<RegionPolygon>) -> CoverageResult<Self> {
        let mut slot = FxHashMap::default();
        slot.reserve(regions.len());
        for (i, region) in regions.iter().enumerate() {
            if slot.insert(region.key.clone(), i).is_some() {
                return Err(JoinCardinalityError::DuplicateKey(region.key.clone()).into());
            }
        }
        let taken = regions.iter().flat_map(|r| r.attrs.keys().cloned()).collect();
        Ok(Self {
            regions,
            slot,
            taken,
            columns: Vec::new(),
            values:  Vec::new(),
            metrics: Vec::new(),
        })
    }

    pub fn len(&self) -> usize {
        self.regions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    pub fn regions(&self) -> &[RegionPolygon] {
        &self.regions
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Values of column `name`, aligned with [`regions`](Self::regions).
    pub fn column(&self, name: &str) -> Option<&[Option<f64>]> {
        let i = self.columns.iter().position(|c| c.name == name)?;
        Some(&self.values[i])
    }

    /// One cell, by region key and column name.
    pub fn value(&self, key: &str, column: &str) -> Option<f64> {
        let row = *self.slot.get(key)?;
        self.column(column)?[row]
    }

    pub fn has_totals(&self) -> bool {
        self.columns.first().is_some_and(|c| c.kind == ColumnKind::Total)
    }

    /// Compute `links_length` from `segments` unless already present.
    pub fn ensure_totals(&mut self, segments: &[SplitSegment]) -> CoverageResult<()> {
        if self.has_totals() {
            return Ok(());
        }
        self.check_free(TOTAL_COLUMN)?;
        let totals = self.region_sums(segments, |_| true)?;
        self.taken.insert(TOTAL_COLUMN.to_string());
        let measured = totals.iter().filter(|t| t.is_some()).count();
        debug!("{measured} of {} regions carry network length", self.len());
        self.columns.insert(0, Column { name: TOTAL_COLUMN.to_string(), kind: ColumnKind::Total });
        self.values.insert(0, totals);
        for (_, coverage) in &mut self.metrics {
            *coverage += 1;
        }
        Ok(())
    }

    /// Add `<name>_length` and `<name>_coverage` for one metric.
    ///
    /// Totals are computed first if this is the table's first metric.
    pub fn apply_metric(&mut self, segments: &[SplitSegment], metric: &MetricSpec) -> CoverageResult<()> {
        if metric.name.trim().is_empty() {
            return Err(CoverageError::EmptyName);
        }
        if self.metrics.iter().any(|(name, _)| *name == metric.name) {
            return Err(CoverageError::DuplicateMetric(metric.name.clone()));
        }
        self.ensure_totals(segments)?;
        let length_name = metric.length_column();
        let coverage_name = metric.coverage_column();
        self.check_free(&length_name)?;
        self.check_free(&coverage_name)?;

        let lengths: Vec<Option<f64>> = self
            .region_sums(segments, |s| metric.predicate.evaluate(&s.attrs))?
            .into_iter()
            .map(|l| Some(l.unwrap_or(0.0)))
            .collect();
        let coverage = lengths
            .iter()
            .zip(&self.values[0])
            .map(|(&length, &total)| divide(length, total))
            .collect();

        self.taken.insert(length_name.clone());
        self.taken.insert(coverage_name.clone());
        self.columns.push(Column { name: length_name, kind: ColumnKind::Length });
        self.values.push(lengths);
        self.columns.push(Column { name: coverage_name, kind: ColumnKind::Coverage });
        self.values.push(coverage);
        self.metrics.push((metric.name.clone(), self.columns.len() - 1));
        Ok(())
    }

    /// Add a ratio column between two metrics already applied.
    pub fn add_ratio(&mut self, ratio: &RatioSpec) -> CoverageResult<()> {
        let find = |name: &str| {
            self.metrics
                .iter()
                .find(|(m, _)| m == name)
                .map(|&(_, col)| col)
                .ok_or_else(|| CoverageError::UnknownMetric {
                    ratio:  ratio.name.clone(),
                    metric: name.to_string(),
                })
        };
        let numerator = find(&ratio.numerator)?;
        let denominator = find(&ratio.denominator)?;
        self.check_free(&ratio.name)?;
        self.taken.insert(ratio.name.clone());

        let values = self.values[numerator]
            .iter()
            .zip(&self.values[denominator])
            .map(|(&n, &d)| divide(n, d))
            .collect();
        self.columns.push(Column { name: ratio.name.clone(), kind: ColumnKind::Ratio });
        self.values.push(values);
        Ok(())
    }

    /// Split into the region list and row-major values, one `Vec` per region
    /// aligned with [`columns`](Self::columns).
    pub fn into_parts(self) -> (Vec<Column>, Vec<(RegionPolygon, Vec<Option<f64>>)>) {
        let values = self.values;
        let rows = self
            .regions
            .into_iter()
            .enumerate()
            .map(|(row, region)| {
                let cells = values.iter().map(|column| column[row]).collect();
                (region, cells)
            })
            .collect();
        (self.columns, rows)
    }

    // ── Internals ─────────────────────────────────────────────────────────

    /// Names are only recorded once every fallible step of a column
    /// addition has passed, so a failed addition leaves the table unchanged.
    fn check_free(&self, name: &str) -> CoverageResult<()> {
        if self.taken.contains(name) {
            Err(CoverageError::ColumnClash(name.to_string()))
        } else {
            Ok(())
        }
    }

    /// Segment indices per region, in segment order.
    fn group(&self, segments: &[SplitSegment]) -> Result<Vec<Vec<usize>>, JoinCardinalityError> {
        let mut groups = vec![Vec::new(); self.regions.len()];
        for (i, segment) in segments.iter().enumerate() {
            match self.slot.get(&segment.region) {
                Some(&row) => groups[row].push(i),
                None => return Err(JoinCardinalityError::UnknownKey(segment.region.clone())),
            }
        }
        Ok(groups)
    }

    /// Per-region sum of the lengths of segments passing `keep`; `None` for
    /// regions where no segment passes.
    fn region_sums<F>(&self, segments: &[SplitSegment], keep: F) -> CoverageResult<Vec<Option<f64>>>
    where
        F: Fn(&SplitSegment) -> bool + Sync,
    {
        let groups = self.group(segments)?;
        let sum = |members: &Vec<usize>| {
            members
                .iter()
                .map(|&i| &segments[i])
                .filter(|s| keep(s))
                .fold(None, |acc: Option<f64>, s| Some(acc.unwrap_or(0.0) + s.length))
        };

        #[cfg(not(feature = "parallel"))]
        let sums = groups.iter().map(sum).collect();

        #[cfg(feature = "parallel")]
        let sums = {
            use rayon::prelude::*;
            groups.par_iter().map(sum).collect()
        };

        Ok(sums)
    }
}

/// `n / d`, missing when either side is missing or `d` is zero.
fn divide(n: Option<f64>, d: Option<f64>) -> Option<f64> {
    match (n, d) {
        (Some(n), Some(d)) if d != 0.0 => Some(n / d),
        _ => None,
    }
}
