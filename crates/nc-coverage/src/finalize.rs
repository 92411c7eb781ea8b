//! Turning a `CoverageTable` into the reported result.

use geo::MultiPolygon;
use log::{debug, info};

use nc_core::{Attributes, RegionKey};
use nc_overlay::ExtentClipper;

use crate::{Column, ColumnKind, CoverageTable};

/// One output row: a region, its own attributes and the computed values.
#[derive(Clone, Debug, PartialEq)]
pub struct CoverageRecord {
    pub key:      RegionKey,
    pub geometry: MultiPolygon<f64>,
    pub attrs:    Attributes,
    /// Aligned with [`FinalTable::columns`].
    pub values:   Vec<Option<f64>>,
}

/// The finished per-region table.
#[derive(Clone, Debug, Default)]
pub struct FinalTable {
    pub columns:         Vec<Column>,
    pub records:         Vec<CoverageRecord>,
    /// Regions dropped because every coverage value was missing.
    pub dropped_empty:   usize,
    /// Regions dropped because they lie outside the display extent.
    pub dropped_outside: usize,
}

impl FinalTable {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    /// Value at `row` in column `name`; `None` when missing or unknown.
    pub fn value(&self, row: usize, name: &str) -> Option<f64> {
        let col = self.column_index(name)?;
        self.records.get(row)?.values[col]
    }

    pub fn record(&self, key: &str) -> Option<&CoverageRecord> {
        self.records.iter().find(|r| r.key.as_str() == key)
    }
}

/// Drops regions without any coverage value and optionally restricts the
/// rest to a display extent.
#[derive(Clone, Debug, Default)]
pub struct ResultFinalizer {
    extent: Option<ExtentClipper>,
}

impl ResultFinalizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Report only regions overlapping `extent`, with their geometry clipped
    /// to it.  Values are not recomputed.
    pub fn with_display_extent(mut self, extent: ExtentClipper) -> Self {
        self.extent = Some(extent);
        self
    }

    pub fn finalize(&self, table: CoverageTable) -> FinalTable {
        let (columns, rows) = table.into_parts();
        let coverage: Vec<usize> = columns
            .iter()
            .enumerate()
            .filter(|(_, c)| c.kind == ColumnKind::Coverage)
            .map(|(i, _)| i)
            .collect();

        let mut out = FinalTable { columns, ..FinalTable::default() };
        for (region, values) in rows {
            if !coverage.is_empty() && coverage.iter().all(|&i| values[i].is_none()) {
                out.dropped_empty += 1;
                continue;
            }
            let geometry = match &self.extent {
                None => region.geometry,
                Some(clipper) => match clipper.clip_polygon(&region.geometry) {
                    Some(clipped) => clipped,
                    None => {
                        out.dropped_outside += 1;
                        continue;
                    }
                },
            };
            out.records.push(CoverageRecord {
                key: region.key,
                geometry,
                attrs: region.attrs,
                values,
            });
        }

        if out.dropped_empty > 0 {
            debug!("dropped {} regions without network length", out.dropped_empty);
        }
        if out.dropped_outside > 0 {
            debug!("dropped {} regions outside the display extent", out.dropped_outside);
        }
        info!("{} regions in the final table", out.records.len());
        out
    }
}
