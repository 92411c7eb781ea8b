//! Format-neutral in-memory layer.
//!
//! Both readers produce a [`FeatureLayer`] and all writers consume one, so the
//! pipeline never sees a file format.

use geo::{BoundingRect, Geometry, Rect};

use nc_core::{AttrValue, Attributes};

use crate::Crs;

/// One record: an optional geometry plus attributes.
#[derive(Clone, Debug, PartialEq, Default)]
pub struct Feature {
    /// Integer feature id, when the source format carries one.
    pub fid:      Option<i64>,
    pub geometry: Option<Geometry<f64>>,
    pub attrs:    Attributes,
}

impl Feature {
    pub fn new(geometry: Option<Geometry<f64>>, attrs: Attributes) -> Self {
        Self { fid: None, geometry, attrs }
    }

    pub fn attr(&self, name: &str) -> &AttrValue {
        self.attrs.get(name).unwrap_or(&AttrValue::Null)
    }
}

/// A named collection of features sharing a CRS and a column order.
#[derive(Clone, Debug, PartialEq)]
pub struct FeatureLayer {
    pub name:     String,
    /// `None` when the source did not declare a usable CRS.
    pub crs:      Option<Crs>,
    /// Attribute column names in source order.  Writers emit columns in this
    /// order; attributes not listed here are not written.
    pub schema:   Vec<String>,
    pub features: Vec<Feature>,
}

impl FeatureLayer {
    pub fn new(name: impl Into<String>, crs: Option<Crs>, schema: Vec<String>) -> Self {
        Self { name: name.into(), crs, schema, features: Vec::new() }
    }

    pub fn push(&mut self, feature: Feature) {
        self.features.push(feature);
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn has_field(&self, name: &str) -> bool {
        self.schema.iter().any(|c| c == name)
    }

    /// Combined bounding rectangle of every geometry, `None` if there are none.
    pub fn bounds(&self) -> Option<Rect<f64>> {
        self.features
            .iter()
            .filter_map(|f| f.geometry.as_ref()?.bounding_rect())
            .reduce(|a, b| {
                Rect::new(
                    (a.min().x.min(b.min().x), a.min().y.min(b.min().y)),
                    (a.max().x.max(b.max().x), a.max().y.max(b.max().y)),
                )
            })
    }
}

/// Append `name` to `schema` unless it is already there.
pub(crate) fn note_column(schema: &mut Vec<String>, name: &str) {
    if !schema.iter().any(|c| c == name) {
        schema.push(name.to_string());
    }
}
