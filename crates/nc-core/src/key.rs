//! Region join key.

use std::borrow::Borrow;
use std::fmt;

use crate::{AttrValue, CoreError, CoreResult};

/// Unique code identifying one administrative region (e.g. an SA2 code).
///
/// The key is the only thing joining split segments back to their region, so
/// it is never empty.  Uniqueness across a region set is checked when the
/// coverage table is built, not here.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize), serde(transparent))]
pub struct RegionKey(String);

impl RegionKey {
    pub fn new(key: impl Into<String>) -> CoreResult<Self> {
        let key = key.into();
        if key.trim().is_empty() {
            return Err(CoreError::EmptyRegionKey);
        }
        Ok(Self(key))
    }

    /// Build a key from an attribute value.
    ///
    /// Text is used verbatim; integers (and integral floats, which is how some
    /// drivers hand back numeric codes) are formatted without a fraction.
    pub fn from_attr(value: &AttrValue) -> CoreResult<Self> {
        match value {
            AttrValue::Text(s) => Self::new(s.clone()),
            AttrValue::Int(i) => Self::new(i.to_string()),
            AttrValue::Float(f) if f.is_finite() && f.fract() == 0.0 => {
                Self::new(format!("{}", *f as i64))
            }
            AttrValue::Null => Err(CoreError::EmptyRegionKey),
            other => Err(CoreError::InvalidKeyValue(other.to_string())),
        }
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for RegionKey {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RegionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
