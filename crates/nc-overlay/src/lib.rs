//! `nc-overlay`: the geometric half of the coverage engine.
//!
//! ```text
//! edges ──▶ ExtentClipper (optional) ──▶ EdgePreAggregator (optional)
//!       ──▶ OverlaySplitter ──▶ SplitSegment per (edge, region) overlap
//! ```
//!
//! # Crate layout
//!
//! | Module       | Contents                                                  |
//! |--------------|-----------------------------------------------------------|
//! | [`index`]    | `RegionIndex`: R-tree over region bounding boxes          |
//! | [`splitter`] | `OverlaySplitter`: per-region fragments of every edge     |
//! | [`clipper`]  | `ExtentClipper`: restrict lines or polygons to an extent  |
//! | [`dissolve`] | `EdgePreAggregator`: merge records sharing a base id      |
//! | [`error`]    | `OverlayError`, `OverlayResult<T>`                        |
//!
//! # Feature flags
//!
//! | Flag       | Effect                                                   |
//! |------------|----------------------------------------------------------|
//! | `parallel` | Splits edges on Rayon's thread pool.                     |

pub mod clipper;
pub mod dissolve;
pub mod error;
pub mod index;
pub mod splitter;

#[cfg(test)]
mod tests;

pub use clipper::ExtentClipper;
pub use dissolve::EdgePreAggregator;
pub use error::{OverlayError, OverlayResult};
pub use index::RegionIndex;
pub use splitter::OverlaySplitter;
