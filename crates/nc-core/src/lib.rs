//! `nc-core`: foundational types for the `netcover` coverage engine.
//!
//! This crate is a dependency of every other `nc-*` crate.  It has no `nc-*`
//! dependencies and only two external ones (`geo` and `thiserror`, plus
//! optional `serde`).
//!
//! # What lives here
//!
//! | Module        | Contents                                                    |
//! |---------------|-------------------------------------------------------------|
//! | [`ids`]       | `EdgeId`, `RegionId`                                        |
//! | [`key`]       | `RegionKey`: the sole join key between regions and segments |
//! | [`attr`]      | `AttrValue`, `Attributes`                                   |
//! | [`predicate`] | `Predicate`: boolean test over segment attributes           |
//! | [`feature`]   | `NetworkEdge`, `RegionPolygon`, `SplitSegment`              |
//! | [`geom`]      | Finite-coordinate checks and envelope helpers               |
//! | [`error`]     | `CoreError`, `CoreResult`                                   |
//!
//! # Feature flags
//!
//! | Flag    | Effect                                                       |
//! |---------|--------------------------------------------------------------|
//! | `serde` | Adds `Serialize`/`Deserialize` to keys, values, predicates.  |
//!
//! `nc-pipeline` turns `serde` on for its TOML run configs.

pub mod attr;
pub mod error;
pub mod feature;
pub mod geom;
pub mod ids;
pub mod key;
pub mod predicate;


// ── Re-exports ────────────────────────────────────────────────────────────────

pub use attr::{AttrValue, Attributes};
pub use error::{CoreError, CoreResult};
pub use feature::{NetworkEdge, RegionPolygon, SplitSegment};
pub use ids::{EdgeId, RegionId};
pub use key::RegionKey;
pub use predicate::Predicate;
