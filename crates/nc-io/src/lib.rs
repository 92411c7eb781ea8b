//! `nc-io`: the I/O edge of the coverage engine.
//!
//! Everything here is glue with a narrow contract: read a named layer into
//! memory in the run's target CRS, turn it into core features, and write the
//! result layer without ever silently replacing existing data.
//!
//! # Crate layout
//!
//! | Module         | Contents                                                   |
//! |----------------|------------------------------------------------------------|
//! | [`source`]     | `LayerSource`, `DataFormat`                                |
//! | [`layer`]      | `FeatureLayer`, `Feature`: format-neutral in-memory layer  |
//! | [`loader`]     | `GeometryLoader`: read + reproject                         |
//! | [`crs`]        | `Crs`, `Reprojector` (`proj4rs`)                           |
//! | [`convert`]    | Layer → `NetworkEdge` / `RegionPolygon` / boundary         |
//! | [`wkb`]        | Well-Known Binary codec                                    |
//! | [`gpkg`]       | GeoPackage + OGR-SQLite reader, GeoPackage writer          |
//! | [`spatialite`] | SpatiaLite geometry blob decoder                           |
//! | [`shp`]        | Shapefile reader, plain or zipped (`shapefile`, `zip`)     |
//! | [`geojson`]    | GeoJSON reader and writer                                  |
//! | [`csv`]        | Attribute-only CSV writer                                  |
//! | [`writer`]     | `LayerWriter` trait, `OutputTarget`, destination checks    |
//! | [`error`]      | `GeoIoError`, `GeoIoResult<T>`                             |
//!
//! # Feature flags
//!
//! | Flag           | Effect                                                     |
//! |----------------|------------------------------------------------------------|
//! | `serde`        | Derives `Serialize`/`Deserialize` on sources and targets.  |

pub mod convert;
pub mod crs;
pub mod csv;
pub mod error;
pub mod geojson;
pub mod gpkg;
pub mod layer;
pub mod loader;
pub mod shp;
pub mod source;
pub mod spatialite;
pub mod wkb;
pub mod writer;


pub use convert::{boundary_polygon, network_edges, region_polygons};
pub use crs::{Crs, Reprojector};
pub use error::{GeoIoError, GeoIoResult};
pub use layer::{Feature, FeatureLayer};
pub use loader::GeometryLoader;
pub use source::{DataFormat, LayerSource};
pub use writer::{check_destination, layer_exists, write_output, LayerWriter, OutputTarget, WriteMode};
