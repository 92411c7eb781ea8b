//! `GeometryLoader`: read a layer and move it into the run's target CRS.

use log::{info, warn};

use crate::{gpkg, shp, Crs, DataFormat, FeatureLayer, GeoIoError, GeoIoResult, LayerSource, Reprojector};

/// Loads layers from any readable format, reprojected to one target CRS.
#[derive(Clone, Debug)]
pub struct GeometryLoader {
    target: Crs,
}

impl GeometryLoader {
    pub fn new(target: Crs) -> Self {
        Self { target }
    }

    pub fn target(&self) -> &Crs {
        &self.target
    }

    /// Read `source` and reproject every geometry to the target CRS.
    ///
    /// # Errors
    ///
    /// - [`GeoIoError::NoGeometry`] when the layer is not spatial.
    /// - [`GeoIoError::LayerNotFound`] when a named layer is absent.
    /// - [`GeoIoError::UnsupportedFormat`] for write-only or unknown formats.
    pub fn load(&self, source: &LayerSource) -> GeoIoResult<FeatureLayer> {
        let mut layer = match source.format()? {
            DataFormat::GeoJson    => crate::geojson::read_layer(&source.path, source.layer_name())?,
            DataFormat::GeoPackage => gpkg::read_layer(&source.path, source.layer_name())?,
            DataFormat::Shapefile  => shp::read_layer(&source.path, source.layer_name())?,
            DataFormat::Csv        => return Err(GeoIoError::UnsupportedFormat(source.path.clone())),
        };

        match layer.crs.take() {
            Some(crs) => {
                let reprojector = Reprojector::new(&crs, &self.target)?;
                if !reprojector.is_identity() {
                    for feature in &mut layer.features {
                        if let Some(g) = feature.geometry.as_mut() {
                            *g = reprojector.apply(g)?;
                        }
                    }
                }
            }
            None => warn!(
                "{}: layer {:?} declares no CRS; assuming {}",
                source.path.display(),
                layer.name,
                self.target
            ),
        }
        layer.crs = Some(self.target.clone());

        info!(
            "loaded {} features from {} (layer {:?})",
            layer.len(),
            source.path.display(),
            layer.name
        );
        Ok(layer)
    }
}
