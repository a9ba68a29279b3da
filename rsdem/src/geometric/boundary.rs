use anyhow::Result;
use gdal::vector::LayerAccess;
use gdal::Dataset;
use geo::BoundingRect;
use geojson::GeoJson;
use std::path::Path;

use crate::errors::InputError;
use crate::geo_core::BoundingBox;

/// Read a boundary file and return one axis-aligned envelope per feature, in
/// file order. Envelopes are reported in the file's native reference system.
///
/// GeoJSON files are parsed directly; anything else (typically an ESRI
/// Shapefile) goes through GDAL. A missing, unreadable or feature-less file
/// is a fatal [`InputError`], surfaced before any download is attempted.
pub fn extract_bounding_boxes(path: &Path) -> Result<Vec<BoundingBox>> {
    if !path.exists() {
        return Err(InputError::Missing(path.to_path_buf()).into());
    }

    let is_geojson = matches!(
        path.extension().and_then(|ext| ext.to_str()),
        Some("geojson") | Some("json")
    );

    let boxes = if is_geojson {
        geojson_bounding_boxes(path)?
    } else {
        vector_bounding_boxes(path)?
    };

    // An empty batch is a misconfiguration, not a valid no-op.
    if boxes.is_empty() {
        return Err(InputError::NoFeatures(path.to_path_buf()).into());
    }

    Ok(boxes)
}

/// Envelope of every feature in the first layer of a GDAL vector dataset.
fn vector_bounding_boxes(path: &Path) -> Result<Vec<BoundingBox>> {
    let dataset = Dataset::open(path).map_err(|e| InputError::Unreadable {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;

    let mut layer = dataset.layer(0).map_err(|e| InputError::Unreadable {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;

    let mut boxes = Vec::new();
    for feature in layer.features() {
        if let Some(geometry) = feature.geometry() {
            let envelope = geometry.envelope();
            boxes.push(BoundingBox::new(
                envelope.MinX,
                envelope.MinY,
                envelope.MaxX,
                envelope.MaxY,
            ));
        }
    }

    Ok(boxes)
}

/// Envelope of every feature in a GeoJSON document.
fn geojson_bounding_boxes(path: &Path) -> Result<Vec<BoundingBox>> {
    let raw = std::fs::read_to_string(path).map_err(|e| InputError::Unreadable {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;

    let geojson: GeoJson = raw.parse().map_err(|e: geojson::Error| InputError::Unreadable {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;

    let mut boxes = Vec::new();
    match &geojson {
        GeoJson::FeatureCollection(collection) => {
            for feature in &collection.features {
                if let Some(geometry) = &feature.geometry {
                    if let Some(bbox) = geometry_envelope(geometry) {
                        boxes.push(bbox);
                    }
                }
            }
        }
        GeoJson::Feature(feature) => {
            if let Some(geometry) = &feature.geometry {
                if let Some(bbox) = geometry_envelope(geometry) {
                    boxes.push(bbox);
                }
            }
        }
        GeoJson::Geometry(geometry) => {
            if let Some(bbox) = geometry_envelope(geometry) {
                boxes.push(bbox);
            }
        }
    }

    Ok(boxes)
}

/// Envelope of a single GeoJSON geometry. Geometries that do not convert or
/// have no extent (empty collections) yield `None` and are skipped.
fn geometry_envelope(geometry: &geojson::Geometry) -> Option<BoundingBox> {
    let geom = geo::Geometry::<f64>::try_from(geometry).ok()?;
    geom.bounding_rect().map(BoundingBox::from)
}
