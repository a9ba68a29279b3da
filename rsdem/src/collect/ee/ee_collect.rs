use anyhow::{Context, Result};
use reqwest::blocking::Client;
use serde_json::{json, Value};
use std::path::Path;
use url::Url;

use crate::collect::global_variables::{EE_ACCESS_TOKEN_ENV, EE_API_ROOT, EE_PROJECT_ENV};
use crate::commons::basic_functions::ensure_dir;
use crate::geo_core::BoundingBox;

/// Authenticated Earth Engine session.
///
/// Established once per process and borrowed by every export request. Token
/// acquisition is not handled here; callers pass an OAuth2 access token
/// obtained externally (gcloud or a service account).
pub struct EeSession {
    client: Client,
    api_root: Url,
    project: String,
    token: String,
}

impl EeSession {
    pub fn new(project: impl Into<String>, token: impl Into<String>) -> Result<Self> {
        let api_root =
            Url::parse(EE_API_ROOT).context("Failed to parse the Earth Engine API root URL")?;

        Ok(EeSession {
            client: Client::new(),
            api_root,
            project: project.into(),
            token: token.into(),
        })
    }

    /// Build a session from the `EE_PROJECT` and `EE_ACCESS_TOKEN`
    /// environment variables.
    pub fn from_env() -> Result<Self> {
        let project = std::env::var(EE_PROJECT_ENV)
            .context(format!("Environment variable {} is not set", EE_PROJECT_ENV))?;
        let token = std::env::var(EE_ACCESS_TOKEN_ENV).context(format!(
            "Environment variable {} is not set",
            EE_ACCESS_TOKEN_ENV
        ))?;

        EeSession::new(project, token)
    }

    pub fn project(&self) -> &str {
        &self.project
    }

    fn compute_pixels_url(&self) -> Result<Url> {
        Url::parse(&format!(
            "{}/projects/{}/image:computePixels",
            self.api_root, self.project
        ))
        .context("Failed to build the computePixels request URL")
    }

    /// Export `image` clipped to `bbox` at `scale` meters per pixel and write
    /// the resulting GeoTIFF to `dest`.
    ///
    /// The response body is buffered in full before anything is written. A
    /// file that does not open as a raster afterwards is removed, so a failed
    /// export leaves no partial output behind.
    pub fn download_image(
        &self,
        image: &EeImage,
        bbox: &BoundingBox,
        scale: f64,
        crs: &str,
        dest: &Path,
    ) -> Result<()> {
        let grid = PixelGrid::for_bbox(bbox, scale);

        let body = json!({
            "expression": image.expression(),
            "fileFormat": "GEO_TIFF",
            "grid": {
                "dimensions": { "width": grid.width, "height": grid.height },
                "affineTransform": {
                    "scaleX": grid.scale_x,
                    "shearX": 0.0,
                    "translateX": grid.translate_x,
                    "shearY": 0.0,
                    "scaleY": grid.scale_y,
                    "translateY": grid.translate_y,
                },
                "crsCode": crs,
            },
        });

        let url = self.compute_pixels_url()?;
        let response = self
            .client
            .post(url)
            .bearer_auth(&self.token)
            .json(&body)
            .send()
            .context("Failed to send computePixels request to Earth Engine")?;

        if !response.status().is_success() {
            let status = response.status();
            let detail = response.text().unwrap_or_default();
            anyhow::bail!("Earth Engine returned {}: {}", status, detail);
        }

        let bytes = response
            .bytes()
            .context("Failed to read export response body")?;

        if let Some(parent) = dest.parent() {
            ensure_dir(parent)?;
        }
        std::fs::write(dest, &bytes).context(format!("Failed to write raster: {:?}", dest))?;

        // The export contract is all-or-nothing: drop anything GDAL cannot
        // open as a raster.
        if let Err(e) = gdal::Dataset::open(dest) {
            let _ = std::fs::remove_file(dest);
            anyhow::bail!("Downloaded raster failed validation ({:?}): {}", dest, e);
        }

        Ok(())
    }
}

/// Server-side image description, the serialized expression graph the API
/// evaluates. Building one is a local lookup with no network traffic.
#[derive(Debug, Clone)]
pub struct EeImage {
    expression: Value,
}

impl EeImage {
    /// Flattened mosaic of every image in a collection asset.
    pub fn collection_mosaic(asset_id: &str) -> Self {
        let expression = json!({
            "result": "1",
            "values": {
                "0": { "functionInvocationValue": {
                    "functionName": "ImageCollection.load",
                    "arguments": { "id": { "constantValue": asset_id } }
                }},
                "1": { "functionInvocationValue": {
                    "functionName": "ImageCollection.mosaic",
                    "arguments": { "collection": { "valueReference": "0" } }
                }},
            }
        });

        EeImage { expression }
    }

    /// Single named band of a single image asset.
    pub fn image_band(asset_id: &str, band: &str) -> Self {
        let expression = json!({
            "result": "1",
            "values": {
                "0": { "functionInvocationValue": {
                    "functionName": "Image.load",
                    "arguments": { "id": { "constantValue": asset_id } }
                }},
                "1": { "functionInvocationValue": {
                    "functionName": "Image.select",
                    "arguments": {
                        "input": { "valueReference": "0" },
                        "bandSelectors": { "constantValue": [band] }
                    }
                }},
            }
        });

        EeImage { expression }
    }

    pub fn expression(&self) -> &Value {
        &self.expression
    }
}

/// Output pixel grid for one export, derived from the bounding box and the
/// requested ground resolution in meters.
#[derive(Debug, Clone, Copy)]
pub struct PixelGrid {
    pub width: u32,
    pub height: u32,
    pub scale_x: f64,
    pub scale_y: f64,
    pub translate_x: f64,
    pub translate_y: f64,
}

impl PixelGrid {
    /// Size a north-up grid that covers `bbox` exactly.
    ///
    /// Degree extents convert to meters at the box center latitude, which is
    /// accurate enough for sizing an export grid.
    pub fn for_bbox(bbox: &BoundingBox, scale: f64) -> Self {
        let deg_to_m_lat = 111_320.0;
        let deg_to_m_lon = 40_075_000.0 * bbox.center_y().to_radians().cos() / 360.0;

        let width_m = bbox.width() * deg_to_m_lon;
        let height_m = bbox.height() * deg_to_m_lat;

        let width = (width_m / scale).ceil().max(1.0) as u32;
        let height = (height_m / scale).ceil().max(1.0) as u32;

        PixelGrid {
            width,
            height,
            scale_x: bbox.width() / width as f64,
            scale_y: -(bbox.height() / height as f64),
            translate_x: bbox.min_x,
            translate_y: bbox.max_y,
        }
    }
}
