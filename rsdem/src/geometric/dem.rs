use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

#[cfg(feature = "indicatif")]
use indicatif::{ProgressBar, ProgressStyle};

use crate::collect::ee::ee_collect::{EeImage, EeSession};
use crate::commons::basic_functions::ensure_dir;
use crate::geo_core::BoundingBox;
use crate::geometric::boundary::extract_bounding_boxes;

/// Reference system of every produced raster.
pub const DEM_CRS: &str = "EPSG:4326";

/// Default ground resolution in meters per pixel.
pub const DEFAULT_SCALE: f64 = 30.0;

const FABDEM_COLLECTION: &str = "projects/sat-io/open-datasets/FABDEM";
const ASTERDEM_ASSET: &str = "NASA/NASADEM_HGT/001";
const ASTERDEM_BAND: &str = "elevation";

#[cfg(feature = "indicatif")]
fn progress_style() -> ProgressStyle {
    ProgressStyle::default_bar()
        .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos:>4}/{len:4} {msg}")
        .unwrap()
        .progress_chars("##-")
}

/// The elevation products this crate can fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DemType {
    Fabdem,
    AsterDem,
}

impl DemType {
    /// Directory and file-name stem for this product.
    pub fn name(&self) -> &'static str {
        match self {
            DemType::Fabdem => "FABDEM",
            DemType::AsterDem => "ASTERDEM",
        }
    }

    /// Raster file name for `tile_index`.
    pub fn tile_file_name(&self, tile_index: usize) -> String {
        format!("{}_{}.tif", self.name(), tile_index)
    }

    /// Server-side image this product resolves to.
    pub fn ee_image(&self) -> EeImage {
        match self {
            DemType::Fabdem => EeImage::collection_mosaic(FABDEM_COLLECTION),
            DemType::AsterDem => EeImage::image_band(ASTERDEM_ASSET, ASTERDEM_BAND),
        }
    }
}

impl fmt::Display for DemType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Which products a batch should fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DemSelection {
    Fabdem,
    AsterDem,
    Both,
}

impl DemSelection {
    /// Requested product types, FABDEM first when both are selected.
    pub fn types(&self) -> &'static [DemType] {
        match self {
            DemSelection::Fabdem => &[DemType::Fabdem],
            DemSelection::AsterDem => &[DemType::AsterDem],
            DemSelection::Both => &[DemType::Fabdem, DemType::AsterDem],
        }
    }
}

impl Default for DemSelection {
    fn default() -> Self {
        DemSelection::Both
    }
}

impl FromStr for DemSelection {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "FABDEM" => Ok(DemSelection::Fabdem),
            "ASTERDEM" => Ok(DemSelection::AsterDem),
            "BOTH" => Ok(DemSelection::Both),
            other => anyhow::bail!(
                "Unknown DEM selection: {} (expected FABDEM, ASTERDEM or BOTH)",
                other
            ),
        }
    }
}

/// Batch configuration: where the tile extents come from, where rasters go,
/// which products to fetch and at what resolution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DemConfig {
    /// Vector boundary file whose feature envelopes define the tiles.
    pub boundary_path: PathBuf,
    /// Root directory receiving one subdirectory per product.
    pub output_root: PathBuf,
    /// Products to fetch.
    #[serde(default)]
    pub selection: DemSelection,
    /// Ground resolution in meters per pixel.
    #[serde(default = "default_scale")]
    pub scale: f64,
}

fn default_scale() -> f64 {
    DEFAULT_SCALE
}

impl DemConfig {
    pub fn new(boundary_path: impl Into<PathBuf>, output_root: impl Into<PathBuf>) -> Self {
        DemConfig {
            boundary_path: boundary_path.into(),
            output_root: output_root.into(),
            selection: DemSelection::default(),
            scale: DEFAULT_SCALE,
        }
    }

    pub fn with_selection(mut self, selection: DemSelection) -> Self {
        self.selection = selection;
        self
    }

    pub fn with_scale(mut self, scale: f64) -> Self {
        self.scale = scale;
        self
    }
}

/// One export request: a product, a tile extent and the file it should land
/// in. Built, executed and discarded; nothing persists between jobs.
#[derive(Debug, Clone)]
pub struct DownloadJob {
    pub dem_type: DemType,
    pub tile_index: usize,
    pub bbox: BoundingBox,
    pub output_path: PathBuf,
    pub scale: f64,
}

/// Executes one download job against the remote raster service.
pub trait DemExporter {
    fn export(&self, job: &DownloadJob) -> Result<()>;
}

impl DemExporter for EeSession {
    fn export(&self, job: &DownloadJob) -> Result<()> {
        let image = job.dem_type.ee_image();
        self.download_image(&image, &job.bbox, job.scale, DEM_CRS, &job.output_path)
    }
}

/// Outcome of one batch run.
#[derive(Debug, Default)]
pub struct BatchReport {
    /// Jobs attempted, one per (tile, product) pair.
    pub attempted: usize,
    /// Rasters written, in attempt order.
    pub downloaded: Vec<PathBuf>,
    /// Failed jobs, with the error detail kept for a manual retry.
    pub failed: Vec<FailedJob>,
}

#[derive(Debug)]
pub struct FailedJob {
    pub dem_type: DemType,
    pub tile_index: usize,
    pub error: String,
}

/// Extract tile extents from the boundary file, then download every
/// requested product for each of them.
///
/// Boundary problems are fatal and propagate immediately; download problems
/// are isolated per job (see [`download_tiles`]).
pub fn run_batch(config: &DemConfig, exporter: &dyn DemExporter) -> Result<BatchReport> {
    let boxes = extract_bounding_boxes(&config.boundary_path)?;
    download_tiles(&boxes, config, exporter)
}

/// Drive the download loop over already extracted tile extents.
///
/// A failed job is reported and recorded but never aborts the batch; every
/// remaining (tile, product) combination still runs. N tiles with K failures
/// produce N-K rasters per product and K entries in the report.
pub fn download_tiles(
    boxes: &[BoundingBox],
    config: &DemConfig,
    exporter: &dyn DemExporter,
) -> Result<BatchReport> {
    let types = config.selection.types();

    for dem_type in types {
        ensure_dir(&config.output_root.join(dem_type.name()))?;
    }

    #[cfg(feature = "indicatif")]
    let pb = {
        let pb = ProgressBar::new((boxes.len() * types.len()) as u64);
        pb.set_style(progress_style());
        pb
    };

    let mut report = BatchReport::default();

    for (tile_index, bbox) in boxes.iter().enumerate() {
        for dem_type in types {
            let output_path = config
                .output_root
                .join(dem_type.name())
                .join(dem_type.tile_file_name(tile_index));

            let job = DownloadJob {
                dem_type: *dem_type,
                tile_index,
                bbox: *bbox,
                output_path,
                scale: config.scale,
            };

            println!("Downloading {} tile {}...", dem_type, tile_index);
            report.attempted += 1;

            match exporter.export(&job) {
                Ok(()) => {
                    println!(
                        "{} tile {} saved to: {:?}",
                        dem_type, tile_index, job.output_path
                    );
                    report.downloaded.push(job.output_path);
                }
                Err(e) => {
                    eprintln!("{} tile {} failed: {:#}", dem_type, tile_index, e);
                    report.failed.push(FailedJob {
                        dem_type: *dem_type,
                        tile_index,
                        error: format!("{:#}", e),
                    });
                }
            }

            #[cfg(feature = "indicatif")]
            pb.inc(1);
        }
    }

    #[cfg(feature = "indicatif")]
    pb.finish_and_clear();

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::InputError;
    use std::cell::RefCell;
    use tempfile::TempDir;

    /// Exporter double that records job order, fails on request and
    /// optionally writes placeholder files.
    struct FakeExporter {
        calls: RefCell<Vec<(DemType, usize)>>,
        fail_on: Vec<(DemType, usize)>,
        write_files: bool,
    }

    impl FakeExporter {
        fn recording() -> Self {
            FakeExporter {
                calls: RefCell::new(Vec::new()),
                fail_on: Vec::new(),
                write_files: false,
            }
        }

        fn writing() -> Self {
            FakeExporter {
                write_files: true,
                ..FakeExporter::recording()
            }
        }

        fn failing_on(fail_on: Vec<(DemType, usize)>) -> Self {
            FakeExporter {
                fail_on,
                ..FakeExporter::writing()
            }
        }
    }

    impl DemExporter for FakeExporter {
        fn export(&self, job: &DownloadJob) -> Result<()> {
            self.calls.borrow_mut().push((job.dem_type, job.tile_index));
            if self.fail_on.contains(&(job.dem_type, job.tile_index)) {
                anyhow::bail!("simulated export failure");
            }
            if self.write_files {
                std::fs::write(&job.output_path, job.tile_index.to_string())?;
            }
            Ok(())
        }
    }

    fn sample_boxes(n: usize) -> Vec<BoundingBox> {
        (0..n)
            .map(|i| BoundingBox::new(i as f64, 0.0, i as f64 + 0.5, 0.5))
            .collect()
    }

    fn config_in(tmp: &TempDir, selection: DemSelection) -> DemConfig {
        DemConfig::new(tmp.path().join("boundary.geojson"), tmp.path().join("out"))
            .with_selection(selection)
    }

    #[test]
    fn test_both_selection_attempts_two_jobs_per_tile() {
        let tmp = TempDir::new().unwrap();
        let config = config_in(&tmp, DemSelection::Both);
        let exporter = FakeExporter::recording();

        let report = download_tiles(&sample_boxes(3), &config, &exporter).unwrap();

        assert_eq!(report.attempted, 6);
        assert!(report.failed.is_empty());
        // FABDEM before ASTERDEM for each tile, tiles in extraction order.
        assert_eq!(
            *exporter.calls.borrow(),
            vec![
                (DemType::Fabdem, 0),
                (DemType::AsterDem, 0),
                (DemType::Fabdem, 1),
                (DemType::AsterDem, 1),
                (DemType::Fabdem, 2),
                (DemType::AsterDem, 2),
            ]
        );
    }

    #[test]
    fn test_failed_job_does_not_abort_the_batch() {
        let tmp = TempDir::new().unwrap();
        let config = config_in(&tmp, DemSelection::Both);
        let exporter = FakeExporter::failing_on(vec![(DemType::Fabdem, 1)]);

        let report = download_tiles(&sample_boxes(3), &config, &exporter).unwrap();

        assert_eq!(report.attempted, 6);
        assert_eq!(report.downloaded.len(), 5);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].tile_index, 1);
        assert_eq!(report.failed[0].dem_type, DemType::Fabdem);

        // The paired product for the failed tile still downloaded.
        assert!(tmp.path().join("out/ASTERDEM/ASTERDEM_1.tif").is_file());
        // So did every other FABDEM tile.
        assert!(tmp.path().join("out/FABDEM/FABDEM_0.tif").is_file());
        assert!(tmp.path().join("out/FABDEM/FABDEM_2.tif").is_file());
        assert!(!tmp.path().join("out/FABDEM/FABDEM_1.tif").exists());
    }

    #[test]
    fn test_tile_naming_is_deterministic() {
        let tmp = TempDir::new().unwrap();
        let config = config_in(&tmp, DemSelection::Fabdem);
        let boxes = sample_boxes(3);

        let first = download_tiles(&boxes, &config, &FakeExporter::writing()).unwrap();
        let second = download_tiles(&boxes, &config, &FakeExporter::writing()).unwrap();

        assert_eq!(first.downloaded, second.downloaded);
        assert!(first.downloaded[0].ends_with("FABDEM/FABDEM_0.tif"));
        assert!(first.downloaded[2].ends_with("FABDEM/FABDEM_2.tif"));
    }

    #[test]
    fn test_rerun_keeps_existing_outputs_when_a_later_tile_fails() {
        let tmp = TempDir::new().unwrap();
        let config = config_in(&tmp, DemSelection::Fabdem);
        let boxes = sample_boxes(3);

        download_tiles(&boxes, &config, &FakeExporter::writing()).unwrap();
        let tile_0 = tmp.path().join("out/FABDEM/FABDEM_0.tif");
        let before = std::fs::read(&tile_0).unwrap();

        // A re-run that fails later must leave earlier outputs untouched.
        let exporter = FakeExporter::failing_on(vec![(DemType::Fabdem, 2)]);
        let report = download_tiles(&boxes, &config, &exporter).unwrap();

        assert_eq!(report.failed.len(), 1);
        assert_eq!(std::fs::read(&tile_0).unwrap(), before);
    }

    #[test]
    fn test_selection_parses_from_config_strings() {
        assert_eq!("FABDEM".parse::<DemSelection>().unwrap(), DemSelection::Fabdem);
        assert_eq!(
            "asterdem".parse::<DemSelection>().unwrap(),
            DemSelection::AsterDem
        );
        assert_eq!("BOTH".parse::<DemSelection>().unwrap(), DemSelection::Both);
        assert!("SRTM".parse::<DemSelection>().is_err());
    }

    #[test]
    fn test_default_config_values() {
        let config = DemConfig::new("boundary.shp", "out");
        assert_eq!(config.scale, 30.0);
        assert_eq!(config.selection, DemSelection::Both);
    }

    #[test]
    fn test_run_batch_propagates_a_missing_boundary_file() {
        let tmp = TempDir::new().unwrap();
        let config = config_in(&tmp, DemSelection::Both);

        let err = run_batch(&config, &FakeExporter::recording()).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<InputError>(),
            Some(InputError::Missing(_))
        ));
        // Nothing was attempted and no layout was created.
        assert!(!tmp.path().join("out").exists());
    }
}
