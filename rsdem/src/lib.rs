pub mod collect;
pub mod commons;
pub mod errors;
pub mod geo_core;
pub mod geometric;

pub use collect::ee::ee_collect::{EeImage, EeSession};
pub use errors::InputError;
pub use geo_core::BoundingBox;
pub use geometric::boundary::extract_bounding_boxes;
pub use geometric::dem::{
    download_tiles, run_batch, BatchReport, DemConfig, DemExporter, DemSelection, DemType,
    DownloadJob, DEFAULT_SCALE, DEM_CRS,
};
