use anyhow::Result;
use rsdem::{run_batch, DemConfig, DemSelection, EeSession};

/// Example: batch download of FABDEM tiles over the features of a boundary
/// file. The session is built from EE_PROJECT and EE_ACCESS_TOKEN.
fn main() -> Result<()> {
    println!("=== Example: FABDEM batch download ===\n");

    let session = EeSession::from_env()?;

    let config = DemConfig::new("./data/boundary.shp", "./output")
        .with_selection(DemSelection::Fabdem);

    println!("Boundary file: {:?}", config.boundary_path);
    println!("Output root:   {:?}", config.output_root);
    println!("Resolution:    {} m\n", config.scale);

    let report = run_batch(&config, &session)?;

    println!(
        "\nBatch finished: {} attempted, {} downloaded, {} failed",
        report.attempted,
        report.downloaded.len(),
        report.failed.len()
    );
    for failed in &report.failed {
        println!(
            "  - {} tile {}: {}",
            failed.dem_type, failed.tile_index, failed.error
        );
    }

    Ok(())
}
