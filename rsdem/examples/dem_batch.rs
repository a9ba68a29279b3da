use anyhow::Result;
use rsdem::{run_batch, DemConfig, DemSelection, EeSession};

/// Example: download FABDEM and/or ASTER GDEM tiles for the same boundary
/// file. The selection comes from the DEM_TYPE environment variable
/// (FABDEM, ASTERDEM or BOTH) and defaults to both products, so paired
/// tiles share the same extent and index.
fn main() -> Result<()> {
    println!("=== Example: DEM batch download ===\n");

    let session = EeSession::from_env()?;

    let selection = match std::env::var("DEM_TYPE") {
        Ok(value) => value.parse::<DemSelection>()?,
        Err(_) => DemSelection::Both,
    };

    let config = DemConfig::new("./data/boundary.shp", "./output").with_selection(selection);

    println!("Boundary file: {:?}", config.boundary_path);
    println!("Output root:   {:?}", config.output_root);
    println!("Selection:     {:?}", config.selection);
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
