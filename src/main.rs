//! Batch enrichment driver.
//!
//! Usage: `partscribe <input.csv> <output.csv>`
//!
//! Reads `(MPN, manufacturer)` rows, enriches each sequentially, and
//! writes the catalog export plus a per-MPN artifact manifest. Row
//! failures are logged and skipped; the batch always runs to completion.

use anyhow::{bail, Context, Result};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use partscribe::store::ManifestEntry;
use partscribe::{export, ingest, EnrichConfig, EnrichPipeline};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args: Vec<String> = std::env::args().collect();
    if args.len() != 3 {
        bail!("usage: {} <input.csv> <output.csv>", args[0]);
    }
    let input_path = &args[1];
    let output_path = &args[2];

    let config = EnrichConfig::from_env()?;
    let pipeline = EnrichPipeline::new(&config);

    let content = tokio::fs::read_to_string(input_path)
        .await
        .with_context(|| format!("reading {input_path}"))?;
    let rows = ingest::parse_batch_csv(&content)?;
    info!(rows = rows.len(), "batch loaded");

    let mut results = Vec::new();
    for row in &rows {
        match pipeline.enrich(&row.mpn, &row.manufacturer).await {
            Ok(result) => {
                info!(
                    mpn = %row.mpn,
                    usable = result.usable,
                    confidence = result.confidence,
                    "row enriched"
                );

                let pdf_path = pipeline.store().pdf_path(&row.mpn);
                let image_path = ["jpg", "jpeg", "png", "webp", "gif"]
                    .iter()
                    .map(|ext| pipeline.store().image_path(&row.mpn, ext))
                    .find(|p| p.exists());
                let entry = ManifestEntry {
                    datasheet_url: result.datasheets.first().cloned(),
                    image_url: result.images.first().cloned(),
                    pdf_path: pdf_path
                        .exists()
                        .then(|| pdf_path.display().to_string()),
                    image_path: image_path.map(|p| p.display().to_string()),
                };
                if let Err(e) = pipeline.store().update_manifest(&row.mpn, entry).await {
                    error!(mpn = %row.mpn, error = %e, "manifest update failed");
                }

                results.push(result);
            }
            Err(e) => {
                // One bad part never aborts the batch.
                error!(mpn = %row.mpn, error = %e, "row failed, continuing");
            }
        }
    }

    pipeline.shutdown().await;

    let csv = export::to_csv(&results);
    tokio::fs::write(output_path, csv)
        .await
        .with_context(|| format!("writing {output_path}"))?;

    info!(
        enriched = results.len(),
        failed = rows.len() - results.len(),
        output = %output_path,
        "batch complete"
    );
    Ok(())
}
