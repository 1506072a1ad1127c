//! Seed the catalog from a YAML file.
//!
//! Validation runs before connecting; every problem in the file is logged,
//! not just the first.

use std::path::Path;

use tracing::{error, info};

use loomwear_admin::db;
use loomwear_admin::seed::{SeedCatalog, seed_from_catalog, validate_catalog};

use super::database_url;

/// Upsert the catalog described by `file_path`.
///
/// # Errors
///
/// Returns an error if `DATABASE_URL` is unset, the file cannot be read or
/// validated, or a database write fails. Nothing is written on error.
pub async fn catalog(file_path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    if !file_path.exists() {
        return Err(format!("File not found: {}", file_path.display()).into());
    }

    info!(path = %file_path.display(), "Loading catalog from file");

    // Read and validate YAML before connecting to database
    let content = tokio::fs::read_to_string(file_path).await?;
    let catalog: SeedCatalog = serde_yaml::from_str(&content)?;

    let errors = validate_catalog(&catalog);
    if !errors.is_empty() {
        error!("Catalog validation failed:");
        for err in &errors {
            error!("  - {err}");
        }
        return Err(format!("{} validation errors found", errors.len()).into());
    }

    let database_url = database_url()?;
    let pool = db::create_pool(&database_url).await?;
    info!("Connected to database");

    let result = seed_from_catalog(&pool, &catalog).await?;

    info!("Seeding complete!");
    info!("  Colors: {}", result.colors);
    info!("  Sizes: {}", result.sizes);
    info!("  Categories: {}", result.categories);
    info!("  Products: {}", result.products);
    info!("  Images: {}", result.images);
    info!("  Variants: {}", result.variants);
    info!("  Outfits: {}", result.outfits);

    Ok(())
}
