//! Verify command

use anyhow::{Result, bail};
use crossterm::style::Stylize;
use kiln_core::{export_info, verify as missing_links};
use std::path::Path;

/// Check a packaged directory against the recipe's link contract
pub fn verify(path: &Path, package_dir: &Path) -> Result<()> {
    let recipe = super::load_recipe(path)?;
    let export = export_info(&recipe);

    let missing = missing_links(&export, package_dir);
    if !missing.is_empty() {
        bail!(
            "{} does not provide: {}",
            package_dir.display(),
            missing.join(", ")
        );
    }

    println!(
        "{} {} provides {}",
        "✓".green(),
        package_dir.display(),
        export.libs.join(", ")
    );
    Ok(())
}
