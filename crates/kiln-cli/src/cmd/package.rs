//! Package command

use anyhow::{Context, Result};
use crossterm::style::Stylize;
use kiln_core::export::PackageManifest;
use kiln_core::workspace::BUILD_DIR;
use kiln_core::{CollisionPolicy, Packager, resolve};

use crate::PackageArgs;

/// Package an existing build tree and write its manifest
pub fn package(args: &PackageArgs) -> Result<()> {
    let recipe = super::load_recipe(&args.recipe)?;
    let options = super::apply_options(&recipe, &args.options.options)?;
    let settings = super::apply_settings(&args.settings.settings)?.restrict(&recipe.recipe.settings);

    if !args.from.is_dir() {
        anyhow::bail!("build tree not found: {}", args.from.display());
    }

    let policy = if args.reject_collisions {
        CollisionPolicy::Reject
    } else {
        CollisionPolicy::LastWriteWins
    };
    let packaged = Packager::new(policy)
        .with_build_tree(BUILD_DIR)
        .package(&args.from, &args.output, &recipe.package)
        .context("Packaging failed")?;

    let manifest = PackageManifest::collect(
        &recipe,
        &options,
        &settings,
        resolve(&recipe.requires, &options),
        &packaged,
        &args.output,
    )
    .and_then(|m| m.write(&args.output))
    .context("Failed to write manifest")?;

    for file in &packaged.files {
        println!("  {}", file.destination.display());
    }
    println!(
        "{} packaged {} file{} into {}",
        "✓".green(),
        packaged.len(),
        if packaged.len() == 1 { "" } else { "s" },
        args.output.display()
    );
    if packaged.overwritten > 0 {
        println!(
            "{} {} file{} overwritten by later matches",
            "⚠".yellow(),
            packaged.overwritten,
            if packaged.overwritten == 1 { " was" } else { "s were" }
        );
    }
    tracing::debug!("manifest at {}", manifest.display());
    Ok(())
}
