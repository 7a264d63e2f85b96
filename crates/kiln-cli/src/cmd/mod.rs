//! Command implementations

pub mod build;
pub mod check;
pub mod config;
pub mod inspect;
pub mod package;
pub mod requires;
pub mod verify;

use anyhow::{Context, Result, bail};
use kiln_core::recipe::Recipe;
use kiln_schema::{OptionSet, OptionValue, Settings};
use std::path::{Path, PathBuf};

/// Load and validate a recipe file.
pub fn load_recipe(path: &Path) -> Result<Recipe> {
    Recipe::from_file(path).with_context(|| format!("Failed to load recipe {}", path.display()))
}

/// Split `key=value`.
pub fn parse_pair(arg: &str) -> Result<(&str, &str)> {
    match arg.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => Ok((key.trim(), value.trim())),
        _ => bail!("expected KEY=VALUE, got '{arg}'"),
    }
}

/// The recipe's defaults with each `-o name=value` applied in order.
pub fn apply_options(recipe: &Recipe, overrides: &[String]) -> Result<OptionSet> {
    let mut options = recipe.default_options()?;
    for arg in overrides {
        let (name, value) = parse_pair(arg)?;
        let Ok(value) = value.parse::<OptionValue>();
        options.set(name, value)?;
    }
    Ok(options)
}

/// Host settings with each `-s key=value` applied in order.
pub fn apply_settings(overrides: &[String]) -> Result<Settings> {
    let mut settings = Settings::host();
    for arg in overrides {
        let (key, value) = parse_pair(arg)?;
        settings.set(key, value)?;
    }
    Ok(settings)
}

/// Parse `--dep name=path` arguments. Paths must exist.
pub fn parse_deps(args: &[String]) -> Result<Vec<(String, PathBuf)>> {
    args.iter()
        .map(|arg| {
            let (name, path) = parse_pair(arg)?;
            let path = PathBuf::from(path);
            if !path.is_dir() {
                bail!("dependency root for '{name}' is not a directory: {}", path.display());
            }
            Ok((name.to_string(), path))
        })
        .collect()
}
