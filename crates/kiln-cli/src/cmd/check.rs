//! Check command

use anyhow::Result;
use crossterm::style::Stylize;
use std::path::Path;

/// Validate a recipe file
pub fn check(path: &Path) -> Result<()> {
    let recipe = super::load_recipe(path)?;
    let id = recipe.identity();

    let mapping = recipe.definitions();
    let unmapped: Vec<&str> = recipe
        .options
        .keys()
        .filter(|name| !mapping.contains_key(*name))
        .map(String::as_str)
        .collect();

    println!(
        "{} {} is valid ({} option{}, {} requirement{}, {} package rule{})",
        "✓".green(),
        id.reference().bold(),
        recipe.options.len(),
        plural(recipe.options.len()),
        recipe.requires.base.len() + recipe.requires.conditional.len(),
        plural(recipe.requires.base.len() + recipe.requires.conditional.len()),
        recipe.package.len(),
        plural(recipe.package.len()),
    );

    let opaque: Vec<String> = recipe
        .requires
        .base
        .iter()
        .chain(recipe.requires.conditional.iter().map(|c| &c.require))
        .filter(|dep| dep.constraint.as_semver().is_none())
        .map(ToString::to_string)
        .collect();
    if !opaque.is_empty() {
        println!(
            "{} constraint{} not readable as semver, passed through as written: {}",
            "⚠".yellow(),
            plural(opaque.len()),
            opaque.join(", ")
        );
    }

    if !unmapped.is_empty() {
        println!(
            "{} option{} without a define, configure will fail: {}",
            "⚠".yellow(),
            plural(unmapped.len()),
            unmapped.join(", ")
        );
    }

    Ok(())
}

fn plural(n: usize) -> &'static str {
    if n == 1 { "" } else { "s" }
}
