//! Inspect command

use anyhow::Result;
use comfy_table::{Table, presets::UTF8_BORDERS_ONLY};
use crossterm::style::Stylize;
use std::path::Path;

/// Show a recipe's identity, options, requirements and packaging table
pub fn inspect(path: &Path) -> Result<()> {
    let recipe = super::load_recipe(path)?;
    let id = recipe.identity();
    let lw = 12;

    println!();
    println!("  {} {}", id.name.as_str().white().bold(), id.version.as_str().dark_grey());
    if !id.description.is_empty() {
        println!("  {}", id.description);
    }
    println!();
    if !id.license.is_empty() {
        println!("  {:<lw$}{}", "license", id.license);
    }
    if !id.author.is_empty() {
        println!("  {:<lw$}{}", "author", id.author);
    }
    if !id.homepage.is_empty() {
        println!("  {:<lw$}{}", "homepage", id.homepage);
    }
    if !id.topics.is_empty() {
        println!("  {:<lw$}{}", "topics", id.topics.join(", "));
    }
    if !recipe.recipe.settings.is_empty() {
        println!("  {:<lw$}{}", "settings", recipe.recipe.settings.join(", "));
    }
    println!("  {:<lw$}{}", "libs", recipe.package_info.libs.join(", "));

    if !recipe.options.is_empty() {
        let mut table = Table::new();
        table
            .load_preset(UTF8_BORDERS_ONLY)
            .set_header(vec!["option", "values", "default", "define"]);
        for (name, decl) in &recipe.options {
            let values: Vec<String> = decl.values.iter().map(ToString::to_string).collect();
            table.add_row(vec![
                name.clone(),
                values.join(", "),
                decl.default.to_string(),
                decl.define.clone().unwrap_or_else(|| "-".to_string()),
            ]);
        }
        println!();
        println!("{table}");
    }

    println!();
    println!("  {}", "requires".bold());
    for dep in &recipe.requires.base {
        println!("    {dep}");
    }
    for cond in &recipe.requires.conditional {
        let when: Vec<String> = cond.when.iter().map(|(k, v)| format!("{k}={v}")).collect();
        println!("    {} {}", cond.require, format!("(when {})", when.join(", ")).dark_grey());
    }

    let mut table = Table::new();
    table
        .load_preset(UTF8_BORDERS_ONLY)
        .set_header(vec!["pattern", "from", "to", "layout"]);
    for descriptor in &recipe.package {
        table.add_row(vec![
            descriptor.pattern.clone(),
            descriptor.src.clone().unwrap_or_else(|| ".".to_string()),
            descriptor.dst.clone(),
            if descriptor.keep_path { "tree" } else { "flat" }.to_string(),
        ]);
    }
    println!();
    println!("{table}");

    Ok(())
}
