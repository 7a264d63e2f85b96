//! Config command

use anyhow::Result;
use kiln_core::BuildConfiguration;
use std::path::Path;

use crate::{OptionArgs, SettingArgs};

/// Print the derived build configuration as `KEY=VALUE` lines
pub fn config(path: &Path, options: &OptionArgs, settings: &SettingArgs) -> Result<()> {
    let recipe = super::load_recipe(path)?;
    let options = super::apply_options(&recipe, &options.options)?;
    let settings = super::apply_settings(&settings.settings)?.restrict(&recipe.recipe.settings);

    let configuration = BuildConfiguration::derive(&options, &recipe.definitions(), &settings)?;
    for (key, value) in configuration.iter() {
        println!("{key}={value}");
    }
    Ok(())
}
