//! Requires command

use anyhow::Result;
use kiln_core::resolve;
use std::path::Path;

use crate::OptionArgs;

/// Print resolved requirements, one reference per line
pub fn requires(path: &Path, args: &OptionArgs) -> Result<()> {
    let recipe = super::load_recipe(path)?;
    let options = super::apply_options(&recipe, &args.options)?;

    for dep in resolve(&recipe.requires, &options) {
        println!("{dep}");
    }
    Ok(())
}
