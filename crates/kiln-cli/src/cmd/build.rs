//! Build command

use anyhow::{Context, Result};
use kiln_core::{Builder, CMake, CollisionPolicy, Packager, Pipeline};
use kiln_core::build_log_path;

use crate::BuildArgs;
use crate::ui::ConsoleReporter;

/// Stage, configure, build and package a recipe
pub fn build(args: &BuildArgs, verbose: bool) -> Result<()> {
    let recipe = super::load_recipe(&args.recipe)?;
    let options = super::apply_options(&recipe, &args.options.options)?;
    let settings = super::apply_settings(&args.settings.settings)?;
    let deps = super::parse_deps(&args.deps)?;

    if !args.source.is_dir() {
        anyhow::bail!("source directory not found: {}", args.source.display());
    }

    let mut cmake = match &args.cmake {
        Some(program) => CMake::new(program),
        None => CMake::locate().context("Pass --cmake or set KILN_CMAKE")?,
    };
    if let Some(generator) = &args.generator {
        cmake = cmake.with_generator(generator);
    }
    let id = recipe.identity();
    cmake = if verbose {
        cmake.verbose(true)
    } else {
        cmake.with_log(build_log_path(id.name.as_str(), id.version.as_str()))
    };

    let mut builder = Builder::new(&cmake).with_dependencies(&deps);
    if let Some(jobs) = args.jobs {
        builder = builder.with_jobs(jobs);
    }

    let policy = if args.reject_collisions {
        CollisionPolicy::Reject
    } else {
        CollisionPolicy::LastWriteWins
    };

    let reporter = ConsoleReporter::new();
    let evaluated = Pipeline::new(builder, &reporter)
        .with_packager(Packager::new(policy))
        .run(&recipe, &options, &settings, &args.source, &args.output)?;

    tracing::debug!("manifest at {}", evaluated.manifest.display());
    println!("{}", args.output.display());
    Ok(())
}
