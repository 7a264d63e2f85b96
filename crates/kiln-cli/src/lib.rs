//! kiln - recipe-driven library packaging
#![allow(missing_docs)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::doc_markdown)]
//!
//! Reads a TOML recipe describing a C/C++ library, builds it with CMake for a
//! chosen set of option values, and packages the results into a fixed
//! `include/`, `bin/`, `lib/` layout.
//!
//! # Directory Layout
//!
//! ```text
//! ~/.kiln/
//! ├── tmp/        # Scoped build workspaces (removed after each run)
//! └── logs/       # Build tool logs, one per build
//! ```

pub mod cmd;
pub mod ui;

pub use kiln_core::paths::*;

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "kiln")]
#[command(author, version, about = "kiln - build and package libraries from recipes")]
pub struct Cli {
    /// Stream build tool output instead of writing it to a log
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// `-o name=value`, repeatable.
#[derive(Debug, Clone, Default, Args)]
pub struct OptionArgs {
    /// Override a recipe option (e.g. -o shared=True)
    #[arg(short = 'o', long = "option", value_name = "NAME=VALUE")]
    pub options: Vec<String>,
}

/// `-s key=value`, repeatable.
#[derive(Debug, Clone, Default, Args)]
pub struct SettingArgs {
    /// Override a target setting (e.g. -s build_type=Debug)
    #[arg(short = 's', long = "setting", value_name = "KEY=VALUE")]
    pub settings: Vec<String>,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Show a recipe's identity, options and requirements
    Inspect {
        /// Recipe file
        recipe: PathBuf,
    },
    /// Validate a recipe file
    Check {
        /// Recipe file
        recipe: PathBuf,
    },
    /// Print the requirements for a set of option values
    Requires {
        /// Recipe file
        recipe: PathBuf,
        #[command(flatten)]
        options: OptionArgs,
    },
    /// Print the build configuration for a set of option values
    Config {
        /// Recipe file
        recipe: PathBuf,
        #[command(flatten)]
        options: OptionArgs,
        #[command(flatten)]
        settings: SettingArgs,
    },
    /// Stage, configure, build and package a recipe
    Build(BuildArgs),
    /// Package an existing build tree without building
    Package(PackageArgs),
    /// Check that a package provides every exported link-name
    Verify {
        /// Recipe file
        recipe: PathBuf,
        /// Packaged output directory
        package_dir: PathBuf,
    },
}

#[derive(Debug, Args)]
pub struct BuildArgs {
    /// Recipe file
    pub recipe: PathBuf,
    /// Library source tree
    #[arg(long)]
    pub source: PathBuf,
    /// Package output directory
    #[arg(long)]
    pub output: PathBuf,
    #[command(flatten)]
    pub options: OptionArgs,
    #[command(flatten)]
    pub settings: SettingArgs,
    /// Dependency root made visible to the build (e.g. --dep boost_format=/opt/boost)
    #[arg(long = "dep", value_name = "NAME=PATH")]
    pub deps: Vec<String>,
    /// cmake executable (defaults to the one on PATH)
    #[arg(long, env = "KILN_CMAKE")]
    pub cmake: Option<PathBuf>,
    /// CMake generator (e.g. Ninja)
    #[arg(long, short = 'G')]
    pub generator: Option<String>,
    /// Parallel compile jobs (defaults to the number of CPUs)
    #[arg(long, short = 'j')]
    pub jobs: Option<usize>,
    /// Fail instead of overwriting when two artifacts flatten to one path
    #[arg(long)]
    pub reject_collisions: bool,
}

#[derive(Debug, Args)]
pub struct PackageArgs {
    /// Recipe file
    pub recipe: PathBuf,
    /// Tree holding staged sources and the tool's `build/` directory
    #[arg(long)]
    pub from: PathBuf,
    /// Package output directory
    #[arg(long)]
    pub output: PathBuf,
    #[command(flatten)]
    pub options: OptionArgs,
    #[command(flatten)]
    pub settings: SettingArgs,
    /// Fail instead of overwriting when two artifacts flatten to one path
    #[arg(long)]
    pub reject_collisions: bool,
}
