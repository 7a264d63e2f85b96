//! Core library for kiln.
//!
//! Loads recipes, resolves their requirements, drives the external build
//! tool and packages the results. The [`evaluate::Pipeline`] ties the steps
//! together; each step is also usable on its own.

pub mod builder;
pub mod configuration;
pub mod evaluate;
pub mod export;
pub mod packager;
pub mod paths;
pub mod recipe;
pub mod resolver;
pub mod workspace;

pub mod reporter;

pub use builder::{BuildError, BuildPhase, BuildTool, Builder, CMake};
pub use configuration::BuildConfiguration;
pub use evaluate::{EvaluateError, Evaluated, Pipeline};
pub use export::{PackageManifest, export_info, verify};
pub use packager::{CollisionPolicy, Packager, PackagingError};
pub use paths::*;
pub use recipe::{Recipe, RecipeError};
pub use reporter::{NullReporter, Reporter};
pub use resolver::resolve;
