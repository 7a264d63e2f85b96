//! End-to-end recipe evaluation.
//!
//! One evaluation runs strictly in order:
//!
//! 1. resolve requirements for the current option values
//! 2. stage the exported sources into a scoped workspace
//! 3. configure and build ([`Builder`])
//! 4. package into the output directory ([`Packager`])
//! 5. write the manifest
//!
//! A failure stops the run at that step. In particular a failed build never
//! reaches the packager, so the output directory is not created.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use kiln_schema::{DependencySpec, OptionSet, Settings};
use thiserror::Error;

use crate::builder::{BuildError, Builder};
use crate::configuration::BuildConfiguration;
use crate::export::PackageManifest;
use crate::packager::{PackagedSet, Packager, PackagingError};
use crate::recipe::Recipe;
use crate::reporter::Reporter;
use crate::resolver::resolve;
use crate::workspace::{BUILD_DIR, BuildWorkspace};

/// Errors from an evaluation, tagged with the step that failed.
#[derive(Error, Debug)]
pub enum EvaluateError {
    /// The scoped working directory could not be created.
    #[error("failed to create build workspace: {message}")]
    Workspace {
        /// Underlying error, rendered.
        message: String,
    },

    /// Copying exported sources failed.
    #[error("failed to stage sources: {0}")]
    Stage(#[source] PackagingError),

    /// Configuration mapping or the build tool failed.
    #[error(transparent)]
    Build(#[from] BuildError),

    /// Packaging failed. The output directory is incomplete.
    #[error("packaging failed: {0}")]
    Package(#[source] PackagingError),

    /// The manifest could not be written.
    #[error("failed to write manifest: {0}")]
    Manifest(#[source] PackagingError),
}

/// What a successful evaluation produced.
#[derive(Debug, Clone)]
pub struct Evaluated {
    /// Resolved requirements.
    pub requires: Vec<DependencySpec>,
    /// Configuration handed to the build tool.
    pub configuration: BuildConfiguration,
    /// Packaged files.
    pub packaged: PackagedSet,
    /// Path of the written manifest.
    pub manifest: PathBuf,
    /// Total wall time.
    pub elapsed: Duration,
}

/// Runs recipes through resolve, build and package.
#[derive(Debug)]
pub struct Pipeline<'a> {
    builder: Builder<'a>,
    packager: Packager,
    reporter: &'a dyn Reporter,
    work_root: PathBuf,
}

impl<'a> Pipeline<'a> {
    /// Pipeline using `builder`, the default packager and `~/.kiln/tmp`.
    pub fn new(builder: Builder<'a>, reporter: &'a dyn Reporter) -> Self {
        Self {
            builder,
            packager: Packager::default(),
            reporter,
            work_root: crate::tmp_path(),
        }
    }

    /// Use a specific packager (collision policy).
    pub fn with_packager(mut self, packager: Packager) -> Self {
        self.packager = packager;
        self
    }

    /// Create scoped workspaces under `root` instead of the kiln temp path.
    pub fn with_work_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.work_root = root.into();
        self
    }

    /// Evaluate `recipe` from `source_dir` into `output_dir`.
    ///
    /// Settings the recipe does not declare are dropped before the build.
    ///
    /// # Errors
    ///
    /// Returns the [`EvaluateError`] variant for the step that failed.
    pub fn run(
        &self,
        recipe: &Recipe,
        options: &OptionSet,
        settings: &Settings,
        source_dir: &Path,
        output_dir: &Path,
    ) -> Result<Evaluated, EvaluateError> {
        let reference = recipe.identity().reference();
        let result = self.run_inner(recipe, options, settings, source_dir, output_dir);
        match &result {
            Ok(done) => self.reporter.done(
                &reference,
                &format!("{} file(s)", done.packaged.len()),
                done.elapsed.as_secs_f64(),
            ),
            Err(e) => {
                if let EvaluateError::Build(BuildError::BuildFailed { log: Some(log), .. }) = e {
                    self.reporter.error(&format!("full log: {}", log.display()));
                }
                self.reporter.failed(&reference, &e.to_string());
            }
        }
        result
    }

    fn run_inner(
        &self,
        recipe: &Recipe,
        options: &OptionSet,
        settings: &Settings,
        source_dir: &Path,
        output_dir: &Path,
    ) -> Result<Evaluated, EvaluateError> {
        let started = Instant::now();
        let settings = settings.restrict(&recipe.recipe.settings);

        let requires = resolve(&recipe.requires, options);
        for dep in &requires {
            self.reporter.info(&format!("requires {dep}"));
        }

        self.reporter.section("Staging");
        let workspace =
            BuildWorkspace::new_in(&self.work_root).map_err(|e| EvaluateError::Workspace {
                message: format!("{e:#}"),
            })?;
        let staged = workspace
            .stage(source_dir, &recipe.recipe.exports)
            .map_err(EvaluateError::Stage)?;
        tracing::info!("staged {staged} file(s) from {}", source_dir.display());

        self.reporter.section("Building");
        let build = self
            .builder
            .build(&recipe.definitions(), options, &settings, workspace.path())?;
        self.reporter.success(&format!(
            "built in {:.1}s",
            build.elapsed.as_secs_f64()
        ));

        self.reporter.section("Packaging");
        let packaged = self
            .packager
            .clone()
            .with_build_tree(BUILD_DIR)
            .package(workspace.path(), output_dir, &recipe.package)
            .map_err(EvaluateError::Package)?;
        if packaged.is_empty() {
            self.reporter.warning("no artifacts matched the package table");
        }
        if packaged.overwritten > 0 {
            self.reporter.warning(&format!(
                "{} packaged file(s) were overwritten by later matches",
                packaged.overwritten
            ));
        }

        let manifest = PackageManifest::collect(
            recipe,
            options,
            &settings,
            requires.clone(),
            &packaged,
            output_dir,
        )
        .and_then(|m| m.write(output_dir))
        .map_err(EvaluateError::Manifest)?;

        Ok(Evaluated {
            requires,
            configuration: build.configuration,
            packaged,
            manifest,
            elapsed: started.elapsed(),
        })
    }
}
