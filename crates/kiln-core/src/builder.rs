//! Build invocation.
//!
//! A build is a two-phase protocol against an external [`BuildTool`]:
//!
//! 1. **Configure**: option values are mapped to a [`BuildConfiguration`]
//!    and handed to the tool together with the staged source directory and
//!    a fresh build directory.
//! 2. **Compile**: the tool's build step runs to completion. The call blocks;
//!    whatever parallelism the tool uses internally is its own business.
//!
//! A failing tool surfaces as [`BuildError::BuildFailed`] with the tool's
//! diagnostics attached verbatim: everything the failing phase wrote, never
//! a tail or a summary. When output also went to a log file its path is
//! carried separately. Nothing is retried.
//!
//! ## Environment contract ([`CMake`])
//!
//! On Unix the tool runs with a cleared environment and only these variables:
//!
//! | Variable | Value |
//! |---|---|
//! | `PATH` | `/usr/bin:/bin:/usr/sbin:/sbin`, plus the tool's own directory |
//! | `HOME` | The build directory (prevents reading host dotfiles) |
//! | `TERM` | `dumb` |
//! | `LANG` | `en_US.UTF-8` |
//! | `SOURCE_DATE_EPOCH` | `0` |
//! | `DEP_<NAME>` | Per-dependency root (name uppercased, hyphens to underscores) |

use std::collections::BTreeMap;
use std::ffi::OsString;
use std::fs::{File, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

use kiln_schema::{BuildType, OptionSet, Settings};
use thiserror::Error;

use crate::configuration::BuildConfiguration;

/// File written into the build directory describing provided dependencies.
pub const BUILD_INFO_FILE: &str = "kilnbuildinfo.cmake";

/// Fixed epoch for `SOURCE_DATE_EPOCH`.
const SOURCE_DATE_EPOCH: &str = "0";

/// Which half of the protocol was running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildPhase {
    /// Configuration of the build tree.
    Configure,
    /// Compilation.
    Compile,
}

impl std::fmt::Display for BuildPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Configure => write!(f, "configure"),
            Self::Compile => write!(f, "build"),
        }
    }
}

/// Errors raised by the build invoker.
#[derive(Error, Debug)]
pub enum BuildError {
    /// A declared option has no configuration key. This is a recipe defect.
    #[error("configure: no configuration mapping for option '{option}'")]
    ConfigurationMapping {
        /// The unmapped option.
        option: String,
    },

    /// The external tool failed.
    #[error("{tool} {phase} step failed ({}):\n{diagnostics}", exit_label(.exit_code))]
    BuildFailed {
        /// Tool name (e.g. `cmake`).
        tool: String,
        /// Phase that failed.
        phase: BuildPhase,
        /// Exit code, when the process ran and exited normally.
        exit_code: Option<i32>,
        /// What the tool reported, unmodified.
        diagnostics: String,
        /// Log file holding the complete output of every phase, if any.
        log: Option<PathBuf>,
    },

    /// The build directory or the build-info file could not be written.
    #[error("IO error preparing build directory: {0}")]
    Io(#[from] std::io::Error),
}

fn exit_label(code: &Option<i32>) -> String {
    code.map_or_else(|| "no exit code".to_string(), |c| format!("exit code {c}"))
}

/// A failure reported by a [`BuildTool`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolFailure {
    /// Exit code, when there was one.
    pub exit_code: Option<i32>,
    /// Diagnostics text, passed through untouched.
    pub diagnostics: String,
    /// Log file the output was also written to.
    pub log: Option<PathBuf>,
}

impl ToolFailure {
    /// Failure that produced `diagnostics` and no log file.
    pub fn new(exit_code: Option<i32>, diagnostics: impl Into<String>) -> Self {
        Self {
            exit_code,
            diagnostics: diagnostics.into(),
            log: None,
        }
    }
}

/// Input to the configure phase.
#[derive(Debug)]
pub struct ConfigureStep<'a> {
    /// Staged source tree.
    pub source_dir: &'a Path,
    /// Empty build directory to configure into.
    pub build_dir: &'a Path,
    /// Derived configuration.
    pub configuration: &'a BuildConfiguration,
    /// Dependency roots, in the order they were provided.
    pub prefix_paths: &'a [PathBuf],
    /// Generated dependency description, if any dependencies were provided.
    pub build_info: Option<&'a Path>,
    /// Environment additions (`DEP_<NAME>` and friends).
    pub env: &'a [(String, String)],
}

/// Input to the compile phase.
#[derive(Debug)]
pub struct CompileStep<'a> {
    /// Configured build directory.
    pub build_dir: &'a Path,
    /// Build type for multi-config generators.
    pub build_type: Option<BuildType>,
    /// Requested parallelism.
    pub jobs: usize,
    /// Environment additions, same as the configure phase.
    pub env: &'a [(String, String)],
}

/// The external build tool. The invoker owns the protocol; implementations
/// only run one step each.
pub trait BuildTool: std::fmt::Debug {
    /// Short name used in diagnostics.
    fn name(&self) -> &str;

    /// Configure `step.build_dir` from `step.source_dir`.
    ///
    /// # Errors
    ///
    /// Returns a [`ToolFailure`] when the tool cannot run or exits non-zero.
    fn configure(&self, step: &ConfigureStep<'_>) -> Result<(), ToolFailure>;

    /// Compile a configured build directory.
    ///
    /// # Errors
    ///
    /// Returns a [`ToolFailure`] when the tool cannot run or exits non-zero.
    fn compile(&self, step: &CompileStep<'_>) -> Result<(), ToolFailure>;
}

/// Outcome of a successful build.
#[derive(Debug, Clone)]
pub struct BuildResult {
    /// Where the tool wrote its outputs.
    pub build_dir: PathBuf,
    /// The configuration that was used.
    pub configuration: BuildConfiguration,
    /// Wall time of both phases.
    pub elapsed: Duration,
}

/// Drives a [`BuildTool`] through configure and compile.
#[derive(Debug)]
pub struct Builder<'a> {
    tool: &'a dyn BuildTool,
    deps: &'a [(String, PathBuf)],
    jobs: usize,
}

impl<'a> Builder<'a> {
    /// Create a builder for `tool` with no dependency roots and one job per CPU.
    pub fn new(tool: &'a dyn BuildTool) -> Self {
        Self {
            tool,
            deps: &[],
            jobs: num_cpus::get(),
        }
    }

    /// Dependency roots (`name`, `path`) made visible to the build.
    pub fn with_dependencies(mut self, deps: &'a [(String, PathBuf)]) -> Self {
        self.deps = deps;
        self
    }

    /// Override compile parallelism.
    pub fn with_jobs(mut self, jobs: usize) -> Self {
        self.jobs = jobs.max(1);
        self
    }

    /// Build the staged sources in `working_dir`.
    ///
    /// The configuration is derived before the tool is touched, so a mapping
    /// defect never leaves a half-configured tree behind. Outputs are written
    /// to `<working_dir>/build`.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::ConfigurationMapping`] for an unmapped option,
    /// [`BuildError::Io`] if the build directory cannot be prepared, and
    /// [`BuildError::BuildFailed`] if either tool phase fails.
    pub fn build(
        &self,
        definitions: &BTreeMap<String, String>,
        options: &OptionSet,
        settings: &Settings,
        working_dir: &Path,
    ) -> Result<BuildResult, BuildError> {
        let started = Instant::now();
        let configuration = BuildConfiguration::derive(options, definitions, settings)?;

        let build_dir = working_dir.join(crate::workspace::BUILD_DIR);
        std::fs::create_dir_all(&build_dir)?;

        let prefix_paths: Vec<PathBuf> = self.deps.iter().map(|(_, p)| p.clone()).collect();
        let env = dependency_env(self.deps);
        let build_info = if self.deps.is_empty() {
            None
        } else {
            Some(write_build_info(&build_dir, self.deps)?)
        };

        tracing::info!(
            "configuring with {} ({} definitions)",
            self.tool.name(),
            configuration.len()
        );
        self.tool
            .configure(&ConfigureStep {
                source_dir: working_dir,
                build_dir: &build_dir,
                configuration: &configuration,
                prefix_paths: &prefix_paths,
                build_info: build_info.as_deref(),
                env: &env,
            })
            .map_err(|f| self.failed(BuildPhase::Configure, f))?;

        tracing::info!("building with {} ({} jobs)", self.tool.name(), self.jobs);
        self.tool
            .compile(&CompileStep {
                build_dir: &build_dir,
                build_type: settings.build_type,
                jobs: self.jobs,
                env: &env,
            })
            .map_err(|f| self.failed(BuildPhase::Compile, f))?;

        Ok(BuildResult {
            build_dir,
            configuration,
            elapsed: started.elapsed(),
        })
    }

    fn failed(&self, phase: BuildPhase, failure: ToolFailure) -> BuildError {
        tracing::warn!("{} {phase} failed: {:?}", self.tool.name(), failure.exit_code);
        BuildError::BuildFailed {
            tool: self.tool.name().to_string(),
            phase,
            exit_code: failure.exit_code,
            diagnostics: failure.diagnostics,
            log: failure.log,
        }
    }
}

/// `boost-format` becomes `BOOST_FORMAT`.
fn dep_suffix(name: &str) -> String {
    name.to_uppercase().replace(['-', '.'], "_")
}

/// Environment variable name for a dependency: `DEP_OPENSSL`, `DEP_BOOST_FORMAT`.
fn dep_var(name: &str) -> String {
    format!("DEP_{}", dep_suffix(name))
}

fn dependency_env(deps: &[(String, PathBuf)]) -> Vec<(String, String)> {
    deps.iter()
        .map(|(name, path)| (dep_var(name), path.to_string_lossy().to_string()))
        .collect()
}

/// Write [`BUILD_INFO_FILE`] describing each dependency root.
///
/// The file is pulled in through `CMAKE_PROJECT_INCLUDE`, so projects pick up
/// include and library directories without editing their `CMakeLists.txt`.
fn write_build_info(build_dir: &Path, deps: &[(String, PathBuf)]) -> std::io::Result<PathBuf> {
    use std::fmt::Write as _;

    let mut out = String::from("# Generated by kiln. Do not edit.\n\n");
    let mut all_includes = Vec::new();
    let mut all_libs = Vec::new();

    for (name, root) in deps {
        let suffix = dep_suffix(name);
        let root_str = cmake_path(root);
        let _ = writeln!(out, "set(KILN_ROOT_{suffix} \"{root_str}\")");
        let _ = writeln!(out, "list(APPEND CMAKE_PREFIX_PATH \"{root_str}\")");

        let include = root.join("include");
        if include.is_dir() {
            let inc = cmake_path(&include);
            let _ = writeln!(out, "set(KILN_INCLUDE_DIRS_{suffix} \"{inc}\")");
            all_includes.push(inc);
        }
        let lib = root.join("lib");
        if lib.is_dir() {
            let lib = cmake_path(&lib);
            let _ = writeln!(out, "set(KILN_LIB_DIRS_{suffix} \"{lib}\")");
            all_libs.push(lib);
        }
        out.push('\n');
    }

    let _ = writeln!(out, "set(KILN_INCLUDE_DIRS \"{}\")", all_includes.join(";"));
    let _ = writeln!(out, "set(KILN_LIB_DIRS \"{}\")", all_libs.join(";"));
    out.push_str("include_directories(${KILN_INCLUDE_DIRS})\n");
    out.push_str("link_directories(${KILN_LIB_DIRS})\n");

    let path = build_dir.join(BUILD_INFO_FILE);
    std::fs::write(&path, out)?;
    Ok(path)
}

/// CMake wants forward slashes even on Windows.
fn cmake_path(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

/// [`BuildTool`] backed by the `cmake` executable.
#[derive(Debug, Clone)]
pub struct CMake {
    program: PathBuf,
    generator: Option<String>,
    log_path: Option<PathBuf>,
    verbose: bool,
}

impl CMake {
    /// Use the `cmake` found on `PATH`.
    ///
    /// # Errors
    ///
    /// Returns an error if no `cmake` executable can be found.
    pub fn locate() -> anyhow::Result<Self> {
        let program = which::which("cmake")
            .map_err(|e| anyhow::anyhow!("cmake not found on PATH: {e}"))?;
        Ok(Self::new(program))
    }

    /// Use the given `cmake` executable.
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            generator: None,
            log_path: None,
            verbose: false,
        }
    }

    /// Pass `-G <generator>` at configure time.
    pub fn with_generator(mut self, generator: &str) -> Self {
        self.generator = Some(generator.to_string());
        self
    }

    /// Append tool output to `path` instead of capturing it in memory.
    pub fn with_log(mut self, path: impl Into<PathBuf>) -> Self {
        self.log_path = Some(path.into());
        self
    }

    /// Stream tool output to the terminal.
    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Arguments for the configure phase.
    pub fn configure_args(&self, step: &ConfigureStep<'_>) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec![
            "-S".into(),
            step.source_dir.into(),
            "-B".into(),
            step.build_dir.into(),
        ];
        if let Some(generator) = &self.generator {
            args.push("-G".into());
            args.push(generator.into());
        }
        args.extend(step.configuration.to_cmake_args().into_iter().map(OsString::from));

        if !step.prefix_paths.is_empty() {
            let joined = step
                .prefix_paths
                .iter()
                .map(|p| cmake_path(p))
                .collect::<Vec<_>>()
                .join(";");
            args.push(format!("-DCMAKE_PREFIX_PATH={joined}").into());
        }
        if let Some(info) = step.build_info {
            args.push(format!("-DCMAKE_PROJECT_INCLUDE={}", cmake_path(info)).into());
        }
        args
    }

    /// Arguments for the compile phase.
    pub fn compile_args(step: &CompileStep<'_>) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec!["--build".into(), step.build_dir.into()];
        if let Some(build_type) = step.build_type {
            args.push("--config".into());
            args.push(build_type.as_str().into());
        }
        args.push("--parallel".into());
        args.push(step.jobs.to_string().into());
        args
    }

    fn command(&self, home: &Path, env: &[(String, String)]) -> Command {
        let mut cmd = Command::new(&self.program);

        if cfg!(unix) {
            // Start from a blank slate so host env vars never leak in.
            cmd.env_clear();

            let mut path_dirs = vec![
                "/usr/bin".to_string(),
                "/bin".to_string(),
                "/usr/sbin".to_string(),
                "/sbin".to_string(),
            ];
            let xcode_clt = Path::new("/Library/Developer/CommandLineTools/usr/bin");
            if xcode_clt.is_dir() {
                path_dirs.insert(0, xcode_clt.to_string_lossy().to_string());
            }
            if let Some(dir) = self.program.parent().filter(|d| !d.as_os_str().is_empty()) {
                path_dirs.insert(0, dir.to_string_lossy().to_string());
            }

            cmd.env("PATH", path_dirs.join(":"))
                .env("HOME", home)
                .env("TERM", "dumb")
                .env("LANG", "en_US.UTF-8");
        }

        cmd.env("SOURCE_DATE_EPOCH", SOURCE_DATE_EPOCH);
        for (key, value) in env {
            cmd.env(key, value);
        }
        cmd
    }

    fn run(&self, args: &[OsString], home: &Path, env: &[(String, String)]) -> Result<(), ToolFailure> {
        let mut cmd = self.command(home, env);
        cmd.args(args);
        tracing::debug!("running {} {:?}", self.program.display(), args);

        let spawn_failure = |e: std::io::Error| {
            ToolFailure::new(None, format!("Failed to execute {}: {e}", self.program.display()))
        };

        if self.verbose {
            return run_streaming(cmd).map_err(spawn_failure)?;
        }

        if let Some(log_path) = &self.log_path {
            let log = open_log(log_path).map_err(spawn_failure)?;
            // Earlier phases share the log; only this phase's output is reported.
            let offset = log.metadata().map_err(spawn_failure)?.len();
            let log_err = log.try_clone().map_err(spawn_failure)?;
            let status = cmd
                .stdout(Stdio::from(log))
                .stderr(Stdio::from(log_err))
                .status()
                .map_err(spawn_failure)?;
            if status.success() {
                return Ok(());
            }
            return Err(ToolFailure {
                exit_code: status.code(),
                diagnostics: read_from(log_path, offset).unwrap_or_default(),
                log: Some(log_path.clone()),
            });
        }

        let output = cmd.output().map_err(spawn_failure)?;
        if output.status.success() {
            return Ok(());
        }
        Err(ToolFailure::new(
            output.status.code(),
            pick_diagnostics(&output.stdout, &output.stderr),
        ))
    }
}

/// Echo the tool's output to the terminal while keeping a copy for the
/// failure report.
fn run_streaming(mut cmd: Command) -> std::io::Result<Result<(), ToolFailure>> {
    let mut child = cmd.stdout(Stdio::piped()).stderr(Stdio::piped()).spawn()?;
    let stdout = child.stdout.take().map(|out| tee(out, std::io::stdout()));
    let stderr = child.stderr.take().map(|err| tee(err, std::io::stderr()));
    let status = child.wait()?;

    let collect = |handle: Option<std::thread::JoinHandle<Vec<u8>>>| {
        handle.and_then(|h| h.join().ok()).unwrap_or_default()
    };
    let stdout = collect(stdout);
    let stderr = collect(stderr);

    if status.success() {
        return Ok(Ok(()));
    }
    Ok(Err(ToolFailure::new(
        status.code(),
        pick_diagnostics(&stdout, &stderr),
    )))
}

/// Diagnostics are whatever went to stderr, or stdout when stderr was silent.
fn pick_diagnostics(stdout: &[u8], stderr: &[u8]) -> String {
    let stderr = String::from_utf8_lossy(stderr);
    if stderr.trim().is_empty() {
        String::from_utf8_lossy(stdout).to_string()
    } else {
        stderr.to_string()
    }
}

/// Copy `reader` into `sink` on a background thread, returning everything read.
fn tee<R, W>(mut reader: R, mut sink: W) -> std::thread::JoinHandle<Vec<u8>>
where
    R: Read + Send + 'static,
    W: Write + Send + 'static,
{
    std::thread::spawn(move || {
        let mut captured = Vec::new();
        let mut buf = [0u8; 8192];
        loop {
            match reader.read(&mut buf) {
                Ok(0) | Err(_) => break,
                Ok(n) => {
                    let _ = sink.write_all(&buf[..n]);
                    let _ = sink.flush();
                    captured.extend_from_slice(&buf[..n]);
                }
            }
        }
        captured
    })
}

impl BuildTool for CMake {
    fn name(&self) -> &str {
        "cmake"
    }

    fn configure(&self, step: &ConfigureStep<'_>) -> Result<(), ToolFailure> {
        self.run(&self.configure_args(step), step.build_dir, step.env)
    }

    fn compile(&self, step: &CompileStep<'_>) -> Result<(), ToolFailure> {
        self.run(&Self::compile_args(step), step.build_dir, step.env)
    }
}

fn open_log(path: &Path) -> std::io::Result<File> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    OpenOptions::new().create(true).append(true).open(path)
}

/// Everything written to `path` after byte `offset`.
fn read_from(path: &Path, offset: u64) -> std::io::Result<String> {
    use std::io::{Seek, SeekFrom};

    let mut file = File::open(path)?;
    file.seek(SeekFrom::Start(offset))?;
    let mut bytes = Vec::new();
    file.read_to_end(&mut bytes)?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::recipe::tests::terminalpp;
    use kiln_schema::OptionValue;
    use std::cell::RefCell;
    use tempfile::tempdir;

    /// Records every call and optionally fails one phase.
    #[derive(Debug, Default)]
    pub(crate) struct ScriptedTool {
        pub(crate) fail_on: Option<BuildPhase>,
        pub(crate) calls: RefCell<Vec<String>>,
        pub(crate) seen: RefCell<Option<BuildConfiguration>>,
        /// Files (relative to the build dir) created by a successful compile.
        pub(crate) outputs: Vec<&'static str>,
        /// Log path reported with a failure.
        pub(crate) log: Option<PathBuf>,
    }

    impl ScriptedTool {
        pub(crate) fn failing(phase: BuildPhase) -> Self {
            Self {
                fail_on: Some(phase),
                ..Self::default()
            }
        }
    }

    impl BuildTool for ScriptedTool {
        fn name(&self) -> &str {
            "scripted"
        }

        fn configure(&self, step: &ConfigureStep<'_>) -> Result<(), ToolFailure> {
            self.calls.borrow_mut().push("configure".to_string());
            *self.seen.borrow_mut() = Some(step.configuration.clone());
            if self.fail_on == Some(BuildPhase::Configure) {
                return Err(ToolFailure {
                    exit_code: Some(1),
                    diagnostics: "CMake Error: could not find CMakeLists.txt".to_string(),
                    log: self.log.clone(),
                });
            }
            Ok(())
        }

        fn compile(&self, step: &CompileStep<'_>) -> Result<(), ToolFailure> {
            self.calls.borrow_mut().push("compile".to_string());
            if self.fail_on == Some(BuildPhase::Compile) {
                return Err(ToolFailure {
                    exit_code: Some(2),
                    diagnostics: "terminal.cpp:12: error: expected ';'".to_string(),
                    log: self.log.clone(),
                });
            }
            for rel in &self.outputs {
                let path = step.build_dir.join(rel);
                std::fs::create_dir_all(path.parent().unwrap()).unwrap();
                std::fs::write(path, b"\x7fELF").unwrap();
            }
            Ok(())
        }
    }

    #[test]
    fn test_configure_receives_derived_configuration() {
        let recipe = terminalpp();
        let work = tempdir().unwrap();
        for shared in [true, false] {
            let tool = ScriptedTool::default();
            let mut opts = recipe.default_options().unwrap();
            opts.set("shared", shared).unwrap();

            let result = Builder::new(&tool)
                .build(&recipe.definitions(), &opts, &Settings::default(), work.path())
                .unwrap();

            let seen = tool.seen.borrow().clone().unwrap();
            assert_eq!(seen.get("BUILD_SHARED_LIBS"), Some(&OptionValue::Bool(shared)));
            assert_eq!(result.configuration, seen);
            assert_eq!(*tool.calls.borrow(), vec!["configure", "compile"]);
            assert_eq!(result.build_dir, work.path().join("build"));
        }
    }

    #[test]
    fn test_compile_failure_is_reported_verbatim() {
        let recipe = terminalpp();
        let work = tempdir().unwrap();
        let tool = ScriptedTool::failing(BuildPhase::Compile);
        let opts = recipe.default_options().unwrap();

        let err = Builder::new(&tool)
            .build(&recipe.definitions(), &opts, &Settings::default(), work.path())
            .unwrap_err();

        match err {
            BuildError::BuildFailed {
                phase,
                exit_code,
                diagnostics,
                ..
            } => {
                assert_eq!(phase, BuildPhase::Compile);
                assert_eq!(exit_code, Some(2));
                assert_eq!(diagnostics, "terminal.cpp:12: error: expected ';'");
            }
            other => panic!("expected BuildFailed, got {other:?}"),
        }
    }

    #[test]
    fn test_configure_failure_skips_compile() {
        let recipe = terminalpp();
        let work = tempdir().unwrap();
        let tool = ScriptedTool::failing(BuildPhase::Configure);
        let opts = recipe.default_options().unwrap();

        let err = Builder::new(&tool)
            .build(&recipe.definitions(), &opts, &Settings::default(), work.path())
            .unwrap_err();

        assert!(matches!(
            err,
            BuildError::BuildFailed {
                phase: BuildPhase::Configure,
                ..
            }
        ));
        assert_eq!(*tool.calls.borrow(), vec!["configure"]);
    }

    #[test]
    fn test_mapping_error_never_reaches_tool() {
        let recipe = terminalpp();
        let work = tempdir().unwrap();
        let tool = ScriptedTool::default();
        let opts = recipe.default_options().unwrap();
        let mut defs = recipe.definitions();
        defs.remove("shared");

        let err = Builder::new(&tool)
            .build(&defs, &opts, &Settings::default(), work.path())
            .unwrap_err();

        assert!(matches!(err, BuildError::ConfigurationMapping { .. }));
        assert!(tool.calls.borrow().is_empty());
        assert!(!work.path().join("build").exists());
    }

    #[test]
    fn test_build_info_written_for_dependencies() {
        let recipe = terminalpp();
        let work = tempdir().unwrap();
        let dep = tempdir().unwrap();
        std::fs::create_dir_all(dep.path().join("include")).unwrap();
        std::fs::create_dir_all(dep.path().join("lib")).unwrap();
        let deps = vec![("boost-format".to_string(), dep.path().to_path_buf())];

        let tool = ScriptedTool::default();
        Builder::new(&tool)
            .with_dependencies(&deps)
            .build(
                &recipe.definitions(),
                &recipe.default_options().unwrap(),
                &Settings::default(),
                work.path(),
            )
            .unwrap();

        let info = std::fs::read_to_string(work.path().join("build").join(BUILD_INFO_FILE)).unwrap();
        assert!(info.contains("set(KILN_ROOT_BOOST_FORMAT"));
        assert!(info.contains("KILN_INCLUDE_DIRS_BOOST_FORMAT"));
        assert!(info.contains("KILN_LIB_DIRS_BOOST_FORMAT"));
        assert!(info.contains("list(APPEND CMAKE_PREFIX_PATH"));
        assert!(!info.contains("_DEP_"));
    }

    #[test]
    fn test_cmake_args() {
        let recipe = terminalpp();
        let mut opts = recipe.default_options().unwrap();
        opts.set("shared", true).unwrap();
        let config = BuildConfiguration::derive(
            &opts,
            &recipe.definitions(),
            &Settings::default(),
        )
        .unwrap();

        let cmake = CMake::new("/opt/cmake/bin/cmake").with_generator("Ninja");
        let prefix = vec![PathBuf::from("/deps/boost")];
        let args = cmake.configure_args(&ConfigureStep {
            source_dir: Path::new("/work"),
            build_dir: Path::new("/work/build"),
            configuration: &config,
            prefix_paths: &prefix,
            build_info: Some(Path::new("/work/build/kilnbuildinfo.cmake")),
            env: &[],
        });
        let args: Vec<String> = args.iter().map(|a| a.to_string_lossy().to_string()).collect();
        assert_eq!(
            args,
            vec![
                "-S",
                "/work",
                "-B",
                "/work/build",
                "-G",
                "Ninja",
                "-DBUILD_SHARED_LIBS=ON",
                "-DTERMINALPP_WITH_TESTS=OFF",
                "-DCMAKE_PREFIX_PATH=/deps/boost",
                "-DCMAKE_PROJECT_INCLUDE=/work/build/kilnbuildinfo.cmake",
            ]
        );

        let compile = CMake::compile_args(&CompileStep {
            build_dir: Path::new("/work/build"),
            build_type: Some(BuildType::Release),
            jobs: 8,
            env: &[],
        });
        let compile: Vec<String> = compile
            .iter()
            .map(|a| a.to_string_lossy().to_string())
            .collect();
        assert_eq!(
            compile,
            vec!["--build", "/work/build", "--config", "Release", "--parallel", "8"]
        );
    }

    #[cfg(unix)]
    fn fake_cmake(dir: &Path, body: &str) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;
        let path = dir.join("cmake");
        std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[cfg(unix)]
    #[test]
    fn test_cmake_failure_captures_stderr() {
        let bin = tempdir().unwrap();
        let work = tempdir().unwrap();
        let program = fake_cmake(bin.path(), "echo 'CMake Error at CMakeLists.txt:3' >&2\nexit 3");
        let recipe = terminalpp();

        let cmake = CMake::new(program);
        let err = Builder::new(&cmake)
            .build(
                &recipe.definitions(),
                &recipe.default_options().unwrap(),
                &Settings::default(),
                work.path(),
            )
            .unwrap_err();

        match err {
            BuildError::BuildFailed {
                tool,
                phase,
                exit_code,
                diagnostics,
                log,
            } => {
                assert_eq!(tool, "cmake");
                assert_eq!(log, None);
                assert_eq!(phase, BuildPhase::Configure);
                assert_eq!(exit_code, Some(3));
                assert_eq!(diagnostics.trim(), "CMake Error at CMakeLists.txt:3");
            }
            other => panic!("expected BuildFailed, got {other:?}"),
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_cmake_failure_reports_phase_output_from_log() {
        let bin = tempdir().unwrap();
        let work = tempdir().unwrap();
        let logs = tempdir().unwrap();
        let log_path = logs.path().join("build.log");
        let program = fake_cmake(
            bin.path(),
            "if [ \"$1\" = \"--build\" ]; then\n\
             i=1; while [ $i -le 100 ]; do echo \"error line $i\" >&2; i=$((i+1)); done\n\
             exit 1\nfi\necho configured",
        );
        let recipe = terminalpp();

        let cmake = CMake::new(program).with_log(&log_path);
        let err = Builder::new(&cmake)
            .build(
                &recipe.definitions(),
                &recipe.default_options().unwrap(),
                &Settings::default(),
                work.path(),
            )
            .unwrap_err();

        let BuildError::BuildFailed {
            phase,
            diagnostics,
            log,
            ..
        } = err
        else {
            panic!("expected BuildFailed");
        };
        assert_eq!(phase, BuildPhase::Compile);
        assert_eq!(log.as_deref(), Some(log_path.as_path()));

        let expected: String = (1..=100).map(|i| format!("error line {i}\n")).collect();
        assert_eq!(diagnostics, expected);
        assert!(!diagnostics.contains("configured"));

        let full = std::fs::read_to_string(&log_path).unwrap();
        assert!(full.starts_with("configured\n"));
    }

    #[cfg(unix)]
    #[test]
    fn test_verbose_failure_keeps_diagnostics() {
        let bin = tempdir().unwrap();
        let work = tempdir().unwrap();
        let program = fake_cmake(
            bin.path(),
            "i=1; while [ $i -le 60 ]; do echo \"CMake Error $i\" >&2; i=$((i+1)); done\nexit 1",
        );
        let recipe = terminalpp();

        let cmake = CMake::new(program).verbose(true);
        let err = Builder::new(&cmake)
            .build(
                &recipe.definitions(),
                &recipe.default_options().unwrap(),
                &Settings::default(),
                work.path(),
            )
            .unwrap_err();

        let BuildError::BuildFailed {
            phase,
            diagnostics,
            log,
            ..
        } = err
        else {
            panic!("expected BuildFailed");
        };
        assert_eq!(phase, BuildPhase::Configure);
        assert_eq!(log, None);
        let expected: String = (1..=60).map(|i| format!("CMake Error {i}\n")).collect();
        assert_eq!(diagnostics, expected);
    }

    #[cfg(unix)]
    #[test]
    fn test_cmake_environment_is_sanitised() {
        let bin = tempdir().unwrap();
        let work = tempdir().unwrap();
        let out = work.path().join("env.txt");
        let program = fake_cmake(
            bin.path(),
            &format!("env > '{}'", out.display()),
        );
        let recipe = terminalpp();
        let deps = vec![("zlib".to_string(), bin.path().to_path_buf())];

        let cmake = CMake::new(program);
        Builder::new(&cmake)
            .with_dependencies(&deps)
            .build(
                &recipe.definitions(),
                &recipe.default_options().unwrap(),
                &Settings::default(),
                work.path(),
            )
            .unwrap();

        let env = std::fs::read_to_string(&out).unwrap();
        assert!(env.contains("SOURCE_DATE_EPOCH=0"));
        assert!(env.contains("TERM=dumb"));
        assert!(env.contains("DEP_ZLIB="));
        assert!(!env.contains("CARGO_PKG_NAME="));
    }

    #[test]
    fn test_read_from_offset() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("log");
        std::fs::write(&path, "configure output\nbuild output\n").unwrap();
        assert_eq!(read_from(&path, 17).unwrap(), "build output\n");
        assert_eq!(read_from(&path, 0).unwrap().lines().count(), 2);
    }
}
