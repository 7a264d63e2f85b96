//! Target settings: `os`, `compiler`, `build_type`, `arch`.
//!
//! Settings are passed explicitly into every build. The core never inspects
//! the host; [`Settings::host`] exists for the command-line edge only and is
//! resolved at compile time from `cfg!` values.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors produced when applying a `key=value` setting.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SettingsError {
    /// The key is not one of `os`, `compiler`, `build_type`, `arch`.
    #[error("unknown setting '{0}' (expected os, compiler, build_type or arch)")]
    UnknownSetting(String),

    /// The value could not be parsed for the given key.
    #[error("invalid value '{value}' for setting '{key}'")]
    InvalidValue {
        /// Setting key.
        key: String,
        /// Rejected value.
        value: String,
    },
}

/// Target CPU architecture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Arch {
    /// 32-bit Intel.
    X86,
    /// 64-bit Intel/AMD.
    #[serde(rename = "x86_64")]
    X86_64,
    /// 32-bit ARM.
    Armv7,
    /// 64-bit ARM (Apple Silicon, Graviton, ...).
    Armv8,
}

impl Arch {
    /// Architecture this binary was compiled for.
    pub fn current() -> Self {
        if cfg!(target_arch = "aarch64") {
            Self::Armv8
        } else if cfg!(target_arch = "arm") {
            Self::Armv7
        } else if cfg!(target_arch = "x86") {
            Self::X86
        } else {
            Self::X86_64
        }
    }

    /// Canonical setting value.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::X86 => "x86",
            Self::X86_64 => "x86_64",
            Self::Armv7 => "armv7",
            Self::Armv8 => "armv8",
        }
    }
}

impl std::fmt::Display for Arch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Arch {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "x86" | "i686" | "i386" => Ok(Self::X86),
            "x86_64" | "amd64" | "x64" => Ok(Self::X86_64),
            "armv7" | "arm" => Ok(Self::Armv7),
            "armv8" | "arm64" | "aarch64" => Ok(Self::Armv8),
            _ => Err(format!("Unknown architecture: {s}")),
        }
    }
}

/// CMake-style build type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum BuildType {
    /// Unoptimised with debug info.
    Debug,
    /// Optimised, no debug info.
    #[default]
    Release,
    /// Optimised with debug info.
    RelWithDebInfo,
    /// Optimised for size.
    MinSizeRel,
}

impl BuildType {
    /// Value passed to `CMAKE_BUILD_TYPE` and `--config`.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Debug => "Debug",
            Self::Release => "Release",
            Self::RelWithDebInfo => "RelWithDebInfo",
            Self::MinSizeRel => "MinSizeRel",
        }
    }
}

impl std::fmt::Display for BuildType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for BuildType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "debug" => Ok(Self::Debug),
            "release" => Ok(Self::Release),
            "relwithdebinfo" => Ok(Self::RelWithDebInfo),
            "minsizerel" => Ok(Self::MinSizeRel),
            _ => Err(format!("Unknown build type: {s}")),
        }
    }
}

/// The target a recipe is evaluated for. `None` means "not specified".
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Settings {
    /// Operating system (`Linux`, `Macos`, `Windows`, ...), opaque.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub os: Option<String>,
    /// Compiler identifier (`gcc`, `clang`, `msvc`, ...), opaque.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compiler: Option<String>,
    /// Build type.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub build_type: Option<BuildType>,
    /// Target architecture.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arch: Option<Arch>,
}

impl Settings {
    /// Settings describing the machine this binary was compiled for.
    pub fn host() -> Self {
        let os = if cfg!(target_os = "macos") {
            "Macos"
        } else if cfg!(target_os = "windows") {
            "Windows"
        } else if cfg!(target_os = "freebsd") {
            "FreeBSD"
        } else {
            "Linux"
        };
        let compiler = if cfg!(target_os = "windows") {
            "msvc"
        } else if cfg!(target_os = "macos") {
            "apple-clang"
        } else {
            "gcc"
        };

        Self {
            os: Some(os.to_string()),
            compiler: Some(compiler.to_string()),
            build_type: Some(BuildType::Release),
            arch: Some(Arch::current()),
        }
    }

    /// Apply one `key=value` pair.
    ///
    /// # Errors
    ///
    /// Returns [`SettingsError::UnknownSetting`] for keys other than the four
    /// supported ones, or [`SettingsError::InvalidValue`] when `build_type` or
    /// `arch` cannot be parsed.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), SettingsError> {
        let invalid = || SettingsError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
        };
        match key {
            "os" => self.os = Some(value.to_string()),
            "compiler" => self.compiler = Some(value.to_string()),
            "build_type" => self.build_type = Some(value.parse().map_err(|_| invalid())?),
            "arch" => self.arch = Some(value.parse().map_err(|_| invalid())?),
            other => return Err(SettingsError::UnknownSetting(other.to_string())),
        }
        Ok(())
    }

    /// Keep only the settings a recipe declares it consumes.
    pub fn restrict(&self, declared: &[String]) -> Self {
        let has = |key: &str| declared.iter().any(|d| d == key);
        Self {
            os: self.os.clone().filter(|_| has("os")),
            compiler: self.compiler.clone().filter(|_| has("compiler")),
            build_type: self.build_type.filter(|_| has("build_type")),
            arch: self.arch.filter(|_| has("arch")),
        }
    }
}
