//! Shared recipe types for kiln.
//!
//! Everything in this crate is plain data: the recipe's identity, its option
//! model, requirement references, target settings and the artifact table the
//! packager walks. Behaviour that touches the filesystem or spawns processes
//! lives in `kiln-core`.

pub mod artifact;
pub mod options;
pub mod reference;
pub mod settings;
pub mod types;

// Re-exports
pub use artifact::{ArtifactDescriptor, PackageExport, default_descriptors};
pub use options::{OptionDecl, OptionError, OptionSet, OptionValue};
pub use reference::{Channel, DependencySpec, ReferenceError, VersionConstraint};
pub use settings::{Arch, BuildType, Settings, SettingsError};
pub use types::*;
