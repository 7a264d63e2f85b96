//! TOML recipe parsing
//!
//! A recipe is a human-written description of one library: its identity,
//! options, requirements, packaging table and link contract. Loading a
//! recipe validates everything that can be checked without running a build.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::configuration::BUILD_TYPE_KEY;

pub use kiln_schema::{
    ArtifactDescriptor, DependencySpec, OptionDecl, OptionError, OptionSet, OptionValue,
    PackageExport, RecipeIdentity, default_descriptors,
};

/// Errors that can occur when loading or parsing a recipe.
#[derive(Error, Debug)]
pub enum RecipeError {
    /// An I/O error occurred while reading a recipe file.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The TOML content could not be deserialized into a valid recipe.
    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    /// An option declaration or predicate is inconsistent.
    #[error("Option error: {0}")]
    Option(#[from] OptionError),

    /// Two options feed the same configuration key.
    #[error("Options '{first}' and '{second}' both define '{key}'")]
    DuplicateDefine {
        /// The shared configuration key.
        key: String,
        /// First option declaring it, in name order.
        first: String,
        /// Second option declaring it.
        second: String,
    },

    /// A packaging glob does not compile.
    #[error("Invalid package pattern '{pattern}': {message}")]
    Pattern {
        /// The offending pattern.
        pattern: String,
        /// Compiler message from `glob`.
        message: String,
    },
}

/// The `[recipe]` table: identity plus the settings and exports it uses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecipeSection {
    /// Name, version, license and friends.
    #[serde(flatten)]
    pub identity: RecipeIdentity,
    /// Which target settings the recipe consumes.
    #[serde(default)]
    pub settings: Vec<String>,
    /// Globs selecting the source files shipped with the recipe.
    #[serde(default)]
    pub exports: Vec<String>,
}

/// A requirement added only when its predicate holds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConditionalRequirement {
    /// The requirement to append.
    pub require: DependencySpec,
    /// Every listed option must currently equal the given value.
    pub when: BTreeMap<String, OptionValue>,
}

impl ConditionalRequirement {
    /// Whether the predicate holds for `options`. Undeclared names never match.
    pub fn applies(&self, options: &OptionSet) -> bool {
        self.when
            .iter()
            .all(|(name, expected)| options.get(name).is_ok_and(|v| v == expected))
    }
}

/// The `[requires]` table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Requirements {
    /// Always required, in declaration order.
    #[serde(default)]
    pub base: Vec<DependencySpec>,
    /// Appended after `base`, in table order, when their predicate holds.
    #[serde(default)]
    pub conditional: Vec<ConditionalRequirement>,
}

/// Complete recipe definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recipe {
    /// Identity, settings and exports.
    pub recipe: RecipeSection,
    /// Option declarations keyed by name.
    #[serde(default)]
    pub options: BTreeMap<String, OptionDecl>,
    /// Base and conditional requirements.
    #[serde(default)]
    pub requires: Requirements,
    /// Packaging table. Empty means [`default_descriptors`].
    #[serde(default)]
    pub package: Vec<ArtifactDescriptor>,
    /// Link contract. An empty list means "link against the recipe name".
    #[serde(default)]
    pub package_info: PackageExport,
}

impl Recipe {
    /// Parse a recipe from a TOML file on disk.
    ///
    /// # Errors
    ///
    /// Returns `RecipeError::Io` if the file cannot be read, or any of the
    /// errors of [`Recipe::parse`].
    pub fn from_file(path: &Path) -> Result<Self, RecipeError> {
        let content = fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Parse and validate a recipe from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns `RecipeError::Parse` if the TOML is invalid or a requirement
    /// reference is malformed, `RecipeError::Option` if a default lies outside
    /// its domain or a predicate names an undeclared option or an
    /// out-of-domain value, `RecipeError::DuplicateDefine` if two options (or
    /// an option and the build type) share a configuration key, and
    /// `RecipeError::Pattern` for a bad glob.
    pub fn parse(content: &str) -> Result<Self, RecipeError> {
        let mut recipe: Recipe = toml::from_str(content)?;

        if recipe.package.is_empty() {
            recipe.package = default_descriptors();
        }
        if recipe.package_info.libs.is_empty() {
            recipe.package_info.libs = vec![recipe.recipe.identity.name.to_string()];
        }

        recipe.validate()?;
        Ok(recipe)
    }

    fn validate(&self) -> Result<(), RecipeError> {
        let defaults = OptionSet::from_decls(&self.options)?;

        let mut keys: BTreeMap<&str, &str> = BTreeMap::new();
        for (name, decl) in &self.options {
            let Some(key) = decl.define.as_deref() else {
                continue;
            };
            let taken = if key == BUILD_TYPE_KEY {
                Some("build_type")
            } else {
                keys.insert(key, name.as_str())
            };
            if let Some(first) = taken {
                return Err(RecipeError::DuplicateDefine {
                    key: key.to_string(),
                    first: first.to_string(),
                    second: name.clone(),
                });
            }
        }

        // Dry-run each predicate value through `set` so that a typo in a
        // conditional requirement fails at load time rather than silently
        // never matching.
        for cond in &self.requires.conditional {
            let mut trial = defaults.clone();
            for (name, value) in &cond.when {
                trial.set(name, value.clone())?;
            }
        }

        for descriptor in self.package.iter().map(|d| &d.pattern).chain(&self.recipe.exports) {
            glob::Pattern::new(descriptor).map_err(|e| RecipeError::Pattern {
                pattern: descriptor.clone(),
                message: e.to_string(),
            })?;
        }

        Ok(())
    }

    /// Recipe identity.
    pub fn identity(&self) -> &RecipeIdentity {
        &self.recipe.identity
    }

    /// A fresh option set holding every declared default.
    ///
    /// # Errors
    ///
    /// Cannot fail for a recipe obtained from [`Recipe::parse`]; returns
    /// [`OptionError::InvalidOptionValue`] for a hand-built recipe whose
    /// default lies outside its domain.
    pub fn default_options(&self) -> Result<OptionSet, OptionError> {
        OptionSet::from_decls(&self.options)
    }

    /// Option name to build configuration key. Options without a `define`
    /// are absent, which the configure phase reports.
    pub fn definitions(&self) -> BTreeMap<String, String> {
        self.options
            .iter()
            .filter_map(|(name, decl)| decl.define.clone().map(|key| (name.clone(), key)))
            .collect()
    }

    /// Serialize this recipe to a pretty-printed TOML string.
    ///
    /// # Errors
    ///
    /// Returns a `toml::ser::Error` if serialization fails.
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }
}

impl std::str::FromStr for Recipe {
    type Err = RecipeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) const TERMINALPP: &str = r#"
[recipe]
name = "terminalpp"
version = "1.3.0"
license = "MIT"
author = "KazDragon"
homepage = "https://github.com/KazDragon/terminalpp"
description = "A C++ library for interacting with ANSI terminal windows"
topics = ["terminal-emulators", "ansi-escape-codes"]
settings = ["os", "compiler", "build_type", "arch"]
exports = ["*.hpp", "*.in", "*.cpp", "CMakeLists.txt", "*.md", "LICENSE"]

[options.shared]
values = [true, false]
default = false
define = "BUILD_SHARED_LIBS"

[options.withTests]
values = [true, false]
default = false
define = "TERMINALPP_WITH_TESTS"

[requires]
base = [
    "boost_format/[>=1.69]@bincrafters/stable",
    "boost_optional/[>=1.69]@bincrafters/stable",
    "boost_variant/[>=1.69]@bincrafters/stable",
]

[[requires.conditional]]
when = { withTests = true }
require = "gtest/[>=1.8.1]@bincrafters/stable"
"#;

    pub(crate) fn terminalpp() -> Recipe {
        Recipe::parse(TERMINALPP).unwrap()
    }

    #[test]
    fn test_parse_recipe() {
        let recipe = terminalpp();
        let id = recipe.identity();
        assert_eq!(id.name, "terminalpp");
        assert_eq!(id.version, "1.3.0");
        assert_eq!(id.author, "KazDragon");
        assert_eq!(id.topics.len(), 2);
        assert_eq!(recipe.requires.base.len(), 3);
        assert_eq!(recipe.requires.conditional.len(), 1);
        assert_eq!(recipe.recipe.exports.len(), 6);
    }

    #[test]
    fn test_defaults_filled_in() {
        let recipe = terminalpp();
        assert_eq!(recipe.package, default_descriptors());
        assert_eq!(recipe.package_info.libs, vec!["terminalpp"]);

        let opts = recipe.default_options().unwrap();
        assert!(!opts.is_enabled("shared"));
        assert!(!opts.is_enabled("withTests"));
    }

    #[test]
    fn test_definitions() {
        let defs = terminalpp().definitions();
        assert_eq!(defs["shared"], "BUILD_SHARED_LIBS");
        assert_eq!(defs["withTests"], "TERMINALPP_WITH_TESTS");
    }

    #[test]
    fn test_predicate_on_undeclared_option_rejected() {
        let bad = TERMINALPP.replace("when = { withTests = true }", "when = { withDocs = true }");
        assert!(matches!(
            Recipe::parse(&bad),
            Err(RecipeError::Option(OptionError::UnknownOption { .. }))
        ));
    }

    #[test]
    fn test_predicate_outside_domain_rejected() {
        let bad = TERMINALPP.replace("when = { withTests = true }", "when = { withTests = \"yes\" }");
        assert!(matches!(
            Recipe::parse(&bad),
            Err(RecipeError::Option(OptionError::InvalidOptionValue { .. }))
        ));
    }

    #[test]
    fn test_malformed_reference_rejected() {
        let bad = TERMINALPP.replace("gtest/[>=1.8.1]@bincrafters/stable", "gtest");
        assert!(matches!(Recipe::parse(&bad), Err(RecipeError::Parse(_))));
    }

    #[test]
    fn test_shared_define_rejected() {
        let bad = TERMINALPP.replace("TERMINALPP_WITH_TESTS", "BUILD_SHARED_LIBS");
        match Recipe::parse(&bad) {
            Err(RecipeError::DuplicateDefine { key, first, second }) => {
                assert_eq!(key, "BUILD_SHARED_LIBS");
                assert_eq!(first, "shared");
                assert_eq!(second, "withTests");
            }
            other => panic!("expected DuplicateDefine, got {other:?}"),
        }
    }

    #[test]
    fn test_define_cannot_shadow_build_type() {
        let bad = TERMINALPP.replace("TERMINALPP_WITH_TESTS", "CMAKE_BUILD_TYPE");
        assert!(matches!(
            Recipe::parse(&bad),
            Err(RecipeError::DuplicateDefine { .. })
        ));
    }

    #[test]
    fn test_bad_pattern_rejected() {
        let bad = format!("{TERMINALPP}\n[[package]]\npattern = \"[\"\ndst = \"lib\"\n");
        assert!(matches!(Recipe::parse(&bad), Err(RecipeError::Pattern { .. })));
    }

    #[test]
    fn test_missing_recipe_section() {
        let result = Recipe::parse("[options.shared]\nvalues = [true]\ndefault = true\n");
        assert!(result.is_err());
    }

    #[test]
    fn test_roundtrip_through_toml() {
        let recipe = terminalpp();
        let text = recipe.to_toml().unwrap();
        let again = Recipe::parse(&text).unwrap();
        assert_eq!(again.requires, recipe.requires);
        assert_eq!(again.package, recipe.package);
    }
}
