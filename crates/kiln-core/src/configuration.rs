//! Build configuration derived from option values.
//!
//! The mapping is total: every declared option feeds exactly one key. A new
//! option added to a recipe without a `define` stops the configure phase
//! instead of being silently left out.

use std::collections::BTreeMap;

use kiln_schema::{OptionSet, OptionValue, Settings};
use serde::{Deserialize, Serialize};

use crate::builder::BuildError;

/// Key the build type setting is passed under.
pub const BUILD_TYPE_KEY: &str = "CMAKE_BUILD_TYPE";

/// Configuration-key to value map handed to the build tool.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BuildConfiguration {
    definitions: BTreeMap<String, OptionValue>,
}

impl BuildConfiguration {
    /// Derive the configuration for `options`.
    ///
    /// `mapping` is option name to configuration key (see
    /// [`Recipe::definitions`](crate::recipe::Recipe::definitions)). The
    /// settings' build type, when present, is added under
    /// [`BUILD_TYPE_KEY`].
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::ConfigurationMapping`] naming the first option
    /// that has no mapping rule.
    pub fn derive(
        options: &OptionSet,
        mapping: &BTreeMap<String, String>,
        settings: &Settings,
    ) -> Result<Self, BuildError> {
        let mut definitions = BTreeMap::new();

        for (name, value) in options.iter() {
            let key = mapping
                .get(name)
                .ok_or_else(|| BuildError::ConfigurationMapping {
                    option: name.to_string(),
                })?;
            definitions.insert(key.clone(), value.clone());
        }

        if let Some(build_type) = settings.build_type {
            definitions.insert(
                BUILD_TYPE_KEY.to_string(),
                OptionValue::Text(build_type.as_str().to_string()),
            );
        }

        Ok(Self { definitions })
    }

    /// Value for `key`, if derived.
    pub fn get(&self, key: &str) -> Option<&OptionValue> {
        self.definitions.get(key)
    }

    /// Iterate `(key, value)` in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &OptionValue)> {
        self.definitions.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Number of keys.
    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    /// Whether nothing was derived.
    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    /// Render as `-DKEY=VALUE` arguments. Booleans become `ON`/`OFF`.
    pub fn to_cmake_args(&self) -> Vec<String> {
        self.iter()
            .map(|(key, value)| match value {
                OptionValue::Bool(true) => format!("-D{key}=ON"),
                OptionValue::Bool(false) => format!("-D{key}=OFF"),
                OptionValue::Text(text) => format!("-D{key}={text}"),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recipe::tests::terminalpp;
    use kiln_schema::BuildType;

    #[test]
    fn test_shared_maps_to_build_shared_libs() {
        let recipe = terminalpp();
        for shared in [true, false] {
            let mut opts = recipe.default_options().unwrap();
            opts.set("shared", shared).unwrap();
            let config =
                BuildConfiguration::derive(&opts, &recipe.definitions(), &Settings::default())
                    .unwrap();
            assert_eq!(config.get("BUILD_SHARED_LIBS"), Some(&OptionValue::Bool(shared)));
            assert_eq!(
                config.get("TERMINALPP_WITH_TESTS"),
                Some(&OptionValue::Bool(false))
            );
            assert_eq!(config.len(), 2);
        }
    }

    #[test]
    fn test_missing_mapping_is_an_error() {
        let recipe = terminalpp();
        let opts = recipe.default_options().unwrap();
        let mut mapping = recipe.definitions();
        mapping.remove("withTests");

        let err = BuildConfiguration::derive(&opts, &mapping, &Settings::default()).unwrap_err();
        assert!(matches!(err, BuildError::ConfigurationMapping { ref option } if option == "withTests"));
    }

    #[test]
    fn test_build_type_from_settings() {
        let recipe = terminalpp();
        let opts = recipe.default_options().unwrap();
        let settings = Settings {
            build_type: Some(BuildType::Debug),
            ..Settings::default()
        };
        let config = BuildConfiguration::derive(&opts, &recipe.definitions(), &settings).unwrap();
        assert_eq!(
            config.get(BUILD_TYPE_KEY),
            Some(&OptionValue::Text("Debug".to_string()))
        );
    }

    #[test]
    fn test_cmake_args() {
        let recipe = terminalpp();
        let mut opts = recipe.default_options().unwrap();
        opts.set("shared", true).unwrap();
        let config =
            BuildConfiguration::derive(&opts, &recipe.definitions(), &Settings::default()).unwrap();
        assert_eq!(
            config.to_cmake_args(),
            vec![
                "-DBUILD_SHARED_LIBS=ON".to_string(),
                "-DTERMINALPP_WITH_TESTS=OFF".to_string()
            ]
        );
    }
}
