//! Recipe options: named, typed switches with a declared value domain.
//!
//! Domains and defaults are data taken from the recipe file. An [`OptionSet`]
//! is built from those declarations once per evaluation, adjusted by the
//! caller, and then only read.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// Errors raised by the option model.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OptionError {
    /// The option name was never declared by the recipe.
    #[error("unknown option '{name}'")]
    UnknownOption {
        /// The name that was looked up.
        name: String,
    },

    /// The value is not part of the option's declared domain.
    #[error("invalid value '{value}' for option '{name}' (allowed: {allowed})")]
    InvalidOptionValue {
        /// The option being set.
        name: String,
        /// The rejected value.
        value: OptionValue,
        /// Comma-separated rendering of the allowed domain.
        allowed: String,
    },
}

/// A single option value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OptionValue {
    /// Boolean switch.
    Bool(bool),
    /// Free-form string value.
    Text(String),
}

impl std::fmt::Display for OptionValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bool(true) => write!(f, "True"),
            Self::Bool(false) => write!(f, "False"),
            Self::Text(s) => write!(f, "{s}"),
        }
    }
}

impl std::str::FromStr for OptionValue {
    type Err = std::convert::Infallible;

    /// Command-line values: `true`/`false` in any case become booleans,
    /// everything else is kept as text for the domain check to judge.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.to_lowercase().as_str() {
            "true" => Self::Bool(true),
            "false" => Self::Bool(false),
            _ => Self::Text(s.to_string()),
        })
    }
}

impl From<bool> for OptionValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<&str> for OptionValue {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

/// Declaration of one option, as it appears under `[options.<name>]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptionDecl {
    /// Allowed values.
    pub values: Vec<OptionValue>,
    /// Value used until the caller overrides it.
    pub default: OptionValue,
    /// Build configuration key this option feeds. Missing keys are reported
    /// when the build configuration is derived, not at parse time.
    #[serde(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub define: Option<String>,
}

impl OptionDecl {
    /// A `{true, false}` option with the given default and definition key.
    pub fn boolean(default: bool, define: &str) -> Self {
        Self {
            values: vec![OptionValue::Bool(true), OptionValue::Bool(false)],
            default: OptionValue::Bool(default),
            define: Some(define.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct OptionEntry {
    domain: Vec<OptionValue>,
    value: OptionValue,
}

/// Current values for every declared option.
///
/// Invariant: each stored value is a member of its option's domain. A failed
/// [`set`](Self::set) leaves the set untouched.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct OptionSet {
    entries: BTreeMap<String, OptionEntry>,
}

impl OptionSet {
    /// Build a set holding each declaration's default.
    ///
    /// # Errors
    ///
    /// Returns [`OptionError::InvalidOptionValue`] if a declared default lies
    /// outside its own domain.
    pub fn from_decls(decls: &BTreeMap<String, OptionDecl>) -> Result<Self, OptionError> {
        let mut entries = BTreeMap::new();
        for (name, decl) in decls {
            if !decl.values.contains(&decl.default) {
                return Err(invalid(name, &decl.values, decl.default.clone()));
            }
            entries.insert(
                name.clone(),
                OptionEntry {
                    domain: decl.values.clone(),
                    value: decl.default.clone(),
                },
            );
        }
        Ok(Self { entries })
    }

    /// Current value of `name`.
    ///
    /// # Errors
    ///
    /// Returns [`OptionError::UnknownOption`] if `name` was never declared.
    pub fn get(&self, name: &str) -> Result<&OptionValue, OptionError> {
        self.entries
            .get(name)
            .map(|e| &e.value)
            .ok_or_else(|| OptionError::UnknownOption {
                name: name.to_string(),
            })
    }

    /// Replace the value of `name`.
    ///
    /// # Errors
    ///
    /// Returns [`OptionError::UnknownOption`] if `name` was never declared, or
    /// [`OptionError::InvalidOptionValue`] if `value` is outside its domain.
    pub fn set(&mut self, name: &str, value: impl Into<OptionValue>) -> Result<(), OptionError> {
        let value = value.into();
        let entry = self
            .entries
            .get_mut(name)
            .ok_or_else(|| OptionError::UnknownOption {
                name: name.to_string(),
            })?;

        if !entry.domain.contains(&value) {
            return Err(invalid(name, &entry.domain, value));
        }

        entry.value = value;
        Ok(())
    }

    /// `true` only when `name` is declared and currently `Bool(true)`.
    pub fn is_enabled(&self, name: &str) -> bool {
        matches!(self.get(name), Ok(OptionValue::Bool(true)))
    }

    /// Iterate `(name, value)` in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &OptionValue)> {
        self.entries.iter().map(|(k, e)| (k.as_str(), &e.value))
    }

    /// Snapshot of the current values, for manifests and display.
    pub fn values(&self) -> BTreeMap<String, OptionValue> {
        self.iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    /// Number of declared options.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the recipe declared no options at all.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn invalid(name: &str, domain: &[OptionValue], value: OptionValue) -> OptionError {
    OptionError::InvalidOptionValue {
        name: name.to_string(),
        value,
        allowed: domain
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", "),
    }
}
