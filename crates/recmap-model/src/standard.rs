//! Standard mapping registry.
//!
//! A standard mapping is a named column fragment that columns pull in with
//! `standard_mapping: <name>`. Fragments are merged into the referencing
//! column's raw YAML before it is parsed, so the merged result is validated
//! like any hand-written column.

use std::collections::BTreeMap;
use std::sync::OnceLock;

use serde_yaml::{Mapping, Value as YamlValue};

use crate::error::{ConfigError, Result};

static GLOBAL: OnceLock<StandardMappings> = OnceLock::new();
static EMPTY: StandardMappings = StandardMappings {
    fragments: BTreeMap::new(),
};

const STANDARD_MAPPING_KEY: &str = "standard_mapping";
const MAPPINGS_KEY: &str = "mappings";

/// Named column fragments.
#[derive(Debug, Clone, Default)]
pub struct StandardMappings {
    fragments: BTreeMap<String, Mapping>,
}

impl StandardMappings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads a YAML map of `name: { column fragment }`.
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let raw: BTreeMap<String, YamlValue> = serde_yaml::from_str(yaml)?;
        let mut registry = Self::new();
        for (name, fragment) in raw {
            let YamlValue::Mapping(fragment) = fragment else {
                return Err(ConfigError::InvalidColumn {
                    reason: format!("standard mapping '{name}' must be a mapping"),
                });
            };
            registry.insert(name, fragment);
        }
        Ok(registry)
    }

    pub fn insert(&mut self, name: impl Into<String>, fragment: Mapping) {
        self.fragments.insert(name.into(), fragment);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fragments.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.fragments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.fragments.keys().map(String::as_str)
    }

    /// Merges the referenced fragment (if any) under a raw column definition.
    ///
    /// Keys set on the column replace the fragment's, except `mappings`, which
    /// are appended after the fragment's own list.
    pub fn resolve(&self, column: Mapping) -> Result<Mapping> {
        let Some(reference) = column.get(STANDARD_MAPPING_KEY) else {
            return Ok(column);
        };
        let name = match reference {
            YamlValue::String(name) => name.clone(),
            YamlValue::Null => return Ok(column),
            other => format!("{other:?}"),
        };
        let fragment = self
            .fragments
            .get(&name)
            .ok_or_else(|| ConfigError::UnknownStandardMapping { name: name.clone() })?;

        let mut merged = fragment.clone();
        for (key, value) in column {
            if key.as_str() == Some(MAPPINGS_KEY)
                && let Some(YamlValue::Sequence(base)) = merged.get_mut(MAPPINGS_KEY)
            {
                match value {
                    YamlValue::Sequence(extra) => base.extend(extra),
                    YamlValue::Null => {}
                    other => base.push(other),
                }
                continue;
            }
            merged.insert(key, value);
        }
        Ok(merged)
    }
}

/// Installs the process-wide registry. May be called once.
pub fn configure(mappings: StandardMappings) -> Result<()> {
    GLOBAL
        .set(mappings)
        .map_err(|_| ConfigError::StandardMappingsAlreadyConfigured)?;
    tracing::debug!(count = global().len(), "standard mappings configured");
    Ok(())
}

/// The process-wide registry, empty until [`configure`] has been called.
pub fn global() -> &'static StandardMappings {
    GLOBAL.get().unwrap_or(&EMPTY)
}
