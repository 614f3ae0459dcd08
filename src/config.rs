use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::entities::item::ItemTypeId;
use crate::error::LoadError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Most containers any container may sit inside.
    pub max_nesting_depth: usize,
    pub default_max_stack: u16,
    /// Visible slots of a vault's delivery container.
    pub delivery_window: usize,
    pub storage_capacity: usize,
    /// Item instances allowed under one vault's storage, nested ones included.
    pub storage_item_limit: usize,
    pub delivery_type_id: ItemTypeId,
    pub storage_type_id: ItemTypeId,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_nesting_depth: 2,
            default_max_stack: 100,
            delivery_window: 5,
            storage_capacity: 30,
            storage_item_limit: 2000,
            delivery_type_id: ItemTypeId(3501),
            storage_type_id: ItemTypeId(3502),
        }
    }
}

impl EngineConfig {
    pub fn from_yaml_str(content: &str) -> Result<Self, LoadError> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(content)?)
    }

    pub fn load(path: &Path) -> Result<Self, LoadError> {
        let content = std::fs::read_to_string(path).map_err(|source| LoadError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml_str(&content)
    }

    pub fn to_yaml(&self) -> Result<String, LoadError> {
        Ok(serde_yaml::to_string(self)?)
    }

    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(value) = parse_override(&lookup, "ITEMCORE_MAX_NESTING_DEPTH") {
            self.max_nesting_depth = value;
        }
        if let Some(value) = parse_override(&lookup, "ITEMCORE_DELIVERY_WINDOW") {
            self.delivery_window = value;
        }
        if let Some(value) = parse_override(&lookup, "ITEMCORE_STORAGE_CAPACITY") {
            self.storage_capacity = value;
        }
        if let Some(value) = parse_override(&lookup, "ITEMCORE_STORAGE_ITEM_LIMIT") {
            self.storage_item_limit = value;
        }
    }
}

fn parse_override(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<usize> {
    let value = lookup(key)?;
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }
    match trimmed.parse::<usize>() {
        Ok(parsed) => Some(parsed),
        Err(_) => {
            tracing::warn!(key, value = %value, "ignoring invalid configuration override");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn partial_yaml_keeps_defaults() {
        let config = EngineConfig::from_yaml_str("delivery_window: 8\n").expect("parse");
        assert_eq!(config.delivery_window, 8);
        assert_eq!(config.max_nesting_depth, 2);
        assert_eq!(config.default_max_stack, 100);
        assert_eq!(EngineConfig::from_yaml_str("").expect("empty"), EngineConfig::default());
    }

    #[test]
    fn overrides_ignore_invalid_values() {
        let env: HashMap<&str, &str> = [
            ("ITEMCORE_MAX_NESTING_DEPTH", " 4 "),
            ("ITEMCORE_DELIVERY_WINDOW", "lots"),
            ("ITEMCORE_STORAGE_CAPACITY", ""),
        ]
        .into_iter()
        .collect();
        let mut config = EngineConfig::default();
        config.apply_overrides(|key| env.get(key).map(|value| value.to_string()));

        assert_eq!(config.max_nesting_depth, 4);
        assert_eq!(config.delivery_window, 5);
        assert_eq!(config.storage_capacity, 30);
    }

    #[test]
    fn loads_from_file_and_round_trips() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("engine.yaml");
        let mut config = EngineConfig::default();
        config.storage_item_limit = 12;
        std::fs::write(&path, config.to_yaml().expect("encode")).expect("write");

        assert_eq!(EngineConfig::load(&path).expect("load"), config);
    }
}
