use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use crate::entities::equipment::EquipmentRole;
use crate::entities::item::{ItemCategory, ItemTypeId};
use crate::error::LoadError;

/// Static definition of an item kind. The engine reads these, never writes them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemType {
    pub id: ItemTypeId,
    pub name: String,
    pub category: ItemCategory,
    #[serde(default)]
    pub stackable: bool,
    /// Stack limit; falls back to the engine default when absent.
    #[serde(default)]
    pub max_stack: Option<u16>,
    /// Weight of one unit.
    #[serde(default)]
    pub weight: u32,
    #[serde(default)]
    pub container_capacity: Option<u16>,
    #[serde(default)]
    pub restricted_slots: BTreeMap<usize, Vec<ItemCategory>>,
    #[serde(default = "default_movable")]
    pub movable: bool,
    #[serde(default)]
    pub body: Option<EquipmentRole>,
    #[serde(default)]
    pub two_handed: bool,
    #[serde(default)]
    pub worn_effect: Option<String>,
    #[serde(default)]
    pub blocking: bool,
    #[serde(default)]
    pub sealed: bool,
    #[serde(default)]
    pub collection_point: bool,
    #[serde(default)]
    pub mail: bool,
    #[serde(default)]
    pub stamped_type: Option<ItemTypeId>,
    #[serde(default)]
    pub expire_target: Option<ItemTypeId>,
}

fn default_movable() -> bool {
    true
}

impl ItemType {
    pub fn new(id: ItemTypeId, name: &str, category: ItemCategory) -> Self {
        Self {
            id,
            name: name.to_string(),
            category,
            stackable: false,
            max_stack: None,
            weight: 0,
            container_capacity: None,
            restricted_slots: BTreeMap::new(),
            movable: true,
            body: None,
            two_handed: false,
            worn_effect: None,
            blocking: false,
            sealed: false,
            collection_point: false,
            mail: false,
            stamped_type: None,
            expire_target: None,
        }
    }

    pub fn is_container(&self) -> bool {
        self.container_capacity.is_some()
    }

    /// Effective stack limit: 1 for non-stackable kinds.
    pub fn stack_limit(&self, default_max_stack: u16) -> u16 {
        if !self.stackable {
            return 1;
        }
        self.max_stack.unwrap_or(default_max_stack).max(1)
    }
}

#[derive(Debug, Default, Clone)]
pub struct ItemTypeIndex {
    types: HashMap<ItemTypeId, ItemType>,
}

#[derive(Debug, Deserialize)]
struct ItemTypeFile {
    #[serde(default)]
    items: Vec<ItemType>,
}

impl ItemTypeIndex {
    pub fn get(&self, id: ItemTypeId) -> Option<&ItemType> {
        self.types.get(&id)
    }

    pub fn contains(&self, id: ItemTypeId) -> bool {
        self.types.contains_key(&id)
    }

    pub fn insert(&mut self, item: ItemType) -> Result<(), LoadError> {
        if self.types.contains_key(&item.id) {
            return Err(LoadError::DuplicateItemType(item.id.0));
        }
        self.types.insert(item.id, item);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ItemType> {
        self.types.values()
    }

    pub fn from_yaml_str(content: &str) -> Result<Self, LoadError> {
        let file: ItemTypeFile = serde_yaml::from_str(content)?;
        let mut index = ItemTypeIndex::default();
        for item in file.items {
            index.insert(item)?;
        }
        Ok(index)
    }
}

pub fn load_item_types(path: &Path) -> Result<ItemTypeIndex, LoadError> {
    let content = std::fs::read_to_string(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    ItemTypeIndex::from_yaml_str(&content)
}

/// Consistency problems in a definition set that loading alone does not catch.
pub fn validate_item_types(index: &ItemTypeIndex) -> Vec<String> {
    let mut problems = Vec::new();
    let mut types: Vec<&ItemType> = index.iter().collect();
    types.sort_by_key(|item| item.id);
    for item in types {
        if item.two_handed && item.body.map_or(false, |body| !body.is_hand()) {
            problems.push(format!(
                "{} ({}): two-handed but worn in {:?}",
                item.name, item.id.0, item.body
            ));
        }
        if item.mail {
            match item.stamped_type {
                Some(stamped) if !index.contains(stamped) => problems.push(format!(
                    "{} ({}): stamped kind {} is not defined",
                    item.name, item.id.0, stamped.0
                )),
                _ => {}
            }
        }
        if let Some(target) = item.expire_target {
            if !index.contains(target) {
                problems.push(format!(
                    "{} ({}): decays into undefined kind {}",
                    item.name, item.id.0, target.0
                ));
            }
        }
        let capacity = item.container_capacity.map(usize::from).unwrap_or(0);
        for slot in item.restricted_slots.keys() {
            if *slot >= capacity {
                problems.push(format!(
                    "{} ({}): restricted slot {} outside capacity {}",
                    item.name, item.id.0, slot, capacity
                ));
            }
        }
        if item.stackable && item.is_container() {
            problems.push(format!(
                "{} ({}): containers cannot be stackable",
                item.name, item.id.0
            ));
        }
        if item.max_stack == Some(0) {
            problems.push(format!("{} ({}): max_stack is zero", item.name, item.id.0));
        }
    }
    problems
}
