use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU32, Ordering};

use crate::world::holder::HolderRef;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ItemId(pub u32);

static NEXT_ITEM_ID: AtomicU32 = AtomicU32::new(1);

impl ItemId {
    pub fn next() -> Self {
        let id = NEXT_ITEM_ID.fetch_add(1, Ordering::Relaxed);
        ItemId(id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemTypeId(pub u16);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemCategory {
    Ground,
    Container,
    Weapon,
    Armor,
    Consumable,
    Tool,
    Rune,
    Ammunition,
    Mail,
    Misc,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemAttribute {
    Text(String),
    Charges(u16),
    KeyNumber(u16),
    Responsible(u32),
    Unknown { key: String, value: String },
}

/// A carryable entity stored in the [`ItemStore`](crate::entities::store::ItemStore) arena.
///
/// `owner` is informational: the holder whose slots list this id is the real owner.
/// It is `None` only while the item is in flight between two holders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Item {
    pub id: ItemId,
    pub type_id: ItemTypeId,
    pub count: u16,
    pub unique_tag: Option<u16>,
    pub action_tag: Option<u16>,
    pub attributes: Vec<ItemAttribute>,
    pub(crate) owner: Option<HolderRef>,
}

impl Item {
    pub fn new(type_id: ItemTypeId, count: u16) -> Self {
        Self {
            id: ItemId::next(),
            type_id,
            count,
            unique_tag: None,
            action_tag: None,
            attributes: Vec::new(),
            owner: None,
        }
    }

    /// Fresh instance of the same kind and attributes with another count.
    pub fn split_off(&self, count: u16) -> Self {
        Self {
            id: ItemId::next(),
            type_id: self.type_id,
            count,
            unique_tag: self.unique_tag,
            action_tag: self.action_tag,
            attributes: self.attributes.clone(),
            owner: None,
        }
    }

    pub fn owner(&self) -> Option<HolderRef> {
        self.owner
    }

    /// Two stacks can merge only when kind and attributes match.
    pub fn stacks_with(&self, other: &Item) -> bool {
        self.type_id == other.type_id
            && self.attributes == other.attributes
            && self.unique_tag.is_none()
            && other.unique_tag.is_none()
    }

    pub fn set_text(&mut self, text: &str) {
        self.attributes
            .retain(|attr| !matches!(attr, ItemAttribute::Text(_)));
        if !text.is_empty() {
            self.attributes.push(ItemAttribute::Text(text.to_string()));
        }
    }

    pub fn text(&self) -> &str {
        for attr in &self.attributes {
            if let ItemAttribute::Text(text) = attr {
                return text.as_str();
            }
        }
        ""
    }

    pub fn view(&self) -> ItemView {
        ItemView {
            id: self.id,
            type_id: self.type_id,
            count: self.count,
        }
    }
}

/// Copyable summary handed to notification sinks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ItemView {
    pub id: ItemId,
    pub type_id: ItemTypeId,
    pub count: u16,
}
