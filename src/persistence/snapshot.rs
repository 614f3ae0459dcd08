//! Plain-data form of item trees, equipment and vaults. The engine never
//! touches disk itself; callers move these structures through YAML.

use std::collections::BTreeMap;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::entities::actor::ActorId;
use crate::entities::equipment::{EquipmentRole, EQUIPMENT_ROLES};
use crate::entities::item::{ItemAttribute, ItemId, ItemTypeId};
use crate::error::LoadError;
use crate::world::holder::HolderRef;
use crate::world::state::WorldState;
use crate::world::vault::VaultId;

fn one() -> u16 {
    1
}

fn is_one(count: &u16) -> bool {
    *count == 1
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedItem {
    pub kind: ItemTypeId,
    #[serde(default = "one", skip_serializing_if = "is_one")]
    pub count: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unique_tag: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action_tag: Option<u16>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attributes: Vec<ItemAttribute>,
    /// Container slots in order, trailing empty slots dropped.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub items: Vec<Option<PersistedItem>>,
}

impl PersistedItem {
    pub fn new(kind: ItemTypeId, count: u16) -> Self {
        Self {
            kind,
            count,
            unique_tag: None,
            action_tag: None,
            attributes: Vec::new(),
            items: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedEquipment {
    #[serde(default)]
    pub slots: BTreeMap<EquipmentRole, PersistedItem>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedVault {
    #[serde(default)]
    pub storage: Vec<Option<PersistedItem>>,
    /// The whole delivery queue, head first.
    #[serde(default)]
    pub delivery: Vec<PersistedItem>,
}

pub fn to_yaml<T: Serialize>(value: &T) -> Result<String, LoadError> {
    Ok(serde_yaml::to_string(value)?)
}

pub fn from_yaml<T: DeserializeOwned>(content: &str) -> Result<T, LoadError> {
    Ok(serde_yaml::from_str(content)?)
}

impl WorldState {
    pub fn to_persisted_form(&self, item: ItemId) -> Option<PersistedItem> {
        let entry = self.store.get(item)?;
        let mut data = PersistedItem {
            kind: entry.type_id,
            count: entry.count,
            unique_tag: entry.unique_tag,
            action_tag: entry.action_tag,
            attributes: entry.attributes.clone(),
            items: Vec::new(),
        };
        if self.store.is_container(item) {
            data.items = self.persist_slots(item);
        }
        Some(data)
    }

    /// Slot contents of a container, trailing empty slots dropped.
    fn persist_slots(&self, container: ItemId) -> Vec<Option<PersistedItem>> {
        let Some(state) = self.store.container(container) else {
            return Vec::new();
        };
        let mut items: Vec<Option<PersistedItem>> = (0..state.slots.size())
            .map(|index| {
                state
                    .slots
                    .peek(index)
                    .and_then(|child| self.to_persisted_form(child))
            })
            .collect();
        while matches!(items.last(), Some(None)) {
            items.pop();
        }
        items
    }

    /// Rebuilds an in-flight item tree, weights included. Nothing is left
    /// behind when the data is rejected.
    pub fn from_persisted_form(&mut self, data: &PersistedItem) -> Result<ItemId, LoadError> {
        let id = self.rebuild(data)?;
        if self.store.inner_depth(id) > self.config.max_nesting_depth {
            self.destroy_tree(id);
            return Err(LoadError::Invalid(format!(
                "item {} nests deeper than {}",
                data.kind.0, self.config.max_nesting_depth
            )));
        }
        Ok(id)
    }

    fn rebuild(&mut self, data: &PersistedItem) -> Result<ItemId, LoadError> {
        if !self.item_types.contains(data.kind) {
            return Err(LoadError::UnknownItemType(data.kind.0));
        }
        let limit = self.stack_limit(data.kind);
        if data.count == 0 || data.count > limit {
            return Err(LoadError::Invalid(format!(
                "item {} persisted with count {} outside 1..={limit}",
                data.kind.0, data.count
            )));
        }
        let id = self.create_item(data.kind, data.count)?;
        if let Some(entry) = self.store.get_mut(id) {
            entry.unique_tag = data.unique_tag;
            entry.action_tag = data.action_tag;
            entry.attributes = data.attributes.clone();
        }
        if data.items.is_empty() {
            return Ok(id);
        }
        if let Err(err) = self.rebuild_contents(id, &data.items) {
            self.destroy_tree(id);
            return Err(err);
        }
        Ok(id)
    }

    fn rebuild_contents(&mut self, container: ItemId, items: &[Option<PersistedItem>]) -> Result<(), LoadError> {
        let size = self
            .store
            .container(container)
            .map(|state| state.slots.size())
            .ok_or_else(|| LoadError::Invalid(format!("item {} holds items but is no container", container.0)))?;
        if items.len() > size {
            return Err(LoadError::Invalid(format!(
                "{} slots persisted for a container of {}",
                items.len(),
                size
            )));
        }
        for (index, child) in items.iter().enumerate() {
            let Some(child) = child else {
                continue;
            };
            let child = self.rebuild(child)?;
            let weight = self.item_weight(child);
            if let Some(state) = self.store.container_mut(container) {
                state.slots.put(index, Some(child));
                state.child_weight = state.child_weight.saturating_add(weight);
            }
            self.store.set_owner(child, Some(HolderRef::Container(container)));
        }
        Ok(())
    }

    pub fn persist_equipment(&self, actor: ActorId) -> Option<PersistedEquipment> {
        let set = self.equipment.get(&actor)?;
        let slots = set
            .worn()
            .filter_map(|(role, item)| self.to_persisted_form(item).map(|data| (role, data)))
            .collect();
        Some(PersistedEquipment { slots })
    }

    /// Equips persisted items on an actor with empty equipment. Worn effects
    /// are reapplied through the update journal. A rejected slot undoes every
    /// slot placed before it.
    pub fn restore_equipment(&mut self, actor: ActorId, data: &PersistedEquipment) -> Result<(), LoadError> {
        if self.add_equipment(actor).worn().next().is_some() {
            return Err(LoadError::Invalid(format!("actor {} already wears items", actor.0)));
        }
        let mark = self.journal_mark();
        let mut placed = Vec::new();
        for role in EQUIPMENT_ROLES {
            let Some(saved) = data.slots.get(&role) else {
                continue;
            };
            let restored = self.from_persisted_form(saved).and_then(|item| {
                self.check_add(Some(actor), HolderRef::Equipment(actor), item, role.index())
                    .and_then(|_| self.equipment_insert(actor, role, item))
                    .map_err(|err| {
                        self.destroy_tree(item);
                        LoadError::Invalid(format!("{role:?} of actor {}: {err}", actor.0))
                    })
            });
            match restored {
                Ok(item) => placed.push(item),
                Err(err) => {
                    self.undo_restore(&placed, mark);
                    return Err(err);
                }
            }
        }
        Ok(())
    }

    fn undo_restore(&mut self, placed: &[ItemId], mark: usize) {
        for item in placed.iter().rev() {
            if let Err(err) = self.delete_item(*item) {
                tracing::error!(item = item.0, %err, "restored item could not be removed");
            }
        }
        self.discard_since(mark);
    }

    pub fn persist_vault(&self, vault: VaultId) -> Option<PersistedVault> {
        let entry = self.vaults.get(&vault)?;
        Some(PersistedVault {
            storage: self.persist_slots(entry.storage),
            delivery: entry
                .queue
                .iter()
                .filter_map(|item| self.to_persisted_form(item))
                .collect(),
        })
    }

    /// Fills an empty vault. A rejected entry undoes everything placed before
    /// it.
    pub fn restore_vault(&mut self, vault: VaultId, data: &PersistedVault) -> Result<(), LoadError> {
        let entry = self
            .vaults
            .get(&vault)
            .ok_or_else(|| LoadError::Invalid(format!("vault {} does not exist", vault.0)))?;
        let storage = entry.storage;
        let storage_empty = self
            .store
            .container(storage)
            .map_or(true, |state| state.slots.is_empty());
        if !entry.queue.is_empty() || !storage_empty {
            return Err(LoadError::Invalid(format!("vault {} is not empty", vault.0)));
        }

        let mark = self.journal_mark();
        let mut placed = Vec::new();
        for (index, saved) in data.storage.iter().enumerate() {
            let Some(saved) = saved else {
                continue;
            };
            let restored = self.from_persisted_form(saved).and_then(|item| {
                self.add_item(HolderRef::Container(storage), index, item)
                    .map_err(|err| {
                        self.destroy_tree(item);
                        LoadError::Invalid(format!("storage slot {index} of vault {}: {err}", vault.0))
                    })
            });
            match restored {
                Ok(item) => placed.push(item),
                Err(err) => {
                    self.undo_restore(&placed, mark);
                    return Err(err);
                }
            }
        }
        for saved in &data.delivery {
            let restored = self.from_persisted_form(saved).and_then(|item| {
                self.add_to_delivery(vault, item)
                    .map(|()| item)
                    .map_err(|err| {
                        self.destroy_tree(item);
                        LoadError::Invalid(format!("delivery of vault {}: {err}", vault.0))
                    })
            });
            match restored {
                Ok(item) => placed.push(item),
                Err(err) => {
                    self.undo_restore(&placed, mark);
                    return Err(err);
                }
            }
        }
        Ok(())
    }
}
