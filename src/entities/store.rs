use std::collections::{BTreeMap, HashMap};

use crate::entities::item::{Item, ItemCategory, ItemId};
use crate::entities::slots::SlotArray;
use crate::world::holder::HolderRef;
use crate::world::vault::VaultId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerRole {
    Plain,
    /// Visible window of a vault's delivery queue.
    Delivery(VaultId),
    /// Long-term storage of a vault.
    Storage(VaultId),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerState {
    pub slots: SlotArray,
    /// Total weight of everything inside, nested contents included.
    pub child_weight: u32,
    pub restrictions: BTreeMap<usize, Vec<ItemCategory>>,
    pub role: ContainerRole,
}

impl ContainerState {
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: SlotArray::new(capacity),
            child_weight: 0,
            restrictions: BTreeMap::new(),
            role: ContainerRole::Plain,
        }
    }

    pub fn slot_allows(&self, index: usize, category: ItemCategory) -> bool {
        match self.restrictions.get(&index) {
            Some(allowed) => allowed.contains(&category),
            None => true,
        }
    }
}

/// Arena of every live item. Holders keep ids, never references, so parent and
/// child never point at each other directly.
#[derive(Debug, Default, Clone)]
pub struct ItemStore {
    items: HashMap<ItemId, Item>,
    containers: HashMap<ItemId, ContainerState>,
}

impl ItemStore {
    pub fn insert(&mut self, item: Item) -> ItemId {
        let id = item.id;
        self.items.insert(id, item);
        id
    }

    pub fn insert_container(&mut self, item: Item, state: ContainerState) -> ItemId {
        let id = self.insert(item);
        self.containers.insert(id, state);
        id
    }

    pub fn get(&self, id: ItemId) -> Option<&Item> {
        self.items.get(&id)
    }

    pub fn get_mut(&mut self, id: ItemId) -> Option<&mut Item> {
        self.items.get_mut(&id)
    }

    pub fn contains(&self, id: ItemId) -> bool {
        self.items.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn container(&self, id: ItemId) -> Option<&ContainerState> {
        self.containers.get(&id)
    }

    pub fn container_mut(&mut self, id: ItemId) -> Option<&mut ContainerState> {
        self.containers.get_mut(&id)
    }

    pub fn is_container(&self, id: ItemId) -> bool {
        self.containers.contains_key(&id)
    }

    /// Drops a single arena entry. Contents of a removed container are left
    /// for the caller to handle.
    pub fn remove(&mut self, id: ItemId) -> Option<(Item, Option<ContainerState>)> {
        let item = self.items.remove(&id)?;
        let state = self.containers.remove(&id);
        Some((item, state))
    }

    pub fn owner(&self, id: ItemId) -> Option<HolderRef> {
        self.items.get(&id).and_then(|item| item.owner)
    }

    pub fn set_owner(&mut self, id: ItemId, owner: Option<HolderRef>) {
        if let Some(item) = self.items.get_mut(&id) {
            item.owner = owner;
        }
    }

    pub fn parent_container(&self, id: ItemId) -> Option<ItemId> {
        match self.owner(id)? {
            HolderRef::Container(parent) => Some(parent),
            _ => None,
        }
    }

    /// Containers enclosing `id`, innermost first. The walk is bounded by the
    /// arena size so a corrupted owner chain cannot spin forever.
    pub fn ancestors(&self, id: ItemId) -> Vec<ItemId> {
        let mut chain = Vec::new();
        let mut current = id;
        while let Some(parent) = self.parent_container(current) {
            if chain.len() > self.items.len() || parent == id {
                tracing::error!(item = id.0, "owner chain does not terminate");
                break;
            }
            chain.push(parent);
            current = parent;
        }
        chain
    }

    pub fn is_ancestor_or_self(&self, candidate: ItemId, id: ItemId) -> bool {
        candidate == id || self.ancestors(id).contains(&candidate)
    }

    /// Number of containers enclosing `container`.
    pub fn nesting_level(&self, container: ItemId) -> usize {
        self.ancestors(container).len()
    }

    /// Deepest chain of containers strictly inside `id`; 0 for a plain item or
    /// a container without container children.
    pub fn inner_depth(&self, id: ItemId) -> usize {
        let Some(state) = self.containers.get(&id) else {
            return 0;
        };
        state
            .slots
            .occupied()
            .filter(|(_, child)| self.containers.contains_key(child))
            .map(|(_, child)| 1 + self.inner_depth(child))
            .max()
            .unwrap_or(0)
    }

    /// Every item strictly inside `id`, depth first.
    pub fn descendants(&self, id: ItemId) -> Vec<ItemId> {
        let mut found = Vec::new();
        let mut pending = vec![id];
        while let Some(current) = pending.pop() {
            let Some(state) = self.containers.get(&current) else {
                continue;
            };
            for (_, child) in state.slots.occupied() {
                found.push(child);
                pending.push(child);
            }
        }
        found
    }

    /// The item plus everything inside it.
    pub fn tree_size(&self, id: ItemId) -> usize {
        1 + self.descendants(id).len()
    }

    pub fn ids(&self) -> impl Iterator<Item = ItemId> + '_ {
        self.items.keys().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::item::ItemTypeId;

    fn nest(store: &mut ItemStore, parent: ItemId, index: usize, child: ItemId) {
        store
            .container_mut(parent)
            .expect("parent container")
            .slots
            .put(index, Some(child));
        store.set_owner(child, Some(HolderRef::Container(parent)));
    }

    #[test]
    fn ancestors_and_depths_follow_owner_chain() {
        let mut store = ItemStore::default();
        let outer = store.insert_container(Item::new(ItemTypeId(1), 1), ContainerState::new(2));
        let middle = store.insert_container(Item::new(ItemTypeId(1), 1), ContainerState::new(2));
        let inner = store.insert_container(Item::new(ItemTypeId(1), 1), ContainerState::new(2));
        let coin = store.insert(Item::new(ItemTypeId(2), 10));
        nest(&mut store, outer, 0, middle);
        nest(&mut store, middle, 1, inner);
        nest(&mut store, inner, 0, coin);

        assert_eq!(store.ancestors(coin), vec![inner, middle, outer]);
        assert_eq!(store.nesting_level(inner), 2);
        assert_eq!(store.inner_depth(outer), 2);
        assert_eq!(store.inner_depth(inner), 0);
        assert!(store.is_ancestor_or_self(outer, inner));
        assert!(!store.is_ancestor_or_self(inner, outer));
        assert_eq!(store.tree_size(outer), 4);
    }

    #[test]
    fn restrictions_gate_single_slots() {
        let mut state = ContainerState::new(3);
        state
            .restrictions
            .insert(1, vec![ItemCategory::Tool, ItemCategory::Rune]);

        assert!(state.slot_allows(0, ItemCategory::Weapon));
        assert!(state.slot_allows(1, ItemCategory::Tool));
        assert!(!state.slot_allows(1, ItemCategory::Weapon));
    }
}
