use std::collections::HashMap;

use crate::config::EngineConfig;
use crate::entities::actor::{ActorHooks, ActorId};
use crate::entities::equipment::{apply_weight_delta, EquipmentRole, EquipmentSet};
use crate::entities::item::{Item, ItemCategory, ItemId, ItemTypeId, ItemView};
use crate::entities::store::{ContainerState, ItemStore};
use crate::error::{LoadError, MoveError};
use crate::world::holder::HolderRef;
use crate::world::item_types::{ItemType, ItemTypeIndex};
use crate::world::oracle::Context;
use crate::world::position::Position;
use crate::world::tile::Tile;
use crate::world::vault::{Vault, VaultId};

/// Change recorded during an operation and published only once it commits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorldUpdate {
    ContainerSlot {
        container: ItemId,
        index: usize,
        item: Option<ItemView>,
    },
    TileItem {
        position: Position,
        index: usize,
        item: Option<ItemView>,
    },
    EquipmentSlot {
        actor: ActorId,
        role: EquipmentRole,
        item: Option<ItemView>,
    },
    ContainerClosed {
        container: ItemId,
        watchers: Vec<ActorId>,
    },
    StatusEffect {
        actor: ActorId,
        tag: String,
        active: bool,
    },
    Message {
        actor: ActorId,
        text: String,
    },
}

/// Every holder and item the engine owns. This is the explicit context the
/// orchestrator and adapters work against; there is no global state.
#[derive(Debug)]
pub struct WorldState {
    pub(crate) config: EngineConfig,
    pub(crate) item_types: ItemTypeIndex,
    pub(crate) store: ItemStore,
    pub(crate) tiles: HashMap<Position, Tile>,
    pub(crate) equipment: HashMap<ActorId, EquipmentSet>,
    pub(crate) vaults: HashMap<VaultId, Vault>,
    pub(crate) next_vault_id: u32,
    pending_updates: Vec<WorldUpdate>,
}

impl WorldState {
    pub fn new(config: EngineConfig, mut item_types: ItemTypeIndex) -> Self {
        for (type_id, name, capacity) in [
            (config.delivery_type_id, "inbox", config.delivery_window),
            (config.storage_type_id, "depot chest", config.storage_capacity),
        ] {
            if item_types.contains(type_id) {
                continue;
            }
            let mut fallback = ItemType::new(type_id, name, ItemCategory::Container);
            fallback.movable = false;
            fallback.container_capacity = Some(u16::try_from(capacity).unwrap_or(u16::MAX));
            if let Err(err) = item_types.insert(fallback) {
                tracing::warn!(%err, "vault container definition not registered");
            }
        }
        Self {
            config,
            item_types,
            store: ItemStore::default(),
            tiles: HashMap::new(),
            equipment: HashMap::new(),
            vaults: HashMap::new(),
            next_vault_id: 1,
            pending_updates: Vec::new(),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn item_types(&self) -> &ItemTypeIndex {
        &self.item_types
    }

    pub fn store(&self) -> &ItemStore {
        &self.store
    }

    pub fn item(&self, id: ItemId) -> Option<&Item> {
        self.store.get(id)
    }

    pub fn item_view(&self, id: ItemId) -> Option<ItemView> {
        self.store.get(id).map(Item::view)
    }

    pub fn item_type(&self, type_id: ItemTypeId) -> Option<&ItemType> {
        self.item_types.get(type_id)
    }

    pub fn type_of(&self, id: ItemId) -> Option<&ItemType> {
        let item = self.store.get(id)?;
        self.item_types.get(item.type_id)
    }

    pub(crate) fn stack_limit(&self, type_id: ItemTypeId) -> u16 {
        self.item_types
            .get(type_id)
            .map(|item_type| item_type.stack_limit(self.config.default_max_stack))
            .unwrap_or(1)
    }

    pub(crate) fn is_stackable(&self, type_id: ItemTypeId) -> bool {
        self.item_types
            .get(type_id)
            .map(|item_type| item_type.stackable)
            .unwrap_or(false)
    }

    /// `incoming` can merge into `existing` as one stack.
    pub(crate) fn can_merge(&self, existing: ItemId, incoming: ItemId) -> bool {
        if existing == incoming {
            return false;
        }
        match (self.store.get(existing), self.store.get(incoming)) {
            (Some(left), Some(right)) => self.is_stackable(left.type_id) && left.stacks_with(right),
            _ => false,
        }
    }

    pub(crate) fn unit_weight(&self, type_id: ItemTypeId) -> u32 {
        self.item_types
            .get(type_id)
            .map(|item_type| item_type.weight)
            .unwrap_or(0)
    }

    /// Weight of `count` units of an item, contents excluded.
    pub(crate) fn units_weight(&self, type_id: ItemTypeId, count: u16) -> u32 {
        self.unit_weight(type_id).saturating_mul(u32::from(count))
    }

    /// Full weight of an item including everything nested inside it.
    pub fn item_weight(&self, id: ItemId) -> u32 {
        let Some(item) = self.store.get(id) else {
            return 0;
        };
        let own = self.units_weight(item.type_id, item.count);
        let contents = self
            .store
            .container(id)
            .map(|state| state.child_weight)
            .unwrap_or(0);
        own.saturating_add(contents)
    }

    /// Creates an in-flight item from its definition.
    pub fn create_item(&mut self, type_id: ItemTypeId, count: u16) -> Result<ItemId, LoadError> {
        let item_type = self
            .item_types
            .get(type_id)
            .ok_or(LoadError::UnknownItemType(type_id.0))?;
        let count = count.clamp(1, item_type.stack_limit(self.config.default_max_stack));
        let item = Item::new(type_id, count);
        let id = match item_type.container_capacity {
            Some(capacity) => {
                let mut state = ContainerState::new(usize::from(capacity));
                state.restrictions = item_type.restricted_slots.clone();
                self.store.insert_container(item, state)
            }
            None => self.store.insert(item),
        };
        Ok(id)
    }

    /// Arena copy of `template` with another count; never used for containers.
    pub(crate) fn spawn_like(&mut self, template: ItemId, count: u16) -> Option<ItemId> {
        let copy = self.store.get(template)?.split_off(count);
        Some(self.store.insert(copy))
    }

    pub fn add_equipment(&mut self, actor: ActorId) -> &EquipmentSet {
        self.equipment
            .entry(actor)
            .or_insert_with(|| EquipmentSet::new(actor))
    }

    pub fn equipment(&self, actor: ActorId) -> Option<&EquipmentSet> {
        self.equipment.get(&actor)
    }

    pub fn carried_weight(&self, actor: ActorId) -> u32 {
        self.equipment
            .get(&actor)
            .map(EquipmentSet::carried_weight)
            .unwrap_or(0)
    }

    pub fn remaining_capacity(&self, actors: &dyn ActorHooks, actor: ActorId) -> u32 {
        actors.capacity(actor).saturating_sub(self.carried_weight(actor))
    }

    /// Root of the ownership chain: a tile, an equipment set or a vault. An
    /// in-flight container is its own top parent.
    pub fn top_parent(&self, holder: HolderRef) -> HolderRef {
        let HolderRef::Container(container) = holder else {
            return holder;
        };
        let outermost = self
            .store
            .ancestors(container)
            .last()
            .copied()
            .unwrap_or(container);
        self.store
            .owner(outermost)
            .unwrap_or(HolderRef::Container(outermost))
    }

    pub(crate) fn top_parent_of_item(&self, item: ItemId) -> Option<HolderRef> {
        self.store.owner(item).map(|holder| self.top_parent(holder))
    }

    /// Adds `delta` to every cached weight from `holder` up to its top parent.
    pub(crate) fn propagate_weight(&mut self, holder: HolderRef, delta: i64) {
        if delta == 0 {
            return;
        }
        let mut current = Some(holder);
        let mut steps = 0usize;
        while let Some(holder) = current {
            steps += 1;
            if steps > self.store.len() + 2 {
                tracing::error!(?holder, delta, "weight walk did not reach a top parent");
                return;
            }
            current = match holder {
                HolderRef::Container(container) => {
                    if let Some(state) = self.store.container_mut(container) {
                        state.child_weight = apply_weight_delta(state.child_weight, delta);
                    }
                    self.store.owner(container)
                }
                HolderRef::Equipment(actor) => {
                    if let Some(set) = self.equipment.get_mut(&actor) {
                        set.adjust_weight(delta);
                    }
                    None
                }
                HolderRef::Tile(_) | HolderRef::Vault(_) => None,
            };
        }
    }

    pub(crate) fn record(&mut self, update: WorldUpdate) {
        self.pending_updates.push(update);
    }

    pub(crate) fn journal_mark(&self) -> usize {
        self.pending_updates.len()
    }

    pub(crate) fn discard_since(&mut self, mark: usize) {
        self.pending_updates.truncate(mark);
    }

    pub fn pending_updates(&self) -> &[WorldUpdate] {
        &self.pending_updates
    }

    pub fn take_pending_updates(&mut self) -> Vec<WorldUpdate> {
        std::mem::take(&mut self.pending_updates)
    }

    /// Publishes recorded changes to the sink and actor hooks.
    pub fn flush(&mut self, ctx: &mut Context<'_>) {
        for update in self.take_pending_updates() {
            match update {
                WorldUpdate::ContainerSlot {
                    container,
                    index,
                    item,
                } => {
                    for watcher in self.watchers(container) {
                        ctx.sink.on_container_changed(watcher, container, index, item);
                    }
                }
                WorldUpdate::TileItem {
                    position,
                    index,
                    item,
                } => ctx.sink.on_tile_item_changed(position, index, item),
                WorldUpdate::EquipmentSlot { actor, role, item } => {
                    ctx.sink.on_equipment_changed(actor, role, item)
                }
                WorldUpdate::ContainerClosed {
                    container,
                    watchers,
                } => {
                    for watcher in watchers {
                        ctx.sink.on_container_closed(watcher, container);
                    }
                }
                WorldUpdate::StatusEffect { actor, tag, active } => {
                    if active {
                        ctx.actors.apply_status_effect(actor, &tag);
                    } else {
                        ctx.actors.remove_status_effect(actor, &tag);
                    }
                }
                WorldUpdate::Message { actor, text } => ctx.actors.send_message(actor, &text),
            }
        }
    }

    pub fn open_container(&mut self, container: ItemId, watcher: ActorId) -> Result<(), MoveError> {
        let state = self
            .store
            .container_mut(container)
            .ok_or(MoveError::UnknownHolder(HolderRef::Container(container)))?;
        state.slots.add_observer(watcher);
        Ok(())
    }

    pub fn close_container(&mut self, container: ItemId, watcher: ActorId) -> bool {
        self.store
            .container_mut(container)
            .map(|state| state.slots.remove_observer(watcher))
            .unwrap_or(false)
    }

    pub fn watchers(&self, container: ItemId) -> Vec<ActorId> {
        self.store
            .container(container)
            .map(|state| state.slots.observers().collect())
            .unwrap_or_default()
    }

    /// Closes `item` and every container nested in it for all watchers.
    pub(crate) fn close_container_tree(&mut self, item: ItemId) {
        let mut tree = vec![item];
        tree.extend(self.store.descendants(item));
        for container in tree {
            let Some(state) = self.store.container_mut(container) else {
                continue;
            };
            let watchers = state.slots.take_observers();
            if !watchers.is_empty() {
                self.record(WorldUpdate::ContainerClosed {
                    container,
                    watchers,
                });
            }
        }
    }

    /// Removes an item from wherever it is and destroys it with its contents.
    pub fn delete_item(&mut self, id: ItemId) -> Result<(), MoveError> {
        self.detach(id)?;
        self.destroy_tree(id);
        Ok(())
    }

    /// Takes an item out of its holder entirely, leaving it in flight.
    pub(crate) fn detach(&mut self, id: ItemId) -> Result<(), MoveError> {
        let item = self.store.get(id).ok_or(MoveError::ItemNotFound)?;
        let count = item.count;
        let Some(owner) = item.owner else {
            return Ok(());
        };
        if let Some(endpoint) = self.locate(id) {
            if let HolderRef::Vault(_) = endpoint.holder {
                return Err(MoveError::NotMovable);
            }
            self.remove_at(endpoint.holder, endpoint.index, count)?;
            return Ok(());
        }
        if let HolderRef::Vault(vault) = owner {
            self.unqueue_delivery(vault, id);
            self.store.set_owner(id, None);
            return Ok(());
        }
        tracing::error!(item = id.0, ?owner, "item owner does not list it");
        self.store.set_owner(id, None);
        Ok(())
    }

    pub(crate) fn destroy_tree(&mut self, id: ItemId) {
        self.close_container_tree(id);
        let mut doomed = self.store.descendants(id);
        doomed.push(id);
        for item in doomed {
            self.store.remove(item);
        }
    }

    /// Time-driven decay: turns the item into its expire target in place, or
    /// deletes it when the kind has none. A container decaying into a plain
    /// kind loses its contents with it.
    pub fn decay_item(&mut self, id: ItemId) -> Result<Option<ItemId>, MoveError> {
        let item = self.store.get(id).ok_or(MoveError::ItemNotFound)?;
        let old_type = item.type_id;
        let Some(target) = self
            .item_types
            .get(old_type)
            .and_then(|item_type| item_type.expire_target)
        else {
            self.delete_item(id)?;
            return Ok(None);
        };
        let Some(target_type) = self.item_types.get(target) else {
            tracing::warn!(item = id.0, target = target.0, "decay target undefined, deleting");
            self.delete_item(id)?;
            return Ok(None);
        };
        let target_is_container = target_type.is_container();
        let target_capacity = target_type.container_capacity;
        let target_restrictions = target_type.restricted_slots.clone();
        let old_weight = self.item_weight(id);

        let location = self.locate(id);
        let owner = self.store.owner(id);
        if self.store.is_container(id) && !target_is_container {
            self.close_container_tree(id);
            for child in self.store.descendants(id) {
                self.store.remove(child);
            }
            if let Some((item, _)) = self.store.remove(id) {
                self.store.insert(item);
            }
        } else if !self.store.is_container(id) && target_is_container {
            if let Some((item, _)) = self.store.remove(id) {
                let mut state = ContainerState::new(usize::from(target_capacity.unwrap_or(0)));
                state.restrictions = target_restrictions;
                self.store.insert_container(item, state);
            }
        }
        let target_limit = if target_is_container {
            1
        } else {
            self.stack_limit(target)
        };
        if let Some(item) = self.store.get_mut(id) {
            item.type_id = target;
            item.count = item.count.clamp(1, target_limit);
        }
        let new_weight = self.item_weight(id);
        if let Some(owner) = owner {
            self.propagate_weight(owner, i64::from(new_weight) - i64::from(old_weight));
        }
        if let Some(endpoint) = location {
            self.record_slot_change(endpoint.holder, endpoint.index, Some(id));
            if let (HolderRef::Equipment(actor), Some(role)) =
                (endpoint.holder, EquipmentRole::from_index(endpoint.index))
            {
                self.toggle_worn_effect(actor, role, old_type, false);
                self.toggle_worn_effect(actor, role, target, true);
            }
        }
        Ok(Some(id))
    }

    /// Records the current content of one slot for the sink.
    pub(crate) fn record_slot_change(&mut self, holder: HolderRef, index: usize, item: Option<ItemId>) {
        let view = item.and_then(|id| self.item_view(id));
        let update = match holder {
            HolderRef::Container(container) => WorldUpdate::ContainerSlot {
                container,
                index,
                item: view,
            },
            HolderRef::Tile(position) => WorldUpdate::TileItem {
                position,
                index,
                item: view,
            },
            HolderRef::Equipment(actor) => match EquipmentRole::from_index(index) {
                Some(role) => WorldUpdate::EquipmentSlot {
                    actor,
                    role,
                    item: view,
                },
                None => return,
            },
            HolderRef::Vault(_) => return,
        };
        self.record(update);
    }
}
