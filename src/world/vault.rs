//! Vault: a two-slot root holding a delivery window over an unbounded queue,
//! and a storage container. The root itself never takes items directly.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::entities::actor::ActorId;
use crate::entities::equipment::EquipmentRole;
use crate::entities::item::{Item, ItemId, ItemTypeId};
use crate::entities::store::{ContainerRole, ContainerState};
use crate::error::MoveError;
use crate::world::holder::{HolderRef, TOP};
use crate::world::oracle::Context;
use crate::world::state::{WorldState, WorldUpdate};

pub const DELIVERY_SLOT: usize = 0;
pub const STORAGE_SLOT: usize = 1;

const MAIL_NOTICE: &str = "New mail has arrived.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VaultId(pub u32);

/// FIFO of delivered items. The delivery container shows its head.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeliveryQueue {
    items: VecDeque<ItemId>,
}

impl DeliveryQueue {
    pub fn enqueue(&mut self, item: ItemId) {
        self.items.push_back(item);
    }

    /// Removes `item` wherever it sits and returns its former position.
    pub fn remove(&mut self, item: ItemId) -> Option<usize> {
        let position = self.position(item)?;
        self.items.remove(position);
        Some(position)
    }

    pub fn insert(&mut self, position: usize, item: ItemId) {
        let position = position.min(self.items.len());
        self.items.insert(position, item);
    }

    pub fn position(&self, item: ItemId) -> Option<usize> {
        self.items.iter().position(|entry| *entry == item)
    }

    pub fn get(&self, position: usize) -> Option<ItemId> {
        self.items.get(position).copied()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = ItemId> + '_ {
        self.items.iter().copied()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Vault {
    pub id: VaultId,
    pub owner: ActorId,
    pub owner_name: String,
    pub delivery: ItemId,
    pub storage: ItemId,
    pub(crate) queue: DeliveryQueue,
}

impl Vault {
    pub fn queue(&self) -> &DeliveryQueue {
        &self.queue
    }
}

/// Where `take_delivery` put the item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryTake {
    ToActor(HolderRef),
    ToStorage,
}

impl WorldState {
    pub fn create_vault(&mut self, owner: ActorId, owner_name: &str) -> VaultId {
        let id = VaultId(self.next_vault_id);
        self.next_vault_id += 1;

        let delivery = self.vault_container(
            self.config.delivery_type_id,
            self.config.delivery_window,
            ContainerRole::Delivery(id),
        );
        let storage = self.vault_container(
            self.config.storage_type_id,
            self.config.storage_capacity,
            ContainerRole::Storage(id),
        );
        self.store.set_owner(delivery, Some(HolderRef::Vault(id)));
        self.store.set_owner(storage, Some(HolderRef::Vault(id)));
        self.vaults.insert(
            id,
            Vault {
                id,
                owner,
                owner_name: owner_name.to_string(),
                delivery,
                storage,
                queue: DeliveryQueue::default(),
            },
        );
        tracing::info!(vault = id.0, owner = owner.0, owner_name, "vault created");
        id
    }

    fn vault_container(
        &mut self,
        type_id: ItemTypeId,
        capacity: usize,
        role: ContainerRole,
    ) -> ItemId {
        let mut state = ContainerState::new(capacity);
        state.role = role;
        self.store.insert_container(Item::new(type_id, 1), state)
    }

    pub fn vault(&self, vault: VaultId) -> Option<&Vault> {
        self.vaults.get(&vault)
    }

    pub fn vault_of(&self, owner: ActorId) -> Option<VaultId> {
        self.vaults
            .values()
            .filter(|vault| vault.owner == owner)
            .map(|vault| vault.id)
            .min()
    }

    pub(crate) fn vault_root_peek(&self, vault: VaultId, index: usize) -> Option<ItemId> {
        let vault = self.vaults.get(&vault)?;
        match index {
            DELIVERY_SLOT => Some(vault.delivery),
            STORAGE_SLOT => Some(vault.storage),
            _ => None,
        }
    }

    pub(crate) fn vault_root_index(&self, vault: VaultId, item: ItemId) -> Option<usize> {
        let vault = self.vaults.get(&vault)?;
        if item == vault.delivery {
            Some(DELIVERY_SLOT)
        } else if item == vault.storage {
            Some(STORAGE_SLOT)
        } else {
            None
        }
    }

    pub(crate) fn is_vault_fixture(&self, item: ItemId) -> bool {
        matches!(
            self.store.container(item).map(|state| state.role),
            Some(ContainerRole::Delivery(_) | ContainerRole::Storage(_))
        )
    }

    pub(crate) fn is_delivery_container(&self, holder: HolderRef) -> bool {
        let HolderRef::Container(container) = holder else {
            return false;
        };
        matches!(
            self.store.container(container).map(|state| state.role),
            Some(ContainerRole::Delivery(_))
        )
    }

    /// Puts an in-flight item into the vault's storage, first compatible slot.
    pub fn add_to_storage(&mut self, vault: VaultId, item: ItemId) -> Result<ItemId, MoveError> {
        let storage = self
            .vaults
            .get(&vault)
            .ok_or(MoveError::UnknownHolder(HolderRef::Vault(vault)))?
            .storage;
        let count = self.store.get(item).ok_or(MoveError::ItemNotFound)?.count;
        let room = self.check_add(None, HolderRef::Container(storage), item, TOP)?;
        if room < count {
            return Err(MoveError::ContainerFull);
        }
        self.insert_at(HolderRef::Container(storage), TOP, item)
    }

    /// Appends an in-flight item to the delivery queue.
    pub fn add_to_delivery(&mut self, vault: VaultId, item: ItemId) -> Result<(), MoveError> {
        let holder = HolderRef::Vault(vault);
        let entry = self.vaults.get_mut(&vault).ok_or(MoveError::UnknownHolder(holder))?;
        if self.store.owner(item).is_some() {
            return Err(MoveError::NotPossible);
        }
        entry.queue.enqueue(item);
        self.store.set_owner(item, Some(holder));
        self.resync_delivery_window(vault);
        Ok(())
    }

    pub fn delivery_queue(&self, vault: VaultId) -> Option<&DeliveryQueue> {
        self.vaults.get(&vault).map(Vault::queue)
    }

    /// Re-renders the delivery window from the queue head, touching only the
    /// positions whose entry changed.
    pub(crate) fn resync_delivery_window(&mut self, vault: VaultId) {
        let Some(entry) = self.vaults.get(&vault) else {
            return;
        };
        let delivery = entry.delivery;
        let Some(window) = self.store.container(delivery).map(|state| state.slots.size()) else {
            tracing::error!(vault = vault.0, "delivery container missing");
            return;
        };
        let desired: Vec<Option<ItemId>> = (0..window).map(|index| entry.queue.get(index)).collect();
        let hidden: Vec<ItemId> = entry.queue.iter().skip(window).collect();

        let window_holder = HolderRef::Container(delivery);
        for (index, wanted) in desired.iter().copied().enumerate() {
            let current = self
                .store
                .container(delivery)
                .and_then(|state| state.slots.peek(index));
            if current == wanted {
                continue;
            }
            if let Some(state) = self.store.container_mut(delivery) {
                state.slots.put(index, wanted);
            }
            if let Some(item) = wanted {
                self.store.set_owner(item, Some(window_holder));
            }
            self.record_slot_change(window_holder, index, wanted);
        }
        for item in hidden {
            self.store.set_owner(item, Some(HolderRef::Vault(vault)));
        }
        let visible_weight = desired
            .iter()
            .flatten()
            .map(|item| self.item_weight(*item))
            .fold(0u32, u32::saturating_add);
        if let Some(state) = self.store.container_mut(delivery) {
            state.child_weight = visible_weight;
        }
    }

    /// Drops `item` from the queue after it left the window or the queue tail.
    pub(crate) fn unqueue_delivery(&mut self, vault: VaultId, item: ItemId) {
        if let Some(entry) = self.vaults.get_mut(&vault) {
            entry.queue.remove(item);
        }
        self.resync_delivery_window(vault);
    }

    pub(crate) fn return_to_delivery(
        &mut self,
        vault: VaultId,
        position: usize,
        item: ItemId,
    ) -> Result<(), MoveError> {
        let holder = HolderRef::Vault(vault);
        let entry = self.vaults.get_mut(&vault).ok_or(MoveError::UnknownHolder(holder))?;
        entry.queue.insert(position, item);
        self.store.set_owner(item, Some(holder));
        self.resync_delivery_window(vault);
        Ok(())
    }

    /// Vault addressed by a mail item: the first text line names the owner.
    pub fn mail_recipient(&self, item: ItemId) -> Option<VaultId> {
        let item = self.store.get(item)?;
        let name = item.text().lines().next()?.trim();
        if name.is_empty() {
            return None;
        }
        self.vaults
            .values()
            .filter(|vault| vault.owner_name.eq_ignore_ascii_case(name))
            .map(|vault| vault.id)
            .min()
    }

    /// Stamps an in-flight mail item and queues it for the recipient.
    pub(crate) fn deliver_mail(&mut self, item: ItemId, vault: VaultId) -> Result<(), MoveError> {
        let original = self.store.get(item).ok_or(MoveError::ItemNotFound)?.type_id;
        let stamped = self
            .item_types
            .get(original)
            .and_then(|item_type| item_type.stamped_type);
        if let Some(stamped) = stamped {
            if let Some(entry) = self.store.get_mut(item) {
                entry.type_id = stamped;
            }
        }
        if let Err(err) = self.add_to_delivery(vault, item) {
            if let Some(entry) = self.store.get_mut(item) {
                entry.type_id = original;
            }
            return Err(err);
        }
        let recipient = self
            .vaults
            .get(&vault)
            .map(|entry| entry.owner)
            .ok_or(MoveError::UnknownHolder(HolderRef::Vault(vault)))?;
        self.record(WorldUpdate::Message {
            actor: recipient,
            text: MAIL_NOTICE.to_string(),
        });
        tracing::info!(item = item.0, vault = vault.0, recipient = recipient.0, "mail delivered");
        Ok(())
    }

    /// Takes the item at a visible window position and hands it to the actor:
    /// their pack first, then the role the item is worn in, then storage.
    pub fn take_delivery(
        &mut self,
        ctx: &mut Context<'_>,
        actor: ActorId,
        vault: VaultId,
        slot: usize,
    ) -> Result<DeliveryTake, MoveError> {
        let mark = self.journal_mark();
        match self.take_delivery_inner(ctx, actor, vault, slot) {
            Ok(taken) => {
                self.flush(ctx);
                Ok(taken)
            }
            Err(err) => {
                self.discard_since(mark);
                tracing::debug!(actor = actor.0, vault = vault.0, slot, %err, "delivery take rejected");
                ctx.actors.notify_cancel(actor, &err.to_string());
                Err(err)
            }
        }
    }

    fn take_delivery_inner(
        &mut self,
        ctx: &mut Context<'_>,
        actor: ActorId,
        vault: VaultId,
        slot: usize,
    ) -> Result<DeliveryTake, MoveError> {
        let entry = self
            .vaults
            .get(&vault)
            .ok_or(MoveError::UnknownHolder(HolderRef::Vault(vault)))?;
        if entry.owner != actor || !ctx.world.can_access_vault(actor, vault) {
            return Err(MoveError::NotPossible);
        }
        let delivery = entry.delivery;
        let item = self
            .peek(HolderRef::Container(delivery), slot)
            .ok_or(MoveError::ItemNotFound)?;
        let count = self.store.get(item).ok_or(MoveError::ItemNotFound)?.count;
        let weight = self.item_weight(item);
        let item = self.container_remove(delivery, slot, count)?;

        if weight <= self.remaining_capacity(&*ctx.actors, actor) {
            if let Some(target) = self.actor_target(actor, item, count) {
                if self.insert_at(target.0, target.1, item).is_ok() {
                    return Ok(DeliveryTake::ToActor(target.0));
                }
            }
        }
        match self.add_to_storage(vault, item) {
            Ok(_) => Ok(DeliveryTake::ToStorage),
            Err(err) => {
                self.restore_at(HolderRef::Container(delivery), slot, item);
                Err(err)
            }
        }
    }

    fn actor_target(&self, actor: ActorId, item: ItemId, count: u16) -> Option<(HolderRef, usize)> {
        let set = self.equipment.get(&actor)?;
        if let Some(pack) = set.slot(EquipmentRole::Pack) {
            let holder = HolderRef::Container(pack);
            if self.store.is_container(pack) && self.max_add_count(Some(actor), holder, item, TOP) >= count {
                return Some((holder, TOP));
            }
        }
        let role = self.type_of(item)?.body?;
        let holder = HolderRef::Equipment(actor);
        if self.max_add_count(Some(actor), holder, item, role.index()) >= count {
            return Some((holder, role.index()));
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::fixtures::{self, Harness, BACKPACK, DAGGER, HELMET, LETTER, POTION};

    const OWNER: ActorId = ActorId(7);

    fn queued(world: &WorldState, vault: VaultId) -> Vec<ItemId> {
        world.delivery_queue(vault).expect("vault").iter().collect()
    }

    fn window(world: &WorldState, vault: VaultId) -> Vec<Option<ItemId>> {
        let delivery = world.vault(vault).expect("vault").delivery;
        (0..5)
            .map(|index| world.peek(HolderRef::Container(delivery), index))
            .collect()
    }

    #[test]
    fn window_shows_queue_head_and_shifts_on_take() {
        let mut world = fixtures::world();
        world.add_equipment(OWNER);
        let vault = world.create_vault(OWNER, "Alice");
        let items: Vec<ItemId> = (0..7)
            .map(|_| fixtures::spawn(&mut world, DAGGER, 1))
            .collect();
        for item in &items {
            world.add_to_delivery(vault, *item).expect("enqueue");
        }

        let visible: Vec<Option<ItemId>> = items[..5].iter().copied().map(Some).collect();
        assert_eq!(window(&world, vault), visible);
        assert_eq!(world.store().owner(items[6]), Some(HolderRef::Vault(vault)));

        let mut harness = Harness::default();
        let taken = world
            .take_delivery(&mut harness.ctx(), OWNER, vault, 0)
            .expect("take");
        assert_eq!(taken, DeliveryTake::ToActor(HolderRef::Equipment(OWNER)));
        assert_eq!(queued(&world, vault), items[1..].to_vec());
        let shifted: Vec<Option<ItemId>> = items[1..6].iter().copied().map(Some).collect();
        assert_eq!(window(&world, vault), shifted);
        let delivery = world.vault(vault).expect("vault").delivery;
        assert_eq!(world.store().owner(items[5]), Some(HolderRef::Container(delivery)));
    }

    #[test]
    fn take_prefers_pack_and_falls_back_to_storage() {
        let mut world = fixtures::world();
        world.add_equipment(OWNER);
        let pack = fixtures::spawn(&mut world, BACKPACK, 1);
        world
            .add_item(HolderRef::Equipment(OWNER), EquipmentRole::Pack.index(), pack)
            .expect("pack");
        let vault = world.create_vault(OWNER, "Alice");
        let potions = fixtures::spawn(&mut world, POTION, 10);
        let helmet = fixtures::spawn(&mut world, HELMET, 1);
        world.add_to_delivery(vault, potions).expect("potions");
        world.add_to_delivery(vault, helmet).expect("helmet");

        let mut harness = Harness::default();
        let first = world
            .take_delivery(&mut harness.ctx(), OWNER, vault, 0)
            .expect("potions");
        assert_eq!(first, DeliveryTake::ToActor(HolderRef::Container(pack)));

        harness.actors.capacity.insert(OWNER, 0);
        let second = world
            .take_delivery(&mut harness.ctx(), OWNER, vault, 0)
            .expect("helmet");
        assert_eq!(second, DeliveryTake::ToStorage);
        let storage = world.vault(vault).expect("vault").storage;
        assert_eq!(world.peek(HolderRef::Container(storage), 0), Some(helmet));
        assert!(world.delivery_queue(vault).expect("vault").is_empty());
    }

    #[test]
    fn vault_root_never_accepts_items() {
        let mut world = fixtures::world();
        let vault = world.create_vault(OWNER, "Alice");
        let dagger = fixtures::spawn(&mut world, DAGGER, 1);
        for index in [DELIVERY_SLOT, STORAGE_SLOT, 2, TOP] {
            assert_eq!(world.max_add_count(Some(OWNER), HolderRef::Vault(vault), dagger, index), 0);
        }
        let delivery = world.vault(vault).expect("vault").delivery;
        assert_eq!(
            world.check_add(Some(OWNER), HolderRef::Container(delivery), dagger, 0),
            Err(MoveError::CannotAddHere)
        );
        world.add_to_storage(vault, dagger).expect("storage");
        assert_eq!(world.locate(delivery).map(|at| at.index), Some(DELIVERY_SLOT));
    }

    #[test]
    fn mail_recipient_matches_first_line_ignoring_case() {
        let mut world = fixtures::world();
        let vault = world.create_vault(OWNER, "Alice");
        let letter = fixtures::spawn(&mut world, fixtures::LETTER, 1);
        if let Some(item) = world.store.get_mut(letter) {
            item.set_text("  alice \nsee you soon");
        }
        assert_eq!(world.mail_recipient(letter), Some(vault));

        world.deliver_mail(letter, vault).expect("deliver");
        assert_eq!(
            world.item(letter).map(|item| item.type_id),
            Some(ItemTypeId(fixtures::STAMPED_LETTER))
        );
        assert!(world.pending_updates().contains(&WorldUpdate::Message {
            actor: OWNER,
            text: MAIL_NOTICE.to_string(),
        }));
    }

    #[test]
    fn undeliverable_mail_keeps_its_unstamped_kind() {
        let mut world = fixtures::world();
        let letter = fixtures::spawn(&mut world, LETTER, 1);
        assert_eq!(
            world.deliver_mail(letter, VaultId(99)),
            Err(MoveError::UnknownHolder(HolderRef::Vault(VaultId(99))))
        );
        assert_eq!(world.item(letter).map(|item| item.type_id), Some(ItemTypeId(LETTER)));
        assert!(world.item(letter).and_then(|item| item.owner()).is_none());
        assert!(world.pending_updates().is_empty());
    }

    #[test]
    fn storage_item_limit_is_enforced() {
        let mut world = fixtures::world_with(|config| config.storage_item_limit = 3);
        let vault = world.create_vault(OWNER, "Alice");
        let pack = fixtures::spawn(&mut world, BACKPACK, 1);
        let dagger = fixtures::spawn(&mut world, DAGGER, 1);
        world.add_item(HolderRef::Container(pack), 0, dagger).expect("dagger");
        world.add_to_storage(vault, pack).expect("pack");

        let extra = fixtures::spawn(&mut world, DAGGER, 1);
        world.add_item(HolderRef::Container(pack), 1, extra).expect("third");
        let overflow = fixtures::spawn(&mut world, DAGGER, 1);
        assert_eq!(world.add_to_storage(vault, overflow), Err(MoveError::StorageLimit));
    }

    #[test]
    fn full_storage_merges_without_spilling() {
        let mut world = fixtures::world_with(|config| config.storage_item_limit = 2);
        let vault = world.create_vault(OWNER, "Alice");
        let storage = world.vault(vault).expect("vault").storage;
        let potions = fixtures::spawn(&mut world, POTION, 90);
        world.add_item(HolderRef::Container(storage), 0, potions).expect("potions");
        let dagger = fixtures::spawn(&mut world, DAGGER, 1);
        world.add_item(HolderRef::Container(storage), 1, dagger).expect("dagger");

        let many = fixtures::spawn(&mut world, POTION, 20);
        assert_eq!(world.max_add_count(None, HolderRef::Container(storage), many, 0), 10);
        assert_eq!(
            world.add_item(HolderRef::Container(storage), 0, many),
            Err(MoveError::ContainerFull)
        );

        let few = fixtures::spawn(&mut world, POTION, 5);
        let merged = world
            .add_item(HolderRef::Container(storage), 0, few)
            .expect("fits the stack");
        assert_eq!(world.item(merged).map(|item| item.count), Some(95));
        assert_eq!(world.peek(HolderRef::Container(storage), 2), None);
        assert_eq!(world.store().tree_size(storage), 3);

        let top_up = fixtures::spawn(&mut world, POTION, 5);
        world
            .add_item(HolderRef::Container(storage), 0, top_up)
            .expect("fills the stack");
        assert_eq!(
            world.check_add(None, HolderRef::Container(storage), many, 0),
            Err(MoveError::StorageLimit)
        );
        let helmet = fixtures::spawn(&mut world, HELMET, 1);
        assert_eq!(
            world.add_item(HolderRef::Container(storage), 2, helmet),
            Err(MoveError::StorageLimit)
        );
    }
}
