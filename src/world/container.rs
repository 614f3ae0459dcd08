//! Container holder: slot gating, nesting limits and stack arithmetic.

use crate::entities::item::{ItemCategory, ItemId};
use crate::entities::store::{ContainerRole, ContainerState};
use crate::error::MoveError;
use crate::world::holder::{HolderRef, TOP};
use crate::world::state::WorldState;

impl WorldState {
    fn category_of(&self, item: ItemId) -> Option<ItemCategory> {
        self.type_of(item).map(|item_type| item_type.category)
    }

    /// First empty slot whose restriction admits `category`.
    fn first_open_slot(state: &ContainerState, category: ItemCategory) -> Option<usize> {
        (0..state.slots.size()).find(|&index| {
            state.slots.peek(index).is_none() && state.slot_allows(index, category)
        })
    }

    /// Resolves `TOP`: a stack of the same kind with room left, else the
    /// first empty slot that admits the item.
    pub(crate) fn find_slot(&self, container: ItemId, item: ItemId) -> Option<usize> {
        let state = self.store.container(container)?;
        let incoming = self.store.get(item)?;
        let category = self.category_of(item)?;
        let limit = self.stack_limit(incoming.type_id);
        let stack = state.slots.occupied().find(|&(index, existing)| {
            state.slot_allows(index, category)
                && self.can_merge(existing, item)
                && self
                    .store
                    .get(existing)
                    .map(|existing| existing.count < limit)
                    .unwrap_or(false)
        });
        match stack {
            Some((index, _)) => Some(index),
            None => Self::first_open_slot(state, category),
        }
    }

    /// Outermost storage container enclosing (or equal to) `container`.
    fn storage_root(&self, container: ItemId) -> Option<ItemId> {
        std::iter::once(container)
            .chain(self.store.ancestors(container))
            .find(|candidate| {
                matches!(
                    self.store.container(*candidate).map(|state| state.role),
                    Some(ContainerRole::Storage(_))
                )
            })
    }

    /// Whether `added` more instances fit under the storage root enclosing
    /// `container`. Items already stored there move for free.
    fn storage_has_room(&self, container: ItemId, item: ItemId, added: usize) -> bool {
        let Some(root) = self.storage_root(container) else {
            return true;
        };
        if self.store.is_ancestor_or_self(root, item) {
            return true;
        }
        let stored = self.store.tree_size(root) - 1;
        stored + added <= self.config.storage_item_limit
    }

    pub(crate) fn container_check_add(
        &self,
        container: ItemId,
        item: ItemId,
        index: usize,
    ) -> Result<u16, MoveError> {
        self.resolve_holder(HolderRef::Container(container))?;
        let state = self
            .store
            .container(container)
            .ok_or(MoveError::UnknownHolder(HolderRef::Container(container)))?;
        if let ContainerRole::Delivery(_) = state.role {
            return Err(MoveError::CannotAddHere);
        }
        let incoming = self.store.get(item).ok_or(MoveError::ItemNotFound)?;
        let category = self.category_of(item).ok_or(MoveError::CannotAddHere)?;

        let index = if index == TOP {
            self.find_slot(container, item)
                .ok_or(MoveError::ContainerFull)?
        } else {
            index
        };
        if index >= state.slots.size() || !state.slot_allows(index, category) {
            return Err(MoveError::CannotAddHere);
        }

        if self.store.is_container(item) {
            if self.store.is_ancestor_or_self(item, container) {
                return Err(MoveError::ContainerInsideItself);
            }
            let depth = self.store.nesting_level(container) + 1 + self.store.inner_depth(item);
            if depth > self.config.max_nesting_depth {
                return Err(MoveError::NestingTooDeep);
            }
        }

        let limit = self.stack_limit(incoming.type_id);
        match state.slots.peek(index) {
            None => {
                if !self.storage_has_room(container, item, self.store.tree_size(item)) {
                    return Err(MoveError::StorageLimit);
                }
                Ok(limit)
            }
            Some(existing) if self.can_merge(existing, item) => {
                // An overflow spill is one more stored instance.
                let open = Self::first_open_slot(state, category).is_some();
                if open && self.storage_has_room(container, item, 1) {
                    return Ok(limit);
                }
                let present = self.store.get(existing).map(|item| item.count).unwrap_or(limit);
                match limit.saturating_sub(present) {
                    0 if open => Err(MoveError::StorageLimit),
                    0 => Err(MoveError::ContainerFull),
                    headroom => Ok(headroom),
                }
            }
            Some(_) => Err(MoveError::SlotOccupied),
        }
    }

    pub(crate) fn container_insert(
        &mut self,
        container: ItemId,
        index: usize,
        item: ItemId,
    ) -> Result<ItemId, MoveError> {
        let holder = HolderRef::Container(container);
        self.resolve_holder(holder)?;
        let index = if index == TOP {
            self.find_slot(container, item)
                .ok_or(MoveError::ContainerFull)?
        } else {
            index
        };
        let state = self
            .store
            .container(container)
            .ok_or(MoveError::UnknownHolder(holder))?;
        if index >= state.slots.size() {
            return Err(MoveError::CannotAddHere);
        }
        let occupant = state.slots.peek(index);
        let weight = self.item_weight(item);

        let Some(existing) = occupant else {
            if let Some(state) = self.store.container_mut(container) {
                state.slots.put(index, Some(item));
            }
            self.store.set_owner(item, Some(holder));
            self.record_slot_change(holder, index, Some(item));
            self.propagate_weight(holder, i64::from(weight));
            return Ok(item);
        };
        if !self.can_merge(existing, item) {
            return Err(MoveError::SlotOccupied);
        }

        let (present, incoming, type_id) = match (self.store.get(existing), self.store.get(item)) {
            (Some(left), Some(right)) => (left.count, right.count, left.type_id),
            _ => return Err(MoveError::ItemNotFound),
        };
        let limit = self.stack_limit(type_id);
        let sum = u32::from(present) + u32::from(incoming);
        let kept = sum.min(u32::from(limit)) as u16;
        let overflow = (sum - u32::from(kept)) as u16;
        let category = self.category_of(item).ok_or(MoveError::CannotAddHere)?;
        let overflow_slot = if overflow > 0 {
            Some(Self::first_open_slot(state, category).ok_or(MoveError::ContainerFull)?)
        } else {
            None
        };

        // Both stacks are replaced by fresh instances.
        let merged = self.spawn_like(existing, kept).ok_or(MoveError::ItemNotFound)?;
        let spill = match overflow_slot {
            Some(slot) => Some((slot, self.spawn_like(existing, overflow).ok_or(MoveError::ItemNotFound)?)),
            None => None,
        };
        self.store.remove(existing);
        self.store.remove(item);
        if let Some(state) = self.store.container_mut(container) {
            state.slots.put(index, Some(merged));
            if let Some((slot, piece)) = spill {
                state.slots.put(slot, Some(piece));
            }
        }
        self.store.set_owner(merged, Some(holder));
        self.record_slot_change(holder, index, Some(merged));
        if let Some((slot, piece)) = spill {
            self.store.set_owner(piece, Some(holder));
            self.record_slot_change(holder, slot, Some(piece));
        }
        self.propagate_weight(holder, i64::from(weight));
        Ok(merged)
    }

    pub(crate) fn container_remove(
        &mut self,
        container: ItemId,
        index: usize,
        count: u16,
    ) -> Result<ItemId, MoveError> {
        let holder = HolderRef::Container(container);
        self.resolve_holder(holder)?;
        let state = self
            .store
            .container(container)
            .ok_or(MoveError::UnknownHolder(holder))?;
        let role = state.role;
        let existing = state.slots.peek(index).ok_or(MoveError::ItemNotFound)?;
        let (present, type_id) = self
            .store
            .get(existing)
            .map(|item| (item.count, item.type_id))
            .ok_or(MoveError::ItemNotFound)?;
        if count == 0 {
            return Err(MoveError::InvalidCount);
        }
        if count > present {
            return Err(MoveError::NotEnoughItems);
        }

        if count == present {
            let weight = self.item_weight(existing);
            if let Some(state) = self.store.container_mut(container) {
                state.slots.take(index);
            }
            self.store.set_owner(existing, None);
            self.record_slot_change(holder, index, None);
            self.propagate_weight(holder, -i64::from(weight));
            if let ContainerRole::Delivery(vault) = role {
                self.unqueue_delivery(vault, existing);
            }
            return Ok(existing);
        }

        if let ContainerRole::Delivery(_) = role {
            return Err(MoveError::InvalidCount);
        }
        let piece = self.spawn_like(existing, count).ok_or(MoveError::ItemNotFound)?;
        if let Some(item) = self.store.get_mut(existing) {
            item.count = present - count;
        }
        self.record_slot_change(holder, index, Some(existing));
        self.propagate_weight(holder, -i64::from(self.units_weight(type_id, count)));
        Ok(piece)
    }

    /// Puts back an item taken from `index`. A split piece merges back into
    /// the stack it came from.
    pub(crate) fn container_restore(
        &mut self,
        container: ItemId,
        index: usize,
        item: ItemId,
    ) -> Result<(), MoveError> {
        let holder = HolderRef::Container(container);
        let state = self
            .store
            .container(container)
            .ok_or(MoveError::UnknownHolder(holder))?;
        if let ContainerRole::Delivery(vault) = state.role {
            return self.return_to_delivery(vault, index, item);
        }
        match state.slots.peek(index) {
            Some(existing) if self.can_merge(existing, item) => {
                self.merge_back(holder, index, existing, item);
                Ok(())
            }
            Some(_) => self.container_insert(container, TOP, item).map(|_| ()),
            None => self.container_insert(container, index, item).map(|_| ()),
        }
    }

    /// Folds a split piece back into the stack it was taken from, keeping the
    /// original instance.
    pub(crate) fn merge_back(&mut self, holder: HolderRef, index: usize, existing: ItemId, piece: ItemId) {
        let Some((count, type_id)) = self.store.get(piece).map(|item| (item.count, item.type_id)) else {
            return;
        };
        if let Some(item) = self.store.get_mut(existing) {
            item.count = item.count.saturating_add(count);
        }
        self.store.remove(piece);
        self.record_slot_change(holder, index, Some(existing));
        self.propagate_weight(holder, i64::from(self.units_weight(type_id, count)));
    }
}

#[cfg(test)]
mod tests {
    use crate::entities::item::ItemTypeId;
    use crate::error::MoveError;
    use crate::world::fixtures::{self, BACKPACK, BAG, DAGGER, POTION, ROPE, TOOLBELT};
    use crate::world::holder::{HolderRef, TOP};

    #[test]
    fn potion_stacks_overflow_into_first_empty_slot() {
        let mut world = fixtures::world();
        let pack = fixtures::spawn(&mut world, BACKPACK, 1);
        let first = fixtures::spawn(&mut world, POTION, 80);
        let second = fixtures::spawn(&mut world, POTION, 30);
        world
            .add_item(HolderRef::Container(pack), 0, first)
            .expect("first stack");

        assert_eq!(world.max_add_count(None, HolderRef::Container(pack), second, 0), 100);
        let landed = world
            .add_item(HolderRef::Container(pack), 0, second)
            .expect("merge");

        assert_eq!(world.item(landed).map(|item| item.count), Some(100));
        let spill = world.peek(HolderRef::Container(pack), 1).expect("overflow slot");
        assert_eq!(world.item(spill).map(|item| item.count), Some(10));
        assert!(world.item(first).is_none());
        assert!(world.item(second).is_none());
        assert_eq!(world.item_weight(pack), 18 + 110 * 2);
    }

    #[test]
    fn full_container_only_offers_headroom() {
        let mut world = fixtures::world();
        let bag = fixtures::spawn(&mut world, BAG, 1);
        for index in 0..4 {
            let potion = fixtures::spawn(&mut world, POTION, 90);
            world
                .add_item(HolderRef::Container(bag), index, potion)
                .expect("fill");
        }
        let incoming = fixtures::spawn(&mut world, POTION, 30);
        assert_eq!(world.check_add(None, HolderRef::Container(bag), incoming, 2), Ok(10));

        let dagger = fixtures::spawn(&mut world, DAGGER, 1);
        assert_eq!(
            world.check_add(None, HolderRef::Container(bag), dagger, TOP),
            Err(MoveError::ContainerFull)
        );
        assert_eq!(
            world.check_add(None, HolderRef::Container(bag), dagger, 1),
            Err(MoveError::SlotOccupied)
        );
    }

    #[test]
    fn top_prefers_matching_stack_then_first_empty() {
        let mut world = fixtures::world();
        let pack = fixtures::spawn(&mut world, BACKPACK, 1);
        let dagger = fixtures::spawn(&mut world, DAGGER, 1);
        let potions = fixtures::spawn(&mut world, POTION, 5);
        world.add_item(HolderRef::Container(pack), 0, dagger).expect("dagger");
        world.add_item(HolderRef::Container(pack), 3, potions).expect("potions");

        let more = fixtures::spawn(&mut world, POTION, 5);
        assert_eq!(world.find_slot(pack, more), Some(3));
        let rope = fixtures::spawn(&mut world, ROPE, 1);
        assert_eq!(world.find_slot(pack, rope), Some(1));
    }

    #[test]
    fn restricted_slot_rejects_other_categories() {
        let mut world = fixtures::world();
        let belt = fixtures::spawn(&mut world, TOOLBELT, 1);
        let rope = fixtures::spawn(&mut world, ROPE, 1);
        let dagger = fixtures::spawn(&mut world, DAGGER, 1);

        assert_eq!(
            world.check_add(None, HolderRef::Container(belt), dagger, 0),
            Err(MoveError::CannotAddHere)
        );
        assert_eq!(world.check_add(None, HolderRef::Container(belt), rope, 0), Ok(1));
        assert_eq!(world.find_slot(belt, dagger), Some(1));
        assert_eq!(
            world.check_add(None, HolderRef::Container(belt), dagger, 9),
            Err(MoveError::CannotAddHere)
        );
    }

    #[test]
    fn nesting_depth_and_cycles_are_rejected() {
        let mut world = fixtures::world();
        let outer = fixtures::spawn(&mut world, BACKPACK, 1);
        let middle = fixtures::spawn(&mut world, BAG, 1);
        let inner = fixtures::spawn(&mut world, BAG, 1);
        world.add_item(HolderRef::Container(outer), 0, middle).expect("middle");
        world.add_item(HolderRef::Container(middle), 0, inner).expect("inner");

        let extra = fixtures::spawn(&mut world, BAG, 1);
        assert_eq!(
            world.check_add(None, HolderRef::Container(inner), extra, TOP),
            Err(MoveError::NestingTooDeep)
        );
        assert_eq!(
            world.check_add(None, HolderRef::Container(inner), outer, TOP),
            Err(MoveError::ContainerInsideItself)
        );
        assert_eq!(
            world.check_add(None, HolderRef::Container(outer), outer, TOP),
            Err(MoveError::ContainerInsideItself)
        );
        assert!(world.check_add(None, HolderRef::Container(middle), extra, TOP).is_ok());
    }

    #[test]
    fn partial_removal_splits_and_overdraw_fails() {
        let mut world = fixtures::world();
        let bag = fixtures::spawn(&mut world, BAG, 1);
        let potions = fixtures::spawn(&mut world, POTION, 20);
        world.add_item(HolderRef::Container(bag), 0, potions).expect("potions");

        assert_eq!(
            world.container_remove(bag, 0, 21),
            Err(MoveError::NotEnoughItems)
        );
        assert_eq!(world.item(potions).map(|item| item.count), Some(20));

        let piece = world.container_remove(bag, 0, 5).expect("split");
        assert_ne!(piece, potions);
        assert_eq!(world.item(piece).map(|item| item.count), Some(5));
        assert_eq!(world.item(piece).and_then(|item| item.owner()), None);
        assert_eq!(world.item(potions).map(|item| item.count), Some(15));
        assert_eq!(world.item_weight(bag), 8 + 15 * 2);

        world.container_restore(bag, 0, piece).expect("restore");
        assert_eq!(world.item(potions).map(|item| item.count), Some(20));
        assert!(world.item(piece).is_none());
        assert_eq!(world.item_weight(bag), 8 + 20 * 2);
    }

    #[test]
    fn unknown_item_kind_cannot_be_added() {
        let mut world = fixtures::world();
        let bag = fixtures::spawn(&mut world, BAG, 1);
        assert!(world.create_item(ItemTypeId(9999), 1).is_err());
        let rope = fixtures::spawn(&mut world, ROPE, 1);
        world.delete_item(rope).expect("delete");
        assert_eq!(
            world.check_add(None, HolderRef::Container(bag), rope, 0),
            Err(MoveError::ItemNotFound)
        );
    }
}
