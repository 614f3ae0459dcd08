//! Equipment holder: role gating, two-handed exclusivity and worn effects.

use crate::entities::actor::ActorId;
use crate::entities::equipment::EquipmentRole;
use crate::entities::item::{ItemId, ItemTypeId};
use crate::error::MoveError;
use crate::world::holder::HolderRef;
use crate::world::state::{WorldState, WorldUpdate};

impl WorldState {
    fn is_two_handed(&self, item: ItemId) -> bool {
        self.type_of(item)
            .map(|item_type| item_type.two_handed)
            .unwrap_or(false)
    }

    pub(crate) fn equipment_check_add(
        &self,
        owner: ActorId,
        index: usize,
        item: ItemId,
    ) -> Result<u16, MoveError> {
        let holder = HolderRef::Equipment(owner);
        self.resolve_holder(holder)?;
        let set = self
            .equipment
            .get(&owner)
            .ok_or(MoveError::UnknownHolder(holder))?;
        let role = EquipmentRole::from_index(index).ok_or(MoveError::CannotAddHere)?;
        let item_type = self.type_of(item).ok_or(MoveError::CannotAddHere)?;
        if !role.accepts_body(item_type.body) {
            return Err(MoveError::WrongSlotType);
        }

        if let Some(paired) = role.paired_hand() {
            if let Some(other) = set.slot(paired).filter(|other| *other != item) {
                if item_type.two_handed || self.is_two_handed(other) {
                    return Err(MoveError::BothHandsRequired);
                }
            }
        }

        if self.store.inner_depth(item) > self.config.max_nesting_depth {
            return Err(MoveError::NestingTooDeep);
        }

        let limit = item_type.stack_limit(self.config.default_max_stack);
        match set.slot(role) {
            None => Ok(limit),
            Some(existing) if self.can_merge(existing, item) => {
                let present = self.store.get(existing).map(|item| item.count).unwrap_or(limit);
                match limit.saturating_sub(present) {
                    0 => Err(MoveError::SlotOccupied),
                    headroom => Ok(headroom),
                }
            }
            Some(_) => Err(MoveError::SlotOccupied),
        }
    }

    /// Records the effect of a kind put on or taken off in `role`. Items only
    /// held in a hand or the ammo slot without being worn there grant nothing.
    pub(crate) fn toggle_worn_effect(
        &mut self,
        actor: ActorId,
        role: EquipmentRole,
        type_id: ItemTypeId,
        active: bool,
    ) {
        let Some(tag) = self
            .item_types
            .get(type_id)
            .filter(|item_type| item_type.body == Some(role))
            .and_then(|item_type| item_type.worn_effect.clone())
        else {
            return;
        };
        self.record(WorldUpdate::StatusEffect { actor, tag, active });
    }

    /// Equips `item`. Merging into an equipped stack of the same kind is not a
    /// physical equip and leaves status effects alone.
    pub(crate) fn equipment_insert(
        &mut self,
        actor: ActorId,
        role: EquipmentRole,
        item: ItemId,
    ) -> Result<ItemId, MoveError> {
        let holder = HolderRef::Equipment(actor);
        let set = self
            .equipment
            .get(&actor)
            .ok_or(MoveError::UnknownHolder(holder))?;
        let occupant = set.slot(role);
        let weight = self.item_weight(item);
        let type_id = self.store.get(item).ok_or(MoveError::ItemNotFound)?.type_id;

        let Some(existing) = occupant else {
            if let Some(set) = self.equipment.get_mut(&actor) {
                set.set_slot(role, Some(item));
            }
            self.store.set_owner(item, Some(holder));
            self.record_slot_change(holder, role.index(), Some(item));
            self.propagate_weight(holder, i64::from(weight));
            self.toggle_worn_effect(actor, role, type_id, true);
            return Ok(item);
        };
        if !self.can_merge(existing, item) {
            return Err(MoveError::SlotOccupied);
        }
        let present = self.store.get(existing).map(|item| item.count).unwrap_or(0);
        let incoming = self.store.get(item).map(|item| item.count).unwrap_or(0);
        let sum = u32::from(present) + u32::from(incoming);
        if sum > u32::from(self.stack_limit(type_id)) {
            return Err(MoveError::SlotOccupied);
        }
        let merged = self
            .spawn_like(existing, sum as u16)
            .ok_or(MoveError::ItemNotFound)?;
        self.store.remove(existing);
        self.store.remove(item);
        if let Some(set) = self.equipment.get_mut(&actor) {
            set.set_slot(role, Some(merged));
        }
        self.store.set_owner(merged, Some(holder));
        self.record_slot_change(holder, role.index(), Some(merged));
        self.propagate_weight(holder, i64::from(weight));
        Ok(merged)
    }

    pub(crate) fn equipment_remove(
        &mut self,
        actor: ActorId,
        role: EquipmentRole,
        count: u16,
    ) -> Result<ItemId, MoveError> {
        let holder = HolderRef::Equipment(actor);
        let set = self
            .equipment
            .get(&actor)
            .ok_or(MoveError::UnknownHolder(holder))?;
        let existing = set.slot(role).ok_or(MoveError::ItemNotFound)?;
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
            if let Some(set) = self.equipment.get_mut(&actor) {
                set.set_slot(role, None);
            }
            self.store.set_owner(existing, None);
            self.record_slot_change(holder, role.index(), None);
            self.propagate_weight(holder, -i64::from(weight));
            self.toggle_worn_effect(actor, role, type_id, false);
            return Ok(existing);
        }

        let piece = self
            .spawn_like(existing, count)
            .ok_or(MoveError::ItemNotFound)?;
        if let Some(item) = self.store.get_mut(existing) {
            item.count = present - count;
        }
        self.record_slot_change(holder, role.index(), Some(existing));
        self.propagate_weight(holder, -i64::from(self.units_weight(type_id, count)));
        Ok(piece)
    }

    pub(crate) fn equipment_restore(
        &mut self,
        actor: ActorId,
        role: EquipmentRole,
        item: ItemId,
    ) -> Result<(), MoveError> {
        let holder = HolderRef::Equipment(actor);
        let occupant = self
            .equipment
            .get(&actor)
            .ok_or(MoveError::UnknownHolder(holder))?
            .slot(role);
        match occupant {
            Some(existing) if self.can_merge(existing, item) => {
                self.merge_back(holder, role.index(), existing, item);
                Ok(())
            }
            _ => self.equipment_insert(actor, role, item).map(|_| ()),
        }
    }
}
