use std::collections::BTreeSet;

use crate::entities::actor::ActorId;
use crate::entities::item::ItemId;
use crate::error::MoveError;
use crate::world::holder::{HolderRef, TOP};
use crate::world::position::Position;
use crate::world::state::WorldState;

/// Item stack of one map tile. Index 0 is the bottom, the last entry is the top.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tile {
    pub position: Position,
    items: Vec<ItemId>,
    owner: Option<ActorId>,
    guests: BTreeSet<ActorId>,
}

impl Tile {
    pub fn new(position: Position) -> Self {
        Self {
            position,
            items: Vec::new(),
            owner: None,
            guests: BTreeSet::new(),
        }
    }

    pub fn items(&self) -> &[ItemId] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn top(&self) -> Option<ItemId> {
        self.items.last().copied()
    }

    pub fn index_of(&self, item: ItemId) -> Option<usize> {
        self.items.iter().position(|entry| *entry == item)
    }

    /// `TOP` resolved against the current stack.
    fn resolve(&self, index: usize) -> Option<usize> {
        if index == TOP {
            self.items.len().checked_sub(1)
        } else if index < self.items.len() {
            Some(index)
        } else {
            None
        }
    }

    pub fn owner(&self) -> Option<ActorId> {
        self.owner
    }

    /// Private zones admit their owner and invited guests. Moves without an
    /// acting actor are system moves and always pass.
    pub fn admits(&self, actor: Option<ActorId>) -> bool {
        match (self.owner, actor) {
            (None, _) | (_, None) => true,
            (Some(owner), Some(actor)) => owner == actor || self.guests.contains(&actor),
        }
    }
}

impl WorldState {
    pub fn add_tile(&mut self, position: Position) -> &Tile {
        self.tiles
            .entry(position)
            .or_insert_with(|| Tile::new(position))
    }

    pub fn tile(&self, position: Position) -> Option<&Tile> {
        self.tiles.get(&position)
    }

    pub fn set_tile_owner(&mut self, position: Position, owner: Option<ActorId>) -> Result<(), MoveError> {
        let tile = self
            .tiles
            .get_mut(&position)
            .ok_or(MoveError::UnknownHolder(HolderRef::Tile(position)))?;
        tile.owner = owner;
        tile.guests.clear();
        Ok(())
    }

    pub fn invite_to_tile(&mut self, position: Position, guest: ActorId) -> Result<(), MoveError> {
        let tile = self
            .tiles
            .get_mut(&position)
            .ok_or(MoveError::UnknownHolder(HolderRef::Tile(position)))?;
        tile.guests.insert(guest);
        Ok(())
    }

    pub(crate) fn tile_peek(&self, position: Position, index: usize) -> Option<ItemId> {
        let tile = self.tiles.get(&position)?;
        tile.resolve(index).map(|index| tile.items[index])
    }

    pub(crate) fn tile_check_take(&self, actor: Option<ActorId>, position: Position) -> Result<(), MoveError> {
        let tile = self
            .tiles
            .get(&position)
            .ok_or(MoveError::UnknownHolder(HolderRef::Tile(position)))?;
        if tile.admits(actor) {
            Ok(())
        } else {
            Err(MoveError::AccessDenied)
        }
    }

    pub(crate) fn tile_check_add(
        &self,
        actor: Option<ActorId>,
        position: Position,
        item: ItemId,
    ) -> Result<u16, MoveError> {
        self.resolve_holder(HolderRef::Tile(position))?;
        let tile = self
            .tiles
            .get(&position)
            .ok_or(MoveError::UnknownHolder(HolderRef::Tile(position)))?;
        let sealed = tile
            .top()
            .and_then(|top| self.type_of(top))
            .map(|item_type| item_type.sealed)
            .unwrap_or(false);
        if sealed {
            return Err(MoveError::DestinationSealed);
        }
        if !tile.admits(actor) {
            return Err(MoveError::AccessDenied);
        }
        let blocked = tile.items.iter().any(|&entry| {
            entry != item
                && self
                    .type_of(entry)
                    .map(|item_type| item_type.blocking)
                    .unwrap_or(false)
        });
        if blocked {
            return Err(MoveError::CannotAddHere);
        }
        if self.store.inner_depth(item) > self.config.max_nesting_depth {
            return Err(MoveError::NestingTooDeep);
        }
        let incoming = self.store.get(item).ok_or(MoveError::ItemNotFound)?;
        Ok(self.stack_limit(incoming.type_id))
    }

    /// Drops an item on top. A matching stack on top absorbs it, and anything
    /// beyond the stack limit lands on top as a new stack.
    pub(crate) fn tile_insert(&mut self, position: Position, item: ItemId) -> Result<ItemId, MoveError> {
        let holder = HolderRef::Tile(position);
        let top = self
            .tiles
            .get(&position)
            .ok_or(MoveError::UnknownHolder(holder))?
            .top();

        let Some(existing) = top.filter(|&top| self.can_merge(top, item)) else {
            let index = match self.tiles.get_mut(&position) {
                Some(tile) => {
                    tile.items.push(item);
                    tile.items.len() - 1
                }
                None => return Err(MoveError::UnknownHolder(holder)),
            };
            self.store.set_owner(item, Some(holder));
            self.record_slot_change(holder, index, Some(item));
            return Ok(item);
        };

        let (present, incoming, type_id) = match (self.store.get(existing), self.store.get(item)) {
            (Some(left), Some(right)) => (left.count, right.count, left.type_id),
            _ => return Err(MoveError::ItemNotFound),
        };
        let limit = u32::from(self.stack_limit(type_id));
        let sum = u32::from(present) + u32::from(incoming);
        let kept = sum.min(limit) as u16;
        let overflow = (sum - u32::from(kept)) as u16;
        let merged = self
            .spawn_like(existing, kept)
            .ok_or(MoveError::ItemNotFound)?;
        let spill = if overflow > 0 {
            self.spawn_like(existing, overflow)
        } else {
            None
        };
        self.store.remove(existing);
        self.store.remove(item);

        let Some(tile) = self.tiles.get_mut(&position) else {
            return Err(MoveError::UnknownHolder(holder));
        };
        let index = tile.items.len() - 1;
        tile.items[index] = merged;
        if let Some(piece) = spill {
            tile.items.push(piece);
        }
        self.store.set_owner(merged, Some(holder));
        self.record_slot_change(holder, index, Some(merged));
        if let Some(piece) = spill {
            self.store.set_owner(piece, Some(holder));
            self.record_slot_change(holder, index + 1, Some(piece));
        }
        Ok(merged)
    }

    pub(crate) fn tile_remove(
        &mut self,
        position: Position,
        index: usize,
        count: u16,
    ) -> Result<ItemId, MoveError> {
        let holder = HolderRef::Tile(position);
        let tile = self
            .tiles
            .get(&position)
            .ok_or(MoveError::UnknownHolder(holder))?;
        let index = tile.resolve(index).ok_or(MoveError::ItemNotFound)?;
        let existing = tile.items[index];
        let present = self
            .store
            .get(existing)
            .map(|item| item.count)
            .ok_or(MoveError::ItemNotFound)?;
        if count == 0 {
            return Err(MoveError::InvalidCount);
        }
        if count > present {
            return Err(MoveError::NotEnoughItems);
        }

        if count == present {
            if let Some(tile) = self.tiles.get_mut(&position) {
                tile.items.remove(index);
            }
            self.store.set_owner(existing, None);
            self.record_slot_change(holder, index, None);
            return Ok(existing);
        }

        let piece = self
            .spawn_like(existing, count)
            .ok_or(MoveError::ItemNotFound)?;
        if let Some(item) = self.store.get_mut(existing) {
            item.count = present - count;
        }
        self.record_slot_change(holder, index, Some(existing));
        Ok(piece)
    }

    pub(crate) fn tile_restore(&mut self, position: Position, index: usize, item: ItemId) -> Result<(), MoveError> {
        let holder = HolderRef::Tile(position);
        let tile = self
            .tiles
            .get(&position)
            .ok_or(MoveError::UnknownHolder(holder))?;
        if let Some(existing) = tile.items.get(index).copied() {
            if self.can_merge(existing, item) {
                self.merge_back(holder, index, existing, item);
                return Ok(());
            }
        }
        let Some(tile) = self.tiles.get_mut(&position) else {
            return Err(MoveError::UnknownHolder(holder));
        };
        let index = index.min(tile.items.len());
        tile.items.insert(index, item);
        self.store.set_owner(item, Some(holder));
        self.record_slot_change(holder, index, Some(item));
        Ok(())
    }
}
