use std::collections::BTreeSet;

use crate::entities::actor::ActorId;
use crate::entities::item::ItemId;

/// Fixed-size ordered slot array. The size never changes after construction.
///
/// Only ids are stored here; counts and kinds live in the item arena, so the
/// stacking arithmetic is done by the holder that owns the array.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotArray {
    slots: Vec<Option<ItemId>>,
    observers: BTreeSet<ActorId>,
}

impl SlotArray {
    pub fn new(size: usize) -> Self {
        Self {
            slots: vec![None; size],
            observers: BTreeSet::new(),
        }
    }

    pub fn size(&self) -> usize {
        self.slots.len()
    }

    pub fn peek(&self, index: usize) -> Option<ItemId> {
        self.slots.get(index).copied().flatten()
    }

    /// Writes `item` into `index` and returns what was there before.
    pub fn put(&mut self, index: usize, item: Option<ItemId>) -> Option<ItemId> {
        match self.slots.get_mut(index) {
            Some(entry) => std::mem::replace(entry, item),
            None => None,
        }
    }

    pub fn take(&mut self, index: usize) -> Option<ItemId> {
        self.put(index, None)
    }

    pub fn position_of(&self, item: ItemId) -> Option<usize> {
        self.slots.iter().position(|entry| *entry == Some(item))
    }

    /// Clears the slot holding `item`, returning its former index.
    pub fn delete_by_identity(&mut self, item: ItemId) -> Option<usize> {
        let index = self.position_of(item)?;
        self.slots[index] = None;
        Some(index)
    }

    pub fn is_full(&self) -> bool {
        self.slots.iter().all(|entry| entry.is_some())
    }

    pub fn is_empty(&self) -> bool {
        self.slots.iter().all(|entry| entry.is_none())
    }

    pub fn first_empty(&self) -> Option<usize> {
        self.slots.iter().position(|entry| entry.is_none())
    }

    pub fn occupied(&self) -> impl Iterator<Item = (usize, ItemId)> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(index, entry)| entry.map(|id| (index, id)))
    }

    pub fn add_observer(&mut self, observer: ActorId) -> bool {
        self.observers.insert(observer)
    }

    pub fn remove_observer(&mut self, observer: ActorId) -> bool {
        self.observers.remove(&observer)
    }

    pub fn observers(&self) -> impl Iterator<Item = ActorId> + '_ {
        self.observers.iter().copied()
    }

    pub fn take_observers(&mut self) -> Vec<ActorId> {
        std::mem::take(&mut self.observers).into_iter().collect()
    }
}
