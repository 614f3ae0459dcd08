//! Uniform holder contract. Every concrete holder kind is named once here and
//! dispatched with a single `match`; nothing downstream re-detects the kind.

use crate::entities::actor::ActorId;
use crate::entities::equipment::EquipmentRole;
use crate::entities::item::ItemId;
use crate::error::MoveError;
use crate::world::position::Position;
use crate::world::state::WorldState;
use crate::world::vault::VaultId;

/// Sentinel index: top of a tile stack, or "first compatible slot" of a container.
pub const TOP: usize = usize::MAX;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HolderRef {
    Tile(Position),
    Container(ItemId),
    Equipment(ActorId),
    Vault(VaultId),
}

impl HolderRef {
    pub fn is_tile(self) -> bool {
        matches!(self, HolderRef::Tile(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Endpoint {
    pub holder: HolderRef,
    pub index: usize,
}

impl Endpoint {
    pub fn new(holder: HolderRef, index: usize) -> Self {
        Self { holder, index }
    }

    pub fn tile(position: Position) -> Self {
        Self::new(HolderRef::Tile(position), TOP)
    }

    pub fn container(container: ItemId, index: usize) -> Self {
        Self::new(HolderRef::Container(container), index)
    }

    pub fn equipment(actor: ActorId, role: EquipmentRole) -> Self {
        Self::new(HolderRef::Equipment(actor), role.index())
    }

    pub fn vault(vault: VaultId, index: usize) -> Self {
        Self::new(HolderRef::Vault(vault), index)
    }
}

impl WorldState {
    pub fn holder_exists(&self, holder: HolderRef) -> bool {
        match holder {
            HolderRef::Tile(position) => self.tiles.contains_key(&position),
            HolderRef::Container(container) => self.store.is_container(container),
            HolderRef::Equipment(actor) => self.equipment.contains_key(&actor),
            HolderRef::Vault(vault) => self.vaults.contains_key(&vault),
        }
    }

    pub(crate) fn resolve_holder(&self, holder: HolderRef) -> Result<HolderRef, MoveError> {
        if self.holder_exists(holder) {
            Ok(holder)
        } else {
            tracing::error!(?holder, "holder cannot be resolved");
            Err(MoveError::UnknownHolder(holder))
        }
    }

    pub fn peek(&self, holder: HolderRef, index: usize) -> Option<ItemId> {
        match holder {
            HolderRef::Tile(position) => self.tile_peek(position, index),
            HolderRef::Container(container) => {
                let state = self.store.container(container)?;
                state.slots.peek(index)
            }
            HolderRef::Equipment(actor) => {
                let role = EquipmentRole::from_index(index)?;
                self.equipment.get(&actor)?.slot(role)
            }
            HolderRef::Vault(vault) => self.vault_root_peek(vault, index),
        }
    }

    /// Number of slots, or `None` for unbounded holders such as tiles.
    pub fn capacity(&self, holder: HolderRef) -> Option<usize> {
        match holder {
            HolderRef::Tile(_) => None,
            HolderRef::Container(container) => {
                self.store.container(container).map(|state| state.slots.size())
            }
            HolderRef::Equipment(_) => Some(EquipmentRole::COUNT),
            HolderRef::Vault(_) => Some(2),
        }
    }

    /// How many units of `item` the holder would take at `index`, or why none.
    pub fn check_add(
        &self,
        actor: Option<ActorId>,
        holder: HolderRef,
        item: ItemId,
        index: usize,
    ) -> Result<u16, MoveError> {
        if !self.store.contains(item) {
            return Err(MoveError::ItemNotFound);
        }
        match holder {
            HolderRef::Tile(position) => self.tile_check_add(actor, position, item),
            HolderRef::Container(container) => self.container_check_add(container, item, index),
            HolderRef::Equipment(owner) => self.equipment_check_add(owner, index, item),
            HolderRef::Vault(vault) => {
                self.resolve_holder(HolderRef::Vault(vault))?;
                Err(MoveError::CannotAddHere)
            }
        }
    }

    pub fn max_add_count(
        &self,
        actor: Option<ActorId>,
        holder: HolderRef,
        item: ItemId,
        index: usize,
    ) -> u16 {
        self.check_add(actor, holder, item, index).unwrap_or(0)
    }

    /// Places an in-flight item. Returns the id that ends up in the landing
    /// slot, which differs from `item` when stacks merged.
    pub(crate) fn insert_at(
        &mut self,
        holder: HolderRef,
        index: usize,
        item: ItemId,
    ) -> Result<ItemId, MoveError> {
        match holder {
            HolderRef::Tile(position) => self.tile_insert(position, item),
            HolderRef::Container(container) => self.container_insert(container, index, item),
            HolderRef::Equipment(actor) => {
                let role = EquipmentRole::from_index(index).ok_or(MoveError::CannotAddHere)?;
                self.equipment_insert(actor, role, item)
            }
            HolderRef::Vault(_) => Err(MoveError::CannotAddHere),
        }
    }

    /// Takes `count` units out of a slot, leaving the returned item in flight.
    pub(crate) fn remove_at(
        &mut self,
        holder: HolderRef,
        index: usize,
        count: u16,
    ) -> Result<ItemId, MoveError> {
        match holder {
            HolderRef::Tile(position) => self.tile_remove(position, index, count),
            HolderRef::Container(container) => self.container_remove(container, index, count),
            HolderRef::Equipment(actor) => {
                let role = EquipmentRole::from_index(index).ok_or(MoveError::ItemNotFound)?;
                self.equipment_remove(actor, role, count)
            }
            HolderRef::Vault(_) => Err(MoveError::NotMovable),
        }
    }

    /// Puts an item back where a failed transaction took it from, bypassing
    /// admission checks that passed a moment ago.
    pub(crate) fn restore_at(&mut self, holder: HolderRef, index: usize, item: ItemId) {
        let result = match holder {
            HolderRef::Tile(position) => self.tile_restore(position, index, item),
            HolderRef::Container(container) => self.container_restore(container, index, item),
            HolderRef::Equipment(actor) => match EquipmentRole::from_index(index) {
                Some(role) => self.equipment_restore(actor, role, item),
                None => Err(MoveError::CannotAddHere),
            },
            HolderRef::Vault(_) => Err(MoveError::CannotAddHere),
        };
        if let Err(err) = result {
            tracing::error!(?holder, index, item = item.0, %err, "restore failed");
        }
    }

    /// Where an item currently sits. Queued deliveries outside the visible
    /// window have no slot and return `None`.
    pub fn locate(&self, item: ItemId) -> Option<Endpoint> {
        let holder = self.store.owner(item)?;
        let index = match holder {
            HolderRef::Tile(position) => self.tiles.get(&position)?.index_of(item)?,
            HolderRef::Container(container) => {
                self.store.container(container)?.slots.position_of(item)?
            }
            HolderRef::Equipment(actor) => self.equipment.get(&actor)?.role_of(item)?.index(),
            HolderRef::Vault(vault) => self.vault_root_index(vault, item)?,
        };
        Some(Endpoint::new(holder, index))
    }
}
