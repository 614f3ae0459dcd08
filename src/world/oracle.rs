//! Interfaces the engine consumes from the surrounding world, plus the
//! notification sink it feeds.

use crate::entities::actor::{ActorHooks, ActorId};
use crate::entities::equipment::EquipmentRole;
use crate::entities::item::{ItemId, ItemView};
use crate::world::position::Position;
use crate::world::vault::VaultId;

/// Spatial questions answered by the map module.
pub trait WorldOracle {
    /// Actor stands next to (or on) `position` and may pick things up there.
    fn can_reach(&self, actor: ActorId, position: Position) -> bool;

    /// Actor can see and throw onto `position`.
    fn can_throw(&self, actor: ActorId, position: Position) -> bool;

    /// Teleports and floor changes: where an item dropped on `position` really lands.
    fn resolve_effective_destination(&self, position: Position) -> Option<Position> {
        Some(position)
    }

    fn can_access_vault(&self, actor: ActorId, vault: VaultId) -> bool;
}

/// Receives committed changes; the network layer turns these into packets.
pub trait ChangeSink {
    fn on_container_changed(
        &mut self,
        watcher: ActorId,
        container: ItemId,
        index: usize,
        item: Option<ItemView>,
    );

    fn on_container_closed(&mut self, _watcher: ActorId, _container: ItemId) {}

    fn on_tile_item_changed(&mut self, position: Position, index: usize, item: Option<ItemView>);

    fn on_equipment_changed(
        &mut self,
        actor: ActorId,
        role: EquipmentRole,
        item: Option<ItemView>,
    );
}

/// Collaborators handed to every public engine call.
pub struct Context<'a> {
    pub world: &'a dyn WorldOracle,
    pub actors: &'a mut dyn ActorHooks,
    pub sink: &'a mut dyn ChangeSink,
}

impl<'a> Context<'a> {
    pub fn new(
        world: &'a dyn WorldOracle,
        actors: &'a mut dyn ActorHooks,
        sink: &'a mut dyn ChangeSink,
    ) -> Self {
        Self {
            world,
            actors,
            sink,
        }
    }
}
