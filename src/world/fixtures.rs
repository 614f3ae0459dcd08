//! Shared test catalogue and recording collaborators.

use std::collections::HashMap;

use crate::config::EngineConfig;
use crate::entities::actor::{ActorHooks, ActorId};
use crate::entities::equipment::EquipmentRole;
use crate::entities::item::{ItemCategory, ItemId, ItemTypeId, ItemView};
use crate::world::holder::HolderRef;
use crate::world::item_types::{ItemType, ItemTypeIndex};
use crate::world::oracle::{ChangeSink, Context, WorldOracle};
use crate::world::position::Position;
use crate::world::state::WorldState;
use crate::world::vault::VaultId;

pub const BACKPACK: u16 = 1;
pub const BAG: u16 = 2;
pub const POTION: u16 = 3;
pub const TWO_HANDED_SWORD: u16 = 4;
pub const DAGGER: u16 = 5;
pub const SHIELD: u16 = 6;
pub const HELMET: u16 = 7;
pub const STEALTH_RING: u16 = 8;
pub const MAILBOX: u16 = 9;
pub const LETTER: u16 = 10;
pub const STAMPED_LETTER: u16 = 11;
pub const WALL: u16 = 12;
pub const MAGIC_SEAL: u16 = 13;
pub const ROPE: u16 = 14;
pub const TOOLBELT: u16 = 15;
pub const FRESH_MEAT: u16 = 16;
pub const ROTTEN_MEAT: u16 = 17;
pub const ARROWS: u16 = 18;
pub const FLOWER_BAG: u16 = 19;

pub const INVISIBLE: &str = "invisible";

fn kind(id: u16, name: &str, category: ItemCategory, weight: u32) -> ItemType {
    let mut item_type = ItemType::new(ItemTypeId(id), name, category);
    item_type.weight = weight;
    item_type
}

pub fn catalogue() -> ItemTypeIndex {
    let mut backpack = kind(BACKPACK, "backpack", ItemCategory::Container, 18);
    backpack.container_capacity = Some(8);
    backpack.body = Some(EquipmentRole::Pack);

    let mut bag = kind(BAG, "bag", ItemCategory::Container, 8);
    bag.container_capacity = Some(4);
    bag.body = Some(EquipmentRole::Pack);

    let mut potion = kind(POTION, "health potion", ItemCategory::Consumable, 2);
    potion.stackable = true;

    let mut sword = kind(TWO_HANDED_SWORD, "two handed sword", ItemCategory::Weapon, 50);
    sword.two_handed = true;
    sword.body = Some(EquipmentRole::MainHand);

    let mut dagger = kind(DAGGER, "dagger", ItemCategory::Weapon, 10);
    dagger.body = Some(EquipmentRole::MainHand);

    let mut shield = kind(SHIELD, "wooden shield", ItemCategory::Armor, 30);
    shield.body = Some(EquipmentRole::OffHand);

    let mut helmet = kind(HELMET, "leather helmet", ItemCategory::Armor, 25);
    helmet.body = Some(EquipmentRole::Head);

    let mut ring = kind(STEALTH_RING, "stealth ring", ItemCategory::Misc, 1);
    ring.body = Some(EquipmentRole::Ring);
    ring.worn_effect = Some(INVISIBLE.to_string());

    let mut mailbox = kind(MAILBOX, "mailbox", ItemCategory::Misc, 0);
    mailbox.movable = false;
    mailbox.collection_point = true;

    let mut letter = kind(LETTER, "letter", ItemCategory::Mail, 1);
    letter.mail = true;
    letter.stamped_type = Some(ItemTypeId(STAMPED_LETTER));
    let stamped = kind(STAMPED_LETTER, "stamped letter", ItemCategory::Mail, 1);

    let mut wall = kind(WALL, "stone wall", ItemCategory::Ground, 0);
    wall.movable = false;
    wall.blocking = true;

    let mut seal = kind(MAGIC_SEAL, "magic seal", ItemCategory::Misc, 0);
    seal.movable = false;
    seal.sealed = true;

    let rope = kind(ROPE, "rope", ItemCategory::Tool, 3);

    let mut belt = kind(TOOLBELT, "tool belt", ItemCategory::Container, 5);
    belt.container_capacity = Some(3);
    belt.restricted_slots.insert(0, vec![ItemCategory::Tool]);

    let mut meat = kind(FRESH_MEAT, "meat", ItemCategory::Consumable, 1);
    meat.stackable = true;
    meat.expire_target = Some(ItemTypeId(ROTTEN_MEAT));
    let mut rotten = kind(ROTTEN_MEAT, "rotten meat", ItemCategory::Misc, 1);
    rotten.stackable = true;

    let mut arrows = kind(ARROWS, "arrow", ItemCategory::Ammunition, 1);
    arrows.stackable = true;
    arrows.body = Some(EquipmentRole::Ammo);

    let mut flower_bag = kind(FLOWER_BAG, "flower bag", ItemCategory::Container, 2);
    flower_bag.container_capacity = Some(2);
    flower_bag.expire_target = Some(ItemTypeId(ROTTEN_MEAT));

    let mut index = ItemTypeIndex::default();
    for item_type in [
        backpack, bag, potion, sword, dagger, shield, helmet, ring, mailbox, letter, stamped,
        wall, seal, rope, belt, meat, rotten, arrows, flower_bag,
    ] {
        index.insert(item_type).expect("unique fixture kind");
    }
    index
}

pub fn world() -> WorldState {
    WorldState::new(EngineConfig::default(), catalogue())
}

pub fn world_with(adjust: impl FnOnce(&mut EngineConfig)) -> WorldState {
    let mut config = EngineConfig::default();
    adjust(&mut config);
    WorldState::new(config, catalogue())
}

pub fn spawn(world: &mut WorldState, type_id: u16, count: u16) -> ItemId {
    world
        .create_item(ItemTypeId(type_id), count)
        .expect("fixture kind")
}

/// Map stand-in: actors reach tiles next to where they stand and see seven
/// tiles far. Actors without a position reach everything.
#[derive(Debug)]
pub struct TestWorld {
    pub standing: HashMap<ActorId, Position>,
    pub redirects: HashMap<Position, Position>,
    pub vault_access: bool,
}

impl Default for TestWorld {
    fn default() -> Self {
        Self {
            standing: HashMap::new(),
            redirects: HashMap::new(),
            vault_access: true,
        }
    }
}

impl WorldOracle for TestWorld {
    fn can_reach(&self, actor: ActorId, position: Position) -> bool {
        self.standing
            .get(&actor)
            .map(|at| at.is_adjacent(position))
            .unwrap_or(true)
    }

    fn can_throw(&self, actor: ActorId, position: Position) -> bool {
        self.standing
            .get(&actor)
            .map(|at| matches!(at.distance(position), Some(distance) if distance <= 7))
            .unwrap_or(true)
    }

    fn resolve_effective_destination(&self, position: Position) -> Option<Position> {
        Some(self.redirects.get(&position).copied().unwrap_or(position))
    }

    fn can_access_vault(&self, _actor: ActorId, _vault: VaultId) -> bool {
        self.vault_access
    }
}

#[derive(Debug, Default)]
pub struct TestActors {
    pub capacity: HashMap<ActorId, u32>,
    pub cancels: Vec<(ActorId, String)>,
    pub applied: Vec<(ActorId, String)>,
    pub removed: Vec<(ActorId, String)>,
    pub messages: Vec<(ActorId, String)>,
}

impl ActorHooks for TestActors {
    fn capacity(&self, actor: ActorId) -> u32 {
        self.capacity.get(&actor).copied().unwrap_or(100_000)
    }

    fn notify_cancel(&mut self, actor: ActorId, reason: &str) {
        self.cancels.push((actor, reason.to_string()));
    }

    fn apply_status_effect(&mut self, actor: ActorId, tag: &str) {
        self.applied.push((actor, tag.to_string()));
    }

    fn remove_status_effect(&mut self, actor: ActorId, tag: &str) {
        self.removed.push((actor, tag.to_string()));
    }

    fn send_message(&mut self, actor: ActorId, text: &str) {
        self.messages.push((actor, text.to_string()));
    }
}

#[derive(Debug, Default)]
pub struct RecordingSink {
    pub containers: Vec<(ActorId, ItemId, usize, Option<ItemView>)>,
    pub closed: Vec<(ActorId, ItemId)>,
    pub tiles: Vec<(Position, usize, Option<ItemView>)>,
    pub equipment: Vec<(ActorId, EquipmentRole, Option<ItemView>)>,
}

impl RecordingSink {
    pub fn is_empty(&self) -> bool {
        self.containers.is_empty()
            && self.closed.is_empty()
            && self.tiles.is_empty()
            && self.equipment.is_empty()
    }
}

impl ChangeSink for RecordingSink {
    fn on_container_changed(
        &mut self,
        watcher: ActorId,
        container: ItemId,
        index: usize,
        item: Option<ItemView>,
    ) {
        self.containers.push((watcher, container, index, item));
    }

    fn on_container_closed(&mut self, watcher: ActorId, container: ItemId) {
        self.closed.push((watcher, container));
    }

    fn on_tile_item_changed(&mut self, position: Position, index: usize, item: Option<ItemView>) {
        self.tiles.push((position, index, item));
    }

    fn on_equipment_changed(&mut self, actor: ActorId, role: EquipmentRole, item: Option<ItemView>) {
        self.equipment.push((actor, role, item));
    }
}

#[derive(Debug, Default)]
pub struct Harness {
    pub world: TestWorld,
    pub actors: TestActors,
    pub sink: RecordingSink,
}

impl Harness {
    pub fn ctx(&mut self) -> Context<'_> {
        Context::new(&self.world, &mut self.actors, &mut self.sink)
    }
}

/// Asserts that every live item is listed by exactly one holder, the one its
/// owner back-reference names. Items in flight are listed nowhere.
pub fn assert_single_owner(world: &WorldState) {
    let mut listed: HashMap<ItemId, Vec<HolderRef>> = HashMap::new();
    let mut list = |item: ItemId, holder: HolderRef| listed.entry(item).or_default().push(holder);

    for (position, tile) in &world.tiles {
        for item in tile.items() {
            list(*item, HolderRef::Tile(*position));
        }
    }
    for id in world.store.ids() {
        if let Some(state) = world.store.container(id) {
            for (_, item) in state.slots.occupied() {
                list(item, HolderRef::Container(id));
            }
        }
    }
    for (actor, set) in &world.equipment {
        for (_, item) in set.worn() {
            list(item, HolderRef::Equipment(*actor));
        }
    }
    for (id, vault) in &world.vaults {
        list(vault.delivery, HolderRef::Vault(*id));
        list(vault.storage, HolderRef::Vault(*id));
        let window = world
            .store
            .container(vault.delivery)
            .map(|state| state.slots.size())
            .unwrap_or(0);
        for item in vault.queue().iter().skip(window) {
            list(item, HolderRef::Vault(*id));
        }
    }

    for id in world.store.ids() {
        let holders = listed.remove(&id).unwrap_or_default();
        match world.store.owner(id) {
            Some(owner) => assert_eq!(holders, vec![owner], "{id:?} listed by {holders:?}"),
            None => assert!(holders.is_empty(), "in-flight {id:?} listed by {holders:?}"),
        }
    }
    assert!(listed.is_empty(), "holders list dead items {:?}", listed.keys().collect::<Vec<_>>());
}
