use serde::{Deserialize, Serialize};

use crate::entities::actor::ActorId;
use crate::entities::item::ItemId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EquipmentRole {
    Head,
    Necklace,
    Pack,
    Body,
    MainHand,
    OffHand,
    Legs,
    Feet,
    Ring,
    Ammo,
}

impl EquipmentRole {
    pub const COUNT: usize = 10;

    pub fn index(self) -> usize {
        match self {
            EquipmentRole::Head => 0,
            EquipmentRole::Necklace => 1,
            EquipmentRole::Pack => 2,
            EquipmentRole::Body => 3,
            EquipmentRole::MainHand => 4,
            EquipmentRole::OffHand => 5,
            EquipmentRole::Legs => 6,
            EquipmentRole::Feet => 7,
            EquipmentRole::Ring => 8,
            EquipmentRole::Ammo => 9,
        }
    }

    pub fn from_index(index: usize) -> Option<Self> {
        match index {
            0 => Some(EquipmentRole::Head),
            1 => Some(EquipmentRole::Necklace),
            2 => Some(EquipmentRole::Pack),
            3 => Some(EquipmentRole::Body),
            4 => Some(EquipmentRole::MainHand),
            5 => Some(EquipmentRole::OffHand),
            6 => Some(EquipmentRole::Legs),
            7 => Some(EquipmentRole::Feet),
            8 => Some(EquipmentRole::Ring),
            9 => Some(EquipmentRole::Ammo),
            _ => None,
        }
    }

    pub fn is_hand(self) -> bool {
        matches!(self, EquipmentRole::MainHand | EquipmentRole::OffHand)
    }

    /// The other hand for a hand role.
    pub fn paired_hand(self) -> Option<Self> {
        match self {
            EquipmentRole::MainHand => Some(EquipmentRole::OffHand),
            EquipmentRole::OffHand => Some(EquipmentRole::MainHand),
            _ => None,
        }
    }

    /// Hands and the ammo slot hold anything; every other role needs an item
    /// worn exactly there.
    pub fn accepts_body(self, body: Option<EquipmentRole>) -> bool {
        if self.is_hand() || self == EquipmentRole::Ammo {
            return true;
        }
        body == Some(self)
    }
}

pub const EQUIPMENT_ROLES: [EquipmentRole; EquipmentRole::COUNT] = [
    EquipmentRole::Head,
    EquipmentRole::Necklace,
    EquipmentRole::Pack,
    EquipmentRole::Body,
    EquipmentRole::MainHand,
    EquipmentRole::OffHand,
    EquipmentRole::Legs,
    EquipmentRole::Feet,
    EquipmentRole::Ring,
    EquipmentRole::Ammo,
];

/// Worn items of one actor. Also the root of that actor's weight chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EquipmentSet {
    actor: ActorId,
    slots: Vec<Option<ItemId>>,
    carried_weight: u32,
}

impl EquipmentSet {
    pub fn new(actor: ActorId) -> Self {
        Self {
            actor,
            slots: vec![None; EquipmentRole::COUNT],
            carried_weight: 0,
        }
    }

    pub fn actor(&self) -> ActorId {
        self.actor
    }

    pub fn slot(&self, role: EquipmentRole) -> Option<ItemId> {
        self.slots.get(role.index()).copied().flatten()
    }

    pub fn set_slot(&mut self, role: EquipmentRole, item: Option<ItemId>) -> Option<ItemId> {
        match self.slots.get_mut(role.index()) {
            Some(entry) => std::mem::replace(entry, item),
            None => None,
        }
    }

    pub fn role_of(&self, item: ItemId) -> Option<EquipmentRole> {
        EQUIPMENT_ROLES
            .into_iter()
            .find(|role| self.slot(*role) == Some(item))
    }

    pub fn worn(&self) -> impl Iterator<Item = (EquipmentRole, ItemId)> + '_ {
        EQUIPMENT_ROLES
            .into_iter()
            .filter_map(|role| self.slot(role).map(|item| (role, item)))
    }

    pub fn carried_weight(&self) -> u32 {
        self.carried_weight
    }

    pub(crate) fn adjust_weight(&mut self, delta: i64) {
        self.carried_weight = apply_weight_delta(self.carried_weight, delta);
    }
}

pub(crate) fn apply_weight_delta(current: u32, delta: i64) -> u32 {
    let next = i64::from(current) + delta;
    next.clamp(0, i64::from(u32::MAX)) as u32
}
