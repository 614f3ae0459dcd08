pub mod container;
pub mod equip;
pub mod holder;
pub mod item_types;
pub mod movement;
pub mod oracle;
pub mod position;
pub mod state;
pub mod tile;
pub mod vault;

#[cfg(test)]
pub(crate) mod fixtures;
