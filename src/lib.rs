pub mod config;
pub mod entities;
pub mod error;
pub mod persistence;
pub mod telemetry;
pub mod world;

pub use config::EngineConfig;
pub use entities::actor::{ActorHooks, ActorId};
pub use entities::equipment::EquipmentRole;
pub use entities::item::{Item, ItemId, ItemTypeId};
pub use error::{LoadError, MoveError};
pub use world::holder::{Endpoint, HolderRef, TOP};
pub use world::movement::{MoveOutcome, MoveRequest};
pub use world::oracle::{ChangeSink, Context, WorldOracle};
pub use world::position::Position;
pub use world::state::{WorldState, WorldUpdate};
pub use world::vault::VaultId;
