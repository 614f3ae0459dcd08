pub mod actor;
pub mod equipment;
pub mod item;
pub mod slots;
pub mod store;
