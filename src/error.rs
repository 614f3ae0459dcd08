//! Error types shared across the engine.

use std::path::PathBuf;

use crate::world::holder::HolderRef;

/// Why a move or placement was refused. Every variant leaves the world untouched.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum MoveError {
    /// A holder could not be resolved. This is a programming error on the caller side.
    #[error("Sorry, not possible.")]
    UnknownHolder(HolderRef),

    #[error("Sorry, not possible.")]
    NotPossible,

    #[error("You are not close enough.")]
    NotCloseEnough,

    #[error("You cannot throw there.")]
    OutOfSight,

    #[error("There is no object.")]
    ItemNotFound,

    #[error("You cannot move this object.")]
    NotMovable,

    #[error("There are not enough objects.")]
    NotEnoughItems,

    #[error("You do not have enough capacity.")]
    CapacityExceeded,

    #[error("You cannot put this object here.")]
    CannotAddHere,

    #[error("This slot is occupied.")]
    SlotOccupied,

    #[error("You cannot put more objects in this container.")]
    ContainerFull,

    #[error("You cannot put a container this deep.")]
    NestingTooDeep,

    #[error("This is impossible.")]
    ContainerInsideItself,

    #[error("You cannot dress this object there.")]
    WrongSlotType,

    #[error("Both hands need to be free.")]
    BothHandsRequired,

    #[error("This place is sealed.")]
    DestinationSealed,

    #[error("You are not invited.")]
    AccessDenied,

    #[error("Your depot is full.")]
    StorageLimit,

    #[error("Invalid item count.")]
    InvalidCount,
}

/// Failures while decoding configuration, definitions or persisted items.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("yaml: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("item type {0} already exists")]
    DuplicateItemType(u16),

    #[error("unknown item type {0}")]
    UnknownItemType(u16),

    #[error("invalid persisted item: {0}")]
    Invalid(String),
}
