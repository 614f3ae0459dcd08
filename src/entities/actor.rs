//! Actor identity and the narrow actor interface consumed by the engine.

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ActorId(pub u32);

/// Callbacks into the actor module. The engine never owns actor state besides
/// the equipment set it manages.
pub trait ActorHooks {
    /// Total carrying capacity of the actor, in the same unit as item weights.
    fn capacity(&self, actor: ActorId) -> u32;

    fn notify_cancel(&mut self, actor: ActorId, reason: &str);

    fn apply_status_effect(&mut self, actor: ActorId, tag: &str);

    fn remove_status_effect(&mut self, actor: ActorId, tag: &str);

    fn send_message(&mut self, actor: ActorId, text: &str);
}
