//! Move orchestration. Guards run in a fixed order and the first failure
//! aborts the move; nothing is mutated until every guard has passed, and
//! swaps and equip-replacements roll back completely when their second half
//! cannot be placed.

use crate::entities::actor::ActorId;
use crate::entities::item::ItemId;
use crate::error::MoveError;
use crate::world::holder::{Endpoint, HolderRef, TOP};
use crate::world::oracle::Context;
use crate::world::position::Position;
use crate::world::state::WorldState;
use crate::world::vault::VaultId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MoveRequest {
    pub from: Endpoint,
    pub to: Endpoint,
    pub count: u16,
}

impl MoveRequest {
    pub fn new(from: Endpoint, to: Endpoint, count: u16) -> Self {
        Self { from, to, count }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveOutcome {
    /// `item` is the instance now in the destination slot; merged stacks get a
    /// fresh id.
    Moved {
        item: ItemId,
        to: Endpoint,
        count: u16,
    },
    Swapped {
        item: ItemId,
        displaced: ItemId,
    },
    Replaced {
        item: ItemId,
        unequipped: ItemId,
    },
    Delivered {
        item: ItemId,
        vault: VaultId,
    },
    /// Source and destination were the same slot.
    Unchanged,
}

impl WorldState {
    /// Moves `request.count` units for `actor`. Rejections reach the actor
    /// through `notify_cancel`; accepted moves are published to the sink.
    pub fn move_item(
        &mut self,
        ctx: &mut Context<'_>,
        actor: ActorId,
        request: MoveRequest,
    ) -> Result<MoveOutcome, MoveError> {
        let mark = self.journal_mark();
        match self.execute_move(ctx, actor, request) {
            Ok(outcome) => {
                self.flush(ctx);
                Ok(outcome)
            }
            Err(err) => {
                self.discard_since(mark);
                tracing::debug!(actor = actor.0, ?request, %err, "move rejected");
                ctx.actors.notify_cancel(actor, &err.to_string());
                Err(err)
            }
        }
    }

    /// System placement of an in-flight item, without an acting actor.
    pub fn add_item(&mut self, holder: HolderRef, index: usize, item: ItemId) -> Result<ItemId, MoveError> {
        self.resolve_holder(holder)?;
        let count = self.store.get(item).ok_or(MoveError::ItemNotFound)?.count;
        if self.store.owner(item).is_some() {
            return Err(MoveError::NotPossible);
        }
        if self.check_add(None, holder, item, index)? < count {
            return Err(MoveError::ContainerFull);
        }
        self.insert_at(holder, index, item)
    }

    fn execute_move(
        &mut self,
        ctx: &mut Context<'_>,
        actor: ActorId,
        request: MoveRequest,
    ) -> Result<MoveOutcome, MoveError> {
        let MoveRequest { from, mut to, count } = request;

        self.resolve_holder(from.holder)?;
        self.resolve_holder(to.holder)?;

        self.check_reach(ctx, actor, from.holder, true)?;
        self.check_reach(ctx, actor, to.holder, false)?;

        let item = self
            .peek(from.holder, from.index)
            .ok_or(MoveError::ItemNotFound)?;
        let from = self.locate(item).unwrap_or(from);

        self.check_movable(item)?;
        if let HolderRef::Tile(position) = from.holder {
            self.tile_check_take(Some(actor), position)?;
        }

        if count == 0 {
            return Err(MoveError::InvalidCount);
        }
        let (available, type_id) = self
            .store
            .get(item)
            .map(|item| (item.count, item.type_id))
            .ok_or(MoveError::ItemNotFound)?;
        let from_delivery = self.is_delivery_container(from.holder);
        let count = if !self.is_stackable(type_id) || from_delivery {
            available
        } else {
            count.min(available)
        };
        if from == to {
            return Ok(MoveOutcome::Unchanged);
        }

        if let HolderRef::Tile(position) = to.holder {
            if let Some(vault) = self.collection_target(position, item) {
                return self.post_mail(from, item, available, vault);
            }
            let effective = ctx
                .world
                .resolve_effective_destination(position)
                .ok_or(MoveError::CannotAddHere)?;
            if effective != position {
                tracing::debug!(%position, %effective, "destination redirected");
                to = Endpoint::tile(effective);
                self.resolve_holder(to.holder)?;
            }
        }

        to = self.redirect_destination(actor, item, to)?;

        if let (HolderRef::Container(_), HolderRef::Container(_)) = (from.holder, to.holder) {
            if let Some(occupant) = self.swap_candidate(from, to, item, count, available) {
                let incoming = self.item_weight(item);
                let outgoing = self.item_weight(occupant);
                self.check_exchange_capacity(ctx, actor, from, to, incoming, outgoing)?;
                return self.swap(actor, from, to, item, occupant);
            }
        }

        if let HolderRef::Equipment(_) = to.holder {
            if let Some(equipped) = self.peek(to.holder, to.index) {
                if equipped != item && !self.can_merge(equipped, item) && !from_delivery {
                    let incoming = self.moving_weight(item, count);
                    let outgoing = self.item_weight(equipped);
                    self.check_exchange_capacity(ctx, actor, from, to, incoming, outgoing)?;
                    return self.replace_equipped(actor, from, to, item, equipped, count);
                }
            }
        }

        let source_top = self.top_parent(from.holder);
        let dest_top = self.top_parent(to.holder);
        if dest_top == HolderRef::Equipment(actor) && source_top != dest_top {
            let weight = self.moving_weight(item, count);
            if weight > self.remaining_capacity(&*ctx.actors, actor) {
                return Err(MoveError::CapacityExceeded);
            }
        }

        self.standard_move(actor, from, to, item, count)
    }

    /// Proximity and ownership checks for one endpoint, judged by where its
    /// top parent stands.
    fn check_reach(
        &self,
        ctx: &Context<'_>,
        actor: ActorId,
        holder: HolderRef,
        source: bool,
    ) -> Result<(), MoveError> {
        match self.top_parent(holder) {
            HolderRef::Tile(position) => {
                if source || !holder.is_tile() {
                    if !ctx.world.can_reach(actor, position) {
                        return Err(MoveError::NotCloseEnough);
                    }
                } else if !ctx.world.can_throw(actor, position) {
                    return Err(MoveError::OutOfSight);
                }
                Ok(())
            }
            HolderRef::Equipment(owner) if owner == actor => Ok(()),
            HolderRef::Equipment(_) => Err(MoveError::NotPossible),
            HolderRef::Vault(vault) => {
                let entry = self
                    .vault(vault)
                    .ok_or(MoveError::UnknownHolder(HolderRef::Vault(vault)))?;
                if entry.owner != actor || !ctx.world.can_access_vault(actor, vault) {
                    return Err(MoveError::NotPossible);
                }
                Ok(())
            }
            HolderRef::Container(_) => Err(MoveError::NotPossible),
        }
    }

    fn check_movable(&self, item: ItemId) -> Result<(), MoveError> {
        let entry = self.store.get(item).ok_or(MoveError::ItemNotFound)?;
        let movable = self
            .item_types
            .get(entry.type_id)
            .map(|item_type| item_type.movable)
            .unwrap_or(false);
        if !movable || entry.unique_tag.is_some() || self.is_vault_fixture(item) {
            return Err(MoveError::NotMovable);
        }
        Ok(())
    }

    fn moving_weight(&self, item: ItemId, count: u16) -> u32 {
        match self.store.get(item) {
            Some(entry) if entry.count == count => self.item_weight(item),
            Some(entry) => self.units_weight(entry.type_id, count),
            None => 0,
        }
    }

    /// Vault a mail item dropped on `position` should go to, if the tile tops
    /// out in a collection point.
    fn collection_target(&self, position: Position, item: ItemId) -> Option<VaultId> {
        let top = self.tile_peek(position, TOP)?;
        if !self.type_of(top)?.collection_point || !self.type_of(item)?.mail {
            return None;
        }
        self.mail_recipient(item)
    }

    fn post_mail(
        &mut self,
        from: Endpoint,
        item: ItemId,
        count: u16,
        vault: VaultId,
    ) -> Result<MoveOutcome, MoveError> {
        let mail = self.remove_at(from.holder, from.index, count)?;
        self.close_container_tree(mail);
        if let Err(err) = self.deliver_mail(mail, vault) {
            self.restore_at(from.holder, from.index, mail);
            return Err(err);
        }
        Ok(MoveOutcome::Delivered { item, vault })
    }

    /// Drops onto a vault root go to storage; drops onto a slot holding a
    /// container go inside it when the item fits.
    fn redirect_destination(&self, actor: ActorId, item: ItemId, to: Endpoint) -> Result<Endpoint, MoveError> {
        if let HolderRef::Vault(vault) = to.holder {
            let storage = self
                .vault(vault)
                .ok_or(MoveError::UnknownHolder(to.holder))?
                .storage;
            return Ok(Endpoint::container(storage, TOP));
        }
        if to.holder.is_tile() || to.index == TOP {
            return Ok(to);
        }
        let Some(occupant) = self.peek(to.holder, to.index) else {
            return Ok(to);
        };
        if occupant == item || !self.store.is_container(occupant) {
            return Ok(to);
        }
        let nested = HolderRef::Container(occupant);
        if self.check_add(Some(actor), nested, item, TOP).is_ok() {
            tracing::debug!(item = item.0, container = occupant.0, "move redirected into container");
            return Ok(Endpoint::container(occupant, TOP));
        }
        Ok(to)
    }

    /// Occupant to swap with: whole item moving between two plain containers
    /// onto a slot holding another kind.
    fn swap_candidate(
        &self,
        from: Endpoint,
        to: Endpoint,
        item: ItemId,
        count: u16,
        available: u16,
    ) -> Option<ItemId> {
        if to.index == TOP || count != available {
            return None;
        }
        if self.is_delivery_container(from.holder) || self.is_delivery_container(to.holder) {
            return None;
        }
        let occupant = self.peek(to.holder, to.index)?;
        let kind = self.store.get(item)?.type_id;
        let other = self.store.get(occupant)?.type_id;
        (occupant != item && kind != other).then_some(occupant)
    }

    /// Capacity rule for two-way exchanges: only the net weight change on the
    /// actor's own chain counts, since `outgoing` leaves `to` as `incoming`
    /// arrives there.
    fn check_exchange_capacity(
        &self,
        ctx: &Context<'_>,
        actor: ActorId,
        from: Endpoint,
        to: Endpoint,
        incoming: u32,
        outgoing: u32,
    ) -> Result<(), MoveError> {
        let mine = HolderRef::Equipment(actor);
        let incoming = i64::from(incoming);
        let outgoing = i64::from(outgoing);
        let mut delta = 0;
        if self.top_parent(from.holder) == mine {
            delta += outgoing - incoming;
        }
        if self.top_parent(to.holder) == mine {
            delta += incoming - outgoing;
        }
        if delta > i64::from(self.remaining_capacity(&*ctx.actors, actor)) {
            return Err(MoveError::CapacityExceeded);
        }
        Ok(())
    }

    fn swap(
        &mut self,
        actor: ActorId,
        from: Endpoint,
        to: Endpoint,
        item: ItemId,
        occupant: ItemId,
    ) -> Result<MoveOutcome, MoveError> {
        self.check_movable(occupant)?;
        let item_count = self.store.get(item).map(|entry| entry.count).unwrap_or(0);
        let occupant_count = self.store.get(occupant).map(|entry| entry.count).unwrap_or(0);
        let tops = (self.top_parent_of_item(item), self.top_parent_of_item(occupant));

        let first = self.remove_at(from.holder, from.index, item_count)?;
        let second = match self.remove_at(to.holder, to.index, occupant_count) {
            Ok(second) => second,
            Err(err) => {
                self.restore_at(from.holder, from.index, first);
                return Err(err);
            }
        };

        let fits = |world: &Self, holder: HolderRef, index: usize, moving: ItemId, count: u16| {
            world
                .check_add(Some(actor), holder, moving, index)
                .and_then(|room| if room >= count { Ok(()) } else { Err(MoveError::SlotOccupied) })
        };
        let verdict = fits(self, to.holder, to.index, first, item_count)
            .and_then(|_| fits(self, from.holder, from.index, second, occupant_count));
        if let Err(err) = verdict {
            self.restore_at(to.holder, to.index, second);
            self.restore_at(from.holder, from.index, first);
            return Err(err);
        }

        let landed = match self.insert_at(to.holder, to.index, first) {
            Ok(landed) => landed,
            Err(err) => {
                self.restore_at(to.holder, to.index, second);
                self.restore_at(from.holder, from.index, first);
                return Err(err);
            }
        };
        if let Err(err) = self.insert_at(from.holder, from.index, second) {
            match self.remove_at(to.holder, to.index, item_count) {
                Ok(first) => self.restore_at(from.holder, from.index, first),
                Err(undo) => tracing::error!(%undo, "swap rollback lost its first half"),
            }
            self.restore_at(to.holder, to.index, second);
            return Err(err);
        }

        if tops.0 != self.top_parent_of_item(landed) {
            self.close_container_tree(landed);
        }
        if tops.1 != self.top_parent_of_item(second) {
            self.close_container_tree(second);
        }
        Ok(MoveOutcome::Swapped {
            item: landed,
            displaced: second,
        })
    }

    fn replace_equipped(
        &mut self,
        actor: ActorId,
        from: Endpoint,
        to: Endpoint,
        item: ItemId,
        equipped: ItemId,
        count: u16,
    ) -> Result<MoveOutcome, MoveError> {
        self.check_movable(equipped)?;
        let available = self.store.get(item).map(|entry| entry.count).unwrap_or(count);
        let equipped_count = self.store.get(equipped).map(|entry| entry.count).unwrap_or(0);
        let back_index = if count == available { from.index } else { TOP };
        let source_top = self.top_parent(from.holder);

        let incoming = self.remove_at(from.holder, from.index, count)?;
        let outgoing = match self.remove_at(to.holder, to.index, equipped_count) {
            Ok(outgoing) => outgoing,
            Err(err) => {
                self.restore_at(from.holder, from.index, incoming);
                return Err(err);
            }
        };

        let verdict = self
            .check_add(Some(actor), to.holder, incoming, to.index)
            .and_then(|room| if room >= count { Ok(()) } else { Err(MoveError::SlotOccupied) })
            .and_then(|_| self.check_add(Some(actor), from.holder, outgoing, back_index))
            .and_then(|room| if room >= equipped_count { Ok(()) } else { Err(MoveError::NotPossible) });
        if let Err(err) = verdict {
            self.restore_at(to.holder, to.index, outgoing);
            self.restore_at(from.holder, from.index, incoming);
            return Err(err);
        }

        let landed = match self.insert_at(to.holder, to.index, incoming) {
            Ok(landed) => landed,
            Err(err) => {
                self.restore_at(to.holder, to.index, outgoing);
                self.restore_at(from.holder, from.index, incoming);
                return Err(err);
            }
        };
        let returned = match self.insert_at(from.holder, back_index, outgoing) {
            Ok(returned) => returned,
            Err(err) => {
                match self.remove_at(to.holder, to.index, count) {
                    Ok(incoming) => self.restore_at(from.holder, from.index, incoming),
                    Err(undo) => tracing::error!(%undo, "equip rollback lost the incoming item"),
                }
                self.restore_at(to.holder, to.index, outgoing);
                return Err(err);
            }
        };

        if source_top != HolderRef::Equipment(actor) {
            self.close_container_tree(returned);
        }
        Ok(MoveOutcome::Replaced {
            item: landed,
            unequipped: returned,
        })
    }

    fn standard_move(
        &mut self,
        actor: ActorId,
        from: Endpoint,
        to: Endpoint,
        item: ItemId,
        count: u16,
    ) -> Result<MoveOutcome, MoveError> {
        let room = self.check_add(Some(actor), to.holder, item, to.index)?;
        let count = count.min(room);
        if count == 0 {
            return Err(MoveError::CannotAddHere);
        }
        let previous_top = self.top_parent_of_item(item);

        let moving = self.remove_at(from.holder, from.index, count)?;
        let landed = match self.insert_at(to.holder, to.index, moving) {
            Ok(landed) => landed,
            Err(err) => {
                self.restore_at(from.holder, from.index, moving);
                return Err(err);
            }
        };
        if self.store.is_container(landed) && previous_top != self.top_parent_of_item(landed) {
            self.close_container_tree(landed);
        }
        Ok(MoveOutcome::Moved {
            item: landed,
            to,
            count,
        })
    }
}
