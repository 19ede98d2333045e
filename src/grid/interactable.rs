//! Interactables
//!
//! Movable or reactive objects. Exactly one tile slot owns an interactable
//! at a time; pushes move the value between slots and never clone it.

use std::sync::Arc;

use crate::game::actor::Team;
use crate::game::reactions::Reaction;

/// An object occupying a tile's interactable slot.
#[derive(Debug)]
pub struct Interactable {
    /// Identity used by reaction predicates ("ball-fuchsia", "ring-small").
    pub name: String,
    /// Can be shoved one tile further by an incoming push.
    pub pushable: bool,
    /// Can an actor stand on the tile while this object occupies it.
    pub walkable: bool,
    /// Destroyed by area effects that clear fragile objects.
    pub fragile: bool,
    /// Refuses to pass through teleport links.
    pub reject_teleport: bool,
    /// Ordered reactions; the lowest index whose predicate matches wins.
    pub reactions: Arc<[Reaction]>,
}

impl Interactable {
    /// A plain object with no reactions.
    pub fn new(name: impl Into<String>, pushable: bool) -> Self {
        Self {
            name: name.into(),
            pushable,
            walkable: false,
            fragile: false,
            reject_teleport: false,
            reactions: Arc::from(Vec::new()),
        }
    }

    /// A pushable ball belonging to `team`.
    pub fn ball(team: Team) -> Self {
        Self::new(format!("ball-{}", team.as_str()), true)
    }

    /// A pushable ring. Big rings hit harder when armed.
    pub fn ring(big: bool) -> Self {
        let name = if big { "ring-big" } else { "ring-small" };
        Self::new(name, true)
    }

    /// Builder: attach a reaction list.
    pub fn with_reactions(mut self, reactions: Arc<[Reaction]>) -> Self {
        self.reactions = reactions;
        self
    }

    /// Builder: mark walkable.
    pub fn walkable(mut self) -> Self {
        self.walkable = true;
        self
    }

    /// Builder: mark fragile.
    pub fn fragile(mut self) -> Self {
        self.fragile = true;
        self
    }

    /// True if reaction list is non-empty.
    pub fn is_reactive(&self) -> bool {
        !self.reactions.is_empty()
    }

    /// Name begins with `ball-`.
    pub fn is_ball(&self) -> bool {
        self.name.starts_with("ball-")
    }

    /// Name begins with `ring-`.
    pub fn is_ring(&self) -> bool {
        self.name.starts_with("ring-")
    }

    /// Can this object travel through a teleport link.
    pub fn can_teleport(&self) -> bool {
        !self.reject_teleport
    }
}
