//! Teleport Resolver
//!
//! A teleport link on a tile bypasses normal collision. Objects pushed into
//! it are delivered one step past the destination in the push direction;
//! actors stepping on it land exactly on the destination. Both are single
//! hop: a link at the landing tile is not followed.

use std::sync::Arc;

use thiserror::Error;

use crate::game::actor::{ActorRef, Location};
use crate::game::world::World;
use crate::grid::interactable::Interactable;
use crate::grid::tile::Teleport;

/// Teleport resolution failures.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TeleportError {
    /// Link refuses actors.
    #[error("teleport link rejects actors")]
    Rejected,

    /// Destination stage cannot be loaded for this actor.
    #[error("teleport destination stage {0} is unavailable")]
    UnknownStage(String),

    /// Destination coordinates are outside the stage.
    #[error("invalid teleport destination {stage} ({y}, {x})")]
    InvalidDestination {
        /// Stage name.
        stage: String,
        /// Row.
        y: i32,
        /// Column.
        x: i32,
    },
}

/// Where an actor stepping onto `link` lands.
pub fn actor_destination(
    world: &Arc<World>,
    actor: &ActorRef,
    link: &Teleport,
) -> Result<Location, TeleportError> {
    if link.reject_actor {
        return Err(TeleportError::Rejected);
    }
    let stage = world
        .fetch_stage(actor, &link.dest_stage)
        .ok_or_else(|| TeleportError::UnknownStage(link.dest_stage.clone()))?;
    Location::at(&stage, link.dest_y, link.dest_x).ok_or_else(|| TeleportError::InvalidDestination {
        stage: link.dest_stage.clone(),
        y: link.dest_y,
        x: link.dest_x,
    })
}

/// Where `incoming`, pushed by `(dy, dx)` into `link`, should land. `None`
/// means the push fails.
pub fn object_destination(
    world: &Arc<World>,
    actor: &ActorRef,
    link: &Teleport,
    incoming: Option<&Interactable>,
    dy: i32,
    dx: i32,
) -> Option<Location> {
    if link.reject_interactable {
        return None;
    }
    let item = incoming?;
    if !item.can_teleport() {
        return None;
    }
    let stage = world.fetch_stage(actor, &link.dest_stage)?;
    Location::at(&stage, link.dest_y + dy, link.dest_x + dx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WorldConfig;
    use crate::game::actor::Team;
    use crate::game::npc::NonPlayer;
    use crate::grid::area::Catalog;
    use crate::grid::material::Material;
    use crate::grid::stage::Stage;

    fn world() -> Arc<World> {
        let world = World::in_memory(WorldConfig::default(), Catalog::default());
        world.insert_stage(Stage::filled("annex", 4, 4, Material::floor("tile"), world.config()));
        world
    }

    fn link(y: i32, x: i32) -> Teleport {
        Teleport {
            dest_stage: "annex".to_string(),
            dest_y: y,
            dest_x: x,
            reject_interactable: false,
            reject_actor: false,
        }
    }

    #[test]
    fn test_actor_destination() {
        let world = world();
        let npc: ActorRef = NonPlayer::new(Team::Unaligned, 10).into();

        let dest = actor_destination(&world, &npc, &link(1, 2)).unwrap();
        assert_eq!((dest.y(), dest.x()), (1, 2));
        assert_eq!(dest.stage.name(), "annex");
    }

    #[test]
    fn test_actor_destination_errors() {
        let world = world();
        let npc: ActorRef = NonPlayer::new(Team::Unaligned, 10).into();

        let mut rejecting = link(1, 1);
        rejecting.reject_actor = true;
        assert_eq!(actor_destination(&world, &npc, &rejecting), Err(TeleportError::Rejected));

        assert!(matches!(
            actor_destination(&world, &npc, &link(9, 1)),
            Err(TeleportError::InvalidDestination { y: 9, .. })
        ));

        let mut missing = link(0, 0);
        missing.dest_stage = "nowhere".to_string();
        assert_eq!(
            actor_destination(&world, &npc, &missing),
            Err(TeleportError::UnknownStage("nowhere".to_string()))
        );
    }

    #[test]
    fn test_object_destination_offsets_by_push() {
        let world = world();
        let npc: ActorRef = NonPlayer::new(Team::Unaligned, 10).into();
        let ball = Interactable::ball(Team::Fuchsia);

        let dest = object_destination(&world, &npc, &link(1, 1), Some(&ball), 0, 1).unwrap();
        assert_eq!((dest.y(), dest.x()), (1, 2));

        assert!(object_destination(&world, &npc, &link(1, 3), Some(&ball), 0, 1).is_none());
        assert!(object_destination(&world, &npc, &link(1, 1), None, 0, 1).is_none());

        let mut stubborn = Interactable::ball(Team::Fuchsia);
        stubborn.reject_teleport = true;
        assert!(object_destination(&world, &npc, &link(1, 1), Some(&stubborn), 0, 1).is_none());
    }
}
