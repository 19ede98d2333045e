//! Combat
//!
//! Damage, deaths and respawns. Damage is refused on safe stages and
//! between teammates. A kill is credited exactly once: only the hit that
//! takes health from positive to zero or below counts.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, error, info};

use crate::core::Shape;
use crate::game::actor::{ActorRef, Location};
use crate::game::events::Update;
use crate::game::movement;
use crate::game::npc::NonPlayer;
use crate::game::player::Player;
use crate::game::world::World;
use crate::grid::stage::Stage;
use crate::persistence::KillEvent;

/// Hit `target` for `damage` on behalf of `initiator`. Returns true if the
/// hit killed it.
pub fn take_damage(world: &Arc<World>, target: &ActorRef, initiator: &ActorRef, damage: i32) -> bool {
    let Some(location) = target.location() else {
        return false;
    };
    if location.stage.is_safe() || target.team() == initiator.team() {
        return false;
    }

    if !target.mobile().damage(damage) {
        if let ActorRef::Player(player) = target {
            player.send_stats();
        }
        return false;
    }

    credit_kill(world, initiator, target, &location);
    kill(world, target);
    true
}

fn credit_kill(world: &Arc<World>, killer: &ActorRef, victim: &ActorRef, at: &Location) {
    killer.mobile().record_kill();
    if let ActorRef::Player(player) = killer {
        world.record_streak(player);
        world.save_record(player);
        player.send_stats();
    }

    info!(
        "{} killed {} on {} ({}, {})",
        killer.name(),
        victim.name(),
        at.stage.name(),
        at.y(),
        at.x()
    );
    let event = KillEvent {
        killer: killer.id(),
        killer_name: killer.name(),
        victim: victim.id(),
        victim_name: victim.name(),
        stage: at.stage.name().to_string(),
        y: at.y(),
        x: at.x(),
        at: Utc::now(),
    };
    world.persist("kill event", move |store| store.save_kill_event(&event));
}

/// Kill `actor` outright: players drop coins and respawn, non-players are
/// removed from the world.
pub fn kill(world: &Arc<World>, actor: &ActorRef) {
    match actor {
        ActorRef::Player(player) => handle_death(world, player),
        ActorRef::Npc(npc) => remove_npc(world, npc),
    }
}

fn handle_death(world: &Arc<World>, player: &Arc<Player>) {
    let config = world.config();
    let dropped = player.halve_money().max(config.death_drop_minimum);
    let actor = ActorRef::Player(Arc::clone(player));

    if let Some(previous) = movement::detach(&actor) {
        previous.tile().add_money(dropped);
        previous.stage.publish_tile(previous.index);
        previous.stage.broadcast(Update::sound("death"));
    }

    player.record_death();
    player.mobile().set_health(config.player_health);
    player.mobile().reset_streak();
    world.record_streak(player);
    world.save_record(player);

    respawn(world, player);
    player.send_stats();
}

fn respawn(world: &Arc<World>, player: &Arc<Player>) {
    if !player.is_tangible() {
        debug!("{} left before respawning", player.username());
        return;
    }
    let config = world.config();
    let actor = ActorRef::Player(Arc::clone(player));
    let Some(stage) = world.fetch_stage(&actor, &config.respawn_stage) else {
        error!("Respawn stage {} is unavailable", config.respawn_stage);
        return;
    };
    match Location::at(&stage, config.respawn_y, config.respawn_x) {
        Some(dest) => {
            movement::place(world, &actor, &dest);
        }
        None => error!(
            "Respawn point ({}, {}) is outside {}",
            config.respawn_y, config.respawn_x, config.respawn_stage
        ),
    }
}

fn remove_npc(world: &Arc<World>, npc: &Arc<NonPlayer>) {
    npc.cancel();
    if let Some(previous) = movement::detach(&ActorRef::Npc(Arc::clone(npc))) {
        previous.stage.broadcast(Update::sound("clink"));
    }
    world.remove_npc(npc.id());
}

/// Damage every other actor on the given cells of `stage`, flashing the
/// affected tiles. Returns the number of kills.
pub fn damage_area(
    world: &Arc<World>,
    initiator: &ActorRef,
    stage: &Stage,
    cells: impl IntoIterator<Item = (i32, i32)>,
    damage: i32,
) -> usize {
    let mut flashed = Vec::new();
    let mut kills = 0;
    for (y, x) in cells {
        let Some(tile) = stage.tile(y, x) else {
            continue;
        };
        flashed.push((tile.y(), tile.x()));
        for occupant in tile.occupants() {
            if occupant.id() == initiator.id() {
                continue;
            }
            if take_damage(world, &occupant, initiator, damage) {
                kills += 1;
            }
        }
    }
    stage.broadcast(Update::Flash { tiles: flashed });
    kills
}

/// Fire the actor's power. Players spend their newest power-up; non-players
/// lash out with a random square.
pub fn activate_power(world: &Arc<World>, actor: &ActorRef) -> bool {
    let Some(location) = actor.location() else {
        return false;
    };
    let shape = match actor {
        ActorRef::Player(player) => {
            let Some(shape) = player.pop_power() else {
                return false;
            };
            player.send_stats();
            shape
        }
        ActorRef::Npc(_) => {
            if world.one_in(2) {
                Shape::square(4)
            } else {
                Shape::square(2)
            }
        }
    };

    location.stage.broadcast(Update::sound("explosion"));
    let cells: Vec<(i32, i32)> = shape
        .around(location.y() as i32, location.x() as i32)
        .collect();
    damage_area(world, actor, &location.stage, cells, world.config().power_damage);
    true
}

/// Delayed trap blast credited to `owner`. Ignored once the owner has left.
pub fn blast(
    world: &Arc<World>,
    owner: &Arc<Player>,
    stage: &Stage,
    index: usize,
    radius: i32,
    damage: i32,
) -> bool {
    if !owner.is_tangible() {
        return false;
    }
    let (y, x) = ((index / stage.width()) as i32, (index % stage.width()) as i32);
    let cells: Vec<(i32, i32)> = Shape::square(radius).around(y, x).collect();
    damage_area(world, &ActorRef::Player(Arc::clone(owner)), stage, cells, damage);
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WorldConfig;
    use crate::game::actor::Team;
    use crate::grid::area::Catalog;
    use crate::grid::material::Material;
    use crate::persistence::MemoryStore;
    use crate::game::reactions::ReactionTable;
    use tokio::sync::mpsc;

    fn world() -> (Arc<World>, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let mut config = WorldConfig::default();
        config.respawn_stage = "clinic".to_string();
        config.respawn_y = 1;
        config.respawn_x = 1;
        let world = World::new(config, Catalog::default(), ReactionTable::standard(), store.clone());
        world.insert_stage(Stage::filled("clinic", 3, 3, Material::floor("tile"), world.config()).with_safe(true));
        world.insert_stage(Stage::filled("arena", 9, 9, Material::floor("sand"), world.config()));
        (world, store)
    }

    fn join(world: &Arc<World>, name: &str, team: Team, y: i32, x: i32) -> Arc<Player> {
        let (tx, _rx) = mpsc::unbounded_channel();
        let player = Player::new(name, team, world.config(), tx);
        world.join_at(&player, "arena", y, x).unwrap();
        player
    }

    #[test]
    fn test_teammates_and_safe_stages_take_no_damage() {
        let (world, _) = world();
        let ada = join(&world, "ada", Team::SkyBlue, 1, 1);
        let bo = join(&world, "bo", Team::SkyBlue, 1, 2);
        assert!(!take_damage(&world, &ActorRef::from(Arc::clone(&bo)), &ActorRef::from(Arc::clone(&ada)), 500));
        assert_eq!(bo.mobile().health(), world.config().player_health);

        let (tx, _rx) = mpsc::unbounded_channel();
        let cy = Player::new("cy", Team::Fuchsia, world.config(), tx);
        world.join_at(&cy, "clinic", 0, 0).unwrap();
        assert!(!take_damage(&world, &ActorRef::from(Arc::clone(&cy)), &ActorRef::from(ada), 500));
        assert_eq!(cy.mobile().health(), world.config().player_health);
    }

    #[test]
    fn test_kill_credits_once_and_respawns() {
        let (world, store) = world();
        let ada = join(&world, "ada", Team::SkyBlue, 4, 4);
        let bo = join(&world, "bo", Team::Fuchsia, 4, 5);
        bo.add_money(6);
        let killer = ActorRef::from(Arc::clone(&ada));
        let victim = ActorRef::from(Arc::clone(&bo));

        assert!(!take_damage(&world, &victim, &killer, 100));
        assert!(take_damage(&world, &victim, &killer, 100));

        assert_eq!(ada.mobile().kill_streak(), 1);
        assert_eq!(ada.mobile().kill_count(), 1);
        assert_eq!(bo.deaths(), 1);
        assert_eq!(bo.money(), 3);
        assert_eq!(bo.mobile().health(), world.config().player_health);
        assert_eq!(bo.mobile().location().unwrap().stage.name(), "clinic");

        let arena = world.stages().get("arena").unwrap();
        assert_eq!(arena.tile(4, 5).unwrap().loot().money, world.config().death_drop_minimum);
        assert!(!arena.has_player(bo.id()));

        assert_eq!(world.leaderboard().peek(), Some((ada.id(), 1)));
        let events = store.kill_events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].victim, bo.id());
        assert_eq!(store.record(ada.id()).unwrap().kill_count, 1);
    }

    #[test]
    fn test_power_hits_area() {
        let (world, _) = world();
        let ada = join(&world, "ada", Team::SkyBlue, 4, 4);
        let bo = join(&world, "bo", Team::Fuchsia, 4, 5);
        let far = join(&world, "far", Team::Fuchsia, 8, 8);
        let actor = ActorRef::from(Arc::clone(&ada));

        assert!(!activate_power(&world, &actor));
        ada.push_power(Shape::cross());
        assert!(activate_power(&world, &actor));

        let hit = world.config().player_health - world.config().power_damage;
        assert_eq!(bo.mobile().health(), hit);
        assert_eq!(far.mobile().health(), world.config().player_health);
        assert_eq!(ada.mobile().health(), world.config().player_health);
        assert_eq!(ada.power_count(), 0);
    }

    #[test]
    fn test_npc_death_removes_it() {
        let (world, _) = world();
        let ada = join(&world, "ada", Team::SkyBlue, 2, 2);
        let npc = world.spawn_npc("arena", 2, 3, Team::Unaligned).unwrap();
        assert_eq!(world.npc_count(), 1);

        assert!(take_damage(
            &world,
            &ActorRef::from(Arc::clone(&npc)),
            &ActorRef::from(Arc::clone(&ada)),
            world.config().npc_health
        ));
        assert!(npc.is_cancelled());
        assert!(npc.mobile().location().is_none());
        assert_eq!(world.npc_count(), 0);
        assert_eq!(ada.mobile().kill_streak(), 1);
    }

    #[test]
    fn test_blast_ignored_after_owner_leaves() {
        let (world, _) = world();
        let ada = join(&world, "ada", Team::SkyBlue, 0, 0);
        let bo = join(&world, "bo", Team::Fuchsia, 4, 4);
        let arena = world.stages().get("arena").unwrap();
        let index = arena.index_of(4, 4).unwrap();

        assert!(blast(&world, &ada, &arena, index, 2, 30));
        assert_eq!(bo.mobile().health(), world.config().player_health - 30);

        world.disconnect(&ada);
        assert!(!blast(&world, &ada, &arena, index, 2, 30));
        assert_eq!(bo.mobile().health(), world.config().player_health - 30);
    }
}
