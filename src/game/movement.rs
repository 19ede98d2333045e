//! Movement/Push Engine
//!
//! Moves actors and shoves interactables along chains of tiles. A chain
//! only ever `try_lock`s interactable slots, so two chains meeting head on
//! both fail instead of deadlocking. Nothing is retried: contention is a
//! silent no-op, like walking into a wall.
//!
//! A chain commits tail first. Every slot taken along the way stays locked
//! until the recursive call below it returns, and an object taken out of a
//! slot is put back if the rest of the chain fails.
//!
//! ```text
//!   actor ──► [ball] ──► [ball] ──► [empty]     commits right to left
//!   actor ──► [ball] ──► [ball] ──► [wall]      nothing moves
//! ```

use std::sync::Arc;

use tracing::{debug, error, warn};

use crate::core::{Direction, Shape};
use crate::game::actor::{ActorRef, Location, Team};
use crate::game::combat;
use crate::game::command::{dispatch, Command};
use crate::game::events::Update;
use crate::game::player::Player;
use crate::game::reactions::{Deferred, ReactionContext};
use crate::game::scheduler;
use crate::game::teleport;
use crate::game::world::World;
use crate::grid::area::SpawnAction;
use crate::grid::interactable::Interactable;
use crate::grid::stage::Stage;
use crate::grid::tile::Teleport;

// =============================================================================
// Push chain
// =============================================================================

/// One push and the effects it queued.
struct PushChain<'a> {
    world: &'a Arc<World>,
    actor: &'a ActorRef,
    deferred: Vec<Deferred>,
}

impl<'a> PushChain<'a> {
    fn new(world: &'a Arc<World>, actor: &'a ActorRef) -> Self {
        Self {
            world,
            actor,
            deferred: Vec::new(),
        }
    }

    fn next(&self, from: &Location, dy: i32, dx: i32) -> Option<Location> {
        relative(self.world, self.actor, from, dy, dx)
    }

    /// Push `incoming` into `target`. On failure the incoming object is
    /// handed back untouched.
    fn push(
        &mut self,
        target: &Location,
        incoming: Option<Interactable>,
        dy: i32,
        dx: i32,
    ) -> Result<(), Option<Interactable>> {
        if let Some(link) = target.tile().teleport() {
            return match teleport::object_destination(
                self.world,
                self.actor,
                &link,
                incoming.as_ref(),
                dy,
                dx,
            ) {
                Some(dest) => self.resolve(&dest, incoming, dy, dx),
                None => Err(incoming),
            };
        }
        self.resolve(target, incoming, dy, dx)
    }

    /// Settle `incoming` into the slot at `target`, ignoring any teleport
    /// link there.
    fn resolve(
        &mut self,
        target: &Location,
        incoming: Option<Interactable>,
        dy: i32,
        dx: i32,
    ) -> Result<(), Option<Interactable>> {
        let tile = target.tile();
        let Some(mut slot) = tile.try_slot() else {
            return Err(incoming);
        };

        let Some(mut existing) = slot.take() else {
            if incoming.is_none() {
                return Ok(());
            }
            if !tile.material().walkable {
                return Err(incoming);
            }
            *slot = incoming;
            target.stage.publish_tile_with(target.index, &slot);
            return Ok(());
        };

        if existing.is_reactive() {
            // Non-players cannot trigger reactions, so reactive objects
            // are immovable for them.
            if !self.actor.is_player() {
                *slot = Some(existing);
                return Err(incoming);
            }

            let reactions = Arc::clone(&existing.reactions);
            let team = self.actor.team();
            if let Some(reaction) = reactions
                .iter()
                .find(|reaction| reaction.when.matches(incoming.as_ref(), team))
            {
                let (outgoing, onward) = {
                    let mut ctx = ReactionContext {
                        world: self.world,
                        actor: self.actor,
                        stage: &target.stage,
                        index: target.index,
                        existing: &mut existing,
                        deferred: &mut self.deferred,
                    };
                    reaction.then.apply(incoming, &mut ctx)
                };
                let result = match (onward, outgoing) {
                    (true, outgoing) => match self.next(target, dy, dx) {
                        Some(next) => self.push(&next, outgoing, dy, dx),
                        None => Err(outgoing),
                    },
                    (false, None) => Ok(()),
                    // Handled but refused: the object stays with the pusher.
                    (false, Some(refused)) => Err(Some(refused)),
                };
                *slot = Some(existing);
                target.stage.publish_tile_with(target.index, &slot);
                return result;
            }
        }

        if existing.pushable {
            if let Some(next) = self.next(target, dy, dx) {
                return match self.push(&next, Some(existing), dy, dx) {
                    Ok(()) => {
                        *slot = incoming;
                        target.stage.publish_tile_with(target.index, &slot);
                        Ok(())
                    }
                    Err(back) => {
                        *slot = back;
                        Err(incoming)
                    }
                };
            }
        }

        *slot = Some(existing);
        Err(incoming)
    }

    /// Run queued effects once every slot lock is released.
    fn finish(self) {
        let Self {
            world,
            actor,
            deferred,
        } = self;
        for effect in deferred {
            run_deferred(world, actor, effect);
        }
    }
}

// =============================================================================
// Public entry points
// =============================================================================

/// Push `incoming` into `target` in direction `(dy, dx)` on behalf of
/// `actor`. On failure the incoming object is returned.
pub fn push(
    world: &Arc<World>,
    actor: &ActorRef,
    target: &Location,
    incoming: Option<Interactable>,
    dy: i32,
    dx: i32,
) -> Result<(), Option<Interactable>> {
    let mut chain = PushChain::new(world, actor);
    let result = chain.push(target, incoming, dy, dx);
    chain.finish();
    result
}

/// One step in `direction`.
pub fn step(world: &Arc<World>, actor: &ActorRef, direction: Direction) -> bool {
    let (dy, dx) = direction.offset();
    move_by(world, actor, dy, dx)
}

/// Move by `(dy, dx)`: evacuate the source tile, push into the
/// destination, then transfer if the destination is walkable.
pub fn move_by(world: &Arc<World>, actor: &ActorRef, dy: i32, dx: i32) -> bool {
    shift(world, actor, dy, dx, true)
}

fn shift(world: &Arc<World>, actor: &ActorRef, dy: i32, dx: i32, evacuate: bool) -> bool {
    let Some(source) = actor.location() else {
        return false;
    };
    let mut chain = PushChain::new(world, actor);
    if evacuate {
        // A failed evacuation leaves the object behind; the step goes on.
        let _ = chain.push(&source, None, dy, dx);
    }

    let moved = match chain.next(&source, dy, dx) {
        Some(dest) => {
            let _ = chain.push(&dest, None, dy, dx);
            dest.tile().walkable() && transfer(world, actor, &source, &dest)
        }
        None => false,
    };
    chain.finish();
    moved
}

/// Push whatever shares the actor's tile one tile in `direction`.
pub fn push_under(world: &Arc<World>, actor: &ActorRef, direction: Direction) -> bool {
    let Some(source) = actor.location() else {
        return false;
    };
    if source.tile().interactable_name().is_none() {
        return false;
    }
    let (dy, dx) = direction.offset();
    push(world, actor, &source, None, dy, dx).is_ok()
}

/// Spend a boost to push-under and jump two tiles; a normal step without
/// boosts.
pub fn boost(world: &Arc<World>, player: &Arc<Player>, direction: Direction) -> bool {
    let actor = ActorRef::Player(Arc::clone(player));
    if !player.use_boost() {
        return step(world, &actor, direction);
    }
    player.send_stats();
    let (dy, dx) = direction.scaled(2);
    if let Some(source) = actor.location() {
        let _ = push(world, &actor, &source, None, dy, dx);
    }
    move_by(world, &actor, dy, dx)
}

/// Cycle the four neighbours' interactables around the actor. All four
/// slots must be free to lock, hold movable objects, and every object must
/// land on a walkable material; otherwise nothing changes.
pub fn rotate(actor: &ActorRef, clockwise: bool) -> bool {
    let Some(source) = actor.location() else {
        return false;
    };
    let order = if clockwise {
        [Direction::North, Direction::East, Direction::South, Direction::West]
    } else {
        [Direction::North, Direction::West, Direction::South, Direction::East]
    };

    let mut ring = Vec::with_capacity(order.len());
    for direction in order {
        let (dy, dx) = direction.offset();
        match source.stage.relative(source.index, dy, dx) {
            Some(index) => ring.push(index),
            None => return false,
        }
    }

    let mut slots = Vec::with_capacity(ring.len());
    for &index in &ring {
        match source.stage.tile_at(index).try_slot() {
            Some(slot) => slots.push(slot),
            None => return false,
        }
    }

    for (i, slot) in slots.iter().enumerate() {
        let Some(item) = slot.as_ref() else {
            continue;
        };
        let landing = source.stage.tile_at(ring[(i + 1) % ring.len()]);
        if !item.pushable || !landing.material().walkable {
            return false;
        }
    }

    let items: Vec<Option<Interactable>> = slots.iter_mut().map(|slot| slot.take()).collect();
    for (i, item) in items.into_iter().enumerate() {
        *slots[(i + 1) % ring.len()] = item;
    }
    for (slot, &index) in slots.iter().zip(&ring) {
        source.stage.publish_tile_with(index, slot);
    }
    drop(slots);

    debug!("{} rotated on {}", actor.name(), source.stage.name());
    true
}

/// Location `(dy, dx)` from `from`, crossing into a neighbouring stage
/// when stepping off an edge that has one.
pub fn relative(
    world: &Arc<World>,
    actor: &ActorRef,
    from: &Location,
    dy: i32,
    dx: i32,
) -> Option<Location> {
    let stage = &from.stage;
    let y = from.y() as i32 + dy;
    let x = from.x() as i32 + dx;
    if let Some(index) = stage.index_of(y, x) {
        return Some(Location::new(Arc::clone(stage), index));
    }

    let (height, width) = (stage.height() as i32, stage.width() as i32);
    let off_rows = y < 0 || y >= height;
    let off_cols = x < 0 || x >= width;
    if off_rows && off_cols {
        return None;
    }
    let direction = if y < 0 {
        Direction::North
    } else if y >= height {
        Direction::South
    } else if x < 0 {
        Direction::West
    } else {
        Direction::East
    };

    let name = stage.neighbors().toward(direction)?;
    let next = world.fetch_stage(actor, name)?;
    let (ny, nx) = match direction {
        Direction::North => (next.height() as i32 + y, x),
        Direction::South => (y - height, x),
        Direction::West => (y, next.width() as i32 + x),
        Direction::East => (y, x - width),
    };
    Location::at(&next, ny, nx)
}

// =============================================================================
// Actor placement
// =============================================================================

/// Move `actor` from `source` onto `dest`. A teleport link on `dest`
/// redirects the actor instead.
pub fn transfer(world: &Arc<World>, actor: &ActorRef, source: &Location, dest: &Location) -> bool {
    match dest.tile().teleport() {
        Some(link) => teleport_actor(world, actor, source, &link),
        None => relocate(world, actor, source, dest),
    }
}

/// Send `actor` through `link` from `source`. Destinations outside the
/// target stage are configuration errors.
pub fn teleport_actor(world: &Arc<World>, actor: &ActorRef, source: &Location, link: &Teleport) -> bool {
    match teleport::actor_destination(world, actor, link) {
        Ok(dest) => relocate(world, actor, source, &dest),
        Err(teleport::TeleportError::Rejected) => false,
        Err(e) => {
            error!("{} cannot teleport: {}", actor.name(), e);
            false
        }
    }
}

/// Move an actor between tiles without collision or teleport checks.
pub fn relocate(world: &Arc<World>, actor: &ActorRef, source: &Location, dest: &Location) -> bool {
    {
        let mut position = actor.mobile().position();
        if position.as_ref() != Some(source) {
            return false;
        }
        if !source.tile().remove_occupant(actor.id()) {
            warn!("{} missing from its tile {:?}", actor.name(), source);
            return false;
        }
        if let ActorRef::Player(player) = actor {
            if !source.same_stage(dest) {
                source.stage.remove_player(player.id());
                dest.stage.add_player(Arc::clone(player));
            }
        }
        dest.tile().add_occupant(actor.clone());
        *position = Some(dest.clone());
    }

    source.stage.publish_tile(source.index);
    arrive(world, actor, Some(source), dest);
    true
}

/// Put a detached actor on `dest`. Returns false if it is already placed.
pub fn place(world: &Arc<World>, actor: &ActorRef, dest: &Location) -> bool {
    {
        let mut position = actor.mobile().position();
        if position.is_some() {
            warn!("{} is already placed", actor.name());
            return false;
        }
        dest.tile().add_occupant(actor.clone());
        if let ActorRef::Player(player) = actor {
            dest.stage.add_player(Arc::clone(player));
        }
        *position = Some(dest.clone());
    }
    arrive(world, actor, None, dest);
    true
}

/// Take an actor off its tile, stage and camera zone. Returns where it was.
pub fn detach(actor: &ActorRef) -> Option<Location> {
    let previous = {
        let mut position = actor.mobile().position();
        let previous = position.take()?;
        previous.tile().remove_occupant(actor.id());
        if let ActorRef::Player(player) = actor {
            previous.stage.remove_player(player.id());
            player.camera().drop_view();
        }
        previous
    };
    previous.stage.publish_tile(previous.index);
    Some(previous)
}

/// Camera, loot and spawn bookkeeping after an actor lands on `dest`.
///
/// Skipped for a player that has already left `dest` again, e.g. killed and
/// respawned between the transfer and this call.
fn arrive(world: &Arc<World>, actor: &ActorRef, source: Option<&Location>, dest: &Location) {
    if let ActorRef::Player(player) = actor {
        let entered_stage = {
            // Lock order: position, then camera view.
            let position = player.mobile().position();
            if position.as_ref() != Some(dest) {
                debug!("{} moved on before arriving at {:?}", actor.name(), dest);
                dest.stage.publish_tile(dest.index);
                return;
            }
            let camera = player.camera();
            let entered_stage = match source {
                Some(source) if source.same_stage(dest) => {
                    camera.track(dest);
                    false
                }
                _ => {
                    if source.is_some() {
                        camera.drop_view();
                    }
                    camera.set_view(dest);
                    true
                }
            };
            pick_up_loot(player, dest);
            entered_stage
        };
        if entered_stage {
            run_spawn_action(world, &dest.stage);
        }
        if let Some(text) = &dest.tile().material().display_text {
            player.send(Update::message(text.clone()));
        }
    }
    dest.stage.publish_tile(dest.index);
}

fn pick_up_loot(player: &Player, at: &Location) {
    let loot = at.tile().take_loot();
    if loot.is_empty() {
        return;
    }
    player.add_money(loot.money);
    player.add_boosts(loot.boosts);
    if let Some(shape) = loot.power {
        player.push_power(shape);
    }
    player.send_stats();
}

/// Drop items on a stage a player just entered.
pub fn run_spawn_action(world: &Arc<World>, stage: &Arc<Stage>) {
    let boost_drop = world.config().boost_drop;
    match stage.spawn_action() {
        SpawnAction::None => {}
        SpawnAction::Basic => {
            let roll = world.random_index(30);
            let heads = roll % 2 == 0;
            let (covered, uncovered) = stage.walkable_tiles();
            for (wanted, group) in [(roll % 3 == 0, covered), (roll % 7 == 0, uncovered)] {
                if !wanted || group.is_empty() {
                    continue;
                }
                let index = group[world.random_index(group.len())];
                let tile = stage.tile_at(index);
                if heads {
                    tile.set_power(random_power(world));
                } else {
                    tile.add_boosts(boost_drop);
                }
                stage.publish_tile(index);
            }
        }
        SpawnAction::Boosts { y, x } => {
            if let Some(index) = stage.index_of(*y as i32, *x as i32) {
                stage.tile_at(index).add_boosts(boost_drop);
                stage.publish_tile(index);
            }
        }
        SpawnAction::Power { y, x, radius } => {
            if let Some(index) = stage.index_of(*y as i32, *x as i32) {
                stage.tile_at(index).set_power(Shape::square(*radius));
                stage.publish_tile(index);
            }
        }
    }
}

fn random_power(world: &World) -> Shape {
    let shapes = [
        Shape::square(4),
        Shape::square(1),
        Shape::square(2),
        Shape::square(3),
        Shape::jump_cross(),
        Shape::cross(),
        Shape::diagonals(),
    ];
    let pick = world.random_index(shapes.len());
    shapes[pick].clone()
}

// =============================================================================
// Deferred effects
// =============================================================================

fn run_deferred(world: &Arc<World>, actor: &ActorRef, effect: Deferred) {
    match effect {
        Deferred::Notify(text) => actor.send(Update::message(text)),
        Deferred::StageSound { stage, name } => stage.broadcast(Update::sound(name)),
        Deferred::WorldMessage(text) => world.broadcast(Update::message(text)),
        Deferred::Goal { team } => {
            world.scoreboard().increment(team);
            if let ActorRef::Player(player) = actor {
                player.record_goal();
                player.send_stats();
                world.save_record(player);
            }
            world.broadcast(Update::message(format!(
                "{} scored a goal for {}! Sky-blue {} : {} Fuchsia",
                actor.name(),
                team,
                world.scoreboard().score(Team::SkyBlue),
                world.scoreboard().score(Team::Fuchsia),
            )));
            world.broadcast(world.score_update());
        }
        Deferred::Relocate {
            item,
            stages,
            origin,
        } => {
            let stage = if stages.is_empty() {
                origin
            } else {
                let name = &stages[world.random_index(stages.len())];
                world.fetch_stage(actor, name).unwrap_or(origin)
            };
            if let Err(item) = stage.place_somewhere(item, |n| world.random_index(n)) {
                warn!("No room on {} for {}, dropping it", stage.name(), item.name);
            }
        }
        Deferred::SpawnMoney { stage, amounts } => {
            let (covered, uncovered) = stage.walkable_tiles();
            let tiles: Vec<usize> = covered.into_iter().chain(uncovered).collect();
            if tiles.is_empty() {
                return;
            }
            for amount in amounts {
                let index = tiles[world.random_index(tiles.len())];
                stage.tile_at(index).add_money(amount);
                stage.publish_tile(index);
            }
        }
        Deferred::DestroyFragile { stage, indices } => {
            for index in indices {
                let destroyed = {
                    let mut slot = stage.tile_at(index).slot();
                    if slot.as_ref().is_some_and(|item| item.fragile) {
                        *slot = None;
                        true
                    } else {
                        false
                    }
                };
                if destroyed {
                    stage.publish_tile(index);
                }
            }
        }
        Deferred::Launch {
            stage,
            index,
            dy,
            dx,
        } => {
            let launcher = Location::new(stage, index);
            for direction in Direction::ALL {
                let (ny, nx) = direction.offset();
                if let Some(next) = relative(world, actor, &launcher, ny, nx) {
                    let _ = push(world, actor, &next, None, dy, dx);
                }
            }
            launcher.stage.broadcast(Update::sound("catapult"));
            // The launcher stays behind without firing again.
            shift(world, actor, dy, dx, false);
        }
        Deferred::Kill => combat::kill(world, actor),
        Deferred::Blast {
            stage,
            index,
            radius,
            damage,
            owner,
        } => {
            scheduler::after(world, world.config().blast_delay, move |world| {
                let Some(player) = world.player(owner) else {
                    debug!("Blast owner {} is gone", owner);
                    return;
                };
                let command = Command::Blast {
                    stage,
                    index,
                    radius,
                    damage,
                };
                dispatch(world, &ActorRef::Player(player), command);
            });
        }
        Deferred::PlaceRing { stage } => {
            let ring = Interactable::ring(world.one_in(10));
            if let Err(ring) = stage.place_somewhere(ring, |n| world.random_index(n)) {
                warn!("No room on {} for {}", stage.name(), ring.name);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WorldConfig;
    use crate::game::npc::NonPlayer;
    use crate::grid::area::{Catalog, Neighbors};
    use crate::grid::material::Material;
    use crate::game::reactions::{Effect, Predicate, Reaction};
    use crate::persistence::MemoryStore;
    use tokio::sync::mpsc;

    fn world() -> Arc<World> {
        World::in_memory(WorldConfig::default(), Catalog::default())
    }

    fn open_stage(world: &World, name: &str, height: usize, width: usize) -> Arc<Stage> {
        world.insert_stage(Stage::filled(name, height, width, Material::floor("grass"), world.config()))
    }

    fn player_at(world: &Arc<World>, stage: &str, y: i32, x: i32) -> Arc<Player> {
        let (tx, _rx) = mpsc::unbounded_channel();
        let player = Player::new("ada", Team::SkyBlue, world.config(), tx);
        world.join_at(&player, stage, y, x).unwrap();
        player
    }

    fn rival_at(
        world: &Arc<World>,
        stage: &str,
        y: i32,
        x: i32,
    ) -> (Arc<Player>, mpsc::UnboundedReceiver<Update>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let player = Player::new("bo", Team::Fuchsia, world.config(), tx);
        world.join_at(&player, stage, y, x).unwrap();
        (player, rx)
    }

    fn rings(stage: &Stage) -> usize {
        stage
            .tiles()
            .iter()
            .filter(|tile| tile.interactable_name().is_some_and(|name| name.starts_with("ring-")))
            .count()
    }

    fn coins(stage: &Stage) -> u32 {
        stage.tiles().iter().map(|tile| tile.loot().money).sum()
    }

    fn heard(rx: &mut mpsc::UnboundedReceiver<Update>, needle: &str) -> bool {
        std::iter::from_fn(|| rx.try_recv().ok())
            .any(|update| matches!(update, Update::Message { ref text } if text.contains(needle)))
    }

    fn put(stage: &Stage, y: i32, x: i32, item: Interactable) {
        *stage.tile(y, x).unwrap().slot() = Some(item);
    }

    fn name_at(stage: &Stage, y: i32, x: i32) -> Option<String> {
        stage.tile(y, x).unwrap().interactable_name()
    }

    fn pos(actor: &ActorRef) -> (usize, usize) {
        let location = actor.location().unwrap();
        (location.y(), location.x())
    }

    #[test]
    fn test_step_north() {
        let world = world();
        open_stage(&world, "field", 10, 10);
        let actor: ActorRef = player_at(&world, "field", 5, 5).into();

        assert!(step(&world, &actor, Direction::North));
        assert_eq!(pos(&actor), (4, 5));
        let stage = actor.location().unwrap().stage;
        assert!(stage.tile(4, 5).unwrap().has_occupant(actor.id()));
        assert!(!stage.tile(5, 5).unwrap().has_occupant(actor.id()));
    }

    #[test]
    fn test_step_off_edge_without_neighbour() {
        let world = world();
        open_stage(&world, "field", 3, 3);
        let actor: ActorRef = player_at(&world, "field", 0, 0).into();
        assert!(!step(&world, &actor, Direction::North));
        assert!(!step(&world, &actor, Direction::West));
        assert_eq!(pos(&actor), (0, 0));
    }

    #[test]
    fn test_push_ball_into_wall_fails() {
        let world = world();
        let mut grid = vec![vec![Arc::new(Material::floor("grass")); 5]; 3];
        grid[1][4] = Arc::new(Material::wall("rock"));
        let stage = world.insert_stage(Stage::from_materials("yard", grid, world.config()));
        put(&stage, 1, 3, Interactable::ball(Team::SkyBlue));
        let actor: ActorRef = player_at(&world, "yard", 1, 2).into();

        assert!(!step(&world, &actor, Direction::East));
        assert_eq!(pos(&actor), (1, 2));
        assert_eq!(name_at(&stage, 1, 3).as_deref(), Some("ball-sky-blue"));
        assert_eq!(name_at(&stage, 1, 4), None);
    }

    #[test]
    fn test_push_chain_commits() {
        let world = world();
        let stage = open_stage(&world, "lane", 1, 8);
        for x in 2..5 {
            put(&stage, 0, x, Interactable::new(format!("crate-{}", x), true));
        }
        let actor: ActorRef = player_at(&world, "lane", 0, 1).into();

        assert!(step(&world, &actor, Direction::East));
        assert_eq!(pos(&actor), (0, 2));
        assert_eq!(name_at(&stage, 0, 2), None);
        assert_eq!(name_at(&stage, 0, 3).as_deref(), Some("crate-2"));
        assert_eq!(name_at(&stage, 0, 5).as_deref(), Some("crate-4"));
    }

    #[test]
    fn test_blocked_chain_leaves_everything() {
        let world = world();
        let mut grid = vec![vec![Arc::new(Material::floor("grass")); 8]];
        grid[0][7] = Arc::new(Material::wall("rock"));
        let stage = world.insert_stage(Stage::from_materials("lane", grid, world.config()));
        for x in 2..7 {
            put(&stage, 0, x, Interactable::new(format!("crate-{}", x), true));
        }
        let actor: ActorRef = player_at(&world, "lane", 0, 1).into();

        assert!(!step(&world, &actor, Direction::East));
        assert_eq!(pos(&actor), (0, 1));
        for x in 2..7 {
            assert_eq!(name_at(&stage, 0, x), Some(format!("crate-{}", x)));
        }
    }

    #[test]
    fn test_contended_slot_fails_fast() {
        let world = world();
        let stage = open_stage(&world, "lane", 1, 5);
        put(&stage, 0, 2, Interactable::ball(Team::Fuchsia));
        let actor: ActorRef = player_at(&world, "lane", 0, 1).into();

        let held = stage.tile(0, 3).unwrap().slot();
        assert!(!step(&world, &actor, Direction::East));
        drop(held);
        assert_eq!(pos(&actor), (0, 1));
        assert_eq!(name_at(&stage, 0, 2).as_deref(), Some("ball-fuchsia"));
    }

    #[test]
    fn test_walkable_object_lets_actor_through() {
        let world = world();
        let stage = open_stage(&world, "lane", 1, 4);
        put(&stage, 0, 2, Interactable::new("rug", false).walkable());
        let actor: ActorRef = player_at(&world, "lane", 0, 1).into();

        assert!(step(&world, &actor, Direction::East));
        assert_eq!(pos(&actor), (0, 2));
        assert_eq!(name_at(&stage, 0, 2).as_deref(), Some("rug"));
    }

    #[test]
    fn test_npc_cannot_push_reactive() {
        let world = world();
        let stage = open_stage(&world, "lane", 1, 5);
        let pad = world.reactions().get("death-trap").unwrap();
        put(&stage, 0, 2, Interactable::new("trap", false).walkable().with_reactions(pad));

        let npc = NonPlayer::new(Team::Unaligned, 10);
        let actor = ActorRef::Npc(Arc::clone(&npc));
        assert!(place(&world, &actor, &Location::at(&stage, 0, 1).unwrap()));

        assert!(step(&world, &actor, Direction::East));
        assert_eq!(pos(&actor), (0, 2));
        assert_eq!(npc.mobile().health(), 10);
    }

    #[test]
    fn test_neighbour_stage_wrap() {
        let world = world();
        world.insert_stage(
            Stage::filled("south", 4, 4, Material::floor("grass"), world.config()).with_neighbors(
                Neighbors {
                    north: Some("north".to_string()),
                    ..Default::default()
                },
            ),
        );
        world.insert_stage(
            Stage::filled("north", 6, 4, Material::floor("grass"), world.config()).with_neighbors(
                Neighbors {
                    south: Some("south".to_string()),
                    ..Default::default()
                },
            ),
        );
        let player = player_at(&world, "south", 0, 3);
        let actor: ActorRef = Arc::clone(&player).into();

        assert!(step(&world, &actor, Direction::North));
        let location = actor.location().unwrap();
        assert_eq!(location.stage.name(), "north");
        assert_eq!((location.y(), location.x()), (5, 3));
        assert!(location.stage.has_player(player.id()));
        assert!(!world.stages().get("south").unwrap().has_player(player.id()));
        assert_eq!(player.camera().view().unwrap().0, "north");

        assert!(step(&world, &actor, Direction::South));
        assert_eq!(actor.location().unwrap().stage.name(), "south");
        assert_eq!(pos(&actor), (0, 3));
    }

    #[test]
    fn test_teleport_moves_between_stage_registries() {
        let world = world();
        let lobby = open_stage(&world, "lobby", 4, 4);
        let vault = open_stage(&world, "vault", 4, 4);
        lobby.tile(1, 2).unwrap().set_teleport(Some(Teleport {
            dest_stage: "vault".to_string(),
            dest_y: 3,
            dest_x: 0,
            reject_interactable: false,
            reject_actor: false,
        }));
        let player = player_at(&world, "lobby", 1, 1);
        let actor: ActorRef = Arc::clone(&player).into();

        assert!(step(&world, &actor, Direction::East));
        let location = actor.location().unwrap();
        assert!(Arc::ptr_eq(&location.stage, &vault));
        assert_eq!((location.y(), location.x()), (3, 0));
        assert!(vault.has_player(player.id()));
        assert!(!lobby.has_player(player.id()));
        assert!(!lobby.tile(1, 2).unwrap().has_occupant(player.id()));
    }

    #[test]
    fn test_teleport_to_invalid_destination_aborts() {
        let world = world();
        let lobby = open_stage(&world, "lobby", 4, 4);
        open_stage(&world, "vault", 4, 4);
        lobby.tile(1, 2).unwrap().set_teleport(Some(Teleport {
            dest_stage: "vault".to_string(),
            dest_y: 12,
            dest_x: 0,
            reject_interactable: false,
            reject_actor: false,
        }));
        let actor: ActorRef = player_at(&world, "lobby", 1, 1).into();

        assert!(!step(&world, &actor, Direction::East));
        assert_eq!(actor.location().unwrap().stage.name(), "lobby");
        assert_eq!(pos(&actor), (1, 1));
    }

    #[test]
    fn test_object_pushed_through_teleport() {
        let world = world();
        let lobby = open_stage(&world, "lobby", 1, 5);
        let vault = open_stage(&world, "vault", 3, 3);
        lobby.tile(0, 3).unwrap().set_teleport(Some(Teleport {
            dest_stage: "vault".to_string(),
            dest_y: 1,
            dest_x: 0,
            reject_interactable: false,
            reject_actor: true,
        }));
        put(&lobby, 0, 2, Interactable::ball(Team::SkyBlue));
        let actor: ActorRef = player_at(&world, "lobby", 0, 1).into();

        assert!(step(&world, &actor, Direction::East));
        assert_eq!(name_at(&lobby, 0, 2), None);
        assert_eq!(name_at(&vault, 1, 1).as_deref(), Some("ball-sky-blue"));

        // The link itself refuses actors.
        assert!(!step(&world, &actor, Direction::East));
        assert_eq!(pos(&actor), (0, 2));
    }

    #[test]
    fn test_rotate_clockwise() {
        let world = world();
        let stage = open_stage(&world, "room", 3, 3);
        put(&stage, 0, 1, Interactable::new("n", true));
        put(&stage, 1, 2, Interactable::new("e", true));
        let actor: ActorRef = player_at(&world, "room", 1, 1).into();

        assert!(rotate(&actor, true));
        assert_eq!(name_at(&stage, 0, 1), None);
        assert_eq!(name_at(&stage, 1, 2).as_deref(), Some("n"));
        assert_eq!(name_at(&stage, 2, 1).as_deref(), Some("e"));

        assert!(rotate(&actor, false));
        assert_eq!(name_at(&stage, 0, 1).as_deref(), Some("n"));
        assert_eq!(name_at(&stage, 1, 2).as_deref(), Some("e"));
    }

    #[test]
    fn test_rotate_aborts_on_immovable_or_edge() {
        let world = world();
        let stage = open_stage(&world, "room", 3, 3);
        put(&stage, 0, 1, Interactable::new("n", true));
        put(&stage, 1, 0, Interactable::new("statue", false));
        let actor: ActorRef = player_at(&world, "room", 1, 1).into();

        assert!(!rotate(&actor, true));
        assert_eq!(name_at(&stage, 0, 1).as_deref(), Some("n"));
        assert_eq!(name_at(&stage, 1, 0).as_deref(), Some("statue"));

        let corner: ActorRef = player_at(&world, "room", 0, 0).into();
        assert!(!rotate(&corner, true));
    }

    #[test]
    fn test_boost_jumps_two() {
        let world = world();
        open_stage(&world, "lane", 1, 6);
        let player = player_at(&world, "lane", 0, 0);
        let actor: ActorRef = Arc::clone(&player).into();

        player.add_boosts(1);
        assert!(boost(&world, &player, Direction::East));
        assert_eq!(pos(&actor), (0, 2));
        assert_eq!(player.boosts(), 0);

        assert!(boost(&world, &player, Direction::East));
        assert_eq!(pos(&actor), (0, 3));
    }

    #[test]
    fn test_push_under() {
        let world = world();
        let stage = open_stage(&world, "lane", 1, 4);
        put(&stage, 0, 1, Interactable::new("rug", true).walkable());
        let actor: ActorRef = player_at(&world, "lane", 0, 1).into();

        assert!(push_under(&world, &actor, Direction::East));
        assert_eq!(pos(&actor), (0, 1));
        assert_eq!(name_at(&stage, 0, 1), None);
        assert_eq!(name_at(&stage, 0, 2).as_deref(), Some("rug"));
        assert!(!push_under(&world, &actor, Direction::East));
    }

    #[test]
    fn test_loot_pickup() {
        let world = world();
        let stage = open_stage(&world, "lane", 1, 3);
        stage.tile(0, 1).unwrap().add_money(25);
        stage.tile(0, 1).unwrap().add_boosts(2);
        stage.tile(0, 1).unwrap().set_power(Shape::cross());
        let player = player_at(&world, "lane", 0, 0);

        assert!(step(&world, &ActorRef::Player(Arc::clone(&player)), Direction::East));
        assert_eq!(player.money(), 25);
        assert_eq!(player.boosts(), 2);
        assert_eq!(player.power_count(), 1);
        assert!(stage.tile(0, 1).unwrap().loot().is_empty());
    }

    #[test]
    fn test_goal_scores_and_relocates_ball() {
        let world = World::new(
            WorldConfig::default(),
            Catalog::default(),
            crate::game::reactions::ReactionTable::standard(),
            Arc::new(MemoryStore::new()),
        );
        let stage = open_stage(&world, "pitch", 3, 6);
        let goal = world.reactions().get("goal-sky-blue").unwrap();
        put(&stage, 1, 4, Interactable::new("goal", false).with_reactions(goal));
        put(&stage, 1, 3, Interactable::ball(Team::SkyBlue));
        let player = player_at(&world, "pitch", 1, 2);

        assert!(step(&world, &ActorRef::Player(Arc::clone(&player)), Direction::East));
        assert_eq!(world.scoreboard().score(Team::SkyBlue), 1);
        assert_eq!(player.goals(), 1);
        assert_eq!(name_at(&stage, 1, 4).as_deref(), Some("goal"));
        let balls = stage
            .tiles()
            .iter()
            .filter(|tile| tile.interactable_name().as_deref() == Some("ball-sky-blue"))
            .count();
        assert_eq!(balls, 1);
    }

    #[test]
    fn test_black_hole_eats_non_balls() {
        let world = world();
        let stage = open_stage(&world, "void", 1, 5);
        let hole = world.reactions().get("black-hole").unwrap();
        put(&stage, 0, 3, Interactable::new("hole", false).with_reactions(hole));
        put(&stage, 0, 2, Interactable::new("crate", true));
        let actor: ActorRef = player_at(&world, "void", 0, 1).into();

        assert!(step(&world, &actor, Direction::East));
        assert!(stage
            .tiles()
            .iter()
            .all(|tile| tile.interactable_name().as_deref() != Some("crate")));
    }

    #[test]
    fn test_death_trap_kills_and_respawns() {
        let mut config = WorldConfig::default();
        config.respawn_stage = "clinic".to_string();
        config.respawn_y = 0;
        config.respawn_x = 0;
        let world = World::in_memory(config, Catalog::default());
        open_stage(&world, "clinic", 2, 2);
        let stage = open_stage(&world, "marsh", 1, 4);
        let trap = world.reactions().get("death-trap").unwrap();
        put(&stage, 0, 2, Interactable::new("trap", false).walkable().with_reactions(trap));
        let player = player_at(&world, "marsh", 0, 1);
        player.add_money(40);

        assert!(step(&world, &ActorRef::Player(Arc::clone(&player)), Direction::East));
        let location = player.mobile().location().unwrap();
        assert_eq!(location.stage.name(), "clinic");
        assert_eq!(player.deaths(), 1);
        assert_eq!(player.money(), 20);
        assert_eq!(player.mobile().health(), world.config().player_health);
        assert_eq!(stage.tile(0, 2).unwrap().loot().money, 20);
    }

    #[test]
    fn test_catapult_launches() {
        let world = world();
        let stage = open_stage(&world, "range", 1, 20);
        let catapult = world.reactions().get("catapult-east").unwrap();
        put(&stage, 0, 2, Interactable::new("catapult", false).walkable().with_reactions(catapult));
        let actor: ActorRef = player_at(&world, "range", 0, 1).into();

        assert!(step(&world, &actor, Direction::East));
        assert_eq!(pos(&actor), (0, 13));
    }

    #[test]
    fn test_stale_arrival_leaves_camera_alone() {
        let world = world();
        open_stage(&world, "lane", 3, 3);
        let ward = open_stage(&world, "ward", 3, 3);
        let yard = open_stage(&world, "yard", 3, 3);
        ward.tile(1, 1).unwrap().add_money(30);
        let player = player_at(&world, "lane", 0, 0);
        let money = player.money();
        let actor = ActorRef::Player(Arc::clone(&player));
        let from = actor.location().unwrap();
        let stale = Location::at(&ward, 1, 1).unwrap();

        // Killed and respawned before the transfer to the ward settles.
        assert!(detach(&actor).is_some());
        assert!(place(&world, &actor, &Location::at(&yard, 2, 2).unwrap()));
        arrive(&world, &actor, Some(&from), &stale);

        assert_eq!(player.camera().view().unwrap().0, "yard");
        assert_eq!(player.money(), money);
        assert_eq!(ward.tile(1, 1).unwrap().loot().money, 30);
        assert_eq!(actor.location().unwrap().stage.name(), "yard");
    }

    // =========================================================================
    // Reaction effects through pushes
    // =========================================================================

    #[test]
    fn test_ring_trap_lifecycle() {
        let world = world();
        let stage = open_stage(&world, "pond", 1, 6);
        let pad = world.reactions().get("lily-pad").unwrap();
        put(
            &stage,
            0,
            3,
            Interactable::new("lily-pad", false)
                .walkable()
                .with_reactions(Arc::clone(&pad)),
        );
        put(&stage, 0, 2, Interactable::ring(false));
        let ada = player_at(&world, "pond", 0, 1);

        // Arming consumes the ring and drops a few coins.
        assert!(step(&world, &ActorRef::Player(Arc::clone(&ada)), Direction::East));
        let armed = stage.tile(0, 3).unwrap().slot().as_ref().unwrap().reactions.clone();
        assert!(matches!(
            armed[0].then,
            Effect::Detonate { radius: 2, damage: 50, owner } if owner == ada.id()
        ));
        assert_eq!(rings(&stage), 0);
        assert_eq!(coins(&stage), 10);

        // A rival stepping on it sets it off.
        let (bo, _rx) = rival_at(&world, "pond", 0, 4);
        assert!(step(&world, &ActorRef::Player(Arc::clone(&bo)), Direction::West));
        assert_eq!(bo.mobile().health(), world.config().player_health - 50);
        assert_eq!(ada.mobile().health(), world.config().player_health);
        assert_eq!(rings(&stage), 1);
        let reverted = stage.tile(0, 3).unwrap().slot().as_ref().unwrap().reactions.clone();
        assert_eq!(&reverted[..], &pad[..]);
    }

    #[test]
    fn test_exchange_ring_blasts_and_moves_ring() {
        let world = world();
        let bazaar = world.insert_stage(
            Stage::filled("bazaar", 1, 5, Material::floor("stone"), world.config()).with_neighbors(
                Neighbors {
                    east: Some("annex".to_string()),
                    ..Default::default()
                },
            ),
        );
        let annex = open_stage(&world, "annex", 2, 2);
        let exchange = world.reactions().get("exchange-ring").unwrap();
        put(&bazaar, 0, 2, Interactable::new("exchange", false).with_reactions(exchange));
        put(&bazaar, 0, 1, Interactable::ring(false));
        let ada = player_at(&world, "bazaar", 0, 0);
        let (bo, _rx) = rival_at(&world, "bazaar", 0, 4);

        assert!(step(&world, &ActorRef::Player(Arc::clone(&ada)), Direction::East));
        // A radius-4 square reaches every tile of a 1x5 stage.
        assert_eq!(bo.mobile().health(), world.config().player_health - 50);
        assert_eq!(ada.mobile().health(), world.config().player_health);
        assert_eq!(coins(&bazaar), 10);
        assert_eq!(rings(&bazaar), 0);
        assert_eq!(rings(&annex), 1);
    }

    #[test]
    fn test_tutorial_goal_clears_fragile_elsewhere() {
        let world = world();
        let stage = open_stage(&world, "school", 3, 6);
        let goal = world.reactions().get("tutorial-goal-sky-blue").unwrap();
        put(&stage, 1, 4, Interactable::new("goal", false).fragile().with_reactions(goal));
        put(&stage, 1, 3, Interactable::ball(Team::SkyBlue));
        put(&stage, 0, 0, Interactable::new("vase", true).fragile());
        put(&stage, 2, 5, Interactable::new("jar", true).fragile());
        put(&stage, 0, 5, Interactable::new("crate", true));
        let actor: ActorRef = player_at(&world, "school", 1, 2).into();

        assert!(step(&world, &actor, Direction::East));
        assert_eq!(name_at(&stage, 0, 0), None);
        assert_eq!(name_at(&stage, 2, 5), None);
        assert_eq!(name_at(&stage, 0, 5).as_deref(), Some("crate"));
        assert_eq!(name_at(&stage, 1, 4).as_deref(), Some("goal"));
    }

    #[test]
    fn test_gold_target_clears_its_rectangle() {
        let world = world();
        let stage = open_stage(&world, "range", 12, 10);
        let target = world.reactions().get("gold-target").unwrap();
        put(&stage, 7, 5, Interactable::new("target", false).fragile().with_reactions(target));
        put(&stage, 7, 4, Interactable::new("ball-gold", true));
        for (y, x) in [(5, 3), (10, 8), (4, 3), (5, 9)] {
            put(&stage, y, x, Interactable::new(format!("glass-{}-{}", y, x), true).fragile());
        }
        put(&stage, 6, 6, Interactable::new("crate", true));
        let actor: ActorRef = player_at(&world, "range", 7, 3).into();

        assert!(step(&world, &actor, Direction::East));
        assert_eq!(name_at(&stage, 5, 3), None);
        assert_eq!(name_at(&stage, 10, 8), None);
        assert_eq!(name_at(&stage, 4, 3).as_deref(), Some("glass-4-3"));
        assert_eq!(name_at(&stage, 5, 9).as_deref(), Some("glass-5-9"));
        assert_eq!(name_at(&stage, 6, 6).as_deref(), Some("crate"));
        assert_eq!(name_at(&stage, 7, 5).as_deref(), Some("target"));
    }

    #[test]
    fn test_lever_retargets_following_step() {
        let world = world();
        let yard = open_stage(&world, "yard", 3, 4);
        open_stage(&world, "attic", 3, 3);
        open_stage(&world, "cellar", 3, 3);
        yard.tile(1, 3).unwrap().set_teleport(Some(Teleport {
            dest_stage: "attic".to_string(),
            dest_y: 0,
            dest_x: 0,
            reject_interactable: false,
            reject_actor: false,
        }));
        let lever = vec![Reaction::new(
            Predicate::Nothing,
            Effect::Retarget {
                source_y: 1,
                source_x: 3,
                stage: "cellar".to_string(),
                y: 2,
                x: 2,
            },
        )];
        put(&yard, 0, 2, Interactable::new("lever", false).with_reactions(Arc::from(lever)));
        let actor: ActorRef = player_at(&world, "yard", 1, 2).into();

        assert!(!step(&world, &actor, Direction::North));
        assert_eq!(pos(&actor), (1, 2));
        assert_eq!(yard.tile(1, 3).unwrap().teleport().unwrap().dest_stage, "cellar");

        assert!(step(&world, &actor, Direction::East));
        let location = actor.location().unwrap();
        assert_eq!(location.stage.name(), "cellar");
        assert_eq!((location.y(), location.x()), (2, 2));
    }

    #[test]
    fn test_bell_reaches_every_player() {
        let world = world();
        let square = open_stage(&world, "square", 2, 3);
        open_stage(&world, "elsewhere", 2, 2);
        let bell = world.reactions().get("bell").unwrap();
        put(&square, 0, 1, Interactable::new("bell", false).with_reactions(bell));
        let (tx, mut ringer_rx) = mpsc::unbounded_channel();
        let ringer = Player::new("ada", Team::SkyBlue, world.config(), tx);
        world.join_at(&ringer, "square", 1, 1).unwrap();
        let (_far, mut far_rx) = rival_at(&world, "elsewhere", 0, 0);

        assert!(!step(&world, &ActorRef::Player(ringer), Direction::North));
        assert!(heard(&mut ringer_rx, "bell"));
        assert!(heard(&mut far_rx, "bell"));
    }

    #[test]
    fn test_concurrent_pushes_never_duplicate() {
        use rand::Rng;

        let world = world();
        let stage = open_stage(&world, "arena", 6, 6);
        for x in 1..5 {
            put(&stage, 2, x, Interactable::new(format!("crate-{}", x), true));
            put(&stage, 4, x, Interactable::ball(Team::Fuchsia));
        }
        let count = || {
            stage
                .tiles()
                .iter()
                .filter(|tile| tile.interactable_name().is_some())
                .count()
        };
        assert_eq!(count(), 8);

        std::thread::scope(|scope| {
            for (y, x) in [(2, 0), (2, 5), (4, 0), (4, 5), (0, 0), (5, 5)] {
                let world = &world;
                scope.spawn(move || {
                    let npc = NonPlayer::new(Team::Unaligned, 10);
                    let actor = ActorRef::Npc(Arc::clone(&npc));
                    let Some(start) = Location::at(&world.stages().get("arena").unwrap(), y, x) else {
                        return;
                    };
                    if !place(world, &actor, &start) {
                        return;
                    }
                    let mut rng = rand::thread_rng();
                    for _ in 0..300 {
                        let direction = Direction::ALL[rng.gen_range(0..4)];
                        step(world, &actor, direction);
                    }
                });
            }
        });

        assert_eq!(count(), 8);
        let crates = stage
            .tiles()
            .iter()
            .filter(|tile| tile.interactable_name().is_some_and(|name| name.starts_with("crate-")))
            .count();
        assert_eq!(crates, 4);
    }
}
