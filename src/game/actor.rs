//! Actors
//!
//! Players and non-players share a [`Mobile`] component that owns the
//! position lock, health and kill counters. Engine code works on the
//! [`ActorRef`] tagged variant and branches on the kind only where the two
//! behave differently (stage registries, cameras, reactions, records).

use std::fmt;
use std::sync::atomic::{AtomicI32, AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::core::sync::lock;
use crate::core::Direction;
use crate::game::events::Update;
use crate::game::npc::NonPlayer;
use crate::game::player::Player;
use crate::grid::stage::Stage;
use crate::grid::tile::Tile;

// =============================================================================
// Identity
// =============================================================================

/// Unique actor identifier.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ActorId(pub Uuid);

impl ActorId {
    /// Fresh random id.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Deterministic id, mostly for tests.
    pub const fn from_u128(value: u128) -> Self {
        Self(Uuid::from_u128(value))
    }
}

impl Default for ActorId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Team affiliation. Same-team actors never damage each other.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Team {
    /// Sky-blue side.
    SkyBlue,
    /// Fuchsia side.
    Fuchsia,
    /// No side.
    Unaligned,
}

impl Team {
    /// Name used in interactable names ("ball-sky-blue").
    pub const fn as_str(self) -> &'static str {
        match self {
            Team::SkyBlue => "sky-blue",
            Team::Fuchsia => "fuchsia",
            Team::Unaligned => "unaligned",
        }
    }

    /// The rival team, if this team has one.
    pub const fn opposite(self) -> Option<Team> {
        match self {
            Team::SkyBlue => Some(Team::Fuchsia),
            Team::Fuchsia => Some(Team::SkyBlue),
            Team::Unaligned => None,
        }
    }
}

impl fmt::Display for Team {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Location
// =============================================================================

/// A tile addressed through its owning stage.
#[derive(Clone)]
pub struct Location {
    /// Owning stage.
    pub stage: Arc<Stage>,
    /// Row-major tile index.
    pub index: usize,
}

impl Location {
    /// Address `index` on `stage`.
    pub fn new(stage: Arc<Stage>, index: usize) -> Self {
        Self { stage, index }
    }

    /// Address `(y, x)` on `stage` if in bounds.
    pub fn at(stage: &Arc<Stage>, y: i32, x: i32) -> Option<Self> {
        stage
            .index_of(y, x)
            .map(|index| Self::new(Arc::clone(stage), index))
    }

    /// The addressed tile.
    pub fn tile(&self) -> &Tile {
        self.stage.tile_at(self.index)
    }

    /// Row.
    pub fn y(&self) -> usize {
        self.index / self.stage.width()
    }

    /// Column.
    pub fn x(&self) -> usize {
        self.index % self.stage.width()
    }

    /// Both locations are on the same stage instance.
    pub fn same_stage(&self, other: &Location) -> bool {
        Arc::ptr_eq(&self.stage, &other.stage)
    }
}

impl PartialEq for Location {
    fn eq(&self, other: &Self) -> bool {
        self.same_stage(other) && self.index == other.index
    }
}

impl Eq for Location {}

impl fmt::Debug for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({}, {})", self.stage.name(), self.y(), self.x())
    }
}

// =============================================================================
// Mobile component
// =============================================================================

/// State shared by every actor kind.
pub struct Mobile {
    id: ActorId,
    team: Team,
    location: Mutex<Option<Location>>,
    health: AtomicI32,
    kill_streak: AtomicU32,
    kill_count: AtomicU32,
    facing: Mutex<Direction>,
}

impl Mobile {
    /// New component, not yet placed on any tile.
    pub fn new(id: ActorId, team: Team, health: i32) -> Self {
        Self {
            id,
            team,
            location: Mutex::new(None),
            health: AtomicI32::new(health),
            kill_streak: AtomicU32::new(0),
            kill_count: AtomicU32::new(0),
            facing: Mutex::new(Direction::South),
        }
    }

    /// Identifier.
    pub fn id(&self) -> ActorId {
        self.id
    }

    /// Team.
    pub fn team(&self) -> Team {
        self.team
    }

    /// Current location, `None` while detached (dead, respawning, gone).
    pub fn location(&self) -> Option<Location> {
        lock(&self.location).clone()
    }

    /// The position lock. Held for the whole of a tile transfer.
    pub(crate) fn position(&self) -> MutexGuard<'_, Option<Location>> {
        lock(&self.location)
    }

    /// Current health.
    pub fn health(&self) -> i32 {
        self.health.load(Ordering::SeqCst)
    }

    /// Overwrite health.
    pub fn set_health(&self, value: i32) {
        self.health.store(value, Ordering::SeqCst);
    }

    /// Subtract `amount`. Returns true if this call took health from
    /// positive to zero or below, so exactly one caller observes a death.
    pub fn damage(&self, amount: i32) -> bool {
        let before = self.health.fetch_sub(amount, Ordering::SeqCst);
        before > 0 && before - amount <= 0
    }

    /// Kills since last death.
    pub fn kill_streak(&self) -> u32 {
        self.kill_streak.load(Ordering::SeqCst)
    }

    /// Lifetime kills.
    pub fn kill_count(&self) -> u32 {
        self.kill_count.load(Ordering::SeqCst)
    }

    /// Credit one kill. Returns the new streak.
    pub fn record_kill(&self) -> u32 {
        self.kill_count.fetch_add(1, Ordering::SeqCst);
        self.kill_streak.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Zero the streak.
    pub fn reset_streak(&self) {
        self.kill_streak.store(0, Ordering::SeqCst);
    }

    /// Last direction moved or faced.
    pub fn facing(&self) -> Direction {
        *lock(&self.facing)
    }

    /// Turn.
    pub fn set_facing(&self, direction: Direction) {
        *lock(&self.facing) = direction;
    }
}

// =============================================================================
// Tagged actor reference
// =============================================================================

/// Either kind of actor.
#[derive(Clone)]
pub enum ActorRef {
    /// Human-controlled.
    Player(Arc<Player>),
    /// Autonomous.
    Npc(Arc<NonPlayer>),
}

impl ActorRef {
    /// Shared component.
    pub fn mobile(&self) -> &Mobile {
        match self {
            ActorRef::Player(player) => player.mobile(),
            ActorRef::Npc(npc) => npc.mobile(),
        }
    }

    /// Identifier.
    pub fn id(&self) -> ActorId {
        self.mobile().id()
    }

    /// Team.
    pub fn team(&self) -> Team {
        self.mobile().team()
    }

    /// Current location.
    pub fn location(&self) -> Option<Location> {
        self.mobile().location()
    }

    /// Kills since last death.
    pub fn kill_streak(&self) -> u32 {
        self.mobile().kill_streak()
    }

    /// Human-controlled.
    pub fn is_player(&self) -> bool {
        matches!(self, ActorRef::Player(_))
    }

    /// The player, if this is one.
    pub fn as_player(&self) -> Option<&Arc<Player>> {
        match self {
            ActorRef::Player(player) => Some(player),
            ActorRef::Npc(_) => None,
        }
    }

    /// Display name.
    pub fn name(&self) -> String {
        match self {
            ActorRef::Player(player) => player.username().to_string(),
            ActorRef::Npc(npc) => format!("npc-{}", npc.mobile().id()),
        }
    }

    /// Queue an update. Non-players have no queue.
    pub fn send(&self, update: Update) {
        if let ActorRef::Player(player) = self {
            player.send(update);
        }
    }
}

impl fmt::Debug for ActorRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActorRef::Player(player) => write!(f, "Player({})", player.mobile().id()),
            ActorRef::Npc(npc) => write!(f, "Npc({})", npc.mobile().id()),
        }
    }
}

impl From<Arc<Player>> for ActorRef {
    fn from(player: Arc<Player>) -> Self {
        ActorRef::Player(player)
    }
}

impl From<Arc<NonPlayer>> for ActorRef {
    fn from(npc: Arc<NonPlayer>) -> Self {
        ActorRef::Npc(npc)
    }
}
