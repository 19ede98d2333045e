//! World
//!
//! The explicit registry threaded through every entry point as
//! `&Arc<World>`: configuration, the area catalog and reaction table, the
//! shared stage registry, connected players and non-players, the
//! leaderboard and the persistence port.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use thiserror::Error;
use tokio::runtime::Handle;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{info, warn};

use crate::config::WorldConfig;
use crate::core::sync::{lock, read, write};
use crate::core::DeterministicRng;
use crate::game::actor::{ActorId, ActorRef, Location, Team};
use crate::game::events::Update;
use crate::game::leaderboard::{Leaderboard, Scoreboard};
use crate::game::movement;
use crate::game::npc::NonPlayer;
use crate::game::player::Player;
use crate::game::reactions::ReactionTable;
use crate::game::registry::StageRegistry;
use crate::game::scheduler;
use crate::grid::area::Catalog;
use crate::persistence::{MemoryStore, Persistence, PersistenceError};

/// Why a player could not enter the world.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum JoinError {
    /// Spawn stage is neither registered nor in the catalog.
    #[error("unknown stage {0}")]
    UnknownStage(String),

    /// Spawn point lies outside the stage.
    #[error("spawn point ({y}, {x}) is outside stage {stage}")]
    InvalidSpawn {
        /// Stage name.
        stage: String,
        /// Row.
        y: i32,
        /// Column.
        x: i32,
    },

    /// Player is already standing somewhere.
    #[error("player {0} is already placed")]
    AlreadyPlaced(ActorId),

    /// World no longer accepts players.
    #[error("world is shutting down")]
    ShuttingDown,
}

/// Shared world state.
pub struct World {
    config: WorldConfig,
    catalog: Catalog,
    reactions: ReactionTable,
    stages: StageRegistry,
    players: RwLock<BTreeMap<ActorId, Arc<Player>>>,
    npcs: Mutex<BTreeMap<ActorId, Arc<NonPlayer>>>,
    leaderboard: Leaderboard,
    scoreboard: Scoreboard,
    rng: Mutex<DeterministicRng>,
    persistence: Arc<dyn Persistence>,
    shut_down: AtomicBool,
}

impl World {
    /// Assemble a world. Stages are built lazily on first reference.
    pub fn new(
        config: WorldConfig,
        catalog: Catalog,
        reactions: ReactionTable,
        persistence: Arc<dyn Persistence>,
    ) -> Arc<Self> {
        let rng = DeterministicRng::new(config.rng_seed);
        Arc::new(Self {
            config,
            catalog,
            reactions,
            stages: StageRegistry::new(),
            players: RwLock::new(BTreeMap::new()),
            npcs: Mutex::new(BTreeMap::new()),
            leaderboard: Leaderboard::new(),
            scoreboard: Scoreboard::new(),
            rng: Mutex::new(rng),
            persistence,
            shut_down: AtomicBool::new(false),
        })
    }

    /// World with the standard reactions and a [`MemoryStore`].
    pub fn in_memory(config: WorldConfig, catalog: Catalog) -> Arc<Self> {
        Self::new(
            config,
            catalog,
            ReactionTable::standard(),
            Arc::new(MemoryStore::new()),
        )
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Tunables.
    pub fn config(&self) -> &WorldConfig {
        &self.config
    }

    /// Area templates and materials.
    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Named reaction lists.
    pub fn reactions(&self) -> &ReactionTable {
        &self.reactions
    }

    /// Shared stage instances.
    pub fn stages(&self) -> &StageRegistry {
        &self.stages
    }

    /// Kill-streak ranking.
    pub fn leaderboard(&self) -> &Leaderboard {
        &self.leaderboard
    }

    /// Team goals.
    pub fn scoreboard(&self) -> &Scoreboard {
        &self.scoreboard
    }

    /// Uniform index below `len` from the world generator.
    pub fn random_index(&self, len: usize) -> usize {
        lock(&self.rng).next_index(len)
    }

    /// True with probability `1/n`.
    pub fn one_in(&self, n: u32) -> bool {
        lock(&self.rng).one_in(n)
    }

    // =========================================================================
    // Players
    // =========================================================================

    /// Create a player and place it on the configured spawn point.
    pub fn join(
        self: &Arc<Self>,
        username: impl Into<String>,
        team: Team,
        outbound: UnboundedSender<Update>,
    ) -> Result<Arc<Player>, JoinError> {
        let player = Player::new(username, team, &self.config, outbound);
        let (stage, y, x) = (
            self.config.spawn_stage.clone(),
            self.config.spawn_y,
            self.config.spawn_x,
        );
        self.join_at(&player, &stage, y, x)?;
        Ok(player)
    }

    /// Place an existing detached player at `(y, x)` on `stage`.
    pub fn join_at(
        self: &Arc<Self>,
        player: &Arc<Player>,
        stage: &str,
        y: i32,
        x: i32,
    ) -> Result<(), JoinError> {
        if self.is_shut_down() {
            return Err(JoinError::ShuttingDown);
        }
        if player.mobile().location().is_some() {
            return Err(JoinError::AlreadyPlaced(player.id()));
        }
        let actor = ActorRef::Player(Arc::clone(player));
        let resolved = self
            .fetch_stage(&actor, stage)
            .ok_or_else(|| JoinError::UnknownStage(stage.to_string()))?;
        let dest = Location::at(&resolved, y, x).ok_or_else(|| JoinError::InvalidSpawn {
            stage: stage.to_string(),
            y,
            x,
        })?;

        write(&self.players).insert(player.id(), Arc::clone(player));
        if !movement::place(self, &actor, &dest) {
            write(&self.players).remove(&player.id());
            return Err(JoinError::AlreadyPlaced(player.id()));
        }

        self.record_streak(player);
        player.send_stats();
        player.send(self.score_update());
        info!("{} joined {} at ({}, {})", player.username(), stage, y, x);
        Ok(())
    }

    /// Remove a player for good: off its tile, stage, camera zone and the
    /// leaderboard, with a final record flush.
    pub fn disconnect(self: &Arc<Self>, player: &Arc<Player>) {
        if !player.set_intangible() {
            return;
        }
        movement::detach(&ActorRef::Player(Arc::clone(player)));
        write(&self.players).remove(&player.id());
        if self.leaderboard.remove(player.id()) {
            self.broadcast_leader();
        }
        self.save_record(player);
        info!("{} disconnected", player.username());
    }

    /// Connected player by id.
    pub fn player(&self, id: ActorId) -> Option<Arc<Player>> {
        read(&self.players).get(&id).cloned()
    }

    /// Connected players.
    pub fn players(&self) -> Vec<Arc<Player>> {
        read(&self.players).values().cloned().collect()
    }

    /// Number of connected players.
    pub fn player_count(&self) -> usize {
        read(&self.players).len()
    }

    // =========================================================================
    // Non-players
    // =========================================================================

    /// Create a non-player at `(y, x)` on a shared stage and start its
    /// control loop when a runtime is available.
    pub fn spawn_npc(
        self: &Arc<Self>,
        stage: &str,
        y: i32,
        x: i32,
        team: Team,
    ) -> Option<Arc<NonPlayer>> {
        if self.is_shut_down() {
            return None;
        }
        let npc = NonPlayer::new(team, self.config.npc_health);
        let actor = ActorRef::Npc(Arc::clone(&npc));
        let Some(resolved) = self.fetch_stage(&actor, stage) else {
            warn!("Cannot spawn non-player on unavailable stage {}", stage);
            return None;
        };
        let dest = Location::at(&resolved, y, x)?;

        lock(&self.npcs).insert(npc.id(), Arc::clone(&npc));
        if !movement::place(self, &actor, &dest) {
            lock(&self.npcs).remove(&npc.id());
            return None;
        }
        scheduler::spawn_npc_loop(self, &npc);
        Some(npc)
    }

    /// Forget a non-player. Returns it if it was registered.
    pub fn remove_npc(&self, id: ActorId) -> Option<Arc<NonPlayer>> {
        lock(&self.npcs).remove(&id)
    }

    /// Live non-players.
    pub fn npcs(&self) -> Vec<Arc<NonPlayer>> {
        lock(&self.npcs).values().cloned().collect()
    }

    /// Number of live non-players.
    pub fn npc_count(&self) -> usize {
        lock(&self.npcs).len()
    }

    // =========================================================================
    // Broadcast
    // =========================================================================

    /// Queue `update` to every connected player.
    pub fn broadcast(&self, update: Update) {
        for player in read(&self.players).values() {
            player.send(update.clone());
        }
    }

    /// Push a player's streak into the leaderboard, announcing a new
    /// leader.
    pub fn record_streak(&self, player: &Player) {
        if self
            .leaderboard
            .update(player.id(), player.mobile().kill_streak())
        {
            self.broadcast_leader();
        }
    }

    /// Announce the current leader.
    pub fn broadcast_leader(&self) {
        let update = match self.leaderboard.peek() {
            Some((id, streak)) => Update::Leader {
                leader: Some(id),
                username: self.player(id).map(|player| player.username().to_string()),
                streak,
            },
            None => Update::Leader {
                leader: None,
                username: None,
                streak: 0,
            },
        };
        self.broadcast(update);
    }

    /// Current team scores.
    pub fn score_update(&self) -> Update {
        Update::Score {
            sky_blue: self.scoreboard.score(Team::SkyBlue),
            fuchsia: self.scoreboard.score(Team::Fuchsia),
        }
    }

    // =========================================================================
    // Persistence
    // =========================================================================

    /// Run a storage job off the command path. Failures are logged and
    /// never reach gameplay.
    pub fn persist<F>(&self, what: &'static str, job: F)
    where
        F: FnOnce(&dyn Persistence) -> Result<(), PersistenceError> + Send + 'static,
    {
        let store = Arc::clone(&self.persistence);
        let run = move || {
            if let Err(e) = job(store.as_ref()) {
                warn!("Failed to persist {}: {}", what, e);
            }
        };
        match Handle::try_current() {
            Ok(handle) => {
                handle.spawn_blocking(run);
            }
            Err(_) => run(),
        }
    }

    /// Save a player's counters.
    pub fn save_record(&self, player: &Player) {
        let record = player.record();
        self.persist("player record", move |store| store.update_record(&record));
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Stop accepting work and cancel every non-player loop.
    pub fn shutdown(&self) {
        if self.shut_down.swap(true, Ordering::SeqCst) {
            return;
        }
        let npcs = self.npcs();
        for npc in &npcs {
            npc.cancel();
        }
        info!("World shut down, cancelled {} non-players", npcs.len());
    }

    /// Shutdown has begun.
    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::SeqCst)
    }
}
