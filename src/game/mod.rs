//! Game Logic Module
//!
//! Actors and everything they do to the grid.
//!
//! ## Module Structure
//!
//! - `actor`: Identity, team, position and the player/non-player handle
//! - `player`: Connected players, inventory and personal stages
//! - `npc`: Non-player actors
//! - `camera`: Per-player viewports and zone subscriptions
//! - `events`: Outbound updates
//! - `movement`: Push chains, steps, transfers and spawn actions
//! - `reactions`: Reactive object behaviour
//! - `teleport`: Teleport destination resolution
//! - `combat`: Damage, deaths and respawns
//! - `command`: Command parsing and dispatch
//! - `scheduler`: Delayed effects and non-player loops
//! - `leaderboard`: Kill-streak leader and team goals
//! - `registry`: Stage instances by load strategy
//! - `world`: The shared world handle

pub mod actor;
pub mod camera;
pub mod combat;
pub mod command;
pub mod events;
pub mod leaderboard;
pub mod movement;
pub mod npc;
pub mod player;
pub mod reactions;
pub mod registry;
pub mod scheduler;
pub mod teleport;
pub mod world;

// Re-export key types
pub use actor::{ActorId, ActorRef, Location, Mobile, Team};
pub use camera::Camera;
pub use command::{dispatch, Command, CommandError};
pub use events::{StatsView, TileSnapshot, Update};
pub use leaderboard::{Leaderboard, Scoreboard};
pub use npc::NonPlayer;
pub use player::Player;
pub use reactions::{Effect, Predicate, Reaction, ReactionTable};
pub use registry::StageRegistry;
pub use teleport::TeleportError;
pub use world::{JoinError, World};
