//! # Gridrealm Server
//!
//! Concurrent tile-grid world core: stages of tiles, actors that walk and
//! push objects across them, and cameras that stream tile changes to
//! connected players.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    GRIDREALM SERVER                          │
//! ├─────────────────────────────────────────────────────────────┤
//! │  core/           - Shared primitives                         │
//! │  ├── direction.rs- Directions and area shapes                │
//! │  ├── rng.rs      - Seeded Xorshift128+ PRNG                  │
//! │  └── sync.rs     - Poison-tolerant lock helpers              │
//! │                                                              │
//! │  grid/           - World geometry                            │
//! │  ├── material.rs - Tile materials                            │
//! │  ├── interactable.rs - Pushable and reactive objects         │
//! │  ├── tile.rs     - Tiles, slots and teleports                │
//! │  ├── zone.rs     - Camera subscription blocks                │
//! │  ├── stage.rs    - Tile grids and stage broadcasts           │
//! │  └── area.rs     - Area catalog loaded from JSON             │
//! │                                                              │
//! │  game/           - Actors and rules                          │
//! │  ├── movement.rs - Push chains and stage transfers           │
//! │  ├── reactions.rs- Reactive object effects                   │
//! │  ├── camera.rs   - Viewports and zone membership             │
//! │  ├── combat.rs   - Damage, deaths and respawns               │
//! │  ├── registry.rs - Shared/personal/individual stages         │
//! │  ├── scheduler.rs- Timed effects and non-player loops        │
//! │  └── world.rs    - Join, disconnect, leaderboard             │
//! │                                                              │
//! │  persistence.rs  - Player records and kill events            │
//! │  config.rs       - Environment configuration                 │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Concurrency
//!
//! Every tile slot has its own lock. Push chains only ever `try_lock`
//! slots, so a contended chain fails instead of waiting, and a failed
//! chain leaves every object where it was. Side effects that need other
//! locks (scoring, respawns, blasts) are queued during the chain and run
//! after its locks are released.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod config;
pub mod core;
pub mod game;
pub mod grid;
pub mod persistence;

// Re-export commonly used types
pub use config::WorldConfig;
pub use core::{DeterministicRng, Direction, Shape};
pub use game::{ActorId, ActorRef, Command, Player, Team, World};
pub use grid::{Catalog, Interactable, Material, Stage};
pub use persistence::{MemoryStore, Persistence, PersistenceError};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
