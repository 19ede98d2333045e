//! Outbound Updates
//!
//! Opaque payloads queued to players. The transport layer serializes them;
//! nothing in the engine renders them.

use serde::{Deserialize, Serialize};

use crate::game::actor::ActorId;

/// Observable state of one tile.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TileSnapshot {
    /// Row.
    pub y: usize,
    /// Column.
    pub x: usize,
    /// Material name.
    pub material: String,
    /// Material walkability.
    pub walkable: bool,
    /// Interactable name, if any.
    pub interactable: Option<String>,
    /// Actors standing on the tile.
    pub occupants: Vec<ActorId>,
    /// Uncollected items are present.
    pub loot: bool,
    /// Tile carries a teleport link.
    pub teleport: bool,
}

/// Player-facing counters.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsView {
    /// Current health.
    pub health: i32,
    /// Coins held.
    pub money: u32,
    /// Boost charges held.
    pub boosts: u32,
    /// Power-ups stacked.
    pub powers: usize,
    /// Kills since last death.
    pub kill_streak: u32,
    /// Lifetime kills.
    pub kill_count: u32,
    /// Lifetime deaths.
    pub deaths: u32,
    /// Lifetime goals.
    pub goals: u32,
}

/// Update queued to a single player.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Update {
    /// Full window after entering a stage.
    ViewReset {
        /// Stage name.
        stage: String,
        /// Window top row.
        top: usize,
        /// Window left column.
        left: usize,
        /// Every tile inside the window.
        tiles: Vec<TileSnapshot>,
    },

    /// Incremental window shift. `dy`/`dx` are new minus old top-left.
    ViewDelta {
        /// New top row.
        top: usize,
        /// New left column.
        left: usize,
        /// Vertical shift.
        dy: i32,
        /// Horizontal shift.
        dx: i32,
        /// Tiles that came into view.
        entered: Vec<TileSnapshot>,
        /// Coordinates that left the view.
        exited: Vec<(usize, usize)>,
    },

    /// A visible tile changed.
    Tile {
        /// New tile state.
        tile: TileSnapshot,
    },

    /// Play a named sound.
    Sound {
        /// Sound name.
        name: String,
    },

    /// Text for the player.
    Message {
        /// Message body.
        text: String,
    },

    /// Kill-streak leader changed.
    Leader {
        /// New leader, `None` once the board empties.
        leader: Option<ActorId>,
        /// Leader's display name.
        username: Option<String>,
        /// Leader's streak.
        streak: u32,
    },

    /// Own counters changed.
    Stats {
        /// Current counters.
        stats: StatsView,
    },

    /// Area effect landed on these tiles.
    Flash {
        /// Affected coordinates.
        tiles: Vec<(usize, usize)>,
    },

    /// Team score changed.
    Score {
        /// Sky-blue goals.
        sky_blue: u32,
        /// Fuchsia goals.
        fuchsia: u32,
    },
}

impl Update {
    /// Shorthand for a text message.
    pub fn message(text: impl Into<String>) -> Self {
        Update::Message { text: text.into() }
    }

    /// Shorthand for a sound trigger.
    pub fn sound(name: impl Into<String>) -> Self {
        Update::Sound { name: name.into() }
    }
}
