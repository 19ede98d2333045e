//! World Configuration
//!
//! Tunables for cameras, zones, spawning and combat. Every field has a
//! default and can be overridden through a `GRIDREALM_*` environment
//! variable.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use tracing::warn;

/// World tunables.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WorldConfig {
    /// Camera window rows.
    pub view_height: usize,
    /// Camera window columns.
    pub view_width: usize,
    /// Rows/columns kept between the actor and the window edge.
    pub view_padding: usize,
    /// Side length of a zone in tiles.
    pub zone_size: usize,

    /// Stage new players join.
    pub spawn_stage: String,
    /// Join row.
    pub spawn_y: i32,
    /// Join column.
    pub spawn_x: i32,
    /// Stage dead players respawn on.
    pub respawn_stage: String,
    /// Respawn row.
    pub respawn_y: i32,
    /// Respawn column.
    pub respawn_x: i32,

    /// Player starting health.
    pub player_health: i32,
    /// Non-player starting health.
    pub npc_health: i32,
    /// Damage dealt by power-ups and non-player attacks.
    pub power_damage: i32,
    /// Money dropped on death is at least this much.
    pub death_drop_minimum: u32,
    /// Boost charges dropped by spawn actions.
    pub boost_drop: u32,

    /// Delay between non-player actions.
    pub npc_interval: Duration,
    /// Delay before an armed trap detonates.
    pub blast_delay: Duration,

    /// Directory holding `materials.json` and `areas.json`.
    pub data_dir: PathBuf,
    /// Seed for spawn placement and non-player movement.
    pub rng_seed: u64,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            view_height: 16,
            view_width: 16,
            view_padding: 4,
            zone_size: 8,
            spawn_stage: "clinic".to_string(),
            spawn_y: 2,
            spawn_x: 2,
            respawn_stage: "clinic".to_string(),
            respawn_y: 2,
            respawn_x: 2,
            player_health: 150,
            npc_health: 100,
            power_damage: 50,
            death_drop_minimum: 10,
            boost_drop: 10,
            npc_interval: Duration::from_millis(500),
            blast_delay: Duration::from_millis(200),
            data_dir: PathBuf::from("./data"),
            rng_seed: 0x6772_6964,
        }
    }
}

impl WorldConfig {
    /// Defaults overridden by `GRIDREALM_*` environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            view_height: env_or("GRIDREALM_VIEW_HEIGHT", defaults.view_height),
            view_width: env_or("GRIDREALM_VIEW_WIDTH", defaults.view_width),
            view_padding: env_or("GRIDREALM_VIEW_PADDING", defaults.view_padding),
            zone_size: env_or("GRIDREALM_ZONE_SIZE", defaults.zone_size),
            spawn_stage: std::env::var("GRIDREALM_SPAWN_STAGE").unwrap_or(defaults.spawn_stage),
            spawn_y: env_or("GRIDREALM_SPAWN_Y", defaults.spawn_y),
            spawn_x: env_or("GRIDREALM_SPAWN_X", defaults.spawn_x),
            respawn_stage: std::env::var("GRIDREALM_RESPAWN_STAGE")
                .unwrap_or(defaults.respawn_stage),
            respawn_y: env_or("GRIDREALM_RESPAWN_Y", defaults.respawn_y),
            respawn_x: env_or("GRIDREALM_RESPAWN_X", defaults.respawn_x),
            player_health: env_or("GRIDREALM_PLAYER_HEALTH", defaults.player_health),
            npc_health: env_or("GRIDREALM_NPC_HEALTH", defaults.npc_health),
            power_damage: env_or("GRIDREALM_POWER_DAMAGE", defaults.power_damage),
            death_drop_minimum: env_or("GRIDREALM_DEATH_DROP_MINIMUM", defaults.death_drop_minimum),
            boost_drop: env_or("GRIDREALM_BOOST_DROP", defaults.boost_drop),
            npc_interval: Duration::from_millis(env_or(
                "GRIDREALM_NPC_INTERVAL_MS",
                defaults.npc_interval.as_millis() as u64,
            )),
            blast_delay: Duration::from_millis(env_or(
                "GRIDREALM_BLAST_DELAY_MS",
                defaults.blast_delay.as_millis() as u64,
            )),
            data_dir: std::env::var("GRIDREALM_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.data_dir),
            rng_seed: env_or("GRIDREALM_RNG_SEED", defaults.rng_seed),
        }
    }

    /// Padding actually applied: large paddings would leave no band for the
    /// actor to move in.
    pub fn effective_padding(&self) -> usize {
        clamp_padding(self.view_padding, self.view_height, self.view_width)
    }
}

/// Clamp padding to `(min(height, width) - 1) / 2`.
pub fn clamp_padding(padding: usize, height: usize, width: usize) -> usize {
    padding.min(height.min(width).saturating_sub(1) / 2)
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    match std::env::var(key) {
        Ok(raw) => match raw.parse() {
            Ok(value) => value,
            Err(_) => {
                warn!("Ignoring unparsable {}={}", key, raw);
                default
            }
        },
        Err(_) => default,
    }
}
