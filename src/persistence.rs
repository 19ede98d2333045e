//! Persistence Port
//!
//! Gameplay never waits on storage. The world hands jobs to
//! [`crate::game::world::World::persist`], which runs them off the command
//! path and logs failures.

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::sync::lock;
use crate::game::actor::{ActorId, Team};

/// Storage errors.
#[derive(Debug, Error)]
pub enum PersistenceError {
    /// Backend cannot be reached.
    #[error("persistence backend unavailable: {0}")]
    Unavailable(String),

    /// Record could not be encoded.
    #[error("serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Unknown sort field.
    #[error("unknown record field: {0}")]
    UnknownField(String),
}

/// A confirmed kill.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct KillEvent {
    /// Actor credited with the kill.
    pub killer: ActorId,
    /// Killer display name.
    pub killer_name: String,
    /// Actor that died.
    pub victim: ActorId,
    /// Victim display name.
    pub victim_name: String,
    /// Stage the victim died on.
    pub stage: String,
    /// Row.
    pub y: usize,
    /// Column.
    pub x: usize,
    /// When.
    pub at: DateTime<Utc>,
}

/// Persisted player counters.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerRecord {
    /// Player id.
    pub id: ActorId,
    /// Display name.
    pub username: String,
    /// Team.
    pub team: Team,
    /// Coins held.
    pub money: u32,
    /// Lifetime kills.
    pub kill_count: u32,
    /// Current streak.
    pub kill_streak: u32,
    /// Lifetime deaths.
    pub death_count: u32,
    /// Lifetime goals.
    pub goals: u32,
    /// Stage at save time.
    pub stage: Option<String>,
    /// Save time.
    pub updated_at: DateTime<Utc>,
}

/// Sortable record fields.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RecordField {
    /// Coins held.
    Money,
    /// Lifetime kills.
    KillCount,
    /// Current streak.
    KillStreak,
    /// Lifetime deaths.
    DeathCount,
    /// Lifetime goals.
    Goals,
}

impl RecordField {
    /// Field value of `record`.
    pub fn of(self, record: &PlayerRecord) -> u32 {
        match self {
            RecordField::Money => record.money,
            RecordField::KillCount => record.kill_count,
            RecordField::KillStreak => record.kill_streak,
            RecordField::DeathCount => record.death_count,
            RecordField::Goals => record.goals,
        }
    }
}

impl FromStr for RecordField {
    type Err = PersistenceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "money" => Ok(RecordField::Money),
            "killCount" => Ok(RecordField::KillCount),
            "killStreak" => Ok(RecordField::KillStreak),
            "deathCount" => Ok(RecordField::DeathCount),
            "goals" => Ok(RecordField::Goals),
            other => Err(PersistenceError::UnknownField(other.to_string())),
        }
    }
}

/// Storage backend.
pub trait Persistence: Send + Sync {
    /// Append a kill event.
    fn save_kill_event(&self, event: &KillEvent) -> Result<(), PersistenceError>;

    /// Upsert a player record.
    fn update_record(&self, record: &PlayerRecord) -> Result<(), PersistenceError>;

    /// Highest `n` records by `field`, descending.
    fn top_n_by_field(&self, field: RecordField, n: usize) -> Result<Vec<PlayerRecord>, PersistenceError>;
}

// =============================================================================
// In-memory store
// =============================================================================

/// Process-local store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    kills: Mutex<Vec<KillEvent>>,
    records: Mutex<HashMap<ActorId, PlayerRecord>>,
    offline: AtomicBool,
}

impl MemoryStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate an outage: every call fails while set.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Stored kill events.
    pub fn kill_events(&self) -> Vec<KillEvent> {
        lock(&self.kills).clone()
    }

    /// Stored record for `id`.
    pub fn record(&self, id: ActorId) -> Option<PlayerRecord> {
        lock(&self.records).get(&id).cloned()
    }

    fn check(&self) -> Result<(), PersistenceError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(PersistenceError::Unavailable("memory store offline".to_string()));
        }
        Ok(())
    }
}

impl Persistence for MemoryStore {
    fn save_kill_event(&self, event: &KillEvent) -> Result<(), PersistenceError> {
        self.check()?;
        lock(&self.kills).push(event.clone());
        Ok(())
    }

    fn update_record(&self, record: &PlayerRecord) -> Result<(), PersistenceError> {
        self.check()?;
        lock(&self.records).insert(record.id, record.clone());
        Ok(())
    }

    fn top_n_by_field(&self, field: RecordField, n: usize) -> Result<Vec<PlayerRecord>, PersistenceError> {
        self.check()?;
        let mut records: Vec<PlayerRecord> = lock(&self.records).values().cloned().collect();
        records.sort_by(|a, b| field.of(b).cmp(&field.of(a)).then(a.id.cmp(&b.id)));
        records.truncate(n);
        Ok(records)
    }
}
