//! Tiles
//!
//! A tile owns three independently locked slots: the occupant map, the
//! interactable slot and the loot slot. The interactable slot is the one
//! push chains contend on; it is only ever acquired with `try_lock` along a
//! chain, and blocking acquisition is reserved for single-tile reads and
//! writes that never hold another slot.
//!
//! Lock order inside a tile: interactable → occupants. Snapshotting a tile
//! while its interactable slot is held must go through
//! [`Tile::snapshot_with`] using the held guard.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, RwLock};

use serde::{Deserialize, Serialize};

use crate::core::sync::{lock, read, try_lock, write};
use crate::core::Shape;
use crate::game::actor::{ActorId, ActorRef};
use crate::game::events::TileSnapshot;
use crate::grid::interactable::Interactable;
use crate::grid::material::Material;

/// Tile-level directive redirecting movement and pushes to another stage.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Teleport {
    /// Stage name resolved through the registry.
    pub dest_stage: String,
    /// Destination row.
    pub dest_y: i32,
    /// Destination column.
    pub dest_x: i32,
    /// Objects pushed into the link are refused.
    pub reject_interactable: bool,
    /// Actors stepping onto the link are refused.
    pub reject_actor: bool,
}

/// Items lying on a tile, collected by the next player to arrive.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Loot {
    /// Coins.
    pub money: u32,
    /// Boost charges.
    pub boosts: u32,
    /// Area-of-effect power-up.
    pub power: Option<Shape>,
}

impl Loot {
    /// Nothing to collect.
    pub fn is_empty(&self) -> bool {
        self.money == 0 && self.boosts == 0 && self.power.is_none()
    }
}

/// Atomic grid cell.
pub struct Tile {
    y: usize,
    x: usize,
    zone: usize,
    material: Arc<Material>,
    occupants: Mutex<BTreeMap<ActorId, ActorRef>>,
    interactable: Mutex<Option<Interactable>>,
    teleport: RwLock<Option<Teleport>>,
    loot: Mutex<Loot>,
}

impl Tile {
    /// Create an empty tile.
    pub fn new(y: usize, x: usize, zone: usize, material: Arc<Material>) -> Self {
        Self {
            y,
            x,
            zone,
            material,
            occupants: Mutex::new(BTreeMap::new()),
            interactable: Mutex::new(None),
            teleport: RwLock::new(None),
            loot: Mutex::new(Loot::default()),
        }
    }

    /// Row.
    #[inline]
    pub fn y(&self) -> usize {
        self.y
    }

    /// Column.
    #[inline]
    pub fn x(&self) -> usize {
        self.x
    }

    /// Index of the zone this tile belongs to.
    #[inline]
    pub fn zone(&self) -> usize {
        self.zone
    }

    /// Static material.
    #[inline]
    pub fn material(&self) -> &Material {
        &self.material
    }

    // =========================================================================
    // Interactable slot
    // =========================================================================

    /// Non-blocking acquire of the interactable slot.
    pub fn try_slot(&self) -> Option<MutexGuard<'_, Option<Interactable>>> {
        try_lock(&self.interactable)
    }

    /// Blocking acquire of the interactable slot. Never call while holding
    /// another tile's slot.
    pub fn slot(&self) -> MutexGuard<'_, Option<Interactable>> {
        lock(&self.interactable)
    }

    /// Can an actor step here right now.
    pub fn walkable(&self) -> bool {
        match self.slot().as_ref() {
            None => self.material.walkable,
            Some(item) => item.walkable,
        }
    }

    /// Name of the current interactable, if any.
    pub fn interactable_name(&self) -> Option<String> {
        self.slot().as_ref().map(|item| item.name.clone())
    }

    /// Place `item` if the slot is free and the material accepts objects.
    /// Returns the item back on refusal or contention.
    pub fn try_place(&self, item: Interactable) -> Result<(), Interactable> {
        if !self.material.walkable {
            return Err(item);
        }
        match self.try_slot() {
            Some(mut slot) if slot.is_none() => {
                *slot = Some(item);
                Ok(())
            }
            _ => Err(item),
        }
    }

    // =========================================================================
    // Teleport
    // =========================================================================

    /// Current teleport link.
    pub fn teleport(&self) -> Option<Teleport> {
        read(&self.teleport).clone()
    }

    /// True if the tile redirects movement.
    pub fn has_teleport(&self) -> bool {
        read(&self.teleport).is_some()
    }

    /// Replace the teleport link.
    pub fn set_teleport(&self, teleport: Option<Teleport>) {
        *write(&self.teleport) = teleport;
    }

    // =========================================================================
    // Occupants
    // =========================================================================

    /// Add an actor to the occupant map.
    pub fn add_occupant(&self, actor: ActorRef) {
        lock(&self.occupants).insert(actor.id(), actor);
    }

    /// Remove an actor. Returns false if it was not here.
    pub fn remove_occupant(&self, id: ActorId) -> bool {
        lock(&self.occupants).remove(&id).is_some()
    }

    /// Snapshot of current occupants.
    pub fn occupants(&self) -> Vec<ActorRef> {
        lock(&self.occupants).values().cloned().collect()
    }

    /// Is `id` on this tile.
    pub fn has_occupant(&self, id: ActorId) -> bool {
        lock(&self.occupants).contains_key(&id)
    }

    /// Number of actors on the tile.
    pub fn occupant_count(&self) -> usize {
        lock(&self.occupants).len()
    }

    // =========================================================================
    // Loot
    // =========================================================================

    /// Take everything lying on the tile.
    pub fn take_loot(&self) -> Loot {
        std::mem::take(&mut *lock(&self.loot))
    }

    /// Drop coins on the tile.
    pub fn add_money(&self, amount: u32) {
        lock(&self.loot).money += amount;
    }

    /// Drop boost charges on the tile.
    pub fn add_boosts(&self, count: u32) {
        lock(&self.loot).boosts += count;
    }

    /// Place a power-up, replacing any existing one.
    pub fn set_power(&self, shape: Shape) {
        lock(&self.loot).power = Some(shape);
    }

    /// Current loot without collecting it.
    pub fn loot(&self) -> Loot {
        lock(&self.loot).clone()
    }

    // =========================================================================
    // Snapshots
    // =========================================================================

    /// Snapshot using an interactable slot already held by the caller.
    pub fn snapshot_with(&self, slot: &Option<Interactable>) -> TileSnapshot {
        let occupants = lock(&self.occupants).keys().copied().collect();
        TileSnapshot {
            y: self.y,
            x: self.x,
            material: self.material.common_name.clone(),
            walkable: self.material.walkable,
            interactable: slot.as_ref().map(|item| item.name.clone()),
            occupants,
            loot: !lock(&self.loot).is_empty(),
            teleport: self.has_teleport(),
        }
    }

    /// Snapshot acquiring the interactable slot. Never call while holding it.
    pub fn snapshot(&self) -> TileSnapshot {
        let slot = self.slot();
        self.snapshot_with(&slot)
    }
}
