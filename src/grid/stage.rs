//! Stages
//!
//! A stage is a rectangular tile grid stored as one contiguous `Vec<Tile>`
//! in row-major order. Besides the tiles it owns the registry of players
//! currently on it and the zones cameras register in.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Mutex};

use tracing::warn;

use crate::config::WorldConfig;
use crate::core::sync::lock;
use crate::game::actor::ActorId;
use crate::game::events::{TileSnapshot, Update};
use crate::game::player::Player;
use crate::game::reactions::ReactionTable;
use crate::grid::area::{AreaTemplate, Catalog, Neighbors, SpawnAction};
use crate::grid::interactable::Interactable;
use crate::grid::material::Material;
use crate::grid::tile::{Teleport, Tile};
use crate::grid::zone::Zone;

/// A bounded grid region.
pub struct Stage {
    name: String,
    height: usize,
    width: usize,
    tiles: Vec<Tile>,

    zone_size: usize,
    zones_wide: usize,
    zones: Vec<Zone>,
    view_height: usize,
    view_width: usize,

    neighbors: Neighbors,
    safe: bool,
    spawn_action: SpawnAction,

    players: Mutex<BTreeMap<ActorId, Arc<Player>>>,
}

impl Stage {
    /// Build from a row-major material grid. Rows must be non-empty and of
    /// equal length.
    pub fn from_materials(
        name: impl Into<String>,
        grid: Vec<Vec<Arc<Material>>>,
        config: &WorldConfig,
    ) -> Self {
        let height = grid.len();
        let width = grid.first().map_or(0, Vec::len);
        let zone_size = config.zone_size.max(1);
        let zones_wide = width.div_ceil(zone_size).max(1);
        let zones_high = height.div_ceil(zone_size).max(1);

        let mut tiles = Vec::with_capacity(height * width);
        for (y, row) in grid.into_iter().enumerate() {
            for (x, material) in row.into_iter().enumerate() {
                let zone = (y / zone_size) * zones_wide + x / zone_size;
                tiles.push(Tile::new(y, x, zone, material));
            }
        }

        Self {
            name: name.into(),
            height,
            width,
            tiles,
            zone_size,
            zones_wide,
            zones: (0..zones_wide * zones_high).map(|_| Zone::new()).collect(),
            view_height: config.view_height,
            view_width: config.view_width,
            neighbors: Neighbors::default(),
            safe: false,
            spawn_action: SpawnAction::None,
            players: Mutex::new(BTreeMap::new()),
        }
    }

    /// Uniform grid of one material.
    pub fn filled(
        name: impl Into<String>,
        height: usize,
        width: usize,
        material: Material,
        config: &WorldConfig,
    ) -> Self {
        let material = Arc::new(material);
        let grid = (0..height)
            .map(|_| vec![Arc::clone(&material); width])
            .collect();
        Self::from_materials(name, grid, config)
    }

    /// Instantiate a validated template.
    pub fn from_template(
        template: &AreaTemplate,
        catalog: &Catalog,
        reactions: &ReactionTable,
        config: &WorldConfig,
    ) -> Self {
        let fallback = Arc::new(Material::wall("void"));
        let grid = template
            .tiles
            .iter()
            .map(|row| {
                row.iter()
                    .map(|&index| catalog.material(index).cloned().unwrap_or_else(|| Arc::clone(&fallback)))
                    .collect()
            })
            .collect();

        let mut stage = Self::from_materials(template.name.clone(), grid, config);
        stage.neighbors = template.neighbors.clone();
        stage.safe = template.safe;
        stage.spawn_action = template.spawn_action.clone();

        for placement in &template.interactables {
            let mut item = Interactable::new(placement.name.clone(), placement.pushable);
            item.walkable = placement.walkable;
            item.fragile = placement.fragile;
            item.reject_teleport = placement.reject_teleport;
            if let Some(kind) = &placement.reactions {
                match reactions.get(kind) {
                    Some(list) => item.reactions = list,
                    None => warn!("Area {}: unknown reaction kind {}", template.name, kind),
                }
            }
            if let Some(tile) = stage.tile(placement.y as i32, placement.x as i32) {
                *tile.slot() = Some(item);
            }
        }

        for transport in &template.transports {
            if let Some(tile) = stage.tile(transport.source_y as i32, transport.source_x as i32) {
                tile.set_teleport(Some(Teleport {
                    dest_stage: transport.dest_stage.clone(),
                    dest_y: transport.dest_y,
                    dest_x: transport.dest_x,
                    reject_interactable: transport.reject_interactable,
                    reject_actor: transport.reject_actor,
                }));
            }
        }

        stage
    }

    /// Builder: mark the stage safe from damage.
    pub fn with_safe(mut self, safe: bool) -> Self {
        self.safe = safe;
        self
    }

    /// Builder: set adjacent stage names.
    pub fn with_neighbors(mut self, neighbors: Neighbors) -> Self {
        self.neighbors = neighbors;
        self
    }

    // =========================================================================
    // Geometry
    // =========================================================================

    /// Stage name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Row count.
    pub fn height(&self) -> usize {
        self.height
    }

    /// Column count.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Adjacent stage names.
    pub fn neighbors(&self) -> &Neighbors {
        &self.neighbors
    }

    /// Actors here take no damage.
    pub fn is_safe(&self) -> bool {
        self.safe
    }

    /// Spawning run on player entry.
    pub fn spawn_action(&self) -> &SpawnAction {
        &self.spawn_action
    }

    /// Row-major index of `(y, x)` if in bounds.
    #[inline]
    pub fn index_of(&self, y: i32, x: i32) -> Option<usize> {
        if y < 0 || x < 0 {
            return None;
        }
        let (y, x) = (y as usize, x as usize);
        (y < self.height && x < self.width).then(|| y * self.width + x)
    }

    /// Tile at `(y, x)` if in bounds.
    pub fn tile(&self, y: i32, x: i32) -> Option<&Tile> {
        self.index_of(y, x).map(|index| &self.tiles[index])
    }

    /// Tile by index. Indices come from [`Stage::index_of`].
    #[inline]
    pub fn tile_at(&self, index: usize) -> &Tile {
        &self.tiles[index]
    }

    /// All tiles, row-major.
    pub fn tiles(&self) -> &[Tile] {
        &self.tiles
    }

    /// Index offset by `(dy, dx)` from `index`, if still on this stage.
    pub fn relative(&self, index: usize, dy: i32, dx: i32) -> Option<usize> {
        let y = (index / self.width) as i32 + dy;
        let x = (index % self.width) as i32 + dx;
        self.index_of(y, x)
    }

    /// Walkable tile indices split into (covered, uncovered), by material.
    pub fn walkable_tiles(&self) -> (Vec<usize>, Vec<usize>) {
        let mut covered = Vec::new();
        let mut uncovered = Vec::new();
        for (index, tile) in self.tiles.iter().enumerate() {
            if !tile.material().walkable {
                continue;
            }
            if tile.material().is_covered() {
                covered.push(index);
            } else {
                uncovered.push(index);
            }
        }
        (covered, uncovered)
    }

    /// Place `item` on a free walkable tile, trying covered tiles before
    /// uncovered ones. `pick` chooses the starting candidate; candidates are
    /// then tried in order. Returns the item back if every tile is taken.
    pub fn place_somewhere(
        &self,
        mut item: Interactable,
        pick: impl FnOnce(usize) -> usize,
    ) -> Result<usize, Interactable> {
        let (covered, uncovered) = self.walkable_tiles();
        let total = covered.len() + uncovered.len();
        if total == 0 {
            return Err(item);
        }
        let start = pick(total);
        for group in [&covered, &uncovered] {
            if group.is_empty() {
                continue;
            }
            let first = start % group.len();
            for offset in 0..group.len() {
                let index = group[(first + offset) % group.len()];
                match self.tiles[index].try_place(item) {
                    Ok(()) => {
                        self.publish_tile(index);
                        return Ok(index);
                    }
                    Err(back) => item = back,
                }
            }
        }
        Err(item)
    }

    // =========================================================================
    // Zones
    // =========================================================================

    /// Zone index containing `(y, x)`.
    pub fn zone_index(&self, y: usize, x: usize) -> usize {
        (y / self.zone_size) * self.zones_wide + x / self.zone_size
    }

    /// Zone by index.
    pub fn zone(&self, index: usize) -> &Zone {
        &self.zones[index]
    }

    /// Number of zones.
    pub fn zone_count(&self) -> usize {
        self.zones.len()
    }

    // =========================================================================
    // Player registry
    // =========================================================================

    /// Register a player on this stage.
    pub fn add_player(&self, player: Arc<Player>) {
        lock(&self.players).insert(player.id(), player);
    }

    /// Unregister. Returns false if absent.
    pub fn remove_player(&self, id: ActorId) -> bool {
        lock(&self.players).remove(&id).is_some()
    }

    /// Is `id` registered here.
    pub fn has_player(&self, id: ActorId) -> bool {
        lock(&self.players).contains_key(&id)
    }

    /// Registered players.
    pub fn players(&self) -> Vec<Arc<Player>> {
        lock(&self.players).values().cloned().collect()
    }

    /// Registered player count.
    pub fn player_count(&self) -> usize {
        lock(&self.players).len()
    }

    // =========================================================================
    // Broadcasting
    // =========================================================================

    /// Queue `update` to every player on the stage.
    pub fn broadcast(&self, update: Update) {
        for player in lock(&self.players).values() {
            player.send(update.clone());
        }
    }

    /// Queue `update` to every player on the stage except `skip`.
    pub fn broadcast_except(&self, skip: ActorId, update: Update) {
        for (id, player) in lock(&self.players).iter() {
            if *id != skip {
                player.send(update.clone());
            }
        }
    }

    /// Snapshot a tile and send it to every camera whose window covers it.
    /// Never call while holding that tile's interactable slot.
    pub fn publish_tile(&self, index: usize) {
        let snapshot = self.tiles[index].snapshot();
        self.broadcast_tile(snapshot);
    }

    /// Like [`Stage::publish_tile`] using a slot guard the caller holds.
    pub fn publish_tile_with(&self, index: usize, slot: &Option<Interactable>) {
        let snapshot = self.tiles[index].snapshot_with(slot);
        self.broadcast_tile(snapshot);
    }

    /// Deliver a snapshot to covering cameras. Only zones that can hold a
    /// top-left whose window reaches the tile are visited.
    pub fn broadcast_tile(&self, snapshot: TileSnapshot) {
        let (y, x) = (snapshot.y, snapshot.x);
        let top_min = y.saturating_sub(self.view_height.saturating_sub(1));
        let left_min = x.saturating_sub(self.view_width.saturating_sub(1));

        for zone_y in (top_min / self.zone_size)..=(y / self.zone_size) {
            for zone_x in (left_min / self.zone_size)..=(x / self.zone_size) {
                let Some(zone) = self.zones.get(zone_y * self.zones_wide + zone_x) else {
                    continue;
                };
                zone.for_each(|entry| {
                    if entry.covers(y, x) {
                        entry.camera.send(Update::Tile {
                            tile: snapshot.clone(),
                        });
                    }
                });
            }
        }
    }
}

impl fmt::Debug for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Stage")
            .field("name", &self.name)
            .field("height", &self.height)
            .field("width", &self.width)
            .field("safe", &self.safe)
            .finish()
    }
}
