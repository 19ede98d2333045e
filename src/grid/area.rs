//! Area Catalog
//!
//! Static area templates and the material table, deserialized from
//! `materials.json` and `areas.json`. Templates are validated once at load
//! so stage construction never fails.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::core::Direction;
use crate::grid::material::Material;

// =============================================================================
// Errors
// =============================================================================

/// Catalog loading errors.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// A catalog file could not be read.
    #[error("failed to read {}: {source}", path.display())]
    Io {
        /// File path.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },

    /// Malformed JSON.
    #[error("invalid catalog json: {0}")]
    Json(#[from] serde_json::Error),

    /// A grid cell names a material that does not exist.
    #[error("area {area}: unknown material index {index}")]
    UnknownMaterial {
        /// Area name.
        area: String,
        /// Offending index.
        index: usize,
    },

    /// Grid rows differ in length.
    #[error("area {area}: row {row} has {found} tiles, expected {expected}")]
    RaggedGrid {
        /// Area name.
        area: String,
        /// Offending row.
        row: usize,
        /// Width of row 0.
        expected: usize,
        /// Width of the offending row.
        found: usize,
    },

    /// Grid has no tiles.
    #[error("area {0} has no tiles")]
    EmptyGrid(String),

    /// A placement or transport source lies outside the grid.
    #[error("area {area}: {what} at ({y}, {x}) is outside the grid")]
    OutOfBounds {
        /// Area name.
        area: String,
        /// What was being placed.
        what: &'static str,
        /// Row.
        y: usize,
        /// Column.
        x: usize,
    },

    /// Two areas share a name.
    #[error("duplicate area {0}")]
    DuplicateArea(String),
}

// =============================================================================
// Template types
// =============================================================================

/// How references to an area resolve to stage instances.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum LoadStrategy {
    /// One instance in the world registry.
    #[default]
    Shared,
    /// One instance per player.
    Personal,
    /// A fresh instance on every reference.
    Individual,
}

/// Item spawning run when a player enters a stage.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SpawnAction {
    /// Spawn nothing.
    #[default]
    None,
    /// Occasionally drop boosts or a power-up, favouring covered tiles.
    Basic,
    /// Always drop boosts at a fixed tile.
    Boosts {
        /// Row.
        y: usize,
        /// Column.
        x: usize,
    },
    /// Always drop a square power-up at a fixed tile.
    Power {
        /// Row.
        y: usize,
        /// Column.
        x: usize,
        /// Square radius.
        radius: i32,
    },
}

/// Names of adjacent stages.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Neighbors {
    /// Above row 0.
    #[serde(default)]
    pub north: Option<String>,
    /// Below the last row.
    #[serde(default)]
    pub south: Option<String>,
    /// Right of the last column.
    #[serde(default)]
    pub east: Option<String>,
    /// Left of column 0.
    #[serde(default)]
    pub west: Option<String>,
}

impl Neighbors {
    /// Stage adjacent across the `direction` edge.
    pub fn toward(&self, direction: Direction) -> Option<&str> {
        let name = match direction {
            Direction::North => &self.north,
            Direction::South => &self.south,
            Direction::East => &self.east,
            Direction::West => &self.west,
        };
        name.as_deref().filter(|name| !name.is_empty())
    }
}

/// An interactable placed when the stage is built.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Placement {
    /// Row.
    pub y: usize,
    /// Column.
    pub x: usize,
    /// Interactable name.
    pub name: String,
    /// Pushable.
    #[serde(default)]
    pub pushable: bool,
    /// Walkable.
    #[serde(default)]
    pub walkable: bool,
    /// Fragile.
    #[serde(default)]
    pub fragile: bool,
    /// Refuses teleport links.
    #[serde(default)]
    pub reject_teleport: bool,
    /// Reaction kind looked up in the reaction table.
    #[serde(default)]
    pub reactions: Option<String>,
}

/// A teleport link installed when the stage is built.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transport {
    /// Source row.
    pub source_y: usize,
    /// Source column.
    pub source_x: usize,
    /// Destination stage name.
    pub dest_stage: String,
    /// Destination row. Not validated against the destination.
    pub dest_y: i32,
    /// Destination column. Not validated against the destination.
    pub dest_x: i32,
    /// Objects cannot be pushed through.
    #[serde(default)]
    pub reject_interactable: bool,
    /// Actors cannot step through.
    #[serde(default, alias = "rejectTeleport")]
    pub reject_actor: bool,
}

/// Static description of a stage.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AreaTemplate {
    /// Unique name; also the stage name.
    pub name: String,
    /// Actors on this stage take no damage.
    #[serde(default)]
    pub safe: bool,
    /// Material indices, row-major.
    pub tiles: Vec<Vec<usize>>,
    /// Objects placed at build time.
    #[serde(default)]
    pub interactables: Vec<Placement>,
    /// Teleport links.
    #[serde(default)]
    pub transports: Vec<Transport>,
    /// Adjacent stages.
    #[serde(flatten)]
    pub neighbors: Neighbors,
    /// Instance resolution.
    #[serde(default)]
    pub load_strategy: LoadStrategy,
    /// Spawning on player entry.
    #[serde(default)]
    pub spawn_action: SpawnAction,
}

impl AreaTemplate {
    /// Row count.
    pub fn height(&self) -> usize {
        self.tiles.len()
    }

    /// Column count.
    pub fn width(&self) -> usize {
        self.tiles.first().map_or(0, Vec::len)
    }

    fn validate(&self, material_count: usize) -> Result<(), CatalogError> {
        let width = self.width();
        if width == 0 {
            return Err(CatalogError::EmptyGrid(self.name.clone()));
        }
        for (row, cells) in self.tiles.iter().enumerate() {
            if cells.len() != width {
                return Err(CatalogError::RaggedGrid {
                    area: self.name.clone(),
                    row,
                    expected: width,
                    found: cells.len(),
                });
            }
            if let Some(&index) = cells.iter().find(|&&index| index >= material_count) {
                return Err(CatalogError::UnknownMaterial {
                    area: self.name.clone(),
                    index,
                });
            }
        }

        let height = self.height();
        let sources = self
            .interactables
            .iter()
            .map(|p| ("interactable", p.y, p.x))
            .chain(self.transports.iter().map(|t| ("transport", t.source_y, t.source_x)));
        for (what, y, x) in sources {
            if y >= height || x >= width {
                return Err(CatalogError::OutOfBounds {
                    area: self.name.clone(),
                    what,
                    y,
                    x,
                });
            }
        }
        Ok(())
    }
}

// =============================================================================
// Catalog
// =============================================================================

/// Materials and area templates.
#[derive(Clone, Debug, Default)]
pub struct Catalog {
    materials: Vec<Arc<Material>>,
    areas: HashMap<String, AreaTemplate>,
}

impl Catalog {
    /// Validate and index.
    pub fn new(materials: Vec<Material>, areas: Vec<AreaTemplate>) -> Result<Self, CatalogError> {
        let mut catalog = Self {
            materials: materials.into_iter().map(Arc::new).collect(),
            areas: HashMap::with_capacity(areas.len()),
        };
        for area in areas {
            catalog.insert_area(area)?;
        }
        Ok(catalog)
    }

    /// Parse the two catalog documents.
    pub fn from_json(materials: &str, areas: &str) -> Result<Self, CatalogError> {
        let materials: Vec<Material> = serde_json::from_str(materials)?;
        let areas: Vec<AreaTemplate> = serde_json::from_str(areas)?;
        Self::new(materials, areas)
    }

    /// Read `materials.json` and `areas.json` from `dir`.
    pub fn load_dir(dir: impl AsRef<Path>) -> Result<Self, CatalogError> {
        let dir = dir.as_ref();
        let read = |name: &str| {
            let path = dir.join(name);
            std::fs::read_to_string(&path).map_err(|source| CatalogError::Io { path, source })
        };
        let catalog = Self::from_json(&read("materials.json")?, &read("areas.json")?)?;
        info!(
            "Loaded catalog from {}: {} materials, {} areas",
            dir.display(),
            catalog.materials.len(),
            catalog.areas.len()
        );
        Ok(catalog)
    }

    /// Add one area after validating it against the material table.
    pub fn insert_area(&mut self, area: AreaTemplate) -> Result<(), CatalogError> {
        area.validate(self.materials.len())?;
        if self.areas.contains_key(&area.name) {
            return Err(CatalogError::DuplicateArea(area.name));
        }
        self.areas.insert(area.name.clone(), area);
        Ok(())
    }

    /// Append a material, returning its index.
    pub fn push_material(&mut self, material: Material) -> usize {
        self.materials.push(Arc::new(material));
        self.materials.len() - 1
    }

    /// Template by name.
    pub fn area(&self, name: &str) -> Option<&AreaTemplate> {
        self.areas.get(name)
    }

    /// Material by index.
    pub fn material(&self, index: usize) -> Option<&Arc<Material>> {
        self.materials.get(index)
    }

    /// Number of areas.
    pub fn area_count(&self) -> usize {
        self.areas.len()
    }
}
