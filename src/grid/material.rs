//! Tile materials.
//!
//! A material never changes after the catalog is loaded; tiles share it
//! through an `Arc`.

use serde::{Deserialize, Serialize};

/// Static tile-type descriptor.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Material {
    /// Human readable name ("grass", "wall", ...).
    pub common_name: String,
    /// Can actors stand on it and can objects be placed on it.
    pub walkable: bool,
    /// Ground layer class.
    #[serde(default)]
    pub ground: String,
    /// Floor layer classes, bottom to top.
    #[serde(default)]
    pub floor: Vec<String>,
    /// Ceiling layer classes, bottom to top.
    #[serde(default)]
    pub ceiling: Vec<String>,
    /// Text shown to a player standing on the tile.
    #[serde(default)]
    pub display_text: Option<String>,
}

impl Material {
    /// Plain walkable floor.
    pub fn floor(name: &str) -> Self {
        Self {
            common_name: name.to_string(),
            walkable: true,
            ..Default::default()
        }
    }

    /// Plain blocking wall.
    pub fn wall(name: &str) -> Self {
        Self {
            common_name: name.to_string(),
            walkable: false,
            ..Default::default()
        }
    }

    /// A covered tile has at least one ceiling layer. Covered tiles are
    /// preferred when hiding objects.
    pub fn is_covered(&self) -> bool {
        self.ceiling.iter().any(|layer| !layer.is_empty())
    }
}
