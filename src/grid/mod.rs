//! Grid Module
//!
//! Static and mutable world geometry.
//!
//! ## Module Structure
//!
//! - `material`: Immutable tile-type descriptors
//! - `interactable`: Movable and reactive objects
//! - `tile`: Atomic grid cells and their locks
//! - `zone`: Camera membership blocks
//! - `stage`: Contiguous tile grids with player registries
//! - `area`: Catalog of templates loaded from JSON

pub mod area;
pub mod interactable;
pub mod material;
pub mod stage;
pub mod tile;
pub mod zone;

// Re-export key types
pub use area::{AreaTemplate, Catalog, CatalogError, LoadStrategy, SpawnAction};
pub use interactable::Interactable;
pub use material::Material;
pub use stage::Stage;
pub use tile::{Loot, Teleport, Tile};
pub use zone::Zone;
