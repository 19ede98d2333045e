//! Zones
//!
//! Fixed-size square blocks of a stage. A camera is registered in the zone
//! containing its window's top-left tile, together with a copy of that
//! top-left, so tile broadcasts can decide coverage from the zone lock
//! alone.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use crate::core::sync::lock;
use crate::game::actor::ActorId;
use crate::game::camera::Camera;

/// Camera registered in a zone.
#[derive(Clone)]
pub struct ZoneEntry {
    /// The registered camera.
    pub camera: Arc<Camera>,
    /// Window top row at registration.
    pub top: usize,
    /// Window left column at registration.
    pub left: usize,
}

impl ZoneEntry {
    /// Does this camera's window contain `(y, x)`.
    pub fn covers(&self, y: usize, x: usize) -> bool {
        y >= self.top
            && y < self.top + self.camera.height()
            && x >= self.left
            && x < self.left + self.camera.width()
    }
}

/// Camera membership for one block of tiles.
#[derive(Default)]
pub struct Zone {
    cameras: Mutex<BTreeMap<ActorId, ZoneEntry>>,
}

impl Zone {
    /// Empty zone.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register or refresh a camera.
    pub fn insert(&self, camera: Arc<Camera>, top: usize, left: usize) {
        let id = camera.id();
        lock(&self.cameras).insert(id, ZoneEntry { camera, top, left });
    }

    /// Unregister a camera. Returns false if it was not registered.
    pub fn remove(&self, id: ActorId) -> bool {
        lock(&self.cameras).remove(&id).is_some()
    }

    /// Is `id` registered here.
    pub fn contains(&self, id: ActorId) -> bool {
        lock(&self.cameras).contains_key(&id)
    }

    /// Registered camera count.
    pub fn len(&self) -> usize {
        lock(&self.cameras).len()
    }

    /// No cameras registered.
    pub fn is_empty(&self) -> bool {
        lock(&self.cameras).is_empty()
    }

    /// Run `f` on every entry under the zone lock. `f` must not take a
    /// camera position lock.
    pub fn for_each(&self, mut f: impl FnMut(&ZoneEntry)) {
        for entry in lock(&self.cameras).values() {
            f(entry);
        }
    }
}
