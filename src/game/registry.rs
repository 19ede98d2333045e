//! Stage Registry
//!
//! Stage lookup by name. Shared instances live in the world map, personal
//! instances in the requesting player's map, and individual instances are
//! rebuilt on every reference. The map lock is held only for the lookup
//! and the insert; stages are built outside it and the first instance
//! inserted under a name wins.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tracing::{debug, info, warn};

use crate::core::sync::lock;
use crate::game::actor::ActorRef;
use crate::game::world::World;
use crate::grid::area::{AreaTemplate, LoadStrategy};
use crate::grid::stage::Stage;

/// Shared stage instances by name.
#[derive(Debug, Default)]
pub struct StageRegistry {
    stages: Mutex<HashMap<String, Arc<Stage>>>,
}

impl StageRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registered instance.
    pub fn get(&self, name: &str) -> Option<Arc<Stage>> {
        lock(&self.stages).get(name).cloned()
    }

    /// Registered instance, building one with `build` if absent. `build`
    /// runs without the lock; if another thread registers first, its
    /// instance is returned and ours is dropped.
    pub fn get_or_insert_with(&self, name: &str, build: impl FnOnce() -> Stage) -> Arc<Stage> {
        if let Some(stage) = self.get(name) {
            return stage;
        }
        let built = Arc::new(build());
        let mut stages = lock(&self.stages);
        Arc::clone(stages.entry(name.to_string()).or_insert(built))
    }

    /// Register `stage` unless the name is taken. Returns the registered
    /// instance.
    pub fn insert(&self, stage: Stage) -> Arc<Stage> {
        let mut stages = lock(&self.stages);
        Arc::clone(
            stages
                .entry(stage.name().to_string())
                .or_insert_with(|| Arc::new(stage)),
        )
    }

    /// Registered names.
    pub fn names(&self) -> Vec<String> {
        lock(&self.stages).keys().cloned().collect()
    }

    /// Number of registered stages.
    pub fn len(&self) -> usize {
        lock(&self.stages).len()
    }

    /// Nothing registered.
    pub fn is_empty(&self) -> bool {
        lock(&self.stages).is_empty()
    }
}

impl World {
    /// Register a hand-built stage in the shared map.
    pub fn insert_stage(&self, stage: Stage) -> Arc<Stage> {
        self.stages().insert(stage)
    }

    /// Resolve `name` for `actor`. Registered shared stages win; otherwise
    /// the catalog template decides the instance. Non-players cannot load
    /// personal or individual stages.
    pub fn fetch_stage(&self, actor: &ActorRef, name: &str) -> Option<Arc<Stage>> {
        if let Some(stage) = self.stages().get(name) {
            return Some(stage);
        }
        let Some(template) = self.catalog().area(name) else {
            warn!("Unknown stage {}", name);
            return None;
        };

        match template.load_strategy {
            LoadStrategy::Shared => Some(
                self.stages()
                    .get_or_insert_with(name, || self.build_stage(template)),
            ),
            LoadStrategy::Personal => {
                let ActorRef::Player(player) = actor else {
                    debug!("Non-player refused personal stage {}", name);
                    return None;
                };
                if let Some(stage) = player.personal_stage(name) {
                    return Some(stage);
                }
                let built = Arc::new(self.build_stage(template));
                Some(player.insert_personal_stage(built))
            }
            LoadStrategy::Individual => match actor {
                ActorRef::Player(_) => Some(Arc::new(self.build_stage(template))),
                ActorRef::Npc(_) => {
                    debug!("Non-player refused individual stage {}", name);
                    None
                }
            },
        }
    }

    fn build_stage(&self, template: &AreaTemplate) -> Stage {
        info!(
            "Building stage {} ({}x{})",
            template.name,
            template.height(),
            template.width()
        );
        Stage::from_template(template, self.catalog(), self.reactions(), self.config())
    }
}
