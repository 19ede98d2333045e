//! Scheduler
//!
//! Timed work on the tokio runtime: delayed effects and non-player control
//! loops. Both feed the normal command path. Without a runtime (plain unit
//! tests, synchronous tools) delayed jobs run inline and loops are not
//! started.

use std::sync::Arc;
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::core::Direction;
use crate::game::actor::ActorRef;
use crate::game::command::{dispatch, Command};
use crate::game::npc::NonPlayer;
use crate::game::world::World;

/// Run `job` after `delay`, unless the world shuts down first.
pub fn after<F>(world: &Arc<World>, delay: Duration, job: F)
where
    F: FnOnce(&Arc<World>) + Send + 'static,
{
    match Handle::try_current() {
        Ok(handle) => {
            let world = Arc::clone(world);
            handle.spawn(async move {
                tokio::time::sleep(delay).await;
                if !world.is_shut_down() {
                    job(&world);
                }
            });
        }
        Err(_) => job(world),
    }
}

/// Start the control loop of `npc`. Returns `None` outside a runtime.
pub fn spawn_npc_loop(world: &Arc<World>, npc: &Arc<NonPlayer>) -> Option<JoinHandle<()>> {
    let handle = Handle::try_current().ok()?;
    let world = Arc::clone(world);
    let npc = Arc::clone(npc);
    Some(handle.spawn(async move {
        let mut ticker = tokio::time::interval(world.config().npc_interval);
        // The first tick completes immediately.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            if npc.is_cancelled() || world.is_shut_down() {
                break;
            }
            npc_turn(&world, &npc);
        }
        debug!("Non-player {} stopped", npc.id());
    }))
}

/// One non-player action: usually a random step, sometimes an attack.
pub fn npc_turn(world: &Arc<World>, npc: &Arc<NonPlayer>) -> bool {
    let command = if world.one_in(4) {
        Command::Activate
    } else {
        Command::Step(Direction::ALL[world.random_index(Direction::ALL.len())])
    };
    dispatch(world, &ActorRef::Npc(Arc::clone(npc)), command)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WorldConfig;
    use crate::game::actor::Team;
    use crate::grid::area::Catalog;
    use crate::grid::material::Material;
    use crate::grid::stage::Stage;
    use std::sync::atomic::{AtomicBool, Ordering};

    fn world(interval: Duration) -> Arc<World> {
        let config = WorldConfig {
            npc_interval: interval,
            ..WorldConfig::default()
        };
        let world = World::in_memory(config, Catalog::default());
        world.insert_stage(Stage::filled("meadow", 12, 12, Material::floor("grass"), world.config()));
        world
    }

    #[test]
    fn test_after_runs_inline_without_runtime() {
        let world = world(Duration::from_millis(10));
        let ran = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&ran);
        after(&world, Duration::from_secs(60), move |_| flag.store(true, Ordering::SeqCst));
        assert!(ran.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_after_waits_for_delay() {
        let world = world(Duration::from_millis(10));
        let ran = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&ran);
        after(&world, Duration::from_millis(20), move |_| flag.store(true, Ordering::SeqCst));
        assert!(!ran.load(Ordering::SeqCst));
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(ran.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_after_skipped_on_shutdown() {
        let world = world(Duration::from_millis(10));
        let ran = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&ran);
        after(&world, Duration::from_millis(20), move |_| flag.store(true, Ordering::SeqCst));
        world.shutdown();
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(!ran.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_npc_loop_stops_on_cancel() {
        let world = world(Duration::from_millis(5));
        let npc = NonPlayer::new(Team::Unaligned, 100);
        let handle = spawn_npc_loop(&world, &npc).unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;
        npc.cancel();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("loop should stop after cancel")
            .unwrap();
    }

    #[tokio::test]
    async fn test_spawned_npc_wanders_until_shutdown() {
        let world = world(Duration::from_millis(5));
        let npc = world.spawn_npc("meadow", 6, 6, Team::Unaligned).unwrap();
        let start = npc.mobile().location().unwrap();

        let mut moved = false;
        for _ in 0..100 {
            tokio::time::sleep(Duration::from_millis(5)).await;
            if npc.mobile().location().is_some_and(|loc| loc != start) {
                moved = true;
                break;
            }
        }
        assert!(moved);

        world.shutdown();
        assert!(npc.is_cancelled());
    }
}
