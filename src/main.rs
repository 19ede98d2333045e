//! Gridrealm Server
//!
//! Local driver for the world core. Loads the area catalog, joins one
//! player and feeds it commands read from stdin, printing every update the
//! player receives as a JSON line.

use std::sync::Arc;

use anyhow::Context;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use gridrealm::{
    game::{dispatch, ActorRef, Command, Team},
    persistence::MemoryStore,
    Catalog, World, WorldConfig, VERSION,
};
use gridrealm::game::reactions::ReactionTable;

const DEMO_MATERIALS: &str = include_str!("../data/materials.json");
const DEMO_AREAS: &str = include_str!("../data/areas.json");

/// Non-players wandering the meadow at startup.
const DEMO_NPCS: [(i32, i32); 2] = [(3, 3), (8, 6)];

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    info!("Gridrealm Server v{}", VERSION);

    let config = WorldConfig::from_env();
    let catalog = match Catalog::load_dir(&config.data_dir) {
        Ok(catalog) => catalog,
        Err(e) => {
            warn!("Falling back to built-in areas: {}", e);
            Catalog::from_json(DEMO_MATERIALS, DEMO_AREAS).context("built-in catalog is invalid")?
        }
    };

    let world = World::new(
        config,
        catalog,
        ReactionTable::standard(),
        Arc::new(MemoryStore::new()),
    );

    for (y, x) in DEMO_NPCS {
        if world.spawn_npc("meadow", y, x, Team::Unaligned).is_none() {
            warn!("Could not place non-player at meadow ({}, {})", y, x);
        }
    }

    let username = std::env::var("GRIDREALM_USERNAME").unwrap_or_else(|_| "local".to_string());
    let (tx, mut rx) = mpsc::unbounded_channel();
    let player = world
        .join(username, Team::SkyBlue, tx)
        .context("failed to join the world")?;
    info!("Joined as {} ({})", player.username(), player.id());

    let printer = tokio::spawn(async move {
        while let Some(update) = rx.recv().await {
            match serde_json::to_string(&update) {
                Ok(line) => println!("{}", line),
                Err(e) => warn!("Unprintable update: {}", e),
            }
        }
    });

    let actor = ActorRef::from(Arc::clone(&player));
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line.context("failed to read stdin")? else {
                    break;
                };
                if line.trim() == "quit" {
                    break;
                }
                match line.parse::<Command>() {
                    Ok(command) => {
                        dispatch(&world, &actor, command);
                    }
                    Err(e) => warn!("{}", e),
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted");
                break;
            }
        }
    }

    world.disconnect(&player);
    world.shutdown();
    drop(actor);
    drop(player);
    printer.abort();

    info!("Goodbye");
    Ok(())
}
