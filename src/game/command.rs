//! Commands
//!
//! Text commands from a connection are parsed into [`Command`]s. Scheduled
//! work (non-player turns and delayed blasts) goes through the same
//! [`dispatch`] entry point.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use thiserror::Error;
use tracing::debug;

use crate::core::Direction;
use crate::game::actor::ActorRef;
use crate::game::combat;
use crate::game::movement;
use crate::game::world::World;
use crate::grid::stage::Stage;

/// Command parse failures.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandError {
    /// Blank input.
    #[error("empty command")]
    Empty,

    /// Not a known command.
    #[error("unknown command: {0}")]
    Unknown(String),
}

/// An action an actor can take.
#[derive(Clone, Debug)]
pub enum Command {
    /// One step.
    Step(Direction),
    /// Spend a boost to jump two tiles.
    Boost(Direction),
    /// Push the object under the actor in its facing direction.
    PushUnder,
    /// Cycle the neighbouring objects.
    Rotate {
        /// Clockwise or counter-clockwise.
        clockwise: bool,
    },
    /// Fire a power.
    Activate,
    /// Delayed trap blast; never parsed from text.
    Blast {
        /// Stage.
        stage: Arc<Stage>,
        /// Centre tile.
        index: usize,
        /// Square radius.
        radius: i32,
        /// Damage per actor.
        damage: i32,
    },
}

fn parse_direction(s: &str) -> Option<Direction> {
    Direction::ALL.into_iter().find(|direction| direction.as_str() == s)
}

impl FromStr for Command {
    type Err = CommandError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(CommandError::Empty);
        }
        if let Some(direction) = parse_direction(s) {
            return Ok(Command::Step(direction));
        }
        if let Some(direction) = s.strip_suffix("-boost").and_then(parse_direction) {
            return Ok(Command::Boost(direction));
        }
        match s {
            "push" => Ok(Command::PushUnder),
            "rotate" => Ok(Command::Rotate { clockwise: true }),
            "rotate-counter" => Ok(Command::Rotate { clockwise: false }),
            "activate" => Ok(Command::Activate),
            other => Err(CommandError::Unknown(other.to_string())),
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::Step(direction) => f.write_str(direction.as_str()),
            Command::Boost(direction) => write!(f, "{}-boost", direction.as_str()),
            Command::PushUnder => write!(f, "push"),
            Command::Rotate { clockwise: true } => write!(f, "rotate"),
            Command::Rotate { clockwise: false } => write!(f, "rotate-counter"),
            Command::Activate => write!(f, "activate"),
            Command::Blast { stage, index, .. } => write!(f, "blast {}#{}", stage.name(), index),
        }
    }
}

/// Execute `command` for `actor`. Returns true if anything happened.
pub fn dispatch(world: &Arc<World>, actor: &ActorRef, command: Command) -> bool {
    if world.is_shut_down() {
        return false;
    }
    if let ActorRef::Player(player) = actor {
        if !player.is_tangible() {
            debug!("Ignoring {} from departed {}", command, player.username());
            return false;
        }
    }

    match command {
        Command::Step(direction) => {
            actor.mobile().set_facing(direction);
            movement::step(world, actor, direction)
        }
        Command::Boost(direction) => {
            actor.mobile().set_facing(direction);
            match actor {
                ActorRef::Player(player) => movement::boost(world, player, direction),
                ActorRef::Npc(_) => movement::step(world, actor, direction),
            }
        }
        Command::PushUnder => movement::push_under(world, actor, actor.mobile().facing()),
        Command::Rotate { clockwise } => movement::rotate(actor, clockwise),
        Command::Activate => combat::activate_power(world, actor),
        Command::Blast {
            stage,
            index,
            radius,
            damage,
        } => match actor {
            ActorRef::Player(owner) => combat::blast(world, owner, &stage, index, radius, damage),
            ActorRef::Npc(_) => false,
        },
    }
}
