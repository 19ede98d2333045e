//! Non-players
//!
//! Autonomous actors driven by a scheduled control loop. They share the
//! movement engine with players but never evaluate reactions, never own a
//! camera and cannot load personal or individual stages.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::game::actor::{ActorId, Mobile, Team};

/// Autonomous actor.
pub struct NonPlayer {
    mobile: Mobile,
    cancelled: AtomicBool,
}

impl NonPlayer {
    /// New detached non-player.
    pub fn new(team: Team, health: i32) -> Arc<Self> {
        Arc::new(Self {
            mobile: Mobile::new(ActorId::new(), team, health),
            cancelled: AtomicBool::new(false),
        })
    }

    /// Shared actor component.
    pub fn mobile(&self) -> &Mobile {
        &self.mobile
    }

    /// Identifier.
    pub fn id(&self) -> ActorId {
        self.mobile.id()
    }

    /// Stop the control loop before its next action. Returns false if it
    /// was already cancelled.
    pub fn cancel(&self) -> bool {
        !self.cancelled.swap(true, Ordering::SeqCst)
    }

    /// Control loop should stop.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}
