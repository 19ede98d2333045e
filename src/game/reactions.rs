//! Interactable Reaction System
//!
//! A reactive interactable carries an ordered list of [`Reaction`]s. When a
//! push reaches it, the first reaction whose [`Predicate`] accepts the
//! incoming object and the acting actor runs its [`Effect`]. The effect may
//! mutate the reacting object in place and decides whether the push keeps
//! travelling.
//!
//! Effects never touch a tile other than the one being resolved. Anything
//! that does (relocating balls, destroying objects, launching or killing
//! the actor, area damage) is queued as a [`Deferred`] and executed once the
//! push chain has released its locks.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::error;

use crate::core::Direction;
use crate::game::actor::{ActorId, ActorRef, Team};
use crate::game::world::World;
use crate::grid::interactable::Interactable;
use crate::grid::stage::Stage;
use crate::grid::tile::Teleport;

// =============================================================================
// Predicates and effects
// =============================================================================

/// Condition on the incoming object and the acting actor.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Predicate {
    /// Always matches.
    Everything,
    /// Nothing is being pushed in (the actor is stepping or evacuating).
    Nothing,
    /// Incoming object has exactly this name.
    Named(String),
    /// Incoming object is a ball.
    Ball,
    /// Incoming object is a ring.
    Ring,
    /// Acting actor is on this team.
    ActorTeam(Team),
    /// Actor is on `team` and pushes that team's ball.
    TeamBall(Team),
    /// Actor is on `team` and pushes any ball.
    AnyBallForTeam(Team),
}

impl Predicate {
    /// Evaluate against `incoming` pushed by an actor on `team`.
    pub fn matches(&self, incoming: Option<&Interactable>, team: Team) -> bool {
        match self {
            Predicate::Everything => true,
            Predicate::Nothing => incoming.is_none(),
            Predicate::Named(name) => incoming.is_some_and(|item| item.name == *name),
            Predicate::Ball => incoming.is_some_and(Interactable::is_ball),
            Predicate::Ring => incoming.is_some_and(Interactable::is_ring),
            Predicate::ActorTeam(wanted) => team == *wanted,
            Predicate::TeamBall(wanted) => {
                team == *wanted
                    && incoming.is_some_and(|item| item.name == format!("ball-{}", wanted.as_str()))
            }
            Predicate::AnyBallForTeam(wanted) => {
                team == *wanted && incoming.is_some_and(Interactable::is_ball)
            }
        }
    }
}

/// What a matched reaction does.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Effect {
    /// Swallow the incoming object.
    Eat,
    /// Let the incoming object continue onward.
    Pass,
    /// Tell the actor something, then let the object continue.
    NotifyAndPass(String),
    /// Play a sound to the stage, swallowing the incoming object.
    PlaySound(String),
    /// Award `team` a goal and move the ball to one of `stages`
    /// (the current stage when empty).
    ScoreGoal {
        /// Scoring team.
        team: Team,
        /// Candidate stages for the returned ball.
        stages: Vec<String>,
    },
    /// Move the incoming object to a random free tile of one of `stages`
    /// (the current stage when empty).
    Relocate {
        /// Candidate stages.
        stages: Vec<String>,
    },
    /// Swallow the incoming object and drop coins on random tiles.
    SpawnMoney(Vec<u32>),
    /// Destroy every other fragile object on the stage.
    DestroyOthers,
    /// Destroy fragile objects inside a rectangle, inclusive.
    DestroyInRange {
        /// First row.
        top: usize,
        /// First column.
        left: usize,
        /// Last row.
        bottom: usize,
        /// Last column.
        right: usize,
    },
    /// Shove the surroundings and throw the actor by `(dy, dx)`.
    Launch {
        /// Row offset.
        dy: i32,
        /// Column offset.
        dx: i32,
    },
    /// Kill the actor.
    KillInstantly,
    /// Consume a ring and turn this object into a trap for the opposite
    /// team.
    ArmTrap {
        /// Blast damage for a small ring.
        damage: i32,
    },
    /// Blow up, hurting everything in the square around the object.
    Detonate {
        /// Square radius.
        radius: i32,
        /// Damage per actor.
        damage: i32,
        /// Actor credited with kills.
        owner: ActorId,
    },
    /// Point the teleport on `(source_y, source_x)` somewhere else.
    Retarget {
        /// Linked tile row.
        source_y: i32,
        /// Linked tile column.
        source_x: i32,
        /// New destination stage.
        stage: String,
        /// New destination row.
        y: i32,
        /// New destination column.
        x: i32,
    },
    /// Message every connected player.
    Broadcast(String),
    /// Swallow a ring: blast a random spot of the stage for the actor, drop
    /// a fifth of the damage as coins and send the ring to a neighbouring
    /// stage.
    Exchange {
        /// Square radius.
        radius: i32,
        /// Damage for a small ring, doubled for a big one.
        damage: i32,
    },
}

/// One entry of a reaction list.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Reaction {
    /// Guard.
    pub when: Predicate,
    /// Action.
    pub then: Effect,
}

impl Reaction {
    /// Pair a predicate with an effect.
    pub fn new(when: Predicate, then: Effect) -> Self {
        Self { when, then }
    }
}

// =============================================================================
// Deferred effects
// =============================================================================

/// Work queued by an effect and run after the push chain unlocks.
#[derive(Debug)]
pub enum Deferred {
    /// Message the acting actor.
    Notify(String),
    /// Play a sound to a stage.
    StageSound {
        /// Stage.
        stage: Arc<Stage>,
        /// Sound name.
        name: String,
    },
    /// A goal was scored for `team`.
    Goal {
        /// Scoring team.
        team: Team,
    },
    /// Put an object down somewhere free.
    Relocate {
        /// Object.
        item: Interactable,
        /// Candidate stages, empty for `origin`.
        stages: Vec<String>,
        /// Stage the object came from.
        origin: Arc<Stage>,
    },
    /// Drop coins on random tiles.
    SpawnMoney {
        /// Stage.
        stage: Arc<Stage>,
        /// One pile per entry.
        amounts: Vec<u32>,
    },
    /// Clear fragile objects from tiles.
    DestroyFragile {
        /// Stage.
        stage: Arc<Stage>,
        /// Tile indices.
        indices: Vec<usize>,
    },
    /// Shove around `index` then move the actor by `(dy, dx)`.
    Launch {
        /// Stage.
        stage: Arc<Stage>,
        /// Launcher tile.
        index: usize,
        /// Row offset.
        dy: i32,
        /// Column offset.
        dx: i32,
    },
    /// Kill the acting actor.
    Kill,
    /// Area damage after the configured blast delay.
    Blast {
        /// Stage.
        stage: Arc<Stage>,
        /// Centre tile.
        index: usize,
        /// Square radius.
        radius: i32,
        /// Damage per actor.
        damage: i32,
        /// Actor credited with kills.
        owner: ActorId,
    },
    /// Put a fresh ring somewhere on a stage.
    PlaceRing {
        /// Stage.
        stage: Arc<Stage>,
    },
    /// Message every connected player.
    WorldMessage(String),
}

/// Everything an effect may look at or change.
pub struct ReactionContext<'a> {
    /// World.
    pub world: &'a Arc<World>,
    /// Actor that started the push.
    pub actor: &'a ActorRef,
    /// Stage of the reacting object.
    pub stage: &'a Arc<Stage>,
    /// Tile of the reacting object.
    pub index: usize,
    /// The reacting object, still owned by its slot.
    pub existing: &'a mut Interactable,
    /// Deferred work for the chain.
    pub deferred: &'a mut Vec<Deferred>,
}

impl Effect {
    /// Run the effect. Returns the object to push onward and whether the
    /// push continues.
    pub fn apply(
        &self,
        incoming: Option<Interactable>,
        ctx: &mut ReactionContext<'_>,
    ) -> (Option<Interactable>, bool) {
        match self {
            Effect::Eat => (None, false),
            Effect::Pass => (incoming, true),
            Effect::NotifyAndPass(text) => {
                ctx.deferred.push(Deferred::Notify(text.clone()));
                (incoming, true)
            }
            Effect::PlaySound(name) => {
                ctx.deferred.push(Deferred::StageSound {
                    stage: Arc::clone(ctx.stage),
                    name: name.clone(),
                });
                (None, false)
            }
            Effect::ScoreGoal { team, stages } => {
                if ctx.actor.team() != *team {
                    error!(
                        "{} on {} reached the {} goal",
                        ctx.actor.name(),
                        ctx.actor.team(),
                        team
                    );
                    return (incoming, false);
                }
                ctx.deferred.push(Deferred::Goal { team: *team });
                if let Some(ball) = incoming {
                    ctx.deferred.push(Deferred::Relocate {
                        item: ball,
                        stages: stages.clone(),
                        origin: Arc::clone(ctx.stage),
                    });
                }
                (None, false)
            }
            Effect::Relocate { stages } => {
                if let Some(item) = incoming {
                    ctx.deferred.push(Deferred::Relocate {
                        item,
                        stages: stages.clone(),
                        origin: Arc::clone(ctx.stage),
                    });
                }
                (None, false)
            }
            Effect::SpawnMoney(amounts) => {
                ctx.deferred.push(Deferred::SpawnMoney {
                    stage: Arc::clone(ctx.stage),
                    amounts: amounts.clone(),
                });
                (None, false)
            }
            Effect::DestroyOthers => {
                let indices = (0..ctx.stage.tiles().len())
                    .filter(|&index| index != ctx.index)
                    .collect();
                ctx.deferred.push(Deferred::DestroyFragile {
                    stage: Arc::clone(ctx.stage),
                    indices,
                });
                (None, false)
            }
            Effect::DestroyInRange {
                top,
                left,
                bottom,
                right,
            } => {
                let width = ctx.stage.width();
                if *bottom >= ctx.stage.height() || *right >= width {
                    error!(
                        "Destroy range ({}, {})..=({}, {}) exceeds stage {}",
                        top,
                        left,
                        bottom,
                        right,
                        ctx.stage.name()
                    );
                    return (None, false);
                }
                let indices = (*top..=*bottom)
                    .flat_map(|y| (*left..=*right).map(move |x| y * width + x))
                    .filter(|&index| index != ctx.index)
                    .collect();
                ctx.deferred.push(Deferred::DestroyFragile {
                    stage: Arc::clone(ctx.stage),
                    indices,
                });
                (None, false)
            }
            Effect::Launch { dy, dx } => {
                ctx.deferred.push(Deferred::Launch {
                    stage: Arc::clone(ctx.stage),
                    index: ctx.index,
                    dy: *dy,
                    dx: *dx,
                });
                (None, false)
            }
            Effect::KillInstantly => {
                ctx.deferred.push(Deferred::Kill);
                (None, false)
            }
            Effect::ArmTrap { damage } => {
                let Some(ring) = incoming else {
                    return (None, false);
                };
                let Some(rival) = ctx.actor.team().opposite() else {
                    return (Some(ring), true);
                };
                let damage = if ring.name == "ring-big" {
                    damage * 2
                } else {
                    *damage
                };
                ctx.existing.reactions = Arc::from(vec![
                    Reaction::new(
                        Predicate::ActorTeam(rival),
                        Effect::Detonate {
                            radius: 2,
                            damage,
                            owner: ctx.actor.id(),
                        },
                    ),
                    Reaction::new(Predicate::Nothing, Effect::PlaySound("water-splash".to_string())),
                    Reaction::new(Predicate::Everything, Effect::Pass),
                ]);
                ctx.deferred.push(Deferred::StageSound {
                    stage: Arc::clone(ctx.stage),
                    name: "trap-armed".to_string(),
                });
                ctx.deferred.push(Deferred::SpawnMoney {
                    stage: Arc::clone(ctx.stage),
                    amounts: vec![10],
                });
                (None, false)
            }
            Effect::Detonate {
                radius,
                damage,
                owner,
            } => {
                ctx.deferred.push(Deferred::StageSound {
                    stage: Arc::clone(ctx.stage),
                    name: "explosion".to_string(),
                });
                ctx.deferred.push(Deferred::Blast {
                    stage: Arc::clone(ctx.stage),
                    index: ctx.index,
                    radius: *radius,
                    damage: *damage,
                    owner: *owner,
                });
                ctx.deferred.push(Deferred::PlaceRing {
                    stage: Arc::clone(ctx.stage),
                });
                ctx.existing.reactions = ctx
                    .world
                    .reactions()
                    .get("lily-pad")
                    .unwrap_or_else(|| Arc::from(Vec::new()));
                (None, false)
            }
            Effect::Retarget {
                source_y,
                source_x,
                stage,
                y,
                x,
            } => {
                match ctx.stage.tile(*source_y, *source_x) {
                    Some(tile) => {
                        let mut link = tile.teleport().unwrap_or_else(|| Teleport {
                            dest_stage: String::new(),
                            dest_y: 0,
                            dest_x: 0,
                            reject_interactable: false,
                            reject_actor: false,
                        });
                        link.dest_stage = stage.clone();
                        link.dest_y = *y;
                        link.dest_x = *x;
                        tile.set_teleport(Some(link));
                    }
                    None => error!(
                        "Retarget source ({}, {}) is outside stage {}",
                        source_y,
                        source_x,
                        ctx.stage.name()
                    ),
                }
                (None, false)
            }
            Effect::Broadcast(text) => {
                ctx.deferred.push(Deferred::WorldMessage(text.clone()));
                (None, false)
            }
            Effect::Exchange { radius, damage } => {
                let Some(ring) = incoming else {
                    return (None, false);
                };
                let damage = if ring.name == "ring-big" {
                    damage * 2
                } else {
                    *damage
                };
                let epicenter = ctx.world.random_index(ctx.stage.tiles().len());
                ctx.deferred.push(Deferred::Blast {
                    stage: Arc::clone(ctx.stage),
                    index: epicenter,
                    radius: *radius,
                    damage,
                    owner: ctx.actor.id(),
                });
                ctx.deferred.push(Deferred::StageSound {
                    stage: Arc::clone(ctx.stage),
                    name: "explosion".to_string(),
                });
                ctx.deferred.push(Deferred::SpawnMoney {
                    stage: Arc::clone(ctx.stage),
                    amounts: vec![(damage / 5).max(0) as u32],
                });
                let neighbours = Direction::ALL
                    .into_iter()
                    .filter_map(|direction| ctx.stage.neighbors().toward(direction))
                    .map(str::to_string)
                    .collect();
                ctx.deferred.push(Deferred::Relocate {
                    item: ring,
                    stages: neighbours,
                    origin: Arc::clone(ctx.stage),
                });
                (None, false)
            }
        }
    }
}

// =============================================================================
// Reaction table
// =============================================================================

/// Named reaction lists referenced by area templates.
#[derive(Clone, Debug, Default)]
pub struct ReactionTable {
    kinds: HashMap<String, Arc<[Reaction]>>,
}

impl ReactionTable {
    /// Empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// The built-in kinds.
    pub fn standard() -> Self {
        use Effect::*;
        use Predicate::*;

        let mut table = Self::new();

        table.insert(
            "black-hole",
            vec![
                Reaction::new(Ball, Relocate { stages: Vec::new() }),
                Reaction::new(Everything, Eat),
            ],
        );

        for team in [Team::SkyBlue, Team::Fuchsia] {
            table.insert(
                format!("goal-{}", team.as_str()),
                vec![
                    Reaction::new(
                        TeamBall(team),
                        ScoreGoal {
                            team,
                            stages: Vec::new(),
                        },
                    ),
                    Reaction::new(AnyBallForTeam(team), Pass),
                ],
            );
            table.insert(
                format!("tutorial-goal-{}", team.as_str()),
                vec![
                    Reaction::new(TeamBall(team), DestroyOthers),
                    Reaction::new(
                        AnyBallForTeam(team),
                        NotifyAndPass("Try using the matching ball.".to_string()),
                    ),
                ],
            );
        }

        table.insert(
            "gold-target",
            vec![Reaction::new(
                Named("ball-gold".to_string()),
                DestroyInRange {
                    top: 5,
                    left: 3,
                    bottom: 10,
                    right: 8,
                },
            )],
        );

        for direction in Direction::ALL {
            let (dy, dx) = direction.scaled(11);
            table.insert(
                format!("catapult-{}", direction.as_str()),
                vec![
                    Reaction::new(Nothing, Launch { dy, dx }),
                    Reaction::new(Everything, Pass),
                ],
            );
        }

        table.insert(
            "lily-pad",
            vec![
                Reaction::new(Nothing, PlaySound("water-splash".to_string())),
                Reaction::new(Ring, ArmTrap { damage: 50 }),
                Reaction::new(Everything, Pass),
            ],
        );

        table.insert(
            "death-trap",
            vec![
                Reaction::new(Nothing, KillInstantly),
                Reaction::new(Everything, Pass),
            ],
        );

        table.insert(
            "wishing-well",
            vec![
                Reaction::new(Nothing, PlaySound("water-splash".to_string())),
                Reaction::new(Ball, Relocate { stages: Vec::new() }),
                Reaction::new(Everything, SpawnMoney(vec![5, 5])),
            ],
        );

        table.insert(
            "bell",
            vec![
                Reaction::new(Nothing, Broadcast("The meadow bell rings out!".to_string())),
                Reaction::new(Everything, Pass),
            ],
        );

        // Levers repoint the meadow gate at (9, 9).
        for (kind, stage, y, x) in [("lever-field", "field", 10, 10), ("lever-home", "home", 2, 2)] {
            table.insert(
                kind,
                vec![Reaction::new(
                    Nothing,
                    Retarget {
                        source_y: 9,
                        source_x: 9,
                        stage: stage.to_string(),
                        y,
                        x,
                    },
                )],
            );
        }

        table.insert(
            "exchange-ring",
            vec![Reaction::new(
                Ring,
                Exchange {
                    radius: 4,
                    damage: 50,
                },
            )],
        );

        table
    }

    /// Register or replace a kind.
    pub fn insert(&mut self, kind: impl Into<String>, reactions: Vec<Reaction>) {
        self.kinds.insert(kind.into(), Arc::from(reactions));
    }

    /// Shared list for `kind`.
    pub fn get(&self, kind: &str) -> Option<Arc<[Reaction]>> {
        self.kinds.get(kind).cloned()
    }

    /// Number of kinds.
    pub fn len(&self) -> usize {
        self.kinds.len()
    }

    /// No kinds.
    pub fn is_empty(&self) -> bool {
        self.kinds.is_empty()
    }
}
