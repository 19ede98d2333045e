//! Players
//!
//! Human-controlled actors. A player owns a camera, an outbound update
//! queue, a map of personal stage instances and the counters persisted in
//! its record.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc::UnboundedSender;
use tracing::debug;

use crate::config::WorldConfig;
use crate::core::sync::lock;
use crate::core::Shape;
use crate::game::actor::{ActorId, Mobile, Team};
use crate::game::camera::Camera;
use crate::game::events::{StatsView, Update};
use crate::grid::stage::Stage;
use crate::persistence::PlayerRecord;

/// Counters that are not hot enough to need atomics.
#[derive(Clone, Debug, Default)]
struct Stats {
    money: u32,
    boosts: u32,
    deaths: u32,
    goals: u32,
    powers: Vec<Shape>,
}

/// Human-controlled actor.
pub struct Player {
    mobile: Mobile,
    username: String,
    camera: Arc<Camera>,
    outbound: UnboundedSender<Update>,
    personal_stages: Mutex<BTreeMap<String, Arc<Stage>>>,
    stats: Mutex<Stats>,
    tangible: AtomicBool,
}

impl Player {
    /// New detached player with a fresh id.
    pub fn new(
        username: impl Into<String>,
        team: Team,
        config: &WorldConfig,
        outbound: UnboundedSender<Update>,
    ) -> Arc<Self> {
        Self::with_id(ActorId::new(), username, team, config, outbound)
    }

    /// New detached player with a known id.
    pub fn with_id(
        id: ActorId,
        username: impl Into<String>,
        team: Team,
        config: &WorldConfig,
        outbound: UnboundedSender<Update>,
    ) -> Arc<Self> {
        let camera = Camera::new(
            id,
            config.view_height,
            config.view_width,
            config.view_padding,
            outbound.clone(),
        );
        Arc::new(Self {
            mobile: Mobile::new(id, team, config.player_health),
            username: username.into(),
            camera: Arc::new(camera),
            outbound,
            personal_stages: Mutex::new(BTreeMap::new()),
            stats: Mutex::new(Stats::default()),
            tangible: AtomicBool::new(true),
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

    /// Display name.
    pub fn username(&self) -> &str {
        &self.username
    }

    /// Viewport.
    pub fn camera(&self) -> &Arc<Camera> {
        &self.camera
    }

    /// Queue an update. A closed queue means the connection is gone and the
    /// update is dropped.
    pub fn send(&self, update: Update) {
        if self.outbound.send(update).is_err() {
            debug!("Dropping update for disconnected player {}", self.username);
        }
    }

    /// Queue the current counters.
    pub fn send_stats(&self) {
        self.send(Update::Stats {
            stats: self.stats_view(),
        });
    }

    // =========================================================================
    // Tangibility
    // =========================================================================

    /// Still connected and able to respawn.
    pub fn is_tangible(&self) -> bool {
        self.tangible.load(Ordering::SeqCst)
    }

    /// Mark as leaving. Returns the previous value.
    pub fn set_intangible(&self) -> bool {
        self.tangible.swap(false, Ordering::SeqCst)
    }

    // =========================================================================
    // Personal stages
    // =========================================================================

    /// Personal instance of `name`, if one exists.
    pub fn personal_stage(&self, name: &str) -> Option<Arc<Stage>> {
        lock(&self.personal_stages).get(name).cloned()
    }

    /// Store a personal instance. The first stored instance wins and is
    /// returned.
    pub fn insert_personal_stage(&self, stage: Arc<Stage>) -> Arc<Stage> {
        let mut stages = lock(&self.personal_stages);
        Arc::clone(stages.entry(stage.name().to_string()).or_insert(stage))
    }

    // =========================================================================
    // Counters
    // =========================================================================

    /// Coins held.
    pub fn money(&self) -> u32 {
        lock(&self.stats).money
    }

    /// Add coins.
    pub fn add_money(&self, amount: u32) {
        let mut stats = lock(&self.stats);
        stats.money = stats.money.saturating_add(amount);
    }

    /// Halve coins, returning the amount removed.
    pub fn halve_money(&self) -> u32 {
        let mut stats = lock(&self.stats);
        let lost = stats.money - stats.money / 2;
        stats.money /= 2;
        lost
    }

    /// Boost charges held.
    pub fn boosts(&self) -> u32 {
        lock(&self.stats).boosts
    }

    /// Add boost charges.
    pub fn add_boosts(&self, count: u32) {
        let mut stats = lock(&self.stats);
        stats.boosts = stats.boosts.saturating_add(count);
    }

    /// Consume one boost if any remain.
    pub fn use_boost(&self) -> bool {
        let mut stats = lock(&self.stats);
        if stats.boosts == 0 {
            return false;
        }
        stats.boosts -= 1;
        true
    }

    /// Stack a power-up.
    pub fn push_power(&self, shape: Shape) {
        lock(&self.stats).powers.push(shape);
    }

    /// Take the most recent power-up.
    pub fn pop_power(&self) -> Option<Shape> {
        lock(&self.stats).powers.pop()
    }

    /// Stacked power-up count.
    pub fn power_count(&self) -> usize {
        lock(&self.stats).powers.len()
    }

    /// Lifetime deaths.
    pub fn deaths(&self) -> u32 {
        lock(&self.stats).deaths
    }

    /// Record a death and clear the power stack.
    pub fn record_death(&self) -> u32 {
        let mut stats = lock(&self.stats);
        stats.deaths += 1;
        stats.powers.clear();
        stats.deaths
    }

    /// Lifetime goals.
    pub fn goals(&self) -> u32 {
        lock(&self.stats).goals
    }

    /// Record a goal, returning the new total.
    pub fn record_goal(&self) -> u32 {
        let mut stats = lock(&self.stats);
        stats.goals += 1;
        stats.goals
    }

    /// Player-facing counters.
    pub fn stats_view(&self) -> StatsView {
        let stats = lock(&self.stats);
        StatsView {
            health: self.mobile.health(),
            money: stats.money,
            boosts: stats.boosts,
            powers: stats.powers.len(),
            kill_streak: self.mobile.kill_streak(),
            kill_count: self.mobile.kill_count(),
            deaths: stats.deaths,
            goals: stats.goals,
        }
    }

    /// Persisted record.
    pub fn record(&self) -> PlayerRecord {
        // Position before stats; arrival holds them in that order.
        let stage = self.mobile.location().map(|loc| loc.stage.name().to_string());
        let stats = lock(&self.stats);
        PlayerRecord {
            id: self.id(),
            username: self.username.clone(),
            team: self.mobile.team(),
            money: stats.money,
            kill_count: self.mobile.kill_count(),
            kill_streak: self.mobile.kill_streak(),
            death_count: stats.deaths,
            goals: stats.goals,
            stage,
            updated_at: chrono::Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::material::Material;
    use tokio::sync::mpsc;

    fn player() -> (Arc<Player>, mpsc::UnboundedReceiver<Update>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Player::new("ada", Team::SkyBlue, &WorldConfig::default(), tx), rx)
    }

    #[test]
    fn test_boosts_consumed_once_each() {
        let (player, _rx) = player();
        assert!(!player.use_boost());
        player.add_boosts(2);
        assert!(player.use_boost());
        assert!(player.use_boost());
        assert!(!player.use_boost());
    }

    #[test]
    fn test_halve_money() {
        let (player, _rx) = player();
        player.add_money(31);
        assert_eq!(player.halve_money(), 16);
        assert_eq!(player.money(), 15);
    }

    #[test]
    fn test_death_clears_powers() {
        let (player, _rx) = player();
        player.push_power(Shape::cross());
        player.push_power(Shape::square(1));
        assert_eq!(player.pop_power(), Some(Shape::square(1)));
        assert_eq!(player.record_death(), 1);
        assert_eq!(player.power_count(), 0);
    }

    #[test]
    fn test_personal_stage_first_wins() {
        let (player, _rx) = player();
        let config = WorldConfig::default();
        let first = Arc::new(Stage::filled("home", 2, 2, Material::floor("rug"), &config));
        let second = Arc::new(Stage::filled("home", 2, 2, Material::floor("rug"), &config));

        let kept = player.insert_personal_stage(Arc::clone(&first));
        assert!(Arc::ptr_eq(&kept, &first));
        let kept = player.insert_personal_stage(second);
        assert!(Arc::ptr_eq(&kept, &first));
        assert!(player.personal_stage("home").is_some());
    }

    #[test]
    fn test_send_after_disconnect_is_dropped() {
        let (player, rx) = player();
        drop(rx);
        player.send(Update::message("hello"));
        player.send_stats();
    }

    #[test]
    fn test_record_reflects_counters() {
        let (player, _rx) = player();
        player.record_goal();
        player.mobile().record_kill();
        let record = player.record();
        assert_eq!(record.username, "ada");
        assert_eq!(record.goals, 1);
        assert_eq!(record.kill_count, 1);
        assert_eq!(record.stage, None);
    }
}
