//! Leaderboard
//!
//! Binary max-heap of kill streaks with an external `ActorId → index` map,
//! so any entry can be updated or removed in O(log n) and the leader read
//! in O(1). Ties on streak go to the smallest `ActorId`.
//!
//! Also holds the per-team goal scoreboard.

use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

use crate::core::sync::lock;
use crate::game::actor::{ActorId, Team};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Entry {
    id: ActorId,
    streak: u32,
}

impl Entry {
    /// Heap order: higher streak first, then smaller id.
    fn outranks(&self, other: &Entry) -> bool {
        self.streak > other.streak || (self.streak == other.streak && self.id < other.id)
    }
}

#[derive(Debug, Default)]
struct Heap {
    entries: Vec<Entry>,
    index: HashMap<ActorId, usize>,
}

impl Heap {
    fn swap(&mut self, a: usize, b: usize) {
        self.entries.swap(a, b);
        self.index.insert(self.entries[a].id, a);
        self.index.insert(self.entries[b].id, b);
    }

    fn sift_up(&mut self, mut i: usize) -> usize {
        while i > 0 {
            let parent = (i - 1) / 2;
            if !self.entries[i].outranks(&self.entries[parent]) {
                break;
            }
            self.swap(i, parent);
            i = parent;
        }
        i
    }

    fn sift_down(&mut self, mut i: usize) {
        let len = self.entries.len();
        loop {
            let mut best = i;
            for child in [2 * i + 1, 2 * i + 2] {
                if child < len && self.entries[child].outranks(&self.entries[best]) {
                    best = child;
                }
            }
            if best == i {
                return;
            }
            self.swap(i, best);
            i = best;
        }
    }

    fn fix(&mut self, i: usize) {
        let i = self.sift_up(i);
        self.sift_down(i);
    }

    fn leader(&self) -> Option<Entry> {
        self.entries.first().copied()
    }
}

/// Kill-streak ranking.
#[derive(Debug, Default)]
pub struct Leaderboard {
    heap: Mutex<Heap>,
}

impl Leaderboard {
    /// Empty board.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or move `id` to `streak`. Returns true if the leader (id or
    /// streak) changed.
    pub fn update(&self, id: ActorId, streak: u32) -> bool {
        let mut heap = lock(&self.heap);
        let before = heap.leader();
        match heap.index.get(&id).copied() {
            Some(i) => {
                heap.entries[i].streak = streak;
                heap.fix(i);
            }
            None => {
                let i = heap.entries.len();
                heap.entries.push(Entry { id, streak });
                heap.index.insert(id, i);
                heap.sift_up(i);
            }
        }
        heap.leader() != before
    }

    /// Remove `id`. Returns true if the leader changed.
    pub fn remove(&self, id: ActorId) -> bool {
        let mut heap = lock(&self.heap);
        let Some(i) = heap.index.remove(&id) else {
            return false;
        };
        let before = heap.leader();
        let last = heap.entries.len() - 1;
        if i != last {
            heap.entries.swap(i, last);
            let moved = heap.entries[i].id;
            heap.index.insert(moved, i);
        }
        heap.entries.pop();
        if i < heap.entries.len() {
            heap.fix(i);
        }
        heap.leader() != before
    }

    /// Current leader and streak.
    pub fn peek(&self) -> Option<(ActorId, u32)> {
        lock(&self.heap).leader().map(|entry| (entry.id, entry.streak))
    }

    /// Streak recorded for `id`.
    pub fn streak_of(&self, id: ActorId) -> Option<u32> {
        let heap = lock(&self.heap);
        heap.index.get(&id).map(|&i| heap.entries[i].streak)
    }

    /// Number of ranked actors.
    pub fn len(&self) -> usize {
        lock(&self.heap).entries.len()
    }

    /// No ranked actors.
    pub fn is_empty(&self) -> bool {
        lock(&self.heap).entries.is_empty()
    }
}

/// Goals per team.
#[derive(Debug, Default)]
pub struct Scoreboard {
    goals: Mutex<BTreeMap<Team, u32>>,
}

impl Scoreboard {
    /// Empty scoreboard.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a goal, returning the team's new score.
    pub fn increment(&self, team: Team) -> u32 {
        let mut goals = lock(&self.goals);
        let score = goals.entry(team).or_insert(0);
        *score += 1;
        *score
    }

    /// Team's score.
    pub fn score(&self, team: Team) -> u32 {
        lock(&self.goals).get(&team).copied().unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn id(n: u128) -> ActorId {
        ActorId::from_u128(n)
    }

    #[test]
    fn test_update_and_peek() {
        let board = Leaderboard::new();
        assert_eq!(board.peek(), None);

        assert!(board.update(id(5), 1));
        assert!(board.update(id(3), 4));
        assert!(!board.update(id(9), 2));
        assert_eq!(board.peek(), Some((id(3), 4)));

        assert!(board.update(id(3), 0));
        assert_eq!(board.peek(), Some((id(9), 2)));
    }

    #[test]
    fn test_tie_break_smallest_id() {
        let board = Leaderboard::new();
        board.update(id(7), 3);
        board.update(id(2), 3);
        board.update(id(4), 3);
        assert_eq!(board.peek(), Some((id(2), 3)));
    }

    #[test]
    fn test_remove_leader() {
        let board = Leaderboard::new();
        board.update(id(1), 5);
        board.update(id(2), 3);
        assert!(!board.remove(id(2)));
        board.update(id(2), 3);
        assert!(board.remove(id(1)));
        assert_eq!(board.peek(), Some((id(2), 3)));
        assert!(!board.remove(id(1)));
        assert!(board.remove(id(2)));
        assert!(board.is_empty());
    }

    #[test]
    fn test_scoreboard() {
        let scores = Scoreboard::new();
        assert_eq!(scores.increment(Team::Fuchsia), 1);
        assert_eq!(scores.increment(Team::Fuchsia), 2);
        assert_eq!(scores.score(Team::SkyBlue), 0);
    }

    #[derive(Clone, Debug)]
    enum Op {
        Kill(u8),
        Reset(u8),
        Leave(u8),
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![
            (0u8..12).prop_map(Op::Kill),
            (0u8..12).prop_map(Op::Reset),
            (0u8..12).prop_map(Op::Leave),
        ]
    }

    proptest! {
        #[test]
        fn test_leader_matches_linear_scan(ops in proptest::collection::vec(op(), 0..200)) {
            let board = Leaderboard::new();
            let mut model: HashMap<ActorId, u32> = HashMap::new();

            for op in ops {
                match op {
                    Op::Kill(n) => {
                        let streak = model.entry(id(n as u128)).or_insert(0);
                        *streak += 1;
                        board.update(id(n as u128), *streak);
                    }
                    Op::Reset(n) => {
                        model.insert(id(n as u128), 0);
                        board.update(id(n as u128), 0);
                    }
                    Op::Leave(n) => {
                        model.remove(&id(n as u128));
                        board.remove(id(n as u128));
                    }
                }

                let expected = model
                    .iter()
                    .map(|(id, streak)| (*id, *streak))
                    .min_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
                prop_assert_eq!(board.peek(), expected);
                prop_assert_eq!(board.len(), model.len());
                for (id, streak) in &model {
                    prop_assert_eq!(board.streak_of(*id), Some(*streak));
                }
            }
        }
    }
}
