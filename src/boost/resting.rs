//! Resting Registry - titles temporarily excluded from boosting.
//!
//! Entries are kept in insertion order. Draining releases expired entries
//! oldest-first; entries that are not ready keep their position.

use chrono::{DateTime, Utc};
use std::collections::{HashSet, VecDeque};

use super::state::TitleBoostState;
use crate::client::TitleId;

/// Ordered collection of resting titles.
#[derive(Debug, Default)]
pub struct RestingRegistry {
    entries: VecDeque<TitleBoostState>,
}

impl RestingRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Park a title until `until`, resetting its boosted duration.
    ///
    /// A stuck title comes back with a clean failure count. A title already
    /// resting is replaced and moves to the back.
    pub fn mark_resting(&mut self, mut state: TitleBoostState, until: DateTime<Utc>) {
        self.entries.retain(|e| e.id != state.id);
        state.boosting_duration_minutes = 0;
        if state.is_stuck() {
            state.clear_failures();
        }
        state.resting_until = Some(until);
        log::debug!("Title {} resting until {}", state, until);
        self.entries.push_back(state);
    }

    /// Remove and return up to `max` expired entries, oldest first.
    pub fn drain_ready(&mut self, now: DateTime<Utc>, max: usize) -> Vec<TitleBoostState> {
        self.drain_ready_matching(now, max, |_| true)
    }

    /// Like [`drain_ready`](Self::drain_ready), only releasing titles `accept` admits.
    pub fn drain_ready_matching<F>(&mut self, now: DateTime<Utc>, max: usize, mut accept: F) -> Vec<TitleBoostState>
    where
        F: FnMut(TitleId) -> bool,
    {
        let mut ready = Vec::new();
        let mut kept = VecDeque::with_capacity(self.entries.len());

        for mut entry in self.entries.drain(..) {
            let expired = entry.resting_until.is_none_or(|until| until <= now);
            if ready.len() < max && expired && accept(entry.id) {
                entry.resting_until = None;
                ready.push(entry);
            } else {
                kept.push_back(entry);
            }
        }

        self.entries = kept;
        ready
    }

    /// Forget titles, e.g. ones no longer owned. Returns how many were removed.
    pub fn remove_by_ids(&mut self, ids: &HashSet<TitleId>) -> usize {
        let before = self.entries.len();
        self.entries.retain(|e| !ids.contains(&e.id));
        before - self.entries.len()
    }

    pub fn contains(&self, id: TitleId) -> bool {
        self.entries.iter().any(|e| e.id == id)
    }

    pub fn get(&self, id: TitleId) -> Option<&TitleBoostState> {
        self.entries.iter().find(|e| e.id == id)
    }

    /// Resting ids in insertion order.
    pub fn ids(&self) -> Vec<TitleId> {
        self.entries.iter().map(|e| e.id).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::boost::state::tests::state;
    use chrono::Duration;

    #[test]
    fn test_not_released_before_expiry() {
        let now = Utc::now();
        let mut registry = RestingRegistry::new();
        registry.mark_resting(state(1), now + Duration::minutes(10));

        assert!(registry.drain_ready(now, 5).is_empty());
        assert!(registry.drain_ready(now + Duration::minutes(9), 5).is_empty());
        let ready = registry.drain_ready(now + Duration::minutes(10), 5);
        assert_eq!(ready.len(), 1);
        assert_eq!(ready[0].id, 1);
        assert!(ready[0].resting_until.is_none());
    }

    #[test]
    fn test_drained_once() {
        let now = Utc::now();
        let mut registry = RestingRegistry::new();
        registry.mark_resting(state(1), now);
        assert_eq!(registry.drain_ready(now, 5).len(), 1);
        assert!(registry.drain_ready(now + Duration::days(1), 5).is_empty());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_insertion_order_not_expiry_order() {
        let now = Utc::now();
        let mut registry = RestingRegistry::new();
        registry.mark_resting(state(1), now - Duration::minutes(1));
        registry.mark_resting(state(2), now - Duration::minutes(30));
        registry.mark_resting(state(3), now + Duration::minutes(30));
        registry.mark_resting(state(4), now - Duration::minutes(5));

        let ready: Vec<_> = registry.drain_ready(now, 2).into_iter().map(|s| s.id).collect();
        assert_eq!(ready, vec![1, 2]);
        assert_eq!(registry.ids(), vec![3, 4]);
    }

    #[test]
    fn test_mark_resting_resets_duration_and_replaces() {
        let now = Utc::now();
        let mut registry = RestingRegistry::new();
        let mut s = state(1);
        s.add_boosting_minutes(90);
        registry.mark_resting(s, now + Duration::hours(1));
        registry.mark_resting(state(2), now);
        registry.mark_resting(state(1), now);

        assert_eq!(registry.len(), 2);
        assert_eq!(registry.ids(), vec![2, 1]);
        assert_eq!(registry.get(1).map(|s| s.boosting_duration_minutes), Some(0));
    }

    #[test]
    fn test_drain_matching_skips_rejected() {
        let now = Utc::now();
        let mut registry = RestingRegistry::new();
        registry.mark_resting(state(1), now);
        registry.mark_resting(state(2), now);

        let ready = registry.drain_ready_matching(now, 5, |id| id == 2);
        assert_eq!(ready.len(), 1);
        assert_eq!(ready[0].id, 2);
        assert!(registry.contains(1));
    }

    #[test]
    fn test_remove_by_ids() {
        let now = Utc::now();
        let mut registry = RestingRegistry::new();
        registry.mark_resting(state(1), now);
        registry.mark_resting(state(2), now);
        assert_eq!(registry.remove_by_ids(&HashSet::from([1, 9])), 1);
        assert_eq!(registry.ids(), vec![2]);
    }

    #[test]
    fn test_stuck_title_comes_back_with_clean_failures() {
        let now = Utc::now();
        let mut registry = RestingRegistry::new();
        let mut stuck = state(1);
        for _ in 0..4 {
            stuck.record_failure("a");
        }
        let mut failing = state(2);
        failing.record_failure("a");
        registry.mark_resting(stuck, now);
        registry.mark_resting(failing, now);

        assert_eq!(registry.get(1).map(|s| s.failed_unlock_count), Some(0));
        assert!(registry.get(1).is_some_and(|s| s.last_failed_achievement.is_none()));
        assert_eq!(registry.get(2).map(|s| s.failed_unlock_count), Some(1));
    }
}
