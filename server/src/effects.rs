//! Deferred buff expiry
//!
//! Effects are plain deadlines owned by the session; nothing here runs on its
//! own. The session drains due effects from its poll loop, which keeps every
//! expiry an atomic step ordered against inbound actions.

use log::debug;
use shared::{ConnectionId, PowerUpKind};
use std::time::Instant;

/// Sequential handle for a scheduled expiry
pub type EffectId = u64;

/// A buff expiry waiting for its deadline
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingEffect {
    pub id: EffectId,
    pub player: ConnectionId,
    pub kind: PowerUpKind,
    /// Roster generation the effect was scheduled under
    pub generation: u64,
    pub due: Instant,
}

/// Pending buff expiries, drained in deadline order
#[derive(Debug, Default)]
pub struct EffectScheduler {
    pending: Vec<PendingEffect>,
    next_id: EffectId,
}

impl EffectScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues the expiry of `kind` for `player` at `due`
    pub fn schedule(
        &mut self,
        player: ConnectionId,
        kind: PowerUpKind,
        generation: u64,
        due: Instant,
    ) -> EffectId {
        let id = self.next_id;
        self.next_id += 1;
        self.pending.push(PendingEffect {
            id,
            player,
            kind,
            generation,
            due,
        });
        debug!("Scheduled {} expiry {} for connection {}", kind, id, player);
        id
    }

    /// Drops every effect targeting `player`, returning how many were removed
    pub fn cancel_player(&mut self, player: ConnectionId) -> usize {
        let before = self.pending.len();
        self.pending.retain(|effect| effect.player != player);
        before - self.pending.len()
    }

    /// Drops every pending effect, returning how many were removed
    pub fn cancel_all(&mut self) -> usize {
        let cancelled = self.pending.len();
        self.pending.clear();
        cancelled
    }

    /// Earliest deadline among pending effects
    pub fn next_due(&self) -> Option<Instant> {
        self.pending.iter().map(|effect| effect.due).min()
    }

    /// Removes and returns the earliest effect that is due at `now`.
    /// Effects sharing a deadline come out in scheduling order.
    pub fn pop_due(&mut self, now: Instant) -> Option<PendingEffect> {
        let index = self
            .pending
            .iter()
            .enumerate()
            .filter(|(_, effect)| effect.due <= now)
            .min_by_key(|(_, effect)| (effect.due, effect.id))
            .map(|(index, _)| index)?;
        Some(self.pending.remove(index))
    }

    /// Number of effects still waiting to fire
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_pop_due_respects_deadlines() {
        let start = Instant::now();
        let mut scheduler = EffectScheduler::new();
        scheduler.schedule(1, PowerUpKind::Invisibility, 0, start + Duration::from_secs(10));
        scheduler.schedule(2, PowerUpKind::HealthPack, 0, start + Duration::from_secs(3));

        assert_eq!(scheduler.next_due(), Some(start + Duration::from_secs(3)));
        assert!(scheduler.pop_due(start + Duration::from_secs(2)).is_none());

        let first = scheduler.pop_due(start + Duration::from_secs(20)).unwrap();
        assert_eq!(first.player, 2);
        let second = scheduler.pop_due(start + Duration::from_secs(20)).unwrap();
        assert_eq!(second.player, 1);
        assert!(scheduler.is_empty());
    }

    #[test]
    fn test_same_deadline_fires_in_schedule_order() {
        let due = Instant::now();
        let mut scheduler = EffectScheduler::new();
        let a = scheduler.schedule(4, PowerUpKind::ScoreMultiplier, 0, due);
        let b = scheduler.schedule(3, PowerUpKind::Invisibility, 0, due);

        assert_eq!(scheduler.pop_due(due).unwrap().id, a);
        assert_eq!(scheduler.pop_due(due).unwrap().id, b);
    }

    #[test]
    fn test_cancel_player_only_touches_that_player() {
        let due = Instant::now();
        let mut scheduler = EffectScheduler::new();
        scheduler.schedule(1, PowerUpKind::Invisibility, 0, due);
        scheduler.schedule(1, PowerUpKind::HealthPack, 0, due);
        scheduler.schedule(2, PowerUpKind::HealthPack, 0, due);

        assert_eq!(scheduler.cancel_player(1), 2);
        assert_eq!(scheduler.len(), 1);
        assert_eq!(scheduler.pop_due(due).unwrap().player, 2);
    }

    #[test]
    fn test_cancel_all() {
        let due = Instant::now();
        let mut scheduler = EffectScheduler::new();
        scheduler.schedule(1, PowerUpKind::Invisibility, 3, due);
        scheduler.schedule(2, PowerUpKind::HealthPack, 3, due);

        assert_eq!(scheduler.cancel_all(), 2);
        assert_eq!(scheduler.next_due(), None);
        assert!(scheduler.pop_due(due).is_none());
    }
}
