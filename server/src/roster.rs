//! Ordered player roster for one session incarnation
//!
//! The roster owns two pieces of derived state that must be recomputed on
//! every membership change:
//! - scan symbols, handed out from [`SYMBOLS`] in roster order to non-spectators
//! - the leader flag, which follows the head of the roster when the leader leaves
//!
//! Each roster carries a generation number. A session reset replaces the
//! roster with a fresh one from the next generation, which lets deferred work
//! recognise that it was scheduled against a roster that no longer exists.

use crate::error::{ActionError, ActionResult};
use log::info;
use shared::{ConnectionId, JoinRole, Player, Symbol, MAX_NAME_LEN, MAX_PLAYERS, SYMBOLS};

/// Players of one session in join order
#[derive(Debug, Clone, Default)]
pub struct Roster {
    players: Vec<Player>,
    generation: u64,
}

impl Roster {
    /// Creates an empty roster for the given generation
    pub fn new(generation: u64) -> Self {
        Self {
            players: Vec::new(),
            generation,
        }
    }

    /// Incarnation number, bumped on every session reset
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Adds a participant to the end of the roster
    ///
    /// Names are trimmed and must be 1 to [`MAX_NAME_LEN`] characters long.
    /// Late joiners (session already active) and anyone arriving once
    /// [`MAX_PLAYERS`] active players are present are seated as spectators
    /// regardless of the requested role. The first participant of an empty
    /// roster becomes leader.
    pub fn join(
        &mut self,
        id: ConnectionId,
        name: &str,
        role: JoinRole,
        session_active: bool,
    ) -> ActionResult<&Player> {
        let name = name.trim();
        if name.is_empty() || name.chars().count() > MAX_NAME_LEN {
            return Err(ActionError::InvalidName);
        }
        if self.contains(id) {
            return Err(ActionError::AlreadyJoined(id));
        }
        if self.find_by_name(name).is_some() {
            return Err(ActionError::DuplicateName(name.to_string()));
        }

        let is_spectator =
            role == JoinRole::Spectator || session_active || self.active_count() >= MAX_PLAYERS;
        let leader = self.players.is_empty();

        self.players
            .push(Player::new(id, name.to_string(), is_spectator, leader));
        self.rebalance_symbols();

        info!(
            "{} joined as {} (connection {}, leader: {})",
            name,
            if is_spectator { "spectator" } else { "player" },
            id,
            leader
        );

        let index = self.players.len() - 1;
        Ok(&self.players[index])
    }

    /// Removes a participant, handing leadership to the new head if needed
    pub fn leave(&mut self, id: ConnectionId) -> Option<Player> {
        let index = self.players.iter().position(|p| p.id == id)?;
        let removed = self.players.remove(index);

        if removed.leader {
            if let Some(first) = self.players.first_mut() {
                first.leader = true;
                info!("Leadership passed to {}", first.name);
            }
        }
        self.rebalance_symbols();

        info!("{} left the roster", removed.name);
        Some(removed)
    }

    /// Looks up a participant by connection id
    pub fn get(&self, id: ConnectionId) -> Option<&Player> {
        self.players.iter().find(|p| p.id == id)
    }

    pub fn get_mut(&mut self, id: ConnectionId) -> Option<&mut Player> {
        self.players.iter_mut().find(|p| p.id == id)
    }

    /// Returns true if the connection has joined
    pub fn contains(&self, id: ConnectionId) -> bool {
        self.get(id).is_some()
    }

    /// Finds the player currently holding a scan symbol
    pub fn find_by_symbol(&self, symbol: Symbol) -> Option<&Player> {
        self.players.iter().find(|p| p.symbol == Some(symbol))
    }

    /// Case-insensitive display name lookup
    pub fn find_by_name(&self, name: &str) -> Option<&Player> {
        let wanted = name.trim().to_lowercase();
        self.players
            .iter()
            .find(|p| p.name.to_lowercase() == wanted)
    }

    /// All participants in roster order, spectators included
    pub fn players(&self) -> &[Player] {
        &self.players
    }

    /// Participants that take part in combat
    pub fn non_spectators(&self) -> impl Iterator<Item = &Player> {
        self.players.iter().filter(|p| !p.is_spectator)
    }

    /// Number of non-spectators
    pub fn active_count(&self) -> usize {
        self.non_spectators().count()
    }

    /// Owned copy of the roster for outbound events
    pub fn snapshot(&self) -> Vec<Player> {
        self.players.clone()
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    fn rebalance_symbols(&mut self) {
        let mut pool = SYMBOLS.iter();
        for player in &mut self.players {
            player.symbol = if player.is_spectator {
                None
            } else {
                pool.next().copied()
            };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roster_with(names: &[&str]) -> Roster {
        let mut roster = Roster::new(0);
        for (i, name) in names.iter().enumerate() {
            roster
                .join(i as ConnectionId + 1, name, JoinRole::Player, false)
                .unwrap();
        }
        roster
    }

    fn assert_symbol_prefix(roster: &Roster) {
        let symbols: Vec<Symbol> = roster.non_spectators().filter_map(|p| p.symbol).collect();
        assert_eq!(symbols.len(), roster.active_count());
        assert_eq!(symbols, SYMBOLS[..symbols.len()].to_vec());
        for player in roster.players().iter().filter(|p| p.is_spectator) {
            assert!(player.symbol.is_none());
        }
    }

    #[test]
    fn test_first_joiner_leads() {
        let roster = roster_with(&["ada", "grace", "linus"]);

        assert!(roster.players()[0].leader);
        assert_eq!(roster.players().iter().filter(|p| p.leader).count(), 1);
        assert_eq!(roster.len(), 3);
    }

    #[test]
    fn test_symbols_follow_roster_order() {
        let roster = roster_with(&["ada", "grace", "linus"]);

        assert_eq!(roster.get(1).unwrap().symbol, Some(1));
        assert_eq!(roster.get(2).unwrap().symbol, Some(2));
        assert_eq!(roster.get(3).unwrap().symbol, Some(3));
        assert_eq!(roster.find_by_symbol(2).unwrap().name, "grace");
    }

    #[test]
    fn test_symbols_shift_when_a_player_leaves() {
        let mut roster = roster_with(&["ada", "grace", "linus"]);

        roster.leave(2).unwrap();

        assert_eq!(roster.get(3).unwrap().symbol, Some(2));
        assert!(roster.find_by_symbol(3).is_none());
        assert_symbol_prefix(&roster);
    }

    #[test]
    fn test_spectators_are_skipped_by_symbols() {
        let mut roster = roster_with(&["ada"]);
        roster.join(2, "watcher", JoinRole::Spectator, false).unwrap();
        roster.join(3, "grace", JoinRole::Player, false).unwrap();

        assert_eq!(roster.get(2).unwrap().symbol, None);
        assert_eq!(roster.get(3).unwrap().symbol, Some(2));
        assert_symbol_prefix(&roster);
    }

    #[test]
    fn test_duplicate_names_are_rejected_case_insensitively() {
        let mut roster = roster_with(&["Ada"]);

        let err = roster.join(2, " ADA ", JoinRole::Player, false).unwrap_err();
        assert_eq!(err, ActionError::DuplicateName("ADA".to_string()));
        assert_eq!(roster.len(), 1);
    }

    #[test]
    fn test_blank_name_and_double_join_are_rejected() {
        let mut roster = roster_with(&["ada"]);

        assert_eq!(
            roster.join(2, "   ", JoinRole::Player, false).unwrap_err(),
            ActionError::InvalidName
        );
        assert_eq!(
            roster.join(1, "other", JoinRole::Player, false).unwrap_err(),
            ActionError::AlreadyJoined(1)
        );
    }

    #[test]
    fn test_name_length_is_capped() {
        let mut roster = roster_with(&["ada"]);
        let longest = "x".repeat(MAX_NAME_LEN);
        let too_long = "y".repeat(MAX_NAME_LEN + 1);

        assert_eq!(
            roster.join(2, &too_long, JoinRole::Player, false).unwrap_err(),
            ActionError::InvalidName
        );
        assert!(roster.join(3, &longest, JoinRole::Player, false).is_ok());
        // Surrounding whitespace does not count towards the limit
        let padded = format!("  {}  ", "z".repeat(MAX_NAME_LEN));
        assert!(roster.join(4, &padded, JoinRole::Player, false).is_ok());
        assert_eq!(roster.len(), 3);
    }

    #[test]
    fn test_full_roster_of_longest_names_fits_a_datagram() {
        let mut roster = Roster::new(0);
        for id in 1..=(MAX_PLAYERS as ConnectionId + 4) {
            let name = format!("{:0>width$}", id, width = MAX_NAME_LEN);
            roster.join(id, &name, JoinRole::Player, false).unwrap();
        }

        let packet = shared::Packet::Event(shared::ServerEvent::PlayerUpdate {
            players: roster.snapshot(),
        });
        let bytes = bincode::serialize(&packet).unwrap();
        assert!(bytes.len() < 4096, "snapshot is {} bytes", bytes.len());
    }

    #[test]
    fn test_capacity_overflow_becomes_spectator() {
        let names = ["a", "b", "c", "d", "e", "f", "g", "h"];
        let mut roster = roster_with(&names);

        let late = roster.join(9, "i", JoinRole::Player, false).unwrap();
        assert!(late.is_spectator);
        assert!(late.symbol.is_none());
        assert_eq!(roster.active_count(), MAX_PLAYERS);
        assert_symbol_prefix(&roster);
    }

    #[test]
    fn test_joining_an_active_session_spectates() {
        let mut roster = roster_with(&["ada"]);

        let late = roster.join(2, "grace", JoinRole::Player, true).unwrap();
        assert!(late.is_spectator);
        assert!(!late.leader);
    }

    #[test]
    fn test_leader_leaving_promotes_new_head() {
        let mut roster = roster_with(&["ada", "grace", "linus"]);

        let removed = roster.leave(1).unwrap();
        assert!(removed.leader);
        assert!(roster.get(2).unwrap().leader);
        assert!(!roster.get(3).unwrap().leader);
    }

    #[test]
    fn test_last_player_leaving_empties_roster() {
        let mut roster = roster_with(&["ada"]);

        roster.leave(1).unwrap();
        assert!(roster.is_empty());
        assert!(roster.leave(1).is_none());
    }

    #[test]
    fn test_symbols_stay_a_prefix_through_churn() {
        let mut roster = Roster::new(0);
        let mut next_id = 1;
        for round in 0..20u32 {
            let role = if round % 3 == 0 {
                JoinRole::Spectator
            } else {
                JoinRole::Player
            };
            roster
                .join(next_id, &format!("p{}", next_id), role, false)
                .unwrap();
            next_id += 1;
            if round % 4 == 3 {
                let victim = roster.players()[round as usize % roster.len()].id;
                roster.leave(victim);
            }
            assert_symbol_prefix(&roster);
            assert!(roster.players().iter().filter(|p| p.leader).count() <= 1);
        }
    }
}
