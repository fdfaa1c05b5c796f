//! Session lifecycle and action dispatch
//!
//! A [`Session`] is the single authority for one game: it owns the roster,
//! the pending buff expiries and the countdown/reset deadlines. Callers feed
//! it one step at a time, either an inbound action ([`Session::handle`]), a
//! dropped connection ([`Session::disconnect`]) or the passage of time
//! ([`Session::poll`]). Every step runs to completion and returns the
//! events to deliver; the session never talks to the network itself.
//!
//! ```text
//! Lobby ──start──▶ Countdown ──3,2,1,0──▶ Active ──winner──▶ Ended
//!   ▲                                                          │
//!   └────────────────────── reset after 5 units ───────────────┘
//! ```

use crate::combat::{
    check_end_conditions, expire_power_up, resolve_gun_change, resolve_power_up,
    resolve_shoot, resolve_treasure, Resolution,
};
use crate::effects::{EffectScheduler, PendingEffect};
use crate::error::{ActionError, ActionResult};
use crate::roster::Roster;
use log::{debug, info};
use shared::{
    ClientAction, ConnectionId, JoinRole, ServerEvent, COUNTDOWN_FROM, MIN_PLAYERS,
    RESET_DELAY_UNITS, TIME_UNIT,
};
use std::fmt;
use std::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Lobby,
    Countdown,
    Active,
    Ended,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Lobby => "lobby",
            SessionState::Countdown => "countdown",
            SessionState::Active => "active",
            SessionState::Ended => "ended",
        };
        f.write_str(name)
    }
}

/// Who an outbound event is delivered to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recipient {
    /// Every connected client, joined or not
    All,
    One(ConnectionId),
    AllExcept(ConnectionId),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outbound {
    pub recipient: Recipient,
    pub event: ServerEvent,
}

impl Outbound {
    pub fn all(event: ServerEvent) -> Self {
        Self {
            recipient: Recipient::All,
            event,
        }
    }

    pub fn to(id: ConnectionId, event: ServerEvent) -> Self {
        Self {
            recipient: Recipient::One(id),
            event,
        }
    }

    pub fn all_except(id: ConnectionId, event: ServerEvent) -> Self {
        Self {
            recipient: Recipient::AllExcept(id),
            event,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Countdown {
    remaining: u32,
    next_tick: Instant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Timer {
    Countdown,
    Effect,
    Reset,
}

#[derive(Debug)]
pub struct Session {
    state: SessionState,
    roster: Roster,
    effects: EffectScheduler,
    countdown: Option<Countdown>,
    reset_at: Option<Instant>,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    pub fn new() -> Self {
        Self {
            state: SessionState::Lobby,
            roster: Roster::new(0),
            effects: EffectScheduler::new(),
            countdown: None,
            reset_at: None,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn roster(&self) -> &Roster {
        &self.roster
    }

    pub fn pending_effects(&self) -> usize {
        self.effects.len()
    }

    /// Applies one client action and returns the events it produced
    ///
    /// Rejections never escape: they are logged and, when the client has a
    /// notice for them, answered to the requester alone.
    pub fn handle(
        &mut self,
        id: ConnectionId,
        action: ClientAction,
        now: Instant,
    ) -> Vec<Outbound> {
        let result = match action {
            ClientAction::RequestSymbol => self.request_symbol(id),
            ClientAction::JoinLobby { name, role } => self.join(id, &name, role),
            ClientAction::ToggleReady => self.toggle_ready(id),
            ClientAction::TriggerStart => self.trigger_start(id, now),
            ClientAction::Shoot { target_symbol } => self
                .combat("shoot", |roster| resolve_shoot(roster, id, target_symbol))
                .map(|resolution| self.apply(id, resolution, now)),
            ClientAction::PowerUp { code } => self
                .combat("power-up", |roster| resolve_power_up(roster, id, code))
                .map(|resolution| self.apply(id, resolution, now)),
            ClientAction::TreasureFound => self
                .combat("treasure", |roster| resolve_treasure(roster, id))
                .map(|resolution| self.apply(id, resolution, now)),
            ClientAction::ChangeGun { code } => self
                .combat("change-gun", |roster| resolve_gun_change(roster, id, code))
                .map(|resolution| self.apply(id, resolution, now)),
            ClientAction::SendEmoji { target_name, emoji } => {
                self.send_emoji(id, &target_name, emoji)
            }
        };

        match result {
            Ok(events) => events,
            Err(err) => {
                debug!("Rejected action from connection {}: {}", id, err);
                err.notice()
                    .map(|notice| vec![Outbound::to(id, notice)])
                    .unwrap_or_default()
            }
        }
    }

    /// Removes a dropped connection from the roster
    ///
    /// In an active game the departure can decide the winner.
    pub fn disconnect(&mut self, id: ConnectionId, now: Instant) -> Vec<Outbound> {
        let Some(removed) = self.roster.leave(id) else {
            return Vec::new();
        };
        let cancelled = self.effects.cancel_player(id);
        if cancelled > 0 {
            debug!("Cancelled {} pending effects for {}", cancelled, removed.name);
        }

        if self.state == SessionState::Active {
            let mut events = vec![Outbound::all(ServerEvent::PlayerUpdate {
                players: self.roster.snapshot(),
            })];
            events.extend(self.evaluate_win(now));
            events
        } else {
            vec![Outbound::all(ServerEvent::LobbyUpdate {
                players: self.roster.snapshot(),
            })]
        }
    }

    /// Fires every timer due at `now`, earliest first
    pub fn poll(&mut self, now: Instant) -> Vec<Outbound> {
        let mut events = Vec::new();
        while let Some((due, timer)) = self.next_timer() {
            if due > now {
                break;
            }
            match timer {
                Timer::Countdown => events.extend(self.countdown_tick()),
                Timer::Effect => match self.effects.pop_due(now) {
                    Some(effect) => events.extend(self.fire_effect(effect)),
                    None => break,
                },
                Timer::Reset => events.extend(self.reset()),
            }
        }
        events
    }

    /// Earliest instant at which [`Session::poll`] has work to do
    pub fn next_deadline(&self) -> Option<Instant> {
        self.next_timer().map(|(due, _)| due)
    }

    /// Starts a fresh incarnation: empty roster, no timers, back in the lobby
    pub fn reset(&mut self) -> Vec<Outbound> {
        let cancelled = self.effects.cancel_all();
        self.roster = Roster::new(self.roster.generation() + 1);
        self.state = SessionState::Lobby;
        self.countdown = None;
        self.reset_at = None;

        info!(
            "Session reset (generation {}, {} effects cancelled)",
            self.roster.generation(),
            cancelled
        );
        vec![Outbound::all(ServerEvent::SessionReset)]
    }

    fn next_timer(&self) -> Option<(Instant, Timer)> {
        [
            self.countdown.map(|c| (c.next_tick, Timer::Countdown)),
            self.effects.next_due().map(|due| (due, Timer::Effect)),
            self.reset_at.map(|due| (due, Timer::Reset)),
        ]
        .into_iter()
        .flatten()
        .min_by_key(|(due, _)| *due)
    }

    fn require_state(&self, action: &'static str, state: SessionState) -> ActionResult<()> {
        if self.state == state {
            Ok(())
        } else {
            Err(ActionError::WrongPhase {
                action,
                state: self.state,
            })
        }
    }

    fn combat<F>(&mut self, action: &'static str, resolve: F) -> ActionResult<Resolution>
    where
        F: FnOnce(&mut Roster) -> ActionResult<Resolution>,
    {
        self.require_state(action, SessionState::Active)?;
        resolve(&mut self.roster)
    }

    fn apply(&mut self, id: ConnectionId, resolution: Resolution, now: Instant) -> Vec<Outbound> {
        let mut events = resolution.events;
        if let Some(kind) = resolution.expiry {
            let due = now + TIME_UNIT * kind.duration_units();
            let generation = self.roster.generation();
            self.effects.schedule(id, kind, generation, due);
        }
        if resolution.evaluate_win {
            events.extend(self.evaluate_win(now));
        }
        events
    }

    fn request_symbol(&self, id: ConnectionId) -> ActionResult<Vec<Outbound>> {
        let player = self.roster.get(id).ok_or(ActionError::UnknownPlayer(id))?;
        Ok(vec![Outbound::to(
            id,
            ServerEvent::YourSymbol {
                symbol: player.symbol,
            },
        )])
    }

    fn join(
        &mut self,
        id: ConnectionId,
        name: &str,
        role: JoinRole,
    ) -> ActionResult<Vec<Outbound>> {
        let active = self.state == SessionState::Active;
        self.roster.join(id, name, role, active)?;

        let players = self.roster.snapshot();
        if active {
            Ok(vec![
                Outbound::to(
                    id,
                    ServerEvent::GameStarted {
                        players: players.clone(),
                    },
                ),
                Outbound::all(ServerEvent::PlayerUpdate { players }),
            ])
        } else {
            Ok(vec![Outbound::all(ServerEvent::LobbyUpdate { players })])
        }
    }

    fn toggle_ready(&mut self, id: ConnectionId) -> ActionResult<Vec<Outbound>> {
        self.require_state("toggle-ready", SessionState::Lobby)?;
        let player = self
            .roster
            .get_mut(id)
            .ok_or(ActionError::UnknownPlayer(id))?;
        player.is_ready = !player.is_ready;
        let leader_ready = player.leader && player.is_ready;

        let players = self.roster.snapshot();
        let mut events = vec![Outbound::all(ServerEvent::LobbyUpdate {
            players: players.clone(),
        })];
        if leader_ready {
            events.push(Outbound::to(id, ServerEvent::DisplayStart { players }));
        }

        let all_ready = self.roster.active_count() >= MIN_PLAYERS
            && self.roster.non_spectators().all(|p| p.is_ready);
        if all_ready {
            events.push(Outbound::all(ServerEvent::EnableStart));
        }
        Ok(events)
    }

    fn trigger_start(&mut self, id: ConnectionId, now: Instant) -> ActionResult<Vec<Outbound>> {
        self.require_state("trigger-start", SessionState::Lobby)?;
        let player = self.roster.get(id).ok_or(ActionError::UnknownPlayer(id))?;
        if !player.leader {
            return Err(ActionError::NotLeader(id));
        }

        info!(
            "{} started the countdown with {} players",
            player.name,
            self.roster.active_count()
        );
        self.state = SessionState::Countdown;
        self.countdown = Some(Countdown {
            remaining: COUNTDOWN_FROM,
            next_tick: now + TIME_UNIT,
        });
        Ok(Vec::new())
    }

    fn send_emoji(
        &self,
        id: ConnectionId,
        target_name: &str,
        emoji: String,
    ) -> ActionResult<Vec<Outbound>> {
        let sender = self.roster.get(id).ok_or(ActionError::UnknownPlayer(id))?;
        match self.roster.find_by_name(target_name) {
            Some(target) => Ok(vec![Outbound::to(
                target.id,
                ServerEvent::EmojiReceived {
                    from: sender.name.clone(),
                    emoji,
                },
            )]),
            None => {
                debug!("Emoji from {} for unknown player {:?}", sender.name, target_name);
                Ok(Vec::new())
            }
        }
    }

    fn countdown_tick(&mut self) -> Vec<Outbound> {
        let Some(mut countdown) = self.countdown.take() else {
            return Vec::new();
        };

        let mut events = vec![Outbound::all(ServerEvent::Countdown {
            remaining: countdown.remaining,
        })];

        if countdown.remaining == 0 {
            self.state = SessionState::Active;
            info!("Game started with {} players", self.roster.active_count());
            let players = self.roster.snapshot();
            events.push(Outbound::all(ServerEvent::GameStarted {
                players: players.clone(),
            }));
            events.push(Outbound::all(ServerEvent::PlayerUpdate { players }));
        } else {
            countdown.remaining -= 1;
            countdown.next_tick += TIME_UNIT;
            self.countdown = Some(countdown);
        }
        events
    }

    fn fire_effect(&mut self, effect: PendingEffect) -> Vec<Outbound> {
        if effect.generation != self.roster.generation() {
            debug!(
                "Discarding {} expiry {} from generation {}",
                effect.kind, effect.id, effect.generation
            );
            return Vec::new();
        }
        let Some(player) = self.roster.get_mut(effect.player) else {
            debug!(
                "Discarding {} expiry {} for departed connection {}",
                effect.kind, effect.id, effect.player
            );
            return Vec::new();
        };

        expire_power_up(player, effect.kind);
        vec![Outbound::all(ServerEvent::PlayerUpdate {
            players: self.roster.snapshot(),
        })]
    }

    fn evaluate_win(&mut self, now: Instant) -> Vec<Outbound> {
        match check_end_conditions(&self.roster) {
            Some(winner) => self.end_game(winner, now),
            None => Vec::new(),
        }
    }

    fn end_game(&mut self, winner_id: ConnectionId, now: Instant) -> Vec<Outbound> {
        if self.state != SessionState::Active {
            return Vec::new();
        }
        let Some(winner) = self.roster.get(winner_id).cloned() else {
            return Vec::new();
        };

        info!("{} won the game", winner.name);
        self.state = SessionState::Ended;
        self.reset_at = Some(now + TIME_UNIT * RESET_DELAY_UNITS);

        vec![
            Outbound::all(ServerEvent::GameEnd {
                winner,
                players: self.roster.snapshot(),
            }),
            Outbound::to(winner_id, ServerEvent::Victory),
            Outbound::all_except(winner_id, ServerEvent::Defeat),
        ]
    }
}
