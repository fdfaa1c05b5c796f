//! Combat and economy resolution
//!
//! Each resolver validates the requester against the roster, applies the
//! mutation in place and returns the events to dispatch. Phase checks and
//! timers live in the session; resolvers only ever see an active session.

use crate::error::{ActionError, ActionResult};
use crate::roster::Roster;
use crate::session::Outbound;
use crate::utils::get_timestamp;
use log::debug;
use shared::{
    ConnectionId, LiveEvent, Player, PowerUpKind, ServerEvent, Symbol, WeaponKind,
    HEALTH_PACK_BONUS, TAG_TARGET, TREASURE_VALUE,
};

/// Outcome of a successfully resolved action
#[derive(Debug, Default)]
pub struct Resolution {
    pub events: Vec<Outbound>,
    /// Buff whose expiry must be scheduled for the requester
    pub expiry: Option<PowerUpKind>,
    /// Set when health or tags changed and the game may be over
    pub evaluate_win: bool,
}

fn combatant(roster: &mut Roster, id: ConnectionId) -> ActionResult<&mut Player> {
    let player = roster.get_mut(id).ok_or(ActionError::UnknownPlayer(id))?;
    if player.is_spectator {
        return Err(ActionError::Spectator(id));
    }
    Ok(player)
}

fn roster_update(roster: &Roster) -> Outbound {
    Outbound::all(ServerEvent::PlayerUpdate {
        players: roster.snapshot(),
    })
}

pub fn resolve_shoot(
    roster: &mut Roster,
    shooter_id: ConnectionId,
    target_symbol: Symbol,
) -> ActionResult<Resolution> {
    let shooter = combatant(roster, shooter_id)?;
    let shooter_name = shooter.name.clone();
    let weapon = shooter.gun;
    let reward = shooter.shot_reward();

    let target = roster
        .find_by_symbol(target_symbol)
        .ok_or(ActionError::UnknownSymbol(target_symbol))?;
    let target_id = target.id;

    if target.is_invisible {
        debug!("{} shot at invisible {}", shooter_name, target.name);
        return Ok(Resolution {
            events: vec![Outbound::to(
                shooter_id,
                ServerEvent::InvisibilityNotice {
                    target_name: target.name.clone(),
                },
            )],
            ..Resolution::default()
        });
    }

    let (target_name, target_alive) = {
        let target = roster
            .get_mut(target_id)
            .ok_or(ActionError::UnknownPlayer(target_id))?;
        target.health -= weapon.damage();
        (target.name.clone(), target.is_alive())
    };

    if let Some(shooter) = roster.get_mut(shooter_id) {
        shooter.tags += 1;
        shooter.points += reward;
    }

    let mut events = vec![Outbound::all(ServerEvent::LiveFeed(LiveEvent::Shot {
        shooter: shooter_name.clone(),
        target: target_name.clone(),
        weapon,
        timestamp: get_timestamp(),
    }))];

    if !target_alive {
        events.push(Outbound::to(
            target_id,
            ServerEvent::DeathNotice {
                shooter_name: shooter_name.clone(),
            },
        ));
        events.push(Outbound::all(ServerEvent::LiveFeed(LiveEvent::Death {
            killer: shooter_name,
            victim: target_name,
            timestamp: get_timestamp(),
        })));
    }

    events.push(roster_update(roster));
    events.push(Outbound::to(target_id, ServerEvent::ShotNotice));

    Ok(Resolution {
        events,
        expiry: None,
        evaluate_win: true,
    })
}

pub fn resolve_power_up(
    roster: &mut Roster,
    shooter_id: ConnectionId,
    code: u8,
) -> ActionResult<Resolution> {
    let power_up = PowerUpKind::from_code(code).ok_or(ActionError::UnknownCode(code))?;
    let shooter = combatant(roster, shooter_id)?;

    if let Some(active) = shooter.active_power_up {
        return Err(ActionError::PowerUpActive(active));
    }
    if shooter.points < power_up.cost() {
        return Err(ActionError::InsufficientPoints {
            power_up,
            cost: power_up.cost(),
            points: shooter.points,
        });
    }
    if shooter.has_used(power_up) {
        return Err(ActionError::AlreadyUsed(power_up));
    }

    shooter.points -= power_up.cost();
    shooter.mark_used(power_up);
    shooter.active_power_up = Some(power_up);
    match power_up {
        PowerUpKind::HealthPack => shooter.health += HEALTH_PACK_BONUS,
        PowerUpKind::Invisibility => shooter.is_invisible = true,
        PowerUpKind::ScoreMultiplier => shooter.is_score_mult_active = true,
    }
    let player = shooter.name.clone();

    Ok(Resolution {
        events: vec![
            Outbound::to(shooter_id, ServerEvent::PowerUpAck),
            roster_update(roster),
            Outbound::all(ServerEvent::LiveFeed(LiveEvent::PowerUp {
                player,
                power_up,
                timestamp: get_timestamp(),
            })),
        ],
        expiry: Some(power_up),
        evaluate_win: false,
    })
}

/// Clears a buff once its duration has elapsed. The health pack bonus is
/// permanent; only its label goes away.
pub fn expire_power_up(player: &mut Player, power_up: PowerUpKind) {
    match power_up {
        PowerUpKind::HealthPack => {}
        PowerUpKind::Invisibility => player.is_invisible = false,
        PowerUpKind::ScoreMultiplier => player.is_score_mult_active = false,
    }
    if player.active_power_up == Some(power_up) {
        player.active_power_up = None;
    }
}

/// Awards the treasure bonus once per player. Repeat scans still reach the
/// live feed.
pub fn resolve_treasure(
    roster: &mut Roster,
    shooter_id: ConnectionId,
) -> ActionResult<Resolution> {
    let shooter = combatant(roster, shooter_id)?;

    if !shooter.used_treasure {
        shooter.points += TREASURE_VALUE;
        shooter.used_treasure = true;
    } else {
        debug!("{} rescanned the treasure", shooter.name);
    }
    let player = shooter.name.clone();

    Ok(Resolution {
        events: vec![
            Outbound::to(shooter_id, ServerEvent::TreasureAck),
            Outbound::all(ServerEvent::LiveFeed(LiveEvent::Treasure {
                player,
                timestamp: get_timestamp(),
            })),
            roster_update(roster),
        ],
        ..Resolution::default()
    })
}

pub fn resolve_gun_change(
    roster: &mut Roster,
    shooter_id: ConnectionId,
    code: u8,
) -> ActionResult<Resolution> {
    let weapon = WeaponKind::from_code(code).ok_or(ActionError::UnknownCode(code))?;
    let shooter = combatant(roster, shooter_id)?;
    shooter.gun = weapon;

    Ok(Resolution {
        events: vec![
            Outbound::to(shooter_id, ServerEvent::WeaponChanged { weapon }),
            roster_update(roster),
        ],
        ..Resolution::default()
    })
}

/// Decides whether the game is over
///
/// Last one standing takes precedence over the tag threshold; ties on the
/// threshold go to the earliest player in roster order.
pub fn check_end_conditions(roster: &Roster) -> Option<ConnectionId> {
    let mut alive = roster.non_spectators().filter(|p| p.is_alive());
    if let (Some(survivor), None) = (alive.next(), alive.next()) {
        return Some(survivor.id);
    }

    roster
        .non_spectators()
        .find(|p| p.tags >= TAG_TARGET)
        .map(|p| p.id)
}
