//! Performance benchmarks for critical session paths

use bincode::{deserialize, serialize};
use server::roster::Roster;
use server::{Session, SessionState};
use shared::{
    ClientAction, JoinRole, Packet, Player, PowerUpKind, ServerEvent, COUNTDOWN_FROM, MAX_PLAYERS,
    TIME_UNIT,
};
use std::time::Instant;

fn full_roster() -> Vec<Player> {
    let mut roster = Roster::new(0);
    for id in 1..=MAX_PLAYERS as u32 {
        roster
            .join(id, &format!("player{}", id), JoinRole::Player, false)
            .unwrap();
    }
    roster.snapshot()
}

/// Benchmarks join/leave churn with symbol rebalancing
#[test]
fn benchmark_roster_churn() {
    let iterations = 10_000;
    let mut roster = Roster::new(0);
    let start = Instant::now();

    for i in 0..iterations {
        let id = i as u32 + 1;
        roster
            .join(id, &format!("player{}", id), JoinRole::Player, false)
            .unwrap();
        if roster.len() == MAX_PLAYERS {
            let head = roster.players()[0].id;
            roster.leave(head);
        }
    }

    let duration = start.elapsed();
    println!(
        "Roster churn: {} joins in {:?} ({:.2} μs/iter)",
        iterations,
        duration,
        duration.as_micros() as f64 / iterations as f64
    );

    assert!(roster.len() < MAX_PLAYERS);
    // Should complete in under 1 second
    assert!(duration.as_millis() < 1000);
}

/// Benchmarks shot resolution in a full active session
#[test]
fn benchmark_shot_resolution() {
    let begin = Instant::now();
    let mut session = Session::new();
    for id in 1..=MAX_PLAYERS as u32 {
        session.handle(
            id,
            ClientAction::JoinLobby {
                name: format!("player{}", id),
                role: JoinRole::Player,
            },
            begin,
        );
    }
    session.handle(1, ClientAction::TriggerStart, begin);
    let now = begin + TIME_UNIT * (COUNTDOWN_FROM + 1);
    session.poll(now);
    assert_eq!(session.state(), SessionState::Active);

    // Player 1 only fires at symbols 2..=8 so the game ends on the tag target
    let iterations = 1_000;
    let start = Instant::now();
    let mut shots = 0;

    for i in 0..iterations {
        if session.state() != SessionState::Active {
            break;
        }
        let target_symbol = 2 + (i % (MAX_PLAYERS - 1)) as u8;
        session.handle(1, ClientAction::Shoot { target_symbol }, now);
        shots += 1;
    }

    let duration = start.elapsed();
    println!(
        "Shot resolution: {} shots in {:?} ({:.2} μs/shot)",
        shots,
        duration,
        duration.as_micros() as f64 / shots as f64
    );

    assert_eq!(session.state(), SessionState::Ended);
    assert!(duration.as_millis() < 500);
}

/// Benchmarks serialization of the largest broadcast, a full roster snapshot
#[test]
fn benchmark_packet_serialization() {
    let packet = Packet::Event(ServerEvent::PlayerUpdate {
        players: full_roster(),
    });

    let iterations = 10_000;
    let start = Instant::now();
    let mut total_size = 0;

    for _ in 0..iterations {
        let data = serialize(&packet).unwrap();
        total_size += data.len();
        let _: Packet = deserialize(&data).unwrap();
    }

    let duration = start.elapsed();
    println!(
        "Roster snapshot round trip: {} iterations in {:?} ({} bytes avg)",
        iterations,
        duration,
        total_size / iterations
    );

    // Must fit the server's 4 KiB receive buffer
    assert!(total_size / iterations < 4096);
    assert!(duration.as_millis() < 2000);
}

/// Stress test for timer polling with many buffs in flight
#[test]
fn stress_test_effect_polling() {
    let begin = Instant::now();
    let mut session = Session::new();
    for id in 1..=MAX_PLAYERS as u32 {
        session.handle(
            id,
            ClientAction::JoinLobby {
                name: format!("player{}", id),
                role: JoinRole::Player,
            },
            begin,
        );
    }
    session.handle(1, ClientAction::TriggerStart, begin);
    let now = begin + TIME_UNIT * (COUNTDOWN_FROM + 1);
    session.poll(now);

    for id in 1..=MAX_PLAYERS as u32 {
        session.handle(id, ClientAction::TreasureFound, now);
        session.handle(
            id,
            ClientAction::PowerUp {
                code: PowerUpKind::Invisibility.code(),
            },
            now,
        );
    }
    assert_eq!(session.pending_effects(), MAX_PLAYERS);

    let iterations = 100_000;
    let start = Instant::now();
    for _ in 0..iterations {
        let _ = session.poll(now);
    }
    let expired = session.poll(now + TIME_UNIT * PowerUpKind::Invisibility.duration_units());

    let duration = start.elapsed();
    println!(
        "Effect polling: {} polls in {:?} ({:.2} ns/poll)",
        iterations,
        duration,
        duration.as_nanos() as f64 / iterations as f64
    );

    assert_eq!(expired.len(), MAX_PLAYERS);
    assert_eq!(session.pending_effects(), 0);
    assert!(duration.as_millis() < 1000);
}
