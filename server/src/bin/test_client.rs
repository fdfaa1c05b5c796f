//! Headless bot that plays a session against a running coordinator.
//!
//! Start several of these next to the server to exercise the whole lifecycle:
//! the first bot becomes leader and starts the game once everyone is ready.

use bincode::{deserialize, serialize};
use clap::Parser;
use log::{info, warn};
use rand::seq::SliceRandom;
use rand::Rng;
use shared::{
    ClientAction, ConnectionId, JoinRole, Packet, Player, PowerUpKind, ServerEvent, Symbol,
    WeaponKind, PROTOCOL_VERSION,
};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::time::interval;

#[derive(Parser, Debug)]
#[command(author, version, about = "Scripted scan-tag client")]
struct Args {
    /// Coordinator address
    #[arg(short, long, default_value = "127.0.0.1:8080")]
    server: String,

    /// Display name to join with
    #[arg(short, long, default_value = "bot")]
    name: String,

    /// Join as a spectator
    #[arg(long)]
    spectator: bool,
}

#[derive(Default)]
struct BotState {
    client_id: Option<ConnectionId>,
    ready_sent: bool,
    active: bool,
    players: Vec<Player>,
}

impl BotState {
    fn me(&self) -> Option<&Player> {
        let id = self.client_id?;
        self.players.iter().find(|p| p.id == id)
    }

    fn targets(&self) -> Vec<Symbol> {
        self.players
            .iter()
            .filter(|p| Some(p.id) != self.client_id)
            .filter_map(|p| p.symbol)
            .collect()
    }
}

async fn send(
    socket: &UdpSocket,
    server: SocketAddr,
    packet: &Packet,
) -> Result<(), Box<dyn std::error::Error>> {
    let data = serialize(packet)?;
    socket.send_to(&data, server).await?;
    Ok(())
}

fn next_move(state: &BotState) -> Option<ClientAction> {
    let me = state.me()?;
    if !state.active || me.is_spectator || !me.is_alive() {
        return None;
    }

    let mut rng = rand::thread_rng();
    match rng.gen_range(0..10) {
        0 => Some(ClientAction::TreasureFound),
        1 => {
            let power_up = *PowerUpKind::ALL.choose(&mut rng)?;
            Some(ClientAction::PowerUp {
                code: power_up.code(),
            })
        }
        2 => {
            let weapon = *WeaponKind::ALL.choose(&mut rng)?;
            Some(ClientAction::ChangeGun {
                code: weapon.code(),
            })
        }
        _ => {
            let target = *state.targets().choose(&mut rng)?;
            Some(ClientAction::Shoot {
                target_symbol: target,
            })
        }
    }
}

fn handle_event(
    state: &mut BotState,
    event: ServerEvent,
    name: &str,
    role: JoinRole,
) -> Option<ClientAction> {
    match event {
        ServerEvent::LobbyUpdate { players } => {
            state.players = players;
            let me = state.me()?;
            if !state.ready_sent && !me.is_spectator {
                state.ready_sent = true;
                return Some(ClientAction::ToggleReady);
            }
        }
        ServerEvent::EnableStart => {
            if state.me().map_or(false, |me| me.leader) {
                info!("Everyone is ready, starting");
                return Some(ClientAction::TriggerStart);
            }
        }
        ServerEvent::Countdown { remaining } => info!("Starting in {}", remaining),
        ServerEvent::GameStarted { players } => {
            info!("Game started with {} participants", players.len());
            state.players = players;
            state.active = true;
        }
        ServerEvent::PlayerUpdate { players } => state.players = players,
        ServerEvent::LiveFeed(event) => info!("Feed: {:?}", event),
        ServerEvent::DeathNotice { shooter_name } => info!("Tagged out by {}", shooter_name),
        ServerEvent::GameEnd { winner, .. } => {
            info!("{} won the game", winner.name);
            state.active = false;
        }
        ServerEvent::SessionReset => {
            info!("Session reset, rejoining");
            state.ready_sent = false;
            state.active = false;
            state.players.clear();
            return Some(ClientAction::JoinLobby {
                name: name.to_string(),
                role,
            });
        }
        other => info!("Event: {:?}", other),
    }
    None
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "info");
    }
    env_logger::init();

    let args = Args::parse();
    let role = if args.spectator {
        JoinRole::Spectator
    } else {
        JoinRole::Player
    };

    let socket = UdpSocket::bind("0.0.0.0:0").await?;
    let server = args.server.parse::<SocketAddr>()?;
    info!("Client socket bound to {}", socket.local_addr()?);

    send(
        &socket,
        server,
        &Packet::Connect {
            client_version: PROTOCOL_VERSION,
        },
    )
    .await?;

    let mut state = BotState::default();
    let mut ticker = interval(Duration::from_secs(1));
    let mut buffer = [0u8; 4096];

    loop {
        tokio::select! {
            received = socket.recv_from(&mut buffer) => {
                let (len, _) = received?;
                let packet = match deserialize::<Packet>(&buffer[..len]) {
                    Ok(packet) => packet,
                    Err(e) => {
                        warn!("Undecodable packet: {}", e);
                        continue;
                    }
                };

                let reply = match packet {
                    Packet::Connected { client_id } => {
                        info!("Connected as {}", client_id);
                        state.client_id = Some(client_id);
                        Some(ClientAction::JoinLobby { name: args.name.clone(), role })
                    }
                    Packet::Event(event) => handle_event(&mut state, event, &args.name, role),
                    Packet::Disconnected { reason } => {
                        warn!("Disconnected: {}", reason);
                        return Ok(());
                    }
                    _ => None,
                };

                if let Some(action) = reply {
                    send(&socket, server, &Packet::Action(action)).await?;
                }
            }

            _ = ticker.tick() => {
                send(&socket, server, &Packet::Heartbeat).await?;
                if let Some(action) = next_move(&state) {
                    send(&socket, server, &Packet::Action(action)).await?;
                }
            }

            _ = tokio::signal::ctrl_c() => {
                info!("Leaving");
                send(&socket, server, &Packet::Disconnect).await?;
                return Ok(());
            }
        }
    }
}
