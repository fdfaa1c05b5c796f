use clap::Parser;
use log::{error, info};
use server::network::{Server, ServerMessage};
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(author, version, about = "Authoritative coordinator for scan-tag sessions")]
struct Args {
    /// Server IP address to bind to
    #[arg(short = 'H', long, default_value = "127.0.0.1")]
    host: String,

    /// Server port to listen on
    #[arg(short, long, default_value = "8080")]
    port: u16,

    /// Timer polls per second (countdown, buff expiry, reset)
    #[arg(short, long, default_value = "20")]
    tick_rate: u32,

    /// Maximum concurrent connections, spectators included
    #[arg(long, default_value = "32")]
    max_clients: usize,

    /// Seconds without any packet before a client is dropped
    #[arg(long, default_value = "10")]
    client_timeout: u64,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "info");
    }
    env_logger::init();

    let args = Args::parse();
    let address = format!("{}:{}", args.host, args.port);
    let tick_duration = Duration::from_secs_f64(1.0 / args.tick_rate.max(1) as f64);

    info!(
        "Starting coordinator on {} ({} Hz, {} max clients, {}s timeout)",
        address, args.tick_rate, args.max_clients, args.client_timeout
    );

    let mut server = Server::new(
        &address,
        tick_duration,
        args.max_clients,
        Duration::from_secs(args.client_timeout),
    )
    .await?;

    let shutdown = server.shutdown_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received Ctrl+C, shutting down gracefully...");
            if shutdown.send(ServerMessage::Shutdown).is_err() {
                error!("Server loop already stopped");
            }
        }
    });

    server.run().await?;

    Ok(())
}
