use clap::Parser;
use log::{error, info};
use server::config::{GameRules, ServerConfig};
use server::network::Server;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Address to bind to
    #[arg(short = 'H', long, default_value = "0.0.0.0")]
    host: String,

    /// Port to listen on
    #[arg(short, long, env = "PORT", default_value = "3000")]
    port: u16,

    /// Maximum number of concurrent connections
    #[arg(short, long, default_value = "32")]
    max_clients: usize,

    /// Health every player starts and revives with
    #[arg(long, default_value_t = shared::BASE_HEALTH)]
    base_health: u32,

    /// Seconds of silence before a connection is dropped
    #[arg(long, default_value = "30", value_parser = clap::value_parser!(u64).range(1..))]
    client_timeout_secs: u64,

    /// Seconds between keep-alive pings
    #[arg(long, default_value = "10", value_parser = clap::value_parser!(u64).range(1..))]
    ping_interval_secs: u64,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();

    let config = ServerConfig {
        max_clients: args.max_clients,
        client_timeout: Duration::from_secs(args.client_timeout_secs),
        ping_interval: Duration::from_secs(args.ping_interval_secs),
        rules: GameRules::default().with_base_health(args.base_health),
    };

    info!("Starting arena server...");
    info!(
        "Max clients: {}, base health: {}",
        config.max_clients, config.rules.base_health
    );

    let address = format!("{}:{}", args.host, args.port);
    let mut server = Server::new(&address, config).await?;

    tokio::select! {
        result = server.run() => {
            if let Err(e) = result {
                error!("Server stopped with error: {}", e);
                return Err(e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
        }
    }

    Ok(())
}
