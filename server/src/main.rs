use clap::Parser;
use log::info;
use server::config::ServerConfig;
use server::network::{Server, ServerMessage};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server IP address to bind to
    #[arg(short = 'H', long)]
    host: Option<String>,

    /// Server port to listen on
    #[arg(short, long)]
    port: Option<u16>,

    /// Tick rate (updates per second)
    #[arg(short, long)]
    tick_rate: Option<u32>,

    /// Maximum number of connected peers
    #[arg(short, long)]
    max_clients: Option<usize>,

    /// Match length in seconds
    #[arg(short = 'd', long)]
    match_duration: Option<f32>,

    /// Start the match as soon as an opponent joins
    #[arg(short, long)]
    auto_start: bool,

    /// TOML file with server and match settings
    #[arg(short, long)]
    config: Option<PathBuf>,
}

impl Args {
    /// Loads the config file, if any, and applies flag overrides on top.
    fn into_config(self) -> Result<ServerConfig, Box<dyn std::error::Error>> {
        let mut config = match &self.config {
            Some(path) => ServerConfig::load(path)?,
            None => ServerConfig::default(),
        };
        if let Some(host) = self.host {
            config.host = host;
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(tick_rate) = self.tick_rate {
            config.tick_rate = tick_rate;
        }
        if let Some(max_clients) = self.max_clients {
            config.max_clients = max_clients;
        }
        if let Some(duration) = self.match_duration {
            config.game.match_duration = duration;
        }
        config.auto_start |= self.auto_start;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let config = Args::parse().into_config()?;

    info!("Starting server...");
    info!(
        "Tick rate: {} Hz, match length: {}s, max peers: {}",
        config.tick_rate, config.game.match_duration, config.max_clients
    );
    info!("Console: start, serve, pause, resume, restart, hit");

    let mut server = Server::new(&config).await?;

    let shutdown = server.shutdown_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = shutdown.send(ServerMessage::Shutdown);
        }
    });

    server.run().await?;

    Ok(())
}
