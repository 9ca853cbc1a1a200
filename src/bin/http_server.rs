//! CivicWatch HTTP server entry point

use clap::Parser;
use std::path::PathBuf;

use civicwatch::config::AppConfig;
use civicwatch::http_server::HttpServer;

#[derive(Parser)]
#[command(name = "civicwatch", about = "Community incident-reporting service")]
struct Args {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "./civicwatch.toml")]
    config: PathBuf,

    /// Override the listen port from the config file
    #[arg(short, long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "civicwatch=info,tower_http=info".into()),
        )
        .init();

    let args = Args::parse();

    let mut config = match AppConfig::load(&args.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };
    if let Some(port) = args.port {
        config.server.port = port;
    }

    let server = HttpServer::new(config);
    if let Err(e) = server.start().await {
        eprintln!("Server error: {}", e);
        std::process::exit(1);
    }
}
