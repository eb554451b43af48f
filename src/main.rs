//! Homeserver demo binary.
//!
//! # Architecture Overview
//!
//! ```text
//!     command line ──▶ config::Settings ──▶ observability::init
//!                                                 │
//!                                                 ▼
//!     Client Request ──▶ http::request ──▶ handler ──▶ tracing event
//!                        (context scope)                   │
//!                                                          ▼
//!                                    pipeline ──▶ filters ──▶ main / access sinks
//! ```

use std::net::SocketAddr;

use clap::Parser;
use tokio::net::TcpListener;

use homeserver_logging::config::LoggingArgs;
use homeserver_logging::http::HttpServer;
use homeserver_logging::observability;

#[derive(Parser, Debug)]
#[command(name = "homeserver", version, about = "Homeserver with request-scoped logging")]
struct Cli {
    /// Address to listen on
    #[arg(long, default_value = "127.0.0.1:8008")]
    bind: SocketAddr,

    #[command(flatten)]
    logging: LoggingArgs,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let base = std::env::current_dir()?;
    let settings = cli.logging.into_settings(&base);
    // Nothing can be logged until this succeeds, so errors go straight to the caller.
    observability::init(&settings)?;

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "homeserver starting");

    let listener = TcpListener::bind(cli.bind).await?;
    HttpServer::new().run(listener).await?;

    if let Some(pipeline) = observability::installed() {
        pipeline.flush()?;
    }
    tracing::info!("Shutdown complete");
    Ok(())
}
