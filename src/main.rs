use std::sync::Arc;

use clap::Parser;
use gtm::server::{GtmState, Server};
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Global transaction manager for a shared-nothing cluster.
#[derive(Debug, Parser)]
#[command(name = "gtm", version, about)]
struct Args {
    /// Address to listen on.
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    /// Port to listen on.
    #[arg(long, default_value_t = gtm::config::DEFAULT_PORT)]
    port: u16,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let args = Args::parse();
    let addr = format!("{}:{}", args.host, args.port);

    let state = Arc::new(GtmState::new());
    let listener = TcpListener::bind(&addr).await?;
    info!(%addr, "GTM listening");

    let server = Server::new(listener, state);
    let registry = server.registry().clone();

    tokio::select! {
        res = server.serve() => res?,
        _ = tokio::signal::ctrl_c() => {
            info!("shutting down");
            registry.cancel_all();
        }
    }

    Ok(())
}
