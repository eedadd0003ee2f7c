use clap::Parser;
use hungry::{InMemoryRegistry, RegistryService};
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tokio::signal::ctrl_c;
use tracing::{error, info};

/// In-memory name registry that replicas and the dispatcher find each other through.
#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
struct App {
    #[clap(long, default_value = "127.0.0.1:4000", env = "HUNGRY_REGISTRY_ADDR")]
    addr: SocketAddr,

    #[clap(long, default_value = "info", env = "HUNGRY_LOG")]
    log_level: tracing_subscriber::filter::LevelFilter,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let app = App::parse();
    tracing_subscriber::fmt()
        .with_max_level(app.log_level)
        .init();

    let listener = TcpListener::bind(app.addr).await?;
    let service = RegistryService::new(InMemoryRegistry::new());

    tokio::select! {
        res = service.serve(listener) => res?,
        signal = ctrl_c() => match signal {
            Ok(_) => info!("Received shutdown signal"),
            Err(e) => error!("Error receiving Ctrl-C: {e}"),
        },
    }

    Ok(())
}
