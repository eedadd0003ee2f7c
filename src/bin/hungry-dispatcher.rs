use clap::Parser;
use hungry::{
    endpoint_uri, Dispatcher, DispatcherService, GrpcConnector, Registry, RemoteRegistry,
    DISPATCHER_NAME,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::signal::ctrl_c;
use tracing::{error, info, warn};

/// Front end that elects a primary replica and routes client calls to it.
#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
struct App {
    #[clap(long, default_value = "127.0.0.1:4001", env = "HUNGRY_ADDR")]
    addr: SocketAddr,

    /// Address clients and replicas use to reach the dispatcher, defaults to
    /// the bound address.
    #[clap(long, env = "HUNGRY_ADVERTISE")]
    advertise: Option<String>,

    #[clap(long, default_value = "127.0.0.1:4000", env = "HUNGRY_REGISTRY")]
    registry: String,

    /// Deadline for each call to a replica, in milliseconds.
    #[clap(long, env = "HUNGRY_RPC_TIMEOUT_MS")]
    rpc_timeout_ms: Option<u64>,

    #[clap(long, default_value = "info", env = "HUNGRY_LOG")]
    log_level: tracing_subscriber::filter::LevelFilter,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let app = App::parse();
    tracing_subscriber::fmt()
        .with_max_level(app.log_level)
        .init();

    let registry = Arc::new(RemoteRegistry::connect(&app.registry).await?);
    let connector = GrpcConnector::new(app.rpc_timeout_ms.map(Duration::from_millis));
    let dispatcher = Arc::new(Dispatcher::new(registry.clone(), Arc::new(connector)));
    dispatcher.assign_primary().await;

    let listener = TcpListener::bind(app.addr).await?;
    let advertise = endpoint_uri(
        &app.advertise
            .unwrap_or_else(|| listener.local_addr().map(|a| a.to_string()).unwrap_or_default()),
    );
    let mut server = tokio::spawn(DispatcherService::new(dispatcher).serve(listener));

    registry.register(DISPATCHER_NAME, &advertise).await?;
    info!("Dispatcher available at {}", advertise);

    tokio::select! {
        res = &mut server => {
            res??;
        }
        signal = ctrl_c() => match signal {
            Ok(_) => info!("Received shutdown signal"),
            Err(e) => error!("Error receiving Ctrl-C: {e}"),
        },
    }

    if let Err(e) = registry.remove(DISPATCHER_NAME).await {
        warn!(error = %e, "Could not remove dispatcher from registry");
    }
    Ok(())
}
