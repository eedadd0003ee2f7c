use clap::Parser;
use hungry::replication::generate_id;
use hungry::{
    endpoint_uri, GrpcConnector, HttpValidator, OrderBook, Registry, RemoteDispatcher,
    RemoteRegistry, ReplicaNode, ReplicaService, DISPATCHER_NAME,
};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::signal::ctrl_c;
use tracing::{error, info, warn};

/// A replica node holding a full copy of every order.
#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
struct App {
    /// Unique replica identification string (default: random)
    #[clap(short, long, env = "HUNGRY_REPLICA_ID")]
    id: Option<String>,

    #[clap(long, default_value = "127.0.0.1:0", env = "HUNGRY_ADDR")]
    addr: SocketAddr,

    /// Address peers and the dispatcher use to reach this replica, defaults
    /// to the bound address.
    #[clap(long, env = "HUNGRY_ADVERTISE")]
    advertise: Option<String>,

    #[clap(long, default_value = "127.0.0.1:4000", env = "HUNGRY_REGISTRY")]
    registry: String,

    /// JSON file of `{postcode: [[item, ...], ...]}` to start from.
    #[clap(long, conflicts_with = "demo_seed")]
    seed: Option<PathBuf>,

    /// Start from a small set of sample orders.
    #[clap(long)]
    demo_seed: bool,

    /// Deadline for each call to a peer, in milliseconds.
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

    // Without a registry there is nobody to replicate with.
    let registry = Arc::new(RemoteRegistry::connect(&app.registry).await?);

    let book = match (&app.seed, app.demo_seed) {
        (Some(path), _) => OrderBook::load(path)?,
        (None, true) => OrderBook::demo(),
        (None, false) => OrderBook::new(),
    };
    let id = app.id.unwrap_or_else(generate_id);
    let timeout = app.rpc_timeout_ms.map(Duration::from_millis);

    let listener = TcpListener::bind(app.addr).await?;
    let advertise = endpoint_uri(
        &app.advertise
            .unwrap_or_else(|| listener.local_addr().map(|a| a.to_string()).unwrap_or_default()),
    );

    let node = Arc::new(ReplicaNode::new(
        id,
        book,
        registry.clone(),
        Arc::new(GrpcConnector::new(timeout)),
        Arc::new(HttpValidator::default()),
    )
    .with_advertised_addr(&advertise));
    let mut server = tokio::spawn(ReplicaService::new(node.clone()).serve(listener));

    registry.register(&node.registry_name(), &advertise).await?;
    announce(registry.as_ref(), node.id()).await;
    info!("Just Hungry replica '{}' available at {}", node.id(), advertise);

    tokio::select! {
        res = &mut server => {
            res??;
        }
        signal = ctrl_c() => match signal {
            Ok(_) => info!("Received shutdown signal"),
            Err(e) => error!("Error receiving Ctrl-C: {e}"),
        },
    }

    if let Err(e) = registry.remove(&node.registry_name()).await {
        warn!(error = %e, "Could not remove replica from registry");
    }
    Ok(())
}

/// Tell the dispatcher, if there is one, that this replica has joined.
async fn announce(registry: &RemoteRegistry, id: &str) {
    info!("Attempting to access dispatcher...");
    let addr = match registry.lookup(DISPATCHER_NAME).await {
        Ok(addr) => addr,
        Err(e) if e.is_naming() => {
            info!(reason = %e, "No dispatcher found");
            return;
        }
        Err(e) => {
            warn!(error = %e, "Could not look up dispatcher");
            return;
        }
    };
    let registered = match RemoteDispatcher::connect(&addr).await {
        Ok(dispatcher) => dispatcher.register_replica(id).await,
        Err(e) => Err(e),
    };
    match registered {
        Ok(()) => info!("Registered with dispatcher"),
        Err(e) => warn!(error = %e, "Communication error with dispatcher"),
    }
}
