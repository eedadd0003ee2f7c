//! Typed clients for the inter-node and client-facing operations.
//!
//! Replica nodes and the dispatcher never talk to each other through the
//! generated stubs directly. They go through [`ReplicaHandle`], obtained from
//! a [`ReplicaConnector`], so the same code runs against gRPC peers and
//! against in-process nodes.

use crate::orders::{Order, OrderBook, OrderListing, OrderOutcome};
use crate::proto::dispatcher_client::DispatcherClient;
use crate::proto::replica_client::ReplicaClient;
use crate::proto::{Empty, GetOrdersRequest, PeerRequest, PlaceOrderRequest, PrimaryRequest};
use crate::{endpoint_uri, Error, Result};
use std::sync::Arc;
use std::time::Duration;
use tonic::transport::{Channel, Endpoint};

/// Operations one replica exposes to the dispatcher and to its peers.
#[tonic::async_trait]
pub trait ReplicaHandle: Send + Sync {
    /// Address this handle talks to, used for logging.
    fn addr(&self) -> &str;

    /// The replica's self-reported identity.
    async fn id(&self) -> Result<String>;

    async fn place_order(&self, postcode: &str, items: Order) -> Result<OrderOutcome>;

    async fn get_orders(&self, postcode: &str) -> Result<OrderListing>;

    /// Replace the remote order book wholesale.
    async fn receive_snapshot(&self, book: &OrderBook) -> Result<()>;

    async fn notify_new_peer(&self, peer_id: &str) -> Result<()>;

    async fn set_primary_id(&self, primary_id: &str) -> Result<()>;

    /// Make the replica primary, which pushes its state to every peer
    /// before returning.
    async fn promote(&self) -> Result<()>;
}

/// Opens a [`ReplicaHandle`] for an address found in the registry.
#[tonic::async_trait]
pub trait ReplicaConnector: Send + Sync + 'static {
    async fn connect(&self, addr: &str) -> Result<Arc<dyn ReplicaHandle>>;
}

#[derive(Debug, Clone)]
pub struct RemoteReplica {
    addr: String,
    client: ReplicaClient<Channel>,
}

impl RemoteReplica {
    pub async fn connect(addr: &str, timeout: Option<Duration>) -> Result<Self> {
        let addr = endpoint_uri(addr);
        let channel = open_channel(&addr, timeout).await?;
        Ok(Self {
            client: ReplicaClient::new(channel),
            addr,
        })
    }

    fn failed(&self, status: tonic::Status) -> Error {
        Error::unreachable(&self.addr, status)
    }
}

async fn open_channel(addr: &str, timeout: Option<Duration>) -> Result<Channel> {
    let mut endpoint =
        Endpoint::from_shared(addr.to_string()).map_err(|e| Error::unreachable(addr, e))?;
    if let Some(timeout) = timeout {
        endpoint = endpoint.connect_timeout(timeout).timeout(timeout);
    }
    endpoint
        .connect()
        .await
        .map_err(|e| Error::unreachable(addr, e))
}

#[tonic::async_trait]
impl ReplicaHandle for RemoteReplica {
    fn addr(&self) -> &str {
        &self.addr
    }

    async fn id(&self) -> Result<String> {
        let reply = self
            .client
            .clone()
            .id(Empty {})
            .await
            .map_err(|s| self.failed(s))?;
        Ok(reply.into_inner().id)
    }

    async fn place_order(&self, postcode: &str, items: Order) -> Result<OrderOutcome> {
        let req = PlaceOrderRequest {
            postcode: postcode.to_string(),
            items,
        };
        let reply = self
            .client
            .clone()
            .place_order(req)
            .await
            .map_err(|s| self.failed(s))?;
        Ok(reply.into_inner().into())
    }

    async fn get_orders(&self, postcode: &str) -> Result<OrderListing> {
        let req = GetOrdersRequest {
            postcode: postcode.to_string(),
        };
        let reply = self
            .client
            .clone()
            .get_orders(req)
            .await
            .map_err(|s| self.failed(s))?;
        Ok(reply.into_inner().into())
    }

    async fn receive_snapshot(&self, book: &OrderBook) -> Result<()> {
        self.client
            .clone()
            .receive_snapshot(book.to_snapshot())
            .await
            .map_err(|s| self.failed(s))?;
        Ok(())
    }

    async fn notify_new_peer(&self, peer_id: &str) -> Result<()> {
        let req = PeerRequest {
            peer_id: peer_id.to_string(),
        };
        self.client
            .clone()
            .notify_new_peer(req)
            .await
            .map_err(|s| self.failed(s))?;
        Ok(())
    }

    async fn set_primary_id(&self, primary_id: &str) -> Result<()> {
        let req = PrimaryRequest {
            primary_id: primary_id.to_string(),
        };
        self.client
            .clone()
            .set_primary_id(req)
            .await
            .map_err(|s| self.failed(s))?;
        Ok(())
    }

    async fn promote(&self) -> Result<()> {
        self.client
            .clone()
            .promote(Empty {})
            .await
            .map_err(|s| self.failed(s))?;
        Ok(())
    }
}

/// Connects to replicas over gRPC, one channel per connection attempt.
#[derive(Debug, Clone, Default)]
pub struct GrpcConnector {
    /// Per-request deadline, `None` leaves it to the transport.
    timeout: Option<Duration>,
}

impl GrpcConnector {
    pub fn new(timeout: Option<Duration>) -> Self {
        Self { timeout }
    }
}

#[tonic::async_trait]
impl ReplicaConnector for GrpcConnector {
    async fn connect(&self, addr: &str) -> Result<Arc<dyn ReplicaHandle>> {
        let replica = RemoteReplica::connect(addr, self.timeout).await?;
        Ok(Arc::new(replica))
    }
}

/// Client for the dispatcher's public operations.
#[derive(Debug, Clone)]
pub struct RemoteDispatcher {
    addr: String,
    client: DispatcherClient<Channel>,
}

impl RemoteDispatcher {
    pub async fn connect(addr: &str) -> Result<Self> {
        let addr = endpoint_uri(addr);
        let channel = open_channel(&addr, None).await?;
        Ok(Self {
            client: DispatcherClient::new(channel),
            addr,
        })
    }

    fn failed(&self, status: tonic::Status) -> Error {
        Error::unreachable(&self.addr, status)
    }

    pub async fn is_serving(&self) -> Result<bool> {
        let reply = self
            .client
            .clone()
            .is_serving(Empty {})
            .await
            .map_err(|s| self.failed(s))?;
        Ok(reply.into_inner().serving)
    }

    pub async fn place_order(&self, postcode: &str, items: Order) -> Result<OrderOutcome> {
        let req = PlaceOrderRequest {
            postcode: postcode.to_string(),
            items,
        };
        let reply = self
            .client
            .clone()
            .place_order(req)
            .await
            .map_err(|s| self.failed(s))?;
        Ok(reply.into_inner().into())
    }

    pub async fn get_orders(&self, postcode: &str) -> Result<OrderListing> {
        let req = GetOrdersRequest {
            postcode: postcode.to_string(),
        };
        let reply = self
            .client
            .clone()
            .get_orders(req)
            .await
            .map_err(|s| self.failed(s))?;
        Ok(reply.into_inner().into())
    }

    /// Announce a freshly started replica. Returns as soon as the dispatcher
    /// has accepted the announcement, bootstrap happens in the background.
    pub async fn register_replica(&self, replica_id: &str) -> Result<()> {
        let req = PeerRequest {
            peer_id: replica_id.to_string(),
        };
        self.client
            .clone()
            .register_replica(req)
            .await
            .map_err(|s| self.failed(s))?;
        Ok(())
    }
}
