use crate::orders::OrderBook;
use crate::proto::replica_server::{Replica, ReplicaServer};
use crate::proto::{
    Empty, GetOrdersReply, GetOrdersRequest, IdReply, PeerRequest, PlaceOrderReply,
    PlaceOrderRequest, PrimaryRequest, Snapshot,
};
use crate::replication::ReplicaNode;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_stream::wrappers::TcpListenerStream;
use tracing::info;

/// Exposes a [`ReplicaNode`] to the dispatcher and to peer replicas.
#[derive(Clone)]
pub struct ReplicaService {
    node: Arc<ReplicaNode>,
}

impl ReplicaService {
    pub fn new(node: Arc<ReplicaNode>) -> Self {
        Self { node }
    }

    pub async fn serve(self, listener: TcpListener) -> anyhow::Result<()> {
        info!(
            "Replica {} listening on {}",
            self.node.id(),
            listener.local_addr()?
        );
        info!("hungry-replica version: {}", env!("CARGO_PKG_VERSION"));
        tonic::transport::Server::builder()
            .add_service(ReplicaServer::new(self))
            .serve_with_incoming(TcpListenerStream::new(listener))
            .await?;
        Ok(())
    }
}

#[tonic::async_trait]
impl Replica for ReplicaService {
    async fn id(
        &self,
        _req: tonic::Request<Empty>,
    ) -> tonic::Result<tonic::Response<IdReply>, tonic::Status> {
        Ok(tonic::Response::new(IdReply {
            id: self.node.id().to_string(),
        }))
    }

    async fn place_order(
        &self,
        req: tonic::Request<PlaceOrderRequest>,
    ) -> tonic::Result<tonic::Response<PlaceOrderReply>, tonic::Status> {
        let req = req.into_inner();
        let outcome = self.node.place_order(&req.postcode, req.items).await;
        Ok(tonic::Response::new(outcome.into()))
    }

    async fn get_orders(
        &self,
        req: tonic::Request<GetOrdersRequest>,
    ) -> tonic::Result<tonic::Response<GetOrdersReply>, tonic::Status> {
        let req = req.into_inner();
        let listing = self.node.get_orders(&req.postcode).await;
        Ok(tonic::Response::new(listing.into()))
    }

    async fn receive_snapshot(
        &self,
        req: tonic::Request<Snapshot>,
    ) -> tonic::Result<tonic::Response<Empty>, tonic::Status> {
        self.node
            .receive_snapshot(OrderBook::from(req.into_inner()))
            .await;
        Ok(tonic::Response::new(Empty {}))
    }

    async fn notify_new_peer(
        &self,
        req: tonic::Request<PeerRequest>,
    ) -> tonic::Result<tonic::Response<Empty>, tonic::Status> {
        let req = req.into_inner();
        self.node
            .notify_new_peer(&req.peer_id)
            .await
            .map_err(|e| e.to_status())?;
        Ok(tonic::Response::new(Empty {}))
    }

    async fn set_primary_id(
        &self,
        req: tonic::Request<PrimaryRequest>,
    ) -> tonic::Result<tonic::Response<Empty>, tonic::Status> {
        let req = req.into_inner();
        self.node.set_primary_id(&req.primary_id).await;
        Ok(tonic::Response::new(Empty {}))
    }

    async fn promote(
        &self,
        _req: tonic::Request<Empty>,
    ) -> tonic::Result<tonic::Response<Empty>, tonic::Status> {
        self.node.promote().await;
        Ok(tonic::Response::new(Empty {}))
    }
}
