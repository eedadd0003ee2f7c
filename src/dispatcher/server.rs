use crate::dispatcher::Dispatcher;
use crate::proto::dispatcher_server::{self, DispatcherServer};
use crate::proto::{
    Empty, GetOrdersReply, GetOrdersRequest, PeerRequest, PlaceOrderReply, PlaceOrderRequest,
    ServingReply,
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_stream::wrappers::TcpListenerStream;
use tracing::{debug, info};

/// Client-facing gRPC front for a [`Dispatcher`].
#[derive(Clone)]
pub struct DispatcherService {
    dispatcher: Arc<Dispatcher>,
}

impl DispatcherService {
    pub fn new(dispatcher: Arc<Dispatcher>) -> Self {
        Self { dispatcher }
    }

    pub async fn serve(self, listener: TcpListener) -> anyhow::Result<()> {
        info!("Dispatcher listening on {}", listener.local_addr()?);
        info!("hungry-dispatcher version: {}", env!("CARGO_PKG_VERSION"));
        tonic::transport::Server::builder()
            .add_service(DispatcherServer::new(self))
            .serve_with_incoming(TcpListenerStream::new(listener))
            .await?;
        Ok(())
    }
}

#[tonic::async_trait]
impl dispatcher_server::Dispatcher for DispatcherService {
    async fn is_serving(
        &self,
        _req: tonic::Request<Empty>,
    ) -> tonic::Result<tonic::Response<ServingReply>, tonic::Status> {
        let serving = self.dispatcher.is_serving().await;
        Ok(tonic::Response::new(ServingReply { serving }))
    }

    async fn place_order(
        &self,
        req: tonic::Request<PlaceOrderRequest>,
    ) -> tonic::Result<tonic::Response<PlaceOrderReply>, tonic::Status> {
        let req = req.into_inner();
        debug!(postcode = %req.postcode, items = req.items.len(), "Forwarding order");
        let outcome = self.dispatcher.place_order(&req.postcode, req.items).await;
        Ok(tonic::Response::new(outcome.into()))
    }

    async fn get_orders(
        &self,
        req: tonic::Request<GetOrdersRequest>,
    ) -> tonic::Result<tonic::Response<GetOrdersReply>, tonic::Status> {
        let req = req.into_inner();
        let listing = self.dispatcher.get_orders(&req.postcode).await;
        Ok(tonic::Response::new(listing.into()))
    }

    async fn register_replica(
        &self,
        req: tonic::Request<PeerRequest>,
    ) -> tonic::Result<tonic::Response<Empty>, tonic::Status> {
        let req = req.into_inner();
        // Fire and forget, the announcing replica never waits on the bootstrap.
        let _ = self.dispatcher.register_replica(req.peer_id);
        Ok(tonic::Response::new(Empty {}))
    }
}
