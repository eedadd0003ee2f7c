//! Name-to-address directory used for replica discovery.
//!
//! The rest of the crate only depends on the [`Registry`] trait. The
//! [`InMemoryRegistry`] is what the `hungry-registry` binary serves through
//! [`RegistryService`], and [`RemoteRegistry`] is the matching client.

use crate::proto::registry_client::RegistryClient;
use crate::proto::registry_server::{self, RegistryServer};
use crate::proto::{
    Empty, ListReply, ListRequest, LookupReply, LookupRequest, RegisterRequest, RemoveRequest,
};
use crate::{Error, Result};
use dashmap::DashMap;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_stream::wrappers::TcpListenerStream;
use tonic::transport::Channel;
use tracing::{debug, info};

#[tonic::async_trait]
pub trait Registry: Send + Sync + 'static {
    async fn register(&self, name: &str, addr: &str) -> Result<()>;

    /// Fails with [`Error::NameNotFound`] when nothing is registered under `name`.
    async fn lookup(&self, name: &str) -> Result<String>;

    /// Every entry whose name starts with `prefix`. Callers must not rely on
    /// the iteration order.
    async fn list(&self, prefix: &str) -> Result<BTreeMap<String, String>>;

    async fn remove(&self, name: &str) -> Result<()>;
}

#[derive(Debug, Default, Clone)]
pub struct InMemoryRegistry {
    entries: Arc<DashMap<String, String>>,
}

impl InMemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[tonic::async_trait]
impl Registry for InMemoryRegistry {
    async fn register(&self, name: &str, addr: &str) -> Result<()> {
        debug!(name, addr, "Registering name");
        self.entries.insert(name.to_string(), addr.to_string());
        Ok(())
    }

    async fn lookup(&self, name: &str) -> Result<String> {
        self.entries
            .get(name)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| Error::NameNotFound(name.to_string()))
    }

    async fn list(&self, prefix: &str) -> Result<BTreeMap<String, String>> {
        Ok(self
            .entries
            .iter()
            .filter(|entry| entry.key().starts_with(prefix))
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect())
    }

    async fn remove(&self, name: &str) -> Result<()> {
        debug!(name, "Removing name");
        self.entries.remove(name);
        Ok(())
    }
}

/// gRPC front for any [`Registry`].
#[derive(Clone)]
pub struct RegistryService<R> {
    registry: R,
}

impl<R> RegistryService<R>
where
    R: Registry + Clone,
{
    pub fn new(registry: R) -> Self {
        Self { registry }
    }

    pub async fn serve(self, listener: TcpListener) -> anyhow::Result<()> {
        info!("Registry listening on {}", listener.local_addr()?);
        tonic::transport::Server::builder()
            .add_service(RegistryServer::new(self))
            .serve_with_incoming(TcpListenerStream::new(listener))
            .await?;
        Ok(())
    }
}

#[tonic::async_trait]
impl<R> registry_server::Registry for RegistryService<R>
where
    R: Registry + Clone,
{
    async fn register(
        &self,
        req: tonic::Request<RegisterRequest>,
    ) -> tonic::Result<tonic::Response<Empty>, tonic::Status> {
        let req = req.into_inner();
        self.registry
            .register(&req.name, &req.addr)
            .await
            .map_err(|e| e.to_status())?;
        Ok(tonic::Response::new(Empty {}))
    }

    async fn lookup(
        &self,
        req: tonic::Request<LookupRequest>,
    ) -> tonic::Result<tonic::Response<LookupReply>, tonic::Status> {
        let req = req.into_inner();
        let addr = self
            .registry
            .lookup(&req.name)
            .await
            .map_err(|e| e.to_status())?;
        Ok(tonic::Response::new(LookupReply { addr }))
    }

    async fn list(
        &self,
        req: tonic::Request<ListRequest>,
    ) -> tonic::Result<tonic::Response<ListReply>, tonic::Status> {
        let req = req.into_inner();
        let entries = self
            .registry
            .list(&req.prefix)
            .await
            .map_err(|e| e.to_status())?;
        Ok(tonic::Response::new(ListReply { entries }))
    }

    async fn remove(
        &self,
        req: tonic::Request<RemoveRequest>,
    ) -> tonic::Result<tonic::Response<Empty>, tonic::Status> {
        let req = req.into_inner();
        self.registry
            .remove(&req.name)
            .await
            .map_err(|e| e.to_status())?;
        Ok(tonic::Response::new(Empty {}))
    }
}

/// Client for a registry served by [`RegistryService`].
#[derive(Debug, Clone)]
pub struct RemoteRegistry {
    addr: String,
    client: RegistryClient<Channel>,
}

impl RemoteRegistry {
    /// Connect eagerly, an unreachable registry is reported as
    /// [`Error::RegistryUnavailable`].
    pub async fn connect(addr: impl Into<String>) -> Result<Self> {
        let addr = crate::endpoint_uri(&addr.into());
        let client = RegistryClient::connect(addr.clone())
            .await
            .map_err(|e| Error::RegistryUnavailable(format!("{addr}: {e}")))?;
        Ok(Self { addr, client })
    }

    fn naming_error(&self, name: &str, status: tonic::Status) -> Error {
        match status.code() {
            tonic::Code::NotFound => Error::NameNotFound(name.to_string()),
            _ => Error::RegistryUnavailable(format!("{}: {}", self.addr, status.message())),
        }
    }
}

#[tonic::async_trait]
impl Registry for RemoteRegistry {
    async fn register(&self, name: &str, addr: &str) -> Result<()> {
        let req = RegisterRequest {
            name: name.to_string(),
            addr: addr.to_string(),
        };
        self.client
            .clone()
            .register(req)
            .await
            .map_err(|s| self.naming_error(name, s))?;
        Ok(())
    }

    async fn lookup(&self, name: &str) -> Result<String> {
        let req = LookupRequest {
            name: name.to_string(),
        };
        let reply = self
            .client
            .clone()
            .lookup(req)
            .await
            .map_err(|s| self.naming_error(name, s))?;
        Ok(reply.into_inner().addr)
    }

    async fn list(&self, prefix: &str) -> Result<BTreeMap<String, String>> {
        let req = ListRequest {
            prefix: prefix.to_string(),
        };
        let reply = self
            .client
            .clone()
            .list(req)
            .await
            .map_err(|s| self.naming_error(prefix, s))?;
        Ok(reply.into_inner().entries)
    }

    async fn remove(&self, name: &str) -> Result<()> {
        let req = RemoveRequest {
            name: name.to_string(),
        };
        self.client
            .clone()
            .remove(req)
            .await
            .map_err(|s| self.naming_error(name, s))?;
        Ok(())
    }
}
