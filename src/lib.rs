//! # hungry
//!
//! A takeaway ordering service replicated across interchangeable nodes.
//!
//! - [`replication::ReplicaNode`] holds a full copy of every order and, when
//!   primary, pushes that copy to all of its peers after each write.
//! - [`dispatcher::Dispatcher`] finds replicas through a [`registry::Registry`],
//!   elects the primary and forwards client calls to it.
//!
//! Every process talks to the others over gRPC, see the `hungry-registry`,
//! `hungry-replica`, `hungry-dispatcher` and `hungry-client` binaries.

pub mod client;
pub mod dispatcher;
mod error;
pub mod orders;
pub mod proto;
pub mod registry;
pub mod replication;
pub mod validator;

pub use client::{GrpcConnector, RemoteDispatcher, RemoteReplica, ReplicaConnector, ReplicaHandle};
pub use dispatcher::{Dispatcher, DispatcherService};
pub use error::Error;
pub use orders::{looks_like_postcode, normalize, Order, OrderBook, OrderListing, OrderOutcome};
pub use registry::{InMemoryRegistry, Registry, RegistryService, RemoteRegistry};
pub use replication::{ReplicaNode, ReplicaService};
pub use validator::{HttpValidator, PostcodeValidator, Validation};

pub type Result<T> = std::result::Result<T, Error>;

/// Registry names of replicas are this prefix followed by the replica id.
pub const REPLICA_PREFIX: &str = "hungry.replica.";

/// Registry name of the dispatcher.
pub const DISPATCHER_NAME: &str = "hungry.dispatcher";

pub const NOT_SERVING: &str = "No longer serving.";
pub const NOT_ON_RECORD: &str = "Postcode not on record.";

/// Turn a bare `host:port` into the URI form gRPC endpoints expect.
pub fn endpoint_uri(addr: &str) -> String {
    if addr.contains("://") {
        addr.to_string()
    } else {
        format!("http://{addr}")
    }
}
