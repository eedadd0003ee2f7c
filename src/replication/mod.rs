//! Replication is achieved through a simplistic primary/backup model.
//!
//! Every [`ReplicaNode`] holds a full copy of the order book. Whichever node
//! the dispatcher promotes accepts writes and, after each one, pushes its
//! whole book to every other replica listed in the registry. Peers replace
//! their book outright on receipt: there are no deltas, versions or merges,
//! the last snapshot to arrive wins.

mod node;
mod server;

pub use node::{generate_id, ReplicaNode};
pub use server::ReplicaService;
