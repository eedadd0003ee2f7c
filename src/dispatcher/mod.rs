//! Front end that clients talk to.
//!
//! The dispatcher discovers replicas through the registry, promotes one of
//! them to primary and forwards every client call to it. A call that fails
//! to reach the primary triggers a fresh election and is retried once.

mod server;

pub use server::DispatcherService;

use crate::client::{ReplicaConnector, ReplicaHandle};
use crate::orders::{normalize, Order, OrderListing, OrderOutcome};
use crate::registry::Registry;
use crate::{Error, Result, NOT_SERVING, REPLICA_PREFIX};
use futures::future::{BoxFuture, FutureExt};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// How many times a client call is re-sent after losing the primary.
pub const RETRY_BUDGET: usize = 1;

#[derive(Clone)]
struct Primary {
    id: String,
    handle: Arc<dyn ReplicaHandle>,
}

pub struct Dispatcher {
    registry: Arc<dyn Registry>,
    connector: Arc<dyn ReplicaConnector>,
    /// Cached primary. Elections hold this lock for their whole scan.
    primary: Mutex<Option<Primary>>,
    /// Completed elections, only ever bumped while `primary` is locked.
    ///
    /// Callers read it before queueing for the lock; if it has moved on by
    /// the time they get in, the election they wanted has just run and they
    /// take its result instead of starting another.
    epoch: AtomicU64,
}

impl Dispatcher {
    pub fn new(registry: Arc<dyn Registry>, connector: Arc<dyn ReplicaConnector>) -> Self {
        Self {
            registry,
            connector,
            primary: Mutex::new(None),
            epoch: AtomicU64::new(0),
        }
    }

    /// Id of the cached primary, without triggering an election.
    pub async fn primary_id(&self) -> Option<String> {
        let primary = self.primary.lock().await;
        primary.as_ref().map(|p| p.id.clone())
    }

    /// Whether a primary is cached, electing one first if there is none.
    pub async fn is_serving(&self) -> bool {
        self.serving_primary().await.is_some()
    }

    /// Drop the cached primary and pick a new one, returning its id.
    pub async fn assign_primary(&self) -> Option<String> {
        let seen = self.epoch.load(Ordering::SeqCst);
        self.elect(seen).await.map(|(primary, _)| primary.id)
    }

    async fn serving_primary(&self) -> Option<(Primary, u64)> {
        let seen = self.epoch.load(Ordering::SeqCst);
        {
            let primary = self.primary.lock().await;
            if let Some(primary) = primary.as_ref() {
                return Some((primary.clone(), self.epoch.load(Ordering::SeqCst)));
            }
        }
        self.elect(seen).await
    }

    async fn elect(&self, seen: u64) -> Option<(Primary, u64)> {
        let mut primary = self.primary.lock().await;
        let epoch = self.epoch.load(Ordering::SeqCst);
        if epoch != seen {
            debug!(epoch, "Election already ran, adopting its result");
            return primary.clone().map(|p| (p, epoch));
        }

        info!("Assigning a primary replica");
        *primary = None;
        *primary = self.scan().await;
        let epoch = self.epoch.fetch_add(1, Ordering::SeqCst) + 1;
        match primary.as_ref() {
            Some(elected) => info!(primary = %elected.id, epoch, "Primary replica set"),
            None => warn!(epoch, "Primary replica could not be set"),
        }
        primary.clone().map(|p| (p, epoch))
    }

    /// Walk the registry: the first replica that answers with the id it is
    /// registered under is promoted, every later one is told who won.
    async fn scan(&self) -> Option<Primary> {
        let entries = match self.registry.list(REPLICA_PREFIX).await {
            Ok(entries) => entries,
            Err(e) => {
                error!(error = %e, "Unable to list replicas");
                return None;
            }
        };

        let mut primary: Option<Primary> = None;
        for (name, addr) in entries {
            let expected = name.strip_prefix(REPLICA_PREFIX).unwrap_or(&name);
            let handle = match self.connector.connect(&addr).await {
                Ok(handle) => handle,
                Err(e) => {
                    warn!(replica = expected, addr = %addr, error = %e, "Could not connect to replica");
                    continue;
                }
            };
            match handle.id().await {
                Ok(reported) if reported == expected => {}
                Ok(reported) => {
                    warn!(replica = expected, reported = %reported, addr = handle.addr(), "Replica ID mismatch");
                    continue;
                }
                Err(e) => {
                    warn!(replica = expected, addr = handle.addr(), error = %e, "Could not connect to replica");
                    continue;
                }
            }

            if let Some(elected) = &primary {
                if let Err(e) = handle.set_primary_id(&elected.id).await {
                    warn!(replica = expected, addr = handle.addr(), error = %e, "Could not inform replica of primary");
                }
                continue;
            }
            let promoted = handle.promote().await;
            match promoted {
                Ok(()) => {
                    primary = Some(Primary {
                        id: expected.to_string(),
                        handle,
                    })
                }
                Err(e) => warn!(replica = expected, addr = handle.addr(), error = %e, "Could not promote replica"),
            }
        }
        primary
    }

    /// Send `call` to the primary, re-electing and retrying at most
    /// [`RETRY_BUDGET`] times after losing contact with it.
    async fn forward<T, F>(&self, call: F) -> Result<T>
    where
        F: Fn(Arc<dyn ReplicaHandle>) -> BoxFuture<'static, Result<T>>,
    {
        let mut budget = RETRY_BUDGET;
        loop {
            let (primary, epoch) = self
                .serving_primary()
                .await
                .ok_or(Error::NoPrimaryAvailable)?;
            match call(Arc::clone(&primary.handle)).await {
                Err(e) if e.is_communication() => {
                    warn!(primary = %primary.id, addr = primary.handle.addr(), error = %e, "Lost contact with primary");
                    self.elect(epoch).await;
                    if budget == 0 {
                        return Err(e);
                    }
                    budget -= 1;
                }
                res => return res,
            }
        }
    }

    pub async fn place_order(&self, postcode: &str, items: Order) -> OrderOutcome {
        let postcode = normalize(postcode);
        self.forward(|replica| {
            let postcode = postcode.clone();
            let items = items.clone();
            async move { replica.place_order(&postcode, items).await }.boxed()
        })
        .await
        .unwrap_or_else(|e| {
            info!(postcode = %postcode, reason = %e, "Order not forwarded");
            OrderOutcome::rejected(NOT_SERVING)
        })
    }

    pub async fn get_orders(&self, postcode: &str) -> OrderListing {
        let postcode = normalize(postcode);
        self.forward(|replica| {
            let postcode = postcode.clone();
            async move { replica.get_orders(&postcode).await }.boxed()
        })
        .await
        .unwrap_or_else(|e| {
            info!(postcode = %postcode, reason = %e, "Lookup not forwarded");
            OrderListing::empty(NOT_SERVING)
        })
    }

    /// Bootstrap a replica that has just announced itself. The work happens
    /// on a detached task: the cached primary pushes its state to the
    /// newcomer, or an election is run when there is no primary yet. Failures
    /// are only logged.
    pub fn register_replica(self: &Arc<Self>, replica_id: String) -> JoinHandle<()> {
        let dispatcher = Arc::clone(self);
        tokio::spawn(async move {
            info!(replica = %replica_id, "Replica registered");
            let primary = dispatcher.primary.lock().await.clone();
            match primary {
                Some(primary) if primary.id == replica_id => {
                    debug!(replica = %replica_id, "New replica is already primary");
                }
                Some(primary) => {
                    if let Err(e) = primary.handle.notify_new_peer(&replica_id).await {
                        error!(replica = %replica_id, primary = %primary.id, error = %e, "Could not bootstrap new replica");
                    }
                }
                None => {
                    dispatcher.assign_primary().await;
                }
            }
        })
    }
}
