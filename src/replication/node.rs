use crate::client::{ReplicaConnector, ReplicaHandle};
use crate::orders::{normalize, Order, OrderBook, OrderListing, OrderOutcome};
use crate::registry::Registry;
use crate::validator::PostcodeValidator;
use crate::{Error, Result, NOT_ON_RECORD, REPLICA_PREFIX};
use rand::distributions::Alphanumeric;
use rand::Rng;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

/// Length of a generated replica id.
pub const ID_LEN: usize = 20;

/// Random alphanumeric id for a replica started without `--id`.
pub fn generate_id() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(ID_LEN)
        .map(char::from)
        .collect()
}

struct ReplicaState {
    book: OrderBook,
    /// Whoever this node last heard is primary, empty until told.
    primary_id: String,
}

/// One copy of the order book, able to serve reads and writes.
///
/// Every operation holds the state lock for its whole duration, including
/// the broadcast that follows a write or a promotion, so calls against one
/// node are linearised.
pub struct ReplicaNode {
    id: String,
    state: Mutex<ReplicaState>,
    registry: Arc<dyn Registry>,
    connector: Arc<dyn ReplicaConnector>,
    validator: Arc<dyn PostcodeValidator>,
    /// Address this node is registered under, when known.
    advertised: Option<String>,
}

impl ReplicaNode {
    pub fn new(
        id: impl Into<String>,
        book: OrderBook,
        registry: Arc<dyn Registry>,
        connector: Arc<dyn ReplicaConnector>,
        validator: Arc<dyn PostcodeValidator>,
    ) -> Self {
        Self {
            id: id.into(),
            state: Mutex::new(ReplicaState {
                book,
                primary_id: String::new(),
            }),
            registry,
            connector,
            validator,
            advertised: None,
        }
    }

    /// Record the address peers reach this node on. Registry entries
    /// pointing there are never pushed to.
    pub fn with_advertised_addr(mut self, addr: impl Into<String>) -> Self {
        self.advertised = Some(addr.into());
        self
    }

    /// Whether a registry entry refers to this node. Pushing to ourselves
    /// would wait on the state lock the push is made under.
    fn is_self(&self, peer_id: &str, addr: &str) -> bool {
        peer_id == self.id || self.advertised.as_deref() == Some(addr)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Name this node is registered under.
    pub fn registry_name(&self) -> String {
        format!("{REPLICA_PREFIX}{}", self.id)
    }

    pub async fn primary_id(&self) -> String {
        self.state.lock().await.primary_id.clone()
    }

    pub async fn is_primary(&self) -> bool {
        self.state.lock().await.primary_id == self.id
    }

    /// Copy of the current order book.
    pub async fn snapshot(&self) -> OrderBook {
        self.state.lock().await.book.clone()
    }

    pub async fn place_order(&self, postcode: &str, items: Order) -> OrderOutcome {
        let mut state = self.state.lock().await;
        match self.append(&mut state, postcode, items).await {
            Ok(position) => OrderOutcome::confirmed(position),
            Err(e) => {
                info!(replica = %self.id, postcode, reason = %e, "Order rejected");
                OrderOutcome::rejected(e.to_string())
            }
        }
    }

    async fn append(&self, state: &mut ReplicaState, postcode: &str, items: Order) -> Result<usize> {
        let validation = self.validator.validate(postcode).await;
        if !validation.reachable {
            return Err(Error::ValidationUnavailable);
        }
        if !validation.valid {
            return Err(Error::InvalidPostcode);
        }

        let postcode = normalize(postcode);
        let position = state.book.append(&postcode, items);
        debug!(replica = %self.id, postcode = %postcode, position, "Order appended");
        self.broadcast(&state.book).await;
        Ok(position)
    }

    pub async fn get_orders(&self, postcode: &str) -> OrderListing {
        let state = self.state.lock().await;
        let orders = state.book.orders(postcode);
        if orders.is_empty() {
            OrderListing::empty(NOT_ON_RECORD)
        } else {
            OrderListing {
                orders: orders.to_vec(),
                detail: String::new(),
            }
        }
    }

    /// Replace the local book with a peer's. No version check is made.
    pub async fn receive_snapshot(&self, book: OrderBook) {
        let mut state = self.state.lock().await;
        debug!(replica = %self.id, postcodes = book.postcodes(), "Snapshot received");
        state.book = book;
    }

    /// Push the current book straight to a replica that has just joined.
    pub async fn notify_new_peer(&self, peer_id: &str) -> Result<()> {
        let state = self.state.lock().await;
        let addr = self
            .registry
            .lookup(&format!("{REPLICA_PREFIX}{peer_id}"))
            .await?;
        if self.is_self(peer_id, &addr) {
            debug!(replica = %self.id, peer = peer_id, "New replica is this node, nothing to send");
            return Ok(());
        }
        info!(replica = %self.id, peer = peer_id, "Updating state of new replica");
        let peer = self.connector.connect(&addr).await?;
        peer.receive_snapshot(&state.book).await
    }

    /// Push the current book to every other registered replica, returning
    /// how many accepted it.
    pub async fn broadcast_state(&self) -> usize {
        let state = self.state.lock().await;
        self.broadcast(&state.book).await
    }

    /// Peers are attempted one after the other; an unreachable one is logged
    /// and skipped, never retried.
    async fn broadcast(&self, book: &OrderBook) -> usize {
        let peers = match self.registry.list(REPLICA_PREFIX).await {
            Ok(peers) => peers,
            Err(e) => {
                error!(replica = %self.id, error = %e, "Unable to list replicas for broadcast");
                return 0;
            }
        };

        let mut updated = 0;
        for (name, addr) in peers {
            let peer_id = name.strip_prefix(REPLICA_PREFIX).unwrap_or(&name);
            if self.is_self(peer_id, &addr) {
                continue;
            }
            match push(self.connector.as_ref(), &addr, book).await {
                Ok(()) => {
                    updated += 1;
                    debug!(replica = %self.id, peer = peer_id, "State of replica updated");
                }
                Err(e) => {
                    warn!(replica = %self.id, peer = peer_id, error = %e, "Skipping unreachable replica")
                }
            }
        }
        updated
    }

    /// Record who the primary is. Being told that this node is primary is a
    /// promotion and broadcasts like [`ReplicaNode::promote`].
    pub async fn set_primary_id(&self, primary_id: &str) {
        if primary_id == self.id {
            self.promote().await;
            return;
        }
        let mut state = self.state.lock().await;
        debug!(replica = %self.id, primary = primary_id, "Primary recorded");
        state.primary_id = primary_id.to_string();
    }

    /// Become primary and push this node's book, stale or not, to every peer.
    pub async fn promote(&self) -> usize {
        let mut state = self.state.lock().await;
        state.primary_id = self.id.clone();
        info!(replica = %self.id, "Allocated as primary replica");
        self.broadcast(&state.book).await
    }
}

async fn push(connector: &dyn ReplicaConnector, addr: &str, book: &OrderBook) -> Result<()> {
    let peer = connector.connect(addr).await?;
    peer.receive_snapshot(book).await
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::registry::InMemoryRegistry;
    use crate::validator::Validation;

    struct FixedValidator(Validation);

    #[tonic::async_trait]
    impl PostcodeValidator for FixedValidator {
        async fn validate(&self, _postcode: &str) -> Validation {
            self.0
        }
    }

    /// Every address is unreachable.
    struct NoPeers;

    #[tonic::async_trait]
    impl ReplicaConnector for NoPeers {
        async fn connect(&self, addr: &str) -> Result<Arc<dyn ReplicaHandle>> {
            Err(Error::unreachable(addr, "connection refused"))
        }
    }

    fn node(validation: Validation) -> ReplicaNode {
        ReplicaNode::new(
            "alpha",
            OrderBook::demo(),
            Arc::new(InMemoryRegistry::new()),
            Arc::new(NoPeers),
            Arc::new(FixedValidator(validation)),
        )
    }

    #[test]
    fn generated_ids_are_alphanumeric() {
        let id = generate_id();
        assert_eq!(id.len(), ID_LEN);
        assert!(id.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(id, generate_id());
    }

    #[tokio::test]
    async fn confirms_with_position() {
        let node = node(Validation::answered(true));
        let outcome = node.place_order("DH1 3LE", vec!["fried rice".into()]).await;
        assert_eq!(outcome, OrderOutcome::confirmed(3));
        assert_eq!(outcome.detail, "#3");
        assert_eq!(node.get_orders("dh13le").await.orders.len(), 3);
    }

    #[tokio::test]
    async fn rejects_invalid_postcode() {
        let node = node(Validation::answered(false));
        let before = node.snapshot().await;
        let outcome = node.place_order("ZZ9 9ZZ", vec!["soup".into()]).await;
        assert_eq!(outcome, OrderOutcome::rejected("Invalid postcode"));
        assert_eq!(node.snapshot().await, before);
    }

    #[tokio::test]
    async fn rejects_when_validator_unreachable() {
        let node = node(Validation::UNREACHABLE);
        let outcome = node.place_order("DH1 3LE", vec!["soup".into()]).await;
        assert_eq!(outcome, OrderOutcome::rejected("Could not validate postcode"));
        assert_eq!(node.get_orders("dh13le").await.orders.len(), 2);
    }

    #[tokio::test]
    async fn unknown_postcode_not_on_record() {
        let node = node(Validation::answered(true));
        let listing = node.get_orders("sw1a1aa").await;
        assert!(listing.orders.is_empty());
        assert_eq!(listing.detail, "Postcode not on record.");
    }

    #[tokio::test]
    async fn promotion_records_self() {
        let node = node(Validation::answered(true));
        assert_eq!(node.primary_id().await, "");
        node.set_primary_id("beta").await;
        assert!(!node.is_primary().await);
        node.set_primary_id("alpha").await;
        assert!(node.is_primary().await);
    }

    #[tokio::test]
    async fn new_peer_must_be_registered() {
        let node = node(Validation::answered(true));
        assert!(matches!(
            node.notify_new_peer("ghost").await,
            Err(Error::NameNotFound(_))
        ));
    }
}
