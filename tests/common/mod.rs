#![allow(dead_code)]

use dashmap::{DashMap, DashSet};
use hungry::{
    Dispatcher, Error, InMemoryRegistry, Order, OrderBook, OrderListing, OrderOutcome,
    PostcodeValidator, Registry, ReplicaConnector, ReplicaHandle, ReplicaNode, Result, Validation,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::watch;

pub fn local_addr(id: &str) -> String {
    format!("local://{id}")
}

/// In-process stand-in for the network between replicas.
pub struct Network {
    nodes: DashMap<String, Arc<ReplicaNode>>,
    /// Addresses that refuse every call.
    down: DashSet<String>,
    /// Addresses that accept inter-node calls but fail client calls.
    refusing_clients: DashSet<String>,
    /// While true, promotions block after being counted.
    paused: watch::Sender<bool>,
    pub promotions: AtomicUsize,
    pub client_calls: AtomicUsize,
}

impl Network {
    pub fn new() -> Arc<Self> {
        let (paused, _) = watch::channel(false);
        Arc::new(Self {
            nodes: DashMap::new(),
            down: DashSet::new(),
            refusing_clients: DashSet::new(),
            paused,
            promotions: AtomicUsize::new(0),
            client_calls: AtomicUsize::new(0),
        })
    }

    fn reach(&self, addr: &str) -> Result<Arc<ReplicaNode>> {
        if self.down.contains(addr) {
            return Err(Error::unreachable(addr, "connection refused"));
        }
        self.nodes
            .get(addr)
            .map(|node| Arc::clone(node.value()))
            .ok_or_else(|| Error::unreachable(addr, "no such host"))
    }

    pub fn pause_promotions(&self) {
        self.paused.send_replace(true);
    }

    pub fn resume_promotions(&self) {
        self.paused.send_replace(false);
    }

    pub fn promotions(&self) -> usize {
        self.promotions.load(Ordering::SeqCst)
    }

    pub fn client_calls(&self) -> usize {
        self.client_calls.load(Ordering::SeqCst)
    }
}

pub struct LocalConnector {
    net: Arc<Network>,
}

#[tonic::async_trait]
impl ReplicaConnector for LocalConnector {
    async fn connect(&self, addr: &str) -> Result<Arc<dyn ReplicaHandle>> {
        self.net.reach(addr)?;
        Ok(Arc::new(LocalHandle {
            addr: addr.to_string(),
            net: Arc::clone(&self.net),
        }))
    }
}

pub struct LocalHandle {
    addr: String,
    net: Arc<Network>,
}

impl LocalHandle {
    fn client_call(&self) -> Result<Arc<ReplicaNode>> {
        self.net.client_calls.fetch_add(1, Ordering::SeqCst);
        if self.net.refusing_clients.contains(&self.addr) {
            return Err(Error::unreachable(&self.addr, "stream reset"));
        }
        self.net.reach(&self.addr)
    }
}

#[tonic::async_trait]
impl ReplicaHandle for LocalHandle {
    fn addr(&self) -> &str {
        &self.addr
    }

    async fn id(&self) -> Result<String> {
        Ok(self.net.reach(&self.addr)?.id().to_string())
    }

    async fn place_order(&self, postcode: &str, items: Order) -> Result<OrderOutcome> {
        let node = self.client_call()?;
        Ok(node.place_order(postcode, items).await)
    }

    async fn get_orders(&self, postcode: &str) -> Result<OrderListing> {
        let node = self.client_call()?;
        Ok(node.get_orders(postcode).await)
    }

    async fn receive_snapshot(&self, book: &OrderBook) -> Result<()> {
        let node = self.net.reach(&self.addr)?;
        node.receive_snapshot(book.clone()).await;
        Ok(())
    }

    async fn notify_new_peer(&self, peer_id: &str) -> Result<()> {
        self.net.reach(&self.addr)?.notify_new_peer(peer_id).await
    }

    async fn set_primary_id(&self, primary_id: &str) -> Result<()> {
        self.net.reach(&self.addr)?.set_primary_id(primary_id).await;
        Ok(())
    }

    async fn promote(&self) -> Result<()> {
        let node = self.net.reach(&self.addr)?;
        self.net.promotions.fetch_add(1, Ordering::SeqCst);
        let mut paused = self.net.paused.subscribe();
        let _ = paused.wait_for(|paused| !*paused).await;
        node.promote().await;
        Ok(())
    }
}

/// Validator whose answer the test decides.
pub struct ScriptedValidator {
    answer: Mutex<Validation>,
    pub calls: AtomicUsize,
}

impl ScriptedValidator {
    pub fn set(&self, answer: Validation) {
        *self.answer.lock().unwrap() = answer;
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[tonic::async_trait]
impl PostcodeValidator for ScriptedValidator {
    async fn validate(&self, _postcode: &str) -> Validation {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.answer.lock().unwrap()
    }
}

/// A registry, a set of replicas and the network joining them.
pub struct Fleet {
    pub registry: Arc<InMemoryRegistry>,
    pub net: Arc<Network>,
    pub validator: Arc<ScriptedValidator>,
    ids: Mutex<Vec<String>>,
}

impl Fleet {
    pub fn new() -> Self {
        Self {
            registry: Arc::new(InMemoryRegistry::new()),
            net: Network::new(),
            validator: Arc::new(ScriptedValidator {
                answer: Mutex::new(Validation::answered(true)),
                calls: AtomicUsize::new(0),
            }),
            ids: Mutex::new(Vec::new()),
        }
    }

    pub fn connector(&self) -> Arc<LocalConnector> {
        Arc::new(LocalConnector {
            net: Arc::clone(&self.net),
        })
    }

    /// Start a replica and register it, without telling any dispatcher.
    pub async fn add(&self, id: &str, book: OrderBook) -> Arc<ReplicaNode> {
        let node = Arc::new(ReplicaNode::new(
            id,
            book,
            self.registry.clone(),
            self.connector(),
            self.validator.clone(),
        )
        .with_advertised_addr(local_addr(id)));
        let addr = local_addr(id);
        self.net.nodes.insert(addr.clone(), Arc::clone(&node));
        self.registry
            .register(&node.registry_name(), &addr)
            .await
            .unwrap();
        self.ids.lock().unwrap().push(id.to_string());
        node
    }

    pub fn node(&self, id: &str) -> Arc<ReplicaNode> {
        Arc::clone(self.net.nodes.get(&local_addr(id)).unwrap().value())
    }

    pub fn dispatcher(&self) -> Arc<Dispatcher> {
        Arc::new(Dispatcher::new(self.registry.clone(), self.connector()))
    }

    pub fn take_down(&self, id: &str) {
        self.net.down.insert(local_addr(id));
    }

    pub fn bring_up(&self, id: &str) {
        self.net.down.remove(&local_addr(id));
    }

    /// Keep the replica reachable by peers but fail every client call to it.
    pub fn refuse_clients(&self, id: &str) {
        self.net.refusing_clients.insert(local_addr(id));
    }

    /// Every replica's book, in the order the replicas were added.
    pub async fn books(&self) -> Vec<OrderBook> {
        let ids = self.ids.lock().unwrap().clone();
        let mut books = Vec::with_capacity(ids.len());
        for id in ids {
            books.push(self.node(&id).snapshot().await);
        }
        books
    }
}

pub fn order(items: &[&str]) -> Order {
    items.iter().map(|item| item.to_string()).collect()
}

/// Seed with a single bucket.
pub fn book(postcode: &str, orders: &[&[&str]]) -> OrderBook {
    let mut book = OrderBook::new();
    for items in orders {
        book.append(postcode, order(items));
    }
    book
}
