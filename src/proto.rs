//! Wire messages shared by the registry, replica and dispatcher services.
//!
//! The service stubs are generated by `build.rs` and included at the bottom
//! of this module, the messages themselves are plain [`prost`] derives.

use std::collections::BTreeMap;

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Empty {}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct RegisterRequest {
    #[prost(string, tag = "1")]
    pub name: String,
    #[prost(string, tag = "2")]
    pub addr: String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct LookupRequest {
    #[prost(string, tag = "1")]
    pub name: String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct LookupReply {
    #[prost(string, tag = "1")]
    pub addr: String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ListRequest {
    #[prost(string, tag = "1")]
    pub prefix: String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ListReply {
    #[prost(btree_map = "string, string", tag = "1")]
    pub entries: BTreeMap<String, String>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct RemoveRequest {
    #[prost(string, tag = "1")]
    pub name: String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct IdReply {
    #[prost(string, tag = "1")]
    pub id: String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct PlaceOrderRequest {
    #[prost(string, tag = "1")]
    pub postcode: String,
    #[prost(string, repeated, tag = "2")]
    pub items: Vec<String>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct PlaceOrderReply {
    #[prost(bool, tag = "1")]
    pub ok: bool,
    #[prost(string, tag = "2")]
    pub detail: String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct GetOrdersRequest {
    #[prost(string, tag = "1")]
    pub postcode: String,
}

/// A single order: the item names in the order they were entered.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Order {
    #[prost(string, repeated, tag = "1")]
    pub items: Vec<String>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct OrderList {
    #[prost(message, repeated, tag = "1")]
    pub orders: Vec<Order>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct GetOrdersReply {
    #[prost(message, repeated, tag = "1")]
    pub orders: Vec<Order>,
    #[prost(string, tag = "2")]
    pub detail: String,
}

/// Entire order book of one replica, keyed by normalised postcode.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Snapshot {
    #[prost(btree_map = "string, message", tag = "1")]
    pub buckets: BTreeMap<String, OrderList>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct PeerRequest {
    #[prost(string, tag = "1")]
    pub peer_id: String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct PrimaryRequest {
    #[prost(string, tag = "1")]
    pub primary_id: String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ServingReply {
    #[prost(bool, tag = "1")]
    pub serving: bool,
}

include!(concat!(env!("OUT_DIR"), "/hungry.Registry.rs"));
include!(concat!(env!("OUT_DIR"), "/hungry.Replica.rs"));
include!(concat!(env!("OUT_DIR"), "/hungry.Dispatcher.rs"));
