use tonic_build::manual::{Builder, Method, Service};

const CODEC: &str = "tonic::codec::ProstCodec";

fn unary(name: &str, route: &str, input: &str, output: &str) -> Method {
    Method::builder()
        .name(name)
        .route_name(route)
        .input_type(format!("crate::proto::{input}"))
        .output_type(format!("crate::proto::{output}"))
        .codec_path(CODEC)
        .build()
}

fn main() {
    // Messages are derived by hand in src/proto.rs, only the service stubs are
    // generated here so the build does not depend on protoc.
    let registry = Service::builder()
        .name("Registry")
        .package("hungry")
        .method(unary("register", "Register", "RegisterRequest", "Empty"))
        .method(unary("lookup", "Lookup", "LookupRequest", "LookupReply"))
        .method(unary("list", "List", "ListRequest", "ListReply"))
        .method(unary("remove", "Remove", "RemoveRequest", "Empty"))
        .build();

    let replica = Service::builder()
        .name("Replica")
        .package("hungry")
        .method(unary("id", "Id", "Empty", "IdReply"))
        .method(unary("place_order", "PlaceOrder", "PlaceOrderRequest", "PlaceOrderReply"))
        .method(unary("get_orders", "GetOrders", "GetOrdersRequest", "GetOrdersReply"))
        .method(unary("receive_snapshot", "ReceiveSnapshot", "Snapshot", "Empty"))
        .method(unary("notify_new_peer", "NotifyNewPeer", "PeerRequest", "Empty"))
        .method(unary("set_primary_id", "SetPrimaryId", "PrimaryRequest", "Empty"))
        .method(unary("promote", "Promote", "Empty", "Empty"))
        .build();

    let dispatcher = Service::builder()
        .name("Dispatcher")
        .package("hungry")
        .method(unary("is_serving", "IsServing", "Empty", "ServingReply"))
        .method(unary("place_order", "PlaceOrder", "PlaceOrderRequest", "PlaceOrderReply"))
        .method(unary("get_orders", "GetOrders", "GetOrdersRequest", "GetOrdersReply"))
        .method(unary("register_replica", "RegisterReplica", "PeerRequest", "Empty"))
        .build();

    Builder::new().compile(&[registry, replica, dispatcher]);
}
