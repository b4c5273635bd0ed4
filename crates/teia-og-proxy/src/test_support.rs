//! In-process stand-ins for the origin and the metadata API.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use axum::Json;
use axum::Router;
use axum::http::header;
use axum::routing::post;
use serde_json::Value;

/// A syntactically valid 36-character address.
pub(crate) const ADDRESS: &str = "tz1abcdefghijklmnopqrstuvwxyz0123456";

/// Request bodies seen by a stub server, in arrival order.
pub(crate) type Recorded = Arc<Mutex<Vec<Value>>>;

/// Serve `router` on an ephemeral localhost port.
pub(crate) async fn spawn_server(router: Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind test listener");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(listener, router).await.expect("test server");
    });
    addr
}

/// A GraphQL endpoint that answers every POST with `body` and records the
/// request JSON.
pub(crate) fn graphql_stub(body: &str) -> (Router, Recorded) {
    let seen: Recorded = Arc::default();
    let body = body.to_string();

    let recorder = seen.clone();
    let router = Router::new().fallback(post(move |Json(request): Json<Value>| {
        let recorder = recorder.clone();
        let body = body.clone();
        async move {
            recorder.lock().expect("recorder lock").push(request);
            ([(header::CONTENT_TYPE, "application/json")], body)
        }
    }));

    (router, seen)
}
