//! HTTP utilities for integration tests.

use std::{convert::Infallible, net::SocketAddr, sync::Arc};

use bytes::Bytes;
use http_body_util::{BodyExt, Empty, Full};
use hyper::{client::conn::http1::SendRequest, service::service_fn, Request, Response};
use hyper_util::rt::TokioIo;
use rxlb::{Config, LoadBalancer, Router, State};
use tokio::{
    net::{TcpSocket, TcpStream},
    sync::{oneshot, watch},
    task::JoinHandle,
};

use super::{
    service::serve_connection,
    tcp::{usable_socket, usable_tcp_listener},
};

/// Body sent by [`spawn_demo_backend`] listening on `addr`.
pub fn demo_body(addr: SocketAddr) -> String {
    format!("All good from server {}.", addr.port())
}

/// Starts a backend server in the background that answers every request
/// with [`demo_body`].
pub fn spawn_demo_backend() -> SocketAddr {
    let (listener, addr) = usable_tcp_listener();
    let body = Bytes::from(demo_body(addr));

    tokio::task::spawn(async move {
        loop {
            let (stream, _) = listener.accept().await.unwrap();
            let body = body.clone();
            let service = service_fn(move |_| {
                let body = body.clone();
                async move { Ok::<_, Infallible>(Response::new(Full::new(body))) }
            });

            tokio::task::spawn(serve_connection(stream, service));
        }
    });

    addr
}

/// Same as [`spawn_demo_backend`] but spawns `n` of them.
pub fn spawn_demo_backends(n: usize) -> Vec<SocketAddr> {
    (0..n).map(|_| spawn_demo_backend()).collect()
}

/// Load balancer running in the background plus everything a test needs to
/// observe and stop it.
pub struct Controllers {
    pub address: SocketAddr,
    pub router: Arc<Router>,
    pub state: watch::Receiver<State>,
    pub handle: JoinHandle<()>,
    shutdown: Option<oneshot::Sender<()>>,
}

impl Controllers {
    /// Triggers the graceful shutdown.
    pub fn shutdown(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            tx.send(()).unwrap();
        }
    }
}

/// Starts a load balancer in the background with the given config. It runs
/// until the test runtime is dropped.
pub fn spawn_load_balancer(config: Config) -> SocketAddr {
    let balancer = LoadBalancer::init(config).unwrap();
    let address = balancer.socket_address();

    tokio::task::spawn(async move {
        balancer.run().await.unwrap();
    });

    address
}

/// Starts a load balancer in the background with the given config and
/// provides access to its router, shutdown trigger and state updates.
pub fn spawn_load_balancer_with_controllers(config: Config) -> Controllers {
    let (tx, rx) = oneshot::channel();

    let balancer = LoadBalancer::init(config).unwrap().shutdown_on(rx);

    let address = balancer.socket_address();
    let router = balancer.router();
    let state = balancer.subscribe();

    let handle = tokio::task::spawn(async move {
        balancer.run().await.unwrap();
    });

    Controllers {
        address,
        router,
        state,
        handle,
        shutdown: Some(tx),
    }
}

/// Provides an HTTP client that spawns a connection object in the background
/// to manage request transmissions.
pub async fn http_client(stream: TcpStream) -> SendRequest<Empty<Bytes>> {
    let (sender, conn) = hyper::client::conn::http1::handshake(TokioIo::new(stream))
        .await
        .unwrap();

    tokio::task::spawn(async move {
        let _ = conn.with_upgrades().await;
    });

    sender
}

/// Sends an HTTP request from the given [`TcpSocket`] to the given
/// [`SocketAddr`].
pub async fn send_http_request_from(
    from: TcpSocket,
    to: SocketAddr,
    req: Request<Empty<Bytes>>,
) -> (http::response::Parts, Bytes) {
    let stream = from.connect(to).await.unwrap();
    let mut sender = http_client(stream).await;

    let (parts, body) = sender.send_request(req).await.unwrap().into_parts();
    (parts, body.collect().await.unwrap().to_bytes())
}

/// Sends an HTTP request from a random socket to the given address.
pub async fn send_http_request(
    to: SocketAddr,
    req: Request<Empty<Bytes>>,
) -> (http::response::Parts, Bytes) {
    send_http_request_from(usable_socket().0, to, req).await
}

pub mod request {
    //! Quick request factory.

    use bytes::Bytes;
    use http_body_util::Empty;
    use hyper::Request;

    pub fn empty() -> Request<Empty<Bytes>> {
        empty_with_uri("/")
    }

    pub fn empty_with_uri(uri: &str) -> Request<Empty<Bytes>> {
        Request::builder()
            .uri(uri)
            .body(Empty::<Bytes>::new())
            .unwrap()
    }
}
