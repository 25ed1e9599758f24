//! The [`hyper`] library is based on services. Each time we accept a connection
//! we have to provide an instance of [`hyper::service::Service`] to handle that
//! connection. This module contains the [`Dispatcher`] struct which implements
//! [`hyper::service::Service`] and handles requests based on the routing
//! table: find the service, ask its scheduler for a server, forward.

mod proxy;

use std::{
    convert::Infallible,
    error::Error as StdError,
    future::Future,
    net::SocketAddr,
    pin::Pin,
    sync::Arc,
};

use bytes::Bytes;
use hyper::{body::Body, Request};
use tracing::{error, info, warn};

use crate::{
    http::{
        request::ProxyRequest,
        response::{BoxBodyResponse, LocalResponse},
    },
    router::Router,
};

/// Implements [`hyper::service::Service`] and handles incoming requests. This
/// is the error boundary of a request: routing, scheduling and transport
/// failures all become HTTP responses, so the service itself never fails.
#[derive(Clone)]
pub struct Dispatcher {
    router: Arc<Router>,

    /// Socket address of the connected client.
    client_addr: SocketAddr,

    /// Listening socket address.
    server_addr: SocketAddr,
}

impl Dispatcher {
    pub fn new(router: Arc<Router>, client_addr: SocketAddr, server_addr: SocketAddr) -> Self {
        Self {
            router,
            client_addr,
            server_addr,
        }
    }

    /// Routes the request and forwards it to the selected backend.
    ///
    /// - `404 Not Found` if no service matches the path.
    /// - `503 Service Unavailable` if every replica of the service is down.
    /// - `502 Bad Gateway` if the selected replica can't be reached.
    ///
    /// Otherwise the response of the backend is returned as is. A request is
    /// never retried on a different replica.
    pub async fn dispatch<B>(&self, request: Request<B>) -> BoxBodyResponse
    where
        B: Body<Data = Bytes> + Send + 'static,
        B::Error: Into<Box<dyn StdError + Send + Sync>>,
    {
        info!(
            method = %request.method(),
            uri = %request.uri(),
            client = %self.client_addr,
            "Received new request"
        );

        let service = match self.router.resolve(request.uri().path()) {
            Ok(service) => service,
            Err(err) => {
                warn!("{err}");
                return LocalResponse::not_found();
            }
        };

        let server = match service.next_server() {
            Ok(server) => server,
            Err(err) => {
                error!(service = service.name(), "{err}");
                return LocalResponse::service_unavailable();
            }
        };

        info!(
            service = service.name(),
            server = server.address(),
            url = server.url(),
            "Forwarding to the server"
        );

        let request = ProxyRequest::new(request, self.client_addr, self.server_addr);

        proxy::forward(request, &server).await
    }
}

impl hyper::service::Service<Request<hyper::body::Incoming>> for Dispatcher {
    type Response = BoxBodyResponse;

    type Error = Infallible;

    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn call(&self, request: Request<hyper::body::Incoming>) -> Self::Future {
        let dispatcher = self.clone();

        Box::pin(async move { Ok(dispatcher.dispatch(request).await) })
    }
}
