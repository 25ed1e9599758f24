//! Proxy requests require additional information attached to them such as
//! the IP address of the client, which we can't obtain using [`hyper::Request`]
//! alone.

use std::net::SocketAddr;

use http::{header, HeaderValue, Request};

/// Request received by the load balancer from a client, together with the
/// sockets of the connection it came from.
pub(crate) struct ProxyRequest<T> {
    request: Request<T>,

    /// Client socket.
    client_addr: SocketAddr,

    /// Local socket currently handling this request.
    server_addr: SocketAddr,
}

impl<T> ProxyRequest<T> {
    pub fn new(request: Request<T>, client_addr: SocketAddr, server_addr: SocketAddr) -> Self {
        Self {
            request,
            client_addr,
            server_addr,
        }
    }

    pub fn request_mut(&mut self) -> &mut Request<T> {
        &mut self.request
    }

    /// Consumes the [`ProxyRequest`] returning a [`Request`] with our element
    /// appended to the HTTP `Forwarded` header (RFC 7239):
    ///
    /// ```text
    /// Forwarded: for=<client>;by=<load balancer>;host=<original host>
    /// ```
    ///
    /// If the request already went through other proxies their elements are
    /// kept and ours goes last, separated by a comma. `host` is the value of
    /// the `Host` header, or the listening socket when the client didn't send
    /// one. Nothing in this header can be trusted, every hop can rewrite it.
    pub fn into_forwarded(mut self) -> Request<T> {
        let host = self
            .request
            .headers()
            .get(header::HOST)
            .and_then(|value| value.to_str().ok())
            .map_or_else(|| self.server_addr.to_string(), String::from);

        let element = format!(
            "for={};by={};host={}",
            node(self.client_addr),
            node(self.server_addr),
            host
        );

        let forwarded = match self
            .request
            .headers()
            .get(header::FORWARDED)
            .and_then(|value| value.to_str().ok())
        {
            Some(previous) => format!("{previous}, {element}"),
            None => element,
        };

        // Only fails if the client sent a Host header with characters that
        // can't be part of a header value, which hyper already rejects.
        if let Ok(value) = HeaderValue::from_str(&forwarded) {
            self.request.headers_mut().insert(header::FORWARDED, value);
        }

        self.request
    }
}

/// IPv6 nodes contain brackets and colons, so RFC 7239 wants them quoted.
fn node(addr: SocketAddr) -> String {
    match addr {
        SocketAddr::V4(addr) => addr.to_string(),
        SocketAddr::V6(addr) => format!("\"{addr}\""),
    }
}
