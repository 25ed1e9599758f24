use std::error::Error as StdError;

use bytes::Bytes;
use http::{header, StatusCode};
use http_body_util::BodyExt;
use hyper::{body::Body, upgrade::OnUpgrade};
use hyper_util::rt::TokioIo;
use tokio::net::TcpStream;
use tracing::{debug, warn};

use crate::{
    http::{
        request::ProxyRequest,
        response::{BoxBodyResponse, LocalResponse},
    },
    upstream::Server,
};

/// Forwards the request to `server` and returns the response sent by it. See
/// [`ProxyRequest`]. If the client wants to upgrade the connection and the
/// server agrees by sending a `101` status code, then a TCP tunnel that
/// forwards traffic bidirectionally is spawned in a new Tokio task.
///
/// Any failure talking to the server results in `502 Bad Gateway`.
pub(super) async fn forward<B>(mut request: ProxyRequest<B>, server: &Server) -> BoxBodyResponse
where
    B: Body<Data = Bytes> + Send + 'static,
    B::Error: Into<Box<dyn StdError + Send + Sync>>,
{
    let stream = match TcpStream::connect(server.address()).await {
        Ok(stream) => stream,
        Err(err) => {
            warn!(server = server.address(), "Could not connect to the server: {err}");
            return LocalResponse::bad_gateway();
        }
    };

    let handshake = hyper::client::conn::http1::Builder::new()
        .preserve_header_case(true)
        .title_case_headers(true)
        .handshake(TokioIo::new(stream))
        .await;

    let (mut sender, conn) = match handshake {
        Ok(handshake) => handshake,
        Err(err) => {
            warn!(server = server.address(), "Handshake failed: {err}");
            return LocalResponse::bad_gateway();
        }
    };

    let address = server.address().to_owned();

    tokio::task::spawn(async move {
        if let Err(err) = conn.with_upgrades().await {
            debug!(server = %address, "Connection failed: {err}");
        }
    });

    let client_upgrade = if request.request_mut().headers().contains_key(header::UPGRADE) {
        Some(hyper::upgrade::on(request.request_mut()))
    } else {
        None
    };

    let mut response = match sender.send_request(request.into_forwarded()).await {
        Ok(response) => response,
        Err(err) => {
            warn!(server = server.address(), "Request failed: {err}");
            return LocalResponse::bad_gateway();
        }
    };

    if response.status() == StatusCode::SWITCHING_PROTOCOLS {
        let Some(client_upgrade) = client_upgrade else {
            // Upstream server sent us an HTTP 101 response without the client
            // asking for an upgrade, so we can't proxy data from the client.
            warn!(server = server.address(), "Unexpected protocol switch");
            return LocalResponse::bad_gateway();
        };

        let server_upgrade = hyper::upgrade::on(&mut response);
        tokio::task::spawn(tunnel(client_upgrade, server_upgrade));
    }

    response.map(|body| body.boxed())
}

/// TCP tunnel for upgraded connections such as Websockets or any other custom
/// protocol. This future should be spawned in a [`tokio::task`] as the client
/// upgrade won't resolve until we send the `HTTP 101` response back to the
/// client.
async fn tunnel(client: OnUpgrade, server: OnUpgrade) {
    let (client, server) = match tokio::try_join!(client, server) {
        Ok(upgraded) => upgraded,
        Err(err) => {
            warn!("Upgrade failed: {err}");
            return;
        }
    };

    let (mut client, mut server) = (TokioIo::new(client), TokioIo::new(server));

    match tokio::io::copy_bidirectional(&mut client, &mut server).await {
        Ok((client_bytes, server_bytes)) => {
            debug!(client_bytes, server_bytes, "Tunnel closed");
        }
        Err(err) => warn!("Tunnel error: {err}"),
    }
}
