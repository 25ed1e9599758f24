//! Demo backend server, useful to try the load balancer locally. Start a few
//! of them on different ports and point the replicas of a service to them.

use std::{convert::Infallible, net::SocketAddr};

use bytes::Bytes;
use clap::Parser;
use http_body_util::Full;
use hyper::{service::service_fn, Response};
use hyper_util::rt::TokioIo;
use tokio::net::TcpListener;
use tracing::{debug, info};

#[derive(Parser, Debug)]
#[command(about = "Backend that tells which port served the request")]
struct Args {
    /// Port to start the demo service on.
    #[arg(long, default_value_t = 8081)]
    port: u16,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let args = Args::parse();
    let listener = TcpListener::bind(SocketAddr::from(([0, 0, 0, 0], args.port))).await?;

    info!(port = args.port, "Demo server listening");

    loop {
        let (stream, client) = listener.accept().await?;
        let port = args.port;

        tokio::task::spawn(async move {
            let service = service_fn(move |_| async move {
                Ok::<_, Infallible>(Response::new(Full::new(Bytes::from(format!(
                    "All good from server {port}."
                )))))
            });

            if let Err(err) = hyper::server::conn::http1::Builder::new()
                .serve_connection(TokioIo::new(stream), service)
                .await
            {
                debug!(%client, "Failed to serve connection: {err}");
            }
        });
    }
}
