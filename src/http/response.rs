//! Responses that the load balancer sends on its own, without contacting any
//! backend server.

use bytes::Bytes;
use http::{header, HeaderValue, Response, StatusCode};
use http_body_util::{combinators::BoxBody, BodyExt, Full};

/// Body type shared by local responses and forwarded ones.
pub(crate) type BoxBodyResponse = Response<BoxBody<Bytes, hyper::Error>>;

/// Factory for local responses. The body is the canonical reason phrase and
/// every response carries a `Server` header so that clients can tell a
/// load balancer error apart from a backend error with the same status.
pub(crate) struct LocalResponse;

impl LocalResponse {
    /// No service matches the request path.
    pub fn not_found() -> BoxBodyResponse {
        Self::with_status(StatusCode::NOT_FOUND)
    }

    /// Backend server unreachable or misbehaving.
    pub fn bad_gateway() -> BoxBodyResponse {
        Self::with_status(StatusCode::BAD_GATEWAY)
    }

    /// Every replica of the service is down.
    pub fn service_unavailable() -> BoxBodyResponse {
        Self::with_status(StatusCode::SERVICE_UNAVAILABLE)
    }

    fn with_status(status: StatusCode) -> BoxBodyResponse {
        let reason = status.canonical_reason().unwrap_or_default();

        let mut response = Response::new(
            Full::new(Bytes::from(reason))
                .map_err(|never| match never {})
                .boxed(),
        );

        *response.status_mut() = status;
        response.headers_mut().insert(
            header::SERVER,
            HeaderValue::from_static(concat!("rxlb/", env!("CARGO_PKG_VERSION"))),
        );
        response.headers_mut().insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("text/plain"),
        );

        response
    }
}
