//! Backend replicas that requests are load balanced between.

use std::collections::HashMap;

use http::{uri::Scheme, Uri};
use parking_lot::RwLock;

use crate::{config::Replica, Error};

/// A running instance of a service. Address and metadata are fixed once the
/// server is created, the only thing that changes during the lifetime of the
/// process is whether the server is reachable or not. That flag is written by
/// [`crate::health::HealthChecker`] and read by the schedulers on every
/// request, so it lives behind a [`RwLock`]: readers never block each other
/// and probes only take the write lock for the duration of the swap.
///
/// New servers are considered alive until the first probe says otherwise.
#[derive(Debug)]
pub struct Server {
    /// URL as written in the config file, logged next to the address.
    url: String,

    /// `host:port` used for TCP connections.
    address: String,

    metadata: HashMap<String, String>,

    alive: RwLock<bool>,
}

impl Server {
    /// Creates a new [`Server`] listening on `address` (`host:port`).
    pub fn new(address: impl Into<String>, metadata: HashMap<String, String>) -> Self {
        let address = address.into();

        Self {
            url: address.clone(),
            address,
            metadata,
            alive: RwLock::new(true),
        }
    }

    /// Builds a [`Server`] from its config entry. The URL can be a bare
    /// `host:port` or an `http` URL, in which case the port defaults to 80.
    /// Paths and queries are ignored, only the authority is used.
    pub fn from_replica(replica: &Replica) -> Result<Self, Error> {
        let address = parse_address(&replica.url)?;

        Ok(Self {
            url: replica.url.clone(),
            address,
            metadata: replica.metadata.clone(),
            alive: RwLock::new(true),
        })
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Returns the metadata value associated with `key`, or `default`.
    pub fn metadata_or_default<'a>(&'a self, key: &str, default: &'a str) -> &'a str {
        self.metadata.get(key).map_or(default, String::as_str)
    }

    /// Same as [`Server::metadata_or_default`] but the value is parsed as an
    /// integer. Values that don't parse are treated as if they were missing.
    pub fn metadata_or_default_int(&self, key: &str, default: i64) -> i64 {
        self.metadata
            .get(key)
            .and_then(|value| value.trim().parse().ok())
            .unwrap_or(default)
    }

    /// Changes the liveness of the server and returns the previous value, so
    /// that callers can detect transitions without a separate read.
    pub fn set_liveness(&self, alive: bool) -> bool {
        std::mem::replace(&mut *self.alive.write(), alive)
    }

    pub fn is_alive(&self) -> bool {
        *self.alive.read()
    }
}

/// Extracts `host:port` from a replica URL.
fn parse_address(url: &str) -> Result<String, Error> {
    let uri: Uri = url
        .parse()
        .map_err(|err: http::uri::InvalidUri| Error::invalid_address(url, err.to_string()))?;

    let default_port = match uri.scheme() {
        None => None,
        Some(scheme) if *scheme == Scheme::HTTP => Some(80),
        Some(scheme) => {
            return Err(Error::invalid_address(
                url,
                format!("unsupported scheme '{scheme}'"),
            ))
        }
    };

    let Some(authority) = uri.authority() else {
        return Err(Error::invalid_address(url, "missing host"));
    };

    if authority.host().is_empty() {
        return Err(Error::invalid_address(url, "missing host"));
    }

    match (authority.port_u16(), default_port) {
        (Some(port), _) | (None, Some(port)) => Ok(format!("{}:{port}", authority.host())),
        (None, None) => Err(Error::invalid_address(url, "missing port")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn replica(url: &str) -> Replica {
        Replica {
            url: String::from(url),
            metadata: HashMap::new(),
        }
    }

    #[test]
    fn metadata_defaults() {
        let metadata = HashMap::from([
            (String::from("weight"), String::from("10")),
            (String::from("zone"), String::from("eu-west")),
            (String::from("broken"), String::from("ten")),
        ]);

        let server = Server::new("127.0.0.1:8080", metadata);

        assert_eq!(server.metadata_or_default("zone", "us-east"), "eu-west");
        assert_eq!(server.metadata_or_default("rack", "r1"), "r1");
        assert_eq!(server.metadata_or_default_int("weight", 1), 10);
        assert_eq!(server.metadata_or_default_int("missing", 1), 1);
        assert_eq!(server.metadata_or_default_int("broken", 1), 1);
        assert_eq!(server.metadata_or_default_int("zone", 7), 7);
    }

    #[test]
    fn set_liveness_returns_previous_value() {
        let server = Server::new("127.0.0.1:8080", HashMap::new());

        assert!(server.is_alive());
        assert!(server.set_liveness(false));
        assert!(!server.is_alive());
        assert!(!server.set_liveness(false));
        assert!(!server.set_liveness(true));
        assert!(server.set_liveness(true));
        assert!(server.is_alive());
    }

    #[test]
    fn replica_addresses() {
        let valid = [
            ("localhost:8081", "localhost:8081"),
            ("127.0.0.1:9000", "127.0.0.1:9000"),
            ("http://localhost:8082", "localhost:8082"),
            ("http://example.com", "example.com:80"),
            ("http://10.0.0.1:3000/some/path?x=1", "10.0.0.1:3000"),
        ];

        for (url, address) in valid {
            let server = Server::from_replica(&replica(url)).unwrap();
            assert_eq!(server.address(), address);
            assert_eq!(server.url(), url);
            assert!(server.is_alive());
        }
    }

    #[test]
    fn malformed_replica_addresses() {
        for url in ["", "localhost", "https://localhost:8443", "/just/a/path", "http://:80"] {
            assert!(
                matches!(
                    Server::from_replica(&replica(url)),
                    Err(Error::InvalidAddress { .. })
                ),
                "{url} should be rejected"
            );
        }
    }
}
