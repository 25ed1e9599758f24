//! Errors produced while building the load balancer or handling a request.

use std::io;

use thiserror::Error;

/// Every failure the load balancer knows about. Construction errors
/// ([`Error::EmptyServerSet`], [`Error::InvalidHealthCheck`],
/// [`Error::InvalidAddress`],
/// [`Error::DuplicateMatcher`], [`Error::Config`] and [`Error::Io`]) are fatal
/// at startup. [`Error::NoMatchingService`] and [`Error::NoHealthyServers`]
/// are per request and end up as HTTP responses, see [`crate::service`].
#[derive(Debug, Error)]
pub enum Error {
    /// A health checker needs at least one server to probe.
    #[error("a server list was expected, got an empty list")]
    EmptyServerSet,

    /// Probe interval or timeout that can't be used for health checking.
    #[error("invalid health check settings: {0}")]
    InvalidHealthCheck(String),

    /// Replica URL that can't be turned into a `host:port` address.
    #[error("malformed replica address '{address}': {reason}")]
    InvalidAddress { address: String, reason: String },

    /// Two services configured with the same matcher.
    #[error("matcher '{0}' is used by more than one service")]
    DuplicateMatcher(String),

    /// No service matcher is a prefix of the request path.
    #[error("could not find a matcher for path '{0}'")]
    NoMatchingService(String),

    /// The strategy scanned the whole pool and found no live server.
    #[error("checked all the '{0}' servers, none of them is available")]
    NoHealthyServers(usize),

    #[error("configuration error: {0}")]
    Config(#[from] crate::config::Error),

    #[error(transparent)]
    Io(#[from] io::Error),
}

impl Error {
    pub(crate) fn invalid_address(address: &str, reason: impl Into<String>) -> Self {
        Self::InvalidAddress {
            address: address.to_owned(),
            reason: reason.into(),
        }
    }
}
