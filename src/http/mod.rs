//! Custom types and abstractions for proxy-based HTTP operations.

pub(crate) mod request;
pub(crate) mod response;
