//! Structs derived from the config file using [`serde`].

mod deser;

use std::{collections::HashMap, fmt::Debug, fs, io, net::SocketAddr, path::Path, time::Duration};

use deser::ReplicaOption;
use serde::{Deserialize, Serialize};

/// This struct represents the entire configuration file, which describes a list
/// of services and the replicas that serve each one of them. For example, this
/// configuration:
///
/// ```toml
/// listen = "127.0.0.1:8080"
///
/// [[services]]
///
/// name = "users"
/// matcher = "/api/users"
/// strategy = "RoundRobin"
/// replicas = ["127.0.0.1:8081", "127.0.0.1:8082"]
///
/// [[services]]
///
/// name = "orders"
/// matcher = "/api/orders"
/// strategy = "WeightedRoundRobin"
/// replicas = [
///     { url = "http://127.0.0.1:9001", metadata = { weight = 3 } },
///     { url = "http://127.0.0.1:9002", metadata = { weight = 1 } },
/// ]
/// ```
///
/// Should result in a [`Vec`] containing two [`Service`] elements after
/// deserializing. The same keys are accepted in YAML, see [`Config::from_file`].
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Config {
    /// Socket address where the load balancer listens.
    #[serde(default = "default::listen")]
    pub listen: SocketAddr,

    /// Strategy used by services that don't specify their own.
    #[serde(default)]
    pub strategy: Option<String>,

    /// Health checking options shared by all the services.
    #[serde(default)]
    pub health: HealthCheck,

    /// All the services behind this load balancer.
    #[serde(default)]
    pub services: Vec<Service>,
}

/// Description of a single logical service. Requests whose path starts with
/// `matcher` are load balanced between `replicas`.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Service {
    /// Name to show in logs.
    pub name: String,

    /// Path prefix to match against.
    #[serde(default = "default::matcher")]
    pub matcher: String,

    /// Name of the balancing strategy, see [`crate::sched::Scheduler::from_name`].
    #[serde(default)]
    pub strategy: Option<String>,

    /// Running instances of this service.
    pub replicas: Vec<Replica>,
}

/// One element of the `replicas` list. Replicas can be written as a plain URL
/// or as an object carrying metadata:
///
/// ```toml
/// replicas = [
///     "127.0.0.1:8080",                                        # Plain URL
///     { url = "127.0.0.1:8081", metadata = { weight = 2 } },   # With metadata
/// ]
/// ```
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(from = "ReplicaOption")]
pub struct Replica {
    /// Either `host:port` or `http://host[:port]`.
    pub url: String,

    /// Opaque key value pairs. Weighted strategies read the `weight` key.
    pub metadata: HashMap<String, String>,
}

/// Periodic TCP probing configuration.
///
/// ```toml
/// [health]
///
/// interval = "10s"
/// timeout = "5s"
/// ```
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct HealthCheck {
    /// Time between two probing rounds.
    #[serde(default = "default::interval", with = "humantime_serde")]
    pub interval: Duration,

    /// Maximum time a single TCP connect can take.
    #[serde(default = "default::timeout", with = "humantime_serde")]
    pub timeout: Duration,
}

impl Default for HealthCheck {
    fn default() -> Self {
        Self {
            interval: default::interval(),
            timeout: default::timeout(),
        }
    }
}

/// Errors that can happen while loading the config file.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("could not read '{path}': {source}")]
    Read { path: String, source: io::Error },

    #[error("invalid TOML: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("invalid YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl Config {
    /// Reads and parses the config file at `path`. Files ending in `.yaml` or
    /// `.yml` are parsed as YAML, anything else as TOML.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref();

        let content = fs::read_to_string(path).map_err(|source| Error::Read {
            path: path.display().to_string(),
            source,
        })?;

        match path.extension().and_then(|ext| ext.to_str()) {
            Some("yaml" | "yml") => Self::from_yaml(&content),
            _ => Self::from_toml(&content),
        }
    }

    pub fn from_toml(content: &str) -> Result<Self, Error> {
        Ok(toml::from_str(content)?)
    }

    pub fn from_yaml(content: &str) -> Result<Self, Error> {
        Ok(serde_yaml::from_str(content)?)
    }
}

mod default {
    //! Default values for some configuration options.

    use std::{net::SocketAddr, time::Duration};

    pub fn listen() -> SocketAddr {
        SocketAddr::from(([0, 0, 0, 0], 8080))
    }

    pub fn matcher() -> String {
        String::from("/")
    }

    pub fn interval() -> Duration {
        Duration::from_secs(10)
    }

    pub fn timeout() -> Duration {
        Duration::from_secs(5)
    }
}
