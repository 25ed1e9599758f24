//! Custom deserialization for the configuration file.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::Replica;

/// Scalar metadata value. Config files are written by humans, and `weight = 10`
/// is what people write instead of `weight = "10"`, so any scalar is accepted
/// and stored as a string. Interpreting the value is up to whoever reads it,
/// see [`crate::upstream::Server::metadata_or_default_int`].
#[derive(Serialize, Deserialize, Debug)]
#[serde(untagged)]
pub(super) enum MetadataValue {
    String(String),
    Integer(i64),
    Float(f64),
    Boolean(bool),
}

impl From<MetadataValue> for String {
    fn from(value: MetadataValue) -> Self {
        match value {
            MetadataValue::String(string) => string,
            MetadataValue::Integer(integer) => integer.to_string(),
            MetadataValue::Float(float) => float.to_string(),
            MetadataValue::Boolean(boolean) => boolean.to_string(),
        }
    }
}

/// Allows specifying replicas as a plain URL or an object containing the URL
/// and metadata.
///
/// ```toml
/// [[services]]
///
/// name = "plain"
/// replicas = ["127.0.0.1:8080", "127.0.0.1:8081"]
///
/// [[services]]
///
/// name = "weighted"
/// replicas = [
///     { url = "127.0.0.1:8080", metadata = { weight = 1 } },
///     { url = "127.0.0.1:8081", metadata = { weight = 3 } },
/// ]
/// ```
///
/// In YAML an empty `metadata:` key is `null`, which is why the map is
/// optional.
#[derive(Serialize, Deserialize, Debug)]
#[serde(untagged)]
pub(super) enum ReplicaOption {
    Simple(String),
    WithMetadata {
        url: String,
        #[serde(default)]
        metadata: Option<HashMap<String, MetadataValue>>,
    },
}

impl From<ReplicaOption> for Replica {
    fn from(value: ReplicaOption) -> Self {
        let (url, metadata) = match value {
            ReplicaOption::Simple(url) => (url, None),
            ReplicaOption::WithMetadata { url, metadata } => (url, metadata),
        };

        let metadata = metadata
            .unwrap_or_default()
            .into_iter()
            .map(|(key, value)| (key, String::from(value)))
            .collect();

        Self { url, metadata }
    }
}
