//! Configuration factories for integration tests.

use std::{collections::HashMap, net::SocketAddr, time::Duration};

use rxlb::config::{Config, HealthCheck, Replica, Service};

/// Load balancer listening on a random port.
pub fn load_balancer(services: Vec<Service>) -> Config {
    Config {
        listen: "127.0.0.1:0".parse().unwrap(),
        strategy: None,
        health: HealthCheck::default(),
        services,
    }
}

/// Same as [`load_balancer`] but probing replicas every `interval`. Probes
/// time out after `interval` too.
pub fn load_balancer_with_health_interval(services: Vec<Service>, interval: Duration) -> Config {
    let mut config = load_balancer(services);
    config.health = HealthCheck {
        interval,
        timeout: interval,
    };

    config
}

pub fn service(matcher: &str, strategy: &str, replicas: Vec<Replica>) -> Service {
    Service {
        name: format!("service{}", matcher.replace('/', "-")),
        matcher: String::from(matcher),
        strategy: Some(String::from(strategy)),
        replicas,
    }
}

pub fn round_robin(matcher: &str, addresses: &[SocketAddr]) -> Service {
    let replicas = addresses.iter().map(|address| replica(*address)).collect();

    service(matcher, "RoundRobin", replicas)
}

pub fn weighted_round_robin(matcher: &str, backends: &[(SocketAddr, i64)]) -> Service {
    let replicas = backends
        .iter()
        .map(|(address, weight)| weighted_replica(*address, *weight))
        .collect();

    service(matcher, "WeightedRoundRobin", replicas)
}

pub fn replica(address: SocketAddr) -> Replica {
    Replica {
        url: format!("http://{address}"),
        metadata: HashMap::new(),
    }
}

pub fn weighted_replica(address: SocketAddr, weight: i64) -> Replica {
    Replica {
        url: address.to_string(),
        metadata: HashMap::from([(String::from("weight"), weight.to_string())]),
    }
}
