//! HTTP load balancer that routes requests to services by path prefix, picks
//! a replica with a pluggable scheduling strategy and keeps track of replica
//! health in the background.

mod balancer;
mod error;
mod health;
mod http;
mod router;
mod service;
mod upstream;

pub mod config;
pub mod sched;

pub use balancer::{LoadBalancer, ShutdownState, State};
pub use config::Config;
pub use error::Error;
pub use health::{tcp_connect, HealthChecker};
pub use router::{Router, Service};
pub use sched::{Algorithm, Scheduler, Strategy};
pub use service::Dispatcher;
pub use upstream::Server;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
