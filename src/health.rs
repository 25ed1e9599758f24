//! Background health checking.
//!
//! A server is considered healthy if we can open a TCP connection to its
//! `host:port` within a reasonable time frame. Each [`HealthChecker`] probes
//! the replicas of one service periodically and flips their liveness, the
//! schedulers in [`crate::sched`] then skip whatever is marked as dead. Servers
//! are never removed from their pool, they come back as soon as they accept
//! connections again.

use std::{future::Future, pin::Pin, sync::Arc, time::Duration};

use tokio::{
    net::TcpStream,
    task::JoinSet,
    time::{self, MissedTickBehavior},
};
use tracing::{debug, info, warn};

use crate::{config, upstream::Server, Error};

/// Periodically probes a fixed set of servers.
pub struct HealthChecker {
    /// Service name, only for logs.
    name: String,

    servers: Vec<Arc<Server>>,

    /// Time between two probing rounds.
    interval: Duration,

    /// Maximum time a single connection attempt can take.
    timeout: Duration,

    /// The checker stops when this future completes. Never by default.
    shutdown: Pin<Box<dyn Future<Output = ()> + Send>>,
}

impl HealthChecker {
    /// Creates a [`HealthChecker`] for `servers`, which can't be empty. The
    /// interval and timeout must be greater than zero and the timeout can't
    /// exceed the interval, otherwise probes of the same server would overlap
    /// and a stale result could overwrite a newer one.
    pub fn new(
        name: impl Into<String>,
        servers: Vec<Arc<Server>>,
        config: config::HealthCheck,
    ) -> Result<Self, Error> {
        if servers.is_empty() {
            return Err(Error::EmptyServerSet);
        }

        if config.interval.is_zero() || config.timeout.is_zero() {
            return Err(Error::InvalidHealthCheck(String::from(
                "interval and timeout must be greater than zero",
            )));
        }

        if config.timeout > config.interval {
            return Err(Error::InvalidHealthCheck(format!(
                "timeout ({:?}) is longer than interval ({:?})",
                config.timeout, config.interval
            )));
        }

        Ok(Self {
            name: name.into(),
            servers,
            interval: config.interval,
            timeout: config.timeout,
            shutdown: Box::pin(std::future::pending()),
        })
    }

    /// The checker will poll the given `future` between probing rounds and
    /// return from [`HealthChecker::start`] when it completes. Probes that
    /// are already running are not cancelled.
    pub fn shutdown_on(mut self, future: impl Future + Send + 'static) -> Self {
        self.shutdown = Box::pin(async move {
            future.await;
        });

        self
    }

    /// Keeps probing every server until the shutdown future completes. The
    /// first round starts immediately. Each round spawns one task per server,
    /// so a server that takes the whole timeout to answer doesn't delay the
    /// others or the next round.
    pub async fn start(mut self) {
        info!(service = %self.name, "Starting the health checker");

        let mut ticker = time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                biased;

                _ = &mut self.shutdown => {
                    info!(service = %self.name, "Health checker received shutdown signal");
                    return;
                }

                _ = ticker.tick() => {
                    for server in &self.servers {
                        tokio::task::spawn(check_health(server.clone(), self.timeout));
                    }
                }
            }
        }
    }

    /// Runs one probing round and waits until every probe is done.
    pub async fn check_all(&self) {
        let mut set = JoinSet::new();

        for server in &self.servers {
            set.spawn(check_health(server.clone(), self.timeout));
        }

        while set.join_next().await.is_some() {}
    }
}

/// Attempts to open a TCP connection to `address` within `timeout`. The
/// connection is dropped right away.
pub async fn tcp_connect(address: &str, timeout: Duration) -> bool {
    matches!(
        time::timeout(timeout, TcpStream::connect(address)).await,
        Ok(Ok(_))
    )
}

/// Probes `server` and updates its liveness. Only transitions are logged, a
/// server that stays dead for hours doesn't flood the logs.
async fn check_health(server: Arc<Server>, timeout: Duration) {
    let alive = tcp_connect(server.address(), timeout).await;
    let was_alive = server.set_liveness(alive);

    match (was_alive, alive) {
        (true, false) => warn!(
            server = server.address(),
            url = server.url(),
            "Transitioning server from live to unavailable state"
        ),
        (false, true) => info!(
            server = server.address(),
            url = server.url(),
            "Transitioning server from unavailable to live state"
        ),
        _ => debug!(server = server.address(), alive, "Health check done"),
    }
}
