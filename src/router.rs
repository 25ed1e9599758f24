//! Matches request paths to services.

use std::sync::Arc;

use tracing::{debug, info};

use crate::{
    config,
    health::HealthChecker,
    sched::{Scheduler, Strategy},
    upstream::Server,
    Error,
};

/// A logical service: the replicas that serve requests whose path starts with
/// `matcher`, and the scheduler that picks one of them for each request. The
/// replica list is fixed at construction and the scheduler is bound to it.
#[derive(Debug)]
pub struct Service {
    name: String,
    matcher: String,
    servers: Vec<Arc<Server>>,
    scheduler: Scheduler,
}

impl Service {
    pub fn new(
        name: impl Into<String>,
        matcher: impl Into<String>,
        servers: Vec<Arc<Server>>,
        scheduler: Scheduler,
    ) -> Self {
        Self {
            name: name.into(),
            matcher: matcher.into(),
            servers,
            scheduler,
        }
    }

    /// Builds the service described in the config file. `default_strategy` is
    /// used when the service doesn't name one. Fails if any replica URL is
    /// malformed.
    pub fn from_config(
        config: &config::Service,
        default_strategy: Option<&str>,
    ) -> Result<Self, Error> {
        let servers = config
            .replicas
            .iter()
            .map(|replica| Server::from_replica(replica).map(Arc::new))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self::new(
            &config.name,
            &config.matcher,
            servers,
            Scheduler::from_name(config.strategy.as_deref(), default_strategy),
        ))
    }

    /// Creates the health checker responsible for the replicas of this
    /// service. Fails if the service has no replicas.
    pub fn health_checker(&self, config: config::HealthCheck) -> Result<HealthChecker, Error> {
        HealthChecker::new(&self.name, self.servers.clone(), config)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn matcher(&self) -> &str {
        &self.matcher
    }

    pub fn servers(&self) -> &[Arc<Server>] {
        &self.servers
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    /// Picks the server that should process the next request. The scheduler
    /// lock is released when this returns.
    pub fn next_server(&self) -> Result<Arc<Server>, Error> {
        self.scheduler.next(&self.servers).cloned()
    }
}

/// Routing table built once at startup. Services are kept sorted by matcher
/// length so that the first match is always the longest one: with `/api` and
/// `/api/v2` configured, `/api/v2/users` goes to `/api/v2`.
#[derive(Debug, Default)]
pub struct Router {
    services: Vec<Service>,
}

impl Router {
    /// Creates the routing table. Two services can't share the same matcher.
    pub fn new(mut services: Vec<Service>) -> Result<Self, Error> {
        // Stable sort, services with matchers of equal length keep the config
        // file order.
        services.sort_by(|a, b| b.matcher.len().cmp(&a.matcher.len()));

        for (i, service) in services.iter().enumerate() {
            if services[..i].iter().any(|s| s.matcher == service.matcher) {
                return Err(Error::DuplicateMatcher(service.matcher.clone()));
            }
        }

        Ok(Self { services })
    }

    /// Looks for the service whose matcher is the longest prefix of `path`.
    pub fn resolve(&self, path: &str) -> Result<&Service, Error> {
        debug!(path, "Trying to find matcher for request");

        let service = self
            .services
            .iter()
            .find(|service| path.starts_with(service.matcher.as_str()))
            .ok_or_else(|| Error::NoMatchingService(path.to_owned()))?;

        info!(service = service.name(), path, "Found service matching the request");

        Ok(service)
    }

    pub fn services(&self) -> &[Service] {
        &self.services
    }
}
