//! Load balancing and scheduler implementations.

use std::{str::FromStr, sync::Arc};

use tracing::{info, warn};

use crate::{upstream::Server, Error};

mod rr;
mod wrr;

pub use rr::RoundRobin;
pub use wrr::WeightedRoundRobin;

/// A scheduler provides an algorithm for load balancing between multiple
/// backend servers. Implementations keep their own state (cursors, counters)
/// behind a lock owned by the instance, so one instance must be bound to one
/// server list and never shared between services.
pub trait Strategy {
    /// Returns the server that should process the next request, skipping the
    /// ones that are not alive. If none of them is alive
    /// [`Error::NoHealthyServers`] is returned.
    fn next<'s>(&self, servers: &'s [Arc<Server>]) -> Result<&'s Arc<Server>, Error>;
}

/// Algorithms that can be named in the configuration file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Algorithm {
    RoundRobin,
    WeightedRoundRobin,
}

impl FromStr for Algorithm {
    type Err = String;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        match name {
            "RoundRobin" => Ok(Self::RoundRobin),
            "WeightedRoundRobin" => Ok(Self::WeightedRoundRobin),
            unknown => Err(format!("unknown strategy '{unknown}'")),
        }
    }
}

/// This is used mainly to avoid working with `dyn` traits. We don't know the
/// exact scheduler type at compile time because it's specified in the config
/// file and each service could have a different one. Instead of boxing a
/// `dyn Strategy` we store the scheduler inside an enum, adding a new
/// algorithm means adding a variant here.
#[derive(Debug)]
pub enum Scheduler {
    RoundRobin(RoundRobin),
    Wrr(WeightedRoundRobin),
}

impl Scheduler {
    /// Creates a new scheduler from the given [`Algorithm`].
    pub fn new(algorithm: Algorithm) -> Self {
        match algorithm {
            Algorithm::RoundRobin => Self::RoundRobin(RoundRobin::new()),
            Algorithm::WeightedRoundRobin => Self::Wrr(WeightedRoundRobin::new()),
        }
    }

    /// Resolves the strategy by name. A missing or unknown `name` falls back
    /// to `fallback`, and [`RoundRobin`] is used when neither of them names a
    /// known algorithm.
    pub fn from_name(name: Option<&str>, fallback: Option<&str>) -> Self {
        let mut algorithm = None;

        for candidate in [name, fallback].into_iter().flatten() {
            match candidate.parse::<Algorithm>() {
                Ok(parsed) => {
                    algorithm = Some(parsed);
                    break;
                }
                Err(err) => warn!("{err}, trying the next configured strategy"),
            }
        }

        if name.is_none() && algorithm.is_some() {
            info!("No strategy configured for the service, using the default one");
        }

        let algorithm = algorithm.unwrap_or_else(|| {
            warn!("No valid strategy configured, falling back to the RoundRobin strategy");
            Algorithm::RoundRobin
        });

        info!(strategy = ?algorithm, "Picked strategy");

        Self::new(algorithm)
    }

    pub fn algorithm(&self) -> Algorithm {
        match self {
            Self::RoundRobin(_) => Algorithm::RoundRobin,
            Self::Wrr(_) => Algorithm::WeightedRoundRobin,
        }
    }
}

impl Strategy for Scheduler {
    fn next<'s>(&self, servers: &'s [Arc<Server>]) -> Result<&'s Arc<Server>, Error> {
        match self {
            Self::RoundRobin(rr) => rr.next(servers),
            Self::Wrr(wrr) => wrr.next(servers),
        }
    }
}
