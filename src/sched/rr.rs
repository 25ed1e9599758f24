use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, error};

use super::Strategy;
use crate::{upstream::Server, Error};

/// Classical Round Robin (RR) algorithm. If we have 3 backend servers A, B and
/// C and receive 6 requests, this is how RR schedules them:
/// `[A, B, C, A, B, C]`.
///
/// Dead servers are skipped, but the cursor still moves past them. When B is
/// down the sequence becomes `[A, C, A, C]`, and once B recovers it gets its
/// turn right where it would have had it: `[A, B, C]`.
#[derive(Debug, Default)]
pub struct RoundRobin {
    /// Index of the next candidate. Two requests reading the cursor at the
    /// same time could both pick the same server and skip another one, so
    /// the whole scan happens while holding the lock.
    cursor: Mutex<usize>,
}

impl RoundRobin {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Strategy for RoundRobin {
    fn next<'s>(&self, servers: &'s [Arc<Server>]) -> Result<&'s Arc<Server>, Error> {
        let mut cursor = self.cursor.lock();

        for _ in 0..servers.len() {
            let candidate = &servers[*cursor % servers.len()];
            *cursor = (*cursor + 1) % servers.len();

            if candidate.is_alive() {
                debug!(server = candidate.address(), "Strategy picked server");
                return Ok(candidate);
            }
        }

        error!("All servers are down");

        Err(Error::NoHealthyServers(servers.len()))
    }
}
