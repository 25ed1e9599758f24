use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, error};

use super::Strategy;
use crate::{upstream::Server, Error};

/// Metadata key that holds the weight of a server.
pub const WEIGHT: &str = "weight";

/// Classical Weighted Round Robin (WRR) algorithm. Each backend server is
/// assigned a weight to distinguish its processing capabilities from others.
/// The normal Round Robin (RR) algorithm doesn't care about the processing
/// power of each server, so if we have 3 backend servers A, B and C and receive
/// 6 requests, this is how RR schedules them: `[A, B, C, A, B, C]`.
///
/// On the other hand, WRR sends more requests to the servers that have more
/// computing power. If we have 3 servers A, B and C with weights 1, 3 and 2,
/// this is how WRR would schedule the 6 requests from before:
/// `[A, B, B, B, C, C]`.
///
/// The weight is read from the `weight` metadata key of each server and
/// defaults to 1, so WRR without weights behaves exactly like RR. Weights of
/// zero or less take the server out of the rotation.
///
/// # Precondition
///
/// Request counters are allocated on the first call with one slot per server.
/// Every later call must receive a list of the same length, which holds
/// because services never change their replicas. A different length panics.
#[derive(Debug, Default)]
pub struct WeightedRoundRobin {
    state: Mutex<State>,
}

#[derive(Debug, Default)]
struct State {
    /// Number of requests that server `i` has processed in its current turn.
    count: Vec<usize>,

    /// Index of the server whose turn it is.
    current: usize,
}

impl State {
    /// Ends the turn of the current server.
    fn advance(&mut self) {
        self.count[self.current] = 0;
        self.current = (self.current + 1) % self.count.len();
    }
}

impl WeightedRoundRobin {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Strategy for WeightedRoundRobin {
    fn next<'s>(&self, servers: &'s [Arc<Server>]) -> Result<&'s Arc<Server>, Error> {
        let mut state = self.state.lock();

        if state.count.is_empty() {
            state.count = vec![0; servers.len()];
            state.current = 0;
        }

        assert_eq!(
            state.count.len(),
            servers.len(),
            "weighted round robin is bound to a server list of fixed length"
        );

        // Servers that can't take requests right now, dead or drained. Full
        // servers are not counted, they just pass the turn.
        let mut seen = 0;

        while seen < servers.len() {
            let server = &servers[state.current];
            let capacity = server.metadata_or_default_int(WEIGHT, 1).max(0) as usize;

            if !server.is_alive() || capacity == 0 {
                // Reset the count so that a recovered server doesn't start
                // with a partially consumed turn.
                state.advance();
                seen += 1;
                continue;
            }

            let current = state.current;

            if state.count[current] < capacity {
                state.count[current] += 1;
                debug!(server = server.address(), "Strategy picked server");
                return Ok(server);
            }

            state.advance();
        }

        error!("All servers are down");

        Err(Error::NoHealthyServers(servers.len()))
    }
}
