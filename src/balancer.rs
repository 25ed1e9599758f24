use std::{future::Future, io, net::SocketAddr, pin::Pin, sync::Arc};

use hyper_util::rt::TokioIo;
use tokio::{
    net::{TcpListener, TcpSocket, TcpStream},
    sync::watch,
    task::JoinSet,
};
use tracing::{debug, error, info};

use crate::{
    config::Config,
    health::HealthChecker,
    router::{Router, Service},
    service::Dispatcher,
    Error,
};

/// The [`LoadBalancer`] owns everything that lives for the whole process: the
/// listening socket, the routing table and one [`HealthChecker`] per service.
/// It accepts connections and spawns a Tokio task for each one of them, the
/// task serves requests with a [`Dispatcher`]. When the shutdown future
/// completes the load balancer stops accepting connections, lets the
/// connected clients finish their current request and stops probing:
///
/// ```text
///                     +--------------+
///                     | LoadBalancer |
///                     +--------------+
///                            |
///                            v
///                       +--------+
///                  +--- | Select | ---+
///                  |    +--------+    |
///                  v                  v
///            +----------+       +----------+
///            |  Accept  |       | Shutdown |
///            +----------+       +----------+
///                  |                  |
///                  v                  v
///            +----------+       +----------+
///            |  Spawn   |       |   Stop   |
///            +----------+       +----------+
///                  |                  |
///                  v                  v
///   +--------+   +--------+   +--------+   +---------------+
///   | Conn 1 |   | Conn 2 |   | Conn 3 |   | HealthChecker |
///   +--------+   +--------+   +--------+   +---------------+
/// ```
pub struct LoadBalancer {
    /// State updates channel. Subscribers can use this to check the current
    /// [`State`] of the load balancer.
    state: watch::Sender<State>,

    /// TCP listener used to accept connections.
    listener: TcpListener,

    /// Socket address used to listen for incoming connections.
    address: SocketAddr,

    /// Routing table shared by all the connections.
    router: Arc<Router>,

    /// Spawned when [`LoadBalancer::run`] is called.
    health_checkers: Vec<HealthChecker>,

    /// Shutdown future, this can be anything, which allows us to easily write
    /// integration tests. When this future completes, the load balancer starts
    /// the shutdown process.
    shutdown: Pin<Box<dyn Future<Output = ()> + Send>>,
}

/// Represents the current state of the load balancer.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum State {
    /// Sockets are ready but connections are not accepted yet.
    Starting,

    /// Accepting incoming connections.
    Listening,

    /// Gracefully shutting down.
    ShuttingDown(ShutdownState),
}

/// Represents a state in the graceful shutdown process.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum ShutdownState {
    /// No more connections are accepted, but already connected clients are
    /// still being served.
    PendingConnections(usize),

    /// Shutdown process complete.
    Done,
}

impl LoadBalancer {
    /// Builds every service in `config` with its scheduler and health checker
    /// and binds the listening socket. Any invalid replica, duplicated matcher
    /// or service without replicas is an error, we don't start with a broken
    /// topology. Connections are not accepted until [`LoadBalancer::run`] is
    /// called and `await`ed, which allows port 0 to be used in tests and the
    /// actual address read with [`LoadBalancer::socket_address`].
    pub fn init(config: Config) -> Result<Self, Error> {
        let mut services = Vec::with_capacity(config.services.len());
        let mut health_checkers = Vec::with_capacity(config.services.len());

        for service in &config.services {
            let service = Service::from_config(service, config.strategy.as_deref())?;
            health_checkers.push(service.health_checker(config.health)?);

            info!(
                service = service.name(),
                matcher = service.matcher(),
                replicas = service.servers().len(),
                strategy = ?service.scheduler().algorithm(),
                "Registered service"
            );

            services.push(service);
        }

        Self::bind(config.listen, Router::new(services)?, health_checkers)
    }

    /// Same as [`LoadBalancer::init`] but with services built by the caller.
    pub fn bind(
        listen: SocketAddr,
        router: Router,
        health_checkers: Vec<HealthChecker>,
    ) -> Result<Self, Error> {
        let (state, _) = watch::channel(State::Starting);

        let socket = if listen.is_ipv4() {
            TcpSocket::new_v4()?
        } else {
            TcpSocket::new_v6()?
        };

        #[cfg(not(windows))]
        socket.set_reuseaddr(true)?;

        socket.bind(listen)?;

        let listener = socket.listen(1024)?;

        // If the TCP port is 0 then the OS will choose a valid one.
        let address = listener.local_addr()?;

        Ok(Self {
            state,
            listener,
            address,
            router: Arc::new(router),
            health_checkers,
            shutdown: Box::pin(std::future::pending()),
        })
    }

    /// The load balancer will poll the given `future` and whenever it
    /// completes, the graceful shutdown process starts. This could be called
    /// with [`tokio::signal::ctrl_c`], but it can be any [`Future`].
    pub fn shutdown_on(mut self, future: impl Future + Send + 'static) -> Self {
        self.shutdown = Box::pin(async move {
            future.await;
        });

        self
    }

    /// Address of the listening socket. This is necessary for obtaining the
    /// actual address in cases port 0 was used.
    pub fn socket_address(&self) -> SocketAddr {
        self.address
    }

    /// By subscribing to the load balancer the caller obtains a channel where
    /// the current state can be read while [`LoadBalancer::run`] executes on
    /// another task.
    pub fn subscribe(&self) -> watch::Receiver<State> {
        self.state.subscribe()
    }

    /// Routing table, which gives access to every service and server.
    pub fn router(&self) -> Arc<Router> {
        self.router.clone()
    }

    /// This is the entry point, by calling and `await`ing this function the
    /// health checkers start probing and connections are accepted.
    pub async fn run(self) -> Result<(), Error> {
        let Self {
            state,
            listener,
            address,
            router,
            health_checkers,
            shutdown,
        } = self;

        // Flipped once to tell connections and health checkers to stop.
        let (stop, stopped) = watch::channel(false);

        let mut health_tasks = JoinSet::new();

        for checker in health_checkers {
            let mut stopped = stopped.clone();
            let checker = checker.shutdown_on(async move {
                let _ = stopped.changed().await;
            });
            health_tasks.spawn(checker.start());
        }

        state.send_replace(State::Listening);
        info!(%address, "Listening for requests");

        let mut connections = JoinSet::new();

        let result = tokio::select! {
            result = accept(&listener, &router, &stopped, &mut connections) => {
                if let Err(ref err) = result {
                    error!("Error while accepting connections: {err}");
                }
                result
            }
            _ = shutdown => {
                info!("Received shutdown signal");
                Ok(())
            }
        };

        // Dropping the listener stops accepting connections. Any new client
        // gets "Connection Refused", already connected sockets can still send
        // and receive data.
        drop(listener);

        let pending = connections.len();
        info!(pending, "Waiting for pending connections");
        state.send_replace(State::ShuttingDown(ShutdownState::PendingConnections(
            pending,
        )));

        let _ = stop.send(true);

        while connections.join_next().await.is_some() {}
        while let Some(result) = health_tasks.join_next().await {
            if let Err(err) = result {
                error!("Health checker failed: {err}");
            }
        }

        state.send_replace(State::ShuttingDown(ShutdownState::Done));
        info!("Shutdown complete");

        result.map_err(Error::from)
    }
}

/// Accepts connections forever, spawning a task to serve each one of them.
/// Finished tasks are reaped in the same loop.
async fn accept(
    listener: &TcpListener,
    router: &Arc<Router>,
    stopped: &watch::Receiver<bool>,
    connections: &mut JoinSet<()>,
) -> io::Result<()> {
    loop {
        tokio::select! {
            accepted = listener.accept() => {
                let (stream, client_addr) = accepted?;
                let server_addr = stream.local_addr()?;
                let dispatcher = Dispatcher::new(router.clone(), client_addr, server_addr);

                connections.spawn(serve(stream, dispatcher, stopped.clone()));
            }

            Some(_) = connections.join_next(), if !connections.is_empty() => {}
        }
    }
}

/// Serves HTTP/1.1 on `stream` until the client disconnects. When `stopped`
/// changes the connection finishes the request in flight and closes.
async fn serve(stream: TcpStream, dispatcher: Dispatcher, mut stopped: watch::Receiver<bool>) {
    let conn = hyper::server::conn::http1::Builder::new()
        .preserve_header_case(true)
        .title_case_headers(true)
        .serve_connection(TokioIo::new(stream), dispatcher)
        .with_upgrades();

    tokio::pin!(conn);

    let result = tokio::select! {
        result = conn.as_mut() => result,
        _ = stopped.changed() => {
            conn.as_mut().graceful_shutdown();
            conn.await
        }
    };

    if let Err(err) = result {
        debug!("Failed to serve connection: {err}");
    }
}
