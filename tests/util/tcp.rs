//! TCP utilities for integration tests.

use std::{net::SocketAddr, time::Duration};

use tokio::net::{TcpListener, TcpSocket, TcpStream};

/// Creates a socket bound to port "0", which lets the OS pick any available
/// TCP port. Tests run in parallel so addresses must not collide, but we still
/// need to know them before anything starts listening.
pub fn usable_socket() -> (TcpSocket, SocketAddr) {
    let socket = TcpSocket::new_v4().unwrap();

    #[cfg(not(windows))]
    socket.set_reuseaddr(true).unwrap();

    socket.bind("127.0.0.1:0".parse().unwrap()).unwrap();
    let addr = socket.local_addr().unwrap();

    (socket, addr)
}

/// Same as [`usable_socket`] but already configured for listening.
pub fn usable_tcp_listener() -> (TcpListener, SocketAddr) {
    let (socket, addr) = usable_socket();
    let listener = socket.listen(1024).unwrap();

    (listener, addr)
}

/// Address where nothing is listening. Connecting to it is refused, which is
/// how a crashed replica looks like.
pub fn closed_address() -> SocketAddr {
    usable_socket().1
}

/// Waits until a server running on a Tokio task accepts connections. Panics
/// after a few attempts.
pub async fn ping_tcp_server(addr: SocketAddr) {
    for _ in 0..50 {
        if TcpStream::connect(addr).await.is_ok() {
            return;
        }

        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    panic!("Could not connect to server {addr}");
}

/// See [`ping_tcp_server`].
pub async fn ping_all(addrs: &[SocketAddr]) {
    for addr in addrs {
        ping_tcp_server(*addr).await;
    }
}
