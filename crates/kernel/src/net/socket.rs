//! Socket abstraction unifying TCP and UDP, and the socket manager.

use std::collections::{HashMap, VecDeque};
use std::net::{Ipv4Addr, SocketAddrV4};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::error::NetError;
use crate::net::routing::RoutingTable;
use crate::net::tcp::{Connection, TcpState};

pub type SocketId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Protocol {
    Tcp,
    Udp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SocketType {
    Stream,
    Dgram,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SocketStatus {
    Unconnected,
    Connecting,
    Connected,
    Listening,
    Closing,
    Closed,
}

/// A unified TCP/UDP socket. UDP sockets carry bounded datagram queues
/// directly; TCP sockets delegate data transfer to their [`Connection`].
pub struct Socket {
    pub id: SocketId,
    pub protocol: Protocol,
    pub socket_type: SocketType,
    pub status: SocketStatus,
    pub local: Option<SocketAddrV4>,
    pub remote: Option<SocketAddrV4>,
    pub connection: Option<Connection>,
    recv_queue: VecDeque<Vec<u8>>,
    send_queue: VecDeque<Vec<u8>>,
    queue_depth: usize,
    backlog: VecDeque<SocketAddrV4>,
    backlog_capacity: usize,
}

impl Socket {
    fn new(id: SocketId, protocol: Protocol, queue_depth: usize) -> Self {
        let socket_type = match protocol {
            Protocol::Tcp => SocketType::Stream,
            Protocol::Udp => SocketType::Dgram,
        };
        Self {
            id,
            protocol,
            socket_type,
            status: SocketStatus::Unconnected,
            local: None,
            remote: None,
            connection: None,
            recv_queue: VecDeque::new(),
            send_queue: VecDeque::new(),
            queue_depth,
            backlog: VecDeque::new(),
            backlog_capacity: 0,
        }
    }

    pub fn listen(&mut self, backlog: usize) -> Result<(), NetError> {
        if self.status != SocketStatus::Unconnected {
            return Err(NetError::AlreadyConnected);
        }
        self.backlog_capacity = backlog;
        self.status = SocketStatus::Listening;
        if self.protocol == Protocol::Tcp {
            let mut conn = Connection::new();
            conn.state = TcpState::Listen;
            self.connection = Some(conn);
        }
        Ok(())
    }

    pub fn connect(&mut self, routes: &RoutingTable, remote: SocketAddrV4) -> Result<(), NetError> {
        if self.status != SocketStatus::Unconnected {
            return Err(NetError::AlreadyConnected);
        }
        if routes.lookup(*remote.ip()).is_none() {
            return Err(NetError::NoRoute);
        }
        self.remote = Some(remote);
        if self.protocol == Protocol::Tcp {
            let mut conn = Connection::new();
            conn.state = TcpState::SynSent;
            self.connection = Some(conn);
        }
        self.status = SocketStatus::Connected;
        Ok(())
    }

    pub fn send(&mut self, bytes: Vec<u8>) -> Result<(), NetError> {
        if self.send_queue.len() >= self.queue_depth {
            return Err(NetError::Full);
        }
        self.send_queue.push_back(bytes);
        Ok(())
    }

    pub fn deliver(&mut self, bytes: Vec<u8>) -> Result<(), NetError> {
        if self.recv_queue.len() >= self.queue_depth {
            return Err(NetError::Full);
        }
        self.recv_queue.push_back(bytes);
        Ok(())
    }

    pub fn recv(&mut self) -> Option<Vec<u8>> {
        self.recv_queue.pop_front()
    }

    pub fn take_outbound(&mut self) -> Option<Vec<u8>> {
        self.send_queue.pop_front()
    }

    /// Queues an incoming connection attempt against a listening socket's
    /// backlog. Called by whatever handles inbound SYNs; rejected once the
    /// backlog is at `backlog_capacity`.
    pub fn offer_connection(&mut self, remote: SocketAddrV4) -> Result<(), NetError> {
        if self.status != SocketStatus::Listening {
            return Err(NetError::NotListening);
        }
        if self.backlog.len() >= self.backlog_capacity {
            return Err(NetError::Full);
        }
        self.backlog.push_back(remote);
        Ok(())
    }

    /// Permitted only from `Listening`. Pops the oldest backlogged
    /// connection and returns a brand-new socket initialized to `Connected`;
    /// this socket keeps listening. The handshake itself is the connection's
    /// responsibility -- this only exposes the accepted endpoint.
    pub fn accept(&mut self, new_id: SocketId) -> Result<Socket, NetError> {
        if self.status != SocketStatus::Listening {
            return Err(NetError::NotListening);
        }
        let remote = self
            .backlog
            .pop_front()
            .ok_or(NetError::NoPendingConnection)?;
        let mut accepted = Socket::new(new_id, self.protocol, self.queue_depth);
        accepted.local = self.local;
        accepted.remote = Some(remote);
        accepted.status = SocketStatus::Connected;
        if accepted.protocol == Protocol::Tcp {
            let mut conn = Connection::new();
            conn.state = TcpState::Established;
            accepted.connection = Some(conn);
        }
        Ok(accepted)
    }

    pub fn close(&mut self) -> Result<(), NetError> {
        if self.status == SocketStatus::Closed {
            return Err(NetError::AlreadyClosed);
        }
        self.status = SocketStatus::Closed;
        self.recv_queue.clear();
        self.send_queue.clear();
        if let Some(conn) = &mut self.connection {
            conn.state = TcpState::Closed;
        }
        Ok(())
    }
}

/// Thread-safe map from socket ID to socket, with monotonic ID allocation.
#[derive(Default)]
pub struct SocketManager {
    sockets: RwLock<HashMap<SocketId, Arc<RwLock<Socket>>>>,
    next_id: AtomicU64,
}

impl SocketManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn create(&self, protocol: Protocol, queue_depth: usize) -> Arc<RwLock<Socket>> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let socket = Arc::new(RwLock::new(Socket::new(id, protocol, queue_depth)));
        self.sockets.write().await.insert(id, socket.clone());
        socket
    }

    /// Accepts the next backlogged connection on `listener_id`, registering
    /// the newly accepted socket under a freshly allocated ID.
    pub async fn accept(&self, listener_id: SocketId) -> Result<Arc<RwLock<Socket>>, NetError> {
        let listener = self.get(listener_id).await?;
        let new_id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let accepted = listener.write().await.accept(new_id)?;
        let socket = Arc::new(RwLock::new(accepted));
        self.sockets.write().await.insert(new_id, socket.clone());
        Ok(socket)
    }

    pub async fn get(&self, id: SocketId) -> Result<Arc<RwLock<Socket>>, NetError> {
        self.sockets
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or(NetError::SocketNotFound(id))
    }

    pub async fn remove(&self, id: SocketId) -> Result<(), NetError> {
        self.sockets
            .write()
            .await
            .remove(&id)
            .map(|_| ())
            .ok_or(NetError::SocketNotFound(id))
    }

    pub async fn list(&self) -> Vec<SocketId> {
        self.sockets.read().await.keys().copied().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn local_ip() -> Ipv4Addr {
        Ipv4Addr::new(127, 0, 0, 1)
    }

    #[test]
    fn listen_requires_unconnected_state() {
        let mut socket = Socket::new(1, Protocol::Tcp, 16);
        socket.listen(10).unwrap();
        assert_eq!(socket.status, SocketStatus::Listening);
        assert!(matches!(socket.listen(10), Err(NetError::AlreadyConnected)));
    }

    #[test]
    fn connect_requires_a_route() {
        let mut socket = Socket::new(1, Protocol::Tcp, 16);
        let routes = RoutingTable::new();
        let err = socket
            .connect(&routes, SocketAddrV4::new(local_ip(), 80))
            .unwrap_err();
        assert!(matches!(err, NetError::NoRoute));
    }

    #[test]
    fn close_is_not_idempotent_and_errors_on_second_call() {
        let mut socket = Socket::new(1, Protocol::Udp, 16);
        socket.close().unwrap();
        assert!(matches!(socket.close(), Err(NetError::AlreadyClosed)));
    }

    #[test]
    fn accept_requires_listening_state() {
        let mut socket = Socket::new(1, Protocol::Tcp, 16);
        assert!(matches!(socket.accept(2), Err(NetError::NotListening)));
    }

    #[test]
    fn accept_errors_with_no_pending_connection() {
        let mut socket = Socket::new(1, Protocol::Tcp, 16);
        socket.listen(1).unwrap();
        assert!(matches!(
            socket.accept(2),
            Err(NetError::NoPendingConnection)
        ));
    }

    #[test]
    fn offer_connection_respects_backlog_capacity() {
        let mut socket = Socket::new(1, Protocol::Tcp, 16);
        socket.listen(1).unwrap();
        let remote = SocketAddrV4::new(local_ip(), 9000);
        socket.offer_connection(remote).unwrap();
        assert!(matches!(
            socket.offer_connection(remote),
            Err(NetError::Full)
        ));
    }

    #[test]
    fn accept_pops_backlog_and_returns_a_connected_socket() {
        let mut socket = Socket::new(1, Protocol::Tcp, 16);
        socket.listen(4).unwrap();
        let remote = SocketAddrV4::new(local_ip(), 9000);
        socket.offer_connection(remote).unwrap();
        let accepted = socket.accept(2).unwrap();
        assert_eq!(accepted.id, 2);
        assert_eq!(accepted.status, SocketStatus::Connected);
        assert_eq!(accepted.remote, Some(remote));
        // the listener itself is untouched and keeps listening
        assert_eq!(socket.status, SocketStatus::Listening);
    }

    #[tokio::test]
    async fn manager_accept_registers_the_new_socket() {
        let manager = SocketManager::new();
        let listener = manager.create(Protocol::Tcp, 16).await;
        let listener_id = listener.read().await.id;
        listener.write().await.listen(4).unwrap();
        listener
            .write()
            .await
            .offer_connection(SocketAddrV4::new(local_ip(), 9000))
            .unwrap();
        let accepted = manager.accept(listener_id).await.unwrap();
        let accepted_id = accepted.read().await.id;
        assert!(manager.get(accepted_id).await.is_ok());
        assert_ne!(accepted_id, listener_id);
    }

    #[tokio::test]
    async fn manager_allocates_monotonic_ids() {
        let manager = SocketManager::new();
        let a = manager.create(Protocol::Udp, 16).await;
        let b = manager.create(Protocol::Udp, 16).await;
        assert!(a.read().await.id < b.read().await.id);
    }

    #[test]
    fn send_respects_queue_depth() {
        let mut socket = Socket::new(1, Protocol::Udp, 1);
        socket.send(vec![1]).unwrap();
        assert!(matches!(socket.send(vec![2]), Err(NetError::Full)));
    }
}
