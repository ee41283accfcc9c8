//! Datagram transport seam.
//!
//! The plant and the buyer only need two capabilities from the network: send
//! one datagram to an address, and receive the next datagram along with its
//! sender. [`DatagramSink`] and [`DatagramSource`] capture exactly that, and
//! are implemented for [`tokio::net::UdpSocket`].
//!
//! Workers never touch a socket directly. Each one is handed a [`PeerLink`]
//! at spawn time, which pairs the shared send capability with the peer
//! address captured when the order was accepted.

use core::future::Future;
use plantline_core::{Error, Message, Result, types::MESSAGE_SIZE};
use std::{io, net::SocketAddr, sync::Arc};
use tokio::net::UdpSocket;

/// Capability to send a single datagram.
pub trait DatagramSink: Send + Sync + 'static {
    fn send_to(
        &self,
        buf: &[u8],
        target: SocketAddr,
    ) -> impl Future<Output = io::Result<usize>> + Send;
}

/// Capability to receive a single datagram.
pub trait DatagramSource: Send + Sync + 'static {
    fn recv_from(
        &self,
        buf: &mut [u8],
    ) -> impl Future<Output = io::Result<(usize, SocketAddr)>> + Send;
}

impl DatagramSink for UdpSocket {
    fn send_to(
        &self,
        buf: &[u8],
        target: SocketAddr,
    ) -> impl Future<Output = io::Result<usize>> + Send {
        UdpSocket::send_to(self, buf, target)
    }
}

impl DatagramSource for UdpSocket {
    fn recv_from(
        &self,
        buf: &mut [u8],
    ) -> impl Future<Output = io::Result<(usize, SocketAddr)>> + Send {
        UdpSocket::recv_from(self, buf)
    }
}

/// Encodes `message` and sends it to `target`.
///
/// # Errors
///
/// Returns [`Error::Transport`] if the send fails.
pub async fn send_message<S>(sink: &S, message: &Message, target: SocketAddr) -> Result<()>
where
    S: DatagramSink + ?Sized,
{
    let bytes = message.encode();
    sink.send_to(&bytes, target)
        .await
        .map_err(|e| Error::transport(format!("send {message:?} to {target}"), e))?;
    Ok(())
}

/// Waits for the next datagram and decodes it.
///
/// The receive buffer is larger than one message so that oversized datagrams
/// are detected instead of silently truncated to a valid length.
///
/// # Errors
///
/// - [`Error::Malformed`] if the datagram has the wrong size. The caller is
///   expected to skip it (see [`Error::is_recoverable`]).
/// - [`Error::Transport`] if the receive itself fails.
pub async fn recv_message<S>(source: &S) -> Result<(Message, SocketAddr)>
where
    S: DatagramSource + ?Sized,
{
    let mut buf = [0_u8; MESSAGE_SIZE * 2];
    let (len, from) = source
        .recv_from(&mut buf)
        .await
        .map_err(|e| Error::transport("receive datagram", e))?;
    let message = Message::decode(&buf[..len])?;
    tracing::trace!("Received {message:?} from {from}");
    Ok((message, from))
}

/// A send capability bound to the peer of one order session.
///
/// The peer address is fixed at construction and cannot change while the
/// workers holding this link are alive.
pub struct PeerLink<S> {
    sink: Arc<S>,
    peer: SocketAddr,
}

impl<S> Clone for PeerLink<S> {
    fn clone(&self) -> Self {
        Self {
            sink: Arc::clone(&self.sink),
            peer: self.peer,
        }
    }
}

impl<S: DatagramSink> PeerLink<S> {
    pub fn new(sink: Arc<S>, peer: SocketAddr) -> Self {
        Self { sink, peer }
    }

    pub const fn peer(&self) -> SocketAddr {
        self.peer
    }

    /// Sends `message` to the session peer.
    pub async fn send(&self, message: Message) -> Result<()> {
        send_message(&*self.sink, &message, self.peer).await
    }
}


#[cfg(test)]
mod tests {
    use super::testing::{MemoryTransport, addr};
    use super::*;

    #[tokio::test]
    async fn peer_link_sends_to_captured_peer() {
        let transport = Arc::new(MemoryTransport::new());
        let link = PeerLink::new(Arc::clone(&transport), addr(4000));

        link.clone()
            .send(Message::Completion { worker_id: 3 })
            .await
            .unwrap();

        assert_eq!(
            transport.sent(),
            vec![(Message::Completion { worker_id: 3 }, addr(4000))]
        );
    }

    #[tokio::test]
    async fn recv_rejects_wrong_sized_datagram() {
        let transport = MemoryTransport::new();
        transport.push_raw(vec![0; 5], addr(1));
        transport.push(Message::Request { order_size: 8 }, addr(2));

        let err = recv_message(&transport).await.unwrap_err();
        assert!(err.is_recoverable());

        let (message, from) = recv_message(&transport).await.unwrap();
        assert_eq!(message, Message::Request { order_size: 8 });
        assert_eq!(from, addr(2));
    }

    #[tokio::test]
    async fn send_failure_is_a_transport_error() {
        let transport = MemoryTransport::failing();
        let err = send_message(&transport, &Message::ProtocolError, addr(9))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Transport { .. }));
    }

    #[tokio::test]
    async fn udp_sockets_exchange_messages() {
        let a = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let b = UdpSocket::bind("127.0.0.1:0").await.unwrap();

        send_message(&a, &Message::Confirm { num_workers: 4 }, b.local_addr().unwrap())
            .await
            .unwrap();
        let (message, from) = recv_message(&b).await.unwrap();

        assert_eq!(message, Message::Confirm { num_workers: 4 });
        assert_eq!(from, a.local_addr().unwrap());
    }
}
