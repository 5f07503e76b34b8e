// uap-test-utils: shared UDP test harness for the client and server
// integration suites.
//
// Mirrors the role `rt-test-utils` plays for the WS-based services in the
// teacher workspace: a thin, allocation-light peer that tests drive
// directly instead of hand-rolling `UdpSocket::bind` boilerplate in every
// test file.

use std::net::SocketAddr;
use std::time::Duration;

use tokio::net::UdpSocket;
use tokio::time::timeout;
use uap_protocol::{decode, encode, Command, Packet};

pub use uap_protocol::now_micros;

/// A loopback UDP peer bound to an OS-assigned ephemeral port.
///
/// Used by both services' test suites to stand in for "the other side" —
/// a test acting as a fake client sends to a real server under test, or
/// vice versa.
pub struct UdpPeer {
    socket: UdpSocket,
}

impl UdpPeer {
    /// Bind to `127.0.0.1:0` and let the OS pick a free port.
    pub async fn bind() -> Self {
        let socket = UdpSocket::bind("127.0.0.1:0")
            .await
            .expect("bind ephemeral UDP port");
        UdpPeer { socket }
    }

    #[must_use]
    pub fn local_addr(&self) -> SocketAddr {
        self.socket.local_addr().expect("local_addr")
    }

    pub async fn send_raw(&self, bytes: &[u8], to: SocketAddr) {
        self.socket.send_to(bytes, to).await.expect("send_to");
    }

    pub async fn send_packet(
        &self,
        command: Command,
        sequence_number: u32,
        session_id: u32,
        logical_clock: u64,
        timestamp: u64,
        payload: &[u8],
        to: SocketAddr,
    ) {
        let wire = encode(
            command,
            sequence_number,
            session_id,
            logical_clock,
            timestamp,
            payload,
        );
        self.send_raw(&wire, to).await;
    }

    /// Receive and decode one packet, failing the test if none arrives
    /// within `within` or if the datagram fails to decode.
    pub async fn recv_packet(&self, within: Duration) -> (Packet, SocketAddr) {
        let mut buf = [0u8; 2048];
        let (len, from) = timeout(within, self.socket.recv_from(&mut buf))
            .await
            .expect("timed out waiting for a packet")
            .expect("recv_from");
        let packet = decode(&buf[..len]).expect("decode reply");
        (packet, from)
    }

    /// Assert that nothing arrives within `within` — used to verify a
    /// dropped/ignored datagram produced no reply.
    pub async fn assert_silence(&self, within: Duration) {
        let mut buf = [0u8; 2048];
        let result = timeout(within, self.socket.recv_from(&mut buf)).await;
        assert!(result.is_err(), "expected no reply, but one arrived");
    }
}
