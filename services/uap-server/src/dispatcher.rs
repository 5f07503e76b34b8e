use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::Duration;

use tokio::net::UdpSocket;
use tokio::time::{self, Instant};
use tracing::{info, warn};

use uap_protocol::{decode, encode, now_micros, Command, LogicalClock, Packet};

use crate::session::{classify, Session, SequenceOutcome};

/// How long a session may go silent before the Sweeper destroys it
/// (spec §4.5, default 10s).
pub const INACTIVITY_LIMIT: Duration = Duration::from_secs(10);

/// The single-threaded cooperative event loop that owns the UDP socket,
/// the Session Table, and the server's Logical Clock (spec §5).
///
/// No locking anywhere in here: the Dispatcher and the Inactivity Sweeper
/// are two arms of the same `tokio::select!`, never two separate tasks,
/// so the Session Table is only ever touched from this one place.
pub struct Dispatcher {
    socket: UdpSocket,
    sessions: HashMap<u32, Session>,
    server_sequence: u32,
    server_clock: LogicalClock,
}

impl Dispatcher {
    pub async fn bind(port: u16) -> std::io::Result<Self> {
        let socket = UdpSocket::bind(("0.0.0.0", port)).await?;
        Ok(Dispatcher {
            socket,
            sessions: HashMap::new(),
            server_sequence: 0,
            server_clock: LogicalClock::new(),
        })
    }

    #[must_use]
    pub fn local_addr(&self) -> SocketAddr {
        self.socket.local_addr().expect("bound socket has an addr")
    }

    #[must_use]
    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    /// Run until cancelled. Never returns on its own.
    pub async fn run(mut self) {
        let mut sweep = time::interval(Duration::from_secs(1));
        let mut buf = [0u8; 2048];
        loop {
            tokio::select! {
                res = self.socket.recv_from(&mut buf) => {
                    match res {
                        Ok((len, addr)) => self.handle_datagram(&buf[..len], addr).await,
                        Err(e) => warn!(error = %e, "recv_from failed"),
                    }
                }
                _ = sweep.tick() => {
                    self.sweep().await;
                }
            }
        }
    }

    async fn handle_datagram(&mut self, bytes: &[u8], addr: SocketAddr) {
        let packet = match decode(bytes) {
            Ok(p) => p,
            Err(e) => {
                warn!(error = %e, %addr, "discarding malformed datagram");
                return;
            }
        };
        self.server_clock.tick_on_receive(packet.logical_clock);

        match self.sessions.get(&packet.session_id) {
            None => self.handle_unknown_session(&packet, addr).await,
            Some(_) => self.handle_existing_session(&packet, addr).await,
        }
    }

    async fn handle_unknown_session(&mut self, packet: &Packet, addr: SocketAddr) {
        if packet.command != Command::Hello {
            warn!(session_id = %fmt_sid(packet.session_id), "datagram for unknown session, ignoring");
            return;
        }
        let session = Session::new(packet.session_id, addr, packet.sequence_number, Instant::now());
        info!(session_id = %fmt_sid(packet.session_id), "Session created");
        self.sessions.insert(packet.session_id, session);
        self.reply(Command::Hello, packet.session_id, addr).await;
    }

    async fn handle_existing_session(&mut self, packet: &Packet, addr: SocketAddr) {
        {
            let session = self
                .sessions
                .get_mut(&packet.session_id)
                .expect("checked present in handle_datagram");
            session.touch(Instant::now());
        }

        match packet.command {
            Command::Data => self.handle_data(packet, addr).await,
            Command::Goodbye => {
                info!(session_id = %fmt_sid(packet.session_id), seq = packet.sequence_number, "GOODBYE from client");
                self.reply(Command::Goodbye, packet.session_id, addr).await;
                self.destroy_session(packet.session_id, "Session closed");
            }
            Command::Hello | Command::Alive => {
                warn!(session_id = %fmt_sid(packet.session_id), command = ?packet.command, "protocol error: unexpected command on existing session");
                self.reply(Command::Goodbye, packet.session_id, addr).await;
                self.destroy_session(packet.session_id, "Session closed");
            }
        }
    }

    async fn handle_data(&mut self, packet: &Packet, addr: SocketAddr) {
        let sid = packet.session_id;
        let expected = self
            .sessions
            .get(&sid)
            .expect("session exists")
            .expected_sequence;
        let outcome = classify(expected, packet.sequence_number);

        match outcome {
            SequenceOutcome::InOrder => {
                self.emit_payload(sid, packet.sequence_number, &packet.payload);
                let session = self.sessions.get_mut(&sid).unwrap();
                session.expected_sequence = session.expected_sequence.wrapping_add(1);
                self.reply(Command::Alive, sid, addr).await;
            }
            SequenceOutcome::Duplicate => {
                info!(session_id = %fmt_sid(sid), seq = packet.sequence_number, "Duplicate packet");
                self.reply(Command::Alive, sid, addr).await;
            }
            SequenceOutcome::Gap { missing_count } => {
                for missing in expected..packet.sequence_number {
                    info!(session_id = %fmt_sid(sid), seq = missing, "Lost packet");
                }
                debug_assert_eq!(missing_count, packet.sequence_number - expected);
                self.emit_payload(sid, packet.sequence_number, &packet.payload);
                self.sessions.get_mut(&sid).unwrap().expected_sequence =
                    packet.sequence_number.wrapping_add(1);
                self.reply(Command::Alive, sid, addr).await;
            }
            SequenceOutcome::Stale => {
                warn!(session_id = %fmt_sid(sid), seq = packet.sequence_number, expected, "protocol error: stale sequence");
                self.reply(Command::Goodbye, sid, addr).await;
                self.destroy_session(sid, "Session closed");
            }
        }
    }

    fn emit_payload(&self, session_id: u32, seq: u32, payload: &[u8]) {
        let line = String::from_utf8_lossy(payload);
        let line = line.trim_end_matches('\n');
        info!(session_id = %fmt_sid(session_id), seq, "{}", line);
    }

    fn destroy_session(&mut self, session_id: u32, reason: &'static str) {
        if self.sessions.remove(&session_id).is_some() {
            info!(session_id = %fmt_sid(session_id), "{}", reason);
        }
    }

    /// Send every server-originated packet through here: it stamps the
    /// sequence counter (incremented after each send) and the current
    /// server clock (spec §4.4 "every server-originated packet...").
    async fn reply(&mut self, command: Command, session_id: u32, addr: SocketAddr) {
        let seq = self.server_sequence;
        self.server_sequence = self.server_sequence.wrapping_add(1);
        let clock = self.server_clock.tick_on_event();
        let wire = encode(command, seq, session_id, clock, now_micros(), &[]);
        if let Err(e) = self.socket.send_to(&wire, addr).await {
            warn!(error = %e, %addr, "send_to failed");
        }
    }

    async fn sweep(&mut self) {
        let now = Instant::now();
        let expired: Vec<u32> = self
            .sessions
            .iter()
            .filter(|(_, s)| now.duration_since(s.last_seen) > INACTIVITY_LIMIT)
            .map(|(sid, _)| *sid)
            .collect();

        for sid in expired {
            let addr = self.sessions.get(&sid).expect("just filtered").addr;
            info!(session_id = %fmt_sid(sid), "Session closed (timeout)");
            self.reply(Command::Goodbye, sid, addr).await;
            self.sessions.remove(&sid);
        }
    }
}

fn fmt_sid(session_id: u32) -> String {
    format!("0x{session_id:08x}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration as StdDuration;
    use uap_protocol::Command as Cmd;
    use uap_test_utils::UdpPeer;

    async fn spawn_dispatcher() -> SocketAddr {
        let dispatcher = Dispatcher::bind(0).await.unwrap();
        let addr = dispatcher.local_addr();
        tokio::spawn(dispatcher.run());
        addr
    }

    #[tokio::test]
    async fn happy_path_hello_data_goodbye() {
        let server_addr = spawn_dispatcher().await;
        let client = UdpPeer::bind().await;
        let sid = 0xAAAA_0001;

        client
            .send_packet(Cmd::Hello, 0, sid, 1, 0, &[], server_addr)
            .await;
        let (reply, _) = client.recv_packet(StdDuration::from_secs(1)).await;
        assert_eq!(reply.command, Cmd::Hello);

        client
            .send_packet(Cmd::Data, 1, sid, 2, 0, b"hello\n", server_addr)
            .await;
        let (reply, _) = client.recv_packet(StdDuration::from_secs(1)).await;
        assert_eq!(reply.command, Cmd::Alive);

        client
            .send_packet(Cmd::Data, 2, sid, 3, 0, b"world\n", server_addr)
            .await;
        let (reply, _) = client.recv_packet(StdDuration::from_secs(1)).await;
        assert_eq!(reply.command, Cmd::Alive);

        client
            .send_packet(Cmd::Goodbye, 3, sid, 4, 0, &[], server_addr)
            .await;
        let (reply, _) = client.recv_packet(StdDuration::from_secs(1)).await;
        assert_eq!(reply.command, Cmd::Goodbye);
    }

    #[tokio::test]
    async fn gap_emits_one_alive_and_advances_past_the_gap() {
        let server_addr = spawn_dispatcher().await;
        let client = UdpPeer::bind().await;
        let sid = 0xBBBB_0001;

        client
            .send_packet(Cmd::Hello, 0, sid, 1, 0, &[], server_addr)
            .await;
        client.recv_packet(StdDuration::from_secs(1)).await;

        client
            .send_packet(Cmd::Data, 1, sid, 2, 0, b"a", server_addr)
            .await;
        client.recv_packet(StdDuration::from_secs(1)).await;

        // seq 2 (b) dropped in transit; seq 3 arrives next.
        client
            .send_packet(Cmd::Data, 3, sid, 3, 0, b"d", server_addr)
            .await;
        let (reply, _) = client.recv_packet(StdDuration::from_secs(1)).await;
        assert_eq!(reply.command, Cmd::Alive);
    }

    #[tokio::test]
    async fn duplicate_data_is_acked_without_advancing_expected() {
        let server_addr = spawn_dispatcher().await;
        let client = UdpPeer::bind().await;
        let sid = 0xCCCC_0001;

        client
            .send_packet(Cmd::Hello, 0, sid, 1, 0, &[], server_addr)
            .await;
        client.recv_packet(StdDuration::from_secs(1)).await;

        client
            .send_packet(Cmd::Data, 1, sid, 2, 0, b"x", server_addr)
            .await;
        client.recv_packet(StdDuration::from_secs(1)).await;

        client
            .send_packet(Cmd::Data, 1, sid, 3, 0, b"x", server_addr)
            .await;
        let (reply, _) = client.recv_packet(StdDuration::from_secs(1)).await;
        assert_eq!(reply.command, Cmd::Alive);
    }

    #[tokio::test]
    async fn stale_sequence_closes_the_session() {
        let server_addr = spawn_dispatcher().await;
        let client = UdpPeer::bind().await;
        let sid = 0xDDDD_0001;

        client
            .send_packet(Cmd::Hello, 0, sid, 1, 0, &[], server_addr)
            .await;
        client.recv_packet(StdDuration::from_secs(1)).await;

        for seq in 1..=4u32 {
            client
                .send_packet(Cmd::Data, seq, sid, u64::from(seq) + 1, 0, b"x", server_addr)
                .await;
            client.recv_packet(StdDuration::from_secs(1)).await;
        }

        // expected is now 5; send seq=2, which is < expected - 1.
        client
            .send_packet(Cmd::Data, 2, sid, 10, 0, b"stale", server_addr)
            .await;
        let (reply, _) = client.recv_packet(StdDuration::from_secs(1)).await;
        assert_eq!(reply.command, Cmd::Goodbye);

        // session is gone: another DATA from it is now unknown and ignored.
        client
            .send_packet(Cmd::Data, 5, sid, 11, 0, b"gone", server_addr)
            .await;
        client.assert_silence(StdDuration::from_millis(200)).await;
    }

    #[tokio::test]
    async fn unknown_session_non_hello_is_ignored() {
        let server_addr = spawn_dispatcher().await;
        let client = UdpPeer::bind().await;

        client
            .send_packet(Cmd::Data, 1, 0xEEEE_0001, 1, 0, b"x", server_addr)
            .await;
        client.assert_silence(StdDuration::from_millis(200)).await;
    }
}
