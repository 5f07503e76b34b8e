// The Client Session FSA (spec §4.3): five states racing socket receive,
// input-line availability, and a per-state timer against one another.

use std::net::SocketAddr;
use std::time::Duration;

use tokio::net::UdpSocket;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use uap_protocol::{decode, encode, now_micros, Command, LogicalClock, Packet};

use crate::input::LineSource;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Start,
    HelloWait,
    Ready,
    ReadyTimer,
    Closing,
    Closed,
}

/// A line (or end-of-input) read from the Input Source while the FSA was
/// in READY_TIMER, held until the state returns to READY (spec §4.3:
/// "READY_TIMER | input line / EOF | (queued; processed after ALIVE
/// returns to READY) | —"). The reference Python client actually sends
/// the line immediately in this state; the table above overrides that.
enum LineOutcome {
    Line(String),
    Eof,
}

/// All Client-side session state (spec §3 "Session (Client-side)").
pub struct ClientSession {
    socket: UdpSocket,
    server_addr: SocketAddr,
    session_id: u32,
    sequence_number: u32,
    clock: LogicalClock,
    state: State,
    timeout: Duration,
    latency_sum_micros: u128,
    packets_received: u64,
}

impl ClientSession {
    #[must_use]
    pub fn new(socket: UdpSocket, server_addr: SocketAddr, session_id: u32, timeout: Duration) -> Self {
        ClientSession {
            socket,
            server_addr,
            session_id,
            sequence_number: 0,
            clock: LogicalClock::new(),
            state: State::Start,
            timeout,
            latency_sum_micros: 0,
            packets_received: 0,
        }
    }

    #[must_use]
    pub fn state(&self) -> State {
        self.state
    }

    /// Mean one-way latency in microseconds over every packet received
    /// this session, or `None` if none arrived (spec §4.3, scenario 6).
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn average_latency_micros(&self) -> Option<f64> {
        if self.packets_received == 0 {
            None
        } else {
            Some(self.latency_sum_micros as f64 / self.packets_received as f64)
        }
    }

    /// Drives the FSA to completion, racing the Input Source against the
    /// socket and the per-state timer as spec §5 requires.
    pub async fn run(&mut self, lines: &mut dyn LineSource) {
        let mut pending: Option<LineOutcome> = None;
        loop {
            match self.state {
                State::Start => self.enter_start().await,
                State::HelloWait => self.run_hello_wait().await,
                State::Ready => self.run_ready(lines, &mut pending).await,
                State::ReadyTimer => self.run_ready_timer(lines, &mut pending).await,
                State::Closing => self.run_closing().await,
                State::Closed => {
                    info!(
                        average_latency_micros = ?self.average_latency_micros(),
                        packets_received = self.packets_received,
                        "session closed"
                    );
                    return;
                }
            }
        }
    }

    async fn enter_start(&mut self) {
        self.send_packet(Command::Hello, &[]).await;
        self.state = State::HelloWait;
    }

    async fn run_hello_wait(&mut self) {
        let deadline = Instant::now() + self.timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                self.send_packet(Command::Goodbye, &[]).await;
                self.state = State::Closing;
                return;
            }
            match tokio::time::timeout(remaining, self.recv_one()).await {
                Ok(Some(packet)) => {
                    self.on_receive(&packet);
                    self.state = if packet.command == Command::Hello {
                        info!(session_id = %fmt_sid(self.session_id), "session established");
                        State::Ready
                    } else {
                        State::Closed
                    };
                    return;
                }
                Ok(None) => continue, // malformed datagram, keep waiting
                Err(_elapsed) => {
                    self.send_packet(Command::Goodbye, &[]).await;
                    self.state = State::Closing;
                    return;
                }
            }
        }
    }

    async fn run_ready(&mut self, lines: &mut dyn LineSource, pending: &mut Option<LineOutcome>) {
        if let Some(outcome) = pending.take() {
            self.act_on_input(outcome).await;
            return;
        }

        tokio::select! {
            line_result = lines.next_line() => {
                let outcome = to_outcome(line_result, lines.treats_q_as_eof());
                self.act_on_input(outcome).await;
            }
            packet = self.recv_one() => {
                self.handle_ready_packet(packet);
            }
        }
    }

    /// Applies a line/EOF read while in READY: send DATA and move to
    /// READY_TIMER, or send GOODBYE and move to CLOSING.
    async fn act_on_input(&mut self, outcome: LineOutcome) {
        match outcome {
            LineOutcome::Line(line) => {
                self.send_packet(Command::Data, line.as_bytes()).await;
                self.state = State::ReadyTimer;
            }
            LineOutcome::Eof => {
                self.send_packet(Command::Goodbye, &[]).await;
                self.state = State::Closing;
            }
        }
    }

    fn handle_ready_packet(&mut self, packet: Option<Packet>) {
        let Some(packet) = packet else {
            return; // malformed, discard, stay READY
        };
        self.on_receive(&packet);
        if packet.command != Command::Alive {
            self.state = State::Closed;
        }
        // ALIVE: stay READY.
    }

    async fn run_ready_timer(&mut self, lines: &mut dyn LineSource, pending: &mut Option<LineOutcome>) {
        let deadline = Instant::now() + self.timeout;
        let mut want_input = pending.is_none();

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                self.send_packet(Command::Goodbye, &[]).await;
                self.state = State::Closing;
                return;
            }

            tokio::select! {
                () = tokio::time::sleep(remaining) => {
                    self.send_packet(Command::Goodbye, &[]).await;
                    self.state = State::Closing;
                    return;
                }
                packet = self.recv_one() => {
                    let Some(packet) = packet else {
                        continue; // malformed, discard, keep waiting
                    };
                    self.on_receive(&packet);
                    self.state = if packet.command == Command::Alive {
                        State::Ready
                    } else {
                        State::Closed
                    };
                    return;
                }
                line_result = lines.next_line(), if want_input => {
                    want_input = false;
                    *pending = Some(to_outcome(line_result, lines.treats_q_as_eof()));
                }
            }
        }
    }

    async fn run_closing(&mut self) {
        let deadline = Instant::now() + self.timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                self.clock.tick_on_event();
                self.state = State::Closed;
                return;
            }
            match tokio::time::timeout(remaining, self.recv_one()).await {
                Ok(Some(packet)) => {
                    self.on_receive(&packet);
                    match packet.command {
                        Command::Alive => continue, // stay CLOSING
                        _ => {
                            self.state = State::Closed;
                            return;
                        }
                    }
                }
                Ok(None) => continue, // malformed, discard, keep waiting
                Err(_elapsed) => {
                    self.clock.tick_on_event();
                    self.state = State::Closed;
                    return;
                }
            }
        }
    }

    /// Receives and decodes one datagram; `None` on a malformed one
    /// (logged and discarded, per spec §7 — no state change).
    async fn recv_one(&self) -> Option<Packet> {
        let mut buf = [0u8; 2048];
        match self.socket.recv(&mut buf).await {
            Ok(len) => match decode(&buf[..len]) {
                Ok(packet) => Some(packet),
                Err(e) => {
                    warn!(error = %e, "discarding malformed datagram");
                    None
                }
            },
            Err(e) => {
                warn!(error = %e, "recv failed");
                None
            }
        }
    }

    fn on_receive(&mut self, packet: &Packet) {
        self.clock.tick_on_receive(packet.logical_clock);
        let now = now_micros();
        let latency = now.saturating_sub(packet.timestamp);
        self.latency_sum_micros += u128::from(latency);
        self.packets_received += 1;
        debug!(latency_micros = latency, command = ?packet.command, "received packet");
    }

    /// Sends one Client-originated packet, stamping the sequence counter
    /// (pre-increment: HELLO is always `seq = 0`, per spec §9) and the
    /// post-tick logical clock (spec §4.2).
    async fn send_packet(&mut self, command: Command, payload: &[u8]) {
        let seq = self.sequence_number;
        self.sequence_number = self.sequence_number.wrapping_add(1);
        let clock = self.clock.tick_on_event();
        let wire = encode(command, seq, self.session_id, clock, now_micros(), payload);
        if let Err(e) = self.socket.send_to(&wire, self.server_addr).await {
            warn!(error = %e, "send_to failed");
        }
    }
}

fn to_outcome(line_result: std::io::Result<Option<String>>, q_is_eof: bool) -> LineOutcome {
    match line_result {
        Ok(Some(line)) => {
            let is_q = q_is_eof && line.trim_end_matches(['\n', '\r']) == "q";
            if is_q {
                LineOutcome::Eof
            } else {
                LineOutcome::Line(line)
            }
        }
        Ok(None) | Err(_) => LineOutcome::Eof,
    }
}

fn fmt_sid(session_id: u32) -> String {
    format!("0x{session_id:08x}")
}
