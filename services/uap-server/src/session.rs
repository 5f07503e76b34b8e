use std::net::SocketAddr;
use tokio::time::Instant;

/// Server-side per-session state (spec §3).
#[derive(Debug, Clone)]
pub struct Session {
    pub session_id: u32,
    pub addr: SocketAddr,
    /// Next sequence number expected from the client.
    pub expected_sequence: u32,
    pub last_seen: Instant,
}

impl Session {
    #[must_use]
    pub fn new(session_id: u32, addr: SocketAddr, hello_seq: u32, now: Instant) -> Self {
        Session {
            session_id,
            addr,
            expected_sequence: hello_seq.wrapping_add(1),
            last_seen: now,
        }
    }

    pub fn touch(&mut self, now: Instant) {
        self.last_seen = now;
    }
}

/// How a `DATA` sequence number classifies against `expected` (spec §4.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequenceOutcome {
    /// `seq == expected`: emit payload, advance `expected`, reply ALIVE.
    InOrder,
    /// `seq == expected - 1`: emit "Duplicate", reply ALIVE, don't advance.
    Duplicate,
    /// `seq > expected`: emit "Lost packet" for each missing number, then
    /// the payload; `expected` jumps to `seq + 1`.
    Gap { missing_count: u32 },
    /// `seq < expected - 1`: protocol error; session is destroyed.
    Stale,
}

#[must_use]
pub fn classify(expected: u32, seq: u32) -> SequenceOutcome {
    if seq == expected {
        SequenceOutcome::InOrder
    } else if seq.wrapping_add(1) == expected {
        SequenceOutcome::Duplicate
    } else if seq > expected {
        SequenceOutcome::Gap {
            missing_count: seq - expected,
        }
    } else {
        SequenceOutcome::Stale
    }
}
