// uap-protocol: wire format, logical clock and packet types for the UDP
// Application Protocol (UAP).
//
// This crate is pure data + encode/decode — it owns no socket, no session
// state, and no timers. Both the client and server depend on it for the
// one thing they must agree on byte-for-byte.

mod clock;
mod codec;
mod command;
mod error;
mod time;

pub use clock::LogicalClock;
pub use codec::{decode, encode, HEADER_LEN, MAGIC, MAX_PAYLOAD_LEN, VERSION};
pub use command::Command;
pub use error::CodecError;
pub use time::now_micros;

/// A decoded UAP packet.
///
/// Mirrors spec §3's `Packet` attributes exactly; `payload` borrows are
/// avoided in favor of an owned `Vec<u8>` since both endpoints hold onto
/// packets across `.await` points.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    pub command: Command,
    pub sequence_number: u32,
    pub session_id: u32,
    pub logical_clock: u64,
    /// Microseconds since the Unix epoch (see `SPEC_FULL.md` for why this
    /// encoding was chosen over the alternative IEEE-754-seconds wire
    /// format seen in some reference sources).
    pub timestamp: u64,
    pub payload: Vec<u8>,
}
