/// Reasons `decode` rejects a datagram (spec §4.1, §7 "Malformed datagram").
///
/// The FSA and Dispatcher treat every variant identically — a silent
/// discard — but keeping them distinct makes the reject path observable
/// in logs and testable in isolation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum CodecError {
    #[error("datagram shorter than the {0}-byte header")]
    TooShort(usize),
    #[error("bad magic: {0:#06x}")]
    BadMagic(u16),
    #[error("unsupported version: {0}")]
    BadVersion(u8),
    #[error("unknown command: {0}")]
    BadCommand(u8),
}
