use std::io::Cursor;

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};

use crate::{Command, CodecError, Packet};

/// Fixed magic number identifying a UAP datagram (spec §3, §6).
pub const MAGIC: u16 = 0xC461;
/// The only protocol version this implementation speaks.
pub const VERSION: u8 = 1;
/// Header is always exactly this many bytes, regardless of payload length.
pub const HEADER_LEN: usize = 2 + 1 + 1 + 4 + 4 + 8 + 8;
/// Advisory upper bound on payload size (spec §3: "0 to ~1400 bytes").
/// Not enforced by the codec itself — a payload longer than this still
/// encodes and decodes correctly, it just won't fit in one IPv4 UDP
/// datagram without fragmentation.
pub const MAX_PAYLOAD_LEN: usize = 1400;

/// Pack a UAP packet into its wire representation.
///
/// All multi-byte integers are big-endian ("network byte order", spec
/// §4.1). `payload` is copied verbatim; the codec never interprets it.
#[must_use]
pub fn encode(
    command: Command,
    sequence_number: u32,
    session_id: u32,
    logical_clock: u64,
    timestamp: u64,
    payload: &[u8],
) -> Vec<u8> {
    let mut buf = Vec::with_capacity(HEADER_LEN + payload.len());
    // The two calls below can't fail: writes into a growable Vec never
    // hit WouldBlock/UnexpectedEof.
    buf.write_u16::<BigEndian>(MAGIC).unwrap();
    buf.write_u8(VERSION).unwrap();
    buf.write_u8(command.as_u8()).unwrap();
    buf.write_u32::<BigEndian>(sequence_number).unwrap();
    buf.write_u32::<BigEndian>(session_id).unwrap();
    buf.write_u64::<BigEndian>(logical_clock).unwrap();
    buf.write_u64::<BigEndian>(timestamp).unwrap();
    buf.extend_from_slice(payload);
    buf
}

/// Unpack a UAP packet from its wire representation.
///
/// Rejects (spec §4.1) datagrams shorter than the 26-byte header, with a
/// mismatched magic number, or a mismatched version. A bad command byte
/// is also rejected here, even though spec §4.1 only lists magic/version
/// as `decode` failures — a packet whose command doesn't parse cannot be
/// represented by [`Packet`] at all, so there is no other option.
pub fn decode(bytes: &[u8]) -> Result<Packet, CodecError> {
    if bytes.len() < HEADER_LEN {
        return Err(CodecError::TooShort(HEADER_LEN));
    }
    let mut cursor = Cursor::new(bytes);
    let magic = cursor.read_u16::<BigEndian>().unwrap();
    if magic != MAGIC {
        return Err(CodecError::BadMagic(magic));
    }
    let version = cursor.read_u8().unwrap();
    if version != VERSION {
        return Err(CodecError::BadVersion(version));
    }
    let command = Command::try_from(cursor.read_u8().unwrap())?;
    let sequence_number = cursor.read_u32::<BigEndian>().unwrap();
    let session_id = cursor.read_u32::<BigEndian>().unwrap();
    let logical_clock = cursor.read_u64::<BigEndian>().unwrap();
    let timestamp = cursor.read_u64::<BigEndian>().unwrap();
    let payload = bytes[HEADER_LEN..].to_vec();

    Ok(Packet {
        command,
        sequence_number,
        session_id,
        logical_clock,
        timestamp,
        payload,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_a_data_packet_with_payload() {
        let wire = encode(Command::Data, 7, 0xAAAA_0001, 42, 123_456, b"hello\n");
        let packet = decode(&wire).unwrap();
        assert_eq!(packet.command, Command::Data);
        assert_eq!(packet.sequence_number, 7);
        assert_eq!(packet.session_id, 0xAAAA_0001);
        assert_eq!(packet.logical_clock, 42);
        assert_eq!(packet.timestamp, 123_456);
        assert_eq!(packet.payload, b"hello\n");
    }

    #[test]
    fn round_trips_an_empty_payload() {
        let wire = encode(Command::Alive, 1, 1, 1, 1, &[]);
        let packet = decode(&wire).unwrap();
        assert!(packet.payload.is_empty());
    }

    #[test]
    fn header_is_always_26_bytes() {
        assert_eq!(HEADER_LEN, 26);
        let wire = encode(Command::Hello, 0, 1, 0, 0, &[]);
        assert_eq!(wire.len(), HEADER_LEN);
    }

    #[test]
    fn rejects_short_datagrams() {
        let wire = encode(Command::Hello, 0, 1, 0, 0, &[]);
        assert_eq!(
            decode(&wire[..HEADER_LEN - 1]),
            Err(CodecError::TooShort(HEADER_LEN))
        );
    }

    #[test]
    fn rejects_bad_magic() {
        let mut wire = encode(Command::Hello, 0, 1, 0, 0, &[]);
        wire[0] = 0xFF;
        assert_eq!(decode(&wire), Err(CodecError::BadMagic(0xFF61)));
    }

    #[test]
    fn rejects_bad_version() {
        let mut wire = encode(Command::Hello, 0, 1, 0, 0, &[]);
        wire[2] = 2;
        assert_eq!(decode(&wire), Err(CodecError::BadVersion(2)));
    }

    #[test]
    fn rejects_bad_command() {
        let mut wire = encode(Command::Hello, 0, 1, 0, 0, &[]);
        wire[3] = 200;
        assert_eq!(decode(&wire), Err(CodecError::BadCommand(200)));
    }

    #[test]
    fn wire_fields_are_big_endian() {
        let wire = encode(Command::Data, 0x0102_0304, 1, 0, 0, &[]);
        // sequence_number starts right after magic(2)+version(1)+command(1)
        assert_eq!(&wire[4..8], &[0x01, 0x02, 0x03, 0x04]);
    }
}
