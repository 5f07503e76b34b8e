use crate::error::CodecError;

/// The four UAP command codes (spec §3, §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Command {
    Hello = 0,
    Data = 1,
    Alive = 2,
    Goodbye = 3,
}

impl Command {
    #[must_use]
    pub const fn as_u8(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for Command {
    type Error = CodecError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Command::Hello),
            1 => Ok(Command::Data),
            2 => Ok(Command::Alive),
            3 => Ok(Command::Goodbye),
            other => Err(CodecError::BadCommand(other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_all_known_commands() {
        for cmd in [Command::Hello, Command::Data, Command::Alive, Command::Goodbye] {
            assert_eq!(Command::try_from(cmd.as_u8()).unwrap(), cmd);
        }
    }

    #[test]
    fn rejects_unknown_command() {
        assert!(matches!(
            Command::try_from(42),
            Err(CodecError::BadCommand(42))
        ));
    }
}
