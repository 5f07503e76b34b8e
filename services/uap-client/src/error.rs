use std::path::PathBuf;

/// Failures that can prevent a client session from starting at all.
///
/// Once the session FSA is running, errors are handled inline (spec §7 —
/// they drive state transitions, they don't unwind), so this only covers
/// the setup phase: binding a socket or opening an input file.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("failed to resolve or bind a UDP socket: {0}")]
    Socket(#[source] std::io::Error),

    #[error("failed to open input file {path}: {source}")]
    InputFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
