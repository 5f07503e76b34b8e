// The Input Source: either a file of lines (batch mode) or an interactive
// terminal (spec §4.3's "Input Source" collaborator). Both are exposed
// through the same trait so the FSA never needs to know which one it's
// racing against the socket and the timer.

use std::path::Path;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

#[async_trait]
pub trait LineSource: Send {
    /// Returns `Ok(Some(line))` for a line (without the trailing newline
    /// stripped — callers decide), `Ok(None)` at end of input.
    async fn next_line(&mut self) -> std::io::Result<Option<String>>;

    /// Whether a bare `q` line should be treated the same as EOF. True
    /// only for the interactive terminal source (spec §4.3's sentinel).
    fn treats_q_as_eof(&self) -> bool;
}

/// Reads lines from a file, fully async via tokio's own blocking pool.
/// `tokio::io::Lines::next_line` is cancellation-safe, which matters here:
/// the FSA drops this future unpolled whenever the socket or timer branch
/// of a race wins instead.
pub struct FileLines {
    lines: tokio::io::Lines<BufReader<tokio::fs::File>>,
}

impl FileLines {
    pub async fn open(path: &Path) -> std::io::Result<Self> {
        let file = tokio::fs::File::open(path).await?;
        Ok(FileLines {
            lines: BufReader::new(file).lines(),
        })
    }
}

#[async_trait]
impl LineSource for FileLines {
    async fn next_line(&mut self) -> std::io::Result<Option<String>> {
        self.lines.next_line().await
    }

    fn treats_q_as_eof(&self) -> bool {
        false
    }
}

/// Reads lines from stdin.
///
/// A blocking `read_line` call cannot be raced inside a `tokio::select!`
/// directly without leaking the OS thread on cancellation, so the actual
/// read loop runs once on a dedicated blocking task and feeds a channel;
/// `next_line` just awaits the channel, which tokio guarantees is
/// cancel-safe (a line that arrives while nobody's polling stays queued).
pub struct StdinLines {
    rx: mpsc::Receiver<std::io::Result<Option<String>>>,
}

impl StdinLines {
    #[must_use]
    pub fn new() -> Self {
        let (tx, rx) = mpsc::channel(1);
        tokio::task::spawn_blocking(move || {
            let stdin = std::io::stdin();
            let mut reader = std::io::BufReader::new(stdin);
            loop {
                let mut line = String::new();
                let outcome = match std::io::BufRead::read_line(&mut reader, &mut line) {
                    Ok(0) => Ok(None),
                    Ok(_) => Ok(Some(line)),
                    Err(e) => Err(e),
                };
                let is_end = !matches!(outcome, Ok(Some(_)));
                if tx.blocking_send(outcome).is_err() || is_end {
                    break;
                }
            }
        });
        StdinLines { rx }
    }
}

impl Default for StdinLines {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LineSource for StdinLines {
    async fn next_line(&mut self) -> std::io::Result<Option<String>> {
        match self.rx.recv().await {
            Some(result) => result,
            None => Ok(None),
        }
    }

    fn treats_q_as_eof(&self) -> bool {
        true
    }
}
