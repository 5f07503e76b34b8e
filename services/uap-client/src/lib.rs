// client: the UAP Client — drives a single session through its FSA,
// streaming line-delimited input to a server (spec §2, §4.3).

mod error;
mod fsa;
mod input;

pub use error::ClientError;
pub use fsa::{ClientSession, State};
pub use input::{FileLines, LineSource, StdinLines};

use std::net::SocketAddr;
use std::time::Duration;

use rand::Rng;
use tokio::net::UdpSocket;

/// Default per-state deadline (spec §4.3: "TIMEOUT (default: 10 seconds)").
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Resolves `server_addr`, binds an ephemeral local socket, and runs the
/// session FSA to completion against `lines`.
///
/// # Errors
/// Returns [`ClientError::Socket`] if the local UDP socket can't be bound
/// or connected to `server_addr`.
pub async fn run(
    server_addr: SocketAddr,
    mut lines: Box<dyn LineSource>,
    timeout: Duration,
) -> Result<ClientSession, ClientError> {
    let socket = UdpSocket::bind("0.0.0.0:0")
        .await
        .map_err(ClientError::Socket)?;
    socket.connect(server_addr).await.map_err(ClientError::Socket)?;

    let session_id: u32 = rand::thread_rng().gen();
    let mut session = ClientSession::new(socket, server_addr, session_id, timeout);
    session.run(lines.as_mut()).await;
    Ok(session)
}
