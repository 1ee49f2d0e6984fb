use futures::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;
use tokio_util::codec::{Framed, LengthDelimitedCodec};
use tracing::{debug, warn};

use super::client::{HANDSHAKE_TIMEOUT, SessionError};
use super::wire::{Frame, Hello};
use crate::manager::protocol::ManagerMessage;
use crate::manager::service::ManagerHandle;

/// Accept loop for inbound peer connections. Runs until the listener
/// socket dies; each accepted stream gets its own session task.
pub async fn serve(listener: TcpListener, handle: ManagerHandle) {
    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                debug!("Accepted peer connection from {}", addr);
                tokio::spawn(run_accept_session(stream, handle.clone()));
            }
            Err(err) => {
                warn!("Failed to accept peer connection: {}", err);
                tokio::time::sleep(Duration::from_millis(100)).await;
            }
        }
    }
}

/// Accept-side session: waits for the dialer's hello, answers with ours,
/// then becomes a pure receive pump. The dialer owns the table entry on
/// its side; this end holds none, so no termination signal is needed.
async fn run_accept_session(stream: TcpStream, handle: ManagerHandle) {
    let mut framed = Framed::new(stream, LengthDelimitedCodec::new());

    let remote = match read_hello(&mut framed).await {
        Ok(hello) => hello,
        Err(err) => {
            debug!("Inbound handshake failed: {}", err);
            return;
        }
    };

    let Ok(state) = handle.local_state().await else {
        return; // manager stopped
    };
    let reply = Hello {
        peer: handle.local_peer().clone(),
        state,
    };
    let Ok(bytes) = Frame::Hello(reply).encode() else {
        return;
    };
    if framed.send(bytes.into()).await.is_err() {
        return;
    }

    let peer_name = remote.peer.name.clone();
    let connected = ManagerMessage::Connected {
        peer: remote.peer,
        snapshot: remote.state,
    };
    if handle.inbox().send(connected).await.is_err() {
        return;
    }

    // Receive pump: the remote writes on this socket, we never do again.
    while let Some(received) = framed.next().await {
        match received {
            Ok(bytes) => match Frame::decode(&bytes) {
                Ok(Frame::Envelope(envelope)) => {
                    if handle
                        .inbox()
                        .send(ManagerMessage::Receive { envelope })
                        .await
                        .is_err()
                    {
                        break;
                    }
                }
                Ok(Frame::Hello(_)) => {
                    debug!("Ignoring repeated hello from {}", peer_name);
                }
                Err(err) => {
                    warn!("Dropping undecodable frame from {}: {}", peer_name, err);
                }
            },
            Err(err) => {
                debug!("Read error on session with {}: {}", peer_name, err);
                break;
            }
        }
    }
}

async fn read_hello(
    framed: &mut Framed<TcpStream, LengthDelimitedCodec>,
) -> Result<Hello, SessionError> {
    let frame = timeout(HANDSHAKE_TIMEOUT, framed.next())
        .await
        .map_err(|_| SessionError::HandshakeTimeout)?
        .ok_or(SessionError::ClosedEarly)??;

    match Frame::decode(&frame)? {
        Frame::Hello(hello) => Ok(hello),
        Frame::Envelope(_) => Err(SessionError::UnexpectedFrame),
    }
}
