use futures::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::time::Duration;
use thiserror::Error;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_util::codec::{Framed, LengthDelimitedCodec};
use tracing::{debug, warn};

use super::wire::{Frame, FrameError, Hello};
use super::{ConnectError, Connector, PeerLink};
use crate::manager::protocol::{Envelope, InboxSender, ManagerMessage};
use crate::membership::types::{Peer, PeerName};

/// Upper bound on waiting for the remote `Hello` after the socket opens.
pub(crate) const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(5);

/// Failures internal to a session; logged, never propagated to callers.
#[derive(Debug, Error)]
pub(crate) enum SessionError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Frame(#[from] FrameError),
    #[error("connection closed during handshake")]
    ClosedEarly,
    #[error("handshake timed out")]
    HandshakeTimeout,
    #[error("expected hello, got another frame")]
    UnexpectedFrame,
}

/// Production dialer: TCP with bounded connect and handshake phases.
#[derive(Debug, Clone)]
pub struct TcpConnector {
    connect_timeout: Duration,
    session_capacity: usize,
}

impl TcpConnector {
    pub fn new(connect_timeout: Duration, session_capacity: usize) -> Self {
        Self {
            connect_timeout,
            session_capacity,
        }
    }
}

impl Connector for TcpConnector {
    async fn connect(
        &self,
        peer: &Peer,
        hello: Hello,
        inbox: InboxSender,
    ) -> Result<PeerLink, ConnectError> {
        let addr = SocketAddr::new(peer.addr, peer.port);

        let stream = timeout(self.connect_timeout, TcpStream::connect(addr))
            .await
            .map_err(|_| ConnectError::Timeout {
                addr: addr.to_string(),
            })?
            .map_err(|source| ConnectError::Dial {
                addr: addr.to_string(),
                source,
            })?;

        let (tx, rx) = mpsc::channel(self.session_capacity);
        tokio::spawn(run_dial_session(stream, hello, peer.name.clone(), rx, inbox));
        Ok(PeerLink::new(tx))
    }
}

/// Owns one dialed connection: handshake, then pump frames until either
/// side goes away. Always reports its death so the table entry is erased.
async fn run_dial_session(
    stream: TcpStream,
    hello: Hello,
    expected: PeerName,
    outbound: mpsc::Receiver<Envelope>,
    inbox: InboxSender,
) {
    let mut framed = Framed::new(stream, LengthDelimitedCodec::new());

    match handshake(&mut framed, hello).await {
        Ok(remote) if remote.peer.name == expected => {
            let connected = ManagerMessage::Connected {
                peer: remote.peer,
                snapshot: remote.state,
            };
            if inbox.send(connected).await.is_ok() {
                pump(&mut framed, outbound, &inbox, &expected).await;
            }
        }
        Ok(remote) => {
            warn!(
                "Dialed {} but the remote introduced itself as {}; dropping session",
                expected, remote.peer.name
            );
        }
        Err(err) => {
            debug!("Handshake with {} failed: {}", expected, err);
        }
    }

    let _ = inbox
        .send(ManagerMessage::SessionClosed { name: expected })
        .await;
}

/// Sends the local hello and waits (bounded) for the remote one.
async fn handshake(
    framed: &mut Framed<TcpStream, LengthDelimitedCodec>,
    hello: Hello,
) -> Result<Hello, SessionError> {
    let bytes = Frame::Hello(hello).encode()?;
    framed.send(bytes.into()).await?;

    let frame = timeout(HANDSHAKE_TIMEOUT, framed.next())
        .await
        .map_err(|_| SessionError::HandshakeTimeout)?
        .ok_or(SessionError::ClosedEarly)??;

    match Frame::decode(&frame)? {
        Frame::Hello(remote) => Ok(remote),
        Frame::Envelope(_) => Err(SessionError::UnexpectedFrame),
    }
}

/// Post-handshake frame pump. Outbound envelopes go to the socket; inbound
/// frames go to the manager. Undecodable frames are dropped and logged,
/// everything else that fails ends the session.
async fn pump(
    framed: &mut Framed<TcpStream, LengthDelimitedCodec>,
    mut outbound: mpsc::Receiver<Envelope>,
    inbox: &InboxSender,
    peer: &PeerName,
) {
    loop {
        tokio::select! {
            queued = outbound.recv() => {
                let Some(envelope) = queued else {
                    break; // link erased from the table
                };
                match Frame::Envelope(envelope).encode() {
                    Ok(bytes) => {
                        if framed.send(bytes.into()).await.is_err() {
                            break;
                        }
                    }
                    Err(err) => warn!("Failed to encode frame for {}: {}", peer, err),
                }
            }
            received = framed.next() => {
                match received {
                    Some(Ok(bytes)) => match Frame::decode(&bytes) {
                        Ok(Frame::Envelope(envelope)) => {
                            if inbox.send(ManagerMessage::Receive { envelope }).await.is_err() {
                                break;
                            }
                        }
                        Ok(Frame::Hello(_)) => {
                            debug!("Ignoring repeated hello from {}", peer);
                        }
                        Err(err) => {
                            warn!("Dropping undecodable frame from {}: {}", peer, err);
                        }
                    },
                    Some(Err(err)) => {
                        debug!("Read error on session with {}: {}", peer, err);
                        break;
                    }
                    None => break, // socket closed
                }
            }
        }
    }
}
