//! In-process transport used by the multi-node tests.
//!
//! Mirrors the TCP flow without sockets: `connect` looks the target up in
//! a shared registry, exchanges the same `Connected` signals a real
//! handshake produces, and pumps envelopes straight into the target
//! manager's inbox. Unregistering a node makes future dials to it fail,
//! which is how tests simulate an unreachable peer.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

use super::{ConnectError, Connector, PeerLink};
use crate::manager::protocol::{InboxSender, ManagerMessage};
use crate::manager::service::ManagerHandle;
use crate::membership::types::{Peer, PeerName};
use crate::transport::wire::Hello;

#[derive(Default)]
pub struct TestHub {
    nodes: Mutex<HashMap<PeerName, ManagerHandle>>,
}

impl TestHub {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn register(&self, handle: ManagerHandle) {
        let name = handle.local_peer().name.clone();
        self.nodes.lock().unwrap().insert(name, handle);
    }

    /// Makes future dials to `name` fail, as if the node went dark.
    pub fn unregister(&self, name: &PeerName) {
        self.nodes.lock().unwrap().remove(name);
    }

    fn lookup(&self, name: &PeerName) -> Option<ManagerHandle> {
        self.nodes.lock().unwrap().get(name).cloned()
    }
}

#[derive(Clone)]
pub struct HubConnector {
    hub: Arc<TestHub>,
}

impl HubConnector {
    pub fn new(hub: Arc<TestHub>) -> Self {
        Self { hub }
    }
}

impl Connector for HubConnector {
    async fn connect(
        &self,
        peer: &Peer,
        hello: Hello,
        inbox: InboxSender,
    ) -> Result<PeerLink, ConnectError> {
        let target = self
            .hub
            .lookup(&peer.name)
            .ok_or_else(|| ConnectError::Unreachable(peer.name.to_string()))?;

        let (tx, mut rx) = mpsc::channel(16);
        let peer_name = peer.name.clone();

        // The handshake happens off the caller's task, exactly like a real
        // session: both sides hear Connected once the exchange completes.
        tokio::spawn(async move {
            let accept_side = ManagerMessage::Connected {
                peer: hello.peer,
                snapshot: hello.state,
            };
            let _ = target.inbox().send(accept_side).await;

            if let Ok(state) = target.local_state().await {
                let dial_side = ManagerMessage::Connected {
                    peer: target.local_peer().clone(),
                    snapshot: state,
                };
                let _ = inbox.send(dial_side).await;
            }

            while let Some(envelope) = rx.recv().await {
                if target
                    .inbox()
                    .send(ManagerMessage::Receive { envelope })
                    .await
                    .is_err()
                {
                    break;
                }
            }

            let _ = inbox
                .send(ManagerMessage::SessionClosed { name: peer_name })
                .await;
        });

        Ok(PeerLink::new(tx))
    }
}
