use rand::rngs::StdRng;
use std::collections::HashMap;
use tokio::sync::{broadcast, mpsc, oneshot};
use tracing::{debug, info, warn};

use super::protocol::{Envelope, InboxSender, ManagerMessage, MembershipChange, SendError};
use crate::config::ClusterConfig;
use crate::connection::table::{ConnectionEntry, ConnectionTable};
use crate::gossip;
use crate::membership::orset::Membership;
use crate::membership::types::{Actor, Peer, PeerName};
use crate::persistence::store::StateStore;
use crate::transport::Connector;
use crate::transport::wire::Hello;

/// Client side of the manager: a cloneable handle whose methods are
/// request/reply messages on the manager's inbox. Callers observe their
/// own operations in issue order because the loop is single-writer.
#[derive(Debug, Clone)]
pub struct ManagerHandle {
    local: Peer,
    tx: InboxSender,
    events: broadcast::Sender<MembershipChange>,
}

impl ManagerHandle {
    /// Descriptor this node advertises to peers.
    pub fn local_peer(&self) -> &Peer {
        &self.local
    }

    /// A sender feeding the manager's inbox, for transport sessions.
    pub fn inbox(&self) -> InboxSender {
        self.tx.clone()
    }

    /// Stream of membership-change events, one per mutation.
    pub fn subscribe(&self) -> broadcast::Receiver<MembershipChange> {
        self.events.subscribe()
    }

    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> ManagerMessage,
    ) -> Result<T, SendError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(build(reply))
            .await
            .map_err(|_| SendError::ManagerStopped)?;
        rx.await.map_err(|_| SendError::ManagerStopped)
    }

    /// Names of the peers currently in the membership view, self included.
    pub async fn members(&self) -> Result<Vec<PeerName>, SendError> {
        self.request(|reply| ManagerMessage::Members { reply }).await
    }

    /// Encoded snapshot of the local membership CRDT.
    pub async fn local_state(&self) -> Result<Vec<u8>, SendError> {
        self.request(|reply| ManagerMessage::LocalState { reply })
            .await
    }

    /// This node's CRDT replica identifier.
    pub async fn actor(&self) -> Result<Actor, SendError> {
        self.request(|reply| ManagerMessage::GetActor { reply })
            .await
    }

    /// Starts joining `peer`: it becomes pending and a connection attempt
    /// is made. Membership changes once the handshake confirms.
    pub async fn join(&self, peer: Peer) -> Result<(), SendError> {
        self.request(|reply| ManagerMessage::Join { peer, reply })
            .await
    }

    /// Leaves the cluster and stops the manager. The removal is gossiped
    /// and the persisted state deleted before this returns.
    pub async fn leave(&self) -> Result<(), SendError> {
        self.request(|reply| ManagerMessage::Leave { reply }).await
    }

    /// Merges an encoded snapshot into the local membership.
    pub async fn update_state(&self, snapshot: Vec<u8>) -> Result<(), SendError> {
        self.request(|reply| ManagerMessage::UpdateState { snapshot, reply })
            .await
    }

    /// Removes the persisted state file; the in-memory view is untouched.
    pub async fn delete_state(&self) -> Result<(), SendError> {
        self.request(|reply| ManagerMessage::DeleteState { reply })
            .await
    }

    /// Dispatches an envelope to the named peer's connection.
    pub async fn send_message(&self, name: PeerName, envelope: Envelope) -> Result<(), SendError> {
        self.request(|reply| ManagerMessage::SendMessage {
            name,
            envelope,
            reply,
        })
        .await?
    }

    /// Asks the named peer to deliver `payload` to its local handler
    /// registered under `target`.
    pub async fn forward_message(
        &self,
        name: PeerName,
        target: impl Into<String>,
        payload: Vec<u8>,
    ) -> Result<(), SendError> {
        let target = target.into();
        self.request(|reply| ManagerMessage::ForwardMessage {
            name,
            target,
            payload,
            reply,
        })
        .await?
    }

    /// Registers a local delivery channel for inbound forwards addressed
    /// to `target`.
    pub async fn register(
        &self,
        target: impl Into<String>,
        sender: mpsc::Sender<Vec<u8>>,
    ) -> Result<(), SendError> {
        let target = target.into();
        self.request(|reply| ManagerMessage::Register {
            target,
            sender,
            reply,
        })
        .await
    }

    /// Hands an inbound envelope to the manager, as a peer session would.
    pub async fn receive_message(&self, envelope: Envelope) -> Result<(), SendError> {
        self.tx
            .send(ManagerMessage::Receive { envelope })
            .await
            .map_err(|_| SendError::ManagerStopped)
    }
}

/// The manager actor: sole owner of the membership CRDT, the pending-join
/// list and the connection table. Every operation funnels through its
/// inbox and is handled to completion before the next one, so no state
/// here is ever shared or locked.
pub struct ClusterManager<C: Connector> {
    actor: Actor,
    local: Peer,
    membership: Membership,
    pending: Vec<Peer>,
    connections: ConnectionTable,
    handlers: HashMap<String, mpsc::Sender<Vec<u8>>>,
    store: StateStore,
    connector: C,
    events: broadcast::Sender<MembershipChange>,
    rng: StdRng,
    inbox: InboxSender,
    config: ClusterConfig,
}

impl<C: Connector> ClusterManager<C> {
    /// Creates the manager state, seeds or loads the membership, and
    /// spawns the event loop. The returned handle is the only way in.
    pub fn spawn(config: ClusterConfig, connector: C) -> ManagerHandle {
        let local = Peer::new(config.name.clone(), config.peer_ip, config.peer_port);
        let actor = Actor::generate(&local.name);
        let store = StateStore::new(config.data_dir.as_deref());

        let membership = match store.load() {
            Some(loaded) => {
                info!(
                    "Restored cluster state with {} member(s) for {}",
                    loaded.len(),
                    local.name
                );
                loaded
            }
            None => {
                let mut fresh = Membership::new();
                fresh.add(local.clone(), &actor);
                if let Err(err) = store.save(&fresh) {
                    warn!("Failed to persist initial cluster state: {}", err);
                }
                fresh
            }
        };

        let (tx, rx) = mpsc::channel(config.inbox_capacity);
        let (events, _) = broadcast::channel(config.event_capacity);
        let rng = gossip::seeded_rng(&local.name);

        let manager = Self {
            actor,
            local: local.clone(),
            membership,
            pending: Vec::new(),
            connections: ConnectionTable::new(),
            handlers: HashMap::new(),
            store,
            connector,
            events: events.clone(),
            rng,
            inbox: tx.clone(),
            config,
        };
        tokio::spawn(manager.run(rx));

        ManagerHandle { local, tx, events }
    }

    async fn run(mut self, mut rx: mpsc::Receiver<ManagerMessage>) {
        info!(
            "Peer manager for {} started ({:?})",
            self.local.name, self.actor
        );
        gossip::schedule_tick(self.inbox.clone(), self.config.gossip_interval);

        while let Some(message) = rx.recv().await {
            match message {
                ManagerMessage::Members { reply } => {
                    let _ = reply.send(self.membership.names());
                }
                ManagerMessage::LocalState { reply } => {
                    let _ = reply.send(self.membership.encode());
                }
                ManagerMessage::GetActor { reply } => {
                    let _ = reply.send(self.actor);
                }
                ManagerMessage::Join { peer, reply } => {
                    self.handle_join(peer).await;
                    let _ = reply.send(());
                }
                ManagerMessage::Leave { reply } => {
                    self.handle_leave();
                    let _ = reply.send(());
                    break;
                }
                ManagerMessage::UpdateState { snapshot, reply } => {
                    self.handle_update_state(&snapshot).await;
                    let _ = reply.send(());
                }
                ManagerMessage::DeleteState { reply } => {
                    if let Err(err) = self.store.delete() {
                        warn!("Failed to delete cluster state: {}", err);
                    }
                    let _ = reply.send(());
                }
                ManagerMessage::SendMessage {
                    name,
                    envelope,
                    reply,
                } => {
                    let _ = reply.send(self.dispatch(&name, envelope));
                }
                ManagerMessage::ForwardMessage {
                    name,
                    target,
                    payload,
                    reply,
                } => {
                    let envelope = Envelope::Forward { target, payload };
                    let _ = reply.send(self.dispatch(&name, envelope));
                }
                ManagerMessage::Register {
                    target,
                    sender,
                    reply,
                } => {
                    self.handlers.insert(target, sender);
                    let _ = reply.send(());
                }
                ManagerMessage::Receive { envelope } => {
                    self.handle_receive(envelope).await;
                }
                ManagerMessage::Connected { peer, snapshot } => {
                    self.handle_connected(peer, &snapshot).await;
                }
                ManagerMessage::SessionClosed { name } => {
                    debug!("Session with {} terminated", name);
                    self.connections.remove(&name);
                }
                ManagerMessage::GossipTick => {
                    self.establish_connections().await;
                    self.push_state();
                    gossip::schedule_tick(self.inbox.clone(), self.config.gossip_interval);
                }
            }
        }

        info!("Peer manager for {} stopped", self.local.name);
    }

    // ------------------------------------------------------------------
    // Request handlers
    // ------------------------------------------------------------------

    async fn handle_join(&mut self, peer: Peer) {
        if peer.name == self.local.name {
            debug!("Ignoring join of the local node");
            return;
        }

        info!("Joining peer {} at {}:{}", peer.name, peer.addr, peer.port);
        self.pending.push(peer);
        self.establish_connections().await;
    }

    fn handle_leave(&mut self) {
        let name = self.local.name.clone();
        self.membership.remove(&name);
        self.publish();
        self.push_state();
        if let Err(err) = self.store.delete() {
            warn!("Failed to delete cluster state on leave: {}", err);
        }
        info!("Node {} left the cluster", name);
    }

    async fn handle_update_state(&mut self, snapshot: &[u8]) {
        match Membership::decode(snapshot) {
            Ok(remote) => {
                self.membership.merge(&remote);
                self.persist();
                self.publish();
                self.establish_connections().await;
            }
            Err(err) => warn!("Ignoring undecodable state update: {}", err),
        }
    }

    // ------------------------------------------------------------------
    // Event handlers
    // ------------------------------------------------------------------

    /// A handshake with `peer` completed. Only a confirmation of a local
    /// `join` mutates state: the pending entry is consumed and the remote
    /// snapshot merged. Connections to peers learned from the merge are
    /// established against the merged view, not the one before it.
    async fn handle_connected(&mut self, peer: Peer, snapshot: &[u8]) {
        let Some(position) = self.pending.iter().position(|p| p.name == peer.name) else {
            debug!("Connection from {} confirmed (not pending)", peer.name);
            return;
        };
        self.pending.remove(position);

        match Membership::decode(snapshot) {
            Ok(remote) => {
                info!("Peer {} joined; merging its view", peer.name);
                self.membership.merge(&remote);
                self.persist();
                self.publish();
                self.establish_connections().await;
                self.push_state();
            }
            Err(err) => {
                warn!("Dropping undecodable snapshot from {}: {}", peer.name, err);
            }
        }
    }

    async fn handle_receive(&mut self, envelope: Envelope) {
        match envelope {
            Envelope::ReceiveState(snapshot) => match Membership::decode(&snapshot) {
                Ok(remote) if remote == self.membership => {
                    debug!("Gossiped state already converged");
                }
                Ok(remote) => {
                    self.membership.merge(&remote);
                    self.persist();
                    self.publish();
                    self.establish_connections().await;
                    self.push_state();
                }
                Err(err) => warn!("Dropping undecodable gossip snapshot: {}", err),
            },
            Envelope::Forward { target, payload } => {
                match self.handlers.get(&target) {
                    // Fire-and-forget: a full or closed handler queue is
                    // the receiver's problem, not the sender's.
                    Some(sender) => {
                        if sender.try_send(payload).is_err() {
                            debug!("Dropped forwarded message for {}", target);
                        }
                    }
                    None => debug!("No handler registered for {}", target),
                }
            }
        }
    }

    // ------------------------------------------------------------------
    // Connection management
    // ------------------------------------------------------------------

    /// Realizes the table invariant: every peer in membership ∪ pending,
    /// except the local node, gets exactly one entry. Absent or
    /// disconnected peers get one bounded dial attempt; live connections
    /// are never re-dialed. Entries for forgotten peers are pruned.
    async fn establish_connections(&mut self) {
        let mut candidates = self.membership.value();
        for pending in &self.pending {
            if !candidates.contains(pending) {
                candidates.push(pending.clone());
            }
        }
        candidates.retain(|peer| peer.name != self.local.name);

        self.connections
            .retain_names(|name| candidates.iter().any(|peer| &peer.name == name));

        for peer in candidates {
            let must_dial = match self.connections.get(&peer.name) {
                None | Some(ConnectionEntry::Disconnected) => true,
                Some(ConnectionEntry::Connected(_)) => false,
            };
            if !must_dial {
                continue;
            }

            let hello = Hello {
                peer: self.local.clone(),
                state: self.membership.encode(),
            };
            match self
                .connector
                .connect(&peer, hello, self.inbox.clone())
                .await
            {
                Ok(link) => {
                    debug!("Connected to {}", peer.name);
                    self.connections.insert_connected(peer.name.clone(), link);
                }
                Err(err) => {
                    debug!("Connection to {} failed: {}", peer.name, err);
                    self.connections.mark_disconnected(peer.name.clone());
                }
            }
        }
    }

    fn dispatch(&self, name: &PeerName, envelope: Envelope) -> Result<(), SendError> {
        match self.connections.get(name) {
            None => Err(SendError::NotYetConnected(name.clone())),
            Some(ConnectionEntry::Disconnected) => Err(SendError::Disconnected(name.clone())),
            Some(ConnectionEntry::Connected(link)) => link
                .send(envelope)
                .map_err(|_| SendError::Disconnected(name.clone())),
        }
    }

    // ------------------------------------------------------------------
    // Gossip
    // ------------------------------------------------------------------

    /// Pushes the full local snapshot to `fanout` random peers. Failed
    /// dispatches are not retried; the next tick repairs them.
    fn push_state(&mut self) {
        let mut peers = self.membership.value();
        peers.retain(|peer| peer.name != self.local.name);
        let selected = gossip::select_peers(&mut self.rng, peers, self.config.fanout);
        if selected.is_empty() {
            return;
        }

        let snapshot = self.membership.encode();
        for peer in selected {
            match self.connections.connected_link(&peer.name) {
                Some(link) => {
                    if link.send(Envelope::ReceiveState(snapshot.clone())).is_err() {
                        debug!("Gossip to {} not delivered", peer.name);
                    }
                }
                None => debug!("No live connection to {} for gossip", peer.name),
            }
        }
    }

    // ------------------------------------------------------------------
    // Shared plumbing
    // ------------------------------------------------------------------

    fn persist(&self) {
        if let Err(err) = self.store.save(&self.membership) {
            warn!("Failed to persist cluster state: {}", err);
        }
    }

    fn publish(&self) {
        let _ = self.events.send(MembershipChange {
            members: self.membership.value(),
        });
    }
}
