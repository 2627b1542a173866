//! Orchestration: boot/join, iterative routing, the stabilization loop,
//! notify handling, key migration, and the client-facing file operations
//! the boundary adapter calls into. This is the one layer that touches both
//! `Transport` and `StorageBackend`.

use crate::config::Args;
use crate::error::{Error, Result};
use crate::identifier::{self, Id};
use crate::node_state::ChordNode;
use crate::peer::Peer;
use crate::storage::StorageBackend;
use crate::transport::Transport;
use bytes::Bytes;
use log::{debug, info, warn};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;

pub struct NodeService {
    id: Id,
    address: String,
    state: RwLock<ChordNode>,
    transport: Arc<dyn Transport>,
    storage: Arc<dyn StorageBackend>,
    bits: u32,
    max_hops: u32,
    stabilize_period: Duration,
    /// Set once this node has joined a ring (bootstrap counts as joined
    /// immediately). A second `join` attempt is `AlreadyBootstrapped`
    /// (spec §7: fatal, not recoverable like a transport error).
    joined: AtomicBool,
}

impl NodeService {
    pub fn new(
        self_id: Id,
        self_address: impl Into<String>,
        bits: u32,
        max_hops: u32,
        stabilize_period: Duration,
        transport: Arc<dyn Transport>,
        storage: Arc<dyn StorageBackend>,
    ) -> Self {
        let self_address = self_address.into();
        NodeService {
            id: self_id,
            address: self_address.clone(),
            state: RwLock::new(ChordNode::bootstrap(self_id, self_address, bits)),
            transport,
            storage,
            bits,
            max_hops,
            stabilize_period,
            joined: AtomicBool::new(false),
        }
    }

    /// Builds the service from parsed CLI/env configuration and brings it
    /// up: either alone (bootstrap mode) or by joining an existing ring.
    /// Returns the constructed, already-joined service; the caller is
    /// responsible for spawning `run_stabilization_loop`.
    pub async fn boot(
        args: &Args,
        transport: Arc<dyn Transport>,
        storage: Arc<dyn StorageBackend>,
    ) -> Result<Arc<Self>> {
        let self_address = args.self_address();
        let self_id = identifier::hash(self_address.as_bytes(), args.m);
        let service = Arc::new(NodeService::new(
            self_id,
            self_address.clone(),
            args.m,
            args.max_hops(),
            args.stabilize_period(),
            transport,
            storage,
        ));

        match args.bootstrap_address() {
            None => {
                info!("node {self_id} ({self_address}) bootstrapping alone");
                service.joined.store(true, Ordering::SeqCst);
            }
            Some(bootstrap_address) => {
                service.join_ring(&bootstrap_address).await?;
            }
        }

        Ok(service)
    }

    pub fn id(&self) -> Id {
        self.id
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn bits(&self) -> u32 {
        self.bits
    }

    // ---- §4.6.1 Boot and join ------------------------------------------------

    /// Explicit join entry point, for callers that already hold a
    /// constructed `NodeService` (tests wiring up several instances against
    /// an in-memory `Transport`) rather than going through `boot`.
    pub async fn join(&self, bootstrap_address: &str) -> Result<()> {
        self.join_ring(bootstrap_address).await
    }

    async fn join_ring(&self, bootstrap_address: &str) -> Result<()> {
        if self.joined.swap(true, Ordering::SeqCst) {
            return Err(Error::AlreadyBootstrapped);
        }
        let self_peer = Peer::new(self.id, self.address.clone());

        let successor = self.transport.join(bootstrap_address, &self_peer).await?;
        info!("joined via {bootstrap_address}, successor is {successor}");

        // Learn the successor's current predecessor before we displace it,
        // so we know exactly which keys are now ours to pull (spec §4.6.4).
        let old_pred = self.transport.get_predecessor(&successor.address).await?;
        let lo = old_pred.map(|p| p.id).unwrap_or(successor.id);

        {
            let mut node = self.state.write().await;
            node.set_successor(successor.clone());
            node.fingers.fill(successor.clone());
        }

        self.pull_migration(&successor.address, lo, self_peer.id).await?;

        self.transport.notify(&successor.address, &self_peer).await?;

        Ok(())
    }

    /// §4.6.4 puller side: fetch `(lo, hi]` from `from_address` and save it
    /// locally.
    async fn pull_migration(&self, from_address: &str, lo: Id, hi: Id) -> Result<()> {
        let files = self.transport.transfer_range(from_address, lo, hi).await?;
        let count = files.len();
        for (name, bytes) in files {
            self.storage.save(&name, bytes).await?;
        }
        if count > 0 {
            debug!("migrated {count} file(s) from {from_address} for ({lo}, {hi}]");
        }
        Ok(())
    }

    // ---- §4.6.2 Handling an inbound join request -----------------------------

    pub async fn handle_join(&self, joiner: Peer) -> Result<Peer> {
        let mut node = self.state.write().await;
        if node.successor.id == node.id {
            let previous_successor = node.as_peer();
            node.set_successor(joiner);
            return Ok(previous_successor);
        }
        if identifier::in_open(node.id, joiner.id, node.successor.id) {
            let previous_successor = node.successor.clone();
            node.set_successor(joiner);
            return Ok(previous_successor);
        }
        drop(node);
        self.find_successor(joiner.id).await
    }

    // ---- §4.6.3 Iterative find_successor --------------------------------------

    /// The single-hop computation both the local caller's first step and a
    /// remote peer's RPC handler perform: resolve as far as this node's own
    /// knowledge allows, without contacting anyone else.
    async fn local_hop(&self, key: Id) -> (Peer, bool) {
        let node = self.state.read().await;
        if node.is_responsible_for(key) {
            return (node.as_peer(), true);
        }
        if identifier::in_open(node.id, key, node.successor.id) || key == node.successor.id {
            return (node.successor.clone(), true);
        }
        let cursor = node.fingers.closest_preceding(node.id, key, &node.as_peer());
        if cursor.id == node.id {
            (node.successor.clone(), true)
        } else {
            (cursor, false)
        }
    }

    /// Handles a `find_successor` RPC from another node: exactly the
    /// single-hop computation, no loop (keeps failure handling local to the
    /// origin, per spec §4.6.3's rationale).
    pub async fn handle_find_successor_rpc(&self, key: Id, _requester: &str) -> Peer {
        self.local_hop(key).await.0
    }

    /// The origin's iterative routing loop.
    pub async fn find_successor(&self, key: Id) -> Result<Peer> {
        let (first, resolved) = self.local_hop(key).await;
        if resolved {
            return Ok(first);
        }

        let mut cursor = first;
        for hop in 0..self.max_hops {
            let r = self
                .transport
                .find_successor(&cursor.address, key, &self.address)
                .await?;
            debug!("find_successor({key}): hop {hop} -> {r}");
            if r.id == key || r.id == cursor.id {
                return Ok(r);
            }
            cursor = r;
        }
        warn!("find_successor({key}) exhausted {} hops", self.max_hops);
        Ok(cursor)
    }

    // ---- §4.6.6 Notify handling -----------------------------------------------

    pub async fn get_predecessor(&self) -> Option<Peer> {
        self.state.read().await.predecessor.clone()
    }

    /// Accepts or rejects a candidate predecessor. Per spec §4.6.6 (as
    /// corrected in the source text): migration is the new predecessor's
    /// responsibility against its successor, performed once at join time
    /// (`join_ring`/`pull_migration`) — this handler never initiates
    /// migration itself, only updates local state.
    pub async fn handle_notify(&self, candidate: Peer) -> bool {
        let mut node = self.state.write().await;
        node.notify(candidate)
    }

    // ---- §4.6.5 Stabilization loop ---------------------------------------------

    /// Runs a single stabilization cycle: successor check, notify, finger
    /// refresh. `run_stabilization_loop` calls this on a timer; exposed
    /// directly so callers driving several in-process nodes (tests) can
    /// advance convergence deterministically instead of waiting on a timer.
    pub async fn stabilize(&self) {
        let successor = self.state.read().await.successor.clone();
        if successor.id == self.id {
            return;
        }

        match self.transport.get_predecessor(&successor.address).await {
            Ok(Some(candidate)) => {
                let should_update = {
                    let node = self.state.read().await;
                    node.should_update_successor(&candidate)
                };
                if should_update {
                    info!("stabilize: adopting new successor {candidate}");
                    self.state.write().await.set_successor(candidate);
                }
            }
            Ok(None) => {}
            Err(e) => warn!("stabilize: get_predecessor({}) failed: {e}", successor.address),
        }

        let successor_address = self.state.read().await.successor.address.clone();
        let self_peer = Peer::new(self.id, self.address.clone());
        if let Err(e) = self.transport.notify(&successor_address, &self_peer).await {
            warn!("stabilize: notify({successor_address}) failed: {e}");
        }

        let targets = {
            let node = self.state.read().await;
            node.fingers.refresh_targets(node.id)
        };
        for (i, start) in targets {
            match self.find_successor(start).await {
                Ok(peer) => {
                    self.state.write().await.fingers.update(i, peer);
                }
                Err(e) => {
                    warn!("stabilize: refreshing finger {i} (start={start}) failed: {e}");
                }
            }
        }
    }

    /// Spawns the single long-lived background task. `spec.md` §9: "the
    /// only long-running task in the core"; cancellation on shutdown is
    /// simply dropping the returned handle / aborting it.
    pub fn run_stabilization_loop(self: Arc<Self>) -> JoinHandle<()> {
        let period = self.stabilize_period;
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            loop {
                interval.tick().await;
                self.stabilize().await;
            }
        })
    }

    // ---- §4.6.7 Client file operations ------------------------------------------

    pub async fn save_file(&self, name: &str, bytes: Bytes) -> Result<()> {
        let key = identifier::hash(name.as_bytes(), self.bits);
        let (responsible, owner_if_not) = self.responsibility_or_owner(key).await?;
        if responsible {
            self.storage.save(name, bytes).await
        } else {
            let owner = owner_if_not.expect("owner resolved when not responsible");
            self.transport.forward_file(&owner.address, name, bytes).await
        }
    }

    pub async fn get_file(&self, name: &str) -> Result<Bytes> {
        let key = identifier::hash(name.as_bytes(), self.bits);
        let (responsible, owner_if_not) = self.responsibility_or_owner(key).await?;
        if responsible {
            self.storage
                .get(name)
                .await?
                .ok_or_else(|| Error::NotFound(name.to_string()))
        } else {
            let owner = owner_if_not.expect("owner resolved when not responsible");
            self.transport
                .get_file(&owner.address, name)
                .await?
                .ok_or_else(|| Error::NotFound(name.to_string()))
        }
    }

    pub async fn delete_file(&self, name: &str) -> Result<bool> {
        let key = identifier::hash(name.as_bytes(), self.bits);
        let (responsible, owner_if_not) = self.responsibility_or_owner(key).await?;
        if responsible {
            self.storage.delete(name).await
        } else {
            let owner = owner_if_not.expect("owner resolved when not responsible");
            self.transport.delete_file(&owner.address, name).await
        }
    }

    pub async fn list_files(&self) -> Result<Vec<String>> {
        self.storage.list().await
    }

    /// Used by the `/files/forward` handler: the receiver of a forwarded
    /// file saves it directly, without re-checking responsibility (spec
    /// §4.6.7).
    pub async fn storage_save_direct(&self, name: &str, bytes: Bytes) -> Result<()> {
        self.storage.save(name, bytes).await
    }

    async fn responsibility_or_owner(&self, key: Id) -> Result<(bool, Option<Peer>)> {
        let responsible = self.state.read().await.is_responsible_for(key);
        if responsible {
            Ok((true, None))
        } else {
            Ok((false, Some(self.find_successor(key).await?)))
        }
    }

    // ---- internal RPC surface for migration / introspection --------------------

    pub async fn scan_range(&self, lo: Id, hi: Id) -> Result<Vec<(String, Bytes)>> {
        self.storage.scan_range(lo, hi, self.bits).await
    }

    pub async fn remove_transferred(&self, names: &[String]) -> Result<()> {
        for name in names {
            self.storage.delete(name).await?;
        }
        Ok(())
    }

    pub async fn info_snapshot(&self) -> NodeInfo {
        let node = self.state.read().await;
        NodeInfo {
            id: node.id,
            address: node.address.clone(),
            predecessor: node.predecessor.clone(),
            successor: node.successor.clone(),
            fingers: (1..=node.fingers.len())
                .map(|i| node.fingers.get(i).clone())
                .collect(),
        }
    }
}

#[derive(serde::Serialize)]
pub struct NodeInfo {
    pub id: Id,
    pub address: String,
    pub predecessor: Option<Peer>,
    pub successor: Peer,
    pub fingers: Vec<Peer>,
}
