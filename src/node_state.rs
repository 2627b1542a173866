//! Pure Chord state machine: `(self_id, predecessor, successor, fingers)`.
//! No I/O — every method here is synchronous and side-effect-free beyond
//! mutating its own fields. `NodeService` is the layer that wraps this in a
//! lock and performs the I/O that triggers these transitions.

use crate::finger::FingerTable;
use crate::identifier::{self, Id};
use crate::peer::Peer;

pub struct ChordNode {
    pub id: Id,
    pub address: String,
    pub bits: u32,
    pub predecessor: Option<Peer>,
    pub successor: Peer,
    pub fingers: FingerTable,
}

impl ChordNode {
    /// Constructs a node that is, for now, alone on the ring: `successor =
    /// self`, no predecessor, every finger pointing at self.
    pub fn bootstrap(id: Id, address: impl Into<String>, bits: u32) -> Self {
        let address = address.into();
        let me = Peer::new(id, address.clone());
        ChordNode {
            id,
            address,
            bits,
            predecessor: None,
            successor: me.clone(),
            fingers: FingerTable::new(bits, me),
        }
    }

    pub fn as_peer(&self) -> Peer {
        Peer::new(self.id, self.address.clone())
    }

    fn is_self(&self, peer: &Peer) -> bool {
        peer.id == self.id
    }

    /// True iff this node currently claims responsibility for `key`.
    pub fn is_responsible_for(&self, key: Id) -> bool {
        match &self.predecessor {
            None => self.successor.id == self.id,
            Some(pred) => identifier::in_half_open(pred.id, key, self.id),
        }
    }

    /// True iff `candidate` is strictly between us and our current
    /// successor — i.e. it should replace the successor.
    pub fn should_update_successor(&self, candidate: &Peer) -> bool {
        !self.is_self(candidate) && identifier::in_open(self.id, candidate.id, self.successor.id)
    }

    /// Accepts `candidate` as predecessor iff none is set or it lies
    /// strictly between our current predecessor and us. Returns whether the
    /// predecessor changed, so the caller can trigger key migration.
    pub fn notify(&mut self, candidate: Peer) -> bool {
        let accept = match &self.predecessor {
            None => true,
            Some(pred) => identifier::in_open(pred.id, candidate.id, self.id),
        };
        if !accept {
            return false;
        }
        let changed = self.predecessor.as_ref() != Some(&candidate);
        self.predecessor = Some(candidate);
        changed
    }

    pub fn set_successor(&mut self, peer: Peer) {
        self.successor = peer;
    }

    pub fn set_predecessor(&mut self, peer: Peer) {
        self.predecessor = Some(peer);
    }

    pub fn clear_predecessor(&mut self) {
        self.predecessor = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn peer(id: u64) -> Peer {
        Peer::new(id, format!("127.0.0.1:{id}"))
    }

    #[test]
    fn alone_node_claims_whole_ring() {
        let node = ChordNode::bootstrap(100, "127.0.0.1:100", 10);
        assert!(node.is_responsible_for(0));
        assert!(node.is_responsible_for(900));
        assert!(node.is_responsible_for(100));
    }

    #[test]
    fn node_without_predecessor_but_with_foreign_successor_defers() {
        let mut node = ChordNode::bootstrap(100, "127.0.0.1:100", 10);
        node.set_successor(peer(400));
        assert!(!node.is_responsible_for(50));
        assert!(!node.is_responsible_for(100));
    }

    #[test]
    fn responsibility_is_half_open_on_self() {
        let mut node = ChordNode::bootstrap(400, "127.0.0.1:400", 10);
        node.set_predecessor(peer(100));
        assert!(!node.is_responsible_for(100));
        assert!(node.is_responsible_for(101));
        assert!(node.is_responsible_for(400));
        assert!(!node.is_responsible_for(401));
    }

    #[test]
    fn should_update_successor_only_for_strictly_closer_candidate() {
        let mut node = ChordNode::bootstrap(100, "127.0.0.1:100", 10);
        node.set_successor(peer(800));
        assert!(node.should_update_successor(&peer(400)));
        assert!(!node.should_update_successor(&peer(900)));
        assert!(!node.should_update_successor(&peer(100)));
    }

    #[test]
    fn notify_accepts_first_candidate_unconditionally() {
        let mut node = ChordNode::bootstrap(400, "127.0.0.1:400", 10);
        let changed = node.notify(peer(100));
        assert!(changed);
        assert_eq!(node.predecessor.unwrap().id, 100);
    }

    #[test]
    fn notify_is_idempotent() {
        let mut node = ChordNode::bootstrap(400, "127.0.0.1:400", 10);
        assert!(node.notify(peer(100)));
        assert!(!node.notify(peer(100)));
        assert_eq!(node.predecessor.unwrap().id, 100);
    }

    #[test]
    fn notify_rejects_candidate_outside_interval() {
        let mut node = ChordNode::bootstrap(400, "127.0.0.1:400", 10);
        assert!(node.notify(peer(300)));
        assert!(!node.notify(peer(200)));
        assert_eq!(node.predecessor.unwrap().id, 300);
    }
}
