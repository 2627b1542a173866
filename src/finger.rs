//! Per-node routing shortcuts. Slot `i` (1-indexed) is intended to be the
//! successor of `start_i = (self_id + 2^(i-1)) mod R`.

use crate::identifier::{self, Id};
use crate::peer::Peer;

pub struct FingerTable {
    bits: u32,
    slots: Vec<Peer>,
}

impl FingerTable {
    /// Builds an `M`-slot table, all slots pointing at `seed`.
    pub fn new(bits: u32, seed: Peer) -> Self {
        let slots = (0..bits).map(|_| seed.clone()).collect();
        FingerTable { bits, slots }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Sets every slot to `peer`. Used right after join as a seed.
    pub fn fill(&mut self, peer: Peer) {
        for slot in self.slots.iter_mut() {
            *slot = peer.clone();
        }
    }

    /// Overwrites slot `i` (1-indexed).
    pub fn update(&mut self, i: usize, peer: Peer) {
        self.slots[i - 1] = peer;
    }

    /// Reads slot `i` (1-indexed).
    pub fn get(&self, i: usize) -> &Peer {
        &self.slots[i - 1]
    }

    /// The `M` `(i, start_i)` pairs to resolve in a refresh pass.
    pub fn refresh_targets(&self, self_id: Id) -> Vec<(usize, Id)> {
        (1..=self.bits)
            .map(|i| {
                let offset = 1u64.checked_shl(i - 1).unwrap_or(0);
                let start = identifier::reduce(self_id.wrapping_add(offset), self.bits);
                (i as usize, start)
            })
            .collect()
    }

    /// Scans slots from `M` down to `1`, returning the first whose id lies
    /// strictly between `self_id` and `key` on the ring. Falls back to
    /// `fallback` (the caller's own peer) if none qualifies.
    pub fn closest_preceding(&self, self_id: Id, key: Id, fallback: &Peer) -> Peer {
        for slot in self.slots.iter().rev() {
            if identifier::in_open(self_id, slot.id, key) {
                return slot.clone();
            }
        }
        fallback.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn peer(id: Id) -> Peer {
        Peer::new(id, format!("127.0.0.1:{id}"))
    }

    #[test]
    fn fill_seeds_every_slot() {
        let mut ft = FingerTable::new(10, peer(1));
        ft.fill(peer(5));
        for i in 1..=10 {
            assert_eq!(ft.get(i).id, 5);
        }
    }

    #[test]
    fn refresh_targets_cover_all_powers_of_two() {
        let ft = FingerTable::new(10, peer(0));
        let targets = ft.refresh_targets(100);
        assert_eq!(targets.len(), 10);
        assert_eq!(targets[0], (1, 101));
        assert_eq!(targets[1], (2, 102));
        assert_eq!(targets[9], (10, (100 + 512) % 1024));
    }

    #[test]
    fn closest_preceding_picks_highest_qualifying_slot() {
        let mut ft = FingerTable::new(10, peer(100));
        ft.update(1, peer(150));
        ft.update(2, peer(300));
        ft.update(3, peer(700));
        let self_peer = peer(100);
        let result = ft.closest_preceding(100, 750, &self_peer);
        assert_eq!(result.id, 700);
    }

    #[test]
    fn closest_preceding_falls_back_to_self() {
        let ft = FingerTable::new(10, peer(100));
        let self_peer = peer(100);
        let result = ft.closest_preceding(100, 50, &self_peer);
        assert_eq!(result.id, 100);
    }
}
