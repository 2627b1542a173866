//! Ring identifier arithmetic: hashing and circular between-ness.
//!
//! Pure functions only — no I/O, no shared state. `hash` must be identical
//! across every node and client deriving the same key, which is why it's
//! plain SHA-1 rather than a process-seeded hasher.

use sha1::{Digest, Sha1};

/// An identifier in `[0, R)` where `R = 2^bits`.
pub type Id = u64;

/// Hashes `bytes` into `[0, 2^bits)` via SHA-1, reading the digest's first 8
/// bytes as a big-endian integer and reducing modulo the ring size.
///
/// `bits` must be `<= 64`; the reference configuration uses 10.
pub fn hash(bytes: &[u8], bits: u32) -> Id {
    let digest = Sha1::digest(bytes);
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&digest[..8]);
    let value = u64::from_be_bytes(buf);
    reduce(value, bits)
}

/// Reduces an arbitrary integer into `[0, 2^bits)`.
pub fn reduce(value: u64, bits: u32) -> Id {
    if bits >= 64 {
        value
    } else {
        value % (1u64 << bits)
    }
}

/// True iff walking clockwise from `a` (excluded) one reaches `k` strictly
/// before `b` (excluded). `a == b` means the whole ring, true for all `k !=
/// a`.
pub fn in_open(a: Id, k: Id, b: Id) -> bool {
    if a == b {
        k != a
    } else if a < b {
        a < k && k < b
    } else {
        k > a || k < b
    }
}

/// `in_open` with the upper bound included.
pub fn in_half_open(a: Id, k: Id, b: Id) -> bool {
    k == b || in_open(a, k, b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_is_deterministic() {
        let a = hash(b"foo.txt", 10);
        let b = hash(b"foo.txt", 10);
        assert_eq!(a, b);
        assert!(a < 1024);
    }

    #[test]
    fn hash_differs_across_inputs_almost_always() {
        assert_ne!(hash(b"foo.txt", 10), hash(b"bar.txt", 10));
    }

    #[test]
    fn in_open_handles_non_wrapping_interval() {
        assert!(in_open(100, 200, 400));
        assert!(!in_open(100, 100, 400));
        assert!(!in_open(100, 400, 400));
        assert!(!in_open(100, 50, 400));
    }

    #[test]
    fn in_open_handles_wrapping_interval() {
        assert!(in_open(800, 900, 100));
        assert!(in_open(800, 50, 100));
        assert!(!in_open(800, 100, 100));
        assert!(!in_open(800, 400, 100));
    }

    #[test]
    fn in_open_full_ring_when_endpoints_equal() {
        for k in [0, 1, 500, 1023] {
            if k == 100 {
                assert!(!in_open(100, k, 100));
            } else {
                assert!(in_open(100, k, 100));
            }
        }
    }

    #[test]
    fn in_half_open_includes_upper_bound() {
        assert!(in_half_open(100, 400, 400));
        assert!(!in_half_open(100, 100, 400));
        assert!(in_half_open(100, 200, 400));
    }

    #[test]
    fn exactly_one_side_holds_for_distinct_endpoints() {
        let (a, b) = (100u64, 400u64);
        for k in 0..1024u64 {
            let fwd = in_open(a, k, b);
            let bwd = in_open(b, k, a) || k == a || k == b;
            assert!(fwd ^ bwd, "k={k} fwd={fwd} bwd={bwd}");
        }
    }
}
