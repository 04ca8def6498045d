use crate::{EntropyHash, SequenceNumber};

/// Digest that is the bit-XOR of a collection of entropy hashes.
///
/// This is not a multiset hash: adding the same hash twice cancels it out,
/// which is exactly what lets a sender "subtract" packets a peer reports as
/// missing.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct EntropyDigest {
    hash: EntropyHash,
}

impl EntropyDigest {
    pub fn new() -> Self {
        Self { hash: 0 }
    }

    /// Starts a digest from an already accumulated value.
    pub fn from_value(hash: EntropyHash) -> Self {
        Self { hash }
    }

    /// Adds an entropy hash to the digest.
    pub fn add(&mut self, elem: EntropyHash) {
        self.hash ^= elem;
    }

    /// Adds multiple entropy hashes to the digest.
    pub fn add_all(&mut self, elems: &[EntropyHash]) {
        for &elem in elems {
            self.add(elem)
        }
    }

    /// Removes an entropy hash that was previously added.
    pub fn remove(&mut self, elem: EntropyHash) {
        self.add(elem)
    }

    /// Returns the digest value.
    pub fn value(&self) -> EntropyHash {
        self.hash
    }
}

/// The entropy hash a sender attaches to a packet.
///
/// Only one pseudo-random bit per packet carries entropy. Shifting it by the
/// sequence number spreads consecutive packets over the whole byte so that
/// the cumulative hash is not just a parity bit.
pub fn packet_entropy_hash(sequence_number: SequenceNumber, entropy_flag: bool) -> EntropyHash {
    (entropy_flag as EntropyHash) << (sequence_number % 8)
}

#[cfg(test)]
mod tests {
    use rand;
    use rand::Rng;
    use rand::seq::SliceRandom;
    use super::*;

    fn gen_hashes(n: usize) -> Vec<EntropyHash> {
        let mut rng = rand::thread_rng();
        (0..n).map(|_| rng.gen()).collect()
    }

    #[test]
    fn empty_digest_is_zero() {
        assert_eq!(EntropyDigest::new().value(), 0);
        assert_eq!(EntropyDigest::default(), EntropyDigest::new());
    }

    #[test]
    fn element_order_does_not_matter() {
        let set_a = gen_hashes(32);
        let set_b = {
            let mut set = set_a.clone();
            set.shuffle(&mut rand::thread_rng());
            set
        };

        let mut digest_a = EntropyDigest::new();
        let mut digest_b = EntropyDigest::new();
        digest_a.add_all(&set_a);
        digest_b.add_all(&set_b);
        assert_eq!(digest_a.value(), digest_b.value());
    }

    #[test]
    fn remove_undoes_add() {
        let hashes = gen_hashes(10);
        let mut digest = EntropyDigest::new();
        digest.add_all(&hashes);
        let before = digest.value();
        digest.add(0x5a);
        digest.remove(0x5a);
        assert_eq!(digest.value(), before);
        for &h in hashes.iter().rev() {
            digest.remove(h);
        }
        assert_eq!(digest, EntropyDigest::new());
    }

    #[test]
    fn from_value_continues_accumulating() {
        let mut digest = EntropyDigest::from_value(12);
        digest.add(1);
        assert_eq!(digest.value(), 13);
    }

    #[test]
    fn packet_entropy_hash_shifts_by_sequence_number() {
        assert_eq!(packet_entropy_hash(0, true), 1);
        assert_eq!(packet_entropy_hash(3, true), 8);
        assert_eq!(packet_entropy_hash(7, true), 128);
        assert_eq!(packet_entropy_hash(8, true), 1);
        assert_eq!(packet_entropy_hash(13, true), 32);
        for seq in 0..64 {
            assert_eq!(packet_entropy_hash(seq, false), 0);
        }
    }
}
