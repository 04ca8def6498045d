use quic_entropy::{packet_entropy_hash, EntropyHash, SequenceNumber};
use rand::Rng;
use rand_chacha::ChaCha8Rng;
use sha2::{Digest, Sha256};

/// A packet as seen by the sender.
#[derive(Debug, Clone)]
pub struct Packet {
    pub sequence_number: SequenceNumber,
    pub payload: Vec<u8>,
    pub entropy_hash: EntropyHash,
    /// Whether the packet is lost before it reaches the peer.
    pub dropped: bool,
}

/// The entropy flag of a packet is the low bit of the SHA-256 of its
/// payload, which the peer cannot predict without the payload.
pub fn entropy_flag(payload: &[u8]) -> bool {
    Sha256::digest(payload)[0] & 1 == 1
}

pub struct LoadGenerator {
    rng: ChaCha8Rng,
    /// Probability that a sent packet is dropped.
    p_dropped: f64,
    payload_len: usize,
    /// The packet the peer will claim to have received even though it was
    /// dropped, if the peer is malicious.
    pub lied_about: Option<SequenceNumber>,

    /// The number of sent packets.
    pub num_sent: u64,
    /// The number of dropped packets.
    pub num_dropped: u64,
    /// The next sequence number to send.
    next: SequenceNumber,
}

impl LoadGenerator {
    /// Create a load generator that sends `num_sent` packets.
    ///
    /// Every packet except the last one is dropped with probability
    /// `p_dropped`, so the peer always observes the last packet. If the peer
    /// is `malicious`, one randomly chosen packet other than the last is
    /// always dropped and recorded in `lied_about`.
    pub fn new(
        mut rng: ChaCha8Rng,
        num_sent: u64,
        p_dropped: f64,
        payload_len: usize,
        malicious: bool,
    ) -> Self {
        assert!(num_sent >= 2, "need at least two packets");
        let lied_about = if malicious {
            Some(rng.gen_range(1..num_sent))
        } else {
            None
        };
        Self {
            rng,
            p_dropped,
            payload_len,
            lied_about,
            num_sent,
            num_dropped: 0,
            next: 1,
        }
    }

    /// A guess at the entropy of a packet whose payload is unknown.
    pub fn guess_entropy_hash(&mut self, sequence_number: SequenceNumber) -> EntropyHash {
        packet_entropy_hash(sequence_number, self.rng.gen())
    }
}

impl Iterator for LoadGenerator {
    type Item = Packet;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next > self.num_sent {
            return None;
        }
        let sequence_number = self.next;
        self.next += 1;

        let mut payload = vec![0; self.payload_len];
        self.rng.fill(&mut payload[..]);
        let entropy_hash = packet_entropy_hash(sequence_number, entropy_flag(&payload));
        let dropped = if Some(sequence_number) == self.lied_about {
            true
        } else if sequence_number == self.num_sent {
            false
        } else {
            self.rng.gen_bool(self.p_dropped)
        };
        if dropped {
            self.num_dropped += 1;
        }
        Some(Packet { sequence_number, payload, entropy_hash, dropped })
    }
}
