use std::collections::BTreeMap;

use log::{debug, error, warn};

use crate::ack::AckInfo;
use crate::digest::EntropyDigest;
use crate::error::{EntropyError, Result};
use crate::{EntropyHash, SequenceNumber, SequenceNumberSet};

/// Entropy of one sent packet.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct PacketEntropy {
    /// The hash attached to this packet.
    hash: EntropyHash,
    /// XOR of the hashes of every packet sent up to and including this one.
    cumulative: EntropyHash,
}

/// Records the entropy of every packet sent on a connection and validates
/// the cumulative entropy the peer reports in its ACK frames.
///
/// Packets must be recorded in increasing sequence number order. The
/// per-packet cumulative snapshots are only meaningful under that
/// assumption, so the manager logs but does not reject packets that break
/// it.
#[derive(Clone, Debug, Default)]
pub struct SentEntropyManager {
    /// Sent packets that may still be referenced by an ACK, keyed by
    /// sequence number.
    packets_entropy: BTreeMap<SequenceNumber, PacketEntropy>,
    /// Cumulative hash of every packet recorded so far, including packets
    /// whose records have been cleared.
    packets_entropy_hash: EntropyDigest,
}

impl SentEntropyManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of packets whose entropy is retained.
    pub fn len(&self) -> usize {
        self.packets_entropy.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packets_entropy.is_empty()
    }

    /// The largest retained sequence number, if any.
    pub fn largest_recorded(&self) -> Option<SequenceNumber> {
        self.packets_entropy.keys().next_back().copied()
    }

    /// Cumulative hash of all packets recorded so far.
    pub fn cumulative_entropy(&self) -> EntropyHash {
        self.packets_entropy_hash.value()
    }

    /// Record the entropy hash of a packet that was just sent.
    ///
    /// Must be called exactly once per packet. Recording the same sequence
    /// number twice XORs its hash in twice.
    pub fn record_packet_entropy_hash(
        &mut self,
        sequence_number: SequenceNumber,
        entropy_hash: EntropyHash,
    ) {
        if let Some(largest) = self.largest_recorded() {
            if sequence_number <= largest {
                warn!(
                    "recording entropy for packet {} out of order (largest {})",
                    sequence_number, largest,
                );
            }
        }
        self.packets_entropy_hash.add(entropy_hash);
        self.packets_entropy.insert(sequence_number, PacketEntropy {
            hash: entropy_hash,
            cumulative: self.packets_entropy_hash.value(),
        });
        debug!(
            "packet {} entropy {} cumulative {}",
            sequence_number,
            entropy_hash,
            self.packets_entropy_hash.value(),
        );
    }

    /// The cumulative entropy hash of all packets up to and including
    /// `sequence_number`.
    ///
    /// Packet 0 is never sent and has cumulative hash 0. Any other sequence
    /// number that has no record is a bug in the caller.
    pub fn entropy_hash(&self, sequence_number: SequenceNumber) -> Result<EntropyHash> {
        match self.packets_entropy.get(&sequence_number) {
            Some(entropy) => Ok(entropy.cumulative),
            None if sequence_number == 0 => Ok(0),
            None => {
                error!("no sent entropy recorded for packet {}", sequence_number);
                Err(EntropyError::NotFound(sequence_number))
            }
        }
    }

    /// Whether `entropy_hash` is the cumulative entropy of all packets up to
    /// `sequence_number` except `missing_packets`.
    ///
    /// A peer that acknowledges a packet it never received has to guess that
    /// packet's entropy, so a mismatch means the peer is lying about what it
    /// received. Missing packets that were never recorded, or that lie above
    /// `sequence_number`, also fail validation.
    pub fn is_valid_entropy(
        &self,
        sequence_number: SequenceNumber,
        missing_packets: &SequenceNumberSet,
        entropy_hash: EntropyHash,
    ) -> bool {
        let largest = match self.packets_entropy.get(&sequence_number) {
            Some(entropy) => entropy,
            None => {
                if sequence_number != 0 {
                    warn!("ack for unknown packet {}", sequence_number);
                }
                return sequence_number == 0;
            }
        };

        let mut expected = EntropyDigest::from_value(largest.cumulative);
        for &missing in missing_packets {
            if missing > sequence_number {
                warn!(
                    "missing packet {} is above largest observed {}",
                    missing, sequence_number,
                );
                return false;
            }
            match self.packets_entropy.get(&missing) {
                Some(entropy) => expected.remove(entropy.hash),
                None => {
                    warn!("missing packet {} has no sent entropy", missing);
                    return false;
                }
            }
        }

        if expected.value() != entropy_hash {
            warn!(
                "invalid entropy for packet {}: expected {} received {}",
                sequence_number,
                expected.value(),
                entropy_hash,
            );
            return false;
        }
        true
    }

    /// Validates the received info of an ACK frame.
    pub fn validate_ack(&self, ack: &AckInfo) -> bool {
        self.is_valid_entropy(ack.largest_observed, &ack.missing_packets, ack.entropy_hash)
    }

    /// Forget the entropy of every packet below `sequence_number`.
    pub fn clear_entropy_before(&mut self, sequence_number: SequenceNumber) {
        let before = self.packets_entropy.len();
        self.packets_entropy = self.packets_entropy.split_off(&sequence_number);
        debug!(
            "cleared {} entropy records before packet {}",
            before - self.packets_entropy.len(),
            sequence_number,
        );
    }
}
