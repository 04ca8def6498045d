use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::{EntropyHash, SequenceNumber, SequenceNumberSet};

/// The received-packet information a peer reports in an ACK frame.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AckInfo {
    /// The largest sequence number the peer has received.
    pub largest_observed: SequenceNumber,
    /// Packets up to `largest_observed` the peer has not received.
    pub missing_packets: SequenceNumberSet,
    /// Cumulative entropy of every packet up to `largest_observed` that the
    /// peer has received.
    pub entropy_hash: EntropyHash,
}

impl AckInfo {
    /// An ACK that claims every packet up to `largest_observed`.
    pub fn new(largest_observed: SequenceNumber, entropy_hash: EntropyHash) -> Self {
        Self {
            largest_observed,
            missing_packets: SequenceNumberSet::new(),
            entropy_hash,
        }
    }

    /// Report a packet as missing, removing its entropy from the hash.
    pub fn nack(&mut self, sequence_number: SequenceNumber, entropy_hash: EntropyHash) {
        if self.missing_packets.insert(sequence_number) {
            self.entropy_hash ^= entropy_hash;
        }
    }

    /// Report a previously missing packet as received, adding its entropy
    /// back to the hash.
    pub fn ack(&mut self, sequence_number: SequenceNumber, entropy_hash: EntropyHash) {
        if self.missing_packets.remove(&sequence_number) {
            self.entropy_hash ^= entropy_hash;
        }
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Ok(bincode::deserialize(bytes)?)
    }
}
