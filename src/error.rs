use thiserror::Error;

use crate::SequenceNumber;

pub type Result<T> = std::result::Result<T, EntropyError>;

/// Errors returned by entropy lookups and ACK encoding.
///
/// An entropy mismatch reported by a peer is not an error: validation
/// returns `false` and the connection decides what to do about it.
#[derive(Debug, Error)]
pub enum EntropyError {
    /// No entropy was ever recorded for this sequence number, or it has
    /// already been cleared from the sent history.
    #[error("no entropy recorded for packet {0}")]
    NotFound(SequenceNumber),

    /// The packet is beyond the largest sequence number observed so far.
    #[error("packet {requested} is beyond the largest observed packet {largest_observed}")]
    NotObserved {
        requested: SequenceNumber,
        largest_observed: SequenceNumber,
    },

    /// The cumulative entropy at this packet was collapsed by a
    /// STOP_WAITING update and can no longer be computed.
    #[error("entropy for packet {requested} was collapsed below packet {first_gap}")]
    Pruned {
        requested: SequenceNumber,
        first_gap: SequenceNumber,
    },

    #[error("ack codec error: {0}")]
    Codec(#[from] bincode::Error),
}
