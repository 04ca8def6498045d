use std::collections::VecDeque;

use log::{debug, warn};

use crate::ack::AckInfo;
use crate::digest::EntropyDigest;
use crate::error::{EntropyError, Result};
use crate::{EntropyHash, SequenceNumber, SequenceNumberSet};

/// Accumulates the entropy of packets received from the peer, producing the
/// entropy hash we report in our own ACK frames.
///
/// Only the window from the first missing packet to the largest observed
/// packet is kept per packet. Everything below the first gap is folded into
/// the cumulative hash. The window is bounded: a packet that would grow it
/// past `max_window` slots is ignored.
#[derive(Clone, Debug)]
pub struct ReceivedEntropyTracker {
    /// One slot per packet in `first_gap..=largest_observed`, `None` if the
    /// packet has not been received.
    packets_entropy: VecDeque<Option<EntropyHash>>,
    /// Cumulative hash of the received packets up to `largest_observed`.
    packets_entropy_hash: EntropyDigest,
    /// The smallest sequence number that is neither received nor covered by
    /// a STOP_WAITING update.
    first_gap: SequenceNumber,
    largest_observed: SequenceNumber,
    max_window: usize,
}

impl Default for ReceivedEntropyTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl ReceivedEntropyTracker {
    /// Default maximum number of packets tracked between the first gap and
    /// the largest observed packet.
    pub const DEFAULT_MAX_WINDOW: usize = 1 << 20;

    pub fn new() -> Self {
        Self::with_max_window(Self::DEFAULT_MAX_WINDOW)
    }

    /// Create a tracker that keeps at most `max_window` packets between the
    /// first gap and the largest observed packet.
    ///
    /// # Panics
    /// Panics if `max_window` is 0.
    pub fn with_max_window(max_window: usize) -> Self {
        assert!(max_window > 0, "max window must be positive");
        Self {
            packets_entropy: VecDeque::new(),
            packets_entropy_hash: EntropyDigest::new(),
            first_gap: 1,
            largest_observed: 0,
            max_window,
        }
    }

    pub fn max_window(&self) -> usize {
        self.max_window
    }

    pub fn largest_observed(&self) -> SequenceNumber {
        self.largest_observed
    }

    pub fn first_gap(&self) -> SequenceNumber {
        self.first_gap
    }

    /// Record the entropy hash of a received packet.
    ///
    /// Packets below the first gap, duplicates, and packets too far ahead of
    /// the first gap are ignored.
    pub fn record_packet_entropy_hash(
        &mut self,
        sequence_number: SequenceNumber,
        entropy_hash: EntropyHash,
    ) {
        if sequence_number < self.first_gap {
            debug!(
                "ignoring entropy of packet {} below first gap {}",
                sequence_number, self.first_gap,
            );
            return;
        }
        if sequence_number == SequenceNumber::MAX
            || sequence_number - self.first_gap >= self.max_window as SequenceNumber
        {
            warn!(
                "ignoring entropy of packet {}: too far ahead of first gap {}",
                sequence_number, self.first_gap,
            );
            return;
        }
        if sequence_number > self.largest_observed {
            self.extend_to(sequence_number);
        }

        let index = (sequence_number - self.first_gap) as usize;
        let slot = &mut self.packets_entropy[index];
        if slot.is_some() {
            warn!("duplicate entropy for packet {}", sequence_number);
            return;
        }
        *slot = Some(entropy_hash);
        self.packets_entropy_hash.add(entropy_hash);
        self.advance_first_gap();
    }

    /// Cumulative entropy of the received packets up to and including
    /// `sequence_number`.
    pub fn entropy_hash(&self, sequence_number: SequenceNumber) -> Result<EntropyHash> {
        if sequence_number == 0 {
            return Ok(0);
        }
        if sequence_number > self.largest_observed {
            return Err(EntropyError::NotObserved {
                requested: sequence_number,
                largest_observed: self.largest_observed,
            });
        }
        if sequence_number == self.largest_observed {
            return Ok(self.packets_entropy_hash.value());
        }
        if sequence_number + 1 < self.first_gap {
            return Err(EntropyError::Pruned {
                requested: sequence_number,
                first_gap: self.first_gap,
            });
        }

        let mut hash = self.packets_entropy_hash;
        let skip = (sequence_number + 1 - self.first_gap) as usize;
        for entropy in self.packets_entropy.iter().skip(skip).flatten() {
            hash.remove(*entropy);
        }
        Ok(hash.value())
    }

    /// Apply a STOP_WAITING update from the peer.
    ///
    /// The peer will not retransmit anything below `least_unacked`, and
    /// `cumulative_entropy` is the entropy it sent up to
    /// `least_unacked - 1`. That value replaces whatever we received below
    /// `least_unacked`. If `least_unacked` is beyond the largest observed
    /// packet, everything up to `least_unacked - 1` counts as observed.
    pub fn set_cumulative_entropy_up_to(
        &mut self,
        least_unacked: SequenceNumber,
        cumulative_entropy: EntropyHash,
    ) {
        if least_unacked <= self.first_gap {
            debug!(
                "stale least unacked {} (first gap {})",
                least_unacked, self.first_gap,
            );
            return;
        }
        if least_unacked - 1 >= self.largest_observed {
            self.packets_entropy.clear();
            self.largest_observed = least_unacked - 1;
            self.first_gap = least_unacked;
        }
        while self.first_gap < least_unacked {
            self.packets_entropy.pop_front();
            self.first_gap += 1;
        }
        let mut hash = EntropyDigest::from_value(cumulative_entropy);
        for entropy in self.packets_entropy.iter().flatten() {
            hash.add(*entropy);
        }
        self.packets_entropy_hash = hash;
        self.advance_first_gap();
        debug!(
            "entropy up to {} set to {}, cumulative {}",
            least_unacked - 1,
            cumulative_entropy,
            self.packets_entropy_hash.value(),
        );
    }

    /// Packets between the first gap and the largest observed packet that
    /// have not been received.
    pub fn missing_packets(&self) -> SequenceNumberSet {
        self.packets_entropy
            .iter()
            .enumerate()
            .filter(|(_, entropy)| entropy.is_none())
            .map(|(i, _)| self.first_gap + i as SequenceNumber)
            .collect()
    }

    /// The received info to put in an outgoing ACK frame.
    pub fn ack_info(&self) -> AckInfo {
        AckInfo {
            largest_observed: self.largest_observed,
            missing_packets: self.missing_packets(),
            entropy_hash: self.packets_entropy_hash.value(),
        }
    }

    fn extend_to(&mut self, sequence_number: SequenceNumber) {
        let count = (sequence_number - self.largest_observed) as usize;
        self.packets_entropy.extend(std::iter::repeat(None).take(count));
        self.largest_observed = sequence_number;
    }

    fn advance_first_gap(&mut self) {
        while let Some(Some(_)) = self.packets_entropy.front() {
            self.packets_entropy.pop_front();
            self.first_gap += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HASHES: [EntropyHash; 6] = [12, 1, 33, 3, 32, 100];

    fn hash(seq: SequenceNumber) -> EntropyHash {
        HASHES[seq as usize - 1]
    }

    fn receive(tracker: &mut ReceivedEntropyTracker, seqs: &[SequenceNumber]) {
        for &seq in seqs {
            tracker.record_packet_entropy_hash(seq, hash(seq));
        }
    }

    #[test]
    fn test_constructor() {
        let tracker = ReceivedEntropyTracker::new();
        assert_eq!(tracker.largest_observed(), 0);
        assert_eq!(tracker.first_gap(), 1);
        assert_eq!(tracker.entropy_hash(0).unwrap(), 0);
        assert_eq!(tracker.ack_info(), AckInfo::new(0, 0));
    }

    #[test]
    fn test_received_in_order() {
        let mut tracker = ReceivedEntropyTracker::new();
        receive(&mut tracker, &[1, 2, 3, 4]);
        assert_eq!(tracker.first_gap(), 5);
        assert_eq!(tracker.largest_observed(), 4);
        assert_eq!(tracker.entropy_hash(4).unwrap(), 12 ^ 1 ^ 33 ^ 3);
        assert!(tracker.missing_packets().is_empty());

        // Nothing below the first gap is kept per packet.
        assert!(matches!(tracker.entropy_hash(3), Err(EntropyError::Pruned { .. })));
    }

    #[test]
    fn test_received_with_gap() {
        let mut tracker = ReceivedEntropyTracker::new();
        receive(&mut tracker, &[1, 2, 4, 5]);
        assert_eq!(tracker.first_gap(), 3);
        assert_eq!(tracker.largest_observed(), 5);
        assert_eq!(tracker.missing_packets(), SequenceNumberSet::from([3]));
        assert_eq!(tracker.entropy_hash(5).unwrap(), 12 ^ 1 ^ 3 ^ 32);
        assert_eq!(tracker.entropy_hash(4).unwrap(), 12 ^ 1 ^ 3);
        assert_eq!(tracker.entropy_hash(3).unwrap(), 12 ^ 1);
        assert_eq!(tracker.entropy_hash(2).unwrap(), 12 ^ 1);
        assert!(matches!(
            tracker.entropy_hash(1),
            Err(EntropyError::Pruned { requested: 1, first_gap: 3 })
        ));
        assert!(matches!(
            tracker.entropy_hash(6),
            Err(EntropyError::NotObserved { requested: 6, largest_observed: 5 })
        ));
    }

    #[test]
    fn test_late_packet_fills_gap() {
        let mut tracker = ReceivedEntropyTracker::new();
        receive(&mut tracker, &[1, 2, 4, 5, 3]);
        assert_eq!(tracker.first_gap(), 6);
        assert!(tracker.missing_packets().is_empty());
        assert_eq!(tracker.entropy_hash(5).unwrap(), 12 ^ 1 ^ 33 ^ 3 ^ 32);
    }

    #[test]
    fn test_duplicate_and_old_packets_ignored() {
        let mut tracker = ReceivedEntropyTracker::new();
        receive(&mut tracker, &[1, 3]);
        let before = tracker.ack_info();
        receive(&mut tracker, &[1, 3]);
        tracker.record_packet_entropy_hash(0, 0xff);
        assert_eq!(tracker.ack_info(), before);
    }

    #[test]
    fn test_stop_waiting_replaces_lost_entropy() {
        let mut tracker = ReceivedEntropyTracker::new();
        receive(&mut tracker, &[1, 2, 4, 5, 6]);
        assert_eq!(tracker.missing_packets(), SequenceNumberSet::from([3]));

        // The sender gave up on packet 3.
        tracker.set_cumulative_entropy_up_to(4, 12 ^ 1 ^ 33);
        assert_eq!(tracker.first_gap(), 7);
        assert!(tracker.missing_packets().is_empty());
        assert_eq!(tracker.entropy_hash(6).unwrap(), HASHES.iter().fold(0, |acc, h| acc ^ h));

        // A retransmission of something below least unacked is ignored.
        tracker.record_packet_entropy_hash(3, 33);
        assert_eq!(tracker.entropy_hash(6).unwrap(), HASHES.iter().fold(0, |acc, h| acc ^ h));
    }

    #[test]
    fn test_stop_waiting_keeps_later_gaps() {
        let mut tracker = ReceivedEntropyTracker::new();
        receive(&mut tracker, &[1, 3, 5]);
        tracker.set_cumulative_entropy_up_to(3, 12 ^ 1);
        assert_eq!(tracker.first_gap(), 4);
        assert_eq!(tracker.missing_packets(), SequenceNumberSet::from([4]));
        assert_eq!(tracker.entropy_hash(5).unwrap(), 12 ^ 1 ^ 33 ^ 32);
        assert_eq!(tracker.entropy_hash(3).unwrap(), 12 ^ 1 ^ 33);
    }

    #[test]
    fn test_entropy_hash_of_zero_is_zero() {
        let mut tracker = ReceivedEntropyTracker::new();
        receive(&mut tracker, &[1, 2, 3]);
        assert_eq!(tracker.first_gap(), 4);
        assert_eq!(tracker.entropy_hash(0).unwrap(), 0);
        tracker.set_cumulative_entropy_up_to(10, 0x42);
        assert_eq!(tracker.entropy_hash(0).unwrap(), 0);
    }

    #[test]
    fn test_packets_beyond_window_ignored() {
        let mut tracker = ReceivedEntropyTracker::with_max_window(4);
        assert_eq!(tracker.max_window(), 4);
        receive(&mut tracker, &[1, 3]);
        let before = tracker.ack_info();

        // Window is 2..=5 at most.
        tracker.record_packet_entropy_hash(6, 0xff);
        tracker.record_packet_entropy_hash(SequenceNumber::MAX, 0xff);
        assert_eq!(tracker.ack_info(), before);

        tracker.record_packet_entropy_hash(5, 32);
        assert_eq!(tracker.largest_observed(), 5);
        assert_eq!(tracker.missing_packets(), SequenceNumberSet::from([2, 4]));
    }

    #[test]
    fn test_huge_sequence_numbers_do_not_allocate() {
        let mut tracker = ReceivedEntropyTracker::new();
        receive(&mut tracker, &[1]);
        tracker.record_packet_entropy_hash(SequenceNumber::MAX, 1);
        tracker.record_packet_entropy_hash(1 << 36, 1);
        assert_eq!(tracker.ack_info(), AckInfo::new(1, 12));

        tracker.set_cumulative_entropy_up_to(SequenceNumber::MAX, 0x42);
        assert_eq!(tracker.largest_observed(), SequenceNumber::MAX - 1);
        assert_eq!(tracker.first_gap(), SequenceNumber::MAX);
        assert_eq!(tracker.ack_info(), AckInfo::new(SequenceNumber::MAX - 1, 0x42));

        // The last sequence number can never be recorded.
        tracker.record_packet_entropy_hash(SequenceNumber::MAX, 1);
        assert_eq!(tracker.ack_info(), AckInfo::new(SequenceNumber::MAX - 1, 0x42));
    }

    #[test]
    fn test_stop_waiting_stale_and_ahead() {
        let mut tracker = ReceivedEntropyTracker::new();
        receive(&mut tracker, &[1, 2]);
        let before = tracker.ack_info();
        tracker.set_cumulative_entropy_up_to(2, 0x77);
        assert_eq!(tracker.ack_info(), before);

        // Least unacked ahead of anything observed settles the whole range.
        tracker.set_cumulative_entropy_up_to(6, 0x42);
        assert_eq!(tracker.largest_observed(), 5);
        assert_eq!(tracker.first_gap(), 6);
        assert_eq!(tracker.ack_info(), AckInfo::new(5, 0x42));
    }
}
