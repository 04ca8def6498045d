//! Entropy bookkeeping for detecting optimistic ACKs in QUIC.
//!
//! A receiver that acknowledges packets it never received can trick a sender
//! into growing its congestion window (the _optimistic ACK_ attack). To make
//! this detectable, the sender attaches one pseudo-random entropy bit to
//! every packet, and every ACK frame carries the XOR of the entropy of all
//! packets the receiver claims to have received. A lying receiver has to
//! guess the entropy of each packet it pretends to have seen.
//!
//! The sender keeps a [SentEntropyManager] and validates every ACK against
//! it. The receiver keeps a [ReceivedEntropyTracker] and builds the
//! [AckInfo] it sends back from it.
//!
//! # Examples
//!
//! ```
//! use quic_entropy::{packet_entropy_hash, ReceivedEntropyTracker, SentEntropyManager};
//!
//! let mut sender = SentEntropyManager::new();
//! let mut receiver = ReceivedEntropyTracker::new();
//! for seq in 1..=10 {
//!     let hash = packet_entropy_hash(seq, seq % 3 == 0);
//!     sender.record_packet_entropy_hash(seq, hash);
//!     // Packet 4 is lost.
//!     if seq != 4 {
//!         receiver.record_packet_entropy_hash(seq, hash);
//!     }
//! }
//!
//! let ack = receiver.ack_info();
//! assert_eq!(ack.largest_observed, 10);
//! assert!(ack.missing_packets.contains(&4));
//! assert!(sender.validate_ack(&ack));
//! ```

use std::collections::BTreeSet;

/// Identifies a packet within a connection. Sent packets are numbered from
/// 1; 0 means no packet.
pub type SequenceNumber = u64;

/// Entropy attached to a single packet, or accumulated over many.
pub type EntropyHash = u8;

pub type SequenceNumberSet = BTreeSet<SequenceNumber>;

mod ack;
mod digest;
mod error;
mod received;
mod sent;

pub use ack::AckInfo;
pub use digest::{packet_entropy_hash, EntropyDigest};
pub use error::{EntropyError, Result};
pub use received::ReceivedEntropyTracker;
pub use sent::SentEntropyManager;

pub mod ffi;
