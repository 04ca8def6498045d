use std::slice;

use crate::*;

#[no_mangle]
pub extern "C" fn quic_entropy_sent_new() -> *mut SentEntropyManager {
    Box::into_raw(Box::new(SentEntropyManager::new()))
}

/// # Safety
///
/// `manager` must be null or a pointer returned by `quic_entropy_sent_new`
/// that has not been freed.
#[no_mangle]
pub unsafe extern "C" fn quic_entropy_sent_free(manager: *mut SentEntropyManager) {
    if !manager.is_null() {
        drop(Box::from_raw(manager));
    }
}

/// # Safety
///
/// `manager` must be null or a live pointer from `quic_entropy_sent_new`.
#[no_mangle]
pub unsafe extern "C" fn quic_entropy_sent_len(manager: *const SentEntropyManager) -> usize {
    match manager.as_ref() {
        Some(manager) => manager.len(),
        None => 0,
    }
}

/// # Safety
///
/// `manager` must be null or a live pointer from `quic_entropy_sent_new`.
#[no_mangle]
pub unsafe extern "C" fn quic_entropy_sent_record(
    manager: *mut SentEntropyManager,
    sequence_number: SequenceNumber,
    entropy_hash: EntropyHash,
) {
    if let Some(manager) = manager.as_mut() {
        manager.record_packet_entropy_hash(sequence_number, entropy_hash);
    }
}

/// Writes the cumulative entropy at `sequence_number` to `out` and returns
/// true, or returns false if there is no such record.
///
/// # Safety
///
/// `manager` must be null or a live pointer from `quic_entropy_sent_new`.
/// `out` must be null or valid for a one byte write.
#[no_mangle]
pub unsafe extern "C" fn quic_entropy_sent_entropy_hash(
    manager: *const SentEntropyManager,
    sequence_number: SequenceNumber,
    out: *mut EntropyHash,
) -> bool {
    let (manager, out) = match (manager.as_ref(), out.as_mut()) {
        (Some(manager), Some(out)) => (manager, out),
        _ => return false,
    };
    match manager.entropy_hash(sequence_number) {
        Ok(hash) => {
            *out = hash;
            true
        }
        Err(_) => false,
    }
}

/// # Safety
///
/// `manager` must be null or a live pointer from `quic_entropy_sent_new`.
/// `missing` must point to `len` sequence numbers, or be null if `len` is 0.
#[no_mangle]
pub unsafe extern "C" fn quic_entropy_sent_is_valid(
    manager: *const SentEntropyManager,
    sequence_number: SequenceNumber,
    missing: *const SequenceNumber,
    len: usize,
    entropy_hash: EntropyHash,
) -> bool {
    let manager = match manager.as_ref() {
        Some(manager) => manager,
        None => return false,
    };
    let missing_packets: SequenceNumberSet = if len == 0 {
        SequenceNumberSet::new()
    } else if missing.is_null() {
        return false;
    } else {
        slice::from_raw_parts(missing, len).iter().copied().collect()
    };
    manager.is_valid_entropy(sequence_number, &missing_packets, entropy_hash)
}

/// # Safety
///
/// `manager` must be null or a live pointer from `quic_entropy_sent_new`.
#[no_mangle]
pub unsafe extern "C" fn quic_entropy_sent_clear_before(
    manager: *mut SentEntropyManager,
    sequence_number: SequenceNumber,
) {
    if let Some(manager) = manager.as_mut() {
        manager.clear_entropy_before(sequence_number);
    }
}
