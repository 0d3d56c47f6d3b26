//! Synthetic row addresses.
//!
//! A synthetic address packs the ordinal of a retained batch into the high
//! 32 bits and the row offset inside that batch into the low 32 bits, so the
//! logical row order of a [`BatchIndex`](crate::BatchIndex) is a flat `u64`
//! array that can be permuted cheaply.

const POSITION_BITS: u32 = 32;
const POSITION_MASK: u64 = (1 << POSITION_BITS) - 1;

#[inline]
pub fn encode_synthetic_address(batch_index: u32, position: u32) -> u64 {
    (u64::from(batch_index) << POSITION_BITS) | u64::from(position)
}

#[inline]
pub fn decode_batch_index(address: u64) -> u32 {
    (address >> POSITION_BITS) as u32
}

#[inline]
pub fn decode_position(address: u64) -> u32 {
    (address & POSITION_MASK) as u32
}

/// `(batch_index, position)` for `address`.
#[inline]
pub fn decode_synthetic_address(address: u64) -> (u32, u32) {
    (decode_batch_index(address), decode_position(address))
}

/// Same as [`decode_synthetic_address`] with both halves widened for indexing.
#[inline]
pub(crate) fn decode_indices(address: u64) -> (usize, usize) {
    (
        decode_batch_index(address) as usize,
        decode_position(address) as usize,
    )
}
