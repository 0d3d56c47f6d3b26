//! Growth and reset sizing shared by every appender variant.

/// Capacity used for the first allocation when no better hint exists.
pub const DEFAULT_CAPACITY: usize = 64;

/// Largest entry count an appender buffer will grow to on its own.
pub const MAX_ARRAY_SIZE: usize = i32::MAX as usize - 8;

const BLOCK_RESET_SKEW: f64 = 1.25;

/// Next buffer size when `current_size` entries are no longer enough.
///
/// Grows by 1.5x, never below [`DEFAULT_CAPACITY`] and never past
/// [`MAX_ARRAY_SIZE`]. Callers still raise the result to the capacity they
/// actually need, so a single large append is never split into several growths.
pub fn calculate_new_array_size(current_size: usize) -> usize {
    let new_size = current_size.saturating_add(current_size >> 1);
    new_size.clamp(DEFAULT_CAPACITY, MAX_ARRAY_SIZE)
}

/// Initial entry count for the build cycle that follows one which ended with
/// `current_size` positions.
pub fn calculate_block_reset_size(current_size: usize) -> usize {
    let new_size = (current_size as f64 * BLOCK_RESET_SKEW).ceil() as usize;
    new_size.clamp(DEFAULT_CAPACITY, MAX_ARRAY_SIZE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_array_size_grows_by_half() {
        assert_eq!(calculate_new_array_size(0), DEFAULT_CAPACITY);
        assert_eq!(calculate_new_array_size(10), DEFAULT_CAPACITY);
        assert_eq!(calculate_new_array_size(100), 150);
        assert_eq!(calculate_new_array_size(MAX_ARRAY_SIZE), MAX_ARRAY_SIZE);
    }

    #[test]
    fn reset_size_tracks_previous_batch() {
        assert_eq!(calculate_block_reset_size(0), DEFAULT_CAPACITY);
        assert_eq!(calculate_block_reset_size(1000), 1250);
        assert_eq!(calculate_block_reset_size(1001), 1252);
    }
}
