use std::cmp::Ordering;

use colbatch_result::Result;

use crate::index::BatchIndex;
use crate::types::ValueKind;

/// Compares one channel of a logical position against another channel of a
/// second logical position of the same index. Nulls sort last.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChannelComparator {
    left_channel: usize,
    right_channel: usize,
    kind: ValueKind,
}

impl ChannelComparator {
    pub(crate) fn new(left_channel: usize, right_channel: usize, kind: ValueKind) -> Self {
        Self {
            left_channel,
            right_channel,
            kind,
        }
    }

    pub fn left_channel(&self) -> usize {
        self.left_channel
    }

    pub fn right_channel(&self) -> usize {
        self.right_channel
    }

    pub fn compare(
        &self,
        index: &BatchIndex,
        left_position: usize,
        right_position: usize,
    ) -> Result<Ordering> {
        let left = index.raw_array(self.left_channel, left_position)?;
        let left_offset = index.raw_array_position(left_position)?;
        let right = index.raw_array(self.right_channel, right_position)?;
        let right_offset = index.raw_array_position(right_position)?;

        Ok(
            match (left.is_null(left_offset), right.is_null(right_offset)) {
                (true, true) => Ordering::Equal,
                (true, false) => Ordering::Greater,
                (false, true) => Ordering::Less,
                (false, false) => {
                    self.kind
                        .compare(left.as_ref(), left_offset, right.as_ref(), right_offset)
                }
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::datatypes::DataType;
    use colbatch_test_utils::{batch_of, int64_column};

    #[test]
    fn nulls_sort_last_across_channels() {
        let mut index = BatchIndex::new(vec![DataType::Int64, DataType::Int64], 3).unwrap();
        index
            .add_batch(&batch_of(vec![
                int64_column(&[Some(1), None, Some(5)]),
                int64_column(&[Some(4), Some(4), None]),
            ]))
            .unwrap();
        let comparator = index.create_channel_comparator(0, 1).unwrap();
        assert_eq!(comparator.compare(&index, 0, 0).unwrap(), Ordering::Less);
        assert_eq!(comparator.compare(&index, 2, 1).unwrap(), Ordering::Greater);
        assert_eq!(comparator.compare(&index, 1, 0).unwrap(), Ordering::Greater);
        assert_eq!(comparator.compare(&index, 0, 2).unwrap(), Ordering::Less);
        assert_eq!(comparator.compare(&index, 1, 2).unwrap(), Ordering::Equal);
    }
}
