use crate::run::{check_positions, run_value, run_value_type, type_mismatch};
use crate::sizing::{calculate_block_reset_size, calculate_new_array_size};
use arrow::array::{Array, ArrayRef, AsArray, PrimitiveArray, new_null_array};
use arrow::buffer::{NullBuffer, ScalarBuffer};
use arrow::datatypes::ArrowPrimitiveType;
use colbatch_result::Result;
use std::mem::size_of;
use std::sync::Arc;

/// Positions appender for fixed-width Arrow primitive types.
///
/// Values and null flags live in two parallel buffers that always have the
/// same length. Null slots hold `T::Native::default()`.
#[derive(Debug)]
pub struct PrimitivePositionsAppender<T: ArrowPrimitiveType> {
    initialized: bool,
    initial_entry_count: usize,

    position_count: usize,
    has_null_value: bool,
    has_non_null_value: bool,

    value_is_null: Vec<bool>,
    values: Vec<T::Native>,

    retained_size_in_bytes: usize,
    size_in_bytes: usize,
}

impl<T: ArrowPrimitiveType> PrimitivePositionsAppender<T> {
    /// Logical bytes charged per appended position: the value plus its null flag.
    pub const SIZE_IN_BYTES_PER_POSITION: usize = size_of::<T::Native>() + size_of::<u8>();

    pub fn new(expected_entries: usize) -> Self {
        let mut appender = Self {
            initialized: false,
            initial_entry_count: expected_entries.max(1),
            position_count: 0,
            has_null_value: false,
            has_non_null_value: false,
            value_is_null: Vec::new(),
            values: Vec::new(),
            retained_size_in_bytes: 0,
            size_in_bytes: 0,
        };
        appender.update_retained_size();
        appender
    }

    pub fn append(&mut self, positions: &[usize], source: &dyn Array) -> Result<()> {
        if positions.is_empty() {
            return Ok(());
        }
        let source = source
            .as_primitive_opt::<T>()
            .ok_or_else(|| type_mismatch(&T::DATA_TYPE, source.data_type()))?;
        check_positions(positions, source.len())?;
        self.ensure_capacity(self.position_count + positions.len());

        let source_values = source.values();
        if source.null_count() > 0 {
            for &position in positions {
                if source.is_null(position) {
                    self.values.push(T::Native::default());
                    self.value_is_null.push(true);
                    self.has_null_value = true;
                } else {
                    self.values.push(source_values[position]);
                    self.value_is_null.push(false);
                    self.has_non_null_value = true;
                }
            }
        } else {
            self.values
                .extend(positions.iter().map(|&position| source_values[position]));
            self.value_is_null
                .resize(self.value_is_null.len() + positions.len(), false);
            self.has_non_null_value = true;
        }
        self.position_count += positions.len();

        self.update_size(positions.len());
        Ok(())
    }

    pub fn append_run(&mut self, source: &dyn Array) -> Result<()> {
        let run_length = source.len();
        if run_length == 0 {
            return Ok(());
        }
        if run_value_type(source) != &T::DATA_TYPE {
            return Err(type_mismatch(&T::DATA_TYPE, source.data_type()));
        }
        let value = run_value(source)?;
        let value = value
            .as_primitive_opt::<T>()
            .ok_or_else(|| type_mismatch(&T::DATA_TYPE, value.data_type()))?;

        let new_count = self.position_count + run_length;
        self.ensure_capacity(new_count);
        if value.is_null(0) {
            self.values.resize(new_count, T::Native::default());
            self.value_is_null.resize(new_count, true);
            self.has_null_value = true;
        } else {
            self.values.resize(new_count, value.value(0));
            self.value_is_null.resize(new_count, false);
            self.has_non_null_value = true;
        }
        self.position_count = new_count;

        self.update_size(run_length);
        Ok(())
    }

    pub fn build(&mut self) -> Result<ArrayRef> {
        let result: ArrayRef = if self.has_non_null_value {
            let values = ScalarBuffer::from(std::mem::take(&mut self.values));
            let nulls = self
                .has_null_value
                .then(|| null_buffer(std::mem::take(&mut self.value_is_null)));
            Arc::new(PrimitiveArray::<T>::new(values, nulls))
        } else {
            new_null_array(&T::DATA_TYPE, self.position_count)
        };
        self.reset();
        Ok(result)
    }

    pub fn position_count(&self) -> usize {
        self.position_count
    }

    pub fn retained_size_in_bytes(&self) -> usize {
        self.retained_size_in_bytes
    }

    pub fn size_in_bytes(&self) -> usize {
        self.size_in_bytes
    }

    fn reset(&mut self) {
        self.initial_entry_count = calculate_block_reset_size(self.position_count);
        self.initialized = false;
        self.value_is_null = Vec::new();
        self.values = Vec::new();
        self.position_count = 0;
        self.size_in_bytes = 0;
        self.has_non_null_value = false;
        self.has_null_value = false;
        self.update_retained_size();
    }

    fn ensure_capacity(&mut self, capacity: usize) {
        if self.values.capacity() >= capacity {
            return;
        }

        let grown = if self.initialized {
            calculate_new_array_size(self.values.capacity())
        } else {
            self.initialized = true;
            self.initial_entry_count
        };
        let new_size = grown.max(capacity);

        self.values.reserve_exact(new_size - self.values.len());
        self.value_is_null
            .reserve_exact(new_size - self.value_is_null.len());
        self.update_retained_size();
    }

    fn update_size(&mut self, positions: usize) {
        self.size_in_bytes += Self::SIZE_IN_BYTES_PER_POSITION * positions;
    }

    fn update_retained_size(&mut self) {
        self.retained_size_in_bytes = size_of::<Self>()
            + self.value_is_null.capacity()
            + self.values.capacity() * size_of::<T::Native>();
    }
}

/// Arrow validity buffer from per-position null flags.
pub(crate) fn null_buffer(value_is_null: Vec<bool>) -> NullBuffer {
    NullBuffer::from(
        value_is_null
            .into_iter()
            .map(|is_null| !is_null)
            .collect::<Vec<bool>>(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::Int32Array;
    use arrow::datatypes::Int32Type;

    #[test]
    fn appends_selected_positions_with_nulls() {
        let source = Int32Array::from(vec![Some(10), None, Some(30), Some(40)]);
        let mut appender = PrimitivePositionsAppender::<Int32Type>::new(4);

        appender.append(&[3, 1, 0], &source).unwrap();
        assert_eq!(appender.position_count(), 3);
        assert_eq!(
            appender.size_in_bytes(),
            3 * PrimitivePositionsAppender::<Int32Type>::SIZE_IN_BYTES_PER_POSITION
        );

        let built = appender.build().unwrap();
        let built = built.as_primitive::<Int32Type>();
        assert_eq!(built.len(), 3);
        assert_eq!(built.value(0), 40);
        assert!(built.is_null(1));
        assert_eq!(built.value(2), 10);
        assert_eq!(appender.position_count(), 0);
        assert_eq!(appender.size_in_bytes(), 0);
    }

    #[test]
    fn first_growth_uses_expected_entries() {
        let source = Int32Array::from(vec![1, 2]);
        let mut appender = PrimitivePositionsAppender::<Int32Type>::new(500);
        appender.append(&[0, 1], &source).unwrap();
        assert!(appender.values.capacity() >= 500);
    }

    #[test]
    fn growth_covers_a_large_single_append() {
        let source = Int32Array::from((0..1000).collect::<Vec<i32>>());
        let positions: Vec<usize> = (0..1000).collect();
        let mut appender = PrimitivePositionsAppender::<Int32Type>::new(1);
        appender.append(&positions, &source).unwrap();
        assert!(appender.values.capacity() >= 1000);
        assert_eq!(appender.build().unwrap().len(), 1000);
    }

    #[test]
    fn reset_sizes_next_cycle_from_previous_count() {
        let source = Int32Array::from((0..1000).collect::<Vec<i32>>());
        let positions: Vec<usize> = (0..1000).collect();
        let mut appender = PrimitivePositionsAppender::<Int32Type>::new(1);
        appender.append(&positions, &source).unwrap();
        appender.build().unwrap();
        assert_eq!(appender.initial_entry_count, 1250);
        assert_eq!(appender.values.capacity(), 0);
    }

    #[test]
    fn only_nulls_build_a_null_array() {
        let source = Int32Array::from(vec![None, None]);
        let mut appender = PrimitivePositionsAppender::<Int32Type>::new(2);
        appender.append(&[0, 1, 0], &source).unwrap();
        let built = appender.build().unwrap();
        assert_eq!(built.len(), 3);
        assert_eq!(built.null_count(), 3);
    }

    #[test]
    fn wrong_source_type_is_rejected_without_state_change() {
        let source = arrow::array::Int64Array::from(vec![1]);
        let mut appender = PrimitivePositionsAppender::<Int32Type>::new(2);
        assert!(appender.append(&[0], &source).is_err());
        assert_eq!(appender.position_count(), 0);
    }
}
