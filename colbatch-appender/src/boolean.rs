use crate::primitive::null_buffer;
use crate::run::{check_positions, run_value, run_value_type, type_mismatch};
use crate::sizing::{calculate_block_reset_size, calculate_new_array_size};
use arrow::array::{Array, ArrayRef, AsArray, BooleanArray, new_null_array};
use arrow::buffer::BooleanBuffer;
use arrow::datatypes::DataType;
use colbatch_result::Result;
use std::mem::size_of;
use std::sync::Arc;

/// Positions appender for `Boolean` columns.
#[derive(Debug)]
pub struct BooleanPositionsAppender {
    initialized: bool,
    initial_entry_count: usize,

    position_count: usize,
    has_null_value: bool,
    has_non_null_value: bool,

    value_is_null: Vec<bool>,
    values: Vec<bool>,

    retained_size_in_bytes: usize,
    size_in_bytes: usize,
}

impl BooleanPositionsAppender {
    pub const SIZE_IN_BYTES_PER_POSITION: usize = size_of::<u8>() + size_of::<u8>();

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
            .as_boolean_opt()
            .ok_or_else(|| type_mismatch(&DataType::Boolean, source.data_type()))?;
        check_positions(positions, source.len())?;
        self.ensure_capacity(self.position_count + positions.len());

        for &position in positions {
            if source.is_null(position) {
                self.values.push(false);
                self.value_is_null.push(true);
                self.has_null_value = true;
            } else {
                self.values.push(source.value(position));
                self.value_is_null.push(false);
                self.has_non_null_value = true;
            }
        }
        self.position_count += positions.len();

        self.size_in_bytes += Self::SIZE_IN_BYTES_PER_POSITION * positions.len();
        Ok(())
    }

    pub fn append_run(&mut self, source: &dyn Array) -> Result<()> {
        let run_length = source.len();
        if run_length == 0 {
            return Ok(());
        }
        if run_value_type(source) != &DataType::Boolean {
            return Err(type_mismatch(&DataType::Boolean, source.data_type()));
        }
        let value = run_value(source)?;
        let value = value.as_boolean();

        let new_count = self.position_count + run_length;
        self.ensure_capacity(new_count);
        if value.is_null(0) {
            self.values.resize(new_count, false);
            self.value_is_null.resize(new_count, true);
            self.has_null_value = true;
        } else {
            self.values.resize(new_count, value.value(0));
            self.value_is_null.resize(new_count, false);
            self.has_non_null_value = true;
        }
        self.position_count = new_count;

        self.size_in_bytes += Self::SIZE_IN_BYTES_PER_POSITION * run_length;
        Ok(())
    }

    pub fn build(&mut self) -> Result<ArrayRef> {
        let result: ArrayRef = if self.has_non_null_value {
            let values = BooleanBuffer::from(std::mem::take(&mut self.values));
            let nulls = self
                .has_null_value
                .then(|| null_buffer(std::mem::take(&mut self.value_is_null)));
            Arc::new(BooleanArray::new(values, nulls))
        } else {
            new_null_array(&DataType::Boolean, self.position_count)
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

    fn update_retained_size(&mut self) {
        self.retained_size_in_bytes =
            size_of::<Self>() + self.value_is_null.capacity() + self.values.capacity();
    }
}
