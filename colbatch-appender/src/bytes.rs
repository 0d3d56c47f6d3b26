use crate::primitive::null_buffer;
use crate::run::{check_positions, run_value, run_value_type, type_mismatch};
use crate::sizing::{calculate_block_reset_size, calculate_new_array_size};
use arrow::array::{Array, ArrayRef, AsArray, GenericByteArray, new_null_array};
use arrow::buffer::{Buffer, NullBuffer, OffsetBuffer, ScalarBuffer};
use arrow::datatypes::{
    ArrowNativeType, BinaryType, ByteArrayType, DataType, LargeBinaryType, LargeUtf8Type,
    Utf8Type,
};
use colbatch_result::{Error, Result};
use std::mem::size_of;
use std::sync::Arc;

/// Positions appender for variable-width byte columns: `Utf8`, `LargeUtf8`,
/// `Binary` and `LargeBinary`.
///
/// Values are concatenated into one byte buffer delimited by `offsets`, which
/// always holds `position_count + 1` entries.
#[derive(Debug)]
pub struct BytesPositionsAppender {
    data_type: DataType,
    initialized: bool,
    initial_entry_count: usize,

    position_count: usize,
    has_null_value: bool,
    has_non_null_value: bool,

    value_is_null: Vec<bool>,
    offsets: Vec<usize>,
    bytes: Vec<u8>,

    retained_size_in_bytes: usize,
    size_in_bytes: usize,
}

impl BytesPositionsAppender {
    /// Fixed bytes charged per position on top of the value payload: a 32-bit
    /// offset plus the null flag.
    pub const SIZE_IN_BYTES_PER_POSITION: usize = size_of::<i32>() + size_of::<u8>();

    pub fn try_new(data_type: DataType, expected_entries: usize) -> Result<Self> {
        if !Self::supports(&data_type) {
            return Err(Error::UnsupportedType(data_type));
        }
        let mut appender = Self {
            data_type,
            initialized: false,
            initial_entry_count: expected_entries.max(1),
            position_count: 0,
            has_null_value: false,
            has_non_null_value: false,
            value_is_null: Vec::new(),
            offsets: vec![0],
            bytes: Vec::new(),
            retained_size_in_bytes: 0,
            size_in_bytes: 0,
        };
        appender.update_retained_size();
        Ok(appender)
    }

    pub fn supports(data_type: &DataType) -> bool {
        matches!(
            data_type,
            DataType::Utf8 | DataType::LargeUtf8 | DataType::Binary | DataType::LargeBinary
        )
    }

    pub fn data_type(&self) -> &DataType {
        &self.data_type
    }

    pub fn append(&mut self, positions: &[usize], source: &dyn Array) -> Result<()> {
        if positions.is_empty() {
            return Ok(());
        }
        if source.data_type() != &self.data_type {
            return Err(type_mismatch(&self.data_type, source.data_type()));
        }
        check_positions(positions, source.len())?;
        match self.data_type {
            DataType::Utf8 => self.append_values(positions, source.as_bytes::<Utf8Type>()),
            DataType::LargeUtf8 => {
                self.append_values(positions, source.as_bytes::<LargeUtf8Type>())
            }
            DataType::Binary => self.append_values(positions, source.as_bytes::<BinaryType>()),
            DataType::LargeBinary => {
                self.append_values(positions, source.as_bytes::<LargeBinaryType>())
            }
            _ => return Err(Error::UnsupportedType(self.data_type.clone())),
        }
        Ok(())
    }

    fn append_values<B: ByteArrayType>(&mut self, positions: &[usize], source: &GenericByteArray<B>) {
        self.ensure_capacity(self.position_count + positions.len());
        let start_bytes = self.bytes.len();
        for &position in positions {
            if source.is_null(position) {
                self.value_is_null.push(true);
                self.has_null_value = true;
            } else {
                let value: &[u8] = AsRef::<[u8]>::as_ref(source.value(position));
                self.bytes.extend_from_slice(value);
                self.value_is_null.push(false);
                self.has_non_null_value = true;
            }
            self.offsets.push(self.bytes.len());
        }
        self.position_count += positions.len();

        self.size_in_bytes += Self::SIZE_IN_BYTES_PER_POSITION * positions.len()
            + (self.bytes.len() - start_bytes);
        self.update_retained_size();
    }

    pub fn append_run(&mut self, source: &dyn Array) -> Result<()> {
        let run_length = source.len();
        if run_length == 0 {
            return Ok(());
        }
        if run_value_type(source) != &self.data_type {
            return Err(type_mismatch(&self.data_type, source.data_type()));
        }
        let value = run_value(source)?;
        let value: Option<&[u8]> = if value.is_null(0) {
            None
        } else {
            Some(match self.data_type {
                DataType::Utf8 => value.as_string::<i32>().value(0).as_bytes(),
                DataType::LargeUtf8 => value.as_string::<i64>().value(0).as_bytes(),
                DataType::Binary => value.as_bytes::<BinaryType>().value(0),
                DataType::LargeBinary => value.as_bytes::<LargeBinaryType>().value(0),
                _ => return Err(Error::UnsupportedType(self.data_type.clone())),
            })
        };

        self.ensure_capacity(self.position_count + run_length);
        match value {
            None => {
                let end = self.bytes.len();
                self.offsets.resize(self.offsets.len() + run_length, end);
                self.value_is_null
                    .resize(self.value_is_null.len() + run_length, true);
                self.has_null_value = true;
                self.size_in_bytes += Self::SIZE_IN_BYTES_PER_POSITION * run_length;
            }
            Some(value) => {
                self.bytes.reserve(value.len() * run_length);
                for _ in 0..run_length {
                    self.bytes.extend_from_slice(value);
                    self.offsets.push(self.bytes.len());
                }
                self.value_is_null
                    .resize(self.value_is_null.len() + run_length, false);
                self.has_non_null_value = true;
                self.size_in_bytes +=
                    (Self::SIZE_IN_BYTES_PER_POSITION + value.len()) * run_length;
            }
        }
        self.position_count += run_length;
        self.update_retained_size();
        Ok(())
    }

    pub fn build(&mut self) -> Result<ArrayRef> {
        let result = if self.has_non_null_value {
            let offsets = std::mem::replace(&mut self.offsets, vec![0]);
            let bytes = std::mem::take(&mut self.bytes);
            let nulls = self
                .has_null_value
                .then(|| null_buffer(std::mem::take(&mut self.value_is_null)));
            match self.data_type {
                DataType::Utf8 => build_bytes::<Utf8Type>(offsets, bytes, nulls),
                DataType::LargeUtf8 => build_bytes::<LargeUtf8Type>(offsets, bytes, nulls),
                DataType::Binary => build_bytes::<BinaryType>(offsets, bytes, nulls),
                DataType::LargeBinary => build_bytes::<LargeBinaryType>(offsets, bytes, nulls),
                _ => Err(Error::UnsupportedType(self.data_type.clone())),
            }
        } else {
            Ok(new_null_array(&self.data_type, self.position_count))
        };
        self.reset();
        result
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
        self.offsets = vec![0];
        self.bytes = Vec::new();
        self.position_count = 0;
        self.size_in_bytes = 0;
        self.has_non_null_value = false;
        self.has_null_value = false;
        self.update_retained_size();
    }

    fn ensure_capacity(&mut self, capacity: usize) {
        if self.value_is_null.capacity() >= capacity {
            return;
        }
        let grown = if self.initialized {
            calculate_new_array_size(self.value_is_null.capacity())
        } else {
            self.initialized = true;
            self.initial_entry_count
        };
        let new_size = grown.max(capacity);

        self.value_is_null
            .reserve_exact(new_size - self.value_is_null.len());
        self.offsets
            .reserve_exact(new_size + 1 - self.offsets.len());
        self.update_retained_size();
    }

    fn update_retained_size(&mut self) {
        self.retained_size_in_bytes = size_of::<Self>()
            + self.value_is_null.capacity()
            + self.offsets.capacity() * size_of::<usize>()
            + self.bytes.capacity();
    }
}

fn build_bytes<B: ByteArrayType>(
    offsets: Vec<usize>,
    bytes: Vec<u8>,
    nulls: Option<NullBuffer>,
) -> Result<ArrayRef> {
    let offsets = offsets
        .into_iter()
        .map(|offset| {
            <B::Offset as ArrowNativeType>::from_usize(offset).ok_or_else(|| {
                Error::InvalidArgumentError(format!(
                    "appended {offset} bytes, exceeding the offset range of {}",
                    B::DATA_TYPE
                ))
            })
        })
        .collect::<Result<Vec<B::Offset>>>()?;
    let array = GenericByteArray::<B>::try_new(
        OffsetBuffer::new(ScalarBuffer::from(offsets)),
        Buffer::from_vec(bytes),
        nulls,
    )?;
    Ok(Arc::new(array))
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::{BinaryArray, StringArray};

    #[test]
    fn appends_strings_and_nulls() {
        let source = StringArray::from(vec![Some("alpha"), None, Some("gamma")]);
        let mut appender = BytesPositionsAppender::try_new(DataType::Utf8, 8).unwrap();
        appender.append(&[2, 1, 0, 2], &source).unwrap();
        assert_eq!(
            appender.size_in_bytes(),
            4 * BytesPositionsAppender::SIZE_IN_BYTES_PER_POSITION + 15
        );

        let built = appender.build().unwrap();
        let built = built.as_string::<i32>();
        assert_eq!(built.len(), 4);
        assert_eq!(built.value(0), "gamma");
        assert!(built.is_null(1));
        assert_eq!(built.value(2), "alpha");
        assert_eq!(built.value(3), "gamma");
    }

    #[test]
    fn run_of_binary_value() {
        let source = BinaryArray::from(vec![&b"xy"[..]]);
        let mut appender = BytesPositionsAppender::try_new(DataType::Binary, 1).unwrap();
        appender.append_run(&source).unwrap();
        let built = appender.build().unwrap();
        assert_eq!(built.len(), 1);
        assert_eq!(built.as_binary::<i32>().value(0), b"xy");
    }

    #[test]
    fn unsupported_type_is_rejected() {
        assert!(matches!(
            BytesPositionsAppender::try_new(DataType::Int32, 1),
            Err(Error::UnsupportedType(DataType::Int32))
        ));
    }
}
