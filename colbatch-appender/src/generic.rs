use crate::run::{check_positions, run_value, run_value_type, type_mismatch};
use arrow::array::{Array, ArrayRef, UInt32Array, new_null_array};
use arrow::compute::{concat, take};
use arrow::datatypes::DataType;
use colbatch_result::{Error, Result};
use std::mem::size_of;

/// Fallback appender for types without a specialized variant (nested,
/// decimal, temporal with time zone, ...).
///
/// Each `append` gathers the selected positions into a compact piece with
/// Arrow's `take` kernel; `build` concatenates the pieces.
#[derive(Debug)]
pub struct GenericPositionsAppender {
    data_type: DataType,
    pieces: Vec<ArrayRef>,

    position_count: usize,
    has_null_value: bool,
    has_non_null_value: bool,

    pieces_size_in_bytes: usize,
    size_in_bytes: usize,
}

impl GenericPositionsAppender {
    pub fn new(data_type: DataType) -> Self {
        Self {
            data_type,
            pieces: Vec::new(),
            position_count: 0,
            has_null_value: false,
            has_non_null_value: false,
            pieces_size_in_bytes: 0,
            size_in_bytes: 0,
        }
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
        let indices = positions
            .iter()
            .map(|&position| {
                u32::try_from(position).map_err(|_| {
                    Error::InvalidArgumentError(format!(
                        "position {position} exceeds the gather index range"
                    ))
                })
            })
            .collect::<Result<Vec<u32>>>()?;
        let piece = take(source, &UInt32Array::from(indices), None)?;
        self.push_piece(piece);
        Ok(())
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
        let indices = UInt32Array::from(vec![0u32; run_length]);
        let piece = take(value.as_ref(), &indices, None)?;
        self.push_piece(piece);
        Ok(())
    }

    fn push_piece(&mut self, piece: ArrayRef) {
        let nulls = piece.logical_null_count();
        if nulls > 0 {
            self.has_null_value = true;
        }
        if nulls < piece.len() {
            self.has_non_null_value = true;
        }
        self.position_count += piece.len();
        let piece_size = piece.get_array_memory_size();
        self.pieces_size_in_bytes += piece_size;
        self.size_in_bytes += piece_size;
        self.pieces.push(piece);
    }

    pub fn build(&mut self) -> Result<ArrayRef> {
        let result = if self.has_non_null_value {
            let parts: Vec<&dyn Array> = self.pieces.iter().map(|piece| piece.as_ref()).collect();
            concat(&parts)?
        } else {
            new_null_array(&self.data_type, self.position_count)
        };
        self.reset();
        Ok(result)
    }

    pub fn position_count(&self) -> usize {
        self.position_count
    }

    pub fn retained_size_in_bytes(&self) -> usize {
        size_of::<Self>()
            + self.pieces.capacity() * size_of::<ArrayRef>()
            + self.pieces_size_in_bytes
    }

    pub fn size_in_bytes(&self) -> usize {
        self.size_in_bytes
    }

    fn reset(&mut self) {
        self.pieces = Vec::new();
        self.position_count = 0;
        self.has_null_value = false;
        self.has_non_null_value = false;
        self.pieces_size_in_bytes = 0;
        self.size_in_bytes = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::{AsArray, Decimal128Array};
    use arrow::datatypes::Decimal128Type;

    #[test]
    fn gathers_decimal_positions() {
        let source = Decimal128Array::from(vec![Some(100), None, Some(300)])
            .with_precision_and_scale(10, 2)
            .unwrap();
        let mut appender = GenericPositionsAppender::new(source.data_type().clone());
        appender.append(&[2, 0], &source).unwrap();
        appender.append(&[1], &source).unwrap();

        let built = appender.build().unwrap();
        assert_eq!(built.data_type(), &DataType::Decimal128(10, 2));
        let built = built.as_primitive::<Decimal128Type>();
        assert_eq!(built.value(0), 300);
        assert_eq!(built.value(1), 100);
        assert!(built.is_null(2));
        assert_eq!(appender.retained_size_in_bytes(), size_of::<GenericPositionsAppender>());
    }
}
