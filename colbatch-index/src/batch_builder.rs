use std::sync::Arc;

use arrow::array::{Array, ArrayBuilder, ArrayRef, make_builder, new_empty_array};
use arrow::compute::concat;
use arrow::datatypes::{DataType, Field, Schema, SchemaRef};
use arrow::record_batch::{RecordBatch, RecordBatchOptions};
use colbatch_result::{Error, Result};

use crate::types::ValueKind;

/// Default row limit of one output batch.
pub const DEFAULT_MAX_BATCH_ROWS: usize = 1024;
/// Default byte limit of one output batch.
pub const DEFAULT_MAX_BATCH_BYTES: usize = 1024 * 1024;

/// Output column under construction.
enum ChannelBuilder {
    Typed {
        kind: ValueKind,
        builder: Box<dyn ArrayBuilder>,
    },
    /// Stored channels collect single-row slices and concatenate them on build.
    Sliced {
        data_type: DataType,
        rows: Vec<ArrayRef>,
    },
}

impl ChannelBuilder {
    fn new(data_type: &DataType, kind: ValueKind, capacity: usize) -> Self {
        if kind.has_operators() {
            Self::Typed {
                kind,
                builder: make_builder(data_type, capacity),
            }
        } else {
            Self::Sliced {
                data_type: data_type.clone(),
                rows: Vec::with_capacity(capacity),
            }
        }
    }

    fn finish(&mut self) -> Result<ArrayRef> {
        match self {
            Self::Typed { builder, .. } => Ok(builder.finish()),
            Self::Sliced { data_type, rows } if rows.is_empty() => Ok(new_empty_array(data_type)),
            Self::Sliced { rows, .. } => {
                let parts: Vec<&dyn Array> = rows.iter().map(|row| row.as_ref()).collect();
                let array = concat(&parts)?;
                rows.clear();
                Ok(array)
            }
        }
    }
}

/// Row-at-a-time builder of output [`RecordBatch`]es.
///
/// Callers append one value per channel and then [`declare_position`]
/// (Self::declare_position) to close the row. [`build`](Self::build) snapshots
/// everything appended so far and leaves the builder empty for the next batch.
pub struct BatchBuilder {
    fields: Vec<Field>,
    kinds: Vec<ValueKind>,
    builders: Vec<ChannelBuilder>,
    position_count: usize,
    size_in_bytes: usize,
    max_rows: usize,
    max_bytes: usize,
}

impl BatchBuilder {
    pub fn new(schema: &Schema, max_rows: usize, max_bytes: usize) -> Result<Self> {
        if max_rows == 0 || max_bytes == 0 {
            return Err(Error::InvalidArgumentError(
                "output batch limits must be positive".into(),
            ));
        }
        let fields: Vec<Field> = schema
            .fields()
            .iter()
            .map(|field| field.as_ref().clone())
            .collect();
        let types: Vec<DataType> = fields.iter().map(|f| f.data_type().clone()).collect();
        let kinds = ValueKind::of_all(&types);
        let capacity = max_rows.min(DEFAULT_MAX_BATCH_ROWS);
        let builders = types
            .iter()
            .zip(&kinds)
            .map(|(data_type, &kind)| ChannelBuilder::new(data_type, kind, capacity))
            .collect();
        Ok(Self {
            fields,
            kinds,
            builders,
            position_count: 0,
            size_in_bytes: 0,
            max_rows,
            max_bytes,
        })
    }

    /// Builder for nullable channels named `c0`, `c1`, ...
    pub fn for_types(types: &[DataType], max_rows: usize, max_bytes: usize) -> Result<Self> {
        Self::new(&channel_schema(types), max_rows, max_bytes)
    }

    pub fn channel_count(&self) -> usize {
        self.builders.len()
    }

    pub fn position_count(&self) -> usize {
        self.position_count
    }

    pub fn size_in_bytes(&self) -> usize {
        self.size_in_bytes
    }

    pub fn is_empty(&self) -> bool {
        self.position_count == 0
    }

    /// True once either the row or the byte limit is reached.
    pub fn is_full(&self) -> bool {
        self.position_count >= self.max_rows || self.size_in_bytes >= self.max_bytes
    }

    /// Raw Arrow builder of `channel`, for callers that append directly.
    /// Stored channels have no typed builder.
    pub fn builder_mut(&mut self, channel: usize) -> Result<&mut dyn ArrayBuilder> {
        match self.channel_builder(channel)? {
            ChannelBuilder::Typed { builder, .. } => Ok(builder.as_mut()),
            ChannelBuilder::Sliced { data_type, .. } => {
                Err(Error::UnsupportedType(data_type.clone()))
            }
        }
    }

    /// Append the value at `position` of `array` to `channel`.
    pub fn append(&mut self, channel: usize, array: &dyn Array, position: usize) -> Result<()> {
        let bytes = match self.channel_builder(channel)? {
            ChannelBuilder::Typed { kind, builder } => {
                ValueKind::append(*kind, array, position, builder.as_mut())?
            }
            ChannelBuilder::Sliced { data_type, rows } => {
                if array.data_type() != &*data_type {
                    return Err(Error::InvalidArgumentError(format!(
                        "expected a {data_type} column, found {}",
                        array.data_type()
                    )));
                }
                if position >= array.len() {
                    return Err(Error::InvalidArgumentError(format!(
                        "position {position} out of range for {} values",
                        array.len()
                    )));
                }
                rows.push(array.slice(position, 1));
                data_type.primitive_width().unwrap_or(size_of::<usize>())
            }
        };
        self.size_in_bytes += bytes;
        Ok(())
    }

    fn channel_builder(&mut self, channel: usize) -> Result<&mut ChannelBuilder> {
        let channels = self.builders.len();
        self.builders.get_mut(channel).ok_or_else(|| {
            Error::InvalidArgumentError(format!(
                "channel {channel} out of range for {channels} output channels"
            ))
        })
    }

    /// Close the current row.
    pub fn declare_position(&mut self) {
        self.position_count += 1;
    }

    pub fn declare_positions(&mut self, positions: usize) {
        self.position_count += positions;
    }

    pub fn build(&mut self) -> Result<RecordBatch> {
        let columns = self
            .builders
            .iter_mut()
            .map(ChannelBuilder::finish)
            .collect::<Result<Vec<ArrayRef>>>()?;
        if let Some(column) = columns.iter().find(|c| c.len() != self.position_count) {
            return Err(Error::Internal(format!(
                "output column holds {} values for {} declared rows",
                column.len(),
                self.position_count
            )));
        }
        // Field types follow the built arrays so nested child fields always agree.
        let fields: Vec<Field> = self
            .fields
            .iter()
            .zip(&columns)
            .map(|(field, column)| field.clone().with_data_type(column.data_type().clone()))
            .collect();
        let options = RecordBatchOptions::new().with_row_count(Some(self.position_count));
        let batch = RecordBatch::try_new_with_options(Arc::new(Schema::new(fields)), columns, &options)?;
        self.position_count = 0;
        self.size_in_bytes = 0;
        Ok(batch)
    }
}

impl std::fmt::Debug for BatchBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchBuilder")
            .field("kinds", &self.kinds)
            .field("position_count", &self.position_count)
            .field("size_in_bytes", &self.size_in_bytes)
            .field("max_rows", &self.max_rows)
            .field("max_bytes", &self.max_bytes)
            .finish()
    }
}

/// Schema with one nullable field per type, named `c0`, `c1`, ...
pub fn channel_schema(types: &[DataType]) -> SchemaRef {
    Arc::new(Schema::new(
        types
            .iter()
            .enumerate()
            .map(|(i, data_type)| Field::new(format!("c{i}"), data_type.clone(), true))
            .collect::<Vec<_>>(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::{AsArray, Decimal128Array, Int64Array, StringArray};
    use arrow::datatypes::{Decimal128Type, Int64Type};

    #[test]
    fn builds_rows_and_resets() {
        let mut builder =
            BatchBuilder::for_types(&[DataType::Int64, DataType::Utf8], 2, usize::MAX).unwrap();
        let keys = Int64Array::from(vec![Some(1), None]);
        let names = StringArray::from(vec!["a", "b"]);

        for position in 0..2 {
            assert!(!builder.is_full());
            builder.append(0, &keys, position).unwrap();
            builder.append(1, &names, position).unwrap();
            builder.declare_position();
        }
        assert!(builder.is_full());

        let batch = builder.build().unwrap();
        assert_eq!(batch.num_rows(), 2);
        assert_eq!(batch.schema().field(1).name(), "c1");
        assert_eq!(batch.column(0).as_primitive::<Int64Type>().value(0), 1);
        assert!(batch.column(0).is_null(1));
        assert!(builder.is_empty());
        assert_eq!(builder.size_in_bytes(), 0);
    }

    #[test]
    fn byte_limit_marks_full() {
        let mut builder = BatchBuilder::for_types(&[DataType::Utf8], 100, 8).unwrap();
        let names = StringArray::from(vec!["0123456789"]);
        builder.append(0, &names, 0).unwrap();
        builder.declare_position();
        assert!(builder.is_full());
    }

    #[test]
    fn undeclared_values_are_rejected() {
        let mut builder = BatchBuilder::for_types(&[DataType::Int64], 4, 1024).unwrap();
        builder.append(0, &Int64Array::from(vec![3]), 0).unwrap();
        assert!(builder.build().is_err());
    }

    #[test]
    fn zero_channel_batches_keep_row_count() {
        let mut builder = BatchBuilder::for_types(&[], 4, 1024).unwrap();
        builder.declare_positions(3);
        let batch = builder.build().unwrap();
        assert_eq!(batch.num_rows(), 3);
        assert_eq!(batch.num_columns(), 0);
    }

    #[test]
    fn stored_channels_copy_rows() {
        let decimal = DataType::Decimal128(10, 2);
        let mut builder = BatchBuilder::for_types(&[decimal.clone()], 4, 1024).unwrap();
        let source = Decimal128Array::from(vec![Some(150), None, Some(-25)])
            .with_precision_and_scale(10, 2)
            .unwrap();
        assert!(builder.builder_mut(0).is_err());

        for position in [2, 1, 0] {
            builder.append(0, &source, position).unwrap();
            builder.declare_position();
        }
        assert_eq!(builder.size_in_bytes(), 3 * 16);
        assert!(builder.append(0, &Int64Array::from(vec![1]), 0).is_err());

        let batch = builder.build().unwrap();
        assert_eq!(batch.schema().field(0).data_type(), &decimal);
        let built = batch.column(0).as_primitive::<Decimal128Type>();
        assert_eq!(built.value(0), -25);
        assert!(built.is_null(1));
        assert_eq!(built.value(2), 150);

        let empty = builder.build().unwrap();
        assert_eq!(empty.num_rows(), 0);
        assert_eq!(empty.column(0).data_type(), &decimal);
    }
}
