//! Shared helpers for colbatch test binaries.

use std::sync::{Arc, Once};

use arrow::array::{
    ArrayRef, FixedSizeListBuilder, Float64Array, Float64Builder, Int64Array, StringArray,
};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;

static INIT: Once = Once::new();

/// Initialize tracing for test binaries. Safe to call multiple times.
pub fn init_tracing_for_tests() {
    INIT.call_once(|| {
        use tracing_subscriber::filter::EnvFilter;
        use tracing_subscriber::fmt;
        let filter = match std::env::var("RUST_LOG") {
            Ok(_) => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
            Err(_) => EnvFilter::new("info"),
        };
        // Another harness may already own the global subscriber.
        let _ = fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_test_writer()
            .try_init();
    });
}

#[cfg(feature = "auto-init")]
mod auto {
    // Runs at binary init so individual tests need not call it.
    use ctor::ctor;

    #[ctor]
    fn init() {
        super::init_tracing_for_tests();
    }
}

/// Batch with nullable columns named `c0`, `c1`, ... in the given order.
pub fn batch_of(columns: Vec<ArrayRef>) -> RecordBatch {
    let fields: Vec<Field> = columns
        .iter()
        .enumerate()
        .map(|(i, column)| Field::new(format!("c{i}"), column.data_type().clone(), true))
        .collect();
    RecordBatch::try_new(Arc::new(Schema::new(fields)), columns)
        .expect("fixture columns must share a length")
}

pub fn int64_column(values: &[Option<i64>]) -> ArrayRef {
    Arc::new(Int64Array::from(values.to_vec()))
}

pub fn float64_column(values: &[Option<f64>]) -> ArrayRef {
    Arc::new(Float64Array::from(values.to_vec()))
}

pub fn utf8_column(values: &[Option<&str>]) -> ArrayRef {
    Arc::new(StringArray::from(values.to_vec()))
}

/// Single-channel `Int64` batch without nulls.
pub fn int64_batch(values: &[i64]) -> RecordBatch {
    batch_of(vec![Arc::new(Int64Array::from(values.to_vec()))])
}

/// `(Int64, Utf8)` batch used by the multi-channel tests.
pub fn keyed_batch(keys: &[Option<i64>], names: &[Option<&str>]) -> RecordBatch {
    batch_of(vec![int64_column(keys), utf8_column(names)])
}

/// Column types of [`keyed_batch`].
pub fn keyed_types() -> Vec<DataType> {
    vec![DataType::Int64, DataType::Utf8]
}

/// Envelope column of `[min_x, min_y, max_x, max_y]` rectangles.
pub fn envelope_column(values: &[Option<[f64; 4]>]) -> ArrayRef {
    let mut builder = FixedSizeListBuilder::new(Float64Builder::new(), 4);
    for value in values {
        match value {
            Some(coordinates) => {
                builder.values().append_slice(coordinates);
                builder.append(true);
            }
            None => {
                builder.values().append_nulls(4);
                builder.append(false);
            }
        }
    }
    Arc::new(builder.finish())
}
