//! Position orderings for `BatchIndex::sort`.
//!
//! An ordering is compiled once per distinct `(types, channels, orders)`
//! combination into an Arrow [`RowConverter`] and cached. Sorting then encodes
//! the sort channels of every retained batch into the row format and compares
//! encoded rows, which orders nulls and directions exactly as requested.

use std::sync::{Arc, RwLock};

use arrow::array::ArrayRef;
use arrow::datatypes::DataType;
use arrow::row::{RowConverter, Rows, SortField};
use colbatch_result::{Error, Result};
use rustc_hash::FxHashMap;

use crate::types::SortOrder;

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
struct OrderingKey {
    types: Vec<DataType>,
    sort_channels: Vec<usize>,
    sort_orders: Vec<SortOrder>,
}

/// Compiled comparison over the sort channels of a batch index.
#[derive(Debug)]
pub struct PositionOrdering {
    sort_channels: Vec<usize>,
    converter: RowConverter,
}

impl PositionOrdering {
    pub fn sort_channels(&self) -> &[usize] {
        &self.sort_channels
    }

    /// Encode the sort channels of batch `batch`.
    pub fn convert_batch(&self, channels: &[Vec<ArrayRef>], batch: usize) -> Result<Rows> {
        let columns = self
            .sort_channels
            .iter()
            .map(|&channel| {
                channels
                    .get(channel)
                    .and_then(|batches| batches.get(batch))
                    .cloned()
                    .ok_or_else(|| {
                        Error::Internal(format!("batch {batch} of channel {channel} is not retained"))
                    })
            })
            .collect::<Result<Vec<ArrayRef>>>()?;
        Ok(self.converter.convert_columns(&columns)?)
    }

    /// Encode the sort channels of the first `batch_count` batches.
    pub fn convert_batches(&self, channels: &[Vec<ArrayRef>], batch_count: usize) -> Result<Vec<Rows>> {
        (0..batch_count)
            .map(|batch| self.convert_batch(channels, batch))
            .collect()
    }
}

/// Compiles and caches [`PositionOrdering`]s.
#[derive(Debug, Default)]
pub struct OrderingCompiler {
    cache: RwLock<FxHashMap<OrderingKey, Arc<PositionOrdering>>>,
}

impl OrderingCompiler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn compile_position_ordering(
        &self,
        types: &[DataType],
        sort_channels: &[usize],
        sort_orders: &[SortOrder],
    ) -> Result<Arc<PositionOrdering>> {
        if sort_channels.len() != sort_orders.len() {
            return Err(Error::InvalidArgumentError(format!(
                "{} sort channels but {} sort orders",
                sort_channels.len(),
                sort_orders.len()
            )));
        }
        if let Some(&channel) = sort_channels.iter().find(|&&channel| channel >= types.len()) {
            return Err(Error::InvalidArgumentError(format!(
                "sort channel {channel} out of range for {} channels",
                types.len()
            )));
        }

        let key = OrderingKey {
            types: types.to_vec(),
            sort_channels: sort_channels.to_vec(),
            sort_orders: sort_orders.to_vec(),
        };
        if let Some(ordering) = self.cache.read().map_err(poisoned)?.get(&key) {
            return Ok(Arc::clone(ordering));
        }

        let fields = sort_channels
            .iter()
            .zip(sort_orders)
            .map(|(&channel, order)| {
                SortField::new_with_options(types[channel].clone(), order.sort_options())
            })
            .collect();
        let ordering = Arc::new(PositionOrdering {
            sort_channels: key.sort_channels.clone(),
            converter: RowConverter::new(fields)?,
        });
        tracing::debug!(
            sort_channels = ?sort_channels,
            sort_orders = ?sort_orders,
            "compiled position ordering"
        );

        let mut cache = self.cache.write().map_err(poisoned)?;
        Ok(Arc::clone(cache.entry(key).or_insert(ordering)))
    }

    pub fn cached_orderings(&self) -> usize {
        self.cache.read().map(|cache| cache.len()).unwrap_or(0)
    }
}

fn poisoned<T>(_: T) -> Error {
    Error::Internal("ordering cache lock poisoned".into())
}
