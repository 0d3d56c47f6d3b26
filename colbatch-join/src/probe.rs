use arrow::array::{Array, ArrayRef, AsArray};
use arrow::datatypes::{DataType, Int64Type, UInt64Type};
use arrow::record_batch::RecordBatch;
use colbatch_result::{Error, Result};

/// One probe batch plus the channels that carry its join keys.
///
/// Key columns are listed in join-channel order of the lookup source they are
/// probed against. When `hash_channel` is set the probe reuses that
/// precomputed `Int64`/`UInt64` column instead of hashing keys again; the
/// values must come from the same canonical row hash the build side uses.
#[derive(Clone, Debug)]
pub struct JoinProbe<'a> {
    batch: &'a RecordBatch,
    keys: Vec<ArrayRef>,
    hash_channel: Option<usize>,
}

impl<'a> JoinProbe<'a> {
    pub fn try_new(
        batch: &'a RecordBatch,
        key_channels: Vec<usize>,
        hash_channel: Option<usize>,
    ) -> Result<Self> {
        let columns = batch.num_columns();
        let column = |channel: usize| {
            batch.columns().get(channel).cloned().ok_or_else(|| {
                Error::InvalidArgumentError(format!(
                    "probe channel {channel} out of range for {columns} columns"
                ))
            })
        };
        let keys = key_channels
            .iter()
            .map(|&channel| column(channel))
            .collect::<Result<Vec<_>>>()?;
        if let Some(channel) = hash_channel {
            let hashes = column(channel)?;
            if !matches!(hashes.data_type(), DataType::Int64 | DataType::UInt64) {
                return Err(Error::InvalidArgumentError(format!(
                    "probe hash channel {channel} must be Int64 or UInt64, found {}",
                    hashes.data_type()
                )));
            }
        }
        Ok(Self {
            batch,
            keys,
            hash_channel,
        })
    }

    pub fn batch(&self) -> &'a RecordBatch {
        self.batch
    }

    pub fn keys(&self) -> &[ArrayRef] {
        &self.keys
    }

    pub fn position_count(&self) -> usize {
        self.batch.num_rows()
    }

    /// Check the probe keys against the build key types of a lookup source.
    pub fn validate(&self, key_types: &[DataType]) -> Result<()> {
        if self.keys.len() != key_types.len() {
            return Err(Error::InvalidArgumentError(format!(
                "probe has {} join keys, lookup source has {}",
                self.keys.len(),
                key_types.len()
            )));
        }
        for (i, (key, expected)) in self.keys.iter().zip(key_types).enumerate() {
            if key.data_type() != expected {
                return Err(Error::InvalidArgumentError(format!(
                    "probe join key {i} is {}, lookup source expects {expected}",
                    key.data_type()
                )));
            }
        }
        Ok(())
    }

    pub(crate) fn has_key_types(&self, key_types: &[DataType]) -> bool {
        self.keys.len() == key_types.len()
            && self
                .keys
                .iter()
                .zip(key_types)
                .all(|(key, expected)| key.data_type() == expected)
    }

    pub(crate) fn precomputed_hash(&self, position: usize) -> Option<u64> {
        let hashes = self.batch.column(self.hash_channel?);
        if let Some(values) = hashes.as_primitive_opt::<UInt64Type>() {
            return Some(values.value(position));
        }
        hashes
            .as_primitive_opt::<Int64Type>()
            .map(|values| values.value(position) as u64)
    }

    pub(crate) fn has_null_key(&self, position: usize) -> bool {
        self.keys.iter().any(|key| key.is_null(position))
    }
}

/// A probe row paired with one matching join position.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct JoinMatch {
    pub probe_position: usize,
    pub join_position: usize,
}
