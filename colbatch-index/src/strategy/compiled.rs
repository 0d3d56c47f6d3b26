use std::cmp::Ordering;

use arrow::array::{
    Array, ArrayRef, BinaryArray, Date32Array, Date64Array, Float32Array, Float64Array,
    Int8Array, Int16Array, Int32Array, Int64Array, LargeBinaryArray, LargeStringArray,
    StringArray, UInt8Array, UInt16Array, UInt32Array, UInt64Array,
};
use colbatch_result::{Error, Result};

use super::{HashStrategy, HashStrategyOptions, StrategyChannels};
use crate::batch_builder::BatchBuilder;
use crate::types::{ValueKind, combine_hash, float_equal, hash_bytes, hash_float, hash_integer};

/// Native key value with the canonical hash and equality.
trait KeyValue {
    fn key_hash(&self) -> u64;
    fn key_eq(&self, other: &Self) -> bool;
}

macro_rules! integer_key_value {
    ($($native:ty),*) => {
        $(
            impl KeyValue for $native {
                #[inline]
                fn key_hash(&self) -> u64 {
                    hash_integer(*self)
                }

                #[inline]
                fn key_eq(&self, other: &Self) -> bool {
                    self == other
                }
            }
        )*
    };
}

integer_key_value!(i8, i16, i32, i64, u8, u16, u32, u64);

impl KeyValue for f32 {
    #[inline]
    fn key_hash(&self) -> u64 {
        hash_float(f64::from(*self))
    }

    #[inline]
    fn key_eq(&self, other: &Self) -> bool {
        float_equal(f64::from(*self), f64::from(*other))
    }
}

impl KeyValue for f64 {
    #[inline]
    fn key_hash(&self) -> u64 {
        hash_float(*self)
    }

    #[inline]
    fn key_eq(&self, other: &Self) -> bool {
        float_equal(*self, *other)
    }
}

impl KeyValue for &str {
    #[inline]
    fn key_hash(&self) -> u64 {
        hash_bytes(self.as_bytes())
    }

    #[inline]
    fn key_eq(&self, other: &Self) -> bool {
        self == other
    }
}

impl KeyValue for &[u8] {
    #[inline]
    fn key_hash(&self) -> u64 {
        hash_bytes(self)
    }

    #[inline]
    fn key_eq(&self, other: &Self) -> bool {
        self == other
    }
}

/// Generates `KeyColumn`, one variant per specialised key kind, each holding
/// the concrete Arrow array for one batch of one join channel.
macro_rules! key_columns {
    ($($variant:ident($array:ty)),* $(,)?) => {
        #[derive(Clone, Debug)]
        enum KeyColumn {
            $($variant($array),)*
        }

        impl KeyColumn {
            fn supports(kind: ValueKind) -> bool {
                matches!(kind, $(ValueKind::$variant)|*)
            }

            fn try_new(kind: ValueKind, array: &ArrayRef) -> Result<Self> {
                match kind {
                    $(
                        ValueKind::$variant => array
                            .as_any()
                            .downcast_ref::<$array>()
                            .cloned()
                            .map(KeyColumn::$variant)
                            .ok_or_else(|| Error::compilation(format!(
                                "{kind:?} key column holds {}",
                                array.data_type()
                            ))),
                    )*
                    other => Err(Error::compilation(format!(
                        "no specialised key kernel for {other:?}"
                    ))),
                }
            }

            #[inline]
            fn is_null(&self, position: usize) -> bool {
                match self {
                    $(KeyColumn::$variant(array) => array.is_null(position),)*
                }
            }

            #[inline]
            fn hash(&self, position: usize) -> u64 {
                match self {
                    $(KeyColumn::$variant(array) => array.value(position).key_hash(),)*
                }
            }

            /// Hash of a probe value of key kind `kind`.
            #[inline]
            fn hash_probe(kind: ValueKind, probe: &dyn Array, position: usize) -> u64 {
                match kind {
                    $(ValueKind::$variant => probe
                        .as_any()
                        .downcast_ref::<$array>()
                        .map_or(0, |probe| probe.value(position).key_hash()),)*
                    _ => 0,
                }
            }

            #[inline]
            fn equals(&self, position: usize, other: &KeyColumn, other_position: usize) -> bool {
                match (self, other) {
                    $((KeyColumn::$variant(left), KeyColumn::$variant(right)) => {
                        left.value(position).key_eq(&right.value(other_position))
                    })*
                    #[allow(unreachable_patterns)]
                    _ => false,
                }
            }

            #[inline]
            fn equals_probe(&self, position: usize, probe: &dyn Array, probe_position: usize) -> bool {
                match self {
                    $(KeyColumn::$variant(left) => probe
                        .as_any()
                        .downcast_ref::<$array>()
                        .is_some_and(|probe| left.value(position).key_eq(&probe.value(probe_position))),)*
                }
            }
        }
    };
}

key_columns! {
    Int8(Int8Array),
    Int16(Int16Array),
    Int32(Int32Array),
    Int64(Int64Array),
    UInt8(UInt8Array),
    UInt16(UInt16Array),
    UInt32(UInt32Array),
    UInt64(UInt64Array),
    Float32(Float32Array),
    Float64(Float64Array),
    Date32(Date32Array),
    Date64(Date64Array),
    Utf8(StringArray),
    LargeUtf8(LargeStringArray),
    Binary(BinaryArray),
    LargeBinary(LargeBinaryArray),
}

/// True when `kind` has a specialised key kernel.
pub(crate) fn has_key_kernel(kind: ValueKind) -> bool {
    KeyColumn::supports(kind)
}

/// Hash strategy over join keys pre-resolved to concrete array types.
///
/// Created through [`CompiledStrategyFactory::create`](super::CompiledStrategyFactory::create).
/// Key columns are stored row-major by batch so one probe touches a single
/// `Vec`.
#[derive(Debug)]
pub struct CompiledHashStrategy {
    channels: StrategyChannels,
    key_kinds: Vec<ValueKind>,
    /// `keys[batch][key]`
    keys: Vec<Vec<KeyColumn>>,
}

impl CompiledHashStrategy {
    pub(crate) fn try_new(
        kinds: Vec<ValueKind>,
        channels: Vec<Vec<ArrayRef>>,
        options: &HashStrategyOptions,
    ) -> Result<Self> {
        let channels = StrategyChannels::try_new(kinds, channels, options)?;
        let key_kinds = channels.key_kinds();
        if let Some(kind) = key_kinds.iter().find(|&&kind| !KeyColumn::supports(kind)) {
            return Err(Error::compilation(format!(
                "no specialised key kernel for {kind:?}"
            )));
        }

        let batch_count = channels.channels.first().map_or(0, Vec::len);
        let keys = (0..batch_count)
            .map(|batch| {
                channels
                    .join_channels
                    .iter()
                    .zip(&key_kinds)
                    .map(|(&channel, &kind)| {
                        KeyColumn::try_new(kind, &channels.channels[channel][batch])
                    })
                    .collect::<Result<Vec<KeyColumn>>>()
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            channels,
            key_kinds,
            keys,
        })
    }

    fn keys_match(
        &self,
        left_batch: usize,
        left_position: usize,
        right_position: usize,
        right_keys: &[ArrayRef],
        nulls_match: bool,
    ) -> bool {
        self.keys[left_batch]
            .iter()
            .zip(right_keys)
            .all(|(left, right)| {
                match (left.is_null(left_position), right.is_null(right_position)) {
                    (true, true) => nulls_match,
                    (false, false) => {
                        left.equals_probe(left_position, right.as_ref(), right_position)
                    }
                    _ => false,
                }
            })
    }

    fn positions_match(
        &self,
        left_batch: usize,
        left_position: usize,
        right_batch: usize,
        right_position: usize,
        nulls_match: bool,
    ) -> bool {
        self.keys[left_batch]
            .iter()
            .zip(&self.keys[right_batch])
            .all(|(left, right)| {
                match (left.is_null(left_position), right.is_null(right_position)) {
                    (true, true) => nulls_match,
                    (false, false) => left.equals(left_position, right, right_position),
                    _ => false,
                }
            })
    }
}

impl HashStrategy for CompiledHashStrategy {
    fn channel_count(&self) -> usize {
        self.channels.output_channels.len()
    }

    fn size_in_bytes(&self) -> usize {
        self.channels.size_in_bytes()
            + self
                .keys
                .iter()
                .map(|keys| keys.capacity() * size_of::<KeyColumn>())
                .sum::<usize>()
    }

    fn append_to(
        &self,
        batch: usize,
        position: usize,
        builder: &mut BatchBuilder,
        output_channel_offset: usize,
    ) -> Result<()> {
        self.channels
            .append_to(batch, position, builder, output_channel_offset)
    }

    fn hash_position(&self, batch: usize, position: usize) -> u64 {
        if let Some(hash) = self.channels.precomputed_hash(batch, position) {
            return hash;
        }
        self.keys[batch].iter().fold(0, |hash, key| {
            let value_hash = if key.is_null(position) {
                0
            } else {
                key.hash(position)
            };
            combine_hash(hash, value_hash)
        })
    }

    fn hash_row(&self, position: usize, probe_keys: &[ArrayRef]) -> u64 {
        self.key_kinds
            .iter()
            .zip(probe_keys)
            .fold(0, |hash, (&kind, probe)| {
                let value_hash = if probe.is_null(position) {
                    0
                } else {
                    KeyColumn::hash_probe(kind, probe.as_ref(), position)
                };
                combine_hash(hash, value_hash)
            })
    }

    fn position_equals_row(
        &self,
        left_batch: usize,
        left_position: usize,
        right_position: usize,
        right_keys: &[ArrayRef],
    ) -> bool {
        self.keys_match(left_batch, left_position, right_position, right_keys, false)
    }

    fn position_not_distinct_from_row(
        &self,
        left_batch: usize,
        left_position: usize,
        right_position: usize,
        right_keys: &[ArrayRef],
    ) -> bool {
        self.keys_match(left_batch, left_position, right_position, right_keys, true)
    }

    fn position_equals_position(
        &self,
        left_batch: usize,
        left_position: usize,
        right_batch: usize,
        right_position: usize,
    ) -> bool {
        self.positions_match(left_batch, left_position, right_batch, right_position, false)
    }

    fn position_not_distinct_from_position(
        &self,
        left_batch: usize,
        left_position: usize,
        right_batch: usize,
        right_position: usize,
    ) -> bool {
        self.positions_match(left_batch, left_position, right_batch, right_position, true)
    }

    fn is_position_null(&self, batch: usize, position: usize) -> bool {
        self.keys[batch].iter().any(|key| key.is_null(position))
    }

    fn compare_sort_channel_positions(
        &self,
        left_batch: usize,
        left_position: usize,
        right_batch: usize,
        right_position: usize,
    ) -> Ordering {
        self.channels
            .compare_sort(left_batch, left_position, right_batch, right_position)
    }

    fn is_sort_channel_position_null(&self, batch: usize, position: usize) -> bool {
        self.channels.is_sort_null(batch, position)
    }
}
