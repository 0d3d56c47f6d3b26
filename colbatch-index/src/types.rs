//! Type operator registry.
//!
//! Every channel of a batch index is resolved once to a [`ValueKind`], and all
//! per-value work (hashing, equality, ordering, typed reads, appending into an
//! Arrow builder) dispatches on that kind. The hash functions here are the
//! canonical ones: both hash strategies and every lookup source agree on them.

use std::cmp::Ordering;
use std::hash::{Hash, Hasher};

use arrow::array::{
    Array, ArrayBuilder, AsArray, BooleanBuilder, FixedSizeListBuilder, Float64Builder,
    GenericByteBuilder, PrimitiveBuilder,
};
use arrow::compute::SortOptions;
use arrow::datatypes::{
    ArrowNativeType, ArrowPrimitiveType, BinaryType, ByteArrayType, DataType, Date32Type,
    Date64Type, Float32Type, Float64Type, Int8Type, Int16Type, Int32Type, Int64Type,
    LargeBinaryType, LargeUtf8Type, UInt8Type, UInt16Type, UInt32Type, UInt64Type, Utf8Type,
};
use colbatch_result::{Error, Result};
use rustc_hash::FxHasher;

/// Physical value representation of a channel.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ValueKind {
    Boolean,
    Int8,
    Int16,
    Int32,
    Int64,
    UInt8,
    UInt16,
    UInt32,
    UInt64,
    Float32,
    Float64,
    Date32,
    Date64,
    Utf8,
    LargeUtf8,
    Binary,
    LargeBinary,
    /// `FixedSizeList<Float64>` of width 2 (a point `x, y`) or width 4 (a
    /// rectangle `min_x, min_y, max_x, max_y`).
    Envelope,
    /// Any other Arrow type. Values are retained and copied out, but have no
    /// value operators, so they cannot key a join or a search.
    Stored,
}

/// Expands `$integer`, `$float` or `$bytes` with the matching Arrow type
/// bound to the given alias.
macro_rules! dispatch_kind {
    (
        $kind:expr,
        boolean => $boolean:expr,
        integer($it:ident) => $integer:expr,
        float($ft:ident) => $float:expr,
        bytes($bt:ident) => $bytes:expr,
        envelope => $envelope:expr,
        stored => $stored:expr $(,)?
    ) => {
        match $kind {
            ValueKind::Boolean => $boolean,
            ValueKind::Int8 => {
                type $it = Int8Type;
                $integer
            }
            ValueKind::Int16 => {
                type $it = Int16Type;
                $integer
            }
            ValueKind::Int32 => {
                type $it = Int32Type;
                $integer
            }
            ValueKind::Int64 => {
                type $it = Int64Type;
                $integer
            }
            ValueKind::UInt8 => {
                type $it = UInt8Type;
                $integer
            }
            ValueKind::UInt16 => {
                type $it = UInt16Type;
                $integer
            }
            ValueKind::UInt32 => {
                type $it = UInt32Type;
                $integer
            }
            ValueKind::UInt64 => {
                type $it = UInt64Type;
                $integer
            }
            ValueKind::Date32 => {
                type $it = Date32Type;
                $integer
            }
            ValueKind::Date64 => {
                type $it = Date64Type;
                $integer
            }
            ValueKind::Float32 => {
                type $ft = Float32Type;
                $float
            }
            ValueKind::Float64 => {
                type $ft = Float64Type;
                $float
            }
            ValueKind::Utf8 => {
                type $bt = Utf8Type;
                $bytes
            }
            ValueKind::LargeUtf8 => {
                type $bt = LargeUtf8Type;
                $bytes
            }
            ValueKind::Binary => {
                type $bt = BinaryType;
                $bytes
            }
            ValueKind::LargeBinary => {
                type $bt = LargeBinaryType;
                $bytes
            }
            ValueKind::Envelope => $envelope,
            ValueKind::Stored => $stored,
        }
    };
}

impl ValueKind {
    /// Resolve the kind for `data_type`. Types without value operators resolve
    /// to [`ValueKind::Stored`].
    pub fn of(data_type: &DataType) -> Self {
        match data_type {
            DataType::Boolean => Self::Boolean,
            DataType::Int8 => Self::Int8,
            DataType::Int16 => Self::Int16,
            DataType::Int32 => Self::Int32,
            DataType::Int64 => Self::Int64,
            DataType::UInt8 => Self::UInt8,
            DataType::UInt16 => Self::UInt16,
            DataType::UInt32 => Self::UInt32,
            DataType::UInt64 => Self::UInt64,
            DataType::Float32 => Self::Float32,
            DataType::Float64 => Self::Float64,
            DataType::Date32 => Self::Date32,
            DataType::Date64 => Self::Date64,
            DataType::Utf8 => Self::Utf8,
            DataType::LargeUtf8 => Self::LargeUtf8,
            DataType::Binary => Self::Binary,
            DataType::LargeBinary => Self::LargeBinary,
            DataType::FixedSizeList(field, 2 | 4) if field.data_type() == &DataType::Float64 => {
                Self::Envelope
            }
            _ => Self::Stored,
        }
    }

    /// Resolve kinds for a whole channel list.
    pub fn of_all(types: &[DataType]) -> Vec<Self> {
        types.iter().map(Self::of).collect()
    }

    /// False for [`ValueKind::Stored`], whose values cannot be hashed,
    /// compared or read through the typed getters.
    pub fn has_operators(self) -> bool {
        self != Self::Stored
    }

    pub fn is_integer(self) -> bool {
        matches!(
            self,
            Self::Int8
                | Self::Int16
                | Self::Int32
                | Self::Int64
                | Self::UInt8
                | Self::UInt16
                | Self::UInt32
                | Self::UInt64
                | Self::Date32
                | Self::Date64
        )
    }

    pub fn is_float(self) -> bool {
        matches!(self, Self::Float32 | Self::Float64)
    }

    pub fn is_bytes(self) -> bool {
        matches!(
            self,
            Self::Utf8 | Self::LargeUtf8 | Self::Binary | Self::LargeBinary
        )
    }

    /// Hash of the non-null value at `position`.
    pub fn hash(self, array: &dyn Array, position: usize) -> u64 {
        dispatch_kind!(self,
            boolean => array
                .as_boolean_opt()
                .map_or(0, |array| hash_integer(array.value(position))),
            integer(T) => array
                .as_primitive_opt::<T>()
                .map_or(0, |array| hash_integer(array.value(position))),
            float(T) => array
                .as_primitive_opt::<T>()
                .map_or(0, |array| hash_float(f64::from(array.value(position)))),
            bytes(B) => array
                .as_bytes_opt::<B>()
                .map_or(0, |array| hash_bytes(AsRef::<[u8]>::as_ref(array.value(position)))),
            envelope => envelope_coordinates(array, position).map_or(0, |coordinates| {
                coordinates
                    .iter()
                    .fold(0, |hash, &value| combine_hash(hash, hash_float(value)))
            }),
            stored => 0,
        )
    }

    /// Value equality of two non-null positions. Floats compare equal when both
    /// are NaN, and `-0.0` equals `0.0`, matching [`ValueKind::hash`].
    pub fn equal(
        self,
        left: &dyn Array,
        left_position: usize,
        right: &dyn Array,
        right_position: usize,
    ) -> bool {
        dispatch_kind!(self,
            boolean => match (left.as_boolean_opt(), right.as_boolean_opt()) {
                (Some(l), Some(r)) => l.value(left_position) == r.value(right_position),
                _ => false,
            },
            integer(T) => match (left.as_primitive_opt::<T>(), right.as_primitive_opt::<T>()) {
                (Some(l), Some(r)) => l.value(left_position) == r.value(right_position),
                _ => false,
            },
            float(T) => match (left.as_primitive_opt::<T>(), right.as_primitive_opt::<T>()) {
                (Some(l), Some(r)) => float_equal(
                    f64::from(l.value(left_position)),
                    f64::from(r.value(right_position)),
                ),
                _ => false,
            },
            bytes(B) => match (left.as_bytes_opt::<B>(), right.as_bytes_opt::<B>()) {
                (Some(l), Some(r)) => {
                    let l: &[u8] = l.value(left_position).as_ref();
                    let r: &[u8] = r.value(right_position).as_ref();
                    l == r
                }
                _ => false,
            },
            envelope => match (
                envelope_coordinates(left, left_position),
                envelope_coordinates(right, right_position),
            ) {
                (Some(l), Some(r)) => {
                    l.len() == r.len() && l.iter().zip(r).all(|(&a, &b)| float_equal(a, b))
                }
                _ => false,
            },
            stored => false,
        )
    }

    /// Total order of two non-null positions, ascending.
    pub fn compare(
        self,
        left: &dyn Array,
        left_position: usize,
        right: &dyn Array,
        right_position: usize,
    ) -> Ordering {
        dispatch_kind!(self,
            boolean => match (left.as_boolean_opt(), right.as_boolean_opt()) {
                (Some(l), Some(r)) => l.value(left_position).cmp(&r.value(right_position)),
                _ => Ordering::Equal,
            },
            integer(T) => match (left.as_primitive_opt::<T>(), right.as_primitive_opt::<T>()) {
                (Some(l), Some(r)) => l.value(left_position).cmp(&r.value(right_position)),
                _ => Ordering::Equal,
            },
            float(T) => match (left.as_primitive_opt::<T>(), right.as_primitive_opt::<T>()) {
                (Some(l), Some(r)) => f64::from(l.value(left_position))
                    .total_cmp(&f64::from(r.value(right_position))),
                _ => Ordering::Equal,
            },
            bytes(B) => match (left.as_bytes_opt::<B>(), right.as_bytes_opt::<B>()) {
                (Some(l), Some(r)) => {
                    let l: &[u8] = l.value(left_position).as_ref();
                    let r: &[u8] = r.value(right_position).as_ref();
                    l.cmp(r)
                }
                _ => Ordering::Equal,
            },
            envelope => match (
                envelope_coordinates(left, left_position),
                envelope_coordinates(right, right_position),
            ) {
                (Some(l), Some(r)) => l
                    .iter()
                    .zip(r)
                    .map(|(a, b)| a.total_cmp(b))
                    .find(|ordering| ordering.is_ne())
                    .unwrap_or_else(|| l.len().cmp(&r.len())),
                _ => Ordering::Equal,
            },
            stored => Ordering::Equal,
        )
    }

    /// Append the value (or null) at `position` to `builder`, which must be
    /// the Arrow builder for this kind. Returns the bytes the value occupies.
    ///
    /// Stored values have no typed builder path; [`BatchBuilder`] copies them
    /// as slices instead.
    ///
    /// [`BatchBuilder`]: crate::BatchBuilder
    pub fn append(
        self,
        array: &dyn Array,
        position: usize,
        builder: &mut dyn ArrayBuilder,
    ) -> Result<usize> {
        dispatch_kind!(self,
            boolean => {
                let source = array
                    .as_boolean_opt()
                    .ok_or_else(|| self.array_mismatch(array))?;
                let builder = downcast_builder::<BooleanBuilder>(builder, self)?;
                if source.is_null(position) {
                    builder.append_null();
                } else {
                    builder.append_value(source.value(position));
                }
                Ok(1)
            },
            integer(T) => append_primitive::<T>(self, array, position, builder),
            float(T) => append_primitive::<T>(self, array, position, builder),
            bytes(B) => {
                let source = array
                    .as_bytes_opt::<B>()
                    .ok_or_else(|| self.array_mismatch(array))?;
                let builder = downcast_builder::<GenericByteBuilder<B>>(builder, self)?;
                if source.is_null(position) {
                    builder.append_null();
                    Ok(size_of::<<B as ByteArrayType>::Offset>())
                } else {
                    let value = source.value(position);
                    builder.append_value(value);
                    let value: &[u8] = value.as_ref();
                    Ok(size_of::<<B as ByteArrayType>::Offset>() + value.len())
                }
            },
            envelope => append_envelope(self, array, position, builder),
            stored => Err(Error::UnsupportedType(array.data_type().clone())),
        )
    }

    pub fn get_boolean(self, array: &dyn Array, position: usize) -> Result<bool> {
        match self {
            Self::Boolean => array
                .as_boolean_opt()
                .map(|array| array.value(position))
                .ok_or_else(|| self.array_mismatch(array)),
            _ => Err(self.unsupported_read("boolean")),
        }
    }

    /// Integer and date kinds widened to `i64`.
    pub fn get_long(self, array: &dyn Array, position: usize) -> Result<i64> {
        match self {
            Self::Int8 => self.read_long::<Int8Type>(array, position),
            Self::Int16 => self.read_long::<Int16Type>(array, position),
            Self::Int32 => self.read_long::<Int32Type>(array, position),
            Self::Int64 => self.read_long::<Int64Type>(array, position),
            Self::UInt8 => self.read_long::<UInt8Type>(array, position),
            Self::UInt16 => self.read_long::<UInt16Type>(array, position),
            Self::UInt32 => self.read_long::<UInt32Type>(array, position),
            Self::UInt64 => self.read_long::<UInt64Type>(array, position),
            Self::Date32 => self.read_long::<Date32Type>(array, position),
            Self::Date64 => self.read_long::<Date64Type>(array, position),
            _ => Err(self.unsupported_read("long")),
        }
    }

    pub fn get_double(self, array: &dyn Array, position: usize) -> Result<f64> {
        let value = match self {
            Self::Float32 => array
                .as_primitive_opt::<Float32Type>()
                .map(|array| f64::from(array.value(position))),
            Self::Float64 => array
                .as_primitive_opt::<Float64Type>()
                .map(|array| array.value(position)),
            _ => return Err(self.unsupported_read("double")),
        };
        value.ok_or_else(|| self.array_mismatch(array))
    }

    pub fn get_bytes(self, array: &dyn Array, position: usize) -> Result<&[u8]> {
        let value: Option<&[u8]> = match self {
            Self::Utf8 => array
                .as_string_opt::<i32>()
                .map(|array| array.value(position).as_bytes()),
            Self::LargeUtf8 => array
                .as_string_opt::<i64>()
                .map(|array| array.value(position).as_bytes()),
            Self::Binary => array
                .as_binary_opt::<i32>()
                .map(|array| array.value(position)),
            Self::LargeBinary => array
                .as_binary_opt::<i64>()
                .map(|array| array.value(position)),
            _ => return Err(self.unsupported_read("bytes")),
        };
        value.ok_or_else(|| self.array_mismatch(array))
    }

    fn read_long<T: ArrowPrimitiveType>(self, array: &dyn Array, position: usize) -> Result<i64> {
        let value = array
            .as_primitive_opt::<T>()
            .ok_or_else(|| self.array_mismatch(array))?
            .value(position);
        value.to_i64().ok_or_else(|| {
            Error::InvalidArgumentError(format!("value {value:?} does not fit in i64"))
        })
    }

    fn unsupported_read(self, accessor: &str) -> Error {
        Error::InvalidArgumentError(format!("{self:?} values cannot be read as {accessor}"))
    }

    fn array_mismatch(self, array: &dyn Array) -> Error {
        Error::InvalidArgumentError(format!(
            "expected a {self:?} column, found {}",
            array.data_type()
        ))
    }
}

/// Fold one value hash into a running row hash.
#[inline]
pub fn combine_hash(previous: u64, value_hash: u64) -> u64 {
    previous.wrapping_mul(31).wrapping_add(value_hash)
}

/// Canonical row hash over `columns` at `position`. Nulls contribute 0.
pub fn hash_row(kinds: &[ValueKind], columns: &[&dyn Array], position: usize) -> u64 {
    kinds.iter().zip(columns).fold(0, |hash, (kind, column)| {
        let value_hash = if column.is_null(position) {
            0
        } else {
            ValueKind::hash(*kind, *column, position)
        };
        combine_hash(hash, value_hash)
    })
}

#[inline]
pub(crate) fn hash_integer<N: Hash>(value: N) -> u64 {
    let mut hasher = FxHasher::default();
    value.hash(&mut hasher);
    hasher.finish()
}

#[inline]
pub(crate) fn hash_float(value: f64) -> u64 {
    let canonical = if value == 0.0 {
        0.0
    } else if value.is_nan() {
        f64::NAN
    } else {
        value
    };
    hash_integer(canonical.to_bits())
}

#[inline]
pub(crate) fn hash_bytes(value: &[u8]) -> u64 {
    let mut hasher = FxHasher::default();
    hasher.write(value);
    hasher.finish()
}

#[inline]
pub(crate) fn float_equal(left: f64, right: f64) -> bool {
    left == right || (left.is_nan() && right.is_nan())
}

/// Coordinates of the envelope at `position`: `[x, y]` for a point or
/// `[min_x, min_y, max_x, max_y]` for a rectangle.
pub fn envelope_coordinates(array: &dyn Array, position: usize) -> Option<&[f64]> {
    let list = array.as_fixed_size_list_opt()?;
    let values = list.values().as_primitive_opt::<Float64Type>()?;
    let width = usize::try_from(list.value_length()).ok()?;
    let start = usize::try_from(list.value_offset(position)).ok()?;
    values.values().get(start..start + width)
}

fn downcast_builder<B: ArrayBuilder>(
    builder: &mut dyn ArrayBuilder,
    kind: ValueKind,
) -> Result<&mut B> {
    builder.as_any_mut().downcast_mut::<B>().ok_or_else(|| {
        Error::InvalidArgumentError(format!("output builder cannot hold {kind:?} values"))
    })
}

fn append_primitive<T: ArrowPrimitiveType>(
    kind: ValueKind,
    array: &dyn Array,
    position: usize,
    builder: &mut dyn ArrayBuilder,
) -> Result<usize> {
    let source = array
        .as_primitive_opt::<T>()
        .ok_or_else(|| kind.array_mismatch(array))?;
    let builder = downcast_builder::<PrimitiveBuilder<T>>(builder, kind)?;
    if source.is_null(position) {
        builder.append_null();
    } else {
        builder.append_value(source.value(position));
    }
    Ok(size_of::<T::Native>())
}

fn append_envelope(
    kind: ValueKind,
    array: &dyn Array,
    position: usize,
    builder: &mut dyn ArrayBuilder,
) -> Result<usize> {
    let list = array
        .as_fixed_size_list_opt()
        .ok_or_else(|| kind.array_mismatch(array))?;
    let width = usize::try_from(list.value_length())
        .map_err(|_| kind.array_mismatch(array))?;
    let coordinates = if list.is_null(position) {
        None
    } else {
        Some(envelope_coordinates(array, position).ok_or_else(|| kind.array_mismatch(array))?)
    };

    // `make_builder` yields boxed child builders; hand-built ones are typed.
    let any = builder.as_any_mut();
    if any.is::<FixedSizeListBuilder<Float64Builder>>() {
        let list_builder = downcast_builder::<FixedSizeListBuilder<Float64Builder>>(builder, kind)?;
        push_envelope(list_builder.values(), coordinates, width);
        list_builder.append(coordinates.is_some());
    } else {
        let list_builder =
            downcast_builder::<FixedSizeListBuilder<Box<dyn ArrayBuilder>>>(builder, kind)?;
        let values: &mut dyn ArrayBuilder = list_builder.values().as_mut();
        let values = downcast_builder::<Float64Builder>(values, kind)?;
        push_envelope(values, coordinates, width);
        list_builder.append(coordinates.is_some());
    }
    Ok(width * size_of::<f64>())
}

fn push_envelope(values: &mut Float64Builder, coordinates: Option<&[f64]>, width: usize) {
    match coordinates {
        Some(coordinates) => values.append_slice(coordinates),
        None => values.append_nulls(width),
    }
}

/// Sort direction and null placement for one sort channel.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SortOrder {
    AscNullsFirst,
    AscNullsLast,
    DescNullsFirst,
    DescNullsLast,
}

impl SortOrder {
    pub fn is_ascending(self) -> bool {
        matches!(self, Self::AscNullsFirst | Self::AscNullsLast)
    }

    pub fn is_nulls_first(self) -> bool {
        matches!(self, Self::AscNullsFirst | Self::DescNullsFirst)
    }

    pub fn sort_options(self) -> SortOptions {
        SortOptions {
            descending: !self.is_ascending(),
            nulls_first: self.is_nulls_first(),
        }
    }
}

impl From<SortOrder> for SortOptions {
    fn from(order: SortOrder) -> Self {
        order.sort_options()
    }
}
