use arrow::array::{Array, ArrayRef, AsArray};
use arrow::datatypes::{DataType, Int16Type, Int32Type, Int64Type, RunEndIndexType};
use colbatch_result::{Error, Result};

/// Single-value array holding the value a run-length input repeats.
///
/// Run-end-encoded arrays resolve their first logical value through the run
/// ends; any other array is treated as a constant column and its first
/// position is used.
pub(crate) fn run_value(source: &dyn Array) -> Result<ArrayRef> {
    match source.data_type() {
        DataType::RunEndEncoded(run_ends, _) => match run_ends.data_type() {
            DataType::Int16 => first_run_value::<Int16Type>(source),
            DataType::Int32 => first_run_value::<Int32Type>(source),
            DataType::Int64 => first_run_value::<Int64Type>(source),
            other => Err(Error::InvalidArgumentError(format!(
                "unsupported run end type {other}"
            ))),
        },
        _ => Ok(source.slice(0, 1)),
    }
}

/// Logical value type of a run input.
pub(crate) fn run_value_type(source: &dyn Array) -> &DataType {
    match source.data_type() {
        DataType::RunEndEncoded(_, values) => values.data_type(),
        other => other,
    }
}

fn first_run_value<R: RunEndIndexType>(source: &dyn Array) -> Result<ArrayRef> {
    let run = source.as_run_opt::<R>().ok_or_else(|| {
        Error::Internal(format!(
            "array of type {} is not run-end encoded",
            source.data_type()
        ))
    })?;
    let physical = run.get_physical_index(0);
    Ok(run.values().slice(physical, 1))
}

pub(crate) fn check_positions(positions: &[usize], source_len: usize) -> Result<()> {
    if let Some(&max) = positions.iter().max()
        && max >= source_len
    {
        return Err(Error::InvalidArgumentError(format!(
            "position {max} out of bounds for column of length {source_len}"
        )));
    }
    Ok(())
}

pub(crate) fn type_mismatch(expected: &DataType, found: &DataType) -> Error {
    Error::InvalidArgumentError(format!(
        "appender for {expected} cannot read a {found} column"
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::{Int32Array, Int64Array, RunArray};
    use std::sync::Arc;

    #[test]
    fn resolves_run_end_encoded_value() {
        let values = Int64Array::from(vec![Some(7)]);
        let run_ends = Int32Array::from(vec![5]);
        let run = RunArray::<Int32Type>::try_new(&run_ends, &values).unwrap();

        let value = run_value(&run).unwrap();
        assert_eq!(value.len(), 1);
        assert_eq!(value.as_primitive::<Int64Type>().value(0), 7);
        assert_eq!(run_value_type(&run), &DataType::Int64);
    }

    #[test]
    fn constant_column_uses_first_position() {
        let constant: ArrayRef = Arc::new(Int64Array::from(vec![3, 3, 3]));
        let value = run_value(constant.as_ref()).unwrap();
        assert_eq!(value.as_primitive::<Int64Type>().value(0), 3);
    }

    #[test]
    fn out_of_bounds_positions_are_rejected() {
        assert!(check_positions(&[0, 2], 3).is_ok());
        assert!(check_positions(&[3], 3).is_err());
    }
}
