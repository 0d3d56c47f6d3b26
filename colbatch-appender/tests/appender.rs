use std::sync::Arc;

use arrow::array::{
    Array, ArrayRef, AsArray, BooleanArray, Date32Array, Float64Array, Int16Array, Int32Array,
    Int64Array, LargeStringArray, ListArray, RunArray, StringArray,
};
use arrow::datatypes::{DataType, Date32Type, Float64Type, Int32Type, Int64Type};
use colbatch_appender::PositionsAppender;
use colbatch_test_utils::init_tracing_for_tests;

fn constant_columns() -> Vec<ArrayRef> {
    vec![
        Arc::new(BooleanArray::from(vec![true; 5])),
        Arc::new(Int32Array::from(vec![7; 5])),
        Arc::new(Int64Array::from(vec![Some(-3); 5])),
        Arc::new(Float64Array::from(vec![2.5; 5])),
        Arc::new(Date32Array::from(vec![19_000; 5])),
        Arc::new(StringArray::from(vec!["same"; 5])),
        Arc::new(LargeStringArray::from(vec![None::<&str>; 5])),
        Arc::new(ListArray::from_iter_primitive::<Int32Type, _, _>(vec![
            Some(vec![Some(1), Some(2)]);
            5
        ])),
    ]
}

#[test]
fn run_matches_individual_positions() {
    init_tracing_for_tests();
    for column in constant_columns() {
        let positions: Vec<usize> = (0..column.len()).collect();

        let mut by_run = PositionsAppender::new(column.data_type(), 4);
        by_run.append_run(column.as_ref()).unwrap();
        let mut by_position = PositionsAppender::new(column.data_type(), 4);
        by_position.append(&positions, column.as_ref()).unwrap();

        assert_eq!(by_run.position_count(), by_position.position_count());
        let from_run = by_run.build().unwrap();
        let from_positions = by_position.build().unwrap();
        assert_eq!(
            from_run.to_data(),
            from_positions.to_data(),
            "type {}",
            column.data_type()
        );
    }
}

#[test]
fn run_end_encoded_input_repeats_logical_value() {
    init_tracing_for_tests();
    let values = Int64Array::from(vec![Some(42)]);
    let run_ends = Int16Array::from(vec![4]);
    let run = RunArray::<arrow::datatypes::Int16Type>::try_new(&run_ends, &values).unwrap();

    let mut appender = PositionsAppender::new(&DataType::Int64, 8);
    appender.append_run(&run).unwrap();
    let built = appender.build().unwrap();
    let built = built.as_primitive::<Int64Type>();
    assert_eq!(built.values().as_ref(), &[42, 42, 42, 42]);
    assert_eq!(built.null_count(), 0);
}

#[test]
fn empty_build_resets_to_fresh_state() {
    init_tracing_for_tests();
    for data_type in [DataType::Int32, DataType::Utf8, DataType::Boolean] {
        let mut appender = PositionsAppender::new(&data_type, 10);
        let fresh_retained = appender.retained_size_in_bytes();

        let built = appender.build().unwrap();
        assert_eq!(built.len(), 0);
        assert_eq!(built.data_type(), &data_type);
        assert_eq!(appender.position_count(), 0);
        assert_eq!(appender.size_in_bytes(), 0);
        assert_eq!(appender.retained_size_in_bytes(), fresh_retained);
    }
}

#[test]
fn empty_inputs_are_no_ops() {
    init_tracing_for_tests();
    let source = Int32Array::from(vec![1, 2, 3]);
    let empty = Int32Array::from(Vec::<i32>::new());
    let mut appender = PositionsAppender::new(&DataType::Int32, 10);
    appender.append(&[], &source).unwrap();
    appender.append_run(&empty).unwrap();
    assert_eq!(appender.position_count(), 0);
    assert_eq!(appender.size_in_bytes(), 0);
}

#[test]
fn appends_accumulate_across_calls_and_cycles() {
    init_tracing_for_tests();
    let source = Float64Array::from(vec![Some(1.0), None, Some(3.0)]);
    let mut appender = PositionsAppender::new(&DataType::Float64, 2);

    appender.append(&[0, 1], &source).unwrap();
    appender.append(&[2], &source).unwrap();
    let first = appender.build().unwrap();
    let first = first.as_primitive::<Float64Type>();
    assert_eq!(first.len(), 3);
    assert_eq!(first.value(0), 1.0);
    assert!(first.is_null(1));
    assert_eq!(first.value(2), 3.0);

    appender.append(&[2, 2], &source).unwrap();
    let second = appender.build().unwrap();
    assert_eq!(second.len(), 2);
    assert_eq!(second.null_count(), 0);
}

#[test]
fn variants_follow_declared_type() {
    let cases = [
        DataType::Boolean,
        DataType::Int8,
        DataType::UInt64,
        DataType::Float32,
        DataType::Date64,
        DataType::Binary,
        DataType::LargeUtf8,
        DataType::Decimal128(12, 3),
    ];
    for data_type in cases {
        let appender = PositionsAppender::new(&data_type, 1);
        assert_eq!(appender.data_type(), data_type);
    }
    assert!(matches!(
        PositionsAppender::new(&DataType::Utf8, 1),
        PositionsAppender::Bytes(_)
    ));
    assert!(matches!(
        PositionsAppender::new(&DataType::Decimal128(12, 3), 1),
        PositionsAppender::Generic(_)
    ));
}

#[test]
fn retained_size_grows_with_capacity() {
    let source = Date32Array::from((0..200).collect::<Vec<i32>>());
    let positions: Vec<usize> = (0..200).collect();
    let mut appender = PositionsAppender::new(&DataType::Date32, 1);
    let before = appender.retained_size_in_bytes();
    appender.append(&positions, &source).unwrap();
    assert!(appender.retained_size_in_bytes() >= before + 200 * (4 + 1));

    let built = appender.build().unwrap();
    assert_eq!(built.as_primitive::<Date32Type>().value(199), 199);
    assert_eq!(appender.retained_size_in_bytes(), before);
}

#[test]
fn mismatched_source_type_fails_cleanly() {
    let strings = StringArray::from(vec!["a"]);
    let mut appender = PositionsAppender::new(&DataType::Int64, 4);
    assert!(appender.append(&[0], &strings).is_err());
    assert!(appender.append_run(&strings).is_err());
    assert_eq!(appender.position_count(), 0);

    let ints = Int64Array::from(vec![1, 2]);
    assert!(appender.append(&[0, 2], &ints).is_err());
    assert_eq!(appender.position_count(), 0);
    assert_eq!(appender.build().unwrap().len(), 0);
}
