use std::sync::Arc;

use arrow::array::{Array, ArrayRef, AsArray, Int64Array, StringArray};
use arrow::datatypes::{DataType, Int64Type};
use arrow::record_batch::RecordBatch;
use colbatch::{
    BatchBuilder, BatchIndexConfig, BatchIndexFactory, BatchIndexLookupExt, JoinProbe,
    LookupSource, PositionsAppender, SortOrder,
};
use colbatch_test_utils::{keyed_batch, keyed_types};

/// Hash join of an orders batch against a customers index, projected
/// through a positions appender on the probe side and the lookup source on
/// the build side.
fn join_orders(config: BatchIndexConfig) -> RecordBatch {
    let factory = BatchIndexFactory::new(config).unwrap();
    let mut customers = factory.new_batch_index(keyed_types(), 4).unwrap();
    customers
        .add_batch(&keyed_batch(&[Some(1), Some(2)], &[Some("ada"), Some("bob")]))
        .unwrap();
    customers
        .add_batch(&keyed_batch(&[Some(3), None], &[Some("cy"), Some("nobody")]))
        .unwrap();
    let source = customers.create_lookup_source(&[0]).unwrap();
    customers.clear();

    let order_ids: ArrayRef = Arc::new(Int64Array::from(vec![100, 101, 102, 103]));
    let customer_ids: ArrayRef = Arc::new(Int64Array::from(vec![Some(2), Some(9), None, Some(1)]));
    let orders = RecordBatch::try_from_iter(vec![("order", order_ids), ("customer", customer_ids)])
        .unwrap();
    let probe = JoinProbe::try_new(&orders, vec![1], None).unwrap();
    let matches = source.join_matches(&probe).unwrap();

    let probe_positions: Vec<usize> = matches.iter().map(|m| m.probe_position).collect();
    let mut order_appender = PositionsAppender::new(&DataType::Int64, matches.len());
    order_appender
        .append(&probe_positions, orders.column(0).as_ref())
        .unwrap();
    let order_column = order_appender.build().unwrap();

    let mut builder = BatchBuilder::for_types(&keyed_types(), 1024, usize::MAX).unwrap();
    for m in &matches {
        source.append_to(m.join_position, &mut builder, 0).unwrap();
        builder.declare_position();
    }
    let customer_batch = builder.build().unwrap();

    let mut columns = vec![order_column];
    columns.extend(customer_batch.columns().iter().cloned());
    RecordBatch::try_from_iter(vec![
        ("order", columns[0].clone()),
        ("customer", columns[1].clone()),
        ("name", columns[2].clone()),
    ])
    .unwrap()
}

#[test]
fn join_output_matches_for_both_strategies() {
    let compiled = join_orders(BatchIndexConfig::default());
    let interpreted = join_orders(BatchIndexConfig::default().with_compiled_strategies(false));
    assert_eq!(compiled, interpreted);

    assert_eq!(compiled.num_rows(), 2);
    let orders = compiled.column(0).as_primitive::<Int64Type>();
    let names = compiled.column(2).as_string::<i32>();
    assert_eq!(orders.values().as_ref(), &[100, 103]);
    assert_eq!(names.value(0), "bob");
    assert_eq!(names.value(1), "ada");
}

#[test]
fn sort_then_gather_with_appender() {
    let factory =
        BatchIndexFactory::new(BatchIndexConfig::default().with_eager_compaction(true)).unwrap();
    let mut index = factory.new_batch_index(keyed_types(), 5).unwrap();
    index
        .add_batch(&keyed_batch(&[Some(5), None, Some(1)], &[Some("e"), Some("n"), Some("a")]))
        .unwrap();
    index
        .add_batch(&keyed_batch(&[Some(3), Some(4)], &[Some("c"), Some("d")]))
        .unwrap();
    index.sort(&[0], &[SortOrder::DescNullsFirst]).unwrap();

    let sorted: Vec<RecordBatch> = index.sorted_batches().unwrap().map(Result::unwrap).collect();
    assert_eq!(sorted.len(), 1);
    let names = sorted[0].column(1).as_string::<i32>();
    let order: Vec<&str> = (0..names.len()).map(|i| names.value(i)).collect();
    assert_eq!(order, vec!["n", "e", "d", "c", "a"]);

    // Gather the non-null keys of the sorted output in reverse.
    let keys = sorted[0].column(0);
    let mut appender = PositionsAppender::new(keys.data_type(), 4);
    appender.append(&[4, 3, 2, 1], keys.as_ref()).unwrap();
    let gathered = appender.build().unwrap();
    assert_eq!(
        gathered.as_primitive::<Int64Type>().values().as_ref(),
        &[1, 3, 4, 5]
    );

    // Constant column through the run path.
    let constant: ArrayRef = Arc::new(StringArray::from(vec!["x"; 3]));
    let mut runs = PositionsAppender::new(&DataType::Utf8, 3);
    runs.append_run(constant.as_ref()).unwrap();
    assert_eq!(runs.position_count(), 3);
    assert_eq!(runs.build().unwrap().as_string::<i32>().value(2), "x");
}
