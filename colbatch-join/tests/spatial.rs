use std::sync::Arc;

use arrow::array::{ArrayRef, AsArray, Float64Array, Int32Array};
use arrow::datatypes::{DataType, Int64Type};
use arrow::record_batch::RecordBatch;
use colbatch_index::{BatchBuilder, BatchIndex};
use colbatch_join::{
    BatchIndexLookupExt, BuildRow, Rectangle, SpatialIndexOptions, SpatialPredicate,
};
use colbatch_test_utils::{batch_of, envelope_column, init_tracing_for_tests, int64_column};

fn rect(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Option<[f64; 4]> {
    Some([min_x, min_y, max_x, max_y])
}

fn point(x: f64, y: f64) -> Option<[f64; 4]> {
    Some([x, y, x, y])
}

fn index_of(columns: Vec<ArrayRef>) -> BatchIndex {
    let batch = batch_of(columns);
    let types = batch
        .schema()
        .fields()
        .iter()
        .map(|field| field.data_type().clone())
        .collect();
    let mut index = BatchIndex::new(types, batch.num_rows()).unwrap();
    index.add_batch(&batch).unwrap();
    index
}

fn probe_of(envelopes: &[Option<[f64; 4]>]) -> RecordBatch {
    batch_of(vec![envelope_column(envelopes)])
}

#[test]
fn intersects_skips_null_geometries() {
    init_tracing_for_tests();
    let index = index_of(vec![
        envelope_column(&[rect(0.0, 0.0, 2.0, 2.0), rect(5.0, 5.0, 6.0, 6.0), None, rect(1.0, 1.0, 3.0, 3.0)]),
        int64_column(&[Some(0), Some(1), Some(2), Some(3)]),
    ]);
    let spatial = index
        .create_spatial_index(SpatialIndexOptions::new(0, SpatialPredicate::Intersects))
        .unwrap();
    assert_eq!(spatial.join_position_count(), 4);
    assert_eq!(spatial.indexed_count(), 3);

    let probe = probe_of(&[rect(1.5, 1.5, 1.6, 1.6), None, rect(20.0, 20.0, 21.0, 21.0)]);
    assert_eq!(spatial.find_join_positions(0, &probe, 0, None).unwrap(), vec![0, 3]);
    assert!(spatial.find_join_positions(1, &probe, 0, None).unwrap().is_empty());
    assert!(spatial.find_join_positions(2, &probe, 0, None).unwrap().is_empty());
}

#[test]
fn contains_and_within_are_directional() {
    let index = index_of(vec![envelope_column(&[
        rect(0.0, 0.0, 10.0, 10.0),
        rect(4.0, 4.0, 5.0, 5.0),
    ])]);
    let probe = probe_of(&[rect(3.0, 3.0, 6.0, 6.0)]);

    let contains = index
        .create_spatial_index(SpatialIndexOptions::new(0, SpatialPredicate::Contains))
        .unwrap();
    assert_eq!(contains.find_join_positions(0, &probe, 0, None).unwrap(), vec![0]);

    let within = index
        .create_spatial_index(SpatialIndexOptions::new(0, SpatialPredicate::Within))
        .unwrap();
    assert_eq!(within.find_join_positions(0, &probe, 0, None).unwrap(), vec![1]);
}

#[test]
fn distance_uses_the_build_radius() {
    let radii: ArrayRef = Arc::new(Float64Array::from(vec![Some(1.0), Some(0.5), None]));
    let index = index_of(vec![
        envelope_column(&[point(0.0, 0.0), point(3.0, 0.0), point(10.0, 10.0)]),
        radii,
    ]);
    let spatial = index
        .create_spatial_index(
            SpatialIndexOptions::new(0, SpatialPredicate::DistanceWithin).with_radius_channel(1),
        )
        .unwrap();
    assert_eq!(spatial.indexed_count(), 2);

    let probe = probe_of(&[point(0.5, 0.0), point(2.6, 0.0), point(10.0, 10.0)]);
    assert_eq!(spatial.find_join_positions(0, &probe, 0, None).unwrap(), vec![0]);
    assert_eq!(spatial.find_join_positions(1, &probe, 0, None).unwrap(), vec![1]);
    assert!(spatial.find_join_positions(2, &probe, 0, None).unwrap().is_empty());
}

#[test]
fn partitions_report_each_pair_once() {
    let partitions = vec![
        Rectangle::new(0.0, 0.0, 5.0, 10.0),
        Rectangle::new(5.0, 0.0, 10.0, 10.0),
    ];
    let build_partitions: ArrayRef = Arc::new(Int32Array::from(vec![0, 1, 1]));
    let index = index_of(vec![
        envelope_column(&[rect(4.0, 1.0, 6.0, 2.0), rect(4.0, 1.0, 6.0, 2.0), point(7.0, 1.0)]),
        build_partitions,
    ]);
    let spatial = index
        .create_spatial_index(
            SpatialIndexOptions::new(0, SpatialPredicate::Intersects).with_partitions(1, partitions),
        )
        .unwrap();

    let probe_partitions: ArrayRef = Arc::new(Int32Array::from(vec![0, 1]));
    let probe = batch_of(vec![
        envelope_column(&[rect(3.0, 1.0, 7.0, 2.0), rect(3.0, 1.0, 7.0, 2.0)]),
        probe_partitions,
    ]);
    let matches = spatial.join_matches(&probe, 0, Some(1)).unwrap();
    let pairs: Vec<(usize, usize)> = matches
        .iter()
        .map(|m| (m.probe_position, m.join_position))
        .collect();
    assert_eq!(pairs, vec![(0, 0), (1, 2)]);
    assert!(spatial.find_join_positions(0, &probe, 0, None).is_err());
}

#[test]
fn filter_and_output_projection() {
    let index = index_of(vec![
        envelope_column(&[rect(0.0, 0.0, 1.0, 1.0), rect(0.0, 0.0, 2.0, 2.0)]),
        int64_column(&[Some(100), Some(200)]),
    ]);
    let spatial = index
        .create_spatial_index(
            SpatialIndexOptions::new(0, SpatialPredicate::Intersects)
                .with_output_channels(vec![1])
                .with_filter(|row: BuildRow<'_>, _probe_position: usize, _probe: &RecordBatch| {
                    row.array(1).as_primitive::<Int64Type>().value(row.position()) > 150
                }),
        )
        .unwrap();
    let probe = probe_of(&[point(0.5, 0.5)]);
    assert_eq!(spatial.find_join_positions(0, &probe, 0, None).unwrap(), vec![0, 1]);
    let matches = spatial.join_matches(&probe, 0, None).unwrap();
    assert_eq!(matches.len(), 1);
    assert_eq!(matches[0].join_position, 1);

    assert_eq!(spatial.channel_count(), 1);
    let mut builder = BatchBuilder::for_types(&[DataType::Int64], 4, 1024).unwrap();
    spatial.append_to(matches[0].join_position, &mut builder, 0).unwrap();
    builder.declare_position();
    let output = builder.build().unwrap();
    assert_eq!(output.column(0).as_primitive::<Int64Type>().value(0), 200);
    assert!(spatial.in_memory_size_in_bytes() > 0);
}

#[test]
fn invalid_configurations_are_rejected() {
    let index = index_of(vec![
        envelope_column(&[point(0.0, 0.0)]),
        int64_column(&[Some(1)]),
    ]);
    assert!(
        index
            .create_spatial_index(SpatialIndexOptions::new(1, SpatialPredicate::Intersects))
            .is_err()
    );
    assert!(
        index
            .create_spatial_index(SpatialIndexOptions::new(0, SpatialPredicate::DistanceWithin))
            .is_err()
    );
    assert!(
        index
            .create_spatial_index(
                SpatialIndexOptions::new(0, SpatialPredicate::Intersects).with_radius_channel(1)
            )
            .is_err()
    );
    let spatial = index
        .create_spatial_index(SpatialIndexOptions::new(0, SpatialPredicate::Intersects))
        .unwrap();
    let bad_probe = batch_of(vec![int64_column(&[Some(1)])]);
    assert!(spatial.find_join_positions(0, &bad_probe, 0, None).is_err());
}

#[test]
fn partitions_and_partition_channel_come_together() {
    let partition_ids: ArrayRef = Arc::new(Int32Array::from(vec![0]));
    let index = index_of(vec![envelope_column(&[point(1.0, 1.0)]), partition_ids]);
    let grid = vec![Rectangle::new(0.0, 0.0, 10.0, 10.0)];

    let mut without_channel = SpatialIndexOptions::new(0, SpatialPredicate::Intersects);
    without_channel.partitions = grid.clone();
    assert!(index.create_spatial_index(without_channel).is_err());

    let mut without_envelopes = SpatialIndexOptions::new(0, SpatialPredicate::Intersects);
    without_envelopes.partition_channel = Some(1);
    assert!(index.create_spatial_index(without_envelopes).is_err());

    let spatial = index
        .create_spatial_index(
            SpatialIndexOptions::new(0, SpatialPredicate::Intersects).with_partitions(1, grid),
        )
        .unwrap();
    assert_eq!(spatial.join_position_count(), 1);
}
