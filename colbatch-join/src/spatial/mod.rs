//! Spatial lookup source: build envelopes packed into an R-tree and tested
//! against probe envelopes with a [`SpatialPredicate`].

mod rtree;

pub use rtree::Rectangle;

use std::fmt;

use arrow::array::{Array, ArrayRef, AsArray};
use arrow::datatypes::{Float64Type, Int32Type};
use arrow::record_batch::RecordBatch;
use colbatch_index::{
    BatchBuilder, BatchIndex, ValueKind, decode_synthetic_address, envelope_coordinates,
};
use colbatch_result::{Error, Result};

use crate::filter::{BuildRow, JoinFilterRef};
use crate::options::SpatialIndexOptions;
use crate::probe::JoinMatch;
use rtree::PackedRTree;

/// Relationship a build geometry must have with the probe geometry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SpatialPredicate {
    Intersects,
    /// The build envelope contains the probe envelope.
    Contains,
    /// The build envelope lies within the probe envelope.
    Within,
    /// The envelopes are at most the build row's radius apart.
    DistanceWithin,
}

impl SpatialPredicate {
    pub fn evaluate(self, build: &Rectangle, probe: &Rectangle, radius: f64) -> bool {
        match self {
            SpatialPredicate::Intersects => build.intersects(probe),
            SpatialPredicate::Contains => build.contains(probe),
            SpatialPredicate::Within => probe.contains(build),
            SpatialPredicate::DistanceWithin => build.distance(probe) <= radius,
        }
    }
}

impl fmt::Display for SpatialPredicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SpatialPredicate::Intersects => write!(f, "ST_Intersects"),
            SpatialPredicate::Contains => write!(f, "ST_Contains"),
            SpatialPredicate::Within => write!(f, "ST_Within"),
            SpatialPredicate::DistanceWithin => write!(f, "ST_DWithin"),
        }
    }
}

#[derive(Clone, Copy, Debug)]
struct SpatialRow {
    join_position: usize,
    envelope: Rectangle,
    radius: f64,
    partition: Option<usize>,
}

/// R-tree lookup source over the envelope channel of a batch index.
///
/// Build rows with a null geometry, radius or partition are left out. When
/// partitions are configured a row only matches probes of its own partition,
/// and a pair whose envelopes both span several partitions is reported only
/// by the partition holding the lower-left corner of their overlap.
pub struct SpatialIndex {
    channels: Vec<Vec<ArrayRef>>,
    addresses: Vec<u64>,
    output_channels: Vec<usize>,
    predicate: SpatialPredicate,
    partitions: Vec<Rectangle>,
    rows: Vec<SpatialRow>,
    tree: PackedRTree,
    filter: Option<JoinFilterRef>,
    retained_batches_size: usize,
}

impl SpatialIndex {
    pub fn try_new(index: &BatchIndex, options: SpatialIndexOptions) -> Result<Self> {
        let kinds = index.kinds();
        let channel_kind = |channel: usize, role: &str| {
            kinds.get(channel).copied().ok_or_else(|| {
                Error::InvalidArgumentError(format!(
                    "{role} channel {channel} out of range for {} channels",
                    kinds.len()
                ))
            })
        };
        if channel_kind(options.geometry_channel, "geometry")? != ValueKind::Envelope {
            return Err(Error::InvalidArgumentError(format!(
                "geometry channel {} must hold envelopes, found {}",
                options.geometry_channel,
                index.types()[options.geometry_channel]
            )));
        }
        match (options.predicate, options.radius_channel) {
            (SpatialPredicate::DistanceWithin, None) => {
                return Err(Error::InvalidArgumentError(
                    "distance predicate requires a radius channel".into(),
                ));
            }
            (SpatialPredicate::DistanceWithin, Some(channel)) => {
                if channel_kind(channel, "radius")? != ValueKind::Float64 {
                    return Err(Error::InvalidArgumentError(format!(
                        "radius channel {channel} must be Float64"
                    )));
                }
            }
            (predicate, Some(_)) => {
                return Err(Error::InvalidArgumentError(format!(
                    "radius channel is only valid with ST_DWithin, not {predicate}"
                )));
            }
            (_, None) => {}
        }
        match (options.partition_channel, options.partitions.is_empty()) {
            (Some(channel), false) => {
                if channel_kind(channel, "partition")? != ValueKind::Int32 {
                    return Err(Error::InvalidArgumentError(format!(
                        "partition channel {channel} must be Int32"
                    )));
                }
            }
            (Some(channel), true) => {
                return Err(Error::InvalidArgumentError(format!(
                    "partition channel {channel} requires partition envelopes"
                )));
            }
            (None, false) => {
                return Err(Error::InvalidArgumentError(
                    "partition envelopes require a partition channel".into(),
                ));
            }
            (None, true) => {}
        }
        let output_channels = options
            .output_channels
            .unwrap_or_else(|| (0..kinds.len()).collect());
        for &channel in &output_channels {
            channel_kind(channel, "output")?;
        }

        let channels = index.channels().to_vec();
        let addresses = index.value_addresses().to_vec();
        let mut rows = Vec::with_capacity(addresses.len());
        for (join_position, &address) in addresses.iter().enumerate() {
            let (batch, position) = decode(address);
            let geometry = channels[options.geometry_channel][batch].as_ref();
            if geometry.is_null(position) {
                continue;
            }
            let Some(envelope) =
                envelope_coordinates(geometry, position).and_then(Rectangle::from_coordinates)
            else {
                continue;
            };
            let radius = match options.radius_channel {
                Some(channel) => {
                    let radii = channels[channel][batch].as_primitive::<Float64Type>();
                    if radii.is_null(position) {
                        continue;
                    }
                    radii.value(position)
                }
                None => 0.0,
            };
            let partition = match options.partition_channel {
                Some(channel) => {
                    let ids = channels[channel][batch].as_primitive::<Int32Type>();
                    if ids.is_null(position) {
                        continue;
                    }
                    let id = ids.value(position);
                    match usize::try_from(id) {
                        Ok(id) if id < options.partitions.len() => Some(id),
                        _ => {
                            return Err(Error::InvalidArgumentError(format!(
                                "partition {id} out of range for {} partitions",
                                options.partitions.len()
                            )));
                        }
                    }
                }
                None => None,
            };
            rows.push(SpatialRow {
                join_position,
                envelope,
                radius,
                partition,
            });
        }

        let tree = PackedRTree::build(
            rows.iter()
                .enumerate()
                .map(|(row, spatial)| (spatial.envelope.expand(spatial.radius), row))
                .collect(),
        );
        let retained_batches_size = channels
            .iter()
            .flatten()
            .map(|array| array.get_array_memory_size())
            .sum();
        tracing::debug!(
            positions = addresses.len(),
            indexed = tree.len(),
            predicate = %options.predicate,
            partitions = options.partitions.len(),
            "built spatial index"
        );
        Ok(Self {
            channels,
            addresses,
            output_channels,
            predicate: options.predicate,
            partitions: options.partitions,
            rows,
            tree,
            filter: options.filter,
            retained_batches_size,
        })
    }

    pub fn predicate(&self) -> SpatialPredicate {
        self.predicate
    }

    pub fn channel_count(&self) -> usize {
        self.output_channels.len()
    }

    pub fn join_position_count(&self) -> usize {
        self.addresses.len()
    }

    /// Build rows that made it into the tree.
    pub fn indexed_count(&self) -> usize {
        self.tree.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.len() == 0
    }

    pub fn in_memory_size_in_bytes(&self) -> usize {
        size_of::<Self>()
            + self.retained_batches_size
            + self.addresses.capacity() * size_of::<u64>()
            + self.rows.capacity() * size_of::<SpatialRow>()
            + self.partitions.capacity() * size_of::<Rectangle>()
            + self.output_channels.capacity() * size_of::<usize>()
            + self.tree.size_in_bytes()
    }

    /// Join positions satisfying the predicate for one probe row, ascending.
    ///
    /// `probe_geometry_channel` must hold envelopes; `probe_partition_channel`
    /// is the probe's `Int32` partition id and is required exactly when the
    /// index was built with partitions.
    pub fn find_join_positions(
        &self,
        probe_position: usize,
        probe: &RecordBatch,
        probe_geometry_channel: usize,
        probe_partition_channel: Option<usize>,
    ) -> Result<Vec<usize>> {
        let geometry = probe_column(probe, probe_geometry_channel)?;
        if ValueKind::of(geometry.data_type()) != ValueKind::Envelope {
            return Err(Error::InvalidArgumentError(format!(
                "probe geometry channel {probe_geometry_channel} must hold envelopes, found {}",
                geometry.data_type()
            )));
        }
        let partitioned = !self.partitions.is_empty();
        let probe_partition = match (partitioned, probe_partition_channel) {
            (true, Some(channel)) => {
                let ids = probe_column(probe, channel)?;
                let Some(ids) = ids.as_primitive_opt::<Int32Type>() else {
                    return Err(Error::InvalidArgumentError(format!(
                        "probe partition channel {channel} must be Int32, found {}",
                        ids.data_type()
                    )));
                };
                if ids.is_null(probe_position) {
                    return Ok(Vec::new());
                }
                usize::try_from(ids.value(probe_position)).ok()
            }
            (true, None) => {
                return Err(Error::InvalidArgumentError(
                    "partitioned spatial index needs a probe partition channel".into(),
                ));
            }
            (false, _) => None,
        };
        if geometry.is_null(probe_position) {
            return Ok(Vec::new());
        }
        let Some(probe_envelope) = envelope_coordinates(geometry.as_ref(), probe_position)
            .and_then(Rectangle::from_coordinates)
        else {
            return Ok(Vec::new());
        };
        let partition = match probe_partition {
            Some(id) => match self.partitions.get(id) {
                Some(extent) => Some((id, extent)),
                None => return Ok(Vec::new()),
            },
            None if partitioned => return Ok(Vec::new()),
            None => None,
        };

        let mut positions = Vec::new();
        self.tree.query(&probe_envelope, |search_envelope, row| {
            let row = &self.rows[row];
            if let Some((id, extent)) = partition {
                if row.partition != Some(id) {
                    return;
                }
                let either_point = probe_envelope.is_point() || row.envelope.is_point();
                if !either_point && !reference_point_in(&probe_envelope, search_envelope, extent) {
                    return;
                }
            }
            if self
                .predicate
                .evaluate(&row.envelope, &probe_envelope, row.radius)
            {
                positions.push(row.join_position);
            }
        });
        positions.sort_unstable();
        Ok(positions)
    }

    pub fn is_join_position_eligible(
        &self,
        join_position: usize,
        probe_position: usize,
        probe: &RecordBatch,
    ) -> bool {
        let Some(filter) = &self.filter else {
            return true;
        };
        let (batch, position) = decode(self.addresses[join_position]);
        filter.filter(
            BuildRow::new(&self.channels, batch, position),
            probe_position,
            probe,
        )
    }

    /// Every eligible pair of a probe batch, in probe order.
    pub fn join_matches(
        &self,
        probe: &RecordBatch,
        probe_geometry_channel: usize,
        probe_partition_channel: Option<usize>,
    ) -> Result<Vec<JoinMatch>> {
        let mut matches = Vec::new();
        for probe_position in 0..probe.num_rows() {
            let positions = self.find_join_positions(
                probe_position,
                probe,
                probe_geometry_channel,
                probe_partition_channel,
            )?;
            matches.extend(
                positions
                    .into_iter()
                    .filter(|&join_position| {
                        self.is_join_position_eligible(join_position, probe_position, probe)
                    })
                    .map(|join_position| JoinMatch {
                        probe_position,
                        join_position,
                    }),
            );
        }
        Ok(matches)
    }

    pub fn append_to(
        &self,
        join_position: usize,
        builder: &mut BatchBuilder,
        output_channel_offset: usize,
    ) -> Result<()> {
        let address = *self.addresses.get(join_position).ok_or_else(|| {
            Error::InvalidArgumentError(format!(
                "join position {join_position} out of range for {} positions",
                self.addresses.len()
            ))
        })?;
        let (batch, position) = decode(address);
        for (i, &channel) in self.output_channels.iter().enumerate() {
            builder.append(
                output_channel_offset + i,
                self.channels[channel][batch].as_ref(),
                position,
            )?;
        }
        Ok(())
    }
}

impl fmt::Debug for SpatialIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpatialIndex")
            .field("predicate", &self.predicate)
            .field("positions", &self.addresses.len())
            .field("indexed", &self.tree.len())
            .field("partitions", &self.partitions.len())
            .field("output_channels", &self.output_channels)
            .finish()
    }
}

fn decode(address: u64) -> (usize, usize) {
    let (batch, position) = decode_synthetic_address(address);
    (batch as usize, position as usize)
}

fn probe_column(probe: &RecordBatch, channel: usize) -> Result<&ArrayRef> {
    probe.columns().get(channel).ok_or_else(|| {
        Error::InvalidArgumentError(format!(
            "probe channel {channel} out of range for {} columns",
            probe.num_columns()
        ))
    })
}

/// Partitions are half-open on their upper edges.
fn reference_point_in(probe: &Rectangle, build: &Rectangle, partition: &Rectangle) -> bool {
    let Some(overlap) = probe.intersection(build) else {
        return false;
    };
    let (x, y) = (overlap.min_x, overlap.min_y);
    x >= partition.min_x && x < partition.max_x && y >= partition.min_y && y < partition.max_y
}
