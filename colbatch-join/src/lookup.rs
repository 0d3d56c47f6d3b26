use arrow::datatypes::DataType;
use colbatch_index::BatchBuilder;
use colbatch_result::Result;

use crate::probe::{JoinMatch, JoinProbe};

/// Read-only join structure probed one row at a time.
///
/// Join positions are logical positions of the batch index snapshot the source
/// was built from. A lookup source is immutable once built and may be probed
/// from several threads at once.
pub trait LookupSource: Send + Sync {
    /// Number of channels appended by [`LookupSource::append_to`].
    fn channel_count(&self) -> usize;

    fn join_position_count(&self) -> usize;

    /// Build-side types of the join keys, in join-channel order.
    fn key_types(&self) -> &[DataType];

    fn in_memory_size_in_bytes(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.join_position_count() == 0
    }

    /// First candidate join position for `probe_position`, if any. A probe
    /// whose keys do not match [`LookupSource::key_types`] has no candidates.
    fn get_join_position(&self, probe: &JoinProbe<'_>, probe_position: usize) -> Option<usize>;

    /// Candidate following `current` for the same probe row.
    fn get_next_join_position(
        &self,
        current: usize,
        probe: &JoinProbe<'_>,
        probe_position: usize,
    ) -> Option<usize>;

    /// Whether the residual filter accepts the pair; true without a filter.
    fn is_join_position_eligible(
        &self,
        join_position: usize,
        probe: &JoinProbe<'_>,
        probe_position: usize,
    ) -> bool;

    fn append_to(
        &self,
        join_position: usize,
        builder: &mut BatchBuilder,
        output_channel_offset: usize,
    ) -> Result<()>;

    /// Every eligible `(probe, join)` pair of a probe batch, in probe order
    /// and then candidate order.
    fn join_matches(&self, probe: &JoinProbe<'_>) -> Result<Vec<JoinMatch>> {
        probe.validate(self.key_types())?;
        let mut matches = Vec::new();
        for probe_position in 0..probe.position_count() {
            let mut next = self.get_join_position(probe, probe_position);
            while let Some(join_position) = next {
                if self.is_join_position_eligible(join_position, probe, probe_position) {
                    matches.push(JoinMatch {
                        probe_position,
                        join_position,
                    });
                }
                next = self.get_next_join_position(join_position, probe, probe_position);
            }
        }
        Ok(matches)
    }
}
