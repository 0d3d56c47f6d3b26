use std::sync::Arc;

use arrow::datatypes::{DataType, SchemaRef};
use colbatch_result::Result;

use crate::batch_builder::channel_schema;
use crate::config::BatchIndexConfig;
use crate::index::BatchIndex;
use crate::ordering::OrderingCompiler;
use crate::strategy::JoinCompiler;

/// Creates batch indexes that share one configuration and one pair of
/// ordering and join compilers, so compiled orderings and strategy recipes are
/// reused across every index an operator creates.
#[derive(Clone, Debug)]
pub struct BatchIndexFactory {
    config: BatchIndexConfig,
    ordering_compiler: Arc<OrderingCompiler>,
    join_compiler: Arc<JoinCompiler>,
}

impl Default for BatchIndexFactory {
    fn default() -> Self {
        let config = BatchIndexConfig::default();
        Self {
            ordering_compiler: Arc::new(OrderingCompiler::new()),
            join_compiler: Arc::new(JoinCompiler::new(config.compiled_strategies)),
            config,
        }
    }
}

impl BatchIndexFactory {
    pub fn new(config: BatchIndexConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            ordering_compiler: Arc::new(OrderingCompiler::new()),
            join_compiler: Arc::new(JoinCompiler::new(config.compiled_strategies)),
            config,
        })
    }

    pub fn config(&self) -> &BatchIndexConfig {
        &self.config
    }

    pub fn ordering_compiler(&self) -> &Arc<OrderingCompiler> {
        &self.ordering_compiler
    }

    pub fn join_compiler(&self) -> &Arc<JoinCompiler> {
        &self.join_compiler
    }

    /// Index over channels named `c0`, `c1`, ...
    pub fn new_batch_index(
        &self,
        types: Vec<DataType>,
        expected_positions: usize,
    ) -> Result<BatchIndex> {
        self.new_batch_index_with_schema(channel_schema(&types), expected_positions)
    }

    /// Index whose batches (from `batches()`) carry `schema`.
    pub fn new_batch_index_with_schema(
        &self,
        schema: SchemaRef,
        expected_positions: usize,
    ) -> Result<BatchIndex> {
        BatchIndex::with_components(
            schema,
            expected_positions,
            self.config,
            Arc::clone(&self.ordering_compiler),
            Arc::clone(&self.join_compiler),
        )
    }
}
