use colbatch_result::{Error, Result};

use crate::batch_builder::{DEFAULT_MAX_BATCH_BYTES, DEFAULT_MAX_BATCH_ROWS};

/// Construction options shared by every index a factory creates.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BatchIndexConfig {
    /// Copy every incoming column on `add_batch` instead of retaining the
    /// caller's (possibly sliced) arrays until `compact`.
    pub eager_compaction: bool,
    /// Try type-specialized hash strategies before the interpreted one.
    /// Disabling forces the interpreted strategy everywhere.
    pub compiled_strategies: bool,
    /// Row limit of each batch produced by `sorted_batches`.
    pub sorted_batch_max_rows: usize,
    /// Byte limit of each batch produced by `sorted_batches`.
    pub sorted_batch_max_bytes: usize,
}

impl Default for BatchIndexConfig {
    fn default() -> Self {
        Self {
            eager_compaction: false,
            compiled_strategies: true,
            sorted_batch_max_rows: DEFAULT_MAX_BATCH_ROWS,
            sorted_batch_max_bytes: DEFAULT_MAX_BATCH_BYTES,
        }
    }
}

impl BatchIndexConfig {
    pub fn with_eager_compaction(mut self, eager_compaction: bool) -> Self {
        self.eager_compaction = eager_compaction;
        self
    }

    pub fn with_compiled_strategies(mut self, compiled_strategies: bool) -> Self {
        self.compiled_strategies = compiled_strategies;
        self
    }

    pub fn with_sorted_batch_max_rows(mut self, rows: usize) -> Self {
        self.sorted_batch_max_rows = rows;
        self
    }

    pub fn with_sorted_batch_max_bytes(mut self, bytes: usize) -> Self {
        self.sorted_batch_max_bytes = bytes;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.sorted_batch_max_rows == 0 {
            return Err(Error::InvalidArgumentError(
                "sorted_batch_max_rows must be greater than zero".into(),
            ));
        }
        if self.sorted_batch_max_bytes == 0 {
            return Err(Error::InvalidArgumentError(
                "sorted_batch_max_bytes must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = BatchIndexConfig::default();
        assert!(config.validate().is_ok());
        assert!(!config.eager_compaction);
        assert!(config.compiled_strategies);
    }

    #[test]
    fn zero_limits_are_rejected() {
        assert!(BatchIndexConfig::default()
            .with_sorted_batch_max_rows(0)
            .validate()
            .is_err());
        assert!(BatchIndexConfig::default()
            .with_sorted_batch_max_bytes(0)
            .validate()
            .is_err());
    }
}
