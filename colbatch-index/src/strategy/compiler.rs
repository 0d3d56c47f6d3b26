use std::sync::{Arc, RwLock};

use arrow::array::ArrayRef;
use arrow::datatypes::DataType;
use colbatch_result::{Error, Result};
use rustc_hash::FxHashMap;

use super::HashStrategyOptions;
use super::compiled::{CompiledHashStrategy, has_key_kernel};
use crate::types::ValueKind;

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
struct StrategyKey {
    types: Vec<DataType>,
    join_channels: Vec<usize>,
    sort_channel: Option<usize>,
    output_channels: Vec<usize>,
}

/// Specialised hash-strategy recipe for one key layout.
#[derive(Clone, Debug)]
pub struct CompiledStrategyFactory {
    kinds: Vec<ValueKind>,
    join_channels: Vec<usize>,
    sort_channel: Option<usize>,
    output_channels: Vec<usize>,
}

impl CompiledStrategyFactory {
    /// Bind the recipe to concrete channel data.
    ///
    /// Fails with [`Error::Compilation`] if a key array does not have the
    /// layout the recipe was compiled for.
    pub fn create(
        &self,
        channels: Vec<Vec<ArrayRef>>,
        hash_channel: Option<usize>,
    ) -> Result<CompiledHashStrategy> {
        let options = HashStrategyOptions::new(self.join_channels.clone())
            .with_hash_channel(hash_channel)
            .with_sort_channel(self.sort_channel)
            .with_output_channels(self.output_channels.clone());
        CompiledHashStrategy::try_new(self.kinds.clone(), channels, &options)
    }
}

/// Produces type-specialised hash strategies.
///
/// Compilation is refused (with [`Error::Compilation`]) when it is disabled,
/// when there are no join keys, or when a key kind has no specialised kernel.
/// Callers treat that as a signal to use the interpreted strategy instead.
#[derive(Debug)]
pub struct JoinCompiler {
    enabled: bool,
    cache: RwLock<FxHashMap<StrategyKey, Arc<CompiledStrategyFactory>>>,
}

impl Default for JoinCompiler {
    fn default() -> Self {
        Self::new(true)
    }
}

impl JoinCompiler {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            cache: RwLock::default(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn compile_hash_strategy_factory(
        &self,
        types: &[DataType],
        join_channels: &[usize],
        sort_channel: Option<usize>,
        output_channels: &[usize],
    ) -> Result<Arc<CompiledStrategyFactory>> {
        if !self.enabled {
            return Err(Error::compilation("specialised strategies are disabled"));
        }
        if join_channels.is_empty() {
            return Err(Error::compilation("no join channels to specialise on"));
        }
        let kinds = ValueKind::of_all(types);
        HashStrategyOptions::new(join_channels.to_vec())
            .with_sort_channel(sort_channel)
            .with_output_channels(output_channels.to_vec())
            .validate(&kinds)?;
        if let Some(&channel) = join_channels
            .iter()
            .find(|&&channel| !has_key_kernel(kinds[channel]))
        {
            return Err(Error::compilation(format!(
                "no specialised kernel for {:?} join channel {channel}",
                kinds[channel]
            )));
        }

        let key = StrategyKey {
            types: types.to_vec(),
            join_channels: join_channels.to_vec(),
            sort_channel,
            output_channels: output_channels.to_vec(),
        };
        if let Some(factory) = self.cache.read().map_err(poisoned)?.get(&key) {
            return Ok(Arc::clone(factory));
        }
        let factory = Arc::new(CompiledStrategyFactory {
            kinds,
            join_channels: key.join_channels.clone(),
            sort_channel,
            output_channels: key.output_channels.clone(),
        });
        tracing::debug!(
            join_channels = ?join_channels,
            sort_channel = ?sort_channel,
            "compiled hash strategy factory"
        );
        let mut cache = self.cache.write().map_err(poisoned)?;
        Ok(Arc::clone(cache.entry(key).or_insert(factory)))
    }

    pub fn cached_factories(&self) -> usize {
        self.cache.read().map(|cache| cache.len()).unwrap_or(0)
    }
}

fn poisoned<T>(_: T) -> Error {
    Error::Internal("strategy cache lock poisoned".into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::HashStrategy;
    use arrow::array::{BooleanArray, Int64Array, StringArray};
    use std::sync::Arc;

    fn int_channels() -> Vec<Vec<ArrayRef>> {
        vec![
            vec![Arc::new(Int64Array::from(vec![1, 2, 2])) as ArrayRef],
            vec![Arc::new(StringArray::from(vec!["a", "b", "c"])) as ArrayRef],
        ]
    }

    #[test]
    fn refuses_what_it_cannot_specialise() {
        let types = [DataType::Int64, DataType::Boolean];
        let disabled = JoinCompiler::new(false);
        assert!(matches!(
            disabled.compile_hash_strategy_factory(&types, &[0], None, &[0]),
            Err(Error::Compilation(_))
        ));

        let compiler = JoinCompiler::default();
        assert!(matches!(
            compiler.compile_hash_strategy_factory(&types, &[], None, &[0]),
            Err(Error::Compilation(_))
        ));
        assert!(matches!(
            compiler.compile_hash_strategy_factory(&types, &[1], None, &[0]),
            Err(Error::Compilation(_))
        ));
        assert!(matches!(
            compiler.compile_hash_strategy_factory(&types, &[2], None, &[0]),
            Err(Error::InvalidArgumentError(_))
        ));
    }

    #[test]
    fn caches_factories_per_layout() {
        let compiler = JoinCompiler::default();
        let types = [DataType::Int64, DataType::Utf8];
        let first = compiler
            .compile_hash_strategy_factory(&types, &[0], None, &[0, 1])
            .unwrap();
        let second = compiler
            .compile_hash_strategy_factory(&types, &[0], None, &[0, 1])
            .unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        compiler
            .compile_hash_strategy_factory(&types, &[1], None, &[0, 1])
            .unwrap();
        assert_eq!(compiler.cached_factories(), 2);
    }

    #[test]
    fn created_strategy_hashes_keys() {
        let compiler = JoinCompiler::default();
        let types = [DataType::Int64, DataType::Utf8];
        let factory = compiler
            .compile_hash_strategy_factory(&types, &[0], None, &[1])
            .unwrap();
        let strategy = factory.create(int_channels(), None).unwrap();
        assert_eq!(strategy.channel_count(), 1);
        assert_eq!(strategy.hash_position(0, 1), strategy.hash_position(0, 2));
        assert!(strategy.position_equals_position(0, 1, 0, 2));
        assert!(!strategy.position_equals_position(0, 0, 0, 1));

        let probe: Vec<ArrayRef> = vec![Arc::new(Int64Array::from(vec![2]))];
        assert_eq!(strategy.hash_row(0, &probe), strategy.hash_position(0, 1));
        assert!(strategy.position_equals_row(0, 2, 0, &probe));
    }

    #[test]
    fn mismatched_key_array_fails_creation() {
        let compiler = JoinCompiler::default();
        let factory = compiler
            .compile_hash_strategy_factory(&[DataType::Int64], &[0], None, &[0])
            .unwrap();
        let channels = vec![vec![Arc::new(BooleanArray::from(vec![true])) as ArrayRef]];
        assert!(factory.create(channels, None).is_err());
    }
}
