// Rule-based service filter
//
// Maps discovered instances to a service type using the first ruleset, in
// source order then declared order, whose rules all hold for the instance.

mod types;

pub use types::{ClassificationStats, Match};

use crate::attributes;
use crate::config::RulesConfig;
use crate::error::{Result, ServiceRulesError};
use crate::ruler::{RuleEngine, Ruler};
use crate::services::{Instance, ServiceType};
use crate::signatures::{self, DiscoverySignatures};
use std::path::PathBuf;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Instant;

/// Name the filter registers under when none is configured
pub const DEFAULT_FILTER_NAME: &str = "filters/service-rules";

/// Filters instances based on discovery rules
pub struct RuleFilter<E: RuleEngine = Ruler> {
    name: String,

    /// Configured signature files, in priority order
    sources: Vec<PathBuf>,

    engine: E,

    /// Loaded signatures; replaced wholesale on reload so in-flight calls
    /// keep the snapshot they started with
    signatures: RwLock<Arc<Vec<DiscoverySignatures>>>,
}

impl RuleFilter<Ruler> {
    /// Create a filter using the built-in engine
    ///
    /// # Arguments
    /// * `name` - Filter instance name, used in logs
    /// * `config` - Rules configuration listing the signature files
    pub fn new(name: impl Into<String>, config: &RulesConfig) -> Result<Self> {
        Self::with_engine(name, config, Ruler::new())
    }
}

impl<E: RuleEngine> RuleFilter<E> {
    /// Create a filter with a custom rule engine
    ///
    /// Every configured source must load; there is no degraded mode.
    pub fn with_engine(name: impl Into<String>, config: &RulesConfig, engine: E) -> Result<Self> {
        let name = name.into();
        let loaded = signatures::load_all(&config.services_files)?;

        tracing::info!(
            filter = %name,
            sources = loaded.len(),
            rulesets = loaded.iter().map(|s| s.signatures.len()).sum::<usize>(),
            "service rules loaded"
        );

        Ok(Self {
            name,
            sources: config.services_files.clone(),
            engine,
            signatures: RwLock::new(Arc::new(loaded)),
        })
    }

    /// Create a filter from already loaded signatures
    ///
    /// Filters built this way have no sources to reload from.
    pub fn from_signatures(
        name: impl Into<String>,
        loaded: Vec<DiscoverySignatures>,
        engine: E,
    ) -> Result<Self> {
        if loaded.is_empty() {
            return Err(ServiceRulesError::ConfigurationMissing);
        }

        Ok(Self {
            name: name.into(),
            sources: Vec::new(),
            engine,
            signatures: RwLock::new(Arc::new(loaded)),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current signatures snapshot
    pub fn signatures(&self) -> Arc<Vec<DiscoverySignatures>> {
        self.signatures
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of rulesets across all loaded sources
    pub fn ruleset_count(&self) -> usize {
        self.signatures().iter().map(|s| s.signatures.len()).sum()
    }

    /// Re-read all configured sources and swap them in
    ///
    /// On failure the previous signatures stay active.
    pub fn reload(&self) -> Result<()> {
        let loaded = match signatures::load_all(&self.sources) {
            Ok(loaded) => loaded,
            Err(e) => {
                tracing::warn!(filter = %self.name, "keeping previous service rules: {}", e);
                return Err(e);
            }
        };

        let mut current = self
            .signatures
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        *current = Arc::new(loaded);

        tracing::info!(filter = %self.name, sources = current.len(), "service rules reloaded");
        Ok(())
    }

    /// Find the first ruleset that matches an instance
    pub fn classify(&self, instance: &Instance) -> Result<Option<Match>> {
        let snapshot = self.signatures();
        let mut cache = ExpressionCache::new(&snapshot);
        let mut evaluated = 0;
        self.first_match(&snapshot, instance, &mut cache, &mut evaluated)
    }

    /// Map discovered instances to service types
    ///
    /// Returns the matched instances, in input order, with their service type
    /// set. Unmatched instances are left out. Any rule failure fails the whole
    /// call.
    pub fn map(&self, instances: Vec<Instance>) -> Result<Vec<Instance>> {
        self.map_with_stats(instances).map(|(mapped, _)| mapped)
    }

    /// Same as [`RuleFilter::map`], also returning call statistics
    pub fn map_with_stats(
        &self,
        instances: Vec<Instance>,
    ) -> Result<(Vec<Instance>, ClassificationStats)> {
        let start = Instant::now();
        let snapshot = self.signatures();

        let input_count = instances.len();
        let mut cache = ExpressionCache::new(&snapshot);
        let mut evaluated = 0;
        let mut applicable = Vec::with_capacity(input_count);

        for mut instance in instances {
            let found = self.first_match(&snapshot, &instance, &mut cache, &mut evaluated)?;
            if let Some(found) = found {
                tracing::debug!(
                    filter = %self.name,
                    instance = %instance.id,
                    source = %found.source,
                    ruleset = %found.ruleset,
                    service_type = %found.service_type,
                    "instance matched"
                );
                instance.service.service_type = found.service_type;
                applicable.push(instance);
            }
        }

        let stats = ClassificationStats {
            input_instances: input_count,
            matched: applicable.len(),
            dropped: input_count - applicable.len(),
            rulesets_evaluated: evaluated,
            processing_time_ms: start.elapsed().as_millis() as u64,
        };

        Ok((applicable, stats))
    }

    fn first_match(
        &self,
        loaded: &[DiscoverySignatures],
        instance: &Instance,
        cache: &mut ExpressionCache<E::Expression>,
        evaluated: &mut usize,
    ) -> Result<Option<Match>> {
        let facts = attributes::project(instance);

        for (source_idx, source) in loaded.iter().enumerate() {
            for (ruleset_idx, ruleset) in source.signatures.iter().enumerate() {
                *evaluated += 1;
                // Compiled on first use so errors surface only when a ruleset is reached
                let expression = match &mut cache.slots[source_idx][ruleset_idx] {
                    Some(expression) => expression,
                    empty => empty.insert(self.engine.compile(ruleset)?),
                };
                if self.engine.evaluate(expression, &facts)? {
                    return Ok(Some(Match {
                        source: source.name.clone(),
                        ruleset: ruleset.name.clone(),
                        service_type: ServiceType::new(ruleset.service_type.clone()),
                    }));
                }
            }
        }

        Ok(None)
    }
}

/// Compiled rulesets for one call, indexed like the signatures snapshot
struct ExpressionCache<X> {
    slots: Vec<Vec<Option<X>>>,
}

impl<X> ExpressionCache<X> {
    fn new(loaded: &[DiscoverySignatures]) -> Self {
        Self {
            slots: loaded
                .iter()
                .map(|source| source.signatures.iter().map(|_| None).collect())
                .collect(),
        }
    }
}
