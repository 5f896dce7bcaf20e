//! Mobility ETL orchestration
//!
//! Runs extract → transform → load for each of the three mobility sources
//! and reports one outcome per source. Sources are processed independently:
//! one failing never stops the others.
//!
//! Loading has two fallback tiers. The [`TableStore`] (normally a
//! [`crate::storage::DatabaseManager`]) falls back from the external store
//! to memory on its own; if it still reports failure, the pipeline keeps the
//! table in its own cache keyed by destination.

use crate::etl::{Extractor, Transformer};
use crate::storage::TableStore;
use crate::table::{Record, Table};
use crate::transform::{NumericCoercer, TimestampParser, TripEnricher};
use eyre::{Result, bail};
use indexmap::IndexMap;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};

pub const TRIPS_TABLE: &str = "trips";
pub const TRAVEL_TIMES_TABLE: &str = "uber_travel_times";
pub const TRANSIT_TABLE: &str = "mta_status";

/// Record-level transformer for one source
pub type RecordTransformer = Box<dyn Transformer<Input = Record, Output = Record>>;

/// The mobility data sources the pipeline knows about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Source {
    /// NYC taxi trips
    Taxi,
    /// Ride-hail zone-to-zone travel times
    Uber,
    /// Transit stop events
    Transit,
}

impl Source {
    pub const ALL: [Source; 3] = [Source::Taxi, Source::Uber, Source::Transit];

    /// Key used in [`PipelineResults`]
    pub fn name(self) -> &'static str {
        match self {
            Source::Taxi => "taxi",
            Source::Uber => "uber",
            Source::Transit => "transit",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Source::Taxi => "NYC_Taxi",
            Source::Uber => "Uber",
            Source::Transit => "Public_Transit",
        }
    }

    /// Table the transformed data is stored under
    pub fn destination(self) -> &'static str {
        match self {
            Source::Taxi => TRIPS_TABLE,
            Source::Uber => TRAVEL_TIMES_TABLE,
            Source::Transit => TRANSIT_TABLE,
        }
    }

    /// Standard record transformer for this source
    pub fn default_transformer(self) -> RecordTransformer {
        match self {
            Source::Taxi => Box::new(TripEnricher::new()),
            Source::Uber => Box::new(NumericCoercer::travel_time_fields()),
            Source::Transit => Box::new(TimestampParser::transit_fields()),
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl std::str::FromStr for Source {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Source::ALL
            .into_iter()
            .find(|source| source.name() == s || source.destination() == s)
            .ok_or_else(|| format!("unknown source '{}' (expected taxi, uber or transit)", s))
    }
}

/// Per-source outcome of a full pipeline run, in processing order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PipelineResults(IndexMap<Source, bool>);

impl PipelineResults {
    pub fn record(&mut self, source: Source, success: bool) {
        self.0.insert(source, success);
    }

    pub fn get(&self, source: Source) -> Option<bool> {
        self.0.get(&source).copied()
    }

    pub fn succeeded(&self, source: Source) -> bool {
        self.get(source).unwrap_or(false)
    }

    pub fn all_succeeded(&self) -> bool {
        !self.0.is_empty() && self.0.values().all(|ok| *ok)
    }

    pub fn iter(&self) -> impl Iterator<Item = (Source, bool)> + '_ {
        self.0.iter().map(|(source, ok)| (*source, *ok))
    }

    /// Outcomes keyed by source name (`taxi`, `uber`, `transit`)
    pub fn by_name(&self) -> IndexMap<&'static str, bool> {
        self.iter().map(|(source, ok)| (source.name(), ok)).collect()
    }
}

/// Orchestrates the per-source ETL runs over a shared [`TableStore`]
pub struct MobilityPipeline<S> {
    store: S,
    transformers: HashMap<Source, RecordTransformer>,
    processed: Mutex<HashMap<String, Table>>,
}

impl<S: TableStore> MobilityPipeline<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            transformers: Source::ALL
                .into_iter()
                .map(|source| (source, source.default_transformer()))
                .collect(),
            processed: Mutex::new(HashMap::new()),
        }
    }

    /// Replace the transformer used for `source`
    pub fn with_transformer(
        mut self,
        source: Source,
        transformer: impl Transformer<Input = Record, Output = Record> + 'static,
    ) -> Self {
        self.transformers.insert(source, Box::new(transformer));
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    fn processed(&self) -> MutexGuard<'_, HashMap<String, Table>> {
        self.processed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Extract a copy of the raw records for `source`
    pub fn extract(&self, source: Source, raw: &dyn Extractor<Item = Record>) -> Result<Table> {
        log::info!("Extracting data from {}", source.label());
        raw.extract().map(Table::from_records)
    }

    /// Apply the transformer registered for `source`
    pub fn transform(&self, source: Source, table: Table) -> Result<Table> {
        log::info!("Transforming {} data ({} records)", source.label(), table.len());
        let Some(transformer) = self.transformers.get(&source) else {
            bail!("No transformer registered for {}", source);
        };
        transformer
            .transform_many(table.into_records())
            .map(Table::from_records)
    }

    /// Store `table` under `destination`
    ///
    /// Goes through the [`TableStore`] first; if that reports failure the
    /// table is kept in the pipeline cache instead.
    pub fn load(&self, table: &Table, destination: &str) -> bool {
        log::info!("Loading {} records to {}", table.len(), destination);

        if self.store.save_data(table, destination) {
            self.processed().remove(destination);
            return true;
        }

        log::warn!(
            "Persistence failed for {}, keeping data in the pipeline cache",
            destination
        );
        self.processed()
            .insert(destination.to_string(), table.clone());
        true
    }

    /// Run extract → transform → load for a single source
    ///
    /// Returns the number of records loaded.
    pub fn run_source(&self, source: Source, raw: &dyn Extractor<Item = Record>) -> Result<usize> {
        let extracted = self.extract(source, raw)?;
        let transformed = self.transform(source, extracted)?;

        if !self.load(&transformed, source.destination()) {
            bail!("Failed to load {} data to {}", source.label(), source.destination());
        }
        Ok(transformed.len())
    }

    /// Run every source; each one succeeds or fails on its own
    pub fn run_full_pipeline(
        &self,
        trips: &dyn Extractor<Item = Record>,
        travel_times: &dyn Extractor<Item = Record>,
        transit: &dyn Extractor<Item = Record>,
    ) -> PipelineResults {
        let mut results = PipelineResults::default();

        for (source, raw) in [
            (Source::Taxi, trips),
            (Source::Uber, travel_times),
            (Source::Transit, transit),
        ] {
            let success = match self.run_source(source, raw) {
                Ok(count) => {
                    log::info!("{} pipeline loaded {} records", source.label(), count);
                    true
                }
                Err(e) => {
                    log::error!("{} pipeline failed: {:#}", source.label(), e);
                    false
                }
            };
            results.record(source, success);
        }

        results
    }

    /// Table held in the pipeline cache for `destination`, if any
    pub fn cached(&self, destination: &str) -> Option<Table> {
        self.processed().get(destination).cloned()
    }

    pub fn cached_destinations(&self) -> Vec<String> {
        let mut names: Vec<String> = self.processed().keys().cloned().collect();
        names.sort();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::DatabaseManager;
    use crate::table::Value;
    use eyre::eyre;
    use std::sync::atomic::{AtomicBool, Ordering};

    /// Store whose writes always fail
    struct BrokenStore;

    impl TableStore for BrokenStore {
        fn save_data(&self, _table: &Table, _name: &str) -> bool {
            false
        }

        fn load_data(&self, _name: &str) -> Table {
            Table::new()
        }

        fn table_exists(&self, _name: &str) -> bool {
            false
        }
    }

    /// Store that rejects writes until switched on
    struct SwitchableStore {
        healthy: AtomicBool,
        inner: DatabaseManager,
    }

    impl TableStore for SwitchableStore {
        fn save_data(&self, table: &Table, name: &str) -> bool {
            self.healthy.load(Ordering::SeqCst) && self.inner.save_data(table, name)
        }

        fn load_data(&self, name: &str) -> Table {
            self.inner.load_data(name)
        }

        fn table_exists(&self, name: &str) -> bool {
            self.inner.table_exists(name)
        }
    }

    struct FailingTransformer;

    impl Transformer for FailingTransformer {
        type Input = Record;
        type Output = Record;

        fn transform(&self, _input: Self::Input) -> Result<Self::Output> {
            Err(eyre!("malformed travel-time record"))
        }
    }

    struct FailingExtractor;

    impl Extractor for FailingExtractor {
        type Item = Record;

        fn extract(&self) -> Result<Vec<Self::Item>> {
            Err(eyre!("source unavailable"))
        }
    }

    fn trips() -> Table {
        Table::from_records(vec![
            Record::new()
                .with("pickup_datetime", "2025-11-06T10:00:00Z")
                .with("dropoff_datetime", "2025-11-06T10:30:00Z")
                .with("trip_distance", "5.2"),
        ])
    }

    fn travel_times() -> Table {
        Table::from_records(vec![
            Record::new()
                .with("source_id", 1001_i64)
                .with("mean_travel_time", "850"),
        ])
    }

    fn transit() -> Table {
        Table::from_records(vec![
            Record::new()
                .with("route_id", "R1")
                .with("arrival_time", "2025-11-06T10:15:00Z"),
        ])
    }

    #[test]
    fn test_full_pipeline_persists_every_source() {
        let pipeline = MobilityPipeline::new(DatabaseManager::memory_only());
        let results = pipeline.run_full_pipeline(&trips(), &travel_times(), &transit());

        assert!(results.all_succeeded());
        assert_eq!(
            results.by_name().into_iter().collect::<Vec<_>>(),
            vec![("taxi", true), ("uber", true), ("transit", true)]
        );

        let stored = pipeline.store().load_data(TRIPS_TABLE);
        assert_eq!(
            stored.records()[0].get("speed_mph"),
            Some(&Value::Float(10.4))
        );
        assert_eq!(
            pipeline.store().load_data(TRAVEL_TIMES_TABLE).records()[0].get("mean_travel_time"),
            Some(&Value::Float(850.0))
        );
        assert!(pipeline.store().table_exists(TRANSIT_TABLE));
        assert!(pipeline.cached_destinations().is_empty());
    }

    #[test]
    fn test_failing_transform_is_isolated() {
        let pipeline = MobilityPipeline::new(DatabaseManager::memory_only())
            .with_transformer(Source::Uber, FailingTransformer);
        let results = pipeline.run_full_pipeline(&trips(), &travel_times(), &transit());

        assert_eq!(results.get(Source::Taxi), Some(true));
        assert_eq!(results.get(Source::Uber), Some(false));
        assert_eq!(results.get(Source::Transit), Some(true));
        assert!(!results.all_succeeded());

        assert!(pipeline.store().table_exists(TRIPS_TABLE));
        assert!(!pipeline.store().table_exists(TRAVEL_TIMES_TABLE));
        assert!(pipeline.store().table_exists(TRANSIT_TABLE));
    }

    #[test]
    fn test_failing_extract_is_isolated() {
        let pipeline = MobilityPipeline::new(DatabaseManager::memory_only());
        let results = pipeline.run_full_pipeline(&FailingExtractor, &travel_times(), &transit());

        assert!(!results.succeeded(Source::Taxi));
        assert!(results.succeeded(Source::Uber));
        assert!(results.succeeded(Source::Transit));
    }

    #[test]
    fn test_persistence_failure_falls_back_to_pipeline_cache() {
        let pipeline = MobilityPipeline::new(BrokenStore);

        assert!(pipeline.load(&trips(), TRIPS_TABLE));
        assert_eq!(pipeline.cached(TRIPS_TABLE), Some(trips()));

        let results = pipeline.run_full_pipeline(&trips(), &travel_times(), &transit());
        assert!(results.all_succeeded());
        assert_eq!(
            pipeline.cached_destinations(),
            vec![TRANSIT_TABLE, TRIPS_TABLE, TRAVEL_TIMES_TABLE]
        );
    }

    #[test]
    fn test_successful_load_drops_stale_cache_entry() {
        let store = SwitchableStore {
            healthy: AtomicBool::new(false),
            inner: DatabaseManager::memory_only(),
        };
        let pipeline = MobilityPipeline::new(&store);

        assert!(pipeline.load(&trips(), TRIPS_TABLE));
        assert!(pipeline.cached(TRIPS_TABLE).is_some());

        store.healthy.store(true, Ordering::SeqCst);
        assert!(pipeline.load(&trips(), TRIPS_TABLE));
        assert!(pipeline.cached(TRIPS_TABLE).is_none());
        assert_eq!(store.load_data(TRIPS_TABLE), trips());
    }

    #[test]
    fn test_extract_copies_raw_table() {
        let pipeline = MobilityPipeline::new(DatabaseManager::memory_only());
        let raw = transit();
        let extracted = pipeline.extract(Source::Transit, &raw).unwrap();
        assert_eq!(extracted, raw);
    }

    #[test]
    fn test_empty_source_replaces_destination() {
        let pipeline = MobilityPipeline::new(DatabaseManager::memory_only());
        pipeline.run_source(Source::Taxi, &trips()).unwrap();

        assert_eq!(pipeline.run_source(Source::Taxi, &Table::new()).unwrap(), 0);
        assert!(pipeline.store().table_exists(TRIPS_TABLE));
        assert!(pipeline.store().load_data(TRIPS_TABLE).is_empty());
    }

    #[test]
    fn test_source_from_str() {
        assert_eq!("taxi".parse::<Source>().unwrap(), Source::Taxi);
        assert_eq!("mta_status".parse::<Source>().unwrap(), Source::Transit);
        assert!("ferry".parse::<Source>().is_err());
    }
}
