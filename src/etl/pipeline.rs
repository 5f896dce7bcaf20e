//! Pipeline orchestration for ETL operations

use super::{Extractor, Loader, Transformer};
use eyre::Result;

/// ETL Pipeline that orchestrates Extract, Transform, and Load operations
///
/// # Type Parameters
/// - `E`: Extractor type
/// - `T`: Transformer type (must transform from E::Item)
/// - `L`: Loader type (must load T::Output)
///
/// # Example
/// ```no_run
/// use urban_mobility_etl::etl::{IdentityTransformer, Pipeline};
/// use urban_mobility_etl::storage::NdjsonWriter;
/// use urban_mobility_etl::table::{Record, Table};
///
/// # fn example() -> eyre::Result<()> {
/// let raw = Table::from_records(vec![Record::new().with("route_id", "R1")]);
/// let pipeline = Pipeline::new(
///     raw,
///     IdentityTransformer::<Record>::new(),
///     NdjsonWriter::new("mta_status.ndjson"),
/// );
///
/// let count = pipeline.run()?;
/// println!("Processed {} records", count);
/// # Ok(())
/// # }
/// ```
pub struct Pipeline<E, T, L> {
    extractor: E,
    transformer: T,
    loader: L,
}

impl<E, T, L> Pipeline<E, T, L>
where
    E: Extractor,
    T: Transformer<Input = E::Item>,
    L: Loader<Item = T::Output>,
{
    /// Create a new pipeline
    pub fn new(extractor: E, transformer: T, loader: L) -> Self {
        Self {
            extractor,
            transformer,
            loader,
        }
    }

    /// Run the complete ETL pipeline
    ///
    /// Steps:
    /// 1. Extract items from source
    /// 2. Transform each item
    /// 3. Load items to destination
    ///
    /// An empty extraction is still loaded, so the destination ends up
    /// holding an empty dataset rather than stale content.
    ///
    /// Returns the number of items successfully loaded
    ///
    /// # Errors
    /// Returns an error if any stage fails
    pub fn run(&self) -> Result<usize> {
        log::debug!("Starting ETL pipeline");

        // Extract
        log::debug!("Extracting from source...");
        let items = self.extractor.extract()?;
        log::debug!("Extracted {} items", items.len());

        if items.is_empty() {
            log::warn!("No items extracted, loading an empty dataset");
        }

        // Transform
        log::debug!("Transforming items...");
        let transformed = self.transformer.transform_many(items)?;
        log::debug!("Transformed {} items", transformed.len());

        // Load
        log::debug!("Loading to destination...");
        let count = self.loader.load(transformed)?;
        log::debug!("Loaded {} items", count);

        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use eyre::{Result, eyre};
    use std::sync::{Arc, Mutex};

    struct MockExtractor(Vec<i32>);

    impl Extractor for MockExtractor {
        type Item = i32;
        fn extract(&self) -> Result<Vec<Self::Item>> {
            Ok(self.0.clone())
        }
    }

    struct DoubleTransformer;

    impl Transformer for DoubleTransformer {
        type Input = i32;
        type Output = i32;
        fn transform(&self, input: Self::Input) -> Result<Self::Output> {
            Ok(input * 2)
        }
    }

    struct RejectNegative;

    impl Transformer for RejectNegative {
        type Input = i32;
        type Output = i32;
        fn transform(&self, input: Self::Input) -> Result<Self::Output> {
            if input < 0 {
                return Err(eyre!("negative input: {}", input));
            }
            Ok(input)
        }
    }

    struct SumLoader(Arc<Mutex<Option<i32>>>);

    impl Loader for SumLoader {
        type Item = i32;
        fn load(&self, items: Vec<Self::Item>) -> Result<usize> {
            let sum: i32 = items.iter().sum();
            *self.0.lock().unwrap() = Some(sum);
            Ok(items.len())
        }
    }

    #[test]
    fn test_pipeline() {
        let result = Arc::new(Mutex::new(None));

        let pipeline = Pipeline::new(
            MockExtractor(vec![1, 2, 3]),
            DoubleTransformer,
            SumLoader(result.clone()),
        );

        let count = pipeline.run().unwrap();
        assert_eq!(count, 3);
        assert_eq!(*result.lock().unwrap(), Some(12)); // (1+2+3)*2 = 12
    }

    #[test]
    fn test_empty_pipeline_still_loads() {
        let result = Arc::new(Mutex::new(None));

        let pipeline = Pipeline::new(
            MockExtractor(vec![]),
            DoubleTransformer,
            SumLoader(result.clone()),
        );

        let count = pipeline.run().unwrap();
        assert_eq!(count, 0);
        assert_eq!(*result.lock().unwrap(), Some(0));
    }

    #[test]
    fn test_transform_failure_skips_load() {
        let result = Arc::new(Mutex::new(None));

        let pipeline = Pipeline::new(
            MockExtractor(vec![1, -2, 3]),
            RejectNegative,
            SumLoader(result.clone()),
        );

        assert!(pipeline.run().is_err());
        assert_eq!(*result.lock().unwrap(), None);
    }
}
