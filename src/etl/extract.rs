//! Extractor trait for data extraction from various sources

use eyre::Result;

/// Extractor trait for extracting data from a source
///
/// Implementors define how to extract items from sources like:
/// - In-memory tables handed over by a caller
/// - NDJSON files
/// - Databases
///
/// # Example
/// ```no_run
/// use urban_mobility_etl::etl::Extractor;
/// use urban_mobility_etl::table::Record;
/// use eyre::Result;
///
/// struct SampleTrips;
///
/// impl Extractor for SampleTrips {
///     type Item = Record;
///
///     fn extract(&self) -> Result<Vec<Self::Item>> {
///         Ok(vec![Record::new().with("trip_distance", "5.2")])
///     }
/// }
/// ```
pub trait Extractor: Send + Sync {
    /// The type of items extracted
    type Item: Send;

    /// Extract items from the source
    ///
    /// # Errors
    /// Returns an error if extraction fails (I/O, parsing, etc.)
    fn extract(&self) -> Result<Vec<Self::Item>>;
}

impl<E: Extractor + ?Sized> Extractor for &E {
    type Item = E::Item;

    fn extract(&self) -> Result<Vec<Self::Item>> {
        (**self).extract()
    }
}
