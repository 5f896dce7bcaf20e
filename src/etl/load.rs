//! Loader trait for loading data to destinations

use eyre::Result;

/// Loader trait for loading data to a destination
///
/// Implementors define how to load items to destinations:
/// - NDJSON files
/// - Collectors that hand results back to a caller
///
/// # Example
/// ```no_run
/// use urban_mobility_etl::etl::Loader;
/// use urban_mobility_etl::table::Record;
/// use eyre::Result;
///
/// struct CountingLoader;
///
/// impl Loader for CountingLoader {
///     type Item = Record;
///
///     fn load(&self, items: Vec<Self::Item>) -> Result<usize> {
///         Ok(items.len())
///     }
/// }
/// ```
pub trait Loader: Send + Sync {
    /// The type of items to load
    type Item: Send;

    /// Load items to the destination
    ///
    /// Returns the number of items successfully loaded
    ///
    /// # Errors
    /// Returns an error if loading fails (I/O, storage, validation, etc.)
    fn load(&self, items: Vec<Self::Item>) -> Result<usize>;
}

impl<L: Loader + ?Sized> Loader for &L {
    type Item = L::Item;

    fn load(&self, items: Vec<Self::Item>) -> Result<usize> {
        (**self).load(items)
    }
}
