//! Transformer trait for data transformation

use eyre::Result;

/// Transformer trait for transforming data items
///
/// Implementors define how to transform items:
/// - Type normalization (text to numbers and timestamps)
/// - Data enrichment (derived columns)
/// - Validation
///
/// # Example
/// ```no_run
/// use urban_mobility_etl::etl::Transformer;
/// use urban_mobility_etl::table::Record;
/// use eyre::Result;
///
/// struct ColumnDropper {
///     columns: Vec<String>,
/// }
///
/// impl Transformer for ColumnDropper {
///     type Input = Record;
///     type Output = Record;
///
///     fn transform(&self, input: Self::Input) -> Result<Self::Output> {
///         Ok(input
///             .iter()
///             .filter(|(column, _)| !self.columns.iter().any(|c| c.as_str() == *column))
///             .map(|(column, value)| (column, value.clone()))
///             .collect())
///     }
/// }
/// ```
pub trait Transformer: Send + Sync {
    /// Input item type
    type Input: Send;

    /// Output item type after transformation
    type Output: Send;

    /// Transform a single item
    ///
    /// # Errors
    /// Returns an error if transformation fails (validation, conversion, etc.)
    fn transform(&self, input: Self::Input) -> Result<Self::Output>;

    /// Transform multiple items (default batch implementation)
    ///
    /// Override this for optimized batch processing
    fn transform_many(&self, inputs: Vec<Self::Input>) -> Result<Vec<Self::Output>> {
        inputs.into_iter().map(|i| self.transform(i)).collect()
    }
}

impl<T: Transformer + ?Sized> Transformer for &T {
    type Input = T::Input;
    type Output = T::Output;

    fn transform(&self, input: Self::Input) -> Result<Self::Output> {
        (**self).transform(input)
    }

    fn transform_many(&self, inputs: Vec<Self::Input>) -> Result<Vec<Self::Output>> {
        (**self).transform_many(inputs)
    }
}

impl<T: Transformer + ?Sized> Transformer for Box<T> {
    type Input = T::Input;
    type Output = T::Output;

    fn transform(&self, input: Self::Input) -> Result<Self::Output> {
        (**self).transform(input)
    }

    fn transform_many(&self, inputs: Vec<Self::Input>) -> Result<Vec<Self::Output>> {
        (**self).transform_many(inputs)
    }
}

/// Identity transformer that passes items through unchanged
///
/// Use this when you need a transformer but don't want to modify the data.
/// The generic parameter T must be specified when creating the transformer.
pub struct IdentityTransformer<T> {
    _phantom: std::marker::PhantomData<fn() -> T>,
}

impl<T> Default for IdentityTransformer<T> {
    fn default() -> Self {
        Self {
            _phantom: std::marker::PhantomData,
        }
    }
}

impl<T> IdentityTransformer<T> {
    pub fn new() -> Self {
        Self::default()
    }
}

impl<T: Send> Transformer for IdentityTransformer<T> {
    type Input = T;
    type Output = T;

    fn transform(&self, input: Self::Input) -> Result<Self::Output> {
        Ok(input)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_transformer() {
        let transformer = IdentityTransformer::<i32>::new();
        let input = vec![1, 2, 3];
        let output = transformer.transform_many(input.clone()).unwrap();
        assert_eq!(input, output);
    }

    #[test]
    fn test_boxed_transformer() {
        let boxed: Box<dyn Transformer<Input = i32, Output = i32>> =
            Box::new(IdentityTransformer::<i32>::new());
        assert_eq!(boxed.transform_many(vec![4, 5]).unwrap(), vec![4, 5]);
    }
}
