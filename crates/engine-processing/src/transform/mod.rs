use crate::error::TransformError;
use model::{core::value::Value, mapping::field::FieldTransform};
use std::{collections::HashMap, fmt, sync::Arc};

pub mod geocode;

pub use geocode::{GeoPoint, Zip3Geocoder, Zip5Geocoder, ZipGeocodeTable};

/// Pure value function filling a calculated column from a raw column's text.
///
/// Implementations must return the same output for the same input.
pub trait FieldTransformer: Send + Sync + fmt::Debug {
    fn kind(&self) -> FieldTransform;

    /// `Ok(None)` leaves the calculated slot absent.
    fn transform(&self, input: &str) -> Result<Option<Value>, TransformError>;
}

/// Transformers available to the extraction stage, by transform name.
#[derive(Debug, Clone, Default)]
pub struct TransformRegistry {
    transformers: HashMap<FieldTransform, Arc<dyn FieldTransformer>>,
}

impl TransformRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with both zip geocoders over one lookup table.
    pub fn with_geocoding(table: Arc<ZipGeocodeTable>) -> Self {
        Self::new()
            .register(Zip3Geocoder::new(table.clone()))
            .register(Zip5Geocoder::new(table))
    }

    pub fn register<T: FieldTransformer + 'static>(mut self, transformer: T) -> Self {
        self.transformers
            .insert(transformer.kind(), Arc::new(transformer));
        self
    }

    pub fn contains(&self, kind: FieldTransform) -> bool {
        self.transformers.contains_key(&kind)
    }

    pub fn apply(&self, kind: FieldTransform, input: &str) -> Result<Option<Value>, TransformError> {
        self.transformers
            .get(&kind)
            .ok_or(TransformError::Unregistered(kind))?
            .transform(input)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Upper;

    impl FieldTransformer for Upper {
        fn kind(&self) -> FieldTransform {
            FieldTransform::Zip3ToGeocode
        }

        fn transform(&self, input: &str) -> Result<Option<Value>, TransformError> {
            Ok(Some(Value::from(input.to_uppercase())))
        }
    }

    #[test]
    fn dispatches_by_transform_name() {
        let registry = TransformRegistry::new().register(Upper);

        assert!(registry.contains(FieldTransform::Zip3ToGeocode));
        assert_eq!(
            registry.apply(FieldTransform::Zip3ToGeocode, "abc").unwrap(),
            Some(Value::from("ABC"))
        );
        assert!(matches!(
            registry.apply(FieldTransform::Zip5ToGeocode, "abc"),
            Err(TransformError::Unregistered(FieldTransform::Zip5ToGeocode))
        ));
    }
}
