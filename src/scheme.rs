//! Contracts for the data flowing between stages.
//!
//! The core never looks inside payloads. It moves [`DataContainer`]s around
//! as `Arc<dyn DataContainer>` and asks [`DataScheme`]s two questions:
//!
//! * **planning time**: does this consumer scheme *accept* what the producer
//!   declared? ([`DataScheme::accepts`])
//! * **execution time**: does this container *conform* to the scheme the
//!   producer declared? ([`DataScheme::verify`])
//!
//! Concrete scheme families (columnar tables, arrays with units, ...) live
//! outside the core and plug in here. [`TypedScheme`] and [`Payload`] are a
//! small family backed by Rust types, enough for pipelines whose stages agree
//! on concrete types.

use std::any::{Any, type_name};
use std::collections::BTreeMap;
use std::fmt::Debug;
use std::marker::PhantomData;

use crate::error::SchemeError;
use crate::quantity::Quantity;

/// One unit of payload data passed between stages.
pub trait DataContainer: Any + Debug + Send + Sync {
    /// Producer-defined units, keyed by the name of the value they describe.
    fn units(&self) -> Option<&BTreeMap<String, Quantity>> {
        None
    }
}

impl dyn DataContainer {
    pub fn downcast_ref<T: DataContainer>(&self) -> Option<&T> {
        (self as &dyn Any).downcast_ref::<T>()
    }

    pub fn is<T: DataContainer>(&self) -> bool {
        (self as &dyn Any).is::<T>()
    }
}

/// Type/shape contract over payload data.
pub trait DataScheme: Any + Debug + Send + Sync {
    /// Consumer side: can data described by `produced` be fed into an
    /// argument described by `self`?
    ///
    /// `Ok(false)` signals an incompatibility without a known reason, an
    /// `Err(SchemeError::Incompatible(..))` carries the reason.
    fn accepts(&self, produced: &dyn DataScheme) -> Result<bool, SchemeError>;

    /// Producer side: does `container` match the shape declared by `self`?
    fn verify(&self, container: &dyn DataContainer) -> Result<bool, SchemeError>;
}

impl dyn DataScheme {
    pub fn downcast_ref<T: DataScheme>(&self) -> Option<&T> {
        (self as &dyn Any).downcast_ref::<T>()
    }
}

/// A container holding a single value of type `T`, with optional unit
/// metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct Payload<T> {
    data: T,
    units: BTreeMap<String, Quantity>,
}

impl<T> Payload<T> {
    pub fn new(data: T) -> Self {
        Self {
            data,
            units: BTreeMap::new(),
        }
    }

    pub fn with_unit(mut self, name: impl Into<String>, unit: Quantity) -> Self {
        self.units.insert(name.into(), unit);
        self
    }

    pub fn data(&self) -> &T {
        &self.data
    }

    pub fn into_data(self) -> T {
        self.data
    }
}

impl<T> DataContainer for Payload<T>
where
    T: Debug + Send + Sync + 'static,
{
    fn units(&self) -> Option<&BTreeMap<String, Quantity>> {
        Some(&self.units)
    }
}

/// Scheme describing a [`Payload<T>`].
///
/// As a consumer it accepts exactly the producers declaring `TypedScheme<T>`,
/// as a producer it verifies that the container really is a `Payload<T>`.
pub struct TypedScheme<T> {
    _phantom: PhantomData<fn() -> T>,
}

impl<T> TypedScheme<T> {
    pub fn new() -> Self {
        Self {
            _phantom: PhantomData,
        }
    }
}

impl<T> Default for TypedScheme<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for TypedScheme<T> {
    fn clone(&self) -> Self {
        Self::new()
    }
}

impl<T> Debug for TypedScheme<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "TypedScheme<{}>", type_name::<T>())
    }
}

impl<T> DataScheme for TypedScheme<T>
where
    T: Debug + Send + Sync + 'static,
{
    fn accepts(&self, produced: &dyn DataScheme) -> Result<bool, SchemeError> {
        match produced.downcast_ref::<TypedScheme<T>>() {
            Some(_) => Ok(true),
            None => Err(SchemeError::incompatible(format!(
                "expected {:?}, producer declares {:?}",
                self, produced
            ))),
        }
    }

    fn verify(&self, container: &dyn DataContainer) -> Result<bool, SchemeError> {
        match container.is::<Payload<T>>() {
            true => Ok(true),
            false => Err(SchemeError::conformity(format!(
                "expected Payload<{}>, got {:?}",
                type_name::<T>(),
                container
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_typed_scheme_accepts_same_type() {
        let consumer = TypedScheme::<Vec<f64>>::new();
        let producer = TypedScheme::<Vec<f64>>::new();
        assert_eq!(consumer.accepts(&producer), Ok(true));
    }

    #[test]
    fn test_typed_scheme_rejects_other_type() {
        let consumer = TypedScheme::<Vec<f64>>::new();
        let producer = TypedScheme::<String>::new();
        let err = consumer.accepts(&producer).unwrap_err();
        assert!(matches!(err, SchemeError::Incompatible(_)));
    }

    #[test]
    fn test_typed_scheme_verify() {
        let scheme = TypedScheme::<u32>::new();
        assert_eq!(scheme.verify(&Payload::new(7u32)), Ok(true));

        let err = scheme.verify(&Payload::new("seven")).unwrap_err();
        assert!(matches!(err, SchemeError::Conformity(_)));
    }

    #[test]
    fn test_container_downcast() {
        let container: Box<dyn DataContainer> =
            Box::new(Payload::new(vec![1.0, 2.0]).with_unit("amplitude", Quantity::new(1.0, "mV")));

        let payload = container.downcast_ref::<Payload<Vec<f64>>>().unwrap();
        assert_eq!(payload.data(), &vec![1.0, 2.0]);
        assert!(container.downcast_ref::<Payload<u8>>().is_none());

        let units = container.units().unwrap();
        assert_eq!(units["amplitude"].unit(), "mV");
    }
}
