//! Value ⇄ byte conversion for node data.
//!
//! A [`DataSerializer`] is a two-function capability parameterised by the
//! value type. Two are built in: [`StringSerializer`] (UTF-8) and
//! [`PropertiesSerializer`] (textual key/value bag, UTF-8). Anything else is
//! user supplied and reports failures through
//! [`SerializationError::Custom`](crate::SerializationError::Custom).

mod properties;
mod string;
pub use properties::*;
pub use string::*;

#[cfg(test)]
mod properties_test;

use crate::Result;

pub trait DataSerializer<T>: Send + Sync {
    fn serialize(
        &self,
        value: &T,
    ) -> Result<Vec<u8>>;

    /// Must not assume `bytes` is non-empty; an absent node payload arrives
    /// as an empty slice.
    fn deserialize(
        &self,
        bytes: &[u8],
    ) -> Result<T>;
}

impl<T, S> DataSerializer<T> for &S
where
    S: DataSerializer<T> + ?Sized,
{
    fn serialize(
        &self,
        value: &T,
    ) -> Result<Vec<u8>> {
        (**self).serialize(value)
    }

    fn deserialize(
        &self,
        bytes: &[u8],
    ) -> Result<T> {
        (**self).deserialize(bytes)
    }
}
