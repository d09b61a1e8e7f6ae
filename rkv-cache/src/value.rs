//! # Stored Values
//!
//! Purpose: Decide once, at the type level, how a value becomes store text.
//!
//! ## Design Principles
//! 1. **Text Passes Through**: `str` and `String` are written verbatim.
//! 2. **Explicit Structure**: Anything else is wrapped in `Structured` and
//!    goes through the codec.
//! 3. **Explicit Null**: `None` and `Null` write the codec's null text.
//! 4. **Scalars As Text**: Numbers and booleans use their display form, so
//!    `INCR` and friends see plain integers.

use serde::Serialize;

use rkv_common::RkvResult;

use crate::codec::Codec;

/// A value the facade can write.
pub trait Encodable {
    /// Converts the value to the text stored under a key or field.
    fn to_stored<C: Codec>(&self, codec: &C) -> RkvResult<String>;
}

/// Wraps a value that must go through the codec.
#[derive(Debug, Clone, PartialEq)]
pub struct Structured<T>(pub T);

/// Explicit null marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Null;

impl Encodable for str {
    fn to_stored<C: Codec>(&self, _codec: &C) -> RkvResult<String> {
        Ok(self.to_string())
    }
}

impl Encodable for String {
    fn to_stored<C: Codec>(&self, _codec: &C) -> RkvResult<String> {
        Ok(self.clone())
    }
}

impl<T: Serialize> Encodable for Structured<T> {
    fn to_stored<C: Codec>(&self, codec: &C) -> RkvResult<String> {
        codec.encode(&self.0)
    }
}

impl Encodable for Null {
    fn to_stored<C: Codec>(&self, codec: &C) -> RkvResult<String> {
        Ok(codec.null().to_string())
    }
}

impl<E: Encodable> Encodable for Option<E> {
    fn to_stored<C: Codec>(&self, codec: &C) -> RkvResult<String> {
        match self {
            Some(value) => value.to_stored(codec),
            None => Null.to_stored(codec),
        }
    }
}

impl<E: Encodable + ?Sized> Encodable for &E {
    fn to_stored<C: Codec>(&self, codec: &C) -> RkvResult<String> {
        (**self).to_stored(codec)
    }
}

macro_rules! display_encodable {
    ($($ty:ty),* $(,)?) => {
        $(
            impl Encodable for $ty {
                fn to_stored<C: Codec>(&self, _codec: &C) -> RkvResult<String> {
                    Ok(self.to_string())
                }
            }
        )*
    };
}

display_encodable!(bool, i32, i64, u32, u64, usize, f64);
