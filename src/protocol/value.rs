//! Untyped field values exchanged between the layout tables and typed messages

use crate::error::{Error, Result};

/// A single decoded field value
///
/// Integers are widened to `i64` so every wire scalar fits without loss.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value {
    Int(i64),
    Float(f32),
}

/// Conversion from a decoded [`Value`] into a typed struct field
pub trait FromValue: Sized {
    fn from_value(field: &'static str, value: Value) -> Result<Self>;
}

macro_rules! int_value {
    ($($t:ty),*) => {
        $(
            impl FromValue for $t {
                fn from_value(field: &'static str, value: Value) -> Result<Self> {
                    match value {
                        Value::Int(v) => {
                            <$t>::try_from(v).map_err(|_| Error::FieldOutOfRange { field, value: v })
                        }
                        Value::Float(_) => Err(Error::FieldTypeMismatch { field }),
                    }
                }
            }

            impl From<$t> for Value {
                fn from(v: $t) -> Self {
                    Value::Int(v as i64)
                }
            }
        )*
    };
}

int_value!(i8, u8, i16, u16, i32, u32);

impl FromValue for f32 {
    fn from_value(field: &'static str, value: Value) -> Result<Self> {
        match value {
            Value::Float(v) => Ok(v),
            Value::Int(_) => Err(Error::FieldTypeMismatch { field }),
        }
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::Float(v)
    }
}

// Booleans travel as a single byte; any non-zero byte reads as true
impl FromValue for bool {
    fn from_value(field: &'static str, value: Value) -> Result<Self> {
        match value {
            Value::Int(v) => Ok(v != 0),
            Value::Float(_) => Err(Error::FieldTypeMismatch { field }),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Int(v as i64)
    }
}

/// Ordered field values of one decoded payload
#[derive(Debug, Clone)]
pub struct FieldValues {
    tag: u16,
    values: Vec<(&'static str, Value)>,
}

impl FieldValues {
    pub(crate) fn with_capacity(tag: u16, capacity: usize) -> Self {
        Self {
            tag,
            values: Vec::with_capacity(capacity),
        }
    }

    pub(crate) fn push(&mut self, name: &'static str, value: Value) {
        self.values.push((name, value));
    }

    /// Check whether a field was present in the payload
    pub fn has(&self, name: &str) -> bool {
        self.values.iter().any(|(n, _)| *n == name)
    }

    /// Fetch and convert a field
    pub fn get<T: FromValue>(&self, name: &'static str) -> Result<T> {
        let value = self
            .values
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, v)| *v)
            .ok_or(Error::MissingField {
                tag: self.tag,
                field: name,
            })?;
        T::from_value(name, value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_converts_and_checks_range() {
        let mut fields = FieldValues::with_capacity(2, 2);
        fields.push("num", Value::Int(300));
        fields.push("gain", Value::Float(0.5));

        assert_eq!(fields.get::<i16>("num").unwrap(), 300);
        assert!(matches!(
            fields.get::<i8>("num"),
            Err(Error::FieldOutOfRange { field: "num", value: 300 })
        ));
        assert_eq!(fields.get::<f32>("gain").unwrap(), 0.5);
        assert!(matches!(
            fields.get::<f32>("num"),
            Err(Error::FieldTypeMismatch { field: "num" })
        ));
        assert!(matches!(
            fields.get::<u8>("missing"),
            Err(Error::MissingField { tag: 2, field: "missing" })
        ));
    }

    #[test]
    fn test_bool_from_byte() {
        assert!(bool::from_value("led", Value::Int(2)).unwrap());
        assert!(!bool::from_value("led", Value::Int(0)).unwrap());
        assert_eq!(Value::from(true), Value::Int(1));
    }
}
