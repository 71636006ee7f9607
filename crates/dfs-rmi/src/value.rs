// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Conversion between Rust types and wire [`Value`]s.

use thiserror::Error;

use crate::wire::Value;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValueError {
    #[error("value is null")]
    Null,

    #[error("expected {expected}, found {found}")]
    Mismatch { expected: String, found: String },

    #[error("invalid {descriptor}: {reason}")]
    Invalid { descriptor: String, reason: String },
}

impl ValueError {
    pub fn mismatch<T: RemoteValue>(found: Option<&Value>) -> Self {
        ValueError::Mismatch {
            expected: T::descriptor(),
            found: found.map_or("null", Value::type_name).to_string(),
        }
    }

    pub fn invalid<T: RemoteValue>(reason: impl std::fmt::Display) -> Self {
        ValueError::Invalid {
            descriptor: T::descriptor(),
            reason: reason.to_string(),
        }
    }
}

/// A type that can be passed to or returned from a remote method.
///
/// The descriptor names the type on the wire; method lookup on the serving
/// side matches it against the declared parameter descriptors.
pub trait RemoteValue: Sized {
    /// True when `into_value` may return `None`.
    const NULLABLE: bool = false;

    fn descriptor() -> String;
    fn into_value(self) -> Option<Value>;
    fn from_value(value: Option<Value>) -> Result<Self, ValueError>;
}

/// One call argument along with its type descriptor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Argument {
    pub value: Option<Value>,
    pub descriptor: String,
}

impl Argument {
    pub fn of<T: RemoteValue>(value: T) -> Self {
        Argument {
            value: value.into_value(),
            descriptor: T::descriptor(),
        }
    }
}

impl RemoteValue for () {
    const NULLABLE: bool = true;

    fn descriptor() -> String {
        "void".to_string()
    }

    fn into_value(self) -> Option<Value> {
        None
    }

    fn from_value(value: Option<Value>) -> Result<Self, ValueError> {
        match value {
            None => Ok(()),
            other => Err(ValueError::mismatch::<Self>(other.as_ref())),
        }
    }
}

impl RemoteValue for bool {
    fn descriptor() -> String {
        "bool".to_string()
    }

    fn into_value(self) -> Option<Value> {
        Some(Value::Bool(self))
    }

    fn from_value(value: Option<Value>) -> Result<Self, ValueError> {
        match value {
            Some(Value::Bool(b)) => Ok(b),
            None => Err(ValueError::Null),
            other => Err(ValueError::mismatch::<Self>(other.as_ref())),
        }
    }
}

impl RemoteValue for u64 {
    fn descriptor() -> String {
        "u64".to_string()
    }

    fn into_value(self) -> Option<Value> {
        Some(Value::U64(self))
    }

    fn from_value(value: Option<Value>) -> Result<Self, ValueError> {
        match value {
            Some(Value::U64(n)) => Ok(n),
            None => Err(ValueError::Null),
            other => Err(ValueError::mismatch::<Self>(other.as_ref())),
        }
    }
}

impl RemoteValue for u32 {
    fn descriptor() -> String {
        "u32".to_string()
    }

    fn into_value(self) -> Option<Value> {
        Some(Value::U64(self as u64))
    }

    fn from_value(value: Option<Value>) -> Result<Self, ValueError> {
        let wide = match value {
            Some(Value::U64(n)) => n,
            None => return Err(ValueError::Null),
            other => return Err(ValueError::mismatch::<Self>(other.as_ref())),
        };
        u32::try_from(wide).map_err(ValueError::invalid::<Self>)
    }
}

impl RemoteValue for String {
    fn descriptor() -> String {
        "string".to_string()
    }

    fn into_value(self) -> Option<Value> {
        Some(Value::Text(self.into_bytes()))
    }

    fn from_value(value: Option<Value>) -> Result<Self, ValueError> {
        match value {
            Some(Value::Text(bytes)) => String::from_utf8(bytes).map_err(ValueError::invalid::<Self>),
            None => Err(ValueError::Null),
            other => Err(ValueError::mismatch::<Self>(other.as_ref())),
        }
    }
}

impl RemoteValue for Vec<u8> {
    fn descriptor() -> String {
        "bytes".to_string()
    }

    fn into_value(self) -> Option<Value> {
        Some(Value::Bytes(self))
    }

    fn from_value(value: Option<Value>) -> Result<Self, ValueError> {
        match value {
            Some(Value::Bytes(bytes)) => Ok(bytes),
            None => Err(ValueError::Null),
            other => Err(ValueError::mismatch::<Self>(other.as_ref())),
        }
    }
}

/// Lists never contain nulls; a nullable element type fails to compile.
impl<T: RemoteValue> RemoteValue for Vec<T> {
    const NULLABLE: bool = {
        assert!(!T::NULLABLE, "list elements cannot be null");
        false
    };

    fn descriptor() -> String {
        format!("list<{}>", T::descriptor())
    }

    fn into_value(self) -> Option<Value> {
        if Self::NULLABLE {
            return None;
        }
        self.into_iter()
            .map(RemoteValue::into_value)
            .collect::<Option<Vec<_>>>()
            .map(Value::List)
    }

    fn from_value(value: Option<Value>) -> Result<Self, ValueError> {
        match value {
            Some(Value::List(items)) => items.into_iter().map(|item| T::from_value(Some(item))).collect(),
            None => Err(ValueError::Null),
            other => Err(ValueError::mismatch::<Self>(other.as_ref())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_descriptors_compose() {
        assert_eq!(<Vec<String>>::descriptor(), "list<string>");
        assert_eq!(<Vec<Vec<u8>>>::descriptor(), "list<bytes>");
        assert_eq!(<Vec<u8>>::descriptor(), "bytes");
    }

    #[test]
    fn test_lists_keep_every_element() {
        let names = vec!["a".to_string(), String::new(), "c".to_string()];
        let value = names.clone().into_value();
        assert!(matches!(&value, Some(Value::List(items)) if items.len() == 3));
        assert_eq!(<Vec<String>>::from_value(value), Ok(names));
        assert!(<()>::NULLABLE);
        assert!(!<String>::NULLABLE);
    }

    #[test]
    fn test_null_is_reported_separately_from_mismatch() {
        assert_eq!(bool::from_value(None), Err(ValueError::Null));
        assert_eq!(
            u64::from_value(Some(Value::Bool(true))),
            Err(ValueError::Mismatch {
                expected: "u64".into(),
                found: "bool".into()
            })
        );
    }

    #[test]
    fn test_u32_range_is_checked() {
        assert_eq!(u32::from_value(Some(Value::U64(7))), Ok(7));
        assert!(matches!(
            u32::from_value(Some(Value::U64(u64::MAX))),
            Err(ValueError::Invalid { .. })
        ));
    }

    #[test]
    fn test_list_of_strings() {
        let names = vec!["a".to_string(), "b".to_string()];
        let value = names.clone().into_value();
        assert_eq!(<Vec<String>>::from_value(value), Ok(names));
    }

    #[test]
    fn test_void_rejects_a_value() {
        assert!(<()>::from_value(None).is_ok());
        assert!(<()>::from_value(Some(Value::U64(1))).is_err());
    }
}
