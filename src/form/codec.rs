use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};

/// Working values of one form instance, in field insertion order.
pub type ValueMap = IndexMap<String, FieldValue>;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Null,
    Bool(bool),
    Number(f64),
    Text(String),
    List(Vec<FieldValue>),
}

impl FieldValue {
    /// Serialized form used for every comparison. Non-finite numbers become `null`.
    pub fn to_json(&self) -> Value {
        match self {
            FieldValue::Null => Value::Null,
            FieldValue::Bool(value) => Value::Bool(*value),
            FieldValue::Number(value) => Number::from_f64(*value).map_or(Value::Null, Value::Number),
            FieldValue::Text(value) => Value::String(value.clone()),
            FieldValue::List(items) => Value::Array(items.iter().map(FieldValue::to_json).collect()),
        }
    }

    /// Whether a required field holding this value counts as unfilled.
    pub fn is_blank(&self) -> bool {
        match self {
            FieldValue::Null => true,
            FieldValue::Bool(value) => !value,
            FieldValue::Text(value) => value.is_empty(),
            FieldValue::Number(_) | FieldValue::List(_) => false,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::Text(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            FieldValue::Bool(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FieldValue::Number(value) => Some(*value),
            _ => None,
        }
    }

    fn empty_like(&self) -> Self {
        match self {
            FieldValue::Bool(_) => FieldValue::Bool(false),
            FieldValue::Number(_) => FieldValue::Number(0.0),
            FieldValue::List(_) => FieldValue::List(Vec::new()),
            FieldValue::Null | FieldValue::Text(_) => FieldValue::Text(String::new()),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Text(value)
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        FieldValue::Bool(value)
    }
}

macro_rules! impl_from_number {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for FieldValue {
                fn from(value: $ty) -> Self {
                    FieldValue::Number(f64::from(value))
                }
            }
        )*
    };
}

impl_from_number!(i8, i16, i32, u8, u16, u32, f32, f64);

/// Lossy above 2^53: values are stored as `f64`.
impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        FieldValue::Number(value as f64)
    }
}

/// Lossy above 2^53: values are stored as `f64`.
impl From<u64> for FieldValue {
    fn from(value: u64) -> Self {
        FieldValue::Number(value as f64)
    }
}

impl<T> From<Vec<T>> for FieldValue
where
    T: Into<FieldValue>,
{
    fn from(values: Vec<T>) -> Self {
        FieldValue::List(values.into_iter().map(Into::into).collect())
    }
}

impl<T> From<Option<T>> for FieldValue
where
    T: Into<FieldValue>,
{
    fn from(value: Option<T>) -> Self {
        value.map_or(FieldValue::Null, Into::into)
    }
}

/// Builds a [`ValueMap`] from `key => value` pairs, converting values with `Into<FieldValue>`.
#[macro_export]
macro_rules! value_map {
    () => {
        $crate::form::ValueMap::new()
    };
    ($($key:expr => $value:expr),+ $(,)?) => {{
        let mut map = $crate::form::ValueMap::new();
        $(
            map.insert(::std::string::String::from($key), $crate::form::FieldValue::from($value));
        )+
        map
    }};
}

/// Structural equality over serialized values. Key order is ignored, list order is not.
pub fn equal(a: &ValueMap, b: &ValueMap) -> bool {
    a.len() == b.len()
        && a.iter().all(|(key, value)| {
            b.get(key)
                .is_some_and(|other| value.to_json() == other.to_json())
        })
}

/// Keys of `current` whose serialized value differs from `original`.
///
/// Keys present only in `original` are never reported.
pub fn diff_keys(original: &ValueMap, current: &ValueMap) -> Vec<String> {
    current
        .iter()
        .filter(|(key, value)| {
            original
                .get(key.as_str())
                .is_none_or(|before| before.to_json() != value.to_json())
        })
        .map(|(key, _)| key.clone())
        .collect()
}

pub fn reset_to_empty(values: &ValueMap) -> ValueMap {
    values
        .iter()
        .map(|(key, value)| (key.clone(), value.empty_like()))
        .collect()
}

pub fn trim(values: &ValueMap) -> ValueMap {
    values
        .iter()
        .map(|(key, value)| {
            let trimmed = match value {
                FieldValue::Text(text) => FieldValue::Text(text.trim().to_string()),
                other => other.clone(),
            };
            (key.clone(), trimmed)
        })
        .collect()
}
