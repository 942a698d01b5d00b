//! Typed form payload stored next to each submission.
//!
//! Only flat data is accepted: each key maps to a scalar (null, bool, number,
//! string) or to a list of scalars. Anything else is rejected when the request
//! is decoded instead of being passed through as an untyped blob.

use serde::Serialize;
use serde_json::{Map, Number, Value};
use std::collections::BTreeMap;

use super::error::{Field, ValidationError};

pub const MAX_KEYS: usize = 64;
pub const MAX_KEY_LEN: usize = 64;
pub const MAX_TEXT_LEN: usize = 1024;
pub const MAX_LIST_LEN: usize = 64;

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Scalar {
    Null,
    Bool(bool),
    Number(Number),
    Text(String),
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum PayloadValue {
    Scalar(Scalar),
    List(Vec<Scalar>),
}

impl PayloadValue {
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Scalar(Scalar::Text(text)) => Some(text),
            _ => None,
        }
    }
}

impl From<&str> for PayloadValue {
    fn from(value: &str) -> Self {
        Self::Scalar(Scalar::Text(value.to_string()))
    }
}

impl From<String> for PayloadValue {
    fn from(value: String) -> Self {
        Self::Scalar(Scalar::Text(value))
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Payload(BTreeMap<String, PayloadValue>);

impl Payload {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<PayloadValue>) {
        self.0.insert(key.into(), value.into());
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&PayloadValue> {
        self.0.get(key)
    }

    /// Identifier text under the first of `keys` that is present. Absent and
    /// null values read as empty, so the identifier parser reports them as
    /// missing.
    ///
    /// # Errors
    /// `Malformed(field)` when the value is present but is not a string.
    pub fn identifier(&self, keys: &[&str], field: Field) -> Result<&str, ValidationError> {
        match keys.iter().find_map(|key| self.0.get(*key)) {
            None | Some(PayloadValue::Scalar(Scalar::Null)) => Ok(""),
            Some(value) => value.as_text().ok_or(ValidationError::Malformed(field)),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &PayloadValue)> {
        self.0.iter()
    }

    /// JSON text for the `payload` column.
    ///
    /// # Errors
    /// Only fails if serialization itself fails, which flat data cannot trigger.
    pub fn to_json_string(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

fn scalar(key: &str, value: Value) -> Result<Scalar, ValidationError> {
    match value {
        Value::Null => Ok(Scalar::Null),
        Value::Bool(flag) => Ok(Scalar::Bool(flag)),
        Value::Number(number) => Ok(Scalar::Number(number)),
        Value::String(text) => {
            if text.chars().count() > MAX_TEXT_LEN {
                return Err(ValidationError::Payload(format!(
                    "value of {key} exceeds {MAX_TEXT_LEN} characters"
                )));
            }
            Ok(Scalar::Text(text))
        }
        Value::Array(_) | Value::Object(_) => Err(ValidationError::Payload(format!(
            "{key} must be a scalar or a flat list"
        ))),
    }
}

fn value(key: &str, value: Value) -> Result<PayloadValue, ValidationError> {
    match value {
        Value::Array(items) => {
            if items.len() > MAX_LIST_LEN {
                return Err(ValidationError::Payload(format!(
                    "{key} has more than {MAX_LIST_LEN} items"
                )));
            }
            items
                .into_iter()
                .map(|item| scalar(key, item))
                .collect::<Result<Vec<_>, _>>()
                .map(PayloadValue::List)
        }
        other => scalar(key, other).map(PayloadValue::Scalar),
    }
}

impl TryFrom<Map<String, Value>> for Payload {
    type Error = ValidationError;

    fn try_from(object: Map<String, Value>) -> Result<Self, Self::Error> {
        if object.len() > MAX_KEYS {
            return Err(ValidationError::Payload(format!(
                "more than {MAX_KEYS} fields"
            )));
        }

        let mut payload = BTreeMap::new();
        for (key, raw) in object {
            if key.is_empty() || key.chars().count() > MAX_KEY_LEN {
                return Err(ValidationError::Payload(format!(
                    "field names must be 1-{MAX_KEY_LEN} characters"
                )));
            }
            let parsed = value(&key, raw)?;
            payload.insert(key, parsed);
        }

        Ok(Self(payload))
    }
}

impl TryFrom<Value> for Payload {
    type Error = ValidationError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Object(object) => Self::try_from(object),
            _ => Err(ValidationError::Payload(
                "body must be a JSON object".to_string(),
            )),
        }
    }
}
