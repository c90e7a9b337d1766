use std::collections::BTreeMap;

use chrono::{DateTime, Local, SecondsFormat};
use serde::ser::{Serialize, SerializeMap, SerializeSeq, Serializer};
use serde_json::{Number, Value};
use timemgt_types::ObjectId;

use crate::error::ParamError;

/// A sanitized request value. Mirrors JSON plus the two coerced leaf kinds.
#[derive(Debug, Clone, PartialEq)]
pub enum Param {
    Null,
    Bool(bool),
    Number(Number),
    String(String),
    ObjectId(ObjectId),
    Time(DateTime<Local>),
    Object(BTreeMap<String, Param>),
    Array(Vec<Param>),
}

impl Param {
    /// Structural conversion with no coercion and no checks. Used for
    /// subtrees the policy leaves untouched.
    pub fn from_json(value: Value) -> Self {
        match value {
            Value::Null => Param::Null,
            Value::Bool(b) => Param::Bool(b),
            Value::Number(n) => Param::Number(n),
            Value::String(s) => Param::String(s),
            Value::Array(items) => Param::Array(items.into_iter().map(Param::from_json).collect()),
            Value::Object(map) => Param::Object(
                map.into_iter()
                    .map(|(k, v)| (k, Param::from_json(v)))
                    .collect(),
            ),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Param::Null)
    }

    /// Text view of a leaf. Coerced leaves render back to their wire form so
    /// a free-text field that happens to look like an id or a time still reads.
    pub fn as_text(&self) -> Option<String> {
        match self {
            Param::String(s) => Some(s.clone()),
            Param::ObjectId(id) => Some(id.to_hex()),
            Param::Time(t) => Some(t.to_rfc3339_opts(SecondsFormat::AutoSi, true)),
            _ => None,
        }
    }

    pub fn as_object_id(&self) -> Option<ObjectId> {
        match self {
            Param::ObjectId(id) => Some(*id),
            _ => None,
        }
    }

    pub fn as_time(&self) -> Option<DateTime<Local>> {
        match self {
            Param::Time(t) => Some(*t),
            _ => None,
        }
    }
}

impl Serialize for Param {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Param::Null => serializer.serialize_unit(),
            Param::Bool(b) => serializer.serialize_bool(*b),
            Param::Number(n) => n.serialize(serializer),
            Param::String(s) => serializer.serialize_str(s),
            Param::ObjectId(id) => id.serialize(serializer),
            Param::Time(t) => {
                serializer.serialize_str(&t.to_rfc3339_opts(SecondsFormat::AutoSi, true))
            }
            Param::Object(map) => {
                let mut out = serializer.serialize_map(Some(map.len()))?;
                for (k, v) in map {
                    out.serialize_entry(k, v)?;
                }
                out.end()
            }
            Param::Array(items) => {
                let mut out = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    out.serialize_element(item)?;
                }
                out.end()
            }
        }
    }
}

/// The sanitized top-level request object.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Params(BTreeMap<String, Param>);

impl Params {
    pub fn new(map: BTreeMap<String, Param>) -> Self {
        Self(map)
    }

    pub fn get(&self, key: &str) -> Option<&Param> {
        self.0.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_inner(self) -> BTreeMap<String, Param> {
        self.0
    }

    /// Required text field. Presence is checked separately, so a missing key
    /// reports the same shape error as a wrongly typed one.
    pub fn text(&self, key: &str) -> Result<String, ParamError> {
        self.get(key)
            .and_then(Param::as_text)
            .ok_or_else(|| ParamError::invalid(key, "a string"))
    }

    pub fn object_id(&self, key: &str) -> Result<ObjectId, ParamError> {
        self.get(key)
            .and_then(Param::as_object_id)
            .ok_or_else(|| ParamError::invalid(key, "an identifier"))
    }

    pub fn object_ids(&self, key: &str) -> Result<Vec<ObjectId>, ParamError> {
        match self.get(key) {
            Some(Param::Array(items)) => items
                .iter()
                .map(|item| {
                    item.as_object_id()
                        .ok_or_else(|| ParamError::invalid(key, "a list of identifiers"))
                })
                .collect(),
            _ => Err(ParamError::invalid(key, "a list of identifiers")),
        }
    }

    /// Like [`Params::object_ids`] but absent or null is `None`.
    pub fn opt_object_ids(&self, key: &str) -> Result<Option<Vec<ObjectId>>, ParamError> {
        match self.get(key) {
            None | Some(Param::Null) => Ok(None),
            Some(_) => self.object_ids(key).map(Some),
        }
    }

    /// Inclusive `[start, end]` pair. Anything other than a two-element list
    /// is ignored; a two-element list must hold two timestamps.
    pub fn time_range(
        &self,
        key: &str,
    ) -> Result<Option<(DateTime<Local>, DateTime<Local>)>, ParamError> {
        match self.get(key) {
            Some(Param::Array(items)) if items.len() == 2 => {
                match (items[0].as_time(), items[1].as_time()) {
                    (Some(start), Some(end)) => Ok(Some((start, end))),
                    _ => Err(ParamError::invalid(key, "two RFC 3339 timestamps")),
                }
            }
            _ => Ok(None),
        }
    }
}

impl Serialize for Params {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut out = serializer.serialize_map(Some(self.0.len()))?;
        for (k, v) in &self.0 {
            out.serialize_entry(k, v)?;
        }
        out.end()
    }
}
