//! Identifier and dictionary types shared by glTF 1.0 and 2.0.
//!
//! glTF 2.0 stores every top-level collection as an array and refers to
//! entries by integer index. glTF 1.0 stores them as objects keyed by string
//! id. [`GltfDictionary`] accepts either and [`GltfId`] accepts either kind
//! of reference.
//!
//! Entries are deserialized one at a time. An entry that does not match its
//! schema is kept as an empty slot, so it reads as absent while its siblings
//! stay usable.

use std::fmt;

use indexmap::IndexMap;
use log::warn;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};

/// A reference to a dictionary entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum GltfId {
    /// glTF 2.0 array index.
    Index(usize),
    /// glTF 1.0 object key.
    Name(String),
}

impl fmt::Display for GltfId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GltfId::Index(index) => write!(f, "{}", index),
            GltfId::Name(name) => f.write_str(name),
        }
    }
}

impl From<usize> for GltfId {
    fn from(index: usize) -> Self {
        GltfId::Index(index)
    }
}

impl From<&str> for GltfId {
    fn from(name: &str) -> Self {
        GltfId::Name(name.to_string())
    }
}

/// A top-level glTF collection, either array (2.0) or keyed object (1.0).
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum GltfDictionary<T> {
    /// glTF 2.0 array.
    List(Vec<Option<T>>),
    /// glTF 1.0 object, in document order.
    Map(IndexMap<String, Option<T>>),
}

impl<T> Default for GltfDictionary<T> {
    fn default() -> Self {
        GltfDictionary::List(Vec::new())
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawDictionary {
    List(Vec<serde_json::Value>),
    Map(IndexMap<String, serde_json::Value>),
}

fn entry<T: DeserializeOwned>(id: &str, value: serde_json::Value) -> Option<T> {
    match serde_json::from_value(value) {
        Ok(entry) => Some(entry),
        Err(e) => {
            warn!("ignoring invalid entry {}: {}", id, e);
            None
        }
    }
}

impl<'de, T: DeserializeOwned> Deserialize<'de> for GltfDictionary<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(match RawDictionary::deserialize(deserializer)? {
            RawDictionary::List(values) => GltfDictionary::List(
                values
                    .into_iter()
                    .enumerate()
                    .map(|(index, value)| entry(&index.to_string(), value))
                    .collect(),
            ),
            RawDictionary::Map(map) => GltfDictionary::Map(
                map.into_iter()
                    .map(|(key, value)| {
                        let entry = entry(&key, value);
                        (key, entry)
                    })
                    .collect(),
            ),
        })
    }
}

impl<T> GltfDictionary<T> {
    /// Look up an entry. Missing and invalid entries are `None`, never an
    /// error.
    pub fn get(&self, id: &GltfId) -> Option<&T> {
        let slot = match (self, id) {
            (GltfDictionary::List(list), GltfId::Index(index)) => list.get(*index),
            (GltfDictionary::List(list), GltfId::Name(name)) => {
                name.parse::<usize>().ok().and_then(|index| list.get(index))
            }
            (GltfDictionary::Map(map), GltfId::Name(name)) => map.get(name),
            (GltfDictionary::Map(map), GltfId::Index(index)) => map.get(&index.to_string()),
        };
        slot?.as_ref()
    }

    /// Number of valid entries.
    pub fn len(&self) -> usize {
        self.iter().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// True for the glTF 1.0 object form.
    pub fn is_keyed(&self) -> bool {
        matches!(self, GltfDictionary::Map(_))
    }

    /// Iterate over valid entries with their ids, in document order.
    pub fn iter(&self) -> Box<dyn Iterator<Item = (GltfId, &T)> + '_> {
        match self {
            GltfDictionary::List(list) => Box::new(
                list.iter()
                    .enumerate()
                    .filter_map(|(index, value)| Some((GltfId::Index(index), value.as_ref()?))),
            ),
            GltfDictionary::Map(map) => Box::new(
                map.iter()
                    .filter_map(|(key, value)| Some((GltfId::Name(key.clone()), value.as_ref()?))),
            ),
        }
    }

    /// All ids, in document order.
    pub fn ids(&self) -> Vec<GltfId> {
        self.iter().map(|(id, _)| id).collect()
    }
}
