//! Nested JSON values addressed by key paths such as `"person.age.is_old"`.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub const DEFAULT_DELIMITER: &str = ".";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MultiKeyError {
    #[error("Key path string is empty")]
    EmptyPath,
    #[error("Key path has no keys")]
    EmptyKeys,
}

pub type Result<T> = std::result::Result<T, MultiKeyError>;

/// A key path: either a delimited string or a sequence of keys.
pub trait KeyPath {
    fn split_keys(&self, delimiter: &str) -> Result<Vec<String>>;
}

impl KeyPath for str {
    fn split_keys(&self, delimiter: &str) -> Result<Vec<String>> {
        if self.is_empty() {
            return Err(MultiKeyError::EmptyPath);
        }
        Ok(self.split(delimiter).map(str::to_string).collect())
    }
}

impl KeyPath for String {
    fn split_keys(&self, delimiter: &str) -> Result<Vec<String>> {
        self.as_str().split_keys(delimiter)
    }
}

impl<S: AsRef<str>> KeyPath for [S] {
    fn split_keys(&self, _delimiter: &str) -> Result<Vec<String>> {
        if self.is_empty() {
            return Err(MultiKeyError::EmptyKeys);
        }
        Ok(self.iter().map(|key| key.as_ref().to_string()).collect())
    }
}

impl<S: AsRef<str>, const N: usize> KeyPath for [S; N] {
    fn split_keys(&self, delimiter: &str) -> Result<Vec<String>> {
        self.as_slice().split_keys(delimiter)
    }
}

impl<S: AsRef<str>> KeyPath for Vec<S> {
    fn split_keys(&self, delimiter: &str) -> Result<Vec<String>> {
        self.as_slice().split_keys(delimiter)
    }
}

/// Validates a key path and returns its keys.
pub fn prepare_keys<K: KeyPath + ?Sized>(keys: &K, delimiter: &str) -> Result<Vec<String>> {
    keys.split_keys(delimiter)
}

fn default_delimiter() -> String {
    DEFAULT_DELIMITER.to_string()
}

/// A JSON object whose nested values are read and written by key path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MultiKeyObject {
    object: Value,
    #[serde(skip, default = "default_delimiter")]
    delimiter: String,
}

impl Default for MultiKeyObject {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Value> for MultiKeyObject {
    fn from(object: Value) -> Self {
        Self {
            object,
            delimiter: default_delimiter(),
        }
    }
}

impl MultiKeyObject {
    pub fn new() -> Self {
        Self::from(Value::Object(Map::new()))
    }

    /// Uses `delimiter` instead of `.` to split string key paths.
    pub fn with_delimiter(mut self, delimiter: impl Into<String>) -> Self {
        self.delimiter = delimiter.into();
        self
    }

    pub fn as_value(&self) -> &Value {
        &self.object
    }

    pub fn into_value(self) -> Value {
        self.object
    }

    fn prepare<K: KeyPath + ?Sized>(&self, keys: &K) -> Result<Vec<String>> {
        prepare_keys(keys, &self.delimiter)
    }

    /// Stores `value` at the path, replacing any non-object value met on the way.
    pub fn set<K: KeyPath + ?Sized>(
        &mut self,
        keys: &K,
        value: impl Into<Value>,
    ) -> Result<&mut Self> {
        let keys = self.prepare(keys)?;
        let (last, parents) = keys.split_last().ok_or(MultiKeyError::EmptyKeys)?;

        let mut node = object_mut(&mut self.object);
        for key in parents {
            let child = node.entry(key.clone()).or_insert(Value::Null);
            node = object_mut(child);
        }
        node.insert(last.clone(), value.into());

        Ok(self)
    }

    pub fn get<K: KeyPath + ?Sized>(&self, keys: &K) -> Result<Option<&Value>> {
        let keys = self.prepare(keys)?;
        Ok(keys.iter().try_fold(&self.object, |node, key| child(node, key)))
    }

    pub fn get_mut<K: KeyPath + ?Sized>(&mut self, keys: &K) -> Result<Option<&mut Value>> {
        let keys = self.prepare(keys)?;
        Ok(keys
            .iter()
            .try_fold(&mut self.object, |node, key| child_mut(node, key)))
    }

    /// A stored `null` counts as present.
    pub fn has<K: KeyPath + ?Sized>(&self, keys: &K) -> Result<bool> {
        Ok(self.get(keys)?.is_some())
    }

    /// Removes the value at the path and reports whether anything was removed.
    ///
    /// The path steps through objects and arrays alike; removing an array
    /// element shifts the ones after it. With `prune_empty`, containers left
    /// empty by the removal are removed as well, walking up towards (but never
    /// removing) the root.
    pub fn delete<K: KeyPath + ?Sized>(&mut self, keys: &K, prune_empty: bool) -> Result<bool> {
        let keys = self.prepare(keys)?;
        Ok(remove_path(&mut self.object, &keys, prune_empty))
    }

    pub fn entries(&self) -> Leaves<'_> {
        leaves(&self.object)
    }

    pub fn keys(&self) -> impl Iterator<Item = Vec<String>> + '_ {
        self.entries().map(|(keys, _)| keys)
    }

    pub fn values(&self) -> impl Iterator<Item = &Value> + '_ {
        self.entries().map(|(_, value)| value)
    }
}

fn object_mut(value: &mut Value) -> &mut Map<String, Value> {
    if !value.is_object() {
        *value = Value::Object(Map::new());
    }
    match value {
        Value::Object(map) => map,
        _ => unreachable!("value was just replaced with an object"),
    }
}

fn child<'v>(node: &'v Value, key: &str) -> Option<&'v Value> {
    match node {
        Value::Object(map) => map.get(key),
        Value::Array(items) => key.parse::<usize>().ok().and_then(|index| items.get(index)),
        _ => None,
    }
}

fn child_mut<'v>(node: &'v mut Value, key: &str) -> Option<&'v mut Value> {
    match node {
        Value::Object(map) => map.get_mut(key),
        Value::Array(items) => key
            .parse::<usize>()
            .ok()
            .and_then(|index| items.get_mut(index)),
        _ => None,
    }
}

fn remove_child(node: &mut Value, key: &str) -> bool {
    match node {
        Value::Object(map) => map.shift_remove(key).is_some(),
        Value::Array(items) => match key.parse::<usize>() {
            Ok(index) if index < items.len() => {
                items.remove(index);
                true
            }
            _ => false,
        },
        _ => false,
    }
}

fn is_empty_container(value: &Value) -> bool {
    match value {
        Value::Object(map) => map.is_empty(),
        Value::Array(items) => items.is_empty(),
        _ => false,
    }
}

fn remove_path(node: &mut Value, keys: &[String], prune_empty: bool) -> bool {
    let Some((first, rest)) = keys.split_first() else {
        return false;
    };
    if rest.is_empty() {
        return remove_child(node, first);
    }

    let Some(next) = child_mut(node, first) else {
        return false;
    };
    let removed = remove_path(next, rest, prune_empty);
    if removed && prune_empty && is_empty_container(next) {
        remove_child(node, first);
    }
    removed
}

/// Depth-first walk over the leaves of `value`.
///
/// A leaf is anything that is not a container, or an empty container. Keys
/// come out in map order; array elements are keyed by their index.
pub fn leaves(value: &Value) -> Leaves<'_> {
    Leaves {
        stack: vec![(Vec::new(), value)],
    }
}

pub struct Leaves<'a> {
    stack: Vec<(Vec<String>, &'a Value)>,
}

impl<'a> Iterator for Leaves<'a> {
    type Item = (Vec<String>, &'a Value);

    fn next(&mut self) -> Option<Self::Item> {
        while let Some((path, value)) = self.stack.pop() {
            match value {
                Value::Object(map) if !map.is_empty() => {
                    for (key, child) in map.iter().rev() {
                        self.stack.push((extend(&path, key.clone()), child));
                    }
                }
                Value::Array(items) if !items.is_empty() => {
                    for (index, child) in items.iter().enumerate().rev() {
                        self.stack.push((extend(&path, index.to_string()), child));
                    }
                }
                _ if path.is_empty() => {}
                _ => return Some((path, value)),
            }
        }
        None
    }
}

fn extend(path: &[String], key: String) -> Vec<String> {
    let mut path = path.to_vec();
    path.push(key);
    path
}
