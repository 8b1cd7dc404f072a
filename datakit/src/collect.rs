//! Chunking, grouping and ordering helpers over in-memory collections.

use std::hash::Hash;

use hashbrown::HashMap;
use serde_json::{Map, Value};

/// Splits `items` into consecutive chunks of at most `length` items.
///
/// # Panics
///
/// Panics if `length` is 0.
pub fn chunk<T>(items: impl IntoIterator<Item = T>, length: usize) -> Vec<Vec<T>> {
    assert!(length > 0, "chunk length must be > 0");

    let mut chunks: Vec<Vec<T>> = Vec::new();
    for item in items {
        match chunks.last_mut() {
            Some(last) if last.len() < length => last.push(item),
            _ => {
                let mut next = Vec::with_capacity(length);
                next.push(item);
                chunks.push(next);
            }
        }
    }
    chunks
}

/// Splits an object into consecutive sub-objects of at most `length` keys,
/// keeping key order.
///
/// # Panics
///
/// Panics if `length` is 0.
pub fn chunk_object(object: Map<String, Value>, length: usize) -> Vec<Map<String, Value>> {
    chunk(object, length)
        .into_iter()
        .map(|entries| entries.into_iter().collect())
        .collect()
}

/// Groups items by key. Items within a group keep their input order.
pub fn group_by<T, K, F>(items: impl IntoIterator<Item = T>, mut key_of: F) -> HashMap<K, Vec<T>>
where
    K: Eq + Hash,
    F: FnMut(&T) -> K,
{
    let mut groups: HashMap<K, Vec<T>> = HashMap::new();
    for item in items {
        groups.entry(key_of(&item)).or_default().push(item);
    }
    groups
}

/// Groups JSON values by the value of one of their fields.
///
/// String fields group by their content, other fields by their JSON text, and
/// values without the field (or that are not objects) under `"null"`.
pub fn group_by_field(
    values: impl IntoIterator<Item = Value>,
    field: &str,
) -> HashMap<String, Vec<Value>> {
    group_by(values, |value| match value.get(field) {
        Some(Value::String(text)) => text.clone(),
        Some(other) => other.to_string(),
        None => Value::Null.to_string(),
    })
}

/// Largest value strictly below `x`.
pub fn max_below(values: &[f64], x: f64) -> Option<f64> {
    values
        .iter()
        .copied()
        .filter(|&value| value < x)
        .reduce(f64::max)
}

/// Smallest value strictly above `x`.
pub fn min_above(values: &[f64], x: f64) -> Option<f64> {
    values
        .iter()
        .copied()
        .filter(|&value| value > x)
        .reduce(f64::min)
}

/// Maps values onto positions around 0 that keep their relative order.
///
/// The first value sits at 0. A value below everything seen so far lands `d`
/// under the closest larger value, one above everything `d` over the closest
/// smaller value, and anything else halfway between its two neighbours.
/// Repeated values keep the position they were first given.
pub fn map_distance_deltas(values: &[f64], d: f64) -> Vec<f64> {
    let mut positions: HashMap<u64, f64> = HashMap::new();
    let position_of = |positions: &HashMap<u64, f64>, value: f64| {
        positions.get(&value.to_bits()).copied().unwrap_or_default()
    };

    let mut mapped = Vec::with_capacity(values.len());
    for (index, &value) in values.iter().enumerate() {
        if let Some(&known) = positions.get(&value.to_bits()) {
            mapped.push(known);
            continue;
        }

        let seen = &values[..index];
        let position = match (max_below(seen, value), min_above(seen, value)) {
            (None, None) => 0.0,
            (None, Some(above)) => position_of(&positions, above) - d,
            (Some(below), None) => position_of(&positions, below) + d,
            (Some(below), Some(above)) => {
                let below = position_of(&positions, below);
                let above = position_of(&positions, above);
                below + (above - below) / 2.0
            }
        };

        positions.insert(value.to_bits(), position);
        mapped.push(position);
    }
    mapped
}
