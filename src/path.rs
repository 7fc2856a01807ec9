//! Dot-path access helpers for `serde_json::Value`.
//!
//! Paths are dot-separated segments (`"properties.name"`); a segment that
//! parses as an unsigned integer indexes into an array. `set` creates
//! intermediate objects as needed, matching the behavior the transform
//! engine expects for mapping output paths.

use serde_json::Value;

fn segments(path: &str) -> impl Iterator<Item = &str> {
    path.split('.').filter(|s| !s.is_empty())
}

/// Get a reference to the value at `path`, if present.
pub fn get<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = value;
    for seg in segments(path) {
        current = match current {
            Value::Object(map) => map.get(seg)?,
            Value::Array(items) => items.get(seg.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

/// Check whether `path` resolves on `value`.
pub fn has(value: &Value, path: &str) -> bool {
    get(value, path).is_some()
}

/// Set `new` at `path`, creating intermediate objects for missing segments.
///
/// Existing non-object intermediates are replaced by objects, the same way
/// a fresh assignment would shadow them. Array index segments only descend
/// into existing arrays; they never grow one.
pub fn set(value: &mut Value, path: &str, new: Value) {
    let segs: Vec<&str> = segments(path).collect();
    if segs.is_empty() {
        return;
    }
    let mut current = value;
    for seg in &segs[..segs.len() - 1] {
        if let Value::Array(items) = current {
            if let Ok(idx) = seg.parse::<usize>() {
                if idx < items.len() {
                    current = &mut items[idx];
                    continue;
                }
            }
            return;
        }
        if !current.is_object() {
            *current = Value::Object(serde_json::Map::new());
        }
        current = current
            .as_object_mut()
            .expect("just ensured object")
            .entry((*seg).to_string())
            .or_insert(Value::Object(serde_json::Map::new()));
    }
    let last = segs[segs.len() - 1];
    match current {
        Value::Array(items) => {
            if let Ok(idx) = last.parse::<usize>() {
                if idx < items.len() {
                    items[idx] = new;
                }
            }
        }
        _ => {
            if !current.is_object() {
                *current = Value::Object(serde_json::Map::new());
            }
            current
                .as_object_mut()
                .expect("just ensured object")
                .insert(last.to_string(), new);
        }
    }
}

/// Remove the value at `path`. Missing paths are a no-op.
pub fn unset(value: &mut Value, path: &str) {
    let segs: Vec<&str> = segments(path).collect();
    if segs.is_empty() {
        return;
    }
    let mut current = value;
    for seg in &segs[..segs.len() - 1] {
        current = match current {
            Value::Object(map) => match map.get_mut(*seg) {
                Some(v) => v,
                None => return,
            },
            Value::Array(items) => match seg.parse::<usize>().ok().and_then(|i| items.get_mut(i)) {
                Some(v) => v,
                None => return,
            },
            _ => return,
        };
    }
    let last = segs[segs.len() - 1];
    match current {
        Value::Object(map) => {
            map.shift_remove(last);
        }
        Value::Array(items) => {
            if let Ok(idx) = last.parse::<usize>() {
                if idx < items.len() {
                    items.remove(idx);
                }
            }
        }
        _ => {}
    }
}
