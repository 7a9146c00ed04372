//! Structural merge of preference values.
//!
//! This is the reconciliation core: given the value currently on disk and
//! the desired value from a configuration document, compute what should be
//! written - or report that nothing effective would change, so the caller
//! can skip the write entirely.
//!
//! Two operator tokens are recognized inside desired values:
//!
//! - the dictionary key `"!"` means "discard every existing entry in this
//!   dictionary, keep only the new entries" (the marker itself is removed)
//! - the array element `"..."` means "splice the existing array's items in
//!   at this position" (deduplicated against what the new array provides)
//!
//! Both are plain data, special-cased by position; values are otherwise
//! opaque and never interpreted.

use plist::{Dictionary, Value};

/// Dictionary key that clears all prior entries of that dictionary.
pub const CLEAR_MARKER: &str = "!";

/// Array element that splices in the prior array's items.
pub const PRESERVE_MARKER: &str = "...";

/// Outcome of a merge.
///
/// `Unchanged` means the existing value already satisfies the desired one
/// and carries no payload, giving callers an O(1) "no-op" signal without a
/// deep equality pass over large preference trees.
#[derive(Debug, Clone, PartialEq)]
pub enum Merged {
    /// The existing value needs no update.
    Unchanged,
    /// The store should be rewritten with this value.
    Changed(Value),
}

impl Merged {
    /// Resolve to a concrete value, falling back to `old` when unchanged.
    pub fn into_value(self, old: &Value) -> Value {
        match self {
            Merged::Unchanged => old.clone(),
            Merged::Changed(value) => value,
        }
    }
}

/// Merge `new` into `old`. Pure and deterministic; no I/O.
pub fn merge(old: &Value, new: &Value) -> Merged {
    match (old, new) {
        (Value::Dictionary(old_dict), Value::Dictionary(new_dict)) => {
            merge_dictionaries(old_dict, new_dict)
        }
        (_, Value::Array(new_items)) => merge_array(old, new_items),
        _ => {
            if old == new {
                Merged::Unchanged
            } else {
                Merged::Changed(new.clone())
            }
        }
    }
}

fn merge_dictionaries(old: &Dictionary, new: &Dictionary) -> Merged {
    // "!" requests an explicit overwrite: drop everything old, keep only
    // the new entries. Always reported as a change, even if the resulting
    // content happens to equal the old dictionary.
    if new.contains_key(CLEAR_MARKER) {
        let cleared: Dictionary = new
            .iter()
            .filter(|(key, _)| key.as_str() != CLEAR_MARKER)
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();
        return Merged::Changed(Value::Dictionary(cleared));
    }

    // Recursive key-wise merge. Keys present only in old are retained;
    // keys new to the dictionary are inserted verbatim.
    let mut result = old.clone();
    let mut changed = false;
    for (key, new_value) in new {
        match old.get(key) {
            Some(old_value) => {
                if let Merged::Changed(merged) = merge(old_value, new_value) {
                    result.insert(key.clone(), merged);
                    changed = true;
                }
            }
            None => {
                result.insert(key.clone(), new_value.clone());
                changed = true;
            }
        }
    }

    if changed {
        Merged::Changed(Value::Dictionary(result))
    } else {
        Merged::Unchanged
    }
}

fn merge_array(old: &Value, new_items: &[Value]) -> Merged {
    let old_items: Option<&Vec<Value>> = match old {
        Value::Array(items) => Some(items),
        _ => None,
    };

    // Items already on disk never count as additions.
    let mut seen: std::collections::HashSet<String> = old_items
        .map(|items| items.iter().map(dedup_key).collect())
        .unwrap_or_default();

    let mut result: Vec<Value> = Vec::new();
    let mut changed = false;

    for item in new_items {
        if is_preserve_marker(item) {
            // Splice in old items not already present in the result so
            // far, in old's order. Splicing never marks a change.
            if let Some(old_items) = old_items {
                for old_item in old_items {
                    if !result.contains(old_item) {
                        result.push(old_item.clone());
                    }
                }
            }
        } else {
            let key = dedup_key(item);
            if seen.insert(key) {
                result.push(item.clone());
                changed = true;
            }
        }
    }

    match old_items {
        Some(old_items) if !changed && result.len() == old_items.len() => Merged::Unchanged,
        _ => Merged::Changed(Value::Array(result)),
    }
}

fn is_preserve_marker(value: &Value) -> bool {
    matches!(value, Value::String(s) if s == PRESERVE_MARKER)
}

/// Stable string key for array deduplication.
///
/// Dictionaries hash by their key-sorted entries so that two dictionaries
/// with the same content but different insertion order dedup together;
/// everything else uses its direct string form.
fn dedup_key(value: &Value) -> String {
    match value {
        Value::Dictionary(dict) => {
            let mut pairs: Vec<(&str, String)> = dict
                .iter()
                .map(|(key, value)| (key.as_str(), dedup_key(value)))
                .collect();
            pairs.sort();
            format!("{pairs:?}")
        }
        Value::Array(items) => {
            let keys: Vec<String> = items.iter().map(dedup_key).collect();
            format!("{keys:?}")
        }
        Value::String(s) => s.clone(),
        other => format!("{other:?}"),
    }
}
