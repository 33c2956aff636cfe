//! Property access over JSON documents
//!
//! Reads a value out of a fetched object by JSON pointer, and builds the
//! minimal merge-patch document that sets a value at a JSON pointer.

use serde_json::{Map, Value};

use crate::error::{Error, Result};

/// Split a JSON pointer into unescaped reference tokens
fn tokens(pointer: &str) -> Result<Vec<String>> {
    if pointer.is_empty() {
        return Ok(Vec::new());
    }
    let Some(body) = pointer.strip_prefix('/') else {
        return Err(invalid(pointer, "pointer must start with '/'"));
    };
    body.split('/').map(|raw| unescape(pointer, raw)).collect()
}

fn unescape(pointer: &str, raw: &str) -> Result<String> {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c != '~' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('0') => out.push('~'),
            Some('1') => out.push('/'),
            _ => return Err(invalid(pointer, &format!("bad escape in token '{raw}'"))),
        }
    }
    Ok(out)
}

fn invalid(pointer: &str, reason: &str) -> Error {
    Error::InvalidPointer {
        pointer: pointer.to_string(),
        reason: reason.to_string(),
    }
}

/// Array index tokens must be canonical: digits only, no leading zeros
fn array_index(token: &str) -> Option<usize> {
    let canonical = token == "0"
        || (!token.is_empty()
            && !token.starts_with('0')
            && token.bytes().all(|b| b.is_ascii_digit()));
    if canonical {
        token.parse().ok()
    } else {
        None
    }
}

/// Look up the value at `pointer` inside `document`
pub fn get<'a>(document: &'a Value, pointer: &str) -> Result<&'a Value> {
    let mut current = document;
    for token in tokens(pointer)? {
        current = match current {
            Value::Object(map) => map
                .get(&token)
                .ok_or_else(|| invalid(pointer, &format!("field '{token}' does not exist")))?,
            Value::Array(items) => {
                let index = array_index(&token)
                    .ok_or_else(|| invalid(pointer, &format!("'{token}' is not an array index")))?;
                items.get(index).ok_or_else(|| {
                    invalid(
                        pointer,
                        &format!("index {index} out of bounds (length {})", items.len()),
                    )
                })?
            }
            _ => {
                return Err(invalid(
                    pointer,
                    &format!("cannot descend into a scalar at '{token}'"),
                ))
            }
        };
    }
    Ok(current)
}

/// Step into one child of a container, if it exists
fn child<'a>(value: &'a Value, token: &str) -> Option<&'a Value> {
    match value {
        Value::Object(map) => map.get(token),
        Value::Array(items) => array_index(token).and_then(|index| items.get(index)),
        _ => None,
    }
}

/// Whether the parent of `pointer` exists and is an object lacking the last field
pub fn leaf_is_absent(document: &Value, pointer: &str) -> bool {
    let Ok(mut tokens) = tokens(pointer) else {
        return false;
    };
    let Some(leaf) = tokens.pop() else {
        return false;
    };
    let mut current = document;
    for token in &tokens {
        match child(current, token) {
            Some(next) => current = next,
            None => return false,
        }
    }
    matches!(current, Value::Object(map) if !map.contains_key(&leaf))
}

/// Reject pointers a merge patch cannot express against `document`
///
/// A merge patch replaces arrays wholesale, so no segment of the path may
/// step through an array.
pub fn ensure_mergeable(document: &Value, pointer: &str) -> Result<()> {
    let mut current = document;
    for token in tokens(pointer)? {
        if current.is_array() {
            return Err(invalid(
                pointer,
                &format!("'{token}' addresses an array element, which a merge patch cannot update"),
            ));
        }
        match child(current, &token) {
            Some(next) => current = next,
            None => break,
        }
    }
    Ok(())
}

/// Build a document whose only populated field sits at `pointer`
///
/// Every intermediate segment becomes an object, which is what a merge
/// patch needs to leave sibling fields untouched.
pub fn build_patch(pointer: &str, value: Value) -> Result<Value> {
    let tokens = tokens(pointer)?;
    if tokens.is_empty() {
        return Err(invalid(pointer, "refusing to replace the whole object"));
    }
    Ok(tokens.into_iter().rev().fold(value, |inner, token| {
        let mut map = Map::new();
        map.insert(token, inner);
        Value::Object(map)
    }))
}

/// Deep structural equality of two extracted values
pub fn values_equal(left: &Value, right: &Value) -> bool {
    left == right
}
