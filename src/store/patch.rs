//! JSON-patch application (§4.1 Patch).

use serde_json::Value;

use crate::error::Error;

/// Apply one RFC-6902-shaped patch document (a single operation object, or
/// an array of them) to `target` in place. Unsupported paths or operations
/// fail with `invalid_input` rather than partially mutating `target`.
pub fn apply_patch(target: &mut Value, patch: &Value) -> Result<(), Error> {
    match patch {
        Value::Array(ops) => {
            let mut scratch = target.clone();
            for op in ops {
                apply_op(&mut scratch, op)?;
            }
            *target = scratch;
            Ok(())
        }
        Value::Object(_) => {
            let mut scratch = target.clone();
            apply_op(&mut scratch, patch)?;
            *target = scratch;
            Ok(())
        }
        _ => Err(Error::invalid_input("patch document must be an operation object or an array of operations")),
    }
}

fn apply_op(target: &mut Value, op: &Value) -> Result<(), Error> {
    let op_name = op
        .get("op")
        .and_then(Value::as_str)
        .ok_or_else(|| Error::invalid_input("patch operation missing \"op\""))?;
    let path = op
        .get("path")
        .and_then(Value::as_str)
        .ok_or_else(|| Error::invalid_input("patch operation missing \"path\""))?;

    match op_name {
        "add" | "replace" => {
            let value = op
                .get("value")
                .cloned()
                .ok_or_else(|| Error::invalid_input(format!("\"{op_name}\" operation missing \"value\"")))?;
            set_path(target, path, value)
        }
        "remove" => remove_path(target, path),
        "move" => {
            let from = op
                .get("from")
                .and_then(Value::as_str)
                .ok_or_else(|| Error::invalid_input("\"move\" operation missing \"from\""))?;
            let value = take_path(target, from)?;
            set_path(target, path, value)
        }
        "copy" => {
            let from = op
                .get("from")
                .and_then(Value::as_str)
                .ok_or_else(|| Error::invalid_input("\"copy\" operation missing \"from\""))?;
            let value = get_path(target, from)?.clone();
            set_path(target, path, value)
        }
        "test" => {
            let expected = op
                .get("value")
                .ok_or_else(|| Error::invalid_input("\"test\" operation missing \"value\""))?;
            let actual = get_path(target, path)?;
            if actual == expected {
                Ok(())
            } else {
                Err(Error::invalid_input(format!("\"test\" operation failed at path {path}")))
            }
        }
        other => Err(Error::invalid_input(format!("unsupported patch operation: {other}"))),
    }
}

fn split_path(path: &str) -> Result<Vec<String>, Error> {
    if path.is_empty() {
        return Ok(Vec::new());
    }
    if !path.starts_with('/') {
        return Err(Error::invalid_input(format!("patch path must start with \"/\": {path}")));
    }
    Ok(path[1..]
        .split('/')
        .map(|tok| tok.replace("~1", "/").replace("~0", "~"))
        .collect())
}

fn get_path<'a>(target: &'a Value, path: &str) -> Result<&'a Value, Error> {
    let tokens = split_path(path)?;
    let mut cur = target;
    for tok in &tokens {
        cur = match cur {
            Value::Object(map) => map.get(tok).ok_or_else(|| Error::invalid_input(format!("path not found: {path}")))?,
            Value::Array(arr) => {
                let idx: usize = tok.parse().map_err(|_| Error::invalid_input(format!("invalid array index in path: {path}")))?;
                arr.get(idx).ok_or_else(|| Error::invalid_input(format!("array index out of bounds: {path}")))?
            }
            _ => return Err(Error::invalid_input(format!("cannot traverse scalar at path: {path}"))),
        };
    }
    Ok(cur)
}

fn take_path(target: &mut Value, path: &str) -> Result<Value, Error> {
    let value = get_path(target, path)?.clone();
    remove_path(target, path)?;
    Ok(value)
}

fn remove_path(target: &mut Value, path: &str) -> Result<(), Error> {
    let tokens = split_path(path)?;
    let Some((last, parent_tokens)) = tokens.split_last() else {
        return Err(Error::invalid_input("cannot remove the document root"));
    };
    let parent = navigate_mut(target, parent_tokens, path)?;
    match parent {
        Value::Object(map) => {
            map.remove(last).ok_or_else(|| Error::invalid_input(format!("path not found: {path}")))?;
        }
        Value::Array(arr) => {
            let idx: usize = last.parse().map_err(|_| Error::invalid_input(format!("invalid array index in path: {path}")))?;
            if idx >= arr.len() {
                return Err(Error::invalid_input(format!("array index out of bounds: {path}")));
            }
            arr.remove(idx);
        }
        _ => return Err(Error::invalid_input(format!("cannot remove from scalar parent at path: {path}"))),
    }
    Ok(())
}

fn set_path(target: &mut Value, path: &str, value: Value) -> Result<(), Error> {
    let tokens = split_path(path)?;
    let Some((last, parent_tokens)) = tokens.split_last() else {
        *target = value;
        return Ok(());
    };
    let parent = navigate_mut(target, parent_tokens, path)?;
    match parent {
        Value::Object(map) => {
            map.insert(last.clone(), value);
        }
        Value::Array(arr) => {
            if last == "-" {
                arr.push(value);
            } else {
                let idx: usize = last.parse().map_err(|_| Error::invalid_input(format!("invalid array index in path: {path}")))?;
                if idx > arr.len() {
                    return Err(Error::invalid_input(format!("array index out of bounds: {path}")));
                }
                arr.insert(idx, value);
            }
        }
        _ => return Err(Error::invalid_input(format!("cannot write into scalar parent at path: {path}"))),
    }
    Ok(())
}

fn navigate_mut<'a>(target: &'a mut Value, tokens: &[String], path: &str) -> Result<&'a mut Value, Error> {
    let mut cur = target;
    for tok in tokens {
        cur = match cur {
            Value::Object(map) => map.get_mut(tok).ok_or_else(|| Error::invalid_input(format!("path not found: {path}")))?,
            Value::Array(arr) => {
                let idx: usize = tok.parse().map_err(|_| Error::invalid_input(format!("invalid array index in path: {path}")))?;
                arr.get_mut(idx).ok_or_else(|| Error::invalid_input(format!("array index out of bounds: {path}")))?
            }
            _ => return Err(Error::invalid_input(format!("cannot traverse scalar at path: {path}"))),
        };
    }
    Ok(cur)
}
