use serde_json::{Map, Value};

/// Data object flowing between nodes: trigger payloads, node inputs and outputs.
pub type Payload = Map<String, Value>;

/// Resolve a dot-separated path (`contact.address.city`) inside `data`.
///
/// Numeric segments index into arrays. Returns `None` as soon as a segment
/// does not resolve.
pub fn lookup_path<'a>(data: &'a Payload, path: &str) -> Option<&'a Value> {
    let mut segments = path.split('.');
    let mut current = data.get(segments.next()?)?;

    for segment in segments {
        current = match current {
            Value::Object(map) => map.get(segment)?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }

    Some(current)
}

/// Render a value the way it appears when substituted into a string.
///
/// Strings are inserted without quotes, everything else as compact JSON.
pub fn render(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Merge `output` over `input`, keys in `output` winning.
pub fn merge(input: &Payload, output: Payload) -> Payload {
    let mut merged = input.clone();
    merged.extend(output);
    merged
}

/// Coerce an arbitrary JSON value into a payload object.
///
/// Non-object values are wrapped under a `value` key.
pub fn into_payload(value: Value) -> Payload {
    match value {
        Value::Object(map) => map,
        Value::Null => Payload::new(),
        other => {
            let mut map = Payload::new();
            map.insert("value".to_string(), other);
            map
        }
    }
}
