//! Path queries over loosely shaped JSON documents, used to read user
//! profiles off arbitrary OAuth providers.
//!
//! A path is a dot separated list of keys (`user.profile.name`), where each
//! key may carry array indexes (`data[0].name`, `matrix[1][2]`). Queries
//! never fail: anything missing yields an empty result.

use serde_json::Value;

#[derive(Debug, Clone)]
pub struct Query {
    root: Value,
}

impl Query {
    /// Parse `input` as JSON. Invalid JSON is reported, missing paths are not.
    pub fn parse(input: &str) -> Result<Self, serde_json::Error> {
        Ok(Self {
            root: serde_json::from_str(input)?,
        })
    }

    pub fn from_value(root: Value) -> Self {
        Self { root }
    }

    /// String at `path`. Comma separated alternatives are tried left to
    /// right and the first non-empty one wins. Numbers come back in their
    /// textual form, every other kind of value is empty.
    pub fn string(&self, path: &str) -> String {
        path.split(',')
            .map(|alternative| self.get(alternative.trim()).map(as_string).unwrap_or_default())
            .find(|value| !value.is_empty())
            .unwrap_or_default()
    }

    /// Integer at `path`, or 0.
    pub fn int32(&self, path: &str) -> i32 {
        match self.get(path.trim()) {
            Some(Value::Number(n)) => n
                .as_i64()
                .or_else(|| n.as_f64().map(|f| f as i64))
                .and_then(|v| i32::try_from(v).ok())
                .unwrap_or(0),
            _ => 0,
        }
    }

    /// Whether something, even null or an empty string, lives at `path`.
    pub fn contains(&self, path: &str) -> bool {
        self.get(path.trim()).is_some()
    }

    pub fn is_array(&self) -> bool {
        self.root.is_array()
    }

    pub fn array_length(&self) -> usize {
        self.root.as_array().map(Vec::len).unwrap_or(0)
    }

    fn get(&self, path: &str) -> Option<&Value> {
        if path.is_empty() {
            return None;
        }
        path.split('.').try_fold(&self.root, |current, segment| step(current, segment))
    }
}

fn step<'a>(current: &'a Value, segment: &str) -> Option<&'a Value> {
    let (key, mut rest) = match segment.find('[') {
        Some(open) => (&segment[..open], &segment[open..]),
        None => (segment, ""),
    };

    let mut value = if key.is_empty() {
        current
    } else {
        current.as_object()?.get(key)?
    };

    while let Some(stripped) = rest.strip_prefix('[') {
        let close = stripped.find(']')?;
        let index: usize = stripped[..close].trim().parse().ok()?;
        value = value.as_array()?.get(index)?;
        rest = &stripped[close + 1..];
    }

    if rest.is_empty() {
        Some(value)
    } else {
        None
    }
}

fn as_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        _ => String::new(),
    }
}
