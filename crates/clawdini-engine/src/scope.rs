//! Template rendering and run-scoped state
//!
//! Templates reference upstream nodes by label and run state by namespace:
//! `{{Writer}}` renders an upstream's text, `{{Writer.total}}` walks into
//! its parsed JSON, `{{state.cart.items}}` reads the keyed memory written by
//! state nodes. Exactly this syntax and nothing more — no filters, no
//! defaults. Unresolved references render as empty strings.

use regex::Regex;
use serde_json::{Map, Value};
use std::sync::{Mutex, OnceLock};

/// Walk a dotted path into a JSON value. An empty path returns the value
/// itself. Array indices are numeric segments.
pub fn walk_path<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    if path.is_empty() {
        return Some(value);
    }
    let mut current = value;
    for segment in path.split('.') {
        current = match current {
            Value::Object(map) => map.get(segment)?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

/// Render a leaf value into template output: strings render raw, scalars
/// and structures render as compact JSON, null and missing render empty.
fn render_value(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

/// Substitute every `{{name.path}}` reference against the scope root.
pub fn render(template: &str, scope: &Value) -> String {
    // Permissive inner pattern; resolution decides validity
    static TEMPLATE_RE: OnceLock<Regex> = OnceLock::new();
    let re = TEMPLATE_RE
        .get_or_init(|| Regex::new(r"\{\{\s*([^{}]+?)\s*\}\}").expect("template reference regex"));
    re.replace_all(template, |caps: &regex::Captures<'_>| {
        let reference = caps[1].trim();
        match reference.split_once('.') {
            Some((name, path)) => {
                let base = scope.get(name);
                render_value(base.and_then(|b| walk_path(b, path)))
            }
            None => render_value(scope.get(reference)),
        }
    })
    .into_owned()
}

/// Run-scoped keyed memory written by state nodes and read through the
/// `state` template namespace. Shared across a runner's executors; guarded
/// by a plain mutex since no await happens under the lock.
#[derive(Debug, Default)]
pub struct StateStore {
    namespaces: Mutex<Map<String, Value>>,
}

impl StateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, namespace: &str) -> Option<Value> {
        self.namespaces.lock().unwrap().get(namespace).cloned()
    }

    pub fn set(&self, namespace: &str, value: Value) {
        self.namespaces
            .lock()
            .unwrap()
            .insert(namespace.to_string(), value);
    }

    /// Deep-merge `value` into the namespace. Objects merge key-by-key with
    /// incoming values winning; anything else replaces.
    pub fn merge(&self, namespace: &str, value: Value) {
        let mut namespaces = self.namespaces.lock().unwrap();
        let merged = match (namespaces.get(namespace), value) {
            (Some(Value::Object(existing)), Value::Object(incoming)) => {
                let mut out = existing.clone();
                for (k, v) in incoming {
                    out.insert(k, v);
                }
                Value::Object(out)
            }
            (_, incoming) => incoming,
        };
        namespaces.insert(namespace.to_string(), merged);
    }

    /// Append `value` to the namespace, promoting a scalar slot to an array.
    pub fn append(&self, namespace: &str, value: Value) {
        let mut namespaces = self.namespaces.lock().unwrap();
        let appended = match namespaces.remove(namespace) {
            Some(Value::Array(mut items)) => {
                items.push(value);
                Value::Array(items)
            }
            Some(existing) => Value::Array(vec![existing, value]),
            None => Value::Array(vec![value]),
        };
        namespaces.insert(namespace.to_string(), appended);
    }

    /// All namespaces as one object — the `state` scope entry.
    pub fn snapshot(&self) -> Value {
        Value::Object(self.namespaces.lock().unwrap().clone())
    }
}
