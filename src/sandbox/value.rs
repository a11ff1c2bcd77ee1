// src/sandbox/value.rs
//! Tagged representation of values crossing the sandbox boundary.
//!
//! Engine results and JSON fixtures are both normalized into [`Value`] before they are
//! compared, so equality and display never depend on the interpreter.

/// Deepest nesting the comparison and rendering functions descend into.
pub const MAX_DEPTH: usize = 256;

/// A JavaScript value reduced to the shapes the verifier cares about.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    Array(Vec<Value>),
    /// Own enumerable string-keyed properties, in insertion order.
    Object(Vec<(String, Value)>),
    /// Anything without a JSON form (functions, symbols, bigints, cyclic graphs),
    /// kept as its string conversion.
    Opaque(String),
}

impl From<&serde_json::Value> for Value {
    fn from(json: &serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(*b),
            serde_json::Value::Number(n) => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
            serde_json::Value::String(s) => Value::String(s.clone()),
            serde_json::Value::Array(items) => Value::Array(items.iter().map(Value::from).collect()),
            serde_json::Value::Object(map) => Value::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), Value::from(v)))
                    .collect(),
            ),
        }
    }
}

/// `Object.is` for numbers: NaN equals NaN, and +0 and -0 differ.
fn same_value(a: f64, b: f64) -> bool {
    if a.is_nan() && b.is_nan() {
        return true;
    }
    a.to_bits() == b.to_bits()
}

/// Structural equality: arrays compare positionally, mappings by key set regardless of order.
///
/// Opaque values never compare equal, since their identity is lost in conversion. Values
/// nested deeper than [`MAX_DEPTH`] are treated as unequal.
pub fn deep_equal(a: &Value, b: &Value) -> bool {
    equal_at(a, b, 0)
}

fn equal_at(a: &Value, b: &Value, depth: usize) -> bool {
    if depth > MAX_DEPTH {
        return false;
    }
    match (a, b) {
        (Value::Undefined, Value::Undefined) | (Value::Null, Value::Null) => true,
        (Value::Bool(x), Value::Bool(y)) => x == y,
        (Value::Number(x), Value::Number(y)) => same_value(*x, *y),
        (Value::String(x), Value::String(y)) => x == y,
        (Value::Array(xs), Value::Array(ys)) => {
            xs.len() == ys.len() && xs.iter().zip(ys).all(|(x, y)| equal_at(x, y, depth + 1))
        }
        (Value::Object(xs), Value::Object(ys)) => {
            xs.len() == ys.len()
                && xs.iter().all(|(key, x)| {
                    ys.iter()
                        .find(|(other, _)| other == key)
                        .is_some_and(|(_, y)| equal_at(x, y, depth + 1))
                })
        }
        _ => false,
    }
}

/// Formats a number the way JavaScript's `Number.prototype.toString` does.
pub fn format_number(n: f64) -> String {
    if n.is_nan() {
        return "NaN".to_string();
    }
    if n.is_infinite() {
        return if n > 0.0 { "Infinity" } else { "-Infinity" }.to_string();
    }
    if n == 0.0 {
        return "0".to_string();
    }

    let magnitude = n.abs();
    if (1e-6..1e21).contains(&magnitude) {
        return format!("{}", n);
    }

    let text = format!("{:e}", n);
    match text.split_once('e') {
        Some((mantissa, exponent)) if !exponent.starts_with('-') => {
            format!("{}e+{}", mantissa, exponent)
        }
        _ => text,
    }
}

impl Value {
    /// Diagnostic text: strings verbatim, JSON otherwise, and the plain string
    /// conversion when there is no JSON form.
    pub fn render(&self) -> String {
        match self {
            Value::String(s) => s.clone(),
            other => other.to_json().unwrap_or_else(|| other.to_plain_string()),
        }
    }

    /// `JSON.stringify` semantics. `None` where stringify would yield `undefined`.
    pub fn to_json(&self) -> Option<String> {
        let mut out = String::new();
        if self.write_json(&mut out, 0) {
            Some(out)
        } else {
            None
        }
    }

    fn write_json(&self, out: &mut String, depth: usize) -> bool {
        if depth > MAX_DEPTH {
            return false;
        }
        match self {
            Value::Undefined | Value::Opaque(_) => return false,
            Value::Null => out.push_str("null"),
            Value::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
            Value::Number(n) if n.is_finite() => out.push_str(&format_number(*n)),
            Value::Number(_) => out.push_str("null"),
            Value::String(s) => out.push_str(&quote(s)),
            Value::Array(items) => {
                out.push('[');
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        out.push(',');
                    }
                    if !item.write_json(out, depth + 1) {
                        out.push_str("null");
                    }
                }
                out.push(']');
            }
            Value::Object(entries) => {
                out.push('{');
                let mut first = true;
                for (key, item) in entries {
                    let mut member = String::new();
                    if !item.write_json(&mut member, depth + 1) {
                        continue;
                    }
                    if !first {
                        out.push(',');
                    }
                    first = false;
                    out.push_str(&quote(key));
                    out.push(':');
                    out.push_str(&member);
                }
                out.push('}');
            }
        }
        true
    }

    /// `String(value)` semantics.
    pub fn to_plain_string(&self) -> String {
        self.plain_at(0)
    }

    fn plain_at(&self, depth: usize) -> String {
        match self {
            Value::Undefined => "undefined".to_string(),
            Value::Null => "null".to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Number(n) => format_number(*n),
            Value::String(s) => s.clone(),
            Value::Array(_) if depth > MAX_DEPTH => String::new(),
            Value::Array(items) => items
                .iter()
                .map(|item| match item {
                    Value::Undefined | Value::Null => String::new(),
                    other => other.plain_at(depth + 1),
                })
                .collect::<Vec<_>>()
                .join(","),
            Value::Object(_) => "[object Object]".to_string(),
            Value::Opaque(text) => text.clone(),
        }
    }
}

fn quote(s: &str) -> String {
    // Serializing a str cannot fail.
    serde_json::to_string(s).unwrap_or_else(|_| format!("\"{}\"", s))
}
