//! Lua table-literal encoder.
//!
//! Writes the same layout the mission editor produces: one entry per line,
//! tab indentation, explicit `[key]` syntax, and `-- end of` markers after
//! nested tables. The output is not byte-identical to an editor-written file
//! but decodes back to an equal [`Value`].

use std::fmt::Write as _;

use super::{Key, Number, Table, Value};

/// Encode a value.
#[must_use]
pub fn encode(value: &Value) -> String {
    let mut out = String::new();
    write_value(&mut out, value, 0);
    out
}

/// Encode `name = <value>` as stored in a mission archive.
#[must_use]
pub fn encode_assignment(name: &str, value: &Value) -> String {
    let mut out = format!("{name} = \n");
    write_value(&mut out, value, 0);
    if value.as_table().is_some() {
        let _ = write!(out, " -- end of {name}");
    }
    out.push('\n');
    out
}

fn indent(out: &mut String, depth: usize) {
    for _ in 0..depth {
        out.push('\t');
    }
}

fn write_value(out: &mut String, value: &Value, depth: usize) {
    match value {
        Value::Nil => out.push_str("nil"),
        Value::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
        Value::Number(n) => write_number(out, *n),
        Value::String(s) => write_string(out, s),
        Value::Table(t) => write_table(out, t, depth),
    }
}

fn write_table(out: &mut String, table: &Table, depth: usize) {
    out.push_str("{\n");
    for (key, value) in table.iter() {
        indent(out, depth + 1);
        write_key(out, key);
        out.push_str(" = ");
        if let Value::Table(inner) = value {
            out.push('\n');
            indent(out, depth + 1);
            write_table(out, inner, depth + 1);
            out.push_str(", -- end of ");
            write_key(out, key);
        } else {
            write_value(out, value, depth + 1);
            out.push(',');
        }
        out.push('\n');
    }
    indent(out, depth);
    out.push('}');
}

fn write_key(out: &mut String, key: &Key) {
    out.push('[');
    match key {
        Key::Int(i) => {
            let _ = write!(out, "{i}");
        }
        Key::Str(s) => write_string(out, s),
    }
    out.push(']');
}

fn write_number(out: &mut String, n: Number) {
    match n {
        Number::Int(i) => {
            let _ = write!(out, "{i}");
        }
        Number::Float(f) if f.is_nan() => out.push_str("0/0"),
        Number::Float(f) if f.is_infinite() => {
            out.push_str(if f > 0.0 { "1/0" } else { "-1/0" });
        }
        // Debug keeps a fraction or exponent ("2.0", "1e300"), so the
        // value decodes back as a float.
        Number::Float(f) => {
            let _ = write!(out, "{f:?}");
        }
    }
}

fn write_string(out: &mut String, s: &str) {
    out.push('"');
    for ch in s.chars() {
        match ch {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c.is_ascii_control() => {
                let _ = write!(out, "\\{:03}", u32::from(c));
            }
            c => out.push(c),
        }
    }
    out.push('"');
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
