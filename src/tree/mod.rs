//! Generic nested-table value model.
//!
//! Mission files are Lua table literals. Every other part of the crate works
//! on the decoded form defined here: a recursive [`Value`] whose tables are
//! ordered `(Key, Value)` lists.
//!
//! # Integer keys
//!
//! Lua tables used as lists (`[1] = ..., [2] = ...`) are NOT turned into
//! arrays. Integer keys may have gaps, and their insertion order is kept as
//! found in the source text. Appending uses [`Table::next_index`], which is
//! `max(integer keys) + 1`.
//!
//! # Accessors
//!
//! All lookups return `Option`. Callers match on the shape they expect:
//!
//! ```
//! use mizmerge::tree::{Table, Value};
//!
//! let mut group = Table::new();
//! group.insert("groupId", 801);
//! assert_eq!(group.field("groupId").and_then(Value::as_int), Some(801));
//! assert!(group.field("units").and_then(Value::as_table).is_none());
//! ```

mod decode;
mod encode;

use std::fmt;

pub use decode::{DecodeError, DecodeErrorKind, decode, decode_assignment};
pub use encode::{encode, encode_assignment};

// ---------------------------------------------------------------------------
// Key
// ---------------------------------------------------------------------------

/// A table key: either an integer or a string.
///
/// Integer and string keys never compare equal, so `[1]` and `["1"]` are two
/// distinct entries.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Key {
    /// `[42] = ...` or an implicit positional entry.
    Int(i64),
    /// `["name"] = ...` or `name = ...`.
    Str(String),
}

impl Key {
    /// The integer value, if this is an integer key.
    #[must_use]
    pub const fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            Self::Str(_) => None,
        }
    }

    /// The string value, if this is a string key.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Int(_) => None,
            Self::Str(s) => Some(s.as_str()),
        }
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(i) => write!(f, "[{i}]"),
            Self::Str(s) => write!(f, "[{s:?}]"),
        }
    }
}

impl From<i64> for Key {
    fn from(i: i64) -> Self {
        Self::Int(i)
    }
}

impl From<i32> for Key {
    fn from(i: i32) -> Self {
        Self::Int(i64::from(i))
    }
}

impl From<&str> for Key {
    fn from(s: &str) -> Self {
        Self::Str(s.to_owned())
    }
}

impl From<String> for Key {
    fn from(s: String) -> Self {
        Self::Str(s)
    }
}

// ---------------------------------------------------------------------------
// Number
// ---------------------------------------------------------------------------

/// A numeric value.
///
/// Lua itself only has doubles, but identifiers must survive a decode/encode
/// round trip as integers, so the two spellings are kept apart.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Number {
    /// Written without a fraction or exponent, and fits in an `i64`.
    Int(i64),
    /// Everything else.
    Float(f64),
}

impl Number {
    /// The integer value. Floats with no fractional part are accepted.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn as_int(self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(i),
            Self::Float(f) if f.fract() == 0.0 && f.abs() < 9.0e15 => Some(f as i64),
            Self::Float(_) => None,
        }
    }

    /// The value as a double.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn as_f64(self) -> f64 {
        match self {
            Self::Int(i) => i as f64,
            Self::Float(f) => f,
        }
    }
}

impl fmt::Display for Number {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(x) => write!(f, "{x:?}"),
        }
    }
}

// ---------------------------------------------------------------------------
// Value
// ---------------------------------------------------------------------------

/// A decoded Lua value.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    /// `nil`.
    Nil,
    /// `true` / `false`.
    Bool(bool),
    /// Any number literal.
    Number(Number),
    /// A string literal.
    String(String),
    /// A table constructor.
    Table(Table),
}

impl Value {
    /// Borrow the table, if this value is one.
    #[must_use]
    pub const fn as_table(&self) -> Option<&Table> {
        match self {
            Self::Table(t) => Some(t),
            _ => None,
        }
    }

    /// Mutably borrow the table, if this value is one.
    pub fn as_table_mut(&mut self) -> Option<&mut Table> {
        match self {
            Self::Table(t) => Some(t),
            _ => None,
        }
    }

    /// Integer view of a number value.
    #[must_use]
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Number(n) => n.as_int(),
            _ => None,
        }
    }

    /// Borrow the string, if this value is one.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s.as_str()),
            _ => None,
        }
    }

    /// `true` for [`Value::Nil`].
    #[must_use]
    pub const fn is_nil(&self) -> bool {
        matches!(self, Self::Nil)
    }

    /// Shorthand for `self.as_table()?.field(name)`.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&Self> {
        self.as_table()?.field(name)
    }

    /// Shorthand for `self.as_table()?.index(i)`.
    #[must_use]
    pub fn index(&self, i: i64) -> Option<&Self> {
        self.as_table()?.index(i)
    }

    /// A short type name for diagnostics.
    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::Nil => "nil",
            Self::Bool(_) => "boolean",
            Self::Number(_) => "number",
            Self::String(_) => "string",
            Self::Table(_) => "table",
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Self::Number(Number::Int(i))
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Self::Number(Number::Int(i64::from(i)))
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Self::Number(Number::Float(f))
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::String(s.to_owned())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<Table> for Value {
    fn from(t: Table) -> Self {
        Self::Table(t)
    }
}

// ---------------------------------------------------------------------------
// Table
// ---------------------------------------------------------------------------

/// An ordered table with unique keys.
///
/// Entries keep the order in which they were inserted. Inserting an existing
/// key replaces the value at its current position.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Table {
    entries: Vec<(Key, Value)>,
}

impl Table {
    /// An empty table.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// `true` when the table has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn position(&self, key: &Key) -> Option<usize> {
        self.entries.iter().position(|(k, _)| k == key)
    }

    /// Look up any key.
    #[must_use]
    pub fn get(&self, key: &Key) -> Option<&Value> {
        self.entries
            .iter()
            .find_map(|(k, v)| (k == key).then_some(v))
    }

    /// Mutable lookup of any key.
    pub fn get_mut(&mut self, key: &Key) -> Option<&mut Value> {
        self.entries
            .iter_mut()
            .find_map(|(k, v)| (k == key).then_some(v))
    }

    /// Look up a string key.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.entries
            .iter()
            .find_map(|(k, v)| (k.as_str() == Some(name)).then_some(v))
    }

    /// Mutable lookup of a string key.
    pub fn field_mut(&mut self, name: &str) -> Option<&mut Value> {
        self.entries
            .iter_mut()
            .find_map(|(k, v)| (k.as_str() == Some(name)).then_some(v))
    }

    /// Look up an integer key.
    #[must_use]
    pub fn index(&self, i: i64) -> Option<&Value> {
        self.entries
            .iter()
            .find_map(|(k, v)| (k.as_int() == Some(i)).then_some(v))
    }

    /// Mutable lookup of an integer key.
    pub fn index_mut(&mut self, i: i64) -> Option<&mut Value> {
        self.entries
            .iter_mut()
            .find_map(|(k, v)| (k.as_int() == Some(i)).then_some(v))
    }

    /// `true` if the key is present.
    #[must_use]
    pub fn contains_key(&self, key: &Key) -> bool {
        self.position(key).is_some()
    }

    /// Insert or replace. Returns the previous value for the key.
    pub fn insert(&mut self, key: impl Into<Key>, value: impl Into<Value>) -> Option<Value> {
        let key = key.into();
        let value = value.into();
        match self.position(&key) {
            Some(pos) => Some(std::mem::replace(&mut self.entries[pos].1, value)),
            None => {
                self.entries.push((key, value));
                None
            }
        }
    }

    /// Remove an entry, keeping the order of the rest.
    pub fn remove(&mut self, key: &Key) -> Option<Value> {
        let pos = self.position(key)?;
        Some(self.entries.remove(pos).1)
    }

    /// The key an append would use: `max(integer keys) + 1`, or 1.
    /// `None` when the largest key is already `i64::MAX`.
    #[must_use]
    pub fn next_index(&self) -> Option<i64> {
        self.entries
            .iter()
            .filter_map(|(k, _)| k.as_int())
            .max()
            .map_or(Some(1), |max| max.max(0).checked_add(1))
    }

    /// Append at [`Table::next_index`] and return the key used, or `None`
    /// (leaving the table as it was) when no key is left.
    pub fn push(&mut self, value: impl Into<Value>) -> Option<i64> {
        let idx = self.next_index()?;
        self.entries.push((Key::Int(idx), value.into()));
        Some(idx)
    }

    /// Iterate entries in order.
    pub fn iter(&self) -> impl Iterator<Item = (&Key, &Value)> {
        self.entries.iter().map(|(k, v)| (k, v))
    }

    /// Iterate entries in order, with mutable values.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&Key, &mut Value)> {
        self.entries.iter_mut().map(|(k, v)| (&*k, v))
    }

    /// Iterate the values that are themselves tables.
    pub fn tables(&self) -> impl Iterator<Item = (&Key, &Table)> {
        self.iter().filter_map(|(k, v)| v.as_table().map(|t| (k, t)))
    }

    /// Key of the first sub-table whose `field` equals `value`.
    #[must_use]
    pub fn find_by_field(&self, field: &str, value: &str) -> Option<&Key> {
        self.tables()
            .find(|(_, t)| t.field(field).and_then(Value::as_str) == Some(value))
            .map(|(k, _)| k)
    }
}

impl<K: Into<Key>, V: Into<Value>> FromIterator<(K, V)> for Table {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut table = Self::new();
        for (k, v) in iter {
            table.insert(k, v);
        }
        table
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
