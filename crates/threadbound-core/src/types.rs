// SPDX-FileCopyrightText: 2026 Threadbound Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Common types shared by drivers, workers and query handles.

use std::fmt;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// A dynamically typed value bound to a statement or read from a record.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    #[default]
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
    /// One element per executed row. Only meaningful as a batch binding.
    List(Vec<Value>),
}

impl Value {
    /// Parse a command line literal: `null`, integers and reals map to their
    /// variants, anything else is text.
    pub fn parse_literal(raw: &str) -> Value {
        if raw.eq_ignore_ascii_case("null") {
            Value::Null
        } else if let Ok(i) = raw.parse::<i64>() {
            Value::Integer(i)
        } else if let Ok(f) = raw.parse::<f64>() {
            Value::Real(f)
        } else {
            Value::Text(raw.to_string())
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Integer(i) => write!(f, "{i}"),
            Value::Real(r) => write!(f, "{r}"),
            Value::Text(s) => write!(f, "{s}"),
            Value::Blob(b) => write!(f, "<{} bytes>", b.len()),
            Value::List(items) => write!(f, "[{} values]", items.len()),
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Integer(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Integer(v.into())
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Real(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Blob(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

/// Direction of a bound parameter.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum Direction {
    #[default]
    In,
    Out,
    InOut,
}

/// A positional parameter binding.
#[derive(Debug, Clone, PartialEq)]
pub struct Binding {
    pub value: Value,
    pub direction: Direction,
}

/// A named placeholder binding such as `:name`.
#[derive(Debug, Clone, PartialEq)]
pub struct NamedBinding {
    pub placeholder: String,
    pub value: Value,
    pub direction: Direction,
}

/// A statement ready for execution on a worker.
///
/// Commands are built by query handles and handed to the worker by value;
/// nothing mutates them afterwards.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Command {
    /// Submission sequence number of the issuing handle.
    pub sequence: u64,
    pub statement: String,
    pub positional: Vec<Binding>,
    pub named: Vec<NamedBinding>,
    /// Execute once per element of the `List` bindings.
    pub batch: bool,
}

impl Command {
    /// A command with no bindings, used for transaction control and tests.
    pub fn text(statement: impl Into<String>) -> Self {
        Self {
            statement: statement.into(),
            ..Self::default()
        }
    }

    pub fn has_bindings(&self) -> bool {
        !self.positional.is_empty() || !self.named.is_empty()
    }
}

/// A single named field of a record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Field {
    pub name: String,
    pub value: Value,
}

/// One row of a result set: an ordered mapping from field name to value.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct Record {
    fields: Vec<Field>,
}

impl Record {
    pub fn new(fields: Vec<Field>) -> Self {
        Self { fields }
    }

    /// Build a record from `(name, value)` pairs.
    pub fn from_pairs<I, N, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (N, V)>,
        N: Into<String>,
        V: Into<Value>,
    {
        Self {
            fields: pairs
                .into_iter()
                .map(|(name, value)| Field {
                    name: name.into(),
                    value: value.into(),
                })
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn value(&self, index: usize) -> Option<&Value> {
        self.fields.get(index).map(|f| &f.value)
    }

    pub fn value_by_name(&self, name: &str) -> Option<&Value> {
        self.fields.iter().find(|f| f.name == name).map(|f| &f.value)
    }

    pub fn field_name(&self, index: usize) -> Option<&str> {
        self.fields.get(index).map(|f| f.name.as_str())
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }
}

/// Fully materialized outcome of one successful execution.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RecordSet {
    pub records: Vec<Record>,
    /// Identifier generated by the statement (e.g. a rowid), if any.
    pub last_insert_id: Option<Value>,
    pub rows_affected: u64,
}

/// Parameters used by a driver to open a connection.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct ConnectParams {
    pub database_name: String,
    pub host_name: Option<String>,
    pub port: Option<u16>,
    pub user_name: Option<String>,
    pub password: Option<String>,
    /// Driver specific `key=value;key=value` options.
    pub options: Option<String>,
}

impl ConnectParams {
    pub fn database(name: impl Into<String>) -> Self {
        Self {
            database_name: name.into(),
            ..Self::default()
        }
    }

    /// Iterate over `key=value` pairs of the options string.
    pub fn option_pairs(&self) -> impl Iterator<Item = (&str, &str)> {
        self.options
            .as_deref()
            .unwrap_or_default()
            .split(';')
            .filter_map(|pair| {
                let (k, v) = pair.split_once('=')?;
                let k = k.trim();
                (!k.is_empty()).then_some((k, v.trim()))
            })
    }
}

impl fmt::Debug for ConnectParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectParams")
            .field("database_name", &self.database_name)
            .field("host_name", &self.host_name)
            .field("port", &self.port)
            .field("user_name", &self.user_name)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("options", &self.options)
            .finish()
    }
}
