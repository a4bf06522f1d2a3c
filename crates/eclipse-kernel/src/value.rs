//! Script value model
//!
//! The tagged value variant shared by the plugin runtime and every engine
//! adapter. Engine-native values are converted to and from [`Value`] inside
//! the adapter; nothing outside an adapter looks at engine internals.

use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Keyed record of values
pub type Table = BTreeMap<String, Value>;

static NIL: Value = Value::Nil;

// ============================================================================
// Procedure reference
// ============================================================================

/// Opaque reference to a procedure living inside one engine instance.
///
/// The handle is only meaningful to the adapter that produced it; other
/// adapters treat it as foreign and refuse to call it.
#[derive(Clone)]
pub struct ProcedureRef {
    name: String,
    handle: Arc<dyn Any + Send + Sync>,
}

impl ProcedureRef {
    pub fn new<T: Any + Send + Sync>(name: impl Into<String>, handle: T) -> Self {
        Self {
            name: name.into(),
            handle: Arc::new(handle),
        }
    }

    /// Engine-side name of the procedure (may be synthetic for closures)
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Borrow the engine handle if it is of type `T`
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.handle.downcast_ref::<T>()
    }
}

impl fmt::Debug for ProcedureRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ProcedureRef").field(&self.name).finish()
    }
}

impl PartialEq for ProcedureRef {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

// ============================================================================
// Value
// ============================================================================

/// Tagged script value
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Value {
    /// The nil sentinel
    #[default]
    Nil,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    /// Ordered sequence
    List(Vec<Value>),
    /// Keyed record
    Table(Table),
    /// Callable procedure
    Procedure(ProcedureRef),
}

impl Value {
    pub fn is_nil(&self) -> bool {
        matches!(self, Value::Nil)
    }

    /// Read a field of a table; anything missing (or a non-table receiver)
    /// reads as `Nil`.
    pub fn field(&self, key: &str) -> &Value {
        match self {
            Value::Table(table) => table.get(key).unwrap_or(&NIL),
            _ => &NIL,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            Value::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_table(&self) -> Option<&Table> {
        match self {
            Value::Table(table) => Some(table),
            _ => None,
        }
    }

    pub fn as_procedure(&self) -> Option<&ProcedureRef> {
        match self {
            Value::Procedure(procedure) => Some(procedure),
            _ => None,
        }
    }

    /// Short type name used in configuration diagnostics
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Nil => "nil",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::String(_) => "string",
            Value::List(_) => "list",
            Value::Table(_) => "table",
            Value::Procedure(_) => "procedure",
        }
    }

    /// Convert to JSON for display and machine-readable output.
    ///
    /// Procedures have no JSON form and render as `"<procedure NAME>"`.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Nil => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Int(i) => serde_json::json!(i),
            Value::Float(f) => serde_json::json!(f),
            Value::String(s) => serde_json::Value::String(s.clone()),
            Value::List(items) => serde_json::Value::Array(items.iter().map(Value::to_json).collect()),
            Value::Table(table) => {
                let mut obj = serde_json::Map::new();
                for (k, v) in table {
                    obj.insert(k.clone(), v.to_json());
                }
                serde_json::Value::Object(obj)
            }
            Value::Procedure(procedure) => {
                serde_json::Value::String(format!("<procedure {}>", procedure.name()))
            }
        }
    }

    /// Build a value from JSON
    pub fn from_json(value: &serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Value::Nil,
            serde_json::Value::Bool(b) => Value::Bool(*b),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Value::Int(i)
                } else if let Some(f) = n.as_f64() {
                    Value::Float(f)
                } else {
                    Value::Nil
                }
            }
            serde_json::Value::String(s) => Value::String(s.clone()),
            serde_json::Value::Array(arr) => Value::List(arr.iter().map(Value::from_json).collect()),
            serde_json::Value::Object(obj) => Value::Table(
                obj.iter()
                    .map(|(k, v)| (k.clone(), Value::from_json(v)))
                    .collect(),
            ),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Nil => write!(f, "nil"),
            Value::String(s) => write!(f, "{s}"),
            other => write!(f, "{}", other.to_json()),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::List(items)
    }
}

impl From<Table> for Value {
    fn from(table: Table) -> Self {
        Value::Table(table)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Value::Nil)
    }
}
