//! Conversion between Rhai `Dynamic` and the kernel [`Value`].

use eclipse_kernel::{ProcedureRef, Table, Value};
use rhai::{Array, Dynamic, FnPtr, Map};

/// Convert a Rhai value into a kernel value
pub fn dynamic_to_value(value: &Dynamic) -> Value {
    let value = value.flatten_clone();

    if value.is_unit() {
        Value::Nil
    } else if let Ok(b) = value.as_bool() {
        Value::Bool(b)
    } else if let Ok(i) = value.as_int() {
        Value::Int(i)
    } else if let Ok(f) = value.as_float() {
        Value::Float(f)
    } else if value.is_string() || value.is_char() {
        Value::String(value.to_string())
    } else if value.is_array() {
        let items = value.cast::<Array>();
        Value::List(items.iter().map(dynamic_to_value).collect())
    } else if value.is_map() {
        let map = value.cast::<Map>();
        let table: Table = map
            .iter()
            .map(|(k, v)| (k.to_string(), dynamic_to_value(v)))
            .collect();
        Value::Table(table)
    } else if value.is_fnptr() {
        let fn_ptr = value.cast::<FnPtr>();
        Value::Procedure(ProcedureRef::new(fn_ptr.fn_name().to_string(), fn_ptr))
    } else {
        Value::String(value.to_string())
    }
}

/// Convert a kernel value into a Rhai value.
///
/// Procedures produced by another engine kind have no Rhai form and become `()`.
pub fn value_to_dynamic(value: &Value) -> Dynamic {
    match value {
        Value::Nil => Dynamic::UNIT,
        Value::Bool(b) => Dynamic::from(*b),
        Value::Int(i) => Dynamic::from(*i),
        Value::Float(f) => Dynamic::from(*f),
        Value::String(s) => Dynamic::from(s.clone()),
        Value::List(items) => {
            let array: Array = items.iter().map(value_to_dynamic).collect();
            Dynamic::from_array(array)
        }
        Value::Table(table) => {
            let mut map = Map::new();
            for (k, v) in table {
                map.insert(k.as_str().into(), value_to_dynamic(v));
            }
            Dynamic::from_map(map)
        }
        Value::Procedure(procedure) => procedure
            .downcast_ref::<FnPtr>()
            .cloned()
            .map(Dynamic::from)
            .unwrap_or(Dynamic::UNIT),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalar_conversion() {
        assert_eq!(dynamic_to_value(&Dynamic::UNIT), Value::Nil);
        assert_eq!(dynamic_to_value(&Dynamic::from(true)), Value::Bool(true));
        assert_eq!(dynamic_to_value(&Dynamic::from(42_i64)), Value::Int(42));
        assert_eq!(dynamic_to_value(&Dynamic::from(1.5_f64)), Value::Float(1.5));
        assert_eq!(
            dynamic_to_value(&Dynamic::from("hi".to_string())),
            Value::from("hi")
        );
    }

    #[test]
    fn test_nested_conversion() {
        let mut table = Table::new();
        table.insert("Name".to_string(), Value::from("a"));
        table.insert(
            "Values".to_string(),
            Value::List(vec![Value::Int(1), Value::Nil, Value::Bool(false)]),
        );
        let value = Value::Table(table);

        let dynamic = value_to_dynamic(&value);
        assert!(dynamic.is_map());
        assert_eq!(dynamic_to_value(&dynamic), value);
    }

    #[test]
    fn test_fn_ptr_survives_conversion() {
        let fn_ptr = FnPtr::new("run").unwrap();
        let value = dynamic_to_value(&Dynamic::from(fn_ptr));

        let procedure = value.as_procedure().unwrap();
        assert_eq!(procedure.name(), "run");

        let back = value_to_dynamic(&value);
        assert!(back.is_fnptr());
    }

    #[test]
    fn test_foreign_procedure_becomes_unit() {
        let value = Value::Procedure(ProcedureRef::new("native", 1u8));
        assert!(value_to_dynamic(&value).is_unit());
    }
}
