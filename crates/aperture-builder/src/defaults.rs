use std::collections::HashMap;

use aperture_core::{DataType, Parameter};
use serde_json::Value;

/// Caller-supplied values for one `build` call, keyed by [`Parameter::name`].
pub type ParamValues = HashMap<String, Value>;

/// Type-appropriate placeholder used when no caller value, example, or
/// default is available (§4.6 "default value resolution").
pub fn placeholder_for(data_type: DataType) -> Value {
    match data_type {
        DataType::String | DataType::File => Value::String(String::new()),
        DataType::Integer => Value::Number(0.into()),
        DataType::Number => serde_json::Number::from_f64(0.0).map(Value::Number).unwrap_or(Value::Null),
        DataType::Boolean => Value::Bool(false),
        DataType::Array => Value::Array(Vec::new()),
        DataType::Object => Value::Object(serde_json::Map::new()),
    }
}

/// Resolves a parameter's effective value: caller-provided (explicit
/// `null` does not count as provided) → example → default → `None`.
/// Callers needing a value unconditionally (required parameters) fall
/// back to [`placeholder_for`] themselves.
pub fn resolved_value(param: &Parameter, values: &ParamValues) -> Option<Value> {
    if let Some(v) = values.get(&param.name) {
        if !v.is_null() {
            return Some(v.clone());
        }
    }
    if let Some(v) = &param.example_value {
        if !v.is_null() {
            return Some(v.clone());
        }
    }
    if let Some(v) = &param.default_value {
        if !v.is_null() {
            return Some(v.clone());
        }
    }
    None
}

/// As [`resolved_value`], but required parameters with no resolved value
/// fall back to a type-appropriate placeholder instead of `None` (§4.6).
pub fn effective_value(param: &Parameter, values: &ParamValues) -> Option<Value> {
    match resolved_value(param, values) {
        Some(v) => Some(v),
        None if param.required => Some(placeholder_for(param.data_type)),
        None => None,
    }
}

/// Stringifies a resolved value for header/query/cookie/path serialization.
pub fn scalar_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn param(name: &str, required: bool, data_type: DataType) -> Parameter {
        Parameter {
            name: name.to_string(),
            required,
            data_type,
            ..Default::default()
        }
    }

    #[test]
    fn caller_value_wins_over_example_and_default() {
        let mut p = param("x", false, DataType::String);
        p.example_value = Some(Value::String("example".into()));
        p.default_value = Some(Value::String("default".into()));
        let mut values = ParamValues::new();
        values.insert("x".into(), Value::String("caller".into()));
        assert_eq!(resolved_value(&p, &values), Some(Value::String("caller".into())));
    }

    #[test]
    fn explicit_null_caller_value_falls_through_to_example() {
        let mut p = param("x", false, DataType::String);
        p.example_value = Some(Value::String("example".into()));
        let mut values = ParamValues::new();
        values.insert("x".into(), Value::Null);
        assert_eq!(resolved_value(&p, &values), Some(Value::String("example".into())));
    }

    #[test]
    fn optional_unresolved_param_stays_none() {
        let p = param("x", false, DataType::String);
        assert_eq!(effective_value(&p, &ParamValues::new()), None);
    }

    #[test]
    fn required_unresolved_param_gets_placeholder() {
        let p = param("x", true, DataType::Integer);
        assert_eq!(effective_value(&p, &ParamValues::new()), Some(Value::Number(0.into())));
    }
}
