// ABOUTME: bundled JSON encode/decode host functions, converting between RillValue and serde_json::Value

use crate::error::RillError;
use crate::value::RillValue;
use rill_macros::host_fn;
use std::collections::BTreeMap;

fn value_to_json(value: &RillValue) -> Result<serde_json::Value, RillError> {
    match value {
        RillValue::Null => Ok(serde_json::Value::Null),
        RillValue::Bool(b) => Ok(serde_json::Value::Bool(*b)),
        RillValue::Number(n) => serde_json::Number::from_f64(*n)
            .map(serde_json::Value::Number)
            .ok_or_else(|| RillError::type_error(format!("cannot encode {n} as JSON"), None)),
        RillValue::String(s) => Ok(serde_json::Value::String(s.to_string())),
        RillValue::List(items) => {
            let encoded: Result<Vec<_>, _> = items.iter().map(value_to_json).collect();
            Ok(serde_json::Value::Array(encoded?))
        }
        RillValue::Dict(map) => {
            let mut object = serde_json::Map::new();
            for (k, v) in map.iter() {
                object.insert(k.clone(), value_to_json(v)?);
            }
            Ok(serde_json::Value::Object(object))
        }
        other => Err(RillError::type_error(
            format!("cannot encode a {} as JSON", other.infer_type()),
            None,
        )),
    }
}

fn json_to_value(json: &serde_json::Value) -> RillValue {
    match json {
        serde_json::Value::Null => RillValue::Null,
        serde_json::Value::Bool(b) => RillValue::Bool(*b),
        serde_json::Value::Number(n) => RillValue::Number(n.as_f64().unwrap_or(f64::NAN)),
        serde_json::Value::String(s) => RillValue::string(s.clone()),
        serde_json::Value::Array(items) => RillValue::list(items.iter().map(json_to_value).collect()),
        serde_json::Value::Object(object) => {
            let map: BTreeMap<String, RillValue> =
                object.iter().map(|(k, v)| (k.clone(), json_to_value(v))).collect();
            RillValue::dict(map)
        }
    }
}

/// Encodes a value as a compact JSON string.
///
/// Closures, iterators, and vectors have no JSON representation and raise
/// a type error.
///
/// # Examples
///
/// ```rill
/// {name: "Alice", age: 30} -> json::encode
/// ```
///
/// # See also
///
/// json::decode, json::pretty
#[host_fn(name = "json::encode", category = "JSON", related("json::decode", "json::pretty"))]
fn json_encode(args: &[RillValue]) -> Result<RillValue, RillError> {
    match args {
        [value] => {
            let json = value_to_json(value)?;
            serde_json::to_string(&json)
                .map(RillValue::string)
                .map_err(|e| RillError::type_error(format!("json::encode failed: {e}"), None))
        }
        _ => Err(RillError::type_error("json::encode expects a single value", None)),
    }
}

/// Decodes a JSON string into a value.
///
/// # Examples
///
/// ```rill
/// "[1, 2, 3]" -> json::decode
/// ```
///
/// # See also
///
/// json::encode
#[host_fn(name = "json::decode", category = "JSON", related("json::encode"))]
fn json_decode(args: &[RillValue]) -> Result<RillValue, RillError> {
    match args {
        [RillValue::String(s)] => serde_json::from_str::<serde_json::Value>(s)
            .map(|json| json_to_value(&json))
            .map_err(|e| RillError::type_error(format!("json::decode failed: {e}"), None)),
        _ => Err(RillError::type_error("json::decode expects a JSON string", None)),
    }
}

/// Encodes a value as an indented, human-readable JSON string.
///
/// # Examples
///
/// ```rill
/// {name: "Alice"} -> json::pretty
/// ```
///
/// # See also
///
/// json::encode
#[host_fn(name = "json::pretty", category = "JSON", related("json::encode"))]
fn json_pretty(args: &[RillValue]) -> Result<RillValue, RillError> {
    match args {
        [value] => {
            let json = value_to_json(value)?;
            serde_json::to_string_pretty(&json)
                .map(RillValue::string)
                .map_err(|e| RillError::type_error(format!("json::pretty failed: {e}"), None))
        }
        _ => Err(RillError::type_error("json::pretty expects a single value", None)),
    }
}

pub(crate) fn register_all(ctx: &crate::scope::ScopeRef) {
    register_json_encode(ctx);
    register_json_decode(ctx);
    register_json_pretty(ctx);
}

pub(crate) fn register_all_help() {
    register_help_json_encode();
    register_help_json_decode();
    register_help_json_pretty();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_then_decode_a_dict_round_trips() {
        let mut map = BTreeMap::new();
        map.insert("name".to_string(), RillValue::string("Alice"));
        map.insert("age".to_string(), RillValue::Number(30.0));
        let dict = RillValue::dict(map);

        let encoded = json_encode(&[dict.clone()]).unwrap();
        let decoded = json_decode(&[encoded]).unwrap();
        assert_eq!(decoded, dict);
    }

    #[test]
    fn encode_a_list_of_numbers() {
        let list = RillValue::list(vec![RillValue::Number(1.0), RillValue::Number(2.0), RillValue::Number(3.0)]);
        assert_eq!(json_encode(&[list]).unwrap(), RillValue::string("[1.0,2.0,3.0]"));
    }

    #[test]
    fn decode_rejects_invalid_json() {
        assert!(json_decode(&[RillValue::string("{not json")]).is_err());
    }

    #[test]
    fn closures_cannot_be_encoded() {
        let closure = RillValue::callable(crate::value::Callable::Runtime(crate::value::RuntimeCallable {
            name: "noop".to_string(),
            arity: Some(0),
            property_style: false,
            func: std::rc::Rc::new(|_| Ok(RillValue::Null)),
        }));
        assert!(json_encode(&[closure]).is_err());
    }

    #[test]
    fn pretty_output_is_indented() {
        let mut map = BTreeMap::new();
        map.insert("x".to_string(), RillValue::Number(1.0));
        let pretty = json_pretty(&[RillValue::dict(map)]).unwrap();
        match pretty {
            RillValue::String(s) => assert!(s.contains('\n')),
            _ => panic!("expected string"),
        }
    }
}
