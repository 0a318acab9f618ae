//! Two-stage encoding of call data into JSON.
//!
//! Stage one is a strict `serde_json::to_value`. Stage two, taken when stage
//! one errors or panics, renders the value's `Debug` form and cannot fail.
//! `encode` therefore never panics, whatever the caller's `Serialize` impl does.

use serde::Serialize;
use serde_json::Value;
use std::any::Any;
use std::fmt::Debug;
use std::panic::{self, AssertUnwindSafe};
use tracing::warn;

/// Who handed us the value. Only caller-supplied data warns on fallback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    Caller,
    Internal,
}

pub fn encode<T>(value: &T, origin: Origin) -> Value
where
    T: Serialize + Debug + ?Sized,
{
    let strict = panic::catch_unwind(AssertUnwindSafe(|| serde_json::to_value(value)))
        .unwrap_or_else(|payload| Err(serialize_panicked(payload.as_ref())));

    match strict {
        Ok(encoded) => encoded,
        Err(e) => {
            if origin == Origin::Caller {
                warn!(
                    "Value of type {} is not JSON-encodable ({}); storing its debug form",
                    std::any::type_name::<T>(),
                    e
                );
            }
            Value::String(stringify(value))
        }
    }
}

fn serialize_panicked(payload: &(dyn Any + Send)) -> serde_json::Error {
    let message = payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "non-string panic payload".to_string());
    serde::ser::Error::custom(format!("Serialize impl panicked: {}", message))
}

/// Total fallback: never panics, never fails.
pub fn stringify<T: Debug + ?Sized>(value: &T) -> String {
    panic::catch_unwind(AssertUnwindSafe(|| format!("{:?}", value)))
        .unwrap_or_else(|_| format!("<unrepresentable {}>", std::any::type_name::<T>()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashMap;
    use std::fmt;

    #[derive(Debug, Serialize)]
    struct Plain {
        model: String,
        max_tokens: u32,
    }

    #[test]
    fn test_strict_stage_used_when_possible() {
        let value = Plain { model: "gpt-4".into(), max_tokens: 16 };
        assert_eq!(
            encode(&value, Origin::Internal),
            json!({"model": "gpt-4", "max_tokens": 16})
        );
    }

    #[test]
    fn test_non_string_map_keys_fall_back_to_debug() {
        // serde_json refuses maps keyed by tuples.
        let mut map = HashMap::new();
        map.insert((1, 2), "pair");
        let encoded = encode(&map, Origin::Caller);
        match encoded {
            Value::String(s) => assert!(s.contains("pair"), "Debug form expected, got {}", s),
            other => panic!("Expected fallback string, got {:?}", other),
        }
    }

    struct Exploding;

    impl fmt::Debug for Exploding {
        fn fmt(&self, _f: &mut fmt::Formatter<'_>) -> fmt::Result {
            panic!("debug exploded")
        }
    }

    #[derive(Debug)]
    struct Volatile;

    impl Serialize for Volatile {
        fn serialize<S: serde::Serializer>(&self, _serializer: S) -> Result<S::Ok, S::Error> {
            panic!("serializer exploded")
        }
    }

    #[test]
    fn test_panicking_serialize_falls_back_to_debug() {
        assert_eq!(encode(&Volatile, Origin::Internal), json!("Volatile"));
    }

    #[test]
    fn test_metadata_with_panicking_serialize_does_not_unwind() {
        let outcome = std::panic::catch_unwind(|| {
            crate::context::TaskContext::new("t").with_metadata("k", Volatile)
        });
        let ctx = outcome.expect("with_metadata must not panic");
        assert_eq!(ctx.metadata["k"], json!("Volatile"));
    }

    #[test]
    fn test_stringify_survives_panicking_debug() {
        let rendered = stringify(&Exploding);
        assert!(rendered.starts_with("<unrepresentable"));
    }
}
