use serde_json::Value;
use std::fmt;

use crate::error::DispatchError;

/// The request strategy selected by the `intent` field.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Intent {
    #[default]
    Health,
    Security,
    Cost,
    /// Anything we do not recognise. Holds the raw value for logging.
    Unknown(String),
}

impl Intent {
    pub fn parse(name: &str) -> Self {
        match name {
            "health" => Intent::Health,
            "security" => Intent::Security,
            "cost" => Intent::Cost,
            other => Intent::Unknown(other.to_string()),
        }
    }

    /// Picks the intent out of a request body.
    ///
    /// An empty body means no fields at all, as a GET does. A falsy `intent`
    /// (missing, null, "", false, 0) falls back to health; non-object bodies
    /// have no `intent` field and fall back the same way. A literal `null`
    /// body cannot be read and is an error.
    pub fn from_body(body: &[u8]) -> Result<Self, DispatchError> {
        let value: Value = serde_json::from_slice(body)?;
        Self::from_value(&value)
    }

    pub fn from_value(body: &Value) -> Result<Self, DispatchError> {
        let field = match body {
            Value::Null => return Err(DispatchError::NullBody),
            Value::Object(map) => map.get("intent"),
            _ => None,
        };

        Ok(match field {
            None => Intent::Health,
            Some(value) if is_falsy(value) => Intent::Health,
            Some(Value::String(name)) => Intent::parse(name),
            Some(other) => Intent::Unknown(other.to_string()),
        })
    }

    pub fn name(&self) -> &str {
        match self {
            Intent::Health => "health",
            Intent::Security => "security",
            Intent::Cost => "cost",
            Intent::Unknown(raw) => raw,
        }
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

fn is_falsy(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::String(s) => s.is_empty(),
        Value::Number(n) => n.as_f64().map_or(false, |f| f == 0.0 || f.is_nan()),
        Value::Array(_) | Value::Object(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn exact_names_only() {
        assert_eq!(Intent::parse("health"), Intent::Health);
        assert_eq!(Intent::parse("security"), Intent::Security);
        assert_eq!(Intent::parse("cost"), Intent::Cost);
        assert_eq!(Intent::parse("Health"), Intent::Unknown("Health".into()));
    }

    #[test]
    fn missing_or_falsy_intent_defaults_to_health() {
        let bodies = [
            json!({}),
            json!({"intent": null}),
            json!({"intent": ""}),
            json!({"intent": false}),
            json!({"intent": 0}),
        ];
        for body in bodies {
            assert_eq!(Intent::from_value(&body).unwrap(), Intent::Health, "body: {}", body);
        }
    }

    #[test]
    fn non_object_body_defaults_to_health() {
        assert_eq!(Intent::from_value(&json!([1, 2])).unwrap(), Intent::Health);
        assert_eq!(Intent::from_value(&json!("cost")).unwrap(), Intent::Health);
    }

    #[test]
    fn non_string_intent_is_unknown() {
        let intent = Intent::from_value(&json!({"intent": 5})).unwrap();
        assert!(matches!(intent, Intent::Unknown(_)));
    }

    #[test]
    fn null_body_is_an_error() {
        assert!(matches!(Intent::from_body(b"null"), Err(DispatchError::NullBody)));
    }

    #[test]
    fn empty_body_is_malformed() {
        assert!(matches!(Intent::from_body(b""), Err(DispatchError::MalformedBody(_))));
    }

    #[test]
    fn other_fields_are_ignored() {
        let body = br#"{"intent": "cost", "tenant": "contoso", "verbose": true}"#;
        assert_eq!(Intent::from_body(body).unwrap(), Intent::Cost);
    }
}
