//! Opaque keyset cursors

use std::cmp::Ordering;
use std::fmt;

use base64::{
    engine::general_purpose::{STANDARD as BASE64, STANDARD_NO_PAD, URL_SAFE, URL_SAFE_NO_PAD},
    Engine as _,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

const BIGINT_TAG: &str = "$bigint";

/// Primary key of a paginated entity
///
/// Numeric keys compare numerically across `Number` and `BigInt`; every
/// numeric key sorts before every string key.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(into = "Value", try_from = "Value")]
pub enum PrimaryKey {
    Number(i64),
    BigInt(i128),
    String(String),
}

impl PrimaryKey {
    /// Physical value used in query predicates.
    pub fn to_value(&self) -> Value {
        match self {
            Self::Number(n) => Value::from(*n),
            Self::BigInt(n) => i64::try_from(*n)
                .map(Value::from)
                .or_else(|_| u64::try_from(*n).map(Value::from))
                .unwrap_or_else(|_| Value::String(n.to_string())),
            Self::String(s) => Value::String(s.clone()),
        }
    }

    fn as_integer(&self) -> Option<i128> {
        match self {
            Self::Number(n) => Some(i128::from(*n)),
            Self::BigInt(n) => Some(*n),
            Self::String(_) => None,
        }
    }
}

impl Ord for PrimaryKey {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::String(a), Self::String(b)) => a.cmp(b),
            (Self::String(_), _) => Ordering::Greater,
            (_, Self::String(_)) => Ordering::Less,
            _ => self.as_integer().cmp(&other.as_integer()),
        }
    }
}

impl PartialOrd for PrimaryKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for PrimaryKey {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for PrimaryKey {}

impl fmt::Display for PrimaryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::BigInt(n) => write!(f, "{n}"),
            Self::String(s) => f.write_str(s),
        }
    }
}

impl From<i64> for PrimaryKey {
    fn from(value: i64) -> Self {
        Self::Number(value)
    }
}

impl From<i128> for PrimaryKey {
    fn from(value: i128) -> Self {
        Self::BigInt(value)
    }
}

impl From<String> for PrimaryKey {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<&str> for PrimaryKey {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<Uuid> for PrimaryKey {
    fn from(value: Uuid) -> Self {
        Self::String(value.to_string())
    }
}

// Cursor wire form. BigInt is tagged so it decodes back to BigInt.
impl From<PrimaryKey> for Value {
    fn from(key: PrimaryKey) -> Self {
        match key {
            PrimaryKey::Number(n) => Value::from(n),
            PrimaryKey::BigInt(n) => {
                let mut tagged = Map::new();
                tagged.insert(BIGINT_TAG.to_string(), Value::String(n.to_string()));
                Value::Object(tagged)
            }
            PrimaryKey::String(s) => Value::String(s),
        }
    }
}

impl TryFrom<Value> for PrimaryKey {
    type Error = String;

    fn try_from(value: Value) -> std::result::Result<Self, Self::Error> {
        match value {
            Value::String(s) => Ok(Self::String(s)),
            Value::Number(n) => n
                .as_i64()
                .map(Self::Number)
                .or_else(|| n.as_u64().map(|u| Self::BigInt(i128::from(u))))
                .ok_or_else(|| format!("non-integer primary key: {n}")),
            Value::Object(map) => match map.get(BIGINT_TAG) {
                Some(Value::String(digits)) if map.len() == 1 => digits
                    .parse::<i128>()
                    .map(Self::BigInt)
                    .map_err(|e| e.to_string()),
                _ => Err("unsupported primary key object".to_string()),
            },
            other => Err(format!("unsupported primary key: {other}")),
        }
    }
}

/// Decoded cursor contents
///
/// Both fields are optional: a cursor that fails to decode yields the
/// default payload, which constrains nothing. A null order value is kept
/// as `Some(Value::Null)` so the cursor still pins rows whose order field
/// is null; `None` means the cursor carries no order value at all.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CursorPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<PrimaryKey>,

    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "present_value"
    )]
    pub value: Option<Value>,
}

fn present_value<'de, D>(deserializer: D) -> std::result::Result<Option<Value>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}

impl CursorPayload {
    pub fn new(id: impl Into<PrimaryKey>, value: Option<Value>) -> Self {
        Self {
            id: Some(id.into()),
            value,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.id.is_none() && self.value.is_none()
    }
}

/// Cursor encoding/decoding
pub struct CursorCodec;

impl CursorCodec {
    /// Encode payload as base64 JSON
    pub fn encode(payload: &CursorPayload) -> String {
        // Serializing a map of JSON values cannot fail.
        let json = serde_json::to_vec(payload).unwrap_or_default();
        BASE64.encode(json)
    }

    /// Decode cursor leniently
    ///
    /// Accepts standard and URL-safe base64, padded or not. Anything that
    /// does not decode to a JSON cursor object becomes an empty payload.
    pub fn decode(cursor: &str) -> CursorPayload {
        let cursor = cursor.trim();
        [&BASE64, &URL_SAFE, &STANDARD_NO_PAD, &URL_SAFE_NO_PAD]
            .iter()
            .find_map(|engine| engine.decode(cursor).ok())
            .and_then(|bytes| serde_json::from_slice::<CursorPayload>(&bytes).ok())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    #[test]
    fn test_cursor_codec() {
        let payload = CursorPayload::new(42i64, Some(json!("2024-01-01T00:00:00Z")));
        let encoded = CursorCodec::encode(&payload);
        assert_eq!(CursorCodec::decode(&encoded), payload);
    }

    #[test]
    fn test_decode_garbage() {
        assert!(CursorCodec::decode("not-base64!!").is_empty());
        assert!(CursorCodec::decode(&BASE64.encode("hello world")).is_empty());
        assert!(CursorCodec::decode(&BASE64.encode("[1,2,3]")).is_empty());
        assert!(CursorCodec::decode("").is_empty());
    }

    #[test]
    fn test_decode_url_safe() {
        let json = br#"{"id":"a?b>c","value":"~~~"}"#;
        let encoded = URL_SAFE_NO_PAD.encode(json);
        let payload = CursorCodec::decode(&encoded);
        assert_eq!(payload.id, Some(PrimaryKey::from("a?b>c")));
        assert_eq!(payload.value, Some(json!("~~~")));
    }

    #[test]
    fn test_decode_partial_payload() {
        let encoded = BASE64.encode(r#"{"id":7}"#);
        let payload = CursorCodec::decode(&encoded);
        assert_eq!(payload.id, Some(PrimaryKey::Number(7)));
        assert_eq!(payload.value, None);
    }

    #[test]
    fn test_null_value_survives() {
        let payload = CursorPayload::new(2i64, Some(Value::Null));
        let encoded = CursorCodec::encode(&payload);
        assert_eq!(BASE64.decode(&encoded).unwrap(), br#"{"id":2,"value":null}"#);

        let decoded = CursorCodec::decode(&encoded);
        assert_eq!(decoded.value, Some(Value::Null));
        assert!(!decoded.is_empty());
    }

    #[test]
    fn test_bigint_round_trip() {
        let payload = CursorPayload::new(PrimaryKey::BigInt(170141183460469231731687303715884105727), None);
        let decoded = CursorCodec::decode(&CursorCodec::encode(&payload));
        assert!(matches!(decoded.id, Some(PrimaryKey::BigInt(_))));
        assert_eq!(decoded, payload);
    }

    #[test]
    fn test_uuid_key() {
        let id = Uuid::new_v4();
        let payload = CursorPayload::new(id, None);
        let decoded = CursorCodec::decode(&CursorCodec::encode(&payload));
        assert_eq!(decoded.id, Some(PrimaryKey::String(id.to_string())));
    }

    #[test]
    fn test_primary_key_order() {
        assert!(PrimaryKey::Number(2) < PrimaryKey::BigInt(3));
        assert_eq!(PrimaryKey::Number(3), PrimaryKey::BigInt(3));
        assert!(PrimaryKey::BigInt(i128::MAX) < PrimaryKey::from("0"));
    }

    fn arb_key() -> impl Strategy<Value = PrimaryKey> {
        prop_oneof![
            any::<i64>().prop_map(PrimaryKey::Number),
            any::<i128>().prop_map(PrimaryKey::BigInt),
            ".*".prop_map(PrimaryKey::String),
        ]
    }

    fn arb_value() -> impl Strategy<Value = Option<Value>> {
        prop_oneof![
            Just(None),
            Just(Some(Value::Null)),
            any::<i64>().prop_map(|n| Some(json!(n))),
            any::<bool>().prop_map(|b| Some(json!(b))),
            ".*".prop_map(|s| Some(json!(s))),
        ]
    }

    proptest! {
        #[test]
        fn test_round_trip(id in arb_key(), value in arb_value()) {
            let payload = CursorPayload { id: Some(id), value };
            let decoded = CursorCodec::decode(&CursorCodec::encode(&payload));
            prop_assert_eq!(&decoded, &payload);
            prop_assert_eq!(format!("{:?}", decoded.id), format!("{:?}", payload.id));
        }
    }
}
