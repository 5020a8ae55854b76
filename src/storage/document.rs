use crate::types::UserProfile;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub type Fields = BTreeMap<String, Value>;

// ============================================================================
// Firestore REST value model
// ============================================================================

/// A single typed Firestore value, as it appears in REST request and response bodies.
/// See: https://firebase.google.com/docs/firestore/reference/rest/v1/Value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Value {
    NullValue(()),
    BooleanValue(bool),
    #[serde(with = "integer_string")]
    IntegerValue(i64),
    DoubleValue(f64),
    TimestampValue(String),
    StringValue(String),
    BytesValue(String),
    ReferenceValue(String),
    GeoPointValue(LatLng),
    ArrayValue(ArrayValue),
    MapValue(MapValue),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ArrayValue {
    #[serde(default)]
    pub values: Vec<Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MapValue {
    #[serde(default)]
    pub fields: Fields,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LatLng {
    #[serde(default)]
    pub latitude: f64,
    #[serde(default)]
    pub longitude: f64,
}

// int64 travels as a decimal string on the wire.
mod integer_string {
    use serde::{Deserialize, Deserializer, Serializer, de};

    pub fn serialize<S: Serializer>(value: &i64, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(value)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Text(String),
            Number(i64),
        }

        match Repr::deserialize(deserializer)? {
            Repr::Text(s) => s.parse().map_err(de::Error::custom),
            Repr::Number(n) => Ok(n),
        }
    }
}

/// A Firestore document. Request bodies only carry `fields`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub fields: Fields,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub create_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub update_time: Option<DateTime<Utc>>,
}

impl Document {
    pub fn from_fields(fields: Fields) -> Self {
        Self {
            fields,
            ..Default::default()
        }
    }

    pub fn has_field(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }
}

// ============================================================================
// Profile <-> fields
// ============================================================================

pub fn profile_fields(profile: &UserProfile) -> Fields {
    Fields::from([
        (
            "userId".to_string(),
            Value::StringValue(profile.user_id.clone()),
        ),
        (
            "savedStrategies".to_string(),
            json_list_to_value(&profile.saved_strategies),
        ),
        (
            "generationHistory".to_string(),
            json_list_to_value(&profile.generation_history),
        ),
        ("balance".to_string(), Value::DoubleValue(profile.balance)),
        (
            "createdAt".to_string(),
            Value::IntegerValue(profile.created_at_ms),
        ),
        ("migrated".to_string(), Value::BooleanValue(profile.migrated)),
    ])
}

fn json_list_to_value(items: &[serde_json::Value]) -> Value {
    Value::ArrayValue(ArrayValue {
        values: items.iter().map(json_to_value).collect(),
    })
}

/// Convert a JSON value to a Firestore value.
pub fn json_to_value(json: &serde_json::Value) -> Value {
    match json {
        serde_json::Value::Null => Value::NullValue(()),
        serde_json::Value::Bool(b) => Value::BooleanValue(*b),
        serde_json::Value::Number(n) => match n.as_i64() {
            Some(i) => Value::IntegerValue(i),
            None => Value::DoubleValue(n.as_f64().unwrap_or(f64::NAN)),
        },
        serde_json::Value::String(s) => Value::StringValue(s.clone()),
        serde_json::Value::Array(arr) => Value::ArrayValue(ArrayValue {
            values: arr.iter().map(json_to_value).collect(),
        }),
        serde_json::Value::Object(map) => Value::MapValue(MapValue {
            fields: map
                .iter()
                .map(|(k, v)| (k.clone(), json_to_value(v)))
                .collect(),
        }),
    }
}

/// Convert a Firestore value back to plain JSON.
pub fn value_to_json(value: &Value) -> serde_json::Value {
    match value {
        Value::NullValue(()) => serde_json::Value::Null,
        Value::BooleanValue(b) => serde_json::Value::Bool(*b),
        Value::IntegerValue(n) => (*n).into(),
        Value::DoubleValue(d) => serde_json::Number::from_f64(*d)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null), // NaN and infinities have no JSON form
        Value::TimestampValue(s)
        | Value::StringValue(s)
        | Value::BytesValue(s)
        | Value::ReferenceValue(s) => serde_json::Value::String(s.clone()),
        Value::GeoPointValue(point) => serde_json::json!({
            "latitude": point.latitude,
            "longitude": point.longitude,
        }),
        Value::ArrayValue(arr) => {
            serde_json::Value::Array(arr.values.iter().map(value_to_json).collect())
        }
        Value::MapValue(map) => serde_json::Value::Object(
            map.fields
                .iter()
                .map(|(k, v)| (k.clone(), value_to_json(v)))
                .collect(),
        ),
    }
}

// ============================================================================
// Tests — wire format (no network required)
// ============================================================================
