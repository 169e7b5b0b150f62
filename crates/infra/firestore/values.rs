use std::collections::HashMap;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// A Firestore REST `Value`: an object with exactly one `*Value` key, which is
/// serde's externally tagged enum layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Value {
    NullValue(Option<()>),
    BooleanValue(bool),
    /// int64 travels as a decimal string.
    IntegerValue(String),
    DoubleValue(f64),
    TimestampValue(String),
    StringValue(String),
    BytesValue(String),
    ReferenceValue(String),
    GeoPointValue(serde_json::Value),
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
    pub fields: HashMap<String, Value>,
}

impl Value {
    pub fn string(value: impl Into<String>) -> Self {
        Value::StringValue(value.into())
    }

    /// Millisecond precision, UTC, `Z` suffix.
    pub fn timestamp(at: DateTime<Utc>) -> Self {
        Value::TimestampValue(at.to_rfc3339_opts(SecondsFormat::Millis, true))
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::StringValue(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_timestamp(&self) -> Option<DateTime<Utc>> {
        match self {
            Value::TimestampValue(raw) => DateTime::parse_from_rfc3339(raw)
                .ok()
                .map(|at| at.with_timezone(&Utc)),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    /// `projects/{p}/databases/{d}/documents/{collection}/{id}`
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(default)]
    pub fields: HashMap<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub create_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub update_time: Option<String>,
}

impl Document {
    pub fn id(&self) -> &str {
        self.name.rsplit('/').next().unwrap_or("")
    }

    pub fn string_field(&self, key: &str) -> Option<&str> {
        self.fields.get(key).and_then(Value::as_str)
    }

    pub fn timestamp_field(&self, key: &str) -> Option<DateTime<Utc>> {
        self.fields.get(key).and_then(Value::as_timestamp)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn values_use_single_key_wire_format() {
        assert_eq!(
            serde_json::to_value(Value::string("cus_1")).unwrap(),
            json!({ "stringValue": "cus_1" })
        );
        assert_eq!(
            serde_json::to_value(Value::NullValue(None)).unwrap(),
            json!({ "nullValue": null })
        );
    }

    #[test]
    fn timestamp_keeps_milliseconds() {
        let at = Utc.timestamp_millis_opt(1_767_225_600_123).unwrap();

        let value = Value::timestamp(at);

        assert_eq!(
            value,
            Value::TimestampValue("2026-01-01T00:00:00.123Z".to_string())
        );
        assert_eq!(value.as_timestamp(), Some(at));
    }

    #[test]
    fn document_reads_fields_and_id() {
        let document: Document = serde_json::from_value(json!({
            "name": "projects/demo/databases/(default)/documents/userProfiles/uid-42",
            "fields": {
                "stripeCustomerId": { "stringValue": "cus_42" },
                "subscriptionEndDate": { "timestampValue": "2026-03-01T10:00:00Z" },
                "displayName": { "stringValue": "Ada" },
                "tags": { "arrayValue": { "values": [{ "stringValue": "beta" }] } },
                "settings": { "mapValue": { "fields": { "darkMode": { "booleanValue": true } } } },
                "streak": { "integerValue": "12" },
                "avatar": { "nullValue": null }
            },
            "createTime": "2025-01-01T00:00:00.000000Z",
            "updateTime": "2025-02-01T00:00:00.000000Z"
        }))
        .unwrap();

        assert_eq!(document.id(), "uid-42");
        assert_eq!(document.string_field("stripeCustomerId"), Some("cus_42"));
        assert_eq!(
            document.timestamp_field("subscriptionEndDate"),
            Some(Utc.with_ymd_and_hms(2026, 3, 1, 10, 0, 0).unwrap())
        );
        assert_eq!(document.string_field("streak"), None);
        assert_eq!(
            document.update_time.as_deref(),
            Some("2025-02-01T00:00:00.000000Z")
        );
    }
}
