//! Conversions between JSON documents and DynamoDB attribute values.

use std::collections::HashMap;

use aws_sdk_dynamodb::types::AttributeValue;
use serde_json::{Map, Number, Value};

use super::Document;

pub fn to_attribute(value: &Value) -> AttributeValue {
    match value {
        Value::Null => AttributeValue::Null(true),
        Value::Bool(b) => AttributeValue::Bool(*b),
        Value::Number(n) => AttributeValue::N(n.to_string()),
        Value::String(s) => AttributeValue::S(s.clone()),
        Value::Array(items) => AttributeValue::L(items.iter().map(to_attribute).collect()),
        Value::Object(map) => AttributeValue::M(
            map.iter()
                .map(|(k, v)| (k.clone(), to_attribute(v)))
                .collect(),
        ),
    }
}

pub fn from_attribute(attr: &AttributeValue) -> Value {
    match attr {
        AttributeValue::S(s) => Value::String(s.clone()),
        AttributeValue::N(n) => parse_number(n),
        AttributeValue::Bool(b) => Value::Bool(*b),
        AttributeValue::Null(_) => Value::Null,
        AttributeValue::L(items) => Value::Array(items.iter().map(from_attribute).collect()),
        AttributeValue::M(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), from_attribute(v)))
                .collect(),
        ),
        AttributeValue::Ss(items) => {
            Value::Array(items.iter().cloned().map(Value::String).collect())
        }
        AttributeValue::Ns(items) => Value::Array(items.iter().map(|n| parse_number(n)).collect()),
        _ => Value::Null,
    }
}

fn parse_number(n: &str) -> Value {
    if let Ok(i) = n.parse::<i64>() {
        return Value::Number(i.into());
    }
    if let Ok(u) = n.parse::<u64>() {
        return Value::Number(u.into());
    }
    n.parse::<f64>()
        .ok()
        .and_then(Number::from_f64)
        .map(Value::Number)
        .unwrap_or_else(|| Value::String(n.to_string()))
}

pub fn to_item(doc: &Document) -> HashMap<String, AttributeValue> {
    doc.iter()
        .map(|(k, v)| (k.clone(), to_attribute(v)))
        .collect()
}

pub fn from_item(item: &HashMap<String, AttributeValue>) -> Document {
    item.iter()
        .map(|(k, v)| (k.clone(), from_attribute(v)))
        .collect()
}

/// Strip DynamoDB type tags from stream images (`{"S": "x"}` becomes `"x"`).
/// Values that are not tagged pass through unchanged.
pub fn untag(value: &Value) -> Value {
    let Some(map) = value.as_object() else {
        return value.clone();
    };
    if map.len() != 1 {
        return Value::Object(untag_map(map));
    }
    let Some((tag, inner)) = map.iter().next() else {
        return value.clone();
    };
    match (tag.as_str(), inner) {
        ("S", Value::String(_)) => inner.clone(),
        ("N", Value::String(n)) => parse_number(n),
        ("BOOL", Value::Bool(_)) => inner.clone(),
        ("NULL", _) => Value::Null,
        ("L", Value::Array(items)) => Value::Array(items.iter().map(untag).collect()),
        ("M", Value::Object(fields)) => Value::Object(untag_map(fields)),
        ("SS", Value::Array(_)) => inner.clone(),
        ("NS", Value::Array(items)) => Value::Array(
            items
                .iter()
                .map(|n| n.as_str().map(parse_number).unwrap_or_else(|| n.clone()))
                .collect(),
        ),
        _ => Value::Object(untag_map(map)),
    }
}

pub fn untag_map(map: &Map<String, Value>) -> Document {
    map.iter().map(|(k, v)| (k.clone(), untag(v))).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn documents_survive_attribute_conversion() {
        let doc = json!({
            "title": "Intro",
            "price_cents": 4900,
            "rating": 4.5,
            "published": true,
            "completed_lessons": ["l1", "l2"],
            "meta": {"level": "beginner"},
            "thumbnail_url": null,
        });
        let doc = doc.as_object().cloned().unwrap();
        let item = to_item(&doc);
        assert!(matches!(item.get("price_cents"), Some(AttributeValue::N(n)) if n == "4900"));
        assert_eq!(from_item(&item), doc);
    }

    #[test]
    fn untag_strips_stream_image_tags() {
        let image = json!({
            "PK": {"S": "CHAT#a_b"},
            "count": {"N": "3"},
            "flag": {"BOOL": true},
            "participants": {"L": [{"S": "a"}, {"S": "b"}]},
            "gone": {"NULL": true},
        });
        let plain = untag(&image);
        assert_eq!(
            plain,
            json!({
                "PK": "CHAT#a_b",
                "count": 3,
                "flag": true,
                "participants": ["a", "b"],
                "gone": null,
            })
        );
    }

    #[test]
    fn untag_leaves_plain_values_alone() {
        let plain = json!({"PK": "USER#1", "name": "Ada"});
        assert_eq!(untag(&plain), plain);
    }
}
