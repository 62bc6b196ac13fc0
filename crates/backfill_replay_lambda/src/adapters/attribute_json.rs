//! Conversion between SDK attribute values and DynamoDB JSON
//! (`{"S": "a"}`, `{"N": "1"}`, ...), the shape used by stream records and
//! by checkpoints on the wire.

use std::collections::HashMap;

use aws_sdk_dynamodb::primitives::Blob;
use aws_sdk_dynamodb::types::AttributeValue;
use aws_smithy_types::base64;
use backfill_replay_core::contract::Item;
use serde_json::{json, Value};

pub type AttributeMap = HashMap<String, AttributeValue>;

pub fn item_to_json(item: AttributeMap) -> Result<Item, String> {
    let mut json_item = Item::new();
    for (name, value) in item {
        let converted = attribute_to_json(value)
            .map_err(|error| format!("attribute '{name}': {error}"))?;
        json_item.insert(name, converted);
    }
    Ok(json_item)
}

pub fn attribute_to_json(value: AttributeValue) -> Result<Value, String> {
    let converted = match value {
        AttributeValue::S(text) => json!({ "S": text }),
        AttributeValue::N(number) => json!({ "N": number }),
        AttributeValue::B(blob) => json!({ "B": base64::encode(blob.as_ref()) }),
        AttributeValue::Bool(flag) => json!({ "BOOL": flag }),
        AttributeValue::Null(flag) => json!({ "NULL": flag }),
        AttributeValue::M(map) => json!({ "M": item_to_json(map)? }),
        AttributeValue::L(list) => {
            let values = list
                .into_iter()
                .map(attribute_to_json)
                .collect::<Result<Vec<_>, _>>()?;
            json!({ "L": values })
        }
        AttributeValue::Ss(values) => json!({ "SS": values }),
        AttributeValue::Ns(values) => json!({ "NS": values }),
        AttributeValue::Bs(blobs) => {
            let encoded: Vec<String> = blobs
                .iter()
                .map(|blob| base64::encode(blob.as_ref()))
                .collect();
            json!({ "BS": encoded })
        }
        other => return Err(format!("unsupported attribute value {other:?}")),
    };
    Ok(converted)
}

pub fn json_to_item(item: &Item) -> Result<AttributeMap, String> {
    item.iter()
        .map(|(name, value)| {
            json_to_attribute(value)
                .map(|converted| (name.clone(), converted))
                .map_err(|error| format!("attribute '{name}': {error}"))
        })
        .collect()
}

pub fn json_to_attribute(value: &Value) -> Result<AttributeValue, String> {
    let Some((tag, inner)) = value
        .as_object()
        .filter(|descriptor| descriptor.len() == 1)
        .and_then(|descriptor| descriptor.iter().next())
    else {
        return Err("expected a single-key attribute descriptor".to_string());
    };

    match tag.as_str() {
        "S" => Ok(AttributeValue::S(expect_str(inner, tag)?.to_string())),
        "N" => Ok(AttributeValue::N(expect_str(inner, tag)?.to_string())),
        "B" => decode_blob(expect_str(inner, tag)?).map(AttributeValue::B),
        "BOOL" => inner
            .as_bool()
            .map(AttributeValue::Bool)
            .ok_or_else(|| "BOOL must be a boolean".to_string()),
        "NULL" => inner
            .as_bool()
            .map(AttributeValue::Null)
            .ok_or_else(|| "NULL must be a boolean".to_string()),
        "M" => inner
            .as_object()
            .ok_or_else(|| "M must be an object".to_string())
            .and_then(json_to_item)
            .map(AttributeValue::M),
        "L" => expect_array(inner, tag)?
            .iter()
            .map(json_to_attribute)
            .collect::<Result<Vec<_>, _>>()
            .map(AttributeValue::L),
        "SS" => string_set(inner, tag).map(AttributeValue::Ss),
        "NS" => string_set(inner, tag).map(AttributeValue::Ns),
        "BS" => string_set(inner, tag)?
            .iter()
            .map(|encoded| decode_blob(encoded))
            .collect::<Result<Vec<_>, _>>()
            .map(AttributeValue::Bs),
        other => Err(format!("unknown attribute type '{other}'")),
    }
}

fn expect_str<'v>(value: &'v Value, tag: &str) -> Result<&'v str, String> {
    value
        .as_str()
        .ok_or_else(|| format!("{tag} must be a string"))
}

fn expect_array<'v>(value: &'v Value, tag: &str) -> Result<&'v Vec<Value>, String> {
    value
        .as_array()
        .ok_or_else(|| format!("{tag} must be an array"))
}

fn string_set(value: &Value, tag: &str) -> Result<Vec<String>, String> {
    expect_array(value, tag)?
        .iter()
        .map(|entry| expect_str(entry, tag).map(str::to_string))
        .collect()
}

fn decode_blob(encoded: &str) -> Result<Blob, String> {
    base64::decode(encoded)
        .map(Blob::new)
        .map_err(|error| format!("invalid base64 binary: {error}"))
}
