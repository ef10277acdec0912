//! JSON wire representation of positions, ranges, node values and
//! operations.
//!
//! The encoding is a plain `serde_json::Value` shape with camelCase keys and
//! a `type` discriminator on operations, so batches are directly readable in
//! logs and fixtures. Decoding validates shape and reports the offending
//! field.

use serde_json::{json, Map, Value};

use crate::error::JsonError;
use crate::node::{Attributes, NodeData};
use crate::operation::Operation;
use crate::position::{Position, Stickiness};
use crate::range::Range;

fn field<'a>(obj: &'a Map<String, Value>, name: &'static str) -> Result<&'a Value, JsonError> {
    obj.get(name).ok_or(JsonError::MissingField(name))
}

fn as_object<'a>(value: &'a Value, name: &'static str) -> Result<&'a Map<String, Value>, JsonError> {
    value.as_object().ok_or(JsonError::WrongType(name))
}

fn get_str<'a>(obj: &'a Map<String, Value>, name: &'static str) -> Result<&'a str, JsonError> {
    field(obj, name)?.as_str().ok_or(JsonError::WrongType(name))
}

fn get_u64(obj: &Map<String, Value>, name: &'static str) -> Result<u64, JsonError> {
    field(obj, name)?.as_u64().ok_or(JsonError::WrongType(name))
}

fn get_usize(obj: &Map<String, Value>, name: &'static str) -> Result<usize, JsonError> {
    Ok(get_u64(obj, name)? as usize)
}

fn get_bool(obj: &Map<String, Value>, name: &'static str) -> Result<bool, JsonError> {
    field(obj, name)?.as_bool().ok_or(JsonError::WrongType(name))
}

/// `null` and a missing key both decode to `None`.
fn optional<'a>(obj: &'a Map<String, Value>, name: &str) -> Option<&'a Value> {
    obj.get(name).filter(|v| !v.is_null())
}

fn attributes_from(obj: &Map<String, Value>) -> Result<Attributes, JsonError> {
    match optional(obj, "attributes") {
        None => Ok(Attributes::new()),
        Some(value) => Ok(as_object(value, "attributes")?.clone()),
    }
}

pub fn stickiness_to_json(stickiness: Stickiness) -> Value {
    Value::String(
        match stickiness {
            Stickiness::ToNone => "toNone",
            Stickiness::ToPrevious => "toPrevious",
            Stickiness::ToNext => "toNext",
        }
        .to_owned(),
    )
}

pub fn stickiness_from_json(value: &Value) -> Result<Stickiness, JsonError> {
    let tag = value.as_str().ok_or(JsonError::WrongType("stickiness"))?;
    match tag {
        "toNone" => Ok(Stickiness::ToNone),
        "toPrevious" => Ok(Stickiness::ToPrevious),
        "toNext" => Ok(Stickiness::ToNext),
        other => Err(JsonError::UnknownStickiness(other.to_owned())),
    }
}

pub fn position_to_json(position: &Position) -> Value {
    let mut obj = Map::new();
    obj.insert("root".to_owned(), Value::String(position.root().to_owned()));
    obj.insert(
        "path".to_owned(),
        Value::Array(position.path().iter().map(|&o| json!(o)).collect()),
    );
    if position.stickiness != Stickiness::ToNone {
        obj.insert(
            "stickiness".to_owned(),
            stickiness_to_json(position.stickiness),
        );
    }
    Value::Object(obj)
}

pub fn position_from_json(value: &Value) -> Result<Position, JsonError> {
    let obj = as_object(value, "position")?;
    let root = get_str(obj, "root")?;
    let path = field(obj, "path")?
        .as_array()
        .ok_or(JsonError::WrongType("path"))?
        .iter()
        .map(|step| step.as_u64().map(|o| o as usize))
        .collect::<Option<Vec<usize>>>()
        .ok_or(JsonError::WrongType("path"))?;
    if path.is_empty() {
        return Err(JsonError::WrongType("path"));
    }
    let stickiness = match obj.get("stickiness") {
        None => Stickiness::ToNone,
        Some(value) => stickiness_from_json(value)?,
    };
    Ok(Position::new(root, path).with_stickiness(stickiness))
}

pub fn range_to_json(range: &Range) -> Value {
    json!({
        "start": position_to_json(&range.start),
        "end": position_to_json(&range.end),
    })
}

pub fn range_from_json(value: &Value) -> Result<Range, JsonError> {
    let obj = as_object(value, "range")?;
    let start = position_from_json(field(obj, "start")?)?;
    let end = position_from_json(field(obj, "end")?)?;
    Ok(Range::new(start, end))
}

pub fn node_data_to_json(node: &NodeData) -> Value {
    let mut obj = Map::new();
    match node {
        NodeData::Element {
            name,
            attributes,
            children,
        } => {
            obj.insert("name".to_owned(), Value::String(name.clone()));
            if !attributes.is_empty() {
                obj.insert("attributes".to_owned(), Value::Object(attributes.clone()));
            }
            if !children.is_empty() {
                obj.insert(
                    "children".to_owned(),
                    Value::Array(children.iter().map(node_data_to_json).collect()),
                );
            }
        }
        NodeData::Text { data, attributes } => {
            obj.insert("data".to_owned(), Value::String(data.clone()));
            if !attributes.is_empty() {
                obj.insert("attributes".to_owned(), Value::Object(attributes.clone()));
            }
        }
    }
    Value::Object(obj)
}

pub fn node_data_from_json(value: &Value) -> Result<NodeData, JsonError> {
    let obj = as_object(value, "node")?;
    let attributes = attributes_from(obj)?;
    if let Some(data) = obj.get("data") {
        let data = data.as_str().ok_or(JsonError::WrongType("data"))?;
        return Ok(NodeData::text_with_attrs(data, attributes));
    }
    let name = get_str(obj, "name")?;
    let children = match optional(obj, "children") {
        None => Vec::new(),
        Some(value) => value
            .as_array()
            .ok_or(JsonError::WrongType("children"))?
            .iter()
            .map(node_data_from_json)
            .collect::<Result<Vec<_>, _>>()?,
    };
    Ok(NodeData::element_with_attrs(name, attributes, children))
}

fn value_or_null(value: &Option<Value>) -> Value {
    value.clone().unwrap_or(Value::Null)
}

fn optional_value(obj: &Map<String, Value>, name: &str) -> Option<Value> {
    optional(obj, name).cloned()
}

fn optional_range(obj: &Map<String, Value>, name: &str) -> Result<Option<Range>, JsonError> {
    optional(obj, name).map(range_from_json).transpose()
}

pub fn operation_to_json(op: &Operation) -> Value {
    match op {
        Operation::Insert {
            base_version,
            position,
            nodes,
        } => json!({
            "type": "insert",
            "baseVersion": base_version,
            "position": position_to_json(position),
            "nodes": nodes.iter().map(node_data_to_json).collect::<Vec<_>>(),
        }),
        Operation::Move {
            base_version,
            source,
            how_many,
            target,
        } => json!({
            "type": "move",
            "baseVersion": base_version,
            "sourcePosition": position_to_json(source),
            "howMany": how_many,
            "targetPosition": position_to_json(target),
        }),
        Operation::Rename {
            base_version,
            position,
            old_name,
            new_name,
        } => json!({
            "type": "rename",
            "baseVersion": base_version,
            "position": position_to_json(position),
            "oldName": old_name,
            "newName": new_name,
        }),
        Operation::Split {
            base_version,
            split_position,
            how_many,
            insertion_position,
            graveyard_element_position,
        } => json!({
            "type": "split",
            "baseVersion": base_version,
            "splitPosition": position_to_json(split_position),
            "howMany": how_many,
            "insertionPosition": position_to_json(insertion_position),
            "graveyardPosition": graveyard_element_position
                .as_ref()
                .map(position_to_json)
                .unwrap_or(Value::Null),
        }),
        Operation::Merge {
            base_version,
            source_position,
            how_many,
            target_position,
            graveyard_position,
        } => json!({
            "type": "merge",
            "baseVersion": base_version,
            "sourcePosition": position_to_json(source_position),
            "howMany": how_many,
            "targetPosition": position_to_json(target_position),
            "graveyardPosition": position_to_json(graveyard_position),
        }),
        Operation::Attribute {
            base_version,
            range,
            key,
            old_value,
            new_value,
        } => json!({
            "type": "attribute",
            "baseVersion": base_version,
            "range": range_to_json(range),
            "key": key,
            "oldValue": value_or_null(old_value),
            "newValue": value_or_null(new_value),
        }),
        Operation::Marker {
            base_version,
            name,
            old_range,
            new_range,
            affects_data,
        } => json!({
            "type": "marker",
            "baseVersion": base_version,
            "name": name,
            "oldRange": old_range.as_ref().map(range_to_json).unwrap_or(Value::Null),
            "newRange": new_range.as_ref().map(range_to_json).unwrap_or(Value::Null),
            "affectsData": affects_data,
        }),
        Operation::Root {
            base_version,
            root_name,
            attach,
        } => json!({
            "type": "root",
            "baseVersion": base_version,
            "rootName": root_name,
            "attach": attach,
        }),
        Operation::RootAttribute {
            base_version,
            root_name,
            key,
            old_value,
            new_value,
        } => json!({
            "type": "rootAttribute",
            "baseVersion": base_version,
            "rootName": root_name,
            "key": key,
            "oldValue": value_or_null(old_value),
            "newValue": value_or_null(new_value),
        }),
        Operation::Detach {
            base_version,
            source,
            how_many,
        } => json!({
            "type": "detach",
            "baseVersion": base_version,
            "sourcePosition": position_to_json(source),
            "howMany": how_many,
        }),
    }
}

pub fn operation_from_json(value: &Value) -> Result<Operation, JsonError> {
    let obj = as_object(value, "operation")?;
    let base_version = get_u64(obj, "baseVersion")?;
    match get_str(obj, "type")? {
        "insert" => Ok(Operation::Insert {
            base_version,
            position: position_from_json(field(obj, "position")?)?,
            nodes: field(obj, "nodes")?
                .as_array()
                .ok_or(JsonError::WrongType("nodes"))?
                .iter()
                .map(node_data_from_json)
                .collect::<Result<Vec<_>, _>>()?,
        }),
        "move" => Ok(Operation::Move {
            base_version,
            source: position_from_json(field(obj, "sourcePosition")?)?,
            how_many: get_usize(obj, "howMany")?,
            target: position_from_json(field(obj, "targetPosition")?)?,
        }),
        "rename" => Ok(Operation::Rename {
            base_version,
            position: position_from_json(field(obj, "position")?)?,
            old_name: get_str(obj, "oldName")?.to_owned(),
            new_name: get_str(obj, "newName")?.to_owned(),
        }),
        "split" => Ok(Operation::Split {
            base_version,
            split_position: position_from_json(field(obj, "splitPosition")?)?,
            how_many: get_usize(obj, "howMany")?,
            insertion_position: position_from_json(field(obj, "insertionPosition")?)?,
            graveyard_element_position: optional(obj, "graveyardPosition")
                .map(position_from_json)
                .transpose()?,
        }),
        "merge" => Ok(Operation::Merge {
            base_version,
            source_position: position_from_json(field(obj, "sourcePosition")?)?,
            how_many: get_usize(obj, "howMany")?,
            target_position: position_from_json(field(obj, "targetPosition")?)?,
            graveyard_position: position_from_json(field(obj, "graveyardPosition")?)?,
        }),
        "attribute" => Ok(Operation::Attribute {
            base_version,
            range: range_from_json(field(obj, "range")?)?,
            key: get_str(obj, "key")?.to_owned(),
            old_value: optional_value(obj, "oldValue"),
            new_value: optional_value(obj, "newValue"),
        }),
        "marker" => Ok(Operation::Marker {
            base_version,
            name: get_str(obj, "name")?.to_owned(),
            old_range: optional_range(obj, "oldRange")?,
            new_range: optional_range(obj, "newRange")?,
            affects_data: get_bool(obj, "affectsData")?,
        }),
        "root" => Ok(Operation::Root {
            base_version,
            root_name: get_str(obj, "rootName")?.to_owned(),
            attach: get_bool(obj, "attach")?,
        }),
        "rootAttribute" => Ok(Operation::RootAttribute {
            base_version,
            root_name: get_str(obj, "rootName")?.to_owned(),
            key: get_str(obj, "key")?.to_owned(),
            old_value: optional_value(obj, "oldValue"),
            new_value: optional_value(obj, "newValue"),
        }),
        "detach" => Ok(Operation::Detach {
            base_version,
            source: position_from_json(field(obj, "sourcePosition")?)?,
            how_many: get_usize(obj, "howMany")?,
        }),
        other => Err(JsonError::UnknownOperationType(other.to_owned())),
    }
}
