use crate::ast::{Context, NodeId, NodeKind, Rendered};
use indexmap::IndexMap;
use serde::Serialize;

/// The plain tree a successful parse produces: globals first, then one list
/// of instances per struct type with primary keys, all in declaration
/// order.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    String(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    Null,
    Array(Vec<Value>),
    Object(IndexMap<String, Value>),
}

impl Value {
    /// Serializes the configuration into a pretty-printed JSON string.
    ///
    /// # Errors
    /// Returns a `serde_json::Error` if serialization fails.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Serializes the configuration into a YAML string.
    ///
    /// # Errors
    /// Returns a `serde_yaml::Error` if serialization fails.
    pub fn to_yaml(&self) -> Result<String, serde_yaml::Error> {
        serde_yaml::to_string(self)
    }
}

pub(crate) fn to_value(ctx: &Context) -> Value {
    let mut map = IndexMap::new();
    for (name, &id) in &ctx.globals {
        map.insert(name.clone(), node_value(ctx, id));
    }
    for (type_name, schema) in &ctx.structs {
        // Types without primary keys only occur inline inside other
        // instances; they get no top-level entry.
        if schema.primary_keys.is_empty() {
            continue;
        }
        let rows = schema
            .instances
            .iter()
            .map(|&inst| node_value(ctx, inst))
            .collect();
        map.insert(type_name.clone(), Value::Array(rows));
    }
    Value::Object(map)
}

fn node_value(ctx: &Context, id: NodeId) -> Value {
    let node = ctx.node(id);
    match &node.kind {
        NodeKind::Primitive { .. } => match &node.meta.rendered {
            Some(Rendered::Str(s)) => Value::String(s.clone()),
            Some(Rendered::Int(i)) => Value::Int(*i),
            Some(Rendered::Float(f)) => Value::Float(*f),
            Some(Rendered::Bool(b)) => Value::Bool(*b),
            _ => Value::Null,
        },
        NodeKind::Array(elems) => {
            Value::Array(elems.iter().map(|&e| node_value(ctx, e)).collect())
        }
        NodeKind::Instance(fields) => {
            let mut map = IndexMap::new();
            for (attr, field) in fields {
                map.insert(attr.clone(), node_value(ctx, *field));
            }
            Value::Object(map)
        }
        // A rendered reference serializes as the instance it selected.
        NodeKind::Reference { .. } => match node.meta.rendered {
            Some(Rendered::Instance(target)) => node_value(ctx, target),
            _ => Value::Null,
        },
    }
}
