use crate::lexer::Span;
use indexmap::IndexMap;
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;

/// Handle into a [`Context`]'s node arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(u32);

/// Non-owning back-link from a node to its lexical container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Parent {
    /// Not set yet, or a top-level instance row.
    None,
    /// The node is a global; lookups continue in the globals map.
    Globals,
    Node(NodeId),
}

/// A fully rendered scalar, or the resolved target of a reference.
/// `Option<Rendered>` on the node distinguishes "rendered to null"
/// (`Some(Null)`) from "not rendered yet" (`None`).
#[derive(Debug, Clone, PartialEq)]
pub enum Rendered {
    Null,
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    Instance(NodeId),
}

/// Schema and render state shared by all four node kinds.
#[derive(Debug, Clone)]
pub struct Meta {
    /// Base type (`str`, `int`, …) or a user struct name.
    pub type_name: Option<String>,
    pub attr_name: Option<String>,
    pub nullable: bool,
    pub array: bool,
    pub parent: Parent,
    pub span: Span,
    pub rendered: Option<Rendered>,
    /// Template expansion finished (str primitives only).
    pub expanded: bool,
}

impl Meta {
    pub fn at(span: Span) -> Self {
        Meta {
            type_name: None,
            attr_name: None,
            nullable: false,
            array: false,
            parent: Parent::None,
            span,
            rendered: None,
            expanded: false,
        }
    }
}

#[derive(Debug, Clone)]
pub enum NodeKind {
    /// Raw textual content. Quoted strings keep their delimiters until
    /// base rendering; `literal` is set for `'`/`'''` delimited strings.
    Primitive { raw: String, literal: bool },
    Array(Vec<NodeId>),
    /// Ordered attr name → value pairs, in schema declaration order.
    Instance(Vec<(String, NodeId)>),
    /// `Type(args…)`, resolved to an instance during reference rendering.
    Reference { target: String, args: Vec<NodeId> },
}

#[derive(Debug, Clone)]
pub struct Node {
    pub meta: Meta,
    pub kind: NodeKind,
}

/// Declared type, nullability and array flag of one struct attribute.
#[derive(Debug, Clone)]
pub struct AttrSpec {
    pub type_name: String,
    pub nullable: bool,
    pub array: bool,
}

/// Per-type schema: ordered attributes, primary keys, current defaults,
/// declared instances and (after indexing) the primary-key lookup table.
#[derive(Debug, Clone)]
pub struct StructSchema {
    pub name: String,
    pub attrs: IndexMap<String, AttrSpec>,
    pub primary_keys: Vec<String>,
    pub defaults: IndexMap<String, NodeId>,
    pub instances: Vec<NodeId>,
    /// `\0`-joined rendered primary-key tuple → instance.
    pub instance_index: HashMap<String, NodeId>,
}

impl StructSchema {
    pub fn new(name: &str) -> Self {
        StructSchema {
            name: name.to_string(),
            attrs: IndexMap::new(),
            primary_keys: Vec::new(),
            defaults: IndexMap::new(),
            instances: Vec::new(),
            instance_index: HashMap::new(),
        }
    }
}

/// Per-parse container: the node arena, globals, struct registry and the
/// `#include` path cache. Created by the API entry points, populated by the
/// parser, rendered in place by the resolver.
#[derive(Debug, Default)]
pub struct Context {
    nodes: Vec<Node>,
    pub globals: IndexMap<String, NodeId>,
    pub structs: IndexMap<String, StructSchema>,
    pub path_cache: HashSet<PathBuf>,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn alloc(&mut self, node: Node) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(node);
        id
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0 as usize]
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.0 as usize]
    }

    /// Deep-copy a subtree into fresh nodes. Used when a struct default is
    /// materialized into an instance, so every instance renders its own
    /// copy (templates in defaults resolve per instance, and later default
    /// updates never leak backwards).
    pub fn clone_subtree(&mut self, id: NodeId) -> NodeId {
        let node = self.node(id).clone();
        let mut meta = node.meta;
        meta.parent = Parent::None;
        meta.rendered = None;
        meta.expanded = false;
        let kind = match node.kind {
            NodeKind::Primitive { raw, literal } => NodeKind::Primitive { raw, literal },
            NodeKind::Array(elems) => {
                NodeKind::Array(elems.iter().map(|&e| self.clone_subtree(e)).collect())
            }
            NodeKind::Instance(fields) => NodeKind::Instance(
                fields
                    .iter()
                    .map(|(name, id)| (name.clone(), self.clone_subtree(*id)))
                    .collect(),
            ),
            NodeKind::Reference { target, args } => NodeKind::Reference {
                target,
                args: args.iter().map(|&a| self.clone_subtree(a)).collect(),
            },
        };
        self.alloc(Node { meta, kind })
    }

    /// Immediate children of a node, in order.
    pub fn children(&self, id: NodeId) -> Vec<NodeId> {
        match &self.node(id).kind {
            NodeKind::Primitive { .. } => Vec::new(),
            NodeKind::Array(elems) => elems.clone(),
            NodeKind::Instance(fields) => fields.iter().map(|(_, id)| *id).collect(),
            NodeKind::Reference { args, .. } => args.clone(),
        }
    }
}

/// The base types every Tyco implementation understands.
pub const BASE_TYPES: &[&str] = &[
    "str", "int", "bool", "float", "decimal", "date", "time", "datetime",
];

pub fn is_base_type(name: &str) -> bool {
    BASE_TYPES.contains(&name)
}
