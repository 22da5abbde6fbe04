//! Render pipeline for a parsed [`Context`].
//!
//! Parsing leaves every value node unrendered. Rendering happens in a fixed
//! phase order, and the order is observable: templates may read attributes
//! through references, references resolve by primary key, and primary keys
//! compare typed values. So:
//!
//! 1. `set_parents` — wire up the containment chain templates walk.
//! 2. `render_base` — convert primitive content to typed values.
//! 3. `load_primary_keys` — index instances by rendered key tuple.
//! 4. `render_references` — bind `Type(args)` to declared instances.
//! 5. `render_templates` — expand `{path}` in non-literal strings and
//!    apply escape sequences.

use crate::ast::{AttrSpec, Context, NodeId, NodeKind, Parent, Rendered};
use crate::error::TycoError;
use crate::lexer::Span;
use std::collections::{HashMap, HashSet, VecDeque};

pub struct Resolver<'a> {
    ctx: &'a mut Context,
}

impl<'a> Resolver<'a> {
    pub fn new(ctx: &'a mut Context) -> Self {
        Resolver { ctx }
    }

    /// Run the whole pipeline in order.
    pub fn render(&mut self) -> Result<(), TycoError> {
        self.set_parents();
        for id in self.roots() {
            self.render_base(id)?;
        }
        self.load_primary_keys()?;
        self.render_references()?;
        self.render_templates()?;
        Ok(())
    }

    /// Globals in declaration order, then every struct's instance rows.
    /// Default prototypes held by schemas are reachable only through the
    /// copies instances took, so they are never rendered.
    fn roots(&self) -> Vec<NodeId> {
        let mut roots: Vec<NodeId> = self.ctx.globals.values().copied().collect();
        for schema in self.ctx.structs.values() {
            roots.extend(schema.instances.iter().copied());
        }
        roots
    }

    /// All nodes reachable from the roots, except reference arguments
    /// (those render inside reference resolution) and reference targets
    /// (owned and visited elsewhere).
    fn reachable(&self) -> Vec<NodeId> {
        let mut out = Vec::new();
        for root in self.roots() {
            self.collect(root, &mut out);
        }
        out
    }

    fn collect(&self, id: NodeId, out: &mut Vec<NodeId>) {
        out.push(id);
        if matches!(self.ctx.node(id).kind, NodeKind::Reference { .. }) {
            return;
        }
        for child in self.ctx.children(id) {
            self.collect(child, out);
        }
    }

    // === Phase 1: parents ===

    fn set_parents(&mut self) {
        let globals: Vec<NodeId> = self.ctx.globals.values().copied().collect();
        for id in globals {
            self.ctx.node_mut(id).meta.parent = Parent::Globals;
            self.set_parents_below(id);
        }
        let instances: Vec<NodeId> = self
            .ctx
            .structs
            .values()
            .flat_map(|s| s.instances.iter().copied())
            .collect();
        for id in instances {
            // Top-level rows have no lexical parent of their own.
            self.set_parents_below(id);
        }
    }

    fn set_parents_below(&mut self, id: NodeId) {
        let parent_of_children = match self.ctx.node(id).kind {
            NodeKind::Instance(_) => Parent::Node(id),
            // Array elements and reference arguments look up through their
            // container's scope, not the container itself.
            NodeKind::Array(_) | NodeKind::Reference { .. } => self.ctx.node(id).meta.parent,
            NodeKind::Primitive { .. } => return,
        };
        for child in self.ctx.children(id) {
            self.ctx.node_mut(child).meta.parent = parent_of_children;
            self.set_parents_below(child);
        }
    }

    // === Phase 2: base rendering ===

    fn render_base(&mut self, id: NodeId) -> Result<(), TycoError> {
        match self.ctx.node(id).kind {
            NodeKind::Primitive { .. } => self.render_primitive(id),
            NodeKind::Array(_) | NodeKind::Instance(_) => {
                for child in self.ctx.children(id) {
                    self.render_base(child)?;
                }
                Ok(())
            }
            // References resolve in their own phase; their arguments render
            // there too, once primary-key schema info is known.
            NodeKind::Reference { .. } => Ok(()),
        }
    }

    fn render_primitive(&mut self, id: NodeId) -> Result<(), TycoError> {
        let node = self.ctx.node(id);
        if node.meta.rendered.is_some() {
            return Ok(());
        }
        let NodeKind::Primitive { raw, .. } = &node.kind else {
            return Ok(());
        };
        let raw = raw.clone();
        let type_name = node.meta.type_name.clone().unwrap_or_else(|| "str".to_string());
        let nullable = node.meta.nullable;
        let span = node.meta.span.clone();

        let (content, quoted) = strip_string_delimiters(&raw);
        let rendered = if nullable && !quoted && content.trim() == "null" {
            Rendered::Null
        } else {
            match type_name.as_str() {
                "str" => {
                    let mut text = content.to_string();
                    if text.starts_with('\n') {
                        text.remove(0);
                    }
                    Rendered::Str(text)
                }
                "int" => match parse_int(content.trim()) {
                    Some(v) => Rendered::Int(v),
                    None => {
                        return Err(TycoError::InvalidNumber {
                            content: content.trim().to_string(),
                            src: span.source(),
                            span: span.source_span(),
                        })
                    }
                },
                "float" | "decimal" => match content.trim().parse::<f64>() {
                    Ok(v) => Rendered::Float(v),
                    Err(_) => {
                        return Err(TycoError::InvalidNumber {
                            content: content.trim().to_string(),
                            src: span.source(),
                            span: span.source_span(),
                        })
                    }
                },
                "bool" => match content.trim() {
                    "true" => Rendered::Bool(true),
                    "false" => Rendered::Bool(false),
                    other => {
                        return Err(TycoError::InvalidBool {
                            content: other.to_string(),
                            src: span.source(),
                            span: span.source_span(),
                        })
                    }
                },
                "date" => Rendered::Str(content.trim().to_string()),
                "time" => {
                    let t = content.trim();
                    Rendered::Str(normalize_time(t).unwrap_or_else(|| t.to_string()))
                }
                "datetime" => {
                    let t = content.trim();
                    Rendered::Str(normalize_datetime(t).unwrap_or_else(|| t.to_string()))
                }
                other => {
                    return Err(TycoError::Malformatted {
                        detail: format!("cannot render '{}' as '{other}'", content.trim()),
                        src: span.source(),
                        span: span.source_span(),
                    })
                }
            }
        };
        self.ctx.node_mut(id).meta.rendered = Some(rendered);
        Ok(())
    }

    // === Phase 3: primary keys ===

    fn load_primary_keys(&mut self) -> Result<(), TycoError> {
        let type_names: Vec<String> = self.ctx.structs.keys().cloned().collect();
        for type_name in type_names {
            let (primary_keys, instances) = {
                let schema = &self.ctx.structs[&type_name];
                (schema.primary_keys.clone(), schema.instances.clone())
            };
            if primary_keys.is_empty() {
                continue;
            }
            let mut index = HashMap::new();
            for inst in instances {
                let key = self.primary_key_tuple(inst, &primary_keys)?;
                if index.insert(key, inst).is_some() {
                    let span = self.ctx.node(inst).meta.span.clone();
                    return Err(TycoError::DuplicatePrimaryKey {
                        type_name,
                        src: span.source(),
                        span: span.source_span(),
                    });
                }
            }
            self.ctx
                .structs
                .get_mut(&type_name)
                .expect("iterating declared types")
                .instance_index = index;
        }
        Ok(())
    }

    fn primary_key_tuple(&self, inst: NodeId, keys: &[String]) -> Result<String, TycoError> {
        let NodeKind::Instance(fields) = &self.ctx.node(inst).kind else {
            let span = self.ctx.node(inst).meta.span.clone();
            return Err(TycoError::Malformatted {
                detail: "expected an instance".to_string(),
                src: span.source(),
                span: span.source_span(),
            });
        };
        let mut parts = Vec::with_capacity(keys.len());
        for key in keys {
            let field = fields
                .iter()
                .find(|(name, _)| name == key)
                .map(|(_, id)| *id);
            let Some(field) = field else {
                let node = self.ctx.node(inst);
                let span = node.meta.span.clone();
                return Err(TycoError::MissingAttr {
                    name: key.clone(),
                    type_name: node.meta.type_name.clone().unwrap_or_default(),
                    src: span.source(),
                    span: span.source_span(),
                });
            };
            parts.push(self.key_string(field)?);
        }
        Ok(parts.join("\0"))
    }

    /// Rendered scalar as a key component. `\0` never occurs in rendered
    /// content, so joined tuples cannot collide across boundaries.
    fn key_string(&self, id: NodeId) -> Result<String, TycoError> {
        let node = self.ctx.node(id);
        match &node.meta.rendered {
            Some(Rendered::Str(s)) => Ok(s.clone()),
            Some(Rendered::Int(i)) => Ok(i.to_string()),
            Some(Rendered::Float(f)) => Ok(f.to_string()),
            Some(Rendered::Bool(b)) => Ok(b.to_string()),
            Some(Rendered::Null) => Ok("null".to_string()),
            Some(Rendered::Instance(_)) | None => {
                let span = node.meta.span.clone();
                Err(TycoError::Malformatted {
                    detail: "primary key component is not a scalar".to_string(),
                    src: span.source(),
                    span: span.source_span(),
                })
            }
        }
    }

    // === Phase 4: references ===

    fn render_references(&mut self) -> Result<(), TycoError> {
        let references: Vec<NodeId> = self
            .reachable()
            .into_iter()
            .filter(|&id| matches!(self.ctx.node(id).kind, NodeKind::Reference { .. }))
            .collect();
        for id in references {
            self.resolve_reference(id)?;
        }
        Ok(())
    }

    fn resolve_reference(&mut self, id: NodeId) -> Result<(), TycoError> {
        let span = self.ctx.node(id).meta.span.clone();
        // One pipeline run visits each reference exactly once; a reference
        // that is already rendered means the context was rendered before.
        if self.ctx.node(id).meta.rendered.is_some() {
            return Err(TycoError::DoubleRender {
                src: span.source(),
                span: span.source_span(),
            });
        }
        let NodeKind::Reference { target, args } = self.ctx.node(id).kind.clone() else {
            return Ok(());
        };
        let Some(schema) = self.ctx.structs.get(&target) else {
            return Err(TycoError::UnknownReference {
                type_name: target,
                src: span.source(),
                span: span.source_span(),
            });
        };
        let primary_keys = schema.primary_keys.clone();
        let key_specs: Vec<(String, AttrSpec)> = primary_keys
            .iter()
            .filter_map(|k| schema.attrs.get(k).map(|s| (k.clone(), s.clone())))
            .collect();
        if primary_keys.is_empty() {
            return Err(TycoError::UnknownReference {
                type_name: target,
                src: span.source(),
                span: span.source_span(),
            });
        }

        // Arguments map onto the primary keys positionally, or by name once
        // a named argument appears.
        let mut by_key: HashMap<String, NodeId> = HashMap::new();
        let mut keyword_mode = false;
        for (i, &arg) in args.iter().enumerate() {
            let arg_span = self.ctx.node(arg).meta.span.clone();
            match self.ctx.node(arg).meta.attr_name.clone() {
                Some(name) => {
                    keyword_mode = true;
                    if !primary_keys.contains(&name) {
                        return Err(TycoError::UnknownAttr {
                            name,
                            src: arg_span.source(),
                            span: arg_span.source_span(),
                        });
                    }
                    by_key.insert(name, arg);
                }
                None => {
                    if keyword_mode {
                        return Err(TycoError::PositionalAfterKeyword {
                            src: arg_span.source(),
                            span: arg_span.source_span(),
                        });
                    }
                    match primary_keys.get(i) {
                        Some(key) => {
                            by_key.insert(key.clone(), arg);
                        }
                        None => {
                            return Err(TycoError::UnknownReference {
                                type_name: target,
                                src: span.source(),
                                span: span.source_span(),
                            })
                        }
                    }
                }
            }
        }

        let mut parts = Vec::with_capacity(key_specs.len());
        for (key, spec) in &key_specs {
            let Some(&arg) = by_key.get(key) else {
                return Err(TycoError::MissingAttr {
                    name: key.clone(),
                    type_name: target.clone(),
                    src: span.source(),
                    span: span.source_span(),
                });
            };
            {
                let meta = &mut self.ctx.node_mut(arg).meta;
                meta.type_name = Some(spec.type_name.clone());
                meta.attr_name = Some(key.clone());
                meta.nullable = spec.nullable;
            }
            self.render_base(arg)?;
            parts.push(self.key_string(arg)?);
        }
        let tuple = parts.join("\0");
        let found = self
            .ctx
            .structs
            .get(&target)
            .and_then(|s| s.instance_index.get(&tuple))
            .copied();
        match found {
            Some(instance) => {
                self.ctx.node_mut(id).meta.rendered = Some(Rendered::Instance(instance));
                Ok(())
            }
            None => Err(TycoError::UnknownReference {
                type_name: target,
                src: span.source(),
                span: span.source_span(),
            }),
        }
    }

    // === Phase 5: templates ===

    fn render_templates(&mut self) -> Result<(), TycoError> {
        let primitives: Vec<NodeId> = self
            .reachable()
            .into_iter()
            .filter(|&id| matches!(self.ctx.node(id).kind, NodeKind::Primitive { .. }))
            .collect();
        let mut visiting = HashSet::new();
        for id in primitives {
            self.expand(id, &mut visiting)?;
        }
        Ok(())
    }

    /// Expand `{path}` occurrences in one node, recursively forcing each
    /// target first so a single pass reaches the fixpoint on acyclic
    /// graphs. A node already on the expansion stack substitutes its
    /// current text, so cycles terminate.
    fn expand(&mut self, id: NodeId, visiting: &mut HashSet<NodeId>) -> Result<(), TycoError> {
        let node = self.ctx.node(id);
        if node.meta.expanded {
            return Ok(());
        }
        let expandable = matches!(node.kind, NodeKind::Primitive { literal: false, .. })
            && node.meta.type_name.as_deref() == Some("str")
            && matches!(node.meta.rendered, Some(Rendered::Str(_)));
        if !expandable {
            self.ctx.node_mut(id).meta.expanded = true;
            return Ok(());
        }
        if !visiting.insert(id) {
            return Ok(());
        }
        let span = self.ctx.node(id).meta.span.clone();
        let Some(Rendered::Str(text)) = self.ctx.node(id).meta.rendered.clone() else {
            visiting.remove(&id);
            return Ok(());
        };

        let mut out = String::with_capacity(text.len());
        let mut rest = text.as_str();
        while let Some(open) = rest.find('{') {
            out.push_str(&rest[..open]);
            let after = &rest[open + 1..];
            match scan_template_path(after) {
                Some(path_len) => {
                    let path = &after[..path_len];
                    let target = self.resolve_template_path(id, path, &span)?;
                    self.expand(target, visiting)?;
                    out.push_str(&self.substitution(target, path, &span)?);
                    rest = &after[path_len + 1..];
                }
                None => {
                    out.push('{');
                    rest = after;
                }
            }
        }
        out.push_str(rest);

        let finished = apply_escapes(&out);
        let meta = &mut self.ctx.node_mut(id).meta;
        meta.rendered = Some(Rendered::Str(finished));
        meta.expanded = true;
        visiting.remove(&id);
        Ok(())
    }

    /// The replacement text for a resolved template target. Only `str` and
    /// `int` values may be spliced into a string.
    fn substitution(&self, target: NodeId, path: &str, span: &Span) -> Result<String, TycoError> {
        let node = self.ctx.node(target);
        let ok_type = matches!(node.meta.type_name.as_deref(), Some("str") | Some("int"));
        if !ok_type || node.meta.array {
            return Err(TycoError::UntemplatableType {
                path: path.to_string(),
                src: span.source(),
                span: span.source_span(),
            });
        }
        match &node.meta.rendered {
            Some(Rendered::Str(s)) => Ok(s.clone()),
            Some(Rendered::Int(i)) => Ok(i.to_string()),
            Some(Rendered::Null) => Ok("null".to_string()),
            _ => Err(TycoError::UntemplatableType {
                path: path.to_string(),
                src: span.source(),
                span: span.source_span(),
            }),
        }
    }

    /// Walk the containment chain for a template path.
    ///
    /// Leading dots after the first hop to the parent's parent; dotted
    /// attribute names resolve greedily with backtracking (merge the next
    /// segment on a miss and retry); `global` escapes to the globals map
    /// when the very first lookup fails.
    fn resolve_template_path(
        &self,
        from: NodeId,
        path: &str,
        span: &Span,
    ) -> Result<NodeId, TycoError> {
        let mut scope = self.ctx.node(from).meta.parent;
        let mut rest = path;
        if let Some(stripped) = rest.strip_prefix('.') {
            rest = stripped;
            while let Some(stripped) = rest.strip_prefix('.') {
                rest = stripped;
                scope = match scope {
                    Parent::Node(id) => match self.ctx.node(id).meta.parent {
                        Parent::None => {
                            return Err(TycoError::ParentOverflow {
                                path: path.to_string(),
                                src: span.source(),
                                span: span.source_span(),
                            })
                        }
                        p => p,
                    },
                    Parent::Globals | Parent::None => {
                        return Err(TycoError::ParentOverflow {
                            path: path.to_string(),
                            src: span.source(),
                            span: span.source_span(),
                        })
                    }
                };
            }
        }

        let mut segments: VecDeque<String> = rest.split('.').map(str::to_string).collect();
        let mut first = true;
        while let Some(mut head) = segments.pop_front() {
            loop {
                match self.lookup(scope, &head, span)? {
                    Some(child) => {
                        scope = Parent::Node(child);
                        break;
                    }
                    None => {
                        if first && head == "global" {
                            scope = Parent::Globals;
                            break;
                        }
                        match segments.pop_front() {
                            Some(next) => {
                                head.push('.');
                                head.push_str(&next);
                            }
                            None => {
                                return Err(TycoError::UnknownAttr {
                                    name: head,
                                    src: span.source(),
                                    span: span.source_span(),
                                })
                            }
                        }
                    }
                }
            }
            first = false;
        }
        match scope {
            Parent::Node(id) => Ok(id),
            _ => Err(TycoError::UnknownAttr {
                name: path.to_string(),
                src: span.source(),
                span: span.source_span(),
            }),
        }
    }

    fn lookup(
        &self,
        scope: Parent,
        name: &str,
        span: &Span,
    ) -> Result<Option<NodeId>, TycoError> {
        match scope {
            Parent::Globals => Ok(self.ctx.globals.get(name).copied()),
            Parent::None => Ok(None),
            Parent::Node(id) => match &self.ctx.node(id).kind {
                NodeKind::Instance(fields) => Ok(fields
                    .iter()
                    .find(|(attr, _)| attr == name)
                    .map(|(_, id)| *id)),
                NodeKind::Reference { .. } => match self.ctx.node(id).meta.rendered {
                    Some(Rendered::Instance(target)) => {
                        self.lookup(Parent::Node(target), name, span)
                    }
                    _ => Err(TycoError::UnresolvedReferenceInTemplate {
                        src: span.source(),
                        span: span.source_span(),
                    }),
                },
                _ => Ok(None),
            },
        }
    }
}

/// Peel quoting delimiters off raw primitive content. The second value is
/// true when the content was quoted (and so is never the `null` token).
fn strip_string_delimiters(raw: &str) -> (&str, bool) {
    for delim in ["\"\"\"", "'''"] {
        if raw.len() >= 6 && raw.starts_with(delim) && raw.ends_with(delim) {
            return (&raw[3..raw.len() - 3], true);
        }
    }
    for delim in ['"', '\''] {
        if raw.len() >= 2 && raw.starts_with(delim) && raw.ends_with(delim) {
            return (&raw[1..raw.len() - 1], true);
        }
    }
    (raw, false)
}

/// Optional sign, then `0x`/`0o`/`0b` radix prefixes, else decimal. The
/// sign is carried into the radix parse so `i64::MIN` stays representable.
fn parse_int(s: &str) -> Option<i64> {
    let (sign, magnitude) = match s.strip_prefix('-') {
        Some(m) => ("-", m),
        None => ("", s.strip_prefix('+').unwrap_or(s)),
    };
    for (prefix, radix) in [
        ("0x", 16),
        ("0X", 16),
        ("0o", 8),
        ("0O", 8),
        ("0b", 2),
        ("0B", 2),
    ] {
        if let Some(digits) = magnitude.strip_prefix(prefix) {
            return i64::from_str_radix(&format!("{sign}{digits}"), radix).ok();
        }
    }
    format!("{sign}{magnitude}").parse::<i64>().ok()
}

fn all_digits(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_digit())
}

/// `H:M[:S][.frac]` → `HH:MM:SS[.ffffff]`. Content that is not shaped like
/// a time yields `None` and passes through verbatim.
fn normalize_time(s: &str) -> Option<String> {
    let (hms, frac) = match s.split_once('.') {
        Some((a, b)) => (a, Some(b)),
        None => (s, None),
    };
    let parts: Vec<&str> = hms.split(':').collect();
    if !(2..=3).contains(&parts.len()) {
        return None;
    }
    if parts.iter().any(|p| !all_digits(p) || p.len() > 2) {
        return None;
    }
    let seconds = parts.get(2).copied().unwrap_or("0");
    let base = format!("{:0>2}:{:0>2}:{:0>2}", parts[0], parts[1], seconds);
    match frac {
        None => Some(base),
        Some(f) if all_digits(f) => {
            let mut digits: String = f.chars().take(6).collect();
            while digits.len() < 6 {
                digits.push('0');
            }
            Some(format!("{base}.{digits}"))
        }
        Some(_) => None,
    }
}

/// `date[ T]time[Z|±HH[:MM]]` → `dateTtime±HH:MM`, fraction normalized to
/// six digits, `Z` mapped to `+00:00`.
fn normalize_datetime(s: &str) -> Option<String> {
    let sep = s.find(['T', ' '])?;
    let date = &s[..sep];
    let rest = &s[sep + 1..];
    let (time_part, tz) = if let Some(stripped) = rest.strip_suffix('Z') {
        (stripped, Some("+00:00".to_string()))
    } else if let Some(pos) = rest.rfind(['+', '-']).filter(|&p| p > 0) {
        (&rest[..pos], Some(normalize_timezone(&rest[pos..])?))
    } else {
        (rest, None)
    };
    let time = normalize_time(time_part)?;
    Some(format!("{date}T{time}{}", tz.unwrap_or_default()))
}

fn normalize_timezone(s: &str) -> Option<String> {
    let sign = s.chars().next().filter(|c| *c == '+' || *c == '-')?;
    let digits = &s[1..];
    if let Some((h, m)) = digits.split_once(':') {
        if all_digits(h) && all_digits(m) {
            return Some(format!("{sign}{:0>2}:{:0>2}", h, m));
        }
        return None;
    }
    match digits.len() {
        4 if all_digits(digits) => Some(format!("{sign}{}:{}", &digits[..2], &digits[2..])),
        1 | 2 if all_digits(digits) => Some(format!("{sign}{:0>2}:00", digits)),
        _ => None,
    }
}

/// The character set a template path is made of. Returns the path length
/// when `s` opens with a non-empty path followed by `}`.
fn scan_template_path(s: &str) -> Option<usize> {
    let mut len = 0;
    for c in s.chars() {
        if c == '}' {
            return if len > 0 { Some(len) } else { None };
        }
        if c.is_ascii_alphanumeric() || c == '_' || c == '.' {
            len += c.len_utf8();
        } else {
            return None;
        }
    }
    None
}

/// Classic escape application, run exactly once per non-literal string
/// after template substitution. Unknown sequences are preserved verbatim.
/// `\` before a newline elides both and the next line's leading whitespace.
fn apply_escapes(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.peek().copied() {
            Some('\\') => {
                chars.next();
                out.push('\\');
            }
            Some('"') => {
                chars.next();
                out.push('"');
            }
            Some('b') => {
                chars.next();
                out.push('\u{0008}');
            }
            Some('t') => {
                chars.next();
                out.push('\t');
            }
            Some('n') => {
                chars.next();
                out.push('\n');
            }
            Some('f') => {
                chars.next();
                out.push('\u{000c}');
            }
            Some('r') => {
                chars.next();
                out.push('\r');
            }
            Some('u') | Some('U') => {
                let marker = chars.next().expect("peeked");
                let width = if marker == 'u' { 4 } else { 8 };
                let digits: String = chars.clone().take(width).collect();
                let decoded = (digits.len() == width
                    && digits.chars().all(|d| d.is_ascii_hexdigit()))
                .then(|| u32::from_str_radix(&digits, 16).ok())
                .flatten()
                .and_then(char::from_u32);
                match decoded {
                    Some(ch) => {
                        for _ in 0..width {
                            chars.next();
                        }
                        out.push(ch);
                    }
                    None => {
                        out.push('\\');
                        out.push(marker);
                    }
                }
            }
            Some('\n') => {
                chars.next();
                while matches!(chars.peek(), Some(' ') | Some('\t')) {
                    chars.next();
                }
            }
            Some(other) => {
                chars.next();
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}
