//! # Tyco Parser
//!
//! Consumes the fragment queue produced by [`crate::lexer`] and populates a
//! [`Context`] with globals, struct schemas and unrendered value nodes.
//! Rendering (typed conversion, reference resolution, templates) happens
//! afterwards in [`crate::resolver`].
//!
//! The grammar is line-oriented. Each top-level row is one of:
//!
//! ```text
//! #include <path>
//! global        ::= ('?')? type ('[]')? ident ':' value
//! struct_block  ::= ident ':' NL (schema_row | default_row | instance_row)*
//! ```
//!
//! and inside a struct block, indented rows are:
//!
//! ```text
//! schema_row    ::= WS ('*'|'?')? type ('[]')? ident ':' value?
//! default_row   ::= WS ident ':' value?
//! instance_row  ::= WS '-' arg (',' arg)*
//! ```
//!
//! Values recurse through inline arrays `[...]`, invocations `Type(...)`,
//! quoted strings (single or triple, `'` variants literal) and raw tokens.
//! A value reader is parameterized on its set of acceptable terminators;
//! any other delimiter character at a terminator position is an error.

use crate::ast::{AttrSpec, Context, Meta, Node, NodeId, NodeKind, StructSchema};
use crate::error::TycoError;
use crate::lexer::{
    coerce_content_to_fragments, is_forbidden_ctrl, is_ident_start, scan_dotted_ident, scan_ident,
    Fragment, SourceFile, Span,
};
use indexmap::IndexMap;
use miette::{NamedSource, SourceSpan};
use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Terminators a value reader will consume after the value.
/// Delimiter characters outside the set fail with `BadDelimiter`.
#[derive(Debug, Clone, Copy)]
struct Delims {
    comma: bool,
    eol: bool,
    rbracket: bool,
    rparen: bool,
}

const GLOBAL_DELIMS: Delims = Delims {
    comma: false,
    eol: true,
    rbracket: false,
    rparen: false,
};
const INSTANCE_DELIMS: Delims = Delims {
    comma: true,
    eol: true,
    rbracket: false,
    rparen: false,
};
const ARRAY_DELIMS: Delims = Delims {
    comma: true,
    eol: false,
    rbracket: true,
    rparen: false,
};
const INVOCATION_DELIMS: Delims = Delims {
    comma: true,
    eol: false,
    rbracket: false,
    rparen: true,
};

/// The delimiter that ended a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Delim {
    Comma,
    Eol,
    RBracket,
    RParen,
}

/// Parsed head of a `type name:` row (global or schema line).
#[derive(Debug)]
struct RowHead {
    modifier: Option<char>,
    type_name: String,
    array: bool,
    attr: String,
    /// Bytes consumed, colon included when present.
    len: usize,
    has_colon: bool,
}

/// A line-oriented parser feeding one [`Context`].
///
/// `#include` creates a nested parser over the included file that shares
/// the same context, so included globals, structs and defaults land in one
/// registry.
pub struct Parser<'a> {
    ctx: &'a mut Context,
    src: Arc<SourceFile>,
    fragments: VecDeque<Fragment>,
    cur: Option<Fragment>,
    base_dir: PathBuf,
}

impl<'a> Parser<'a> {
    pub fn new(ctx: &'a mut Context, text: &str, source_name: &str, base_dir: PathBuf) -> Self {
        let (src, fragments) = coerce_content_to_fragments(text, source_name);
        Parser {
            ctx,
            src,
            fragments,
            cur: None,
            base_dir,
        }
    }

    /// Top-level dispatch: `#include`, globals, struct blocks.
    pub fn parse(&mut self) -> Result<(), TycoError> {
        while let Some(mut frag) = self.fragments.pop_front() {
            if let Some(rest) = frag.rest().strip_prefix("#include") {
                if rest.starts_with(' ') || rest.starts_with('\t') {
                    self.handle_include(frag)?;
                    continue;
                }
                if rest.is_empty() {
                    return Err(TycoError::Malformatted {
                        detail: "#include requires a path".to_string(),
                        src: frag.src().named_source(),
                        span: (frag.abs_offset(), 8).into(),
                    });
                }
                // `#includesomething` is an ordinary comment
            }
            frag.strip_comment()?;
            if frag.is_blank() {
                continue;
            }
            if frag.is_indented() {
                return Err(TycoError::Malformatted {
                    detail: "unexpected indentation outside a struct block".to_string(),
                    src: frag.src().named_source(),
                    span: (frag.abs_offset(), 1).into(),
                });
            }
            let rest = frag.rest().to_string();
            if let Some(head) = scan_typed_row(&rest, &['?']) {
                if !head.has_colon {
                    return Err(TycoError::Malformatted {
                        detail: format!("global '{}' is missing ':'", head.attr),
                        src: frag.src().named_source(),
                        span: (frag.abs_offset(), head.len.max(1)).into(),
                    });
                }
                frag.advance(head.len);
                self.cur = Some(frag);
                self.read_global(head)?;
                continue;
            }
            if let Some((name, hlen)) = scan_struct_header(&rest) {
                frag.advance(hlen);
                if !frag.is_blank() {
                    return Err(TycoError::Malformatted {
                        detail: format!("unexpected content after struct header '{name}:'"),
                        src: frag.src().named_source(),
                        span: (frag.abs_offset(), 1).into(),
                    });
                }
                self.read_struct_block(&name)?;
                continue;
            }
            return Err(TycoError::Malformatted {
                detail: "expected a global, a struct block or #include".to_string(),
                src: frag.src().named_source(),
                span: (frag.abs_offset(), rest.trim_end().len().max(1)).into(),
            });
        }
        Ok(())
    }

    // === Top-level rows ===

    fn handle_include(&mut self, mut frag: Fragment) -> Result<(), TycoError> {
        frag.advance("#include".len());
        frag.strip_comment()?;
        let mut path_text = frag.rest().trim();
        for quote in ['"', '\''] {
            if path_text.len() >= 2 && path_text.starts_with(quote) && path_text.ends_with(quote) {
                path_text = &path_text[1..path_text.len() - 1];
            }
        }
        if path_text.is_empty() {
            return Err(TycoError::Malformatted {
                detail: "#include requires a path".to_string(),
                src: frag.src().named_source(),
                span: (frag.abs_offset(), 1).into(),
            });
        }
        let mut path = PathBuf::from(path_text);
        if path.is_relative() {
            path = self.base_dir.join(path);
        }
        let canonical = fs::canonicalize(&path).unwrap_or_else(|_| path.clone());
        if !self.ctx.path_cache.insert(canonical) {
            // Already parsed into this context; includes are idempotent and
            // cycles short-circuit here.
            return Ok(());
        }
        let text = fs::read_to_string(&path).map_err(|e| TycoError::FileAccess {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        let dir = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        let name = path.to_string_lossy().to_string();
        Parser::new(&mut *self.ctx, &text, &name, dir).parse()
    }

    fn read_global(&mut self, head: RowHead) -> Result<(), TycoError> {
        if self.ctx.globals.contains_key(&head.attr) {
            let (src, span) = self.err_parts(head.len);
            return Err(TycoError::DuplicateGlobal {
                name: head.attr,
                src,
                span,
            });
        }
        self.skip_inline_ws()?;
        if self.at_eol() {
            let (src, span) = self.err_parts(1);
            return Err(TycoError::Malformatted {
                detail: format!("global '{}' has no value", head.attr),
                src,
                span,
            });
        }
        let (value, _) = self.read_value(GLOBAL_DELIMS, false)?;
        let spec = AttrSpec {
            type_name: head.type_name,
            nullable: head.modifier == Some('?'),
            array: head.array,
        };
        self.apply_attr_spec(value, &head.attr, &spec)?;
        self.ctx.globals.insert(head.attr, value);
        Ok(())
    }

    fn read_struct_block(&mut self, name: &str) -> Result<(), TycoError> {
        let is_new = !self.ctx.structs.contains_key(name);
        if is_new {
            self.ctx
                .structs
                .insert(name.to_string(), StructSchema::new(name));
        }
        // Attributes may only be declared in the schema section of the
        // block that introduced the type, before its first default or
        // instance row.
        let mut in_schema = is_new;
        loop {
            let Some(front) = self.fragments.front_mut() else {
                break;
            };
            if front.rest().starts_with("#include") {
                break;
            }
            front.strip_comment()?;
            if front.is_blank() {
                self.fragments.pop_front();
                continue;
            }
            if !front.is_indented() {
                break;
            }
            let mut frag = self.fragments.pop_front().expect("front was checked");
            frag.trim_leading_ws();
            let rest = frag.rest().to_string();
            self.cur = Some(frag);
            if rest.starts_with('-') {
                in_schema = false;
                self.cur_advance(1);
                self.read_instance_row(name)?;
                continue;
            }
            if let Some(head) = scan_typed_row(&rest, &['*', '?']) {
                if !head.has_colon {
                    let (src, span) = self.err_parts(head.len);
                    return Err(TycoError::MissingColon { src, span });
                }
                if !in_schema {
                    let (src, span) = self.err_parts(head.len);
                    return Err(TycoError::SchemaAfterInit {
                        type_name: name.to_string(),
                        src,
                        span,
                    });
                }
                self.cur_advance(head.len);
                self.read_schema_row(name, head)?;
                continue;
            }
            if let Some((attr, len)) = scan_default_row(&rest) {
                in_schema = false;
                self.cur_advance(len);
                self.read_default_row(name, attr)?;
                continue;
            }
            let (src, span) = self.err_parts(rest.trim_end().len().max(1));
            return Err(TycoError::Malformatted {
                detail: format!("unrecognized row in struct block '{name}'"),
                src,
                span,
            });
        }
        Ok(())
    }

    // === Struct-block rows ===

    fn read_schema_row(&mut self, type_name: &str, head: RowHead) -> Result<(), TycoError> {
        if head.modifier == Some('*') && head.array {
            let (src, span) = self.err_parts(head.len);
            return Err(TycoError::PrimaryKeyOnArray {
                name: head.attr,
                src,
                span,
            });
        }
        let known = self
            .ctx
            .structs
            .get(type_name)
            .map(|s| s.attrs.contains_key(&head.attr))
            .unwrap_or(false);
        if known {
            let (src, span) = self.err_parts(head.len);
            return Err(TycoError::DuplicateAttr {
                name: head.attr,
                type_name: type_name.to_string(),
                src,
                span,
            });
        }
        self.skip_inline_ws()?;
        let default = if self.at_eol() {
            None
        } else {
            let (id, _) = self.read_value(GLOBAL_DELIMS, false)?;
            Some(id)
        };
        let schema = self
            .ctx
            .structs
            .get_mut(type_name)
            .expect("struct was registered");
        let spec = AttrSpec {
            type_name: head.type_name,
            nullable: head.modifier == Some('?'),
            array: head.array,
        };
        if head.modifier == Some('*') {
            schema.primary_keys.push(head.attr.clone());
        }
        schema.attrs.insert(head.attr.clone(), spec);
        if let Some(id) = default {
            schema.defaults.insert(head.attr, id);
        }
        Ok(())
    }

    fn read_default_row(&mut self, type_name: &str, attr: String) -> Result<(), TycoError> {
        let known = self
            .ctx
            .structs
            .get(type_name)
            .map(|s| s.attrs.contains_key(&attr))
            .unwrap_or(false);
        if !known {
            let (src, span) = self.err_parts(attr.len());
            return Err(TycoError::UnknownAttr {
                name: attr,
                src,
                span,
            });
        }
        self.skip_inline_ws()?;
        let schema_default = if self.at_eol() {
            None
        } else {
            let (id, _) = self.read_value(GLOBAL_DELIMS, false)?;
            Some(id)
        };
        let schema = self
            .ctx
            .structs
            .get_mut(type_name)
            .expect("struct was registered");
        match schema_default {
            // An empty value clears the default.
            None => {
                schema.defaults.shift_remove(&attr);
            }
            Some(id) => {
                schema.defaults.insert(attr, id);
            }
        }
        Ok(())
    }

    fn read_instance_row(&mut self, type_name: &str) -> Result<(), TycoError> {
        // Span of the whole `-` row, captured up front: once the argument
        // list is consumed the cursor has moved past it.
        let span = {
            let f = self.cur.as_ref().expect("row dispatch saw '-'");
            Span {
                src: Arc::clone(f.src()),
                offset: f.abs_offset().saturating_sub(1),
                len: f.rest().len() + 1,
            }
        };
        let mut args = Vec::new();
        loop {
            self.skip_inline_ws()?;
            if self.try_backslash_continuation()? {
                continue;
            }
            if self.at_eol() {
                break;
            }
            let (id, delim) = self.read_value(INSTANCE_DELIMS, true)?;
            args.push(id);
            match delim {
                Delim::Eol => break,
                Delim::Comma => {
                    self.skip_inline_ws()?;
                    if self.try_backslash_continuation()? {
                        continue;
                    }
                    if self.at_eol() && !self.continue_after_trailing_comma()? {
                        break;
                    }
                }
                _ => unreachable!("instance rows only accept ',' and end of line"),
            }
        }
        let inst = self.create_instance(type_name, args, span)?;
        self.ctx
            .structs
            .get_mut(type_name)
            .expect("struct was registered")
            .instances
            .push(inst);
        Ok(())
    }

    /// A `\` as the only remaining content continues the row onto the next
    /// line, with that line's leading whitespace stripped.
    fn try_backslash_continuation(&mut self) -> Result<bool, TycoError> {
        let rest = self.cur_rest();
        if !rest.starts_with('\\') || !rest[1..].trim().is_empty() {
            return Ok(false);
        }
        match self.fragments.pop_front() {
            Some(mut frag) => {
                frag.strip_comment()?;
                frag.trim_leading_ws();
                self.cur = Some(frag);
                Ok(true)
            }
            None => {
                let (src, span) = self.err_parts(1);
                Err(TycoError::Malformatted {
                    detail: "line continuation at end of input".to_string(),
                    src,
                    span,
                })
            }
        }
    }

    /// A `,` that ends a line keeps the argument list open when the next
    /// line is an indented continuation (not blank, not a new row).
    fn continue_after_trailing_comma(&mut self) -> Result<bool, TycoError> {
        let Some(front) = self.fragments.front_mut() else {
            return Ok(false);
        };
        front.strip_comment()?;
        if front.is_blank() || !front.is_indented() {
            return Ok(false);
        }
        let trimmed = front.rest().trim_start().to_string();
        if trimmed.starts_with('-') || scan_typed_row(&trimmed, &['*', '?']).is_some() {
            return Ok(false);
        }
        let mut frag = self.fragments.pop_front().expect("front was checked");
        frag.trim_leading_ws();
        self.cur = Some(frag);
        Ok(true)
    }

    // === Value forms ===

    /// Read one value node and the terminator after it.
    fn read_value(&mut self, delims: Delims, allow_name: bool) -> Result<(NodeId, Delim), TycoError> {
        self.seek_value_start(delims)?;
        let attr_name = match scan_name_prefix(self.cur_rest()) {
            Some((name, consumed)) => {
                if !allow_name {
                    let (src, span) = self.err_parts(consumed);
                    return Err(TycoError::StrayColon { src, span });
                }
                self.cur_advance(consumed);
                self.skip_inline_ws()?;
                self.seek_value_start(delims)?;
                Some(name)
            }
            None => None,
        };
        let c = match self.cur_peek() {
            Some(c) => c,
            None => {
                let (src, span) = self.err_parts(1);
                return Err(TycoError::Malformatted {
                    detail: "expected a value".to_string(),
                    src,
                    span,
                });
            }
        };
        let id = match c {
            '[' => self.read_array()?,
            '"' | '\'' => self.read_string()?,
            c if is_ident_start(c) => {
                let rest = self.cur_rest();
                match scan_ident(rest) {
                    Some(ilen) if rest[ilen..].starts_with('(') => self.read_invocation()?,
                    _ => self.read_raw_token(delims)?,
                }
            }
            _ => self.read_raw_token(delims)?,
        };
        if let Some(name) = attr_name {
            self.ctx.node_mut(id).meta.attr_name = Some(name);
        }
        let delim = self.consume_delimiter(delims)?;
        Ok((id, delim))
    }

    /// Position the cursor on the first value character, crossing line
    /// boundaries in bracketed contexts.
    fn seek_value_start(&mut self, delims: Delims) -> Result<(), TycoError> {
        loop {
            self.skip_inline_ws()?;
            if !self.at_eol() {
                return Ok(());
            }
            if delims.eol {
                // End of line is a terminator here; the caller decides what
                // an absent value means.
                return Ok(());
            }
            if !self.advance_content_line()? {
                let (src, span) = self.err_parts(1);
                return Err(TycoError::Malformatted {
                    detail: "unexpected end of input".to_string(),
                    src,
                    span,
                });
            }
        }
    }

    fn consume_delimiter(&mut self, delims: Delims) -> Result<Delim, TycoError> {
        loop {
            self.skip_inline_ws()?;
            if self.at_eol() {
                if delims.eol {
                    self.cur = None;
                    return Ok(Delim::Eol);
                }
                if !self.advance_content_line()? {
                    let (src, span) = self.err_parts(1);
                    return Err(TycoError::Malformatted {
                        detail: "unexpected end of input".to_string(),
                        src,
                        span,
                    });
                }
                continue;
            }
            let c = self.cur_peek().expect("not at end of line");
            if c == '\\'
                && delims.comma
                && delims.eol
                && self.cur_rest()[1..].trim().is_empty()
            {
                // Trailing `\` keeps the row open. Report a comma without
                // consuming anything; the instance-row loop resolves the
                // continuation before the next argument.
                return Ok(Delim::Comma);
            }
            let good = match c {
                ',' => delims.comma,
                ']' => delims.rbracket,
                ')' => delims.rparen,
                _ => false,
            };
            if good {
                if let Some(f) = self.cur.as_mut() {
                    f.bump();
                }
                return Ok(match c {
                    ',' => Delim::Comma,
                    ']' => Delim::RBracket,
                    _ => Delim::RParen,
                });
            }
            let (src, span) = self.err_parts(1);
            return Err(TycoError::BadDelimiter {
                found: c,
                src,
                span,
            });
        }
    }

    fn read_array(&mut self) -> Result<NodeId, TycoError> {
        let start = self.cur_abs();
        self.cur_advance(1);
        let mut elems = Vec::new();
        loop {
            self.seek_bracket_content("array")?;
            if self.cur_peek() == Some(']') {
                self.cur_advance(1);
                break;
            }
            let (id, delim) = self.read_value(ARRAY_DELIMS, false)?;
            elems.push(id);
            if delim == Delim::RBracket {
                break;
            }
        }
        let span = self.span_from(start);
        Ok(self.ctx.alloc(Node {
            meta: Meta::at(span),
            kind: NodeKind::Array(elems),
        }))
    }

    fn read_invocation(&mut self) -> Result<NodeId, TycoError> {
        let start = self.cur_abs();
        let rest = self.cur_rest();
        let ilen = scan_ident(rest).expect("caller checked the identifier");
        let target = rest[..ilen].to_string();
        self.cur_advance(ilen + 1); // identifier and '('
        let mut args = Vec::new();
        loop {
            self.seek_bracket_content("invocation")?;
            if self.cur_peek() == Some(')') {
                self.cur_advance(1);
                break;
            }
            let (id, delim) = self.read_value(INVOCATION_DELIMS, true)?;
            args.push(id);
            if delim == Delim::RParen {
                break;
            }
        }
        let span = self.span_from(start);
        // A type with primary keys (or one not declared yet) is selected by
        // key: the invocation is a reference. A declared type without
        // primary keys is constructed in place.
        let is_reference = self
            .ctx
            .structs
            .get(&target)
            .map(|s| !s.primary_keys.is_empty())
            .unwrap_or(true);
        if is_reference {
            let mut meta = Meta::at(span);
            meta.type_name = Some(target.clone());
            Ok(self.ctx.alloc(Node {
                meta,
                kind: NodeKind::Reference { target, args },
            }))
        } else {
            self.create_instance(&target, args, span)
        }
    }

    fn seek_bracket_content(&mut self, what: &str) -> Result<(), TycoError> {
        loop {
            self.skip_inline_ws()?;
            if !self.at_eol() {
                return Ok(());
            }
            if !self.advance_content_line()? {
                let (src, span) = self.err_parts(1);
                return Err(TycoError::Malformatted {
                    detail: format!("unexpected end of input in {what}"),
                    src,
                    span,
                });
            }
        }
    }

    fn read_string(&mut self) -> Result<NodeId, TycoError> {
        let start = self.cur_abs();
        let frag = self.cur.as_ref().expect("caller saw a quote");
        let rest = frag.rest();
        let quote = rest.chars().next().expect("caller saw a quote");
        let literal = quote == '\'';
        let triple: String = std::iter::repeat(quote).take(3).collect();
        if rest.starts_with(&triple) {
            return self.read_triple_string(quote, literal, start);
        }
        // Single-line string. Backslash escapes one character inside `"`;
        // nothing escapes inside `'`.
        let mut i = 1;
        let mut close = None;
        while i < rest.len() {
            let c = rest[i..].chars().next().expect("in bounds");
            if c == quote {
                close = Some(i);
                break;
            }
            if quote == '"' && c == '\\' {
                i += 1;
                if let Some(next) = rest[i..].chars().next() {
                    i += next.len_utf8();
                }
                continue;
            }
            if is_forbidden_ctrl(c) {
                return Err(TycoError::Malformatted {
                    detail: "control character in string".to_string(),
                    src: frag.src().named_source(),
                    span: (start + i, 1).into(),
                });
            }
            i += c.len_utf8();
        }
        let Some(close) = close else {
            return Err(TycoError::UnclosedString {
                src: frag.src().named_source(),
                span: (start, 1).into(),
            });
        };
        let raw = rest[..close + 1].to_string();
        self.cur_advance(close + 1);
        let span = self.span_from(start);
        Ok(self.ctx.alloc(Node {
            meta: Meta::at(span),
            kind: NodeKind::Primitive { raw, literal },
        }))
    }

    fn read_triple_string(
        &mut self,
        quote: char,
        literal: bool,
        start: usize,
    ) -> Result<NodeId, TycoError> {
        let close: String = std::iter::repeat(quote).take(3).collect();
        let mut raw = close.clone();
        self.cur_advance(3);
        let mut crossed_lines = false;
        loop {
            let rest = self.cur_rest().to_string();
            if let Some(at) = rest.find(&close) {
                // Up to two extra delimiter characters fold into the string,
                // so `"""x""""` ends with a quote character.
                let mut end = at + 3;
                let mut folded = 0;
                while folded < 2 && rest[end..].starts_with(quote) {
                    end += 1;
                    folded += 1;
                }
                self.check_triple_content(&rest[..at], start)?;
                raw.push_str(&rest[..end]);
                self.cur_advance(end);
                break;
            }
            self.check_triple_content(&rest, start)?;
            raw.push_str(&rest);
            let has_newline = self.cur.as_ref().map(|f| f.has_newline()).unwrap_or(false);
            if has_newline {
                raw.push('\n');
            }
            // String content crosses lines raw: no comment stripping inside.
            match self.fragments.pop_front() {
                Some(frag) => {
                    self.cur = Some(frag);
                    crossed_lines = true;
                }
                None => {
                    return Err(TycoError::UnclosedString {
                        src: self.src.named_source(),
                        span: (start, 3).into(),
                    });
                }
            }
        }
        if crossed_lines {
            // The closing line was taken raw; whatever trails the string
            // still needs its comment cut.
            if let Some(f) = self.cur.as_mut() {
                f.strip_comment()?;
            }
        }
        let span = self.span_from(start);
        Ok(self.ctx.alloc(Node {
            meta: Meta::at(span),
            kind: NodeKind::Primitive { raw, literal },
        }))
    }

    fn check_triple_content(&self, chunk: &str, start: usize) -> Result<(), TycoError> {
        for c in chunk.chars() {
            if c.is_ascii_control() && c != '\t' && c != '\r' || c == '\x7f' {
                return Err(TycoError::Malformatted {
                    detail: "control character in string".to_string(),
                    src: self.src.named_source(),
                    span: (start, 3).into(),
                });
            }
        }
        Ok(())
    }

    fn read_raw_token(&mut self, delims: Delims) -> Result<NodeId, TycoError> {
        let start = self.cur_abs();
        let rest = self.cur_rest();
        let mut len = 0;
        for (i, c) in rest.char_indices() {
            if matches!(c, '(' | ')' | '[' | ']' | ',') {
                break;
            }
            if c == '\\' && delims.eol && rest[i + 1..].trim().is_empty() {
                // Trailing continuation marker, not token content.
                break;
            }
            len = i + c.len_utf8();
        }
        let raw = rest[..len].trim_end().to_string();
        let consumed = raw.len();
        if raw.is_empty() {
            let (src, span) = self.err_parts(1);
            return Err(TycoError::Malformatted {
                detail: "expected a value".to_string(),
                src,
                span,
            });
        }
        self.cur_advance(consumed);
        let span = self.span_from(start);
        Ok(self.ctx.alloc(Node {
            meta: Meta::at(span),
            kind: NodeKind::Primitive {
                raw,
                literal: false,
            },
        }))
    }

    // === Instance construction ===

    /// Bind arguments to a struct's attributes, fill the gaps from the
    /// current defaults, and apply schema information to every field.
    pub(crate) fn create_instance(
        &mut self,
        type_name: &str,
        args: Vec<NodeId>,
        span: Span,
    ) -> Result<NodeId, TycoError> {
        let Some(schema) = self.ctx.structs.get(type_name) else {
            return Err(TycoError::Malformatted {
                detail: format!("unknown struct type '{type_name}'"),
                src: span.source(),
                span: span.source_span(),
            });
        };
        let attr_list: Vec<(String, AttrSpec)> = schema
            .attrs
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        let defaults: Vec<(String, NodeId)> = schema
            .defaults
            .iter()
            .map(|(k, v)| (k.clone(), *v))
            .collect();

        let mut provided: IndexMap<String, NodeId> = IndexMap::new();
        let mut keyword_mode = false;
        for (i, &arg) in args.iter().enumerate() {
            let arg_span = self.ctx.node(arg).meta.span.clone();
            match self.ctx.node(arg).meta.attr_name.clone() {
                Some(name) => {
                    keyword_mode = true;
                    if !attr_list.iter().any(|(a, _)| *a == name) {
                        return Err(TycoError::UnknownAttr {
                            name,
                            src: arg_span.source(),
                            span: arg_span.source_span(),
                        });
                    }
                    if provided.insert(name.clone(), arg).is_some() {
                        return Err(TycoError::Malformatted {
                            detail: format!("attribute '{name}' given twice"),
                            src: arg_span.source(),
                            span: arg_span.source_span(),
                        });
                    }
                }
                None => {
                    if keyword_mode {
                        return Err(TycoError::PositionalAfterKeyword {
                            src: arg_span.source(),
                            span: arg_span.source_span(),
                        });
                    }
                    let Some((attr, _)) = attr_list.get(i) else {
                        return Err(TycoError::Malformatted {
                            detail: format!("too many values for '{type_name}'"),
                            src: arg_span.source(),
                            span: arg_span.source_span(),
                        });
                    };
                    provided.insert(attr.clone(), arg);
                }
            }
        }

        let mut fields = Vec::with_capacity(attr_list.len());
        for (attr, spec) in &attr_list {
            let id = match provided.get(attr) {
                Some(&id) => id,
                None => match defaults.iter().find(|(a, _)| a == attr) {
                    Some((_, d)) => self.ctx.clone_subtree(*d),
                    None => {
                        return Err(TycoError::MissingAttr {
                            name: attr.clone(),
                            type_name: type_name.to_string(),
                            src: span.source(),
                            span: span.source_span(),
                        });
                    }
                },
            };
            self.apply_attr_spec(id, attr, spec)?;
            fields.push((attr.clone(), id));
        }
        let mut meta = Meta::at(span);
        meta.type_name = Some(type_name.to_string());
        Ok(self.ctx.alloc(Node {
            meta,
            kind: NodeKind::Instance(fields),
        }))
    }

    /// Stamp schema information onto a value node. Array schemas push the
    /// element type down onto each child.
    fn apply_attr_spec(&mut self, id: NodeId, attr: &str, spec: &AttrSpec) -> Result<(), TycoError> {
        let node = self.ctx.node_mut(id);
        node.meta.attr_name = Some(attr.to_string());
        node.meta.nullable = spec.nullable;
        node.meta.array = spec.array;
        match &node.kind {
            NodeKind::Primitive { raw, .. } => {
                if spec.array {
                    let is_null_token = spec.nullable
                        && !raw.starts_with('"')
                        && !raw.starts_with('\'')
                        && raw.trim() == "null";
                    if !is_null_token {
                        let span = node.meta.span.clone();
                        return Err(TycoError::ExpectedArray {
                            name: attr.to_string(),
                            src: span.source(),
                            span: span.source_span(),
                        });
                    }
                }
                node.meta.type_name = Some(spec.type_name.clone());
            }
            NodeKind::Array(_) => {
                if !spec.array {
                    let span = node.meta.span.clone();
                    return Err(TycoError::Malformatted {
                        detail: format!("attribute '{attr}' is not an array"),
                        src: span.source(),
                        span: span.source_span(),
                    });
                }
                node.meta.type_name = Some(spec.type_name.clone());
                let children = self.ctx.children(id);
                for child in children {
                    let meta = &mut self.ctx.node_mut(child).meta;
                    meta.type_name = Some(spec.type_name.clone());
                    meta.attr_name = Some(attr.to_string());
                    meta.nullable = false;
                    meta.array = false;
                }
            }
            // Instances and references keep the type they were invoked as.
            NodeKind::Instance(_) | NodeKind::Reference { .. } => {}
        }
        Ok(())
    }

    // === Cursor helpers ===

    fn cur_rest(&self) -> &str {
        self.cur.as_ref().map(|f| f.rest()).unwrap_or("")
    }

    fn cur_peek(&self) -> Option<char> {
        self.cur.as_ref().and_then(|f| f.peek())
    }

    fn at_eol(&self) -> bool {
        self.cur_peek().is_none()
    }

    fn cur_advance(&mut self, n: usize) {
        if let Some(f) = self.cur.as_mut() {
            f.advance(n);
        }
    }

    fn cur_abs(&self) -> usize {
        self.cur
            .as_ref()
            .map(|f| f.abs_offset())
            .unwrap_or_else(|| self.src.text.len())
    }

    fn skip_inline_ws(&mut self) -> Result<(), TycoError> {
        if let Some(f) = self.cur.as_mut() {
            f.trim_leading_ws();
            if f.peek() == Some('#') {
                f.strip_comment()?;
            }
        }
        Ok(())
    }

    fn advance_content_line(&mut self) -> Result<bool, TycoError> {
        match self.fragments.pop_front() {
            Some(mut f) => {
                f.strip_comment()?;
                self.cur = Some(f);
                Ok(true)
            }
            None => {
                self.cur = None;
                Ok(false)
            }
        }
    }

    fn span_from(&self, start: usize) -> Span {
        let src = self
            .cur
            .as_ref()
            .map(|f| Arc::clone(f.src()))
            .unwrap_or_else(|| Arc::clone(&self.src));
        Span {
            src,
            offset: start,
            len: self.cur_abs().saturating_sub(start).max(1),
        }
    }

    fn err_parts(&self, len: usize) -> (NamedSource<String>, SourceSpan) {
        match &self.cur {
            Some(f) => {
                let span = f.span_here(len);
                (span.source(), span.source_span())
            }
            None => (
                self.src.named_source(),
                (self.src.text.len().saturating_sub(1), 0).into(),
            ),
        }
    }
}

// === Row scanners ===

fn skip_ws(s: &str, mut p: usize) -> usize {
    while s[p..].starts_with(' ') || s[p..].starts_with('\t') {
        p += 1;
    }
    p
}

/// `(modifier)? type ('[]')? ws+ dotted-ident ws* (':')?`
///
/// Matches even without the trailing colon so callers can report
/// `MissingColon` precisely.
fn scan_typed_row(s: &str, modifiers: &[char]) -> Option<RowHead> {
    let mut p = 0;
    let modifier = s.chars().next().filter(|c| modifiers.contains(c));
    if modifier.is_some() {
        p += 1;
    }
    let tlen = scan_ident(&s[p..])?;
    let type_name = s[p..p + tlen].to_string();
    p += tlen;
    let array = s[p..].starts_with("[]");
    if array {
        p += 2;
    }
    let ws_end = skip_ws(s, p);
    if ws_end == p {
        return None;
    }
    p = ws_end;
    let alen = scan_dotted_ident(&s[p..])?;
    let attr = s[p..p + alen].to_string();
    p += alen;
    p = skip_ws(s, p);
    let has_colon = s[p..].starts_with(':');
    if has_colon {
        p += 1;
    }
    Some(RowHead {
        modifier,
        type_name,
        array,
        attr,
        len: p,
        has_colon,
    })
}

/// `ident ws* ':'` with nothing else before the colon.
fn scan_struct_header(s: &str) -> Option<(String, usize)> {
    let ilen = scan_ident(s)?;
    let p = skip_ws(s, ilen);
    if !s[p..].starts_with(':') {
        return None;
    }
    Some((s[..ilen].to_string(), p + 1))
}

/// `dotted-ident ws* ':'` — a local default row.
fn scan_default_row(s: &str) -> Option<(String, usize)> {
    let ilen = scan_dotted_ident(s)?;
    let p = skip_ws(s, ilen);
    if !s[p..].starts_with(':') {
        return None;
    }
    Some((s[..ilen].to_string(), p + 1))
}

/// A leading `name:` binds a name to the following value, but only when the
/// colon is genuinely a separator: followed by whitespace, end of line, a
/// quote, `[`, a sign, or an identifier/digit start. This keeps raw tokens
/// like `http://host` and `09:30:00` intact.
fn scan_name_prefix(s: &str) -> Option<(String, usize)> {
    let ilen = scan_dotted_ident(s)?;
    let p = skip_ws(s, ilen);
    if !s[p..].starts_with(':') {
        return None;
    }
    let next = s[p + 1..].chars().next();
    let binds = match next {
        None => true,
        Some(c) => {
            c.is_whitespace()
                || c == '"'
                || c == '\''
                || c == '['
                || c == '-'
                || c == '+'
                || c.is_ascii_digit()
                || is_ident_start(c)
        }
    };
    if !binds {
        return None;
    }
    Some((s[..ilen].to_string(), p + 1))
}
