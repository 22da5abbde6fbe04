//! # Tyco Lexical Layer
//!
//! Tyco is line-oriented: indentation opens struct blocks, a row is one
//! declaration, and only quoted strings may spill across lines. This module
//! therefore does not produce a token stream. It turns source text into a
//! queue of [`Fragment`]s (one per logical line) that the
//! [`Parser`](crate::parser::Parser) consumes in order, plus the low-level
//! scanning helpers the parser shares:
//!
//! - CRLF normalization and fragmentation ([`coerce_content_to_fragments`])
//! - quote-aware comment detection ([`Fragment::strip_comment`]) — a `#`
//!   inside `"…"`, `'…'`, `"""…"""` or `'''…'''` is content, not a comment
//! - identifier scanning ([`scan_ident`], [`scan_dotted_ident`])
//!
//! Every fragment keeps its 1-based row, a character column cursor, and its
//! absolute byte offset into the normalized source, so any point of the
//! parse can be turned into a [`Span`] for diagnostics.
//!
//! ## Example
//!
//! ```rust
//! use tyco_core::lexer::coerce_content_to_fragments;
//!
//! let (_, mut frags) = coerce_content_to_fragments("int a: 1\nint b: 2\n", "demo.tyco");
//! let first = frags.pop_front().unwrap();
//! assert_eq!(first.rest(), "int a: 1");
//! assert_eq!(first.row(), 1);
//! ```

use crate::error::TycoError;
use miette::{NamedSource, SourceSpan};
use std::collections::VecDeque;
use std::sync::Arc;

/// One parsed input, shared by every fragment and span cut from it.
/// `text` is the CRLF-normalized content, so byte offsets into it agree
/// with what diagnostics display.
#[derive(Debug)]
pub struct SourceFile {
    pub name: String,
    pub text: String,
}

impl SourceFile {
    pub fn named_source(&self) -> NamedSource<String> {
        NamedSource::new(self.name.clone(), self.text.clone())
    }
}

/// A byte range in a [`SourceFile`]. Attached to every value node so
/// render-phase errors report against the original text exactly like
/// parse-phase errors do.
#[derive(Debug, Clone)]
pub struct Span {
    pub src: Arc<SourceFile>,
    pub offset: usize,
    pub len: usize,
}

impl Span {
    pub fn source(&self) -> NamedSource<String> {
        self.src.named_source()
    }

    pub fn source_span(&self) -> SourceSpan {
        (self.offset, self.len).into()
    }
}

/// A substring view of one logical line.
///
/// The trailing newline is not stored; end-of-fragment *is* the
/// end-of-line event. `has_newline` records whether the source line was
/// newline-terminated, which multi-line string accumulation needs to
/// reinsert `\n` at fragment boundaries.
#[derive(Debug, Clone)]
pub struct Fragment {
    src: Arc<SourceFile>,
    line: String,
    pos: usize,
    offset: usize,
    row: usize,
    column: usize,
    has_newline: bool,
}

impl Fragment {
    /// The unconsumed remainder of the line.
    pub fn rest(&self) -> &str {
        &self.line[self.pos..]
    }

    pub fn row(&self) -> usize {
        self.row
    }

    pub fn column(&self) -> usize {
        self.column
    }

    pub fn has_newline(&self) -> bool {
        self.has_newline
    }

    pub fn src(&self) -> &Arc<SourceFile> {
        &self.src
    }

    /// Absolute byte offset of the cursor in the source.
    pub fn abs_offset(&self) -> usize {
        self.offset + self.pos
    }

    pub fn is_exhausted(&self) -> bool {
        self.pos >= self.line.len()
    }

    pub fn is_blank(&self) -> bool {
        self.rest().trim().is_empty()
    }

    /// Whether the line opens with indentation (significant in Tyco:
    /// indented rows belong to the innermost struct block).
    pub fn is_indented(&self) -> bool {
        self.line.starts_with(' ') || self.line.starts_with('\t')
    }

    pub fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    /// Step the cursor over the next character, if any.
    pub fn bump(&mut self) {
        if let Some(c) = self.peek() {
            self.pos += c.len_utf8();
            self.column += 1;
        }
    }

    /// Advance the cursor over `n` bytes (must land on a char boundary).
    pub fn advance(&mut self, n: usize) {
        let taken = &self.line[self.pos..self.pos + n];
        self.column += taken.chars().count();
        self.pos += n;
    }

    /// Consume spaces and tabs.
    pub fn trim_leading_ws(&mut self) {
        while matches!(self.peek(), Some(' ') | Some('\t')) {
            self.bump();
        }
    }

    /// Span covering `len` bytes from the cursor.
    pub fn span_here(&self, len: usize) -> Span {
        Span {
            src: Arc::clone(&self.src),
            offset: self.abs_offset(),
            len: len.min(self.line.len().saturating_sub(self.pos)).max(1),
        }
    }

    /// Span covering an absolute byte range established earlier.
    pub fn span_from(&self, start: usize) -> Span {
        Span {
            src: Arc::clone(&self.src),
            offset: start,
            len: self.abs_offset().saturating_sub(start).max(1),
        }
    }

    /// Cut the comment off this line, if any, validating the comment body.
    ///
    /// Detection is a small state machine over the unconsumed remainder:
    /// `#` starts a comment only outside of string context. `"` and `'`
    /// open single-line strings (backslash escapes one char inside `"`,
    /// nothing escapes inside `'`); `"""` and `'''` open triple strings
    /// that swallow the rest of the line when left unclosed. The comment
    /// body may not contain control characters (TAB excepted).
    pub fn strip_comment(&mut self) -> Result<(), TycoError> {
        let rest = self.rest();
        let Some(cut) = comment_start(rest) else {
            return Ok(());
        };
        let comment = &rest[cut..];
        for (i, c) in comment.char_indices() {
            if is_forbidden_ctrl(c) {
                return Err(TycoError::InvalidComment {
                    src: self.src.named_source(),
                    span: (self.abs_offset() + cut + i, 1).into(),
                });
            }
        }
        self.line.truncate(self.pos + cut);
        Ok(())
    }
}

/// Control characters never valid in comments (and single-line strings):
/// ASCII 0–31 and 127, TAB excepted.
pub fn is_forbidden_ctrl(c: char) -> bool {
    (c.is_ascii_control() && c != '\t') || c == '\x7f'
}

fn comment_start(rest: &str) -> Option<usize> {
    #[derive(PartialEq)]
    enum State {
        Normal,
        Single(char),
        Triple(char),
    }
    let bytes = rest.as_bytes();
    let mut state = State::Normal;
    let mut i = 0;
    while i < bytes.len() {
        let b = bytes[i];
        match state {
            State::Normal => match b {
                b'#' => return Some(i),
                b'"' | b'\'' => {
                    let q = b as char;
                    if rest[i..].starts_with([q, q, q].iter().collect::<String>().as_str()) {
                        state = State::Triple(q);
                        i += 3;
                        continue;
                    }
                    state = State::Single(q);
                }
                _ => {}
            },
            State::Single(q) => {
                if q == '"' && b == b'\\' {
                    i += 2;
                    continue;
                }
                if b == q as u8 {
                    state = State::Normal;
                }
            }
            State::Triple(q) => {
                let close: String = [q, q, q].iter().collect();
                match rest[i..].find(close.as_str()) {
                    Some(at) => {
                        i += at + 3;
                        state = State::Normal;
                        continue;
                    }
                    // The string continues on later lines; nothing on this
                    // one can be a comment.
                    None => return None,
                }
            }
        }
        i += 1;
    }
    None
}

/// Normalize CRLF to LF and split the input into one fragment per line.
/// Empty input yields no fragments.
pub fn coerce_content_to_fragments(
    text: &str,
    source_name: &str,
) -> (Arc<SourceFile>, VecDeque<Fragment>) {
    let normalized = text.replace("\r\n", "\n");
    let src = Arc::new(SourceFile {
        name: source_name.to_string(),
        text: normalized,
    });
    let mut fragments = VecDeque::new();
    let mut offset = 0;
    for (i, piece) in src.text.split_inclusive('\n').enumerate() {
        let has_newline = piece.ends_with('\n');
        let line = if has_newline {
            &piece[..piece.len() - 1]
        } else {
            piece
        };
        fragments.push_back(Fragment {
            src: Arc::clone(&src),
            line: line.to_string(),
            pos: 0,
            offset,
            row: i + 1,
            column: 1,
            has_newline,
        });
        offset += piece.len();
    }
    (src, fragments)
}

pub fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

pub fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// Scan a plain identifier at the start of `s`; returns its byte length.
pub fn scan_ident(s: &str) -> Option<usize> {
    let mut chars = s.char_indices();
    let (_, first) = chars.next()?;
    if !is_ident_start(first) {
        return None;
    }
    for (i, c) in chars {
        if !is_ident_char(c) {
            return Some(i);
        }
    }
    Some(s.len())
}

/// Scan a dotted identifier (`server.host`). Attribute names may contain
/// dots; a trailing dot is not consumed.
pub fn scan_dotted_ident(s: &str) -> Option<usize> {
    let mut len = scan_ident(s)?;
    while s[len..].starts_with('.') {
        match scan_ident(&s[len + 1..]) {
            Some(more) => len += 1 + more,
            None => break,
        }
    }
    Some(len)
}
