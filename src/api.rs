use crate::ast::Context;
use crate::error::TycoError;
use crate::parser::Parser;
use crate::resolver::Resolver;
use crate::serialization::{to_value, Value};
use std::fs;
use std::path::{Path, PathBuf};

/// Parses Tyco source text into a rendered configuration tree.
///
/// This is the primary entry point: it builds a fresh [`Context`], drives
/// the parser over the text, runs the render pipeline (parents, base
/// values, primary keys, references, templates) and serializes the result
/// into a plain [`Value`] tree.
///
/// `#include` paths inside the text resolve relative to the current
/// directory; parse from a file with [`parse_file`] to resolve them against
/// the file's own directory.
///
/// # Errors
///
/// Returns a [`TycoError`] if lexing, parsing or rendering fails. No error
/// is recovered from: a partial configuration is worse than a clear
/// failure.
///
/// # Example
///
/// ```rust
/// let value = tyco_core::parse("int port: 8080\n").unwrap();
/// assert_eq!(value.to_json().unwrap(), "{\n  \"port\": 8080\n}");
/// ```
pub fn parse(source: &str) -> Result<Value, TycoError> {
    parse_with_name(source, "source.tyco")
}

/// Like [`parse`], with a source name used in diagnostics.
pub fn parse_with_name(source: &str, source_name: &str) -> Result<Value, TycoError> {
    let base_dir = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    run(source, source_name, base_dir, None)
}

/// Reads and parses a Tyco file. `#include` paths resolve relative to the
/// file's directory, and the file itself seeds the include cache so a
/// self-include is a no-op.
///
/// # Errors
///
/// Returns [`TycoError::FileAccess`] if the file cannot be read, or any
/// parse/render error from its content.
pub fn parse_file(path: impl AsRef<Path>) -> Result<Value, TycoError> {
    let path = path.as_ref();
    let source = fs::read_to_string(path).map_err(|e| TycoError::FileAccess {
        path: path.display().to_string(),
        reason: e.to_string(),
    })?;
    let base_dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    let canonical = fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
    let name = path.to_string_lossy().to_string();
    run(&source, &name, base_dir, Some(canonical))
}

fn run(
    source: &str,
    source_name: &str,
    base_dir: PathBuf,
    cache_seed: Option<PathBuf>,
) -> Result<Value, TycoError> {
    let mut ctx = Context::new();
    if let Some(path) = cache_seed {
        ctx.path_cache.insert(path);
    }
    Parser::new(&mut ctx, source, source_name, base_dir).parse()?;
    Resolver::new(&mut ctx).render()?;
    Ok(to_value(&ctx))
}
