// One test per parse-time failure kind, driven through the public API.
use tyco_core::{parse, TycoError};

fn parse_err(source: &str) -> TycoError {
    parse(source).expect_err("expected a parse error")
}

#[test]
fn test_malformatted_top_level() {
    assert!(matches!(
        parse_err("!!! not tyco\n"),
        TycoError::Malformatted { .. }
    ));
}

#[test]
fn test_malformatted_indented_top_level() {
    assert!(matches!(
        parse_err("  int a: 1\n"),
        TycoError::Malformatted { .. }
    ));
}

#[test]
fn test_malformatted_global_without_value() {
    assert!(matches!(parse_err("int a:\n"), TycoError::Malformatted { .. }));
}

#[test]
fn test_invalid_comment_control_char() {
    assert!(matches!(
        parse_err("int a: 1 # bad\x01comment\n"),
        TycoError::InvalidComment { .. }
    ));
}

#[test]
fn test_missing_colon() {
    assert!(matches!(
        parse_err("T:\n  str host\n"),
        TycoError::MissingColon { .. }
    ));
}

#[test]
fn test_duplicate_global() {
    let err = parse_err("int a: 1\nint a: 2\n");
    assert!(matches!(err, TycoError::DuplicateGlobal { name, .. } if name == "a"));
}

#[test]
fn test_duplicate_attr() {
    let err = parse_err("T:\n  str x:\n  int x:\n");
    assert!(matches!(err, TycoError::DuplicateAttr { name, .. } if name == "x"));
}

#[test]
fn test_schema_after_init() {
    assert!(matches!(
        parse_err("T:\n  *str name:\n  - a\n  str late:\n"),
        TycoError::SchemaAfterInit { .. }
    ));
}

#[test]
fn test_primary_key_on_array() {
    assert!(matches!(
        parse_err("T:\n  *int[] ids:\n"),
        TycoError::PrimaryKeyOnArray { .. }
    ));
}

#[test]
fn test_unknown_attr_in_default_row() {
    let err = parse_err("T:\n  str x:\n  y: 1\n");
    assert!(matches!(err, TycoError::UnknownAttr { name, .. } if name == "y"));
}

#[test]
fn test_unknown_attr_in_named_arg() {
    let err = parse_err("T:\n  *str name:\n  - nope: 1\n");
    assert!(matches!(err, TycoError::UnknownAttr { name, .. } if name == "nope"));
}

#[test]
fn test_missing_attr() {
    let err = parse_err("T:\n  *str name:\n  int n:\n  - a\n");
    assert!(matches!(err, TycoError::MissingAttr { name, .. } if name == "n"));
}

#[test]
fn test_positional_after_keyword() {
    assert!(matches!(
        parse_err("T:\n  *str a:\n  str b:\n  - a: x, y\n"),
        TycoError::PositionalAfterKeyword { .. }
    ));
}

#[test]
fn test_expected_array() {
    assert!(matches!(
        parse_err("str[] xs: scalar\n"),
        TycoError::ExpectedArray { .. }
    ));
}

#[test]
fn test_expected_array_null_without_nullable() {
    assert!(matches!(
        parse_err("str[] xs: null\n"),
        TycoError::ExpectedArray { .. }
    ));
}

#[test]
fn test_stray_colon() {
    assert!(matches!(
        parse_err("str[] xs: [a: 1]\n"),
        TycoError::StrayColon { .. }
    ));
}

#[test]
fn test_bad_delimiter_paren_in_array() {
    let err = parse_err("str[] xs: [a, b)\n");
    assert!(matches!(err, TycoError::BadDelimiter { found: ')', .. }));
}

#[test]
fn test_bad_delimiter_bracket_in_invocation() {
    let err = parse_err("T:\n  int x:\n\nU:\n  *str name:\n  T t:\n  - u, T(1]\n");
    assert!(matches!(err, TycoError::BadDelimiter { found: ']', .. }));
}

#[test]
fn test_unclosed_single_line_string() {
    assert!(matches!(
        parse_err("str s: \"open\n"),
        TycoError::UnclosedString { .. }
    ));
}

#[test]
fn test_unclosed_triple_string() {
    assert!(matches!(
        parse_err("str s: \"\"\"open\nstill open\n"),
        TycoError::UnclosedString { .. }
    ));
}

#[test]
fn test_error_carries_location() {
    // Errors are miette diagnostics; the failing row is addressable.
    let err = parse_err("int ok: 1\nint ok: 2\n");
    let report = miette::Report::new(err);
    let rendered = format!("{report:?}");
    assert!(rendered.contains("ok"));
}
