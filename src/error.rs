use miette::{Diagnostic, NamedSource, SourceSpan};
use thiserror::Error;

/// Every way a Tyco parse can fail. Each variant that originates in source
/// text carries the named source and a span so reports point at the
/// offending line.
#[derive(Error, Debug, Diagnostic, Clone)]
pub enum TycoError {
    #[error("Cannot read '{path}': {reason}")]
    #[diagnostic(
        code(tyco::file_access),
        help("Check that the file exists and is readable.")
    )]
    FileAccess { path: String, reason: String },

    #[error("Malformatted input: {detail}")]
    #[diagnostic(code(tyco::malformatted))]
    Malformatted {
        detail: String,
        #[source_code]
        src: NamedSource<String>,
        #[label("here")]
        span: SourceSpan,
    },

    #[error("Invalid character in comment")]
    #[diagnostic(
        code(tyco::invalid_comment),
        help("Comments may not contain control characters.")
    )]
    InvalidComment {
        #[source_code]
        src: NamedSource<String>,
        #[label("this comment")]
        span: SourceSpan,
    },

    #[error("Missing ':' after attribute")]
    #[diagnostic(
        code(tyco::missing_colon),
        help("Schema rows are written `type name:` with a trailing colon.")
    )]
    MissingColon {
        #[source_code]
        src: NamedSource<String>,
        #[label("expected ':' here")]
        span: SourceSpan,
    },

    #[error("Global '{name}' is declared twice")]
    #[diagnostic(code(tyco::duplicate_global))]
    DuplicateGlobal {
        name: String,
        #[source_code]
        src: NamedSource<String>,
        #[label("second declaration")]
        span: SourceSpan,
    },

    #[error("Attribute '{name}' is declared twice in '{type_name}'")]
    #[diagnostic(code(tyco::duplicate_attr))]
    DuplicateAttr {
        name: String,
        type_name: String,
        #[source_code]
        src: NamedSource<String>,
        #[label("second declaration")]
        span: SourceSpan,
    },

    #[error("Schema row after the first instance of '{type_name}'")]
    #[diagnostic(
        code(tyco::schema_after_init),
        help("All attributes of a struct must be declared before its first instance row.")
    )]
    SchemaAfterInit {
        type_name: String,
        #[source_code]
        src: NamedSource<String>,
        #[label("schema row here")]
        span: SourceSpan,
    },

    #[error("Primary key '{name}' may not be an array")]
    #[diagnostic(code(tyco::primary_key_on_array))]
    PrimaryKeyOnArray {
        name: String,
        #[source_code]
        src: NamedSource<String>,
        #[label("'*' and '[]' conflict")]
        span: SourceSpan,
    },

    #[error("Unknown attribute '{name}'")]
    #[diagnostic(code(tyco::unknown_attr))]
    UnknownAttr {
        name: String,
        #[source_code]
        src: NamedSource<String>,
        #[label("not a declared attribute")]
        span: SourceSpan,
    },

    #[error("No instance of '{type_name}' matches the given keys")]
    #[diagnostic(
        code(tyco::unknown_reference),
        help("References select instances by their primary key values.")
    )]
    UnknownReference {
        type_name: String,
        #[source_code]
        src: NamedSource<String>,
        #[label("unresolved reference")]
        span: SourceSpan,
    },

    #[error("Two instances of '{type_name}' share the same primary key")]
    #[diagnostic(code(tyco::duplicate_primary_key))]
    DuplicatePrimaryKey {
        type_name: String,
        #[source_code]
        src: NamedSource<String>,
        #[label("duplicate instance")]
        span: SourceSpan,
    },

    #[error("Missing attribute '{name}' for '{type_name}'")]
    #[diagnostic(
        code(tyco::missing_attr),
        help("Provide a value in the instance row or declare a default.")
    )]
    MissingAttr {
        name: String,
        type_name: String,
        #[source_code]
        src: NamedSource<String>,
        #[label("instance declared here")]
        span: SourceSpan,
    },

    #[error("Positional argument after a named argument")]
    #[diagnostic(code(tyco::positional_after_keyword))]
    PositionalAfterKeyword {
        #[source_code]
        src: NamedSource<String>,
        #[label("this argument needs a name")]
        span: SourceSpan,
    },

    #[error("Expected an array for attribute '{name}'")]
    #[diagnostic(code(tyco::expected_array))]
    ExpectedArray {
        name: String,
        #[source_code]
        src: NamedSource<String>,
        #[label("not an array")]
        span: SourceSpan,
    },

    #[error("Stray ':' in value position")]
    #[diagnostic(
        code(tyco::stray_colon),
        help("Named arguments are only allowed in instance rows and invocations.")
    )]
    StrayColon {
        #[source_code]
        src: NamedSource<String>,
        #[label("here")]
        span: SourceSpan,
    },

    #[error("Unexpected delimiter '{found}'")]
    #[diagnostic(code(tyco::bad_delimiter))]
    BadDelimiter {
        found: char,
        #[source_code]
        src: NamedSource<String>,
        #[label("not valid here")]
        span: SourceSpan,
    },

    #[error("Unclosed string")]
    #[diagnostic(code(tyco::unclosed_string))]
    UnclosedString {
        #[source_code]
        src: NamedSource<String>,
        #[label("string opened here")]
        span: SourceSpan,
    },

    #[error("Invalid bool '{content}'")]
    #[diagnostic(
        code(tyco::invalid_bool),
        help("Booleans are exactly `true` or `false`.")
    )]
    InvalidBool {
        content: String,
        #[source_code]
        src: NamedSource<String>,
        #[label("here")]
        span: SourceSpan,
    },

    #[error("Invalid number '{content}'")]
    #[diagnostic(code(tyco::invalid_number))]
    InvalidNumber {
        content: String,
        #[source_code]
        src: NamedSource<String>,
        #[label("here")]
        span: SourceSpan,
    },

    #[error("Value rendered twice")]
    #[diagnostic(code(tyco::double_render))]
    DoubleRender {
        #[source_code]
        src: NamedSource<String>,
        #[label("here")]
        span: SourceSpan,
    },

    #[error("Template reads through an unresolved reference")]
    #[diagnostic(code(tyco::unresolved_reference_in_template))]
    UnresolvedReferenceInTemplate {
        #[source_code]
        src: NamedSource<String>,
        #[label("template here")]
        span: SourceSpan,
    },

    #[error("Template path '{path}' walks past the outermost scope")]
    #[diagnostic(code(tyco::parent_overflow))]
    ParentOverflow {
        path: String,
        #[source_code]
        src: NamedSource<String>,
        #[label("too many leading dots")]
        span: SourceSpan,
    },

    #[error("Template target '{path}' is not a str or int")]
    #[diagnostic(code(tyco::untemplatable_type))]
    UntemplatableType {
        path: String,
        #[source_code]
        src: NamedSource<String>,
        #[label("template here")]
        span: SourceSpan,
    },
}
