// Render-pipeline behavior through the public API: base typing, primary
// keys, references, templates and escapes.
use tyco_core::{parse, TycoError, Value};

fn render_ok(source: &str) -> serde_json::Value {
    match parse(source) {
        Ok(value) => serde_json::from_str(&value.to_json().expect("serializes")).expect("json"),
        Err(err) => {
            let report = miette::Report::new(err);
            panic!("{report:?}");
        }
    }
}

fn render_err(source: &str) -> TycoError {
    parse(source).expect_err("expected a render error")
}

#[test]
fn test_seed_scenario_basic_globals() {
    let json = render_ok(
        "str environment: production\nint port: 8080\nbool debug: false\nfloat timeout: 30.5\n",
    );
    assert_eq!(
        json,
        serde_json::json!({
            "environment": "production",
            "port": 8080,
            "debug": false,
            "timeout": 30.5,
        })
    );
}

#[test]
fn test_seed_scenario_numeric_bases() {
    let json = render_ok("int hex: 0xFF\nint oct: 0o777\nint bin: 0b1010\n");
    assert_eq!(json, serde_json::json!({"hex": 255, "oct": 511, "bin": 10}));
}

#[test]
fn test_seed_scenario_nullable_and_array() {
    let json = render_ok("?str maybe: null\nstr[] envs: [dev, staging, prod]\n");
    assert_eq!(
        json,
        serde_json::json!({"maybe": null, "envs": ["dev", "staging", "prod"]})
    );
}

#[test]
fn test_seed_scenario_struct_references() {
    let json = render_ok(
        "Database:\n  *str name:\n  str host:\n  int port: 5432\n  - primary, localhost\n  - replica, replica.example.com, 5433\n\nService:\n  *str name:\n  Database db:\n  - api, Database(primary)\n",
    );
    assert_eq!(
        json,
        serde_json::json!({
            "Database": [
                {"name": "primary", "host": "localhost", "port": 5432},
                {"name": "replica", "host": "replica.example.com", "port": 5433},
            ],
            "Service": [
                {"name": "api", "db": {"name": "primary", "host": "localhost", "port": 5432}},
            ],
        })
    );
}

#[test]
fn test_seed_scenario_template_expansion() {
    let json = render_ok("str host: \"api.example.com\"\nstr url: \"https://{host}/v1\"\n");
    assert_eq!(
        json,
        serde_json::json!({"host": "api.example.com", "url": "https://api.example.com/v1"})
    );
}

#[test]
fn test_seed_scenario_triple_and_literal() {
    let json = render_ok("str block: \"\"\"\nline1\nline2\n\"\"\"\nstr literal: '''no {subst}'''\n");
    assert_eq!(
        json,
        serde_json::json!({"block": "line1\nline2\n", "literal": "no {subst}"})
    );
}

#[test]
fn test_reference_declared_later() {
    let json = render_ok(
        "Service:\n  *str name:\n  Database db:\n  - api, Database(primary)\n\nDatabase:\n  *str name:\n  - primary\n",
    );
    assert_eq!(json["Service"][0]["db"]["name"], "primary");
}

#[test]
fn test_reference_with_named_keys() {
    let json = render_ok(
        "Endpoint:\n  *str service:\n  *int port:\n  - api, 443\n\nRoute:\n  *str path:\n  Endpoint target:\n  - /v1, Endpoint(port: 443, service: api)\n",
    );
    assert_eq!(json["Route"][0]["target"]["port"], 443);
}

#[test]
fn test_unknown_reference() {
    let err = render_err("Database:\n  *str name:\n  - a\n\nDatabase x: Database(b)\n");
    assert!(matches!(err, TycoError::UnknownReference { .. }));
}

#[test]
fn test_reference_to_pk_less_type_fails() {
    // Point has no primary keys, so it cannot be selected by reference;
    // the forward invocation parsed as a reference and cannot resolve.
    let err = render_err(
        "Shape:\n  *str name:\n  Point origin:\n  - dot, Point(1, 2)\n\nPoint:\n  int x:\n  int y:\n",
    );
    assert!(matches!(err, TycoError::UnknownReference { .. }));
}

#[test]
fn test_duplicate_primary_key() {
    let err = render_err("T:\n  *str a:\n  *int b:\n  - x, 1\n  - x, 1\n");
    assert!(matches!(err, TycoError::DuplicatePrimaryKey { .. }));
}

#[test]
fn test_compound_key_disambiguates() {
    let json = render_ok("T:\n  *str a:\n  *int b:\n  - x, 1\n  - x, 2\n");
    assert_eq!(json["T"].as_array().map(Vec::len), Some(2));
}

#[test]
fn test_invalid_number_in_instance() {
    let err = render_err("T:\n  *str name:\n  int n:\n  - a, nope\n");
    assert!(matches!(err, TycoError::InvalidNumber { .. }));
}

#[test]
fn test_invalid_bool_global() {
    let err = render_err("bool b: on\n");
    assert!(matches!(err, TycoError::InvalidBool { .. }));
}

#[test]
fn test_template_reads_through_reference() {
    let json = render_ok(
        "Database:\n  *str name:\n  str host:\n  - primary, db.internal\n\nService:\n  *str name:\n  Database db:\n  str dsn: \"postgres://{db.host}/app\"\n  - api, Database(primary)\n",
    );
    assert_eq!(json["Service"][0]["dsn"], "postgres://db.internal/app");
}

#[test]
fn test_template_global_scope_escape() {
    let json = render_ok(
        "str region: eu-west-1\n\nBucket:\n  *str name:\n  str arn: \"arn:s3:{global.region}:{name}\"\n  - assets\n",
    );
    assert_eq!(json["Bucket"][0]["arn"], "arn:s3:eu-west-1:assets");
}

#[test]
fn test_template_shadowed_global_prefers_local() {
    // `region` exists both as a sibling attribute and as a global; the
    // containment chain wins.
    let json = render_ok(
        "str region: global-value\n\nBucket:\n  *str name:\n  str region: local-value\n  str arn: \"{region}\"\n  - b\n",
    );
    assert_eq!(json["Bucket"][0]["arn"], "local-value");
}

#[test]
fn test_template_dotted_attribute_name() {
    let json = render_ok(
        "Service:\n  *str name:\n  str server.host:\n  str url: \"https://{server.host}\"\n  - api, internal.example.com\n",
    );
    assert_eq!(json["Service"][0]["url"], "https://internal.example.com");
}

#[test]
fn test_template_int_substitution() {
    let json = render_ok("int port: 9090\nstr addr: \"0.0.0.0:{port}\"\n");
    assert_eq!(json["addr"], "0.0.0.0:9090");
}

#[test]
fn test_template_unknown_attr() {
    assert!(matches!(
        render_err("str s: \"{nope}\"\n"),
        TycoError::UnknownAttr { .. }
    ));
}

#[test]
fn test_template_untemplatable_type() {
    assert!(matches!(
        render_err("float f: 1.5\nstr s: \"{f}\"\n"),
        TycoError::UntemplatableType { .. }
    ));
}

#[test]
fn test_template_parent_overflow() {
    assert!(matches!(
        render_err("str a: x\nstr b: \"{...a}\"\n"),
        TycoError::ParentOverflow { .. }
    ));
}

#[test]
fn test_literal_strings_skip_templates_and_escapes() {
    let json = render_ok("str host: h\nstr s: '{host}\\n'\n");
    assert_eq!(json["s"], "{host}\\n");
}

#[test]
fn test_escapes_after_substitution() {
    let json = render_ok("str name: world\nstr s: \"hello\\t{name}\\n\"\n");
    assert_eq!(json["s"], "hello\tworld\n");
}

#[test]
fn test_template_determinism_order_independent() {
    // One pass suffices even when dependents are declared first.
    let json = render_ok(
        "str c: \"{b}!\"\nstr b: \"{a}-mid\"\nstr a: base\n",
    );
    assert_eq!(json["c"], "base-mid!");
}

#[test]
fn test_time_and_datetime_rendering() {
    let json = render_ok("time t: 7:5:3.5\ndatetime d: 2024-03-01 12:00:00Z\n");
    assert_eq!(json["t"], "07:05:03.500000");
    assert_eq!(json["d"], "2024-03-01T12:00:00+00:00");
}

#[test]
fn test_array_of_references() {
    let json = render_ok(
        "Database:\n  *str name:\n  - a\n  - b\n\nCluster:\n  *str name:\n  Database[] members:\n  - main, [Database(a), Database(b)]\n",
    );
    assert_eq!(json["Cluster"][0]["members"][1]["name"], "b");
}
