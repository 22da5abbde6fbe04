use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use tyco_core::lexer::coerce_content_to_fragments;
use tyco_core::parse;

// ============================================================================
// Test Data: Varying Complexity and Size
// ============================================================================

const TINY_TYCO: &str = "int value: 42\n";

const SMALL_TYCO: &str = "str name: test\nfloat version: 1.0\nbool enabled: true\nstr[] tags: [a, b, c]\n";

const MEDIUM_TYCO: &str = r#"str region: us-east-1
int base_port: 8000

Database:
  *str name:
  str host:
  int port: 5432
  bool ssl: false
  - primary, db1.internal
  - replica, db2.internal, 5433, true

Service:
  *str name:
  Database db:
  str endpoint: "https://{name}.{global.region}.example.com"
  - api, Database(primary)
  - worker, Database(replica)
"#;

const LARGE_TYCO: &str = r#"str environment: production
str region: eu-central-1
int timeout_seconds: 30
str[] features: [auth, rate_limiting, compression, metrics]

User:
  *int id:
  str name:
  str email:
  str[] roles: []
  - 1, Admin, admin@example.com, [admin, superuser]
  - 2, Alice, alice@example.com, [developer, reviewer]
  - 3, Bob, bob@example.com, [developer]
  - 4, Charlie, charlie@example.com, [viewer]
  - 5, David, david@example.com, [developer, ops]

Resource:
  *str path:
  str[] permissions:
  - /api/users, [read, write]
  - /api/admin, [admin]
  - /api/metrics, [read]
  - /api/config, [read, write, admin]

Grant:
  *int user:
  *str resource:
  User who:
  Resource what:
  - 1, /api/admin, User(1), Resource(/api/admin)
  - 2, /api/users, User(2), Resource(/api/users)
  - 3, /api/metrics, User(3), Resource(/api/metrics)
"#;

// Generate very large Tyco input for stress testing
fn generate_xlarge_tyco(rows: usize) -> String {
    let mut tyco = String::from("Item:\n  *int id:\n  str name:\n  int value:\n  bool active:\n");
    for i in 0..rows {
        tyco.push_str(&format!(
            "  - {}, \"Item {}\", {}, {}\n",
            i,
            i,
            i * 100,
            i % 2 == 0
        ));
    }
    tyco
}

// ============================================================================
// Fragmentation Benchmarks
// ============================================================================

fn bench_fragments_sizes(c: &mut Criterion) {
    let mut group = c.benchmark_group("fragments_by_size");

    for (name, source) in [
        ("tiny", TINY_TYCO),
        ("small", SMALL_TYCO),
        ("medium", MEDIUM_TYCO),
        ("large", LARGE_TYCO),
    ] {
        group.throughput(Throughput::Bytes(source.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(name), source, |b, src| {
            b.iter(|| coerce_content_to_fragments(black_box(src), "benchmark.tyco"))
        });
    }

    group.finish();
}

// ============================================================================
// End-to-End Parse Benchmarks
// ============================================================================

fn bench_parse_sizes(c: &mut Criterion) {
    let mut group = c.benchmark_group("parse_by_size");

    for (name, source) in [
        ("tiny", TINY_TYCO),
        ("small", SMALL_TYCO),
        ("medium", MEDIUM_TYCO),
        ("large", LARGE_TYCO),
    ] {
        group.throughput(Throughput::Bytes(source.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(name), source, |b, src| {
            b.iter(|| parse(black_box(src)))
        });
    }

    group.finish();
}

fn bench_parse_scaling(c: &mut Criterion) {
    let mut group = c.benchmark_group("parse_row_scaling");

    for rows in [10, 50, 100, 500, 1000] {
        let source = generate_xlarge_tyco(rows);
        group.throughput(Throughput::Elements(rows as u64));
        group.bench_with_input(BenchmarkId::from_parameter(rows), &source, |b, src| {
            b.iter(|| parse(black_box(src)))
        });
    }

    group.finish();
}

fn bench_parse_with_serialization(c: &mut Criterion) {
    let mut group = c.benchmark_group("parse_with_json_serialization");

    for (name, source) in [
        ("medium", MEDIUM_TYCO),
        ("large", LARGE_TYCO),
    ] {
        group.throughput(Throughput::Bytes(source.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(name), source, |b, src| {
            b.iter(|| {
                let value = parse(black_box(src)).unwrap();
                value.to_json()
            })
        });
    }

    group.finish();
}

// ============================================================================
// Real-World Scenario Benchmarks
// ============================================================================

fn bench_realistic_config(c: &mut Criterion) {
    // Simulates a realistic application configuration file
    let config = r#"str app: checkout
int workers: 8
bool debug: false

LogSink:
  *str name:
  str level: info
  str format: json
  - stdout
  - audit, warn

Database:
  *str role:
  str host:
  int port: 5432
  int pool_size: 10
  - primary, pg1.internal
  - replica, pg2.internal, 5432, 20

Cache:
  *str name:
  str url: "redis://{name}.cache.internal:6379"
  int ttl_seconds: 3600
  - sessions
  - fragments, 600

Endpoint:
  *str path:
  Database db:
  Cache cache:
  - /cart, Database(primary), Cache(sessions)
  - /catalog, Database(replica), Cache(fragments)
"#;

    c.bench_function("realistic_app_config", |b| {
        b.iter(|| parse(black_box(config)))
    });
}

fn bench_template_heavy(c: &mut Criterion) {
    // Template chains exercise the parent walk and escape pass
    let config = r#"str scheme: https
str domain: example.com
str base: "{scheme}://{domain}"
str api: "{base}/api"
str v1: "{api}/v1"
str v2: "{api}/v2"

Route:
  *str name:
  str url: "{global.v2}/{name}"
  - users
  - orders
  - payments
  - refunds
"#;

    c.bench_function("template_heavy_config", |b| {
        b.iter(|| parse(black_box(config)))
    });
}

// ============================================================================
// Criterion Configuration
// ============================================================================

criterion_group!(fragment_benches, bench_fragments_sizes);

criterion_group!(
    parse_benches,
    bench_parse_sizes,
    bench_parse_scaling,
    bench_parse_with_serialization
);

criterion_group!(realistic_benches, bench_realistic_config, bench_template_heavy);

criterion_main!(fragment_benches, parse_benches, realistic_benches);
