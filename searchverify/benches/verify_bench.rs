//! Benchmarks for query translation and item validation.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use searchverify::item::ResultItem;
use searchverify::predicate::{Operator, Predicate};
use searchverify::query::{parse, translate};
use searchverify::testing::fixtures;
use searchverify::validate::{ValidationPolicy, Validator};

fn predicates() -> Vec<Predicate> {
    [
        Predicate::keyword("renataberoli"),
        Predicate::contains("description", "help wanted"),
        Predicate::new("stars", Operator::GreaterThan, 5000_i64),
        Predicate::new("created", Operator::LessOrEqual, "2021-01-01"),
        Predicate::member_of("license", vec!["mit", "apache-2.0"]),
        Predicate::is("archived", false),
    ]
    .into_iter()
    .filter_map(Result::ok)
    .collect()
}

fn translation_benchmark(c: &mut Criterion) {
    let predicates = predicates();
    c.bench_function("translate", |b| b.iter(|| translate(black_box(&predicates))));

    let query = translate(&predicates).unwrap_or_default();
    c.bench_function("parse", |b| b.iter(|| parse(black_box(&query))));
}

fn validation_benchmark(c: &mut Criterion) {
    let predicates = predicates();
    let items: Vec<ResultItem> = (0..100_u64)
        .filter_map(|i| {
            let repo = fixtures::repo(&format!("repo-{i}"))
                .id(i)
                .stars(5000 + i)
                .description("help wanted here")
                .license("mit")
                .build();
            ResultItem::from_value(repo).ok()
        })
        .collect();

    let validator = Validator::new(ValidationPolicy::default());
    c.bench_function("validate_100_items", |b| {
        b.iter(|| validator.validate(black_box(&items), &predicates))
    });
}

criterion_group!(benches, translation_benchmark, validation_benchmark);
criterion_main!(benches);
