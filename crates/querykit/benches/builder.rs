use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use querykit::{Builder, Operator, WhereClause, number_placeholders};

/// SELECT col0, ... FROM t WHERE 1=1 AND ("t"."col0" = ? AND ...)
fn build_select(n: usize) -> querykit::Statement {
    let mut b = Builder::new();
    b.table("t");
    for i in 0..n {
        b.and_where(&format!("col{i}"), Operator::Equal, i as i64);
    }
    let cols: Vec<String> = (0..n).map(|i| format!("col{i}")).collect();
    b.select(cols).expect("valid select")
}

fn bench_flat_select(c: &mut Criterion) {
    let mut group = c.benchmark_group("builder/flat_select");

    for n in [1, 5, 10, 50, 100] {
        group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, &n| {
            b.iter(|| black_box(build_select(n)));
        });
    }

    group.finish();
}

fn bench_nested_groups(c: &mut Criterion) {
    let mut group = c.benchmark_group("builder/nested_groups");

    for depth in [1, 4, 16] {
        group.bench_with_input(BenchmarkId::from_parameter(depth), &depth, |b, &depth| {
            b.iter(|| {
                let mut builder = Builder::new();
                builder.table("t");
                nest(&mut builder, depth);
                black_box(builder.select(["id"]).expect("valid select"));
            });
        });
    }

    group.finish();
}

fn nest<W: WhereClause>(w: &mut W, depth: usize) {
    w.and_where("a", Operator::Equal, depth as i64);
    if depth > 0 {
        w.or_group(|g| nest(g, depth - 1));
    }
}

fn bench_in_list(c: &mut Criterion) {
    let mut group = c.benchmark_group("builder/in_list");

    for n in [5, 20, 100, 500] {
        let values: Vec<i64> = (0..n).collect();
        group.bench_with_input(BenchmarkId::from_parameter(n), &values, |b, values| {
            b.iter(|| {
                let mut builder = Builder::new();
                builder
                    .table("t")
                    .and_where("id", Operator::In, values.clone());
                black_box(builder.delete().expect("valid delete"));
            });
        });
    }

    group.finish();
}

fn bench_number_placeholders(c: &mut Criterion) {
    let mut group = c.benchmark_group("builder/number_placeholders");

    for n in [1, 10, 100] {
        let stmt = build_select(n);
        group.bench_with_input(BenchmarkId::from_parameter(n), &stmt.sql, |b, sql| {
            b.iter(|| black_box(number_placeholders(sql)));
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_flat_select,
    bench_nested_groups,
    bench_in_list,
    bench_number_placeholders
);
criterion_main!(benches);
