//! Benchmarks for ordermatch matching performance.
//!
//! Run with: cargo bench
//!
//! These benchmarks cover normalization, catalog classification, single
//! comments on each catalog shape, batch matching and the price optimizer.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use ordermatch::{Catalog, OrderMatcher, Product};

fn single_catalog() -> Catalog {
    Catalog::new(vec![Product::new(1, "대추방울토마토 2kg").with_base_price(15000.0)]).unwrap()
}

fn box_catalog() -> Catalog {
    Catalog::new(vec![
        Product::new(1, "복숭아 반박스").with_base_price(12900.0),
        Product::new(2, "복숭아 1박스").with_base_price(23900.0),
    ])
    .unwrap()
}

/// Creates a mixed catalog with the given number of products.
fn mixed_catalog(size: usize) -> Catalog {
    const NAMES: &[&str] = &[
        "사과", "배", "단감", "쪽파", "양파", "감자", "고구마", "당근", "오이", "파프리카",
        "새송이버섯", "느타리버섯", "대파", "애호박", "가지", "브로콜리",
    ];
    let products = (0..size)
        .map(|i| {
            let name = NAMES[i % NAMES.len()];
            let title = if i < NAMES.len() {
                format!("{} 1봉", name)
            } else {
                format!("{} {}봉", name, i / NAMES.len() + 1)
            };
            Product::new(i as u32 + 1, title).with_base_price(3000.0 + 500.0 * i as f64)
        })
        .collect();
    Catalog::new(products).unwrap()
}

fn tiered_catalog() -> Catalog {
    Catalog::new(vec![Product::new(1, "계란 한판")
        .with_tier(1, 7000.0)
        .with_tier(3, 19000.0)
        .with_tier(5, 30000.0)
        .with_tier(10, 55000.0)])
    .unwrap()
}

/// Benchmark the normalizer.
fn bench_normalize(c: &mut Criterion) {
    let inputs = [
        "2개요",
        "<b>@홍길동</b> 사과 두개 배 세봉지 부탁드려요~~ ㅋㅋㅋ",
        "이영옥7219 상무점 단감 Ⅰ박스, 반박스 하나요!!",
    ];

    c.bench_function("normalize", |b| {
        b.iter(|| {
            for input in &inputs {
                black_box(ordermatch::normalize(black_box(input)));
            }
        });
    });
}

/// Benchmark catalog classification at various sizes.
fn bench_classify(c: &mut Criterion) {
    let mut group = c.benchmark_group("classify");

    for size in [2, 10, 50].iter() {
        let catalog = mixed_catalog(*size);
        group.bench_with_input(BenchmarkId::new("products", size), &catalog, |b, catalog| {
            b.iter(|| ordermatch::classify(black_box(catalog)));
        });
    }

    group.finish();
}

/// Benchmark single comments against each catalog shape.
fn bench_match_comment(c: &mut Criterion) {
    let mut group = c.benchmark_group("match_comment");
    let matcher = OrderMatcher::new();

    let cases = [
        ("single_number", single_catalog(), "3개요"),
        ("box", box_catalog(), "2박스 주세요"),
        ("multi_item", mixed_catalog(10), "사과2 단감3 오이 4개"),
        ("similarity", mixed_catalog(16), "새송이 두개요"),
        ("greeting", mixed_catalog(10), "안녕하세요 잘 받았습니다"),
    ];

    for (name, catalog, comment) in &cases {
        group.bench_function(*name, |b| {
            b.iter(|| matcher.match_comment(black_box(comment), catalog));
        });
    }

    group.finish();
}

/// Benchmark parallel batch matching at various batch sizes.
fn bench_match_batch(c: &mut Criterion) {
    let mut group = c.benchmark_group("match_batch");
    let matcher = OrderMatcher::new();
    let catalog = mixed_catalog(10);
    let pool = ["사과2", "배 3개요", "단감3 쪽파1", "양파 한봉", "감사합니다", "2번 3개"];

    for size in [10, 100, 1000].iter() {
        let comments: Vec<&str> = pool.iter().cycle().take(*size).copied().collect();

        group.throughput(Throughput::Elements(*size as u64));
        group.bench_with_input(BenchmarkId::new("comments", size), &comments, |b, comments| {
            b.iter(|| matcher.match_batch(black_box(comments), &catalog));
        });
    }

    group.finish();
}

/// Benchmark the tier optimizer.
fn bench_price_optimizer(c: &mut Criterion) {
    let mut group = c.benchmark_group("price_optimizer");
    let catalog = tiered_catalog();

    for quantity in [7u32, 99, 999].iter() {
        group.bench_with_input(BenchmarkId::new("quantity", quantity), quantity, |b, &q| {
            b.iter(|| ordermatch::best_option(black_box(q), &catalog, None));
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_normalize,
    bench_classify,
    bench_match_comment,
    bench_match_batch,
    bench_price_optimizer,
);
criterion_main!(benches);
