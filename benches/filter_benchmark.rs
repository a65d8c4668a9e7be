//! Load and filter benchmarks for varsift

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use varsift::{
    apply_filters, FilterCategory, FilterConfig, QueryCompiler, TabularStore, VarSiftConfig,
    VariantType,
};

const TYPES: [&str; 6] = ["Stop", "Synonymous", "Non-synonymous", "DIV-fs", "NC", "3'UTR"];
const GENES: [&str; 5] = ["BRCA1", "TP53", "EGFR", "KRAS", "PTEN"];
const CALLS: [&str; 4] = ["AG", "AA", "GG", "NA"];

fn generate_table(rows: usize, pairs: usize) -> String {
    let mut out = String::from("Index\tChr\trefseq\ttype\tref_allele\tvar_allele\tRS#\tLeftFlank");
    for p in 0..pairs {
        for role in ["aff", "norm"] {
            out.push_str(&format!("\tNA{p:03}-{role}\tNA{p:03}-{role}.q\tNA{p:03}-{role}.d"));
        }
    }
    out.push('\n');

    for i in 0..rows {
        out.push_str(&format!(
            "v{}\tchr{}\t{}\t{}\tA\tG\t{}\t{}",
            i,
            (i % 22) + 1,
            GENES[i % GENES.len()],
            TYPES[i % TYPES.len()],
            if i % 3 == 0 { "-".to_string() } else { format!("rs{}", i) },
            i * 100
        ));
        for s in 0..pairs * 2 {
            out.push_str(&format!(
                "\t{}\t50\t{}",
                CALLS[(i + s) % CALLS.len()],
                (i * 7 + s) % 40
            ));
        }
        out.push('\n');
    }
    out
}

fn load_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("load");
    let config = VarSiftConfig::default();

    let text = generate_table(10_000, 4);
    group.throughput(Throughput::Bytes(text.len() as u64));
    group.bench_function("10k_rows_8_samples", |b| {
        b.iter(|| TabularStore::parse(black_box(&text), &config).unwrap())
    });

    group.finish();
}

fn filter_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("filter");
    let store = TabularStore::parse(&generate_table(10_000, 4), &VarSiftConfig::default()).unwrap();
    group.throughput(Throughput::Elements(store.row_count() as u64));

    let types = FilterConfig::new()
        .with_type(VariantType::Stop)
        .with_type(VariantType::Utr);
    group.bench_function("variant_types", |b| {
        b.iter(|| apply_filters(&store, black_box(&types)).unwrap())
    });

    let mut discordance = FilterConfig::new().with_category(FilterCategory::AffectedNormal);
    discordance.min_discordant_pairs = 2;
    group.bench_function("affected_normal", |b| {
        b.iter(|| apply_filters(&store, black_box(&discordance)).unwrap())
    });

    let mut pattern = FilterConfig::new();
    pattern.gene_pattern = Some("^(brca1|kras)$".to_string());
    group.bench_function("gene_pattern", |b| {
        b.iter(|| apply_filters(&store, black_box(&pattern)).unwrap())
    });

    group.finish();
}

fn query_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("query");
    let store = TabularStore::parse(&generate_table(10_000, 1), &VarSiftConfig::default()).unwrap();
    let text = r#"(Chr == "chr1" || Chr == "chr2") && LeftFlank > 5000 && refseq =~ "^B""#;

    group.bench_function("compile", |b| {
        b.iter(|| QueryCompiler::new(store.catalog()).compile(black_box(text)).unwrap())
    });

    let query = QueryCompiler::new(store.catalog()).compile(text).unwrap();
    group.throughput(Throughput::Elements(store.row_count() as u64));
    group.bench_function("run_10k", |b| b.iter(|| query.run(black_box(&store))));

    group.finish();
}

criterion_group!(benches, load_benchmark, filter_benchmark, query_benchmark);
criterion_main!(benches);
