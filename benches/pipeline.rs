use std::sync::Arc;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, SamplingMode, Throughput};
use polars::prelude::*;
use rand::{rngs::StdRng, Rng, SeedableRng};

use framequery::engine::{Engine, LazyEngine, LocalEngine};
use framequery::{run_collect, Context};

fn gen_table(n: usize, seed: u64) -> DataFrame {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut id: Vec<i64> = Vec::with_capacity(n);
    let mut cat: Vec<i64> = Vec::with_capacity(n);
    let mut val: Vec<f64> = Vec::with_capacity(n);
    for i in 0..n {
        id.push(i as i64);
        cat.push((rng.gen::<u32>() % 16) as i64);
        val.push(rng.gen::<f64>() * 1000.0);
    }
    df!("id" => id, "cat" => cat, "val" => val).expect("df build")
}

fn gen_dims() -> DataFrame {
    let cat: Vec<i64> = (0..16).collect();
    let label: Vec<String> = (0..16).map(|c| format!("c{}", c)).collect();
    df!("cat" => cat, "label" => label).expect("dims build")
}

const QUERIES: [(&str, &str); 3] = [
    ("filter_project", "select id, val * 2 as v2 from T where val > 500"),
    ("group_order", "select cat, sum(val) as s, count(*) as n from T group by cat order by s desc"),
    ("join_group", "select d.label, avg(val) as a from T as t join D as d on t.cat = d.cat group by d.label"),
];

fn bench_pipeline(c: &mut Criterion) {
    let ns = [10_000usize, 100_000usize];
    let mut group = c.benchmark_group("pipeline");
    group.sampling_mode(SamplingMode::Flat);
    group.sample_size(10);

    let engines: Vec<Arc<dyn Engine>> = vec![Arc::new(LocalEngine), Arc::new(LazyEngine)];
    for &n in &ns {
        let t = gen_table(n, 0xABCD_1234);
        let d = gen_dims();
        group.throughput(Throughput::Elements(n as u64));
        for engine in &engines {
            for (label, sql) in QUERIES {
                let id = BenchmarkId::new(format!("{}_{}", label, engine.name()), n.to_string());
                group.bench_with_input(id, &n, |b, _| {
                    b.iter(|| {
                        let mut ctx = Context::with_tables(vec![("T", t.clone()), ("D", d.clone())]);
                        ctx.select_engine(engine.clone()).unwrap();
                        let _ = run_collect(sql, &mut ctx).unwrap();
                    });
                });
            }
        }
    }
    group.finish();
}

criterion_group!(benches, bench_pipeline);
criterion_main!(benches);
