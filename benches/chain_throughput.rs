//! Benchmarks for chain execution
//!
//! Run with: cargo bench

use chrono::Utc;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use preproc_test::{
    ErrorPolicy, HistoryContext, PipelineExecutor, RhaiScriptRunner, Step, StepKind, Value,
};

fn text_chain() -> Vec<Step> {
    vec![
        Step::new(StepKind::Trim, [" \t"]),
        Step::new(StepKind::RegexExtract, [r"temp=([0-9.]+)", ""]),
        Step::bare(StepKind::ToFloat),
        Step::new(StepKind::Multiplier, ["1.8"]),
        Step::new(StepKind::ValidateRange, ["-100", "200"]),
    ]
}

fn json_chain() -> Vec<Step> {
    vec![
        Step::new(StepKind::ErrorFieldJson, ["$.error"]),
        Step::new(StepKind::JsonPath, ["$.ports[*].rx"])
            .on_fail(ErrorPolicy::SetValue("[]".into())),
    ]
}

fn script_chain() -> Vec<Step> {
    vec![
        Step::bare(StepKind::ToFloat),
        Step::new(StepKind::Script, ["clamp(value * 2.0, 0.0, 1000.0)"]),
    ]
}

fn bench_builtin_chains(c: &mut Criterion) {
    let runner = RhaiScriptRunner::new();
    let mut group = c.benchmark_group("builtin_chains");
    group.throughput(Throughput::Elements(1));

    let text_steps = text_chain();
    group.bench_function("text_numeric", |b| {
        b.iter(|| {
            PipelineExecutor::new(&runner).run(
                black_box(Value::text("  temp=21.5  ")),
                None,
                &text_steps,
            )
        })
    });

    let json_steps = json_chain();
    let doc = r#"{"ports": [{"rx": 1}, {"rx": 2}, {"rx": 3}, {"rx": 4}]}"#;
    group.bench_function("json", |b| {
        b.iter(|| PipelineExecutor::new(&runner).run(black_box(Value::text(doc)), None, &json_steps))
    });

    group.finish();
}

fn bench_history_steps(c: &mut Criterion) {
    let runner = RhaiScriptRunner::new();
    let now = Utc::now();
    let history = HistoryContext::new(Value::Unsigned(1_000), now - chrono::Duration::seconds(30));
    let mut group = c.benchmark_group("history_steps");

    for kind in [StepKind::DeltaValue, StepKind::DeltaSpeed, StepKind::DiscardUnchanged] {
        let steps = vec![Step::bare(kind)];
        group.bench_with_input(BenchmarkId::from_parameter(kind), &steps, |b, steps| {
            b.iter(|| {
                PipelineExecutor::new(&runner).at(now).run(
                    black_box(Value::Unsigned(4_000)),
                    Some(&history),
                    steps,
                )
            })
        });
    }

    group.finish();
}

fn bench_script_cache(c: &mut Criterion) {
    let cached = RhaiScriptRunner::new();
    let uncached = RhaiScriptRunner::with_limits(preproc_test::ScriptLimits {
        cache_capacity: 0,
        ..Default::default()
    });
    let steps = script_chain();
    let mut group = c.benchmark_group("script");

    for (name, runner) in [("cached", &cached), ("uncached", &uncached)] {
        group.bench_function(name, |b| {
            b.iter(|| PipelineExecutor::new(runner).run(black_box(Value::text("12.5")), None, &steps))
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_builtin_chains,
    bench_history_steps,
    bench_script_cache
);
criterion_main!(benches);
