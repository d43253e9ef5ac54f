use criterion::{Criterion, black_box, criterion_group, criterion_main};

use vkbench_core::benchmark_collection::parse_description;
use vkbench_core::options::parse_window_system_options;
use vkbench_core::{Benchmark, BenchmarkCollection, SceneBase, SceneOption};

// ---------------------------------------------------------------------------
// Description parsing
// ---------------------------------------------------------------------------

fn bench_parse_short_description(c: &mut Criterion) {
    c.bench_function("parse_description_name_only", |b| {
        b.iter(|| parse_description(black_box("clear")));
    });
}

fn bench_parse_long_description(c: &mut Criterion) {
    c.bench_function("parse_description_four_options", |b| {
        b.iter(|| {
            parse_description(black_box(
                "clear:color=0.1,0.2,0.3,1.0:duration=5.0:mode=fast:bogus",
            ))
        });
    });
}

fn bench_collection_add(c: &mut Criterion) {
    let descriptions: Vec<String> = (0..64)
        .map(|i| format!("scene{i}:duration={i}.0:color=cycle"))
        .collect();
    c.bench_function("benchmark_collection_add_64", |b| {
        b.iter(|| {
            let mut bc = BenchmarkCollection::new();
            bc.add(black_box(descriptions.as_slice()));
            bc
        });
    });
}

fn bench_parse_winsys_options(c: &mut Criterion) {
    c.bench_function("parse_window_system_options", |b| {
        b.iter(|| parse_window_system_options(black_box("width=1920:height=1080:num-buffers=3")));
    });
}

// ---------------------------------------------------------------------------
// Option handling
// ---------------------------------------------------------------------------

fn bench_info_string(c: &mut Criterion) {
    let mut base = SceneBase::new("clear");
    base.add_option(SceneOption::new("color", "cycle", "Clear color", ""));
    base.add_option(SceneOption::new("mode", "a", "Mode", "a,b,c"));
    c.bench_function("scene_info_string_all_options", |b| {
        b.iter(|| base.info_string(black_box(true)));
    });
}

fn bench_prepare_scene(c: &mut Criterion) {
    struct Plain(SceneBase);
    impl vkbench_core::Scene for Plain {
        fn base(&self) -> &SceneBase {
            &self.0
        }
        fn base_mut(&mut self) -> &mut SceneBase {
            &mut self.0
        }
    }

    let mut scenes = vkbench_core::SceneCollection::new();
    scenes.register_scene(Box::new(Plain(SceneBase::new("plain"))));
    let benchmark = Benchmark::new(
        "plain",
        vec![("duration".to_string(), "1.0".to_string())],
    );
    c.bench_function("benchmark_prepare_scene", |b| {
        b.iter(|| {
            benchmark.prepare_scene(&mut scenes);
        });
    });
}

criterion_group!(
    parsing,
    bench_parse_short_description,
    bench_parse_long_description,
    bench_collection_add,
    bench_parse_winsys_options,
);

criterion_group!(options, bench_info_string, bench_prepare_scene);

criterion_main!(parsing, options);
