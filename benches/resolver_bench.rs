//! 依赖解析与生命周期性能基准测试
//!
//! 使用 Criterion 框架进行性能测试，包括：
//! - 分层依赖图的启动顺序计算
//! - 依赖校验（含循环检测）
//! - 传递依赖查询
//! - 全部模块的启动与停止

use chips_orchestrator::{DependencyResolver, LifecycleManager, ModuleManifest, PassiveModule};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

// ============================================================================
// 测试辅助函数
// ============================================================================

/// 生成分层依赖图：每层 `width` 个模块，每个模块依赖上一层的 `fan_in` 个模块
fn layered_manifests(layers: usize, width: usize, fan_in: usize) -> Vec<ModuleManifest> {
    let mut manifests = Vec::with_capacity(layers * width);
    for layer in 0..layers {
        for i in 0..width {
            let mut manifest =
                ModuleManifest::new(format!("l{layer}-m{i}")).with_priority(((i * 7) % 13) as i32);
            if layer > 0 {
                for k in 0..fan_in.min(width) {
                    manifest = manifest.depends_on(format!("l{}-m{}", layer - 1, (i + k) % width));
                }
            }
            manifests.push(manifest);
        }
    }
    manifests
}

fn build_resolver(manifests: &[ModuleManifest]) -> DependencyResolver {
    let mut resolver = DependencyResolver::new();
    for manifest in manifests {
        resolver.register_module(manifest.clone()).unwrap();
    }
    resolver
}

// ============================================================================
// 依赖解析基准测试
// ============================================================================

/// 启动顺序计算基准测试
fn startup_order_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("startup_order");

    for &(layers, width) in &[(5, 10), (10, 50), (20, 100)] {
        let manifests = layered_manifests(layers, width, 3);
        let resolver = build_resolver(&manifests);
        let count = manifests.len();

        group.throughput(Throughput::Elements(count as u64));
        group.bench_with_input(BenchmarkId::from_parameter(count), &resolver, |b, resolver| {
            b.iter(|| black_box(resolver.get_startup_order().unwrap()));
        });
    }

    group.finish();
}

/// 依赖校验基准测试
fn validation_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("validate_dependencies");

    for &(layers, width) in &[(10, 50), (20, 100)] {
        let manifests = layered_manifests(layers, width, 3);
        let resolver = build_resolver(&manifests);

        group.bench_with_input(
            BenchmarkId::from_parameter(manifests.len()),
            &resolver,
            |b, resolver| {
                b.iter(|| black_box(resolver.validate_dependencies()));
            },
        );
    }

    group.finish();
}

/// 传递依赖查询基准测试
fn transitive_query_benchmark(c: &mut Criterion) {
    let manifests = layered_manifests(20, 100, 3);
    let resolver = build_resolver(&manifests);

    c.bench_function("all_dependencies_leaf", |b| {
        b.iter(|| black_box(resolver.get_all_dependencies(black_box("l19-m0"))));
    });

    c.bench_function("dependents_root", |b| {
        b.iter(|| black_box(resolver.get_dependents(black_box("l0-m0"))));
    });
}

// ============================================================================
// 生命周期基准测试
// ============================================================================

/// 全部模块启动并停止的基准测试
fn lifecycle_round_trip_benchmark(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let manifests = layered_manifests(5, 20, 2);

    c.bench_function("start_stop_all_100", |b| {
        b.to_async(&rt).iter(|| async {
            let manager = LifecycleManager::new();
            for manifest in &manifests {
                manager
                    .register_module(manifest.clone(), Arc::new(PassiveModule))
                    .await
                    .unwrap();
            }

            let token = CancellationToken::new();
            manager.start_all_modules(token.clone()).await.unwrap();
            manager.stop_all_modules(token).await.unwrap();
        });
    });
}

criterion_group!(
    name = resolver_benches;
    config = Criterion::default().sample_size(50);
    targets = startup_order_benchmark, validation_benchmark, transitive_query_benchmark
);

criterion_group!(
    name = lifecycle_benches;
    config = Criterion::default().sample_size(20);
    targets = lifecycle_round_trip_benchmark
);

criterion_main!(resolver_benches, lifecycle_benches);
