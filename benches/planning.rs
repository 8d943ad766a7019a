//! Benchmark planning performance across motion models and map shapes.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use marga_plan::{
    costs, Costmap, MotionModel, PathPlanner, PlannerConfig, Pose2D, WorldPoint,
};

/// Free map with a few vertical wall segments to route around.
fn slalom_map(size: u32) -> Costmap {
    let mut map = Costmap::filled(size, size, 0.05, WorldPoint::ZERO, costs::FREE);
    let gap = size / 8;
    for (i, x) in (size / 4..size).step_by((size / 4) as usize).enumerate() {
        let (lo, hi) = if i % 2 == 0 {
            (gap, size)
        } else {
            (0, size - gap)
        };
        for y in lo..hi {
            map.set_cost(x, y, costs::OCCUPIED);
        }
    }
    map
}

fn planner_for(model: MotionModel, smooth: bool) -> PathPlanner {
    let mut config = PlannerConfig {
        motion_model_for_search: model,
        smooth_path: smooth,
        downsample_costmap: false,
        ..Default::default()
    };
    if model.is_se2() {
        config.angle_quantization_bins = 72;
        config.minimum_turning_radius = 0.2;
        config.tolerance = 0.25;
    }
    PathPlanner::new(config).unwrap()
}

fn bench_2d_planning(c: &mut Criterion) {
    let mut group = c.benchmark_group("plan_2d");
    for size in [64u32, 128, 256] {
        let map = slalom_map(size);
        let extent = size as f32 * 0.05;
        let start = Pose2D::new(0.2, 0.2, 0.0);
        let goal = Pose2D::new(extent - 0.2, extent - 0.2, 0.0);

        let mut planner = planner_for(MotionModel::Moore, false);
        group.bench_with_input(BenchmarkId::new("moore_raw", size), &size, |b, _| {
            b.iter(|| black_box(planner.create_plan(&map, start, goal)))
        });

        let mut planner = planner_for(MotionModel::Moore, true);
        group.bench_with_input(BenchmarkId::new("moore_smoothed", size), &size, |b, _| {
            b.iter(|| black_box(planner.create_plan(&map, start, goal)))
        });
    }
    group.finish();
}

fn bench_se2_planning(c: &mut Criterion) {
    let mut group = c.benchmark_group("plan_se2");
    group.sample_size(20);

    let map = Costmap::filled(128, 128, 0.05, WorldPoint::ZERO, costs::FREE);
    let start = Pose2D::new(1.0, 3.2, 0.0);
    let goal = Pose2D::new(5.4, 3.2, 0.0);

    for model in [
        MotionModel::Dubin,
        MotionModel::ReedsShepp,
        MotionModel::BalkcomMason,
    ] {
        let mut planner = planner_for(model, false);
        group.bench_with_input(
            BenchmarkId::new("model", model.to_string()),
            &model,
            |b, _| b.iter(|| black_box(planner.create_plan(&map, start, goal))),
        );
    }
    group.finish();
}

criterion_group!(benches, bench_2d_planning, bench_se2_planning);
criterion_main!(benches);
